//! JSON guide parser.
//!
//! Produces the same element vocabulary as [`crate::html_parser`]; embedded
//! `html` blocks are handed to it with the same options and context, trust
//! gate included.

use serde::Deserialize;
use serde_json::Value;

use crate::context::{InteractiveKind, ParseContext};
use crate::element::{
    Child, ContentFlags, InternalAction, ParsedContent, ParsedElement, Props, PropsExt,
    QuizChoice,
};
use crate::errors::{ContentParseResult, ErrorCollector, ParseErrorKind};
use crate::guide::{
    BLOCK_TYPES, Block, GuidedBlock, ImageBlock, InteractiveBlock, JsonStep, MultistepBlock,
    QuizBlock, SectionBlock, VideoBlock, VideoProvider,
};
use crate::html_parser::{ParseOptions, parse_html};
use crate::markdown::{markdown_to_html, parse_inline, parse_markdown};
use crate::trust::is_youtube_url;

const DEFAULT_STEP_TIMEOUT_MS: i64 = 30_000;
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Parse a JSON guide from text.
pub fn parse_json_guide(
    text: &str,
    options: &ParseOptions<'_>,
    ctx: &mut ParseContext,
) -> ContentParseResult {
    match serde_json::from_str::<Value>(text) {
        Ok(value) => parse_guide_value(&value, options, ctx),
        Err(e) => {
            let mut collector = ErrorCollector::new();
            collector.add_error_with_cause(
                ParseErrorKind::HtmlParsing,
                format!("Invalid JSON: {e}"),
                None,
                None,
                &e,
            );
            collector.fail()
        }
    }
}

/// Parse an already decoded JSON guide.
///
/// The envelope is checked as a whole first; any missing field ends the
/// parse before a single block is looked at.
pub fn parse_guide_value(
    guide: &Value,
    options: &ParseOptions<'_>,
    ctx: &mut ParseContext,
) -> ContentParseResult {
    let mut collector = ErrorCollector::new();

    let non_empty_str = |key: &str| {
        guide
            .get(key)
            .and_then(Value::as_str)
            .is_some_and(|s| !s.is_empty())
    };
    if !non_empty_str("id") {
        collector.add_error(
            ParseErrorKind::HtmlParsing,
            r#"Guide missing required "id" field"#,
            None,
            None,
        );
    }
    if !non_empty_str("title") {
        collector.add_error(
            ParseErrorKind::HtmlParsing,
            r#"Guide missing required "title" field"#,
            None,
            None,
        );
    }
    let blocks = guide.get("blocks").and_then(Value::as_array);
    if blocks.is_none() {
        collector.add_error(
            ParseErrorKind::HtmlParsing,
            r#"Guide missing required "blocks" array"#,
            None,
            None,
        );
    }
    let Some(blocks) = blocks.filter(|_| !collector.has_errors()) else {
        return collector.fail();
    };

    let mut converter = BlockConverter {
        options,
        ctx,
        collector,
        flags: ContentFlags::default(),
    };
    let elements = converter.convert_blocks(blocks, "blocks");
    let BlockConverter {
        collector, flags, ..
    } = converter;
    collector.finish(ParsedContent { elements, flags })
}

struct BlockConverter<'a, 'o, 'c> {
    options: &'a ParseOptions<'o>,
    ctx: &'c mut ParseContext,
    collector: ErrorCollector,
    flags: ContentFlags,
}

impl BlockConverter<'_, '_, '_> {
    fn convert_blocks(&mut self, blocks: &[Value], prefix: &str) -> Vec<ParsedElement> {
        let mut elements = Vec::new();
        for (index, block) in blocks.iter().enumerate() {
            let path = format!("{prefix}[{index}]");
            elements.extend(self.convert_block(block, index, &path));
        }
        elements
    }

    /// One block inside its own failure boundary. `html` blocks may yield
    /// several elements, which are spliced into the parent.
    fn convert_block(&mut self, value: &Value, index: usize, path: &str) -> Vec<ParsedElement> {
        let block_type = value.get("type").and_then(Value::as_str);
        if !block_type.is_some_and(|t| BLOCK_TYPES.contains(&t)) {
            let shown = match value.get("type") {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => "undefined".to_owned(),
            };
            self.collector
                .add_warning(format!("Unknown block type at {path}: {shown}"));
            return Vec::new();
        }

        let block = match Block::deserialize(value) {
            Ok(block) => block,
            Err(e) => {
                let snippet = value.to_string();
                self.collector.add_error_with_cause(
                    ParseErrorKind::ElementCreation,
                    format!("Failed to convert block {index}: {e}"),
                    Some(&snippet),
                    Some(path),
                    &e,
                );
                return Vec::new();
            }
        };

        match block {
            Block::Markdown { content } => vec![self.markdown(&content)],
            Block::Html { content } => self.html(&content, path),
            Block::Section(section) => vec![self.section(section, path)],
            Block::Interactive(step) => vec![self.interactive(step)],
            Block::Multistep(multi) => vec![self.multistep(multi)],
            Block::Guided(guided) => vec![self.guided(guided)],
            Block::Image(image) => vec![self.image(image)],
            Block::Video(video) => vec![self.video(video)],
            Block::Quiz(quiz) => vec![self.quiz(quiz)],
        }
    }

    fn markdown_children(&mut self, content: &str) -> Vec<Child> {
        parse_markdown(content, &mut self.flags)
            .into_iter()
            .map(Child::from)
            .collect()
    }

    fn markdown(&mut self, content: &str) -> ParsedElement {
        let mut elements = parse_markdown(content, &mut self.flags);
        if elements.len() == 1
            && let Some(only) = elements.pop()
        {
            return only;
        }
        let mut props = Props::new();
        props.put("className", "markdown-block");
        ParsedElement::new("div")
            .with_props(props)
            .with_children(elements.into_iter().map(Child::from).collect())
    }

    fn html(&mut self, content: &str, path: &str) -> Vec<ParsedElement> {
        if content.trim().is_empty() {
            self.collector
                .add_warning(format!("Empty HTML block at {path}"));
            return Vec::new();
        }

        let result = parse_html(content, self.options, self.ctx);
        self.collector.absorb(result.errors, result.warnings);
        let Some(data) = result.data else {
            return Vec::new();
        };
        self.flags.merge(data.flags);

        if data.elements.is_empty() {
            self.collector
                .add_warning(format!("Empty HTML block at {path}"));
        } else if !data.flags.has_interactive_elements {
            self.collector.add_warning(
                "HTML blocks should be migrated to markdown/JSON blocks for better maintainability",
            );
        }
        data.elements
    }

    fn section(&mut self, section: SectionBlock, path: &str) -> ParsedElement {
        self.flags.has_interactive_elements = true;
        let interactive_id = self.ctx.next_id(InteractiveKind::Section);
        let children = self
            .convert_blocks(&section.blocks, &format!("{path}.blocks"))
            .into_iter()
            .map(Child::from)
            .collect();

        let mut props = Props::new();
        props.put("interactiveId", interactive_id);
        props.put_opt("title", section.title);
        props.put("isSequence", true);
        props.put_opt("id", section.id);
        props.put_opt("requirements", joined(section.requirements.as_deref()));
        props.put_opt("objectives", joined(section.objectives.as_deref()));
        ParsedElement::new("interactive-section")
            .with_props(props)
            .with_children(children)
    }

    fn interactive(&mut self, step: InteractiveBlock) -> ParsedElement {
        self.flags.has_interactive_elements = true;
        let interactive_id = self.ctx.next_id(InteractiveKind::Step);

        let mut children = Vec::new();
        if let Some(tooltip) = &step.tooltip {
            let mut props = Props::new();
            props.put("className", "interactive-comment");
            let comment = ParsedElement::new("span")
                .with_props(props)
                .with_children(parse_inline(tooltip, &mut self.flags));
            children.push(Child::from(comment));
        }
        children.extend(self.markdown_children(&step.content));

        let mut props = Props::new();
        props.put("interactiveId", interactive_id);
        props.put("targetAction", step.action.as_str());
        props.put("refTarget", step.reftarget);
        props.put_opt("targetValue", step.targetvalue);
        props.put_opt("targetComment", step.tooltip.as_deref().map(markdown_to_html));
        props.put_opt("requirements", joined(step.requirements.as_deref()));
        props.put_opt("objectives", joined(step.objectives.as_deref()));
        props.put("skippable", step.skippable.unwrap_or(false));
        props.put_opt("hints", step.hint);
        props.put("showMe", step.show_me.unwrap_or(true));
        props.put("doIt", step.do_it.unwrap_or(true));
        props.put("completeEarly", step.complete_early.unwrap_or(false));
        props.put_opt("postVerify", step.verify);
        ParsedElement::new("interactive-step")
            .with_props(props)
            .with_children(children)
    }

    fn multistep(&mut self, multi: MultistepBlock) -> ParsedElement {
        self.flags.has_interactive_elements = true;
        let interactive_id = self.ctx.next_id(InteractiveKind::MultiStep);
        let actions: Vec<InternalAction> = multi
            .steps
            .iter()
            .map(|step| internal_action(step, false))
            .collect();
        let children = self.markdown_children(&multi.content);

        let mut props = Props::new();
        props.put("interactiveId", interactive_id);
        props.put("internalActions", actions);
        props.put_opt("requirements", joined(multi.requirements.as_deref()));
        props.put_opt("objectives", joined(multi.objectives.as_deref()));
        props.put("skippable", multi.skippable.unwrap_or(false));
        ParsedElement::new("interactive-multi-step")
            .with_props(props)
            .with_children(children)
    }

    fn guided(&mut self, guided: GuidedBlock) -> ParsedElement {
        self.flags.has_interactive_elements = true;
        let interactive_id = self.ctx.next_id(InteractiveKind::Guided);
        let actions: Vec<InternalAction> = guided
            .steps
            .iter()
            .map(|step| internal_action(step, true))
            .collect();
        let children = self.markdown_children(&guided.content);

        let mut props = Props::new();
        props.put("interactiveId", interactive_id);
        props.put("internalActions", actions);
        props.put(
            "stepTimeout",
            guided.step_timeout.unwrap_or(DEFAULT_STEP_TIMEOUT_MS),
        );
        props.put_opt("requirements", joined(guided.requirements.as_deref()));
        props.put_opt("objectives", joined(guided.objectives.as_deref()));
        props.put("skippable", guided.skippable.unwrap_or(false));
        props.put("completeEarly", guided.complete_early.unwrap_or(false));
        ParsedElement::new("interactive-guided")
            .with_props(props)
            .with_children(children)
    }

    fn image(&mut self, image: ImageBlock) -> ParsedElement {
        self.flags.has_images = true;
        let mut props = Props::new();
        props.put("src", image.src);
        props.put_opt("alt", image.alt);
        props.put_opt("width", image.width);
        props.put_opt("height", image.height);
        props.put_opt("baseUrl", self.options.base_url);
        ParsedElement::new("image-renderer").with_props(props)
    }

    fn video(&mut self, video: VideoBlock) -> ParsedElement {
        self.flags.has_videos = true;
        let youtube = match video.provider {
            Some(VideoProvider::Youtube) => true,
            Some(VideoProvider::Native) => false,
            None => is_youtube_url(&video.src),
        };
        let kind = if youtube { "youtube-video" } else { "video" };
        let mut props = Props::new();
        props.put("src", video.src);
        props.put_opt("title", video.title);
        ParsedElement::new(kind).with_props(props)
    }

    fn quiz(&mut self, quiz: QuizBlock) -> ParsedElement {
        self.flags.has_interactive_elements = true;
        let interactive_id = self.ctx.next_id(InteractiveKind::Quiz);
        let children = self.markdown_children(&quiz.question);

        let choices: Vec<QuizChoice> = quiz
            .choices
            .into_iter()
            .map(|choice| QuizChoice {
                text_elements: parse_inline(&choice.text, &mut self.flags),
                id: choice.id,
                text: choice.text,
                correct: choice.correct.unwrap_or(false),
                hint: choice.hint,
            })
            .collect();

        let mut props = Props::new();
        props.put("interactiveId", interactive_id);
        props.put("question", quiz.question);
        props.put("choices", choices);
        props.put("multiSelect", quiz.multi_select.unwrap_or(false));
        props.put(
            "completionMode",
            quiz.completion_mode.unwrap_or_default().as_str(),
        );
        props.put("maxAttempts", quiz.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS));
        props.put_opt("requirements", joined(quiz.requirements.as_deref()));
        props.put("skippable", quiz.skippable.unwrap_or(false));
        ParsedElement::new("quiz-block")
            .with_props(props)
            .with_children(children)
    }
}

fn internal_action(step: &JsonStep, guided: bool) -> InternalAction {
    InternalAction {
        target_action: step.action.as_str().to_owned(),
        ref_target: step.reftarget.clone(),
        target_value: step.targetvalue.clone(),
        requirements: joined(step.requirements.as_deref()),
        target_comment: if guided {
            step.tooltip.as_deref().map(markdown_to_html)
        } else {
            None
        },
        is_skippable: guided.then(|| step.skippable.unwrap_or(false)),
    }
}

/// Lists travel as comma-joined strings, the way `data-requirements` does.
fn joined(items: Option<&[String]>) -> Option<String> {
    items.map(|items| items.join(",")).filter(|s| !s.is_empty())
}
