//! Sanitizing HTML parser.
//!
//! Untrusted interactive markup is refused, whether it is in the input or
//! only shows up in the sanitized tree.
//! Everything else is sanitized, parsed into the arena DOM, and walked into
//! [`ParsedElement`]s. Each node is classified into a [`NodeShape`] first and
//! converted by a single `match`, so the precedence between shapes lives in
//! one place.

use std::sync::LazyLock;

use indextree::NodeId;
use regex::Regex;
use thiserror::Error;

use crate::arena_dom::{Document, ElementData, NodeKind, parse_fragment};
use crate::context::{InteractiveKind, ParseContext};
use crate::element::{
    Child, ContentFlags, InternalAction, ParsedContent, ParsedElement, Props, PropsExt,
};
use crate::errors::{ContentParseResult, ErrorCollector, ParseErrorKind};
use crate::sanitize::{DocumentationSanitizer, Sanitizer};
use crate::trust::{TrustPolicy, is_youtube_url};

/// Marker whose presence makes markup "interactive" for the trust gate.
pub const INTERACTIVE_MARKER: &str = "data-targetaction";

/// Deeper trees are cut off with an error instead of exhausting the stack.
pub const MAX_DEPTH: usize = 128;

const DEFAULT_STEP_TIMEOUT_MS: i64 = 30_000;
const GUIDED_ACTIONS: &[&str] = &["hover", "button", "highlight"];

static INTERACTIVE_CLASS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\binteractive\b").expect("interactive class pattern is valid"));

static EXPAND_TABLE_CLASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bexpand-table-wrapper\b").expect("expand table pattern is valid")
});

static LANGUAGE_CLASS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"language-([^\s"]+)"#).expect("language pattern is valid"));

/// Inputs shared by the HTML and JSON parsers.
#[derive(Clone, Copy)]
pub struct ParseOptions<'a> {
    /// Where the content came from; decides whether interactive markup is allowed
    pub base_url: Option<&'a str>,
    pub policy: &'a TrustPolicy,
    pub sanitizer: &'a dyn Sanitizer,
    /// Skip the interactive trust gate. For internal authoring previews only.
    pub bypass_trust_gate: bool,
}

impl<'a> ParseOptions<'a> {
    pub fn new(policy: &'a TrustPolicy) -> Self {
        Self {
            base_url: None,
            policy,
            sanitizer: &DocumentationSanitizer,
            bypass_trust_gate: false,
        }
    }

    pub fn with_base_url(mut self, base_url: &'a str) -> Self {
        self.base_url = Some(base_url);
        self
    }

    pub fn with_sanitizer(mut self, sanitizer: &'a dyn Sanitizer) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    pub fn bypassing_trust_gate(mut self) -> Self {
        self.bypass_trust_gate = true;
        self
    }
}

impl std::fmt::Debug for ParseOptions<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParseOptions")
            .field("base_url", &self.base_url)
            .field("bypass_trust_gate", &self.bypass_trust_gate)
            .finish_non_exhaustive()
    }
}

/// Parse documentation HTML into elements.
///
/// The context is not reset here: callers reset it once per document, and
/// `html` blocks inside a guide keep numbering where the guide left off.
pub fn parse_html(
    html: &str,
    options: &ParseOptions<'_>,
    ctx: &mut ParseContext,
) -> ContentParseResult {
    let mut collector = ErrorCollector::new();

    if html.is_empty() {
        collector.add_error(
            ParseErrorKind::HtmlParsing,
            "Invalid HTML input: must be a non-empty string",
            None,
            None,
        );
        return collector.fail();
    }

    let interactive_allowed = if options.bypass_trust_gate {
        warn!(base_url = options.base_url, "interactive trust gate bypassed");
        true
    } else {
        options.policy.classify_interactive_source(options.base_url)
    };
    if !interactive_allowed && mentions_marker(html) {
        return reject_untrusted(collector, options);
    }

    let sanitized = match options.sanitizer.sanitize(html) {
        Ok(sanitized) => sanitized,
        Err(e) => {
            collector.add_error_with_cause(
                ParseErrorKind::HtmlSanitization,
                format!("HTML sanitization failed - content rejected for security reasons: {e}"),
                Some(html),
                Some("sanitizeDocumentationHTML"),
                &e,
            );
            return collector.fail();
        }
    };

    let Some(doc) = parse_fragment(&sanitized) else {
        collector.add_error(
            ParseErrorKind::HtmlParsing,
            "Failed to create document root element",
            Some(html),
            Some("parse_fragment"),
        );
        return collector.fail();
    };

    // Attribute names reach the tree lowercased, and a custom sanitizer may
    // rewrite markup, so the walked tree is what finally decides.
    if !interactive_allowed
        && doc
            .find_descendant(doc.root, |d, id| d.attr(id, INTERACTIVE_MARKER).is_some())
            .is_some()
    {
        return reject_untrusted(collector, options);
    }

    let mut walker = Walker {
        doc,
        base_url: options.base_url,
        ctx,
        collector,
        flags: ContentFlags::default(),
    };
    let elements = walker.walk_root();
    let Walker {
        collector, flags, ..
    } = walker;
    collector.finish(ParsedContent { elements, flags })
}

/// Attribute names are ASCII case-insensitive.
fn mentions_marker(html: &str) -> bool {
    html.as_bytes()
        .windows(INTERACTIVE_MARKER.len())
        .any(|window| window.eq_ignore_ascii_case(INTERACTIVE_MARKER.as_bytes()))
}

fn reject_untrusted(mut collector: ErrorCollector, options: &ParseOptions<'_>) -> ContentParseResult {
    warn!(
        base_url = options.base_url,
        "interactive content from untrusted source rejected"
    );
    let source = format!("Source: {}", options.base_url.unwrap_or("unknown"));
    collector.add_error(
        ParseErrorKind::HtmlSanitization,
        "Interactive content from untrusted source rejected",
        Some(&source),
        Some("isTrustedInteractiveSource"),
    );
    collector.fail()
}

#[derive(Debug, Error)]
enum ConvertError {
    #[error("element nesting exceeds {MAX_DEPTH} levels")]
    TooDeep,
}

/// What a node is, decided once, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeShape {
    /// Tags that never render as content
    Skipped,
    Image,
    Video,
    YouTubeEmbed,
    Iframe,
    CodeBlock,
    InlineCode,
    ExpandableTable,
    CollapseSection,
    Badge,
    BadgeTooltip,
    InteractiveSection,
    MultiStep,
    Guided,
    Step,
    Assistant,
    Generic,
}

fn classify(doc: &Document, id: NodeId, tag: &str) -> NodeShape {
    match tag {
        "script" | "style" | "meta" | "link" | "base" => return NodeShape::Skipped,
        "img" => return NodeShape::Image,
        "video" => return NodeShape::Video,
        "iframe" => {
            return if doc.attr(id, "src").is_some_and(is_youtube_url) {
                NodeShape::YouTubeEmbed
            } else {
                NodeShape::Iframe
            };
        }
        "pre" => return NodeShape::CodeBlock,
        "code" if doc.parent(id).and_then(|p| doc.tag(p)) != Some("pre") => {
            return NodeShape::InlineCode;
        }
        "div" if class_matches(doc, id, &EXPAND_TABLE_CLASS) => {
            return NodeShape::ExpandableTable;
        }
        "div" if is_collapse_section(doc, id) => return NodeShape::CollapseSection,
        "badge" => return NodeShape::Badge,
        "badge-tooltip" => return NodeShape::BadgeTooltip,
        _ => {}
    }

    if class_matches(doc, id, &INTERACTIVE_CLASS) {
        match doc.non_empty_attr(id, "data-targetaction") {
            Some("sequence") => return NodeShape::InteractiveSection,
            Some("multistep") => return NodeShape::MultiStep,
            Some("guided") => return NodeShape::Guided,
            Some(_) => return NodeShape::Step,
            None => {}
        }
    }

    if tag == "assistant" {
        NodeShape::Assistant
    } else {
        NodeShape::Generic
    }
}

fn class_matches(doc: &Document, id: NodeId, pattern: &Regex) -> bool {
    doc.attr(id, "class").is_some_and(|class| pattern.is_match(class))
}

/// Legacy `<div class="collapse">` blocks, excluding their own parts and
/// anything interactive.
fn is_collapse_section(doc: &Document, id: NodeId) -> bool {
    doc.has_class(id, "collapse")
        && !doc.has_class(id, "collapse-content")
        && !doc.has_class(id, "collapse-trigger")
        && !doc.has_class(id, "collapse-section")
        && !class_matches(doc, id, &INTERACTIVE_CLASS)
}

/// Attribute name to renderer prop name.
fn prop_name_for(attr: &str) -> Option<&'static str> {
    Some(match attr {
        "class" => "className",
        "for" => "htmlFor",
        "tabindex" => "tabIndex",
        "contenteditable" => "contentEditable",
        "spellcheck" => "spellCheck",
        "readonly" => "readOnly",
        "maxlength" => "maxLength",
        "cellpadding" => "cellPadding",
        "cellspacing" => "cellSpacing",
        "rowspan" => "rowSpan",
        "colspan" => "colSpan",
        "usemap" => "useMap",
        "frameborder" => "frameBorder",
        "allowfullscreen" => "allowFullScreen",
        _ => return None,
    })
}

/// Attributes where an empty value is meaningful and must stay a string.
const EMPTY_STRING_ATTRS: &[&str] = &["sandbox"];

/// Translate an element's attributes into props.
///
/// `data-*` and `aria-*` pass through verbatim. A value that is empty or
/// echoes the attribute name is a boolean flag, except for the attributes in
/// [`EMPTY_STRING_ATTRS`].
pub fn map_attributes(elem: &ElementData) -> Props {
    let mut props = Props::new();
    for (name, value) in &elem.attrs {
        let name = name.to_ascii_lowercase();
        let value: &str = value.as_ref();
        if name == "style" {
            continue;
        }
        if name.starts_with("data-") || name.starts_with("aria-") {
            props.put(&name, value);
            continue;
        }
        let prop = prop_name_for(&name).unwrap_or(name.as_str());
        if (value.is_empty() || value == name) && !EMPTY_STRING_ATTRS.contains(&name.as_str()) {
            props.put(prop, true);
        } else {
            props.put(prop, value);
        }
    }
    props
}

struct Walker<'o, 'c> {
    doc: Document,
    base_url: Option<&'o str>,
    ctx: &'c mut ParseContext,
    collector: ErrorCollector,
    flags: ContentFlags,
}

impl Walker<'_, '_> {
    fn walk_root(&mut self) -> Vec<ParsedElement> {
        let root = self.doc.root;
        let children: Vec<NodeId> = self.doc.children(root).collect();
        let mut elements = Vec::new();
        for (index, child) in children.into_iter().enumerate() {
            let path = format!("root[{index}]");
            match self.walk(child, &path, 0) {
                Ok(Some(Child::Element(element))) => elements.push(element),
                Ok(_) => {}
                Err(e) => {
                    let snippet = self.snippet(child);
                    self.collector.add_error_with_cause(
                        ParseErrorKind::ElementCreation,
                        format!("Failed to process top-level element {index}: {e}"),
                        Some(&snippet),
                        Some(&path),
                        &e,
                    );
                }
            }
        }
        elements
    }

    /// Convert the child nodes of `parent`, each inside its own failure boundary.
    fn walk_children(
        &mut self,
        parent: NodeId,
        path_prefix: &str,
        label: &str,
        depth: usize,
    ) -> Vec<Child> {
        let children: Vec<NodeId> = self.doc.children(parent).collect();
        self.walk_nodes(children, path_prefix, label, depth)
    }

    fn walk_nodes(
        &mut self,
        nodes: Vec<NodeId>,
        path_prefix: &str,
        label: &str,
        depth: usize,
    ) -> Vec<Child> {
        let mut out = Vec::new();
        for (index, node) in nodes.into_iter().enumerate() {
            let path = format!("{path_prefix}[{index}]");
            match self.walk(node, &path, depth + 1) {
                Ok(Some(child)) => out.push(child),
                Ok(None) => {}
                Err(e) => {
                    let snippet = self.snippet(node);
                    self.collector.add_error_with_cause(
                        ParseErrorKind::ChildrenProcessing,
                        format!("Failed to process {label} {index}: {e}"),
                        Some(&snippet),
                        Some(&path),
                        &e,
                    );
                }
            }
        }
        out
    }

    fn snippet(&self, node: NodeId) -> String {
        match &self.doc.get(node).kind {
            NodeKind::Element(_) => self.doc.outer_html(node),
            _ => self.doc.text_content(node).chars().take(100).collect(),
        }
    }

    fn walk(&mut self, id: NodeId, path: &str, depth: usize) -> Result<Option<Child>, ConvertError> {
        if depth > MAX_DEPTH {
            return Err(ConvertError::TooDeep);
        }

        let tag = match &self.doc.get(id).kind {
            NodeKind::Text(text) => {
                return Ok((!text.is_empty()).then(|| Child::Text(text.to_string())));
            }
            NodeKind::Element(elem) => elem.tag.to_string(),
            NodeKind::Comment(_) | NodeKind::Document => return Ok(None),
        };
        let current = format!("{path}.{tag}");

        let element = match classify(&self.doc, id, &tag) {
            NodeShape::Skipped => {
                self.collector.add_warning(format!(
                    "Skipping {tag} element (not suitable for content rendering)"
                ));
                return Ok(None);
            }
            NodeShape::Image => self.image(id),
            NodeShape::Video => self.video(id),
            NodeShape::YouTubeEmbed => self.youtube_embed(id),
            NodeShape::Iframe => ParsedElement::new("iframe").with_props(self.mapped(id)),
            NodeShape::CodeBlock => self.code_block(id, path, &current),
            NodeShape::InlineCode => self.inline_code(id),
            NodeShape::ExpandableTable => {
                self.flags.has_expandable_tables = true;
                let children = self.walk_children(
                    id,
                    &format!("{current}.expand-table-wrapper"),
                    "expandable table child",
                    depth,
                );
                let mut props = Props::new();
                props.put("defaultCollapsed", false);
                ParsedElement::new("expandable-table")
                    .with_props(props)
                    .with_children(children)
            }
            NodeShape::CollapseSection => self.collapse_section(id, &current, depth),
            NodeShape::Badge => self.badge(id, false),
            NodeShape::BadgeTooltip => self.badge(id, true),
            NodeShape::InteractiveSection => self.interactive_section(id, &current, depth),
            NodeShape::MultiStep => self.multi_step(id, &current, depth, false),
            NodeShape::Guided => self.multi_step(id, &current, depth, true),
            NodeShape::Step => self.step(id, &current, depth),
            NodeShape::Assistant => self.assistant(id, path),
            NodeShape::Generic => {
                let children = self.walk_children(id, &current, "child", depth);
                ParsedElement::new(tag.as_str())
                    .with_props(self.mapped(id))
                    .with_children(children)
            }
        };

        let original_html = self.doc.outer_html(id);
        Ok(Some(Child::Element(element.with_original_html(original_html))))
    }

    fn mapped(&self, id: NodeId) -> Props {
        self.doc.element(id).map(map_attributes).unwrap_or_default()
    }

    fn attr(&self, id: NodeId, name: &str) -> Option<String> {
        self.doc.attr(id, name).map(str::to_owned)
    }

    fn non_empty_attr(&self, id: NodeId, name: &str) -> Option<String> {
        self.doc.non_empty_attr(id, name).map(str::to_owned)
    }

    fn flag_attr(&self, id: NodeId, name: &str) -> bool {
        self.doc.attr(id, name) == Some("true")
    }

    fn image(&mut self, id: NodeId) -> ParsedElement {
        self.flags.has_images = true;
        let mut props = Props::new();
        props.put_opt("src", self.attr(id, "src"));
        props.put_opt("dataSrc", self.attr(id, "data-src"));
        props.put_opt("alt", self.attr(id, "alt"));
        props.put_opt("width", self.attr(id, "width"));
        props.put_opt("height", self.attr(id, "height"));
        props.put_opt("className", self.attr(id, "class"));
        props.put_opt("title", self.attr(id, "title"));
        props.put_opt("baseUrl", self.base_url);
        props.overlay(&self.mapped(id));
        ParsedElement::new("image-renderer").with_props(props)
    }

    fn video(&mut self, id: NodeId) -> ParsedElement {
        self.flags.has_videos = true;
        let mut props = Props::new();
        props.put_opt("src", self.attr(id, "src"));
        props.put_opt("baseUrl", self.base_url);
        props.overlay(&self.mapped(id));
        ParsedElement::new("video").with_props(props)
    }

    fn youtube_embed(&mut self, id: NodeId) -> ParsedElement {
        self.flags.has_videos = true;
        let mut props = Props::new();
        props.put("src", self.attr(id, "src").unwrap_or_default());
        props.put_opt("width", self.attr(id, "width"));
        props.put_opt("height", self.attr(id, "height"));
        props.put_opt("title", self.attr(id, "title"));
        props.put_opt("className", self.attr(id, "class"));
        props.overlay(&self.mapped(id));
        ParsedElement::new("youtube-video").with_props(props)
    }

    fn code_block(&mut self, id: NodeId, path: &str, current: &str) -> ParsedElement {
        self.flags.has_code_blocks = true;

        if let Some(assistant) = self
            .doc
            .find_descendant(id, |doc, node| doc.tag(node) == Some("assistant"))
        {
            self.flags.has_assistant_elements = true;
            let mut props = self.assistant_props(assistant, path);
            props.put("inline", false);
            return ParsedElement::new("assistant-customizable").with_props(props);
        }

        let code_el = self
            .doc
            .find_descendant(id, |doc, node| doc.tag(node) == Some("code"));
        let code = self.doc.text_content(code_el.unwrap_or(id));
        if code.is_empty() {
            self.collector
                .add_warning(format!("Empty code block found at {current}"));
        }

        let language = self
            .language_of(id)
            .or_else(|| code_el.and_then(|code_el| self.language_of(code_el)));

        let mut props = Props::new();
        props.put("code", code.trim());
        props.put_opt("language", language);
        props.put("showCopy", true);
        props.put("inline", false);
        ParsedElement::new("code-block").with_props(props)
    }

    fn inline_code(&mut self, id: NodeId) -> ParsedElement {
        self.flags.has_code_blocks = true;
        let mut props = Props::new();
        props.put("code", self.doc.text_content(id).trim());
        props.put_opt("language", self.language_of(id));
        props.put("showCopy", true);
        props.put("inline", true);
        ParsedElement::new("code-block").with_props(props)
    }

    fn language_of(&self, id: NodeId) -> Option<String> {
        let class = self.doc.attr(id, "class")?;
        LANGUAGE_CLASS
            .captures(class)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_owned())
    }

    fn collapse_section(&mut self, id: NodeId, current: &str, depth: usize) -> ParsedElement {
        self.flags.has_expandable_tables = true;

        let trigger = self
            .doc
            .find_descendant(id, |doc, node| doc.has_class(node, "collapse-trigger"));
        let content = self
            .doc
            .find_descendant(id, |doc, node| doc.has_class(node, "collapse-content"));

        let toggle_text = trigger
            .map(|trigger| {
                let label = self
                    .doc
                    .find_descendant(trigger, |doc, node| {
                        doc.tag(node) == Some("span") && is_first_element_child(doc, node)
                    })
                    .unwrap_or(trigger);
                self.doc.text_content(label).trim().to_owned()
            })
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| "Toggle section".to_owned());

        let children = match content {
            Some(content) => self.walk_children(
                content,
                &format!("{current}.collapse-content"),
                "collapse content child",
                depth,
            ),
            None => Vec::new(),
        };

        let mut props = Props::new();
        props.put("defaultCollapsed", true);
        props.put("toggleText", toggle_text);
        props.put("isCollapseSection", true);
        ParsedElement::new("expandable-table")
            .with_props(props)
            .with_children(children)
    }

    fn badge(&mut self, id: NodeId, with_tooltip: bool) -> ParsedElement {
        let text = self
            .non_empty_attr(id, "text")
            .unwrap_or_else(|| self.doc.text_content(id).trim().to_owned());
        let mut props = Props::new();
        props.put("text", text);
        props.put(
            "color",
            self.non_empty_attr(id, "color")
                .unwrap_or_else(|| "blue".to_owned()),
        );
        props.put_opt("icon", self.non_empty_attr(id, "icon"));
        if with_tooltip {
            props.put_opt("tooltip", self.non_empty_attr(id, "tooltip"));
            ParsedElement::new("badge-tooltip").with_props(props)
        } else {
            ParsedElement::new("badge").with_props(props)
        }
    }

    fn assistant_props(&self, assistant: NodeId, path: &str) -> Props {
        let mut props = Props::new();
        props.put("defaultValue", self.doc.text_content(assistant).trim());
        props.put(
            "assistantId",
            self.non_empty_attr(assistant, "data-assistant-id")
                .unwrap_or_else(|| format!("assistant-{path}")),
        );
        props.put(
            "assistantType",
            self.non_empty_attr(assistant, "data-assistant-type")
                .unwrap_or_else(|| "query".to_owned()),
        );
        props
    }

    fn assistant(&mut self, id: NodeId, path: &str) -> ParsedElement {
        self.flags.has_assistant_elements = true;
        let mut props = self.assistant_props(id, path);
        let has_code = self
            .doc
            .find_descendant(id, |doc, node| matches!(doc.tag(node), Some("pre" | "code")))
            .is_some();
        let short = props
            .get("defaultValue")
            .and_then(|v| v.as_str())
            .is_some_and(|v| v.chars().count() < 100);
        props.put("inline", !has_code && short);
        ParsedElement::new("assistant-customizable").with_props(props)
    }

    fn interactive_section(&mut self, id: NodeId, current: &str, depth: usize) -> ParsedElement {
        self.flags.has_interactive_elements = true;
        let interactive_id = self.ctx.next_id(InteractiveKind::Section);

        let title = self
            .doc
            .find_descendant(id, |doc, node| {
                matches!(doc.tag(node), Some("h1" | "h2" | "h3" | "h4" | "h5" | "h6"))
            })
            .map(|heading| self.doc.text_content(heading).trim().to_owned())
            .unwrap_or_else(|| "Interactive Section".to_owned());

        let step_nodes = self.doc.find_descendants(id, |doc, node| {
            doc.tag(node) == Some("li")
                && doc.has_class(node, "interactive")
                && doc.attr(node, "data-targetaction").is_some()
        });
        let steps = self
            .walk_nodes(step_nodes, &format!("{current}.step"), "interactive step", depth)
            .into_iter()
            .filter(|child| matches!(child, Child::Element(_)))
            .collect();

        let mut props = Props::new();
        props.put("interactiveId", interactive_id);
        props.put("title", title);
        props.put("isSequence", true);
        props.put("skippable", self.flag_attr(id, "data-skippable"));
        props.put_opt("requirements", self.attr(id, "data-requirements"));
        props.put_opt("objectives", self.attr(id, "data-objectives"));
        props.put_opt("hints", self.attr(id, "data-hint"));
        props.overlay(&self.mapped(id));

        ParsedElement::new("interactive-section")
            .with_props(props)
            .with_children(steps)
    }

    /// Multistep and guided constructs: pull out the internal action spans,
    /// drop them from the tree, then walk what is left.
    fn multi_step(&mut self, id: NodeId, current: &str, depth: usize, guided: bool) -> ParsedElement {
        self.flags.has_interactive_elements = true;
        let (kind, noun, scope) = if guided {
            (InteractiveKind::Guided, "Guided", "guided")
        } else {
            (InteractiveKind::MultiStep, "Multi-step", "multistep")
        };
        let interactive_id = self.ctx.next_id(kind);

        let spans = self.doc.find_descendants(id, |doc, node| {
            doc.tag(node) == Some("span") && doc.has_class(node, "interactive")
        });
        let mut actions = Vec::new();
        for (index, span) in spans.into_iter().enumerate() {
            let location = format!("{current}.{scope}.action[{index}]");
            let target_action = self.non_empty_attr(span, "data-targetaction");
            let ref_target = self.non_empty_attr(span, "data-reftarget");

            if guided
                && let Some(action) = &target_action
                && !GUIDED_ACTIONS.contains(&action.as_str())
            {
                let snippet = self.doc.outer_html(span);
                self.collector.add_error(
                    ParseErrorKind::ElementCreation,
                    format!(
                        "Guided internal action {} has unsupported action type: {action}. Only 'hover', 'button', and 'highlight' are supported.",
                        index + 1
                    ),
                    Some(&snippet),
                    Some(&location),
                );
                continue;
            }

            let (Some(target_action), Some(ref_target)) = (target_action, ref_target) else {
                let snippet = self.doc.outer_html(span);
                self.collector.add_error(
                    ParseErrorKind::ElementCreation,
                    format!(
                        "{noun} internal action {} missing required attributes (data-targetaction and data-reftarget)",
                        index + 1
                    ),
                    Some(&snippet),
                    Some(&location),
                );
                continue;
            };

            actions.push(InternalAction {
                target_action,
                ref_target,
                target_value: self.non_empty_attr(span, "data-targetvalue"),
                requirements: self.non_empty_attr(span, "data-requirements"),
                target_comment: self.comment_html(span),
                is_skippable: guided.then(|| self.flag_attr(span, "data-skippable")),
            });
            self.doc.remove(span);
        }

        if actions.is_empty() {
            let snippet = self.doc.outer_html(id);
            self.collector.add_error(
                ParseErrorKind::ElementCreation,
                format!("{noun} element has no valid internal actions"),
                Some(&snippet),
                Some(current),
            );
        }

        let (child_scope, label) = if guided {
            ("interactive-guided", "interactive guided child")
        } else {
            ("interactive-multistep", "interactive multistep child")
        };
        let children = self.walk_children(id, &format!("{current}.{child_scope}"), label, depth);

        let mut props = Props::new();
        props.put("interactiveId", interactive_id);
        props.put("internalActions", actions);
        if guided {
            props.put("stepTimeout", self.step_timeout(id, current));
        }
        props.put("skippable", self.flag_attr(id, "data-skippable"));
        props.put("completeEarly", self.flag_attr(id, "data-complete-early"));
        props.put_opt("requirements", self.attr(id, "data-requirements"));
        props.put_opt("objectives", self.attr(id, "data-objectives"));
        props.put_opt("hints", self.attr(id, "data-hint"));
        props.overlay(&self.mapped(id));

        let kind = if guided {
            "interactive-guided"
        } else {
            "interactive-multi-step"
        };
        ParsedElement::new(kind)
            .with_props(props)
            .with_children(children)
    }

    fn step_timeout(&mut self, id: NodeId, current: &str) -> i64 {
        let Some(raw) = self.doc.non_empty_attr(id, "data-step-timeout") else {
            return DEFAULT_STEP_TIMEOUT_MS;
        };
        match raw.trim().parse::<i64>() {
            Ok(timeout) => timeout,
            Err(e) => {
                let message = format!("Invalid data-step-timeout value '{raw}'");
                let snippet = self.doc.outer_html(id);
                self.collector.add_error_with_cause(
                    ParseErrorKind::AttributeMapping,
                    message,
                    Some(&snippet),
                    Some(current),
                    &e,
                );
                DEFAULT_STEP_TIMEOUT_MS
            }
        }
    }

    /// Inner HTML of the first `span.interactive-comment` below `id`.
    fn comment_html(&self, id: NodeId) -> Option<String> {
        self.doc
            .find_descendant(id, |doc, node| {
                doc.tag(node) == Some("span") && doc.has_class(node, "interactive-comment")
            })
            .map(|span| self.doc.inner_html(span))
            .filter(|html| !html.is_empty())
    }

    fn step(&mut self, id: NodeId, current: &str, depth: usize) -> ParsedElement {
        self.flags.has_interactive_elements = true;
        let interactive_id = self.ctx.next_id(InteractiveKind::Step);

        let target_action = self.attr(id, "data-targetaction").unwrap_or_default();
        let ref_target = self.non_empty_attr(id, "data-reftarget");
        if ref_target.is_none() && target_action != "noop" {
            let snippet = self.doc.outer_html(id);
            self.collector.add_error(
                ParseErrorKind::ElementCreation,
                "Interactive element missing required 'data-reftarget' attribute",
                Some(&snippet),
                Some(current),
            );
        }

        let target_comment = self
            .comment_html(id)
            .or_else(|| self.non_empty_attr(id, "data-targetcomment"));
        let children = self.walk_children(
            id,
            &format!("{current}.interactive-step"),
            "interactive step child",
            depth,
        );

        let mut core = Props::new();
        core.put("interactiveId", interactive_id);
        core.put("targetAction", target_action);
        core.put_opt("refTarget", ref_target);
        core.put_opt("targetValue", self.attr(id, "data-targetvalue"));
        core.put_opt("targetComment", target_comment);
        core.put("doIt", self.doc.attr(id, "data-doit") != Some("false"));
        core.put("showMe", self.doc.attr(id, "data-showme") != Some("false"));
        core.put_opt("showMeText", self.non_empty_attr(id, "data-showme-text"));
        core.put("skippable", self.flag_attr(id, "data-skippable"));
        core.put("completeEarly", self.flag_attr(id, "data-complete-early"));
        core.put_opt("requirements", self.attr(id, "data-requirements"));
        core.put_opt("objectives", self.attr(id, "data-objectives"));
        core.put_opt("hints", self.attr(id, "data-hint"));
        core.put_opt("postVerify", self.non_empty_attr(id, "data-verify"));

        // Raw attributes win over derived props of the same name
        let mut props = self.mapped(id);
        props.underlay(&core);
        ParsedElement::new("interactive-step")
            .with_props(props)
            .with_children(children)
    }
}

fn is_first_element_child(doc: &Document, node: NodeId) -> bool {
    doc.parent(node)
        .and_then(|parent| doc.element_children(parent).next())
        == Some(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::PropValue;
    // facet_testhelpers::test unavailable offline; std #[test] is used instead

    const TRUSTED: &str = "https://grafana.com/docs/x/";

    fn parse_trusted(html: &str) -> ContentParseResult {
        let policy = TrustPolicy::default();
        let options = ParseOptions::new(&policy).with_base_url(TRUSTED);
        parse_html(html, &options, &mut ParseContext::new())
    }

    fn only_element(result: &ContentParseResult) -> &ParsedElement {
        let elements = result.elements();
        assert_eq!(elements.len(), 1, "expected one element, got {elements:#?}");
        &elements[0]
    }

    fn str_prop<'e>(element: &'e ParsedElement, key: &str) -> Option<&'e str> {
        element.prop(key).and_then(PropValue::as_str)
    }

    fn bool_prop(element: &ParsedElement, key: &str) -> Option<bool> {
        element.prop(key).and_then(PropValue::as_bool)
    }

    const STEP: &str =
        r#"<li class="interactive" data-targetaction="button" data-reftarget="Save">Click</li>"#;

    #[test]
    fn trusted_step_parses() {
        let result = parse_trusted(STEP);
        assert!(result.is_valid, "{:?}", result.errors);
        let step = only_element(&result);
        assert_eq!(step.kind, "interactive-step");
        assert_eq!(str_prop(step, "targetAction"), Some("button"));
        assert_eq!(str_prop(step, "refTarget"), Some("Save"));
        assert_eq!(str_prop(step, "interactiveId"), Some("step-1"));
        assert_eq!(bool_prop(step, "doIt"), Some(true));
        assert_eq!(bool_prop(step, "skippable"), Some(false));
        assert_eq!(step.children, vec![Child::Text("Click".to_owned())]);
        assert!(result.data.as_ref().is_some_and(|d| d.flags.has_interactive_elements));
        assert_eq!(step.original_html.as_deref(), Some(STEP));
    }

    #[test]
    fn untrusted_interactive_content_is_refused() {
        let policy = TrustPolicy::default();
        let options = ParseOptions::new(&policy).with_base_url("https://evil.example/");
        let result = parse_html(STEP, &options, &mut ParseContext::new());
        assert!(!result.is_valid);
        assert!(result.data.is_none());
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].kind, ParseErrorKind::HtmlSanitization);
        assert_eq!(result.errors[0].element.as_deref(), Some("Source: https://evil.example/"));
    }

    #[test]
    fn marker_case_does_not_slip_past_the_gate() {
        let policy = TrustPolicy::default();
        let options = ParseOptions::new(&policy).with_base_url("https://evil.example/");
        for html in [
            r#"<li class="interactive" DATA-TARGETACTION="button" data-reftarget="Save">Click</li>"#,
            r#"<li class="interactive" Data-TargetAction="button" data-reftarget="Save">Click</li>"#,
        ] {
            let result = parse_html(html, &options, &mut ParseContext::new());
            assert!(!result.is_valid, "{html} should be refused");
            assert!(result.data.is_none());
            assert_eq!(result.errors.len(), 1);
            assert_eq!(result.errors[0].kind, ParseErrorKind::HtmlSanitization);
        }
    }

    #[test]
    fn markers_introduced_by_the_sanitizer_are_refused() {
        struct AddsSteps;
        impl Sanitizer for AddsSteps {
            fn sanitize(&self, _html: &str) -> Result<String, crate::sanitize::SanitizeError> {
                Ok(STEP.to_owned())
            }
        }

        let policy = TrustPolicy::default();
        let options = ParseOptions::new(&policy)
            .with_base_url("https://evil.example/")
            .with_sanitizer(&AddsSteps);
        let result = parse_html("<p>plain</p>", &options, &mut ParseContext::new());
        assert!(!result.is_valid);
        assert_eq!(result.errors[0].message, "Interactive content from untrusted source rejected");
    }

    #[test]
    fn missing_base_url_is_untrusted_for_interactive_content() {
        let policy = TrustPolicy::default();
        let result = parse_html(STEP, &ParseOptions::new(&policy), &mut ParseContext::new());
        assert!(!result.is_valid);
        let plain = parse_html("<p>hello</p>", &ParseOptions::new(&policy), &mut ParseContext::new());
        assert!(plain.is_valid);
    }

    #[test]
    fn bypass_skips_the_gate_but_not_sanitization() {
        let policy = TrustPolicy::default();
        let options = ParseOptions::new(&policy)
            .with_base_url("https://evil.example/")
            .bypassing_trust_gate();
        let result = parse_html(
            &format!("{STEP}<script>alert(1)</script>"),
            &options,
            &mut ParseContext::new(),
        );
        assert!(result.is_valid);
        assert_eq!(only_element(&result).kind, "interactive-step");
    }

    #[test]
    fn empty_input_is_a_parse_error() {
        let result = parse_trusted("");
        assert!(!result.is_valid);
        assert_eq!(result.errors[0].kind, ParseErrorKind::HtmlParsing);
    }

    #[test]
    fn sandbox_stays_a_string_and_disabled_becomes_true() {
        let result = parse_trusted(r#"<iframe sandbox=""></iframe><input disabled="">"#);
        let elements = result.elements();
        assert_eq!(elements[0].kind, "iframe");
        assert_eq!(str_prop(&elements[0], "sandbox"), Some(""));
        assert_eq!(elements[1].kind, "input");
        assert_eq!(bool_prop(&elements[1], "disabled"), Some(true));
    }

    #[test]
    fn attributes_are_mapped() {
        let result = parse_trusted(
            r#"<table><tbody><tr><td class="cell" colspan="2" style="x" data-foo="Bar" aria-hidden="true">x</td></tr></tbody></table>"#,
        );
        let td = only_element(&result)
            .child_elements()
            .next()
            .and_then(|tbody| tbody.child_elements().next())
            .and_then(|tr| tr.child_elements().next())
            .expect("td");
        assert_eq!(str_prop(td, "className"), Some("cell"));
        assert_eq!(str_prop(td, "colSpan"), Some("2"));
        assert_eq!(str_prop(td, "data-foo"), Some("Bar"));
        assert_eq!(str_prop(td, "aria-hidden"), Some("true"));
        assert!(td.prop("style").is_none());
    }

    #[test]
    fn noop_steps_need_no_target() {
        let result = parse_trusted(
            r#"<li class="interactive" data-targetaction="noop">Read this</li><li class="interactive" data-targetaction="highlight">Oops</li>"#,
        );
        assert_eq!(result.elements().len(), 2);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].kind, ParseErrorKind::ElementCreation);
        assert_eq!(result.errors[0].location.as_deref(), Some("root[1].li"));
    }

    #[test]
    fn multistep_actions_are_extracted_and_removed() {
        let result = parse_trusted(concat!(
            r#"<li class="interactive" data-targetaction="multistep">"#,
            r#"<span class="interactive" data-targetaction="button" data-reftarget="New" data-requirements="navmenu-open"></span>"#,
            r#"<span class="interactive" data-targetaction="formfill" data-reftarget="input[name=q]" data-targetvalue="up">"#,
            r#"<span class="interactive-comment">Type <b>up</b></span></span>"#,
            "Create it</li>"
        ));
        assert!(result.is_valid, "{:?}", result.errors);
        let multi = only_element(&result);
        assert_eq!(multi.kind, "interactive-multi-step");
        let actions = multi
            .prop("internalActions")
            .and_then(PropValue::as_actions)
            .expect("actions");
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].requirements.as_deref(), Some("navmenu-open"));
        assert_eq!(actions[1].target_value.as_deref(), Some("up"));
        assert_eq!(actions[1].target_comment.as_deref(), Some("Type <b>up</b>"));
        assert_eq!(actions[1].is_skippable, None);
        assert_eq!(multi.children, vec![Child::Text("Create it".to_owned())]);
        assert!(!multi.original_html.as_deref().unwrap_or_default().contains("span"));
    }

    #[test]
    fn multistep_without_actions_is_an_error() {
        let result = parse_trusted(
            r#"<li class="interactive" data-targetaction="multistep"><span class="interactive" data-targetaction="button"></span>x</li>"#,
        );
        assert!(!result.is_valid);
        let messages: Vec<_> = result.errors.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "Multi-step internal action 1 missing required attributes (data-targetaction and data-reftarget)",
                "Multi-step element has no valid internal actions",
                // The span that failed extraction stays and is walked as a step
                "Interactive element missing required 'data-reftarget' attribute",
            ]
        );
        assert_eq!(result.elements().len(), 1);
    }

    #[test]
    fn guided_restricts_action_types() {
        let result = parse_trusted(concat!(
            r#"<div class="interactive" data-targetaction="guided" data-step-timeout="5000">"#,
            r#"<span class="interactive" data-targetaction="hover" data-reftarget="a" data-skippable="true"></span>"#,
            r#"<span class="interactive" data-targetaction="formfill" data-reftarget="b"></span>"#,
            "</div>"
        ));
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].message.contains("unsupported action type: formfill"));
        let guided = only_element(&result);
        assert_eq!(guided.kind, "interactive-guided");
        assert_eq!(guided.prop("stepTimeout").and_then(PropValue::as_int), Some(5000));
        let actions = guided
            .prop("internalActions")
            .and_then(PropValue::as_actions)
            .expect("actions");
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].is_skippable, Some(true));
        // The rejected span stays in the tree and is walked as a step
        assert_eq!(guided.child_elements().next().map(|e| e.kind.as_str()), Some("interactive-step"));
    }

    #[test]
    fn bad_step_timeout_is_an_attribute_error() {
        let result = parse_trusted(concat!(
            r#"<div class="interactive" data-targetaction="guided" data-step-timeout="soon">"#,
            r#"<span class="interactive" data-targetaction="button" data-reftarget="a"></span></div>"#
        ));
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].kind, ParseErrorKind::AttributeMapping);
        assert_eq!(
            only_element(&result).prop("stepTimeout").and_then(PropValue::as_int),
            Some(DEFAULT_STEP_TIMEOUT_MS)
        );
    }

    #[test]
    fn sections_collect_their_steps() {
        let result = parse_trusted(concat!(
            r#"<span class="interactive" data-targetaction="sequence" data-requirements="is-admin">"#,
            "<h3> Set up </h3><p>intro</p><ul>",
            r#"<li class="interactive" data-targetaction="button" data-reftarget="A">A</li>"#,
            r#"<li class="interactive" data-targetaction="highlight" data-reftarget="B">B</li>"#,
            "</ul></span>"
        ));
        assert!(result.is_valid, "{:?}", result.errors);
        let section = only_element(&result);
        assert_eq!(section.kind, "interactive-section");
        assert_eq!(str_prop(section, "title"), Some("Set up"));
        assert_eq!(str_prop(section, "requirements"), Some("is-admin"));
        assert_eq!(str_prop(section, "interactiveId"), Some("section-1"));
        let ids: Vec<_> = section
            .child_elements()
            .map(|step| str_prop(step, "interactiveId").unwrap_or_default().to_owned())
            .collect();
        assert_eq!(ids, vec!["step-2", "step-3"]);
    }

    #[test]
    fn code_blocks() {
        let result = parse_trusted(
            r#"<pre class="language-bash"><code>  echo hi
</code></pre><p>Run <code>ls</code></p><pre></pre>"#,
        );
        let elements = result.elements();
        assert_eq!(elements[0].kind, "code-block");
        assert_eq!(str_prop(&elements[0], "code"), Some("echo hi"));
        assert_eq!(str_prop(&elements[0], "language"), Some("bash"));
        assert_eq!(bool_prop(&elements[0], "inline"), Some(false));
        let inline = elements[1].child_elements().next().expect("inline code");
        assert_eq!(inline.kind, "code-block");
        assert_eq!(bool_prop(inline, "inline"), Some(true));
        assert!(inline.prop("language").is_none());
        assert_eq!(result.warnings, vec!["Empty code block found at root[2].pre".to_owned()]);
    }

    #[test]
    fn assistant_placeholders() {
        let result = parse_trusted(
            r#"<pre><assistant data-assistant-id="q1">rate(x[5m])</assistant></pre><p><assistant>short</assistant></p>"#,
        );
        let elements = result.elements();
        assert_eq!(elements[0].kind, "assistant-customizable");
        assert_eq!(str_prop(&elements[0], "assistantId"), Some("q1"));
        assert_eq!(str_prop(&elements[0], "assistantType"), Some("query"));
        assert_eq!(bool_prop(&elements[0], "inline"), Some(false));
        let inline = elements[1].child_elements().next().expect("assistant");
        assert_eq!(str_prop(inline, "assistantId"), Some("assistant-root[1].p[0]"));
        assert_eq!(bool_prop(inline, "inline"), Some(true));
        assert!(result.data.as_ref().is_some_and(|d| d.flags.has_assistant_elements));
    }

    #[test]
    fn collapse_sections_walk_their_content() {
        let result = parse_trusted(concat!(
            r#"<div class="collapse"><div class="collapse-trigger"><span>More</span><span>+</span></div>"#,
            r#"<div class="collapse-content"><p>Hidden</p></div></div>"#
        ));
        let collapse = only_element(&result);
        assert_eq!(collapse.kind, "expandable-table");
        assert_eq!(str_prop(collapse, "toggleText"), Some("More"));
        assert_eq!(bool_prop(collapse, "defaultCollapsed"), Some(true));
        assert_eq!(collapse.child_elements().next().map(|p| p.kind.as_str()), Some("p"));
    }

    #[test]
    fn media_elements() {
        let result = parse_trusted(concat!(
            r#"<img src="/media/a.png" alt="">"#,
            r#"<iframe src="https://www.youtube.com/embed/abc" width="560"></iframe>"#,
            r#"<iframe src="https://evil.example/x"></iframe>"#
        ));
        let elements = result.elements();
        assert_eq!(elements[0].kind, "image-renderer");
        assert_eq!(bool_prop(&elements[0], "alt"), Some(true));
        assert_eq!(str_prop(&elements[0], "baseUrl"), Some(TRUSTED));
        assert_eq!(elements[1].kind, "youtube-video");
        assert_eq!(
            str_prop(&elements[1], "src"),
            Some("https://www.youtube.com/embed/abc?enablejsapi=1")
        );
        assert_eq!(elements[2].kind, "iframe");
        assert_eq!(str_prop(&elements[2], "sandbox"), Some(""));
        assert_eq!(str_prop(&elements[2], "referrerpolicy"), Some("no-referrer"));
        let flags = result.data.as_ref().map(|d| d.flags).unwrap_or_default();
        assert!(flags.has_images && flags.has_videos);
    }

    #[test]
    fn badges() {
        let result = parse_trusted(
            r#"<badge text="Beta"></badge><badge-tooltip color="red" tooltip="Soon">New</badge-tooltip>"#,
        );
        let elements = result.elements();
        assert_eq!(str_prop(&elements[0], "text"), Some("Beta"));
        assert_eq!(str_prop(&elements[0], "color"), Some("blue"));
        assert_eq!(str_prop(&elements[1], "text"), Some("New"));
        assert_eq!(str_prop(&elements[1], "tooltip"), Some("Soon"));
    }

    #[test]
    fn deep_nesting_is_contained() {
        let depth = MAX_DEPTH + 10;
        let html = format!("{}x{}", "<span>".repeat(depth), "</span>".repeat(depth));
        let result = parse_trusted(&html);
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].kind, ParseErrorKind::ChildrenProcessing);
        // The outer levels are still delivered
        assert_eq!(result.elements().len(), 1);
    }

    #[test]
    fn skipped_tags_warn() {
        let policy = TrustPolicy::default();
        struct Passthrough;
        impl Sanitizer for Passthrough {
            fn sanitize(&self, html: &str) -> Result<String, crate::sanitize::SanitizeError> {
                Ok(html.to_owned())
            }
        }
        let options = ParseOptions::new(&policy).with_sanitizer(&Passthrough);
        let result = parse_html(
            r#"<link rel="stylesheet" href="x.css"><p>x</p>"#,
            &options,
            &mut ParseContext::new(),
        );
        assert_eq!(result.elements().len(), 1);
        assert_eq!(
            result.warnings,
            vec!["Skipping link element (not suitable for content rendering)".to_owned()]
        );
    }

    #[test]
    fn sanitizer_failure_is_fatal() {
        let policy = TrustPolicy::default();
        struct Refuse;
        impl Sanitizer for Refuse {
            fn sanitize(&self, _html: &str) -> Result<String, crate::sanitize::SanitizeError> {
                Err(crate::sanitize::SanitizeError::Unparseable)
            }
        }
        let options = ParseOptions::new(&policy).with_sanitizer(&Refuse);
        let result = parse_html("<p>x</p>", &options, &mut ParseContext::new());
        assert!(result.data.is_none());
        assert_eq!(result.errors[0].kind, ParseErrorKind::HtmlSanitization);
        assert_eq!(
            result.errors[0].location.as_deref(),
            Some("sanitizeDocumentationHTML")
        );
    }
}
