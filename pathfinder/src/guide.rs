//! The JSON guide wire format.
//!
//! Unknown fields are ignored so older parsers keep working as the schema
//! grows. Section bodies stay loosely typed ([`serde_json::Value`]) so that
//! a nested block of an unknown type degrades to a warning instead of
//! failing the whole section.

use serde::{Deserialize, Serialize};

/// Every block `type` this parser understands.
pub const BLOCK_TYPES: &[&str] = &[
    "markdown",
    "html",
    "section",
    "interactive",
    "multistep",
    "guided",
    "image",
    "video",
    "quiz",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonGuide {
    pub id: String,
    pub title: String,
    pub blocks: Vec<Block>,
    /// Recommendation metadata, not rendered
    #[serde(rename = "match", default, skip_serializing_if = "Option::is_none")]
    pub match_metadata: Option<GuideMatch>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuideMatch {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub url_prefix: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Block {
    Markdown { content: String },
    Html { content: String },
    Section(SectionBlock),
    Interactive(InteractiveBlock),
    Multistep(MultistepBlock),
    Guided(GuidedBlock),
    Image(ImageBlock),
    Video(VideoBlock),
    Quiz(QuizBlock),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionBlock {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub blocks: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objectives: Option<Vec<String>>,
}

/// Actions a JSON step may perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonAction {
    Highlight,
    Button,
    Formfill,
    Navigate,
    Hover,
}

impl JsonAction {
    pub fn as_str(self) -> &'static str {
        match self {
            JsonAction::Highlight => "highlight",
            JsonAction::Button => "button",
            JsonAction::Formfill => "formfill",
            JsonAction::Navigate => "navigate",
            JsonAction::Hover => "hover",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractiveBlock {
    pub action: JsonAction,
    pub reftarget: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub targetvalue: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objectives: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skippable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_me: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub do_it: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complete_early: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify: Option<String>,
}

/// One sub-action of a multistep or guided block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonStep {
    pub action: JsonAction,
    pub reftarget: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub targetvalue: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skippable: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultistepBlock {
    #[serde(default)]
    pub content: String,
    pub steps: Vec<JsonStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objectives: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skippable: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuidedBlock {
    #[serde(default)]
    pub content: String,
    pub steps: Vec<JsonStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_timeout: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objectives: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skippable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complete_early: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageBlock {
    pub src: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoProvider {
    Youtube,
    Native,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoBlock {
    pub src: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<VideoProvider>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompletionMode {
    #[default]
    CorrectOnly,
    MaxAttempts,
}

impl CompletionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            CompletionMode::CorrectOnly => "correct-only",
            CompletionMode::MaxAttempts => "max-attempts",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonQuizChoice {
    pub id: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizBlock {
    pub question: String,
    pub choices: Vec<JsonQuizChoice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multi_select: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_mode: Option<CompletionMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skippable: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    // facet_testhelpers::test unavailable offline; std #[test] is used instead

    #[test]
    fn decodes_tagged_blocks() {
        let guide: JsonGuide = serde_json::from_str(
            r#"{
                "id": "g", "title": "G",
                "match": {"urlPrefix": ["/explore"]},
                "blocks": [
                    {"type": "markdown", "content": "hi"},
                    {"type": "interactive", "action": "button", "reftarget": "Save", "content": "", "showMe": false, "future": 1},
                    {"type": "quiz", "question": "?", "choices": [], "completionMode": "max-attempts"}
                ]
            }"#,
        )
        .expect("guide decodes");
        assert_eq!(guide.blocks.len(), 3);
        let Block::Interactive(step) = &guide.blocks[1] else {
            panic!("expected interactive block");
        };
        assert_eq!(step.action, JsonAction::Button);
        assert_eq!(step.show_me, Some(false));
        let Block::Quiz(quiz) = &guide.blocks[2] else {
            panic!("expected quiz block");
        };
        assert_eq!(quiz.completion_mode, Some(CompletionMode::MaxAttempts));
        assert_eq!(
            guide.match_metadata.map(|m| m.url_prefix),
            Some(vec!["/explore".to_owned()])
        );
    }

    #[test]
    fn html_block_serializes_with_its_tag() {
        let block = Block::Html {
            content: "<p>x</p>".to_owned(),
        };
        assert_eq!(
            serde_json::to_string(&block).expect("serializes"),
            r#"{"type":"html","content":"<p>x</p>"}"#
        );
    }

    #[test]
    fn unsupported_step_actions_are_rejected() {
        let result = serde_json::from_str::<JsonStep>(r#"{"action": "noop", "reftarget": "x"}"#);
        assert!(result.is_err());
    }
}
