//! The element tree both parsers produce.

use indexmap::IndexMap;
use serde::Serialize;

/// Element props, in insertion order.
pub type Props = IndexMap<String, PropValue>;

/// A prop value. Absent props are simply not in the map.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropValue {
    Bool(bool),
    Int(i64),
    Str(String),
    Actions(Vec<InternalAction>),
    Choices(Vec<QuizChoice>),
}

impl PropValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_actions(&self) -> Option<&[InternalAction]> {
        match self {
            PropValue::Actions(actions) => Some(actions),
            _ => None,
        }
    }

    pub fn as_choices(&self) -> Option<&[QuizChoice]> {
        match self {
            PropValue::Choices(choices) => Some(choices),
            _ => None,
        }
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Bool(value)
    }
}

impl From<i64> for PropValue {
    fn from(value: i64) -> Self {
        PropValue::Int(value)
    }
}

impl From<u32> for PropValue {
    fn from(value: u32) -> Self {
        PropValue::Int(i64::from(value))
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        PropValue::Str(value)
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::Str(value.to_owned())
    }
}

impl From<Vec<InternalAction>> for PropValue {
    fn from(value: Vec<InternalAction>) -> Self {
        PropValue::Actions(value)
    }
}

impl From<Vec<QuizChoice>> for PropValue {
    fn from(value: Vec<QuizChoice>) -> Self {
        PropValue::Choices(value)
    }
}

/// Prop map helpers used while building elements.
pub(crate) trait PropsExt {
    fn put(&mut self, key: &str, value: impl Into<PropValue>);
    fn put_opt<V: Into<PropValue>>(&mut self, key: &str, value: Option<V>);
    /// Insert every entry of `other`, replacing values that are already set.
    fn overlay(&mut self, other: &Props);
    /// Insert entries of `other` whose keys are not set yet.
    fn underlay(&mut self, other: &Props);
}

impl PropsExt for Props {
    fn put(&mut self, key: &str, value: impl Into<PropValue>) {
        self.insert(key.to_owned(), value.into());
    }

    fn put_opt<V: Into<PropValue>>(&mut self, key: &str, value: Option<V>) {
        if let Some(value) = value {
            self.put(key, value);
        }
    }

    fn overlay(&mut self, other: &Props) {
        for (key, value) in other {
            self.insert(key.clone(), value.clone());
        }
    }

    fn underlay(&mut self, other: &Props) {
        for (key, value) in other {
            self.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }
}

/// One sub-action of a multistep or guided construct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalAction {
    pub target_action: String,
    pub ref_target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requirements: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_skippable: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizChoice {
    pub id: String,
    pub text: String,
    pub text_elements: Vec<Child>,
    pub correct: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

/// A child is either an element or a run of text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Child {
    Element(ParsedElement),
    Text(String),
}

impl Child {
    pub fn as_element(&self) -> Option<&ParsedElement> {
        match self {
            Child::Element(element) => Some(element),
            Child::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Child::Text(text) => Some(text),
            Child::Element(_) => None,
        }
    }
}

impl From<ParsedElement> for Child {
    fn from(element: ParsedElement) -> Self {
        Child::Element(element)
    }
}

impl From<String> for Child {
    fn from(text: String) -> Self {
        Child::Text(text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedElement {
    /// Element vocabulary: an HTML tag name or a renderer component name
    #[serde(rename = "type")]
    pub kind: String,
    pub props: Props,
    pub children: Vec<Child>,
    #[serde(rename = "originalHTML", skip_serializing_if = "Option::is_none")]
    pub original_html: Option<String>,
}

impl ParsedElement {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            props: Props::new(),
            children: Vec::new(),
            original_html: None,
        }
    }

    pub fn with_props(mut self, props: Props) -> Self {
        self.props = props;
        self
    }

    pub fn with_children(mut self, children: Vec<Child>) -> Self {
        self.children = children;
        self
    }

    pub fn with_original_html(mut self, html: String) -> Self {
        self.original_html = Some(html);
        self
    }

    pub fn prop(&self, key: &str) -> Option<&PropValue> {
        self.props.get(key)
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &ParsedElement> {
        self.children.iter().filter_map(Child::as_element)
    }
}

/// What kinds of content a parse produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentFlags {
    pub has_interactive_elements: bool,
    pub has_code_blocks: bool,
    pub has_expandable_tables: bool,
    pub has_images: bool,
    pub has_videos: bool,
    pub has_assistant_elements: bool,
}

impl ContentFlags {
    pub fn merge(&mut self, other: ContentFlags) {
        self.has_interactive_elements |= other.has_interactive_elements;
        self.has_code_blocks |= other.has_code_blocks;
        self.has_expandable_tables |= other.has_expandable_tables;
        self.has_images |= other.has_images;
        self.has_videos |= other.has_videos;
        self.has_assistant_elements |= other.has_assistant_elements;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParsedContent {
    pub elements: Vec<ParsedElement>,
    #[serde(flatten)]
    pub flags: ContentFlags,
}
