//! Parse diagnostics.
//!
//! Parsers never bail out on the first problem. Every error and warning is
//! collected and handed back with whatever elements were produced.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::element::ParsedContent;

/// Longest element snippet kept on an error.
const MAX_SNIPPET_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseErrorKind {
    HtmlParsing,
    HtmlSanitization,
    ElementCreation,
    AttributeMapping,
    ChildrenProcessing,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ParseErrorKind::HtmlParsing => "html_parsing",
            ParseErrorKind::HtmlSanitization => "html_sanitization",
            ParseErrorKind::ElementCreation => "element_creation",
            ParseErrorKind::AttributeMapping => "attribute_mapping",
            ParseErrorKind::ChildrenProcessing => "children_processing",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{kind}: {message}")]
#[serde(rename_all = "camelCase")]
pub struct ParseError {
    #[serde(rename = "type")]
    pub kind: ParseErrorKind,
    pub message: String,
    /// Offending markup, truncated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(rename = "originalError", skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

/// Result of either parser.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentParseResult {
    /// No errors were recorded; warnings do not count
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ParsedContent>,
    pub errors: Vec<ParseError>,
    pub warnings: Vec<String>,
}

impl ContentParseResult {
    pub fn elements(&self) -> &[crate::element::ParsedElement] {
        self.data
            .as_ref()
            .map(|data| data.elements.as_slice())
            .unwrap_or_default()
    }
}

#[derive(Debug, Default)]
pub struct ErrorCollector {
    errors: Vec<ParseError>,
    warnings: Vec<String>,
}

impl ErrorCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(
        &mut self,
        kind: ParseErrorKind,
        message: impl Into<String>,
        element: Option<&str>,
        location: Option<&str>,
    ) {
        let message = message.into();
        debug!(kind = %kind, location, "{}", message);
        self.errors.push(ParseError {
            kind,
            message,
            element: element.map(truncate_snippet),
            location: location.map(str::to_owned),
            cause: None,
        });
    }

    pub fn add_error_with_cause(
        &mut self,
        kind: ParseErrorKind,
        message: impl Into<String>,
        element: Option<&str>,
        location: Option<&str>,
        cause: &dyn std::error::Error,
    ) {
        self.add_error(kind, message, element, location);
        if let Some(last) = self.errors.last_mut() {
            last.cause = Some(cause.to_string());
        }
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Take over the diagnostics of a nested parse.
    pub fn absorb(&mut self, errors: Vec<ParseError>, warnings: Vec<String>) {
        self.errors.extend(errors);
        self.warnings.extend(warnings);
    }

    /// Close out a parse.
    ///
    /// A parse that recorded errors and produced no elements carries no data:
    /// an empty render must never pass for a successful one.
    pub fn finish(self, data: ParsedContent) -> ContentParseResult {
        let has_errors = self.has_errors();
        let data = if has_errors && data.elements.is_empty() {
            None
        } else {
            Some(data)
        };
        ContentParseResult {
            is_valid: !has_errors,
            data,
            errors: self.errors,
            warnings: self.warnings,
        }
    }

    /// Close out a parse that could not get as far as producing content.
    pub fn fail(self) -> ContentParseResult {
        ContentParseResult {
            is_valid: !self.has_errors(),
            data: None,
            errors: self.errors,
            warnings: self.warnings,
        }
    }
}

fn truncate_snippet(element: &str) -> String {
    match element.char_indices().nth(MAX_SNIPPET_CHARS) {
        Some((cut, _)) => element[..cut].to_owned(),
        None => element.to_owned(),
    }
}
