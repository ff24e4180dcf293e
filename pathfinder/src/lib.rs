//! Trusted documentation content pipeline.
//!
//! pathfinder turns documentation pages and JSON guides into a tree of
//! [`ParsedElement`]s that a UI can render without ever touching raw markup:
//! - **Trust policy**: which origins may serve content, and which may serve
//!   interactive directives
//! - **Sanitizing HTML parser**: html5ever-backed, with interactive step
//!   extraction and error collection instead of bail-out
//! - **JSON guide parser**: typed blocks, converted through the same element
//!   model (html blocks go through the HTML parser)
//! - **Normalization**: every fetched body becomes a JSON guide first
//!
//! # Example
//!
//! ```rust
//! use pathfinder::{ParseContext, ParseOptions, TrustPolicy, parse_json_guide};
//!
//! let policy = TrustPolicy::default();
//! let options = ParseOptions::new(&policy).with_base_url("https://grafana.com/docs/x/");
//! let mut ctx = ParseContext::new();
//!
//! let result = parse_json_guide(
//!     r#"{"id": "intro", "title": "Intro", "blocks": [{"type": "markdown", "content": "Hi"}]}"#,
//!     &options,
//!     &mut ctx,
//! );
//! assert!(result.is_valid);
//! assert_eq!(result.elements()[0].kind, "p");
//! ```

#[macro_use]
mod tracing_macros;

pub mod arena_dom;
pub mod context;
pub mod element;
pub mod errors;
pub mod guide;
pub mod html_parser;
pub mod json_parser;
pub mod markdown;
pub mod metadata;
pub mod normalize;
pub mod proxy;
pub mod sanitize;
pub mod trust;

// Parsers
pub use html_parser::{ParseOptions, parse_html};
pub use json_parser::{parse_guide_value, parse_json_guide};
pub use normalize::{Normalized, NormalizedGuide, RawBody, normalize};

// Element model and diagnostics
pub use context::ParseContext;
pub use element::{Child, ContentFlags, ParsedContent, ParsedElement, PropValue, Props};
pub use errors::{ContentParseResult, ParseError, ParseErrorKind};

// Trust
pub use proxy::ProxyRoute;
pub use sanitize::{DocumentationSanitizer, Sanitizer};
pub use trust::TrustPolicy;
