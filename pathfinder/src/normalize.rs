//! Everything fetched becomes a JSON guide before anyone parses it.

use serde_json::{Value, json};

/// A fetched body and the format it arrived in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawBody {
    NativeJson(String),
    Html(String),
}

impl RawBody {
    pub fn as_str(&self) -> &str {
        match self {
            RawBody::NativeJson(body) | RawBody::Html(body) => body,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.as_str().is_empty()
    }
}

/// A JSON guide string, and how it came to be one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedGuide {
    /// The source was already a guide; the text is passed through untouched
    NativeJson(String),
    /// HTML wrapped in a single-`html`-block guide
    WrappedHtml(String),
}

impl NormalizedGuide {
    pub fn as_str(&self) -> &str {
        match self {
            NormalizedGuide::NativeJson(json) | NormalizedGuide::WrappedHtml(json) => json,
        }
    }

    pub fn into_string(self) -> String {
        match self {
            NormalizedGuide::NativeJson(json) | NormalizedGuide::WrappedHtml(json) => json,
        }
    }

    pub fn is_native_json(&self) -> bool {
        matches!(self, NormalizedGuide::NativeJson(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub guide: NormalizedGuide,
    /// Set when native JSON had to be wrapped as HTML after all
    pub warning: Option<String>,
}

const DEFAULT_TITLE: &str = "External Content";
const URL_ID_CHARS: usize = 50;

/// Turn a fetched body into a JSON guide string.
pub fn normalize(body: RawBody, source_url: &str, title: &str) -> Normalized {
    match body {
        RawBody::NativeJson(text) => {
            let warning = match serde_json::from_str::<Value>(&text) {
                Ok(value) if has_guide_shape(&value) => {
                    return Normalized {
                        guide: NormalizedGuide::NativeJson(text),
                        warning: None,
                    };
                }
                Ok(_) => "JSON content does not match guide structure, wrapping as HTML",
                Err(_) => "Failed to parse native JSON, treating as HTML",
            };
            warn!(source_url, "{}", warning);
            Normalized {
                guide: NormalizedGuide::WrappedHtml(wrap_html_as_guide(&text, source_url, title)),
                warning: Some(warning.to_owned()),
            }
        }
        RawBody::Html(text) => {
            let guide = if is_json_guide(&text) {
                debug!(source_url, "HTML response is already a JSON guide");
                NormalizedGuide::NativeJson(text)
            } else {
                NormalizedGuide::WrappedHtml(wrap_html_as_guide(&text, source_url, title))
            };
            Normalized {
                guide,
                warning: None,
            }
        }
    }
}

/// Does `text` look like a JSON guide (`id`, `title`, `blocks`)?
pub fn is_json_guide(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.starts_with('{')
        && serde_json::from_str::<Value>(trimmed).is_ok_and(|value| has_guide_shape(&value))
}

fn has_guide_shape(value: &Value) -> bool {
    let non_empty = |key: &str| {
        value
            .get(key)
            .and_then(Value::as_str)
            .is_some_and(|s| !s.is_empty())
    };
    non_empty("id") && non_empty("title") && value.get("blocks").is_some_and(Value::is_array)
}

/// Wrap markup as `{id, title, blocks: [{type: "html", content}]}`.
pub fn wrap_html_as_guide(content: &str, source_url: &str, title: &str) -> String {
    let title = if title.is_empty() { DEFAULT_TITLE } else { title };
    json!({
        "id": format!("external-{}", generate_url_id(source_url)),
        "title": title,
        "blocks": [{"type": "html", "content": content}],
    })
    .to_string()
}

/// A short id derived from a URL: scheme dropped, anything but ASCII
/// alphanumerics turned into `-`, at most 50 characters.
pub fn generate_url_id(url: &str) -> String {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    rest.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .take(URL_ID_CHARS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    // facet_testhelpers::test unavailable offline; std #[test] is used instead

    const GUIDE: &str = r#"{"id":"g","title":"G","blocks":[]}"#;

    #[test]
    fn native_guides_pass_through_verbatim() {
        let text = format!("  {GUIDE}\n");
        let normalized = normalize(RawBody::NativeJson(text.clone()), "https://x/content.json", "T");
        assert_eq!(normalized.guide, NormalizedGuide::NativeJson(text));
        assert!(normalized.warning.is_none());
    }

    #[test]
    fn malformed_native_json_is_wrapped_with_a_warning() {
        let normalized = normalize(
            RawBody::NativeJson(r#"{"id":"g"}"#.to_owned()),
            "https://grafana.com/docs/x/content.json",
            "",
        );
        assert!(!normalized.guide.is_native_json());
        assert!(normalized.warning.is_some());
        let value: Value = serde_json::from_str(normalized.guide.as_str()).expect("valid JSON");
        assert_eq!(value["title"], "External Content");
        assert_eq!(value["blocks"][0]["content"], r#"{"id":"g"}"#);

        let broken = normalize(RawBody::NativeJson("{oops".to_owned()), "u", "T");
        assert_eq!(
            broken.warning.as_deref(),
            Some("Failed to parse native JSON, treating as HTML")
        );
    }

    #[test]
    fn html_is_wrapped() {
        let normalized = normalize(
            RawBody::Html("<p>Hi</p>".to_owned()),
            "https://grafana.com/docs/grafana/latest/",
            "Grafana",
        );
        assert_eq!(
            normalized.guide,
            NormalizedGuide::WrappedHtml(
                r#"{"id":"external-grafana-com-docs-grafana-latest-","title":"Grafana","blocks":[{"type":"html","content":"<p>Hi</p>"}]}"#
                    .to_owned()
            )
        );
        assert!(is_json_guide(normalized.guide.as_str()));
    }

    #[test]
    fn html_that_is_already_a_guide_passes_through() {
        let normalized = normalize(RawBody::Html(GUIDE.to_owned()), "u", "T");
        assert_eq!(normalized.guide, NormalizedGuide::NativeJson(GUIDE.to_owned()));
    }

    #[test]
    fn url_ids_are_bounded() {
        assert_eq!(generate_url_id("http://a.b/c?d=e"), "a-b-c-d-e");
        assert_eq!(generate_url_id(&format!("https://{}", "x".repeat(80))).len(), 50);
    }

    #[test]
    fn guide_detection() {
        assert!(is_json_guide(GUIDE));
        assert!(!is_json_guide(r#"{"id":"","title":"G","blocks":[]}"#));
        assert!(!is_json_guide(r#"[{"id":"g"}]"#));
        assert!(!is_json_guide("<html></html>"));
    }
}
