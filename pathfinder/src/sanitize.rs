//! HTML sanitization for documentation content.
//!
//! [`DocumentationSanitizer`] runs over the same arena DOM the content walker
//! uses. Tags outside the allowlist are unwrapped so their text survives,
//! except raw-text and script-like containers which go with their content.
//! Attributes outside the allowlist are dropped, as is any URI-bearing value
//! with a scheme that can execute or smuggle content.

use std::sync::LazyLock;

use indextree::NodeId;
use regex::Regex;
use thiserror::Error;

use crate::arena_dom::{Document, ElementData, NodeKind, parse_fragment};
use crate::trust::{is_vimeo_url, is_youtube_url};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SanitizeError {
    #[error("Invalid HTML input: must be a non-empty string")]
    EmptyInput,
    #[error("markup could not be parsed into a fragment")]
    Unparseable,
}

/// Turns untrusted markup into markup that is safe to walk and render.
pub trait Sanitizer {
    fn sanitize(&self, html: &str) -> Result<String, SanitizeError>;
}

/// The sanitizer used for documentation pages and guide `html` blocks.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentationSanitizer;

const ALLOWED_TAGS: &[&str] = &[
    // Structure and text
    "div", "span", "p", "br", "hr", "h1", "h2", "h3", "h4", "h5", "h6",
    "strong", "em", "b", "i", "u", "s", "mark", "small", "sub", "sup",
    "code", "kbd", "samp", "var", "abbr", "cite", "del", "ins",
    "a", "nav", "ul", "ol", "li", "dl", "dt", "dd",
    "table", "thead", "tbody", "tfoot", "tr", "th", "td", "caption", "colgroup", "col",
    "img", "video", "audio", "source", "iframe", "pre",
    "article", "section", "header", "footer", "aside", "main",
    "details", "summary", "blockquote", "figure", "figcaption",
    // Forms used by interactive steps
    "form", "input", "textarea", "select", "option", "optgroup", "button", "label",
    "fieldset", "legend",
    // Inline icons
    "svg", "path", "circle", "rect", "line", "ellipse", "polygon", "polyline", "g", "defs",
    "use", "text",
    // Documentation custom elements
    "badge", "badge-tooltip", "assistant",
];

/// Disallowed elements whose content must not survive unwrapping.
const DROPPED_WITH_CONTENT: &[&str] = &[
    "script", "style", "template", "noscript", "noembed", "noframes", "xmp", "plaintext",
    "title", "head", "math", "object", "embed", "applet", "frame", "frameset", "desc",
    "foreignObject", "annotation-xml",
];

/// Compared lowercase, so `viewBox` is listed as `viewbox`.
const ALLOWED_ATTRS: &[&str] = &[
    "id", "class", "title", "lang", "dir",
    "href", "target", "rel", "download",
    "src", "alt", "width", "height", "poster", "controls", "autoplay", "loop", "muted",
    "type", "name", "value", "placeholder", "disabled", "checked", "selected", "readonly",
    "required", "rows", "cols", "min", "max", "step", "pattern",
    "colspan", "rowspan", "headers", "scope", "role",
    "viewbox", "fill", "stroke", "d", "cx", "cy", "r", "x", "y", "transform", "xmlns",
    "text", "color", "icon", "tooltip",
    "frameborder", "allowfullscreen", "allow", "sandbox", "referrerpolicy", "loading",
];

/// Attributes whose values are never interpreted as URIs.
const URI_SAFE_ATTRS: &[&str] = &[
    "alt", "class", "id", "name", "pattern", "placeholder", "role", "title", "value", "xmlns",
    "text", "tooltip", "icon", "color", "sandbox",
];

/// Elements whose `src` may carry a `data:` URI.
const DATA_URI_TAGS: &[&str] = &["img", "video", "audio", "source"];

/// Permitted URI shapes: an allowlisted scheme, or no scheme at all.
static SAFE_URI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:(?:(?:f|ht)tps?|mailto|tel|callto|sms|cid|xmpp|blob):|[^a-z]|[a-z+.\-]+(?:[^a-z+.\-:]|$))",
    )
    .expect("safe URI pattern is valid")
});

static DATA_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^data-[\-\w.\x{00B7}-\x{FFFF}]+$").expect("data attribute pattern is valid")
});

/// Is `value` acceptable as a link or media target?
///
/// Whitespace and control characters are ignored the way browsers ignore them
/// while resolving the scheme, so `java\tscript:` is still caught.
pub fn is_safe_uri(value: &str) -> bool {
    let collapsed: String = value.chars().filter(|c| !is_attr_whitespace(*c)).collect();
    SAFE_URI.is_match(&collapsed)
}

fn is_attr_whitespace(c: char) -> bool {
    matches!(c,
        '\u{0000}'..='\u{0020}'
        | '\u{00A0}'
        | '\u{1680}'
        | '\u{180E}'
        | '\u{2000}'..='\u{2029}'
        | '\u{205F}'
        | '\u{3000}')
}

impl Sanitizer for DocumentationSanitizer {
    fn sanitize(&self, html: &str) -> Result<String, SanitizeError> {
        if html.is_empty() {
            return Err(SanitizeError::EmptyInput);
        }
        let mut doc = parse_fragment(html).ok_or(SanitizeError::Unparseable)?;
        let root = doc.root;

        let mut pending: Vec<NodeId> = doc.children(root).collect();
        pending.reverse();
        while let Some(id) = pending.pop() {
            let tag = match &doc.get(id).kind {
                NodeKind::Text(_) => continue,
                NodeKind::Element(elem) => elem.tag.to_string(),
                NodeKind::Comment(_) | NodeKind::Document => {
                    doc.remove(id);
                    continue;
                }
            };

            if DROPPED_WITH_CONTENT.contains(&tag.as_str()) {
                debug!(tag = %tag, "dropping element with its content");
                doc.remove(id);
                continue;
            }

            let children: Vec<NodeId> = doc.children(id).collect();
            if ALLOWED_TAGS.contains(&tag.as_str()) {
                if let Some(elem) = doc.element_mut(id) {
                    clean_attributes(&tag, elem);
                    apply_element_rules(&tag, elem);
                }
            } else {
                debug!(tag = %tag, "unwrapping disallowed element");
                doc.unwrap_node(id);
            }
            pending.extend(children.into_iter().rev());
        }

        Ok(doc.inner_html(root))
    }
}

fn clean_attributes(tag: &str, elem: &mut ElementData) {
    elem.attrs.retain(|name, value| {
        let keep = attribute_allowed(tag, name, value.as_ref());
        if !keep {
            debug!(tag, attr = %name, "dropping attribute");
        }
        keep
    });
}

fn attribute_allowed(tag: &str, name: &str, value: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    if lower == "srcdoc" || lower.starts_with("on") {
        return false;
    }
    if lower.starts_with("aria-") || DATA_ATTR.is_match(&lower) {
        return true;
    }
    if !ALLOWED_ATTRS.contains(&lower.as_str()) {
        return false;
    }
    if URI_SAFE_ATTRS.contains(&lower.as_str()) || value.is_empty() {
        return true;
    }
    if lower == "src" && DATA_URI_TAGS.contains(&tag) && value.starts_with("data:") {
        return true;
    }
    is_safe_uri(value)
}

fn apply_element_rules(tag: &str, elem: &mut ElementData) {
    match tag {
        "a" => {
            if elem.attr("target") == Some("_blank") {
                elem.set_attr("rel", "noopener noreferrer");
            }
        }
        "iframe" => {
            let src = elem.attr("src").unwrap_or_default().to_owned();
            if is_youtube_url(&src) {
                if !src.contains("enablejsapi=") {
                    let separator = if src.contains('?') { '&' } else { '?' };
                    elem.set_attr("src", &format!("{src}{separator}enablejsapi=1"));
                }
            } else if !is_vimeo_url(&src) {
                elem.set_attr("sandbox", "");
                elem.set_attr("referrerpolicy", "no-referrer");
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    // facet_testhelpers::test unavailable offline; std #[test] is used instead

    fn clean(html: &str) -> String {
        DocumentationSanitizer
            .sanitize(html)
            .expect("sanitization should succeed")
    }

    #[test]
    fn rejects_empty_input() {
        assert_eq!(
            DocumentationSanitizer.sanitize(""),
            Err(SanitizeError::EmptyInput)
        );
    }

    #[test]
    fn drops_scripts_and_handlers() {
        assert_eq!(
            clean(r#"<p onclick="alert(1)">hi<script>alert(2)</script></p><style>p{}</style>"#),
            "<p>hi</p>"
        );
    }

    #[test]
    fn unwraps_unknown_tags_and_removes_comments() {
        assert_eq!(
            clean("<section><font color=red>text</font><!-- note --></section>"),
            "<section>text</section>"
        );
    }

    #[test]
    fn strips_dangerous_uris() {
        assert_eq!(
            clean(r#"<a href="javascript:alert(1)">x</a><a href="java&#9;script:alert(1)">y</a>"#),
            "<a>x</a><a>y</a>"
        );
        assert_eq!(
            clean(r#"<a href="data:text/html,boom">x</a>"#),
            "<a>x</a>"
        );
        assert_eq!(
            clean(r#"<a href="/docs/x">x</a><a href="https://grafana.com/">y</a>"#),
            r#"<a href="/docs/x">x</a><a href="https://grafana.com/">y</a>"#
        );
        assert_eq!(
            clean(r#"<img src="data:image/png;base64,AAAA" alt="">"#),
            r#"<img src="data:image/png;base64,AAAA" alt="">"#
        );
    }

    #[test]
    fn keeps_data_and_aria_attributes() {
        assert_eq!(
            clean(
                r#"<li class="interactive" data-targetaction="button" data-reftarget="Save &amp; close" aria-label="x" style="color:red">Go</li>"#
            ),
            r#"<li class="interactive" data-targetaction="button" data-reftarget="Save &amp; close" aria-label="x">Go</li>"#
        );
    }

    #[test]
    fn forces_sandbox_on_unknown_iframes() {
        assert_eq!(
            clean(r#"<iframe src="https://evil.example/embed" srcdoc="<b>x</b>"></iframe>"#),
            r#"<iframe src="https://evil.example/embed" sandbox="" referrerpolicy="no-referrer"></iframe>"#
        );
        assert_eq!(
            clean(r#"<iframe src="javascript:alert(1)"></iframe>"#),
            r#"<iframe sandbox="" referrerpolicy="no-referrer"></iframe>"#
        );
    }

    #[test]
    fn video_provider_iframes_are_left_interactive() {
        assert_eq!(
            clean(r#"<iframe src="https://www.youtube.com/embed/abc?start=3" allowfullscreen></iframe>"#),
            r#"<iframe src="https://www.youtube.com/embed/abc?start=3&amp;enablejsapi=1" allowfullscreen=""></iframe>"#
        );
        assert_eq!(
            clean(r#"<iframe src="https://player.vimeo.com/video/1"></iframe>"#),
            r#"<iframe src="https://player.vimeo.com/video/1"></iframe>"#
        );
    }

    #[test]
    fn blank_targets_get_noopener() {
        assert_eq!(
            clean(r#"<a href="https://grafana.com/" target="_blank">x</a>"#),
            r#"<a href="https://grafana.com/" target="_blank" rel="noopener noreferrer">x</a>"#
        );
    }

    #[test]
    fn custom_elements_survive() {
        assert_eq!(
            clean(r#"<badge text="New" color="green"></badge><assistant data-assistant-id="q">up</assistant>"#),
            r#"<badge text="New" color="green"></badge><assistant data-assistant-id="q">up</assistant>"#
        );
    }
}
