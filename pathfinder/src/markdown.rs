//! The small markdown dialect guide authors write in.
//!
//! Supported: fenced code, pipe tables, ATX headings, `-`/`*` and numbered
//! lists, and one paragraph per line. Inline: bold, italic, code spans and
//! links. Output uses the same element vocabulary as the HTML walker, so an
//! inline code span here is the same `code-block` an HTML `<code>` becomes.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::element::{Child, ContentFlags, ParsedElement, Props, PropsExt};
use crate::sanitize::is_safe_uri;

static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,6})\s+(.+)$").expect("heading pattern is valid"));

static ORDERED_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\.\s+(.+)$").expect("ordered item pattern is valid"));

static TABLE_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\s|:\-]+$").expect("table separator pattern is valid"));

static INLINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(\*\*(.+?)\*\*|__(.+?)__|`([^`]+)`|\[([^\]]+)\]\(([^)]+)\)|\*([^*]+)\*|_([^_]+)_)",
    )
    .expect("inline markdown pattern is valid")
});

static HTML_STRONG_STARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.+?)\*\*").expect("bold pattern is valid"));
static HTML_STRONG_UNDERSCORES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"__(.+?)__").expect("bold pattern is valid"));
static HTML_EM_STAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*([^*]+)\*").expect("italic pattern is valid"));
static HTML_EM_UNDERSCORE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(^|[^\w])_([^_]+)_").expect("italic pattern is valid"));
static HTML_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`([^`]+)`").expect("code pattern is valid"));
static HTML_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").expect("link pattern is valid"));

const LINK_REL: &str = "noopener noreferrer";

/// Convert a markdown document into block elements.
pub fn parse_markdown(content: &str, flags: &mut ContentFlags) -> Vec<ParsedElement> {
    let mut parser = BlockParser {
        flags,
        elements: Vec::new(),
        list: None,
        code: None,
        table: None,
    };
    let lines: Vec<&str> = content.split('\n').collect();

    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        i += 1;
        let trimmed = line.trim();

        if let Some(info) = trimmed.strip_prefix("```") {
            if parser.code.is_some() {
                parser.flush_code();
            } else {
                parser.flush_list();
                parser.flush_table();
                parser.code = Some(FencedCode {
                    language: info.trim().to_owned(),
                    lines: Vec::new(),
                });
            }
            continue;
        }

        if let Some(code) = &mut parser.code {
            code.lines.push(line);
            continue;
        }

        if is_table_row(trimmed) {
            parser.flush_list();
            if parser.table.is_none() {
                let next = lines.get(i).map(|l| l.trim()).unwrap_or_default();
                if is_table_separator(next) {
                    parser.table = Some(Table {
                        headers: split_row(trimmed),
                        rows: Vec::new(),
                    });
                    i += 1;
                    continue;
                }
            }
            if let Some(table) = &mut parser.table {
                table.rows.push(split_row(trimmed));
                continue;
            }
        } else if parser.table.is_some() {
            parser.flush_table();
        }

        if trimmed.is_empty() {
            parser.flush_list();
            parser.flush_table();
            continue;
        }

        if let Some(caps) = HEADING.captures(trimmed) {
            parser.flush_list();
            parser.flush_table();
            let level = caps[1].len();
            let children = parse_inline(&caps[2], parser.flags);
            parser
                .elements
                .push(ParsedElement::new(format!("h{level}")).with_children(children));
            continue;
        }

        if let Some(item) = trimmed
            .strip_prefix("- ")
            .or_else(|| trimmed.strip_prefix("* "))
        {
            parser.flush_table();
            parser.push_item(ListKind::Unordered, item);
            continue;
        }

        if let Some(caps) = ORDERED_ITEM.captures(trimmed) {
            parser.flush_table();
            parser.push_item(ListKind::Ordered, &caps[2]);
            continue;
        }

        parser.flush_list();
        parser.flush_table();
        let children = parse_inline(trimmed, parser.flags);
        parser
            .elements
            .push(ParsedElement::new("p").with_children(children));
    }

    parser.flush_list();
    parser.flush_code();
    parser.flush_table();
    parser.elements
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListKind {
    Unordered,
    Ordered,
}

impl ListKind {
    fn tag(self) -> &'static str {
        match self {
            ListKind::Unordered => "ul",
            ListKind::Ordered => "ol",
        }
    }
}

struct FencedCode<'a> {
    language: String,
    lines: Vec<&'a str>,
}

struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

struct BlockParser<'a, 'f> {
    flags: &'f mut ContentFlags,
    elements: Vec<ParsedElement>,
    list: Option<(ListKind, Vec<Child>)>,
    code: Option<FencedCode<'a>>,
    table: Option<Table>,
}

impl BlockParser<'_, '_> {
    fn push_item(&mut self, kind: ListKind, text: &str) {
        if self.list.as_ref().is_some_and(|(current, _)| *current != kind) {
            self.flush_list();
        }
        let item = ParsedElement::new("li").with_children(parse_inline(text, self.flags));
        self.list
            .get_or_insert_with(|| (kind, Vec::new()))
            .1
            .push(item.into());
    }

    fn flush_list(&mut self) {
        if let Some((kind, items)) = self.list.take()
            && !items.is_empty()
        {
            self.elements
                .push(ParsedElement::new(kind.tag()).with_children(items));
        }
    }

    fn flush_code(&mut self) {
        let Some(code) = self.code.take() else {
            return;
        };
        if code.lines.is_empty() {
            return;
        }
        self.flags.has_code_blocks = true;
        let mut props = Props::new();
        props.put("code", code.lines.join("\n"));
        if !code.language.is_empty() {
            props.put("language", code.language);
        }
        props.put("showCopy", true);
        props.put("inline", false);
        self.elements
            .push(ParsedElement::new("code-block").with_props(props));
    }

    fn flush_table(&mut self) {
        let Some(table) = self.table.take() else {
            return;
        };
        let header_cells: Vec<Child> = table
            .headers
            .iter()
            .map(|cell| cell_element("th", cell, self.flags))
            .collect();
        let body_rows: Vec<Child> = table
            .rows
            .iter()
            .map(|row| {
                let cells: Vec<Child> = row
                    .iter()
                    .map(|cell| cell_element("td", cell, self.flags))
                    .collect();
                Child::from(ParsedElement::new("tr").with_children(cells))
            })
            .collect();

        let head_row = ParsedElement::new("tr").with_children(header_cells);
        let thead = ParsedElement::new("thead").with_children(vec![head_row.into()]);
        let tbody = ParsedElement::new("tbody").with_children(body_rows);
        self.elements
            .push(ParsedElement::new("table").with_children(vec![thead.into(), tbody.into()]));
    }
}

fn cell_element(tag: &str, cell: &str, flags: &mut ContentFlags) -> Child {
    ParsedElement::new(tag)
        .with_children(parse_inline(cell.trim(), flags))
        .into()
}

fn is_table_separator(line: &str) -> bool {
    line.contains('|') && TABLE_SEPARATOR.is_match(line)
}

fn is_table_row(line: &str) -> bool {
    line.contains('|') && !is_table_separator(line)
}

fn split_row(line: &str) -> Vec<String> {
    let line = line.trim();
    let line = line.strip_prefix('|').unwrap_or(line);
    let line = line.strip_suffix('|').unwrap_or(line);
    line.split('|').map(str::to_owned).collect()
}

/// Convert one line of inline markdown.
///
/// Text between matches is kept verbatim. Links whose target has an unsafe
/// scheme render as their label only.
pub fn parse_inline(text: &str, flags: &mut ContentFlags) -> Vec<Child> {
    let mut children = Vec::new();
    let mut last = 0;

    for caps in INLINE.captures_iter(text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        if whole.start() > last {
            children.push(Child::Text(text[last..whole.start()].to_owned()));
        }
        children.push(inline_child(&caps, flags));
        last = whole.end();
    }

    if last < text.len() {
        children.push(Child::Text(text[last..].to_owned()));
    }
    if children.is_empty() {
        children.push(Child::Text(text.to_owned()));
    }
    children
}

fn inline_child(caps: &Captures<'_>, flags: &mut ContentFlags) -> Child {
    let group = |i: usize| caps.get(i).map(|m| m.as_str());

    if let Some(bold) = group(2).or_else(|| group(3)) {
        return ParsedElement::new("strong")
            .with_children(vec![Child::Text(bold.to_owned())])
            .into();
    }
    if let Some(code) = group(4) {
        flags.has_code_blocks = true;
        let mut props = Props::new();
        props.put("code", code);
        props.put("showCopy", true);
        props.put("inline", true);
        return ParsedElement::new("code-block").with_props(props).into();
    }
    if let (Some(label), Some(href)) = (group(5), group(6)) {
        if !is_safe_uri(href) {
            debug!(href, "rendering link with unsafe target as text");
            return Child::Text(label.to_owned());
        }
        let mut props = Props::new();
        props.put("href", href);
        props.put("target", "_blank");
        props.put("rel", LINK_REL);
        return ParsedElement::new("a")
            .with_props(props)
            .with_children(vec![Child::Text(label.to_owned())])
            .into();
    }
    let italic = group(7).or_else(|| group(8)).unwrap_or_default();
    ParsedElement::new("em")
        .with_children(vec![Child::Text(italic.to_owned())])
        .into()
}

/// Render inline markdown to an HTML string, for props that carry markup
/// (step tooltips). The text is escaped first, so only the markdown itself
/// can introduce tags.
pub fn markdown_to_html(text: &str) -> String {
    let html = escape_html(text);
    let html = HTML_STRONG_STARS.replace_all(&html, "<strong>$1</strong>");
    let html = HTML_STRONG_UNDERSCORES.replace_all(&html, "<strong>$1</strong>");
    let html = HTML_EM_STAR.replace_all(&html, "<em>$1</em>");
    let html = HTML_EM_UNDERSCORE.replace_all(&html, |caps: &Captures<'_>| {
        let whole = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
        let ends_in_word = caps
            .get(0)
            .and_then(|m| html[m.end()..].chars().next())
            .is_some_and(|c| c.is_alphanumeric() || c == '_');
        if ends_in_word {
            whole.to_owned()
        } else {
            format!("{}<em>{}</em>", &caps[1], &caps[2])
        }
    });
    let html = HTML_CODE.replace_all(&html, "<code>$1</code>");
    let html = HTML_LINK.replace_all(&html, |caps: &Captures<'_>| {
        let (label, href) = (&caps[1], &caps[2]);
        if is_safe_uri(href) {
            format!(r#"<a href="{href}" target="_blank" rel="{LINK_REL}">{label}</a>"#)
        } else {
            label.to_owned()
        }
    });
    html.into_owned()
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::PropValue;
    // facet_testhelpers::test unavailable offline; std #[test] is used instead

    fn md(content: &str) -> Vec<ParsedElement> {
        parse_markdown(content, &mut ContentFlags::default())
    }

    fn texts(children: &[Child]) -> Vec<&str> {
        children.iter().filter_map(Child::as_text).collect()
    }

    #[test]
    fn headings_and_paragraphs() {
        let elements = md("# Title\n\nFirst line\nSecond line\n####### not a heading");
        let kinds: Vec<_> = elements.iter().map(|e| e.kind.as_str()).collect();
        assert_eq!(kinds, vec!["h1", "p", "p", "p"]);
        assert_eq!(texts(&elements[0].children), vec!["Title"]);
    }

    #[test]
    fn lists_switch_kind() {
        let elements = md("- a\n* b\n1. one\n2. two\n\n- c");
        let kinds: Vec<_> = elements.iter().map(|e| e.kind.as_str()).collect();
        assert_eq!(kinds, vec!["ul", "ol", "ul"]);
        assert_eq!(elements[0].children.len(), 2);
        assert_eq!(elements[1].children.len(), 2);
    }

    #[test]
    fn fenced_code_keeps_lines_verbatim() {
        let mut flags = ContentFlags::default();
        let elements = parse_markdown("Intro\n```promql\n  rate(x[5m])\n\n| not | table |\n```", &mut flags);
        assert!(flags.has_code_blocks);
        assert_eq!(elements.len(), 2);
        let code = &elements[1];
        assert_eq!(code.kind, "code-block");
        assert_eq!(
            code.prop("code").and_then(PropValue::as_str),
            Some("  rate(x[5m])\n\n| not | table |")
        );
        assert_eq!(code.prop("language").and_then(PropValue::as_str), Some("promql"));
        assert_eq!(code.prop("inline").and_then(PropValue::as_bool), Some(false));
    }

    #[test]
    fn empty_fence_produces_nothing() {
        assert!(md("```\n```").is_empty());
    }

    #[test]
    fn pipe_tables() {
        let elements = md("| Name | Value |\n|:-----|------:|\n| a | **b** |\n| c | d |\nafter");
        assert_eq!(elements.len(), 2);
        let table = &elements[0];
        assert_eq!(table.kind, "table");
        let sections: Vec<_> = table.child_elements().collect();
        assert_eq!(sections[0].kind, "thead");
        let head_row = sections[0].child_elements().next().expect("header row");
        let headers: Vec<_> = head_row
            .child_elements()
            .map(|th| texts(&th.children).concat())
            .collect();
        assert_eq!(headers, vec!["Name", "Value"]);
        assert_eq!(sections[1].child_elements().count(), 2);
        assert_eq!(elements[1].kind, "p");
    }

    #[test]
    fn pipes_without_separator_are_text() {
        let elements = md("a | b\nc | d");
        assert!(elements.iter().all(|e| e.kind == "p"));
    }

    #[test]
    fn inline_spans() {
        let children = parse_inline(
            "Use **bold**, _em_, `code` and [docs](https://grafana.com/docs/).",
            &mut ContentFlags::default(),
        );
        let kinds: Vec<_> = children
            .iter()
            .map(|c| c.as_element().map_or("text", |e| e.kind.as_str()))
            .collect();
        assert_eq!(
            kinds,
            vec!["text", "strong", "text", "em", "text", "code-block", "text", "a", "text"]
        );
        let link = children[7].as_element().expect("link");
        assert_eq!(link.prop("target").and_then(PropValue::as_str), Some("_blank"));
        assert_eq!(link.prop("rel").and_then(PropValue::as_str), Some("noopener noreferrer"));
    }

    #[test]
    fn unsafe_links_become_text() {
        let children = parse_inline("[click](javascript:alert(1))", &mut ContentFlags::default());
        assert_eq!(children[0], Child::Text("click".to_owned()));
    }

    #[test]
    fn plain_text_is_one_child() {
        assert_eq!(
            parse_inline("nothing here", &mut ContentFlags::default()),
            vec![Child::Text("nothing here".to_owned())]
        );
    }

    #[test]
    fn tooltip_html_is_escaped() {
        assert_eq!(
            markdown_to_html("Click **Save** <img src=x onerror=alert(1)>"),
            "Click <strong>Save</strong> &lt;img src=x onerror=alert(1)&gt;"
        );
        assert_eq!(markdown_to_html("snake_case_name"), "snake_case_name");
        assert_eq!(markdown_to_html("an _em_ word"), "an <em>em</em> word");
        assert_eq!(
            markdown_to_html("see [docs](/docs/x)"),
            r#"see <a href="/docs/x" target="_blank" rel="noopener noreferrer">docs</a>"#
        );
        assert_eq!(markdown_to_html("[x](javascript:void)"), "x");
    }
}
