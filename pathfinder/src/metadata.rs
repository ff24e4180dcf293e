//! Page metadata pulled out of fetched content.
//!
//! Extraction is plain pattern matching over the raw text. It runs on
//! content that has not been sanitized yet, so nothing here builds a DOM or
//! returns markup.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

/// Fallback page title
pub const DEFAULT_TITLE: &str = "Documentation";

const DOC_SUMMARY_CHARS: usize = 200;
const JOURNEY_SUMMARY_CHARS: usize = 300;
const JOURNEY_SUMMARY_PARAGRAPHS: usize = 3;
const DEFAULT_MILESTONE_DURATION: &str = "5-10 min";

static TITLE_PATTERNS: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        Regex::new(r"(?i)<title[^>]*>([^<]+)</title>").expect("title pattern is valid"),
        Regex::new(r"(?i)<h1[^>]*>([^<]+)</h1>").expect("h1 pattern is valid"),
        Regex::new(r#"(?i)<meta[^>]+property="og:title"[^>]+content="([^"]+)""#)
            .expect("og:title pattern is valid"),
    ]
});

static META_DESCRIPTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta[^>]+name="description"[^>]+content="([^"]+)""#)
        .expect("description pattern is valid")
});

static PARAGRAPH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<p(?:\s[^>]*)?>(.*?)</p>").expect("paragraph pattern is valid")
});

static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("tag pattern is valid"));

static JOURNEY_BASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(https?://[^/]+/docs/learning-journeys/[^/?#]+)")
        .expect("journey base pattern is valid")
});

static TUTORIAL_BASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(https?://[^/]+/tutorials/[^/?#]+)").expect("tutorial base pattern is valid")
});

static MILESTONE_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/milestone-\d+.*$").expect("milestone suffix pattern is valid"));

static MILESTONE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/milestone-(\d+)").expect("milestone number pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentType {
    LearningJourney,
    SingleDoc,
}

/// Journeys live under `learning-journeys/` or `tutorials/`, or are
/// addressed by a `milestone-N` page. Everything else is a single doc.
pub fn determine_content_type(url: &str) -> ContentType {
    let Ok(parsed) = Url::parse(url) else {
        return ContentType::SingleDoc;
    };
    let segments: Vec<&str> = parsed
        .path_segments()
        .map(|segments| segments.collect())
        .unwrap_or_default();

    let journey_dir = segments
        .iter()
        .enumerate()
        .any(|(i, s)| matches!(*s, "learning-journeys" | "tutorials") && i + 1 < segments.len());
    let milestone = segments.iter().any(|s| {
        s.strip_prefix("milestone-")
            .is_some_and(|rest| rest.starts_with(|c: char| c.is_ascii_digit()))
    });

    if journey_dir || milestone {
        ContentType::LearningJourney
    } else {
        ContentType::SingleDoc
    }
}

/// Split `url` at the first `#`.
pub fn split_hash_fragment(url: &str) -> (&str, Option<&str>) {
    match url.split_once('#') {
        Some((base, fragment)) => (base, Some(fragment)),
        None => (url, None),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentMetadata {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub learning_journey: Option<LearningJourneyMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub single_doc: Option<SingleDocMetadata>,
}

impl ContentMetadata {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            learning_journey: None,
            single_doc: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SingleDocMetadata {
    pub has_interactive_elements: bool,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningJourneyMetadata {
    /// 0 is the cover page
    pub current_milestone: u32,
    pub total_milestones: usize,
    pub milestones: Vec<Milestone>,
    pub base_url: String,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    pub number: u32,
    pub title: String,
    pub duration: String,
    pub url: String,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side_journeys: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_journeys: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conclusion_image: Option<ConclusionImage>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConclusionImage {
    pub src: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<Value>,
}

/// First of `<title>`, `<h1>`, `og:title`, else [`DEFAULT_TITLE`].
pub fn extract_title(html: &str) -> String {
    TITLE_PATTERNS
        .iter()
        .find_map(|pattern| {
            pattern
                .captures(html)
                .map(|caps| caps[1].trim().to_owned())
                .filter(|title| !title.is_empty())
        })
        .unwrap_or_else(|| DEFAULT_TITLE.to_owned())
}

pub fn has_interactive_markers(html: &str) -> bool {
    html.contains("data-targetaction") || html.contains(r#"class="interactive""#)
}

/// Meta description, else the first paragraph's text (tags stripped).
pub fn extract_doc_summary(html: &str) -> String {
    if let Some(caps) = META_DESCRIPTION.captures(html) {
        return caps[1].to_owned();
    }
    PARAGRAPH
        .captures(html)
        .map(|caps| {
            strip_tags(&caps[1])
                .trim()
                .chars()
                .take(DOC_SUMMARY_CHARS)
                .collect()
        })
        .unwrap_or_default()
}

pub fn single_doc_metadata(html: &str) -> SingleDocMetadata {
    SingleDocMetadata {
        has_interactive_elements: has_interactive_markers(html),
        summary: extract_doc_summary(html),
    }
}

/// Text of the first three paragraphs, capped with `...`.
pub fn extract_journey_summary(html: &str) -> String {
    let joined = PARAGRAPH
        .captures_iter(html)
        .take(JOURNEY_SUMMARY_PARAGRAPHS)
        .map(|caps| strip_tags(&caps[1]).trim().to_owned())
        .collect::<Vec<_>>()
        .join(" ");
    if joined.is_empty() {
        return joined;
    }
    let mut summary: String = joined.chars().take(JOURNEY_SUMMARY_CHARS).collect();
    if summary.chars().count() >= JOURNEY_SUMMARY_CHARS {
        summary.push_str("...");
    }
    summary
}

fn strip_tags(html: &str) -> String {
    TAG.replace_all(html, "").into_owned()
}

/// The journey a page belongs to, e.g.
/// `https://grafana.com/docs/learning-journeys/drilldown-logs/milestone-1/`
/// becomes `https://grafana.com/docs/learning-journeys/drilldown-logs`.
pub fn journey_base_url(url: &str) -> String {
    if let Some(caps) = JOURNEY_BASE
        .captures(url)
        .or_else(|| TUTORIAL_BASE.captures(url))
    {
        return caps[1].to_owned();
    }
    let trimmed = MILESTONE_SUFFIX.replace(url, "");
    trimmed.strip_suffix('/').unwrap_or(&trimmed).to_owned()
}

/// Where a journey's milestone index lives.
pub fn journey_index_url(base_url: &str) -> String {
    format!("{base_url}/index.json")
}

#[derive(Debug, Default, Deserialize)]
struct HugoPage {
    #[serde(default)]
    permalink: Option<String>,
    #[serde(default)]
    params: HugoParams,
}

#[derive(Debug, Default, Deserialize)]
struct HugoParams {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    menutitle: Option<String>,
    #[serde(default)]
    permalink: Option<String>,
    #[serde(default)]
    grafana: Option<HugoGrafana>,
    #[serde(default)]
    side_journeys: Option<Value>,
    #[serde(default)]
    related_journeys: Option<Value>,
    #[serde(default)]
    cta: Option<HugoCta>,
}

#[derive(Debug, Default, Deserialize)]
struct HugoGrafana {
    #[serde(default)]
    skip: bool,
}

#[derive(Debug, Deserialize)]
struct HugoCta {
    #[serde(default)]
    image: Option<HugoImage>,
}

#[derive(Debug, Deserialize)]
struct HugoImage {
    src: String,
    #[serde(default)]
    width: Option<Value>,
    #[serde(default)]
    height: Option<Value>,
}

/// Milestones from a journey's `index.json` (an array of Hugo pages).
///
/// Pages flagged `grafana.skip` are dropped and the rest renumbered from 1.
/// Entries that do not decode are skipped.
pub fn milestones_from_index(index: &Value, base_url: &str) -> Vec<Milestone> {
    let Some(pages) = index.as_array() else {
        return Vec::new();
    };
    let origin = Url::parse(base_url)
        .map(|url| url.origin().ascii_serialization())
        .unwrap_or_default();

    pages
        .iter()
        .filter_map(|page| HugoPage::deserialize(page).ok())
        .filter(|page| !page.params.grafana.as_ref().is_some_and(|g| g.skip))
        .zip(1u32..)
        .map(|(page, number)| {
            let params = page.params;
            let title = params
                .title
                .filter(|t| !t.is_empty())
                .or(params.menutitle.filter(|t| !t.is_empty()))
                .unwrap_or_else(|| format!("Step {number}"));
            let permalink = page.permalink.or(params.permalink).unwrap_or_default();
            Milestone {
                number,
                title,
                duration: DEFAULT_MILESTONE_DURATION.to_owned(),
                url: format!("{origin}{permalink}"),
                is_active: false,
                side_journeys: params.side_journeys,
                related_journeys: params.related_journeys,
                conclusion_image: params.cta.and_then(|cta| cta.image).map(|image| {
                    ConclusionImage {
                        src: format!("{origin}{}", image.src),
                        width: image.width,
                        height: image.height,
                    }
                }),
            }
        })
        .collect()
}

/// Which milestone `url` is: an exact match against the index, else the
/// `milestone-N` in the path, else the cover page (0).
pub fn current_milestone(url: &str, milestones: &[Milestone]) -> u32 {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let clean = without_query
        .strip_suffix("/unstyled.html")
        .unwrap_or(without_query);

    if let Some(milestone) = milestones.iter().find(|m| urls_match(clean, &m.url)) {
        return milestone.number;
    }
    MILESTONE_NUMBER
        .captures(clean)
        .and_then(|caps| caps[1].parse().ok())
        .unwrap_or(0)
}

fn urls_match(a: &str, b: &str) -> bool {
    let normalize = |u: &str| u.strip_suffix('/').unwrap_or(u).to_lowercase();
    normalize(a) == normalize(b)
}

/// Assemble learning-journey metadata once the milestone index is known.
pub fn journey_metadata(html: &str, url: &str, milestones: Vec<Milestone>) -> LearningJourneyMetadata {
    LearningJourneyMetadata {
        current_milestone: current_milestone(url, &milestones),
        total_milestones: milestones.len(),
        base_url: journey_base_url(url),
        summary: extract_journey_summary(html),
        milestones,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    // facet_testhelpers::test unavailable offline; std #[test] is used instead
    use serde_json::json;

    #[test]
    fn content_types() {
        for url in [
            "https://grafana.com/docs/learning-journeys/logs/",
            "https://grafana.com/tutorials/alerting/",
            "https://grafana.com/docs/x/milestone-2/",
        ] {
            assert_eq!(determine_content_type(url), ContentType::LearningJourney, "{url}");
        }
        for url in [
            "https://grafana.com/docs/grafana/latest/",
            "https://grafana.com/tutorials",
            "https://grafana.com/docs/milestone-x/",
            "not a url",
        ] {
            assert_eq!(determine_content_type(url), ContentType::SingleDoc, "{url}");
        }
    }

    #[test]
    fn hash_fragments() {
        assert_eq!(split_hash_fragment("https://a/b#c#d"), ("https://a/b", Some("c#d")));
        assert_eq!(split_hash_fragment("https://a/b"), ("https://a/b", None));
    }

    #[test]
    fn titles() {
        assert_eq!(extract_title("<html><title> Hello </title><h1>No</h1>"), "Hello");
        assert_eq!(extract_title("<h1 class=x>Heading</h1>"), "Heading");
        assert_eq!(
            extract_title(r#"<meta property="og:title" content="OG">"#),
            "OG"
        );
        assert_eq!(extract_title("<p>nothing</p>"), DEFAULT_TITLE);
    }

    #[test]
    fn summaries() {
        assert_eq!(
            extract_doc_summary(r#"<meta name="description" content="Desc"><p>Para</p>"#),
            "Desc"
        );
        assert_eq!(
            extract_doc_summary("<pre>code</pre><p class=a>First <b>bold</b></p><p>Second</p>"),
            "First bold"
        );
        let long = format!("<p>{}</p><p>b</p>", "a".repeat(400));
        let summary = extract_journey_summary(&long);
        assert_eq!(summary.len(), 303);
        assert!(summary.ends_with("..."));
        assert_eq!(extract_journey_summary("<p>a</p><p>b</p>"), "a b");
    }

    #[test]
    fn journey_bases() {
        assert_eq!(
            journey_base_url("https://grafana.com/docs/learning-journeys/drilldown-logs/milestone-1/"),
            "https://grafana.com/docs/learning-journeys/drilldown-logs"
        );
        assert_eq!(
            journey_base_url("https://grafana.com/tutorials/alerting-get-started/"),
            "https://grafana.com/tutorials/alerting-get-started"
        );
        assert_eq!(
            journey_base_url("https://example.com/course/milestone-3/page"),
            "https://example.com/course"
        );
    }

    #[test]
    fn milestones_skip_and_renumber() {
        let index = json!([
            {"permalink": "/docs/learning-journeys/j/", "params": {"title": "Cover", "grafana": {"skip": true}}},
            {"permalink": "/docs/learning-journeys/j/one/", "params": {"menutitle": "One"}},
            {"params": {"permalink": "/docs/learning-journeys/j/two/", "cta": {"image": {"src": "/img.png", "width": 10}}}}
        ]);
        let milestones = milestones_from_index(&index, "https://grafana.com/docs/learning-journeys/j");
        assert_eq!(milestones.len(), 2);
        assert_eq!(milestones[0].number, 1);
        assert_eq!(milestones[0].title, "One");
        assert_eq!(milestones[0].url, "https://grafana.com/docs/learning-journeys/j/one/");
        assert_eq!(milestones[1].title, "Step 2");
        assert_eq!(
            milestones[1].conclusion_image.as_ref().map(|i| i.src.as_str()),
            Some("https://grafana.com/img.png")
        );

        assert_eq!(
            current_milestone("https://grafana.com/docs/learning-journeys/j/TWO/unstyled.html", &milestones),
            2
        );
        assert_eq!(current_milestone("https://grafana.com/docs/x/milestone-7/", &[]), 7);
        assert_eq!(current_milestone("https://grafana.com/docs/learning-journeys/j/", &milestones), 0);
    }

    #[test]
    fn non_array_index_has_no_milestones() {
        assert!(milestones_from_index(&json!({"pages": []}), "https://grafana.com/x").is_empty());
    }
}
