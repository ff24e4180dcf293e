//! Candidate URLs for GitHub-hosted guides.
//!
//! A guide directory can hold `content.json` (preferred) and/or
//! `unstyled.html`. Every GitHub URL shape is reduced to a [`ResourceShape`]
//! and expanded by the single [`candidates`] function, so the ordering rules
//! live in one place.

use pathfinder::trust::{GITHUB_HOST, GITHUB_RAW_HOST, TrustPolicy};
use smallvec::SmallVec;
use url::Url;

pub const JSON_FILE: &str = "content.json";
pub const HTML_FILE: &str = "unstyled.html";

/// Where a candidate is fetched from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Through the backend proxy route; the URL is a relative proxy path
    Proxy,
    /// Straight from the origin
    Direct,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub url: String,
    pub route: Route,
}

impl Candidate {
    fn direct(url: String) -> Self {
        Self {
            url,
            route: Route::Direct,
        }
    }

    pub fn is_json(&self) -> bool {
        is_json_content_url(&self.url)
    }
}

/// A file or directory in a GitHub repository, at a ref.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLocation {
    pub owner: String,
    pub repo: String,
    pub git_ref: String,
    /// Repository-relative, no leading or trailing slash
    pub path: String,
}

impl RawLocation {
    pub fn raw_url(&self) -> String {
        format!(
            "https://{GITHUB_RAW_HOST}/{}/{}/{}/{}",
            self.owner, self.repo, self.git_ref, self.path
        )
    }

    fn join(&self, file: &str) -> Self {
        Self {
            path: format!("{}/{file}", self.path),
            ..self.clone()
        }
    }

    fn names_a_file(&self) -> bool {
        self.path.ends_with(".json") || self.path.ends_with(".html")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceShape {
    /// `github.com/<owner>/<repo>/tree/<ref>/<path>`
    Tree(RawLocation),
    /// `github.com/<owner>/<repo>/blob/<ref>/<path>`
    Blob(RawLocation),
    /// `raw.githubusercontent.com/<owner>/<repo>/<ref>/<path>`
    Raw(RawLocation),
    /// Any other GitHub URL; treated as a directory
    Directory(String),
}

/// Recognise a GitHub URL. Anything not on github.com or
/// raw.githubusercontent.com over https is `None`.
pub fn classify_resource(url: &str) -> Option<ResourceShape> {
    let parsed = Url::parse(url).ok().filter(|u| u.scheme() == "https")?;
    let segments: Vec<&str> = parsed
        .path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();
    let directory = || ResourceShape::Directory(url.trim_end_matches('/').to_owned());

    match parsed.host_str()? {
        GITHUB_HOST => {
            if segments.len() < 5 {
                return Some(directory());
            }
            let location = location(segments[0], segments[1], segments[3], &segments[4..]);
            Some(match segments[2] {
                "tree" => ResourceShape::Tree(location),
                "blob" => ResourceShape::Blob(location),
                _ => directory(),
            })
        }
        GITHUB_RAW_HOST => {
            if segments.len() < 4 {
                return Some(directory());
            }
            Some(ResourceShape::Raw(location(
                segments[0],
                segments[1],
                segments[2],
                &segments[3..],
            )))
        }
        _ => None,
    }
}

fn location(owner: &str, repo: &str, git_ref: &str, path: &[&str]) -> RawLocation {
    RawLocation {
        owner: owner.to_owned(),
        repo: repo.to_owned(),
        git_ref: git_ref.to_owned(),
        path: path.join("/"),
    }
}

/// Candidate URLs for `shape`, in the order they should be tried.
///
/// Every `content.json` variant comes before every `unstyled.html` variant,
/// and each proxy variant comes right before its direct twin. Proxy variants
/// only exist when a proxy is reachable and the location is the one the
/// proxy route serves.
pub fn candidates(
    shape: &ResourceShape,
    policy: &TrustPolicy,
    proxy_available: bool,
) -> SmallVec<[Candidate; 6]> {
    let mut out = SmallVec::new();
    let push = |out: &mut SmallVec<_>, location: &RawLocation| {
        push_located(out, location, policy, proxy_available)
    };

    match shape {
        ResourceShape::Tree(location) => {
            push(&mut out, &location.join(JSON_FILE));
            push(&mut out, &location.join(HTML_FILE));
        }
        ResourceShape::Blob(location) | ResourceShape::Raw(location) => {
            push(&mut out, location);
            if !location.names_a_file() {
                push(&mut out, &location.join(JSON_FILE));
                push(&mut out, &location.join(HTML_FILE));
            }
        }
        ResourceShape::Directory(base) => {
            for file in [JSON_FILE, HTML_FILE] {
                out.push(Candidate::direct(format!("{base}/{file}")));
            }
        }
    }
    out
}

fn push_located(
    out: &mut SmallVec<[Candidate; 6]>,
    location: &RawLocation,
    policy: &TrustPolicy,
    proxy_available: bool,
) {
    let raw = location.raw_url();
    if proxy_available && let Some(path) = policy.proxy.proxy_path_for_raw(&raw) {
        out.push(Candidate {
            url: path,
            route: Route::Proxy,
        });
    }
    out.push(Candidate::direct(raw));
}

/// Does the URL path (query and fragment ignored) name a JSON file?
pub fn is_json_content_url(url: &str) -> bool {
    strip_query(url).ends_with(".json")
}

/// The `content.json` and `unstyled.html` URLs for the directory `url` is in
/// (or is).
pub fn content_urls(url: &str) -> (String, String) {
    let base = strip_query(url).trim_end_matches('/');
    if let Some(dir) = base.strip_suffix(JSON_FILE) {
        return (base.to_owned(), format!("{dir}{HTML_FILE}"));
    }
    if let Some(dir) = base.strip_suffix(HTML_FILE) {
        return (format!("{dir}{JSON_FILE}"), base.to_owned());
    }
    (format!("{base}/{JSON_FILE}"), format!("{base}/{HTML_FILE}"))
}

pub(crate) fn strip_query(url: &str) -> &str {
    url.split(['?', '#']).next().unwrap_or(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    // facet_testhelpers::test unavailable offline; std #[test] is used instead

    const TREE: &str = "https://github.com/grafana/interactive-tutorials/tree/main/intro";

    fn urls(shape: &ResourceShape, proxy: bool) -> Vec<(Route, String)> {
        candidates(shape, &TrustPolicy::default(), proxy)
            .into_iter()
            .map(|c| (c.route, c.url))
            .collect()
    }

    #[test]
    fn recognises_shapes() {
        let Some(ResourceShape::Tree(location)) = classify_resource(TREE) else {
            panic!("expected a tree URL");
        };
        assert_eq!(location.path, "intro");
        assert!(matches!(
            classify_resource("https://github.com/grafana/x/blob/main/a/b.json"),
            Some(ResourceShape::Blob(_))
        ));
        assert!(matches!(
            classify_resource("https://raw.githubusercontent.com/grafana/x/main/a"),
            Some(ResourceShape::Raw(_))
        ));
        assert_eq!(
            classify_resource("https://github.com/grafana/x/"),
            Some(ResourceShape::Directory("https://github.com/grafana/x".to_owned()))
        );
        assert_eq!(classify_resource("https://grafana.com/docs/"), None);
        assert_eq!(classify_resource("http://github.com/grafana/x/tree/main/a"), None);
    }

    #[test]
    fn tree_candidates_prefer_json_then_proxy() {
        let shape = classify_resource(TREE).expect("tree");
        let proxy = "api/plugin-proxy/grafana-pathfinder-app/github-raw/intro";
        let raw = "https://raw.githubusercontent.com/grafana/interactive-tutorials/main/intro";
        assert_eq!(
            urls(&shape, true),
            vec![
                (Route::Proxy, format!("{proxy}/content.json")),
                (Route::Direct, format!("{raw}/content.json")),
                (Route::Proxy, format!("{proxy}/unstyled.html")),
                (Route::Direct, format!("{raw}/unstyled.html")),
            ]
        );
        assert_eq!(
            urls(&shape, false),
            vec![
                (Route::Direct, format!("{raw}/content.json")),
                (Route::Direct, format!("{raw}/unstyled.html")),
            ]
        );
    }

    #[test]
    fn proxy_only_serves_its_own_repo() {
        let shape = classify_resource("https://github.com/acme/guides/tree/main/intro").expect("tree");
        assert!(urls(&shape, true).iter().all(|(route, _)| *route == Route::Direct));
    }

    #[test]
    fn blob_files_come_first() {
        let shape = classify_resource(
            "https://github.com/grafana/interactive-tutorials/blob/main/intro/content.json",
        )
        .expect("blob");
        assert_eq!(urls(&shape, false).len(), 1);

        let dir = classify_resource("https://raw.githubusercontent.com/grafana/interactive-tutorials/main/intro")
            .expect("raw");
        let list = urls(&dir, true);
        assert_eq!(list.len(), 6);
        assert!(list[0].1.ends_with("/intro"));
        let first_html = list.iter().position(|(_, u)| u.ends_with(HTML_FILE));
        let last_json = list.iter().rposition(|(_, u)| u.ends_with(JSON_FILE));
        assert!(last_json < first_html);
    }

    #[test]
    fn directory_fallback() {
        let shape = classify_resource("https://github.com/grafana/interactive-tutorials").expect("dir");
        assert_eq!(
            urls(&shape, true),
            vec![
                (
                    Route::Direct,
                    "https://github.com/grafana/interactive-tutorials/content.json".to_owned()
                ),
                (
                    Route::Direct,
                    "https://github.com/grafana/interactive-tutorials/unstyled.html".to_owned()
                ),
            ]
        );
    }

    #[test]
    fn content_url_pairs() {
        assert_eq!(
            content_urls("https://grafana.com/docs/x/?a=b"),
            (
                "https://grafana.com/docs/x/content.json".to_owned(),
                "https://grafana.com/docs/x/unstyled.html".to_owned()
            )
        );
        assert_eq!(
            content_urls("https://grafana.com/docs/x/unstyled.html"),
            (
                "https://grafana.com/docs/x/content.json".to_owned(),
                "https://grafana.com/docs/x/unstyled.html".to_owned()
            )
        );
        assert!(is_json_content_url("https://a/b/content.json?x=1#y"));
        assert!(!is_json_content_url("https://a/b.json/c"));
    }
}
