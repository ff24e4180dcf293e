//! URL trust policy.
//!
//! Every decision here is made on parsed URL components: scheme, exact host,
//! and path segments. Nothing matches substrings of the raw URL string, so
//! `grafana.com.evil.com` or `evil.com/grafana.com/docs/` never pass.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::{Host, Url};

use crate::proxy::ProxyRoute;

pub const GITHUB_HOST: &str = "github.com";
pub const GITHUB_RAW_HOST: &str = "raw.githubusercontent.com";

/// Pseudo-scheme for guides shipped with the application.
pub const BUNDLED_SCHEME: &str = "bundled";

const YOUTUBE_HOSTS: &[&str] = &[
    "youtube.com",
    "www.youtube.com",
    "youtube-nocookie.com",
    "www.youtube-nocookie.com",
    "youtu.be",
];

const VIMEO_HOSTS: &[&str] = &[
    "player.vimeo.com",
    "vimeo.com",
    "www.vimeo.com",
    "vimeocdn.com",
    "f.vimeocdn.com",
];

/// One allowlisted GitHub repository and the refs it may be loaded from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GitHubRepoRule {
    /// `/owner/repo/`
    pub repo: String,
    /// Exact, case-sensitive ref names.
    pub allowed_refs: Vec<String>,
}

impl GitHubRepoRule {
    pub fn new(repo: impl Into<String>, allowed_refs: &[&str]) -> Self {
        Self {
            repo: repo.into(),
            allowed_refs: allowed_refs.iter().map(|r| (*r).to_owned()).collect(),
        }
    }

    fn admits(&self, owner: &str, repo: &str, git_ref: &str) -> bool {
        self.repo == format!("/{owner}/{repo}/") && self.allowed_refs.iter().any(|r| r == git_ref)
    }
}

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("failed to read trust policy from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid trust policy: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Which origins content and interactive guides may come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrustPolicy {
    /// Adds loopback hosts and any GitHub URL to the trusted set.
    pub dev_mode: bool,
    /// Documentation hosts, matched exactly.
    pub docs_hosts: Vec<String>,
    /// Documentation hosts allowed to serve interactive directives.
    pub interactive_hosts: Vec<String>,
    pub github_repos: Vec<GitHubRepoRule>,
    pub proxy: ProxyRoute,
}

impl Default for TrustPolicy {
    fn default() -> Self {
        Self {
            dev_mode: false,
            docs_hosts: vec![
                "grafana.com".to_owned(),
                "docs.grafana.com".to_owned(),
                "play.grafana.com".to_owned(),
            ],
            interactive_hosts: vec!["grafana.com".to_owned()],
            github_repos: vec![GitHubRepoRule::new(
                "/grafana/interactive-tutorials/",
                &["main"],
            )],
            proxy: ProxyRoute::default(),
        }
    }
}

impl TrustPolicy {
    /// The built-in policy with dev mode switched on.
    pub fn development() -> Self {
        Self {
            dev_mode: true,
            ..Self::default()
        }
    }

    pub fn from_toml_str(source: &str) -> Result<Self, PolicyError> {
        Ok(toml::from_str(source)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, PolicyError> {
        let source = std::fs::read_to_string(path).map_err(|source| PolicyError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// May content from `url` be fetched and rendered at all?
    pub fn classify_content_source(&self, url: &str) -> bool {
        let trusted = self.is_allowed_content_url(url)
            || self.is_allowed_github_raw_url(url)
            || self.is_allowed_github_page_url(url)
            || self.is_proxy_url(url)
            || (self.dev_mode
                && (is_github_raw_url(url) || is_github_url(url) || is_localhost_url(url)));
        if !trusted {
            debug!(url, "content source rejected");
        }
        trusted
    }

    /// May content from `base_url` carry interactive directives?
    ///
    /// Stricter than [`TrustPolicy::classify_content_source`]: only the
    /// interactive documentation hosts count, and github.com pages never do.
    pub fn classify_interactive_source(&self, base_url: Option<&str>) -> bool {
        let Some(url) = base_url else {
            return false;
        };
        let trusted = is_bundled_url(url)
            || self.is_interactive_docs_url(url)
            || self.is_allowed_github_raw_url(url)
            || self.is_proxy_url(url)
            || (self.dev_mode && (is_localhost_url(url) || is_github_raw_url(url)));
        if !trusted {
            debug!(url, "interactive source rejected");
        }
        trusted
    }

    /// Bundled content, documentation pages, and (in dev mode) local docs.
    pub fn is_allowed_content_url(&self, url: &str) -> bool {
        if is_bundled_url(url) || self.is_docs_url(url) {
            return true;
        }
        self.dev_mode
            && parse_web_url(url).is_some_and(|u| is_loopback(&u) && is_local_docs_path(u.path()))
    }

    /// http(s) URL on an allowlisted docs host with a documentation path.
    pub fn is_docs_url(&self, url: &str) -> bool {
        docs_url_on(url, &self.docs_hosts)
    }

    fn is_interactive_docs_url(&self, url: &str) -> bool {
        docs_url_on(url, &self.interactive_hosts)
    }

    /// `https://raw.githubusercontent.com/<owner>/<repo>/<ref>/...` on the allowlist.
    pub fn is_allowed_github_raw_url(&self, url: &str) -> bool {
        let Some(parsed) = https_on_host(url, GITHUB_RAW_HOST) else {
            return false;
        };
        let segments = path_segments(&parsed);
        segments.len() >= 3 && self.repo_admitted(segments[0], segments[1], segments[2])
    }

    /// `https://github.com/<owner>/<repo>/{tree,blob}/<ref>/...` on the allowlist.
    pub fn is_allowed_github_page_url(&self, url: &str) -> bool {
        let Some(parsed) = https_on_host(url, GITHUB_HOST) else {
            return false;
        };
        let segments = path_segments(&parsed);
        segments.len() >= 4
            && matches!(segments[2], "tree" | "blob")
            && self.repo_admitted(segments[0], segments[1], segments[3])
    }

    fn repo_admitted(&self, owner: &str, repo: &str, git_ref: &str) -> bool {
        self.github_repos
            .iter()
            .any(|rule| rule.admits(owner, repo, git_ref))
    }

    pub fn is_proxy_url(&self, url: &str) -> bool {
        self.proxy.is_proxy_path(url)
    }

    /// Proxy paths pass (same origin); loopback passes in dev mode; everything
    /// else must be https.
    pub fn enforce_https(&self, url: &str) -> bool {
        if self.is_proxy_url(url) {
            return true;
        }
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        if self.dev_mode && is_loopback(&parsed) && matches!(parsed.scheme(), "http" | "https") {
            return true;
        }
        parsed.scheme() == "https"
    }

    /// Checks a URL typed into the tutorial tester.
    pub fn validate_tutorial_url(&self, url: &str) -> Result<(), UrlValidationError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(UrlValidationError::Missing);
        }
        let parsed = Url::parse(url).map_err(|_| UrlValidationError::Malformed)?;

        if self.dev_mode && is_loopback(&parsed) {
            let last = path_segments(&parsed).last().copied();
            return if last == Some("unstyled.html") {
                Ok(())
            } else {
                Err(UrlValidationError::MissingUnstyledSuffix)
            };
        }
        if self.is_docs_url(url) {
            return Ok(());
        }
        Err(UrlValidationError::NotDocs)
    }
}

/// Why a URL typed into one of the tester panels was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum UrlValidationError {
    #[error("Please provide a URL")]
    Missing,
    #[error("Invalid URL format. Please provide a valid URL.")]
    Malformed,
    #[error("Localhost tutorial URL must include the /unstyled.html suffix")]
    MissingUnstyledSuffix,
    #[error("URL must be a Grafana docs URL. In dev mode, localhost URLs are also allowed.")]
    NotDocs,
    #[error("Invalid URL format. Please provide a valid GitHub URL.")]
    MalformedGitHub,
    #[error("URL must be from github.com")]
    NotGitHub,
    #[error(
        "URL must be a GitHub tree URL pointing to a directory. Format: github.com/{{owner}}/{{repo}}/tree/{{branch}}/{{path}}"
    )]
    NotTree,
    #[error("URL must be a GitHub tree URL (not blob). Use tree URLs that point to directories.")]
    BlobUrl,
}

/// Checks a GitHub directory URL typed into the repository tester.
pub fn validate_github_tree_url(url: &str) -> Result<(), UrlValidationError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(UrlValidationError::Missing);
    }
    let parsed = Url::parse(url).map_err(|_| UrlValidationError::MalformedGitHub)?;
    if parsed.host_str() != Some(GITHUB_HOST) {
        return Err(UrlValidationError::NotGitHub);
    }
    let segments = path_segments(&parsed);
    if segments.len() < 5 {
        return Err(UrlValidationError::NotTree);
    }
    if segments[2] != "tree" {
        return Err(UrlValidationError::BlobUrl);
    }
    Ok(())
}

pub fn is_bundled_url(url: &str) -> bool {
    Url::parse(url).is_ok_and(|u| u.scheme() == BUNDLED_SCHEME && !u.path().is_empty())
}

/// http(s) on `localhost`, `127.0.0.0/8` or `[::1]`.
pub fn is_localhost_url(url: &str) -> bool {
    parse_web_url(url).is_some_and(|u| is_loopback(&u))
}

pub fn is_github_url(url: &str) -> bool {
    https_on_host(url, GITHUB_HOST).is_some()
}

pub fn is_github_raw_url(url: &str) -> bool {
    https_on_host(url, GITHUB_RAW_HOST).is_some()
}

pub fn is_youtube_url(url: &str) -> bool {
    https_on_any_host(url, YOUTUBE_HOSTS)
}

pub fn is_vimeo_url(url: &str) -> bool {
    https_on_any_host(url, VIMEO_HOSTS)
}

/// Non-empty path segments, `pathname.split('/')` minus the blanks.
pub(crate) fn path_segments(url: &Url) -> Vec<&str> {
    url.path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default()
}

fn parse_web_url(url: &str) -> Option<Url> {
    Url::parse(url)
        .ok()
        .filter(|u| matches!(u.scheme(), "http" | "https"))
}

fn https_on_host(url: &str, host: &str) -> Option<Url> {
    Url::parse(url)
        .ok()
        .filter(|u| u.scheme() == "https" && u.host_str() == Some(host))
}

fn https_on_any_host(url: &str, hosts: &[&str]) -> bool {
    Url::parse(url).is_ok_and(|u| {
        u.scheme() == "https" && u.host_str().is_some_and(|h| hosts.contains(&h))
    })
}

fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => domain == "localhost",
        Some(Host::Ipv4(ip)) => ip.is_loopback(),
        Some(Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}

fn docs_url_on(url: &str, hosts: &[String]) -> bool {
    parse_web_url(url).is_some_and(|u| {
        u.host_str().is_some_and(|h| hosts.iter().any(|allowed| allowed == h))
            && is_docs_path(u.path())
    })
}

fn is_docs_path(path: &str) -> bool {
    path.starts_with("/docs/")
        || path.starts_with("/tutorials/")
        || path.contains("/learning-journeys/")
}

fn is_local_docs_path(path: &str) -> bool {
    path == "/docs"
        || path == "/tutorials"
        || is_docs_path(path)
}
