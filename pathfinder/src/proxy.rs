//! The backend proxy route that serves allowlisted GitHub content.
//!
//! The plugin backend mounts one GitHub repository (at one ref) under
//! `api/plugin-proxy/<plugin_id>/<route>/`. Requests through it are same-origin
//! for the UI and never leave the allowlisted repo.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::trust::{GITHUB_RAW_HOST, path_segments};

/// Where the proxy route lives and which repository it serves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProxyRoute {
    pub plugin_id: String,
    pub route: String,
    /// `/owner/repo/`, same shape as the GitHub allowlist entries
    pub repo: String,
    pub git_ref: String,
}

impl Default for ProxyRoute {
    fn default() -> Self {
        Self {
            plugin_id: "grafana-pathfinder-app".to_owned(),
            route: "github-raw".to_owned(),
            repo: "/grafana/interactive-tutorials/".to_owned(),
            git_ref: "main".to_owned(),
        }
    }
}

impl ProxyRoute {
    /// `api/plugin-proxy/<plugin_id>/<route>/<file>`, no leading slash.
    pub fn route_path(&self, file: &str) -> String {
        format!(
            "api/plugin-proxy/{}/{}/{}",
            self.plugin_id,
            self.route,
            file.trim_start_matches('/')
        )
    }

    /// Whether `url` addresses anything below this plugin's proxy prefix.
    ///
    /// Accepts relative (`api/...`), rooted (`/api/...`) and absolute http(s)
    /// forms; only the path is inspected. Dot segments are refused so a
    /// relative path cannot climb out of the prefix.
    pub fn is_proxy_path(&self, url: &str) -> bool {
        let path = match Url::parse(url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => parsed.path().to_owned(),
            Ok(_) => return false,
            Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_owned(),
        };

        let mut segments = path.trim_start_matches('/').split('/');
        let prefix_matches = segments.next() == Some("api")
            && segments.next() == Some("plugin-proxy")
            && segments.next() == Some(self.plugin_id.as_str());
        if !prefix_matches {
            return false;
        }

        let rest: Vec<&str> = segments.collect();
        rest.iter().any(|s| !s.is_empty())
            && !rest.iter().any(|s| {
                let lower = s.to_ascii_lowercase();
                lower == "." || lower == ".." || lower.contains("%2e")
            })
    }

    /// Map an allowlisted raw GitHub URL onto the proxy route.
    ///
    /// Only URLs on the route's own repo and ref convert; anything else would
    /// be served from the wrong repository.
    pub fn proxy_path_for_raw(&self, raw_url: &str) -> Option<String> {
        let url = Url::parse(raw_url).ok()?;
        if url.scheme() != "https" || url.host_str() != Some(GITHUB_RAW_HOST) {
            return None;
        }
        let segments = path_segments(&url);
        if segments.len() < 4 {
            return None;
        }
        let repo = format!("/{}/{}/", segments[0], segments[1]);
        if repo != self.repo || segments[2] != self.git_ref {
            return None;
        }
        Some(self.route_path(&segments[3..].join("/")))
    }

    /// Inverse of [`ProxyRoute::proxy_path_for_raw`].
    pub fn raw_url_for_proxy(&self, proxy_path: &str) -> Option<String> {
        let prefix = format!("api/plugin-proxy/{}/{}/", self.plugin_id, self.route);
        let file = proxy_path
            .trim_start_matches('/')
            .strip_prefix(prefix.as_str())?;
        if file.is_empty() {
            return None;
        }
        Some(format!(
            "https://{GITHUB_RAW_HOST}{}{}/{}",
            self.repo, self.git_ref, file
        ))
    }
}
