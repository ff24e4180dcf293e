//! Fetcher configuration, loaded from TOML.
//!
//! ```toml
//! timeout_ms = 10000
//! proxy_origin = "https://grafana.example.com/"
//! bundled_dir = "bundled-interactives"
//!
//! [headers]
//! X-Grafana-Org-Id = "1"
//!
//! [trust]
//! dev_mode = false
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use pathfinder::trust::TrustPolicy;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::bundled::BundledCatalog;
use crate::guard::RedirectGuard;
use crate::orchestrator::{ContentFetcher, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT, FetchOptions};
use crate::transport::Transport;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read fetch config from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid fetch config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("timeout_ms must be greater than zero")]
    ZeroTimeout,
    #[error("proxy_origin must be an http(s) URL, got {0}")]
    ProxyOrigin(Url),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchConfig {
    pub timeout_ms: u64,
    pub user_agent: String,
    /// Origin the backend proxy route is served from
    pub proxy_origin: Option<Url>,
    /// Directory holding bundled guides and their `index.json`
    pub bundled_dir: Option<PathBuf>,
    /// Extra headers sent with every request
    pub headers: BTreeMap<String, String>,
    pub trust: TrustPolicy,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            proxy_origin: None,
            bundled_dir: None,
            headers: BTreeMap::new(),
            trust: TrustPolicy::default(),
        }
    }
}

impl FetchConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if let Some(origin) = &self.proxy_origin
            && !matches!(origin.scheme(), "http" | "https")
        {
            return Err(ConfigError::ProxyOrigin(origin.clone()));
        }
        Ok(())
    }

    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            timeout: Duration::from_millis(self.timeout_ms),
            headers: self
                .headers
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
        }
    }

    /// The per-hop redirect rule for a transport serving this configuration.
    pub fn redirect_guard(&self) -> RedirectGuard {
        RedirectGuard::new(self.trust.clone(), self.proxy_origin.clone())
    }

    /// A fetcher over `transport` configured from this file.
    pub fn fetcher<T: Transport>(&self, transport: T) -> ContentFetcher<T> {
        let mut fetcher = ContentFetcher::new(transport, self.trust.clone())
            .with_user_agent(self.user_agent.clone())
            .with_options(self.fetch_options());
        if let Some(origin) = &self.proxy_origin {
            fetcher = fetcher.with_proxy_origin(origin.clone());
        }
        if let Some(dir) = &self.bundled_dir {
            fetcher = fetcher.with_bundled(BundledCatalog::new(dir));
        }
        fetcher
    }
}
