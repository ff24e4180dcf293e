//! Content retrieval for pathfinder.
//!
//! [`ContentFetcher`] takes a documentation or guide URL and returns a
//! [`RawContent`] whose body is always a JSON guide. On the way it:
//! - refuses sources the [`TrustPolicy`](pathfinder::TrustPolicy) does not
//!   admit, before any request is made
//! - tries the candidate locations of GitHub content in a fixed order
//! - re-checks trust on every redirect hop and on the URL each response
//!   finally came from
//! - prefers `content.json` over `unstyled.html` for documentation pages
//!
//! The network sits behind [`Transport`]; [`ReqwestTransport`] is the default
//! implementation.
//!
//! # Example
//!
//! ```rust,no_run
//! use pathfinder_fetch::{FetchConfig, ReqwestTransport};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = FetchConfig::from_toml_str("timeout_ms = 5000")?;
//! let fetcher = config.fetcher(ReqwestTransport::new(config.redirect_guard())?);
//! let content = fetcher
//!     .fetch_content("https://grafana.com/docs/grafana/latest/")
//!     .await?;
//! println!("{} ({})", content.metadata.title, content.url);
//! # Ok(())
//! # }
//! ```

#[macro_use]
mod tracing_macros;

pub mod bundled;
pub mod candidates;
pub mod config;
pub mod content;
pub mod error;
pub mod guard;
pub mod journey;
pub mod orchestrator;
pub mod transport;

pub use bundled::{BundledCatalog, BundledEntry, BundledError};
pub use candidates::{Candidate, ResourceShape, Route};
pub use config::{ConfigError, FetchConfig};
pub use content::{ContentError, RawContent};
pub use error::{FetchError, FetchErrorKind};
pub use guard::{HopRefusal, RedirectGuard};
pub use orchestrator::{ContentFetcher, FetchOptions, FetchedBody};
#[cfg(feature = "reqwest")]
pub use transport::ReqwestTransport;
pub use transport::{HttpRequest, HttpResponse, Transport, TransportError};
