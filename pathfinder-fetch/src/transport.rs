//! The seam between the orchestrator and the network.
//!
//! The orchestrator only ever issues GETs through [`Transport`], so tests can
//! script responses without a server and a host can plug in its own client.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Absolute http(s) URL
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub status_text: String,
    /// URL after any redirects the transport followed
    pub url: String,
    pub location: Option<String>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }

    /// A 2xx with something other than whitespace in it.
    pub fn has_content(&self) -> bool {
        self.is_success() && !self.body.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Connect(String),
    #[error("invalid request URL: {0}")]
    InvalidUrl(String),
    #[error("{0}")]
    Other(String),
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

#[cfg(feature = "reqwest")]
pub use self::reqwest_transport::ReqwestTransport;

#[cfg(feature = "reqwest")]
mod reqwest_transport {
    use super::*;
    use crate::guard::RedirectGuard;

    /// Redirect hops followed before giving up.
    const MAX_REDIRECTS: usize = 20;

    /// [`Transport`] over a rustls `reqwest::Client`.
    ///
    /// Redirects are followed one hop at a time and each hop must pass the
    /// guard. A refused hop is not requested; its 3xx is handed back to the
    /// caller, which decides what to do with the `Location`.
    #[derive(Debug, Clone)]
    pub struct ReqwestTransport {
        client: reqwest::Client,
    }

    impl ReqwestTransport {
        pub fn new(guard: RedirectGuard) -> Result<Self, TransportError> {
            let client = reqwest::Client::builder()
                .redirect(redirect_policy(guard))
                .build()
                .map_err(|e| TransportError::Other(e.to_string()))?;
            Ok(Self { client })
        }

        /// Use a client as is, redirect policy included.
        pub fn with_client(client: reqwest::Client) -> Self {
            Self { client }
        }
    }

    fn redirect_policy(guard: RedirectGuard) -> reqwest::redirect::Policy {
        reqwest::redirect::Policy::custom(move |attempt| {
            if attempt.previous().len() > MAX_REDIRECTS {
                return attempt.error("too many redirects");
            }
            match guard.check(attempt.url().as_str()) {
                Ok(()) => attempt.follow(),
                Err(refusal) => {
                    warn!(to = %attempt.url(), refusal = %refusal, "redirect hop refused");
                    attempt.stop()
                }
            }
        })
    }

    #[async_trait]
    impl Transport for ReqwestTransport {
        async fn get(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            let mut builder = self.client.get(&request.url).timeout(request.timeout);
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }

            let map_error = |e: reqwest::Error| {
                if e.is_timeout() {
                    TransportError::Timeout(request.timeout)
                } else if e.is_connect() {
                    TransportError::Connect(e.to_string())
                } else if e.is_builder() {
                    TransportError::InvalidUrl(request.url.clone())
                } else {
                    TransportError::Other(e.to_string())
                }
            };

            let response = builder.send().await.map_err(map_error)?;
            let status = response.status();
            let url = response.url().to_string();
            let location = response
                .headers()
                .get(reqwest::header::LOCATION)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned);
            let body = response.text().await.map_err(map_error)?;

            Ok(HttpResponse {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or_default().to_owned(),
                url,
                location,
                body,
            })
        }
    }
}
