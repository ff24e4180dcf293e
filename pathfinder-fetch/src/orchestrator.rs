//! Multi-candidate retrieval that re-checks trust after every hop.
//!
//! Attempts are strictly sequential. Whatever URL a response finally came
//! from is classified again before its body is used, so a trusted URL that
//! redirects somewhere else never yields content.

use std::time::Duration;

use pathfinder::normalize::RawBody;
use pathfinder::trust::{TrustPolicy, is_github_raw_url, is_github_url};
use url::Url;

use crate::bundled::BundledCatalog;
use crate::candidates::{
    Candidate, Route, candidates, classify_resource, content_urls, is_json_content_url,
    strip_query,
};
use crate::error::{FetchError, FetchErrorKind};
use crate::guard::{RedirectGuard, check_hop, is_trusted_source};
use crate::transport::{HttpRequest, HttpResponse, Transport};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_USER_AGENT: &str = "Grafana-Docs-Plugin/1.0";

const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.5";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    /// Applies to each attempt separately
    pub timeout: Duration,
    /// Sent with every request; override the defaults on direct docs fetches
    pub headers: Vec<(String, String)>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            headers: Vec::new(),
        }
    }
}

/// A body that survived every trust check, and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedBody {
    pub body: RawBody,
    pub final_url: String,
}

impl FetchedBody {
    fn new(body: String, final_url: String, native_json: bool) -> Self {
        let body = if native_json {
            RawBody::NativeJson(body)
        } else {
            RawBody::Html(body)
        };
        Self { body, final_url }
    }
}

/// How one direct attempt ended.
enum Attempt {
    Fetched(FetchedBody),
    /// Worth falling back to other candidates
    Failed(FetchError),
    /// A trust or format decision that no fallback may override
    Refused(FetchError),
}

/// Fetches guide content from trusted origins.
///
/// `Send + Sync` whenever the transport is, so one instance can serve
/// concurrent callers.
#[derive(Debug)]
pub struct ContentFetcher<T> {
    pub(crate) transport: T,
    pub(crate) policy: TrustPolicy,
    pub(crate) proxy_origin: Option<Url>,
    pub(crate) user_agent: String,
    pub(crate) options: FetchOptions,
    pub(crate) bundled: Option<BundledCatalog>,
}

impl<T: Transport> ContentFetcher<T> {
    pub fn new(transport: T, policy: TrustPolicy) -> Self {
        Self {
            transport,
            policy,
            proxy_origin: None,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            options: FetchOptions::default(),
            bundled: None,
        }
    }

    /// Origin the proxy route is served from. Without one, no proxy
    /// candidates are tried and proxy paths cannot be fetched.
    pub fn with_proxy_origin(mut self, origin: Url) -> Self {
        self.proxy_origin = Some(origin);
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Options used by [`ContentFetcher::fetch_content`].
    pub fn with_options(mut self, options: FetchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_bundled(mut self, catalog: BundledCatalog) -> Self {
        self.bundled = Some(catalog);
        self
    }

    pub fn policy(&self) -> &TrustPolicy {
        &self.policy
    }

    pub fn options(&self) -> &FetchOptions {
        &self.options
    }

    /// Fetch the raw body behind `url`.
    ///
    /// github.com pages go straight to their candidate list. Anything else is
    /// fetched directly first; raw GitHub URLs then fall back to their
    /// remaining candidates.
    pub async fn fetch_raw(
        &self,
        url: &str,
        options: &FetchOptions,
    ) -> Result<FetchedBody, FetchError> {
        let shape = classify_resource(url);

        if is_github_url(url)
            && let Some(shape) = &shape
        {
            let list = candidates(shape, &self.policy, self.proxy_origin.is_some());
            debug!(url, candidates = list.len(), "trying GitHub candidates");
            return self.try_candidates(&list, options).await;
        }

        let minimal_headers = is_github_raw_url(url) || self.policy.is_proxy_url(url);
        let headers = if minimal_headers {
            options.headers.clone()
        } else {
            self.browser_headers(options)
        };

        let error = match self.attempt(url, &headers, options).await {
            Attempt::Fetched(body) => return Ok(body),
            Attempt::Refused(error) => return Err(error),
            Attempt::Failed(error) => error,
        };

        if let Some(shape) = &shape {
            let remaining: Vec<Candidate> =
                candidates(shape, &self.policy, self.proxy_origin.is_some())
                    .into_iter()
                    .filter(|candidate| candidate.url != url)
                    .collect();
            if !remaining.is_empty() {
                debug!(url, "direct fetch failed, trying remaining candidates");
                if let Ok(body) = self.try_candidates(&remaining, options).await {
                    return Ok(body);
                }
            }
        }

        warn!(url, error = %error, "fetch failed");
        Err(error)
    }

    /// Try candidates in order. 404s are skipped silently; anything else
    /// is remembered and the last such error returned when all fail.
    async fn try_candidates(
        &self,
        list: &[Candidate],
        options: &FetchOptions,
    ) -> Result<FetchedBody, FetchError> {
        let mut last_error = None;

        for candidate in list {
            let Some(url) = self.resolve(candidate) else {
                debug!(url = %candidate.url, "no proxy origin, skipping candidate");
                continue;
            };
            let response = match self.send(&url, &options.headers, options).await {
                Ok(response) => response,
                Err(error) => {
                    debug!(url = %url, error = %error, "candidate failed");
                    last_error = Some(error);
                    continue;
                }
            };

            if response.status == 404 {
                debug!(url = %url, "candidate not found");
                continue;
            }
            if !response.is_success() {
                last_error = Some(FetchError::from_status(
                    response.status,
                    &response.status_text,
                ));
                continue;
            }
            if !response.has_content() {
                last_error = Some(FetchError::other(format!("Empty response from {url}")));
                continue;
            }
            if let Err(error) = self.check_final(&url, &response.url) {
                last_error = Some(error);
                continue;
            }

            let native_json = candidate.is_json() || is_json_content_url(&response.url);
            return Ok(FetchedBody::new(response.body, response.url, native_json));
        }

        Err(last_error.unwrap_or_else(FetchError::no_content))
    }

    async fn attempt(
        &self,
        url: &str,
        headers: &[(String, String)],
        options: &FetchOptions,
    ) -> Attempt {
        let request_url = match self.absolute(url) {
            Ok(request_url) => request_url,
            Err(error) => return Attempt::Refused(error),
        };
        let response = match self.send(&request_url, headers, options).await {
            Ok(response) => response,
            Err(error) => return Attempt::Failed(error),
        };

        if response.is_success() {
            if !response.has_content() {
                return Attempt::Failed(FetchError::other(format!(
                    "Empty response from {request_url}"
                )));
            }
            if let Err(error) = self.check_final(&request_url, &response.url) {
                return Attempt::Refused(error);
            }
            if self.policy.is_docs_url(&response.url) {
                return self.prefer_docs_formats(response, headers, options).await;
            }
            let native_json =
                is_json_content_url(&response.url) || is_json_content_url(&request_url);
            return Attempt::Fetched(FetchedBody::new(response.body, response.url, native_json));
        }

        if response.is_redirect() {
            return self
                .follow_manual_redirect(&request_url, response, headers, options)
                .await;
        }

        let error = FetchError::from_status(response.status, &response.status_text);
        warn!(url = %request_url, error = %error, "fetch failed");
        Attempt::Failed(error)
    }

    /// Documentation pages: prefer the page's `content.json`, then its
    /// `unstyled.html`. The page that was fetched is only used when it is
    /// itself one of those two files.
    async fn prefer_docs_formats(
        &self,
        page: HttpResponse,
        headers: &[(String, String)],
        options: &FetchOptions,
    ) -> Attempt {
        let (json_url, html_url) = content_urls(&page.url);
        let page_file = strip_query(&page.url).trim_end_matches('/');

        if page_file == json_url {
            return Attempt::Fetched(FetchedBody::new(page.body, page.url, true));
        }
        if let Ok(response) = self.send(&json_url, headers, options).await
            && response.has_content()
            && self.check_final(&json_url, &response.url).is_ok()
        {
            return Attempt::Fetched(FetchedBody::new(response.body, response.url, true));
        }
        debug!(url = %json_url, "no usable content.json, trying unstyled.html");

        if page_file == html_url {
            return Attempt::Fetched(FetchedBody::new(page.body, page.url, false));
        }
        match self.send(&html_url, headers, options).await {
            Ok(response) if response.has_content() => {
                match self.check_final(&html_url, &response.url) {
                    Ok(()) => Attempt::Fetched(FetchedBody::new(
                        response.body,
                        response.url,
                        false,
                    )),
                    Err(error) => Attempt::Refused(error),
                }
            }
            Ok(response) => {
                let kind = if response.status == 404 {
                    FetchErrorKind::NotFound
                } else {
                    FetchErrorKind::Other
                };
                Attempt::Refused(
                    FetchError::new(
                        kind,
                        format!(
                            "Cannot load Grafana content. Neither content.json nor unstyled.html found at: {}",
                            page.url
                        ),
                    )
                    .with_status(response.status),
                )
            }
            Err(error) => Attempt::Refused(FetchError::other(format!(
                "Cannot load Grafana content. Content fetch failed: {error}"
            ))),
        }
    }

    /// A 3xx the transport did not follow. The target must stay on the same
    /// origin and pass the trust checks; it gets exactly one follow-up fetch.
    async fn follow_manual_redirect(
        &self,
        request_url: &str,
        response: HttpResponse,
        headers: &[(String, String)],
        options: &FetchOptions,
    ) -> Attempt {
        let status = response.status;
        let Some(location) = response.location else {
            return Attempt::Failed(
                FetchError::other(format!(
                    "Redirect response (status {status}) but no Location header"
                ))
                .with_status(status),
            );
        };

        let Ok(base) = Url::parse(request_url) else {
            return Attempt::Failed(FetchError::other(format!(
                "Cannot resolve redirect from {request_url}"
            )));
        };
        let target = match base.join(&location) {
            Ok(target) => target,
            Err(e) => {
                return Attempt::Failed(FetchError::other(format!(
                    "Invalid redirect location {location}: {e}"
                )));
            }
        };
        if target.origin() != base.origin() {
            warn!(from = request_url, to = %target, "cross-origin redirect blocked");
            return Attempt::Failed(FetchError::other(format!(
                "Cross-origin redirect blocked for security: {}",
                target.origin().ascii_serialization()
            )));
        }
        let target = target.to_string();
        if let Err(error) = self.check_final(request_url, &target) {
            return Attempt::Failed(error);
        }

        debug!(from = request_url, to = %target, "following manual redirect");
        match self.send(&target, headers, options).await {
            Ok(follow_up) if follow_up.has_content() => {
                if let Err(error) = self.check_final(&target, &follow_up.url) {
                    return Attempt::Refused(error);
                }
                let native_json =
                    is_json_content_url(&follow_up.url) || is_json_content_url(&target);
                Attempt::Fetched(FetchedBody::new(follow_up.body, follow_up.url, native_json))
            }
            Ok(_) => Attempt::Failed(
                FetchError::other(format!("Redirect to {location} (status {status})"))
                    .with_status(status),
            ),
            Err(error) => Attempt::Failed(error),
        }
    }

    /// Re-validate where a request ended up.
    pub(crate) fn check_final(&self, requested: &str, final_url: &str) -> Result<(), FetchError> {
        check_hop(&self.policy, self.proxy_origin.as_ref(), final_url).map_err(|refusal| {
            warn!(requested, final_url, refusal = %refusal, "redirect target refused");
            FetchError::other(refusal.to_string())
        })
    }

    pub(crate) fn is_trusted_final(&self, url: &str) -> bool {
        is_trusted_source(&self.policy, self.proxy_origin.as_ref(), url)
    }

    /// The rule [`ContentFetcher::check_final`] applies, for transports that
    /// can check each redirect hop themselves.
    pub fn redirect_guard(&self) -> RedirectGuard {
        RedirectGuard::new(self.policy.clone(), self.proxy_origin.clone())
    }

    /// Request URL for a candidate; proxy paths need a proxy origin.
    fn resolve(&self, candidate: &Candidate) -> Option<String> {
        match candidate.route {
            Route::Direct => Some(candidate.url.clone()),
            Route::Proxy => self.proxy_url(&candidate.url),
        }
    }

    fn proxy_url(&self, path: &str) -> Option<String> {
        let origin = self.proxy_origin.as_ref()?;
        origin
            .join(path.trim_start_matches('/'))
            .ok()
            .map(String::from)
    }

    /// Absolute form of a URL handed to [`ContentFetcher::fetch_raw`].
    fn absolute(&self, url: &str) -> Result<String, FetchError> {
        if Url::parse(url).is_ok() {
            return Ok(url.to_owned());
        }
        if self.policy.is_proxy_url(url) {
            return self.proxy_url(url).ok_or_else(|| {
                FetchError::other(format!("No proxy origin configured for {url}"))
            });
        }
        Err(FetchError::other(format!("Invalid URL: {url}")))
    }

    fn browser_headers(&self, options: &FetchOptions) -> Vec<(String, String)> {
        let mut headers = vec![
            ("Accept".to_owned(), ACCEPT.to_owned()),
            ("Accept-Language".to_owned(), ACCEPT_LANGUAGE.to_owned()),
            ("User-Agent".to_owned(), self.user_agent.clone()),
        ];
        for (name, value) in &options.headers {
            headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
            headers.push((name.clone(), value.clone()));
        }
        headers
    }

    pub(crate) async fn send(
        &self,
        url: &str,
        headers: &[(String, String)],
        options: &FetchOptions,
    ) -> Result<HttpResponse, FetchError> {
        let request = HttpRequest {
            url: url.to_owned(),
            headers: headers.to_vec(),
            timeout: options.timeout,
        };
        self.transport
            .get(request)
            .await
            .map_err(|e| FetchError::from_transport(&e))
    }
}
