//! The trust rule applied to every URL a response passes through.

use pathfinder::trust::TrustPolicy;
use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HopRefusal {
    #[error("Redirect target is not in trusted domain list")]
    Untrusted,
    #[error("Redirect to non-HTTPS URL blocked for security")]
    Insecure,
}

/// Content-source trust plus https, with one addition over
/// [`TrustPolicy::classify_content_source`]: absolute URLs that look like
/// proxy paths only count on the proxy's own origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectGuard {
    policy: TrustPolicy,
    proxy_origin: Option<Url>,
}

impl RedirectGuard {
    pub fn new(policy: TrustPolicy, proxy_origin: Option<Url>) -> Self {
        Self {
            policy,
            proxy_origin,
        }
    }

    pub fn is_trusted(&self, url: &str) -> bool {
        is_trusted_source(&self.policy, self.proxy_origin.as_ref(), url)
    }

    pub fn check(&self, url: &str) -> Result<(), HopRefusal> {
        check_hop(&self.policy, self.proxy_origin.as_ref(), url)
    }
}

pub(crate) fn is_trusted_source(policy: &TrustPolicy, proxy_origin: Option<&Url>, url: &str) -> bool {
    if let Ok(parsed) = Url::parse(url)
        && policy.is_proxy_url(url)
    {
        return proxy_origin.is_some_and(|origin| origin.origin() == parsed.origin());
    }
    policy.classify_content_source(url)
}

pub(crate) fn check_hop(
    policy: &TrustPolicy,
    proxy_origin: Option<&Url>,
    url: &str,
) -> Result<(), HopRefusal> {
    if !is_trusted_source(policy, proxy_origin, url) {
        return Err(HopRefusal::Untrusted);
    }
    if !policy.enforce_https(url) {
        return Err(HopRefusal::Insecure);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    // facet_testhelpers::test unavailable offline; std #[test] is used instead

    const PROXIED: &str = "api/plugin-proxy/grafana-pathfinder-app/github-raw/intro/content.json";

    #[test]
    fn proxy_paths_count_only_on_the_proxy_origin() {
        let origin = Url::parse("https://grafana.example.com/").unwrap();
        let guard = RedirectGuard::new(TrustPolicy::default(), Some(origin));

        assert_eq!(guard.check(&format!("https://grafana.example.com/{PROXIED}")), Ok(()));
        assert_eq!(
            guard.check(&format!("https://evil.example.com/{PROXIED}")),
            Err(HopRefusal::Untrusted)
        );

        let without_proxy = RedirectGuard::new(TrustPolicy::default(), None);
        assert!(!without_proxy.is_trusted(&format!("https://grafana.example.com/{PROXIED}")));
    }

    #[test]
    fn hops_need_a_trusted_https_url() {
        let guard = RedirectGuard::new(TrustPolicy::default(), None);
        assert_eq!(guard.check("https://grafana.com/docs/grafana/latest/"), Ok(()));
        assert_eq!(
            guard.check("http://grafana.com/docs/grafana/latest/"),
            Err(HopRefusal::Insecure)
        );
        assert_eq!(guard.check("https://evil.example.com/docs/"), Err(HopRefusal::Untrusted));
    }
}
