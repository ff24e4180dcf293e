//! Learning-journey metadata: the milestone index lives next to the pages.

use pathfinder::metadata::{
    LearningJourneyMetadata, Milestone, journey_base_url, journey_index_url, journey_metadata,
    milestones_from_index,
};
use serde_json::Value;

use crate::orchestrator::{ContentFetcher, FetchOptions};
use crate::transport::Transport;

impl<T: Transport> ContentFetcher<T> {
    /// Metadata for the journey page at `url`. A missing or broken index
    /// leaves the journey without milestones rather than failing the page.
    pub async fn journey_metadata(
        &self,
        html: &str,
        url: &str,
        options: &FetchOptions,
    ) -> LearningJourneyMetadata {
        let milestones = self.fetch_milestones(&journey_base_url(url), options).await;
        journey_metadata(html, url, milestones)
    }

    /// Milestones from `<base_url>/index.json`, trust-checked like any
    /// other fetch.
    pub async fn fetch_milestones(&self, base_url: &str, options: &FetchOptions) -> Vec<Milestone> {
        let index_url = journey_index_url(base_url);
        if !self.is_trusted_final(&index_url) || !self.policy.enforce_https(&index_url) {
            warn!(url = %index_url, "journey index is not on a trusted origin");
            return Vec::new();
        }

        let response = match self.send(&index_url, &options.headers, options).await {
            Ok(response) => response,
            Err(error) => {
                warn!(url = %index_url, error = %error, "failed to fetch journey index");
                return Vec::new();
            }
        };
        if !response.is_success() {
            warn!(url = %index_url, status = response.status, "journey index unavailable");
            return Vec::new();
        }
        if self.check_final(&index_url, &response.url).is_err() {
            return Vec::new();
        }

        match serde_json::from_str::<Value>(&response.body) {
            Ok(index) => milestones_from_index(&index, base_url),
            Err(error) => {
                warn!(url = %index_url, error = %error, "journey index is not JSON");
                Vec::new()
            }
        }
    }
}
