//! `fetch_content`: from a URL to a normalized guide plus page metadata.

use chrono::{DateTime, Utc};
use pathfinder::metadata::{
    ContentMetadata, ContentType, determine_content_type, extract_title, single_doc_metadata,
    split_hash_fragment,
};
use pathfinder::normalize::{NormalizedGuide, RawBody, normalize};
use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde_json::Value;
use thiserror::Error;

use crate::bundled::BundledError;
use crate::error::{FetchError, FetchErrorKind};
use crate::orchestrator::{ContentFetcher, FetchOptions};
use crate::transport::Transport;

const UNTRUSTED_SOURCE: &str =
    "Only Grafana.com documentation, approved GitHub repositories, and data proxy URLs can be loaded";
const UNTRUSTED_SOURCE_DEV: &str = "Only Grafana.com documentation, any GitHub repositories (dev mode), localhost URLs (dev mode), approved GitHub repositories, and data proxy URLs can be loaded";

/// A fetched document, ready for [`pathfinder::parse_json_guide`].
#[derive(Debug, Clone, PartialEq)]
pub struct RawContent {
    pub content: NormalizedGuide,
    pub metadata: ContentMetadata,
    pub content_type: ContentType,
    /// Final URL after redirects; relative links resolve against it
    pub url: String,
    pub last_fetched: DateTime<Utc>,
    pub hash_fragment: Option<String>,
}

impl RawContent {
    pub fn is_native_json(&self) -> bool {
        self.content.is_native_json()
    }
}

impl Serialize for RawContent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("RawContent", 7)?;
        state.serialize_field("content", self.content.as_str())?;
        state.serialize_field("metadata", &self.metadata)?;
        state.serialize_field("type", &self.content_type)?;
        state.serialize_field("url", &self.url)?;
        state.serialize_field("lastFetched", &self.last_fetched)?;
        if let Some(fragment) = &self.hash_fragment {
            state.serialize_field("hashFragment", fragment)?;
        } else {
            state.skip_field("hashFragment")?;
        }
        state.serialize_field("isNativeJson", &self.is_native_json())?;
        state.end()
    }
}

/// Why `fetch_content` produced nothing. `Display` is the message to show a
/// user; [`ContentError::detail`] keeps the underlying cause for logs.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("Invalid URL provided")]
    InvalidUrl,
    #[error("{}", if *dev_mode { UNTRUSTED_SOURCE_DEV } else { UNTRUSTED_SOURCE })]
    UntrustedSource { dev_mode: bool },
    #[error("Only HTTPS URLs are allowed for security")]
    InsecureUrl,
    #[error("{}", .0.kind.user_message())]
    Fetch(FetchError),
    #[error(transparent)]
    Bundled(#[from] BundledError),
}

impl ContentError {
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            ContentError::Fetch(error) => error.kind,
            _ => FetchErrorKind::Other,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            ContentError::Fetch(error) => error.status_code,
            _ => None,
        }
    }

    pub fn detail(&self) -> String {
        match self {
            ContentError::Fetch(error) => error.message.clone(),
            other => other.to_string(),
        }
    }
}

impl<T: Transport> ContentFetcher<T> {
    /// Fetch `url` with the fetcher's default options.
    pub async fn fetch_content(&self, url: &str) -> Result<RawContent, ContentError> {
        self.fetch_content_with(url, &self.options).await
    }

    pub async fn fetch_content_with(
        &self,
        url: &str,
        options: &FetchOptions,
    ) -> Result<RawContent, ContentError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(ContentError::InvalidUrl);
        }

        if pathfinder::trust::is_bundled_url(url) {
            let catalog = self.bundled.as_ref().ok_or(BundledError::Unavailable)?;
            return Ok(catalog.load(url).await?);
        }

        let (clean_url, fragment) = split_hash_fragment(url);
        if !self.is_trusted_final(clean_url) {
            warn!(url, "refusing to fetch from untrusted source");
            return Err(ContentError::UntrustedSource {
                dev_mode: self.policy.dev_mode,
            });
        }
        if !self.policy.enforce_https(clean_url) {
            return Err(ContentError::InsecureUrl);
        }

        let content_type = determine_content_type(url);
        let fetched = self
            .fetch_raw(clean_url, options)
            .await
            .map_err(ContentError::Fetch)?;
        let final_url = fetched.final_url;

        let metadata = self
            .extract_metadata(&fetched.body, &final_url, content_type, options)
            .await;
        let normalized = normalize(fetched.body, &final_url, &metadata.title);
        if let Some(warning) = &normalized.warning {
            debug!(url = %final_url, warning = %warning, "content normalized with a warning");
        }

        Ok(RawContent {
            content: normalized.guide,
            metadata,
            content_type,
            url: final_url,
            last_fetched: Utc::now(),
            hash_fragment: fragment.map(str::to_owned),
        })
    }

    async fn extract_metadata(
        &self,
        body: &RawBody,
        url: &str,
        content_type: ContentType,
        options: &FetchOptions,
    ) -> ContentMetadata {
        let text = body.as_str();
        let mut metadata = ContentMetadata::titled(page_title(body));
        match content_type {
            ContentType::LearningJourney => {
                metadata.learning_journey = Some(self.journey_metadata(text, url, options).await);
            }
            ContentType::SingleDoc => {
                metadata.single_doc = Some(single_doc_metadata(text));
            }
        }
        metadata
    }
}

/// A native guide names itself; pages are scraped.
fn page_title(body: &RawBody) -> String {
    if let RawBody::NativeJson(text) = body
        && let Ok(value) = serde_json::from_str::<Value>(text)
        && let Some(title) = value.get("title").and_then(Value::as_str)
        && !title.is_empty()
    {
        return title.to_owned();
    }
    extract_title(body.as_str())
}
