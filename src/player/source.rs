//! Clip source: the client side of the delivery endpoint.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;
use url::Url;

use super::error::{PlaybackError, PlaybackResult};
use crate::core::{CLIP_INDEX_HEADER, LAST_CLIP_INDEX_HEADER, SlotIndex};

/// One delivered clip before decoding
#[derive(Debug, Clone)]
pub struct FetchedClip {
    pub index: SlotIndex,
    pub bytes: Bytes,
}

/// Where the engine gets its clips from
#[async_trait]
pub trait ClipSource: Send + Sync {
    /// Request one clip, asking the server to avoid `exclude`.
    async fn fetch(&self, exclude: Option<SlotIndex>) -> PlaybackResult<FetchedClip>;
}

/// [`ClipSource`] over the HTTP delivery endpoint
pub struct HttpClipSource {
    client: reqwest::Client,
    url: Url,
}

impl HttpClipSource {
    pub fn new(url: &str, timeout: Duration) -> PlaybackResult<Self> {
        let url = Url::parse(url)
            .map_err(|e| PlaybackError::DeliveryFailure(format!("Invalid stream URL '{url}': {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PlaybackError::DeliveryFailure(e.to_string()))?;
        Ok(Self { client, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

/// Parse the served slot. Its absence is a protocol violation, never slot 0.
fn parse_clip_index(headers: &reqwest::header::HeaderMap) -> PlaybackResult<SlotIndex> {
    let raw = headers.get(CLIP_INDEX_HEADER).ok_or_else(|| {
        PlaybackError::DeliveryFailure("response is missing the X-Clip-Index header".to_string())
    })?;
    raw.to_str()
        .ok()
        .and_then(|s| s.trim().parse::<usize>().ok())
        .map(SlotIndex::new)
        .ok_or_else(|| PlaybackError::DeliveryFailure(format!("invalid X-Clip-Index header: {raw:?}")))
}

#[async_trait]
impl ClipSource for HttpClipSource {
    async fn fetch(&self, exclude: Option<SlotIndex>) -> PlaybackResult<FetchedClip> {
        let mut request = self.client.get(self.url.clone());
        if let Some(slot) = exclude {
            request = request
                .query(&[("exclude", slot.get())])
                .header(LAST_CLIP_INDEX_HEADER, slot.to_string());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PlaybackError::DeliveryFailure(format!(
                "server returned {}: {}",
                status.as_u16(),
                body.trim()
            )));
        }

        let index = parse_clip_index(response.headers())?;
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(PlaybackError::DeliveryFailure(format!(
                "server returned an empty clip for slot {index}"
            )));
        }

        debug!(slot = %index, bytes = bytes.len(), "Clip fetched");
        Ok(FetchedClip { index, bytes })
    }
}
