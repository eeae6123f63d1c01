//! HTTP client for the `/info` metadata provider

use super::{EnrichmentError, MetadataProvider};
use crate::library::models::Song;
use anyhow::Context;
use async_trait::async_trait;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct InfoClient {
    client: reqwest::Client,
    base_url: String,
}

impl InfoClient {
    const USER_AGENT: &'static str = concat!("songlib/", env!("CARGO_PKG_VERSION"));

    /// `base_url` may be a bare `host:port`; `http://` is assumed then.
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(Self::USER_AGENT)
            .timeout(timeout)
            .build()
            .context("build reqwest client")?;

        Ok(Self {
            client,
            base_url: normalize_base_url(base_url),
        })
    }

    fn info_url(&self, title: &str, group_name: &str) -> String {
        format!(
            "{}/info?group={}&song={}",
            self.base_url,
            urlencoding::encode(group_name),
            urlencoding::encode(title)
        )
    }
}

fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    }
}

#[async_trait]
impl MetadataProvider for InfoClient {
    async fn fetch_details(&self, title: &str, group_name: &str) -> Result<Song, EnrichmentError> {
        let url = self.info_url(title, group_name);
        tracing::debug!(%url, "fetching song details");

        let response = self.client.get(&url).send().await.inspect_err(|e| {
            tracing::error!(error = %e, "info request failed");
        })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            tracing::error!(%status, "info provider returned non-OK status");
            return Err(EnrichmentError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        if body.is_empty() {
            tracing::error!("info provider returned an empty body");
            return Err(EnrichmentError::EmptyBody);
        }

        let details: Song = serde_json::from_slice(&body).inspect_err(|e| {
            tracing::error!(error = %e, "failed to decode info response");
        })?;
        tracing::debug!(song = %details.song, link = %details.link, "song details received");
        Ok(details)
    }
}
