//! Song metadata enrichment
//!
//! At creation time the service asks an external provider for the lyrics,
//! link and release date of a `(song, group)` pair.

pub mod client;

pub use client::InfoClient;

use crate::library::models::Song;
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum EnrichmentError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("provider returned status {0}")]
    Status(u16),
    #[error("empty response body")]
    EmptyBody,
    #[error("decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

#[async_trait]
pub trait MetadataProvider: Send + Sync {
    async fn fetch_details(&self, title: &str, group_name: &str) -> Result<Song, EnrichmentError>;
}

const STUB_TEXT: &str = "first verse\n\nsecond verse\n\nthird verse\n\nfourth verse\n\n";
const STUB_LINK: &str = "https://www.youtube.com/watch?v=HRbW75fYLvo&t=326629s";

/// Placeholder details served by the built-in `/info` endpoint.
pub fn stub_details(title: &str, group_name: &str, today: time::Date) -> Song {
    let format = time::macros::format_description!("[day].[month].[year]");
    Song {
        id: 0,
        group_name: group_name.to_string(),
        song: title.to_string(),
        text: STUB_TEXT.to_string(),
        link: STUB_LINK.to_string(),
        release_date: today.format(&format).unwrap_or_default(),
    }
}
