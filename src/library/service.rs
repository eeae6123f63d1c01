use super::models::{Song, SongFilter};
use super::verses::{self, PageOutOfRange, PagingMode};
use crate::enrich::{EnrichmentError, MetadataProvider};
use crate::storage::{SongStore, StoreError};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("invalid input: {0}")]
    Validation(&'static str),
    #[error("enrichment failed: {0}")]
    Enrichment(#[from] EnrichmentError),
    #[error("storage failed: {0}")]
    Storage(StoreError),
    #[error("song not found")]
    NotFound,
    #[error(transparent)]
    PageOutOfRange(#[from] PageOutOfRange),
}

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => ServiceError::NotFound,
            other => ServiceError::Storage(other),
        }
    }
}

/// Song operations behind the HTTP layer. Holds no per-request state.
#[derive(Clone)]
pub struct SongService {
    store: Arc<dyn SongStore>,
    provider: Arc<dyn MetadataProvider>,
    paging: PagingMode,
}

impl SongService {
    pub fn new(
        store: Arc<dyn SongStore>,
        provider: Arc<dyn MetadataProvider>,
        paging: PagingMode,
    ) -> Self {
        Self {
            store,
            provider,
            paging,
        }
    }

    /// Enrich, persist and return the song under its new id.
    ///
    /// Nothing is written if enrichment fails.
    pub async fn create(&self, song: Song) -> Result<Song, ServiceError> {
        if song.song.is_empty() {
            return Err(ServiceError::Validation("song title is required"));
        }
        if song.group_name.is_empty() {
            return Err(ServiceError::Validation("group name is required"));
        }

        let details = self
            .provider
            .fetch_details(&song.song, &song.group_name)
            .await?;

        let mut merged = Song {
            id: 0,
            group_name: song.group_name,
            song: song.song,
            text: details.text,
            link: details.link,
            release_date: details.release_date,
        };
        merged.id = self.store.create_song(&merged).await?;
        tracing::info!(song_id = merged.id, song = %merged.song, group_name = %merged.group_name, "song created");
        Ok(merged)
    }

    pub async fn update(&self, song: Song) -> Result<bool, ServiceError> {
        if song.group_name.is_empty() {
            return Err(ServiceError::Validation("group name is required"));
        }
        let ok = self.store.update_song(&song).await?;
        tracing::info!(song_id = song.id, "song updated");
        Ok(ok)
    }

    pub async fn delete(&self, song: Song) -> Result<i64, ServiceError> {
        let id = self.store.delete_song(&song).await?;
        tracing::info!(song_id = id, "song deleted");
        Ok(id)
    }

    pub async fn list(&self, filter: &SongFilter) -> Result<Vec<Song>, ServiceError> {
        Ok(self.store.find_songs(filter).await?)
    }

    /// Verses of the first song matching `filter`.
    ///
    /// `offset` is the row offset the HTTP layer derived from the requested
    /// page; see [`PagingMode`] for how it selects the verse window.
    pub async fn verses(
        &self,
        filter: SongFilter,
        page_size: u32,
        offset: u32,
    ) -> Result<Vec<String>, ServiceError> {
        tracing::debug!(?filter, page_size, offset, mode = ?self.paging, "fetching verses");

        let (row_offset, window_start, window_size) = match self.paging {
            PagingMode::Legacy => (offset, offset as usize, page_size as usize),
            PagingMode::Page => {
                let size = page_size.max(1);
                (0, (offset / size) as usize, size as usize)
            }
        };

        let songs = self
            .store
            .find_songs(&filter.with_page(page_size.max(1), row_offset))
            .await?;

        // Several matches narrow to the first; callers pass an id to pick one.
        let Some(song) = songs.into_iter().next() else {
            return Err(ServiceError::NotFound);
        };

        let all = verses::segment(&song.text);
        let w = verses::window(all.len(), window_size, window_start)?;
        tracing::debug!(song_id = song.id, total = all.len(), start = w.start, end = w.end, "verse window");

        Ok(all[w.start..w.end].to_vec())
    }
}
