//! Persistent song storage
//!
//! The service only talks to [`SongStore`]; [`SqliteStore`] is the adapter
//! used by the binary.

pub mod sqlite;

pub use sqlite::SqliteStore;

use crate::library::models::{Song, SongFilter};
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("song not found")]
    NotFound,
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("storage worker failed: {0}")]
    Worker(String),
}

#[async_trait]
pub trait SongStore: Send + Sync {
    /// Insert a song, creating its group if needed. Returns the new id.
    async fn create_song(&self, song: &Song) -> Result<i64, StoreError>;

    /// Overwrite the song with `song.id`.
    async fn update_song(&self, song: &Song) -> Result<bool, StoreError>;

    /// Remove the song with `song.id`. Returns the removed id.
    async fn delete_song(&self, song: &Song) -> Result<i64, StoreError>;

    async fn find_songs(&self, filter: &SongFilter) -> Result<Vec<Song>, StoreError>;
}
