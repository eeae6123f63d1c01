//! Song library core: data model, verse paging and the song service.

pub mod models;
pub mod service;
pub mod verses;

pub use models::{Song, SongFilter};
pub use service::{ServiceError, SongService};
pub use verses::PagingMode;
