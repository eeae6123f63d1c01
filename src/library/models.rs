use serde::{Deserialize, Serialize};

/// A song as stored in the library and exchanged over HTTP.
///
/// Every field falls back to its default when missing from the JSON body, so
/// a create request only needs `song` and `group_name`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Song {
    pub id: i64,
    pub group_name: String,
    pub song: String,
    pub text: String,
    pub link: String,
    #[serde(rename = "releasedate")]
    pub release_date: String,
}

/// Performing artist, created implicitly the first time a song names it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: Option<i64>,
    pub name: String,
}

/// Optional predicates plus row pagination for a song lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SongFilter {
    pub group_name: Option<String>,
    pub song: Option<String>,
    pub release_date: Option<String>,
    pub id: Option<i64>,
    pub limit: u32,
    pub offset: u32,
}

impl SongFilter {
    pub const DEFAULT_LIMIT: u32 = 10;

    /// Builds a filter from raw request values. Empty strings and a zero id
    /// mean "match any".
    pub fn new(group_name: &str, song: &str, release_date: &str, id: i64) -> Self {
        Self {
            group_name: non_empty(group_name),
            song: non_empty(song),
            release_date: non_empty(release_date),
            id: (id != 0).then_some(id),
            limit: Self::DEFAULT_LIMIT,
            offset: 0,
        }
    }

    pub fn with_page(mut self, limit: u32, offset: u32) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }
}

impl Default for SongFilter {
    fn default() -> Self {
        Self::new("", "", "", 0)
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}
