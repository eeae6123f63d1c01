use super::{SongStore, StoreError};
use crate::library::models::{Group, Song, SongFilter};
use anyhow::Context;
use async_trait::async_trait;
use rusqlite::functions::FunctionFlags;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create dir {}", parent.display()))?;
        }

        let conn = Connection::open(path).with_context(|| format!("open {}", path.display()))?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory database")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> anyhow::Result<Self> {
        register_functions(&conn)?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn run<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| StoreError::Worker("connection lock poisoned".into()))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| StoreError::Worker(e.to_string()))?
    }
}

/// `fold(x)`: Unicode lowercase, so `LIKE` ignores case beyond ASCII.
fn register_functions(conn: &Connection) -> anyhow::Result<()> {
    conn.create_scalar_function(
        "fold",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let value: Option<String> = ctx.get(0)?;
            Ok(value.map(|v| v.to_lowercase()))
        },
    )
    .context("register fold()")?;
    Ok(())
}

fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute_batch(
        r#"
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS groups (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS songs (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  group_name TEXT NOT NULL REFERENCES groups(name),
  song TEXT NOT NULL,
  text TEXT NOT NULL DEFAULT '',
  link TEXT NOT NULL DEFAULT '',
  releasedate TEXT NOT NULL DEFAULT ''
);

CREATE INDEX IF NOT EXISTS idx_songs_group_name ON songs(group_name);
"#,
    )
    .context("init schema")?;
    Ok(())
}

/// Single-statement upsert so concurrent creates never race on the group row.
/// Returns the existing row when the name is already taken.
fn ensure_group(conn: &Connection, name: &str) -> Result<Group, StoreError> {
    let group = conn.query_row(
        r#"
INSERT INTO groups(name) VALUES(?1)
ON CONFLICT(name) DO UPDATE SET name = excluded.name
RETURNING id, name
"#,
        params![name],
        |row| {
            Ok(Group {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        },
    )?;
    Ok(group)
}

fn insert_song(conn: &mut Connection, song: &Song) -> Result<i64, StoreError> {
    let tx = conn.transaction()?;
    let group = ensure_group(&tx, &song.group_name)?;
    tracing::trace!(group_id = ?group.id, group = %group.name, "group ensured");
    tx.execute(
        r#"
INSERT INTO songs(group_name, song, text, link, releasedate)
VALUES(?1, ?2, ?3, ?4, ?5)
"#,
        params![
            song.group_name,
            song.song,
            song.text,
            song.link,
            song.release_date
        ],
    )?;
    let id = tx.last_insert_rowid();
    tx.commit()?;
    Ok(id)
}

fn update_song(conn: &mut Connection, song: &Song) -> Result<bool, StoreError> {
    let tx = conn.transaction()?;
    ensure_group(&tx, &song.group_name)?;
    let changed = tx.execute(
        r#"
UPDATE songs
SET song = ?1, group_name = ?2, text = ?3, link = ?4, releasedate = ?5
WHERE id = ?6
"#,
        params![
            song.song,
            song.group_name,
            song.text,
            song.link,
            song.release_date,
            song.id
        ],
    )?;
    if changed == 0 {
        // Dropping the transaction rolls back the group upsert.
        return Err(StoreError::NotFound);
    }
    tx.commit()?;
    Ok(true)
}

fn delete_song(conn: &Connection, id: i64) -> Result<i64, StoreError> {
    let changed = conn.execute("DELETE FROM songs WHERE id = ?1", params![id])?;
    if changed == 0 {
        return Err(StoreError::NotFound);
    }
    Ok(id)
}

fn find_songs(conn: &Connection, filter: &SongFilter) -> Result<Vec<Song>, StoreError> {
    let mut stmt = conn.prepare_cached(
        r#"
SELECT s.id, s.song, g.name, s.text, s.link, s.releasedate
FROM songs s
JOIN groups g ON s.group_name = g.name
WHERE (?1 IS NULL OR fold(g.name) LIKE '%' || fold(?1) || '%' ESCAPE '\')
  AND (?2 IS NULL OR fold(s.song) LIKE '%' || fold(?2) || '%' ESCAPE '\')
  AND (?3 IS NULL OR s.id = ?3)
  AND (?4 IS NULL OR s.releasedate = ?4)
LIMIT ?5 OFFSET ?6
"#,
    )?;

    let group = filter.group_name.as_deref().map(escape_like);
    let title = filter.song.as_deref().map(escape_like);

    let songs = stmt
        .query_map(
            params![
                group,
                title,
                filter.id,
                filter.release_date,
                i64::from(filter.limit),
                i64::from(filter.offset)
            ],
            |row| {
                Ok(Song {
                    id: row.get(0)?,
                    song: row.get(1)?,
                    group_name: row.get(2)?,
                    text: row.get(3)?,
                    link: row.get(4)?,
                    release_date: row.get(5)?,
                })
            },
        )?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(songs)
}

/// Escape LIKE wildcards so user input matches literally.
fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[async_trait]
impl SongStore for SqliteStore {
    async fn create_song(&self, song: &Song) -> Result<i64, StoreError> {
        tracing::debug!(song = %song.song, group_name = %song.group_name, "creating song");
        let song = song.clone();
        let id = self.run(move |conn| insert_song(conn, &song)).await?;
        tracing::debug!(song_id = id, "song created");
        Ok(id)
    }

    async fn update_song(&self, song: &Song) -> Result<bool, StoreError> {
        tracing::debug!(song_id = song.id, song = %song.song, "updating song");
        let song = song.clone();
        self.run(move |conn| update_song(conn, &song)).await
    }

    async fn delete_song(&self, song: &Song) -> Result<i64, StoreError> {
        tracing::debug!(song_id = song.id, "deleting song");
        let id = song.id;
        self.run(move |conn| delete_song(conn, id)).await
    }

    async fn find_songs(&self, filter: &SongFilter) -> Result<Vec<Song>, StoreError> {
        tracing::debug!(?filter, "finding songs");
        let filter = filter.clone();
        let songs = self.run(move |conn| find_songs(conn, &filter)).await?;
        tracing::debug!(count = songs.len(), "songs fetched");
        Ok(songs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn song(group: &str, title: &str, text: &str, date: &str) -> Song {
        Song {
            id: 0,
            group_name: group.to_string(),
            song: title.to_string(),
            text: text.to_string(),
            link: format!("https://example.com/{title}"),
            release_date: date.to_string(),
        }
    }

    fn group_count(store: &SqliteStore, name: &str) -> i64 {
        let conn = store.conn.lock().unwrap();
        conn.query_row(
            "SELECT COUNT(*) FROM groups WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )
        .unwrap()
    }

    async fn seeded() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .create_song(&song("Muse", "Supermassive Black Hole", "a\nb\nc", "16.07.2006"))
            .await
            .unwrap();
        store
            .create_song(&song("Muse", "Uprising", "x\ny", "07.09.2009"))
            .await
            .unwrap();
        store
            .create_song(&song("Radiohead", "Creep", "c1", "21.09.1992"))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_create_assigns_ids_and_upserts_group_once() {
        let store = SqliteStore::open_in_memory().unwrap();
        let a = store.create_song(&song("New Group", "One", "", "")).await.unwrap();
        let b = store.create_song(&song("New Group", "Two", "", "")).await.unwrap();
        assert!(b > a);
        assert_eq!(group_count(&store, "New Group"), 1);
    }

    #[tokio::test]
    async fn test_find_without_filters_returns_limit_rows() {
        let store = seeded().await;
        let all = store.find_songs(&SongFilter::default()).await.unwrap();
        assert_eq!(all.len(), 3);

        let two = store
            .find_songs(&SongFilter::default().with_page(2, 0))
            .await
            .unwrap();
        assert_eq!(two.len(), 2);

        let skipped = store
            .find_songs(&SongFilter::default().with_page(10, 2))
            .await
            .unwrap();
        assert_eq!(skipped.len(), 1);
    }

    #[tokio::test]
    async fn test_find_contains_case_insensitive() {
        let store = seeded().await;
        let muse = store
            .find_songs(&SongFilter::new("mUS", "", "", 0))
            .await
            .unwrap();
        assert_eq!(muse.len(), 2);
        assert!(muse.iter().all(|s| s.group_name == "Muse"));

        let hole = store
            .find_songs(&SongFilter::new("", "black hole", "", 0))
            .await
            .unwrap();
        assert_eq!(hole.len(), 1);
        assert_eq!(hole[0].song, "Supermassive Black Hole");
        assert_eq!(hole[0].text, "a\nb\nc");

        store
            .create_song(&song("Кино", "Группа крови", "", "05.01.1988"))
            .await
            .unwrap();
        let kino = store
            .find_songs(&SongFilter::new("КИНО", "", "", 0))
            .await
            .unwrap();
        assert_eq!(kino.len(), 1);
        assert_eq!(kino[0].group_name, "Кино");
        let blood = store
            .find_songs(&SongFilter::new("", "группа", "", 0))
            .await
            .unwrap();
        assert_eq!(blood.len(), 1);
        assert_eq!(blood[0].song, "Группа крови");
    }

    #[test]
    fn test_ensure_group_returns_same_row() {
        let store = SqliteStore::open_in_memory().unwrap();
        let conn = store.conn.lock().unwrap();
        let first = ensure_group(&conn, "Кино").unwrap();
        let again = ensure_group(&conn, "Кино").unwrap();
        assert!(first.id.is_some());
        assert_eq!(first, again);
        assert_eq!(first.name, "Кино");
    }

    #[tokio::test]
    async fn test_find_exact_date_and_id() {
        let store = seeded().await;
        let by_date = store
            .find_songs(&SongFilter::new("", "", "07.09.2009", 0))
            .await
            .unwrap();
        assert_eq!(by_date.len(), 1);
        assert_eq!(by_date[0].song, "Uprising");

        let partial_date = store
            .find_songs(&SongFilter::new("", "", "2009", 0))
            .await
            .unwrap();
        assert!(partial_date.is_empty());

        let id = by_date[0].id;
        let by_id = store.find_songs(&SongFilter::new("", "", "", id)).await.unwrap();
        assert_eq!(by_id, by_date);
    }

    #[tokio::test]
    async fn test_find_treats_wildcards_literally() {
        let store = seeded().await;
        store
            .create_song(&song("100%_Pure", "Track", "", ""))
            .await
            .unwrap();
        let hits = store
            .find_songs(&SongFilter::new("%", "", "", 0))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].group_name, "100%_Pure");
    }

    #[tokio::test]
    async fn test_update_existing_and_missing() {
        let store = seeded().await;
        let mut uprising = store
            .find_songs(&SongFilter::new("", "Uprising", "", 0))
            .await
            .unwrap()
            .remove(0);
        uprising.group_name = "Muse (Live)".into();
        uprising.text = "live".into();
        assert!(store.update_song(&uprising).await.unwrap());
        assert_eq!(group_count(&store, "Muse (Live)"), 1);
        // Other songs keep their group.
        assert_eq!(group_count(&store, "Muse"), 1);

        let fetched = store
            .find_songs(&SongFilter::new("", "", "", uprising.id))
            .await
            .unwrap();
        assert_eq!(fetched, vec![uprising]);

        let missing = song("Ghost", "Nope", "", "");
        let err = store
            .update_song(&Song { id: 999, ..missing })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
        assert_eq!(group_count(&store, "Ghost"), 0);
    }

    #[tokio::test]
    async fn test_delete_keeps_group() {
        let store = seeded().await;
        let creep = store
            .find_songs(&SongFilter::new("Radiohead", "", "", 0))
            .await
            .unwrap()
            .remove(0);
        assert_eq!(store.delete_song(&creep).await.unwrap(), creep.id);
        assert_eq!(group_count(&store, "Radiohead"), 1);

        let err = store.delete_song(&creep).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[tokio::test]
    async fn test_concurrent_creates_share_group() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .create_song(&song("Fresh", &format!("Song {i}"), "", ""))
                    .await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }
        assert_eq!(group_count(&store, "Fresh"), 1);
        let all = store
            .find_songs(&SongFilter::new("Fresh", "", "", 0).with_page(100, 0))
            .await
            .unwrap();
        assert_eq!(all.len(), 8);
    }

    #[test]
    fn test_open_file_creates_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("songs.db");
        SqliteStore::open(&path).unwrap();
        // Reopening applies the schema again without error.
        SqliteStore::open(&path).unwrap();
        assert!(path.exists());
    }
}
