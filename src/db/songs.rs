//! Song metadata persistence

use crate::error::{Error, Result};
use sqlx::{Row, SqlitePool};
use tracing::warn;

/// Attempts per metadata write before giving up with a storage error
pub const MAX_RETRIES: u32 = 3;

/// Metadata for a reference track, as provided by the downloader.
///
/// The unique key is `song_name`, falling back to `title` when no
/// explicit name is given.
#[derive(Debug, Clone, Default)]
pub struct SongMetadata {
    pub song_name: Option<String>,
    pub video_id: Option<String>,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub album_art: Option<String>,
    pub webpage_url: Option<String>,
}

impl SongMetadata {
    /// The unique name this song is keyed by.
    pub fn resolved_name(&self) -> Option<&str> {
        self.song_name.as_deref().or(self.title.as_deref())
    }
}

/// A persisted song row.
#[derive(Debug, Clone)]
pub struct Song {
    pub song_id: i64,
    pub song_name: String,
    pub video_id: Option<String>,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub album_art: Option<String>,
    pub webpage_url: Option<String>,
    pub fingerprinted: bool,
}

/// Upsert a song by name and return its id.
///
/// On a name conflict the existing row wins and its id is returned.
/// Each attempt runs in its own transaction; after [`MAX_RETRIES`]
/// failed attempts the call fails with `Storage`.
pub async fn insert_song(
    pool: &SqlitePool,
    metadata: &SongMetadata,
    fingerprinted: bool,
) -> Result<i64> {
    let song_name = metadata
        .resolved_name()
        .ok_or_else(|| Error::External("track metadata has neither song name nor title".into()))?
        .to_string();

    let mut last_error = None;

    for attempt in 1..=MAX_RETRIES {
        match try_insert_song(pool, &song_name, metadata, fingerprinted).await {
            Ok(song_id) => return Ok(song_id),
            Err(e) => {
                warn!(
                    song_name = %song_name,
                    attempt,
                    max_retries = MAX_RETRIES,
                    "Failed to insert song: {}",
                    e
                );
                last_error = Some(e);
            }
        }
    }

    Err(Error::Storage(format!(
        "failed to insert song '{}' after {} retries: {}",
        song_name,
        MAX_RETRIES,
        last_error.map_or_else(|| "unknown".to_string(), |e| e.to_string())
    )))
}

async fn try_insert_song(
    pool: &SqlitePool,
    song_name: &str,
    metadata: &SongMetadata,
    fingerprinted: bool,
) -> Result<i64> {
    let mut tx = pool.begin().await?;

    let inserted = sqlx::query(
        r#"
        INSERT INTO songs
            (song_name, video_id, title, artist, album, album_art, webpage_url, fingerprinted)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(song_name) DO NOTHING
        RETURNING song_id
        "#,
    )
    .bind(song_name)
    .bind(&metadata.video_id)
    .bind(&metadata.title)
    .bind(&metadata.artist)
    .bind(&metadata.album)
    .bind(&metadata.album_art)
    .bind(&metadata.webpage_url)
    .bind(fingerprinted)
    .fetch_optional(&mut *tx)
    .await?;

    let song_id = match inserted {
        Some(row) => row.get("song_id"),
        None => {
            // Name conflict: the song already exists, return its id
            let row = sqlx::query("SELECT song_id FROM songs WHERE song_name = ?")
                .bind(song_name)
                .fetch_one(&mut *tx)
                .await?;
            row.get("song_id")
        }
    };

    tx.commit().await?;
    Ok(song_id)
}

/// Flip the advisory `fingerprinted` flag once all landmark rows for a
/// song are committed.
pub async fn mark_fingerprinted(pool: &SqlitePool, song_id: i64) -> Result<()> {
    sqlx::query("UPDATE songs SET fingerprinted = 1 WHERE song_id = ?")
        .bind(song_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Load a song row by id.
pub async fn load_song(pool: &SqlitePool, song_id: i64) -> Result<Option<Song>> {
    let row = sqlx::query(
        r#"
        SELECT song_id, song_name, video_id, title, artist, album,
               album_art, webpage_url, fingerprinted
        FROM songs
        WHERE song_id = ?
        "#,
    )
    .bind(song_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| Song {
        song_id: row.get("song_id"),
        song_name: row.get("song_name"),
        video_id: row.get("video_id"),
        title: row.get("title"),
        artist: row.get("artist"),
        album: row.get("album"),
        album_art: row.get("album_art"),
        webpage_url: row.get("webpage_url"),
        fingerprinted: row.get::<i64, _>("fingerprinted") != 0,
    }))
}
