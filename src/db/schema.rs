//! Index schema
//!
//! Created idempotently at connect time. The hash column is an opaque
//! blob: widening past the current 10 bytes needs no migration of
//! existing rows.

use crate::error::Result;
use sqlx::SqlitePool;
use tracing::debug;

/// Create tables and indexes if they do not exist yet.
pub async fn initialize_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS songs (
            song_id INTEGER PRIMARY KEY AUTOINCREMENT,
            song_name TEXT NOT NULL UNIQUE,
            video_id TEXT,
            title TEXT,
            artist TEXT,
            album TEXT,
            album_art TEXT,
            webpage_url TEXT,
            fingerprinted INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS fingerprints (
            hash BLOB NOT NULL,
            song_id INTEGER NOT NULL REFERENCES songs(song_id),
            time_offset INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // The voting query is an equi-join on hash; this index is what makes
    // it a lookup instead of a scan.
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_fingerprints_hash ON fingerprints(hash)")
        .execute(pool)
        .await?;

    debug!("Schema initialized");
    Ok(())
}
