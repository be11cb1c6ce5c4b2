//! Persistent fingerprint index
//!
//! Two tables: `songs` (one row per reference track) and `fingerprints`
//! (the inverted landmark index, thousands of rows per song). Backed by
//! sqlx/SQLite; `DB_URL` selects the database file.

pub mod fingerprints;
pub mod schema;
pub mod songs;

pub use fingerprints::{bulk_insert_fingerprints, find_matches, Candidate, MatchParams};
pub use songs::{insert_song, SongMetadata};

use crate::error::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tracing::debug;

/// Connect to the index and initialize the schema.
///
/// The pool is sized to the job worker pool: each running job holds at
/// most one connection, so more would idle.
pub async fn connect(db_url: &str, max_connections: u32) -> Result<SqlitePool> {
    debug!("Connecting to database: {}", db_url);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect(db_url)
        .await?;

    schema::initialize_schema(&pool).await?;

    Ok(pool)
}
