//! Landmark index: bulk insert and the voting query

use crate::db::songs;
use crate::error::{Error, Result};
use crate::fingerprint::Landmark;
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use tracing::{debug, warn};

/// Rows per insert transaction
pub const CHUNK_SIZE: usize = 10_000;

/// Attempts per chunk before the whole call fails
pub const MAX_RETRIES: u32 = 3;

/// Tunables of the voting query. Per-call parameters, not global
/// configuration.
#[derive(Debug, Clone)]
pub struct MatchParams {
    /// Maximum candidates returned
    pub limit: i64,
    /// Minimum matching rows for a candidate to qualify
    pub min_votes: i64,
    /// Minimum `votes / query_len` for a candidate to qualify
    pub min_confidence: f64,
}

impl Default for MatchParams {
    fn default() -> Self {
        Self {
            limit: 3,
            min_votes: 20,
            min_confidence: 0.15,
        }
    }
}

/// A ranked match candidate.
#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    pub song_id: i64,
    pub song_name: String,
    pub video_id: Option<String>,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub album_art: Option<String>,
    pub webpage_url: Option<String>,
    pub votes: i64,
    pub confidence: f64,
}

/// Insert a song's landmarks in chunks of [`CHUNK_SIZE`].
///
/// One transaction per chunk; a failed chunk is rolled back and retried
/// up to [`MAX_RETRIES`] times, and exhaustion fails the entire call.
/// After every chunk lands, the song's `fingerprinted` flag is flipped;
/// that update failing is logged but does not fail the call — the data
/// is present and the flag is advisory.
pub async fn bulk_insert_fingerprints(
    pool: &SqlitePool,
    landmarks: &[Landmark],
    song_id: i64,
) -> Result<()> {
    for (chunk_index, chunk) in landmarks.chunks(CHUNK_SIZE).enumerate() {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match insert_chunk(pool, chunk, song_id).await {
                Ok(()) => break,
                Err(e) if attempt < MAX_RETRIES => {
                    warn!(
                        song_id,
                        chunk_index, attempt, "Fingerprint chunk failed, retrying: {}", e
                    );
                }
                Err(e) => {
                    return Err(Error::Storage(format!(
                        "fingerprint chunk {} for song {} failed after {} retries: {}",
                        chunk_index, song_id, MAX_RETRIES, e
                    )));
                }
            }
        }
    }

    debug!(song_id, count = landmarks.len(), "Fingerprints committed");

    if let Err(e) = songs::mark_fingerprinted(pool, song_id).await {
        warn!(song_id, "Failed to mark song as fingerprinted: {}", e);
    }

    Ok(())
}

async fn insert_chunk(pool: &SqlitePool, chunk: &[Landmark], song_id: i64) -> Result<()> {
    let mut tx = pool.begin().await?;

    for landmark in chunk {
        sqlx::query("INSERT INTO fingerprints (hash, song_id, time_offset) VALUES (?, ?, ?)")
            .bind(&landmark.hash[..])
            .bind(song_id)
            .bind(landmark.anchor_time as i64)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Rank reference tracks by how many query hashes they share.
///
/// `votes` counts matching fingerprint rows; `confidence` is
/// `votes / query_len`. Candidates must clear both thresholds and come
/// back ordered `(votes DESC, confidence DESC)`, at most `limit` rows.
/// An empty query returns an empty list without touching the store; a
/// query with no qualifying candidates returns an empty list, not an
/// error.
pub async fn find_matches(
    pool: &SqlitePool,
    query: &[Landmark],
    params: &MatchParams,
) -> Result<Vec<Candidate>> {
    if query.is_empty() {
        return Ok(Vec::new());
    }

    let total = query.len() as f64;
    let mut tx = pool.begin().await?;

    // The query hashes go through a temp table so the join stays a
    // single indexed lookup per row. Scoped to this transaction: a
    // failure rolls the table away with everything else.
    sqlx::query("CREATE TEMP TABLE query_hashes (hash BLOB NOT NULL, query_offset INTEGER NOT NULL)")
        .execute(&mut *tx)
        .await?;

    for landmark in query {
        sqlx::query("INSERT INTO query_hashes (hash, query_offset) VALUES (?, ?)")
            .bind(&landmark.hash[..])
            .bind(landmark.anchor_time as i64)
            .execute(&mut *tx)
            .await?;
    }

    let rows = sqlx::query(
        r#"
        SELECT
            s.song_id, s.song_name, s.video_id, s.title, s.artist,
            s.album, s.album_art, s.webpage_url,
            COUNT(*) AS votes,
            CAST(COUNT(*) AS REAL) / ? AS confidence
        FROM fingerprints f
        JOIN query_hashes q ON f.hash = q.hash
        JOIN songs s ON s.song_id = f.song_id
        GROUP BY s.song_id
        HAVING COUNT(*) >= ? AND CAST(COUNT(*) AS REAL) / ? >= ?
        ORDER BY votes DESC, confidence DESC
        LIMIT ?
        "#,
    )
    .bind(total)
    .bind(params.min_votes)
    .bind(total)
    .bind(params.min_confidence)
    .bind(params.limit)
    .fetch_all(&mut *tx)
    .await?;

    sqlx::query("DROP TABLE query_hashes").execute(&mut *tx).await?;
    tx.commit().await?;

    let candidates = rows
        .into_iter()
        .map(|row| Candidate {
            song_id: row.get("song_id"),
            song_name: row.get("song_name"),
            video_id: row.get("video_id"),
            title: row.get("title"),
            artist: row.get("artist"),
            album: row.get("album"),
            album_art: row.get("album_art"),
            webpage_url: row.get("webpage_url"),
            votes: row.get("votes"),
            confidence: row.get("confidence"),
        })
        .collect();

    Ok(candidates)
}
