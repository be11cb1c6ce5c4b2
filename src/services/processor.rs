//! Job bodies: the match and ingest pipelines
//!
//! Both pipelines run inside exactly one worker. CPU-bound stages
//! (decode, STFT, peak picking, hashing) and subprocess calls run under
//! `spawn_blocking`; only database transactions await in place.

use crate::audio;
use crate::db::{self, Candidate, MatchParams};
use crate::error::{Error, Result};
use crate::fingerprint::{self, Landmark};
use crate::services::downloader::{TrackDescriptor, TrackSource};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Peak amplitude below which a capture counts as silence
pub const SILENCE_FLOOR: f32 = 1e-3;

/// Maximum hashes sent to the voting query per match
pub const MAX_QUERY_HASHES: usize = 5_000;

/// Deletes an audio file when dropped, on every exit path of the job
/// that owns it.
pub struct TempAudio {
    path: PathBuf,
}

impl TempAudio {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl Drop for TempAudio {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed audio file {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove audio file {}: {}", self.path.display(), e),
        }
    }
}

/// Match an unknown excerpt against the index.
///
/// Decode, reject silence, fingerprint, subsample to at most
/// [`MAX_QUERY_HASHES`] landmarks, and run the voting query. The caller
/// owns deletion of `audio_path`.
pub async fn run_match(pool: &SqlitePool, audio_path: &Path) -> Result<Vec<Candidate>> {
    let landmarks = fingerprint_file(audio_path.to_path_buf(), true).await?;
    let query = sample_landmarks(landmarks, MAX_QUERY_HASHES);

    debug!(hashes = query.len(), "Querying index");
    db::find_matches(pool, &query, &MatchParams::default()).await
}

/// Ingest every music track behind a URL.
///
/// Tracks are processed sequentially inside the one batch job; a
/// failing track is logged and skipped. The batch fails only when no
/// track could be resolved at all, or when every track failed with a
/// storage fault.
pub async fn run_ingest(
    pool: &SqlitePool,
    source: Arc<dyn TrackSource>,
    url: &str,
) -> Result<Vec<i64>> {
    let tracks = {
        let source = Arc::clone(&source);
        let url = url.to_string();
        spawn_blocking(move || source.fetch(&url)).await?
    }?;

    if tracks.is_empty() {
        return Err(Error::External(format!(
            "no ingestible music tracks found at {url}"
        )));
    }

    let mut song_ids = Vec::new();
    let mut failures = 0usize;
    let mut storage_failures = 0usize;

    for track in tracks {
        match ingest_track(pool, Arc::clone(&source), &track).await {
            Ok(song_id) => {
                info!(title = %track.title, song_id, "Track ingested");
                song_ids.push(song_id);
            }
            Err(e) => {
                warn!(title = %track.title, "Track ingest failed: {}", e);
                failures += 1;
                if e.is_storage() {
                    storage_failures += 1;
                }
            }
        }
    }

    if song_ids.is_empty() && failures > 0 && storage_failures == failures {
        return Err(Error::Storage(format!(
            "all {failures} tracks failed to persist"
        )));
    }

    Ok(song_ids)
}

/// Download, fingerprint, and persist one track. The downloaded audio
/// is deleted whether or not the track makes it into the index.
async fn ingest_track(
    pool: &SqlitePool,
    source: Arc<dyn TrackSource>,
    track: &TrackDescriptor,
) -> Result<i64> {
    // Guard first: a failed download can still leave a partial file.
    let _audio = TempAudio::new(track.audio_path.clone());

    {
        let source = Arc::clone(&source);
        let track = track.clone();
        spawn_blocking(move || source.download(&track)).await??;
    }

    let landmarks = fingerprint_file(track.audio_path.clone(), false).await?;
    debug!(title = %track.title, count = landmarks.len(), "Generated landmarks");

    let song_id = db::insert_song(pool, &track.metadata(), false).await?;
    db::bulk_insert_fingerprints(pool, &landmarks, song_id).await?;

    Ok(song_id)
}

/// Decode and fingerprint a file on a blocking thread.
async fn fingerprint_file(path: PathBuf, reject_silence: bool) -> Result<Vec<Landmark>> {
    spawn_blocking(move || {
        let samples = audio::decode_file(&path)?;
        if reject_silence {
            let peak = fingerprint::peak_amplitude(&samples);
            if peak < SILENCE_FLOOR {
                return Err(Error::SilentInput(peak));
            }
        }
        Ok(fingerprint::fingerprint_samples(&samples))
    })
    .await?
}

/// Uniformly sample at most `max` landmarks without replacement.
fn sample_landmarks(landmarks: Vec<Landmark>, max: usize) -> Vec<Landmark> {
    if landmarks.len() <= max {
        return landmarks;
    }
    let mut rng = rand::thread_rng();
    rand::seq::index::sample(&mut rng, landmarks.len(), max)
        .into_iter()
        .map(|i| landmarks[i])
        .collect()
}

/// `tokio::task::spawn_blocking` with join faults folded into the crate
/// error type.
async fn spawn_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Internal(format!("worker task failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::hashing::HASH_LEN;
    use std::collections::HashSet;

    fn landmark(n: u32) -> Landmark {
        let mut hash = [0u8; HASH_LEN];
        hash[..4].copy_from_slice(&n.to_be_bytes());
        Landmark {
            hash,
            anchor_time: n,
        }
    }

    #[test]
    fn small_sets_are_passed_through_unsampled() {
        let landmarks: Vec<_> = (0..100).map(landmark).collect();
        let sampled = sample_landmarks(landmarks.clone(), MAX_QUERY_HASHES);
        assert_eq!(sampled, landmarks);
    }

    #[test]
    fn oversized_sets_are_sampled_without_replacement() {
        let landmarks: Vec<_> = (0..8_000).map(landmark).collect();
        let sampled = sample_landmarks(landmarks, 5_000);
        assert_eq!(sampled.len(), 5_000);

        let distinct: HashSet<u32> = sampled.iter().map(|l| l.anchor_time).collect();
        assert_eq!(distinct.len(), 5_000, "sampling must not repeat landmarks");
    }

    #[test]
    fn temp_audio_removes_the_file_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scratch.wav");
        std::fs::write(&path, b"not really audio").unwrap();
        {
            let _guard = TempAudio::new(path.clone());
        }
        assert!(!path.exists());
    }

    #[test]
    fn temp_audio_tolerates_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let _guard = TempAudio::new(dir.path().join("never-created.wav"));
    }
}
