//! Downloader collaborator
//!
//! Given a URL, produces zero or more track descriptors and fetches
//! their audio as WAV files. The production implementation shells out
//! to `yt-dlp`; the trait seam lets tests substitute local files.

use crate::db::SongMetadata;
use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info};

/// Title substrings that disqualify a track (case-insensitive).
///
/// Lyric videos, live cuts, and speed-shifted re-uploads fingerprint
/// differently from the studio recording they claim to be.
pub const REJECT_KEYWORDS: &[&str] =
    &["lyric", "lyrics", "live", "remix", "slowed", "sped", "cover"];

/// One downloadable reference track.
#[derive(Debug, Clone)]
pub struct TrackDescriptor {
    pub video_id: Option<String>,
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub album_art: Option<String>,
    pub duration: Option<f64>,
    pub webpage_url: Option<String>,
    pub tags: Vec<String>,
    /// Where `download` will place the WAV audio
    pub audio_path: PathBuf,
}

impl TrackDescriptor {
    /// Song metadata for the index, keyed by this track's title.
    pub fn metadata(&self) -> SongMetadata {
        SongMetadata {
            song_name: None,
            video_id: self.video_id.clone(),
            title: Some(self.title.clone()),
            artist: self.artist.clone(),
            album: self.album.clone(),
            album_art: self.album_art.clone(),
            webpage_url: self.webpage_url.clone(),
        }
    }
}

/// Source of reference tracks.
///
/// Implementations block (subprocess, filesystem); callers run them
/// under `spawn_blocking`.
pub trait TrackSource: Send + Sync {
    /// Resolve a URL to the music tracks behind it (a single track or a
    /// whole playlist/album), already filtered for ingestibility.
    fn fetch(&self, url: &str) -> Result<Vec<TrackDescriptor>>;

    /// Download one track's audio to `track.audio_path`.
    fn download(&self, track: &TrackDescriptor) -> Result<()>;
}

/// `yt-dlp`-backed track source.
pub struct YtDlpSource {
    download_dir: PathBuf,
}

impl YtDlpSource {
    pub fn new(download_dir: impl Into<PathBuf>) -> Self {
        Self {
            download_dir: download_dir.into(),
        }
    }
}

impl TrackSource for YtDlpSource {
    fn fetch(&self, url: &str) -> Result<Vec<TrackDescriptor>> {
        debug!("Fetching metadata for {}", url);

        let output = Command::new("yt-dlp")
            .args(["--dump-single-json", url])
            .stderr(Stdio::null())
            .output()
            .map_err(map_spawn_error)?;

        if !output.status.success() {
            return Err(Error::External(format!(
                "yt-dlp metadata fetch failed for {url} ({})",
                output.status
            )));
        }

        let dump: MetadataDump = serde_json::from_slice(&output.stdout)
            .map_err(|e| Error::External(format!("failed to parse yt-dlp metadata: {e}")))?;

        let entries = match dump {
            MetadataDump::Playlist { entries } => entries,
            MetadataDump::Single(track) => vec![*track],
        };

        let tracks: Vec<TrackDescriptor> = entries
            .into_iter()
            .filter_map(|raw| filter_track(raw, &self.download_dir))
            .collect();

        info!(url, count = tracks.len(), "Resolved ingestible tracks");
        Ok(tracks)
    }

    fn download(&self, track: &TrackDescriptor) -> Result<()> {
        let webpage_url = track
            .webpage_url
            .as_deref()
            .ok_or_else(|| Error::External(format!("track '{}' has no webpage URL", track.title)))?;

        std::fs::create_dir_all(&self.download_dir)?;

        info!(title = %track.title, "Downloading audio");

        let status = Command::new("yt-dlp")
            .arg(webpage_url)
            .args(["--extract-audio", "--audio-format", "wav", "-o"])
            .arg(&track.audio_path)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(map_spawn_error)?;

        if !status.success() {
            return Err(Error::External(format!(
                "yt-dlp download failed for '{}' ({status})",
                track.title
            )));
        }

        Ok(())
    }
}

fn map_spawn_error(e: std::io::Error) -> Error {
    if e.kind() == std::io::ErrorKind::NotFound {
        Error::External("yt-dlp not found in PATH".to_string())
    } else {
        Error::Io(e)
    }
}

/// yt-dlp `--dump-single-json` output: either a playlist/album wrapper
/// or a bare track object. Variant order matters: the track shape has
/// only optional fields and would swallow playlists.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MetadataDump {
    Playlist { entries: Vec<RawTrack> },
    Single(Box<RawTrack>),
}

#[derive(Debug, Default, Deserialize)]
struct RawTrack {
    id: Option<String>,
    track: Option<String>,
    title: Option<String>,
    artist: Option<String>,
    uploader: Option<String>,
    album: Option<String>,
    duration: Option<f64>,
    webpage_url: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    categories: Vec<String>,
    #[serde(default)]
    thumbnails: Vec<RawThumbnail>,
}

#[derive(Debug, Deserialize)]
struct RawThumbnail {
    url: Option<String>,
    width: Option<u32>,
}

/// Apply the ingestibility rules to one metadata entry.
fn filter_track(raw: RawTrack, download_dir: &Path) -> Option<TrackDescriptor> {
    // Only actual music
    if !raw.categories.iter().any(|c| c == "Music") {
        return None;
    }

    let title = raw.track.or(raw.title)?;
    let lowered = title.to_lowercase();
    if REJECT_KEYWORDS.iter().any(|kw| lowered.contains(kw)) {
        return None;
    }

    // Album art: the widest thumbnail available
    let album_art = raw
        .thumbnails
        .into_iter()
        .max_by_key(|t| t.width.unwrap_or(0))
        .and_then(|t| t.url);

    let safe_title = title.replace(['/', '\\'], "_");
    let audio_path = download_dir.join(format!("{safe_title}.wav"));

    Some(TrackDescriptor {
        video_id: raw.id,
        title,
        artist: raw.artist.or(raw.uploader),
        album: raw.album,
        album_art,
        duration: raw.duration,
        webpage_url: raw.webpage_url,
        tags: raw.tags,
        audio_path,
    })
}
