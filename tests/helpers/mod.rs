//! Shared helpers for integration tests: synthetic audio, WAV writing,
//! scratch databases, and a stub track source.
#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::f32::consts::PI;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use uuid::Uuid;
use waveprint::error::Result;
use waveprint::models::JobRecord;
use waveprint::services::downloader::{TrackDescriptor, TrackSource};
use waveprint::services::JobRunner;

/// Analysis sample rate, re-exported for test readability
pub const RATE: u32 = 22_050;

/// Linear sine sweep 200 Hz .. 4 kHz. Continuous phase, so the
/// spectrogram shows one clean moving ridge with plenty of peaks.
pub fn sweep_samples(seconds: f32) -> Vec<f32> {
    let n = (seconds * RATE as f32) as usize;
    let mut phase = 0.0f32;
    (0..n)
        .map(|i| {
            let frac = i as f32 / n as f32;
            let freq = 200.0 + frac * 3800.0;
            phase += 2.0 * PI * freq / RATE as f32;
            0.7 * phase.sin()
        })
        .collect()
}

/// Two-tone signal; spectrally disjoint from the sweep's upper range.
pub fn two_tone_samples(seconds: f32, f1: f32, f2: f32) -> Vec<f32> {
    let n = (seconds * RATE as f32) as usize;
    (0..n)
        .map(|i| {
            let t = i as f32 / RATE as f32;
            0.4 * (2.0 * PI * f1 * t).sin() + 0.3 * (2.0 * PI * f2 * t).sin()
        })
        .collect()
}

/// Deterministic white noise in [-0.5, 0.5].
pub fn noise_samples(seconds: f32, seed: u64) -> Vec<f32> {
    let n = (seconds * RATE as f32) as usize;
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| rng.gen_range(-0.5..0.5)).collect()
}

/// Write mono samples as a 16-bit PCM WAV.
pub fn write_wav(path: &Path, samples: &[f32]) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).expect("create wav");
    for &sample in samples {
        let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer.write_sample(value).expect("write sample");
    }
    writer.finalize().expect("finalize wav");
}

/// Open a scratch index inside `dir`.
pub async fn scratch_pool(dir: &Path) -> SqlitePool {
    let db_path = dir.join("waveprint-test.db");
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    waveprint::db::connect(&db_url, 4).await.expect("connect db")
}

/// Poll a job until it reaches a terminal state.
pub async fn wait_for_terminal(runner: &JobRunner, job_id: Uuid) -> JobRecord {
    let deadline = Instant::now() + Duration::from_secs(60);
    loop {
        let record = runner.get_status(job_id).await.expect("job record");
        if record.is_terminal() {
            return record;
        }
        assert!(Instant::now() < deadline, "job {job_id} never finished");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

/// Track source serving canned descriptors from memory and "downloading"
/// by copying local template WAVs.
pub struct StubSource {
    catalog: HashMap<String, Vec<TrackDescriptor>>,
    templates: HashMap<PathBuf, PathBuf>,
}

impl StubSource {
    pub fn new() -> Self {
        Self {
            catalog: HashMap::new(),
            templates: HashMap::new(),
        }
    }

    /// Register `url` to resolve to one track whose audio is a copy of
    /// `template`.
    pub fn add_track(&mut self, url: &str, title: &str, audio_path: PathBuf, template: PathBuf) {
        let descriptor = TrackDescriptor {
            video_id: Some(format!("vid-{title}")),
            title: title.to_string(),
            artist: Some("Test Artist".to_string()),
            album: None,
            album_art: None,
            duration: None,
            webpage_url: Some(url.to_string()),
            tags: Vec::new(),
            audio_path: audio_path.clone(),
        };
        self.catalog.entry(url.to_string()).or_default().push(descriptor);
        self.templates.insert(audio_path, template);
    }
}

impl TrackSource for StubSource {
    fn fetch(&self, url: &str) -> Result<Vec<TrackDescriptor>> {
        Ok(self.catalog.get(url).cloned().unwrap_or_default())
    }

    fn download(&self, track: &TrackDescriptor) -> Result<()> {
        let template = self
            .templates
            .get(&track.audio_path)
            .expect("unregistered track");
        std::fs::copy(template, &track.audio_path)?;
        Ok(())
    }
}
