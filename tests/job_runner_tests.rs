//! Job runner end-to-end tests: submission, terminal transitions,
//! cleanup, and the concurrent ingest path via a stub track source.

mod helpers;

use helpers::{
    scratch_pool, sweep_samples, two_tone_samples, wait_for_terminal, write_wav, StubSource,
};
use std::sync::Arc;
use uuid::Uuid;
use waveprint::error::Error;
use waveprint::models::JobStatus;
use waveprint::services::JobRunner;

#[tokio::test]
async fn a_silent_match_fails_and_the_temp_file_is_deleted() {
    let dir = tempfile::tempdir().unwrap();
    let pool = scratch_pool(dir.path()).await;
    let runner = JobRunner::new(pool, Arc::new(StubSource::new()), 2);

    let silent = vec![0.0f32; helpers::RATE as usize * 3];
    let audio_path = dir.path().join("silent.wav");
    write_wav(&audio_path, &silent);

    let job_id = runner.submit_match(audio_path.clone()).await;
    let record = wait_for_terminal(&runner, job_id).await;

    assert_eq!(record.status, JobStatus::Fail);
    let error = record.error.expect("failed job carries an error");
    assert!(error.to_lowercase().contains("silent"), "error was: {error}");
    assert!(!audio_path.exists(), "input file must not outlive the job");
}

#[tokio::test]
async fn an_undecodable_match_fails_with_a_decode_error() {
    let dir = tempfile::tempdir().unwrap();
    let pool = scratch_pool(dir.path()).await;
    let runner = JobRunner::new(pool, Arc::new(StubSource::new()), 2);

    let audio_path = dir.path().join("garbage.wav");
    std::fs::write(&audio_path, b"this is not a wav file").unwrap();

    let job_id = runner.submit_match(audio_path.clone()).await;
    let record = wait_for_terminal(&runner, job_id).await;

    assert_eq!(record.status, JobStatus::Fail);
    assert!(record.error.unwrap().contains("Decode"));
    assert!(!audio_path.exists());
}

#[tokio::test]
async fn polling_an_unknown_job_id_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let pool = scratch_pool(dir.path()).await;
    let runner = JobRunner::new(pool, Arc::new(StubSource::new()), 2);

    let unknown = Uuid::new_v4();
    let err = runner.get_status(unknown).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(id) if id == unknown));
}

#[tokio::test]
async fn concurrent_ingests_both_succeed_with_distinct_songs() {
    let dir = tempfile::tempdir().unwrap();
    let pool = scratch_pool(dir.path()).await;

    let sweep_template = dir.path().join("sweep-template.wav");
    write_wav(&sweep_template, &sweep_samples(6.0));
    let tones_template = dir.path().join("tones-template.wav");
    write_wav(&tones_template, &two_tone_samples(6.0, 523.25, 1318.5));

    let mut source = StubSource::new();
    source.add_track(
        "https://example.com/sweep",
        "Sweep Song",
        dir.path().join("sweep-dl.wav"),
        sweep_template,
    );
    source.add_track(
        "https://example.com/tones",
        "Tones Song",
        dir.path().join("tones-dl.wav"),
        tones_template,
    );

    let runner = JobRunner::new(pool.clone(), Arc::new(source), 4);

    let first = runner.submit_ingest("https://example.com/sweep").await;
    let second = runner.submit_ingest("https://example.com/tones").await;

    let first_record = wait_for_terminal(&runner, first).await;
    let second_record = wait_for_terminal(&runner, second).await;

    assert_eq!(first_record.status, JobStatus::Success);
    assert_eq!(second_record.status, JobStatus::Success);

    // Distinct song rows, both flagged fingerprinted
    let mut song_ids = Vec::new();
    for record in [&first_record, &second_record] {
        let json = serde_json::to_value(record).unwrap();
        let ids: Vec<i64> = json["result"]
            .as_array()
            .expect("ingest result is a list of song ids")
            .iter()
            .map(|v| v.as_i64().unwrap())
            .collect();
        assert_eq!(ids.len(), 1);
        song_ids.push(ids[0]);
    }
    assert_ne!(song_ids[0], song_ids[1]);

    for song_id in song_ids {
        let song = waveprint::db::songs::load_song(&pool, song_id)
            .await
            .unwrap()
            .expect("ingested song row exists");
        assert!(song.fingerprinted);
    }

    // Downloaded audio must not outlive the jobs
    assert!(!dir.path().join("sweep-dl.wav").exists());
    assert!(!dir.path().join("tones-dl.wav").exists());
}

#[tokio::test]
async fn an_ingested_track_is_found_by_a_later_match_job() {
    let dir = tempfile::tempdir().unwrap();
    let pool = scratch_pool(dir.path()).await;

    let samples = sweep_samples(10.0);
    let template = dir.path().join("reference.wav");
    write_wav(&template, &samples);

    let mut source = StubSource::new();
    source.add_track(
        "https://example.com/reference",
        "Reference Sweep",
        dir.path().join("reference-dl.wav"),
        template,
    );

    let runner = JobRunner::new(pool, Arc::new(source), 4);

    let ingest = runner.submit_ingest("https://example.com/reference").await;
    let ingest_record = wait_for_terminal(&runner, ingest).await;
    assert_eq!(ingest_record.status, JobStatus::Success);

    // Query with a copy of the same recording
    let query_path = dir.path().join("query.wav");
    write_wav(&query_path, &samples);

    let job_id = runner.submit_match(query_path).await;
    let record = wait_for_terminal(&runner, job_id).await;

    assert_eq!(record.status, JobStatus::Success);
    let json = serde_json::to_value(&record).unwrap();
    let candidates = json["result"].as_array().expect("match result is a list");
    assert!(!candidates.is_empty(), "reference track should be found");
    let top = &candidates[0];
    assert_eq!(top["song_name"], "Reference Sweep");
    assert!(top["votes"].as_i64().unwrap() >= 20);
    assert!(top["confidence"].as_f64().unwrap() >= 0.15);
}

#[tokio::test]
async fn an_ingest_with_no_resolvable_tracks_fails() {
    let dir = tempfile::tempdir().unwrap();
    let pool = scratch_pool(dir.path()).await;
    let runner = JobRunner::new(pool, Arc::new(StubSource::new()), 2);

    let job_id = runner.submit_ingest("https://example.com/nothing-here").await;
    let record = wait_for_terminal(&runner, job_id).await;

    assert_eq!(record.status, JobStatus::Fail);
    assert!(record.error.unwrap().contains("no ingestible"));
}

#[tokio::test]
async fn a_job_starts_pending_before_reaching_a_terminal_state() {
    let dir = tempfile::tempdir().unwrap();
    let pool = scratch_pool(dir.path()).await;
    let runner = JobRunner::new(pool, Arc::new(StubSource::new()), 2);

    let audio_path = dir.path().join("pending.wav");
    write_wav(&audio_path, &sweep_samples(3.0));

    let job_id = runner.submit_match(audio_path).await;

    // Immediately after submission the record exists; it is either
    // still PENDING or already terminal on a fast machine, never absent.
    let record = runner.get_status(job_id).await.unwrap();
    assert!(record.status == JobStatus::Pending || record.is_terminal());

    let done = wait_for_terminal(&runner, job_id).await;
    assert!(done.finished_at.is_some());
    assert!(done.finished_at.unwrap() >= done.submitted_at);
}
