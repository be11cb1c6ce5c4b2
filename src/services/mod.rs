//! Engine services: job execution and the downloader collaborator

pub mod downloader;
pub mod job_runner;
pub mod processor;

pub use downloader::{TrackDescriptor, TrackSource, YtDlpSource};
pub use job_runner::JobRunner;
