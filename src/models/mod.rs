//! Data models for the job layer

pub mod job;

pub use job::{JobOutcome, JobRecord, JobStatus};
