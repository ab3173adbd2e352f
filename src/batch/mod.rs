// src/batch/mod.rs
//! Provider batch jobs: request artifacts, remote submission, polling and
//! result download

pub mod job;
pub mod manager;
pub mod prompt;
pub mod provider;

pub use job::BatchJob;
pub use manager::{BatchManager, BatchPaths};
pub use provider::BatchProvider;
