// src/types/mod.rs
pub mod batch;
pub mod job_posting;

pub use batch::{
    BatchObject, BatchRequestSpec, BatchState, BatchStatus, CreateBatchRequest, FileObject,
    Message, Role,
};
pub use job_posting::{JobCategory, JobPosting, NOT_MENTIONED};
