//! Core domain types shared by the orchestrator and the workers.

pub mod job;

pub use job::{
    EXIT_CODE_OOM, EXIT_CODE_TIMEOUT, ExecutionResult, Job, JobRequest, ResultStatus,
    round_millis,
};
