//! The per-job error type and its [`TransientError`] classification, which
//! tells `etl_executor` whether a batch failure is worth retrying (§4.1,
//! §7).

use etl_executor::{ExecutorError, TransientError};

/// Failures an extraction job can raise. Malformed-response and
/// configuration failures are always persistent (§7); RPC failures inherit
/// their transience from [`etl_jsonrpc::RpcClientError::is_transient`].
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// A JSON-RPC call failed, transiently or persistently.
    #[error(transparent)]
    Rpc(#[from] etl_jsonrpc::RpcClientError),

    /// A JSON-RPC call returned an application-level error (e.g. "method
    /// not found", "missing trie node").
    #[error(transparent)]
    JsonRpc(#[from] etl_jsonrpc::jsonrpc::Error),

    /// A response could not be mapped into a domain entity.
    #[error(transparent)]
    Mapper(#[from] etl_mappers::MapperError),

    /// A required field was missing from an otherwise well-formed
    /// response (§7 "malformed response").
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The job was asked to run with an invalid combination of flags
    /// (e.g. neither `export_blocks` nor `export_transactions` set).
    #[error("invalid job configuration: {0}")]
    InvalidConfig(&'static str),

    /// The executor was shut down before or during this job.
    #[error("job cancelled: executor was shut down")]
    ShuttingDown,

    /// A spawned batch task panicked.
    #[error("batch task panicked: {0}")]
    TaskPanicked(#[from] tokio::task::JoinError),
}

impl TransientError for JobError {
    fn is_transient(&self) -> bool {
        matches!(self, JobError::Rpc(error) if error.is_transient())
    }
}

/// Unwraps an [`ExecutorError<JobError>`] into a plain [`JobError`],
/// collapsing the executor's own failure modes (shutdown, panic) into the
/// job error taxonomy so callers only ever see one error type.
pub fn from_executor(error: ExecutorError<JobError>) -> JobError {
    match error {
        ExecutorError::BatchFailed(inner) => inner,
        ExecutorError::ShuttingDown => JobError::ShuttingDown,
        ExecutorError::TaskPanicked(join_error) => JobError::TaskPanicked(join_error),
    }
}
