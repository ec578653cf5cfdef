//! The executor's error type and the trait batch callables use to tell the
//! executor which failures are worth retrying.

/// Implemented by a job's per-batch error type so the executor knows
/// whether a failure is transient (network timeout, 5xx, empty/corrupted
/// response) and worth an exponential-backoff retry, or persistent and
/// should fail the whole partition immediately (§4.1, §7).
pub trait TransientError {
    /// Whether this failure should be retried.
    fn is_transient(&self) -> bool;
}

/// Failures raised by [`crate::BatchExecutor::execute`] itself, as opposed
/// to failures of the per-batch callable (which are wrapped in
/// [`ExecutorError::BatchFailed`]).
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError<E> {
    /// The per-batch callable failed persistently: either its failure was
    /// not transient, or it was transient but the retry budget
    /// (`max_retries`) was exhausted.
    #[error("batch failed after exhausting retries: {0}")]
    BatchFailed(E),

    /// `shutdown` was called before or during this batch's execution.
    #[error("executor was shut down")]
    ShuttingDown,

    /// A spawned batch task panicked or was cancelled by the runtime.
    #[error("batch task panicked: {0}")]
    TaskPanicked(#[from] tokio::task::JoinError),
}
