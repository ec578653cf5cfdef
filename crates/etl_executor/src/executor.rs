use std::{
    future::Future,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::{sync::Semaphore, task::JoinSet};

use crate::error::{ExecutorError, TransientError};

const EXPONENT_BASE: u32 = 2;
const MIN_RETRY_INTERVAL: Duration = Duration::from_millis(200);
const MAX_RETRY_INTERVAL: Duration = Duration::from_secs(16);

/// Tuning knobs for a [`BatchExecutor`]. One instance is shared by every job
/// run against the same provider within a partition (§4.1, §10.3).
#[derive(Clone, Copy, Debug)]
pub struct ExecutorConfig {
    /// Maximum work units handed to `per_batch_fn` in a single call.
    pub batch_size: usize,
    /// Maximum number of batches running concurrently.
    pub max_workers: usize,
    /// Maximum number of retries for a transiently-failing batch, in
    /// addition to its first attempt.
    pub max_retries: u32,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        ExecutorConfig {
            batch_size: 10,
            max_workers: 4,
            max_retries: 5,
        }
    }
}

/// Splits a work stream into fixed-size batches and runs each through a
/// per-batch callable across a bounded worker pool, retrying transient
/// failures with exponential backoff (§4.1).
///
/// Work units within a batch are the callable's own responsibility — the
/// executor hands it a `Vec<T>`, not one item at a time. Batches may
/// complete in any order; callers needing a global order (e.g. block
/// number) must sort downstream.
#[derive(Debug)]
pub struct BatchExecutor {
    config: ExecutorConfig,
    cancelled: Arc<AtomicBool>,
}

impl BatchExecutor {
    /// Creates a new executor with the given tuning.
    pub fn new(config: ExecutorConfig) -> Self {
        BatchExecutor {
            config,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Signals that no further batches should start. In-flight batches
    /// finish or fail on their own; this only stops new submissions and new
    /// retries, observed at the next suspension point (§4.1, §5).
    pub fn shutdown(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether [`Self::shutdown`] has been called.
    pub fn is_shutting_down(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Runs `per_batch_fn` over `items`, chunked into batches of at most
    /// `batch_size`, with at most `max_workers` batches in flight.
    ///
    /// `total_items` is used only for progress logging.
    #[tracing::instrument(level = "debug", skip(self, items, per_batch_fn), fields(total_items))]
    pub async fn execute<T, E, F, Fut>(
        &self,
        items: Vec<T>,
        total_items: usize,
        per_batch_fn: F,
    ) -> Result<(), ExecutorError<E>>
    where
        T: Clone + Send + 'static,
        E: TransientError + std::fmt::Display + Send + 'static,
        F: Fn(Vec<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
    {
        tracing::Span::current().record("total_items", total_items);

        let batches = chunk(items, self.config.batch_size.max(1));
        if batches.is_empty() {
            return Ok(());
        }

        let semaphore = Arc::new(Semaphore::new(self.config.max_workers.max(1)));
        let per_batch_fn = Arc::new(per_batch_fn);
        let completed = Arc::new(AtomicUsize::new(0));
        let mut join_set = JoinSet::new();

        for batch in batches {
            if self.is_shutting_down() {
                return Err(ExecutorError::ShuttingDown);
            }

            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .expect("semaphore is never closed");
            let per_batch_fn = per_batch_fn.clone();
            let cancelled = self.cancelled.clone();
            let completed = completed.clone();
            let max_retries = self.config.max_retries;
            let batch_len = batch.len();

            join_set.spawn(async move {
                let _permit = permit;
                let result = run_with_retry(batch, per_batch_fn.as_ref(), max_retries, &cancelled).await;
                if result.is_ok() {
                    let done = completed.fetch_add(batch_len, Ordering::Relaxed) + batch_len;
                    tracing::debug!(done, total_items, "batch completed");
                }
                result
            });
        }

        while let Some(outcome) = join_set.join_next().await {
            outcome??;
        }

        Ok(())
    }
}

async fn run_with_retry<T, E, F, Fut>(
    batch: Vec<T>,
    per_batch_fn: &F,
    max_retries: u32,
    cancelled: &AtomicBool,
) -> Result<(), ExecutorError<E>>
where
    T: Clone,
    E: TransientError + std::fmt::Display,
    F: Fn(Vec<T>) -> Fut,
    Fut: Future<Output = Result<(), E>>,
{
    let mut attempt = 0u32;
    loop {
        if cancelled.load(Ordering::SeqCst) {
            return Err(ExecutorError::ShuttingDown);
        }

        match per_batch_fn(batch.clone()).await {
            Ok(()) => return Ok(()),
            Err(error) if error.is_transient() && attempt < max_retries => {
                let delay = backoff_delay(attempt);
                tracing::warn!(attempt, ?delay, %error, "transient batch failure, retrying");
                attempt += 1;
                tokio::time::sleep(delay).await;
            }
            Err(error) => return Err(ExecutorError::BatchFailed(error)),
        }
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    let scaled = MIN_RETRY_INTERVAL.saturating_mul(EXPONENT_BASE.saturating_pow(attempt));
    scaled.min(MAX_RETRY_INTERVAL)
}

fn chunk<T>(items: Vec<T>, size: usize) -> Vec<Vec<T>> {
    let mut items = items;
    let mut batches = Vec::with_capacity(items.len() / size.max(1) + 1);
    while !items.is_empty() {
        let tail = items.split_off(size.min(items.len()));
        batches.push(items);
        items = tail;
    }
    batches
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, AtomicUsize};

    use super::*;

    #[derive(Debug)]
    struct Flaky {
        transient: bool,
    }

    impl std::fmt::Display for Flaky {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "flaky")
        }
    }

    impl TransientError for Flaky {
        fn is_transient(&self) -> bool {
            self.transient
        }
    }

    #[tokio::test]
    async fn chunks_into_batches_of_at_most_batch_size() {
        let executor = BatchExecutor::new(ExecutorConfig {
            batch_size: 3,
            max_workers: 2,
            max_retries: 0,
        });
        let seen_batch_sizes = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen = seen_batch_sizes.clone();

        executor
            .execute(
                (0..10).collect::<Vec<u32>>(),
                10,
                move |batch: Vec<u32>| {
                    let seen = seen.clone();
                    async move {
                        seen.lock().unwrap().push(batch.len());
                        Ok::<(), Flaky>(())
                    }
                },
            )
            .await
            .unwrap();

        let mut sizes = seen_batch_sizes.lock().unwrap().clone();
        sizes.sort_unstable();
        assert_eq!(sizes, vec![1, 3, 3, 3]);
    }

    #[tokio::test]
    async fn retries_transient_failures_until_success() {
        let executor = BatchExecutor::new(ExecutorConfig {
            batch_size: 10,
            max_workers: 1,
            max_retries: 5,
        });
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();

        executor
            .execute(vec![1u32], 1, move |_batch| {
                let attempts = attempts_clone.clone();
                async move {
                    let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                    if attempt < 2 {
                        Err(Flaky { transient: true })
                    } else {
                        Ok(())
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn persistent_failure_fails_the_whole_execute_call() {
        let executor = BatchExecutor::new(ExecutorConfig {
            batch_size: 10,
            max_workers: 1,
            max_retries: 1,
        });

        let result = executor
            .execute(vec![1u32], 1, |_batch| async {
                Err(Flaky { transient: false })
            })
            .await;

        assert!(matches!(result, Err(ExecutorError::BatchFailed(_))));
    }

    #[tokio::test]
    async fn shutdown_stops_further_batches_from_starting() {
        let executor = Arc::new(BatchExecutor::new(ExecutorConfig {
            batch_size: 1,
            max_workers: 1,
            max_retries: 0,
        }));
        executor.shutdown();

        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let result = executor
            .execute(vec![1u32, 2u32], 2, move |_batch| {
                let calls = calls_clone.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<(), Flaky>(())
                }
            })
            .await;

        assert!(matches!(result, Err(ExecutorError::ShuttingDown)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn backoff_delay_grows_and_caps() {
        assert_eq!(backoff_delay(0), MIN_RETRY_INTERVAL);
        assert!(backoff_delay(3) > backoff_delay(0));
        assert_eq!(backoff_delay(20), MAX_RETRY_INTERVAL);
    }
}
