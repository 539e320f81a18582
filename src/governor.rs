//! Outbound request governor.
//!
//! Every call the gateway makes to the backend goes through a single FIFO
//! queue that is drained in batches of at most `max_concurrent` items, with
//! a short pause between batches. Only one drain loop runs at a time.

use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use lazy_static::lazy_static;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, error, trace};

use crate::metrics::GOVERNOR_QUEUE_LENGTH;

#[derive(Debug, Clone)]
pub struct GovernorConfig {
    pub max_concurrent: usize,
    pub batch_delay: Duration,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            batch_delay: Duration::from_millis(100),
        }
    }
}

lazy_static! {
    static ref GLOBAL_GOVERNOR: RequestGovernor = RequestGovernor::new(GovernorConfig::default());
}

// Queued work item - runs the caller's work and reports through its own channel
struct TrackedRequest {
    run: Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>,
}

struct Inner {
    queue: Mutex<VecDeque<TrackedRequest>>,
    draining: AtomicBool,
    config: GovernorConfig,
}

/// Cloneable handle to a shared request queue.
#[derive(Clone)]
pub struct RequestGovernor {
    inner: Arc<Inner>,
}

impl RequestGovernor {
    /// A `max_concurrent` of zero is raised to one.
    pub fn new(mut config: GovernorConfig) -> Self {
        config.max_concurrent = config.max_concurrent.max(1);
        Self {
            inner: Arc::new(Inner {
                queue: Mutex::new(VecDeque::new()),
                draining: AtomicBool::new(false),
                config,
            }),
        }
    }

    /// Process-wide governor with the default limits.
    pub fn global() -> Self {
        GLOBAL_GOVERNOR.clone()
    }

    pub fn config(&self) -> &GovernorConfig {
        &self.inner.config
    }

    /// Queues `work` and returns a future that yields exactly its output.
    ///
    /// `work` is never called from inside `execute`; it is enqueued right
    /// away (so start order follows call order) and started by the drain
    /// loop. A panic in `work` is resumed in the awaiting caller. If the
    /// item is discarded by [`clear`](Self::clear) the future never resolves.
    ///
    /// Must be called from within a tokio runtime.
    pub fn execute<F, Fut, T>(&self, work: F) -> impl Future<Output = T> + Send + use<F, Fut, T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();

        let request = TrackedRequest {
            run: Box::new(move || {
                async move {
                    let outcome = AssertUnwindSafe(async move { work().await })
                        .catch_unwind()
                        .await;
                    // caller may have stopped waiting
                    let _ = tx.send(outcome);
                }
                .boxed()
            }),
        };

        {
            let mut queue = self.inner.queue.lock();
            queue.push_back(request);
            trace!(queued = queue.len(), "Request queued");
            GOVERNOR_QUEUE_LENGTH.set(queue.len() as f64);
        }

        self.start_draining();

        async move {
            match rx.await {
                Ok(Ok(value)) => value,
                Ok(Err(panic)) => std::panic::resume_unwind(panic),
                // discarded by clear()
                Err(_) => std::future::pending().await,
            }
        }
    }

    /// Drops every request that has not started yet. Their callers stay pending.
    pub fn clear(&self) {
        let mut queue = self.inner.queue.lock();
        let dropped = queue.len();
        queue.clear();
        GOVERNOR_QUEUE_LENGTH.set(0.0);
        debug!(dropped, "Request queue cleared");
    }

    /// Number of requests waiting to start.
    pub fn queue_length(&self) -> usize {
        self.inner.queue.lock().len()
    }

    fn start_draining(&self) {
        if !self.inner.try_claim_drain() {
            return;
        }
        let inner = Arc::clone(&self.inner);
        tokio::spawn(inner.drain());
    }
}

impl Inner {
    fn try_claim_drain(&self) -> bool {
        self.draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn take_batch(&self) -> Vec<TrackedRequest> {
        let mut queue = self.queue.lock();
        let n = self.config.max_concurrent.min(queue.len());
        let batch: Vec<_> = queue.drain(..n).collect();
        GOVERNOR_QUEUE_LENGTH.set(queue.len() as f64);
        batch
    }

    async fn drain(self: Arc<Self>) {
        loop {
            let batch = self.take_batch();

            if batch.is_empty() {
                self.draining.store(false, Ordering::Release);
                // an execute() may have queued after take_batch while we still held the flag
                if self.queue.lock().is_empty() || !self.try_claim_drain() {
                    break;
                }
                continue;
            }

            let remaining = self.queue.lock().len();
            debug!(batch = batch.len(), remaining, "Starting request batch");

            let handles = batch
                .into_iter()
                .map(|request| tokio::spawn((request.run)()));

            for joined in join_all(handles).await {
                if let Err(e) = joined {
                    error!(error = %e, "Queued request task failed");
                }
            }

            let more = !self.queue.lock().is_empty();
            if more {
                tokio::time::sleep(self.config.batch_delay).await;
            }
        }
    }
}
