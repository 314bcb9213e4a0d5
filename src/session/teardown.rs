//! Background executor for container teardown
//!
//! One worker task drains a channel of teardown jobs in order. Releases that must
//! not wait use [`TeardownExecutor::submit`]; everything else runs inline.

use futures::future::BoxFuture;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// A unit of teardown work
pub type TeardownTask = BoxFuture<'static, ()>;

/// The executor no longer accepts work; the rejected task is handed back
#[derive(Error)]
#[error("Teardown executor is stopped")]
pub struct ExecutorStopped(pub TeardownTask);

impl std::fmt::Debug for ExecutorStopped {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ExecutorStopped")
    }
}

/// Single-worker teardown queue
pub struct TeardownExecutor {
    sender: Mutex<Option<mpsc::UnboundedSender<TeardownTask>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl TeardownExecutor {
    /// Spawn the worker on the current runtime
    pub fn new() -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<TeardownTask>();

        let worker = tokio::spawn(async move {
            while let Some(task) = receiver.recv().await {
                task.await;
            }
            debug!("Teardown worker finished");
        });

        Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Queue a task for the worker
    pub async fn submit(&self, task: TeardownTask) -> Result<(), ExecutorStopped> {
        match self.sender.lock().await.as_ref() {
            Some(sender) => sender.send(task).map_err(|e| ExecutorStopped(e.0)),
            None => Err(ExecutorStopped(task)),
        }
    }

    /// Run a task on the caller's task
    pub async fn run_inline(&self, task: TeardownTask) {
        task.await;
    }

    /// Close the queue and wait for every queued task to finish
    pub async fn drain_and_stop(&self) {
        // Dropping the sender ends the worker loop once the channel is empty
        self.sender.lock().await.take();

        let worker = self.worker.lock().await.take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                error!(error = %e, "Teardown worker panicked");
            }
            info!("Teardown executor stopped");
        }
    }

    pub async fn is_stopped(&self) -> bool {
        self.sender.lock().await.is_none()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use futures::FutureExt;
    use pretty_assertions::assert_eq;

    use super::*;

    fn push(journal: &Arc<std::sync::Mutex<Vec<u32>>>, value: u32, delay_ms: u64) -> TeardownTask {
        let journal = journal.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            journal.lock().unwrap().push(value);
        }
        .boxed()
    }

    #[tokio::test]
    async fn test_tasks_run_in_submission_order() {
        let executor = TeardownExecutor::new();
        let journal = Arc::new(std::sync::Mutex::new(Vec::new()));

        // Earlier tasks sleep longer; serial execution still keeps the order
        executor.submit(push(&journal, 1, 30)).await.unwrap();
        executor.submit(push(&journal, 2, 10)).await.unwrap();
        executor.submit(push(&journal, 3, 0)).await.unwrap();

        executor.drain_and_stop().await;
        assert_eq!(*journal.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_drain_runs_all_queued_tasks() {
        let executor = TeardownExecutor::new();
        let journal = Arc::new(std::sync::Mutex::new(Vec::new()));

        for i in 0..20 {
            executor.submit(push(&journal, i, 1)).await.unwrap();
        }
        executor.drain_and_stop().await;

        assert_eq!(journal.lock().unwrap().len(), 20);
        assert!(executor.is_stopped().await);
    }

    #[tokio::test]
    async fn test_submit_after_stop_hands_task_back() {
        let executor = TeardownExecutor::new();
        executor.drain_and_stop().await;
        executor.drain_and_stop().await;

        let journal = Arc::new(std::sync::Mutex::new(Vec::new()));
        let rejected = executor.submit(push(&journal, 7, 0)).await.unwrap_err();

        assert!(journal.lock().unwrap().is_empty());
        executor.run_inline(rejected.0).await;
        assert_eq!(*journal.lock().unwrap(), vec![7]);
    }

    #[tokio::test]
    async fn test_run_inline_completes_before_returning() {
        let executor = TeardownExecutor::new();
        let journal = Arc::new(std::sync::Mutex::new(Vec::new()));

        executor.run_inline(push(&journal, 1, 20)).await;
        assert_eq!(*journal.lock().unwrap(), vec![1]);
    }
}
