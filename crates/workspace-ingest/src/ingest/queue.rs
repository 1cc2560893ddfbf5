//! Per-workspace serialisation of ingestion jobs.

use crate::error::{IngestError, Result};
use crate::models::WorkspaceId;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs blocking jobs one at a time per workspace.
///
/// Each workspace with queued work gets a worker task that executes its jobs
/// in submission order on tokio's blocking pool. Jobs for different
/// workspaces run concurrently.
///
/// # Example
///
/// ```rust,ignore
/// let queue = WorkspaceTaskQueue::new();
/// let ingestor = Arc::new(ingestor);
/// let problems = queue
///     .submit(workspace_id, move || ingestor.process_uploaded_files(workspace_id, &files))
///     .await??;
/// ```
#[derive(Default)]
pub struct WorkspaceTaskQueue {
    workers: Mutex<HashMap<WorkspaceId, mpsc::UnboundedSender<Job>>>,
}

impl WorkspaceTaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `job` behind earlier jobs for `workspace_id` and wait for its output.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn submit<F, T>(&self, workspace_id: WorkspaceId, job: F) -> Result<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let wrapped: Job = Box::new(move || {
            let _ = tx.send(job());
        });

        self.sender_for(workspace_id)?
            .send(wrapped)
            .map_err(|_| IngestError::Queue(format!("worker for workspace {} has stopped", workspace_id)))?;

        rx.await.map_err(|_| {
            IngestError::Queue(format!("job for workspace {} did not complete", workspace_id))
        })
    }

    /// Number of workspaces with a live worker.
    pub fn active_workspaces(&self) -> usize {
        self.workers
            .lock()
            .map(|workers| workers.values().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }

    /// Stop accepting work for existing workers.
    ///
    /// Jobs already queued still run; each worker exits once its queue is
    /// drained. Later submissions start fresh workers.
    pub fn shutdown(&self) {
        match self.workers.lock() {
            Ok(mut workers) => {
                debug!("Closing {} workspace queues", workers.len());
                workers.clear();
            }
            Err(e) => error!("Workspace queue lock poisoned: {}", e),
        }
    }

    fn sender_for(&self, workspace_id: WorkspaceId) -> Result<mpsc::UnboundedSender<Job>> {
        let mut workers = self
            .workers
            .lock()
            .map_err(|e| IngestError::Queue(format!("queue lock poisoned: {}", e)))?;

        // Workers whose runtime went away leave closed senders behind.
        workers.retain(|_, tx| !tx.is_closed());

        if let Some(tx) = workers.get(&workspace_id) {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_worker(workspace_id, rx));
        workers.insert(workspace_id, tx.clone());
        Ok(tx)
    }
}

async fn run_worker(workspace_id: WorkspaceId, mut rx: mpsc::UnboundedReceiver<Job>) {
    debug!("Started worker for workspace {}", workspace_id);
    while let Some(job) = rx.recv().await {
        if let Err(e) = tokio::task::spawn_blocking(job).await {
            error!("Job for workspace {} panicked: {}", workspace_id, e);
        }
    }
    debug!("Worker for workspace {} exited", workspace_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_jobs_run_in_submission_order() {
        let queue = WorkspaceTaskQueue::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let slow = {
            let log = log.clone();
            queue.submit(1, move || {
                std::thread::sleep(Duration::from_millis(50));
                log.lock().unwrap().push("slow");
            })
        };
        let fast = {
            let log = log.clone();
            queue.submit(1, move || log.lock().unwrap().push("fast"))
        };

        let (a, b) = tokio::join!(slow, fast);
        a.unwrap();
        b.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["slow", "fast"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_workspaces_are_independent() {
        let queue = WorkspaceTaskQueue::new();

        let (a, b) = tokio::join!(queue.submit(1, || 1 + 1), queue.submit(2, || "two"));
        assert_eq!(a.unwrap(), 2);
        assert_eq!(b.unwrap(), "two");
        assert_eq!(queue.active_workspaces(), 2);
    }

    #[tokio::test]
    async fn test_panicking_job_reports_error() {
        let queue = WorkspaceTaskQueue::new();

        let result: Result<()> = queue.submit(1, || panic!("boom")).await;
        assert!(matches!(result, Err(IngestError::Queue(_))));

        // The worker survives the panic.
        assert_eq!(queue.submit(1, || 5).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_shutdown_closes_workers() {
        let queue = WorkspaceTaskQueue::new();
        queue.submit(3, || ()).await.unwrap();
        assert_eq!(queue.active_workspaces(), 1);

        queue.shutdown();
        assert_eq!(queue.active_workspaces(), 0);
        assert_eq!(queue.submit(3, || 7).await.unwrap(), 7);
    }

    #[test]
    fn test_stopped_workers_are_forgotten() {
        let queue = WorkspaceTaskQueue::new();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            for workspace_id in 1..=3 {
                queue.submit(workspace_id, || ()).await.unwrap();
            }
        });
        assert_eq!(queue.workers.lock().unwrap().len(), 3);
        // Dropping the runtime drops every worker and its receiver.
        drop(runtime);
        assert_eq!(queue.active_workspaces(), 0);

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        assert_eq!(runtime.block_on(queue.submit(9, || 9)).unwrap(), 9);
        assert_eq!(queue.workers.lock().unwrap().len(), 1);
        assert!(queue.workers.lock().unwrap().contains_key(&9));
    }
}
