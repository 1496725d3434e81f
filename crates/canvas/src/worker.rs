//! Background flushing
//!
//! [`FlushWorker`] owns a tokio task that receives flush requests over a
//! channel and runs each [`TileStore::flush`] on the blocking pool, so the
//! input thread keeps drawing while tiles are written out. Requests are
//! handled strictly in arrival order.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::storage::TileBackend;
use crate::store::{FlushReport, TileStore};

enum FlushRequest {
    /// Flush and drop the report
    Detached,
    /// Flush and send the report back
    Reply(oneshot::Sender<FlushReport>),
}

/// Handle to a background flush task
pub struct FlushWorker {
    requests: mpsc::UnboundedSender<FlushRequest>,
    task: JoinHandle<Option<FlushReport>>,
}

impl FlushWorker {
    /// Start the worker. Must be called from within a tokio runtime.
    pub fn spawn<B>(store: Arc<TileStore<B>>) -> Self
    where
        B: TileBackend + 'static,
    {
        let (requests, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(store, rx));
        Self { requests, task }
    }

    /// Queue a flush without waiting for it.
    ///
    /// Returns `false` if the worker has stopped.
    pub fn request(&self) -> bool {
        self.requests.send(FlushRequest::Detached).is_ok()
    }

    /// Queue a flush and wait for its report.
    ///
    /// Returns `None` if the worker has stopped.
    pub async fn flush(&self) -> Option<FlushReport> {
        let (reply, response) = oneshot::channel();
        self.requests.send(FlushRequest::Reply(reply)).ok()?;
        response.await.ok()
    }

    /// Stop accepting requests, finish queued ones and run a final flush
    pub async fn shutdown(self) -> Option<FlushReport> {
        drop(self.requests);
        match self.task.await {
            Ok(report) => report,
            Err(err) => {
                error!("Flush worker failed: {}", err);
                None
            }
        }
    }
}

async fn run<B>(
    store: Arc<TileStore<B>>,
    mut rx: mpsc::UnboundedReceiver<FlushRequest>,
) -> Option<FlushReport>
where
    B: TileBackend + 'static,
{
    while let Some(request) = rx.recv().await {
        let report = flush_blocking(&store).await;
        match (request, report) {
            (FlushRequest::Reply(reply), Some(report)) => {
                // The caller may have stopped waiting
                let _ = reply.send(report);
            }
            (FlushRequest::Reply(_), None) | (FlushRequest::Detached, _) => {}
        }
    }
    debug!("Flush worker channel closed, running final flush");
    flush_blocking(&store).await
}

async fn flush_blocking<B>(store: &Arc<TileStore<B>>) -> Option<FlushReport>
where
    B: TileBackend + 'static,
{
    let store = Arc::clone(store);
    match tokio::task::spawn_blocking(move || store.flush()).await {
        Ok(report) => Some(report),
        Err(err) => {
            error!("Flush task panicked: {}", err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::TileCoord;
    use crate::storage::MemoryBackend;

    fn shared_store() -> Arc<TileStore<MemoryBackend>> {
        Arc::new(TileStore::new(MemoryBackend::new()))
    }

    #[tokio::test]
    async fn test_flush_round_trip() {
        let store = shared_store();
        let worker = FlushWorker::spawn(Arc::clone(&store));

        store.set_canvas_pixel(5, 5, true);
        let report = worker.flush().await.unwrap();
        assert_eq!(report.written, vec![TileCoord::new(0, 0)]);
        assert_eq!(store.modified_count(), 0);
        assert!(store.tile_exists(TileCoord::new(0, 0)));

        let idle = worker.flush().await.unwrap();
        assert!(idle.is_noop());
    }

    #[tokio::test]
    async fn test_detached_requests_are_ordered() {
        let store = shared_store();
        let worker = FlushWorker::spawn(Arc::clone(&store));

        store.set_canvas_pixel(0, 0, true);
        assert!(worker.request());
        // Queued behind the detached request, so it sees nothing left to write
        let report = worker.flush().await.unwrap();
        assert!(report.is_noop());
        assert!(store.tile_exists(TileCoord::new(0, 0)));
    }

    #[tokio::test]
    async fn test_shutdown_runs_final_flush() {
        let store = shared_store();
        let worker = FlushWorker::spawn(Arc::clone(&store));

        store.set_canvas_pixel(-300, 10, true);
        let report = worker.shutdown().await.unwrap();
        assert_eq!(report.written, vec![TileCoord::new(-2, 0)]);
        assert_eq!(store.backend().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_drawing_continues_during_flushes() {
        let store = shared_store();
        let worker = FlushWorker::spawn(Arc::clone(&store));

        for x in 0..64 {
            store.set_canvas_pixel(x * 40, 0, true);
            worker.request();
        }
        let last = worker.shutdown().await.unwrap();
        assert!(last.is_complete());
        assert_eq!(store.modified_count(), 0);

        for x in 0..64 {
            let coord = TileCoord::containing(x * 40, 0);
            assert!(store.tile_exists(coord), "tile {coord:?} not persisted");
        }
    }
}
