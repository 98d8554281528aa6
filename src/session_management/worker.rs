//! Per-(wall, author) worker task.
//!
//! A worker owns one [`SceneTracker`] and is the only code that touches it.
//! Everything else talks to it through a [`WorkerHandle`]. The task loop waits
//! on three things at once: the next command, the inactivity watchdog and the
//! debounce deadline. Whichever comes first is handled to completion before
//! the loop looks again, so segmenter calls never overlap.
//!
//! A worker that holds no session and no pending snapshot exits once it has
//! been idle for `worker_idle_timeout_ms`. The registry spawns a fresh one on
//! the next request for the pair.

use std::sync::Arc;

use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::canvas::{AuthorId, CanvasElement, SessionId, WallId};
use crate::change_tracking::{Debouncer, ReconcileReport, SceneTracker};
use crate::configuration::types::SegmenterConfig;
use crate::error_handling::types::SessionError;
use crate::session::Session;
use crate::storage::Storage;

use super::segmenter::{ProcessOutcome, SessionSegmenter};
use super::watchdog::expire_at;

const COMMAND_BUFFER: usize = 64;

#[derive(Debug)]
pub enum WorkerCommand {
    /// A fresh full snapshot. Reconciled once the scene has been quiet long enough.
    SceneChanged(Vec<CanvasElement>),
    ProcessElement {
        element: CanvasElement,
        reply: oneshot::Sender<Result<ProcessOutcome, SessionError>>,
    },
    /// Reconcile any pending snapshot now.
    Flush {
        reply: oneshot::Sender<Result<ReconcileReport, SessionError>>,
    },
    /// Finalize `session_id` if, and only if, it is still the current session.
    Finalize {
        session_id: SessionId,
        reply: oneshot::Sender<Option<Session>>,
    },
    CurrentSession {
        reply: oneshot::Sender<Option<Session>>,
    },
    Shutdown,
}

/// Cheap, cloneable access to a running worker.
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    wall_id: WallId,
    author_id: AuthorId,
    tx: mpsc::Sender<WorkerCommand>,
}

impl WorkerHandle {
    pub fn wall_id(&self) -> WallId {
        self.wall_id
    }

    pub fn author_id(&self) -> AuthorId {
        self.author_id
    }

    /// True once the worker task has exited.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub async fn scene_changed(&self, elements: Vec<CanvasElement>) -> Result<(), SessionError> {
        self.send(WorkerCommand::SceneChanged(elements)).await
    }

    pub async fn process_element(
        &self,
        element: CanvasElement,
    ) -> Result<ProcessOutcome, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(WorkerCommand::ProcessElement { element, reply })
            .await?;
        rx.await.map_err(|_| SessionError::WorkerUnavailable)?
    }

    pub async fn flush(&self) -> Result<ReconcileReport, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(WorkerCommand::Flush { reply }).await?;
        rx.await.map_err(|_| SessionError::WorkerUnavailable)?
    }

    /// Finalizes `session_id` if the worker still holds it as current.
    ///
    /// Returns the finalized session, or `None` when the worker holds another
    /// session or none at all. In that case nothing was written to storage.
    pub async fn finalize_session(
        &self,
        session_id: SessionId,
    ) -> Result<Option<Session>, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(WorkerCommand::Finalize { session_id, reply })
            .await?;
        rx.await.map_err(|_| SessionError::WorkerUnavailable)
    }

    pub async fn current_session(&self) -> Result<Option<Session>, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(WorkerCommand::CurrentSession { reply }).await?;
        rx.await.map_err(|_| SessionError::WorkerUnavailable)
    }

    pub async fn shutdown(&self) -> Result<(), SessionError> {
        self.send(WorkerCommand::Shutdown).await
    }

    async fn send(&self, command: WorkerCommand) -> Result<(), SessionError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| SessionError::WorkerUnavailable)
    }
}

pub struct SessionWorker {
    tracker: SceneTracker,
    debouncer: Debouncer,
    rx: mpsc::Receiver<WorkerCommand>,
    idle_timeout: Duration,
    /// Set while the worker has nothing to do; cleared by every command.
    idle_since: Option<Instant>,
}

impl SessionWorker {
    /// Spawns a worker for `(wall_id, author_id)` on the current runtime.
    pub fn spawn(
        wall_id: WallId,
        author_id: AuthorId,
        config: SegmenterConfig,
        storage: Arc<dyn Storage>,
    ) -> (WorkerHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let debouncer = Debouncer::new(config.debounce_delay());
        let idle_timeout = config.worker_idle_timeout();
        let segmenter = SessionSegmenter::new(wall_id, author_id, config, storage.clone());
        let worker = SessionWorker {
            tracker: SceneTracker::new(segmenter, storage),
            debouncer,
            rx,
            idle_timeout,
            idle_since: None,
        };
        let join = tokio::spawn(worker.run());
        let handle = WorkerHandle {
            wall_id,
            author_id,
            tx,
        };
        (handle, join)
    }

    async fn run(mut self) {
        let wall_id = self.tracker.segmenter().wall_id();
        let author_id = self.tracker.segmenter().author_id();
        info!("Worker started for author {} on wall {}", author_id, wall_id);

        loop {
            let watchdog = self.tracker.segmenter().watchdog_deadline();
            let debounce = self.debouncer.deadline();
            let idle = self.idle_deadline();

            tokio::select! {
                biased;

                command = self.rx.recv() => {
                    self.idle_since = None;
                    match command {
                        Some(WorkerCommand::Shutdown) | None => break,
                        Some(command) => self.handle(command).await,
                    }
                }
                _ = expire_at(debounce) => {
                    if let Err(e) = self.reconcile_pending().await {
                        warn!("Debounced reconcile on wall {} failed: {}", wall_id, e);
                    }
                }
                _ = expire_at(watchdog) => {
                    self.tracker.segmenter_mut().on_inactivity().await;
                }
                _ = expire_at(idle) => {
                    info!(
                        "Worker for author {} on wall {} idle for {}ms, exiting",
                        author_id,
                        wall_id,
                        self.idle_timeout.as_millis()
                    );
                    break;
                }
            }
        }

        self.tracker.segmenter_mut().destroy();
        info!("Worker stopped for author {} on wall {}", author_id, wall_id);
    }

    /// When the worker gives up for lack of work. `None` while it holds a
    /// session or a pending snapshot.
    fn idle_deadline(&mut self) -> Option<Instant> {
        let busy = self.tracker.segmenter().current_session().is_some()
            || self.debouncer.deadline().is_some();
        if busy {
            self.idle_since = None;
            return None;
        }
        let since = *self.idle_since.get_or_insert_with(Instant::now);
        Some(since + self.idle_timeout)
    }

    async fn handle(&mut self, command: WorkerCommand) {
        match command {
            WorkerCommand::SceneChanged(elements) => {
                debug!("Scene changed: {} element(s), debouncing", elements.len());
                self.debouncer.schedule(elements);
            }
            WorkerCommand::ProcessElement { element, reply } => {
                let result = self.tracker.segmenter_mut().process_element(&element).await;
                if reply.send(result).is_err() {
                    debug!("ProcessElement caller went away");
                }
            }
            WorkerCommand::Flush { reply } => {
                let result = self.reconcile_pending().await;
                let _ = reply.send(result);
            }
            WorkerCommand::Finalize { session_id, reply } => {
                let segmenter = self.tracker.segmenter_mut();
                let finalized = if segmenter.current_session().map(|s| s.id) == Some(session_id) {
                    segmenter.finalize_session(session_id).await
                } else {
                    debug!("[{}] Not the current session, nothing to release", session_id);
                    None
                };
                let _ = reply.send(finalized);
            }
            WorkerCommand::CurrentSession { reply } => {
                let current = self.tracker.segmenter().current_session().cloned();
                let _ = reply.send(current);
            }
            WorkerCommand::Shutdown => {
                error!("Shutdown must be handled by the run loop");
            }
        }
    }

    async fn reconcile_pending(&mut self) -> Result<ReconcileReport, SessionError> {
        match self.debouncer.take() {
            Some(elements) => self.tracker.reconcile(&elements).await,
            None => Ok(ReconcileReport::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session_management::SessionStatus;
    use crate::storage::testing::{Op, RecordingStorage};
    use std::time::Duration;
    use tokio::time::sleep;
    use uuid::Uuid;

    fn spawn(storage: &Arc<RecordingStorage>) -> (WorkerHandle, JoinHandle<()>) {
        let _ = env_logger::builder().is_test(true).try_init();
        SessionWorker::spawn(
            Uuid::new_v4(),
            Uuid::new_v4(),
            SegmenterConfig::default(),
            storage.clone(),
        )
    }

    fn rect(id: &str, x: f64) -> CanvasElement {
        CanvasElement::new(id, "rectangle", x, 0.0, 20.0, 20.0)
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_snapshots_reconciles_once_after_quiet_period() {
        let storage = Arc::new(RecordingStorage::new());
        let (handle, _join) = spawn(&storage);

        handle.scene_changed(vec![rect("a", 0.0)]).await.unwrap();
        sleep(Duration::from_millis(200)).await;
        handle.scene_changed(vec![rect("a", 0.0), rect("b", 30.0)]).await.unwrap();
        sleep(Duration::from_millis(499)).await;
        assert_eq!(storage.count(Op::CreateNode), 0);

        sleep(Duration::from_millis(2)).await;
        assert_eq!(storage.count(Op::CreateNode), 2);
        assert_eq!(storage.count(Op::CreateSession), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_runs_pending_reconcile_immediately() {
        let storage = Arc::new(RecordingStorage::new());
        let (handle, _join) = spawn(&storage);

        handle.scene_changed(vec![rect("a", 0.0)]).await.unwrap();
        let report = handle.flush().await.unwrap();
        assert_eq!(report.created, 1);

        // nothing left for the debounce timer
        sleep(Duration::from_secs(1)).await;
        assert_eq!(storage.count(Op::CreateNode), 1);
        assert_eq!(handle.flush().await.unwrap(), ReconcileReport::default());
    }

    #[tokio::test(start_paused = true)]
    async fn watchdog_auto_finalizes_exactly_once() {
        let storage = Arc::new(RecordingStorage::new());
        let (handle, _join) = spawn(&storage);

        let first = handle.process_element(rect("a", 0.0)).await.unwrap().session;
        sleep(Duration::from_millis(59_999)).await;
        assert_eq!(storage.count(Op::FinalizeSession), 0);

        // the worker fires at 60000, before the clock reaches 60001
        sleep(Duration::from_millis(2)).await;
        assert!(handle.current_session().await.unwrap().is_none());
        assert_eq!(storage.count(Op::FinalizeSession), 1);

        sleep(Duration::from_secs(300)).await;
        assert_eq!(storage.count(Op::FinalizeSession), 1);
        let stored = storage.inner.get_session(first.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SessionStatus::Finalized);

        let second = handle.process_element(rect("b", 0.0)).await.unwrap().session;
        assert_ne!(second.id, first.id);
    }

    #[tokio::test(start_paused = true)]
    async fn finalize_command_closes_the_current_session() {
        let storage = Arc::new(RecordingStorage::new());
        let (handle, _join) = spawn(&storage);

        assert_eq!(handle.finalize_session(Uuid::new_v4()).await.unwrap(), None);
        assert_eq!(storage.count(Op::FinalizeSession), 0);

        let first = handle.process_element(rect("a", 0.0)).await.unwrap().session;
        let closed = handle.finalize_session(first.id).await.unwrap().unwrap();

        assert_eq!(closed.id, first.id);
        assert_eq!(closed.status, SessionStatus::Finalized);
        assert!(handle.current_session().await.unwrap().is_none());
        assert_eq!(storage.count(Op::FinalizeSession), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn finalize_leaves_a_replacement_session_alone() {
        let storage = Arc::new(RecordingStorage::new());
        let (handle, _join) = spawn(&storage);

        let s1 = handle.process_element(rect("a", 0.0)).await.unwrap().session;
        // a debounced far-away element replaces s1 before the finalize arrives
        handle.scene_changed(vec![rect("far", 5000.0)]).await.unwrap();
        sleep(Duration::from_millis(600)).await;

        assert_eq!(handle.finalize_session(s1.id).await.unwrap(), None);

        let s2 = handle.current_session().await.unwrap().unwrap();
        assert_ne!(s2.id, s1.id);
        assert_eq!(s2.status, SessionStatus::Active);
        let stored = storage.inner.get_session(s2.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SessionStatus::Active);
        assert_eq!(storage.count(Op::FinalizeSession), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_worker_exits_after_grace_period() {
        let storage = Arc::new(RecordingStorage::new());
        let (handle, join) = spawn(&storage);

        sleep(Duration::from_millis(599_999)).await;
        assert!(!handle.is_closed());

        join.await.unwrap();
        assert!(handle.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn worker_with_a_session_is_not_idle() {
        let storage = Arc::new(RecordingStorage::new());
        let (handle, join) = spawn(&storage);

        let start = Instant::now();
        handle.process_element(rect("a", 0.0)).await.unwrap();
        sleep(Duration::from_millis(600_001)).await;
        assert!(!handle.is_closed());

        // watchdog at 60s, then the full grace period
        join.await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(660_000));
        assert_eq!(storage.count(Op::FinalizeSession), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_tears_down_without_finalizing() {
        let storage = Arc::new(RecordingStorage::new());
        let (handle, join) = spawn(&storage);

        handle.process_element(rect("a", 0.0)).await.unwrap();
        handle.shutdown().await.unwrap();
        join.await.unwrap();

        assert!(handle.is_closed());
        assert_eq!(storage.count(Op::FinalizeSession), 0);
        assert_eq!(
            handle.current_session().await,
            Err(SessionError::WorkerUnavailable)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_every_handle_stops_the_worker() {
        let storage = Arc::new(RecordingStorage::new());
        let (handle, join) = spawn(&storage);
        handle.process_element(rect("a", 0.0)).await.unwrap();

        drop(handle);
        join.await.unwrap();
        assert_eq!(storage.count(Op::FinalizeSession), 0);
    }
}
