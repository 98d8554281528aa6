use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info};
use tokio::sync::Mutex;

use crate::canvas::{AuthorId, WallId};
use crate::configuration::types::SegmenterConfig;
use crate::storage::Storage;

use super::worker::{SessionWorker, WorkerHandle};

/// Workers keyed by (wall, author).
///
/// # Fields Overview
///
/// - `workers`: one handle per pair with a live worker; exited workers are
///   reaped lazily
/// - `config`: segmenter settings handed to every new worker
/// - `storage`: backend shared by all workers
pub struct SegmenterRegistry {
    workers: Mutex<HashMap<(WallId, AuthorId), WorkerHandle>>,
    config: SegmenterConfig,
    storage: Arc<dyn Storage>,
}

impl SegmenterRegistry {
    pub fn new(config: SegmenterConfig, storage: Arc<dyn Storage>) -> Self {
        Self {
            workers: Mutex::new(HashMap::new()),
            config,
            storage,
        }
    }

    /// Returns the worker for `(wall_id, author_id)`, spawning one if there is
    /// none yet or the previous one has exited.
    pub async fn worker(&self, wall_id: WallId, author_id: AuthorId) -> WorkerHandle {
        let mut workers = self.workers.lock().await;
        let key = (wall_id, author_id);

        if let Some(handle) = workers.get(&key) {
            if !handle.is_closed() {
                return handle.clone();
            }
            debug!(
                "Worker for author {} on wall {} had exited, respawning",
                author_id, wall_id
            );
        }
        Self::reap(&mut workers);

        let (handle, _join) = SessionWorker::spawn(
            wall_id,
            author_id,
            self.config.clone(),
            self.storage.clone(),
        );
        debug!("Spawned worker for author {} on wall {}", author_id, wall_id);
        workers.insert(key, handle.clone());
        handle
    }

    /// The existing worker for the pair, if it is still running.
    pub async fn existing(&self, wall_id: WallId, author_id: AuthorId) -> Option<WorkerHandle> {
        self.workers
            .lock()
            .await
            .get(&(wall_id, author_id))
            .filter(|h| !h.is_closed())
            .cloned()
    }

    /// Number of live workers.
    pub async fn len(&self) -> usize {
        let mut workers = self.workers.lock().await;
        Self::reap(&mut workers);
        workers.len()
    }

    /// Stops every worker drawing on `wall_id`, for when the wall is deleted.
    /// Returns how many were stopped.
    pub async fn shutdown_wall(&self, wall_id: WallId) -> usize {
        let retired: Vec<WorkerHandle> = {
            let mut workers = self.workers.lock().await;
            let keys: Vec<(WallId, AuthorId)> = workers
                .keys()
                .filter(|(wall, _)| *wall == wall_id)
                .copied()
                .collect();
            keys.iter().filter_map(|key| workers.remove(key)).collect()
        };
        for handle in &retired {
            if handle.shutdown().await.is_err() {
                debug!(
                    "Worker for author {} on wall {} was already gone",
                    handle.author_id(),
                    wall_id
                );
            }
        }
        info!("Stopped {} worker(s) on wall {}", retired.len(), wall_id);
        retired.len()
    }

    /// Tears every worker down. Current sessions are dropped, not finalized.
    pub async fn shutdown_all(&self) {
        let workers: Vec<WorkerHandle> = self.workers.lock().await.drain().map(|(_, h)| h).collect();
        info!("Shutting down {} worker(s)", workers.len());
        for handle in workers {
            if handle.shutdown().await.is_err() {
                debug!(
                    "Worker for author {} on wall {} was already gone",
                    handle.author_id(),
                    handle.wall_id()
                );
            }
        }
    }

    fn reap(workers: &mut HashMap<(WallId, AuthorId), WorkerHandle>) {
        let before = workers.len();
        workers.retain(|_, handle| !handle.is_closed());
        let reaped = before - workers.len();
        if reaped > 0 {
            debug!("Reaped {} exited worker(s)", reaped);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::CanvasElement;
    use crate::storage::testing::{Op, RecordingStorage};
    use std::time::Duration;
    use uuid::Uuid;

    fn registry(storage: &Arc<RecordingStorage>) -> SegmenterRegistry {
        let _ = env_logger::builder().is_test(true).try_init();
        SegmenterRegistry::new(SegmenterConfig::default(), storage.clone())
    }

    #[tokio::test(start_paused = true)]
    async fn same_pair_shares_a_worker() {
        let storage = Arc::new(RecordingStorage::new());
        let registry = registry(&storage);
        let (wall, author) = (Uuid::new_v4(), Uuid::new_v4());
        let element = CanvasElement::new("a", "rectangle", 0.0, 0.0, 10.0, 10.0);

        let first = registry.worker(wall, author).await;
        let s1 = first.process_element(element.clone()).await.unwrap().session;
        let again = registry.worker(wall, author).await;
        let s2 = again.process_element(element).await.unwrap().session;

        assert_eq!(s1.id, s2.id);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn authors_on_one_wall_get_separate_sessions() {
        let storage = Arc::new(RecordingStorage::new());
        let registry = registry(&storage);
        let wall = Uuid::new_v4();
        let element = CanvasElement::new("a", "rectangle", 0.0, 0.0, 10.0, 10.0);

        let alice = registry.worker(wall, Uuid::new_v4()).await;
        let bob = registry.worker(wall, Uuid::new_v4()).await;
        let sa = alice.process_element(element.clone()).await.unwrap().session;
        let sb = bob.process_element(element).await.unwrap().session;

        assert_ne!(sa.id, sb.id);
        assert_eq!(storage.count(Op::CreateSession), 2);
        assert_eq!(storage.count(Op::FinalizeSession), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn exited_worker_is_replaced() {
        let storage = Arc::new(RecordingStorage::new());
        let registry = registry(&storage);
        let (wall, author) = (Uuid::new_v4(), Uuid::new_v4());

        let first = registry.worker(wall, author).await;
        first.shutdown().await.unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(registry.existing(wall, author).await.is_none());

        let second = registry.worker(wall, author).await;
        assert!(!second.is_closed());
        assert!(second.current_session().await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn idle_workers_are_reaped() {
        let storage = Arc::new(RecordingStorage::new());
        let registry = registry(&storage);
        let (wall, author) = (Uuid::new_v4(), Uuid::new_v4());

        let idle = registry.worker(wall, author).await;
        let busy = registry.worker(wall, Uuid::new_v4()).await;
        busy.scene_changed(vec![CanvasElement::new("a", "rectangle", 0.0, 0.0, 10.0, 10.0)])
            .await
            .unwrap();
        assert_eq!(registry.len().await, 2);

        tokio::time::sleep(Duration::from_millis(600_001)).await;
        assert!(idle.is_closed());
        assert!(!busy.is_closed());
        assert_eq!(registry.len().await, 1);
        assert!(registry.existing(wall, author).await.is_none());

        let fresh = registry.worker(wall, author).await;
        assert!(!fresh.is_closed());
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_wall_only_stops_that_wall() {
        let storage = Arc::new(RecordingStorage::new());
        let registry = registry(&storage);
        let (doomed, kept) = (Uuid::new_v4(), Uuid::new_v4());
        let on_doomed = vec![
            registry.worker(doomed, Uuid::new_v4()).await,
            registry.worker(doomed, Uuid::new_v4()).await,
        ];
        let on_kept = registry.worker(kept, Uuid::new_v4()).await;

        assert_eq!(registry.shutdown_wall(doomed).await, 2);
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert!(on_doomed.iter().all(|h| h.is_closed()));
        assert!(!on_kept.is_closed());
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_all_stops_every_worker() {
        let storage = Arc::new(RecordingStorage::new());
        let registry = registry(&storage);
        let handles = vec![
            registry.worker(Uuid::new_v4(), Uuid::new_v4()).await,
            registry.worker(Uuid::new_v4(), Uuid::new_v4()).await,
        ];

        registry.shutdown_all().await;
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert_eq!(registry.len().await, 0);
        assert!(handles.iter().all(|h| h.is_closed()));
    }
}
