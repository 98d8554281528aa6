use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, error, info};
use uuid::Uuid;

use crate::canvas::{
    AuthorId, CanvasNode, NewNode, NewWall, NodeId, NodeUpdate, SceneSnapshot, SessionId, Wall,
    WallId, WallView,
};
use crate::error_handling::types::StorageError;
use crate::session::Session;
use crate::storage::storage_trait::Storage;
use crate::storage::types::{
    newest_first, newest_walls_first, oldest_first, NodeFilter, SessionFilter, WallFilter,
};

#[derive(Default)]
struct MemoryState {
    sessions: HashMap<SessionId, Session>,
    nodes: HashMap<NodeId, CanvasNode>,
    walls: HashMap<WallId, Wall>,
    views: Vec<WallView>,
    scenes: HashMap<WallId, SceneSnapshot>,
}

/// Process-local storage. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStorage {
    state: Mutex<MemoryState>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StorageError> {
        self.state.lock().map_err(|e| {
            error!("MemoryStorage lock poisoned: {}", e);
            StorageError::ConnectionFailed
        })
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn create_session(
        &self,
        wall_id: WallId,
        author_id: AuthorId,
    ) -> Result<Session, StorageError> {
        let session = Session::new(Uuid::new_v4(), wall_id, author_id, Utc::now());
        self.lock()?.sessions.insert(session.id, session.clone());
        debug!("[{}] Session stored in memory", session.id);
        Ok(session)
    }

    async fn finalize_session(&self, session_id: SessionId) -> Result<Session, StorageError> {
        let mut state = self.lock()?;
        let session = state
            .sessions
            .get_mut(&session_id)
            .ok_or(StorageError::NotFound)?;
        if session.finalize(Utc::now()) {
            info!("[{}] Session finalized", session_id);
        }
        Ok(session.clone())
    }

    async fn get_session(&self, session_id: SessionId) -> Result<Option<Session>, StorageError> {
        Ok(self.lock()?.sessions.get(&session_id).cloned())
    }

    async fn get_sessions(&self, filter: SessionFilter) -> Result<Vec<Session>, StorageError> {
        let mut sessions: Vec<Session> = self
            .lock()?
            .sessions
            .values()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        newest_first(&mut sessions);
        Ok(sessions)
    }

    async fn delete_session(&self, session_id: SessionId) -> Result<bool, StorageError> {
        let mut state = self.lock()?;
        if state.sessions.remove(&session_id).is_none() {
            return Ok(false);
        }
        state.nodes.retain(|_, node| node.session_id != session_id);
        info!("[{}] Session deleted with its nodes", session_id);
        Ok(true)
    }

    async fn create_node(&self, node: NewNode) -> Result<CanvasNode, StorageError> {
        let mut state = self.lock()?;
        if !state.sessions.contains_key(&node.session_id) {
            return Err(StorageError::NotFound);
        }
        let node = CanvasNode::from_new(Uuid::new_v4(), node, Utc::now());
        state.nodes.insert(node.id, node.clone());
        Ok(node)
    }

    async fn update_node(
        &self,
        node_id: NodeId,
        update: NodeUpdate,
    ) -> Result<CanvasNode, StorageError> {
        let mut state = self.lock()?;
        let node = state.nodes.get_mut(&node_id).ok_or(StorageError::NotFound)?;
        node.apply(&update, Utc::now());
        Ok(node.clone())
    }

    async fn get_node(&self, node_id: NodeId) -> Result<Option<CanvasNode>, StorageError> {
        Ok(self.lock()?.nodes.get(&node_id).cloned())
    }

    async fn get_nodes(&self, filter: NodeFilter) -> Result<Vec<CanvasNode>, StorageError> {
        let mut nodes: Vec<CanvasNode> = self
            .lock()?
            .nodes
            .values()
            .filter(|n| filter.matches(n))
            .cloned()
            .collect();
        oldest_first(&mut nodes);
        Ok(nodes)
    }

    async fn delete_node(&self, node_id: NodeId) -> Result<bool, StorageError> {
        Ok(self.lock()?.nodes.remove(&node_id).is_some())
    }

    async fn create_wall(&self, wall: NewWall) -> Result<Wall, StorageError> {
        let mut state = self.lock()?;
        if state.walls.values().any(|w| w.slug == wall.slug) {
            return Err(StorageError::AlreadyExists);
        }
        let wall = Wall::from_new(Uuid::new_v4(), wall, Utc::now());
        state.walls.insert(wall.id, wall.clone());
        info!("[{}] Wall '{}' created as {}", wall.id, wall.name, wall.slug);
        Ok(wall)
    }

    async fn get_wall(&self, wall_id: WallId) -> Result<Option<Wall>, StorageError> {
        Ok(self.lock()?.walls.get(&wall_id).cloned())
    }

    async fn get_wall_by_slug(&self, slug: &str) -> Result<Option<Wall>, StorageError> {
        Ok(self
            .lock()?
            .walls
            .values()
            .find(|w| w.slug == slug)
            .cloned())
    }

    async fn get_walls(&self, filter: WallFilter) -> Result<Vec<Wall>, StorageError> {
        let mut walls: Vec<Wall> = self
            .lock()?
            .walls
            .values()
            .filter(|w| filter.matches(w))
            .cloned()
            .collect();
        newest_walls_first(&mut walls);
        Ok(walls)
    }

    async fn mark_wall_opened(&self, wall_id: WallId) -> Result<Wall, StorageError> {
        let mut state = self.lock()?;
        let wall = state.walls.get_mut(&wall_id).ok_or(StorageError::NotFound)?;
        wall.mark_opened(Utc::now());
        Ok(wall.clone())
    }

    async fn record_wall_view(
        &self,
        wall_id: WallId,
        viewer_id: AuthorId,
    ) -> Result<WallView, StorageError> {
        let mut state = self.lock()?;
        if !state.walls.contains_key(&wall_id) {
            return Err(StorageError::NotFound);
        }
        let view = WallView {
            id: Uuid::new_v4(),
            wall_id,
            viewer_id,
            viewed_at: Utc::now(),
        };
        state.views.push(view.clone());
        Ok(view)
    }

    async fn get_wall_views(&self, wall_id: WallId) -> Result<Vec<WallView>, StorageError> {
        Ok(self
            .lock()?
            .views
            .iter()
            .filter(|v| v.wall_id == wall_id)
            .cloned()
            .collect())
    }

    async fn delete_wall(&self, wall_id: WallId) -> Result<bool, StorageError> {
        let mut state = self.lock()?;
        if state.walls.remove(&wall_id).is_none() {
            return Ok(false);
        }
        state.sessions.retain(|_, session| session.wall_id != wall_id);
        state.nodes.retain(|_, node| node.wall_id != wall_id);
        state.views.retain(|view| view.wall_id != wall_id);
        state.scenes.remove(&wall_id);
        info!("[{}] Wall deleted with its sessions and nodes", wall_id);
        Ok(true)
    }

    async fn save_scene(&self, scene: SceneSnapshot) -> Result<SceneSnapshot, StorageError> {
        let mut state = self.lock()?;
        if !state.walls.contains_key(&scene.wall_id) {
            return Err(StorageError::NotFound);
        }
        state.scenes.insert(scene.wall_id, scene.clone());
        debug!(
            "[{}] Scene saved with {} element(s)",
            scene.wall_id,
            scene.elements.len()
        );
        Ok(scene)
    }

    async fn get_scene(&self, wall_id: WallId) -> Result<Option<SceneSnapshot>, StorageError> {
        Ok(self.lock()?.scenes.get(&wall_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::CanvasElement;
    use crate::session_management::SessionStatus;
    use crate::storage::session_filter::{by_wall, nodes_of, walls_of};
    use serde_json::json;

    fn node_for(session: &Session, element_id: &str) -> NewNode {
        let element = CanvasElement::new(element_id, "rectangle", 0.0, 0.0, 10.0, 10.0);
        NewNode::from_element(&element, session.id, session.wall_id, session.author_id)
    }

    #[tokio::test]
    async fn sessions_are_listed_newest_first() {
        let storage = MemoryStorage::new();
        let wall = Uuid::new_v4();
        let first = storage.create_session(wall, Uuid::new_v4()).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        let second = storage.create_session(wall, Uuid::new_v4()).await.unwrap();
        storage.create_session(Uuid::new_v4(), Uuid::new_v4()).await.unwrap();

        let listed = storage.get_sessions(by_wall(wall)).await.unwrap();
        let ids: Vec<_> = listed.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn finalize_is_idempotent() {
        let storage = MemoryStorage::new();
        let session = storage
            .create_session(Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap();

        let once = storage.finalize_session(session.id).await.unwrap();
        let twice = storage.finalize_session(session.id).await.unwrap();
        assert_eq!(once.status, SessionStatus::Finalized);
        assert_eq!(once.finalized_at, twice.finalized_at);

        assert_eq!(
            storage.finalize_session(Uuid::new_v4()).await,
            Err(StorageError::NotFound)
        );
    }

    #[tokio::test]
    async fn node_needs_existing_session() {
        let storage = MemoryStorage::new();
        let orphan = Session::new(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Utc::now());
        let result = storage.create_node(node_for(&orphan, "x")).await;
        assert_eq!(result, Err(StorageError::NotFound));
    }

    #[tokio::test]
    async fn deleting_a_session_removes_its_nodes() {
        let storage = MemoryStorage::new();
        let wall = Uuid::new_v4();
        let author = Uuid::new_v4();
        let kept = storage.create_session(wall, author).await.unwrap();
        let dropped = storage.create_session(wall, author).await.unwrap();
        storage.create_node(node_for(&kept, "a")).await.unwrap();
        storage.create_node(node_for(&dropped, "b")).await.unwrap();
        storage.create_node(node_for(&dropped, "c")).await.unwrap();

        assert!(storage.delete_session(dropped.id).await.unwrap());
        assert!(!storage.delete_session(dropped.id).await.unwrap());

        let remaining = storage.get_nodes(nodes_of(wall, None)).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].session_id, kept.id);
    }

    #[tokio::test]
    async fn summaries_skip_empty_sessions_and_paginate() {
        let storage = MemoryStorage::new();
        let wall = Uuid::new_v4();
        let author = Uuid::new_v4();

        let mut with_nodes = Vec::new();
        for i in 0..3 {
            let session = storage.create_session(wall, author).await.unwrap();
            storage
                .create_node(node_for(&session, &format!("e{}", i)))
                .await
                .unwrap();
            with_nodes.push(session.id);
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }
        storage.create_session(wall, author).await.unwrap();

        let first = storage.session_summaries(author, 1, 2).await.unwrap();
        assert!(first.pagination.has_more);
        // the newest session is empty, so only one of the first two shows up
        assert_eq!(first.sessions.len(), 1);
        assert_eq!(first.sessions[0].session_id, with_nodes[2]);
        assert_eq!(first.sessions[0].node_count, 1);

        let second = storage.session_summaries(author, 2, 2).await.unwrap();
        assert!(second.pagination.has_more);
        assert_eq!(second.sessions.len(), 2);

        let third = storage.session_summaries(author, 3, 2).await.unwrap();
        assert!(!third.pagination.has_more);
        assert!(third.sessions.is_empty());
    }

    async fn wall(storage: &MemoryStorage, name: &str, creator: AuthorId) -> Wall {
        let new = NewWall::named(name, None, creator).unwrap();
        storage.create_wall(new).await.unwrap()
    }

    #[tokio::test]
    async fn walls_are_found_by_slug_and_slugs_are_unique() {
        let storage = MemoryStorage::new();
        let creator = Uuid::new_v4();
        let lobby = wall(&storage, "Lobby", creator).await;

        let found = storage.get_wall_by_slug(&lobby.slug).await.unwrap();
        assert_eq!(found, Some(lobby.clone()));
        assert!(storage.get_wall_by_slug("lobby").await.unwrap().is_none());

        let mut clash = NewWall::named("Lobby", None, creator).unwrap();
        clash.slug = lobby.slug.clone();
        assert_eq!(
            storage.create_wall(clash).await,
            Err(StorageError::AlreadyExists)
        );

        wall(&storage, "Other", Uuid::new_v4()).await;
        let mine = storage.get_walls(walls_of(creator)).await.unwrap();
        assert_eq!(mine.len(), 1);
    }

    #[tokio::test]
    async fn opening_a_wall_stamps_it_and_records_the_view() {
        let storage = MemoryStorage::new();
        let lobby = wall(&storage, "Lobby", Uuid::new_v4()).await;
        let visitor = Uuid::new_v4();

        let opened = storage.mark_wall_opened(lobby.id).await.unwrap();
        assert!(opened.last_opened_at.is_some());
        storage.record_wall_view(lobby.id, visitor).await.unwrap();

        let views = storage.get_wall_views(lobby.id).await.unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].viewer_id, visitor);

        assert_eq!(
            storage.mark_wall_opened(Uuid::new_v4()).await,
            Err(StorageError::NotFound)
        );
        assert!(storage
            .record_wall_view(Uuid::new_v4(), visitor)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn deleting_a_wall_cascades() {
        let storage = MemoryStorage::new();
        let author = Uuid::new_v4();
        let doomed = wall(&storage, "Doomed", author).await;
        let kept = wall(&storage, "Kept", author).await;

        let session = storage.create_session(doomed.id, author).await.unwrap();
        storage.create_node(node_for(&session, "a")).await.unwrap();
        let survivor = storage.create_session(kept.id, author).await.unwrap();
        storage.create_node(node_for(&survivor, "b")).await.unwrap();
        storage.record_wall_view(doomed.id, author).await.unwrap();
        storage
            .save_scene(SceneSnapshot {
                wall_id: doomed.id,
                elements: vec![json!({"id": "a"})],
                app_state: Default::default(),
                last_edited_by: author,
                updated_at: Utc::now(),
            })
            .await
            .unwrap();

        assert!(storage.delete_wall(doomed.id).await.unwrap());
        assert!(!storage.delete_wall(doomed.id).await.unwrap());

        assert!(storage.get_session(session.id).await.unwrap().is_none());
        assert!(storage.get_nodes(nodes_of(doomed.id, None)).await.unwrap().is_empty());
        assert!(storage.get_wall_views(doomed.id).await.unwrap().is_empty());
        assert!(storage.get_scene(doomed.id).await.unwrap().is_none());
        assert_eq!(storage.get_nodes(nodes_of(kept.id, None)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn scene_is_replaced_and_needs_a_wall() {
        let storage = MemoryStorage::new();
        let author = Uuid::new_v4();
        let lobby = wall(&storage, "Lobby", author).await;
        let scene = |n: usize| SceneSnapshot {
            wall_id: lobby.id,
            elements: (0..n).map(|i| json!({"id": i})).collect(),
            app_state: Default::default(),
            last_edited_by: author,
            updated_at: Utc::now(),
        };

        assert!(storage.get_scene(lobby.id).await.unwrap().is_none());
        storage.save_scene(scene(3)).await.unwrap();
        storage.save_scene(scene(1)).await.unwrap();
        let saved = storage.get_scene(lobby.id).await.unwrap().unwrap();
        assert_eq!(saved.elements.len(), 1);

        let mut orphan = scene(1);
        orphan.wall_id = Uuid::new_v4();
        assert_eq!(storage.save_scene(orphan).await, Err(StorageError::NotFound));
    }

    #[tokio::test]
    async fn wall_summaries_count_the_creators_activity() {
        let storage = MemoryStorage::new();
        let creator = Uuid::new_v4();
        let older = wall(&storage, "Older", creator).await;
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        let newer = wall(&storage, "Newer", creator).await;

        let s1 = storage.create_session(older.id, creator).await.unwrap();
        storage.create_node(node_for(&s1, "a")).await.unwrap();
        storage.create_node(node_for(&s1, "b")).await.unwrap();
        storage.finalize_session(s1.id).await.unwrap();
        storage.create_session(older.id, creator).await.unwrap();
        // someone else's work on the wall is not counted
        let guest = storage.create_session(older.id, Uuid::new_v4()).await.unwrap();
        storage.create_node(node_for(&guest, "c")).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        storage.mark_wall_opened(older.id).await.unwrap();

        let page = storage.wall_summaries(creator, 1, 20).await.unwrap();
        assert!(!page.pagination.has_more);
        let ids: Vec<_> = page.walls.iter().map(|w| w.wall_id).collect();
        assert_eq!(ids, vec![older.id, newer.id]);

        let stats = page.walls[0].stats;
        assert_eq!(stats.total_sessions, 2);
        assert_eq!(stats.active_sessions, 1);
        assert_eq!(stats.total_elements, 2);
        assert_eq!(page.walls[1].stats, Default::default());
        assert_eq!(page.walls[1].last_activity, newer.created_at);

        let first = storage.wall_summaries(creator, 1, 1).await.unwrap();
        assert!(first.pagination.has_more);
        assert_eq!(first.walls.len(), 1);
    }
}
