//! Test double recording every mutating storage call, with failure injection.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::canvas::{
    AuthorId, CanvasNode, NewNode, NewWall, NodeId, NodeUpdate, SceneSnapshot, SessionId, Wall,
    WallId, WallView,
};
use crate::error_handling::types::StorageError;
use crate::session::Session;
use crate::storage::memory_storage::MemoryStorage;
use crate::storage::storage_trait::Storage;
use crate::storage::types::{NodeFilter, SessionFilter, WallFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    CreateSession,
    FinalizeSession,
    CreateNode,
    UpdateNode,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateSession(SessionId),
    FinalizeSession(SessionId),
    CreateNode(String),
    UpdateNode(NodeId),
}

#[derive(Default)]
pub struct RecordingStorage {
    pub inner: MemoryStorage,
    calls: Mutex<Vec<Call>>,
    failing: Mutex<HashSet<Op>>,
}

impl RecordingStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn count(&self, op: Op) -> usize {
        self.calls()
            .iter()
            .filter(|c| {
                matches!(
                    (c, op),
                    (Call::CreateSession(_), Op::CreateSession)
                        | (Call::FinalizeSession(_), Op::FinalizeSession)
                        | (Call::CreateNode(_), Op::CreateNode)
                        | (Call::UpdateNode(_), Op::UpdateNode)
                )
            })
            .count()
    }

    pub fn fail(&self, op: Op) {
        self.failing.lock().unwrap().insert(op);
    }

    pub fn recover(&self, op: Op) {
        self.failing.lock().unwrap().remove(&op);
    }

    fn should_fail(&self, op: Op) -> bool {
        self.failing.lock().unwrap().contains(&op)
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Storage for RecordingStorage {
    async fn create_session(
        &self,
        wall_id: WallId,
        author_id: AuthorId,
    ) -> Result<Session, StorageError> {
        if self.should_fail(Op::CreateSession) {
            return Err(StorageError::ConnectionFailed);
        }
        let session = self.inner.create_session(wall_id, author_id).await?;
        self.record(Call::CreateSession(session.id));
        Ok(session)
    }

    async fn finalize_session(&self, session_id: SessionId) -> Result<Session, StorageError> {
        self.record(Call::FinalizeSession(session_id));
        if self.should_fail(Op::FinalizeSession) {
            return Err(StorageError::ConnectionFailed);
        }
        self.inner.finalize_session(session_id).await
    }

    async fn get_session(&self, session_id: SessionId) -> Result<Option<Session>, StorageError> {
        self.inner.get_session(session_id).await
    }

    async fn get_sessions(&self, filter: SessionFilter) -> Result<Vec<Session>, StorageError> {
        self.inner.get_sessions(filter).await
    }

    async fn delete_session(&self, session_id: SessionId) -> Result<bool, StorageError> {
        self.inner.delete_session(session_id).await
    }

    async fn create_node(&self, node: NewNode) -> Result<CanvasNode, StorageError> {
        let element_id = node.content["excalidrawId"].as_str().unwrap_or_default().to_string();
        self.record(Call::CreateNode(element_id));
        if self.should_fail(Op::CreateNode) {
            return Err(StorageError::WriteFailed);
        }
        self.inner.create_node(node).await
    }

    async fn update_node(
        &self,
        node_id: NodeId,
        update: NodeUpdate,
    ) -> Result<CanvasNode, StorageError> {
        self.record(Call::UpdateNode(node_id));
        if self.should_fail(Op::UpdateNode) {
            return Err(StorageError::WriteFailed);
        }
        self.inner.update_node(node_id, update).await
    }

    async fn get_node(&self, node_id: NodeId) -> Result<Option<CanvasNode>, StorageError> {
        self.inner.get_node(node_id).await
    }

    async fn get_nodes(&self, filter: NodeFilter) -> Result<Vec<CanvasNode>, StorageError> {
        self.inner.get_nodes(filter).await
    }

    async fn delete_node(&self, node_id: NodeId) -> Result<bool, StorageError> {
        self.inner.delete_node(node_id).await
    }

    async fn create_wall(&self, wall: NewWall) -> Result<Wall, StorageError> {
        self.inner.create_wall(wall).await
    }

    async fn get_wall(&self, wall_id: WallId) -> Result<Option<Wall>, StorageError> {
        self.inner.get_wall(wall_id).await
    }

    async fn get_wall_by_slug(&self, slug: &str) -> Result<Option<Wall>, StorageError> {
        self.inner.get_wall_by_slug(slug).await
    }

    async fn get_walls(&self, filter: WallFilter) -> Result<Vec<Wall>, StorageError> {
        self.inner.get_walls(filter).await
    }

    async fn mark_wall_opened(&self, wall_id: WallId) -> Result<Wall, StorageError> {
        self.inner.mark_wall_opened(wall_id).await
    }

    async fn record_wall_view(
        &self,
        wall_id: WallId,
        viewer_id: AuthorId,
    ) -> Result<WallView, StorageError> {
        self.inner.record_wall_view(wall_id, viewer_id).await
    }

    async fn get_wall_views(&self, wall_id: WallId) -> Result<Vec<WallView>, StorageError> {
        self.inner.get_wall_views(wall_id).await
    }

    async fn delete_wall(&self, wall_id: WallId) -> Result<bool, StorageError> {
        self.inner.delete_wall(wall_id).await
    }

    async fn save_scene(&self, scene: SceneSnapshot) -> Result<SceneSnapshot, StorageError> {
        self.inner.save_scene(scene).await
    }

    async fn get_scene(&self, wall_id: WallId) -> Result<Option<SceneSnapshot>, StorageError> {
        self.inner.get_scene(wall_id).await
    }
}
