//! Storage Trait
//!
//! This module defines the `Storage` trait, the persistence collaborator the
//! segmenter and the HTTP layer talk to.
//!
//! Implementors of this trait are responsible for:
//! - Assigning ids to new sessions and nodes
//! - Marking sessions finalized
//! - Creating, updating and deleting nodes
//! - Listing sessions and nodes for review
//! - Keeping walls, their visits and their last saved scene
//!
//! All methods are asynchronous and return a `Result` to surface storage errors.
//! Callers never retry: a failed call is logged and abandoned.

use async_trait::async_trait;

use crate::canvas::{
    AuthorId, CanvasNode, NewNode, NewWall, NodeId, NodeUpdate, SceneSnapshot, SessionId, Wall,
    WallId, WallView,
};
use crate::error_handling::types::StorageError;
use crate::session::Session;
use crate::session_management::SessionStatus;
use crate::storage::session_filter::{
    author_nodes_on_wall, author_on_wall, by_author, walls_of,
};
use crate::storage::types::{
    NodeFilter, Pagination, SessionFilter, SessionPage, SessionSummary, WallFilter, WallPage,
    WallStats, WallSummary,
};

/// The `Storage` trait defines the interface for wall, session and node storage backends.
///
/// Walls are optional metadata: sessions and nodes may reference a wall id
/// that was never registered.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Creates a new active session for `author_id` on `wall_id` and returns it
    /// with its storage-assigned id.
    async fn create_session(
        &self,
        wall_id: WallId,
        author_id: AuthorId,
    ) -> Result<Session, StorageError>;

    /// Marks a session finalized. Finalizing twice is not an error.
    async fn finalize_session(&self, session_id: SessionId) -> Result<Session, StorageError>;

    /// Fetches one session.
    async fn get_session(&self, session_id: SessionId) -> Result<Option<Session>, StorageError>;

    /// Lists sessions matching `filter`, newest first.
    async fn get_sessions(&self, filter: SessionFilter) -> Result<Vec<Session>, StorageError>;

    /// Deletes a session and all of its nodes. Returns false if it did not exist.
    async fn delete_session(&self, session_id: SessionId) -> Result<bool, StorageError>;

    /// Persists a node. Fails with `NotFound` when its session does not exist.
    async fn create_node(&self, node: NewNode) -> Result<CanvasNode, StorageError>;

    /// Applies a partial update. Fails with `NotFound` for unknown nodes.
    async fn update_node(
        &self,
        node_id: NodeId,
        update: NodeUpdate,
    ) -> Result<CanvasNode, StorageError>;

    /// Fetches one node.
    async fn get_node(&self, node_id: NodeId) -> Result<Option<CanvasNode>, StorageError>;

    /// Lists nodes matching `filter`, oldest first.
    async fn get_nodes(&self, filter: NodeFilter) -> Result<Vec<CanvasNode>, StorageError>;

    /// Deletes a node. Returns false if it did not exist.
    async fn delete_node(&self, node_id: NodeId) -> Result<bool, StorageError>;

    /// Persists a wall. Fails with `AlreadyExists` when its slug is taken.
    async fn create_wall(&self, wall: NewWall) -> Result<Wall, StorageError>;

    async fn get_wall(&self, wall_id: WallId) -> Result<Option<Wall>, StorageError>;

    async fn get_wall_by_slug(&self, slug: &str) -> Result<Option<Wall>, StorageError>;

    /// Lists walls matching `filter`, newest first.
    async fn get_walls(&self, filter: WallFilter) -> Result<Vec<Wall>, StorageError>;

    /// Stamps `last_opened_at` with the current time.
    async fn mark_wall_opened(&self, wall_id: WallId) -> Result<Wall, StorageError>;

    /// Records one visit by `viewer_id`. Fails with `NotFound` for unknown walls.
    async fn record_wall_view(
        &self,
        wall_id: WallId,
        viewer_id: AuthorId,
    ) -> Result<WallView, StorageError>;

    /// Visits of one wall, oldest first.
    async fn get_wall_views(&self, wall_id: WallId) -> Result<Vec<WallView>, StorageError>;

    /// Deletes a wall with every session, node, visit and scene on it.
    /// Returns false if it did not exist.
    async fn delete_wall(&self, wall_id: WallId) -> Result<bool, StorageError>;

    /// Replaces the wall's saved scene. Fails with `NotFound` for unknown walls.
    async fn save_scene(&self, scene: SceneSnapshot) -> Result<SceneSnapshot, StorageError>;

    async fn get_scene(&self, wall_id: WallId) -> Result<Option<SceneSnapshot>, StorageError>;

    /// One page of an author's sessions with node counts, newest first.
    ///
    /// `page` is 1-based. Sessions without nodes are left out of the page, and
    /// `has_more` reports whether the unfiltered page was full.
    async fn session_summaries(
        &self,
        author_id: AuthorId,
        page: u32,
        limit: u32,
    ) -> Result<SessionPage, StorageError> {
        let page = page.max(1);
        let limit = limit.max(1);
        let offset = ((page - 1) as usize).saturating_mul(limit as usize);

        let raw: Vec<Session> = self
            .get_sessions(by_author(author_id))
            .await?
            .into_iter()
            .skip(offset)
            .take(limit as usize)
            .collect();
        let has_more = raw.len() == limit as usize;

        let mut sessions = Vec::with_capacity(raw.len());
        for session in raw {
            let node_count = self
                .get_nodes(NodeFilter {
                    wall_id: Some(session.wall_id),
                    session_id: Some(session.id),
                    ..Default::default()
                })
                .await?
                .len();
            if node_count == 0 {
                continue;
            }
            sessions.push(SessionSummary {
                session_id: session.id,
                wall_id: session.wall_id,
                node_count,
                status: session.status,
                created_at: session.created_at,
                updated_at: session.updated_at,
                finalized_at: session.finalized_at,
            });
        }

        Ok(SessionPage {
            sessions,
            pagination: Pagination {
                page,
                limit,
                has_more,
            },
        })
    }

    /// One page of the walls `creator_id` made, most recently used first,
    /// each with the creator's own session and node counts on it.
    ///
    /// `page` is 1-based; `has_more` reports whether the page was full.
    async fn wall_summaries(
        &self,
        creator_id: AuthorId,
        page: u32,
        limit: u32,
    ) -> Result<WallPage, StorageError> {
        let page = page.max(1);
        let limit = limit.max(1);
        let offset = ((page - 1) as usize).saturating_mul(limit as usize);

        let mut walls = self.get_walls(walls_of(creator_id)).await?;
        walls.sort_by(|a, b| b.last_activity().cmp(&a.last_activity()));
        let walls: Vec<Wall> = walls
            .into_iter()
            .skip(offset)
            .take(limit as usize)
            .collect();
        let has_more = walls.len() == limit as usize;

        let mut summaries = Vec::with_capacity(walls.len());
        for wall in walls {
            let sessions = self
                .get_sessions(author_on_wall(wall.id, creator_id))
                .await?;
            let total_elements = self
                .get_nodes(author_nodes_on_wall(wall.id, creator_id))
                .await?
                .len();
            let stats = WallStats {
                total_sessions: sessions.len(),
                active_sessions: sessions
                    .iter()
                    .filter(|s| s.status == SessionStatus::Active)
                    .count(),
                total_elements,
            };
            summaries.push(WallSummary {
                wall_id: wall.id,
                last_activity: wall.last_activity(),
                name: wall.name,
                slug: wall.slug,
                created_at: wall.created_at,
                last_opened_at: wall.last_opened_at,
                stats,
            });
        }

        Ok(WallPage {
            walls: summaries,
            pagination: Pagination {
                page,
                limit,
                has_more,
            },
        })
    }
}
