use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::canvas::{AuthorId, CanvasNode, SessionId, Wall, WallId};
use crate::session::Session;
use crate::session_management::SessionStatus;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionFilter {
    pub wall_id: Option<WallId>,
    pub author_id: Option<AuthorId>,
    pub status: Option<SessionStatus>,
}

impl SessionFilter {
    pub fn matches(&self, session: &Session) -> bool {
        if let Some(wall_id) = self.wall_id {
            if session.wall_id != wall_id {
                return false;
            }
        }
        if let Some(author_id) = self.author_id {
            if session.author_id != author_id {
                return false;
            }
        }
        if let Some(status) = self.status {
            if session.status != status {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeFilter {
    pub wall_id: Option<WallId>,
    pub session_id: Option<SessionId>,
    #[serde(default)]
    pub author_id: Option<AuthorId>,
}

impl NodeFilter {
    pub fn matches(&self, node: &CanvasNode) -> bool {
        self.wall_id.map_or(true, |w| node.wall_id == w)
            && self.session_id.map_or(true, |s| node.session_id == s)
            && self.author_id.map_or(true, |a| node.author_id == a)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WallFilter {
    pub creator_id: Option<AuthorId>,
}

impl WallFilter {
    pub fn matches(&self, wall: &Wall) -> bool {
        self.creator_id.map_or(true, |c| wall.creator_id == c)
    }
}

/// A session as listed on an author's profile, with its node count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub wall_id: WallId,
    pub node_count: usize,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub finalized_at: Option<DateTime<Utc>>,
}

/// Per-author activity on one wall.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WallStats {
    pub total_sessions: usize,
    pub active_sessions: usize,
    pub total_elements: usize,
}

/// A wall as listed on its creator's profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WallSummary {
    pub wall_id: WallId,
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
    pub last_opened_at: Option<DateTime<Utc>>,
    pub last_activity: DateTime<Utc>,
    pub stats: WallStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub has_more: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionPage {
    pub sessions: Vec<SessionSummary>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WallPage {
    pub walls: Vec<WallSummary>,
    pub pagination: Pagination,
}

/// Orders walls newest first.
pub(crate) fn newest_walls_first(walls: &mut [Wall]) {
    walls.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

/// Orders sessions newest first.
pub(crate) fn newest_first(sessions: &mut [Session]) {
    sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

/// Orders nodes oldest first.
pub(crate) fn oldest_first(nodes: &mut [CanvasNode]) {
    nodes.sort_by(|a, b| a.created_at.cmp(&b.created_at));
}
