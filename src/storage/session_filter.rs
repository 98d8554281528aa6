//! Helpers for building `SessionFilter`, `NodeFilter` and `WallFilter` values.
//!
//! This module re-exports the filters and provides convenience builders
//! for the queries the HTTP layer runs.

use crate::canvas::{AuthorId, SessionId, WallId};
pub use crate::storage::types::{NodeFilter, SessionFilter, WallFilter};

/// Build a `SessionFilter` that matches every session drawn on a wall.
pub fn by_wall(wall_id: WallId) -> SessionFilter {
    SessionFilter {
        wall_id: Some(wall_id),
        ..Default::default()
    }
}

/// Build a `SessionFilter` that matches every session of one author.
pub fn by_author(author_id: AuthorId) -> SessionFilter {
    SessionFilter {
        author_id: Some(author_id),
        ..Default::default()
    }
}

/// Build a `NodeFilter` for a wall, optionally narrowed to one session.
pub fn nodes_of(wall_id: WallId, session_id: Option<SessionId>) -> NodeFilter {
    NodeFilter {
        wall_id: Some(wall_id),
        session_id,
        ..Default::default()
    }
}

/// Build a `SessionFilter` for one author's sessions on one wall.
pub fn author_on_wall(wall_id: WallId, author_id: AuthorId) -> SessionFilter {
    SessionFilter {
        wall_id: Some(wall_id),
        author_id: Some(author_id),
        ..Default::default()
    }
}

/// Build a `NodeFilter` for one author's nodes on one wall.
pub fn author_nodes_on_wall(wall_id: WallId, author_id: AuthorId) -> NodeFilter {
    NodeFilter {
        wall_id: Some(wall_id),
        author_id: Some(author_id),
        ..Default::default()
    }
}

/// Build a `WallFilter` for the walls one author created.
pub fn walls_of(creator_id: AuthorId) -> WallFilter {
    WallFilter {
        creator_id: Some(creator_id),
    }
}
