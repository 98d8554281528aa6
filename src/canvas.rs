//! Canvas data model.
//!
//! The drawing surface reports [`CanvasElement`]s; storage persists them as
//! [`CanvasNode`]s. This module holds both shapes and the mapping between them,
//! plus the [`Wall`]s they are drawn on.

pub mod element;
pub mod node;
pub mod wall;

pub use element::{CanvasElement, Point};
pub use node::{CanvasNode, NewNode, NodeType, NodeUpdate};
pub use wall::{NewWall, SceneSnapshot, Wall, WallLocation, WallView};

use uuid::Uuid;

pub type WallId = Uuid;
pub type AuthorId = Uuid;
pub type SessionId = Uuid;
pub type NodeId = Uuid;
