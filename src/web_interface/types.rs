use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::canvas::{
    CanvasElement, NodeId, NodeType, NodeUpdate, SceneSnapshot, SessionId, WallId, WallLocation,
};
use crate::session::Session;

/// API error payload
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub message: String,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct FinalizeResponse {
    pub success: bool,
    pub session: Session,
}

/// Success flag plus a human-readable note.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateWallRequest {
    pub name: String,
    #[serde(default)]
    pub location: Option<WallLocation>,
}

/// Full drawing-surface state posted by the client for safekeeping.
#[derive(Debug, Clone, Deserialize)]
pub struct SaveSceneRequest {
    pub wall_id: WallId,
    pub elements: Vec<Value>,
    #[serde(rename = "appState", default)]
    pub app_state: Map<String, Value>,
}

#[derive(Debug, Serialize)]
pub struct SceneSaved {
    pub success: bool,
    pub data: SceneSnapshot,
}

/// A wall's saved scene. Empty when nothing was saved yet.
#[derive(Debug, Default, Serialize)]
pub struct SceneResponse {
    pub elements: Vec<Value>,
    #[serde(rename = "appState")]
    pub app_state: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSessionRequest {
    pub wall_id: WallId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WallQuery {
    pub wall_id: WallId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateNodeRequest {
    pub session_id: SessionId,
    pub wall_id: WallId,
    pub node_type: NodeType,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub content: Value,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodesQuery {
    pub wall_id: WallId,
    #[serde(default)]
    pub session_id: Option<SessionId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateNodeRequest {
    pub node_id: NodeId,
    #[serde(flatten)]
    pub update: NodeUpdate,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeIdQuery {
    pub node_id: NodeId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SceneRequest {
    pub elements: Vec<CanvasElement>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
}

impl PageQuery {
    pub const DEFAULT_PAGE: u32 = 1;
    pub const DEFAULT_LIMIT: u32 = 20;

    pub fn page(&self) -> u32 {
        self.page.unwrap_or(Self::DEFAULT_PAGE)
    }

    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(Self::DEFAULT_LIMIT)
    }
}

#[derive(Debug, Serialize)]
pub struct SceneAccepted {
    pub accepted: usize,
}
