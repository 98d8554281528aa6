use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::element::CanvasElement;
use super::{AuthorId, NodeId, SessionId, WallId};

/// Kind of persisted node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Text,
    File,
    Link,
    Group,
    Draw,
}

impl NodeType {
    /// Maps a drawing-surface element type onto a node type. Shapes and
    /// unknown types become `Draw`.
    pub fn from_element_type(element_type: &str) -> Self {
        match element_type {
            "rectangle" | "ellipse" | "diamond" | "arrow" | "line" | "freedraw" => NodeType::Draw,
            "text" => NodeType::Text,
            "image" => NodeType::File,
            "frame" => NodeType::Group,
            _ => NodeType::Draw,
        }
    }
}

fn hex_color() -> &'static Regex {
    static HEX_COLOR: OnceLock<Regex> = OnceLock::new();
    HEX_COLOR.get_or_init(|| Regex::new(r"^#[0-9A-Fa-f]{6}$").expect("static regex"))
}

/// True for `#RRGGBB` colors, the only form storage accepts.
pub fn is_valid_color(color: &str) -> bool {
    hex_color().is_match(color)
}

fn non_empty(value: &Option<String>) -> Option<&String> {
    value.as_ref().filter(|s| !s.is_empty())
}

/// Node color: stroke first, then background, dropped unless it is `#RRGGBB`.
fn element_color(element: &CanvasElement) -> Option<String> {
    non_empty(&element.stroke_color)
        .or_else(|| non_empty(&element.background_color))
        .filter(|c| is_valid_color(c))
        .cloned()
}

fn element_content(element: &CanvasElement) -> Value {
    let mut content = Map::new();
    content.insert(
        "strokeColor".into(),
        element.stroke_color.clone().map_or(Value::Null, Value::String),
    );
    content.insert(
        "backgroundColor".into(),
        element.background_color.clone().map_or(Value::Null, Value::String),
    );
    content.insert("elementType".into(), Value::String(element.element_type.clone()));
    content.insert("excalidrawId".into(), Value::String(element.id.clone()));
    if let Ok(Value::Object(fields)) = serde_json::to_value(element) {
        content.extend(fields);
    }
    Value::Object(content)
}

/// Payload for creating a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNode {
    pub session_id: SessionId,
    pub wall_id: WallId,
    pub author_id: AuthorId,
    pub node_type: NodeType,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub content: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl NewNode {
    pub fn from_element(
        element: &CanvasElement,
        session_id: SessionId,
        wall_id: WallId,
        author_id: AuthorId,
    ) -> Self {
        Self {
            session_id,
            wall_id,
            author_id,
            node_type: NodeType::from_element_type(&element.element_type),
            x: element.x,
            y: element.y,
            width: element.width_or_zero(),
            height: element.height_or_zero(),
            content: element_content(element),
            color: element_color(element),
        }
    }
}

/// Partial update of a node. `None` fields are left as stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeUpdate {
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub content: Option<Value>,
    #[serde(default)]
    pub color: Option<String>,
}

impl NodeUpdate {
    pub fn from_element(element: &CanvasElement) -> Self {
        Self {
            x: Some(element.x),
            y: Some(element.y),
            width: Some(element.width_or_zero()),
            height: Some(element.height_or_zero()),
            content: Some(element_content(element)),
            color: element_color(element),
        }
    }
}

/// A node as held by storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanvasNode {
    pub id: NodeId,
    pub session_id: SessionId,
    pub wall_id: WallId,
    pub author_id: AuthorId,
    pub node_type: NodeType,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub content: Value,
    pub color: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CanvasNode {
    pub fn from_new(id: NodeId, node: NewNode, now: DateTime<Utc>) -> Self {
        Self {
            id,
            session_id: node.session_id,
            wall_id: node.wall_id,
            author_id: node.author_id,
            node_type: node.node_type,
            x: node.x,
            y: node.y,
            width: node.width,
            height: node.height,
            content: node.content,
            color: node.color,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, update: &NodeUpdate, now: DateTime<Utc>) {
        if let Some(x) = update.x {
            self.x = x;
        }
        if let Some(y) = update.y {
            self.y = y;
        }
        if let Some(width) = update.width {
            self.width = width;
        }
        if let Some(height) = update.height {
            self.height = height;
        }
        if let Some(ref content) = update.content {
            self.content = content.clone();
        }
        if let Some(ref color) = update.color {
            self.color = Some(color.clone());
        }
        self.updated_at = now;
    }
}
