use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A point in canvas coordinates (pixels).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance between two points.
    pub fn distance_to(&self, other: &Point) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// A drawing element as reported by the canvas surface.
///
/// Only `id`, position and size take part in segmentation. Colors matter when
/// the element is turned into a node, and anything else the surface sends is
/// carried along untouched in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasElement {
    pub id: String,
    #[serde(rename = "type")]
    pub element_type: String,
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CanvasElement {
    /// Builds a bare element with no colors and no extra fields.
    pub fn new(
        id: impl Into<String>,
        element_type: impl Into<String>,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    ) -> Self {
        Self {
            id: id.into(),
            element_type: element_type.into(),
            x,
            y,
            width: Some(width),
            height: Some(height),
            stroke_color: None,
            background_color: None,
            extra: Map::new(),
        }
    }

    pub fn width_or_zero(&self) -> f64 {
        self.width.unwrap_or(0.0)
    }

    pub fn height_or_zero(&self) -> f64 {
        self.height.unwrap_or(0.0)
    }

    pub fn right(&self) -> f64 {
        self.x + self.width_or_zero()
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height_or_zero()
    }

    /// Center of the element's rectangle. Missing dimensions count as zero.
    pub fn center(&self) -> Point {
        Point {
            x: self.x + self.width_or_zero() / 2.0,
            y: self.y + self.height_or_zero() / 2.0,
        }
    }
}
