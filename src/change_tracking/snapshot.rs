use crate::canvas::CanvasElement;

/// The parts of an element whose change is worth a node update.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementFingerprint {
    pub x: f64,
    pub y: f64,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub stroke_color: Option<String>,
    pub background_color: Option<String>,
}

impl ElementFingerprint {
    pub fn of(element: &CanvasElement) -> Self {
        Self {
            x: element.x,
            y: element.y,
            width: element.width,
            height: element.height,
            stroke_color: element.stroke_color.clone(),
            background_color: element.background_color.clone(),
        }
    }
}
