use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::canvas::{AuthorId, CanvasElement, Point, SessionId, WallId};
use crate::SessionStatus;

/// Axis-aligned bounding box of everything drawn in a session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionBounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl SessionBounds {
    pub fn from_element(element: &CanvasElement) -> Self {
        Self {
            min_x: element.x,
            min_y: element.y,
            max_x: element.right(),
            max_y: element.bottom(),
        }
    }

    /// Grows the box so it covers `element`. Never shrinks.
    pub fn expand(&mut self, element: &CanvasElement) {
        self.min_x = self.min_x.min(element.x);
        self.min_y = self.min_y.min(element.y);
        self.max_x = self.max_x.max(element.right());
        self.max_y = self.max_y.max(element.bottom());
    }

    pub fn midpoint(&self) -> Point {
        Point {
            x: (self.min_x + self.max_x) / 2.0,
            y: (self.min_y + self.max_y) / 2.0,
        }
    }

    pub fn area(&self) -> f64 {
        (self.max_x - self.min_x) * (self.max_y - self.min_y)
    }
}

/// One contiguous burst of drawing activity by one author on one wall.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub wall_id: WallId,
    pub author_id: AuthorId,
    #[serde(default)]
    pub bounds: Option<SessionBounds>,
    #[serde(default)]
    pub centroid: Option<Point>,
    #[serde(default)]
    pub element_count: u64,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub finalized_at: Option<DateTime<Utc>>,
}

impl Session {
    /// A fresh active session with no spatial summary yet.
    pub fn new(id: SessionId, wall_id: WallId, author_id: AuthorId, now: DateTime<Utc>) -> Self {
        Self {
            id,
            wall_id,
            author_id,
            bounds: None,
            centroid: None,
            element_count: 0,
            status: SessionStatus::Active,
            created_at: now,
            updated_at: now,
            finalized_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// Moves the session to `Finalized`. Returns false if it already was.
    pub fn finalize(&mut self, now: DateTime<Utc>) -> bool {
        if !self.is_active() {
            return false;
        }
        self.status = SessionStatus::Finalized;
        self.finalized_at = Some(now);
        self.updated_at = now;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn bounds_expand_and_keep_midpoint() {
        let a = CanvasElement::new("a", "rectangle", 0.0, 0.0, 100.0, 100.0);
        let b = CanvasElement::new("b", "rectangle", 50.0, 50.0, 100.0, 100.0);

        let mut bounds = SessionBounds::from_element(&a);
        assert_eq!(bounds.midpoint(), Point::new(50.0, 50.0));

        bounds.expand(&b);
        assert_eq!(
            bounds,
            SessionBounds {
                min_x: 0.0,
                min_y: 0.0,
                max_x: 150.0,
                max_y: 150.0
            }
        );
        assert_eq!(bounds.midpoint(), Point::new(75.0, 75.0));
    }

    #[test]
    fn element_inside_bounds_changes_nothing() {
        let outer = CanvasElement::new("o", "rectangle", 0.0, 0.0, 100.0, 100.0);
        let inner = CanvasElement::new("i", "rectangle", 10.0, 10.0, 5.0, 5.0);

        let mut bounds = SessionBounds::from_element(&outer);
        let before = bounds;
        bounds.expand(&inner);
        assert_eq!(bounds, before);
    }

    #[test]
    fn finalize_happens_once() {
        let mut session = Session::new(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Utc::now());
        assert!(session.finalize(Utc::now()));
        assert!(!session.finalize(Utc::now()));
        assert_eq!(session.status, SessionStatus::Finalized);
        assert!(session.finalized_at.is_some());
    }
}
