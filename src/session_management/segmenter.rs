//! Session segmentation state machine.
//!
//! A [`SessionSegmenter`] serves exactly one (wall, author) pair and holds at
//! most one active session for it. Every element it sees either extends that
//! session or closes it and opens a new one:
//!
//! ```text
//!               first element                      far away / idle element
//!  NoSession ─────────────────▶ ActiveSession ───────────────────────────────┐
//!      ▲                          │    ▲  │ close element                   │
//!      │   watchdog / finalize    │    │  └──────── extend ───────────────┘
//!      └──────────────────────────┘    └──── finalize old, create new ◀──────┘
//! ```
//!
//! Session ids always come from [`Storage`]; the segmenter never makes one up.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{debug, info, warn};
use tokio::time::Instant;

use crate::canvas::{AuthorId, CanvasElement, SessionId, WallId};
use crate::configuration::types::SegmenterConfig;
use crate::error_handling::types::SessionError;
use crate::session::{Session, SessionBounds};
use crate::storage::Storage;

use super::watchdog::InactivityWatchdog;

/// Result of feeding one element to the segmenter.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessOutcome {
    /// The session the element now belongs to, after its bounds were updated.
    pub session: Session,
    /// Whether a node should be persisted for the element. Always true for now.
    pub should_create_node: bool,
}

/// Why an element cannot join the current session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SplitReason {
    NoSession,
    /// Time since the last activity.
    Idle(Duration),
    /// Distance in px between the element center and the session centroid.
    TooFar(f64),
}

impl fmt::Display for SplitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SplitReason::NoSession => write!(f, "no active session"),
            SplitReason::Idle(idle) => write!(f, "idle for {}ms", idle.as_millis()),
            SplitReason::TooFar(distance) => {
                write!(f, "{:.1}px from the centroid", distance)
            }
        }
    }
}

pub struct SessionSegmenter {
    wall_id: WallId,
    author_id: AuthorId,
    config: SegmenterConfig,
    storage: Arc<dyn Storage>,
    current: Option<Session>,
    /// Element ids folded into the current session.
    session_elements: HashSet<String>,
    last_activity: Instant,
    watchdog: InactivityWatchdog,
}

impl SessionSegmenter {
    pub fn new(
        wall_id: WallId,
        author_id: AuthorId,
        config: SegmenterConfig,
        storage: Arc<dyn Storage>,
    ) -> Self {
        let watchdog = InactivityWatchdog::new(config.inactivity_timeout());
        Self {
            wall_id,
            author_id,
            config,
            storage,
            current: None,
            session_elements: HashSet::new(),
            last_activity: Instant::now(),
            watchdog,
        }
    }

    pub fn wall_id(&self) -> WallId {
        self.wall_id
    }

    pub fn author_id(&self) -> AuthorId {
        self.author_id
    }

    pub fn current_session(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    /// When the inactivity watchdog fires, if armed.
    pub fn watchdog_deadline(&self) -> Option<Instant> {
        self.watchdog.deadline()
    }

    /// Decides whether `element` must open a new session. Reads state only.
    pub fn should_create_new_session(&self, element: &CanvasElement) -> bool {
        self.split_reason(element).is_some()
    }

    /// The rule that keeps `element` out of the current session, if any.
    ///
    /// Rules, in order: no active session; idle for longer than the inactivity
    /// timeout; element center farther than the proximity threshold from the
    /// session centroid. A session without a centroid skips the distance rule.
    pub fn split_reason(&self, element: &CanvasElement) -> Option<SplitReason> {
        let session = match self.current {
            Some(ref session) if session.is_active() => session,
            _ => return Some(SplitReason::NoSession),
        };

        let idle = self.last_activity.elapsed();
        if idle > self.config.inactivity_timeout() {
            return Some(SplitReason::Idle(idle));
        }

        let distance = element.center().distance_to(&session.centroid?);
        if distance > self.config.proximity_threshold_px {
            return Some(SplitReason::TooFar(distance));
        }
        None
    }

    /// Returns the session `trigger` belongs to, replacing the current one when
    /// the segmentation rules say so.
    ///
    /// Without a trigger the current session is kept alive as is. Fails with
    /// [`SessionError::Precondition`] when there is neither a trigger nor a
    /// current session, and with [`SessionError::SessionCreate`] when storage
    /// refuses a new session.
    pub async fn get_current_session(
        &mut self,
        trigger: Option<&CanvasElement>,
    ) -> Result<&mut Session, SessionError> {
        let reason = match trigger {
            Some(element) => self.split_reason(element),
            None if self.current.is_none() => Some(SplitReason::NoSession),
            None => None,
        };

        if let Some(reason) = reason {
            if let Some(previous) = self.current.as_ref().map(|s| s.id) {
                info!(
                    "[{}] New session needed for element {}: {}",
                    previous,
                    trigger.map(|e| e.id.as_str()).unwrap_or("-"),
                    reason
                );
                self.finalize_session(previous).await;
            }
            if trigger.is_none() {
                return Err(SessionError::Precondition(
                    "cannot create a session without a trigger element".into(),
                ));
            }
            return self.create_session().await;
        }

        self.touch();
        match self.current {
            Some(ref mut session) => Ok(session),
            None => Err(SessionError::Precondition("no current session".into())),
        }
    }

    /// Attaches `element` to a session and folds it into the session's bounds.
    pub async fn process_element(
        &mut self,
        element: &CanvasElement,
    ) -> Result<ProcessOutcome, SessionError> {
        let session_id = self.get_current_session(Some(element)).await?.id;
        let first_sighting = self.session_elements.insert(element.id.clone());

        let session = match self.current {
            Some(ref mut session) if session.id == session_id => session,
            _ => return Err(SessionError::Precondition("session vanished".into())),
        };
        Self::update_session_bounds(session, element);
        if first_sighting {
            session.element_count += 1;
        }
        session.updated_at = Utc::now();
        debug!(
            "[{}] Element {} attached ({} element(s))",
            session.id, element.id, session.element_count
        );

        Ok(ProcessOutcome {
            session: session.clone(),
            should_create_node: true,
        })
    }

    /// Grows `session`'s bounding box to cover `element` and recomputes the
    /// centroid as the box midpoint. No I/O.
    pub fn update_session_bounds(session: &mut Session, element: &CanvasElement) {
        let bounds = session
            .bounds
            .get_or_insert_with(|| SessionBounds::from_element(element));
        bounds.expand(element);
        session.centroid = Some(bounds.midpoint());
    }

    /// Asks storage to finalize `session_id`. Best-effort: a storage failure is
    /// logged and otherwise ignored.
    ///
    /// If `session_id` is the current session it is dropped and the watchdog
    /// disarmed either way; the dropped session is returned, marked finalized.
    pub async fn finalize_session(&mut self, session_id: SessionId) -> Option<Session> {
        match self.storage.finalize_session(session_id).await {
            Ok(_) => info!("[{}] Session finalized", session_id),
            Err(e) => warn!("[{}] Failed to finalize session: {}", session_id, e),
        }

        if self.current.as_ref().map(|s| s.id) != Some(session_id) {
            return None;
        }
        self.watchdog.disarm();
        self.session_elements.clear();
        self.current.take().map(|mut session| {
            session.finalize(Utc::now());
            session
        })
    }

    /// Finalizes the current session because the watchdog expired.
    ///
    /// Does nothing when the deadline has moved or been cleared since the
    /// caller looked at it.
    pub async fn on_inactivity(&mut self) -> Option<Session> {
        match self.watchdog.deadline() {
            Some(deadline) if deadline <= Instant::now() => {}
            _ => return None,
        }
        self.watchdog.disarm();
        let session_id = self.current.as_ref()?.id;
        info!("[{}] Auto-finalizing session after inactivity", session_id);
        self.finalize_session(session_id).await
    }

    /// Drops the current session without finalizing it in storage.
    pub fn destroy(&mut self) {
        self.watchdog.disarm();
        self.session_elements.clear();
        if let Some(session) = self.current.take() {
            debug!("[{}] Segmenter torn down with session still active", session.id);
        }
    }

    async fn create_session(&mut self) -> Result<&mut Session, SessionError> {
        let session = self
            .storage
            .create_session(self.wall_id, self.author_id)
            .await
            .map_err(SessionError::SessionCreate)?;
        info!(
            "[{}] Session created on wall {} for author {}",
            session.id, self.wall_id, self.author_id
        );
        self.session_elements.clear();
        self.touch();
        Ok(self.current.insert(session))
    }

    fn touch(&mut self) {
        self.last_activity = Instant::now();
        self.watchdog.arm();
    }
}

impl Drop for SessionSegmenter {
    fn drop(&mut self) {
        self.destroy();
    }
}
