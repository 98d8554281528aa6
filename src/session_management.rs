//! Session management core module.
//!
//! This module groups drawing activity into sessions. The pieces stack up as:
//! - `session`: the session record and its spatial summary.
//! - `watchdog`: the re-armable inactivity deadline owned by a segmenter.
//! - `segmenter`: the per-(wall, author) state machine deciding when a session
//!   starts, continues or ends.
//! - `worker`: a tokio task hosting one segmenter (through a scene tracker) and
//!   driving its timers.
//! - `registry`: lazily spawned workers keyed by (wall, author).

use serde::{Deserialize, Serialize};

/// Submodule for the per-(wall, author) worker registry.
pub mod registry;
/// Submodule for the segmentation state machine.
pub mod segmenter;
/// Submodule for session data structures.
pub mod session;
/// Submodule for the inactivity watchdog.
pub mod watchdog;
/// Submodule for the worker task hosting a segmenter.
pub mod worker;

/// Lifecycle state of a session.
///
/// Variants:
/// - `Active`: the session still accepts elements.
/// - `Finalized`: closed for good, either explicitly or by inactivity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Finalized,
}
