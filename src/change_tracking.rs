//! Scene change detection.
//!
//! The drawing surface reports its whole element list on every edit. This
//! module turns those full snapshots into the per-element calls the segmenter
//! expects: new elements are attached and persisted, changed ones update their
//! node, untouched ones cost nothing.

pub mod debounce;
pub mod snapshot;
pub mod tracker;

pub use debounce::Debouncer;
pub use snapshot::ElementFingerprint;
pub use tracker::{ReconcileReport, SceneTracker};
