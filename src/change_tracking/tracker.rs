use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use log::{debug, warn};
use serde::Serialize;

use crate::canvas::{CanvasElement, NewNode, NodeId, NodeUpdate};
use crate::error_handling::types::SessionError;
use crate::session_management::segmenter::SessionSegmenter;
use crate::storage::Storage;

use super::snapshot::ElementFingerprint;

/// What one reconcile pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
}

/// Reduces full scene snapshots to segmenter calls and node writes.
///
/// An element is remembered only once its node write succeeded, so a failed
/// create is retried as new on the next snapshot that still holds it.
/// Elements missing from a snapshot are forgotten.
pub struct SceneTracker {
    segmenter: SessionSegmenter,
    storage: Arc<dyn Storage>,
    seen: HashMap<String, ElementFingerprint>,
    node_ids: HashMap<String, NodeId>,
}

impl SceneTracker {
    pub fn new(segmenter: SessionSegmenter, storage: Arc<dyn Storage>) -> Self {
        Self {
            segmenter,
            storage,
            seen: HashMap::new(),
            node_ids: HashMap::new(),
        }
    }

    pub fn segmenter(&self) -> &SessionSegmenter {
        &self.segmenter
    }

    pub fn segmenter_mut(&mut self) -> &mut SessionSegmenter {
        &mut self.segmenter
    }

    pub fn node_id(&self, element_id: &str) -> Option<NodeId> {
        self.node_ids.get(element_id).copied()
    }

    /// Brings storage in line with `elements`.
    ///
    /// Stops at the first storage error and returns it; elements handled
    /// before that stay recorded.
    pub async fn reconcile(
        &mut self,
        elements: &[CanvasElement],
    ) -> Result<ReconcileReport, SessionError> {
        self.forget_missing(elements);
        let mut report = ReconcileReport::default();

        for element in elements {
            let fingerprint = ElementFingerprint::of(element);
            match self.seen.get(&element.id) {
                None => {
                    if self.create(element, fingerprint).await? {
                        report.created += 1;
                    }
                }
                Some(previous) if *previous == fingerprint => report.unchanged += 1,
                Some(_) => {
                    if self.update(element, fingerprint).await? {
                        report.updated += 1;
                    } else {
                        report.skipped += 1;
                    }
                }
            }
        }

        debug!(
            "Reconciled {} element(s): {} created, {} updated, {} unchanged, {} skipped",
            elements.len(),
            report.created,
            report.updated,
            report.unchanged,
            report.skipped
        );
        Ok(report)
    }

    /// Drops what is known about elements no longer in the scene. Their nodes
    /// stay in storage.
    fn forget_missing(&mut self, elements: &[CanvasElement]) {
        let present: HashSet<&str> = elements.iter().map(|e| e.id.as_str()).collect();
        let before = self.seen.len();
        self.seen.retain(|id, _| present.contains(id.as_str()));
        self.node_ids.retain(|id, _| present.contains(id.as_str()));
        let forgotten = before - self.seen.len();
        if forgotten > 0 {
            debug!("Forgot {} element(s) no longer in the scene", forgotten);
        }
    }

    async fn create(
        &mut self,
        element: &CanvasElement,
        fingerprint: ElementFingerprint,
    ) -> Result<bool, SessionError> {
        let outcome = self.segmenter.process_element(element).await?;
        if !outcome.should_create_node {
            self.seen.insert(element.id.clone(), fingerprint);
            return Ok(false);
        }

        let node = NewNode::from_element(
            element,
            outcome.session.id,
            self.segmenter.wall_id(),
            self.segmenter.author_id(),
        );
        let created = self
            .storage
            .create_node(node)
            .await
            .map_err(SessionError::NodeCreate)?;
        debug!(
            "[{}] Node {} created for element {}",
            outcome.session.id, created.id, element.id
        );
        self.seen.insert(element.id.clone(), fingerprint);
        self.node_ids.insert(element.id.clone(), created.id);
        Ok(true)
    }

    async fn update(
        &mut self,
        element: &CanvasElement,
        fingerprint: ElementFingerprint,
    ) -> Result<bool, SessionError> {
        let outcome = self.segmenter.process_element(element).await?;
        let node_id = match self.node_ids.get(&element.id) {
            Some(id) => *id,
            None => {
                warn!(
                    "[{}] Element {} changed but has no node, skipping",
                    outcome.session.id, element.id
                );
                return Ok(false);
            }
        };

        self.storage
            .update_node(node_id, NodeUpdate::from_element(element))
            .await
            .map_err(SessionError::NodeUpdate)?;
        debug!(
            "[{}] Node {} updated for element {}",
            outcome.session.id, node_id, element.id
        );
        self.seen.insert(element.id.clone(), fingerprint);
        Ok(true)
    }
}
