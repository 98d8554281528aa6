//! Replays a short drawing against in-memory storage and prints how the
//! strokes were grouped.
//!
//! Run with `cargo run --example segmentation_demo`.

use std::sync::Arc;
use std::time::Duration;

use log::info;
use uuid::Uuid;
use wallsession::canvas::CanvasElement;
use wallsession::configuration::SegmenterConfig;
use wallsession::session_management::segmenter::SessionSegmenter;
use wallsession::storage::session_filter::by_wall;
use wallsession::storage::{MemoryStorage, Storage};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .init();

    let storage = Arc::new(MemoryStorage::new());
    let wall_id = Uuid::new_v4();
    let mut segmenter = SessionSegmenter::new(
        wall_id,
        Uuid::new_v4(),
        SegmenterConfig::default(),
        storage.clone(),
    );

    let strokes = [
        (Duration::ZERO, CanvasElement::new("A", "rectangle", 0.0, 0.0, 100.0, 100.0)),
        (Duration::from_secs(1), CanvasElement::new("B", "rectangle", 50.0, 50.0, 100.0, 100.0)),
        (Duration::from_secs(2), CanvasElement::new("C", "rectangle", 1000.0, 1000.0, 10.0, 10.0)),
    ];

    for (pause, element) in strokes {
        tokio::time::sleep(pause).await;
        let outcome = segmenter.process_element(&element).await?;
        info!(
            "Element {} -> session {} bounds {:?} centroid {:?}",
            element.id, outcome.session.id, outcome.session.bounds, outcome.session.centroid
        );
    }

    for session in storage.get_sessions(by_wall(wall_id)).await? {
        println!(
            "{}  {:?}  created {}",
            session.id,
            session.status,
            session.created_at.format("%H:%M:%S%.3f")
        );
    }
    Ok(())
}
