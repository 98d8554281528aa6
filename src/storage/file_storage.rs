use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, error, info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::canvas::{
    AuthorId, CanvasNode, NewNode, NewWall, NodeId, NodeUpdate, SceneSnapshot, SessionId, Wall,
    WallId, WallView,
};
use crate::error_handling::types::StorageError;
use crate::session::Session;
use crate::storage::storage_trait::Storage;
use crate::storage::types::{
    newest_first, newest_walls_first, oldest_first, NodeFilter, SessionFilter, WallFilter,
};

/// Environment variable overriding the data directory used by `new_default`.
pub const DATA_DIR_ENV: &str = "WALLSESSION_DATA_DIR";

const SESSIONS_DIR: &str = "sessions";
const NODES_DIR: &str = "nodes";
const WALLS_DIR: &str = "walls";
const VIEWS_DIR: &str = "views";
const SCENES_DIR: &str = "scenes";

#[derive(Default)]
struct FileIndex {
    sessions: HashMap<SessionId, Session>,
    nodes: HashMap<NodeId, CanvasNode>,
    walls: HashMap<WallId, Wall>,
    views: HashMap<Uuid, WallView>,
    scenes: HashMap<WallId, SceneSnapshot>,
}

/// Filesystem-backed storage.
///
/// Every record is one JSON document under `<base>/<kind>/<id>.json`, where
/// kind is `sessions`, `nodes`, `walls` or `views`. Scenes are keyed by wall:
/// `<base>/scenes/<wall_id>.json`. All documents are loaded into an in-memory
/// index on open; reads are served from the index and writes go through to
/// disk before the index is updated.
pub struct FileStorage {
    base_path: PathBuf,
    index: Mutex<FileIndex>,
}

impl FileStorage {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Result<Self, StorageError> {
        let base_path = base_path.as_ref().to_path_buf();
        for kind in [SESSIONS_DIR, NODES_DIR, WALLS_DIR, VIEWS_DIR, SCENES_DIR] {
            let dir = base_path.join(kind);
            fs::create_dir_all(&dir).map_err(|e| {
                error!("Failed to create {} dir {}: {}", kind, dir.display(), e);
                StorageError::WriteFailed
            })?;
        }

        let index = FileIndex {
            sessions: load_documents::<Session>(&base_path.join(SESSIONS_DIR))?
                .into_iter()
                .map(|s| (s.id, s))
                .collect(),
            nodes: load_documents::<CanvasNode>(&base_path.join(NODES_DIR))?
                .into_iter()
                .map(|n| (n.id, n))
                .collect(),
            walls: load_documents::<Wall>(&base_path.join(WALLS_DIR))?
                .into_iter()
                .map(|w| (w.id, w))
                .collect(),
            views: load_documents::<WallView>(&base_path.join(VIEWS_DIR))?
                .into_iter()
                .map(|v| (v.id, v))
                .collect(),
            scenes: load_documents::<SceneSnapshot>(&base_path.join(SCENES_DIR))?
                .into_iter()
                .map(|s| (s.wall_id, s))
                .collect(),
        };
        info!(
            "FileStorage initialized at {} ({} wall(s), {} session(s), {} node(s))",
            base_path.display(),
            index.walls.len(),
            index.sessions.len(),
            index.nodes.len()
        );

        Ok(Self {
            base_path,
            index: Mutex::new(index),
        })
    }

    /// Construct FileStorage using env var WALLSESSION_DATA_DIR if set, otherwise current directory.
    pub fn new_default() -> Result<Self, StorageError> {
        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            info!("Using FileStorage from {}: {}", DATA_DIR_ENV, dir);
            return Self::new(PathBuf::from(dir));
        }
        let cwd = std::env::current_dir().map_err(|e| {
            error!("Failed to get current dir: {}", e);
            StorageError::ReadFailed
        })?;
        info!("Using FileStorage at current directory: {}", cwd.display());
        Self::new(cwd)
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn document_path(&self, kind: &str, id: Uuid) -> PathBuf {
        self.base_path.join(kind).join(format!("{}.json", id))
    }

    fn session_file_path(&self, id: SessionId) -> PathBuf {
        self.document_path(SESSIONS_DIR, id)
    }

    fn node_file_path(&self, id: NodeId) -> PathBuf {
        self.document_path(NODES_DIR, id)
    }

    fn wall_file_path(&self, id: WallId) -> PathBuf {
        self.document_path(WALLS_DIR, id)
    }

    fn lock(&self) -> Result<MutexGuard<'_, FileIndex>, StorageError> {
        self.index.lock().map_err(|e| {
            error!("FileStorage index lock poisoned: {}", e);
            StorageError::ConnectionFailed
        })
    }
}

fn write_document<T: Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|e| {
        error!("Failed to serialize {}: {}", path.display(), e);
        StorageError::WriteFailed
    })?;
    fs::write(path, bytes).map_err(|e| {
        error!("Failed to write {}: {}", path.display(), e);
        StorageError::WriteFailed
    })?;
    debug!("Wrote {}", path.display());
    Ok(())
}

fn remove_document(path: &Path) -> Result<(), StorageError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => {
            error!("Failed to remove {}: {}", path.display(), e);
            Err(StorageError::WriteFailed)
        }
    }
}

/// Reads every `*.json` document in `dir`. Unparseable files are skipped with a warning.
fn load_documents<T: DeserializeOwned>(dir: &Path) -> Result<Vec<T>, StorageError> {
    let entries = fs::read_dir(dir).map_err(|e| {
        error!("Failed to read dir {}: {}", dir.display(), e);
        StorageError::ReadFailed
    })?;

    let mut documents = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| {
                error!("Dir entry error: {}", e);
                StorageError::ReadFailed
            })?
            .path();
        if path.extension().and_then(|s| s.to_str()) != Some("json") {
            continue;
        }
        let parsed = fs::read(&path)
            .map_err(|e| e.to_string())
            .and_then(|bytes| serde_json::from_slice(&bytes).map_err(|e| e.to_string()));
        match parsed {
            Ok(document) => documents.push(document),
            Err(e) => warn!("Skipping unreadable document {}: {}", path.display(), e),
        }
    }
    Ok(documents)
}

#[async_trait]
impl Storage for FileStorage {
    async fn create_session(
        &self,
        wall_id: WallId,
        author_id: AuthorId,
    ) -> Result<Session, StorageError> {
        let session = Session::new(Uuid::new_v4(), wall_id, author_id, Utc::now());
        let mut index = self.lock()?;
        write_document(&self.session_file_path(session.id), &session)?;
        index.sessions.insert(session.id, session.clone());
        info!("[{}] Saved session to {}", session.id, self.base_path.display());
        Ok(session)
    }

    async fn finalize_session(&self, session_id: SessionId) -> Result<Session, StorageError> {
        let mut index = self.lock()?;
        let mut session = index
            .sessions
            .get(&session_id)
            .cloned()
            .ok_or(StorageError::NotFound)?;
        if session.finalize(Utc::now()) {
            write_document(&self.session_file_path(session_id), &session)?;
            index.sessions.insert(session_id, session.clone());
            info!("[{}] Session finalized", session_id);
        }
        Ok(session)
    }

    async fn get_session(&self, session_id: SessionId) -> Result<Option<Session>, StorageError> {
        Ok(self.lock()?.sessions.get(&session_id).cloned())
    }

    async fn get_sessions(&self, filter: SessionFilter) -> Result<Vec<Session>, StorageError> {
        let mut sessions: Vec<Session> = self
            .lock()?
            .sessions
            .values()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        newest_first(&mut sessions);
        debug!("Loaded {} session(s) after filter", sessions.len());
        Ok(sessions)
    }

    async fn delete_session(&self, session_id: SessionId) -> Result<bool, StorageError> {
        let mut index = self.lock()?;
        if !index.sessions.contains_key(&session_id) {
            return Ok(false);
        }
        let node_ids: Vec<NodeId> = index
            .nodes
            .values()
            .filter(|n| n.session_id == session_id)
            .map(|n| n.id)
            .collect();
        for node_id in &node_ids {
            remove_document(&self.node_file_path(*node_id))?;
            index.nodes.remove(node_id);
        }
        remove_document(&self.session_file_path(session_id))?;
        index.sessions.remove(&session_id);
        info!(
            "[{}] Removed session and {} node(s)",
            session_id,
            node_ids.len()
        );
        Ok(true)
    }

    async fn create_node(&self, node: NewNode) -> Result<CanvasNode, StorageError> {
        let mut index = self.lock()?;
        if !index.sessions.contains_key(&node.session_id) {
            return Err(StorageError::NotFound);
        }
        let node = CanvasNode::from_new(Uuid::new_v4(), node, Utc::now());
        write_document(&self.node_file_path(node.id), &node)?;
        index.nodes.insert(node.id, node.clone());
        debug!("[{}] Saved node {}", node.session_id, node.id);
        Ok(node)
    }

    async fn update_node(
        &self,
        node_id: NodeId,
        update: NodeUpdate,
    ) -> Result<CanvasNode, StorageError> {
        let mut index = self.lock()?;
        let mut node = index
            .nodes
            .get(&node_id)
            .cloned()
            .ok_or(StorageError::NotFound)?;
        node.apply(&update, Utc::now());
        write_document(&self.node_file_path(node_id), &node)?;
        index.nodes.insert(node_id, node.clone());
        Ok(node)
    }

    async fn get_node(&self, node_id: NodeId) -> Result<Option<CanvasNode>, StorageError> {
        Ok(self.lock()?.nodes.get(&node_id).cloned())
    }

    async fn get_nodes(&self, filter: NodeFilter) -> Result<Vec<CanvasNode>, StorageError> {
        let mut nodes: Vec<CanvasNode> = self
            .lock()?
            .nodes
            .values()
            .filter(|n| filter.matches(n))
            .cloned()
            .collect();
        oldest_first(&mut nodes);
        Ok(nodes)
    }

    async fn delete_node(&self, node_id: NodeId) -> Result<bool, StorageError> {
        let mut index = self.lock()?;
        if index.nodes.remove(&node_id).is_none() {
            return Ok(false);
        }
        remove_document(&self.node_file_path(node_id))?;
        Ok(true)
    }

    async fn create_wall(&self, wall: NewWall) -> Result<Wall, StorageError> {
        let mut index = self.lock()?;
        if index.walls.values().any(|w| w.slug == wall.slug) {
            warn!("Wall slug {} is already taken", wall.slug);
            return Err(StorageError::AlreadyExists);
        }
        let wall = Wall::from_new(Uuid::new_v4(), wall, Utc::now());
        write_document(&self.wall_file_path(wall.id), &wall)?;
        index.walls.insert(wall.id, wall.clone());
        info!("[{}] Saved wall {} to {}", wall.id, wall.slug, self.base_path.display());
        Ok(wall)
    }

    async fn get_wall(&self, wall_id: WallId) -> Result<Option<Wall>, StorageError> {
        Ok(self.lock()?.walls.get(&wall_id).cloned())
    }

    async fn get_wall_by_slug(&self, slug: &str) -> Result<Option<Wall>, StorageError> {
        Ok(self
            .lock()?
            .walls
            .values()
            .find(|w| w.slug == slug)
            .cloned())
    }

    async fn get_walls(&self, filter: WallFilter) -> Result<Vec<Wall>, StorageError> {
        let mut walls: Vec<Wall> = self
            .lock()?
            .walls
            .values()
            .filter(|w| filter.matches(w))
            .cloned()
            .collect();
        newest_walls_first(&mut walls);
        debug!("Loaded {} wall(s) after filter", walls.len());
        Ok(walls)
    }

    async fn mark_wall_opened(&self, wall_id: WallId) -> Result<Wall, StorageError> {
        let mut index = self.lock()?;
        let mut wall = index
            .walls
            .get(&wall_id)
            .cloned()
            .ok_or(StorageError::NotFound)?;
        wall.mark_opened(Utc::now());
        write_document(&self.wall_file_path(wall_id), &wall)?;
        index.walls.insert(wall_id, wall.clone());
        Ok(wall)
    }

    async fn record_wall_view(
        &self,
        wall_id: WallId,
        viewer_id: AuthorId,
    ) -> Result<WallView, StorageError> {
        let mut index = self.lock()?;
        if !index.walls.contains_key(&wall_id) {
            return Err(StorageError::NotFound);
        }
        let view = WallView {
            id: Uuid::new_v4(),
            wall_id,
            viewer_id,
            viewed_at: Utc::now(),
        };
        write_document(&self.document_path(VIEWS_DIR, view.id), &view)?;
        index.views.insert(view.id, view.clone());
        Ok(view)
    }

    async fn get_wall_views(&self, wall_id: WallId) -> Result<Vec<WallView>, StorageError> {
        let mut views: Vec<WallView> = self
            .lock()?
            .views
            .values()
            .filter(|v| v.wall_id == wall_id)
            .cloned()
            .collect();
        views.sort_by(|a, b| a.viewed_at.cmp(&b.viewed_at));
        Ok(views)
    }

    async fn delete_wall(&self, wall_id: WallId) -> Result<bool, StorageError> {
        let mut index = self.lock()?;
        if !index.walls.contains_key(&wall_id) {
            return Ok(false);
        }

        let node_ids: Vec<NodeId> = index
            .nodes
            .values()
            .filter(|n| n.wall_id == wall_id)
            .map(|n| n.id)
            .collect();
        for node_id in &node_ids {
            remove_document(&self.node_file_path(*node_id))?;
            index.nodes.remove(node_id);
        }
        let session_ids: Vec<SessionId> = index
            .sessions
            .values()
            .filter(|s| s.wall_id == wall_id)
            .map(|s| s.id)
            .collect();
        for session_id in &session_ids {
            remove_document(&self.session_file_path(*session_id))?;
            index.sessions.remove(session_id);
        }
        let view_ids: Vec<Uuid> = index
            .views
            .values()
            .filter(|v| v.wall_id == wall_id)
            .map(|v| v.id)
            .collect();
        for view_id in &view_ids {
            remove_document(&self.document_path(VIEWS_DIR, *view_id))?;
            index.views.remove(view_id);
        }
        remove_document(&self.document_path(SCENES_DIR, wall_id))?;
        index.scenes.remove(&wall_id);
        remove_document(&self.wall_file_path(wall_id))?;
        index.walls.remove(&wall_id);

        info!(
            "[{}] Removed wall with {} session(s) and {} node(s)",
            wall_id,
            session_ids.len(),
            node_ids.len()
        );
        Ok(true)
    }

    async fn save_scene(&self, scene: SceneSnapshot) -> Result<SceneSnapshot, StorageError> {
        let mut index = self.lock()?;
        if !index.walls.contains_key(&scene.wall_id) {
            return Err(StorageError::NotFound);
        }
        write_document(&self.document_path(SCENES_DIR, scene.wall_id), &scene)?;
        index.scenes.insert(scene.wall_id, scene.clone());
        debug!(
            "[{}] Saved scene with {} element(s)",
            scene.wall_id,
            scene.elements.len()
        );
        Ok(scene)
    }

    async fn get_scene(&self, wall_id: WallId) -> Result<Option<SceneSnapshot>, StorageError> {
        Ok(self.lock()?.scenes.get(&wall_id).cloned())
    }
}
