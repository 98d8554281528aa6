use std::convert::Infallible;
use std::sync::Arc;

use chrono::Utc;
use log::{error, info, warn};
use serde::Serialize;
use uuid::Uuid;
use warp::reply::Response;
use warp::{http::StatusCode, reply, Filter, Rejection, Reply};

use super::identity::{identity, Identity};
use super::types::*;
use crate::canvas::node::is_valid_color;
use crate::canvas::{CanvasNode, NewNode, NewWall, SceneSnapshot, SessionId, WallId};
use crate::error_handling::types::{SessionError, StorageError};
use crate::session::Session;
use crate::session_management::registry::SegmenterRegistry;
use crate::storage::session_filter::{by_wall, nodes_of};
use crate::storage::types::WallFilter;
use crate::storage::Storage;

/// Shared state handed to every route.
#[derive(Clone)]
pub struct ApiContext {
    pub storage: Arc<dyn Storage>,
    pub registry: Arc<SegmenterRegistry>,
}

impl ApiContext {
    pub fn new(storage: Arc<dyn Storage>, registry: Arc<SegmenterRegistry>) -> Self {
        Self { storage, registry }
    }
}

fn with_context(
    ctx: ApiContext,
) -> impl Filter<Extract = (ApiContext,), Error = Infallible> + Clone {
    warp::any().map(move || ctx.clone())
}

fn json_with_status<T: Serialize>(body: &T, status: StatusCode) -> Response {
    reply::with_status(reply::json(body), status).into_response()
}

fn api_error(message: &str, status: StatusCode) -> Response {
    json_with_status(&ApiError::new(message), status)
}

fn storage_failure(e: StorageError, what: &str) -> Response {
    match e {
        StorageError::NotFound => api_error(&format!("{} not found", what), StatusCode::NOT_FOUND),
        StorageError::AlreadyExists => {
            api_error(&format!("{} already exists", what), StatusCode::CONFLICT)
        }
        e => {
            error!("Storage failure while handling {}: {}", what, e);
            api_error(
                &format!("Failed to process {}", what),
                StatusCode::INTERNAL_SERVER_ERROR,
            )
        }
    }
}

fn session_failure(e: SessionError) -> Response {
    match e {
        SessionError::WorkerUnavailable => {
            api_error("Session worker unavailable", StatusCode::SERVICE_UNAVAILABLE)
        }
        SessionError::Precondition(ref msg) => api_error(msg, StatusCode::CONFLICT),
        SessionError::SessionCreate(e) | SessionError::NodeCreate(e) | SessionError::NodeUpdate(e) => {
            error!("Segmentation failed: {}", e);
            api_error("Failed to record drawing", StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

fn parse_id(raw: &str, what: &str) -> Result<Uuid, Response> {
    Uuid::parse_str(raw)
        .map_err(|_| api_error(&format!("Invalid {} id", what), StatusCode::BAD_REQUEST))
}

/// Loads a session only if `identity` owns it.
async fn owned_session(
    ctx: &ApiContext,
    identity: &Identity,
    session_id: SessionId,
) -> Result<Session, Response> {
    match ctx.storage.get_session(session_id).await {
        Ok(Some(session)) if session.author_id == identity.author_id => Ok(session),
        Ok(_) => Err(api_error(
            "Session not found or not authorized",
            StatusCode::NOT_FOUND,
        )),
        Err(e) => Err(storage_failure(e, "session")),
    }
}

async fn owned_node(
    ctx: &ApiContext,
    identity: &Identity,
    node_id: Uuid,
) -> Result<Option<CanvasNode>, Response> {
    match ctx.storage.get_node(node_id).await {
        Ok(Some(node)) if node.author_id == identity.author_id => Ok(Some(node)),
        Ok(_) => Ok(None),
        Err(e) => Err(storage_failure(e, "node")),
    }
}

/// Has the owning worker finalize `session` if it is still its current one,
/// so it stops extending it. Returns the session when the worker did so.
async fn release_from_worker(ctx: &ApiContext, session: &Session) -> Option<Session> {
    let handle = ctx
        .registry
        .existing(session.wall_id, session.author_id)
        .await?;
    match handle.finalize_session(session.id).await {
        Ok(released) => released,
        Err(e) => {
            warn!("[{}] Worker could not release session: {}", session.id, e);
            None
        }
    }
}

/// Replies with `body` and a `Set-Cookie` header dropping the caller's id.
fn with_cleared_identity<T: Serialize>(body: &T) -> Response {
    reply::with_header(
        json_with_status(body, StatusCode::OK),
        "set-cookie",
        Identity::clear_cookie_header(),
    )
    .into_response()
}

/// POST /api/canvas/sessions
pub async fn create_session(
    ctx: ApiContext,
    identity: Identity,
    body: CreateSessionRequest,
) -> Response {
    match ctx
        .storage
        .create_session(body.wall_id, identity.author_id)
        .await
    {
        Ok(session) => {
            info!("[{}] Session opened over HTTP", session.id);
            json_with_status(&session, StatusCode::CREATED)
        }
        Err(e) => storage_failure(e, "session"),
    }
}

/// GET /api/canvas/sessions?wall_id=
pub async fn list_sessions(ctx: ApiContext, query: WallQuery) -> Response {
    match ctx.storage.get_sessions(by_wall(query.wall_id)).await {
        Ok(list) => json_with_status(&list, StatusCode::OK),
        Err(e) => storage_failure(e, "sessions"),
    }
}

/// PUT /api/canvas/sessions/:id/finalize
pub async fn finalize_session(ctx: ApiContext, identity: Identity, id: String) -> Response {
    let session_id = match parse_id(&id, "session") {
        Ok(id) => id,
        Err(res) => return res,
    };
    let session = match owned_session(&ctx, &identity, session_id).await {
        Ok(session) => session,
        Err(res) => return res,
    };

    // the worker already wrote the finalize unless its storage call failed
    let stored = match release_from_worker(&ctx, &session).await {
        Some(_) => ctx.storage.get_session(session_id).await,
        None => Ok(None),
    };
    let finalized = match stored {
        Ok(Some(session)) if !session.is_active() => Ok(session),
        Ok(_) => ctx.storage.finalize_session(session_id).await,
        Err(e) => Err(e),
    };
    match finalized {
        Ok(session) => json_with_status(
            &FinalizeResponse {
                success: true,
                session,
            },
            StatusCode::OK,
        ),
        Err(e) => storage_failure(e, "session"),
    }
}

/// POST /api/canvas/nodes
pub async fn create_node(ctx: ApiContext, identity: Identity, body: CreateNodeRequest) -> Response {
    if let Some(ref color) = body.color {
        if !is_valid_color(color) {
            return api_error("Invalid color, expected #RRGGBB", StatusCode::BAD_REQUEST);
        }
    }
    let node = NewNode {
        session_id: body.session_id,
        wall_id: body.wall_id,
        author_id: identity.author_id,
        node_type: body.node_type,
        x: body.x,
        y: body.y,
        width: body.width.unwrap_or(0.0),
        height: body.height.unwrap_or(0.0),
        content: body.content,
        color: body.color,
    };
    match ctx.storage.create_node(node).await {
        Ok(node) => json_with_status(&node, StatusCode::CREATED),
        Err(e) => storage_failure(e, "session"),
    }
}

/// GET /api/canvas/nodes?wall_id=&session_id=
pub async fn list_nodes(ctx: ApiContext, query: NodesQuery) -> Response {
    match ctx
        .storage
        .get_nodes(nodes_of(query.wall_id, query.session_id))
        .await
    {
        Ok(nodes) => json_with_status(&nodes, StatusCode::OK),
        Err(e) => storage_failure(e, "nodes"),
    }
}

/// PUT /api/canvas/nodes
pub async fn update_node(ctx: ApiContext, identity: Identity, body: UpdateNodeRequest) -> Response {
    if let Some(ref color) = body.update.color {
        if !is_valid_color(color) {
            return api_error("Invalid color, expected #RRGGBB", StatusCode::BAD_REQUEST);
        }
    }
    match owned_node(&ctx, &identity, body.node_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return api_error("Node not found or not authorized", StatusCode::NOT_FOUND),
        Err(res) => return res,
    }
    match ctx.storage.update_node(body.node_id, body.update).await {
        Ok(node) => json_with_status(&node, StatusCode::OK),
        Err(e) => storage_failure(e, "node"),
    }
}

/// DELETE /api/canvas/nodes?node_id=
///
/// Only the node's author can delete it; `success` is false otherwise.
pub async fn delete_node(ctx: ApiContext, identity: Identity, query: NodeIdQuery) -> Response {
    let deleted = match owned_node(&ctx, &identity, query.node_id).await {
        Ok(Some(node)) => match ctx.storage.delete_node(node.id).await {
            Ok(deleted) => deleted,
            Err(e) => return storage_failure(e, "node"),
        },
        Ok(None) => false,
        Err(res) => return res,
    };
    json_with_status(&SuccessResponse { success: deleted }, StatusCode::OK)
}

/// POST /api/walls/:wall_id/scene
pub async fn post_scene(
    ctx: ApiContext,
    identity: Identity,
    wall: String,
    body: SceneRequest,
) -> Response {
    let wall_id: WallId = match parse_id(&wall, "wall") {
        Ok(id) => id,
        Err(res) => return res,
    };
    let accepted = body.elements.len();
    let worker = ctx.registry.worker(wall_id, identity.author_id).await;
    match worker.scene_changed(body.elements).await {
        Ok(()) => json_with_status(&SceneAccepted { accepted }, StatusCode::ACCEPTED),
        Err(e) => session_failure(e),
    }
}

/// POST /api/walls/:wall_id/scene/flush
pub async fn flush_scene(ctx: ApiContext, identity: Identity, wall: String) -> Response {
    let wall_id: WallId = match parse_id(&wall, "wall") {
        Ok(id) => id,
        Err(res) => return res,
    };
    let worker = ctx.registry.worker(wall_id, identity.author_id).await;
    match worker.flush().await {
        Ok(report) => json_with_status(&report, StatusCode::OK),
        Err(e) => session_failure(e),
    }
}

/// GET /api/walls/:wall_id/session
pub async fn current_session(ctx: ApiContext, identity: Identity, wall: String) -> Response {
    let wall_id: WallId = match parse_id(&wall, "wall") {
        Ok(id) => id,
        Err(res) => return res,
    };
    let handle = match ctx.registry.existing(wall_id, identity.author_id).await {
        Some(handle) => handle,
        None => return json_with_status(&Option::<()>::None, StatusCode::OK),
    };
    match handle.current_session().await {
        Ok(current) => json_with_status(&current, StatusCode::OK),
        Err(e) => session_failure(e),
    }
}

/// GET /api/profile/sessions?page=&limit=
pub async fn profile_sessions(ctx: ApiContext, identity: Identity, query: PageQuery) -> Response {
    match ctx
        .storage
        .session_summaries(identity.author_id, query.page(), query.limit())
        .await
    {
        Ok(page) => json_with_status(&page, StatusCode::OK),
        Err(e) => storage_failure(e, "sessions"),
    }
}

/// DELETE /api/profile/sessions/:id
pub async fn delete_profile_session(ctx: ApiContext, identity: Identity, id: String) -> Response {
    let session_id = match parse_id(&id, "session") {
        Ok(id) => id,
        Err(res) => return res,
    };
    let session = match owned_session(&ctx, &identity, session_id).await {
        Ok(session) => session,
        Err(res) => return res,
    };

    release_from_worker(&ctx, &session).await;
    match ctx.storage.delete_session(session_id).await {
        Ok(deleted) => {
            info!("[{}] Session deleted by its author", session_id);
            json_with_status(&SuccessResponse { success: deleted }, StatusCode::OK)
        }
        Err(e) => storage_failure(e, "session"),
    }
}

/// POST /api/walls
pub async fn create_wall(ctx: ApiContext, identity: Identity, body: CreateWallRequest) -> Response {
    let wall = match NewWall::named(&body.name, body.location, identity.author_id) {
        Ok(wall) => wall,
        Err(message) => return api_error(&message, StatusCode::BAD_REQUEST),
    };
    match ctx.storage.create_wall(wall).await {
        Ok(wall) => {
            info!("[{}] Wall created over HTTP as {}", wall.id, wall.slug);
            json_with_status(&wall, StatusCode::CREATED)
        }
        Err(e) => storage_failure(e, "wall"),
    }
}

/// GET /api/walls
pub async fn list_walls(ctx: ApiContext) -> Response {
    match ctx.storage.get_walls(WallFilter::default()).await {
        Ok(walls) => json_with_status(&walls, StatusCode::OK),
        Err(e) => storage_failure(e, "walls"),
    }
}

/// GET /api/w/:slug
///
/// Stamps the wall as opened and records the visit. Failures of either are
/// logged and do not fail the request.
pub async fn open_wall(ctx: ApiContext, identity: Identity, slug: String) -> Response {
    let wall = match ctx.storage.get_wall_by_slug(&slug).await {
        Ok(Some(wall)) => wall,
        Ok(None) => return api_error("Wall not found", StatusCode::NOT_FOUND),
        Err(e) => return storage_failure(e, "wall"),
    };

    let (opened, view) = tokio::join!(
        ctx.storage.mark_wall_opened(wall.id),
        ctx.storage.record_wall_view(wall.id, identity.author_id)
    );
    if let Err(e) = view {
        warn!("[{}] Failed to record wall view: {}", wall.id, e);
    }
    match opened {
        Ok(opened) => json_with_status(&opened, StatusCode::OK),
        Err(e) => {
            warn!("[{}] Failed to update last opened: {}", wall.id, e);
            json_with_status(&wall, StatusCode::OK)
        }
    }
}

/// POST /api/canvas/excalidraw
pub async fn save_scene(ctx: ApiContext, identity: Identity, body: SaveSceneRequest) -> Response {
    let scene = SceneSnapshot {
        wall_id: body.wall_id,
        elements: body.elements,
        app_state: body.app_state,
        last_edited_by: identity.author_id,
        updated_at: Utc::now(),
    };
    match ctx.storage.save_scene(scene).await {
        Ok(data) => json_with_status(&SceneSaved { success: true, data }, StatusCode::OK),
        Err(e) => storage_failure(e, "wall"),
    }
}

/// GET /api/canvas/excalidraw?wall_id=
pub async fn load_scene(ctx: ApiContext, query: WallQuery) -> Response {
    match ctx.storage.get_scene(query.wall_id).await {
        Ok(Some(scene)) => json_with_status(
            &SceneResponse {
                elements: scene.elements,
                app_state: scene.app_state,
            },
            StatusCode::OK,
        ),
        Ok(None) => json_with_status(&SceneResponse::default(), StatusCode::OK),
        Err(e) => storage_failure(e, "scene"),
    }
}

/// GET /api/profile/walls?page=&limit=
pub async fn profile_walls(ctx: ApiContext, identity: Identity, query: PageQuery) -> Response {
    match ctx
        .storage
        .wall_summaries(identity.author_id, query.page(), query.limit())
        .await
    {
        Ok(page) => json_with_status(&page, StatusCode::OK),
        Err(e) => storage_failure(e, "walls"),
    }
}

/// DELETE /api/profile/walls/:id
///
/// Only the creator can delete a wall; `success` is false otherwise. Workers
/// drawing on the wall are stopped first.
pub async fn delete_profile_wall(ctx: ApiContext, identity: Identity, id: String) -> Response {
    let wall_id: WallId = match parse_id(&id, "wall") {
        Ok(id) => id,
        Err(res) => return res,
    };
    let owned = match ctx.storage.get_wall(wall_id).await {
        Ok(Some(wall)) => wall.creator_id == identity.author_id,
        Ok(None) => false,
        Err(e) => return storage_failure(e, "wall"),
    };
    if !owned {
        return json_with_status(&SuccessResponse { success: false }, StatusCode::OK);
    }

    ctx.registry.shutdown_wall(wall_id).await;
    match ctx.storage.delete_wall(wall_id).await {
        Ok(deleted) => {
            info!("[{}] Wall deleted by its creator", wall_id);
            json_with_status(&SuccessResponse { success: deleted }, StatusCode::OK)
        }
        Err(e) => storage_failure(e, "wall"),
    }
}

/// POST /api/profile/reset-id
pub async fn reset_identity() -> Response {
    with_cleared_identity(&MessageResponse {
        success: true,
        message: "Anonymous ID reset successfully. You will receive a new ID on your next request."
            .into(),
    })
}

/// POST /api/clear-cookies
pub async fn clear_cookies() -> Response {
    with_cleared_identity(&MessageResponse {
        success: true,
        message: "Cookies cleared".into(),
    })
}

/// Turns warp rejections into `ApiError` bodies.
pub async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    let (message, status) = if err.is_not_found() {
        ("Not found", StatusCode::NOT_FOUND)
    } else if err.find::<warp::filters::body::BodyDeserializeError>().is_some() {
        ("Invalid request body", StatusCode::BAD_REQUEST)
    } else if err.find::<warp::reject::InvalidQuery>().is_some() {
        ("Invalid query string", StatusCode::BAD_REQUEST)
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        ("Method not allowed", StatusCode::METHOD_NOT_ALLOWED)
    } else {
        warn!("Unhandled rejection: {:?}", err);
        ("Internal error", StatusCode::INTERNAL_SERVER_ERROR)
    };
    Ok(api_error(message, status))
}

/// /api/canvas/sessions and /api/canvas/sessions/:id/finalize
pub fn canvas_session_routes(
    ctx: ApiContext,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let create = warp::path!("api" / "canvas" / "sessions")
        .and(warp::post())
        .and(with_context(ctx.clone()))
        .and(identity())
        .and(warp::body::json())
        .and_then(|ctx: ApiContext, who: Identity, body: CreateSessionRequest| async move {
            Ok::<_, Rejection>(who.attach(create_session(ctx, who, body).await))
        });

    let list = warp::path!("api" / "canvas" / "sessions")
        .and(warp::get())
        .and(with_context(ctx.clone()))
        .and(warp::query::<WallQuery>())
        .and_then(|ctx: ApiContext, query: WallQuery| async move {
            Ok::<_, Rejection>(list_sessions(ctx, query).await)
        });

    let finalize = warp::path!("api" / "canvas" / "sessions" / String / "finalize")
        .and(warp::put())
        .and(with_context(ctx))
        .and(identity())
        .and_then(|id: String, ctx: ApiContext, who: Identity| async move {
            Ok::<_, Rejection>(who.attach(finalize_session(ctx, who, id).await))
        });

    create.or(list).or(finalize)
}

/// /api/canvas/nodes
pub fn canvas_node_routes(
    ctx: ApiContext,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let create = warp::path!("api" / "canvas" / "nodes")
        .and(warp::post())
        .and(with_context(ctx.clone()))
        .and(identity())
        .and(warp::body::json())
        .and_then(|ctx: ApiContext, who: Identity, body: CreateNodeRequest| async move {
            Ok::<_, Rejection>(who.attach(create_node(ctx, who, body).await))
        });

    let list = warp::path!("api" / "canvas" / "nodes")
        .and(warp::get())
        .and(with_context(ctx.clone()))
        .and(warp::query::<NodesQuery>())
        .and_then(|ctx: ApiContext, query: NodesQuery| async move {
            Ok::<_, Rejection>(list_nodes(ctx, query).await)
        });

    let update = warp::path!("api" / "canvas" / "nodes")
        .and(warp::put())
        .and(with_context(ctx.clone()))
        .and(identity())
        .and(warp::body::json())
        .and_then(|ctx: ApiContext, who: Identity, body: UpdateNodeRequest| async move {
            Ok::<_, Rejection>(who.attach(update_node(ctx, who, body).await))
        });

    let delete = warp::path!("api" / "canvas" / "nodes")
        .and(warp::delete())
        .and(with_context(ctx))
        .and(identity())
        .and(warp::query::<NodeIdQuery>())
        .and_then(|ctx: ApiContext, who: Identity, query: NodeIdQuery| async move {
            Ok::<_, Rejection>(who.attach(delete_node(ctx, who, query).await))
        });

    create.or(list).or(update).or(delete)
}

/// /api/canvas/excalidraw
pub fn canvas_scene_routes(
    ctx: ApiContext,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let save = warp::path!("api" / "canvas" / "excalidraw")
        .and(warp::post())
        .and(with_context(ctx.clone()))
        .and(identity())
        .and(warp::body::json())
        .and_then(|ctx: ApiContext, who: Identity, body: SaveSceneRequest| async move {
            Ok::<_, Rejection>(who.attach(save_scene(ctx, who, body).await))
        });

    let load = warp::path!("api" / "canvas" / "excalidraw")
        .and(warp::get())
        .and(with_context(ctx))
        .and(warp::query::<WallQuery>())
        .and_then(|ctx: ApiContext, query: WallQuery| async move {
            Ok::<_, Rejection>(load_scene(ctx, query).await)
        });

    save.or(load)
}

/// /api/walls, /api/w/:slug and /api/walls/:wall_id/...
pub fn wall_routes(ctx: ApiContext) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let create = warp::path!("api" / "walls")
        .and(warp::post())
        .and(with_context(ctx.clone()))
        .and(identity())
        .and(warp::body::json())
        .and_then(|ctx: ApiContext, who: Identity, body: CreateWallRequest| async move {
            Ok::<_, Rejection>(who.attach(create_wall(ctx, who, body).await))
        });

    let list = warp::path!("api" / "walls")
        .and(warp::get())
        .and(with_context(ctx.clone()))
        .and_then(|ctx: ApiContext| async move { Ok::<_, Rejection>(list_walls(ctx).await) });

    let open = warp::path!("api" / "w" / String)
        .and(warp::get())
        .and(with_context(ctx.clone()))
        .and(identity())
        .and_then(|slug: String, ctx: ApiContext, who: Identity| async move {
            Ok::<_, Rejection>(who.attach(open_wall(ctx, who, slug).await))
        });

    let scene = warp::path!("api" / "walls" / String / "scene")
        .and(warp::post())
        .and(with_context(ctx.clone()))
        .and(identity())
        .and(warp::body::json())
        .and_then(|wall: String, ctx: ApiContext, who: Identity, body: SceneRequest| async move {
            Ok::<_, Rejection>(who.attach(post_scene(ctx, who, wall, body).await))
        });

    let flush = warp::path!("api" / "walls" / String / "scene" / "flush")
        .and(warp::post())
        .and(with_context(ctx.clone()))
        .and(identity())
        .and_then(|wall: String, ctx: ApiContext, who: Identity| async move {
            Ok::<_, Rejection>(who.attach(flush_scene(ctx, who, wall).await))
        });

    let session = warp::path!("api" / "walls" / String / "session")
        .and(warp::get())
        .and(with_context(ctx))
        .and(identity())
        .and_then(|wall: String, ctx: ApiContext, who: Identity| async move {
            Ok::<_, Rejection>(who.attach(current_session(ctx, who, wall).await))
        });

    create.or(list).or(open).or(scene).or(flush).or(session)
}

/// /api/profile/sessions
pub fn profile_routes(
    ctx: ApiContext,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let list = warp::path!("api" / "profile" / "sessions")
        .and(warp::get())
        .and(with_context(ctx.clone()))
        .and(identity())
        .and(warp::query::<PageQuery>())
        .and_then(|ctx: ApiContext, who: Identity, query: PageQuery| async move {
            Ok::<_, Rejection>(who.attach(profile_sessions(ctx, who, query).await))
        });

    let delete = warp::path!("api" / "profile" / "sessions" / String)
        .and(warp::delete())
        .and(with_context(ctx.clone()))
        .and(identity())
        .and_then(|id: String, ctx: ApiContext, who: Identity| async move {
            Ok::<_, Rejection>(who.attach(delete_profile_session(ctx, who, id).await))
        });

    let walls = warp::path!("api" / "profile" / "walls")
        .and(warp::get())
        .and(with_context(ctx.clone()))
        .and(identity())
        .and(warp::query::<PageQuery>())
        .and_then(|ctx: ApiContext, who: Identity, query: PageQuery| async move {
            Ok::<_, Rejection>(who.attach(profile_walls(ctx, who, query).await))
        });

    let delete_wall = warp::path!("api" / "profile" / "walls" / String)
        .and(warp::delete())
        .and(with_context(ctx))
        .and(identity())
        .and_then(|id: String, ctx: ApiContext, who: Identity| async move {
            Ok::<_, Rejection>(who.attach(delete_profile_wall(ctx, who, id).await))
        });

    list.or(delete).or(walls).or(delete_wall)
}

/// /api/profile/reset-id and /api/clear-cookies
pub fn identity_routes() -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let reset = warp::path!("api" / "profile" / "reset-id")
        .and(warp::post())
        .and_then(|| async { Ok::<_, Rejection>(reset_identity().await) });

    let clear = warp::path!("api" / "clear-cookies")
        .and(warp::post())
        .and_then(|| async { Ok::<_, Rejection>(clear_cookies().await) });

    reset.or(clear)
}

/// Every route of the API, with rejections rendered as JSON errors.
pub fn api_routes(ctx: ApiContext) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    canvas_session_routes(ctx.clone())
        .or(canvas_node_routes(ctx.clone()))
        .or(canvas_scene_routes(ctx.clone()))
        .or(wall_routes(ctx.clone()))
        .or(profile_routes(ctx))
        .or(identity_routes())
        .recover(handle_rejection)
}
