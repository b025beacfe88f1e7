use crate::config::DuetConfig;
use crate::room::{Coordinator, RoomCommand};
use crate::signaling::{SignalingService, ws_handler};
use crate::storage::ChatStore;
use crate::upload::{UploadStore, upload_file};
use axum::Router;
use axum::extract::{DefaultBodyLimit, FromRef};
use axum::routing::{get, post};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub signaling: SignalingService,
    pub uploads: UploadStore,
    pub static_dir: Option<PathBuf>,
}

impl FromRef<AppState> for SignalingService {
    fn from_ref(state: &AppState) -> Self {
        state.signaling.clone()
    }
}

impl FromRef<AppState> for UploadStore {
    fn from_ref(state: &AppState) -> Self {
        state.uploads.clone()
    }
}

/// Spawns the coordinator task and returns the state shared by the routes.
/// Must be called from within a tokio runtime.
pub fn start(config: &DuetConfig, store: Arc<dyn ChatStore>) -> AppState {
    let (command_tx, command_rx) = mpsc::channel::<RoomCommand>(1024);
    let signaling = SignalingService::new(command_tx, config.ice_servers());

    let coordinator = Coordinator::new(
        command_rx,
        Arc::new(signaling.clone()),
        store,
        config.coordinator_settings(),
    );
    tokio::spawn(coordinator.run());

    AppState {
        signaling,
        uploads: UploadStore::new(&config.storage.upload_dir, config.storage.max_upload_bytes),
        static_dir: config.server.static_dir.as_ref().map(PathBuf::from),
    }
}

pub fn build_router(state: AppState) -> Router {
    let max_upload = state.uploads.max_bytes();
    let uploads_dir = state.uploads.dir().to_path_buf();

    let mut router = Router::new()
        .route("/ws", get(ws_handler))
        .route(
            "/upload",
            post(upload_file).layer(DefaultBodyLimit::max(max_upload)),
        )
        .nest_service("/uploads", ServeDir::new(uploads_dir));

    if let Some(dir) = &state.static_dir {
        router = router.fallback_service(ServeDir::new(dir));
    }

    router
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
