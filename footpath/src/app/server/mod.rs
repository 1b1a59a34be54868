pub mod handlers;
pub mod queries;
pub mod server_error;
pub mod state;

use std::path::Path;
use std::sync::{Arc, Mutex};

use axum::routing::get;
use axum::Router;
use log::{error, info};

use footpath_core::model::profile::parse_profiles;
use footpath_core::storage::{GraphStore, GRAPH_FILE_NAME};

use super::cli::AppError;
use state::{AppState, SharedState};

/// build the service router: one info route plus the three query routes,
/// each parameterized by profile id.
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(handlers::info))
        .route("/shortest_path/{profile}", get(handlers::shortest_path))
        .route(
            "/shortest_path_tree/{profile}",
            get(handlers::shortest_path_tree),
        )
        .route("/reachable_tree/{profile}", get(handlers::reachable_tree))
        .with_state(state)
}

/// open the project's graph and serve queries for its profiles. a graph
/// that fails to open is reported per-request as `NoGraph` rather than
/// aborting startup.
pub fn run_server(
    project_dir: &Path,
    host: &str,
    port: u16,
    debug: bool,
) -> Result<(), AppError> {
    let profiles = parse_profiles(project_dir)?;
    for profile in &profiles {
        info!(
            "profile {} ({}){}",
            profile.id,
            profile.name,
            if profile.precalculate {
                ", precalculated"
            } else {
                ""
            }
        );
    }

    let graph = match GraphStore::open(project_dir.join(GRAPH_FILE_NAME)) {
        Ok(store) => Some(Mutex::new(store)),
        Err(e) => {
            error!("failed to open graph: {}", e);
            None
        }
    };

    let state = Arc::new(AppState {
        graph,
        profiles,
        debug,
    });

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let app = router(state);
        let listener = tokio::net::TcpListener::bind(format!("{}:{}", host, port)).await?;
        info!("listening on {}", listener.local_addr()?);
        axum::serve(listener, app).await
    })?;
    Ok(())
}
