use crate::server::{AppCoordinator, ServerError, ServerRouter, json::Json};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use serde::Deserialize;
use socialspark_client::notice::Notice;

pub fn routes() -> ServerRouter {
    ServerRouter::new().typed_get(drain_notices)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/notices", rejection(ServerError))]
struct NoticesPath();

/// Hands out every failure notice collected since the last call.
async fn drain_notices(
    NoticesPath(): NoticesPath,
    State(coordinator): State<AppCoordinator>,
) -> Json<Vec<Notice>> {
    Json(coordinator.notices().drain())
}
