use crate::server::{
    AppCoordinator, Result, ServerError, ServerRouter, json::Accepted, settle_in_background,
};
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::Deserialize;
use socialspark_common::model::{Id, comment::CommentMarker, like::LikeState, user::Session};
use tokio_util::task::TaskTracker;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(toggle_comment_like)
        .typed_delete(delete_comment)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/comments/{id}/like", rejection(ServerError))]
struct CommentLikePath {
    id: Id<CommentMarker>,
}

async fn toggle_comment_like(
    CommentLikePath { id }: CommentLikePath,
    State(coordinator): State<AppCoordinator>,
    State(session): State<Session>,
    State(settlements): State<TaskTracker>,
) -> Result<Accepted<LikeState>> {
    let pending = coordinator.toggle_comment_like(&session, id)?;
    let likes = pending.shown();

    settle_in_background(&settlements, pending);
    Ok(Accepted(likes))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/comments/{id}", rejection(ServerError))]
struct CommentPath {
    id: Id<CommentMarker>,
}

async fn delete_comment(
    CommentPath { id }: CommentPath,
    State(coordinator): State<AppCoordinator>,
    State(session): State<Session>,
    State(settlements): State<TaskTracker>,
) -> Result<StatusCode> {
    let pending = coordinator.delete_comment(&session, id)?;

    settle_in_background(&settlements, pending);
    Ok(StatusCode::ACCEPTED)
}
