use crate::server::{AppCoordinator, Result, ServerError, ServerRouter, json::Json};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use serde::Deserialize;
use socialspark_client::FeedPage;
use socialspark_common::model::{post::Post, user::Session};

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(get_feed)
        .typed_post(load_feed)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/feed", rejection(ServerError))]
struct FeedPath();

async fn get_feed(
    FeedPath(): FeedPath,
    State(coordinator): State<AppCoordinator>,
) -> Json<Vec<Post>> {
    Json(coordinator.posts())
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/feed/load", rejection(ServerError))]
struct LoadFeedPath();

async fn load_feed(
    LoadFeedPath(): LoadFeedPath,
    State(coordinator): State<AppCoordinator>,
    State(session): State<Session>,
    Json(page): Json<FeedPage>,
) -> Result<Json<Vec<Post>>> {
    coordinator.load_feed(&session, page).await?;

    Ok(Json(coordinator.posts()))
}
