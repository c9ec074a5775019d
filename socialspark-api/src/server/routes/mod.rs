use crate::server::ServerRouter;
use axum::Router;
use serde::Deserialize;

mod comments;
mod feed;
mod notices;
mod posts;

pub fn routes() -> ServerRouter {
    Router::new()
        .merge(feed::routes())
        .merge(posts::routes())
        .merge(comments::routes())
        .merge(notices::routes())
}

/// Body of the create comment route. Kept as raw text so blank input reaches
/// the coordinator unchanged.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
struct ContentInput {
    content: String,
}
