use axum::{
    Router,
    extract::{
        FromRef, Request,
        rejection::{JsonRejection, PathRejection},
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use json::Json;
use serde::{Deserialize, Serialize};
use socialspark_client::{
    Coordinator, MockRemote, Pending, RemoteError, error::MutationError,
};
use socialspark_common::model::user::Session;
use socialspark_store::store::StoreError;
use thiserror::Error;
use tokio_util::task::TaskTracker;
use tracing::{debug, error};

mod json;
mod routes;

pub type ServerRouter = Router<ServerState>;

pub type AppCoordinator = Coordinator<MockRemote>;

#[derive(Clone, Debug, FromRef)]
pub struct ServerState {
    pub coordinator: AppCoordinator,
    /// The user all requests act for.
    pub session: Session,
    /// Reconciliations still talking to the remote.
    pub settlements: TaskTracker,
}

/// Runs the remote half of a mutation after the response has been sent.
/// Failures are already logged and posted as notices by then.
fn settle_in_background<P: Pending>(settlements: &TaskTracker, pending: P) {
    settlements.spawn(async move {
        if let Err(err) = pending.settle().await {
            debug!(error = %err, "Background settlement failed");
        }
    });
}

pub fn routes() -> ServerRouter {
    routes::routes().fallback(fallback)
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Incoming JSON rejected: {0}")]
    JsonRejection(#[from] JsonRejection),
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error("Content must not be blank")]
    BlankContent,
    #[error(transparent)]
    Mutation(#[from] MutationError),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_) | ServerError::PathRejection(_) => StatusCode::NOT_FOUND,
            ServerError::JsonRejection(_) => StatusCode::BAD_REQUEST,
            ServerError::BlankContent => StatusCode::UNPROCESSABLE_ENTITY,
            ServerError::JsonResponse(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Mutation(err) => mutation_status(err),
        }
    }
}

fn mutation_status(err: &MutationError) -> StatusCode {
    match err {
        MutationError::PostNotFound(_)
        | MutationError::CommentNotFound(_)
        | MutationError::Store(StoreError::PostNotFound(_)) => StatusCode::NOT_FOUND,
        MutationError::Store(StoreError::DuplicateComment(_)) => StatusCode::CONFLICT,
        MutationError::Remote(source) | MutationError::CreateRolledBack { source, .. } => {
            remote_status(source)
        }
    }
}

fn remote_status(err: &RemoteError) -> StatusCode {
    match err {
        RemoteError::NotFound(_) => StatusCode::NOT_FOUND,
        RemoteError::TimedOut(_) => StatusCode::GATEWAY_TIMEOUT,
        RemoteError::Rejected(_) => StatusCode::BAD_GATEWAY,
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
struct ErrorResponse {
    status: u16,
    message: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        error!(error = %self, %status, "Replying with error");

        let error_response = ErrorResponse {
            status: status.as_u16(),
            message: self.to_string(),
        };
        (status, Json(error_response)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use crate::server::ServerError;
    use axum::http::StatusCode;
    use socialspark_client::{RemoteError, error::MutationError};
    use socialspark_common::model::{Id, Key};
    use socialspark_store::store::StoreError;
    use std::time::Duration;

    #[test]
    fn missing_entities_are_not_found() {
        let err = ServerError::from(MutationError::PostNotFound(Key::Confirmed(Id::from(1))));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err = ServerError::from(MutationError::Store(StoreError::PostNotFound(
            Key::Confirmed(Id::from(1)),
        )));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn remote_failures_map_to_gateway_errors() {
        let timed_out = ServerError::from(MutationError::Remote(RemoteError::TimedOut(
            Duration::from_secs(1),
        )));
        assert_eq!(timed_out.status(), StatusCode::GATEWAY_TIMEOUT);

        let rolled_back = ServerError::from(MutationError::CreateRolledBack {
            input: "hi".to_owned(),
            source: RemoteError::Rejected("nope".to_owned()),
        });
        assert_eq!(rolled_back.status(), StatusCode::BAD_GATEWAY);
    }
}
