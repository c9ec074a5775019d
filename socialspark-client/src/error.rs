use crate::remote::RemoteError;
use socialspark_common::model::{Key, comment::CommentMarker, post::PostMarker};
use socialspark_store::store::StoreError;
use thiserror::Error;

pub type Result<T, E = MutationError> = std::result::Result<T, E>;

/// Why a mutation did not go through. Whenever one of these is returned the
/// store is back in the state it had before the mutation started.
#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum MutationError {
    #[error("Post {0} is not in the store")]
    PostNotFound(Key<PostMarker>),
    #[error("Comment {0} is not in the store")]
    CommentNotFound(Key<CommentMarker>),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    /// Creating a post or comment failed. `input` is the text the user typed so
    /// it can be offered again.
    #[error("Creation was rolled back: {source}")]
    CreateRolledBack { input: String, source: RemoteError },
}

impl MutationError {
    /// The text to put back into the input field, if any.
    #[must_use]
    pub fn restored_input(&self) -> Option<&str> {
        match self {
            MutationError::CreateRolledBack { input, .. } => Some(input),
            _ => None,
        }
    }
}
