mod create;
mod delete;
mod like;
mod load;
mod state;

pub use create::{PendingComment, PendingPost};
pub use delete::{PendingCommentDeletion, PendingPostDeletion};
pub use like::{LikeSettlement, PendingLike};

use crate::{
    error::MutationError,
    notice::NoticeBoard,
    remote::{Remote, RemoteError, RemoteResult},
};
use parking_lot::Mutex;
use socialspark_common::{
    model::{
        Id, Key,
        comment::{Comment, CommentMarker},
        post::{Post, PostMarker},
    },
    util::PositiveDuration,
};
use socialspark_store::store::EntityStore;
use state::Shared;
use std::{future::Future, sync::Arc};
use time::Duration;
use tokio::task::JoinHandle;

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct CoordinatorConfig {
    /// Upper bound for every remote call. Slower calls count as failed.
    pub remote_timeout: PositiveDuration,
    pub notice_capacity: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            remote_timeout: PositiveDuration::new_unchecked(Duration::seconds(10)),
            notice_capacity: 64,
        }
    }
}

/// A mutation whose local part has been applied and whose remote part is
/// still to come.
///
/// Dropping it unsettled, or dropping the future returned by
/// [`Pending::settle`] before it completes, takes the local part back the same
/// way a refusal by the remote would, only without a notice.
pub trait Pending: Sized + Send + 'static {
    type Output: Send + 'static;

    /// Performs the remote call and reconciles the store with its outcome.
    fn settle(self) -> impl Future<Output = Result<Self::Output, MutationError>> + Send;

    /// Settles on the runtime instead of in place.
    fn spawn(self) -> JoinHandle<Result<Self::Output, MutationError>> {
        tokio::spawn(self.settle())
    }
}

#[derive(Debug)]
struct Inner<R> {
    state: Mutex<Shared>,
    remote: R,
    notices: NoticeBoard,
    config: CoordinatorConfig,
}

/// Applies user actions to the local store at once and keeps it in line with
/// the remote.
///
/// Each action is split in two: calling e.g. [`Coordinator::create_post`]
/// changes the store and returns a [`Pending`] value, and settling that value
/// talks to the remote and either confirms or undoes the change. Other actions
/// may run while a mutation is waiting for the remote, so entities are always
/// looked up again by key when it comes back.
#[derive(Debug)]
pub struct Coordinator<R> {
    inner: Arc<Inner<R>>,
}

impl<R> Clone for Coordinator<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R> Coordinator<R> {
    fn with_state<T>(&self, change: impl FnOnce(&mut Shared) -> T) -> T {
        change(&mut self.inner.state.lock())
    }
}

impl<R: Remote> Coordinator<R> {
    #[must_use]
    pub fn new(remote: R, config: CoordinatorConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(Shared::default()),
                remote,
                notices: NoticeBoard::new(config.notice_capacity),
                config,
            }),
        }
    }

    #[must_use]
    pub fn remote(&self) -> &R {
        &self.inner.remote
    }

    #[must_use]
    pub fn notices(&self) -> &NoticeBoard {
        &self.inner.notices
    }

    /// Runs `read` against the current store.
    pub fn read<T>(&self, read: impl FnOnce(&EntityStore) -> T) -> T {
        read(&self.inner.state.lock().store)
    }

    #[must_use]
    pub fn posts(&self) -> Vec<Post> {
        self.read(|store| store.posts().to_vec())
    }

    #[must_use]
    pub fn post(&self, key: Key<PostMarker>) -> Option<Post> {
        self.read(|store| store.post(key).cloned())
    }

    #[must_use]
    pub fn comment(&self, key: Key<CommentMarker>) -> Option<Comment> {
        self.read(|store| store.comment(key).cloned())
    }

    #[must_use]
    pub fn comments(&self, post_id: Id<PostMarker>) -> Vec<Comment> {
        self.read(|store| store.comments(post_id).to_vec())
    }

    /// Awaits a remote call, giving up after the configured timeout.
    async fn call<T>(&self, request: impl Future<Output = RemoteResult<T>>) -> RemoteResult<T> {
        let timeout = self.inner.config.remote_timeout.as_std();
        tokio::time::timeout(timeout, request)
            .await
            .unwrap_or(Err(RemoteError::TimedOut(timeout)))
    }

    fn report(&self, error: &MutationError) {
        self.inner
            .notices
            .post(error.to_string(), error.restored_input().map(str::to_owned));
    }
}
