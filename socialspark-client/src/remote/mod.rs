pub mod mock;

use serde::{Deserialize, Serialize};
use socialspark_common::model::{
    Id,
    comment::{Comment, CommentMarker, CreateComment},
    post::{CreatePost, Post, PostMarker},
    user::Session,
};
use std::{future::Future, num::NonZeroU32, time::Duration};
use thiserror::Error;

pub type RemoteResult<T> = Result<T, RemoteError>;

#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum RemoteError {
    #[error("The server rejected the request: {0}")]
    Rejected(String),
    #[error("The server did not answer within {0:?}")]
    TimedOut(Duration),
    #[error("The server does not know {0}")]
    NotFound(String),
}

/// One page of the feed, newest posts first. Pages start at 1.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Deserialize, Serialize)]
pub struct FeedPage {
    pub page: NonZeroU32,
    pub limit: NonZeroU32,
}

impl FeedPage {
    #[must_use]
    pub fn first(limit: NonZeroU32) -> Self {
        Self {
            page: NonZeroU32::MIN,
            limit,
        }
    }

    #[must_use]
    pub fn is_first(self) -> bool {
        self.page == NonZeroU32::MIN
    }

    /// Number of posts in front of this page.
    #[must_use]
    pub fn offset(self) -> usize {
        let skipped = u64::from(self.page.get() - 1) * u64::from(self.limit.get());
        usize::try_from(skipped).unwrap_or(usize::MAX)
    }
}

/// The backend the coordinator talks to.
///
/// Every call resolves exactly once, either with the server's view of the
/// affected entity or with an error. Like and unlike are answered with the
/// whole entity, of which only the like state is trusted.
pub trait Remote: Send + Sync + 'static {
    fn create_post(
        &self,
        session: &Session,
        post: CreatePost,
    ) -> impl Future<Output = RemoteResult<Post>> + Send;

    fn create_comment(
        &self,
        session: &Session,
        comment: CreateComment,
    ) -> impl Future<Output = RemoteResult<Comment>> + Send;

    fn like_post(
        &self,
        session: &Session,
        post_id: Id<PostMarker>,
    ) -> impl Future<Output = RemoteResult<Post>> + Send;

    fn unlike_post(
        &self,
        session: &Session,
        post_id: Id<PostMarker>,
    ) -> impl Future<Output = RemoteResult<Post>> + Send;

    fn like_comment(
        &self,
        session: &Session,
        comment_id: Id<CommentMarker>,
    ) -> impl Future<Output = RemoteResult<Comment>> + Send;

    fn unlike_comment(
        &self,
        session: &Session,
        comment_id: Id<CommentMarker>,
    ) -> impl Future<Output = RemoteResult<Comment>> + Send;

    fn delete_post(
        &self,
        session: &Session,
        post_id: Id<PostMarker>,
    ) -> impl Future<Output = RemoteResult<()>> + Send;

    fn delete_comment(
        &self,
        session: &Session,
        comment_id: Id<CommentMarker>,
    ) -> impl Future<Output = RemoteResult<()>> + Send;

    fn fetch_posts(
        &self,
        session: &Session,
        page: FeedPage,
    ) -> impl Future<Output = RemoteResult<Vec<Post>>> + Send;

    fn fetch_comments(
        &self,
        session: &Session,
        post_id: Id<PostMarker>,
    ) -> impl Future<Output = RemoteResult<Vec<Comment>>> + Send;
}
