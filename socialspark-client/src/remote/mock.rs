//! A stand-in for the backend that keeps everything in memory.

use crate::remote::{FeedPage, Remote, RemoteError, RemoteResult};
use parking_lot::Mutex;
use socialspark_common::{
    model::{
        Id, Key, SocialsparkSnowflakeGenerator,
        comment::{Comment, CommentMarker, CreateComment},
        content::Content,
        like::LikeState,
        post::{CreatePost, Post, PostMarker, PostMedia},
        user::{Session, User, UserMarker},
    },
    snowflake::{ProcessId, WorkerId},
};
use std::{
    collections::HashSet,
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};
use time::UtcDateTime;
use tracing::debug;

/// When the mock backend pretends to fail.
#[derive(Copy, Clone, PartialEq, Debug, Default)]
pub enum FailureInjection {
    #[default]
    Never,
    Always,
    /// Fails each call with probability `rate`, clamped to `0.0..=1.0`.
    Random { rate: f64 },
}

impl FailureInjection {
    fn should_fail(self) -> bool {
        match self {
            FailureInjection::Never => false,
            FailureInjection::Always => true,
            FailureInjection::Random { rate } => rand::random_bool(rate.clamp(0.0, 1.0)),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Debug)]
pub struct MockRemoteConfig {
    pub worker_id: WorkerId,
    pub process_id: ProcessId,
    /// Artificial delay before every answer.
    pub latency: Duration,
    pub failures: FailureInjection,
}

impl Default for MockRemoteConfig {
    fn default() -> Self {
        Self {
            worker_id: WorkerId::default(),
            process_id: ProcessId::default(),
            latency: Duration::from_millis(300),
            failures: FailureInjection::Never,
        }
    }
}

#[derive(Debug)]
struct Likes {
    /// Likes by users other than the ones tracked in `likers`.
    base: u64,
    likers: HashSet<Id<UserMarker>>,
}

impl Likes {
    fn new(base: u64) -> Self {
        Self {
            base,
            likers: HashSet::new(),
        }
    }

    fn view(&self, user: Id<UserMarker>) -> LikeState {
        LikeState::new(
            self.base + self.likers.len() as u64,
            self.likers.contains(&user),
        )
    }
}

#[derive(Debug)]
struct StoredPost {
    id: Id<PostMarker>,
    author: User,
    content: Content,
    likes: Likes,
    media: PostMedia,
    created_at: UtcDateTime,
    updated_at: Option<UtcDateTime>,
}

#[derive(Debug)]
struct StoredComment {
    id: Id<CommentMarker>,
    post_id: Id<PostMarker>,
    author: User,
    content: Content,
    likes: Likes,
    created_at: UtcDateTime,
    updated_at: Option<UtcDateTime>,
}

impl StoredComment {
    fn view(&self, user: Id<UserMarker>) -> Comment {
        Comment {
            id: Key::Confirmed(self.id),
            post_id: self.post_id,
            author: self.author.clone(),
            content: self.content.clone(),
            likes: self.likes.view(user),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug)]
struct ServerState {
    ids: SocialsparkSnowflakeGenerator,
    /// Newest first.
    posts: Vec<StoredPost>,
    /// Newest first.
    comments: Vec<StoredComment>,
}

impl ServerState {
    fn post_view(&self, post: &StoredPost, user: Id<UserMarker>) -> Post {
        let comment_count = self
            .comments
            .iter()
            .filter(|comment| comment.post_id == post.id)
            .count();

        Post {
            id: Key::Confirmed(post.id),
            author: post.author.clone(),
            content: post.content.clone(),
            likes: post.likes.view(user),
            comment_count: comment_count as u64,
            media: post.media.clone(),
            created_at: post.created_at,
            updated_at: post.updated_at,
        }
    }

    fn post_mut(&mut self, post_id: Id<PostMarker>) -> RemoteResult<&mut StoredPost> {
        self.posts
            .iter_mut()
            .find(|post| post.id == post_id)
            .ok_or_else(|| RemoteError::NotFound(format!("post {post_id}")))
    }

    fn comment_mut(&mut self, comment_id: Id<CommentMarker>) -> RemoteResult<&mut StoredComment> {
        self.comments
            .iter_mut()
            .find(|comment| comment.id == comment_id)
            .ok_or_else(|| RemoteError::NotFound(format!("comment {comment_id}")))
    }

    fn set_post_like(
        &mut self,
        user: Id<UserMarker>,
        post_id: Id<PostMarker>,
        liked: bool,
    ) -> RemoteResult<Post> {
        let post = self.post_mut(post_id)?;
        if set_like(&mut post.likes, user, liked) {
            post.updated_at = Some(UtcDateTime::now());
        }

        let post = self
            .posts
            .iter()
            .find(|post| post.id == post_id)
            .ok_or_else(|| RemoteError::NotFound(format!("post {post_id}")))?;
        Ok(self.post_view(post, user))
    }

    fn set_comment_like(
        &mut self,
        user: Id<UserMarker>,
        comment_id: Id<CommentMarker>,
        liked: bool,
    ) -> RemoteResult<Comment> {
        let comment = self.comment_mut(comment_id)?;
        if set_like(&mut comment.likes, user, liked) {
            comment.updated_at = Some(UtcDateTime::now());
        }
        Ok(comment.view(user))
    }
}

/// Adds or removes `user`'s like. Liking twice or unliking something not
/// liked changes nothing. Returns whether anything changed.
fn set_like(likes: &mut Likes, user: Id<UserMarker>, liked: bool) -> bool {
    if liked {
        likes.likers.insert(user)
    } else {
        likes.likers.remove(&user)
    }
}

/// In-memory backend with configurable latency and failure injection.
#[derive(Debug)]
pub struct MockRemote {
    state: Mutex<ServerState>,
    latency: Duration,
    failures: Mutex<FailureInjection>,
    calls: AtomicUsize,
}

impl MockRemote {
    #[must_use]
    pub fn new(config: MockRemoteConfig) -> Self {
        Self {
            state: Mutex::new(ServerState {
                ids: SocialsparkSnowflakeGenerator::new(config.worker_id, config.process_id),
                posts: Vec::new(),
                comments: Vec::new(),
            }),
            latency: config.latency,
            failures: Mutex::new(config.failures),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_failure_injection(&self, failures: FailureInjection) {
        *self.failures.lock() = failures;
    }

    /// How many requests have reached this backend so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Stores a post written by someone and liked by `likes` other people.
    pub fn seed_post(&self, author: User, content: Content, likes: u64) -> Id<PostMarker> {
        let mut state = self.state.lock();
        let created_at = UtcDateTime::now();
        let id = state.ids.generate_at(created_at).into();

        state.posts.insert(
            0,
            StoredPost {
                id,
                author,
                content,
                likes: Likes::new(likes),
                media: PostMedia::default(),
                created_at,
                updated_at: None,
            },
        );
        id
    }

    /// Stores a comment without going through a request. Returns `None` if the
    /// post does not exist.
    pub fn seed_comment(
        &self,
        post_id: Id<PostMarker>,
        author: User,
        content: Content,
        likes: u64,
    ) -> Option<Id<CommentMarker>> {
        let mut state = self.state.lock();
        if !state.posts.iter().any(|post| post.id == post_id) {
            return None;
        }

        let created_at = UtcDateTime::now();
        let id = state.ids.generate_at(created_at).into();
        state.comments.insert(
            0,
            StoredComment {
                id,
                post_id,
                author,
                content,
                likes: Likes::new(likes),
                created_at,
                updated_at: None,
            },
        );
        Some(id)
    }

    /// The post as `user` would get it from the server.
    #[must_use]
    pub fn post(&self, user: Id<UserMarker>, post_id: Id<PostMarker>) -> Option<Post> {
        let state = self.state.lock();
        let post = state.posts.iter().find(|post| post.id == post_id)?;
        Some(state.post_view(post, user))
    }

    #[must_use]
    pub fn comment(&self, user: Id<UserMarker>, comment_id: Id<CommentMarker>) -> Option<Comment> {
        let state = self.state.lock();
        state
            .comments
            .iter()
            .find(|comment| comment.id == comment_id)
            .map(|comment| comment.view(user))
    }

    /// Counts the call, waits out the latency and decides whether to fail.
    async fn round_trip(&self, request: &'static str) -> RemoteResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let failures = *self.failures.lock();
        if failures.should_fail() {
            debug!(request, "Injecting failure");
            return Err(RemoteError::Rejected(format!("{request} failed")));
        }
        Ok(())
    }
}

impl Default for MockRemote {
    fn default() -> Self {
        Self::new(MockRemoteConfig::default())
    }
}

impl Remote for MockRemote {
    async fn create_post(&self, session: &Session, post: CreatePost) -> RemoteResult<Post> {
        self.round_trip("create post").await?;

        let mut state = self.state.lock();
        let created_at = UtcDateTime::now();
        let id = state.ids.generate_at(created_at).into();
        let stored = StoredPost {
            id,
            author: session.user.clone(),
            content: post.content,
            likes: Likes::new(0),
            media: post.media,
            created_at,
            updated_at: None,
        };
        let view = state.post_view(&stored, session.user_id());
        state.posts.insert(0, stored);
        Ok(view)
    }

    async fn create_comment(
        &self,
        session: &Session,
        comment: CreateComment,
    ) -> RemoteResult<Comment> {
        self.round_trip("create comment").await?;

        let mut state = self.state.lock();
        state.post_mut(comment.post_id)?;

        let created_at = UtcDateTime::now();
        let stored = StoredComment {
            id: state.ids.generate_at(created_at).into(),
            post_id: comment.post_id,
            author: session.user.clone(),
            content: comment.content,
            likes: Likes::new(0),
            created_at,
            updated_at: None,
        };
        let view = stored.view(session.user_id());
        state.comments.insert(0, stored);
        Ok(view)
    }

    async fn like_post(&self, session: &Session, post_id: Id<PostMarker>) -> RemoteResult<Post> {
        self.round_trip("like post").await?;
        self.state
            .lock()
            .set_post_like(session.user_id(), post_id, true)
    }

    async fn unlike_post(&self, session: &Session, post_id: Id<PostMarker>) -> RemoteResult<Post> {
        self.round_trip("unlike post").await?;
        self.state
            .lock()
            .set_post_like(session.user_id(), post_id, false)
    }

    async fn like_comment(
        &self,
        session: &Session,
        comment_id: Id<CommentMarker>,
    ) -> RemoteResult<Comment> {
        self.round_trip("like comment").await?;
        self.state
            .lock()
            .set_comment_like(session.user_id(), comment_id, true)
    }

    async fn unlike_comment(
        &self,
        session: &Session,
        comment_id: Id<CommentMarker>,
    ) -> RemoteResult<Comment> {
        self.round_trip("unlike comment").await?;
        self.state
            .lock()
            .set_comment_like(session.user_id(), comment_id, false)
    }

    async fn delete_post(&self, _session: &Session, post_id: Id<PostMarker>) -> RemoteResult<()> {
        self.round_trip("delete post").await?;

        let mut state = self.state.lock();
        state.post_mut(post_id)?;
        state.posts.retain(|post| post.id != post_id);
        state.comments.retain(|comment| comment.post_id != post_id);
        Ok(())
    }

    async fn delete_comment(
        &self,
        _session: &Session,
        comment_id: Id<CommentMarker>,
    ) -> RemoteResult<()> {
        self.round_trip("delete comment").await?;

        let mut state = self.state.lock();
        state.comment_mut(comment_id)?;
        state.comments.retain(|comment| comment.id != comment_id);
        Ok(())
    }

    async fn fetch_posts(&self, session: &Session, page: FeedPage) -> RemoteResult<Vec<Post>> {
        self.round_trip("fetch posts").await?;

        let state = self.state.lock();
        let posts = state
            .posts
            .iter()
            .skip(page.offset())
            .take(page.limit.get() as usize)
            .map(|post| state.post_view(post, session.user_id()))
            .collect();
        Ok(posts)
    }

    async fn fetch_comments(
        &self,
        session: &Session,
        post_id: Id<PostMarker>,
    ) -> RemoteResult<Vec<Comment>> {
        self.round_trip("fetch comments").await?;

        let state = self.state.lock();
        if !state.posts.iter().any(|post| post.id == post_id) {
            return Err(RemoteError::NotFound(format!("post {post_id}")));
        }

        let comments = state
            .comments
            .iter()
            .filter(|comment| comment.post_id == post_id)
            .map(|comment| comment.view(session.user_id()))
            .collect();
        Ok(comments)
    }
}

#[cfg(test)]
mod tests {
    use crate::remote::{
        FeedPage, Remote, RemoteError,
        mock::{FailureInjection, MockRemote, MockRemoteConfig},
    };
    use socialspark_common::model::{
        Id, Key,
        content::Content,
        like::LikeState,
        post::{CreatePost, PostMedia},
        user::{Session, User, UserHandle},
    };
    use std::{num::NonZeroU32, time::Duration};

    fn session(id: u64, handle: &str) -> Session {
        Session::new(User {
            id: Id::from(id),
            handle: UserHandle::new(handle.to_owned()).unwrap(),
            avatar: None,
        })
    }

    fn instant_remote() -> MockRemote {
        MockRemote::new(MockRemoteConfig {
            latency: Duration::ZERO,
            ..MockRemoteConfig::default()
        })
    }

    #[tokio::test]
    async fn like_is_idempotent_per_user() {
        let remote = instant_remote();
        let me = session(1, "me");
        let post_id = remote.seed_post(session(2, "other").user, Content::new("hi").unwrap(), 10);

        let liked = remote.like_post(&me, post_id).await.unwrap();
        assert_eq!(liked.likes, LikeState::new(11, true));
        let liked_again = remote.like_post(&me, post_id).await.unwrap();
        assert_eq!(liked_again.likes, LikeState::new(11, true));

        let unliked = remote.unlike_post(&me, post_id).await.unwrap();
        assert_eq!(unliked.likes, LikeState::new(10, false));
        let unliked_again = remote.unlike_post(&me, post_id).await.unwrap();
        assert_eq!(unliked_again.likes, LikeState::new(10, false));

        assert_eq!(remote.calls(), 4);
    }

    #[tokio::test]
    async fn liked_flag_is_per_user() {
        let remote = instant_remote();
        let me = session(1, "me");
        let post_id = remote.seed_post(me.user.clone(), Content::new("hi").unwrap(), 0);

        remote.like_post(&me, post_id).await.unwrap();
        let seen_by_other = remote.post(Id::from(2), post_id).unwrap();
        assert_eq!(seen_by_other.likes, LikeState::new(1, false));
    }

    #[tokio::test]
    async fn injected_failures_change_nothing() {
        let remote = instant_remote();
        let me = session(1, "me");
        remote.set_failure_injection(FailureInjection::Always);

        let result = remote
            .create_post(
                &me,
                CreatePost {
                    content: Content::new("lost").unwrap(),
                    media: PostMedia::default(),
                },
            )
            .await;
        assert!(matches!(result, Err(RemoteError::Rejected(_))));

        remote.set_failure_injection(FailureInjection::Never);
        let feed = remote
            .fetch_posts(&me, FeedPage::first(NonZeroU32::new(10).unwrap()))
            .await
            .unwrap();
        assert!(feed.is_empty());
    }

    #[tokio::test]
    async fn feed_pages_newest_first() {
        let remote = instant_remote();
        let me = session(1, "me");
        let ids: Vec<_> = ["a", "b", "c"]
            .into_iter()
            .map(|text| remote.seed_post(me.user.clone(), Content::new(text).unwrap(), 0))
            .collect();

        let page = |page| FeedPage {
            page: NonZeroU32::new(page).unwrap(),
            limit: NonZeroU32::new(2).unwrap(),
        };
        let first = remote.fetch_posts(&me, page(1)).await.unwrap();
        let second = remote.fetch_posts(&me, page(2)).await.unwrap();

        let keys: Vec<_> = first.iter().chain(&second).map(|post| post.id).collect();
        assert_eq!(
            keys,
            vec![Key::Confirmed(ids[2]), Key::Confirmed(ids[1]), Key::Confirmed(ids[0])]
        );
    }

    #[tokio::test]
    async fn unknown_entities_are_not_found() {
        let remote = instant_remote();
        let me = session(1, "me");

        assert!(matches!(
            remote.like_post(&me, Id::from(99)).await,
            Err(RemoteError::NotFound(_))
        ));
        assert!(matches!(
            remote.fetch_comments(&me, Id::from(99)).await,
            Err(RemoteError::NotFound(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn answers_after_latency() {
        let remote = MockRemote::new(MockRemoteConfig {
            latency: Duration::from_secs(2),
            ..MockRemoteConfig::default()
        });
        let me = session(1, "me");

        let started = tokio::time::Instant::now();
        remote
            .fetch_posts(&me, FeedPage::first(NonZeroU32::new(1).unwrap()))
            .await
            .unwrap();
        assert!(started.elapsed() >= Duration::from_secs(2));
    }
}
