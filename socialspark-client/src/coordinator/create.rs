use crate::{
    coordinator::{
        Coordinator, Pending,
        state::{Rollback, Undo},
    },
    error::{MutationError, Result},
    remote::Remote,
};
use socialspark_common::model::{
    Id, Key,
    comment::{Comment, CommentMarker, CreateComment},
    content::Content,
    post::{CreatePost, Post, PostMarker, PostMedia},
    user::Session,
};
use time::UtcDateTime;
use tracing::{debug, info, warn};

impl<R: Remote> Coordinator<R> {
    /// Puts a provisional post on top of the feed.
    ///
    /// Returns `None` and does nothing else if `input` is blank.
    pub fn create_post(&self, session: &Session, input: &str) -> Option<PendingPost<R>> {
        self.create_post_with(session, input, PostMedia::default())
    }

    /// Like [`Coordinator::create_post`], with an image or location attached.
    pub fn create_post_with(
        &self,
        session: &Session,
        input: &str,
        media: PostMedia,
    ) -> Option<PendingPost<R>> {
        let Some(content) = Content::new(input) else {
            debug!("Ignoring blank post");
            return None;
        };

        let provisional = self.with_state(|state| {
            let post = Post::provisional(
                state.next_provisional_id(),
                session.user.clone(),
                content,
                media,
                UtcDateTime::now(),
            );
            state.store.insert_post_at_head(post.clone());
            post
        });
        debug!(key = %provisional.id, "Added provisional post");

        Some(PendingPost {
            rollback: Rollback::new(self.clone(), Undo::CreatePost(provisional.id)),
            session: session.clone(),
            input: input.to_owned(),
            provisional,
        })
    }

    /// Puts a provisional comment on top of a post's comments and counts it
    /// on the post.
    ///
    /// Returns `Ok(None)` and does nothing else if `input` is blank. Fails
    /// without contacting the remote if the post is not in the store.
    pub fn create_comment(
        &self,
        session: &Session,
        post_id: Id<PostMarker>,
        input: &str,
    ) -> Result<Option<PendingComment<R>>> {
        let Some(content) = Content::new(input) else {
            debug!(%post_id, "Ignoring blank comment");
            return Ok(None);
        };

        let provisional = self.with_state(|state| {
            let post_key = Key::Confirmed(post_id);
            if state.store.post(post_key).is_none() {
                return Err(MutationError::PostNotFound(post_key));
            }

            let comment = Comment::provisional(
                state.next_provisional_id(),
                post_id,
                session.user.clone(),
                content,
                UtcDateTime::now(),
            );
            state.store.insert_comment(comment.clone())?;
            Ok(comment)
        })?;
        debug!(key = %provisional.id, %post_id, "Added provisional comment");

        let undo = Undo::CreateComment {
            key: provisional.id,
            post_id,
        };
        Ok(Some(PendingComment {
            rollback: Rollback::new(self.clone(), undo),
            session: session.clone(),
            input: input.to_owned(),
            provisional,
        }))
    }
}

#[derive(Debug)]
pub struct PendingPost<R> {
    rollback: Rollback<R>,
    session: Session,
    input: String,
    provisional: Post,
}

impl<R> PendingPost<R> {
    #[must_use]
    pub fn key(&self) -> Key<PostMarker> {
        self.provisional.id
    }

    /// The post as it was put into the feed.
    #[must_use]
    pub fn provisional(&self) -> &Post {
        &self.provisional
    }
}

impl<R: Remote> Pending for PendingPost<R> {
    type Output = Post;

    async fn settle(self) -> Result<Post> {
        let PendingPost {
            mut rollback,
            session,
            input,
            provisional,
        } = self;
        let coordinator = rollback.coordinator().clone();
        let key = provisional.id;

        let request = CreatePost {
            content: provisional.content,
            media: provisional.media,
        };
        let response = coordinator
            .call(coordinator.remote().create_post(&session, request))
            .await;
        rollback.disarm();

        match response {
            Ok(post) => {
                let replaced =
                    coordinator.with_state(|state| state.store.replace_post(key, post.clone()));
                info!(%key, id = %post.id, replaced, "Post created");
                Ok(post)
            }
            Err(source) => {
                coordinator.with_state(|state| state.store.remove_post(key));
                warn!(%key, error = %source, "Creating post failed, removed provisional post");

                let error = MutationError::CreateRolledBack { input, source };
                coordinator.report(&error);
                Err(error)
            }
        }
    }
}

#[derive(Debug)]
pub struct PendingComment<R> {
    rollback: Rollback<R>,
    session: Session,
    input: String,
    provisional: Comment,
}

impl<R> PendingComment<R> {
    #[must_use]
    pub fn key(&self) -> Key<CommentMarker> {
        self.provisional.id
    }

    /// The comment as it was put on top of its post's comments.
    #[must_use]
    pub fn provisional(&self) -> &Comment {
        &self.provisional
    }
}

impl<R: Remote> Pending for PendingComment<R> {
    type Output = Comment;

    async fn settle(self) -> Result<Comment> {
        let PendingComment {
            mut rollback,
            session,
            input,
            provisional,
        } = self;
        let coordinator = rollback.coordinator().clone();
        let key = provisional.id;
        let post_id = provisional.post_id;

        let request = CreateComment {
            post_id,
            content: provisional.content,
        };
        let response = coordinator
            .call(coordinator.remote().create_comment(&session, request))
            .await;
        rollback.disarm();

        match response {
            Ok(comment) => {
                let replaced =
                    coordinator.with_state(|state| state.confirm_comment(key, comment.clone()));
                info!(%key, id = %comment.id, %post_id, replaced, "Comment created");
                Ok(comment)
            }
            Err(source) => {
                // Also takes the comment off the post's count.
                coordinator.with_state(|state| state.drop_comment(key, post_id));
                warn!(%key, %post_id, error = %source, "Creating comment failed, removed provisional comment");

                let error = MutationError::CreateRolledBack { input, source };
                coordinator.report(&error);
                Err(error)
            }
        }
    }
}
