use crate::{
    coordinator::{
        Coordinator, Pending,
        state::{Rollback, Undo},
    },
    error::{MutationError, Result},
    remote::Remote,
};
use socialspark_common::model::{
    Id, Key, comment::CommentMarker, post::PostMarker, user::Session,
};
use tracing::{debug, info, warn};

impl<R: Remote> Coordinator<R> {
    /// Takes a post and its comments out of the store.
    pub fn delete_post(
        &self,
        session: &Session,
        post_id: Id<PostMarker>,
    ) -> Result<PendingPostDeletion<R>> {
        let key = Key::Confirmed(post_id);
        let index = self
            .with_state(|state| state.detach_post(post_id))
            .ok_or(MutationError::PostNotFound(key))?;
        debug!(%post_id, index, "Removed post locally");

        Ok(PendingPostDeletion {
            rollback: Rollback::new(self.clone(), Undo::DeletePost(post_id)),
            session: session.clone(),
            post_id,
        })
    }

    /// Takes a comment out of the store and off its post's comment count.
    pub fn delete_comment(
        &self,
        session: &Session,
        comment_id: Id<CommentMarker>,
    ) -> Result<PendingCommentDeletion<R>> {
        let key = Key::Confirmed(comment_id);
        let index = self
            .with_state(|state| state.detach_comment(comment_id))
            .ok_or(MutationError::CommentNotFound(key))?;
        debug!(%comment_id, index, "Removed comment locally");

        Ok(PendingCommentDeletion {
            rollback: Rollback::new(self.clone(), Undo::DeleteComment(comment_id)),
            session: session.clone(),
            comment_id,
        })
    }
}

#[derive(Debug)]
pub struct PendingPostDeletion<R> {
    rollback: Rollback<R>,
    session: Session,
    post_id: Id<PostMarker>,
}

impl<R: Remote> Pending for PendingPostDeletion<R> {
    type Output = ();

    async fn settle(self) -> Result<()> {
        let PendingPostDeletion {
            mut rollback,
            session,
            post_id,
        } = self;
        let coordinator = rollback.coordinator().clone();

        let response = coordinator
            .call(coordinator.remote().delete_post(&session, post_id))
            .await;
        rollback.disarm();

        match response {
            Ok(()) => {
                coordinator.with_state(|state| state.forget_post(post_id));
                info!(%post_id, "Post deleted");
                Ok(())
            }
            Err(source) => {
                coordinator.with_state(|state| state.reattach_post(post_id));
                warn!(%post_id, error = %source, "Deleting post failed, restored post");

                let error = MutationError::Remote(source);
                coordinator.report(&error);
                Err(error)
            }
        }
    }
}

#[derive(Debug)]
pub struct PendingCommentDeletion<R> {
    rollback: Rollback<R>,
    session: Session,
    comment_id: Id<CommentMarker>,
}

impl<R: Remote> Pending for PendingCommentDeletion<R> {
    type Output = ();

    async fn settle(self) -> Result<()> {
        let PendingCommentDeletion {
            mut rollback,
            session,
            comment_id,
        } = self;
        let coordinator = rollback.coordinator().clone();

        let response = coordinator
            .call(coordinator.remote().delete_comment(&session, comment_id))
            .await;
        rollback.disarm();

        match response {
            Ok(()) => {
                coordinator.with_state(|state| state.forget_comment(comment_id));
                info!(%comment_id, "Comment deleted");
                Ok(())
            }
            Err(source) => {
                // Goes back into its post, or stays away if the post is gone.
                coordinator.with_state(|state| state.reattach_comment(comment_id));
                warn!(%comment_id, error = %source, "Deleting comment failed, restored comment");

                let error = MutationError::Remote(source);
                coordinator.report(&error);
                Err(error)
            }
        }
    }
}
