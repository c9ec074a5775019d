use crate::{
    coordinator::Coordinator,
    ledger::{Generation, LikeLedger, LikeTarget, Resolution},
};
use socialspark_common::model::{
    Id, Key, ProvisionalId,
    comment::{Comment, CommentMarker},
    like::LikeState,
    post::PostMarker,
};
use socialspark_store::store::{EntityStore, RemovedComment, RemovedPost};
use std::collections::HashMap;
use tracing::debug;

/// Like state of an entity the user can currently see.
pub(super) fn like_state_mut(store: &mut EntityStore, target: LikeTarget) -> Option<&mut LikeState> {
    match target {
        LikeTarget::Post(id) => store.post_mut(Key::Confirmed(id)).map(|post| &mut post.likes),
        LikeTarget::Comment(id) => store
            .comment_mut(Key::Confirmed(id))
            .map(|comment| &mut comment.likes),
    }
}

/// Everything that has to change together. Held only between awaits.
///
/// Entities removed by a deletion that the server has not confirmed yet are
/// parked here instead of in the store. Answers for them that arrive in the
/// meantime are applied to the parked copy, so a failed deletion brings back
/// what the server has and not what the user saw when deleting.
#[derive(Debug, Default)]
pub(super) struct Shared {
    pub(super) store: EntityStore,
    pub(super) ledger: LikeLedger,
    next_provisional: u64,
    detached_posts: HashMap<Id<PostMarker>, RemovedPost>,
    detached_comments: HashMap<Id<CommentMarker>, RemovedComment>,
}

impl Shared {
    pub(super) fn next_provisional_id<Marker>(&mut self) -> ProvisionalId<Marker> {
        self.next_provisional += 1;
        ProvisionalId::new(self.next_provisional)
    }

    /// Like state of an entity, parked ones included.
    fn likes_mut(&mut self, target: LikeTarget) -> Option<&mut LikeState> {
        match target {
            LikeTarget::Post(id) => {
                if self.store.post(Key::Confirmed(id)).is_some() {
                    return like_state_mut(&mut self.store, target);
                }
                self.detached_posts
                    .get_mut(&id)
                    .map(|removed| &mut removed.post.likes)
            }
            LikeTarget::Comment(id) => {
                let key = Key::Confirmed(id);
                if self.store.comment(key).is_some() {
                    return like_state_mut(&mut self.store, target);
                }
                if self.detached_comments.contains_key(&id) {
                    return self
                        .detached_comments
                        .get_mut(&id)
                        .map(|removed| &mut removed.comment.likes);
                }
                self.detached_posts
                    .values_mut()
                    .flat_map(|removed| removed.comments.iter_mut())
                    .find(|comment| comment.id == key)
                    .map(|comment| &mut comment.likes)
            }
        }
    }

    /// Finishes one like toggle and writes what the ledger decides to show.
    pub(super) fn resolve_like(
        &mut self,
        target: LikeTarget,
        generation: Generation,
        response: Option<LikeState>,
    ) -> Resolution {
        let resolution = self.ledger.resolve(target, generation, response);
        if let Some(visible) = resolution.visible {
            match self.likes_mut(target) {
                Some(likes) => *likes = visible,
                None => debug!(%target, %generation, "Liked entity is gone"),
            }
        }
        resolution
    }

    /// Puts the server's version of a provisional comment where the
    /// provisional one is now, even if its post is parked. Returns `false` if
    /// the provisional comment is gone.
    pub(super) fn confirm_comment(&mut self, key: Key<CommentMarker>, comment: Comment) -> bool {
        if self.store.comment(key).is_some() {
            return self.store.replace_comment(key, comment);
        }

        let Some(removed) = self.detached_posts.get_mut(&comment.post_id) else {
            return false;
        };
        let Some(index) = removed.comments.iter().position(|parked| parked.id == key) else {
            return false;
        };
        if removed.comments.iter().any(|parked| parked.id == comment.id) {
            removed.comments.remove(index);
            removed.post.comment_count = removed.post.comment_count.saturating_sub(1);
        } else {
            removed.comments[index] = comment;
        }
        true
    }

    /// Takes a provisional comment back out together with its share of the
    /// post's comment count, even if its post is parked.
    pub(super) fn drop_comment(&mut self, key: Key<CommentMarker>, post_id: Id<PostMarker>) -> bool {
        if self.store.remove_comment(key).is_some() {
            return true;
        }

        let Some(removed) = self.detached_posts.get_mut(&post_id) else {
            return false;
        };
        let Some(index) = removed.comments.iter().position(|parked| parked.id == key) else {
            return false;
        };
        removed.comments.remove(index);
        removed.post.comment_count = removed.post.comment_count.saturating_sub(1);
        true
    }

    /// Moves a post and its comments out of the store until the deletion is
    /// settled. Returns the post's former feed position.
    pub(super) fn detach_post(&mut self, post_id: Id<PostMarker>) -> Option<usize> {
        let removed = self.store.remove_post(Key::Confirmed(post_id))?;
        let index = removed.index;
        // A second deletion of a reloaded post shares the first one's snapshot.
        self.detached_posts.entry(post_id).or_insert(removed);
        Some(index)
    }

    pub(super) fn forget_post(&mut self, post_id: Id<PostMarker>) {
        self.detached_posts.remove(&post_id);
    }

    pub(super) fn reattach_post(&mut self, post_id: Id<PostMarker>) {
        match self.detached_posts.remove(&post_id) {
            Some(removed) => self.store.restore_post(removed),
            None => debug!(%post_id, "Post to restore was already restored"),
        }
    }

    pub(super) fn detach_comment(&mut self, comment_id: Id<CommentMarker>) -> Option<usize> {
        let removed = self.store.remove_comment(Key::Confirmed(comment_id))?;
        let index = removed.index;
        self.detached_comments.entry(comment_id).or_insert(removed);
        Some(index)
    }

    pub(super) fn forget_comment(&mut self, comment_id: Id<CommentMarker>) {
        self.detached_comments.remove(&comment_id);
    }

    /// Puts a parked comment back, into its parked post if that is where the
    /// post is now.
    pub(super) fn reattach_comment(&mut self, comment_id: Id<CommentMarker>) {
        let Some(removed) = self.detached_comments.remove(&comment_id) else {
            debug!(%comment_id, "Comment to restore was already restored");
            return;
        };
        let post_id = removed.comment.post_id;

        if let Some(parked) = self.detached_posts.get_mut(&post_id) {
            let index = removed.index.min(parked.comments.len());
            parked.comments.insert(index, removed.comment);
            parked.post.comment_count += 1;
        } else if let Err(err) = self.store.restore_comment(removed) {
            debug!(%comment_id, %post_id, error = %err, "Comment could not be restored");
        }
    }

    fn undo(&mut self, undo: Undo) {
        match undo {
            Undo::CreatePost(key) => {
                self.store.remove_post(key);
            }
            Undo::CreateComment { key, post_id } => {
                self.drop_comment(key, post_id);
            }
            Undo::ToggleLike { target, generation } => {
                self.resolve_like(target, generation, None);
            }
            Undo::DeletePost(post_id) => self.reattach_post(post_id),
            Undo::DeleteComment(comment_id) => self.reattach_comment(comment_id),
        }
    }
}

/// The local change a mutation made before contacting the remote.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub(super) enum Undo {
    CreatePost(Key<PostMarker>),
    CreateComment {
        key: Key<CommentMarker>,
        post_id: Id<PostMarker>,
    },
    ToggleLike {
        target: LikeTarget,
        generation: Generation,
    },
    DeletePost(Id<PostMarker>),
    DeleteComment(Id<CommentMarker>),
}

/// Takes back a mutation's local change when dropped, unless disarmed first.
///
/// Every pending mutation carries one, so dropping it or aborting the task
/// that settles it leaves the store as if the remote had refused.
#[derive(Debug)]
pub(super) struct Rollback<R> {
    coordinator: Coordinator<R>,
    undo: Option<Undo>,
}

impl<R> Rollback<R> {
    pub(super) fn new(coordinator: Coordinator<R>, undo: Undo) -> Self {
        Self {
            coordinator,
            undo: Some(undo),
        }
    }

    pub(super) fn coordinator(&self) -> &Coordinator<R> {
        &self.coordinator
    }

    /// Leaves the local change alone. The caller reconciles it from now on.
    pub(super) fn disarm(&mut self) {
        self.undo = None;
    }
}

impl<R> Drop for Rollback<R> {
    fn drop(&mut self) {
        if let Some(undo) = self.undo.take() {
            debug!(?undo, "Mutation was abandoned, taking back its local change");
            self.coordinator.with_state(|state| state.undo(undo));
        }
    }
}
