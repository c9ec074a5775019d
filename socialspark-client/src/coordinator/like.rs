use crate::{
    coordinator::{
        Coordinator, Pending,
        state::{Rollback, Undo, like_state_mut},
    },
    error::{MutationError, Result},
    ledger::{LikePlan, LikeTarget, LikeTicket},
    remote::{Remote, RemoteResult},
};
use socialspark_common::model::{
    Id, Key, comment::CommentMarker, like::LikeState, post::PostMarker, user::Session,
};
use tracing::{debug, info, warn};

/// How a like toggle ended, if it did not fail.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum LikeSettlement {
    /// The store now shows the server's like state.
    Applied(LikeState),
    /// A newer toggle of the same entity took over; the store was left alone.
    Superseded,
}

impl<R: Remote> Coordinator<R> {
    /// Flips the current user's like on a post.
    pub fn toggle_post_like(
        &self,
        session: &Session,
        post_id: Id<PostMarker>,
    ) -> Result<PendingLike<R>> {
        self.toggle_like(session, LikeTarget::Post(post_id))
    }

    /// Flips the current user's like on a comment.
    pub fn toggle_comment_like(
        &self,
        session: &Session,
        comment_id: Id<CommentMarker>,
    ) -> Result<PendingLike<R>> {
        self.toggle_like(session, LikeTarget::Comment(comment_id))
    }

    fn toggle_like(&self, session: &Session, target: LikeTarget) -> Result<PendingLike<R>> {
        let (ticket, shown) = self.with_state(|state| {
            let likes = like_state_mut(&mut state.store, target).ok_or(match target {
                LikeTarget::Post(id) => MutationError::PostNotFound(Key::Confirmed(id)),
                LikeTarget::Comment(id) => MutationError::CommentNotFound(Key::Confirmed(id)),
            })?;

            // Count and flag change in one step.
            let before = *likes;
            let after = before.toggled();
            *likes = after;

            Ok::<_, MutationError>((state.ledger.begin(target, before, after), after))
        })?;
        debug!(%target, generation = %ticket.generation, ?shown, "Toggled like locally");

        let undo = Undo::ToggleLike {
            target,
            generation: ticket.generation,
        };
        Ok(PendingLike {
            rollback: Rollback::new(self.clone(), undo),
            session: session.clone(),
            ticket,
            shown,
        })
    }

    async fn send_like(
        &self,
        session: &Session,
        target: LikeTarget,
        liked: bool,
    ) -> RemoteResult<LikeState> {
        let remote = self.remote();
        let likes = match (target, liked) {
            (LikeTarget::Post(id), true) => self.call(remote.like_post(session, id)).await?.likes,
            (LikeTarget::Post(id), false) => {
                self.call(remote.unlike_post(session, id)).await?.likes
            }
            (LikeTarget::Comment(id), true) => {
                self.call(remote.like_comment(session, id)).await?.likes
            }
            (LikeTarget::Comment(id), false) => {
                self.call(remote.unlike_comment(session, id)).await?.likes
            }
        };
        Ok(likes)
    }
}

#[derive(Debug)]
pub struct PendingLike<R> {
    rollback: Rollback<R>,
    session: Session,
    ticket: LikeTicket,
    shown: LikeState,
}

impl<R> PendingLike<R> {
    #[must_use]
    pub fn target(&self) -> LikeTarget {
        self.ticket.target
    }

    /// The like state shown right after the toggle.
    #[must_use]
    pub fn shown(&self) -> LikeState {
        self.shown
    }
}

impl<R: Remote> Pending for PendingLike<R> {
    type Output = LikeSettlement;

    async fn settle(self) -> Result<LikeSettlement> {
        let PendingLike {
            mut rollback,
            session,
            ticket,
            ..
        } = self;
        let coordinator = rollback.coordinator().clone();
        let LikeTicket {
            target,
            generation,
            gate,
        } = ticket;

        // Toggles of one entity reach the server one after another.
        let _turn = gate.lock().await;

        let plan = coordinator.with_state(|state| state.ledger.plan(target));
        let response = match plan {
            None => {
                rollback.disarm();
                debug!(%target, %generation, "Toggle was already resolved");
                return Ok(LikeSettlement::Superseded);
            }
            Some(LikePlan::Settled(confirmed)) => {
                debug!(%target, %generation, "Server already matches the latest intent");
                Ok(confirmed)
            }
            Some(LikePlan::Like) => coordinator.send_like(&session, target, true).await,
            Some(LikePlan::Unlike) => coordinator.send_like(&session, target, false).await,
        };

        rollback.disarm();
        let resolution = coordinator.with_state(|state| {
            state.resolve_like(target, generation, response.as_ref().ok().copied())
        });

        match (response, resolution.is_latest) {
            (Ok(likes), true) => {
                info!(%target, %generation, ?likes, "Like state confirmed");
                Ok(LikeSettlement::Applied(likes))
            }
            (Ok(_), false) => {
                debug!(%target, %generation, "Discarding answer to a superseded toggle");
                Ok(LikeSettlement::Superseded)
            }
            (Err(source), true) => {
                warn!(
                    %target,
                    %generation,
                    error = %source,
                    restored = ?resolution.visible,
                    "Toggling like failed, restored like state"
                );
                let error = MutationError::Remote(source);
                coordinator.report(&error);
                Err(error)
            }
            (Err(source), false) => {
                debug!(%target, %generation, error = %source, "Superseded toggle failed");
                Ok(LikeSettlement::Superseded)
            }
        }
    }
}
