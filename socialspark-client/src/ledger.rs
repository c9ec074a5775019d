//! Bookkeeping for like toggles that are waiting for the server.
//!
//! Every toggle of an entity gets a new [`Generation`]. Toggles on the same
//! entity pass through a shared gate one at a time, and whichever toggle holds
//! the gate moves the server towards the most recent intent of the user. Only
//! the latest generation may write its result into the store; answers to older
//! generations only update what is known about the server.

use socialspark_common::model::{
    Id, comment::CommentMarker, like::LikeState, post::PostMarker,
};
use std::{
    collections::HashMap,
    fmt::{Display, Formatter},
    sync::Arc,
};
use tokio::sync::Mutex;

/// An entity that can be liked.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum LikeTarget {
    Post(Id<PostMarker>),
    Comment(Id<CommentMarker>),
}

impl Display for LikeTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LikeTarget::Post(id) => write!(f, "post {id}"),
            LikeTarget::Comment(id) => write!(f, "comment {id}"),
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct Generation(u64);

impl Display for Generation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// Handed to a toggle when it starts, needed to resolve it later.
#[derive(Clone, Debug)]
pub struct LikeTicket {
    pub target: LikeTarget,
    pub generation: Generation,
    pub gate: Arc<Mutex<()>>,
}

/// What the holder of the gate has to ask the server for.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum LikePlan {
    /// The server already matches the latest intent.
    Settled(LikeState),
    Like,
    Unlike,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Resolution {
    pub is_latest: bool,
    /// What the store has to show now. Only set for the latest generation.
    pub visible: Option<LikeState>,
}

#[derive(Debug)]
struct LikeSync {
    latest: Generation,
    intent: bool,
    /// Last like state the server is known to have.
    confirmed: LikeState,
    pending: usize,
    gate: Arc<Mutex<()>>,
}

#[derive(Debug, Default)]
pub struct LikeLedger {
    next_generation: u64,
    entries: HashMap<LikeTarget, LikeSync>,
}

impl LikeLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a toggle of `target` is waiting for the server.
    #[must_use]
    pub fn is_pending(&self, target: LikeTarget) -> bool {
        self.entries.contains_key(&target)
    }

    /// Records a toggle of `target` from `before` to `after`.
    ///
    /// `before` is taken as the server's state unless other toggles of the
    /// same target are still pending, in which case their knowledge wins.
    pub fn begin(&mut self, target: LikeTarget, before: LikeState, after: LikeState) -> LikeTicket {
        self.next_generation += 1;
        let generation = Generation(self.next_generation);

        let entry = self.entries.entry(target).or_insert_with(|| LikeSync {
            latest: generation,
            intent: after.liked,
            confirmed: before,
            pending: 0,
            gate: Arc::default(),
        });
        entry.latest = generation;
        entry.intent = after.liked;
        entry.pending += 1;

        LikeTicket {
            target,
            generation,
            gate: Arc::clone(&entry.gate),
        }
    }

    /// Decides the request needed to bring the server in line with the most
    /// recent intent. Never asks to like something liked or to unlike
    /// something not liked.
    #[must_use]
    pub fn plan(&self, target: LikeTarget) -> Option<LikePlan> {
        let entry = self.entries.get(&target)?;

        Some(match (entry.confirmed.liked, entry.intent) {
            (current, wanted) if current == wanted => LikePlan::Settled(entry.confirmed),
            (_, true) => LikePlan::Like,
            (_, false) => LikePlan::Unlike,
        })
    }

    /// Finishes one toggle. `response` is the server's like state if the
    /// request went through, `None` if it failed.
    pub fn resolve(
        &mut self,
        target: LikeTarget,
        generation: Generation,
        response: Option<LikeState>,
    ) -> Resolution {
        let Some(entry) = self.entries.get_mut(&target) else {
            return Resolution {
                is_latest: false,
                visible: None,
            };
        };

        if let Some(response) = response {
            entry.confirmed = response;
        }
        entry.pending = entry.pending.saturating_sub(1);

        let is_latest = entry.latest == generation;
        let visible = if is_latest {
            // The user's intent is settled either way; a failed toggle is undone.
            entry.intent = entry.confirmed.liked;
            Some(entry.confirmed)
        } else {
            None
        };

        if entry.pending == 0 {
            self.entries.remove(&target);
        }

        Resolution { is_latest, visible }
    }
}
