//! Optimistic mutations of a social feed.
//!
//! The [`Coordinator`] applies create, like and delete actions to an in-memory
//! [`EntityStore`](socialspark_store::store::EntityStore) right away, then asks
//! a [`Remote`] to carry them out and reconciles the store with the answer or
//! rolls the action back.

pub mod coordinator;
pub mod error;
pub mod ledger;
pub mod notice;
pub mod remote;

pub use coordinator::{Coordinator, CoordinatorConfig, Pending};
pub use error::MutationError;
pub use remote::{FeedPage, Remote, RemoteError, mock::MockRemote};
