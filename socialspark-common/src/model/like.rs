use serde::{Deserialize, Serialize};

/// Like counter of a post or comment as seen by the current user.
///
/// `liked` implies that the current user is part of `count`, so `count` is at
/// least one whenever `liked` is set.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Deserialize, Serialize)]
pub struct LikeState {
    pub count: u64,
    pub liked: bool,
}

impl LikeState {
    #[must_use]
    pub fn new(count: u64, liked: bool) -> Self {
        Self {
            count: count.max(u64::from(liked)),
            liked,
        }
    }

    /// The state after the current user flips their like.
    #[must_use]
    pub fn toggled(self) -> Self {
        if self.liked {
            Self {
                count: self.count.saturating_sub(1),
                liked: false,
            }
        } else {
            Self {
                count: self.count + 1,
                liked: true,
            }
        }
    }

    /// The state the current user reaches by setting their like to `liked`.
    #[must_use]
    pub fn with_liked(self, liked: bool) -> Self {
        if self.liked == liked {
            self
        } else {
            self.toggled()
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::model::like::LikeState;

    #[test]
    fn toggle_is_its_own_inverse() {
        let state = LikeState::new(10, false);
        assert_eq!(state.toggled(), LikeState::new(11, true));
        assert_eq!(state.toggled().toggled(), state);
    }

    #[test]
    fn liked_state_counts_the_user() {
        assert_eq!(LikeState::new(0, true), LikeState { count: 1, liked: true });
        assert_eq!(LikeState::new(0, true).toggled(), LikeState::new(0, false));
    }

    #[test]
    fn with_liked_is_idempotent() {
        let liked = LikeState::new(4, true);
        assert_eq!(liked.with_liked(true), liked);
        assert_eq!(liked.with_liked(false), LikeState::new(3, false));
    }
}
