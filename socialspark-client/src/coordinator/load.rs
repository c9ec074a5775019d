use crate::{
    coordinator::{Coordinator, state::like_state_mut},
    error::{MutationError, Result},
    ledger::LikeTarget,
    remote::{FeedPage, Remote},
};
use socialspark_common::model::{Id, Key, post::PostMarker, user::Session};
use tracing::{info, warn};

impl<R: Remote> Coordinator<R> {
    /// Fetches a page of the feed and merges it into the store.
    ///
    /// The first page replaces the confirmed posts, later pages are appended.
    /// Entities with a like toggle in flight keep their local like state.
    /// Returns how many posts the server sent.
    pub async fn load_feed(&self, session: &Session, page: FeedPage) -> Result<usize> {
        let response = self.call(self.remote().fetch_posts(session, page)).await;

        let mut posts = match response {
            Ok(posts) => posts,
            Err(source) => {
                warn!(page = page.page.get(), error = %source, "Loading feed failed");
                let error = MutationError::Remote(source);
                self.report(&error);
                return Err(error);
            }
        };
        let fetched = posts.len();

        self.with_state(|state| {
            for post in &mut posts {
                let Some(post_id) = post.id.confirmed() else {
                    continue;
                };
                let target = LikeTarget::Post(post_id);
                if state.ledger.is_pending(target)
                    && let Some(likes) = like_state_mut(&mut state.store, target)
                {
                    post.likes = *likes;
                }
            }
            state.store.merge_feed(posts, page.is_first());
        });
        info!(page = page.page.get(), fetched, "Loaded feed");

        Ok(fetched)
    }

    /// Fetches all comments of a post and puts them into the store.
    pub async fn load_comments(&self, session: &Session, post_id: Id<PostMarker>) -> Result<usize> {
        let post_key = Key::Confirmed(post_id);
        if self.post(post_key).is_none() {
            return Err(MutationError::PostNotFound(post_key));
        }

        let response = self.call(self.remote().fetch_comments(session, post_id)).await;

        let mut comments = match response {
            Ok(comments) => comments,
            Err(source) => {
                warn!(%post_id, error = %source, "Loading comments failed");
                let error = MutationError::Remote(source);
                self.report(&error);
                return Err(error);
            }
        };
        let fetched = comments.len();

        self.with_state(|state| {
            for comment in &mut comments {
                let Some(comment_id) = comment.id.confirmed() else {
                    continue;
                };
                let target = LikeTarget::Comment(comment_id);
                if state.ledger.is_pending(target)
                    && let Some(likes) = like_state_mut(&mut state.store, target)
                {
                    comment.likes = *likes;
                }
            }
            state.store.set_comments(post_id, comments)
        })?;
        info!(%post_id, fetched, "Loaded comments");

        Ok(fetched)
    }
}
