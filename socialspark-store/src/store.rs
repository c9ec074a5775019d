use crate::multimap::OrderedMultimap;
use socialspark_common::model::{
    Id, Key,
    comment::{Comment, CommentMarker},
    post::{Post, PostMarker},
};
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum StoreError {
    #[error("Post {0} is not in the store")]
    PostNotFound(Key<PostMarker>),
    #[error("Comment {0} is already in the store")]
    DuplicateComment(Key<CommentMarker>),
}

/// A post taken out of the feed together with everything needed to put it
/// back where it was.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct RemovedPost {
    pub index: usize,
    pub post: Post,
    pub comments: Vec<Comment>,
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct RemovedComment {
    pub index: usize,
    pub comment: Comment,
}

/// In-memory posts and comments of one session.
///
/// Posts are kept in feed order, newest first. Comments are grouped by the
/// post they belong to, also newest first, and every comment's post is in the
/// store. Entities are always located by key, never by a remembered index.
#[derive(Clone, Debug, Default)]
pub struct EntityStore {
    posts: Vec<Post>,
    comments: OrderedMultimap<Id<PostMarker>, Comment>,
    comment_owners: HashMap<Key<CommentMarker>, Id<PostMarker>>,
}

impl EntityStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    fn post_index(&self, key: Key<PostMarker>) -> Option<usize> {
        self.posts.iter().position(|post| post.id == key)
    }

    #[must_use]
    pub fn post(&self, key: Key<PostMarker>) -> Option<&Post> {
        self.posts.iter().find(|post| post.id == key)
    }

    pub fn post_mut(&mut self, key: Key<PostMarker>) -> Option<&mut Post> {
        self.posts.iter_mut().find(|post| post.id == key)
    }

    pub fn insert_post_at_head(&mut self, post: Post) {
        self.posts.insert(0, post);
    }

    /// Swaps the post stored under `key` for `post`, keeping its feed position.
    /// Returns `false` without touching anything if `key` is gone.
    ///
    /// If `post` has already been loaded under its own key, the entry under
    /// `key` is dropped instead and the loaded one stays where it is.
    pub fn replace_post(&mut self, key: Key<PostMarker>, post: Post) -> bool {
        let Some(index) = self.post_index(key) else {
            debug!(%key, "Post to replace is no longer in the store");
            return false;
        };

        if post.id != key && self.post_index(post.id).is_some() {
            debug!(%key, id = %post.id, "Post was loaded already, dropping its placeholder");
            self.posts.remove(index);
            return true;
        }

        self.posts[index] = post;
        true
    }

    /// Removes a post and all of its comments.
    pub fn remove_post(&mut self, key: Key<PostMarker>) -> Option<RemovedPost> {
        let index = self.post_index(key)?;
        let post = self.posts.remove(index);

        let comments = match key.confirmed() {
            Some(post_id) => self.comments.take(&post_id),
            None => Vec::new(),
        };
        for comment in &comments {
            self.comment_owners.remove(&comment.id);
        }

        Some(RemovedPost {
            index,
            post,
            comments,
        })
    }

    /// Puts a removed post back at its old position, or at the end of the feed
    /// if the feed has shrunk since. A post that has reappeared in the meantime
    /// is left alone.
    pub fn restore_post(&mut self, removed: RemovedPost) {
        let RemovedPost {
            index,
            post,
            comments,
        } = removed;

        if self.post_index(post.id).is_some() {
            debug!(key = %post.id, "Post to restore is already back in the store");
            return;
        }

        if let Some(post_id) = post.id.confirmed() {
            for comment in &comments {
                self.comment_owners.insert(comment.id, post_id);
            }
            self.comments.set(post_id, comments);
        }
        self.posts.insert(index.min(self.posts.len()), post);
    }

    /// Applies a page of posts fetched from the server, newest first.
    ///
    /// With `replace` the confirmed part of the feed is swapped for `fetched`
    /// while provisional posts stay on top. Otherwise posts that are not in the
    /// feed yet are appended. Comment counts include provisional comments that
    /// are still waiting for the server.
    pub fn merge_feed(&mut self, fetched: Vec<Post>, replace: bool) {
        let mut fetched = fetched;
        for post in &mut fetched {
            if let Some(post_id) = post.id.confirmed() {
                post.comment_count += self.provisional_comment_count(post_id);
            }
        }

        if replace {
            let removed: Vec<Id<PostMarker>> = self
                .posts
                .iter()
                .filter_map(|post| post.id.confirmed())
                .filter(|post_id| !fetched.iter().any(|post| post.id == Key::Confirmed(*post_id)))
                .collect();
            for post_id in removed {
                for comment in self.comments.take(&post_id) {
                    self.comment_owners.remove(&comment.id);
                }
            }

            self.posts.retain(|post| post.id.is_provisional());
            self.posts.extend(fetched);
        } else {
            for post in fetched {
                if self.post_index(post.id).is_none() {
                    self.posts.push(post);
                }
            }
        }
    }

    fn provisional_comment_count(&self, post_id: Id<PostMarker>) -> u64 {
        let count = self
            .comments
            .get(&post_id)
            .iter()
            .filter(|comment| comment.id.is_provisional())
            .count();
        count as u64
    }

    #[must_use]
    pub fn comments(&self, post_id: Id<PostMarker>) -> &[Comment] {
        self.comments.get(&post_id)
    }

    #[must_use]
    pub fn comment(&self, key: Key<CommentMarker>) -> Option<&Comment> {
        let post_id = self.comment_owners.get(&key)?;
        self.comments
            .get(post_id)
            .iter()
            .find(|comment| comment.id == key)
    }

    pub fn comment_mut(&mut self, key: Key<CommentMarker>) -> Option<&mut Comment> {
        let post_id = *self.comment_owners.get(&key)?;
        self.comments.find_mut(&post_id, |comment| comment.id == key)
    }

    /// Adds a comment on top of its post's comments and bumps the post's
    /// comment count in the same step.
    pub fn insert_comment(&mut self, comment: Comment) -> Result<()> {
        self.insert_comment_at(0, comment)
    }

    fn insert_comment_at(&mut self, index: usize, comment: Comment) -> Result<()> {
        if self.comment_owners.contains_key(&comment.id) {
            return Err(StoreError::DuplicateComment(comment.id));
        }

        let post_key = Key::Confirmed(comment.post_id);
        let post = self
            .post_mut(post_key)
            .ok_or(StoreError::PostNotFound(post_key))?;
        post.comment_count += 1;

        self.comment_owners.insert(comment.id, comment.post_id);
        self.comments.insert_at(comment.post_id, index, comment);
        Ok(())
    }

    /// Swaps the comment stored under `key` for `comment` in place. Returns
    /// `false` without touching anything if `key` is gone.
    ///
    /// If `comment` has already been loaded under its own key, the entry under
    /// `key` is removed instead, together with its share of the comment count.
    pub fn replace_comment(&mut self, key: Key<CommentMarker>, comment: Comment) -> bool {
        let Some(&post_id) = self.comment_owners.get(&key) else {
            debug!(%key, "Comment to replace is no longer in the store");
            return false;
        };

        if comment.id != key && self.comment_owners.contains_key(&comment.id) {
            debug!(%key, id = %comment.id, "Comment was loaded already, dropping its placeholder");
            return self.remove_comment(key).is_some();
        }

        let new_key = comment.id;
        if self
            .comments
            .replace_where(&post_id, |existing| existing.id == key, comment)
            .is_none()
        {
            return false;
        }

        self.comment_owners.remove(&key);
        self.comment_owners.insert(new_key, post_id);
        true
    }

    /// Removes a comment and lowers its post's comment count in the same step.
    pub fn remove_comment(&mut self, key: Key<CommentMarker>) -> Option<RemovedComment> {
        let post_id = self.comment_owners.remove(&key)?;
        let (index, comment) = self
            .comments
            .remove_where(&post_id, |comment| comment.id == key)?;

        if let Some(post) = self.post_mut(Key::Confirmed(post_id)) {
            post.comment_count = post.comment_count.saturating_sub(1);
        }

        Some(RemovedComment { index, comment })
    }

    /// Exact inverse of [`EntityStore::remove_comment`].
    pub fn restore_comment(&mut self, removed: RemovedComment) -> Result<()> {
        self.insert_comment_at(removed.index, removed.comment)
    }

    /// Applies the full comment list of a post fetched from the server, newest
    /// first. Provisional comments stay on top and the post's comment count is
    /// set to what is now listed.
    pub fn set_comments(&mut self, post_id: Id<PostMarker>, fetched: Vec<Comment>) -> Result<()> {
        let post_key = Key::Confirmed(post_id);
        if self.post_index(post_key).is_none() {
            return Err(StoreError::PostNotFound(post_key));
        }

        let (mut comments, confirmed): (Vec<Comment>, Vec<Comment>) = self
            .comments
            .take(&post_id)
            .into_iter()
            .partition(|comment| comment.id.is_provisional());
        for comment in &confirmed {
            self.comment_owners.remove(&comment.id);
        }

        comments.extend(fetched);
        for comment in &comments {
            self.comment_owners.insert(comment.id, post_id);
        }

        let count = comments.len() as u64;
        self.comments.set(post_id, comments);
        if let Some(post) = self.post_mut(post_key) {
            post.comment_count = count;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::store::{EntityStore, StoreError};
    use socialspark_common::model::{
        Id, Key, ProvisionalId,
        comment::{Comment, CommentMarker},
        content::Content,
        like::LikeState,
        post::{Post, PostMarker, PostMedia},
        user::{User, UserHandle},
    };
    use time::macros::utc_datetime;

    fn author() -> User {
        User {
            id: Id::from(1),
            handle: UserHandle::new("author".to_owned()).unwrap(),
            avatar: None,
        }
    }

    fn post(key: Key<PostMarker>, text: &str) -> Post {
        Post {
            id: key,
            author: author(),
            content: Content::new(text).unwrap(),
            likes: LikeState::default(),
            comment_count: 0,
            media: PostMedia::default(),
            created_at: utc_datetime!(2025-06-01 12:00),
            updated_at: None,
        }
    }

    fn comment(key: Key<CommentMarker>, post_id: u64, text: &str) -> Comment {
        Comment {
            id: key,
            post_id: Id::from(post_id),
            author: author(),
            content: Content::new(text).unwrap(),
            likes: LikeState::default(),
            created_at: utc_datetime!(2025-06-01 12:30),
            updated_at: None,
        }
    }

    fn confirmed<M>(id: u64) -> Key<M> {
        Key::Confirmed(Id::from(id))
    }

    fn provisional<M>(id: u64) -> Key<M> {
        Key::Provisional(ProvisionalId::new(id))
    }

    fn feed_keys(store: &EntityStore) -> Vec<Key<PostMarker>> {
        store.posts().iter().map(|post| post.id).collect()
    }

    fn store_with_feed() -> EntityStore {
        let mut store = EntityStore::new();
        store.merge_feed(
            vec![
                post(confirmed(3), "a"),
                post(confirmed(2), "b"),
                post(confirmed(1), "c"),
            ],
            true,
        );
        store
    }

    #[test]
    fn replace_post_keeps_position() {
        let mut store = store_with_feed();
        store.insert_post_at_head(post(provisional(1), "hello"));

        assert!(store.replace_post(provisional(1), post(confirmed(4), "hello")));
        assert_eq!(
            feed_keys(&store),
            vec![confirmed(4), confirmed(3), confirmed(2), confirmed(1)]
        );
        assert!(store.post(provisional(1)).is_none());
    }

    #[test]
    fn replace_post_finds_moved_entries() {
        let mut store = store_with_feed();
        store.insert_post_at_head(post(provisional(1), "first"));
        store.insert_post_at_head(post(provisional(2), "second"));

        assert!(store.replace_post(provisional(1), post(confirmed(9), "first")));
        assert_eq!(feed_keys(&store)[..2], [provisional(2), confirmed(9)]);
    }

    #[test]
    fn replace_missing_post_is_noop() {
        let mut store = store_with_feed();
        let before = feed_keys(&store);

        assert!(!store.replace_post(provisional(5), post(confirmed(5), "gone")));
        assert_eq!(feed_keys(&store), before);
    }

    #[test]
    fn remove_and_restore_post() {
        let mut store = store_with_feed();
        store
            .insert_comment(comment(provisional(1), 2, "nice"))
            .unwrap();

        let removed = store.remove_post(confirmed(2)).unwrap();
        assert_eq!(removed.index, 1);
        assert_eq!(removed.comments.len(), 1);
        assert!(store.comment(provisional(1)).is_none());

        store.restore_post(removed);
        assert_eq!(
            feed_keys(&store),
            vec![confirmed(3), confirmed(2), confirmed(1)]
        );
        assert!(store.comment(provisional(1)).is_some());
        assert_eq!(store.post(confirmed(2)).unwrap().comment_count, 1);
    }

    #[test]
    fn comment_insert_and_remove_track_count() {
        let mut store = store_with_feed();
        store.insert_comment(comment(confirmed(10), 3, "one")).unwrap();
        store.insert_comment(comment(provisional(1), 3, "two")).unwrap();

        let keys: Vec<_> = store
            .comments(Id::from(3))
            .iter()
            .map(|comment| comment.id)
            .collect();
        assert_eq!(keys, vec![provisional(1), confirmed(10)]);
        assert_eq!(store.post(confirmed(3)).unwrap().comment_count, 2);

        let removed = store.remove_comment(confirmed(10)).unwrap();
        assert_eq!(removed.index, 1);
        assert_eq!(store.post(confirmed(3)).unwrap().comment_count, 1);

        store.restore_comment(removed).unwrap();
        assert_eq!(store.post(confirmed(3)).unwrap().comment_count, 2);
        assert_eq!(store.comments(Id::from(3))[1].id, confirmed(10));
    }

    #[test]
    fn comment_needs_existing_post() {
        let mut store = store_with_feed();
        assert_eq!(
            store.insert_comment(comment(provisional(1), 42, "orphan")),
            Err(StoreError::PostNotFound(confirmed(42)))
        );
        assert!(store.comments(Id::from(42)).is_empty());
    }

    #[test]
    fn replace_comment_rekeys_lookup() {
        let mut store = store_with_feed();
        store.insert_comment(comment(provisional(1), 1, "hey")).unwrap();

        assert!(store.replace_comment(provisional(1), comment(confirmed(20), 1, "hey")));
        assert!(store.comment(provisional(1)).is_none());
        assert_eq!(store.comment(confirmed(20)).unwrap().content.get(), "hey");
        assert_eq!(store.post(confirmed(1)).unwrap().comment_count, 1);

        assert!(!store.replace_comment(provisional(1), comment(confirmed(21), 1, "late")));
    }

    #[test]
    fn replace_post_already_loaded_drops_placeholder() {
        let mut store = store_with_feed();
        store.insert_post_at_head(post(provisional(1), "fresh"));
        store.merge_feed(vec![post(confirmed(9), "fresh"), post(confirmed(1), "a")], true);
        assert_eq!(
            feed_keys(&store),
            vec![provisional(1), confirmed(9), confirmed(1)]
        );

        assert!(store.replace_post(provisional(1), post(confirmed(9), "fresh")));
        assert_eq!(feed_keys(&store), vec![confirmed(9), confirmed(1)]);
    }

    #[test]
    fn replace_comment_already_loaded_drops_placeholder() {
        let mut store = store_with_feed();
        store.insert_comment(comment(provisional(1), 1, "hey")).unwrap();
        store
            .set_comments(Id::from(1), vec![comment(confirmed(20), 1, "hey")])
            .unwrap();
        assert_eq!(store.post(confirmed(1)).unwrap().comment_count, 2);

        assert!(store.replace_comment(provisional(1), comment(confirmed(20), 1, "hey")));
        let keys: Vec<_> = store
            .comments(Id::from(1))
            .iter()
            .map(|comment| comment.id)
            .collect();
        assert_eq!(keys, vec![confirmed(20)]);
        assert_eq!(store.post(confirmed(1)).unwrap().comment_count, 1);
        assert!(store.comment(provisional(1)).is_none());
    }

    #[test]
    fn merge_feed_keeps_provisional_on_top() {
        let mut store = store_with_feed();
        store.insert_post_at_head(post(provisional(1), "pending"));
        store.insert_comment(comment(provisional(2), 2, "pending")).unwrap();

        store.merge_feed(vec![post(confirmed(5), "new"), post(confirmed(2), "b")], true);
        assert_eq!(
            feed_keys(&store),
            vec![provisional(1), confirmed(5), confirmed(2)]
        );
        assert_eq!(store.post(confirmed(2)).unwrap().comment_count, 1);

        store.merge_feed(vec![post(confirmed(2), "b"), post(confirmed(1), "c")], false);
        assert_eq!(
            feed_keys(&store),
            vec![provisional(1), confirmed(5), confirmed(2), confirmed(1)]
        );
    }

    #[test]
    fn set_comments_keeps_provisional_on_top() {
        let mut store = store_with_feed();
        store.insert_comment(comment(confirmed(7), 1, "old")).unwrap();
        store.insert_comment(comment(provisional(1), 1, "pending")).unwrap();

        store
            .set_comments(
                Id::from(1),
                vec![comment(confirmed(9), 1, "x"), comment(confirmed(8), 1, "y")],
            )
            .unwrap();

        let keys: Vec<_> = store
            .comments(Id::from(1))
            .iter()
            .map(|comment| comment.id)
            .collect();
        assert_eq!(keys, vec![provisional(1), confirmed(9), confirmed(8)]);
        assert!(store.comment(confirmed(7)).is_none());
        assert_eq!(store.post(confirmed(1)).unwrap().comment_count, 3);
    }
}
