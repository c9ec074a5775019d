use crate::model::{
    Id, Key, ProvisionalId,
    content::Content,
    like::LikeState,
    post::PostMarker,
    user::User,
};
use serde::{Deserialize, Serialize};
use time::UtcDateTime;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct CommentMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Comment {
    pub id: Key<CommentMarker>,
    pub post_id: Id<PostMarker>,
    pub author: User,
    pub content: Content,
    pub likes: LikeState,
    pub created_at: UtcDateTime,
    pub updated_at: Option<UtcDateTime>,
}

impl Comment {
    #[must_use]
    pub fn provisional(
        id: ProvisionalId<CommentMarker>,
        post_id: Id<PostMarker>,
        author: User,
        content: Content,
        created_at: UtcDateTime,
    ) -> Self {
        Self {
            id: id.into(),
            post_id,
            author,
            content,
            likes: LikeState::default(),
            created_at,
            updated_at: None,
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct CreateComment {
    pub post_id: Id<PostMarker>,
    pub content: Content,
}
