use crate::model::{
    Key, ProvisionalId,
    content::Content,
    like::LikeState,
    user::User,
};
use serde::{Deserialize, Serialize};
use time::UtcDateTime;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Post {
    pub id: Key<PostMarker>,
    pub author: User,
    pub content: Content,
    pub likes: LikeState,
    /// Mirrors the number of comments on this post.
    pub comment_count: u64,
    #[serde(flatten)]
    pub media: PostMedia,
    pub created_at: UtcDateTime,
    pub updated_at: Option<UtcDateTime>,
}

/// What a post may carry besides its text.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct PostMedia {
    /// Address of an attached image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl Post {
    /// A post the current user just wrote and the server has not seen yet.
    #[must_use]
    pub fn provisional(
        id: ProvisionalId<PostMarker>,
        author: User,
        content: Content,
        media: PostMedia,
        created_at: UtcDateTime,
    ) -> Self {
        Self {
            id: id.into(),
            author,
            content,
            likes: LikeState::default(),
            comment_count: 0,
            media,
            created_at,
            updated_at: None,
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct CreatePost {
    pub content: Content,
    #[serde(flatten)]
    pub media: PostMedia,
}

#[cfg(test)]
mod tests {
    use crate::model::post::{CreatePost, PostMedia};

    #[test]
    fn media_fields_sit_next_to_content() {
        let request: CreatePost =
            serde_json::from_str(r#"{"content":"hi","image":"https://img/1.png"}"#).unwrap();
        assert_eq!(
            request.media,
            PostMedia {
                image: Some("https://img/1.png".to_owned()),
                location: None,
            }
        );

        let plain: CreatePost = serde_json::from_str(r#"{"content":"hi"}"#).unwrap();
        assert_eq!(plain.media, PostMedia::default());
        assert_eq!(serde_json::to_string(&plain).unwrap(), r#"{"content":"hi"}"#);
    }
}
