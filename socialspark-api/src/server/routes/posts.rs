use crate::server::{
    AppCoordinator, Result, ServerError, ServerRouter,
    json::{Accepted, Json},
    routes::ContentInput,
    settle_in_background,
};
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::Deserialize;
use socialspark_client::error::MutationError;
use socialspark_common::model::{
    Id, Key,
    comment::Comment,
    like::LikeState,
    post::{Post, PostMarker, PostMedia},
    user::Session,
};
use tokio_util::task::TaskTracker;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(create_post)
        .typed_delete(delete_post)
        .typed_post(toggle_post_like)
        .typed_get(get_comments)
        .typed_post(load_comments)
        .typed_post(create_comment)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/create", rejection(ServerError))]
struct CreatePostPath();

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
struct CreatePostInput {
    content: String,
    #[serde(flatten)]
    media: PostMedia,
}

async fn create_post(
    CreatePostPath(): CreatePostPath,
    State(coordinator): State<AppCoordinator>,
    State(session): State<Session>,
    State(settlements): State<TaskTracker>,
    Json(input): Json<CreatePostInput>,
) -> Result<Accepted<Post>> {
    let pending = coordinator
        .create_post_with(&session, &input.content, input.media)
        .ok_or(ServerError::BlankContent)?;
    let post = pending.provisional().clone();

    settle_in_background(&settlements, pending);
    Ok(Accepted(post))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}", rejection(ServerError))]
struct PostPath {
    id: Id<PostMarker>,
}

async fn delete_post(
    PostPath { id }: PostPath,
    State(coordinator): State<AppCoordinator>,
    State(session): State<Session>,
    State(settlements): State<TaskTracker>,
) -> Result<StatusCode> {
    let pending = coordinator.delete_post(&session, id)?;

    settle_in_background(&settlements, pending);
    Ok(StatusCode::ACCEPTED)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/like", rejection(ServerError))]
struct PostLikePath {
    id: Id<PostMarker>,
}

async fn toggle_post_like(
    PostLikePath { id }: PostLikePath,
    State(coordinator): State<AppCoordinator>,
    State(session): State<Session>,
    State(settlements): State<TaskTracker>,
) -> Result<Accepted<LikeState>> {
    let pending = coordinator.toggle_post_like(&session, id)?;
    let likes = pending.shown();

    settle_in_background(&settlements, pending);
    Ok(Accepted(likes))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/comments", rejection(ServerError))]
struct CommentsPath {
    id: Id<PostMarker>,
}

async fn get_comments(
    CommentsPath { id }: CommentsPath,
    State(coordinator): State<AppCoordinator>,
) -> Result<Json<Vec<Comment>>> {
    let key = Key::Confirmed(id);
    if coordinator.post(key).is_none() {
        return Err(MutationError::PostNotFound(key).into());
    }

    Ok(Json(coordinator.comments(id)))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/comments/load", rejection(ServerError))]
struct LoadCommentsPath {
    id: Id<PostMarker>,
}

async fn load_comments(
    LoadCommentsPath { id }: LoadCommentsPath,
    State(coordinator): State<AppCoordinator>,
    State(session): State<Session>,
) -> Result<Json<Vec<Comment>>> {
    coordinator.load_comments(&session, id).await?;

    Ok(Json(coordinator.comments(id)))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/comments/create", rejection(ServerError))]
struct CreateCommentPath {
    id: Id<PostMarker>,
}

async fn create_comment(
    CreateCommentPath { id }: CreateCommentPath,
    State(coordinator): State<AppCoordinator>,
    State(session): State<Session>,
    State(settlements): State<TaskTracker>,
    Json(input): Json<ContentInput>,
) -> Result<Accepted<Comment>> {
    let pending = coordinator
        .create_comment(&session, id, &input.content)?
        .ok_or(ServerError::BlankContent)?;
    let comment = pending.provisional().clone();

    settle_in_background(&settlements, pending);
    Ok(Accepted(comment))
}

#[cfg(test)]
mod tests {
    use crate::server::{
        AppCoordinator, ServerError,
        json::{Accepted, Json},
        routes::posts::{
            CreatePostInput, CreatePostPath, PostLikePath, create_post, toggle_post_like,
        },
    };
    use axum::extract::State;
    use socialspark_client::{
        Coordinator, CoordinatorConfig, FeedPage, MockRemote, remote::mock::MockRemoteConfig,
    };
    use socialspark_common::model::{
        Id, Key,
        content::Content,
        like::LikeState,
        post::PostMedia,
        user::{Session, User, UserHandle},
    };
    use std::{num::NonZeroU32, time::Duration};
    use tokio_util::task::TaskTracker;

    fn session() -> Session {
        Session::new(User {
            id: Id::from(1),
            handle: UserHandle::new("me".to_owned()).unwrap(),
            avatar: None,
        })
    }

    fn instant_coordinator() -> AppCoordinator {
        let remote = MockRemote::new(MockRemoteConfig {
            latency: Duration::ZERO,
            ..MockRemoteConfig::default()
        });
        Coordinator::new(remote, CoordinatorConfig::default())
    }

    fn input(content: &str, media: PostMedia) -> Json<CreatePostInput> {
        Json(CreatePostInput {
            content: content.to_owned(),
            media,
        })
    }

    async fn drain(settlements: &TaskTracker) {
        settlements.close();
        settlements.wait().await;
    }

    #[tokio::test]
    async fn create_answers_with_provisional_post() {
        let coordinator = instant_coordinator();
        let settlements = TaskTracker::new();
        let media = PostMedia {
            image: None,
            location: Some("Lisbon".to_owned()),
        };

        let Accepted(post) = create_post(
            CreatePostPath(),
            State(coordinator.clone()),
            State(session()),
            State(settlements.clone()),
            input("hello", media.clone()),
        )
        .await
        .unwrap();
        assert!(post.id.is_provisional());
        assert_eq!(post.content.get(), "hello");
        assert_eq!(post.media, media);

        drain(&settlements).await;
        let posts = coordinator.posts();
        assert_eq!(posts.len(), 1);
        assert!(!posts[0].id.is_provisional());
        assert_eq!(posts[0].media, media);
    }

    #[tokio::test]
    async fn blank_post_is_refused_without_change() {
        let coordinator = instant_coordinator();
        let settlements = TaskTracker::new();

        let result = create_post(
            CreatePostPath(),
            State(coordinator.clone()),
            State(session()),
            State(settlements.clone()),
            input("  ", PostMedia::default()),
        )
        .await;

        assert!(matches!(result, Err(ServerError::BlankContent)));
        assert!(coordinator.posts().is_empty());
        assert_eq!(coordinator.remote().calls(), 0);
    }

    #[tokio::test]
    async fn toggle_answers_with_shown_likes() {
        let coordinator = instant_coordinator();
        let author = User {
            id: Id::from(2),
            handle: UserHandle::new("other".to_owned()).unwrap(),
            avatar: None,
        };
        let id = coordinator
            .remote()
            .seed_post(author, Content::new("a").unwrap(), 10);
        coordinator
            .load_feed(&session(), FeedPage::first(NonZeroU32::new(10).unwrap()))
            .await
            .unwrap();
        let settlements = TaskTracker::new();

        let Accepted(likes) = toggle_post_like(
            PostLikePath { id },
            State(coordinator.clone()),
            State(session()),
            State(settlements.clone()),
        )
        .await
        .unwrap();
        assert_eq!(likes, LikeState::new(11, true));

        drain(&settlements).await;
        assert_eq!(
            coordinator.post(Key::Confirmed(id)).unwrap().likes,
            LikeState::new(11, true)
        );
    }
}
