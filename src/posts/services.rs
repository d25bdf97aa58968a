use tracing::{debug, info};

use super::dto::{CategoryPostsView, CommentFormView, HomeView, PostDetailView};
use crate::{
    db::{CommentView, NewComment, Repository},
    error::AppError,
};

pub const COMMENT_REQUIRED: &str = "Comment body is required.";

/// All posts, or only one category's. Unknown or unparseable ids give an empty list.
pub async fn home_listing(
    repo: &dyn Repository,
    raw_category_id: Option<&str>,
) -> Result<HomeView, AppError> {
    let categories = repo.list_categories().await?;
    let raw = raw_category_id.map(str::trim).filter(|s| !s.is_empty());

    let (posts, selected_category_id) = match raw {
        None => (repo.list_posts(None).await?, None),
        Some(raw) => match raw.parse::<i64>() {
            Ok(id) => (repo.list_posts(Some(id)).await?, Some(id)),
            Err(_) => {
                debug!(category_id = raw, "unparseable category id");
                (Vec::new(), None)
            }
        },
    };

    Ok(HomeView {
        categories,
        posts,
        selected_category_id,
        current_user_id: None,
    })
}

pub async fn category_listing(
    repo: &dyn Repository,
    name: &str,
) -> Result<CategoryPostsView, AppError> {
    let category = repo
        .find_category_by_name(name)
        .await?
        .ok_or(AppError::NotFound("Category"))?;
    let posts = repo.list_posts(Some(category.id)).await?;
    Ok(CategoryPostsView { category, posts })
}

/// Post ids arrive as raw path segments; non-integers are simply unknown posts.
pub fn parse_post_id(raw: &str) -> Result<i64, AppError> {
    raw.parse::<i64>().map_err(|_| AppError::NotFound("Post"))
}

pub async fn post_detail(repo: &dyn Repository, post_id: i64) -> Result<PostDetailView, AppError> {
    let post = repo
        .find_post(post_id)
        .await?
        .ok_or(AppError::NotFound("Post"))?;
    let comments = repo.list_comments_for_post(post_id).await?;
    Ok(PostDetailView {
        post,
        comments,
        comment_form: CommentFormView::default(),
        notice: None,
    })
}

#[derive(Debug)]
pub enum CommentOutcome {
    Created(CommentView),
    /// Form is shown again with the submitted body and this message.
    Rejected(PostDetailView),
}

pub async fn submit_comment(
    repo: &dyn Repository,
    post_id: i64,
    user_id: i64,
    body: Option<&str>,
) -> Result<CommentOutcome, AppError> {
    let body = body.unwrap_or_default();
    let trimmed = body.trim();
    if trimmed.is_empty() {
        let mut view = post_detail(repo, post_id).await?;
        view.comment_form = CommentFormView {
            body: body.to_string(),
            error: Some(COMMENT_REQUIRED.to_string()),
        };
        return Ok(CommentOutcome::Rejected(view));
    }

    if repo.find_post(post_id).await?.is_none() {
        return Err(AppError::NotFound("Post"));
    }

    let comment = repo
        .create_comment(&NewComment {
            body: trimmed.to_string(),
            post_id,
            user_id,
        })
        .await?;
    info!(comment_id = comment.id, post_id, user_id, "comment created");
    Ok(CommentOutcome::Created(comment))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Category, MemoryRepository, NewCategory, NewPost, NewUser, User};

    struct Fixture {
        repo: MemoryRepository,
        user: User,
        world: Category,
        sport: Category,
    }

    async fn fixture() -> Fixture {
        let repo = MemoryRepository::new();
        let user = repo
            .create_user(&NewUser {
                username: "alice".into(),
                email: "alice@example.com".into(),
                password_hash: "x".into(),
            })
            .await
            .unwrap();
        let world = repo
            .create_category(&NewCategory {
                name: "World".into(),
                description: None,
            })
            .await
            .unwrap();
        let sport = repo
            .create_category(&NewCategory {
                name: "Sport".into(),
                description: Some("Games".into()),
            })
            .await
            .unwrap();
        for (title, cat) in [("a", &world), ("b", &sport), ("c", &world)] {
            repo.create_post(&NewPost {
                title: title.into(),
                content: "text".into(),
                category_id: cat.id,
                user_id: user.id,
            })
            .await
            .unwrap();
        }
        Fixture {
            repo,
            user,
            world,
            sport,
        }
    }

    #[tokio::test]
    async fn home_listing_filters_by_category() {
        let f = fixture().await;

        let all = home_listing(&f.repo, None).await.unwrap();
        assert_eq!(all.posts.len(), 3);
        assert_eq!(all.categories.len(), 2);

        let world_id = f.world.id.to_string();
        let world = home_listing(&f.repo, Some(&world_id)).await.unwrap();
        assert_eq!(world.posts.len(), 2);
        assert!(world.posts.iter().all(|p| p.category.id == f.world.id));
        assert_eq!(world.selected_category_id, Some(f.world.id));

        let sport_id = f.sport.id.to_string();
        let sport = home_listing(&f.repo, Some(&sport_id)).await.unwrap();
        let titles: Vec<_> = sport.posts.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["b"]);
    }

    #[tokio::test]
    async fn unknown_category_id_is_empty_not_error() {
        let f = fixture().await;
        assert!(home_listing(&f.repo, Some("999")).await.unwrap().posts.is_empty());
        assert!(home_listing(&f.repo, Some("abc")).await.unwrap().posts.is_empty());
        assert_eq!(home_listing(&f.repo, Some("")).await.unwrap().posts.len(), 3);
    }

    #[tokio::test]
    async fn category_listing_by_name() {
        let f = fixture().await;
        let view = category_listing(&f.repo, "World").await.unwrap();
        assert_eq!(view.posts.len(), 2);
        assert!(matches!(
            category_listing(&f.repo, "world").await,
            Err(AppError::NotFound("Category"))
        ));
    }

    #[tokio::test]
    async fn unknown_post_is_not_found() {
        let f = fixture().await;
        assert!(matches!(
            post_detail(&f.repo, 12345).await,
            Err(AppError::NotFound("Post"))
        ));
        assert!(matches!(parse_post_id("abc"), Err(AppError::NotFound("Post"))));
        assert_eq!(parse_post_id("7").unwrap(), 7);
    }

    #[tokio::test]
    async fn comment_adds_one_and_lists_first() {
        let f = fixture().await;
        let post_id = f.repo.list_posts(None).await.unwrap()[0].id;

        submit_comment(&f.repo, post_id, f.user.id, Some("older"))
            .await
            .unwrap();
        let before = post_detail(&f.repo, post_id).await.unwrap().comments.len();

        let outcome = submit_comment(&f.repo, post_id, f.user.id, Some("  newest  "))
            .await
            .unwrap();
        let CommentOutcome::Created(created) = outcome else {
            panic!("expected created comment");
        };
        assert_eq!(created.body, "newest");
        assert_eq!(created.author.id, f.user.id);

        let after = post_detail(&f.repo, post_id).await.unwrap().comments;
        assert_eq!(after.len(), before + 1);
        assert_eq!(after[0].id, created.id);
    }

    #[tokio::test]
    async fn empty_comment_is_rejected_without_writing() {
        let f = fixture().await;
        let post_id = f.repo.list_posts(None).await.unwrap()[0].id;

        for body in [None, Some(""), Some("   \n")] {
            let outcome = submit_comment(&f.repo, post_id, f.user.id, body)
                .await
                .unwrap();
            let CommentOutcome::Rejected(view) = outcome else {
                panic!("expected rejection");
            };
            assert_eq!(view.comment_form.error.as_deref(), Some(COMMENT_REQUIRED));
        }
        assert!(f.repo.list_comments_for_post(post_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn comment_on_unknown_post_is_not_found() {
        let f = fixture().await;
        let err = submit_comment(&f.repo, 999, f.user.id, Some("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound("Post")));
    }
}
