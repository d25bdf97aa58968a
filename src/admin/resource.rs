//! Admin resources. One impl per entity; the handlers are generic over them.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use super::dto::{CategoryInput, CommentInput, PostInput, UserInput};
use crate::{
    auth::password::hash_password,
    db::{
        Category, CommentView, ListParams, NewCategory, NewComment, NewPost, NewUser, Page,
        PostView, RepoResult, Repository, User, UserChanges,
    },
    error::AppError,
};

#[async_trait]
pub trait AdminResource: Send + Sync + 'static {
    /// Path segment under `/admin/`.
    const NAME: &'static str;
    type Row: Serialize + Send + 'static;
    type Input: DeserializeOwned + Send + 'static;

    async fn list(repo: &dyn Repository, params: &ListParams) -> RepoResult<Page<Self::Row>>;
    async fn get(repo: &dyn Repository, id: i64) -> RepoResult<Option<Self::Row>>;
    async fn create(repo: &dyn Repository, input: Self::Input) -> Result<Self::Row, AppError>;
    async fn update(
        repo: &dyn Repository,
        id: i64,
        input: Self::Input,
    ) -> Result<Option<Self::Row>, AppError>;
    async fn delete(repo: &dyn Repository, id: i64) -> RepoResult<bool>;
}

pub struct Users;
pub struct Categories;
pub struct Posts;
pub struct Comments;

#[async_trait]
impl AdminResource for Users {
    const NAME: &'static str = "users";
    type Row = User;
    type Input = UserInput;

    async fn list(repo: &dyn Repository, params: &ListParams) -> RepoResult<Page<User>> {
        repo.search_users(params).await
    }

    async fn get(repo: &dyn Repository, id: i64) -> RepoResult<Option<User>> {
        repo.find_user(id).await
    }

    async fn create(repo: &dyn Repository, input: UserInput) -> Result<User, AppError> {
        input.validate(true)?;
        let new = NewUser {
            username: input.username.trim().to_string(),
            email: input.email.trim().to_lowercase(),
            password_hash: hash_password(&input.password)?,
        };
        Ok(repo.create_user(&new).await?)
    }

    async fn update(
        repo: &dyn Repository,
        id: i64,
        input: UserInput,
    ) -> Result<Option<User>, AppError> {
        input.validate(false)?;
        let password_hash = if input.password.is_empty() {
            None
        } else {
            Some(hash_password(&input.password)?)
        };
        let changes = UserChanges {
            username: input.username.trim().to_string(),
            email: input.email.trim().to_lowercase(),
            password_hash,
        };
        Ok(repo.update_user(id, &changes).await?)
    }

    async fn delete(repo: &dyn Repository, id: i64) -> RepoResult<bool> {
        repo.delete_user(id).await
    }
}

impl From<CategoryInput> for NewCategory {
    fn from(input: CategoryInput) -> Self {
        NewCategory {
            name: input.name.trim().to_string(),
            description: input
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
        }
    }
}

#[async_trait]
impl AdminResource for Categories {
    const NAME: &'static str = "categories";
    type Row = Category;
    type Input = CategoryInput;

    async fn list(repo: &dyn Repository, params: &ListParams) -> RepoResult<Page<Category>> {
        repo.search_categories(params).await
    }

    async fn get(repo: &dyn Repository, id: i64) -> RepoResult<Option<Category>> {
        repo.find_category(id).await
    }

    async fn create(repo: &dyn Repository, input: CategoryInput) -> Result<Category, AppError> {
        input.validate()?;
        Ok(repo.create_category(&input.into()).await?)
    }

    async fn update(
        repo: &dyn Repository,
        id: i64,
        input: CategoryInput,
    ) -> Result<Option<Category>, AppError> {
        input.validate()?;
        Ok(repo.update_category(id, &input.into()).await?)
    }

    async fn delete(repo: &dyn Repository, id: i64) -> RepoResult<bool> {
        repo.delete_category(id).await
    }
}

impl From<PostInput> for NewPost {
    fn from(input: PostInput) -> Self {
        NewPost {
            title: input.title.trim().to_string(),
            content: input.content,
            category_id: input.category_id,
            user_id: input.user_id,
        }
    }
}

#[async_trait]
impl AdminResource for Posts {
    const NAME: &'static str = "posts";
    type Row = PostView;
    type Input = PostInput;

    async fn list(repo: &dyn Repository, params: &ListParams) -> RepoResult<Page<PostView>> {
        repo.search_posts(params).await
    }

    async fn get(repo: &dyn Repository, id: i64) -> RepoResult<Option<PostView>> {
        repo.find_post(id).await
    }

    async fn create(repo: &dyn Repository, input: PostInput) -> Result<PostView, AppError> {
        input.validate()?;
        Ok(repo.create_post(&input.into()).await?)
    }

    async fn update(
        repo: &dyn Repository,
        id: i64,
        input: PostInput,
    ) -> Result<Option<PostView>, AppError> {
        input.validate()?;
        Ok(repo.update_post(id, &input.into()).await?)
    }

    async fn delete(repo: &dyn Repository, id: i64) -> RepoResult<bool> {
        repo.delete_post(id).await
    }
}

impl From<CommentInput> for NewComment {
    fn from(input: CommentInput) -> Self {
        NewComment {
            body: input.body.trim().to_string(),
            post_id: input.post_id,
            user_id: input.user_id,
        }
    }
}

#[async_trait]
impl AdminResource for Comments {
    const NAME: &'static str = "comments";
    type Row = CommentView;
    type Input = CommentInput;

    async fn list(repo: &dyn Repository, params: &ListParams) -> RepoResult<Page<CommentView>> {
        repo.search_comments(params).await
    }

    async fn get(repo: &dyn Repository, id: i64) -> RepoResult<Option<CommentView>> {
        repo.find_comment(id).await
    }

    async fn create(repo: &dyn Repository, input: CommentInput) -> Result<CommentView, AppError> {
        input.validate()?;
        Ok(repo.create_comment(&input.into()).await?)
    }

    async fn update(
        repo: &dyn Repository,
        id: i64,
        input: CommentInput,
    ) -> Result<Option<CommentView>, AppError> {
        input.validate()?;
        Ok(repo.update_comment(id, &input.into()).await?)
    }

    async fn delete(repo: &dyn Repository, id: i64) -> RepoResult<bool> {
        repo.delete_comment(id).await
    }
}
