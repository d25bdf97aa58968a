//! Persistence port. Every access pattern the portal needs is an explicit
//! method here; there is no lazy relationship traversal.

use async_trait::async_trait;
use thiserror::Error;

pub mod memory;
pub mod models;
pub mod postgres;

pub use memory::MemoryRepository;
pub use models::{
    Category, CommentView, ListParams, NewCategory, NewComment, NewPost, NewUser, Page, PostView,
    User, UserChanges,
};
pub use postgres::PgRepository;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("duplicate value for {field}")]
    Unique { field: String },

    #[error("{field} references a missing row")]
    ForeignKey { field: String },

    #[error("{0} is still referenced")]
    InUse(&'static str),

    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl RepoError {
    /// Deleting a referenced row trips a foreign key; report it as a restricted delete.
    pub(crate) fn restricted(self, entity: &'static str) -> Self {
        match self {
            RepoError::ForeignKey { .. } => RepoError::InUse(entity),
            other => other,
        }
    }
}

pub type RepoResult<T> = Result<T, RepoError>;

#[async_trait]
pub trait Repository: Send + Sync {
    async fn find_user(&self, id: i64) -> RepoResult<Option<User>>;
    async fn find_user_by_username(&self, username: &str) -> RepoResult<Option<User>>;
    async fn search_users(&self, params: &ListParams) -> RepoResult<Page<User>>;
    async fn create_user(&self, new: &NewUser) -> RepoResult<User>;
    async fn update_user(&self, id: i64, changes: &UserChanges) -> RepoResult<Option<User>>;
    /// Restricted while the user still authors posts or comments.
    async fn delete_user(&self, id: i64) -> RepoResult<bool>;

    async fn list_categories(&self) -> RepoResult<Vec<Category>>;
    async fn find_category(&self, id: i64) -> RepoResult<Option<Category>>;
    async fn find_category_by_name(&self, name: &str) -> RepoResult<Option<Category>>;
    async fn search_categories(&self, params: &ListParams) -> RepoResult<Page<Category>>;
    async fn create_category(&self, new: &NewCategory) -> RepoResult<Category>;
    async fn update_category(&self, id: i64, changes: &NewCategory)
        -> RepoResult<Option<Category>>;
    /// Restricted while the category still has posts.
    async fn delete_category(&self, id: i64) -> RepoResult<bool>;

    /// Newest first. `Some(id)` keeps only that category's posts.
    async fn list_posts(&self, category_id: Option<i64>) -> RepoResult<Vec<PostView>>;
    async fn find_post(&self, id: i64) -> RepoResult<Option<PostView>>;
    async fn search_posts(&self, params: &ListParams) -> RepoResult<Page<PostView>>;
    async fn create_post(&self, new: &NewPost) -> RepoResult<PostView>;
    async fn update_post(&self, id: i64, changes: &NewPost) -> RepoResult<Option<PostView>>;
    /// Cascades to the post's comments.
    async fn delete_post(&self, id: i64) -> RepoResult<bool>;

    /// Newest first; equal timestamps keep insertion order.
    async fn list_comments_for_post(&self, post_id: i64) -> RepoResult<Vec<CommentView>>;
    async fn find_comment(&self, id: i64) -> RepoResult<Option<CommentView>>;
    async fn search_comments(&self, params: &ListParams) -> RepoResult<Page<CommentView>>;
    /// Insert and commit as one unit.
    async fn create_comment(&self, new: &NewComment) -> RepoResult<CommentView>;
    async fn update_comment(&self, id: i64, changes: &NewComment)
        -> RepoResult<Option<CommentView>>;
    async fn delete_comment(&self, id: i64) -> RepoResult<bool>;
}
