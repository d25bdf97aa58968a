use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

/// User record. The password hash never leaves the server.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
}

/// Raw post row as stored.
#[derive(Debug, Clone, FromRow)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub date_posted: OffsetDateTime,
    pub category_id: i64,
    pub user_id: i64,
}

/// Raw comment row as stored.
#[derive(Debug, Clone, FromRow)]
pub struct Comment {
    pub id: i64,
    pub body: String,
    pub date_posted: OffsetDateTime,
    pub user_id: i64,
    pub post_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryRef {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorRef {
    pub id: i64,
    pub username: String,
}

/// A post with its category and author projected in place of the foreign keys.
#[derive(Debug, Clone, Serialize)]
pub struct PostView {
    pub id: i64,
    pub title: String,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub date_posted: OffsetDateTime,
    pub category: CategoryRef,
    pub author: AuthorRef,
}

#[derive(Debug, FromRow)]
pub(crate) struct PostRow {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub date_posted: OffsetDateTime,
    pub category_id: i64,
    pub category_name: String,
    pub user_id: i64,
    pub author_username: String,
}

impl From<PostRow> for PostView {
    fn from(r: PostRow) -> Self {
        Self {
            id: r.id,
            title: r.title,
            content: r.content,
            date_posted: r.date_posted,
            category: CategoryRef {
                id: r.category_id,
                name: r.category_name,
            },
            author: AuthorRef {
                id: r.user_id,
                username: r.author_username,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentView {
    pub id: i64,
    pub body: String,
    #[serde(with = "time::serde::rfc3339")]
    pub date_posted: OffsetDateTime,
    pub post_id: i64,
    pub post_title: String,
    pub author: AuthorRef,
}

#[derive(Debug, FromRow)]
pub(crate) struct CommentRow {
    pub id: i64,
    pub body: String,
    pub date_posted: OffsetDateTime,
    pub post_id: i64,
    pub post_title: String,
    pub user_id: i64,
    pub author_username: String,
}

impl From<CommentRow> for CommentView {
    fn from(r: CommentRow) -> Self {
        Self {
            id: r.id,
            body: r.body,
            date_posted: r.date_posted,
            post_id: r.post_id,
            post_title: r.post_title,
            author: AuthorRef {
                id: r.user_id,
                username: r.author_username,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// Full user update; `password_hash: None` keeps the stored hash.
#[derive(Debug, Clone)]
pub struct UserChanges {
    pub username: String,
    pub email: String,
    pub password_hash: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewCategory {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub category_id: i64,
    pub user_id: i64,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub body: String,
    pub post_id: i64,
    pub user_id: i64,
}

/// Search + pagination for admin listings.
#[derive(Debug, Clone, Default)]
pub struct ListParams {
    pub q: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

impl ListParams {
    pub fn matches(&self, haystack: &str) -> bool {
        match self.q.as_deref() {
            Some(q) => haystack.to_lowercase().contains(&q.to_lowercase()),
            None => true,
        }
    }

    /// `%q%` with LIKE wildcards escaped.
    pub fn like_pattern(&self) -> Option<String> {
        self.q.as_ref().map(|q| {
            let escaped = q
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_");
            format!("%{escaped}%")
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

impl<T> Page<T> {
    pub fn from_filtered(all: Vec<T>, params: &ListParams) -> Self {
        let total = all.len() as i64;
        let items = all
            .into_iter()
            .skip(params.offset.max(0) as usize)
            .take(params.limit.max(0) as usize)
            .collect();
        Self {
            items,
            total,
            limit: params.limit,
            offset: params.offset,
        }
    }
}
