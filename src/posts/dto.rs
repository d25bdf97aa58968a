use serde::{Deserialize, Serialize};

use crate::db::{Category, CommentView, PostView};

#[derive(Debug, Deserialize)]
pub struct HomeQuery {
    /// Parsed leniently: anything that is not an id matches no posts.
    pub category_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HomeView {
    pub categories: Vec<Category>,
    pub posts: Vec<PostView>,
    pub selected_category_id: Option<i64>,
    pub current_user_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct AboutView {
    pub title: &'static str,
    pub body: &'static str,
}

#[derive(Debug, Serialize)]
pub struct CategoryPostsView {
    pub category: Category,
    pub posts: Vec<PostView>,
}

#[derive(Debug, Default, Serialize)]
pub struct CommentFormView {
    pub body: String,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PostDetailView {
    pub post: PostView,
    pub comments: Vec<CommentView>,
    pub comment_form: CommentFormView,
    pub notice: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub body: Option<String>,
}

/// Transient notices passed across a redirect in the flash cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    CommentAdded,
}

impl Notice {
    pub fn code(self) -> &'static str {
        match self {
            Notice::CommentAdded => "comment-added",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Notice::CommentAdded => "Your comment has been published.",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "comment-added" => Some(Notice::CommentAdded),
            _ => None,
        }
    }
}
