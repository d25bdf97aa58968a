use serde::{Deserialize, Serialize};

use crate::{
    auth::services::is_valid_email,
    db::ListParams,
    error::{AppError, FieldErrors},
};

const MAX_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub q: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}
fn default_limit() -> i64 {
    20
}

impl From<ListQuery> for ListParams {
    fn from(q: ListQuery) -> Self {
        ListParams {
            q: q.q.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
            limit: q.limit.clamp(1, MAX_LIMIT),
            offset: q.offset.max(0),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ResourceSummary {
    pub name: &'static str,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct AdminIndex {
    pub resources: Vec<ResourceSummary>,
}

#[derive(Debug, Deserialize)]
pub struct UserInput {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct CategoryInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PostInput {
    pub title: String,
    pub content: String,
    pub category_id: i64,
    pub user_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct CommentInput {
    pub body: String,
    pub post_id: i64,
    pub user_id: i64,
}

#[derive(Default)]
struct Checker(FieldErrors);

impl Checker {
    fn length(&mut self, field: &str, value: &str, max: usize) -> &mut Self {
        let len = value.trim().chars().count();
        if len == 0 {
            self.0.insert(field.into(), format!("{field} is required"));
        } else if len > max {
            self.0
                .insert(field.into(), format!("{field} must be at most {max} characters"));
        }
        self
    }

    fn required(&mut self, field: &str, value: &str) -> &mut Self {
        if value.trim().is_empty() {
            self.0.insert(field.into(), format!("{field} is required"));
        }
        self
    }

    fn finish(&mut self) -> Result<(), AppError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(std::mem::take(&mut self.0)))
        }
    }
}

pub const MIN_PASSWORD_LEN: usize = 8;

impl UserInput {
    /// On update an empty password means "keep the current one".
    pub fn validate(&self, creating: bool) -> Result<(), AppError> {
        let mut c = Checker::default();
        c.length("username", &self.username, 80)
            .length("email", &self.email, 120);
        if !c.0.contains_key("email") && !is_valid_email(self.email.trim()) {
            c.0.insert("email".into(), "email is not a valid address".into());
        }
        if (creating || !self.password.is_empty()) && self.password.len() < MIN_PASSWORD_LEN {
            c.0.insert(
                "password".into(),
                format!("password must be at least {MIN_PASSWORD_LEN} characters"),
            );
        }
        c.finish()
    }
}

impl CategoryInput {
    pub fn validate(&self) -> Result<(), AppError> {
        Checker::default().length("name", &self.name, 80).finish()
    }
}

impl PostInput {
    pub fn validate(&self) -> Result<(), AppError> {
        Checker::default()
            .length("title", &self.title, 120)
            .required("content", &self.content)
            .finish()
    }
}

impl CommentInput {
    pub fn validate(&self) -> Result<(), AppError> {
        Checker::default().required("body", &self.body).finish()
    }
}
