use serde::{Deserialize, Serialize};

/// Login form body.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// `?next=` carried from the protected page that bounced to login.
#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

/// Login page view model.
#[derive(Debug, Serialize)]
pub struct LoginView {
    pub next: Option<String>,
}
