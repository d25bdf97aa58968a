use anyhow::Context;
use serde::Deserialize;

/// Marker for the in-process store instead of Postgres.
pub const MEMORY_DATABASE_URL: &str = "memory://";

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub cookie_secure: bool,
}

#[derive(Clone, Deserialize)]
pub struct BootstrapAdmin {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapAdmin")
            .field("username", &self.username)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminConfig {
    /// Usernames granted the admin capability.
    pub usernames: Vec<String>,
    pub bootstrap: Option<BootstrapAdmin>,
}

impl AdminConfig {
    pub fn is_admin(&self, username: &str) -> bool {
        self.usernames.iter().any(|u| u == username)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub session: SessionConfig,
    pub admin: AdminConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(get: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = get("DATABASE_URL").context("DATABASE_URL is not set")?;

        let secret = get("SESSION_SECRET")
            .filter(|s| !s.trim().is_empty())
            .context("SESSION_SECRET is required to sign session cookies")?;
        let session = SessionConfig {
            secret,
            issuer: get("SESSION_ISSUER").unwrap_or_else(|| "newsportal".into()),
            audience: get("SESSION_AUDIENCE").unwrap_or_else(|| "newsportal-web".into()),
            ttl_minutes: get("SESSION_TTL_MINUTES")
                .and_then(|v| v.parse::<i64>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(60 * 24),
            cookie_secure: get("SESSION_COOKIE_SECURE")
                .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        };

        let bootstrap = match (
            get("ADMIN_BOOTSTRAP_USERNAME"),
            get("ADMIN_BOOTSTRAP_EMAIL"),
            get("ADMIN_BOOTSTRAP_PASSWORD"),
        ) {
            (Some(username), Some(email), Some(password)) => Some(BootstrapAdmin {
                username,
                email,
                password,
            }),
            _ => None,
        };

        let mut usernames: Vec<String> = get("ADMIN_USERNAMES")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        if let Some(b) = &bootstrap {
            if !usernames.contains(&b.username) {
                usernames.push(b.username.clone());
            }
        }

        Ok(Self {
            database_url,
            session,
            admin: AdminConfig {
                usernames,
                bootstrap,
            },
        })
    }

    pub fn uses_memory_store(&self) -> bool {
        self.database_url.starts_with(MEMORY_DATABASE_URL)
    }
}
