use std::sync::Arc;

use tracing::{info, warn};

use crate::admin::bootstrap::ensure_admin;
use crate::config::AppConfig;
use crate::db::{MemoryRepository, PgRepository, Repository};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repository>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let repo = if config.uses_memory_store() {
            warn!("using in-memory store; data is lost on restart");
            Arc::new(MemoryRepository::new()) as Arc<dyn Repository>
        } else {
            let pg = PgRepository::connect(&config.database_url).await?;
            if let Err(e) = pg.migrate().await {
                warn!(error = %e, "migration failed; continuing");
            }
            Arc::new(pg) as Arc<dyn Repository>
        };

        if let Some(admin) = &config.admin.bootstrap {
            ensure_admin(repo.as_ref(), admin).await?;
        }
        info!(admins = config.admin.usernames.len(), "state ready");

        Ok(Self::from_parts(repo, config))
    }

    pub fn from_parts(repo: Arc<dyn Repository>, config: Arc<AppConfig>) -> Self {
        Self { repo, config }
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        use crate::config::{AdminConfig, SessionConfig, MEMORY_DATABASE_URL};

        let config = Arc::new(AppConfig {
            database_url: MEMORY_DATABASE_URL.into(),
            session: SessionConfig {
                secret: "test-secret".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
                cookie_secure: false,
            },
            admin: AdminConfig {
                usernames: vec!["admin".into()],
                bootstrap: None,
            },
        });
        Self::from_parts(Arc::new(MemoryRepository::new()), config)
    }
}
