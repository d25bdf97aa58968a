use tracing::info;

use super::{
    dto::UserInput,
    resource::{AdminResource, Users},
};
use crate::{config::BootstrapAdmin, db::Repository};

/// Create the configured admin account on first start. Existing accounts are left alone.
pub async fn ensure_admin(repo: &dyn Repository, admin: &BootstrapAdmin) -> anyhow::Result<()> {
    if repo.find_user_by_username(&admin.username).await?.is_some() {
        return Ok(());
    }
    let input = UserInput {
        username: admin.username.clone(),
        email: admin.email.clone(),
        password: admin.password.clone(),
    };
    let user = Users::create(repo, input)
        .await
        .map_err(|e| anyhow::anyhow!("bootstrap admin {}: {e}", admin.username))?;
    info!(user_id = user.id, username = %user.username, "bootstrap admin created");
    Ok(())
}
