use lazy_static::lazy_static;
use regex::Regex;
use tracing::{error, warn};

use super::password::{verify_dummy, verify_password};
use crate::{
    db::{Repository, User},
    error::AppError,
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Verify a claimed identity. Unknown username and wrong password fail identically.
pub async fn authenticate(
    repo: &dyn Repository,
    username: &str,
    password: &str,
) -> Result<User, AppError> {
    let Some(user) = repo.find_user_by_username(username).await? else {
        verify_dummy(password);
        warn!(%username, "login unknown username");
        return Err(AppError::InvalidCredentials);
    };

    let ok = verify_password(password, &user.password_hash).map_err(|e| {
        error!(error = %e, user_id = user.id, "verify_password failed");
        e
    })?;
    if !ok {
        warn!(user_id = user.id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }
    Ok(user)
}
