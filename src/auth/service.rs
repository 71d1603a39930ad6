use std::sync::Arc;

use tracing::{info, warn};

use crate::accounts::dto::{AuthResponse, LoginRequest, LoginUser};
use crate::accounts::repo::AccountRepository;
use crate::auth::jwt::JwtKeys;
use crate::auth::password::verify_password;
use crate::error::AppError;

/// Credential authentication: verifies email + password and mints a bearer
/// token embedding the account's current token version.
#[derive(Clone)]
pub struct AuthService {
    repo: Arc<dyn AccountRepository>,
}

impl AuthService {
    pub fn new(repo: Arc<dyn AccountRepository>) -> Self {
        Self { repo }
    }

    pub async fn execute(
        &self,
        keys: &JwtKeys,
        payload: LoginRequest,
    ) -> Result<AuthResponse, AppError> {
        let email = payload.email.trim().to_lowercase();

        // Unknown email and wrong password answer identically so callers
        // cannot enumerate registered accounts.
        let account = match self.repo.find_login_user(&email).await? {
            Some(account) => account,
            None => {
                warn!("login attempt for unknown email");
                return Err(AppError::unauthorized("Email ou senha incorretos"));
            }
        };

        if !verify_password(&payload.password, &account.password_hash)? {
            warn!(account_id = %account.id, "login with wrong password");
            return Err(AppError::unauthorized("Email ou senha incorretos"));
        }

        let token = keys.sign(&account)?;
        info!(account_id = %account.id, "login succeeded");
        Ok(AuthResponse {
            token,
            user: LoginUser {
                id: account.id,
                name: account.first_name,
                email: account.email,
                role: account.role,
                token_version: account.token_version,
            },
        })
    }
}
