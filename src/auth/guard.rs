use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;
use uuid::Uuid;

use crate::accounts::repo_types::Role;
use crate::auth::jwt::JwtKeys;
use crate::error::AppError;
use crate::state::AppState;

/// Identity resolved from a verified token, used by downstream role and
/// ownership checks.
#[derive(Debug, Clone)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

/// Full authentication pipeline: bearer extraction, signature/expiry
/// verification, account re-fetch and the token-version comparison that
/// makes privilege changes take effect immediately.
pub async fn authenticate(
    state: &AppState,
    auth_header: Option<&str>,
) -> Result<Identity, AppError> {
    let header = auth_header.ok_or_else(|| AppError::unauthorized("Token missing"))?;

    let token = header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .ok_or_else(|| AppError::unauthorized("Invalid token"))?;

    let keys = JwtKeys::from_ref(state);
    let claims = keys.verify(token)?;

    let account = state
        .repo
        .find_by_id(claims.sub)
        .await?
        .ok_or_else(|| {
            warn!(account_id = %claims.sub, "token subject does not exist");
            AppError::unauthorized("Invalid token")
        })?;

    if claims.token_version != account.token_version {
        warn!(
            account_id = %account.id,
            token_version = claims.token_version,
            current_version = account.token_version,
            "stale token rejected"
        );
        return Err(AppError::unauthorized("Token inválido (Sessão expirada)"));
    }

    Ok(Identity {
        id: account.id,
        email: account.email,
        role: account.role,
    })
}

/// Extractor form of [`authenticate`] for protected routes.
pub struct AuthUser(pub Identity);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok());
        authenticate(state, header).await.map(AuthUser)
    }
}

/// Role membership check for a protected operation.
pub fn check_role(identity: &Identity, allowed: &[Role]) -> Result<(), AppError> {
    if allowed.contains(&identity.role) {
        return Ok(());
    }
    let required: Vec<&str> = allowed.iter().map(Role::as_str).collect();
    Err(AppError::forbidden(format!(
        "Access denied. User role '{}' is not authorized. Required one of: [{}]",
        identity.role,
        required.join(", ")
    )))
}

/// Lets non-admin users touch only their own account.
pub fn ensure_owner(token_owner: Uuid, target: Uuid) -> Result<(), AppError> {
    if token_owner != target {
        return Err(AppError::forbidden(
            "Você não tem permissão para alterar este recurso.",
        ));
    }
    Ok(())
}
