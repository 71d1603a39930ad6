use axum::{
    extract::{FromRef, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use tracing::instrument;

use crate::accounts::dto::{
    AuthResponse, CreateAccountRequest, DeleteAccountRequest, LoginRequest, PublicAccount,
    UpdateAccountRequest, UpdatePasswordRequest,
};
use crate::auth::guard::{check_role, ensure_owner, AuthUser};
use crate::auth::jwt::JwtKeys;
use crate::accounts::repo_types::Role;
use crate::error::AppError;
use crate::state::AppState;
use crate::validation::validate_uuid;

pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/accounts/login", post(login))
        .route("/accounts/create", post(create))
        .route("/accounts/update", put(update))
        .route("/accounts/updatePassword", put(update_password))
        .route("/accounts/delete", delete(delete_account))
        .route("/accounts/getById", get(get_by_id))
        .route("/accounts/getByEmail", get(get_by_email))
}

#[derive(Debug, Deserialize)]
struct IdQuery {
    id: String,
}

#[derive(Debug, Deserialize)]
struct EmailQuery {
    email: String,
}

#[instrument(skip(state, payload))]
async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let keys = JwtKeys::from_ref(&state);
    let response = state.auth.execute(&keys, payload).await?;
    Ok(Json(response))
}

#[instrument(skip(state, payload))]
async fn create(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Json(payload): Json<CreateAccountRequest>,
) -> Result<(StatusCode, Json<PublicAccount>), AppError> {
    check_role(&identity, &[Role::Admin])?;
    let account = state.accounts.create_user(payload).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

#[instrument(skip(state, payload))]
async fn update(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Json(payload): Json<UpdateAccountRequest>,
) -> Result<Json<PublicAccount>, AppError> {
    check_role(&identity, &[Role::Admin])?;
    let account = state.accounts.update_user(payload).await?;
    Ok(Json(account))
}

#[instrument(skip(state, payload))]
async fn update_password(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Json(payload): Json<UpdatePasswordRequest>,
) -> Result<Json<PublicAccount>, AppError> {
    check_role(&identity, &[Role::Admin, Role::Customer, Role::Visitor])?;
    ensure_owner(identity.id, payload.id)?;
    let account = state.accounts.update_password(payload).await?;
    Ok(Json(account))
}

#[instrument(skip(state, payload))]
async fn delete_account(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Json(payload): Json<DeleteAccountRequest>,
) -> Result<Json<bool>, AppError> {
    check_role(&identity, &[Role::Admin])?;
    let deleted = state.accounts.delete_user(payload.id).await?;
    Ok(Json(deleted))
}

#[instrument(skip(state))]
async fn get_by_id(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Query(query): Query<IdQuery>,
) -> Result<Json<Option<PublicAccount>>, AppError> {
    check_role(&identity, &[Role::Admin])?;
    let id = validate_uuid(&query.id)?;
    let account = state.accounts.get_user_by_id(id).await?;
    Ok(Json(account))
}

#[instrument(skip(state))]
async fn get_by_email(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Query(query): Query<EmailQuery>,
) -> Result<Json<Option<PublicAccount>>, AppError> {
    check_role(&identity, &[Role::Admin])?;
    let account = state.accounts.get_user_by_email(&query.email).await?;
    Ok(Json(account))
}
