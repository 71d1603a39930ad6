use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use tracing::{error, instrument};
use uuid::Uuid;

use crate::auth::guard::{check_role, AuthUser};
use crate::accounts::repo_types::Role;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCategoryRequest {
    pub id: Uuid,
    pub name: String,
}

fn name_valid(name: &str) -> Result<(), AppError> {
    if name.trim().len() < 3 {
        return Err(AppError::validation("Nome da categoria muito curto"));
    }
    if name.len() > 100 {
        return Err(AppError::validation("Nome da categoria muito longo"));
    }
    Ok(())
}

impl Category {
    pub async fn list(db: &PgPool) -> Result<Vec<Category>, AppError> {
        sqlx::query_as::<_, Category>("SELECT id, name, created_at FROM categories ORDER BY name")
            .fetch_all(db)
            .await
            .map_err(internal)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> Result<Option<Category>, AppError> {
        sqlx::query_as::<_, Category>("SELECT id, name, created_at FROM categories WHERE id = $1")
            .bind(id)
            .fetch_optional(db)
            .await
            .map_err(internal)
    }

    pub async fn count_existing(db: &PgPool, ids: &[Uuid]) -> Result<i64, AppError> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM categories WHERE id = ANY($1)")
            .bind(ids)
            .fetch_one(db)
            .await
            .map_err(internal)
    }

    pub async fn create(db: &PgPool, name: &str) -> Result<Category, AppError> {
        sqlx::query_as::<_, Category>(
            "INSERT INTO categories (name) VALUES ($1) RETURNING id, name, created_at",
        )
        .bind(name)
        .fetch_one(db)
        .await
        .map_err(internal)
    }

    pub async fn update(db: &PgPool, id: Uuid, name: &str) -> Result<Option<Category>, AppError> {
        sqlx::query_as::<_, Category>(
            "UPDATE categories SET name = $2 WHERE id = $1 RETURNING id, name, created_at",
        )
        .bind(id)
        .bind(name)
        .fetch_optional(db)
        .await
        .map_err(internal)
    }

    pub async fn delete(db: &PgPool, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(db)
            .await
            .map_err(internal)?;
        Ok(result.rows_affected() > 0)
    }
}

fn internal(err: sqlx::Error) -> AppError {
    error!(error = %err, "categories query failed");
    AppError::internal("Erro ao acessar categorias")
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list).post(create).put(update))
        .route("/categories/:id", get(get_one).delete(remove))
}

#[instrument(skip(state))]
async fn list(
    State(state): State<AppState>,
    AuthUser(_identity): AuthUser,
) -> Result<Json<Vec<Category>>, AppError> {
    Ok(Json(Category::list(&state.db).await?))
}

#[instrument(skip(state))]
async fn get_one(
    State(state): State<AppState>,
    AuthUser(_identity): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Category>, AppError> {
    Category::find_by_id(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Categoria não encontrada"))
}

#[instrument(skip(state, payload))]
async fn create(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Json(payload): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<Category>), AppError> {
    check_role(&identity, &[Role::Admin])?;
    name_valid(&payload.name)?;
    let category = Category::create(&state.db, &payload.name).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

#[instrument(skip(state, payload))]
async fn update(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Json(payload): Json<UpdateCategoryRequest>,
) -> Result<Json<Category>, AppError> {
    check_role(&identity, &[Role::Admin])?;
    name_valid(&payload.name)?;
    Category::update(&state.db, payload.id, &payload.name)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Categoria não encontrada"))
}

#[instrument(skip(state))]
async fn remove(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<bool>, AppError> {
    check_role(&identity, &[Role::Admin])?;
    if !Category::delete(&state.db, id).await? {
        return Err(AppError::not_found("Categoria não encontrada"));
    }
    Ok(Json(true))
}
