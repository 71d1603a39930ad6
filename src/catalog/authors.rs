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
pub struct Author {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAuthorRequest {
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAuthorRequest {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
}

fn names_valid(first_name: &str, last_name: &str) -> Result<(), AppError> {
    if first_name.trim().is_empty() {
        return Err(AppError::validation("Primeiro nome obrigatório"));
    }
    if last_name.trim().is_empty() {
        return Err(AppError::validation("Sobrenome obrigatório"));
    }
    if first_name.len() > 255 || last_name.len() > 255 {
        return Err(AppError::validation("Campos excedem o tamanho máximo"));
    }
    Ok(())
}

impl Author {
    pub async fn list(db: &PgPool) -> Result<Vec<Author>, AppError> {
        sqlx::query_as::<_, Author>(
            "SELECT id, first_name, last_name, created_at FROM authors ORDER BY last_name, first_name",
        )
        .fetch_all(db)
        .await
        .map_err(internal)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> Result<Option<Author>, AppError> {
        sqlx::query_as::<_, Author>(
            "SELECT id, first_name, last_name, created_at FROM authors WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(db)
        .await
        .map_err(internal)
    }

    /// Existence check used by the book service: all ids must resolve.
    pub async fn count_existing(db: &PgPool, ids: &[Uuid]) -> Result<i64, AppError> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM authors WHERE id = ANY($1)")
            .bind(ids)
            .fetch_one(db)
            .await
            .map_err(internal)
    }

    pub async fn create(db: &PgPool, data: &CreateAuthorRequest) -> Result<Author, AppError> {
        sqlx::query_as::<_, Author>(
            r#"
            INSERT INTO authors (first_name, last_name)
            VALUES ($1, $2)
            RETURNING id, first_name, last_name, created_at
            "#,
        )
        .bind(&data.first_name)
        .bind(&data.last_name)
        .fetch_one(db)
        .await
        .map_err(internal)
    }

    pub async fn update(db: &PgPool, data: &UpdateAuthorRequest) -> Result<Option<Author>, AppError> {
        sqlx::query_as::<_, Author>(
            r#"
            UPDATE authors
            SET first_name = $2, last_name = $3
            WHERE id = $1
            RETURNING id, first_name, last_name, created_at
            "#,
        )
        .bind(data.id)
        .bind(&data.first_name)
        .bind(&data.last_name)
        .fetch_optional(db)
        .await
        .map_err(internal)
    }

    pub async fn delete(db: &PgPool, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM authors WHERE id = $1")
            .bind(id)
            .execute(db)
            .await
            .map_err(internal)?;
        Ok(result.rows_affected() > 0)
    }
}

fn internal(err: sqlx::Error) -> AppError {
    error!(error = %err, "authors query failed");
    AppError::internal("Erro ao acessar autores")
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/authors", get(list).post(create).put(update))
        .route("/authors/:id", get(get_one).delete(remove))
}

#[instrument(skip(state))]
async fn list(
    State(state): State<AppState>,
    AuthUser(_identity): AuthUser,
) -> Result<Json<Vec<Author>>, AppError> {
    Ok(Json(Author::list(&state.db).await?))
}

#[instrument(skip(state))]
async fn get_one(
    State(state): State<AppState>,
    AuthUser(_identity): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Author>, AppError> {
    Author::find_by_id(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Autor não encontrado"))
}

#[instrument(skip(state, payload))]
async fn create(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Json(payload): Json<CreateAuthorRequest>,
) -> Result<(StatusCode, Json<Author>), AppError> {
    check_role(&identity, &[Role::Admin])?;
    names_valid(&payload.first_name, &payload.last_name)?;
    let author = Author::create(&state.db, &payload).await?;
    Ok((StatusCode::CREATED, Json(author)))
}

#[instrument(skip(state, payload))]
async fn update(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Json(payload): Json<UpdateAuthorRequest>,
) -> Result<Json<Author>, AppError> {
    check_role(&identity, &[Role::Admin])?;
    names_valid(&payload.first_name, &payload.last_name)?;
    Author::update(&state.db, &payload)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Autor não encontrado"))
}

#[instrument(skip(state))]
async fn remove(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<bool>, AppError> {
    check_role(&identity, &[Role::Admin])?;
    if !Author::delete(&state.db, id).await? {
        return Err(AppError::not_found("Autor não encontrado"));
    }
    Ok(Json(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn author_names_are_required() {
        assert!(names_valid("Clarice", "Lispector").is_ok());
        assert!(names_valid("", "Lispector").is_err());
        assert!(names_valid("Clarice", "  ").is_err());
        assert!(names_valid(&"x".repeat(256), "Lispector").is_err());
    }
}
