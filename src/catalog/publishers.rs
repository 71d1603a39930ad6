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
pub struct Publisher {
    pub id: Uuid,
    pub name: String,
    pub city: String,
    pub country: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Deserialize)]
pub struct CreatePublisherRequest {
    pub name: String,
    pub city: String,
    pub country: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePublisherRequest {
    pub id: Uuid,
    pub name: String,
    pub city: String,
    pub country: String,
}

fn fields_valid(name: &str, city: &str, country: &str) -> Result<(), AppError> {
    if name.trim().is_empty() {
        return Err(AppError::validation("Nome obrigatório"));
    }
    if city.trim().is_empty() {
        return Err(AppError::validation("Cidade obrigatória"));
    }
    if country.trim().is_empty() {
        return Err(AppError::validation("País obrigatório"));
    }
    Ok(())
}

impl Publisher {
    pub async fn list(db: &PgPool) -> Result<Vec<Publisher>, AppError> {
        sqlx::query_as::<_, Publisher>(
            "SELECT id, name, city, country, created_at FROM publishers ORDER BY name",
        )
        .fetch_all(db)
        .await
        .map_err(internal)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> Result<Option<Publisher>, AppError> {
        sqlx::query_as::<_, Publisher>(
            "SELECT id, name, city, country, created_at FROM publishers WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(db)
        .await
        .map_err(internal)
    }

    pub async fn create(db: &PgPool, data: &CreatePublisherRequest) -> Result<Publisher, AppError> {
        sqlx::query_as::<_, Publisher>(
            r#"
            INSERT INTO publishers (name, city, country)
            VALUES ($1, $2, $3)
            RETURNING id, name, city, country, created_at
            "#,
        )
        .bind(&data.name)
        .bind(&data.city)
        .bind(&data.country)
        .fetch_one(db)
        .await
        .map_err(internal)
    }

    pub async fn update(
        db: &PgPool,
        data: &UpdatePublisherRequest,
    ) -> Result<Option<Publisher>, AppError> {
        sqlx::query_as::<_, Publisher>(
            r#"
            UPDATE publishers
            SET name = $2, city = $3, country = $4
            WHERE id = $1
            RETURNING id, name, city, country, created_at
            "#,
        )
        .bind(data.id)
        .bind(&data.name)
        .bind(&data.city)
        .bind(&data.country)
        .fetch_optional(db)
        .await
        .map_err(internal)
    }

    pub async fn delete(db: &PgPool, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM publishers WHERE id = $1")
            .bind(id)
            .execute(db)
            .await
            .map_err(internal)?;
        Ok(result.rows_affected() > 0)
    }
}

fn internal(err: sqlx::Error) -> AppError {
    error!(error = %err, "publishers query failed");
    AppError::internal("Erro ao acessar editoras")
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/publishers", get(list).post(create).put(update))
        .route("/publishers/:id", get(get_one).delete(remove))
}

#[instrument(skip(state))]
async fn list(
    State(state): State<AppState>,
    AuthUser(_identity): AuthUser,
) -> Result<Json<Vec<Publisher>>, AppError> {
    Ok(Json(Publisher::list(&state.db).await?))
}

#[instrument(skip(state))]
async fn get_one(
    State(state): State<AppState>,
    AuthUser(_identity): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Publisher>, AppError> {
    Publisher::find_by_id(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Editora não encontrada"))
}

#[instrument(skip(state, payload))]
async fn create(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Json(payload): Json<CreatePublisherRequest>,
) -> Result<(StatusCode, Json<Publisher>), AppError> {
    check_role(&identity, &[Role::Admin])?;
    fields_valid(&payload.name, &payload.city, &payload.country)?;
    let publisher = Publisher::create(&state.db, &payload).await?;
    Ok((StatusCode::CREATED, Json(publisher)))
}

#[instrument(skip(state, payload))]
async fn update(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Json(payload): Json<UpdatePublisherRequest>,
) -> Result<Json<Publisher>, AppError> {
    check_role(&identity, &[Role::Admin])?;
    fields_valid(&payload.name, &payload.city, &payload.country)?;
    Publisher::update(&state.db, &payload)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Editora não encontrada"))
}

#[instrument(skip(state))]
async fn remove(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<bool>, AppError> {
    check_role(&identity, &[Role::Admin])?;
    if !Publisher::delete(&state.db, id).await? {
        return Err(AppError::not_found("Editora não encontrada"));
    }
    Ok(Json(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_publisher_fields_are_required() {
        assert!(fields_valid("Companhia das Letras", "São Paulo", "Brasil").is_ok());
        assert!(fields_valid("", "São Paulo", "Brasil").is_err());
        assert!(fields_valid("Companhia", "", "Brasil").is_err());
        assert!(fields_valid("Companhia", "São Paulo", " ").is_err());
    }
}
