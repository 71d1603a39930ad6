use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::{Date, OffsetDateTime};
use tracing::{error, instrument};
use uuid::Uuid;

use crate::auth::guard::{check_role, AuthUser};
use crate::accounts::repo_types::Role;
use crate::catalog::{authors::Author, categories::Category, publishers::Publisher};
use crate::error::AppError;
use crate::state::AppState;

time::serde::format_description!(pub_date_format, Date, "[year]-[month]-[day]");

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub isbn: String, // normalized, digits only
    #[serde(with = "pub_date_format")]
    pub publication_date: Date,
    pub pages: i32,
    pub quantity_total: i32,
    pub quantity_available: i32,
    pub publisher_id: Uuid,
    pub author_ids: Vec<Uuid>,
    pub category_ids: Vec<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookRequest {
    pub title: String,
    pub isbn: String,
    #[serde(with = "pub_date_format")]
    pub publication_date: Date,
    pub pages: i32,
    pub quantity_total: i32,
    pub quantity_available: Option<i32>,
    pub publisher_id: Uuid,
    pub author_ids: Vec<Uuid>,
    pub category_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBookRequest {
    pub id: Uuid,
    pub title: String,
    pub isbn: String,
    #[serde(with = "pub_date_format")]
    pub publication_date: Date,
    pub pages: i32,
    pub quantity_total: i32,
    pub quantity_available: i32,
    pub publisher_id: Uuid,
    pub author_ids: Vec<Uuid>,
    pub category_ids: Vec<Uuid>,
}

/// Accepts 10- or 13-digit ISBNs with optional hyphen grouping, returning
/// the digits-only form.
pub fn normalize_isbn(isbn: &str) -> Option<String> {
    if isbn.is_empty() || isbn.chars().any(|c| !c.is_ascii_digit() && c != '-') {
        return None;
    }
    let digits: String = isbn.chars().filter(|c| c.is_ascii_digit()).collect();
    match digits.len() {
        10 | 13 => Some(digits),
        _ => None,
    }
}

fn fields_valid(title: &str, pages: i32, quantity_total: i32) -> Result<(), AppError> {
    if title.trim().is_empty() || title.len() > 255 {
        return Err(AppError::validation("Título inválido"));
    }
    if pages <= 0 {
        return Err(AppError::validation("Número de páginas inválido"));
    }
    if quantity_total < 0 {
        return Err(AppError::validation("Quantidade inválida"));
    }
    Ok(())
}

/// Referential checks shared by create and update: the publisher and every
/// referenced author/category must exist.
async fn references_valid(
    db: &PgPool,
    publisher_id: Uuid,
    author_ids: &[Uuid],
    category_ids: &[Uuid],
) -> Result<(), AppError> {
    if author_ids.is_empty() {
        return Err(AppError::validation("Selecione ao menos um autor"));
    }
    if category_ids.is_empty() {
        return Err(AppError::validation("Selecione ao menos uma categoria"));
    }

    if Publisher::find_by_id(db, publisher_id).await?.is_none() {
        return Err(AppError::domain_rule("Editora informada não existe"));
    }
    if Author::count_existing(db, author_ids).await? != author_ids.len() as i64 {
        return Err(AppError::domain_rule("Um ou mais autores informados não existem"));
    }
    if Category::count_existing(db, category_ids).await? != category_ids.len() as i64 {
        return Err(AppError::domain_rule(
            "Uma ou mais categorias informadas não existem",
        ));
    }
    Ok(())
}

const BOOK_COLUMNS: &str = "id, title, isbn, publication_date, pages, quantity_total, \
     quantity_available, publisher_id, author_ids, category_ids, created_at";

impl Book {
    pub async fn list(db: &PgPool) -> Result<Vec<Book>, AppError> {
        sqlx::query_as::<_, Book>(&format!("SELECT {BOOK_COLUMNS} FROM books ORDER BY title"))
            .fetch_all(db)
            .await
            .map_err(internal)
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> Result<Option<Book>, AppError> {
        sqlx::query_as::<_, Book>(&format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = $1"))
            .bind(id)
            .fetch_optional(db)
            .await
            .map_err(internal)
    }

    pub async fn find_by_isbn(db: &PgPool, isbn: &str) -> Result<Option<Book>, AppError> {
        sqlx::query_as::<_, Book>(&format!("SELECT {BOOK_COLUMNS} FROM books WHERE isbn = $1"))
            .bind(isbn)
            .fetch_optional(db)
            .await
            .map_err(internal)
    }

    async fn insert(db: &PgPool, data: &CreateBookRequest, isbn: &str) -> Result<Book, AppError> {
        let quantity_available = data.quantity_available.unwrap_or(data.quantity_total);
        sqlx::query_as::<_, Book>(&format!(
            r#"
            INSERT INTO books (title, isbn, publication_date, pages, quantity_total,
                               quantity_available, publisher_id, author_ids, category_ids)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {BOOK_COLUMNS}
            "#
        ))
        .bind(&data.title)
        .bind(isbn)
        .bind(data.publication_date)
        .bind(data.pages)
        .bind(data.quantity_total)
        .bind(quantity_available)
        .bind(data.publisher_id)
        .bind(&data.author_ids)
        .bind(&data.category_ids)
        .fetch_one(db)
        .await
        .map_err(internal)
    }

    async fn persist_update(
        db: &PgPool,
        data: &UpdateBookRequest,
        isbn: &str,
    ) -> Result<Option<Book>, AppError> {
        sqlx::query_as::<_, Book>(&format!(
            r#"
            UPDATE books
            SET title = $2, isbn = $3, publication_date = $4, pages = $5,
                quantity_total = $6, quantity_available = $7, publisher_id = $8,
                author_ids = $9, category_ids = $10
            WHERE id = $1
            RETURNING {BOOK_COLUMNS}
            "#
        ))
        .bind(data.id)
        .bind(&data.title)
        .bind(isbn)
        .bind(data.publication_date)
        .bind(data.pages)
        .bind(data.quantity_total)
        .bind(data.quantity_available)
        .bind(data.publisher_id)
        .bind(&data.author_ids)
        .bind(&data.category_ids)
        .fetch_optional(db)
        .await
        .map_err(internal)
    }

    pub async fn delete(db: &PgPool, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(db)
            .await
            .map_err(internal)?;
        Ok(result.rows_affected() > 0)
    }
}

fn internal(err: sqlx::Error) -> AppError {
    error!(error = %err, "books query failed");
    AppError::internal("Erro ao acessar livros")
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/books", get(list).post(create).put(update))
        .route("/books/:id", get(get_one).delete(remove))
}

#[instrument(skip(state))]
async fn list(
    State(state): State<AppState>,
    AuthUser(_identity): AuthUser,
) -> Result<Json<Vec<Book>>, AppError> {
    Ok(Json(Book::list(&state.db).await?))
}

#[instrument(skip(state))]
async fn get_one(
    State(state): State<AppState>,
    AuthUser(_identity): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Book>, AppError> {
    Book::find_by_id(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Livro não encontrado"))
}

#[instrument(skip(state, payload))]
async fn create(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Json(payload): Json<CreateBookRequest>,
) -> Result<(StatusCode, Json<Book>), AppError> {
    check_role(&identity, &[Role::Admin])?;
    fields_valid(&payload.title, payload.pages, payload.quantity_total)?;

    let isbn =
        normalize_isbn(&payload.isbn).ok_or_else(|| AppError::domain_rule("ISBN inválido"))?;
    if Book::find_by_isbn(&state.db, &isbn).await?.is_some() {
        return Err(AppError::conflict("Já existe um livro com este ISBN"));
    }
    references_valid(
        &state.db,
        payload.publisher_id,
        &payload.author_ids,
        &payload.category_ids,
    )
    .await?;

    let book = Book::insert(&state.db, &payload, &isbn).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

#[instrument(skip(state, payload))]
async fn update(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Json(payload): Json<UpdateBookRequest>,
) -> Result<Json<Book>, AppError> {
    check_role(&identity, &[Role::Admin])?;
    fields_valid(&payload.title, payload.pages, payload.quantity_total)?;

    let current = Book::find_by_id(&state.db, payload.id)
        .await?
        .ok_or_else(|| AppError::not_found("Livro não encontrado"))?;

    let isbn =
        normalize_isbn(&payload.isbn).ok_or_else(|| AppError::domain_rule("ISBN inválido"))?;
    if isbn != current.isbn && Book::find_by_isbn(&state.db, &isbn).await?.is_some() {
        return Err(AppError::conflict("Já existe um livro com este ISBN"));
    }
    references_valid(
        &state.db,
        payload.publisher_id,
        &payload.author_ids,
        &payload.category_ids,
    )
    .await?;

    Book::persist_update(&state.db, &payload, &isbn)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Livro não encontrado"))
}

#[instrument(skip(state))]
async fn remove(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<bool>, AppError> {
    check_role(&identity, &[Role::Admin])?;
    if !Book::delete(&state.db, id).await? {
        return Err(AppError::not_found("Livro não encontrado"));
    }
    Ok(Json(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isbn_accepts_10_and_13_digit_forms() {
        assert_eq!(normalize_isbn("85-359-0277-5").as_deref(), Some("8535902775"));
        assert_eq!(
            normalize_isbn("978-85-359-0277-5").as_deref(),
            Some("9788535902775")
        );
        assert_eq!(normalize_isbn("9788535902775").as_deref(), Some("9788535902775"));
    }

    #[test]
    fn isbn_rejects_wrong_lengths_and_characters() {
        assert!(normalize_isbn("").is_none());
        assert!(normalize_isbn("123").is_none());
        assert!(normalize_isbn("85-359-0277").is_none());
        assert!(normalize_isbn("85359X27750").is_none());
        assert!(normalize_isbn("isbn-123456789").is_none());
    }

    #[test]
    fn book_fields_are_bounded() {
        assert!(fields_valid("Grande Sertão: Veredas", 594, 10).is_ok());
        assert!(fields_valid("", 594, 10).is_err());
        assert!(fields_valid("Título", 0, 10).is_err());
        assert!(fields_valid("Título", 100, -1).is_err());
    }
}
