use crate::state::AppState;
use axum::Router;

pub mod authors;
pub mod books;
pub mod categories;
pub mod publishers;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(books::routes())
        .merge(authors::routes())
        .merge(publishers::routes())
        .merge(categories::routes())
}
