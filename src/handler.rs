use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    response::{IntoResponse, Response},
};

use tracing::info;

use crate::api::{
    BookPath, COMPLETE_DELETE_SUCCESSFUL, DELETE_SUCCESSFUL, Payload, StatusResponse, good_response, not_found, sentinel,
    server_error,
};
use crate::db::Database;
use crate::error::BookError;
use crate::model::{CreateBook, CreateComment};
use crate::unpack_error;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
}

impl AppState {
    pub fn new(db: Database) -> Self {
        AppState { db: Arc::new(db) }
    }
}

pub async fn healthcheck() -> impl IntoResponse {
    info!("got healthcheck request");
    Json(StatusResponse {
        status: "ok".to_string(),
    })
}

/// Routes under `/books/:id` answer every failure with the plain-text
/// sentinel, including storage errors.
fn book_error(err: BookError, id: &str) -> Response {
    match &err {
        BookError::MissingField(field) => {
            tracing::info!(book_id = id, field = *field, "rejected request with missing field");
        }
        BookError::Storage(_) => {
            tracing::error!(book_id = id, error = %unpack_error(&err), "storage failure on book");
            return sentinel(BookError::NotFound.to_string());
        }
        _ => tracing::info!(book_id = id, "no book exists"),
    }
    sentinel(err.to_string())
}

pub async fn list_books(State(state): State<AppState>) -> Response {
    match state.db.list_books().await {
        Ok(books) => {
            tracing::info!(count = books.len(), "got books");
            good_response(books)
        }
        Err(e) => {
            tracing::error!(error = %unpack_error(&e), "failed to get books");
            server_error("Error retrieving books")
        }
    }
}

pub async fn create_book(State(state): State<AppState>, Payload(payload): Payload<CreateBook>) -> Response {
    match state.db.create_book(payload).await {
        Ok(book) => {
            tracing::info!(book_id = %book.id, "created book");
            good_response(book)
        }
        Err(e @ BookError::MissingField(_)) => {
            tracing::info!("rejected book without title");
            sentinel(e.to_string())
        }
        Err(e) => {
            tracing::error!(error = %unpack_error(&e), "failed to create book");
            server_error("Error saving book")
        }
    }
}

pub async fn delete_books(State(state): State<AppState>) -> Response {
    match state.db.delete_all_books().await {
        Ok(deleted) => {
            tracing::info!(deleted, "deleted all books");
            sentinel(COMPLETE_DELETE_SUCCESSFUL)
        }
        Err(e @ BookError::NothingToDelete) => {
            tracing::info!("no books to delete");
            not_found(e.to_string())
        }
        Err(e) => {
            tracing::error!(error = %unpack_error(&e), "failed to delete books");
            server_error("Error deleting books")
        }
    }
}

pub async fn get_book(State(state): State<AppState>, BookPath(id): BookPath) -> Response {
    match state.db.get_book(&id).await {
        Ok(book) => {
            tracing::info!(book_id = %id, "got book");
            good_response(book)
        }
        Err(e) => book_error(e, &id),
    }
}

pub async fn add_comment(
    State(state): State<AppState>,
    BookPath(id): BookPath,
    Payload(payload): Payload<CreateComment>,
) -> Response {
    match state.db.add_comment(&id, payload).await {
        Ok(book) => {
            tracing::info!(book_id = %id, comments = book.comments.len(), "added comment");
            good_response(book)
        }
        Err(e) => book_error(e, &id),
    }
}

pub async fn delete_book(State(state): State<AppState>, BookPath(id): BookPath) -> Response {
    match state.db.delete_book(&id).await {
        Ok(()) => {
            tracing::info!(book_id = %id, "deleted book");
            sentinel(DELETE_SUCCESSFUL)
        }
        Err(e) => book_error(e, &id),
    }
}
