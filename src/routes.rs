use axum::{Router, routing::get};

use crate::handler::{self, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/books",
            get(handler::list_books)
                .post(handler::create_book)
                .delete(handler::delete_books),
        )
        .route(
            "/books/:id",
            get(handler::get_book)
                .post(handler::add_comment)
                .delete(handler::delete_book),
        )
}

/// The full application as served: healthcheck at `/`, books under `/api`.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(handler::healthcheck))
        .nest("/api", routes())
        .with_state(state)
}
