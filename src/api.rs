use axum::{
    Form, Json,
    async_trait,
    extract::{FromRequest, FromRequestParts, Path, Request},
    http::{StatusCode, header::CONTENT_TYPE, request::Parts},
    response::{IntoResponse, Response},
};
use serde::{Serialize, de::DeserializeOwned};
use std::convert::Infallible;

pub const COMPLETE_DELETE_SUCCESSFUL: &str = "complete delete successful";
pub const DELETE_SUCCESSFUL: &str = "delete successful";

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Request body accepted either as JSON or as an urlencoded form.
///
/// Bodies that fail to decode fall back to `T::default()`, so a missing
/// field surfaces through validation instead of an extractor rejection.
#[derive(Debug)]
pub struct Payload<T>(pub T);

fn is_form(req: &Request) -> bool {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map_or(false, |ct| ct.starts_with("application/x-www-form-urlencoded"))
}

#[async_trait]
impl<T, S> FromRequest<S> for Payload<T>
where
    T: DeserializeOwned + Default,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let decoded = if is_form(&req) {
            Form::<T>::from_request(req, state).await.map(|Form(v)| v).map_err(|e| e.body_text())
        } else {
            Json::<T>::from_request(req, state).await.map(|Json(v)| v).map_err(|e| e.body_text())
        };

        match decoded {
            Ok(value) => Ok(Payload(value)),
            Err(reason) => {
                tracing::debug!(reason = %reason, "undecodable request body, treating as empty");
                Ok(Payload(T::default()))
            }
        }
    }
}

/// The `:id` path segment. A segment that cannot be decoded becomes an
/// empty id, which never matches a book.
#[derive(Debug)]
pub struct BookPath(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for BookPath
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<String>::from_request_parts(parts, state).await {
            Ok(Path(id)) => Ok(BookPath(id)),
            Err(e) => {
                tracing::debug!(reason = %e.body_text(), "undecodable book id");
                Ok(BookPath(String::new()))
            }
        }
    }
}

pub fn sentinel(msg: impl Into<String>) -> Response {
    (StatusCode::OK, msg.into()).into_response()
}

pub fn good_response<T: Serialize>(body: T) -> Response {
    (StatusCode::OK, Json(body)).into_response()
}

pub fn not_found(msg: impl Into<String>) -> Response {
    (StatusCode::NOT_FOUND, msg.into()).into_response()
}

pub fn server_error(msg: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: msg.to_string(),
        }),
    )
        .into_response()
}
