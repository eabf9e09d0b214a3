use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::BookError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub title: String,
    #[serde(rename = "_id")]
    pub id: String,
    pub comments: Vec<String>,
}

/// A book as it appears in the listing, with the number of comments
/// computed from the stored comment array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookSummary {
    pub title: String,
    #[serde(rename = "_id")]
    pub id: String,
    pub commentcount: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedBook {
    pub title: String,
    #[serde(rename = "_id")]
    pub id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateBook {
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateComment {
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookId(Uuid);

impl BookId {
    pub fn generate() -> Self {
        BookId(Uuid::new_v4())
    }

    /// Only the lowercase hyphenated form handed out at creation is accepted.
    /// Anything else is reported the same way as an unknown id.
    pub fn parse(raw: &str) -> Result<Self, BookError> {
        match Uuid::parse_str(raw) {
            Ok(id) if id.hyphenated().to_string() == raw => Ok(BookId(id)),
            _ => Err(BookError::NotFound),
        }
    }

    pub fn as_string(&self) -> String {
        self.0.hyphenated().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Title(String);

impl Title {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment(String);

impl Comment {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn required(value: Option<String>, field: &'static str) -> Result<String, BookError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(BookError::MissingField(field)),
    }
}

pub fn validate_title(input: CreateBook) -> Result<Title, BookError> {
    required(input.title, "title").map(Title)
}

pub fn validate_comment(input: CreateComment) -> Result<Comment, BookError> {
    required(input.comment, "comment").map(Comment)
}
