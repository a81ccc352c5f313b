//! Error kinds surfaced to callers of the library and extraction APIs.

use std::fmt;

use thiserror::Error;

/// A required reference field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Title,
    Prompt,
    Image,
    Collection,
}

impl Field {
    pub fn name(&self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Prompt => "prompt",
            Field::Image => "image",
            Field::Collection => "collection",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A draft was rejected because required fields were blank.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("missing required field(s): {}", join_fields(.missing))]
pub struct ValidationError {
    pub missing: Vec<Field>,
}

fn join_fields(fields: &[Field]) -> String {
    fields
        .iter()
        .map(Field::name)
        .collect::<Vec<_>>()
        .join(", ")
}

/// An image payload that can never be processed as submitted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidInput {
    #[error("image is empty")]
    EmptyImage,
    #[error("image is too large ({size} bytes, limit {limit} bytes)")]
    ImageTooLarge { size: u64, limit: u64 },
}

/// Model initialization or inference failed.
///
/// Only a human-readable message crosses the engine boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("text extraction failed: {message}")]
pub struct ExtractionError {
    pub message: String,
}

impl ExtractionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for ExtractionError {
    fn from(err: anyhow::Error) -> Self {
        // `{:#}` keeps the context chain on one line
        Self::new(format!("{err:#}"))
    }
}

/// Misuse of an extraction session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error(transparent)]
    InvalidInput(#[from] InvalidInput),
    #[error("no extracted text to accept (session is {state})")]
    NotReady { state: &'static str },
}
