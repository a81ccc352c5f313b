//! Prompt reference library with OCR prompt extraction.
//!
//! References (an image plus the prompt that produced it) are kept in an
//! in-memory [`ReferenceRepository`] and filtered with [`library::query`].
//! Prompts printed on screenshots or photos can be read back with an
//! [`ExtractionSession`] driving a shared [`TextRecognitionEngine`].

pub mod config;
pub mod error;
pub mod extraction;
pub mod library;
pub mod logging;
pub mod ocr;

pub use config::Config;
pub use error::{ExtractionError, Field, InvalidInput, SessionError, ValidationError};
pub use extraction::{ExtractionSession, ImagePayload, Notice, SessionSnapshot, SessionState};
pub use library::{Reference, ReferenceDraft, ReferenceRepository};
pub use ocr::TextRecognitionEngine;
