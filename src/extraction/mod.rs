//! Prompt extraction sessions.
//!
//! A session stages the text read from one image until the user accepts or
//! discards it, reporting synthetic progress while recognition runs.

pub mod progress;
pub mod session;

use anyhow::{Context, Result};
use std::path::Path;

use crate::error::{ExtractionError, InvalidInput};

pub use progress::ProgressPolicy;
pub use session::ExtractionSession;

/// Tag of one extraction attempt. Results carrying an older tag are dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(pub u64);

impl Generation {
    pub fn next(self) -> Self {
        Generation(self.0 + 1)
    }
}

/// An image handed over by a file picker or camera capture.
#[derive(Debug, Clone)]
pub struct ImagePayload {
    bytes: Vec<u8>,
    declared_size: u64,
}

impl ImagePayload {
    pub fn new(bytes: Vec<u8>) -> Self {
        let declared_size = bytes.len() as u64;
        Self {
            bytes,
            declared_size,
        }
    }

    /// Payload whose size was reported separately by the collaborator.
    pub fn with_declared_size(bytes: Vec<u8>, declared_size: u64) -> Self {
        Self {
            bytes,
            declared_size,
        }
    }

    /// Read an image file, refusing files over `limit` bytes before reading them.
    pub fn from_file(path: &Path, limit: u64) -> Result<Self> {
        let declared_size = std::fs::metadata(path)
            .with_context(|| format!("Failed to stat {}", path.display()))?
            .len();
        if declared_size > limit {
            return Err(InvalidInput::ImageTooLarge {
                size: declared_size,
                limit,
            })
            .with_context(|| format!("Refusing to read {}", path.display()));
        }
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(Self::with_declared_size(bytes, declared_size))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The larger of the declared and the actual size.
    pub fn size(&self) -> u64 {
        self.declared_size.max(self.bytes.len() as u64)
    }

    pub fn validate(&self, limit: u64) -> Result<(), InvalidInput> {
        if self.bytes.is_empty() || self.declared_size == 0 {
            return Err(InvalidInput::EmptyImage);
        }
        if self.size() > limit {
            return Err(InvalidInput::ImageTooLarge {
                size: self.size(),
                limit,
            });
        }
        Ok(())
    }
}

/// Lifecycle of an extraction session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Idle,
    Processing,
    /// Recognition finished; the text is empty when nothing was detected.
    Ready(String),
    Failed(ExtractionError),
    /// The text was accepted; the session is finished.
    Disposed,
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Processing => "processing",
            SessionState::Ready(text) if text.is_empty() => "ready (nothing detected)",
            SessionState::Ready(_) => "ready",
            SessionState::Failed(_) => "failed",
            SessionState::Disposed => "disposed",
        }
    }

    pub fn is_processing(&self) -> bool {
        matches!(self, SessionState::Processing)
    }
}

/// What the presentation layer should tell the user once recognition settles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Extracted(String),
    /// Not an error: the user should retry with a clearer image.
    NothingDetected,
    Failed(ExtractionError),
}

/// Observable session state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub generation: Generation,
    pub state: SessionState,
    /// Percentage in 0..=100.
    pub progress: u8,
}

impl SessionSnapshot {
    pub fn notice(&self) -> Option<Notice> {
        match &self.state {
            SessionState::Ready(text) if text.is_empty() => Some(Notice::NothingDetected),
            SessionState::Ready(text) => Some(Notice::Extracted(text.clone())),
            SessionState::Failed(e) => Some(Notice::Failed(e.clone())),
            _ => None,
        }
    }
}
