//! One user-facing extraction workflow.

use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::AbortHandle;

use super::progress::{spawn_ticker, ProgressPolicy};
use super::{Generation, ImagePayload, SessionSnapshot, SessionState};
use crate::config::Config;
use crate::error::SessionError;
use crate::ocr::TextRecognitionEngine;

/// Drives the recognition engine for a scanning dialog.
///
/// `start` returns immediately; state changes and progress are published
/// through [`ExtractionSession::subscribe`]. Every attempt gets a new
/// [`Generation`] and only the latest one may change the visible state.
///
/// `start` spawns tasks and must be called from within a Tokio runtime.
pub struct ExtractionSession {
    engine: Arc<TextRecognitionEngine>,
    max_image_bytes: u64,
    progress: ProgressPolicy,
    state: Arc<watch::Sender<SessionSnapshot>>,
    ticker: Option<AbortHandle>,
}

impl ExtractionSession {
    pub fn new(
        engine: Arc<TextRecognitionEngine>,
        max_image_bytes: u64,
        progress: ProgressPolicy,
    ) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::default());
        Self {
            engine,
            max_image_bytes,
            progress,
            state: Arc::new(state),
            ticker: None,
        }
    }

    pub fn from_config(engine: Arc<TextRecognitionEngine>, config: &Config) -> Self {
        Self::new(
            engine,
            config.ocr.max_image_bytes,
            ProgressPolicy::from_config(&config.progress),
        )
    }

    /// Begin extracting text from `image`, superseding any attempt in flight.
    pub fn start(&mut self, image: ImagePayload) -> Result<Generation, SessionError> {
        image.validate(self.max_image_bytes)?;
        self.stop_ticker();

        let mut generation = Generation::default();
        let start = self.progress.start;
        self.state.send_modify(|snapshot| {
            generation = snapshot.generation.next();
            *snapshot = SessionSnapshot {
                generation,
                state: SessionState::Processing,
                progress: start,
            };
        });
        tracing::debug!(generation = generation.0, size = image.size(), "Extraction started");

        let ticker = spawn_ticker(self.state.clone(), generation, self.progress).abort_handle();
        self.ticker = Some(ticker.clone());

        let engine = self.engine.clone();
        let state = self.state.clone();
        tokio::spawn(async move {
            let result = engine.recognize(image.bytes()).await;
            ticker.abort();

            let applied = state.send_if_modified(|snapshot| {
                if snapshot.generation != generation || !snapshot.state.is_processing() {
                    return false;
                }
                snapshot.progress = 100;
                snapshot.state = match result {
                    Ok(text) => SessionState::Ready(text),
                    Err(e) => SessionState::Failed(e),
                };
                true
            });

            if !applied {
                tracing::debug!(generation = generation.0, "Discarded stale extraction result");
                return;
            }
            let outcome = state.borrow().state.clone();
            match outcome {
                SessionState::Failed(e) => {
                    tracing::warn!(generation = generation.0, error = %e, "Extraction failed")
                }
                other => tracing::info!(
                    generation = generation.0,
                    state = other.name(),
                    "Extraction finished"
                ),
            }
        });

        Ok(generation)
    }

    /// Take the extracted text. Only valid once recognition produced text;
    /// the session is finished afterwards.
    pub fn accept(&mut self) -> Result<String, SessionError> {
        let mut accepted = None;
        self.state.send_if_modified(|snapshot| {
            if !matches!(&snapshot.state, SessionState::Ready(text) if !text.is_empty()) {
                return false;
            }
            if let SessionState::Ready(text) =
                std::mem::replace(&mut snapshot.state, SessionState::Disposed)
            {
                accepted = Some(text);
            }
            true
        });

        accepted.ok_or_else(|| SessionError::NotReady {
            state: self.state.borrow().state.name(),
        })
    }

    /// Return to idle, discarding staged text. A recognition call still in
    /// flight keeps running but its result is ignored.
    pub fn reset(&mut self) {
        self.stop_ticker();
        self.state.send_modify(|snapshot| {
            *snapshot = SessionSnapshot {
                generation: snapshot.generation.next(),
                state: SessionState::Idle,
                progress: 0,
            };
        });
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().state.clone()
    }

    pub fn progress(&self) -> u8 {
        self.state.borrow().progress
    }

    /// Receiver notified on every state or progress change.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    /// Wait until the current attempt leaves `Processing`.
    pub async fn settled(&self) -> SessionSnapshot {
        let mut rx = self.state.subscribe();
        let generation = rx.borrow().generation;

        let settled = rx
            .wait_for(|s| s.generation != generation || !s.state.is_processing())
            .await
            .map(|snapshot| snapshot.clone());

        // The sender lives in `self`, so the channel cannot close here
        settled.unwrap_or_else(|_| self.snapshot())
    }

    fn stop_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }
}

impl Drop for ExtractionSession {
    fn drop(&mut self) {
        self.stop_ticker();
    }
}
