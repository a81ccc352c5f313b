//! Pipeline construction with accelerated-to-CPU backend fallback.

use anyhow::Result;
use image::DynamicImage;
use std::fmt;
use std::sync::Arc;

/// Compute substrate a pipeline runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// GPU execution provider.
    Accelerated,
    /// General-purpose CPU execution provider.
    Cpu,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Accelerated => f.write_str("accelerated"),
            Backend::Cpu => f.write_str("cpu"),
        }
    }
}

/// Text read from one region of an image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fragment {
    pub text: Option<String>,
}

impl Fragment {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
        }
    }

    pub fn empty() -> Self {
        Self { text: None }
    }
}

/// Raw pipeline output: one result, or one per tile when the image was split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionOutput {
    Single(Fragment),
    Fragments(Vec<Fragment>),
}

impl RecognitionOutput {
    /// Join fragment texts with single spaces and collapse whitespace.
    pub fn into_text(self) -> String {
        let joined = match self {
            RecognitionOutput::Single(fragment) => fragment.text.unwrap_or_default(),
            RecognitionOutput::Fragments(fragments) => fragments
                .into_iter()
                .map(|f| f.text.unwrap_or_default())
                .collect::<Vec<_>>()
                .join(" "),
        };
        normalize_whitespace(&joined)
    }
}

/// Collapse runs of whitespace into one space and trim the ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A constructed, ready-to-run recognition pipeline.
pub trait Recognizer: Send + Sync {
    fn recognize(&self, image: &DynamicImage) -> Result<RecognitionOutput>;
}

/// Builds a pipeline for a given backend. Called at most once per backend
/// during engine initialization.
pub trait PipelineLoader: Send + Sync {
    fn load(&self, backend: Backend) -> Result<Arc<dyn Recognizer>>;
}

/// Steps of pipeline initialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitStage {
    AttemptHardware,
    AttemptSoftwareFallback,
    Ready(Backend),
    PermanentlyFailed(String),
}

impl InitStage {
    pub fn initial(prefer_hardware: bool) -> Self {
        if prefer_hardware {
            InitStage::AttemptHardware
        } else {
            InitStage::AttemptSoftwareFallback
        }
    }

    /// Backend to try in this stage, if it is an attempt.
    pub fn backend(&self) -> Option<Backend> {
        match self {
            InitStage::AttemptHardware => Some(Backend::Accelerated),
            InitStage::AttemptSoftwareFallback => Some(Backend::Cpu),
            InitStage::Ready(_) | InitStage::PermanentlyFailed(_) => None,
        }
    }

    /// Stage that follows the outcome of the current attempt.
    /// Terminal stages never change.
    pub fn advance(self, outcome: std::result::Result<(), String>) -> InitStage {
        match (self, outcome) {
            (InitStage::AttemptHardware, Ok(())) => InitStage::Ready(Backend::Accelerated),
            (InitStage::AttemptHardware, Err(_)) => InitStage::AttemptSoftwareFallback,
            (InitStage::AttemptSoftwareFallback, Ok(())) => InitStage::Ready(Backend::Cpu),
            (InitStage::AttemptSoftwareFallback, Err(message)) => {
                InitStage::PermanentlyFailed(message)
            }
            (terminal, _) => terminal,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.backend().is_none()
    }
}

/// Walk the stages until a pipeline is built or every backend has failed.
pub fn initialize(
    loader: &dyn PipelineLoader,
    prefer_hardware: bool,
) -> std::result::Result<(Backend, Arc<dyn Recognizer>), String> {
    let mut stage = InitStage::initial(prefer_hardware);
    let mut pipeline = None;

    while let Some(backend) = stage.backend() {
        tracing::info!(%backend, "Initializing text recognition pipeline");
        let outcome = match loader.load(backend) {
            Ok(built) => {
                pipeline = Some(built);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(%backend, error = %format!("{e:#}"), "Pipeline initialization failed");
                Err(format!("{e:#}"))
            }
        };
        stage = stage.advance(outcome);
    }

    match (stage, pipeline) {
        (InitStage::Ready(backend), Some(pipeline)) => {
            tracing::info!(%backend, "Text recognition pipeline ready");
            Ok((backend, pipeline))
        }
        (InitStage::PermanentlyFailed(message), _) => {
            tracing::error!(error = %message, "No usable backend for text recognition");
            Err(message)
        }
        (stage, _) => Err(format!("Pipeline initialization ended in {stage:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::testing::ScriptedLoader;

    #[test]
    fn test_stage_transitions() {
        let stage = InitStage::initial(true);
        assert_eq!(stage, InitStage::AttemptHardware);
        assert_eq!(
            stage.clone().advance(Ok(())),
            InitStage::Ready(Backend::Accelerated)
        );

        let fallback = stage.advance(Err("no driver".to_string()));
        assert_eq!(fallback, InitStage::AttemptSoftwareFallback);
        assert_eq!(fallback.clone().advance(Ok(())), InitStage::Ready(Backend::Cpu));
        assert_eq!(
            fallback.advance(Err("out of memory".to_string())),
            InitStage::PermanentlyFailed("out of memory".to_string())
        );

        let failed = InitStage::PermanentlyFailed("x".to_string());
        assert!(failed.is_terminal());
        assert_eq!(failed.clone().advance(Ok(())), failed);
    }

    #[test]
    fn test_skip_hardware_when_not_preferred() {
        assert_eq!(InitStage::initial(false), InitStage::AttemptSoftwareFallback);

        let loader = ScriptedLoader::new();
        let (backend, _) = initialize(&loader, false).unwrap();
        assert_eq!(backend, Backend::Cpu);
        assert_eq!(loader.attempts(), vec![Backend::Cpu]);
    }

    #[test]
    fn test_hardware_success_stops_early() {
        let loader = ScriptedLoader::new();
        let (backend, _) = initialize(&loader, true).unwrap();
        assert_eq!(backend, Backend::Accelerated);
        assert_eq!(loader.attempts(), vec![Backend::Accelerated]);
    }

    #[test]
    fn test_falls_back_to_cpu_once() {
        let loader = ScriptedLoader::new().failing(Backend::Accelerated);
        let (backend, _) = initialize(&loader, true).unwrap();
        assert_eq!(backend, Backend::Cpu);
        assert_eq!(loader.attempts(), vec![Backend::Accelerated, Backend::Cpu]);
    }

    #[test]
    fn test_both_backends_fail() {
        let loader = ScriptedLoader::new()
            .failing(Backend::Accelerated)
            .failing(Backend::Cpu);
        let err = initialize(&loader, true).err().unwrap();
        assert!(err.contains("cpu backend unavailable"));
        assert_eq!(loader.attempts().len(), 2);
    }

    #[test]
    fn test_output_shapes_normalize_alike() {
        let single = RecognitionOutput::Single(Fragment::new("  a cyberpunk\n\tportrait "));
        assert_eq!(single.into_text(), "a cyberpunk portrait");

        let tiled = RecognitionOutput::Fragments(vec![
            Fragment::new("a cyberpunk"),
            Fragment::empty(),
            Fragment::new(" portrait  "),
        ]);
        assert_eq!(tiled.into_text(), "a cyberpunk portrait");

        assert_eq!(RecognitionOutput::Single(Fragment::empty()).into_text(), "");
        assert_eq!(RecognitionOutput::Fragments(Vec::new()).into_text(), "");
    }
}
