//! Text recognition engine with lazy, memoized pipeline construction.

use std::sync::Arc;
use tokio::sync::OnceCell;

use super::backend::{self, Backend, PipelineLoader, Recognizer};
use super::preprocess::decode_image;
use super::trocr::TrOcrLoader;
use crate::config::OcrConfig;
use crate::error::ExtractionError;

/// Initialization state as seen by callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineStatus {
    Uninitialized,
    Ready(Backend),
    PermanentlyFailed(String),
}

#[derive(Clone)]
struct LoadedPipeline {
    backend: Backend,
    recognizer: Arc<dyn Recognizer>,
}

/// Turns image bytes into text.
///
/// The pipeline is built on first use and shared by every caller for the
/// engine's lifetime. A failed initialization is remembered: later calls
/// fail with the same error instead of retrying.
pub struct TextRecognitionEngine {
    loader: Arc<dyn PipelineLoader>,
    prefer_hardware: bool,
    pipeline: OnceCell<Result<LoadedPipeline, ExtractionError>>,
}

impl TextRecognitionEngine {
    pub fn new(loader: Arc<dyn PipelineLoader>, prefer_hardware: bool) -> Self {
        Self {
            loader,
            prefer_hardware,
            pipeline: OnceCell::new(),
        }
    }

    /// Engine backed by the TrOCR model described in `config`.
    pub fn from_config(config: &OcrConfig) -> Self {
        Self::new(
            Arc::new(TrOcrLoader::new(config.clone())),
            config.prefer_hardware,
        )
    }

    pub fn status(&self) -> EngineStatus {
        match self.pipeline.get() {
            None => EngineStatus::Uninitialized,
            Some(Ok(loaded)) => EngineStatus::Ready(loaded.backend),
            Some(Err(e)) => EngineStatus::PermanentlyFailed(e.message.clone()),
        }
    }

    /// Build the pipeline ahead of the first `recognize`.
    pub async fn warm_up(&self) -> Result<Backend, ExtractionError> {
        self.pipeline().await.map(|loaded| loaded.backend)
    }

    /// Recognize the text in an encoded image, whitespace-normalized.
    pub async fn recognize(&self, image: &[u8]) -> Result<String, ExtractionError> {
        let recognizer = self.pipeline().await?.recognizer;
        let bytes = image.to_vec();

        let output = tokio::task::spawn_blocking(move || {
            let img = decode_image(&bytes)?;
            recognizer.recognize(&img)
        })
        .await
        .map_err(|e| ExtractionError::new(format!("Recognition task failed: {e}")))??;

        let text = output.into_text();
        tracing::debug!(chars = text.len(), "Recognition finished");
        Ok(text)
    }

    async fn pipeline(&self) -> Result<LoadedPipeline, ExtractionError> {
        let loaded = self
            .pipeline
            .get_or_init(|| async {
                let loader = self.loader.clone();
                let prefer_hardware = self.prefer_hardware;

                let built = tokio::task::spawn_blocking(move || {
                    backend::initialize(loader.as_ref(), prefer_hardware)
                })
                .await;

                match built {
                    Ok(Ok((backend, recognizer))) => Ok(LoadedPipeline {
                        backend,
                        recognizer,
                    }),
                    Ok(Err(message)) => Err(ExtractionError::new(message)),
                    Err(e) => Err(ExtractionError::new(format!(
                        "Pipeline initialization task failed: {e}"
                    ))),
                }
            })
            .await;

        loaded.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::backend::{Fragment, RecognitionOutput};
    use crate::ocr::testing::{png_bytes, ScriptedLoader, ScriptedRecognizer};
    use anyhow::anyhow;
    use image::GenericImageView;
    use std::time::Duration;

    fn engine_with(loader: Arc<ScriptedLoader>) -> TextRecognitionEngine {
        TextRecognitionEngine::new(loader, true)
    }

    #[tokio::test]
    async fn test_pipeline_built_lazily_once() {
        let loader = Arc::new(ScriptedLoader::new());
        let engine = engine_with(loader.clone());
        assert_eq!(engine.status(), EngineStatus::Uninitialized);
        assert!(loader.attempts().is_empty());

        let image = png_bytes(8, 8);
        assert_eq!(engine.recognize(&image).await.unwrap(), "scripted text");
        assert_eq!(engine.recognize(&image).await.unwrap(), "scripted text");

        assert_eq!(loader.attempts(), vec![Backend::Accelerated]);
        assert_eq!(engine.status(), EngineStatus::Ready(Backend::Accelerated));
        assert_eq!(loader.recognizer().calls(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_calls_share_one_construction() {
        let loader = Arc::new(
            ScriptedLoader::new()
                .failing(Backend::Accelerated)
                .with_load_delay(Duration::from_millis(50)),
        );
        let engine = Arc::new(engine_with(loader.clone()));
        let image = Arc::new(png_bytes(4, 4));

        let calls: Vec<_> = (0..8)
            .map(|_| {
                let engine = engine.clone();
                let image = image.clone();
                tokio::spawn(async move { engine.recognize(&image).await })
            })
            .collect();

        for call in calls {
            assert_eq!(call.await.unwrap().unwrap(), "scripted text");
        }
        assert_eq!(loader.attempts(), vec![Backend::Accelerated, Backend::Cpu]);
        assert_eq!(engine.status(), EngineStatus::Ready(Backend::Cpu));
    }

    #[tokio::test]
    async fn test_permanent_failure_fails_fast() {
        let loader = Arc::new(
            ScriptedLoader::new()
                .failing(Backend::Accelerated)
                .failing(Backend::Cpu),
        );
        let engine = engine_with(loader.clone());
        let image = png_bytes(4, 4);

        let first = engine.recognize(&image).await.unwrap_err();
        let second = engine.recognize(&image).await.unwrap_err();

        assert_eq!(first, second);
        assert!(first.message.contains("cpu backend unavailable"));
        assert_eq!(loader.attempts().len(), 2);
        assert!(matches!(engine.status(), EngineStatus::PermanentlyFailed(_)));
        assert!(engine.warm_up().await.is_err());
    }

    #[tokio::test]
    async fn test_decode_failure_is_extraction_error() {
        let loader = Arc::new(ScriptedLoader::new());
        let engine = engine_with(loader.clone());

        let err = engine.recognize(b"not an image").await.unwrap_err();
        assert!(err.message.contains("Failed to decode image"));
        assert_eq!(loader.recognizer().calls(), 0);

        // The pipeline itself is still usable
        assert!(engine.recognize(&png_bytes(2, 2)).await.is_ok());
    }

    #[tokio::test]
    async fn test_inference_failure_is_wrapped() {
        let loader = Arc::new(ScriptedLoader::with_recognizer(ScriptedRecognizer::new(
            |_| Err(anyhow!("out of memory")),
        )));
        let engine = engine_with(loader);

        let err = engine.recognize(&png_bytes(2, 2)).await.unwrap_err();
        assert_eq!(err.to_string(), "text extraction failed: out of memory");
    }

    #[tokio::test]
    async fn test_fragments_are_joined() {
        let loader = Arc::new(ScriptedLoader::with_recognizer(ScriptedRecognizer::new(
            |img| {
                assert_eq!(img.dimensions(), (3, 9));
                Ok(RecognitionOutput::Fragments(vec![
                    Fragment::new("neon\nhair"),
                    Fragment::empty(),
                    Fragment::new("  --ar 1:1"),
                ]))
            },
        )));
        let engine = engine_with(loader);

        let text = engine.recognize(&png_bytes(3, 9)).await.unwrap();
        assert_eq!(text, "neon hair --ar 1:1");
    }

    #[tokio::test]
    async fn test_warm_up_reports_backend() {
        let loader = Arc::new(ScriptedLoader::new());
        let engine = TextRecognitionEngine::new(loader.clone(), false);

        assert_eq!(engine.warm_up().await.unwrap(), Backend::Cpu);
        engine.recognize(&png_bytes(2, 2)).await.unwrap();
        assert_eq!(loader.attempts(), vec![Backend::Cpu]);
    }
}
