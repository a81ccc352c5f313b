//! Scripted pipelines for exercising the engine and sessions without ONNX.

use anyhow::{anyhow, Result};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::backend::{Backend, Fragment, PipelineLoader, RecognitionOutput, Recognizer};

/// Encode a solid image of the given size as PNG.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

type Script = dyn Fn(&DynamicImage) -> Result<RecognitionOutput> + Send + Sync;

/// Recognizer whose answer is computed from the decoded image.
pub struct ScriptedRecognizer {
    script: Box<Script>,
    calls: AtomicUsize,
}

impl ScriptedRecognizer {
    pub fn new(
        script: impl Fn(&DynamicImage) -> Result<RecognitionOutput> + Send + Sync + 'static,
    ) -> Self {
        Self {
            script: Box::new(script),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn text(text: &'static str) -> Self {
        Self::new(move |_| Ok(RecognitionOutput::Single(Fragment::new(text))))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Recognizer for ScriptedRecognizer {
    fn recognize(&self, image: &DynamicImage) -> Result<RecognitionOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.script)(image)
    }
}

/// Loader that records attempts and can be told to fail per backend.
pub struct ScriptedLoader {
    recognizer: Arc<ScriptedRecognizer>,
    failing: Vec<Backend>,
    load_delay: Duration,
    attempts: Mutex<Vec<Backend>>,
}

impl ScriptedLoader {
    pub fn new() -> Self {
        Self::with_recognizer(ScriptedRecognizer::text("scripted text"))
    }

    pub fn with_recognizer(recognizer: ScriptedRecognizer) -> Self {
        Self {
            recognizer: Arc::new(recognizer),
            failing: Vec::new(),
            load_delay: Duration::ZERO,
            attempts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(mut self, backend: Backend) -> Self {
        self.failing.push(backend);
        self
    }

    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = delay;
        self
    }

    pub fn attempts(&self) -> Vec<Backend> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn recognizer(&self) -> Arc<ScriptedRecognizer> {
        self.recognizer.clone()
    }
}

impl PipelineLoader for ScriptedLoader {
    fn load(&self, backend: Backend) -> Result<Arc<dyn Recognizer>> {
        self.attempts.lock().unwrap().push(backend);
        std::thread::sleep(self.load_delay);

        if self.failing.contains(&backend) {
            return Err(anyhow!("{} backend unavailable", backend));
        }
        Ok(self.recognizer.clone())
    }
}
