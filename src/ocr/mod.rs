//! Optical character recognition
//!
//! Reads printed prompt text out of photographed or uploaded images using a
//! pre-trained TrOCR model on ONNX Runtime:
//! - lazy model download and pipeline construction
//! - accelerated backend with CPU fallback
//! - tiling of tall images

pub mod backend;
pub mod engine;
mod models;
pub mod preprocess;
pub mod trocr;
mod vocab;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{
    normalize_whitespace, Backend, Fragment, InitStage, PipelineLoader, RecognitionOutput,
    Recognizer,
};
pub use engine::{EngineStatus, TextRecognitionEngine};
pub use trocr::{TrOcrLoader, TrOcrPipeline};
