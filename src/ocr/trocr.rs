//! TrOCR (printed text) pipeline on ONNX Runtime.
//!
//! Encoder: ViT over a 384×384 image. Decoder: autoregressive text head,
//! decoded greedily without a key/value cache.

use anyhow::{anyhow, bail, Context, Result};
use image::DynamicImage;
use ort::execution_providers::{CPUExecutionProvider, CUDAExecutionProvider};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::backend::{Backend, Fragment, PipelineLoader, RecognitionOutput, Recognizer};
use super::models::ensure_model;
use super::preprocess::{pixel_values, split_into_strips};
use super::vocab::Vocabulary;
use crate::config::OcrConfig;

const IMAGE_SIZE: u32 = 384;
const DECODER_START_TOKEN_ID: i64 = 2;
const EOS_TOKEN_ID: i64 = 2;
const PAD_TOKEN_ID: i64 = 1;

const ENCODER_FILE: &str = "onnx/encoder_model_quantized.onnx";
const DECODER_FILE: &str = "onnx/decoder_model_quantized.onnx";
const TOKENIZER_FILE: &str = "tokenizer.json";

/// Builds [`TrOcrPipeline`]s from the configured model repository.
pub struct TrOcrLoader {
    config: OcrConfig,
}

impl TrOcrLoader {
    pub fn new(config: OcrConfig) -> Self {
        Self { config }
    }

    fn fetch(&self, remote_path: &str) -> Result<PathBuf> {
        ensure_model(&self.config.model_dir, &self.config.model_base_url, remote_path)
    }
}

impl PipelineLoader for TrOcrLoader {
    fn load(&self, backend: Backend) -> Result<Arc<dyn Recognizer>> {
        let encoder_path = self.fetch(ENCODER_FILE)?;
        let decoder_path = self.fetch(DECODER_FILE)?;
        let tokenizer_path = self.fetch(TOKENIZER_FILE)?;

        let vocab = Vocabulary::load(&tokenizer_path)?;
        tracing::debug!(tokens = vocab.len(), "Loaded TrOCR vocabulary");
        let encoder = build_session(&encoder_path, backend, self.config.intra_threads)
            .context("Failed to load encoder")?;
        let decoder = build_session(&decoder_path, backend, self.config.intra_threads)
            .context("Failed to load decoder")?;

        Ok(Arc::new(TrOcrPipeline {
            encoder: Mutex::new(encoder),
            decoder: Mutex::new(decoder),
            vocab,
            max_decode_steps: self.config.max_decode_steps,
            tile_aspect: self.config.tile_aspect,
            max_tiles: self.config.max_tiles,
        }))
    }
}

fn build_session(path: &Path, backend: Backend, intra_threads: usize) -> Result<Session> {
    let builder = Session::builder()?;

    // Registration failures must surface so the CPU fallback gets a chance
    let builder = match backend {
        Backend::Accelerated => builder.with_execution_providers([
            CUDAExecutionProvider::default().build().error_on_failure(),
        ])?,
        Backend::Cpu => {
            builder.with_execution_providers([CPUExecutionProvider::default().build()])?
        }
    };

    let session = builder
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(intra_threads)?
        .commit_from_file(path)?;

    Ok(session)
}

/// Encoder output for one image strip.
struct EncoderState {
    shape: [usize; 3],
    data: Vec<f32>,
}

pub struct TrOcrPipeline {
    encoder: Mutex<Session>,
    decoder: Mutex<Session>,
    vocab: Vocabulary,
    max_decode_steps: usize,
    tile_aspect: f32,
    max_tiles: u32,
}

impl TrOcrPipeline {
    fn read_strip(&self, strip: &DynamicImage) -> Result<Fragment> {
        let encoded = self.encode(strip)?;
        let tokens = self.decode(&encoded)?;
        let text = self.vocab.decode(&tokens);

        Ok(if text.trim().is_empty() {
            Fragment::empty()
        } else {
            Fragment::new(text)
        })
    }

    fn encode(&self, strip: &DynamicImage) -> Result<EncoderState> {
        let mut encoder = self
            .encoder
            .lock()
            .map_err(|e| anyhow!("Failed to lock encoder: {}", e))?;

        let size = IMAGE_SIZE as usize;
        let input_tensor = Tensor::from_array((
            [1usize, 3, size, size],
            pixel_values(strip, IMAGE_SIZE).into_boxed_slice(),
        ))?;

        let outputs = encoder.run(ort::inputs!["pixel_values" => input_tensor])?;
        let hidden = outputs
            .get("last_hidden_state")
            .ok_or_else(|| anyhow!("Encoder outputs missing hidden state"))?;
        let (shape, data) = hidden.try_extract_tensor::<f32>()?;

        let dims: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
        let shape: [usize; 3] = dims
            .try_into()
            .map_err(|dims| anyhow!("Unexpected encoder hidden shape {:?}", dims))?;

        Ok(EncoderState {
            shape,
            data: data.to_vec(),
        })
    }

    fn decode(&self, encoded: &EncoderState) -> Result<Vec<i64>> {
        let mut decoder = self
            .decoder
            .lock()
            .map_err(|e| anyhow!("Failed to lock decoder: {}", e))?;

        let mut tokens = vec![DECODER_START_TOKEN_ID];

        for _ in 0..self.max_decode_steps {
            let ids_tensor =
                Tensor::from_array(([1usize, tokens.len()], tokens.clone().into_boxed_slice()))?;
            let hidden_tensor =
                Tensor::from_array((encoded.shape, encoded.data.clone().into_boxed_slice()))?;

            let outputs = decoder.run(ort::inputs![
                "input_ids" => ids_tensor,
                "encoder_hidden_states" => hidden_tensor
            ])?;
            let logits = outputs
                .get("logits")
                .ok_or_else(|| anyhow!("Decoder outputs missing logits"))?;
            let (shape, data) = logits.try_extract_tensor::<f32>()?;

            let next_token = select_next_token(shape, data)?;
            if next_token == EOS_TOKEN_ID || next_token == PAD_TOKEN_ID {
                break;
            }
            tokens.push(next_token);
        }

        // Drop the start token
        Ok(tokens.split_off(1))
    }
}

impl Recognizer for TrOcrPipeline {
    fn recognize(&self, image: &DynamicImage) -> Result<RecognitionOutput> {
        let mut strips = split_into_strips(image, self.tile_aspect, self.max_tiles);

        if strips.len() == 1 {
            let strip = strips.remove(0);
            return Ok(RecognitionOutput::Single(self.read_strip(&strip)?));
        }

        tracing::debug!(strips = strips.len(), "Recognizing tiled image");
        let fragments = strips
            .iter()
            .map(|strip| self.read_strip(strip))
            .collect::<Result<Vec<_>>>()?;
        Ok(RecognitionOutput::Fragments(fragments))
    }
}

/// Greedy choice over the last position of `[batch, seq, vocab]` logits.
fn select_next_token(shape: &[i64], logits: &[f32]) -> Result<i64> {
    let &[_, seq_len, vocab_size] = shape else {
        bail!("Unexpected logits shape {:?}", shape);
    };
    if seq_len <= 0 || vocab_size <= 0 {
        bail!("Decoder returned empty logits");
    }

    let vocab_size = vocab_size as usize;
    let start = (seq_len as usize - 1) * vocab_size;
    let last = logits
        .get(start..start + vocab_size)
        .ok_or_else(|| anyhow!("Logits shorter than their shape"))?;

    let (token_idx, _) = last
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .ok_or_else(|| anyhow!("Decoder logits slice was empty"))?;

    Ok(token_idx as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_next_token_uses_last_position() {
        // seq_len 2, vocab 3: first position prefers 0, last prefers 2
        let logits = [5.0, 0.0, 0.0, 0.1, 0.2, 0.9];
        assert_eq!(select_next_token(&[1, 2, 3], &logits).unwrap(), 2);
    }

    #[test]
    fn test_select_next_token_rejects_bad_shapes() {
        assert!(select_next_token(&[1, 3], &[0.0; 3]).is_err());
        assert!(select_next_token(&[1, 0, 3], &[]).is_err());
        assert!(select_next_token(&[1, 2, 3], &[0.0; 4]).is_err());
    }

    #[test]
    fn test_loader_reports_missing_models() {
        let dir = tempfile::tempdir().unwrap();
        let loader = TrOcrLoader::new(OcrConfig {
            model_dir: dir.path().to_path_buf(),
            model_base_url: "http://127.0.0.1:9".to_string(),
            ..OcrConfig::default()
        });

        let err = loader.load(Backend::Cpu).err().unwrap();
        assert!(format!("{err:#}").contains("Failed to download model"));
    }
}
