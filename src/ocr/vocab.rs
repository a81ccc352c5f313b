//! Byte-level BPE detokenizer for the recognition decoder's vocabulary.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;

#[derive(Debug, Deserialize)]
struct TokenizerFile {
    model: TokenizerModel,
    #[serde(default)]
    added_tokens: Vec<AddedToken>,
}

#[derive(Debug, Deserialize)]
struct TokenizerModel {
    vocab: HashMap<String, i64>,
}

#[derive(Debug, Deserialize)]
struct AddedToken {
    id: i64,
    #[serde(default)]
    special: bool,
}

/// Maps token ids back to text.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    tokens: HashMap<i64, String>,
    special: HashSet<i64>,
    byte_decoder: HashMap<char, u8>,
}

impl Vocabulary {
    /// Load a HuggingFace `tokenizer.json`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read tokenizer {}", path.display()))?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let file: TokenizerFile =
            serde_json::from_str(json).context("Failed to parse tokenizer definition")?;

        let tokens = file
            .model
            .vocab
            .into_iter()
            .map(|(token, id)| (id, token))
            .collect();
        let special = file
            .added_tokens
            .iter()
            .filter(|t| t.special)
            .map(|t| t.id)
            .collect();

        Ok(Self {
            tokens,
            special,
            byte_decoder: byte_decoder(),
        })
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Decode ids to text, skipping special and unknown ids.
    pub fn decode(&self, ids: &[i64]) -> String {
        let mut bytes = Vec::new();

        for token in ids
            .iter()
            .filter(|&&id| !self.special.contains(&id))
            .filter_map(|id| self.tokens.get(id))
        {
            for c in token.chars() {
                match self.byte_decoder.get(&c) {
                    Some(&b) => bytes.push(b),
                    None => {
                        let mut buf = [0u8; 4];
                        bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                    }
                }
            }
        }

        String::from_utf8_lossy(&bytes).into_owned()
    }
}

/// Inverse of the GPT-2 byte-to-unicode table: printable bytes map to
/// themselves, the rest to code points from U+0100 upwards.
fn byte_decoder() -> HashMap<char, u8> {
    let mut printable: Vec<u8> = (b'!'..=b'~').collect();
    printable.extend(0xA1..=0xAC);
    printable.extend(0xAE..=0xFF);

    let mut decoder: HashMap<char, u8> = printable.iter().map(|&b| (b as char, b)).collect();

    let mut next = 256u32;
    for b in 0..=255u8 {
        if !printable.contains(&b) {
            if let Some(c) = char::from_u32(next) {
                decoder.insert(c, b);
            }
            next += 1;
        }
    }

    decoder
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKENIZER: &str = r#"{
        "added_tokens": [
            {"id": 0, "content": "<s>", "special": true},
            {"id": 1, "content": "<pad>", "special": true},
            {"id": 2, "content": "</s>", "special": true}
        ],
        "model": {
            "type": "BPE",
            "vocab": {
                "<s>": 0, "<pad>": 1, "</s>": 2,
                "Neon": 10, "Ġcity": 11, "Ġcaf": 12, "Ã©": 13, "Ċ": 14, "--": 15, "ar": 16
            }
        }
    }"#;

    #[test]
    fn test_decode_spaces_and_specials() {
        let vocab = Vocabulary::from_json(TOKENIZER).unwrap();
        assert_eq!(vocab.len(), 10);
        assert_eq!(vocab.decode(&[0, 10, 11, 2, 1]), "Neon city");
    }

    #[test]
    fn test_decode_multibyte() {
        let vocab = Vocabulary::from_json(TOKENIZER).unwrap();
        assert_eq!(vocab.decode(&[12, 13]), " café");
        assert_eq!(vocab.decode(&[15, 16, 14]), "--ar\n");
    }

    #[test]
    fn test_unknown_ids_are_skipped() {
        let vocab = Vocabulary::from_json(TOKENIZER).unwrap();
        assert_eq!(vocab.decode(&[10, 9999]), "Neon");
        assert_eq!(vocab.decode(&[]), "");
    }

    #[test]
    fn test_byte_decoder_covers_all_bytes() {
        let decoder = byte_decoder();
        assert_eq!(decoder.len(), 256);
        assert_eq!(decoder.get(&'Ġ'), Some(&b' '));
        assert_eq!(decoder.get(&'Ċ'), Some(&b'\n'));
    }
}
