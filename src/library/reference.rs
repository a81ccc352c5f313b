//! Types for prompt references and their drafts.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier of a stored reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReferenceId(pub u64);

impl fmt::Display for ReferenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of generated media a reference points at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    #[default]
    Photo,
    Video,
}

/// Where the referenced image lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageHandle(String);

impl ImageHandle {
    /// Wrap an existing URI (remote URL, file path or data URI).
    pub fn from_uri(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    /// Inline an uploaded image as a `data:` URI.
    pub fn from_bytes(mime_type: &str, bytes: &[u8]) -> Self {
        if bytes.is_empty() {
            return Self(String::new());
        }
        Self(format!("data:{};base64,{}", mime_type, BASE64.encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    pub fn is_inline(&self) -> bool {
        self.0.starts_with("data:")
    }
}

/// Ordered set of tags.
///
/// Tags are trimmed on insert. Blank tags and exact duplicates are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tags(Vec<String>);

impl Tags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the tag was added.
    pub fn insert(&mut self, tag: &str) -> bool {
        let tag = tag.trim();
        if tag.is_empty() || self.contains(tag) {
            return false;
        }
        self.0.push(tag.to_string());
        true
    }

    /// Returns true if the tag was present.
    pub fn remove(&mut self, tag: &str) -> bool {
        let before = self.0.len();
        self.0.retain(|t| t != tag);
        self.0.len() != before
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.iter().any(|t| t == tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// First `n` tags, for compact cards.
    pub fn preview(&self, n: usize) -> &[String] {
        &self.0[..n.min(self.0.len())]
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for Tags {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut tags = Tags::new();
        for tag in iter {
            tags.insert(tag.as_ref());
        }
        tags
    }
}

/// A stored prompt reference. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub id: ReferenceId,
    pub title: String,
    pub prompt: String,
    pub image: ImageHandle,
    pub tags: Tags,
    pub collection: String,
    pub media_type: MediaType,
    pub model: Option<String>,
    pub parameters: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Everything a caller supplies to create a reference.
#[derive(Debug, Clone, Default)]
pub struct ReferenceDraft {
    pub title: String,
    pub prompt: String,
    pub image: Option<ImageHandle>,
    pub tags: Tags,
    pub collection: String,
    /// Photo when omitted.
    pub media_type: Option<MediaType>,
    pub model: Option<String>,
    pub parameters: Option<String>,
}

impl ReferenceDraft {
    pub fn new(
        title: impl Into<String>,
        prompt: impl Into<String>,
        image: ImageHandle,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            prompt: prompt.into(),
            image: Some(image),
            collection: collection.into(),
            ..Default::default()
        }
    }

    pub fn with_tags<S: AsRef<str>>(mut self, tags: impl IntoIterator<Item = S>) -> Self {
        for tag in tags {
            self.tags.insert(tag.as_ref());
        }
        self
    }

    pub fn with_media_type(mut self, media_type: MediaType) -> Self {
        self.media_type = Some(media_type);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_parameters(mut self, parameters: impl Into<String>) -> Self {
        self.parameters = Some(parameters.into());
        self
    }

    /// Replace the prompt with text accepted from an extraction session.
    pub fn apply_extracted_prompt(&mut self, text: impl Into<String>) {
        self.prompt = text.into();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_ignore_blank_and_duplicates() {
        let mut tags = Tags::new();
        assert!(tags.insert("neon"));
        assert!(tags.insert("  portrait "));
        assert!(!tags.insert("neon"));
        assert!(!tags.insert(" neon"));
        assert!(!tags.insert("   "));
        assert!(tags.insert("Neon"));

        let collected: Vec<&str> = tags.iter().collect();
        assert_eq!(collected, vec!["neon", "portrait", "Neon"]);
    }

    #[test]
    fn test_tags_remove_and_preview() {
        let mut tags: Tags = ["a", "b", "c", "d"].into_iter().collect();
        assert_eq!(tags.preview(3), ["a", "b", "c"]);
        assert_eq!(tags.preview(10).len(), 4);

        assert!(tags.remove("b"));
        assert!(!tags.remove("b"));
        assert_eq!(tags.len(), 3);
    }

    #[test]
    fn test_image_handle_from_bytes() {
        let handle = ImageHandle::from_bytes("image/png", &[1, 2, 3]);
        assert!(handle.is_inline());
        assert_eq!(handle.as_str(), "data:image/png;base64,AQID");

        assert!(ImageHandle::from_bytes("image/png", &[]).is_empty());
        assert!(!ImageHandle::from_uri("https://example.com/a.png").is_inline());
    }

    #[test]
    fn test_draft_defaults_to_photo() {
        let draft = ReferenceDraft::new("t", "p", ImageHandle::from_uri("x"), "c");
        assert_eq!(draft.media_type.unwrap_or_default(), MediaType::Photo);
    }
}
