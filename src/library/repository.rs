//! In-memory store of prompt references.

use chrono::Utc;

use super::reference::{Reference, ReferenceDraft, ReferenceId};
use crate::error::{Field, ValidationError};

/// Owns every reference created during the process lifetime.
///
/// References are kept in insertion order internally and always handed out
/// newest-first.
#[derive(Debug, Default)]
pub struct ReferenceRepository {
    references: Vec<Reference>,
    /// Last id handed out; ids are never reused.
    last_id: u64,
}

impl ReferenceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate a draft and store it, assigning its id and creation time.
    pub fn create(&mut self, draft: ReferenceDraft) -> Result<Reference, ValidationError> {
        let missing = missing_fields(&draft);
        let image = match draft.image {
            Some(image) if missing.is_empty() => image,
            _ => {
                tracing::debug!(?missing, "Rejected reference draft");
                return Err(ValidationError { missing });
            }
        };

        self.last_id += 1;

        let reference = Reference {
            id: ReferenceId(self.last_id),
            title: draft.title.trim().to_string(),
            prompt: draft.prompt.trim().to_string(),
            image,
            tags: draft.tags,
            collection: draft.collection.trim().to_string(),
            media_type: draft.media_type.unwrap_or_default(),
            model: non_blank(draft.model),
            parameters: non_blank(draft.parameters),
            created_at: Utc::now(),
        };

        tracing::info!(id = %reference.id, collection = %reference.collection, "Reference created");
        self.references.push(reference.clone());
        Ok(reference)
    }

    /// All references, most recently created first.
    pub fn list(&self) -> impl DoubleEndedIterator<Item = &Reference> + ExactSizeIterator {
        self.references.iter().rev()
    }

    pub fn get(&self, id: ReferenceId) -> Option<&Reference> {
        self.references.iter().find(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }
}

fn missing_fields(draft: &ReferenceDraft) -> Vec<Field> {
    let mut missing = Vec::new();
    if draft.title.trim().is_empty() {
        missing.push(Field::Title);
    }
    if draft.prompt.trim().is_empty() {
        missing.push(Field::Prompt);
    }
    if draft.image.as_ref().map_or(true, |image| image.is_empty()) {
        missing.push(Field::Image);
    }
    if draft.collection.trim().is_empty() {
        missing.push(Field::Collection);
    }
    missing
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
