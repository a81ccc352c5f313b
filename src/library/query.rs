//! Search and collection filtering over references.

use std::fmt;

use super::reference::Reference;
use super::repository::ReferenceRepository;

/// Label shown for the "no collection filter" entry.
pub const ALL_COLLECTIONS: &str = "All";

/// Which collection the visible list is restricted to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum CollectionFilter {
    #[default]
    All,
    Named(String),
}

impl CollectionFilter {
    /// Parse a selector coming from the presentation layer, where the
    /// sentinel label stands for "all".
    ///
    /// A user collection literally named `"All"` shares the sentinel's label,
    /// so parsing that label always yields [`CollectionFilter::All`]. Callers
    /// that need to select such a collection should keep the selector values
    /// returned by [`collections`] instead of round-tripping labels.
    pub fn from_label(label: &str) -> Self {
        if label == ALL_COLLECTIONS {
            CollectionFilter::All
        } else {
            CollectionFilter::Named(label.to_string())
        }
    }

    pub fn label(&self) -> &str {
        match self {
            CollectionFilter::All => ALL_COLLECTIONS,
            CollectionFilter::Named(name) => name,
        }
    }

    pub fn matches(&self, reference: &Reference) -> bool {
        match self {
            CollectionFilter::All => true,
            CollectionFilter::Named(name) => reference.collection == *name,
        }
    }
}

impl fmt::Display for CollectionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Keep references matching both the search text and the collection.
///
/// The search is a case-insensitive substring match over title, prompt and
/// tags. Input order is preserved.
pub fn filter<'a, I>(all: I, query: &str, collection: &CollectionFilter) -> Vec<&'a Reference>
where
    I: IntoIterator<Item = &'a Reference>,
{
    let needle = query.trim().to_lowercase();

    all.into_iter()
        .filter(|r| collection.matches(r))
        .filter(|r| needle.is_empty() || matches_text(r, &needle))
        .collect()
}

fn matches_text(reference: &Reference, needle: &str) -> bool {
    reference.title.to_lowercase().contains(needle)
        || reference.prompt.to_lowercase().contains(needle)
        || reference
            .tags
            .iter()
            .any(|tag| tag.to_lowercase().contains(needle))
}

/// Collection selectors for the sidebar: `All` first, then each distinct
/// collection in the order it is first seen.
pub fn collections<'a, I>(all: I) -> Vec<CollectionFilter>
where
    I: IntoIterator<Item = &'a Reference>,
{
    let mut result = vec![CollectionFilter::All];
    for reference in all {
        let named = CollectionFilter::Named(reference.collection.clone());
        if !result.contains(&named) {
            result.push(named);
        }
    }
    result
}

/// Counts shown above the reference grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LibraryStats {
    /// References currently visible.
    pub references: usize,
    /// Distinct collections in the whole library.
    pub collections: usize,
}

/// The active search text and collection selection.
#[derive(Debug, Clone, Default)]
pub struct LibraryView {
    pub query: String,
    pub collection: CollectionFilter,
}

impl LibraryView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visible<'a>(&self, repo: &'a ReferenceRepository) -> Vec<&'a Reference> {
        filter(repo.list(), &self.query, &self.collection)
    }

    pub fn collections(&self, repo: &ReferenceRepository) -> Vec<CollectionFilter> {
        collections(repo.list())
    }

    pub fn stats(&self, repo: &ReferenceRepository) -> LibraryStats {
        LibraryStats {
            references: self.visible(repo).len(),
            collections: self.collections(repo).len() - 1,
        }
    }

    /// Whether a search or collection restriction is active.
    pub fn is_filtered(&self) -> bool {
        !self.query.trim().is_empty() || self.collection != CollectionFilter::All
    }
}
