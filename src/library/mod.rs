//! Prompt reference library
//!
//! Holds the reference entity model, the in-memory repository and the
//! search/collection filtering used to compute the visible list.

pub mod query;
pub mod reference;
pub mod repository;

pub use query::{
    collections, filter, CollectionFilter, LibraryStats, LibraryView, ALL_COLLECTIONS,
};
pub use reference::{ImageHandle, MediaType, Reference, ReferenceDraft, ReferenceId, Tags};
pub use repository::ReferenceRepository;
