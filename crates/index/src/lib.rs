//! Vector index for Scholar.
//!
//! `FlatIndex` is an exact brute-force index persisted as JSON lines, one
//! row per embedded paper. It implements `scholar_core::VectorIndex`, which is
//! all the retrieval pipeline depends on.

pub mod flat;
pub mod vector;

pub use flat::{FlatIndex, IndexManifest, IndexedDocument, write_collection};
pub use vector::{cosine_distance, cosine_similarity, normalize};
