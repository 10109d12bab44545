//! Corpus handling for Scholar.
//!
//! - `quota`: how many papers to take from each weighted category
//! - `records`: the JSONL paper records the corpus is stored as
//! - `build`: embedding the corpus into a flat index

pub mod build;
pub mod quota;
pub mod records;

pub use build::{BuildReport, IndexBuilder};
pub use quota::{CategoryTarget, allocate_quotas, cutoff_year, plan_fetch};
pub use records::{PaperRecord, RowError, read_records, write_jsonl};
