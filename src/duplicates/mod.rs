//! Duplicate detection.
//!
//! - Size pre-grouping and key-based grouping ([`groups`])
//! - The discovery-to-groups pipeline with the concurrent hasher ([`finder`])

pub mod finder;
pub mod groups;

pub use finder::{DuplicateFinder, FinderConfig, FinderError, ScanSummary};
pub use groups::{group_by_key, group_by_size, ContentKey, DuplicateGroup, GroupingStats};
