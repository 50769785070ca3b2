//! Persistent moderation stores for Warden.
//!
//! [`PatternStore`] holds the forbidden-pattern list and the set of
//! moderation-enabled groups, swapped atomically on reload.
//! [`KeywordStore`] is the per-group keyword→reply table backed by one
//! record file per group.

pub mod keyword_store;
pub mod pattern_store;

pub use keyword_store::{AddOutcome, DeleteOutcome, KeywordStore, StoreError};
pub use pattern_store::PatternStore;
