//! Record domain model.
//!
//! # Responsibility
//! - Define [`record::HistoricalRecord`], the unit every depot stores.
//! - Define [`filter::RecordFilter`], the persisted viewer filter.
//!
//! # Invariants
//! - A record's `since`/`until` span always follows its `time` phrases.

pub mod filter;
pub mod record;
