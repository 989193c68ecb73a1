//! Record depots.
//!
//! # Responsibility
//! - [`loader`]: boundary I/O between record files and records.
//! - [`history`]: the in-memory collection the viewer queries and edits.

pub mod history;
pub mod loader;
