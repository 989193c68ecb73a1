//! Timeline arithmetic and date text parsing.
//!
//! # Responsibility
//! - Map calendar dates (including BCE years) onto one integer timeline.
//! - Read human-written date phrases into ticks.
//!
//! # Invariants
//! - All instants are `calendar::Tick` values; there is no year 0.

pub mod calendar;
pub mod numeral;
pub mod phrase;
