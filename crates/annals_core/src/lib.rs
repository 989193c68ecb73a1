//! Core engine for Annals historical timelines.
//! Turns label-tag record text into records on one integer timeline and
//! answers range and tag queries over them.

pub mod depot;
pub mod logging;
pub mod model;
pub mod service;
pub mod text;
pub mod time;

pub use depot::history::History;
pub use depot::loader::{
    DepotError, DepotResult, LoadCounts, LoadReport, LoaderOptions, RECORD_FILE_EXTENSION,
};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::filter::{FilterError, RecordFilter};
pub use model::record::{dump_records, HistoricalRecord};
pub use service::editor::{RecordEditAgent, RecordEditSession};
pub use text::label_tag::{LabelTagError, LabelTagMap, LabelTagPairs, LabelTagParse};
pub use time::calendar::{CalendarDateTime, CalendarOffset, Tick};
pub use time::phrase::{phrase_range, phrase_to_ticks, DatePhraseParser, PhraseError};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
