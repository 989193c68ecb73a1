//! In-memory record depot.
//!
//! # Responsibility
//! - Own the records the viewer works on, keyed by uuid.
//! - Route loads and saves through [`crate::depot::loader`].
//!
//! # Invariants
//! - uuids are unique within one `History`.
//! - `upsert` keeps the position of replaced records; new ones append.

use crate::depot::loader::{self, LoadCounts, LoadReport, LoaderOptions};
use crate::model::filter::RecordFilter;
use crate::model::record::{dump_records, HistoricalRecord};
use crate::time::calendar::Tick;
use log::info;
use std::collections::HashMap;
use std::path::Path;

/// Ordered record collection.
#[derive(Debug, Clone, Default)]
pub struct History {
    records: Vec<HistoricalRecord>,
    options: LoaderOptions,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: LoaderOptions) -> Self {
        Self {
            records: Vec::new(),
            options,
        }
    }

    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    pub fn records(&self) -> &[HistoricalRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, uuid: &str) -> Option<&HistoricalRecord> {
        self.records.iter().find(|record| record.uuid() == uuid)
    }

    /// Merges `incoming` into `list` by uuid.
    ///
    /// A record whose uuid is already present replaces it in place; others
    /// append in incoming order. Records without a uuid get one first.
    pub fn upsert(
        list: &mut Vec<HistoricalRecord>,
        incoming: impl IntoIterator<Item = HistoricalRecord>,
    ) {
        let mut positions: HashMap<String, usize> = list
            .iter()
            .enumerate()
            .map(|(at, record)| (record.uuid().to_string(), at))
            .collect();
        for mut record in incoming {
            record.ensure_uuid();
            match positions.get(record.uuid()) {
                Some(&at) => list[at] = record,
                None => {
                    positions.insert(record.uuid().to_string(), list.len());
                    list.push(record);
                }
            }
        }
    }

    pub fn upsert_records(&mut self, incoming: impl IntoIterator<Item = HistoricalRecord>) {
        Self::upsert(&mut self.records, incoming);
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Drops all records and restores default loader options.
    pub fn reset(&mut self) {
        self.records.clear();
        self.options = LoaderOptions::default();
    }

    pub fn filter(&self, filter: &RecordFilter) -> Vec<&HistoricalRecord> {
        self.records
            .iter()
            .filter(|record| filter.matches(record))
            .collect()
    }

    /// Records whose `since` or `until` falls inside `[since, until]`.
    pub fn records_in_period(&self, since: Tick, until: Tick) -> Vec<&HistoricalRecord> {
        self.records
            .iter()
            .filter(|record| record.period_adapt(since, until))
            .collect()
    }

    pub fn index(&self) -> Vec<HistoricalRecord> {
        loader::index(&self.records)
    }

    /// Parses `text` and merges the records. Returns how many were read.
    pub fn load_text(&mut self, text: &str, source: &str) -> usize {
        let records = loader::load_text(text, source);
        let count = records.len();
        self.upsert_records(records);
        count
    }

    pub fn load_file(&mut self, path: &Path) -> bool {
        let report = loader::load_paths(&[path], &self.options);
        self.absorb(report).succeeded == 1
    }

    pub fn load_directory(&mut self, dir: &Path) -> LoadCounts {
        let report = loader::load_directory(dir, &self.options);
        self.absorb(report)
    }

    pub fn load_depot(&mut self, root: &Path, name: &str) -> LoadCounts {
        let report = loader::load_depot(root, name, &self.options);
        self.absorb(report)
    }

    /// Loads every file or directory listed in the filter's sources.
    pub fn load_sources(&mut self, filter: &RecordFilter) -> LoadCounts {
        let report = loader::load_paths(filter.sources(), &self.options);
        self.absorb(report)
    }

    pub fn save(&self, destination: &Path) -> bool {
        loader::save(&self.records, destination)
    }

    pub fn dump(&self) -> String {
        dump_records(&self.records)
    }

    fn absorb(&mut self, mut report: LoadReport) -> LoadCounts {
        let counts = report.counts();
        let records = std::mem::take(&mut report.records);
        let before = self.records.len();
        self.upsert_records(records);
        info!(
            "event=history_merge module=depot status=ok attempted={} succeeded={} added={} total={}",
            counts.attempted,
            counts.succeeded,
            self.records.len() - before,
            self.records.len()
        );
        counts
    }
}
