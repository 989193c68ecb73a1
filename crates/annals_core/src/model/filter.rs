//! Persistable record filter.
//!
//! # Responsibility
//! - Hold the viewer's focus label, include/exclude conditions and the list
//!   of sources to load.
//! - Round-trip through label-tag text so filters can be saved next to a
//!   depot.
//!
//! # Invariants
//! - Include/exclude entries are validated through the label-tag codec
//!   before they are stored.

use crate::model::record::HistoricalRecord;
use crate::text::label_tag::{self, serialize_line, LabelTagError, LabelTagMap};
use std::error::Error;
use std::fmt::{Display, Formatter};

const LABEL_FOCUS: &str = "focus_label";
const LABEL_INCLUDE: &str = "include_tags";
const LABEL_INCLUDE_ALL: &str = "include_all";
const LABEL_EXCLUDE: &str = "exclude_tags";
const LABEL_EXCLUDE_ANY: &str = "exclude_any";
const LABEL_SOURCES: &str = "sources";

/// Filter construction error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    /// An include/exclude entry is not valid label-tag text.
    InvalidEntry(LabelTagError),
    /// A flag field holds something other than `true`/`false`.
    InvalidFlag(String),
}

impl Display for FilterError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidEntry(err) => write!(f, "invalid filter entry: {err}"),
            Self::InvalidFlag(value) => write!(f, "invalid filter flag: `{value}`"),
        }
    }
}

impl Error for FilterError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidEntry(err) => Some(err),
            Self::InvalidFlag(_) => None,
        }
    }
}

impl From<LabelTagError> for FilterError {
    fn from(value: LabelTagError) -> Self {
        Self::InvalidEntry(value)
    }
}

/// Viewer filter over loaded records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFilter {
    focus_label: String,
    include: LabelTagMap,
    include_all: bool,
    exclude: LabelTagMap,
    exclude_any: bool,
    sources: Vec<String>,
}

impl Default for RecordFilter {
    fn default() -> Self {
        Self {
            focus_label: String::new(),
            include: LabelTagMap::new(),
            include_all: false,
            exclude: LabelTagMap::new(),
            exclude_any: true,
            sources: Vec::new(),
        }
    }
}

impl RecordFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn focus_label(&self) -> &str {
        &self.focus_label
    }

    /// Restricts matches to one focus label; empty matches every label.
    pub fn set_focus_label(&mut self, focus_label: impl Into<String>) {
        self.focus_label = focus_label.into();
    }

    pub fn include(&self) -> &LabelTagMap {
        &self.include
    }

    pub fn exclude(&self) -> &LabelTagMap {
        &self.exclude
    }

    pub fn include_all(&self) -> bool {
        self.include_all
    }

    pub fn exclude_any(&self) -> bool {
        self.exclude_any
    }

    pub fn set_include_all(&mut self, include_all: bool) {
        self.include_all = include_all;
    }

    pub fn set_exclude_any(&mut self, exclude_any: bool) {
        self.exclude_any = exclude_any;
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn add_source(&mut self, source: impl Into<String>) {
        let source = source.into();
        if !self.sources.contains(&source) {
            self.sources.push(source);
        }
    }

    pub fn remove_source(&mut self, source: &str) -> bool {
        let before = self.sources.len();
        self.sources.retain(|existing| existing != source);
        self.sources.len() != before
    }

    /// Adds include conditions written as label-tag text (`label: a, b`).
    ///
    /// # Errors
    /// - Returns `InvalidEntry` and leaves the filter unchanged when the text
    ///   does not parse cleanly.
    pub fn add_include(&mut self, entry: &str) -> Result<(), FilterError> {
        merge_entry(&mut self.include, entry)
    }

    /// Adds exclude conditions written as label-tag text.
    ///
    /// # Errors
    /// - Same as [`Self::add_include`].
    pub fn add_exclude(&mut self, entry: &str) -> Result<(), FilterError> {
        merge_entry(&mut self.exclude, entry)
    }

    /// Drops one include label with all its tags.
    pub fn remove_include(&mut self, label: &str) -> bool {
        self.include.shift_remove(label).is_some()
    }

    pub fn remove_exclude(&mut self, label: &str) -> bool {
        self.exclude.shift_remove(label).is_some()
    }

    /// Applies the focus label and include/exclude conditions to `record`.
    pub fn matches(&self, record: &HistoricalRecord) -> bool {
        if !self.focus_label.is_empty() && record.focus_label() != self.focus_label {
            return false;
        }
        record.filter(
            &self.include,
            self.include_all,
            &self.exclude,
            self.exclude_any,
        )
    }

    /// Label-tag text form; every condition label becomes one quoted entry.
    pub fn to_text(&self) -> String {
        let mut text = serialize_line(LABEL_FOCUS, &[self.focus_label.clone()]);
        text.push_str(&serialize_line(LABEL_INCLUDE, &entries(&self.include)));
        text.push_str(&serialize_line(
            LABEL_INCLUDE_ALL,
            &[self.include_all.to_string()],
        ));
        text.push_str(&serialize_line(LABEL_EXCLUDE, &entries(&self.exclude)));
        text.push_str(&serialize_line(
            LABEL_EXCLUDE_ANY,
            &[self.exclude_any.to_string()],
        ));
        text.push_str(&serialize_line(LABEL_SOURCES, &self.sources));
        text
    }

    /// Reads the form written by [`Self::to_text`]; unknown labels are
    /// ignored.
    ///
    /// # Errors
    /// - `InvalidEntry` when the text or a nested entry does not parse.
    /// - `InvalidFlag` when a flag is not `true`/`false`.
    pub fn from_text(text: &str) -> Result<Self, FilterError> {
        let parsed = label_tag::parse(text);
        if let Some(err) = parsed.errors.into_iter().next() {
            return Err(err.into());
        }

        let mut filter = Self::default();
        for (label, tags) in parsed.pairs {
            match label.as_str() {
                LABEL_FOCUS => filter.focus_label = tags.into_iter().next().unwrap_or_default(),
                LABEL_INCLUDE => {
                    for entry in &tags {
                        filter.add_include(entry)?;
                    }
                }
                LABEL_EXCLUDE => {
                    for entry in &tags {
                        filter.add_exclude(entry)?;
                    }
                }
                LABEL_INCLUDE_ALL => filter.include_all = parse_flag(&tags)?,
                LABEL_EXCLUDE_ANY => filter.exclude_any = parse_flag(&tags)?,
                LABEL_SOURCES => {
                    for source in tags {
                        filter.add_source(source);
                    }
                }
                _ => {}
            }
        }
        Ok(filter)
    }
}

fn merge_entry(target: &mut LabelTagMap, entry: &str) -> Result<(), FilterError> {
    let parsed = label_tag::parse(entry);
    if let Some(err) = parsed.errors.into_iter().next() {
        return Err(err.into());
    }
    for (label, tags) in parsed.pairs {
        let merged = target.entry(label).or_default();
        for tag in tags {
            if !merged.contains(&tag) {
                merged.push(tag);
            }
        }
    }
    Ok(())
}

fn entries(conditions: &LabelTagMap) -> Vec<String> {
    conditions
        .iter()
        .map(|(label, tags)| serialize_line(label, tags).trim_end().to_string())
        .collect()
}

fn parse_flag(tags: &[String]) -> Result<bool, FilterError> {
    match tags.first().map(String::as_str) {
        Some("true") => Ok(true),
        Some("false") => Ok(false),
        other => Err(FilterError::InvalidFlag(
            other.unwrap_or_default().to_string(),
        )),
    }
}
