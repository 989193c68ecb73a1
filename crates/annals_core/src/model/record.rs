//! Historical record domain model.
//!
//! # Responsibility
//! - Hold one record: identity, focus label, time span and free-form tags.
//! - Route well-known labels to dedicated fields.
//! - Provide the query helpers used by the viewer (`period_adapt`,
//!   `filter`, `index_for`) and the record text form (`dump`).
//!
//! # Invariants
//! - `since <= until` whenever both come from a `time` label.
//! - `uuid`, `source`, `since` and `until` never appear in `label_tags`.
//! - Tags under one label are unique and keep insertion order.

use crate::text::label_tag::{serialize_line, LabelTagMap};
use crate::time::calendar::Tick;
use crate::time::phrase::phrase_range;
use log::warn;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const LABEL_START: &str = "[START]";
pub const LABEL_UUID: &str = "uuid";
pub const LABEL_SOURCE: &str = "source";
pub const LABEL_TIME: &str = "time";
pub const LABEL_SINCE: &str = "since";
pub const LABEL_UNTIL: &str = "until";
pub const LABEL_TITLE: &str = "title";
pub const LABEL_BRIEF: &str = "brief";
pub const LABEL_EVENT: &str = "event";
pub const LABEL_PEOPLE: &str = "people";
pub const LABEL_LOCATION: &str = "location";
pub const LABEL_ORGANIZATION: &str = "organization";
pub const LABEL_ABSTRACT: &str = "abstract";

/// Focus label used when a `[START]` line names none.
pub const DEFAULT_FOCUS_LABEL: &str = LABEL_EVENT;
pub const INDEX_FOCUS_LABEL: &str = "index";
/// Sole tag of an otherwise empty focus section.
pub const END_MARKER: &str = "end";
pub const ABSTRACT_MAX_CHARS: usize = 50;

/// One historical record (or, with focus label `index`, its index entry).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalRecord {
    uuid: String,
    focus_label: String,
    /// Where the record was read from; an index keeps its record's source.
    source: String,
    since: Tick,
    until: Tick,
    label_tags: LabelTagMap,
}

impl HistoricalRecord {
    /// Creates an empty record with a generated uuid.
    pub fn new(focus_label: impl Into<String>) -> Self {
        Self::with_uuid(Uuid::new_v4().to_string(), focus_label)
    }

    /// Creates an empty record with a caller-provided uuid (may be empty).
    pub fn with_uuid(uuid: impl Into<String>, focus_label: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            focus_label: focus_label.into(),
            source: String::new(),
            since: 0,
            until: 0,
            label_tags: LabelTagMap::new(),
        }
    }

    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    pub fn focus_label(&self) -> &str {
        &self.focus_label
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn since(&self) -> Tick {
        self.since
    }

    pub fn until(&self) -> Tick {
        self.until
    }

    pub fn is_index(&self) -> bool {
        self.focus_label == INDEX_FOCUS_LABEL
    }

    pub fn label_tags(&self) -> &LabelTagMap {
        &self.label_tags
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.label_tags.keys().map(String::as_str)
    }

    /// Tags under `label`; empty when the label is absent.
    pub fn tags(&self, label: &str) -> &[String] {
        self.label_tags
            .get(label)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Raw date phrases the span was computed from.
    pub fn time(&self) -> &[String] {
        self.tags(LABEL_TIME)
    }

    pub fn title(&self) -> String {
        self.text_of(LABEL_TITLE)
    }

    pub fn brief(&self) -> String {
        self.text_of(LABEL_BRIEF)
    }

    pub fn event(&self) -> String {
        self.text_of(LABEL_EVENT)
    }

    pub fn abstract_text(&self) -> String {
        self.text_of(LABEL_ABSTRACT)
    }

    pub fn people(&self) -> &[String] {
        self.tags(LABEL_PEOPLE)
    }

    pub fn location(&self) -> &[String] {
        self.tags(LABEL_LOCATION)
    }

    pub fn organization(&self) -> &[String] {
        self.tags(LABEL_ORGANIZATION)
    }

    fn text_of(&self, label: &str) -> String {
        self.tags(label).join(", ")
    }

    pub fn set_uuid(&mut self, uuid: impl Into<String>) {
        self.uuid = uuid.into();
    }

    pub fn set_focus_label(&mut self, focus_label: impl Into<String>) {
        self.focus_label = focus_label.into();
    }

    pub fn set_source(&mut self, source: impl Into<String>) {
        self.source = source.into();
    }

    /// Shorthand for `set_label_tags("time", [phrase])`.
    pub fn set_time(&mut self, phrase: impl Into<String>) {
        self.set_label_tags(LABEL_TIME, vec![phrase.into()]);
    }

    /// Assigns a generated uuid when none is set. Returns whether one was
    /// generated.
    pub fn ensure_uuid(&mut self) -> bool {
        if !self.uuid.trim().is_empty() {
            return false;
        }
        self.uuid = Uuid::new_v4().to_string();
        true
    }

    /// Applies one parsed `label: tags` entry.
    ///
    /// `uuid`, `source`, `since` and `until` go to their fields. `time`
    /// replaces the stored phrases and recomputes the span (0/0 when nothing
    /// parses). Any other label merges its tags into the existing ones.
    pub fn set_label_tags(&mut self, label: &str, tags: Vec<String>) {
        match label {
            LABEL_UUID => self.uuid = first_tag(tags),
            LABEL_SOURCE => self.source = first_tag(tags),
            LABEL_SINCE => self.since = parse_tick(label, &tags),
            LABEL_UNTIL => self.until = parse_tick(label, &tags),
            LABEL_TIME => {
                let (since, until) = phrase_range(&tags.join(", ")).unwrap_or((0, 0));
                self.since = since;
                self.until = until;
                self.label_tags.insert(LABEL_TIME.to_string(), tags);
            }
            _ => {
                let merged = self.label_tags.entry(label.to_string()).or_default();
                for tag in tags {
                    if !merged.contains(&tag) {
                        merged.push(tag);
                    }
                }
            }
        }
    }

    /// Removes a generic label, returning its tags.
    pub fn remove_label(&mut self, label: &str) -> Option<Vec<String>> {
        self.label_tags.shift_remove(label)
    }

    /// True when `since` or `until` lies in `[range_since, range_until]`.
    pub fn period_adapt(&self, range_since: Tick, range_until: Tick) -> bool {
        let range = range_since..=range_until;
        range.contains(&self.since) || range.contains(&self.until)
    }

    /// Include/exclude matching over `(label, tag)` conditions.
    ///
    /// Every listed tag is one condition; a label listed with no tags is a
    /// label-presence condition. An empty `include` matches everything and an
    /// empty `exclude` matches nothing.
    pub fn filter(
        &self,
        include: &LabelTagMap,
        include_all: bool,
        exclude: &LabelTagMap,
        exclude_any: bool,
    ) -> bool {
        let included = include.is_empty() || self.matches_conditions(include, include_all);
        let excluded = !exclude.is_empty() && self.matches_conditions(exclude, !exclude_any);
        included && !excluded
    }

    fn matches_conditions(&self, conditions: &LabelTagMap, require_all: bool) -> bool {
        let mut checks = conditions.iter().flat_map(|(label, tags)| {
            let presence = tags.is_empty().then(|| self.has_label(label));
            presence
                .into_iter()
                .chain(tags.iter().map(move |tag| self.has_tag(label, tag)))
        });
        if require_all {
            checks.all(|hit| hit)
        } else {
            checks.any(|hit| hit)
        }
    }

    pub fn has_label(&self, label: &str) -> bool {
        match label {
            LABEL_UUID => !self.uuid.is_empty(),
            LABEL_SOURCE => !self.source.is_empty(),
            _ => self.label_tags.contains_key(label),
        }
    }

    pub fn has_tag(&self, label: &str, tag: &str) -> bool {
        match label {
            LABEL_UUID => self.uuid == tag,
            LABEL_SOURCE => self.source == tag,
            _ => self.tags(label).iter().any(|existing| existing == tag),
        }
    }

    /// Builds the index entry of `record`.
    ///
    /// The abstract is the first non-blank of title, brief and event, trimmed
    /// and cut to [`ABSTRACT_MAX_CHARS`] characters.
    pub fn index_for(record: &HistoricalRecord) -> HistoricalRecord {
        let mut index = HistoricalRecord::with_uuid(record.uuid.clone(), INDEX_FOCUS_LABEL);
        index.source = record.source.clone();
        index.since = record.since;
        index.until = record.until;

        let summary = [record.title(), record.brief(), record.event()]
            .into_iter()
            .map(|text| text.trim().to_string())
            .find(|text| !text.is_empty());
        if let Some(summary) = summary {
            let summary: String = summary.chars().take(ABSTRACT_MAX_CHARS).collect();
            index
                .label_tags
                .insert(LABEL_ABSTRACT.to_string(), vec![summary]);
        }
        index
    }

    /// Record text readable by the depot loader.
    ///
    /// The focus-label section is written last since it closes the record.
    /// An empty focus section is written as `end` and reads back as absent.
    pub fn dump(&self) -> String {
        let mut text = serialize_line(LABEL_START, std::slice::from_ref(&self.focus_label));
        if !self.uuid.is_empty() {
            text.push_str(&serialize_line(LABEL_UUID, &[self.uuid.clone()]));
        }
        if self.is_index() {
            text.push_str(&serialize_line(LABEL_SINCE, &[self.since.to_string()]));
            text.push_str(&serialize_line(LABEL_UNTIL, &[self.until.to_string()]));
            if !self.source.is_empty() {
                text.push_str(&serialize_line(LABEL_SOURCE, &[self.source.clone()]));
            }
        }
        for (label, tags) in &self.label_tags {
            if *label != self.focus_label {
                text.push_str(&serialize_line(label, tags));
            }
        }

        let focus_tags = self.tags(&self.focus_label);
        if focus_tags.is_empty() {
            text.push_str(&serialize_line(
                &self.focus_label,
                &[END_MARKER.to_string()],
            ));
        } else {
            text.push_str(&serialize_line(&self.focus_label, focus_tags));
        }
        text
    }
}

/// Record text for a sequence of records, separated by blank lines.
pub fn dump_records<'a>(records: impl IntoIterator<Item = &'a HistoricalRecord>) -> String {
    records
        .into_iter()
        .map(HistoricalRecord::dump)
        .collect::<Vec<_>>()
        .join("\n")
}

fn first_tag(tags: Vec<String>) -> String {
    tags.into_iter().next().unwrap_or_default()
}

fn parse_tick(label: &str, tags: &[String]) -> Tick {
    let Some(value) = tags.first() else {
        return 0;
    };
    value.trim().parse().unwrap_or_else(|_| {
        warn!("event=record_field_parse module=model status=degraded label={label}");
        0
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::label_tag::parse;
    use crate::time::calendar::date_time_to_tick;

    fn conditions(text: &str) -> LabelTagMap {
        parse(text).into_map()
    }

    fn tagged_record() -> HistoricalRecord {
        let mut record = HistoricalRecord::new(LABEL_EVENT);
        record.set_label_tags("tags", vec!["tag1".to_string(), "tag2".to_string()]);
        record.set_label_tags(LABEL_PEOPLE, vec!["甲".to_string()]);
        record
    }

    #[test]
    fn time_label_sets_the_span() {
        let mut record = HistoricalRecord::new(LABEL_EVENT);
        record.set_time("公元前1600年 - 公元前1046年");
        assert_eq!(record.since(), date_time_to_tick(-1600, 1, 1, 0, 0, 0));
        assert_eq!(record.until(), date_time_to_tick(-1046, 1, 1, 0, 0, 0));
        assert_eq!(record.time(), ["公元前1600年 - 公元前1046年"]);

        record.set_time("sometime");
        assert_eq!((record.since(), record.until()), (0, 0));
    }

    #[test]
    fn dedicated_labels_stay_out_of_the_tag_map() {
        let mut record = HistoricalRecord::with_uuid("", LABEL_EVENT);
        record.set_label_tags(LABEL_UUID, vec!["u-1".to_string()]);
        record.set_label_tags(LABEL_SOURCE, vec!["a.his".to_string()]);
        record.set_label_tags(LABEL_SINCE, vec!["-100".to_string()]);
        record.set_label_tags(LABEL_UNTIL, vec!["not a number".to_string()]);
        assert_eq!(record.uuid(), "u-1");
        assert_eq!(record.source(), "a.his");
        assert_eq!(record.since(), -100);
        assert_eq!(record.until(), 0);
        assert_eq!(record.labels().count(), 0);
    }

    #[test]
    fn generic_labels_merge_without_duplicates() {
        let mut record = tagged_record();
        record.set_label_tags("tags", vec!["tag2".to_string(), "tag3".to_string()]);
        assert_eq!(record.tags("tags"), ["tag1", "tag2", "tag3"]);
        assert_eq!(record.people(), ["甲"]);
        assert!(record.location().is_empty());
    }

    #[test]
    fn period_adapt_is_inclusive_at_both_ends() {
        let mut record = HistoricalRecord::new(LABEL_EVENT);
        record.set_label_tags(LABEL_SINCE, vec!["100".to_string()]);
        record.set_label_tags(LABEL_UNTIL, vec!["200".to_string()]);
        assert!(record.period_adapt(200, 300));
        assert!(record.period_adapt(0, 100));
        assert!(!record.period_adapt(150, 160));
        assert!(!record.period_adapt(201, 300));
        assert!(!record.period_adapt(0, 99));
    }

    #[test]
    fn filter_include_and_exclude() {
        let record = tagged_record();
        let none = LabelTagMap::new();

        assert!(record.filter(&none, true, &none, true));
        assert!(record.filter(&conditions("tags: tag1"), true, &none, true));
        assert!(!record.filter(&conditions("tags: tag1, tag9"), true, &none, true));
        assert!(record.filter(&conditions("tags: tag1, tag9"), false, &none, true));
        assert!(record.filter(&conditions("people"), true, &none, true));

        assert!(!record.filter(&none, true, &conditions("tags: tag1"), true));
        assert!(record.filter(
            &none,
            true,
            &conditions("tags: tag1, tag9"),
            false
        ));
        assert!(!record.filter(
            &none,
            true,
            &conditions("tags: tag1, tag2"),
            false
        ));
    }

    #[test]
    fn filter_consults_uuid_field() {
        let record = HistoricalRecord::with_uuid("u-7", LABEL_EVENT);
        assert!(record.filter(
            &conditions("uuid: u-7"),
            true,
            &LabelTagMap::new(),
            true
        ));
    }

    #[test]
    fn index_abstract_prefers_title_and_is_truncated() {
        let mut record = HistoricalRecord::with_uuid("u-1", LABEL_EVENT);
        record.set_source("depot/a.his");
        record.set_time("1900年");
        record.set_label_tags(LABEL_BRIEF, vec!["brief text".to_string()]);
        record.set_label_tags(LABEL_TITLE, vec![format!("  {}  ", "长".repeat(60))]);

        let index = HistoricalRecord::index_for(&record);
        assert!(index.is_index());
        assert_eq!(index.uuid(), "u-1");
        assert_eq!(index.source(), "depot/a.his");
        assert_eq!(index.since(), record.since());
        assert_eq!(index.until(), record.until());
        assert_eq!(index.abstract_text(), "长".repeat(ABSTRACT_MAX_CHARS));
    }

    #[test]
    fn index_abstract_falls_back_to_event() {
        let mut record = HistoricalRecord::new(LABEL_EVENT);
        record.set_label_tags(LABEL_TITLE, vec!["   ".to_string()]);
        record.set_label_tags(LABEL_EVENT, vec!["event body".to_string()]);
        assert_eq!(HistoricalRecord::index_for(&record).abstract_text(), "event body");
    }

    #[test]
    fn dump_writes_focus_section_last() {
        let mut record = HistoricalRecord::with_uuid("u-1", LABEL_EVENT);
        record.set_label_tags(LABEL_EVENT, vec!["body, with comma".to_string()]);
        record.set_label_tags(LABEL_TITLE, vec!["title".to_string()]);
        assert_eq!(
            record.dump(),
            "[START]: event\nuuid: u-1\ntitle: title\nevent: \"\"\"body, with comma\"\"\"\n"
        );

        let empty = HistoricalRecord::with_uuid("u-2", "period");
        assert_eq!(empty.dump(), "[START]: period\nuuid: u-2\nperiod: end\n");
    }
}
