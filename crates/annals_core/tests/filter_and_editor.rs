use annals_core::time::calendar::date_time_to_tick;
use annals_core::{
    FilterError, HistoricalRecord, History, RecordEditAgent, RecordEditSession, RecordFilter,
};
use std::fs;

const RECORDS: &str = "\
[START]: event
uuid: qin
time: 公元前221年
tags: unification, qin
people: 嬴政
event: end

[START]: event
uuid: han
time: 公元前202年
tags: han
event: end

[START]: period
uuid: tang
time: 618年-907年
tags: tang
period: end
";

fn loaded() -> History {
    let mut history = History::new();
    assert_eq!(history.load_text(RECORDS, "mem"), 3);
    history
}

fn uuids(records: &[&HistoricalRecord]) -> Vec<String> {
    records.iter().map(|record| record.uuid().to_string()).collect()
}

#[test]
fn include_any_and_all() {
    let history = loaded();
    let mut filter = RecordFilter::new();
    filter.add_include("tags: qin, han").unwrap();
    assert_eq!(uuids(&history.filter(&filter)), ["qin", "han"]);

    filter.set_include_all(true);
    assert!(history.filter(&filter).is_empty());
}

#[test]
fn exclude_and_focus_label() {
    let history = loaded();
    let mut filter = RecordFilter::new();
    filter.add_exclude("people").unwrap();
    assert_eq!(uuids(&history.filter(&filter)), ["han", "tang"]);

    filter.set_focus_label("period");
    assert_eq!(uuids(&history.filter(&filter)), ["tang"]);

    let mut by_uuid = RecordFilter::new();
    by_uuid.add_include("uuid: han").unwrap();
    assert_eq!(uuids(&history.filter(&by_uuid)), ["han"]);
}

#[test]
fn exclude_all_requires_every_condition() {
    let history = loaded();
    let mut filter = RecordFilter::new();
    filter.set_exclude_any(false);
    filter.add_exclude("tags: unification, han").unwrap();
    assert_eq!(history.filter(&filter).len(), 3);
}

#[test]
fn period_query_uses_closed_interval() {
    let history = loaded();
    let qin = date_time_to_tick(-221, 1, 1, 0, 0, 0);
    let han = date_time_to_tick(-202, 1, 1, 0, 0, 0);
    assert_eq!(uuids(&history.records_in_period(qin, han)), ["qin", "han"]);
    assert_eq!(uuids(&history.records_in_period(qin + 1, han - 1)), Vec::<String>::new());

    let tang_end = date_time_to_tick(907, 1, 1, 0, 0, 0);
    assert_eq!(
        uuids(&history.records_in_period(tang_end, tang_end + 1)),
        ["tang"]
    );
}

#[test]
fn filter_file_round_trip_and_source_loading() {
    let dir = tempfile::tempdir().unwrap();
    let depot = dir.path().join("china");
    fs::create_dir_all(&depot).unwrap();
    fs::write(depot.join("dynasties.his"), RECORDS).unwrap();
    let extra = dir.path().join("extra.his");
    fs::write(&extra, "[START]: event\nuuid: extra\nevent: end").unwrap();

    let mut filter = RecordFilter::new();
    filter.set_focus_label("event");
    filter.add_include("tags: qin").unwrap();
    filter.add_source(depot.to_string_lossy());
    filter.add_source(extra.to_string_lossy());

    let filter_path = dir.path().join("view.filter");
    fs::write(&filter_path, filter.to_text()).unwrap();
    let restored = RecordFilter::from_text(&fs::read_to_string(&filter_path).unwrap()).unwrap();
    assert_eq!(restored, filter);

    let mut history = History::new();
    let counts = history.load_sources(&restored);
    assert_eq!((counts.attempted, counts.succeeded), (2, 2));
    assert_eq!(history.len(), 4);
    assert_eq!(uuids(&history.filter(&restored)), ["qin"]);
}

#[test]
fn malformed_filter_entry_is_rejected() {
    let mut filter = RecordFilter::new();
    let err = filter.add_include("tags: a b").unwrap_err();
    assert!(matches!(err, FilterError::InvalidEntry(_)));
    assert!(filter.include().is_empty());
}

/// Writes applied records back into a depot.
struct DepotAgent<'a> {
    history: &'a mut History,
    cancelled: usize,
}

impl RecordEditAgent for DepotAgent<'_> {
    fn on_apply(&mut self, record: &HistoricalRecord) {
        self.history.upsert_records([record.clone()]);
    }

    fn on_cancel(&mut self, _record: &HistoricalRecord) {
        self.cancelled += 1;
    }
}

#[test]
fn edit_session_applies_into_history() {
    let mut history = loaded();
    let original = history.get("han").unwrap().clone();
    let mut agent = DepotAgent {
        history: &mut history,
        cancelled: 0,
    };

    let mut session = RecordEditSession::new(original.clone(), &mut agent);
    session.set_label_text("time", "公元前206年").unwrap();
    session.set_label_tags("people", vec!["刘邦".to_string()]);
    assert!(session.is_dirty());
    let applied = session.apply();
    assert_eq!(applied.since(), date_time_to_tick(-206, 1, 1, 0, 0, 0));

    let session = RecordEditSession::new(original.clone(), &mut agent);
    assert_eq!(session.cancel(), original);
    assert_eq!(agent.cancelled, 1);

    assert_eq!(history.len(), 3);
    let stored = history.get("han").unwrap();
    assert_eq!(stored.people(), ["刘邦"]);
    assert_eq!(stored.time(), ["公元前206年"]);
    assert_eq!(uuids(&history.records().iter().collect::<Vec<_>>()), ["qin", "han", "tang"]);
}
