//! Record edit session.
//!
//! # Responsibility
//! - Hold an untouched original and a mutable draft of one record.
//! - Report the outcome to an injected [`RecordEditAgent`].
//!
//! # Invariants
//! - `cancel` hands back the original exactly as it was passed in.
//! - `apply` hands back a draft that carries a uuid.

use crate::depot::loader;
use crate::model::record::HistoricalRecord;
use crate::text::label_tag::{self, LabelTagError};
use log::info;

/// Receives the outcome of an edit session.
pub trait RecordEditAgent {
    /// Called with the edited record.
    fn on_apply(&mut self, record: &HistoricalRecord);
    /// Called with the original record.
    fn on_cancel(&mut self, record: &HistoricalRecord);
}

impl<T: RecordEditAgent + ?Sized> RecordEditAgent for &mut T {
    fn on_apply(&mut self, record: &HistoricalRecord) {
        (**self).on_apply(record);
    }

    fn on_cancel(&mut self, record: &HistoricalRecord) {
        (**self).on_cancel(record);
    }
}

/// One open edit of one record.
pub struct RecordEditSession<A: RecordEditAgent> {
    agent: A,
    original: HistoricalRecord,
    draft: HistoricalRecord,
}

impl<A: RecordEditAgent> RecordEditSession<A> {
    pub fn new(record: HistoricalRecord, agent: A) -> Self {
        Self {
            agent,
            draft: record.clone(),
            original: record,
        }
    }

    pub fn original(&self) -> &HistoricalRecord {
        &self.original
    }

    pub fn draft(&self) -> &HistoricalRecord {
        &self.draft
    }

    pub fn draft_mut(&mut self) -> &mut HistoricalRecord {
        &mut self.draft
    }

    pub fn set_label_tags(&mut self, label: &str, tags: Vec<String>) {
        self.draft.set_label_tags(label, tags);
    }

    /// Replaces the tags of `label` with `text` read as a tag list
    /// (`a, b, """c, d"""`).
    ///
    /// # Errors
    /// - Returns the first codec error; the draft is left unchanged.
    pub fn set_label_text(&mut self, label: &str, text: &str) -> Result<(), LabelTagError> {
        let parsed = label_tag::parse(&format!("_: {text}"));
        if let Some(err) = parsed.errors.into_iter().next() {
            return Err(err);
        }
        let tags = parsed
            .pairs
            .into_iter()
            .next()
            .map(|(_, tags)| tags)
            .unwrap_or_default();
        self.draft.remove_label(label);
        self.draft.set_label_tags(label, tags);
        Ok(())
    }

    /// Replaces the whole draft with the first record in `text`, keeping the
    /// session's uuid. Returns `false` when `text` holds no record.
    pub fn replace_from_text(&mut self, text: &str) -> bool {
        let source = self.original.source().to_string();
        let Some(mut record) = loader::load_text(text, &source).into_iter().next() else {
            return false;
        };
        if !self.original.uuid().is_empty() {
            record.set_uuid(self.original.uuid());
        }
        self.draft = record;
        true
    }

    pub fn is_dirty(&self) -> bool {
        self.draft != self.original
    }

    /// Closes the session keeping the draft.
    pub fn apply(mut self) -> HistoricalRecord {
        self.draft.ensure_uuid();
        info!(
            "event=record_edit module=service status=applied dirty={}",
            self.is_dirty()
        );
        self.agent.on_apply(&self.draft);
        self.draft
    }

    /// Closes the session discarding the draft.
    pub fn cancel(mut self) -> HistoricalRecord {
        info!("event=record_edit module=service status=cancelled");
        self.agent.on_cancel(&self.original);
        self.original
    }
}
