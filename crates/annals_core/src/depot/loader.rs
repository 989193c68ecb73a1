//! Depot boundary I/O.
//!
//! # Responsibility
//! - Turn record text, files and directory trees into records.
//! - Persist records atomically and derive index records.
//!
//! # Invariants
//! - Per-file failures never abort a directory load; they are logged and
//!   surface as `succeeded < attempted` in the [`LoadReport`].
//! - Every loaded record carries a non-empty uuid.
//! - `save` never leaves a half-written destination file behind.

use crate::model::record::{
    dump_records, HistoricalRecord, DEFAULT_FOCUS_LABEL, END_MARKER, LABEL_START,
};
use crate::text::label_tag;
use log::{error, info, warn};
use std::error::Error;
use std::ffi::OsString;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Default extension of record files.
pub const RECORD_FILE_EXTENSION: &str = "his";
const TEMP_FILE_SUFFIX: &str = ".tmp";
const BYTE_ORDER_MARK: char = '\u{feff}';

/// Depot I/O error.
#[derive(Debug)]
pub enum DepotError {
    /// Reading or writing one path failed.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Directory traversal failed.
    Walk(walkdir::Error),
    /// Directory operation was given something else.
    NotADirectory(PathBuf),
}

impl Display for DepotError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "io error at `{}`: {source}", path.display()),
            Self::Walk(err) => write!(f, "directory walk failed: {err}"),
            Self::NotADirectory(path) => write!(f, "not a directory: `{}`", path.display()),
        }
    }
}

impl Error for DepotError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Walk(err) => Some(err),
            Self::NotADirectory(_) => None,
        }
    }
}

impl From<walkdir::Error> for DepotError {
    fn from(value: walkdir::Error) -> Self {
        Self::Walk(value)
    }
}

pub type DepotResult<T> = Result<T, DepotError>;

/// Which files a directory load picks up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderOptions {
    /// Accepted extensions without the dot, compared case-insensitively.
    /// Empty accepts every file.
    pub extensions: Vec<String>,
    pub follow_links: bool,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            extensions: vec![RECORD_FILE_EXTENSION.to_string()],
            follow_links: false,
        }
    }
}

impl LoaderOptions {
    pub fn accepts(&self, path: &Path) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                self.extensions
                    .iter()
                    .any(|accepted| accepted.eq_ignore_ascii_case(ext))
            })
    }
}

/// Outcome of a multi-file load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub records: Vec<HistoricalRecord>,
    /// Files (and unreadable directory entries) the load tried.
    pub attempted: usize,
    pub succeeded: usize,
}

/// Success counts of a load whose records went elsewhere.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadCounts {
    pub attempted: usize,
    pub succeeded: usize,
}

impl LoadReport {
    pub fn counts(&self) -> LoadCounts {
        LoadCounts {
            attempted: self.attempted,
            succeeded: self.succeeded,
        }
    }

    pub fn failed(&self) -> usize {
        self.attempted - self.succeeded
    }

    pub fn is_complete(&self) -> bool {
        self.attempted == self.succeeded
    }

    /// Folds another report into this one.
    pub fn merge(&mut self, other: LoadReport) {
        self.records.extend(other.records);
        self.attempted += other.attempted;
        self.succeeded += other.succeeded;
    }

    fn record_file(&mut self, result: DepotResult<Vec<HistoricalRecord>>) {
        self.attempted += 1;
        match result {
            Ok(records) => {
                self.succeeded += 1;
                self.records.extend(records);
            }
            Err(err) => error!("event=depot_file_load module=depot status=error error={err}"),
        }
    }
}

/// Builds records from label-tag pairs.
struct RecordBuilder<'a> {
    source: &'a str,
    current: Option<HistoricalRecord>,
    records: Vec<HistoricalRecord>,
}

impl RecordBuilder<'_> {
    fn start(&mut self, tags: Vec<String>) {
        self.finish();
        let focus_label = tags
            .into_iter()
            .map(|tag| tag.trim().to_string())
            .find(|tag| !tag.is_empty())
            .unwrap_or_else(|| DEFAULT_FOCUS_LABEL.to_string());
        let mut record = HistoricalRecord::with_uuid(String::new(), focus_label);
        record.set_source(self.source);
        self.current = Some(record);
    }

    fn field(&mut self, label: String, tags: Vec<String>) {
        let Some(record) = self.current.as_mut() else {
            warn!(
                "event=record_label_ignored module=depot status=skipped source={} label={}",
                self.source, label
            );
            return;
        };

        if label != record.focus_label() {
            record.set_label_tags(&label, tags);
            return;
        }
        let terminator_only = tags.is_empty() || (tags.len() == 1 && tags[0] == END_MARKER);
        if !terminator_only {
            record.set_label_tags(&label, tags);
        }
        self.finish();
    }

    fn finish(&mut self) {
        if let Some(mut record) = self.current.take() {
            record.ensure_uuid();
            self.records.push(record);
        }
    }
}

/// Parses record text; `source` is preset on every record and may be
/// overridden by a `source:` label. A leading byte-order mark is skipped.
pub fn load_text(text: &str, source: &str) -> Vec<HistoricalRecord> {
    let text = text.strip_prefix(BYTE_ORDER_MARK).unwrap_or(text);
    let parsed = label_tag::parse(text);
    if !parsed.is_clean() {
        warn!(
            "event=record_text_parse module=depot status=degraded source={} errors={} first_error={}",
            source,
            parsed.errors.len(),
            parsed.errors[0]
        );
    }

    let mut builder = RecordBuilder {
        source,
        current: None,
        records: Vec::new(),
    };
    for (label, tags) in parsed.pairs {
        if label == LABEL_START {
            builder.start(tags);
        } else {
            builder.field(label, tags);
        }
    }
    builder.finish();
    builder.records
}

/// Reads one record file; its path becomes the records' source.
///
/// # Errors
/// - `Io` when the file cannot be read or is not valid UTF-8.
pub fn load_file(path: &Path) -> DepotResult<Vec<HistoricalRecord>> {
    let text = std::fs::read_to_string(path).map_err(io_error(path))?;
    Ok(load_text(&text, &path.to_string_lossy()))
}

/// Accepted files under `dir`, in file-name order per directory.
///
/// # Errors
/// - `NotADirectory` when `dir` is not a directory.
///
/// Entries the walker cannot read are yielded as `Walk` errors.
pub fn record_files(
    dir: &Path,
    options: &LoaderOptions,
) -> DepotResult<Vec<DepotResult<PathBuf>>> {
    if !dir.is_dir() {
        return Err(DepotError::NotADirectory(dir.to_path_buf()));
    }
    let files = WalkDir::new(dir)
        .follow_links(options.follow_links)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => (entry.file_type().is_file() && options.accepts(entry.path()))
                .then(|| Ok(entry.into_path())),
            Err(err) => Some(Err(DepotError::from(err))),
        })
        .collect();
    Ok(files)
}

/// Loads every accepted file under `dir`.
pub fn load_directory(dir: &Path, options: &LoaderOptions) -> LoadReport {
    let mut report = LoadReport::default();
    match record_files(dir, options) {
        Ok(files) => {
            for file in files {
                report.record_file(file.and_then(|path| load_file(&path)));
            }
        }
        Err(err) => error!("event=depot_load module=depot status=error error={err}"),
    }

    let status = if report.is_complete() { "ok" } else { "partial" };
    info!(
        "event=depot_load module=depot status={} path={} attempted={} succeeded={} records={}",
        status,
        dir.display(),
        report.attempted,
        report.succeeded,
        report.records.len()
    );
    report
}

/// Loads the depot directory `name` under `root`.
pub fn load_depot(root: &Path, name: &str, options: &LoaderOptions) -> LoadReport {
    load_directory(&root.join(name), options)
}

/// Loads a mix of files and directories.
pub fn load_paths<P: AsRef<Path>>(paths: &[P], options: &LoaderOptions) -> LoadReport {
    let mut report = LoadReport::default();
    for path in paths {
        let path = path.as_ref();
        if path.is_dir() {
            report.merge(load_directory(path, options));
        } else {
            report.record_file(load_file(path));
        }
    }
    report
}

/// Writes `records` to `destination`, replacing it atomically.
///
/// Returns `false` (and logs) on failure.
pub fn save<'a>(
    records: impl IntoIterator<Item = &'a HistoricalRecord>,
    destination: &Path,
) -> bool {
    match write_atomically(destination, &dump_records(records)) {
        Ok(()) => {
            info!(
                "event=depot_save module=depot status=ok path={}",
                destination.display()
            );
            true
        }
        Err(err) => {
            error!("event=depot_save module=depot status=error error={err}");
            false
        }
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> DepotError {
    let path = path.to_path_buf();
    move |source| DepotError::Io { path, source }
}

fn write_atomically(destination: &Path, text: &str) -> DepotResult<()> {
    if let Some(parent) = destination.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(io_error(parent))?;
        }
    }
    let temp = temp_path(destination);
    std::fs::write(&temp, text).map_err(io_error(&temp))?;
    if let Err(source) = std::fs::rename(&temp, destination) {
        let _ = std::fs::remove_file(&temp);
        return Err(DepotError::Io {
            path: destination.to_path_buf(),
            source,
        });
    }
    Ok(())
}

fn temp_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(TEMP_FILE_SUFFIX);
    destination.with_file_name(name)
}

/// Index entries of `records`, in the same order.
pub fn index<'a>(records: impl IntoIterator<Item = &'a HistoricalRecord>) -> Vec<HistoricalRecord> {
    records.into_iter().map(HistoricalRecord::index_for).collect()
}

/// Loads `dir` and keeps only the index of each record.
pub fn index_directory(dir: &Path, options: &LoaderOptions) -> LoadReport {
    let report = load_directory(dir, options);
    LoadReport {
        records: index(&report.records),
        attempted: report.attempted,
        succeeded: report.succeeded,
    }
}
