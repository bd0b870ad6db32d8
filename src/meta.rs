//! Auxiliary text and binary files describing a block.

pub mod log;
pub mod notes;
pub mod sort;
pub mod tbk;
pub mod tnt;

use std::path::Path;

use tracing::instrument;

use crate::config::Options;
use crate::format;
use crate::tank::files::BlockFiles;
use crate::warning::{Warning, Warnings};

pub use log::RecordingLog;
pub use notes::{ExperimentNotes, Note};
pub use sort::{SortOverlay, SortResult};
pub use tbk::StoreNote;
pub use tnt::TaggedNotes;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Could not read file: {0}")]
    Read(std::io::Error),
    #[error("Store notes are malformed: {0}")]
    StoreNotes(tbk::Error),
    #[error("Experiment notes are malformed: {0}")]
    Notes(notes::Error),
    #[error("Sort result is malformed: {0}")]
    Sort(sort::Error),
}

/// Everything known about a block besides the index
#[derive(Debug, Default)]
pub(crate) struct Metadata {
    pub(crate) store_notes: Vec<StoreNote>,
    pub(crate) tagged_notes: TaggedNotes,
    pub(crate) experiment_notes: ExperimentNotes,
    pub(crate) logs: Vec<RecordingLog>,
    pub(crate) sort: Option<SortOverlay>,
}

impl Metadata {
    pub(crate) fn store_note(&self, store: &str) -> Option<&StoreNote> {
        self.store_notes.iter().find(|note| note.name == store)
    }

    pub(crate) fn log(&self, store: &str, hour: u32) -> Option<&RecordingLog> {
        self.logs
            .iter()
            .find(|log| log.store == store && log.hour == hour)
    }
}

fn read_text(path: &Path) -> Result<String, Error> {
    let bytes = std::fs::read(path).map_err(Error::Read)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn read_cp437(path: &Path) -> Result<String, Error> {
    let bytes = std::fs::read(path).map_err(Error::Read)?;
    Ok(format::decode_cp437(&bytes))
}

/// Loads the optional metadata files. Unreadable files are reported and
/// otherwise ignored.
#[instrument(level = "debug", skip_all)]
pub(crate) fn load(files: &BlockFiles, options: &Options, warnings: &mut Warnings) -> Metadata {
    let mut meta = Metadata::default();
    let mut report = |path: &Path, source: Error| {
        warnings.push(Warning::UnreadableMetadata {
            path: path.to_owned(),
            source,
        });
    };

    if let Some(path) = &files.store_notes {
        match read_cp437(path).and_then(|text| tbk::parse(&text).map_err(Error::StoreNotes)) {
            Ok(notes) => meta.store_notes = notes,
            Err(e) => report(path, e),
        }
    }

    if let Some(path) = &files.tagged_notes {
        match read_text(path) {
            Ok(text) => meta.tagged_notes = tnt::parse(&text),
            Err(e) => report(path, e),
        }
    }

    if let Some(path) = &files.experiment_notes {
        match read_text(path).and_then(|text| notes::parse(&text).map_err(Error::Notes)) {
            Ok(notes) => meta.experiment_notes = notes,
            Err(e) => report(path, e),
        }
    }

    for path in &files.logs {
        match read_text(path) {
            Ok(text) => meta.logs.push(log::parse(path, &text)),
            Err(e) => report(path, e),
        }
    }

    if let Some(sort_name) = &options.sort_name {
        meta.sort = load_sort(files, options, sort_name, warnings);
    }

    for log in &meta.logs {
        match log.start_sample {
            Some(sample) if sample > 2 && log.hour == 0 => warnings.push(Warning::LateStart {
                store: log.store.clone(),
                sample,
            }),
            _ => (),
        }
    }

    tracing::debug!(
        store_notes = meta.store_notes.len(),
        tagged_notes = meta.tagged_notes.notes.len(),
        experiment_notes = meta.experiment_notes.notes.len(),
        logs = meta.logs.len(),
        "loaded metadata"
    );
    meta
}

fn load_sort(
    files: &BlockFiles,
    options: &Options,
    sort_name: &str,
    warnings: &mut Warnings,
) -> Option<SortOverlay> {
    let dir = files.dir.join(&options.file_names.sort_dir).join(sort_name);
    let Ok(entries) = std::fs::read_dir(&dir) else {
        warnings.push(Warning::SortNotFound {
            sort_name: sort_name.to_owned(),
        });
        return None;
    };

    let mut overlay = SortOverlay {
        name: sort_name.to_owned(),
        results: Vec::new(),
    };
    let mut paths: Vec<_> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| {
            p.extension().and_then(|e| e.to_str()) == Some(options.file_names.sort_result.as_str())
        })
        .collect();
    paths.sort();

    for path in paths {
        let Some(store) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.split('.').next())
            .map(str::to_owned)
        else {
            continue;
        };
        let result = std::fs::read(&path)
            .map_err(Error::Read)
            .and_then(|bytes| SortResult::parse(store.clone(), bytes).map_err(Error::Sort));
        match result {
            Ok(result) => overlay.results.push(result),
            Err(e) => warnings.push(Warning::SortFallback {
                store,
                reason: e.to_string(),
            }),
        }
    }
    Some(overlay)
}
