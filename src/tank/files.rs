use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use itertools::Itertools;
use tracing::instrument;

use crate::config::FileNames;
use crate::Error;

/// The files making up one block
#[derive(Debug, Clone, Default)]
pub(crate) struct BlockFiles {
    pub(crate) dir: PathBuf,
    /// absent for blocks that only hold per-channel files
    pub(crate) index: Option<PathBuf>,
    pub(crate) events: Option<PathBuf>,
    pub(crate) channel_files: Vec<PathBuf>,
    pub(crate) logs: Vec<PathBuf>,
    pub(crate) store_notes: Option<PathBuf>,
    pub(crate) tagged_notes: Option<PathBuf>,
    pub(crate) experiment_notes: Option<PathBuf>,
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension().and_then(OsStr::to_str) == Some(ext)
}

fn existing(path: PathBuf) -> Option<PathBuf> {
    path.is_file().then_some(path)
}

#[instrument(level = "debug", skip(names))]
pub(crate) fn discover(dir: &Path, names: &FileNames) -> Result<BlockFiles, Error> {
    if !dir.is_dir() {
        return Err(Error::NotFound {
            what: "block directory",
            dir: dir.to_owned(),
        });
    }

    let entries: Vec<PathBuf> = std::fs::read_dir(dir)
        .and_then(|entries| entries.map_ok(|e| e.path()).collect())
        .map_err(|source| Error::Io {
            path: dir.to_owned(),
            source,
        })?;
    let entries: Vec<PathBuf> = entries
        .into_iter()
        .filter(|p| p.is_file())
        .filter(|p| {
            !p.file_name()
                .and_then(OsStr::to_str)
                .is_some_and(|n| n.starts_with("._"))
        })
        .sorted()
        .collect();

    let mut index_files: Vec<_> = entries
        .iter()
        .filter(|p| has_extension(p, &names.index))
        .cloned()
        .collect();
    let channel_files: Vec<_> = entries
        .iter()
        .filter(|p| has_extension(p, &names.channel_files))
        .cloned()
        .collect();
    let logs = entries
        .iter()
        .filter(|p| {
            p.file_name()
                .and_then(OsStr::to_str)
                .is_some_and(|n| n.ends_with(&names.log_suffix))
        })
        .cloned()
        .collect();
    let experiment_notes = existing(dir.join(&names.experiment_notes));

    if index_files.len() > 1 {
        return Err(Error::MultipleIndexFiles(index_files));
    }

    let Some(index) = index_files.pop() else {
        if channel_files.is_empty() {
            return Err(Error::NotFound {
                what: "an index file",
                dir: dir.to_owned(),
            });
        }
        tracing::debug!("no index file, only reading per-channel files");
        return Ok(BlockFiles {
            dir: dir.to_owned(),
            channel_files,
            logs,
            experiment_notes,
            ..BlockFiles::default()
        });
    };

    let Some(events) = existing(index.with_extension(&names.events)) else {
        return Err(Error::NotFound {
            what: "the event file",
            dir: dir.to_owned(),
        });
    };

    Ok(BlockFiles {
        dir: dir.to_owned(),
        store_notes: existing(index.with_extension(&names.store_notes)),
        tagged_notes: existing(index.with_extension(&names.tagged_notes)),
        index: Some(index),
        events: Some(events),
        channel_files,
        logs,
        experiment_notes,
    })
}

impl BlockFiles {
    /// Name of the block, the directory name
    pub(crate) fn block_name(&self) -> String {
        self.dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Directory holding the block
    pub(crate) fn tank_path(&self) -> PathBuf {
        self.dir.parent().map(Path::to_owned).unwrap_or_default()
    }
}
