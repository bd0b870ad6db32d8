use std::path::PathBuf;

use crate::{config, index};

/// Errors that stop a decode, no dataset is returned.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Could not find {what} in {}", dir.display())]
    NotFound { what: &'static str, dir: PathBuf },
    #[error("Block contains more then one index file: {0:?}")]
    MultipleIndexFiles(Vec<PathBuf>),
    #[error("Index file is malformed: {0}")]
    MalformedHeader(index::HeaderError),
    #[error("Could not read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Decode was cancelled")]
    Cancelled,
    #[error("Invalid options: {0}")]
    Config(#[from] config::Error),
}
