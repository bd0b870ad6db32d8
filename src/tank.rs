//! Decodes one block of a tank into a [`Dataset`].

pub(crate) mod files;

use core::fmt;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};

use chrono::{DateTime, Utc};
use tracing::instrument;

use crate::config::Options;
use crate::dataset::{BlockInfo, Dataset, Decoded, Headers};
use crate::file::ByteReader;
use crate::format::Category;
use crate::index::{self, Index, Store};
use crate::materialize::{epoch, scalar, sev, snippet, stream};
use crate::meta::{self, Metadata, StoreNote};
use crate::progress::{CancelToken, NoProgress, Progress, ProgressEvent};
use crate::transform;
use crate::warning::{Warning, Warnings};
use crate::Error;

use files::BlockFiles;

/// Where a decode is, stages are only ever entered in this order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Stage {
    Idle,
    ParsingMetadata,
    BuildingIndex,
    MaterializingCategories,
    PostProcessing,
    Done,
}

impl Stage {
    fn advance(&mut self, next: Stage) {
        debug_assert!(next > *self, "can not go from {self:?} to {next:?}");
        tracing::debug!(from = ?self, to = ?next, "next stage");
        *self = next;
    }
}

/// Reads blocks with a fixed set of [`Options`].
pub struct TankReader {
    options: Options,
    progress: Box<dyn Progress>,
    cancel: CancelToken,
}

impl fmt::Debug for TankReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TankReader")
            .field("options", &self.options)
            .field("cancel", &self.cancel)
            .finish_non_exhaustive()
    }
}

impl Default for TankReader {
    fn default() -> Self {
        Self::new(Options::default())
    }
}

/// Decodes a block with the default options
pub fn read_block(path: impl AsRef<Path> + fmt::Debug) -> Result<Decoded, Error> {
    TankReader::default().read_block(path)
}

fn to_date(seconds: f64) -> Option<DateTime<Utc>> {
    #[allow(clippy::cast_possible_truncation)]
    let micros = (seconds * 1e6).round() as i64;
    DateTime::from_timestamp_micros(micros)
}

fn block_info(files: &BlockFiles, index: Option<&Index>, meta: &Metadata) -> BlockInfo {
    let start_date = index.and_then(|i| to_date(i.start_time));
    let stop_date = index.and_then(|i| i.stop_time).and_then(to_date);
    let notes = &meta.experiment_notes;
    BlockInfo {
        tank_path: files.tank_path(),
        block_name: files.block_name(),
        block_path: files.dir.clone(),
        start_date,
        stop_date,
        duration: start_date.zip(stop_date).map(|(start, stop)| stop - start),
        experiment: notes.experiment.clone(),
        subject: notes.subject.clone(),
        user: notes.user.clone(),
        start: notes.start.clone(),
        stop: notes.stop.clone(),
    }
}

impl TankReader {
    #[must_use]
    pub fn new(options: Options) -> Self {
        Self {
            options,
            progress: Box::new(NoProgress),
            cancel: CancelToken::new(),
        }
    }

    #[must_use]
    pub fn with_progress(mut self, progress: impl Progress + 'static) -> Self {
        self.progress = Box::new(progress);
        self
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Decodes the block on a new thread, progress is reported through the
    /// returned receiver.
    pub fn spawn(
        mut self,
        path: impl Into<PathBuf>,
    ) -> (JoinHandle<Result<Decoded, Error>>, Receiver<ProgressEvent>) {
        let (tx, rx) = mpsc::channel();
        self.progress = Box::new(tx);
        let path = path.into();
        let handle = thread::spawn(move || self.read_block(&path));
        (handle, rx)
    }

    /// Reads only the index, no samples are decoded.
    #[instrument(skip(self))]
    pub fn read_headers(&mut self, path: impl AsRef<Path> + fmt::Debug) -> Result<Headers, Error> {
        let res = self.headers(path.as_ref());
        self.progress.complete();
        res
    }

    fn headers(&self, path: &Path) -> Result<Headers, Error> {
        let mut warnings = Warnings::default();
        let files = files::discover(path, &self.options.file_names)?;
        let meta = meta::load(&files, &self.options, &mut warnings);
        let index = self.build_index(&files, &meta, &mut warnings)?;

        let info = block_info(&files, index.as_ref(), &meta);
        Ok(Headers {
            info,
            stores: index.map(|i| i.stores).unwrap_or_default(),
            warnings,
        })
    }

    /// Decodes a block. Problems that only affect part of the data are
    /// returned as warnings next to the dataset.
    #[instrument(skip(self))]
    pub fn read_block(&mut self, path: impl AsRef<Path> + fmt::Debug) -> Result<Decoded, Error> {
        let res = self.decode(path.as_ref());
        self.progress.complete();
        res
    }

    fn decode(&mut self, path: &Path) -> Result<Decoded, Error> {
        let mut stage = Stage::Idle;
        let mut warnings = Warnings::default();

        stage.advance(Stage::ParsingMetadata);
        let files = files::discover(path, &self.options.file_names)?;
        let meta = meta::load(&files, &self.options, &mut warnings);
        self.check_cancelled()?;

        stage.advance(Stage::BuildingIndex);
        let index = self.build_index(&files, &meta, &mut warnings)?;
        let mut channel_files = if self.options.wants(Category::Stream) {
            sev::scan(&files.channel_files, &mut warnings)
        } else {
            sev::Scan::default()
        };
        self.report_missing_stores(index.as_ref(), &channel_files, &mut warnings);

        stage.advance(Stage::MaterializingCategories);
        let mut dataset = Dataset {
            info: block_info(&files, index.as_ref(), &meta),
            time_ranges: self.options.effective_ranges(),
            ..Dataset::default()
        };
        let stores = index.map(|i| i.stores).unwrap_or_default();
        let mut events = match &files.events {
            Some(events) => Some(ByteReader::open(events).map_err(|source| Error::Io {
                path: events.clone(),
                source,
            })?),
            None => None,
        };

        let separate = channel_files
            .stores
            .keys()
            .filter(|name| !stores.iter().any(|s| s.name() == name.as_str()))
            .count();
        let total = stores.len() + separate;
        for (processed, store) in stores.iter().enumerate() {
            self.check_cancelled()?;
            self.materialize(
                store,
                events.as_mut(),
                &mut channel_files,
                &meta,
                &mut dataset,
                &mut warnings,
            );
            self.progress.update(processed + 1, total);
        }

        // per-channel files of stores the index does not know about
        let mut processed = stores.len();
        for (name, store_files) in std::mem::take(&mut channel_files.stores) {
            if stores.iter().any(|s| s.name() == name) {
                continue;
            }
            self.check_cancelled()?;
            let expected = meta.store_note(&name).and_then(StoreNote::sample_freq);
            self.materialize_channel_files(
                &name,
                &store_files,
                expected,
                &meta,
                &mut dataset,
                &mut warnings,
            );
            processed += 1;
            self.progress.update(processed, total);
        }

        stage.advance(Stage::PostProcessing);
        transform::apply(&mut dataset, &meta, &self.options, &mut warnings);

        stage.advance(Stage::Done);
        tracing::info!(
            epochs = dataset.epochs.len(),
            snippets = dataset.snippets.len(),
            streams = dataset.streams.len(),
            scalars = dataset.scalars.len(),
            warnings = warnings.len(),
            "decoded block"
        );
        Ok(Decoded { dataset, warnings })
    }

    fn check_cancelled(&self) -> Result<(), Error> {
        if self.cancel.is_cancelled() {
            tracing::debug!("decode cancelled");
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    fn build_index(
        &self,
        files: &BlockFiles,
        meta: &Metadata,
        warnings: &mut Warnings,
    ) -> Result<Option<Index>, Error> {
        let Some(path) = &files.index else {
            return Ok(None);
        };
        let index = index::build(path, &self.options, meta, warnings).map_err(|e| match e {
            index::Error::Header(e) => Error::MalformedHeader(e),
            index::Error::Io(source) => Error::Io {
                path: path.clone(),
                source,
            },
        })?;
        Ok(Some(index))
    }

    fn report_missing_stores(
        &self,
        index: Option<&Index>,
        channel_files: &sev::Scan,
        warnings: &mut Warnings,
    ) {
        let Some(requested) = &self.options.stores else {
            return;
        };
        let stores = index.map_or(&[][..], |i| i.stores.as_slice());
        for name in requested {
            let found = stores.iter().any(|s| s.name() == name)
                || channel_files.store_names().any(|s| s == name);
            // offset stores are merged into their onset store
            let merged = stores
                .iter()
                .any(|s| matches!(s, Store::Epoch(e) if &e.buddy == name));
            if !found && !merged {
                warnings.push(Warning::StoreNotFound {
                    store: name.clone(),
                });
            }
        }
    }

    fn materialize(
        &self,
        store: &Store,
        events: Option<&mut ByteReader>,
        channel_files: &mut sev::Scan,
        meta: &Metadata,
        dataset: &mut Dataset,
        warnings: &mut Warnings,
    ) {
        let name = store.name().to_owned();
        let ranges = &dataset.time_ranges;
        let options = &self.options;

        let res = match (store, events) {
            (Store::Epoch(s), _) => {
                dataset.epochs.insert(name, epoch::select(s, ranges));
                Ok(())
            }
            (Store::Scalar(s), _) => {
                let series = scalar::select(s, ranges, warnings);
                dataset.scalars.insert(name, series);
                Ok(())
            }
            (Store::Stream(s), _) if s.unique_channel_files => {
                let Some(files) = channel_files.stores.remove(&name) else {
                    if !channel_files.broken.contains(&name) {
                        warnings.push(Warning::MissingChannelFiles { store: name });
                    }
                    return;
                };
                let expected = meta
                    .store_note(&name)
                    .and_then(StoreNote::sample_freq)
                    .unwrap_or(s.sampling_frequency);
                self.materialize_channel_files(
                    &name,
                    &files,
                    Some(expected),
                    meta,
                    dataset,
                    warnings,
                );
                return;
            }
            (Store::Snippet(s), Some(events)) => {
                snippet::materialize(s, events, ranges, options, warnings).map(|series| {
                    if let Some(series) = series {
                        dataset.snippets.insert(name.clone(), series);
                    }
                })
            }
            (Store::Stream(s), Some(events)) => {
                stream::materialize(s, events, ranges, options, warnings).map(|series| {
                    if let Some(series) = series {
                        dataset.streams.insert(name.clone(), series);
                    }
                })
            }
            (Store::Snippet(_) | Store::Stream(_), None) => Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "block has no event file",
            )),
        };

        if let Err(e) = res {
            warnings.push(Warning::StoreSkipped {
                store: store.name().to_owned(),
                category: store.category(),
                reason: e.to_string(),
            });
        }
    }

    fn materialize_channel_files(
        &self,
        name: &str,
        files: &[sev::ChannelFile],
        expected_fs: Option<f64>,
        meta: &Metadata,
        dataset: &mut Dataset,
        warnings: &mut Warnings,
    ) {
        if !self.options.wants_store(name) {
            return;
        }
        let ranges = &dataset.time_ranges;
        match sev::materialize(name, files, expected_fs, meta, ranges, &self.options, warnings) {
            Ok(Some(series)) => {
                dataset.streams.insert(name.to_owned(), series);
            }
            Ok(None) => (),
            Err(e) => warnings.push(Warning::StoreSkipped {
                store: name.to_owned(),
                category: Category::Stream,
                reason: e.to_string(),
            }),
        }
    }
}
