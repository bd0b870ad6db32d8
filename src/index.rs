//! Reads the index file (`*.tsq`) and groups its records per store.

mod epoch;
pub(crate) mod record;
mod store;

use std::collections::HashMap;
use std::path::Path;

use tracing::instrument;

use crate::config::Options;
use crate::file::ByteReader;
use crate::format::{event_type, marker, Category, DataFormat, EpochKind};
use crate::meta::Metadata;
use crate::time::{self, INDEX_RESOLUTION_HZ};
use crate::warning::{Warning, Warnings};

use epoch::PendingEpoch;
use record::{code_to_name, Record, RECORD_LEN};

pub(crate) use epoch::NOTE_STORE;
pub use store::{
    EpochStore, EpochValue, ScalarStore, SnippetStore, Store, StoreInfo, StreamStore, TaggedNote,
};

#[derive(Debug, thiserror::Error)]
pub enum HeaderError {
    #[error("File is only {0} bytes, too short to hold the start of a block")]
    TooShort(u64),
    #[error("Second record should mark the start of the block, found code {0}")]
    NoStartMarker(u32),
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Header(HeaderError),
    #[error("Io error while reading index: {0}")]
    Io(std::io::Error),
}

/// Result of reading the index file
#[derive(Debug)]
pub(crate) struct Index {
    /// absolute block start, seconds since the unix epoch
    pub(crate) start_time: f64,
    pub(crate) stop_time: Option<f64>,
    pub(crate) stores: Vec<Store>,
}

enum Slot {
    Ignored,
    Epoch(usize),
    Store(usize),
}

struct Builder<'a> {
    options: &'a Options,
    meta: &'a Metadata,
    start_time: f64,
    slots: HashMap<u32, Slot>,
    epochs: Vec<PendingEpoch>,
    stores: Vec<Store>,
    bad_records: usize,
}

#[instrument(skip(options, meta, warnings))]
pub(crate) fn build(
    path: &Path,
    options: &Options,
    meta: &Metadata,
    warnings: &mut Warnings,
) -> Result<Index, Error> {
    let mut reader = ByteReader::open(path).map_err(Error::Io)?;
    let len = reader.data_len();
    if len < 2 * RECORD_LEN as u64 {
        return Err(Error::Header(HeaderError::TooShort(len)));
    }

    // the first record is a preamble
    let start = reader.read_at(RECORD_LEN as u64, RECORD_LEN).map_err(Error::Io)?;
    let start = Record::parse(&start);
    if start.code != marker::START_BLOCK {
        return Err(Error::Header(HeaderError::NoStartMarker(start.code)));
    }

    let stop = reader
        .read_at(len - RECORD_LEN as u64, RECORD_LEN)
        .map_err(Error::Io)?;
    let stop = Record::parse(&stop);
    let stop_time = if stop.code == marker::STOP_BLOCK {
        Some(stop.timestamp)
    } else {
        warnings.push(Warning::MissingStopMarker);
        None
    };

    let mut builder = Builder {
        options,
        meta,
        start_time: start.timestamp,
        slots: HashMap::new(),
        epochs: Vec::new(),
        stores: Vec::new(),
        bad_records: 0,
    };

    let last_stop = options.last_stop();
    let block_len = options.limits.index_block_records.max(1) * RECORD_LEN;
    let mut offset = RECORD_LEN as u64;
    // position of the start marker is zero
    let mut position = 0u64;
    'blocks: loop {
        let bytes = reader.read_at(offset, block_len).map_err(Error::Io)?;
        if bytes.is_empty() {
            break;
        }
        offset += bytes.len() as u64;

        let trailing = bytes.len() % RECORD_LEN;
        if trailing != 0 {
            warnings.push(Warning::TrailingBytes { bytes: trailing });
        }

        for chunk in bytes.chunks_exact(RECORD_LEN) {
            let record = Record::parse(chunk);
            let current = position;
            position += 1;

            if record.code == 0 {
                builder.bad_records += 1;
                continue;
            }
            if record.code == marker::START_BLOCK || record.code == marker::STOP_BLOCK {
                continue;
            }

            let relative = time::snap(record.timestamp - builder.start_time, INDEX_RESOLUTION_HZ);
            if relative > last_stop {
                tracing::debug!(relative, "passed the last requested time");
                break 'blocks;
            }
            builder.add(&record, relative, current, warnings);
        }

        if bytes.len() < block_len {
            break;
        }
    }

    if builder.bad_records > 0 {
        warnings.push(Warning::BadRecords {
            count: builder.bad_records,
        });
    }

    let want_notes = options.wants(Category::Epoch) && options.wants_store(NOTE_STORE);
    let epochs = epoch::finalize(builder.epochs, meta, want_notes, warnings);
    let mut stores: Vec<Store> = epochs.into_iter().map(Store::Epoch).collect();
    stores.append(&mut builder.stores);
    for store in &mut stores {
        store.finish_channels();
    }

    tracing::debug!(stores = stores.len(), records = position, "index read");
    Ok(Index {
        start_time: start.timestamp,
        stop_time,
        stores,
    })
}

impl Builder<'_> {
    fn add(&mut self, record: &Record, relative: f64, position: u64, warnings: &mut Warnings) {
        if !self.slots.contains_key(&record.code) {
            let slot = self.new_slot(record, warnings);
            self.slots.insert(record.code, slot);
        }
        let note = self.tagged_note(record, relative);

        match self.slots.get(&record.code) {
            Some(Slot::Ignored) | None => (),
            Some(Slot::Epoch(idx)) => {
                let epoch = &mut self.epochs[*idx];
                epoch.times.push(relative);
                epoch.values.push(record.value());
                epoch.notes.extend(note);
            }
            Some(Slot::Store(idx)) => match &mut self.stores[*idx] {
                Store::Snippet(s) => {
                    s.timestamps.push(relative);
                    s.offsets.push(record.offset());
                    s.channels.push(record.channel());
                    s.sort_codes.push(record.sort_code());
                    s.positions.push(position);
                }
                Store::Stream(s) => {
                    s.timestamps.push(relative);
                    s.offsets.push(record.offset());
                    s.channels.push(record.channel());
                }
                Store::Scalar(s) => {
                    s.timestamps.push(relative);
                    s.values.push(record.value());
                    s.channels.push(record.channel());
                    s.notes.extend(note);
                }
                // epochs are collected in `self.epochs`
                Store::Epoch(_) => (),
            },
        }
    }

    fn tagged_note(&self, record: &Record, relative: f64) -> Option<TaggedNote> {
        let index = record.note_index();
        if index == 0 || self.meta.tagged_notes.is_empty() {
            return None;
        }
        let category = Category::from_event_type(record.event_type)?;
        if !matches!(category, Category::Epoch | Category::Scalar) {
            return None;
        }
        Some(TaggedNote {
            timestamp: relative,
            index,
            text: self
                .meta
                .tagged_notes
                .get(index)
                .unwrap_or_default()
                .to_owned(),
        })
    }

    fn new_slot(&mut self, record: &Record, warnings: &mut Warnings) -> Slot {
        let name = code_to_name(record.code);
        let Some(category) = Category::from_event_type(record.event_type) else {
            warnings.push(Warning::UnknownEventType {
                store: name,
                event_type: record.event_type,
            });
            return Slot::Ignored;
        };

        if self.meta.store_note(&name).is_some_and(|n| !n.enabled()) {
            warnings.push(Warning::DisabledStore { store: name });
            return Slot::Ignored;
        }
        if !self.options.wants(category) {
            return Slot::Ignored;
        }

        let buddy = code_to_name(record.channel_word);
        let wanted = self.options.wants_store(&name)
            || (category == Category::Epoch && self.options.wants_store(&buddy));
        if !wanted {
            return Slot::Ignored;
        }

        let data_format = match (category, DataFormat::from_code(record.format)) {
            (_, Ok(format)) => format,
            (Category::Epoch | Category::Scalar, Err(_)) => DataFormat::Float64,
            (Category::Snippet | Category::Stream, Err(e)) => {
                warnings.push(Warning::UnsupportedEncoding {
                    store: name,
                    format: e.0,
                });
                return Slot::Ignored;
            }
        };

        tracing::debug!(%name, %category, "new store");
        let info = StoreInfo {
            name,
            category,
            event_code: record.code,
            event_type: record.event_type,
            data_format,
            channel_count: 0,
            record_size: record.size,
            packed_channels: false,
        };

        let store = match category {
            Category::Epoch => {
                let kind = EpochKind::from_event_type(record.event_type).unwrap_or(EpochKind::Onset);
                self.epochs.push(PendingEpoch {
                    info,
                    buddy,
                    kind,
                    times: Vec::new(),
                    values: Vec::new(),
                    notes: Vec::new(),
                });
                return Slot::Epoch(self.epochs.len() - 1);
            }
            Category::Snippet => Store::Snippet(SnippetStore {
                info,
                sampling_frequency: record.frequency(),
                timestamps: Vec::new(),
                offsets: Vec::new(),
                channels: Vec::new(),
                sort_codes: Vec::new(),
                positions: Vec::new(),
            }),
            Category::Stream => Store::Stream(StreamStore {
                info,
                sampling_frequency: record.frequency(),
                unique_channel_files: record.event_type & event_type::UNIQUE_CHANNEL_FILES != 0,
                timestamps: Vec::new(),
                offsets: Vec::new(),
                channels: Vec::new(),
            }),
            Category::Scalar => Store::Scalar(ScalarStore {
                info,
                timestamps: Vec::new(),
                values: Vec::new(),
                channels: Vec::new(),
                notes: Vec::new(),
            }),
        };
        self.stores.push(store);
        Slot::Store(self.stores.len() - 1)
    }
}
