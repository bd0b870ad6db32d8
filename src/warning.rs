use std::path::PathBuf;

use crate::format::Category;
use crate::materialize::sev;
use crate::meta;

/// What part of a store could not be read
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Missing {
    #[error("gap in the recording, last saved sample: {last_saved}, next saved sample: {new_saved}")]
    RecordingGap { last_saved: u64, new_saved: u64 },
    #[error("{dropped} snippets lie past the end of the event file, first at {first_time}s")]
    Snippets { dropped: usize, first_time: f64 },
    #[error("{records} stream records lie past the end of the event file, filled with zeros")]
    StreamRecords { records: usize },
    #[error("channel {channel} has no file for hour {hour}, filled with zeros")]
    ChannelFile { channel: u16, hour: u32 },
}

/// Problems that do not stop a decode. Every warning is also logged.
#[derive(Debug, thiserror::Error)]
pub enum Warning {
    #[error("Store {store} is incomplete: {missing}")]
    PartialData { store: String, missing: Missing },
    #[error("Channel {channel} not found in store {store}")]
    ChannelNotFound { store: String, channel: u16 },
    #[error("None of the requested channels are in store {store}, skipping it")]
    NoChannelsLeft { store: String },
    #[error("Requested store {store} was not found")]
    StoreNotFound { store: String },
    #[error("Store {store} uses unsupported data format code {format}, skipping it")]
    UnsupportedEncoding { store: String, format: u32 },
    #[error("Store {store} has unknown event type {event_type:#x}, ignoring it")]
    UnknownEventType { store: String, event_type: u32 },
    #[error("Could not read header of {}: {source}", path.display())]
    MalformedHeader {
        path: PathBuf,
        source: sev::HeaderError,
    },
    #[error("{} has an empty header, assuming float32 samples at {fs}Hz", path.display())]
    AssumedHeader { path: PathBuf, fs: f64 },
    #[error("Store {store} has a duplicate snippet at {time}s, dropping it")]
    DuplicateOffset { store: String, time: f64 },
    #[error("Index did not end cleanly, dropped the last {bytes} bytes")]
    TrailingBytes { bytes: usize },
    #[error("Dropped {count} index records with code 0")]
    BadRecords { count: usize },
    #[error("Index has no stop marker, the recording stop is unknown")]
    MissingStopMarker,
    #[error("Store {store} was disabled during the recording, skipping it")]
    DisabledStore { store: String },
    #[error("Epoch store {store} has offsets but its onset store {buddy} was not found")]
    MissingBuddy { store: String, buddy: String },
    #[error("Truncated the channels of {store} to {kept} values (longest had {longest})")]
    TruncatedChannels {
        store: String,
        kept: usize,
        longest: usize,
    },
    #[error("Detected sampling rate of {store} is {detected}Hz, expected {expected}Hz, using {expected}Hz")]
    SamplingRateMismatch {
        store: String,
        detected: f64,
        expected: f64,
    },
    #[error("Store {store} starts on sample {sample}")]
    LateStart { store: String, sample: u64 },
    #[error("Unique channel files expected for {store} but none were found, skipping it")]
    MissingChannelFiles { store: String },
    #[error("Could not use {}: {source}", path.display())]
    UnreadableMetadata {
        path: PathBuf,
        source: meta::Error,
    },
    #[error("No sort named {sort_name} exists for this block")]
    SortNotFound { sort_name: String },
    #[error("Keeping the recorded sort codes of {store}: {reason}")]
    SortFallback { store: String, reason: String },
    #[error("{values} values of {store} do not fit 32 bits, treating them as all bits low")]
    BitsOutOfRange { store: String, values: usize },
    #[error("Could not apply {transform} to {store}: {reason}")]
    TransformSkipped {
        store: String,
        transform: &'static str,
        reason: String,
    },
    #[error("Could not materialize {category} store {store}: {reason}")]
    StoreSkipped {
        store: String,
        category: Category,
        reason: String,
    },
}

/// Ordered collection of the warnings raised during one decode.
#[derive(Debug, Default)]
pub struct Warnings(Vec<Warning>);

impl Warnings {
    pub(crate) fn push(&mut self, warning: Warning) {
        tracing::warn!("{warning}");
        self.0.push(warning);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Warning> {
        self.0.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<Warning> {
        self.0
    }
}

impl IntoIterator for Warnings {
    type Item = Warning;
    type IntoIter = std::vec::IntoIter<Warning>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Warnings {
    type Item = &'a Warning;
    type IntoIter = std::slice::Iter<'a, Warning>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
