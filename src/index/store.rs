use serde::{Deserialize, Serialize};

use crate::format::{Category, DataFormat, EpochKind};

/// Fields every store descriptor has
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreInfo {
    /// four character name, unique within a category
    pub name: String,
    pub category: Category,
    pub event_code: u32,
    /// raw event type word
    pub event_type: u32,
    pub data_format: DataFormat,
    pub channel_count: u32,
    /// in 4 byte words, including the 10 word header
    pub record_size: u32,
    /// records of different channels are interleaved in one stream
    pub packed_channels: bool,
}

impl StoreInfo {
    /// Bytes of sample data in each record of the event file
    pub(crate) fn data_bytes(&self) -> usize {
        self.record_size.saturating_sub(super::record::HEADER_WORDS) as usize * 4
    }
}

/// A note attached to an epoch or scalar event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedNote {
    pub timestamp: f64,
    pub index: u32,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EpochValue {
    Number(f64),
    Text(String),
}

impl EpochValue {
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            EpochValue::Number(n) => Some(*n),
            EpochValue::Text(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EpochStore {
    pub info: StoreInfo,
    /// name of the store holding the other half of each interval
    pub buddy: String,
    pub(crate) kind: EpochKind,
    pub onsets: Vec<f64>,
    pub offsets: Vec<f64>,
    pub values: Vec<EpochValue>,
    pub notes: Vec<TaggedNote>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SnippetStore {
    pub info: StoreInfo,
    pub sampling_frequency: f64,
    pub timestamps: Vec<f64>,
    /// byte offsets into the event file
    pub offsets: Vec<u64>,
    pub channels: Vec<u16>,
    pub sort_codes: Vec<u16>,
    /// position of each record in the index file
    pub positions: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamStore {
    pub info: StoreInfo,
    pub sampling_frequency: f64,
    /// samples live in per-channel files instead of the event file
    pub unique_channel_files: bool,
    pub timestamps: Vec<f64>,
    pub offsets: Vec<u64>,
    pub channels: Vec<u16>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScalarStore {
    pub info: StoreInfo,
    pub timestamps: Vec<f64>,
    pub values: Vec<f64>,
    pub channels: Vec<u16>,
    pub notes: Vec<TaggedNote>,
}

/// Descriptor of one store together with its part of the index
#[derive(Debug, Clone, PartialEq)]
pub enum Store {
    Epoch(EpochStore),
    Snippet(SnippetStore),
    Stream(StreamStore),
    Scalar(ScalarStore),
}

impl Store {
    #[must_use]
    pub fn info(&self) -> &StoreInfo {
        match self {
            Store::Epoch(s) => &s.info,
            Store::Snippet(s) => &s.info,
            Store::Stream(s) => &s.info,
            Store::Scalar(s) => &s.info,
        }
    }

    pub(crate) fn info_mut(&mut self) -> &mut StoreInfo {
        match self {
            Store::Epoch(s) => &mut s.info,
            Store::Snippet(s) => &mut s.info,
            Store::Stream(s) => &mut s.info,
            Store::Scalar(s) => &mut s.info,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.info().name
    }

    #[must_use]
    pub fn category(&self) -> Category {
        self.info().category
    }

    pub(crate) fn channels(&self) -> &[u16] {
        match self {
            Store::Epoch(_) => &[],
            Store::Snippet(s) => &s.channels,
            Store::Stream(s) => &s.channels,
            Store::Scalar(s) => &s.channels,
        }
    }

    /// Sets the channel count and packing once all records are known
    pub(crate) fn finish_channels(&mut self) {
        let channel_count = self.channels().iter().copied().max().map_or(0, u32::from);
        let multiple = self
            .channels()
            .first()
            .is_some_and(|first| self.channels().iter().any(|c| c != first));
        let unique_files = matches!(self, Store::Stream(s) if s.unique_channel_files);
        let info = self.info_mut();
        info.channel_count = channel_count.max(u32::from(info.category == Category::Epoch));
        info.packed_channels = multiple && !unique_files;
    }
}
