//! Decoded, in memory representation of a block.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, TimeDelta, Utc};

use crate::format::{DataFormat, Samples};
use crate::index::{EpochValue, Store, TaggedNote};
use crate::time::TimeRange;
use crate::warning::Warnings;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockInfo {
    pub tank_path: PathBuf,
    pub block_name: String,
    pub block_path: PathBuf,
    pub start_date: Option<DateTime<Utc>>,
    pub stop_date: Option<DateTime<Utc>>,
    pub duration: Option<TimeDelta>,
    pub experiment: Option<String>,
    pub subject: Option<String>,
    pub user: Option<String>,
    /// recording start as written in the experiment notes
    pub start: Option<String>,
    pub stop: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub onset: f64,
    pub offset: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EpochSeries {
    pub onsets: Vec<f64>,
    pub offsets: Vec<f64>,
    pub values: Vec<EpochValue>,
    pub notes: Vec<TaggedNote>,
}

impl EpochSeries {
    #[must_use]
    pub fn len(&self) -> usize {
        self.onsets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.onsets.is_empty()
    }

    pub fn intervals(&self) -> impl Iterator<Item = Interval> + '_ {
        self.onsets
            .iter()
            .zip(&self.offsets)
            .map(|(onset, offset)| Interval {
                onset: *onset,
                offset: *offset,
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SnippetSeries {
    pub sampling_frequency: f64,
    pub data_format: DataFormat,
    pub timestamps: Vec<f64>,
    pub channels: Vec<u16>,
    pub sort_codes: Vec<u16>,
    /// one waveform per event, empty when decoded without data
    pub waveforms: Vec<Samples>,
    pub sort_name: String,
    pub sort_channels: Vec<u16>,
    /// position of each event in the index file, cleared by reassembly
    pub(crate) positions: Vec<u64>,
}

impl SnippetSeries {
    #[must_use]
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

/// Samples of one time range, every channel starts at `start_time`
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSegment {
    pub start_time: f64,
    /// one buffer per channel in the order of `StreamSeries::channels`
    pub data: Vec<Samples>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamSeries {
    pub sampling_frequency: f64,
    pub data_format: DataFormat,
    pub channels: Vec<u16>,
    /// one segment per requested time range
    pub segments: Vec<StreamSegment>,
}

impl StreamSeries {
    /// Samples of `channel` in the first segment
    #[must_use]
    pub fn channel(&self, channel: u16) -> Option<&Samples> {
        let idx = self.channels.iter().position(|c| *c == channel)?;
        self.segments.first()?.data.get(idx)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScalarSeries {
    pub timestamps: Vec<f64>,
    /// one column per channel, each as long as `timestamps`
    pub values: Vec<Vec<f64>>,
    pub channels: Vec<u16>,
    pub notes: Vec<TaggedNote>,
}

impl ScalarSeries {
    /// `(timestamp, channel, value)` in time order
    pub fn samples(&self) -> impl Iterator<Item = (f64, u16, f64)> + '_ {
        self.timestamps.iter().enumerate().flat_map(move |(i, t)| {
            self.channels
                .iter()
                .zip(&self.values)
                .filter_map(move |(channel, column)| Some((*t, *channel, *column.get(i)?)))
        })
    }
}

/// On and off times of every bit of a store holding packed bits
#[derive(Debug, Clone, PartialEq)]
pub struct BitwiseSeries {
    pub store: String,
    /// index is the bit number, bit 0 is the least significant
    pub bits: Vec<Vec<Interval>>,
}

impl BitwiseSeries {
    #[must_use]
    pub fn bit(&self, bit: usize) -> &[Interval] {
        self.bits.get(bit).map_or(&[], Vec::as_slice)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub info: BlockInfo,
    pub epochs: BTreeMap<String, EpochSeries>,
    pub snippets: BTreeMap<String, SnippetSeries>,
    pub streams: BTreeMap<String, StreamSeries>,
    pub scalars: BTreeMap<String, ScalarSeries>,
    pub bitwise: BTreeMap<String, BitwiseSeries>,
    pub time_ranges: Vec<TimeRange>,
}

/// Result of decoding a block
#[derive(Debug)]
pub struct Decoded {
    pub dataset: Dataset,
    pub warnings: Warnings,
}

/// Result of reading only the index of a block
#[derive(Debug)]
pub struct Headers {
    pub info: BlockInfo,
    pub stores: Vec<Store>,
    pub warnings: Warnings,
}
