use std::io;

use tracing::instrument;

use crate::config::Options;
use crate::dataset::{StreamSegment, StreamSeries};
use crate::file::ByteReader;
use crate::format::Samples;
use crate::index::StreamStore;
use crate::time::{self, Rounding, TimeRange};
use crate::warning::{Missing, Warning, Warnings};

use super::{batch_size, read_records, select_channels};

/// Records needed for `range`: those starting inside it plus one record per
/// channel before it, so the samples at the start of the range are covered.
/// When no record starts inside the range the last `channel_count` records
/// before its stop are used.
fn records_for(store: &StreamStore, range: &TimeRange, channel_count: usize) -> Vec<usize> {
    let ts = &store.timestamps;
    let first_inside = ts.iter().position(|t| range.contains(*t));
    match first_inside {
        Some(first) => {
            let last = ts
                .iter()
                .rposition(|t| range.contains(*t))
                .unwrap_or(first);
            (first.saturating_sub(channel_count)..=last).collect()
        }
        None => {
            let before_stop = ts.iter().take_while(|t| **t < range.stop).count();
            (before_stop.saturating_sub(channel_count)..before_stop).collect()
        }
    }
}

/// Cuts the concatenated record samples down to `range`. The first sample
/// belongs to the record starting at `first_time`.
fn clip(buffers: &mut [Samples], first_time: f64, range: &TimeRange, fs: f64) -> f64 {
    let first_sample = time::to_sample(time::snap(first_time, fs), fs, Rounding::Ceil);
    let wanted_start = time::to_sample(range.start, fs, Rounding::Ceil);
    let skip = wanted_start.saturating_sub(first_sample);

    for buffer in buffers.iter_mut() {
        let end = if range.stop.is_infinite() {
            buffer.len()
        } else {
            let stop = time::to_sample(range.stop, fs, Rounding::Ceil);
            usize::try_from(stop.saturating_sub(first_sample)).unwrap_or(usize::MAX)
        };
        let start = usize::try_from(skip).unwrap_or(usize::MAX);
        *buffer = buffer.slice(start..end);
    }
    time::to_seconds(first_sample + skip, fs)
}

#[instrument(level = "debug", skip_all, fields(store = store.info.name))]
pub(crate) fn materialize(
    store: &StreamStore,
    events: &mut ByteReader,
    ranges: &[TimeRange],
    options: &Options,
    warnings: &mut Warnings,
) -> io::Result<Option<StreamSeries>> {
    let name = &store.info.name;
    let Some(channels) = select_channels(name, store.channels.iter().copied(), options, warnings)
    else {
        return Ok(None);
    };

    let format = store.info.data_format;
    let fs = store.sampling_frequency;
    let record_bytes = store.info.data_bytes() / format.width() * format.width();
    let samples_per_record = record_bytes / format.width();
    let channel_count = store.channels.iter().copied().max().map_or(1, usize::from);

    let mut segments = Vec::with_capacity(ranges.len());
    let mut missing = 0;
    for range in ranges {
        let records: Vec<usize> = records_for(store, range, channel_count)
            .into_iter()
            .filter(|i| channels.contains(&store.channels[*i]))
            .collect();
        let Some(first) = records.first() else {
            segments.push(StreamSegment {
                start_time: range.start,
                data: vec![Samples::new(format); channels.len()],
            });
            continue;
        };
        let first_time = store.timestamps[*first];

        let offsets: Vec<u64> = records.iter().map(|i| store.offsets[*i]).collect();
        let initial = options
            .limits
            .stream_batch
            .min(offsets.len().saturating_sub(1))
            .max(1);
        let batch = batch_size(&offsets, initial, options.limits.max_read_size);

        let mut buffers: Vec<Samples> = channels
            .iter()
            .map(|c| {
                let n = records.iter().filter(|i| store.channels[**i] == *c).count();
                Samples::with_capacity(format, n * samples_per_record)
            })
            .collect();
        read_records(events, &offsets, record_bytes, batch, |pos, bytes| {
            let channel = store.channels[records[pos]];
            let Some(buffer) = channels
                .iter()
                .position(|c| *c == channel)
                .and_then(|idx| buffers.get_mut(idx))
            else {
                return;
            };
            match bytes {
                Some(bytes) => buffer.extend_from_le_bytes(bytes),
                None => {
                    missing += 1;
                    buffer.extend_zeros(samples_per_record);
                }
            }
        })?;

        let start_time = clip(&mut buffers, first_time, range, fs);
        tracing::trace!(start_time, records = records.len(), "stream segment");
        segments.push(StreamSegment {
            start_time,
            data: buffers,
        });
    }

    if missing > 0 {
        warnings.push(Warning::PartialData {
            store: name.clone(),
            missing: Missing::StreamRecords { records: missing },
        });
    }

    Ok(Some(StreamSeries {
        sampling_frequency: fs,
        data_format: format,
        channels,
        segments,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{Category, DataFormat};
    use crate::index::StoreInfo;
    use pretty_assertions::assert_eq;
    use temp_dir::TempDir;

    const FS: f64 = 100.0;
    const SAMPLES: usize = 10;

    /// Two channels, one record per channel every 0.1s, sample values
    /// count up per channel.
    fn setup(dir: &TempDir, records_per_channel: usize) -> (StreamStore, ByteReader) {
        let mut bytes = Vec::new();
        let mut store = StreamStore {
            info: StoreInfo {
                name: "Wav1".to_owned(),
                category: Category::Stream,
                event_code: 0,
                event_type: 0x8101,
                data_format: DataFormat::Int16,
                channel_count: 2,
                record_size: 10 + (SAMPLES * 2 / 4) as u32,
                packed_channels: true,
            },
            sampling_frequency: FS,
            unique_channel_files: false,
            timestamps: Vec::new(),
            offsets: Vec::new(),
            channels: Vec::new(),
        };
        for r in 0..records_per_channel {
            for channel in 1..=2u16 {
                store.timestamps.push(r as f64 * SAMPLES as f64 / FS);
                store.offsets.push(bytes.len() as u64);
                store.channels.push(channel);
                for s in 0..SAMPLES {
                    let value = (r * SAMPLES + s) as i16 * i16::try_from(channel).unwrap();
                    bytes.extend_from_slice(&value.to_le_bytes());
                }
            }
        }
        let path = dir.child("block.tev");
        std::fs::write(&path, bytes).unwrap();
        (store, ByteReader::open(&path).unwrap())
    }

    #[test]
    fn clipped_to_the_range() {
        let dir = TempDir::new().unwrap();
        let (store, mut events) = setup(&dir, 5);
        let mut warnings = Warnings::default();
        let series = materialize(
            &store,
            &mut events,
            &[TimeRange::new(0.15, 0.32)],
            &Options::default(),
            &mut warnings,
        )
        .unwrap()
        .unwrap();

        assert_eq!(series.channels, vec![1, 2]);
        let segment = &series.segments[0];
        assert_eq!(segment.start_time, 0.15);
        assert_eq!(segment.data[0], Samples::Int16((15..32).collect()));
        assert_eq!(
            segment.data[1],
            Samples::Int16((15..32).map(|v| v * 2).collect())
        );
        assert!(warnings.is_empty());
    }

    #[test]
    fn whole_recording_of_one_channel() {
        let dir = TempDir::new().unwrap();
        let (store, mut events) = setup(&dir, 3);
        let series = materialize(
            &store,
            &mut events,
            &[TimeRange::everything()],
            &Options::default().channels([2]),
            &mut Warnings::default(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(series.channels, vec![2]);
        assert_eq!(series.segments[0].start_time, 0.0);
        assert_eq!(series.segments[0].data[0].len(), 3 * SAMPLES);
    }

    #[test]
    fn missing_records_are_zero_filled() {
        let dir = TempDir::new().unwrap();
        let (mut store, mut events) = setup(&dir, 2);
        store.timestamps.extend([0.2, 0.2]);
        store.offsets.extend([10_000, 10_020]);
        store.channels.extend([1, 2]);

        let mut warnings = Warnings::default();
        let series = materialize(
            &store,
            &mut events,
            &[TimeRange::everything()],
            &Options::default(),
            &mut warnings,
        )
        .unwrap()
        .unwrap();
        let data = &series.segments[0].data[0];
        assert_eq!(data.len(), 3 * SAMPLES);
        assert_eq!(data.get(2 * SAMPLES), Some(0.0));
        assert!(matches!(
            warnings.iter().next(),
            Some(Warning::PartialData {
                missing: Missing::StreamRecords { records: 2 },
                ..
            })
        ));
    }
}
