//! Resolves the index of each store into series for the requested time
//! ranges.

pub(crate) mod epoch;
pub(crate) mod scalar;
pub mod sev;
pub(crate) mod snippet;
pub(crate) mod stream;

use std::collections::BTreeSet;
use std::io;

use crate::config::Options;
use crate::file::ByteReader;
use crate::time::TimeRange;
use crate::warning::{Warning, Warnings};

/// Positions of the timestamps inside each range, ranges are concatenated
/// in the order given.
pub(crate) fn indices_in(timestamps: &[f64], ranges: &[TimeRange]) -> Vec<usize> {
    ranges
        .iter()
        .flat_map(|range| {
            timestamps
                .iter()
                .enumerate()
                .filter(|(_, t)| range.contains(**t))
                .map(|(i, _)| i)
        })
        .collect()
}

/// The channels of a store that were requested, sorted. Requested channels
/// the store does not have are warned about. Returns `None` if the store
/// has channels but none of them were requested.
pub(crate) fn select_channels(
    store: &str,
    present: impl IntoIterator<Item = u16>,
    options: &Options,
    warnings: &mut Warnings,
) -> Option<Vec<u16>> {
    let present: BTreeSet<u16> = present.into_iter().collect();
    let Some(requested) = &options.channels else {
        return Some(present.into_iter().collect());
    };

    for channel in requested.iter().filter(|c| !present.contains(c)) {
        warnings.push(Warning::ChannelNotFound {
            store: store.to_owned(),
            channel: *channel,
        });
    }

    let kept: Vec<u16> = present
        .iter()
        .copied()
        .filter(|c| options.wants_channel(*c))
        .collect();
    if kept.is_empty() && !present.is_empty() {
        warnings.push(Warning::NoChannelsLeft {
            store: store.to_owned(),
        });
        return None;
    }
    Some(kept)
}

/// Number of records to read at once. Starts at `initial` and halves while
/// the distance between the first records of two batches exceeds
/// `max_read_size`.
pub(crate) fn batch_size(offsets: &[u64], initial: usize, max_read_size: u64) -> usize {
    let mut batch = initial.max(1);
    loop {
        let too_far = offsets
            .iter()
            .step_by(batch)
            .zip(offsets.iter().step_by(batch).skip(1))
            .any(|(a, b)| a.abs_diff(*b) > max_read_size);
        if !too_far || batch == 1 {
            return batch;
        }
        batch = (batch / 2).max(1);
    }
}

/// Reads the records at `offsets` in batches, `sink` gets the index into
/// `offsets` and the record bytes, or `None` if the file ends before the
/// record does.
pub(crate) fn read_records(
    reader: &mut ByteReader,
    offsets: &[u64],
    record_bytes: usize,
    batch: usize,
    mut sink: impl FnMut(usize, Option<&[u8]>),
) -> io::Result<()> {
    let batch = batch.max(1);
    for (batch_numb, chunk) in offsets.chunks(batch).enumerate() {
        let (Some(start), Some(end)) = (chunk.iter().min(), chunk.iter().max()) else {
            continue;
        };
        let span = usize::try_from(end - start).unwrap_or(usize::MAX);
        let bytes = reader.read_at(*start, span.saturating_add(record_bytes))?;

        for (i, offset) in chunk.iter().enumerate() {
            let relative = usize::try_from(offset - start).unwrap_or(usize::MAX);
            let record = relative
                .checked_add(record_bytes)
                .and_then(|end| bytes.get(relative..end));
            sink(batch_numb * batch + i, record);
        }
    }
    Ok(())
}
