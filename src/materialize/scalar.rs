use itertools::Itertools;

use crate::dataset::ScalarSeries;
use crate::index::ScalarStore;
use crate::time::TimeRange;
use crate::warning::{Warning, Warnings};

use super::indices_in;

/// Selects the values in range and splits them per channel. Channels are
/// truncated to the shortest one, the timestamps of the first channel are
/// used for all.
pub(crate) fn select(
    store: &ScalarStore,
    ranges: &[TimeRange],
    warnings: &mut Warnings,
) -> ScalarSeries {
    let selected = indices_in(&store.timestamps, ranges);
    let notes = store
        .notes
        .iter()
        .filter(|note| ranges.iter().any(|r| r.contains(note.timestamp)))
        .cloned()
        .collect();

    let channel_count = selected
        .iter()
        .map(|i| store.channels[*i])
        .max()
        .unwrap_or(1);
    if channel_count <= 1 {
        return ScalarSeries {
            timestamps: selected.iter().map(|i| store.timestamps[*i]).collect(),
            values: vec![selected.iter().map(|i| store.values[*i]).collect()],
            channels: vec![1],
            notes,
        };
    }

    let per_channel: Vec<Vec<usize>> = (1..=channel_count)
        .map(|channel| {
            selected
                .iter()
                .copied()
                .filter(|i| store.channels[*i] == channel)
                .collect()
        })
        .collect();
    let (shortest, longest) = per_channel
        .iter()
        .map(Vec::len)
        .minmax()
        .into_option()
        .unwrap_or((0, 0));
    if shortest != longest {
        warnings.push(Warning::TruncatedChannels {
            store: store.info.name.clone(),
            kept: shortest,
            longest,
        });
    }

    ScalarSeries {
        timestamps: per_channel[0][..shortest]
            .iter()
            .map(|i| store.timestamps[*i])
            .collect(),
        values: per_channel
            .iter()
            .map(|indices| indices[..shortest].iter().map(|i| store.values[*i]).collect())
            .collect(),
        channels: (1..=channel_count).collect(),
        notes,
    }
}
