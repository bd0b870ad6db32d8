use std::collections::HashSet;
use std::io;

use tracing::instrument;

use crate::config::Options;
use crate::dataset::SnippetSeries;
use crate::file::ByteReader;
use crate::format::Samples;
use crate::index::SnippetStore;
use crate::time::TimeRange;
use crate::warning::{Missing, Warning, Warnings};

use super::{batch_size, indices_in, read_records, select_channels};

/// Sort name of the codes recorded in the index
pub(crate) const RECORDED_SORT: &str = "TankSort";

#[instrument(level = "debug", skip_all, fields(store = store.info.name))]
pub(crate) fn materialize(
    store: &SnippetStore,
    events: &mut ByteReader,
    ranges: &[TimeRange],
    options: &Options,
    warnings: &mut Warnings,
) -> io::Result<Option<SnippetSeries>> {
    let name = &store.info.name;
    let Some(channels) = select_channels(name, store.channels.iter().copied(), options, warnings)
    else {
        return Ok(None);
    };
    let selected: Vec<usize> = indices_in(&store.timestamps, ranges)
        .into_iter()
        .filter(|i| channels.contains(&store.channels[*i]))
        .collect();

    let mut series = SnippetSeries {
        sampling_frequency: store.sampling_frequency,
        data_format: store.info.data_format,
        timestamps: Vec::new(),
        channels: Vec::new(),
        sort_codes: Vec::new(),
        waveforms: Vec::new(),
        sort_name: RECORDED_SORT.to_owned(),
        sort_channels: Vec::new(),
        positions: Vec::new(),
    };
    let push_meta = |series: &mut SnippetSeries, i: usize| {
        series.timestamps.push(store.timestamps[i]);
        series.channels.push(store.channels[i]);
        series.sort_codes.push(store.sort_codes[i]);
        series.positions.push(store.positions[i]);
    };

    if options.nodata {
        for i in selected {
            push_meta(&mut series, i);
        }
        return Ok(Some(series));
    }

    // a repeated offset means the acquisition lost data, keep the first
    let mut seen = HashSet::new();
    let selected: Vec<usize> = selected
        .into_iter()
        .filter(|i| {
            let first = seen.insert(store.offsets[*i]);
            if !first {
                warnings.push(Warning::DuplicateOffset {
                    store: name.clone(),
                    time: store.timestamps[*i],
                });
            }
            first
        })
        .collect();

    let format = store.info.data_format;
    let record_bytes = store.info.data_bytes() / format.width() * format.width();
    let offsets: Vec<u64> = selected.iter().map(|i| store.offsets[*i]).collect();
    let batch = batch_size(
        &offsets,
        options.limits.snippet_batch,
        options.limits.max_read_size,
    );

    let mut dropped = Vec::new();
    read_records(events, &offsets, record_bytes, batch, |pos, bytes| {
        let i = selected[pos];
        match bytes {
            Some(bytes) => {
                push_meta(&mut series, i);
                series.waveforms.push(Samples::from_le_bytes(format, bytes));
            }
            None => dropped.push(store.timestamps[i]),
        }
    })?;

    if let Some(first_time) = dropped.first() {
        warnings.push(Warning::PartialData {
            store: name.clone(),
            missing: Missing::Snippets {
                dropped: dropped.len(),
                first_time: *first_time,
            },
        });
    }
    tracing::debug!(events = series.len(), "read snippets");
    Ok(Some(series))
}
