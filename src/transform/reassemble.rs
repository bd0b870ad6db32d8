//! Joins snippets recorded in strobe mode back into continuous waveforms.

use std::collections::BTreeSet;
use std::ops::Range;

use itertools::Itertools;

use crate::dataset::SnippetSeries;
use crate::format::Samples;
use crate::warning::{Warning, Warnings};

pub(super) const NAME: &str = "fragment reassembly";

/// Events between which no chunk is missing
fn segments(timestamps: &[f64], max_step: f64) -> Vec<Range<usize>> {
    let mut segments = Vec::new();
    let mut start = 0;
    for (i, (a, b)) in timestamps.iter().tuple_windows().enumerate() {
        if b - a > max_step {
            segments.push(start..i + 1);
            start = i + 1;
        }
    }
    if start < timestamps.len() {
        segments.push(start..timestamps.len());
    }
    segments
}

pub(super) fn apply(
    store: &str,
    series: &mut SnippetSeries,
    warnings: &mut Warnings,
) -> Result<(), String> {
    let Some(chunk_len) = series.waveforms.first().map(Samples::len) else {
        return Err("no waveforms were decoded".to_owned());
    };
    if series.waveforms.len() != series.timestamps.len() {
        return Err("waveforms do not match the events".to_owned());
    }
    if series.sampling_frequency <= 0.0 {
        return Err("sampling frequency is unknown".to_owned());
    }
    #[allow(clippy::cast_precision_loss)]
    let max_step = (chunk_len + 1) as f64 / series.sampling_frequency;

    let mut out = without_events(series);
    // a channel without chunks in a segment still gets its record there
    let channels: BTreeSet<u16> = series.channels.iter().copied().collect();

    for segment in segments(&series.timestamps, max_step) {
        let start_time = series.timestamps[segment.start];
        let per_channel = segment.len() / channels.len().max(1);

        for channel in &channels {
            let chunks: Vec<usize> = segment
                .clone()
                .filter(|i| series.channels[*i] == *channel)
                .collect();
            if chunks.len() != per_channel {
                warnings.push(Warning::TruncatedChannels {
                    store: store.to_owned(),
                    kept: per_channel,
                    longest: chunks.len(),
                });
            }

            let mut joined = Samples::with_capacity(series.data_format, per_channel * chunk_len);
            for i in chunks.iter().take(per_channel) {
                if !joined.append(&series.waveforms[*i]) {
                    return Err("chunks have different sample formats".to_owned());
                }
            }
            joined.extend_zeros((per_channel * chunk_len).saturating_sub(joined.len()));
            out.timestamps.push(start_time);
            out.channels.push(*channel);
            out.sort_codes
                .push(chunks.first().map_or(0, |i| series.sort_codes[*i]));
            out.waveforms.push(joined);
        }
    }

    tracing::debug!(
        store,
        chunks = series.len(),
        records = out.len(),
        "reassembled fragments"
    );
    *series = out;
    Ok(())
}

fn without_events(series: &SnippetSeries) -> SnippetSeries {
    SnippetSeries {
        sampling_frequency: series.sampling_frequency,
        data_format: series.data_format,
        timestamps: Vec::new(),
        channels: Vec::new(),
        sort_codes: Vec::new(),
        waveforms: Vec::new(),
        sort_name: series.sort_name.clone(),
        sort_channels: series.sort_channels.clone(),
        positions: Vec::new(),
    }
}
