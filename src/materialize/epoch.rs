use crate::dataset::EpochSeries;
use crate::index::EpochStore;
use crate::time::TimeRange;

/// Intervals with their onset in one of the ranges. Of the intervals
/// spanning the start of a range the one starting last is kept, with its
/// onset moved to that start. Offsets never reach past the end of their
/// range.
pub(crate) fn select(store: &EpochStore, ranges: &[TimeRange]) -> EpochSeries {
    let mut series = EpochSeries::default();
    let pairs = store.onsets.iter().zip(&store.offsets).zip(&store.values);

    for range in ranges {
        let spanning = pairs
            .clone()
            .rev()
            .find(|((onset, offset), _)| {
                **onset < range.start && **offset > range.start && range.start < range.stop
            })
            .map(|((_, offset), value)| ((range.start, *offset), value));
        let inside = pairs
            .clone()
            .filter(|((onset, _), _)| range.contains(**onset))
            .map(|((onset, offset), value)| ((*onset, *offset), value));

        for ((onset, offset), value) in spanning.into_iter().chain(inside) {
            series.onsets.push(onset);
            series.offsets.push(offset.min(range.stop));
            series.values.push(value.clone());
        }
    }

    series.notes = store
        .notes
        .iter()
        .filter(|note| ranges.iter().any(|r| r.contains(note.timestamp)))
        .cloned()
        .collect();
    series
}
