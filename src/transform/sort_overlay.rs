use crate::dataset::SnippetSeries;
use crate::meta::SortOverlay;
use crate::warning::{Warning, Warnings};

/// Replaces the recorded sort codes with those of a custom sort. Stores
/// the sort has no result for keep their codes.
pub(super) fn apply(
    store: &str,
    series: &mut SnippetSeries,
    overlay: &SortOverlay,
    warnings: &mut Warnings,
) {
    let Some(result) = overlay.for_store(store) else {
        return;
    };

    let codes: Option<Vec<u16>> = series
        .positions
        .iter()
        .map(|pos| result.code(*pos).map(u16::from))
        .collect();
    let Some(codes) = codes else {
        warnings.push(Warning::SortFallback {
            store: store.to_owned(),
            reason: format!(
                "sort {} has fewer codes than the index has records",
                overlay.name
            ),
        });
        return;
    };

    tracing::debug!(store, sort = overlay.name, "applied custom sort");
    series.sort_codes = codes;
    series.sort_name.clone_from(&overlay.name);
    series.sort_channels = result.sorted_channels();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{DataFormat, Samples};
    use crate::meta::SortResult;

    fn snippets(positions: Vec<u64>) -> SnippetSeries {
        SnippetSeries {
            sampling_frequency: 1000.0,
            data_format: DataFormat::Int16,
            timestamps: vec![0.0; positions.len()],
            channels: vec![1; positions.len()],
            sort_codes: vec![0; positions.len()],
            waveforms: vec![Samples::Int16(vec![1, 2]); positions.len()],
            sort_name: "TankSort".to_owned(),
            sort_channels: Vec::new(),
            positions,
        }
    }

    fn overlay() -> SortOverlay {
        let mut bytes = vec![0u8; 1024];
        bytes[1] = 1;
        bytes.extend_from_slice(&[0, 3, 0, 4, 5]);
        SortOverlay {
            name: "Sort1".to_owned(),
            results: vec![SortResult::parse("eNe1".to_owned(), bytes).unwrap()],
        }
    }

    #[test]
    fn codes_follow_index_positions() {
        let mut series = snippets(vec![1, 3, 4]);
        let mut warnings = Warnings::default();
        apply("eNe1", &mut series, &overlay(), &mut warnings);
        assert_eq!(series.sort_codes, vec![3, 4, 5]);
        assert_eq!(series.sort_name, "Sort1");
        assert_eq!(series.sort_channels, vec![1]);
        assert!(warnings.is_empty());
    }

    #[test]
    fn short_sort_keeps_recorded_codes() {
        let mut series = snippets(vec![1, 9]);
        let mut warnings = Warnings::default();
        apply("eNe1", &mut series, &overlay(), &mut warnings);
        assert_eq!(series.sort_codes, vec![0, 0]);
        assert_eq!(series.sort_name, "TankSort");
        assert_eq!(warnings.len(), 1);

        let mut other = snippets(vec![1]);
        apply("eNe2", &mut other, &overlay(), &mut warnings);
        assert_eq!(other.sort_name, "TankSort");
        assert_eq!(warnings.len(), 1);
    }
}
