use num_traits::ToPrimitive;

use crate::dataset::{BitwiseSeries, Dataset, Interval};
use crate::warning::{Warning, Warnings};

pub(super) const NAME: &str = "bitwise decomposition";
const BITS: usize = 32;

/// Splits a store of packed bits into on and off intervals per bit. A
/// bit going from 0 to 1 starts an interval, going back to 0 ends it.
/// Bits still set after the last event never end. Values are truncated,
/// those that still do not fit a `u32` count as all bits low.
#[must_use]
pub fn decompose(store: &str, times: &[f64], values: &[f64]) -> BitwiseSeries {
    decompose_counting(store, times, values).0
}

/// Like [`decompose`], also returns how many values did not fit a `u32`
fn decompose_counting(store: &str, times: &[f64], values: &[f64]) -> (BitwiseSeries, usize) {
    let mut bits = vec![Vec::new(); BITS];
    let mut high_since: [Option<f64>; BITS] = [None; BITS];
    let mut out_of_range = 0;

    for (time, value) in times.iter().zip(values) {
        let word = value.to_u32().unwrap_or_else(|| {
            out_of_range += 1;
            0
        });
        for (bit, since) in high_since.iter_mut().enumerate() {
            let high = (word >> bit) & 1 == 1;
            match (*since, high) {
                (None, true) => *since = Some(*time),
                (Some(onset), false) => {
                    bits[bit].push(Interval {
                        onset,
                        offset: *time,
                    });
                    *since = None;
                }
                _ => (),
            }
        }
    }

    for (bit, since) in high_since.iter().enumerate() {
        if let Some(onset) = since {
            bits[bit].push(Interval {
                onset: *onset,
                offset: f64::INFINITY,
            });
        }
    }

    let series = BitwiseSeries {
        store: store.to_owned(),
        bits,
    };
    (series, out_of_range)
}

/// Decomposes a decoded epoch or scalar store
pub(super) fn from_dataset(
    store: &str,
    dataset: &Dataset,
    warnings: &mut Warnings,
) -> Result<BitwiseSeries, String> {
    let (series, out_of_range) = if let Some(epochs) = dataset.epochs.get(store) {
        let values: Option<Vec<f64>> = epochs.values.iter().map(|v| v.as_number()).collect();
        let values = values.ok_or_else(|| "epoch values are not numbers".to_owned())?;
        decompose_counting(store, &epochs.onsets, &values)
    } else if let Some(scalars) = dataset.scalars.get(store) {
        let values = scalars.values.first().map_or(&[][..], Vec::as_slice);
        decompose_counting(store, &scalars.timestamps, values)
    } else {
        return Err("not a decoded epoch or scalar store".to_owned());
    };

    if out_of_range > 0 {
        warnings.push(Warning::BitsOutOfRange {
            store: store.to_owned(),
            values: out_of_range,
        });
    }
    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{EpochSeries, ScalarSeries};
    use crate::index::EpochValue;
    use pretty_assertions::assert_eq;

    #[test]
    fn bit_three_on_and_off() {
        let series = decompose("PC0/", &[1.0, 2.0], &[8.0, 0.0]);
        assert_eq!(
            series.bit(3),
            &[Interval {
                onset: 1.0,
                offset: 2.0
            }]
        );
        assert!(series.bit(0).is_empty());
        assert!(series.bit(40).is_empty());
    }

    #[test]
    fn overlapping_bits() {
        let series = decompose("PC0/", &[0.5, 1.0, 1.5], &[1.0, 3.0, 2.0]);
        assert_eq!(
            series.bit(0),
            &[Interval {
                onset: 0.5,
                offset: 1.5
            }]
        );
        assert_eq!(
            series.bit(1),
            &[Interval {
                onset: 1.0,
                offset: f64::INFINITY
            }]
        );
    }

    #[test]
    fn from_epochs_and_scalars() {
        let mut dataset = Dataset::default();
        dataset.epochs.insert(
            "PC0/".to_owned(),
            EpochSeries {
                onsets: vec![1.0, 2.0],
                offsets: vec![2.0, f64::INFINITY],
                values: vec![EpochValue::Number(4.0), EpochValue::Number(0.0)],
                notes: Vec::new(),
            },
        );
        dataset.scalars.insert(
            "Bits".to_owned(),
            ScalarSeries {
                timestamps: vec![3.0],
                values: vec![vec![2.0]],
                channels: vec![1],
                notes: Vec::new(),
            },
        );

        let mut warnings = Warnings::default();
        let epochs = from_dataset("PC0/", &dataset, &mut warnings).unwrap();
        assert_eq!(epochs.bit(2).len(), 1);
        let scalars = from_dataset("Bits", &dataset, &mut warnings).unwrap();
        assert_eq!(scalars.bit(1)[0].onset, 3.0);
        assert!(from_dataset("Nope", &dataset, &mut warnings).is_err());
        assert!(warnings.is_empty());
    }

    #[test]
    fn values_beyond_u32_are_reported() {
        let mut dataset = Dataset::default();
        dataset.scalars.insert(
            "Bits".to_owned(),
            ScalarSeries {
                timestamps: vec![1.0, 2.0, 3.0, 4.0],
                values: vec![vec![1.0, -1.0, 5e9, 0.0]],
                channels: vec![1],
                notes: Vec::new(),
            },
        );

        let mut warnings = Warnings::default();
        let series = from_dataset("Bits", &dataset, &mut warnings).unwrap();
        assert_eq!(
            series.bit(0),
            &[Interval {
                onset: 1.0,
                offset: 2.0
            }]
        );
        assert!(matches!(
            warnings.iter().next(),
            Some(Warning::BitsOutOfRange { values: 2, .. })
        ));
    }
}
