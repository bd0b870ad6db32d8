//! Post processing applied to a decoded dataset. Transforms that can not
//! be applied leave the data untouched and raise a warning.

mod bitwise;
mod reassemble;
mod sort_overlay;

use tracing::instrument;

use crate::config::Options;
use crate::dataset::Dataset;
use crate::meta::Metadata;
use crate::warning::{Warning, Warnings};

pub use bitwise::decompose;

#[instrument(level = "debug", skip_all)]
pub(crate) fn apply(
    dataset: &mut Dataset,
    meta: &Metadata,
    options: &Options,
    warnings: &mut Warnings,
) {
    // needs the index positions, reassembly drops those
    if let Some(overlay) = &meta.sort {
        for (store, series) in &mut dataset.snippets {
            sort_overlay::apply(store, series, overlay, warnings);
        }
    }

    for store in &options.combine {
        let Some(series) = dataset.snippets.get_mut(store) else {
            warnings.push(Warning::TransformSkipped {
                store: store.clone(),
                transform: reassemble::NAME,
                reason: "not a decoded snippet store".to_owned(),
            });
            continue;
        };
        if let Err(reason) = reassemble::apply(store, series, warnings) {
            warnings.push(Warning::TransformSkipped {
                store: store.clone(),
                transform: reassemble::NAME,
                reason,
            });
        }
    }

    if let Some(store) = &options.bitwise {
        match bitwise::from_dataset(store, dataset, warnings) {
            Ok(series) => {
                dataset.bitwise.insert(store.clone(), series);
            }
            Err(reason) => warnings.push(Warning::TransformSkipped {
                store: store.clone(),
                transform: bitwise::NAME,
                reason,
            }),
        }
    }
}
