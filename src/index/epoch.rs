//! Turns onset and offset records into intervals.

use crate::format::{event_type, Category, DataFormat, EpochKind};
use crate::meta::{Metadata, Note};
use crate::warning::{Warning, Warnings};

use super::record::name_to_code;
use super::store::{EpochStore, EpochValue, StoreInfo};

/// Name of the epoch store created from the experiment notes
pub(crate) const NOTE_STORE: &str = "Note";

/// Epoch records of one store as read from the index
#[derive(Debug)]
pub(crate) struct PendingEpoch {
    pub(crate) info: StoreInfo,
    pub(crate) buddy: String,
    pub(crate) kind: EpochKind,
    pub(crate) times: Vec<f64>,
    pub(crate) values: Vec<f64>,
    pub(crate) notes: Vec<super::TaggedNote>,
}

fn onset_store(pending: PendingEpoch) -> EpochStore {
    let offsets = pending
        .times
        .iter()
        .skip(1)
        .copied()
        .chain(std::iter::once(f64::INFINITY))
        .collect();
    EpochStore {
        info: pending.info,
        buddy: pending.buddy,
        kind: EpochKind::Onset,
        onsets: pending.times,
        offsets,
        values: pending.values.into_iter().map(EpochValue::Number).collect(),
        notes: pending.notes,
    }
}

fn synthesized_info(name: &str, event_type: u32) -> StoreInfo {
    StoreInfo {
        name: name.to_owned(),
        category: Category::Epoch,
        event_code: name_to_code(name),
        event_type,
        data_format: DataFormat::Float64,
        channel_count: 1,
        record_size: 10,
        packed_channels: false,
    }
}

/// Store for offsets whose onset store never appeared, starts at the
/// beginning of the recording.
fn synthesized_onset(name: &str) -> EpochStore {
    EpochStore {
        info: synthesized_info(name, event_type::STRON),
        buddy: String::new(),
        kind: EpochKind::Onset,
        onsets: vec![0.0],
        offsets: vec![f64::INFINITY],
        values: vec![EpochValue::Number(0.0)],
        notes: Vec::new(),
    }
}

fn attach_offsets(store: &mut EpochStore, offsets: Vec<f64>) {
    store.offsets = offsets;
    if let (Some(first_offset), Some(first_onset)) =
        (store.offsets.first(), store.onsets.first())
    {
        if first_offset < first_onset {
            store.onsets.insert(0, 0.0);
            let first_value = store.values[0].clone();
            store.values.insert(0, first_value);
        }
    }
    if let (Some(last_offset), Some(last_onset)) = (store.offsets.last(), store.onsets.last()) {
        if last_onset > last_offset {
            store.offsets.push(f64::INFINITY);
        }
    }
    store.offsets.resize(store.onsets.len(), f64::INFINITY);
}

fn note_store(notes: &[Note]) -> EpochStore {
    let onsets: Vec<f64> = notes.iter().map(|n| n.time).collect();
    let offsets = onsets
        .iter()
        .skip(1)
        .copied()
        .chain(std::iter::once(f64::INFINITY))
        .collect();
    EpochStore {
        info: synthesized_info(NOTE_STORE, event_type::STRON),
        buddy: String::new(),
        kind: EpochKind::Onset,
        onsets,
        offsets,
        values: notes.iter().map(|n| EpochValue::Text(n.text.clone())).collect(),
        notes: Vec::new(),
    }
}

pub(crate) fn finalize(
    pending: Vec<PendingEpoch>,
    meta: &Metadata,
    want_notes: bool,
    warnings: &mut Warnings,
) -> Vec<EpochStore> {
    let (onsets, offsets): (Vec<_>, Vec<_>) = pending
        .into_iter()
        .partition(|p| p.kind == EpochKind::Onset);
    let mut stores: Vec<EpochStore> = onsets.into_iter().map(onset_store).collect();

    for offset in offsets {
        let idx = match stores.iter().position(|s| s.info.name == offset.buddy) {
            Some(idx) => idx,
            None => {
                warnings.push(Warning::MissingBuddy {
                    store: offset.info.name.clone(),
                    buddy: offset.buddy.clone(),
                });
                stores.push(synthesized_onset(&offset.buddy));
                stores.len() - 1
            }
        };
        attach_offsets(&mut stores[idx], offset.times);
    }

    for idx in 0..stores.len() {
        let Some(primary) = meta
            .store_note(&stores[idx].info.name)
            .and_then(|note| note.primary_epoch())
        else {
            continue;
        };
        let Some(primary_offsets) = stores
            .iter()
            .find(|s| s.info.name == primary && s.info.name != stores[idx].info.name)
            .map(|s| s.offsets.clone())
        else {
            continue;
        };
        let store = &mut stores[idx];
        store.offsets = primary_offsets;
        store.offsets.resize(store.onsets.len(), f64::INFINITY);
    }

    let notes = &meta.experiment_notes.notes;
    if want_notes && !notes.is_empty() && !stores.iter().any(|s| s.info.name == NOTE_STORE) {
        stores.push(note_store(notes));
    }

    stores
}
