//! Store descriptor notes written next to the index (`*.Tbk`).
//!
//! The notes are a `[USERNOTEDELIMITER]` separated text blob, the store
//! notes live between the second and third delimiter. Each line looks like
//! `NAME=<field>;TYPE=<t>;VALUE=<value>;` and a line whose field is
//! `StoreName` starts the notes of a new store.

use std::collections::BTreeMap;

const DELIMITER: &str = "[USERNOTEDELIMITER]";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    #[error("Expected at least 3 note delimiters, found {0}")]
    MissingDelimiters(usize),
    #[error("Line {0} of the store notes has no fields")]
    NoFields(usize),
    #[error("Field on line {0} appears before any store name")]
    FieldWithoutStore(usize),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreNote {
    pub name: String,
    pub fields: BTreeMap<String, String>,
}

impl StoreNote {
    #[must_use]
    pub fn field(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// Stores with `Enabled` set to `2` were switched off during recording
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.field("Enabled") != Some("2")
    }

    /// Name of the primary store if this is a secondary epoch store.
    #[must_use]
    pub fn primary_epoch(&self) -> Option<&str> {
        let head_name = self.field("HeadName")?;
        if !head_name.contains('|') {
            return None;
        }
        let start = head_name
            .char_indices()
            .rev()
            .nth(3)
            .map_or(0, |(idx, _)| idx);
        Some(&head_name[start..])
    }

    #[must_use]
    pub fn sample_freq(&self) -> Option<f64> {
        self.field("SampleFreq")?.trim().parse().ok()
    }
}

pub(crate) fn parse(text: &str) -> Result<Vec<StoreNote>, Error> {
    let delimiters: Vec<_> = text.match_indices(DELIMITER).map(|(idx, _)| idx).collect();
    let [_, start, end, ..] = delimiters[..] else {
        return Err(Error::MissingDelimiters(delimiters.len()));
    };
    let section = &text[start + DELIMITER.len()..end];

    let mut notes = Vec::new();
    let mut current: Option<StoreNote> = None;
    // the final line is never complete
    let mut lines: Vec<_> = section.split('\n').collect();
    lines.pop();

    for (line_numb, line) in lines.into_iter().enumerate() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }

        let mut parts: Vec<_> = line.split(';').collect();
        parts.pop();
        let (Some(first), Some(last)) = (parts.first(), parts.last()) else {
            return Err(Error::NoFields(line_numb));
        };
        let field = first.rsplit('=').next().unwrap_or_default().to_owned();
        let value = last.rsplit('=').next().unwrap_or_default().to_owned();

        if field == "StoreName" {
            if let Some(done) = current.take() {
                notes.push(done);
            }
            current = Some(StoreNote {
                name: value.clone(),
                fields: BTreeMap::new(),
            });
        }

        current
            .as_mut()
            .ok_or(Error::FieldWithoutStore(line_numb))?
            .fields
            .insert(field, value);
    }

    notes.extend(current);
    Ok(notes)
}
