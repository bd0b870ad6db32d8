/// Text of the tagged notes (`*.tnt`). Records in the index refer to a
/// note by its one based position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaggedNotes {
    pub version: String,
    pub notes: Vec<String>,
}

impl TaggedNotes {
    #[must_use]
    pub fn get(&self, index: u32) -> Option<&str> {
        let index = usize::try_from(index).ok()?.checked_sub(1)?;
        self.notes.get(index).map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}

pub(crate) fn parse(text: &str) -> TaggedNotes {
    let mut lines = text.lines();
    let version = lines.next().unwrap_or_default().to_owned();
    TaggedNotes {
        version,
        notes: lines.map(str::to_owned).collect(),
    }
}
