//! Custom sort results (`sort/<sort name>/<STORE>.SortResult`).
//!
//! A 1024 byte channel map followed by one sort code per index record.

const CHANNEL_MAP_LEN: usize = 1024;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    #[error("File is {0} bytes, too short to hold the {CHANNEL_MAP_LEN} byte channel map")]
    Truncated(usize),
    #[error("Channel map marks no channel as sorted")]
    EmptyChannelMap,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortResult {
    pub store: String,
    channel_map: Vec<u8>,
    /// indexed by record position in the index file
    codes: Vec<u8>,
}

impl SortResult {
    pub(crate) fn parse(store: String, mut bytes: Vec<u8>) -> Result<Self, Error> {
        if bytes.len() < CHANNEL_MAP_LEN {
            return Err(Error::Truncated(bytes.len()));
        }
        let codes = bytes.split_off(CHANNEL_MAP_LEN);
        if bytes.iter().all(|c| *c == 0) {
            return Err(Error::EmptyChannelMap);
        }
        Ok(Self {
            store,
            channel_map: bytes,
            codes,
        })
    }

    /// Positions of the non zero entries in the channel map
    #[must_use]
    pub fn sorted_channels(&self) -> Vec<u16> {
        self.channel_map
            .iter()
            .enumerate()
            .filter(|(_, sorted)| **sorted != 0)
            .filter_map(|(idx, _)| u16::try_from(idx).ok())
            .collect()
    }

    #[must_use]
    pub fn code(&self, record: u64) -> Option<u8> {
        let record = usize::try_from(record).ok()?;
        self.codes.get(record).copied()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SortOverlay {
    pub name: String,
    pub results: Vec<SortResult>,
}

impl SortOverlay {
    #[must_use]
    pub fn for_store(&self, store: &str) -> Option<&SortResult> {
        self.results.iter().find(|r| r.store == store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_map_and_codes() {
        let mut bytes = vec![0u8; CHANNEL_MAP_LEN];
        bytes[1] = 1;
        bytes[3] = 1;
        bytes.extend_from_slice(&[7, 8, 9]);
        let sort = SortResult::parse("eNe1".to_owned(), bytes).unwrap();
        assert_eq!(sort.sorted_channels(), vec![1, 3]);
        assert_eq!(sort.code(2), Some(9));
        assert_eq!(sort.code(3), None);
    }

    #[test]
    fn malformed() {
        assert_eq!(
            SortResult::parse("eNe1".to_owned(), vec![1; 10]),
            Err(Error::Truncated(10))
        );
        assert_eq!(
            SortResult::parse("eNe1".to_owned(), vec![0; 2000]),
            Err(Error::EmptyChannelMap)
        );
    }
}
