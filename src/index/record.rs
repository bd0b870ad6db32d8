use byteorder::{ByteOrder, LittleEndian};

use crate::format;

pub(crate) const RECORD_LEN: usize = 40;
/// words of a record that hold the header, the rest is sample data
pub(crate) const HEADER_WORDS: u32 = 10;

/// One 40 byte event record from the index file
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Record {
    /// in 4 byte words including the header
    pub(crate) size: u32,
    pub(crate) event_type: u32,
    pub(crate) code: u32,
    /// channel and sort code, for epochs the buddy code
    pub(crate) channel_word: u32,
    pub(crate) timestamp: f64,
    /// file offset into the event file, for epochs and scalars the value
    pub(crate) payload: u64,
    pub(crate) format: u32,
    /// sampling frequency, for epochs and scalars the tagged note index
    pub(crate) frequency_word: u32,
}

impl Record {
    pub(crate) fn parse(bytes: &[u8]) -> Self {
        debug_assert_eq!(bytes.len(), RECORD_LEN);
        Self {
            size: LittleEndian::read_u32(&bytes[0..4]),
            event_type: LittleEndian::read_u32(&bytes[4..8]),
            code: LittleEndian::read_u32(&bytes[8..12]),
            channel_word: LittleEndian::read_u32(&bytes[12..16]),
            timestamp: LittleEndian::read_f64(&bytes[16..24]),
            payload: LittleEndian::read_u64(&bytes[24..32]),
            format: LittleEndian::read_u32(&bytes[32..36]),
            frequency_word: LittleEndian::read_u32(&bytes[36..40]),
        }
    }

    pub(crate) fn channel(&self) -> u16 {
        (self.channel_word & 0xFFFF) as u16
    }

    pub(crate) fn sort_code(&self) -> u16 {
        (self.channel_word >> 16) as u16
    }

    pub(crate) fn offset(&self) -> u64 {
        self.payload
    }

    pub(crate) fn value(&self) -> f64 {
        f64::from_bits(self.payload)
    }

    pub(crate) fn frequency(&self) -> f64 {
        f64::from(f32::from_bits(self.frequency_word))
    }

    pub(crate) fn note_index(&self) -> u32 {
        self.frequency_word
    }
}

/// Four character store names are packed little endian into a `u32`
pub(crate) fn code_to_name(code: u32) -> String {
    code.to_le_bytes()
        .iter()
        .map(|b| if *b == 0 { ' ' } else { format::cp437_char(*b) })
        .collect()
}

pub(crate) fn name_to_code(name: &str) -> u32 {
    let mut bytes = [b' '; 4];
    for (slot, b) in bytes.iter_mut().zip(name.bytes()) {
        *slot = b;
    }
    u32::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_at_their_offsets() {
        let mut bytes = [0u8; RECORD_LEN];
        bytes[0..4].copy_from_slice(&42u32.to_le_bytes());
        bytes[4..8].copy_from_slice(&0x8201u32.to_le_bytes());
        bytes[8..12].copy_from_slice(&name_to_code("eNe1").to_le_bytes());
        bytes[12..14].copy_from_slice(&3u16.to_le_bytes());
        bytes[14..16].copy_from_slice(&7u16.to_le_bytes());
        bytes[16..24].copy_from_slice(&12.5f64.to_le_bytes());
        bytes[24..32].copy_from_slice(&4096u64.to_le_bytes());
        bytes[32..36].copy_from_slice(&2u32.to_le_bytes());
        bytes[36..40].copy_from_slice(&24414.0625f32.to_le_bytes());

        let record = Record::parse(&bytes);
        assert_eq!(record.size, 42);
        assert_eq!(code_to_name(record.code), "eNe1");
        assert_eq!(record.channel(), 3);
        assert_eq!(record.sort_code(), 7);
        assert_eq!(record.timestamp, 12.5);
        assert_eq!(record.offset(), 4096);
        assert_eq!(record.format, 2);
        assert_eq!(record.frequency(), 24414.0625);
    }

    #[test]
    fn short_names_are_space_padded() {
        assert_eq!(code_to_name(name_to_code("Tk")), "Tk  ");
    }
}
