//! Writes synthetic blocks to disk for the integration tests.

use std::fs;
use std::path::{Path, PathBuf};

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use temp_dir::TempDir;

pub const RECORD_LEN: usize = 40;
pub const BLOCK_START: f64 = 1_600_000_000.0;

pub mod event_type {
    pub const STRON: u32 = 0x101;
    pub const STROFF: u32 = 0x102;
    pub const SCALAR: u32 = 0x201;
    pub const STREAM: u32 = 0x8101;
    pub const SNIP: u32 = 0x8201;
    pub const UNIQUE_CHANNEL_FILES: u32 = 0x10;
}

pub mod format {
    pub const FLOAT32: u32 = 0;
    pub const INT16: u32 = 2;
    pub const FLOAT64: u32 = 4;
}

pub fn name_code(name: &str) -> u32 {
    let mut bytes = [b' '; 4];
    for (slot, b) in bytes.iter_mut().zip(name.bytes()) {
        *slot = b;
    }
    u32::from_le_bytes(bytes)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Record {
    pub size: u32,
    pub event_type: u32,
    pub code: u32,
    pub channel_word: u32,
    pub timestamp: f64,
    pub payload: u64,
    pub format: u32,
    pub frequency_word: u32,
}

impl Record {
    pub fn to_bytes(&self) -> [u8; RECORD_LEN] {
        let mut bytes = [0u8; RECORD_LEN];
        bytes[0..4].copy_from_slice(&self.size.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.event_type.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.code.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.channel_word.to_le_bytes());
        bytes[16..24].copy_from_slice(&self.timestamp.to_le_bytes());
        bytes[24..32].copy_from_slice(&self.payload.to_le_bytes());
        bytes[32..36].copy_from_slice(&self.format.to_le_bytes());
        bytes[36..40].copy_from_slice(&self.frequency_word.to_le_bytes());
        bytes
    }
}

/// Reproducible noise for waveforms
pub fn waveform(seed: u64, len: usize) -> Vec<f32> {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    (0..len).map(|_| rng.random_range(-1.0..1.0)).collect()
}

pub fn f32_bytes(samples: &[f32]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

pub fn i16_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Builds a block directory `Tank/Block-1` inside a temporary directory.
/// Times passed to the builder are relative to the block start.
#[derive(Debug)]
pub struct TankBuilder {
    _dir: TempDir,
    block: PathBuf,
    records: Vec<Record>,
    events: Vec<u8>,
    stop_time: Option<f64>,
    trailing: Vec<u8>,
}

impl Default for TankBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TankBuilder {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let block = dir.path().join("Tank").join("Block-1");
        fs::create_dir_all(&block).unwrap();
        Self {
            _dir: dir,
            block,
            records: Vec::new(),
            events: Vec::new(),
            stop_time: Some(0.0),
            trailing: Vec::new(),
        }
    }

    pub fn block_dir(&self) -> &Path {
        &self.block
    }

    fn file(&self, extension: &str) -> PathBuf {
        self.block.join(format!("Tank_Block-1.{extension}"))
    }

    /// Position the next record gets, the start marker is position 0
    pub fn next_position(&self) -> u64 {
        self.records.len() as u64 + 1
    }

    pub fn record(&mut self, mut record: Record) -> &mut Self {
        if let Some(stop) = &mut self.stop_time {
            *stop = stop.max(record.timestamp);
        }
        record.timestamp += BLOCK_START;
        self.records.push(record);
        self
    }

    pub fn onset(&mut self, name: &str, time: f64, value: f64) -> &mut Self {
        self.record(Record {
            size: 10,
            event_type: event_type::STRON,
            code: name_code(name),
            timestamp: time,
            payload: value.to_bits(),
            format: format::FLOAT64,
            ..Record::default()
        })
    }

    pub fn offset(&mut self, name: &str, buddy: &str, time: f64) -> &mut Self {
        self.record(Record {
            size: 10,
            event_type: event_type::STROFF,
            code: name_code(name),
            channel_word: name_code(buddy),
            timestamp: time,
            format: format::FLOAT64,
            ..Record::default()
        })
    }

    /// Onset record whose value refers to a line of the tagged notes
    pub fn noted_onset(&mut self, name: &str, time: f64, note: u32) -> &mut Self {
        self.record(Record {
            size: 10,
            event_type: event_type::STRON,
            code: name_code(name),
            timestamp: time,
            format: format::FLOAT64,
            frequency_word: note,
            ..Record::default()
        })
    }

    pub fn scalar(&mut self, name: &str, channel: u16, time: f64, value: f64) -> &mut Self {
        self.record(Record {
            size: 10,
            event_type: event_type::SCALAR,
            code: name_code(name),
            channel_word: u32::from(channel),
            timestamp: time,
            payload: value.to_bits(),
            format: format::FLOAT64,
            ..Record::default()
        })
    }

    /// Appends `data` to the event file, returns its offset
    pub fn event_data(&mut self, data: &[u8]) -> u64 {
        let offset = self.events.len() as u64;
        self.events.extend_from_slice(data);
        offset
    }

    /// Snippet record pointing at `offset` in the event file
    #[allow(clippy::too_many_arguments)]
    pub fn snippet_at(
        &mut self,
        name: &str,
        channel: u16,
        sort_code: u16,
        time: f64,
        fs: f32,
        offset: u64,
        samples: usize,
    ) -> &mut Self {
        self.record(Record {
            size: 10 + samples as u32,
            event_type: event_type::SNIP,
            code: name_code(name),
            channel_word: u32::from(channel) | (u32::from(sort_code) << 16),
            timestamp: time,
            payload: offset,
            format: format::FLOAT32,
            frequency_word: fs.to_bits(),
        })
    }

    pub fn snippet(
        &mut self,
        name: &str,
        channel: u16,
        sort_code: u16,
        time: f64,
        fs: f32,
        samples: &[f32],
    ) -> &mut Self {
        let offset = self.event_data(&f32_bytes(samples));
        self.snippet_at(name, channel, sort_code, time, fs, offset, samples.len())
    }

    /// Stream record of int16 samples, stored in the event file
    pub fn stream(
        &mut self,
        name: &str,
        channel: u16,
        time: f64,
        fs: f32,
        samples: &[i16],
    ) -> &mut Self {
        let offset = self.event_data(&i16_bytes(samples));
        self.record(Record {
            size: 10 + (samples.len() * 2 / 4) as u32,
            event_type: event_type::STREAM,
            code: name_code(name),
            channel_word: u32::from(channel),
            timestamp: time,
            payload: offset,
            format: format::INT16,
            frequency_word: fs.to_bits(),
        })
    }

    /// Stream record of a store whose samples live in per-channel files
    pub fn channel_file_stream(
        &mut self,
        name: &str,
        channel: u16,
        time: f64,
        fs: f32,
    ) -> &mut Self {
        self.record(Record {
            size: 10,
            event_type: event_type::STREAM | event_type::UNIQUE_CHANNEL_FILES,
            code: name_code(name),
            channel_word: u32::from(channel),
            timestamp: time,
            format: format::INT16,
            frequency_word: fs.to_bits(),
            ..Record::default()
        })
    }

    /// Index ends without a stop marker
    pub fn without_stop(&mut self) -> &mut Self {
        self.stop_time = None;
        self
    }

    /// Garbage appended to the index after the last record
    pub fn trailing_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.trailing.extend_from_slice(bytes);
        self
    }

    /// Per-channel file with a version 3 header. `rate` and `decimate`
    /// set the sampling rate: `2^(rate - 12) * 25e6 / decimate`.
    #[allow(clippy::too_many_arguments)]
    pub fn channel_file(
        &self,
        store: &str,
        channel: u16,
        hour: u32,
        version: u8,
        rate: u16,
        decimate: u8,
        samples: &[i16],
    ) -> PathBuf {
        let hour = if hour > 0 {
            format!("-{hour}h")
        } else {
            String::new()
        };
        let path = self
            .block
            .join(format!("Tank_Block-1_{store}_Ch{channel}{hour}.sev"));

        let mut bytes = vec![0u8; 40];
        let data_len = (samples.len() * 2) as u64;
        bytes[0..8].copy_from_slice(&data_len.to_le_bytes());
        bytes[8..11].copy_from_slice(b"sev");
        bytes[11] = version;
        for (slot, b) in bytes[12..16].iter_mut().zip(store.bytes()) {
            *slot = b;
        }
        bytes[16..18].copy_from_slice(&channel.to_le_bytes());
        bytes[18..20].copy_from_slice(&1u16.to_le_bytes());
        bytes[20..22].copy_from_slice(&2u16.to_le_bytes());
        bytes[24] = format::INT16 as u8;
        bytes[25] = decimate;
        bytes[26..28].copy_from_slice(&rate.to_le_bytes());
        bytes.extend(i16_bytes(samples));
        fs::write(&path, bytes).unwrap();
        path
    }

    /// Recording log of a per-channel store
    pub fn log(&self, store: &str, hour: u32, start_sample: u64, gaps: &[(u64, u64)]) {
        let name = if hour > 0 {
            format!("{store}-{hour}h_log.txt")
        } else {
            format!("{store}_log.txt")
        };
        let mut text = format!("recording started at sample: {start_sample}\n");
        for (last, new) in gaps {
            text.push_str(&format!(
                "gap detected. last saved sample: {last}, new saved sample: {new}\n"
            ));
        }
        fs::write(self.block.join(name), text).unwrap();
    }

    /// Store notes, every store is a list of `(field, value)`
    pub fn store_notes(&self, stores: &[(&str, &[(&str, &str)])]) {
        const DELIMITER: &str = "[USERNOTEDELIMITER]";
        let mut text = format!("header{DELIMITER}block{DELIMITER}");
        for (store, fields) in stores {
            text.push_str(&format!("NAME=StoreName;TYPE=L;VALUE={store};\r\n"));
            for (field, value) in *fields {
                text.push_str(&format!("NAME={field};TYPE=L;VALUE={value};\r\n"));
            }
        }
        text.push_str(DELIMITER);
        fs::write(self.file("Tbk"), text).unwrap();
    }

    pub fn tagged_notes(&self, notes: &[&str]) {
        let mut text = "1\n".to_owned();
        for note in notes {
            text.push_str(note);
            text.push('\n');
        }
        fs::write(self.file("tnt"), text).unwrap();
    }

    pub fn experiment_notes(&self, text: &str) {
        fs::write(self.block.join("Notes.txt"), text).unwrap();
    }

    /// Custom sort codes, one per index position
    pub fn sort_result(&self, sort_name: &str, store: &str, sorted: &[u16], codes: &[u8]) {
        let dir = self.block.join("sort").join(sort_name);
        fs::create_dir_all(&dir).unwrap();
        let mut bytes = vec![0u8; 1024];
        for channel in sorted {
            bytes[usize::from(*channel)] = 1;
        }
        bytes.extend_from_slice(codes);
        fs::write(dir.join(format!("{store}.SortResult")), bytes).unwrap();
    }

    /// Writes the index and event file, returns the block directory
    pub fn write(&self) -> PathBuf {
        let mut index = Vec::with_capacity((self.records.len() + 3) * RECORD_LEN);
        // preamble
        index.extend_from_slice(&[0u8; RECORD_LEN]);
        index.extend_from_slice(
            &Record {
                size: 10,
                code: 1,
                timestamp: BLOCK_START,
                ..Record::default()
            }
            .to_bytes(),
        );
        for record in &self.records {
            index.extend_from_slice(&record.to_bytes());
        }
        if let Some(stop) = self.stop_time {
            index.extend_from_slice(
                &Record {
                    size: 10,
                    code: 2,
                    timestamp: BLOCK_START + stop + 1.0,
                    ..Record::default()
                }
                .to_bytes(),
            );
        }
        index.extend_from_slice(&self.trailing);

        fs::write(self.file("tsq"), index).unwrap();
        fs::write(self.file("tev"), &self.events).unwrap();
        self.block.clone()
    }
}
