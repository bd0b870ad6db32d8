//! Streams stored as one file per channel and hour (`*.sev`).
//!
//! Every file starts with a 40 byte header followed by the raw samples of a
//! single channel. Recordings longer than an hour are split over files
//! named `..-<hour>h..`, these are concatenated.

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use byteorder::{ByteOrder, LittleEndian};
use regex::Regex;
use tracing::instrument;

use crate::config::Options;
use crate::dataset::{StreamSegment, StreamSeries};
use crate::file::ByteReader;
use crate::format::{Category, DataFormat, Samples, UnsupportedFormat};
use crate::meta::Metadata;
use crate::time::{self, Rounding, TimeRange};
use crate::warning::{Missing, Warning, Warnings};

use super::select_channels;

pub(crate) const HEADER_LEN: u64 = 40;
/// Rate assumed for files written before the header was filled in
pub const ASSUMED_FS: f64 = 24_414.062_5;
const MAX_RATE_DIFFERENCE: f64 = 1.0;

static CHANNEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_[Cc]h(\d*)").expect("regex is valid"));
static HOUR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-(\d*)h").expect("regex is valid"));

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HeaderError {
    #[error("File is {0} bytes, shorter than the header")]
    TooShort(u64),
    #[error("Unknown header version {0}")]
    UnknownVersion(u8),
    #[error("{0}")]
    Format(UnsupportedFormat),
    #[error("Decimation factor is zero, can not compute the sampling rate")]
    ZeroDecimate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SevHeader {
    pub size: u64,
    pub version: u8,
    /// store name from the header, only set from version 3 on
    pub store: Option<String>,
    pub channel: u16,
    pub total_channels: u16,
    pub sample_width: u16,
    pub data_format: DataFormat,
    pub sampling_frequency: f64,
}

impl SevHeader {
    pub fn parse(bytes: &[u8]) -> Result<Self, HeaderError> {
        if bytes.len() < HEADER_LEN as usize {
            return Err(HeaderError::TooShort(bytes.len() as u64));
        }

        let version = bytes[11];
        if version >= 4 {
            return Err(HeaderError::UnknownVersion(version));
        }
        let size = LittleEndian::read_u64(&bytes[0..8]);
        if version == 0 {
            return Ok(Self {
                size,
                version,
                store: None,
                channel: 0,
                total_channels: 0,
                sample_width: 4,
                data_format: DataFormat::Float32,
                sampling_frequency: ASSUMED_FS,
            });
        }

        // older writers did not fill in the name consistently
        let store = (version >= 3).then(|| String::from_utf8_lossy(&bytes[12..16]).into_owned());
        let data_format =
            DataFormat::from_code(u32::from(bytes[24] & 0b111)).map_err(HeaderError::Format)?;
        let decimate = bytes[25];
        if decimate == 0 {
            return Err(HeaderError::ZeroDecimate);
        }
        let rate = LittleEndian::read_u16(&bytes[26..28]);

        Ok(Self {
            size,
            version,
            store,
            channel: LittleEndian::read_u16(&bytes[16..18]),
            total_channels: LittleEndian::read_u16(&bytes[18..20]),
            sample_width: LittleEndian::read_u16(&bytes[20..22]),
            data_format,
            sampling_frequency: 2f64.powi(i32::from(rate) - 12) * 25e6 / f64::from(decimate),
        })
    }
}

/// One per-channel file and what its name and header say about it
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ChannelFile {
    pub(crate) path: PathBuf,
    pub(crate) channel: u16,
    pub(crate) hour: u32,
    pub(crate) data_format: DataFormat,
    pub(crate) sampling_frequency: f64,
    /// number of samples in the file
    pub(crate) samples: u64,
}

/// Per-channel files grouped by store
#[derive(Debug, Default)]
pub(crate) struct Scan {
    pub(crate) stores: BTreeMap<String, Vec<ChannelFile>>,
    /// stores with at least one unreadable header
    pub(crate) broken: BTreeSet<String>,
}

impl Scan {
    pub(crate) fn store_names(&self) -> impl Iterator<Item = &str> {
        self.stores
            .keys()
            .chain(self.broken.iter())
            .map(String::as_str)
    }
}

/// Name, channel and hour encoded in a file name such as
/// `Tank_Block-1_Wav1_Ch3-2h.sev`.
fn parse_name(stem: &str) -> (String, Option<u16>, u32) {
    let channel = CHANNEL
        .captures_iter(stem)
        .last()
        .and_then(|c| c[1].parse().ok());
    let hour = HOUR
        .captures_iter(stem)
        .last()
        .and_then(|c| c[1].parse().ok())
        .unwrap_or(0);

    // last four characters enclosed by underscores, matches may overlap
    let chars: Vec<char> = stem.chars().collect();
    let store = (0..chars.len().saturating_sub(5))
        .rev()
        .find(|i| chars[*i] == '_' && chars[i + 5] == '_')
        .map_or_else(
            || stem.to_owned(),
            |i| chars[i + 1..i + 5].iter().collect(),
        );
    (store, channel, hour)
}

fn read_header(path: &Path) -> io::Result<(Result<SevHeader, HeaderError>, u64)> {
    let mut reader = ByteReader::open(path)?;
    let len = reader.data_len();
    let bytes = reader.read_at(0, HEADER_LEN as usize)?;
    Ok((SevHeader::parse(&bytes), len))
}

#[instrument(level = "debug", skip_all, fields(files = paths.len()))]
pub(crate) fn scan(paths: &[PathBuf], warnings: &mut Warnings) -> Scan {
    let mut scan = Scan::default();
    for path in paths {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let (name, name_channel, hour) = parse_name(&stem);

        let (header, len) = match read_header(path) {
            Ok(read) => read,
            Err(e) => {
                warnings.push(Warning::StoreSkipped {
                    store: name.clone(),
                    category: Category::Stream,
                    reason: format!("could not read {}: {e}", path.display()),
                });
                scan.broken.insert(name);
                continue;
            }
        };
        let header = match header {
            Ok(header) => header,
            Err(source) => {
                warnings.push(Warning::MalformedHeader {
                    path: path.clone(),
                    source,
                });
                scan.broken.insert(name);
                continue;
            }
        };

        let channel = if header.version == 0 {
            warnings.push(Warning::AssumedHeader {
                path: path.clone(),
                fs: header.sampling_frequency,
            });
            name_channel.unwrap_or(0)
        } else {
            header.channel
        };
        let store = header.store.clone().unwrap_or(name);
        let width = header.data_format.width() as u64;
        tracing::trace!(%store, channel, hour, "found channel file");
        scan.stores.entry(store).or_default().push(ChannelFile {
            path: path.clone(),
            channel,
            hour,
            data_format: header.data_format,
            sampling_frequency: header.sampling_frequency,
            samples: len.saturating_sub(HEADER_LEN) / width,
        });
    }

    for files in scan.stores.values_mut() {
        files.sort_by_key(|f| (f.channel, f.hour));
    }
    for broken in &scan.broken {
        scan.stores.remove(broken);
    }
    scan
}

/// Picks the sampling rate to use. The configured rate goes before the
/// expected one. Either replaces the rate in the header if they differ by
/// more than a hertz, a configured rate is used even when they do not.
fn sampling_frequency(
    store: &str,
    detected: f64,
    expected: Option<f64>,
    options: &Options,
    warnings: &mut Warnings,
) -> f64 {
    let Some(expected) = options.sev_fs.or(expected) else {
        return detected;
    };
    if (expected - detected).abs() > MAX_RATE_DIFFERENCE {
        warnings.push(Warning::SamplingRateMismatch {
            store: store.to_owned(),
            detected,
            expected,
        });
        return expected;
    }
    if options.sev_fs.is_some() {
        expected
    } else {
        detected
    }
}

/// Reads the samples `range` of one channel, the channel is the
/// concatenation of its hour files. `hours` holds the start sample and
/// length of every hour.
fn read_channel(
    files: &[&ChannelFile],
    hours: &[(u32, u64, u64)],
    range: std::ops::Range<u64>,
    format: DataFormat,
    missing_hours: &mut Vec<u32>,
) -> io::Result<Samples> {
    let width = format.width() as u64;
    let mut samples = Samples::with_capacity(format, (range.end - range.start) as usize);
    for (hour, first, len) in hours {
        let start = range.start.max(*first);
        let end = range.end.min(first + len);
        if start >= end {
            continue;
        }
        let wanted = (end - start) as usize;

        let Some(file) = files.iter().find(|f| f.hour == *hour) else {
            missing_hours.push(*hour);
            samples.extend_zeros(wanted);
            continue;
        };
        let mut reader = ByteReader::open_with_offset(&file.path, HEADER_LEN)?;
        let bytes = reader.read_at((start - first) * width, wanted * width as usize)?;
        let before = samples.len();
        samples.extend_from_le_bytes(&bytes);
        samples.extend_zeros(wanted - (samples.len() - before));
    }
    Ok(samples)
}

/// Decodes the per-channel files of one store. `expected_fs` is the rate
/// the store should have according to the store notes or the index.
#[instrument(level = "debug", skip(files, meta, ranges, options, warnings))]
pub(crate) fn materialize(
    store: &str,
    files: &[ChannelFile],
    expected_fs: Option<f64>,
    meta: &Metadata,
    ranges: &[TimeRange],
    options: &Options,
    warnings: &mut Warnings,
) -> io::Result<Option<StreamSeries>> {
    let Some(first) = files.first() else {
        return Ok(None);
    };
    let Some(channels) = select_channels(store, files.iter().map(|f| f.channel), options, warnings)
    else {
        return Ok(None);
    };
    let format = first.data_format;
    let fs = sampling_frequency(store, first.sampling_frequency, expected_fs, options, warnings);

    let hour_numbers: BTreeSet<u32> = files.iter().map(|f| f.hour).collect();
    let mut hours = Vec::with_capacity(hour_numbers.len());
    let mut total = 0;
    for hour in hour_numbers {
        let len = files
            .iter()
            .filter(|f| f.hour == hour)
            .map(|f| f.samples)
            .max()
            .unwrap_or(0);
        hours.push((hour, total, len));
        total += len;

        let Some(log) = meta.log(store, hour) else {
            continue;
        };
        for gap in &log.gaps {
            warnings.push(Warning::PartialData {
                store: store.to_owned(),
                missing: Missing::RecordingGap {
                    last_saved: gap.last_saved,
                    new_saved: gap.new_saved,
                },
            });
        }
    }

    let mut missing_hours = BTreeSet::new();
    let mut segments = Vec::with_capacity(ranges.len());
    for range in ranges {
        let start = time::to_sample(range.start, fs, Rounding::Ceil).min(total);
        let end = if range.stop.is_infinite() {
            total
        } else {
            (time::to_sample(range.stop, fs, Rounding::LastBefore) + 1).min(total)
        };
        let end = end.max(start);

        let mut data = Vec::with_capacity(channels.len());
        for channel in &channels {
            let channel_files: Vec<&ChannelFile> =
                files.iter().filter(|f| f.channel == *channel).collect();
            let mut missing = Vec::new();
            data.push(read_channel(
                &channel_files,
                &hours,
                start..end,
                format,
                &mut missing,
            )?);
            missing_hours.extend(missing.into_iter().map(|hour| (*channel, hour)));
        }
        segments.push(StreamSegment {
            start_time: time::to_seconds(start, fs),
            data,
        });
    }

    for (channel, hour) in missing_hours {
        warnings.push(Warning::PartialData {
            store: store.to_owned(),
            missing: Missing::ChannelFile { channel, hour },
        });
    }
    tracing::debug!(fs, channels = channels.len(), samples = total, "read channel files");
    Ok(Some(StreamSeries {
        sampling_frequency: fs,
        data_format: format,
        channels,
        segments,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::log::{Gap, RecordingLog};
    use pretty_assertions::assert_eq;
    use temp_dir::TempDir;

    fn header(
        version: u8,
        name: &str,
        channel: u16,
        format: u8,
        decimate: u8,
        rate: u16,
    ) -> Vec<u8> {
        let mut bytes = vec![0u8; HEADER_LEN as usize];
        bytes[8..11].copy_from_slice(b"sev");
        bytes[11] = version;
        bytes[12..16].copy_from_slice(name.as_bytes());
        bytes[16..18].copy_from_slice(&channel.to_le_bytes());
        bytes[18..20].copy_from_slice(&2u16.to_le_bytes());
        bytes[20..22].copy_from_slice(&2u16.to_le_bytes());
        bytes[24] = format;
        bytes[25] = decimate;
        bytes[26..28].copy_from_slice(&rate.to_le_bytes());
        bytes
    }

    fn write(
        dir: &TempDir,
        name: &str,
        channel: u16,
        samples: impl Iterator<Item = i16>,
    ) -> PathBuf {
        let path = dir.child(name);
        let mut bytes = header(3, "Wav1", channel, 2, 1, 12);
        bytes.extend(samples.flat_map(i16::to_le_bytes));
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn rate_from_header() {
        let parsed = SevHeader::parse(&header(2, "Wav1", 3, 0, 1, 12)).unwrap();
        assert_eq!(parsed.sampling_frequency, 25e6);
        assert_eq!(parsed.store, None);
        assert_eq!(parsed.channel, 3);

        let parsed = SevHeader::parse(&header(3, "Wav1", 3, 2, 4, 14)).unwrap();
        assert_eq!(parsed.sampling_frequency, 25e6);
        assert_eq!(parsed.store.as_deref(), Some("Wav1"));
        assert_eq!(parsed.data_format, DataFormat::Int16);
    }

    #[test]
    fn unsupported_headers() {
        assert_eq!(
            SevHeader::parse(&header(4, "Wav1", 1, 0, 1, 12)),
            Err(HeaderError::UnknownVersion(4))
        );
        assert_eq!(
            SevHeader::parse(&header(3, "Wav1", 1, 0, 0, 12)),
            Err(HeaderError::ZeroDecimate)
        );
        assert_eq!(
            SevHeader::parse(&header(3, "Wav1", 1, 7, 1, 12)),
            Err(HeaderError::Format(UnsupportedFormat(7)))
        );
        assert_eq!(SevHeader::parse(&[0; 12]), Err(HeaderError::TooShort(12)));

        let empty = SevHeader::parse(&[0; 40]).unwrap();
        assert_eq!(empty.data_format, DataFormat::Float32);
        assert_eq!(empty.sampling_frequency, ASSUMED_FS);
    }

    #[test]
    fn names() {
        assert_eq!(
            parse_name("Tank_Block-1_Wav1_Ch3-2h"),
            ("Wav1".to_owned(), Some(3), 2)
        );
        assert_eq!(parse_name("Tank_RSn1_ch12"), ("RSn1".to_owned(), Some(12), 0));
        assert_eq!(parse_name("data"), ("data".to_owned(), None, 0));
    }

    #[test]
    fn hours_are_concatenated() {
        let dir = TempDir::new().unwrap();
        let paths = vec![
            write(&dir, "T_B_Wav1_Ch1.sev", 1, 0..100),
            write(&dir, "T_B_Wav1_Ch1-1h.sev", 1, 100..200),
            write(&dir, "T_B_Wav1_Ch2.sev", 2, 1000..1100),
        ];
        let mut warnings = Warnings::default();
        let scan = scan(&paths, &mut warnings);
        assert!(warnings.is_empty());
        let files = &scan.stores["Wav1"];
        assert_eq!(files.len(), 3);

        let mut meta = Metadata::default();
        meta.logs.push(RecordingLog {
            store: "Wav1".to_owned(),
            hour: 1,
            start_sample: Some(1),
            gaps: vec![Gap {
                last_saved: 130,
                new_saved: 140,
            }],
        });

        let options = Options::default().sev_fs(100.0);
        let series = materialize(
            "Wav1",
            files,
            None,
            &meta,
            &[TimeRange::new(0.95, 1.1)],
            &options,
            &mut warnings,
        )
        .unwrap()
        .unwrap();

        let segment = &series.segments[0];
        assert_eq!(segment.start_time, 0.95);
        assert_eq!(segment.data[0], Samples::Int16((95..110).collect()));
        // channel 2 has no second hour
        assert_eq!(
            segment.data[1].to_f64(),
            (1095..1100)
                .map(f64::from)
                .chain(std::iter::repeat(0.0).take(10))
                .collect::<Vec<_>>()
        );

        // the header says 25 MHz
        let warnings = warnings.into_vec();
        assert_eq!(warnings.len(), 3, "{warnings:?}");
        assert!(matches!(&warnings[0], Warning::SamplingRateMismatch { .. }));
        assert!(matches!(
            &warnings[1],
            Warning::PartialData {
                missing: Missing::RecordingGap {
                    last_saved: 130,
                    ..
                },
                ..
            }
        ));
        assert!(matches!(
            &warnings[2],
            Warning::PartialData {
                missing: Missing::ChannelFile {
                    channel: 2,
                    hour: 1
                },
                ..
            }
        ));
    }

    #[test]
    fn expected_rate_wins_on_mismatch() {
        let mut warnings = Warnings::default();
        let options = Options::default();
        assert_eq!(
            sampling_frequency("Wav1", 1017.25, Some(1000.0), &options, &mut warnings),
            1000.0
        );
        assert_eq!(
            sampling_frequency("Wav1", 1000.5, Some(1000.0), &options, &mut warnings),
            1000.5
        );
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn configured_rate_is_checked_against_header() {
        let mut warnings = Warnings::default();
        let options = Options::default().sev_fs(1000.0);
        assert_eq!(
            sampling_frequency("Wav1", 24414.0625, Some(24414.0625), &options, &mut warnings),
            1000.0
        );
        assert!(matches!(
            warnings.iter().next(),
            Some(Warning::SamplingRateMismatch { detected, expected, .. })
                if *detected == 24414.0625 && *expected == 1000.0
        ));

        let mut warnings = Warnings::default();
        assert_eq!(
            sampling_frequency("Wav1", 1000.5, None, &options, &mut warnings),
            1000.0
        );
        assert!(warnings.is_empty());
    }
}
