use core::fmt;
use std::ops::Range;

use byteorder::{ByteOrder, LittleEndian};
use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};

pub(crate) mod event_type {
    pub(crate) const STRON: u32 = 0x0000_0101;
    pub(crate) const STROFF: u32 = 0x0000_0102;
    pub(crate) const SCALAR: u32 = 0x0000_0201;
    pub(crate) const STREAM: u32 = 0x0000_8101;
    pub(crate) const SNIP: u32 = 0x0000_8201;
    pub(crate) const MARK: u32 = 0x0000_8801;
    /// set for streams whose samples live in per-channel files
    pub(crate) const UNIQUE_CHANNEL_FILES: u32 = 0x0000_0010;
    pub(crate) const MASK: u32 = 0x0000_FF0F;
}

pub(crate) mod marker {
    pub(crate) const START_BLOCK: u32 = 0x0001;
    pub(crate) const STOP_BLOCK: u32 = 0x0002;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    Epoch,
    Snippet,
    Stream,
    Scalar,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Epoch,
        Category::Snippet,
        Category::Stream,
        Category::Scalar,
    ];

    pub(crate) fn from_event_type(event_type: u32) -> Option<Self> {
        use self::event_type as ty;
        match event_type {
            ty::STRON | ty::STROFF | ty::MARK => Some(Self::Epoch),
            ty::SNIP => Some(Self::Snippet),
            ty::SCALAR => Some(Self::Scalar),
            other if other & ty::MASK == ty::STREAM => Some(Self::Stream),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Epoch => "epoch",
            Category::Snippet => "snippet",
            Category::Stream => "stream",
            Category::Scalar => "scalar",
        };
        f.write_str(name)
    }
}

/// Whether an epoch event marks the start or the end of an interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EpochKind {
    Onset,
    Offset,
}

impl EpochKind {
    pub(crate) fn from_event_type(event_type: u32) -> Option<Self> {
        match event_type {
            event_type::STRON | event_type::MARK => Some(Self::Onset),
            event_type::STROFF => Some(Self::Offset),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataFormat {
    Float32,
    Int32,
    Int16,
    Int8,
    Float64,
    Int64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("data format code {0} is not one of the supported sample formats")]
pub struct UnsupportedFormat(pub u32);

impl DataFormat {
    pub fn from_code(code: u32) -> Result<Self, UnsupportedFormat> {
        Ok(match code {
            0 => Self::Float32,
            1 => Self::Int32,
            2 => Self::Int16,
            3 => Self::Int8,
            4 => Self::Float64,
            5 => Self::Int64,
            other => return Err(UnsupportedFormat(other)),
        })
    }

    #[must_use]
    pub fn code(self) -> u32 {
        match self {
            Self::Float32 => 0,
            Self::Int32 => 1,
            Self::Int16 => 2,
            Self::Int8 => 3,
            Self::Float64 => 4,
            Self::Int64 => 5,
        }
    }

    /// bytes per sample
    #[must_use]
    pub fn width(self) -> usize {
        match self {
            Self::Int8 => 1,
            Self::Int16 => 2,
            Self::Float32 | Self::Int32 => 4,
            Self::Float64 | Self::Int64 => 8,
        }
    }
}

/// Sample buffer keeping the on-disk sample type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Samples {
    Float32(Vec<f32>),
    Int32(Vec<i32>),
    Int16(Vec<i16>),
    Int8(Vec<i8>),
    Float64(Vec<f64>),
    Int64(Vec<i64>),
}

macro_rules! each_variant {
    ($samples:expr, $vec:ident => $body:expr) => {
        match $samples {
            Samples::Float32($vec) => $body,
            Samples::Int32($vec) => $body,
            Samples::Int16($vec) => $body,
            Samples::Int8($vec) => $body,
            Samples::Float64($vec) => $body,
            Samples::Int64($vec) => $body,
        }
    };
}

macro_rules! map_variant {
    ($samples:expr, $vec:ident => $body:expr) => {
        match $samples {
            Samples::Float32($vec) => Samples::Float32($body),
            Samples::Int32($vec) => Samples::Int32($body),
            Samples::Int16($vec) => Samples::Int16($body),
            Samples::Int8($vec) => Samples::Int8($body),
            Samples::Float64($vec) => Samples::Float64($body),
            Samples::Int64($vec) => Samples::Int64($body),
        }
    };
}

impl Samples {
    #[must_use]
    pub fn new(format: DataFormat) -> Self {
        Self::with_capacity(format, 0)
    }

    #[must_use]
    pub fn with_capacity(format: DataFormat, capacity: usize) -> Self {
        match format {
            DataFormat::Float32 => Self::Float32(Vec::with_capacity(capacity)),
            DataFormat::Int32 => Self::Int32(Vec::with_capacity(capacity)),
            DataFormat::Int16 => Self::Int16(Vec::with_capacity(capacity)),
            DataFormat::Int8 => Self::Int8(Vec::with_capacity(capacity)),
            DataFormat::Float64 => Self::Float64(Vec::with_capacity(capacity)),
            DataFormat::Int64 => Self::Int64(Vec::with_capacity(capacity)),
        }
    }

    /// Decodes little endian samples, a trailing partial sample is ignored.
    #[must_use]
    pub fn from_le_bytes(format: DataFormat, bytes: &[u8]) -> Self {
        let mut samples = Self::new(format);
        samples.extend_from_le_bytes(bytes);
        samples
    }

    #[must_use]
    pub fn format(&self) -> DataFormat {
        match self {
            Samples::Float32(_) => DataFormat::Float32,
            Samples::Int32(_) => DataFormat::Int32,
            Samples::Int16(_) => DataFormat::Int16,
            Samples::Int8(_) => DataFormat::Int8,
            Samples::Float64(_) => DataFormat::Float64,
            Samples::Int64(_) => DataFormat::Int64,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        each_variant!(self, v => v.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn extend_from_le_bytes(&mut self, bytes: &[u8]) {
        let n = bytes.len() / self.format().width();
        let bytes = &bytes[..n * self.format().width()];
        let start = self.len();
        match self {
            Samples::Float32(v) => {
                v.resize(start + n, 0.0);
                LittleEndian::read_f32_into(bytes, &mut v[start..]);
            }
            Samples::Int32(v) => {
                v.resize(start + n, 0);
                LittleEndian::read_i32_into(bytes, &mut v[start..]);
            }
            Samples::Int16(v) => {
                v.resize(start + n, 0);
                LittleEndian::read_i16_into(bytes, &mut v[start..]);
            }
            Samples::Int8(v) => v.extend(bytes.iter().map(|b| i8::from_le_bytes([*b]))),
            Samples::Float64(v) => {
                v.resize(start + n, 0.0);
                LittleEndian::read_f64_into(bytes, &mut v[start..]);
            }
            Samples::Int64(v) => {
                v.resize(start + n, 0);
                LittleEndian::read_i64_into(bytes, &mut v[start..]);
            }
        }
    }

    pub(crate) fn extend_zeros(&mut self, n: usize) {
        each_variant!(self, v => v.resize(v.len() + n, Default::default()));
    }

    /// Appends `other`, returns false (and leaves self as is)
    /// if the sample formats differ.
    pub(crate) fn append(&mut self, other: &Samples) -> bool {
        match (self, other) {
            (Samples::Float32(a), Samples::Float32(b)) => a.extend_from_slice(b),
            (Samples::Int32(a), Samples::Int32(b)) => a.extend_from_slice(b),
            (Samples::Int16(a), Samples::Int16(b)) => a.extend_from_slice(b),
            (Samples::Int8(a), Samples::Int8(b)) => a.extend_from_slice(b),
            (Samples::Float64(a), Samples::Float64(b)) => a.extend_from_slice(b),
            (Samples::Int64(a), Samples::Int64(b)) => a.extend_from_slice(b),
            _ => return false,
        }
        true
    }

    /// Copy of the samples in `range`, clamped to the buffer.
    #[must_use]
    pub fn slice(&self, range: Range<usize>) -> Samples {
        let end = range.end.min(self.len());
        let start = range.start.min(end);
        map_variant!(self, v => v[start..end].to_vec())
    }

    #[must_use]
    pub fn get(&self, idx: usize) -> Option<f64> {
        each_variant!(self, v => v.get(idx).and_then(ToPrimitive::to_f64))
    }

    #[must_use]
    pub fn to_f64(&self) -> Vec<f64> {
        each_variant!(self, v => v.iter().filter_map(ToPrimitive::to_f64).collect())
    }
}

/// Upper half of code page 437, the lower half is ASCII
const CP437_HIGH: &str = "ÇüéâäàåçêëèïîìÄÅÉæÆôöòûùÿÖÜ¢£¥₧ƒáíóúñÑªº¿⌐¬½¼¡«»\
    ░▒▓│┤╡╢╖╕╣║╗╝╜╛┐└┴┬├─┼╞╟╚╔╩╦╠═╬╧╨╤╥╙╘╒╓╫╪┘┌█▄▌▐▀\
    αßΓπΣσµτΦΘΩδ∞φε∩≡±≥≤⌠⌡÷≈°∙·√ⁿ²■\u{a0}";

/// Text written by the acquisition software is code page 437
pub(crate) fn cp437_char(byte: u8) -> char {
    if byte.is_ascii() {
        return char::from(byte);
    }
    CP437_HIGH
        .chars()
        .nth(usize::from(byte - 0x80))
        .unwrap_or(char::REPLACEMENT_CHARACTER)
}

pub(crate) fn decode_cp437(bytes: &[u8]) -> String {
    bytes.iter().copied().map(cp437_char).collect()
}
