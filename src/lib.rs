//! Decoder for tank recordings: a directory per block holding an index
//! of timestamped events, a raw event file and optional per-channel
//! sample files.
//!
//! ```no_run
//! use tankdecode::{Options, TankReader};
//!
//! let options = Options::default().window(10.0, 20.0).stores(["Wav1", "Tick"]);
//! let decoded = TankReader::new(options).read_block("tank/Block-1")?;
//! for warning in &decoded.warnings {
//!     eprintln!("{warning}");
//! }
//! # Ok::<(), tankdecode::Error>(())
//! ```

pub mod config;
pub mod dataset;
pub mod error;
mod file;
pub mod format;
pub mod index;
mod materialize;
pub mod meta;
pub mod progress;
mod tank;
pub mod time;
pub mod transform;
pub mod warning;

pub use config::{FileNames, Limits, Options};
pub use dataset::{
    BitwiseSeries, BlockInfo, Dataset, Decoded, EpochSeries, Headers, Interval, ScalarSeries,
    SnippetSeries, StreamSegment, StreamSeries,
};
pub use error::Error;
pub use format::{Category, DataFormat, Samples};
pub use index::{
    EpochStore, EpochValue, ScalarStore, SnippetStore, Store, StoreInfo, StreamStore, TaggedNote,
};
pub use materialize::sev::{HeaderError as SevHeaderError, SevHeader};
pub use progress::{CancelToken, NoProgress, Progress, ProgressEvent};
pub use tank::{read_block, TankReader};
pub use time::{snap, to_sample, to_seconds, Rounding, TimeRange};
pub use warning::{Missing, Warning, Warnings};
