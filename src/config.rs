use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::format::Category;
use crate::time::TimeRange;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Could not read options file: {0}")]
    Read(std::io::Error),
    #[error("Options are not valid ron: {0}")]
    Parse(ron::error::SpannedError),
    #[error("Could not serialize options: {0}")]
    Serialize(ron::Error),
}

/// Upper bounds on how much is read from disk at once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// index records read per block
    pub index_block_records: usize,
    /// largest single read from the event file in bytes
    pub max_read_size: u64,
    /// initial number of snippet records per read
    pub snippet_batch: usize,
    /// maximum number of stream records per read
    pub stream_batch: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            index_block_records: 1_000_000,
            max_read_size: 10_000_000,
            snippet_batch: 2048,
            stream_batch: 8192,
        }
    }
}

/// Extensions and names of the files in a block directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileNames {
    pub index: String,
    pub events: String,
    pub channel_files: String,
    pub log_suffix: String,
    pub store_notes: String,
    pub tagged_notes: String,
    pub experiment_notes: String,
    pub sort_dir: String,
    pub sort_result: String,
}

impl Default for FileNames {
    fn default() -> Self {
        Self {
            index: "tsq".to_owned(),
            events: "tev".to_owned(),
            channel_files: "sev".to_owned(),
            log_suffix: "_log.txt".to_owned(),
            store_notes: "Tbk".to_owned(),
            tagged_notes: "tnt".to_owned(),
            experiment_notes: "Notes.txt".to_owned(),
            sort_dir: "sort".to_owned(),
            sort_result: "SortResult".to_owned(),
        }
    }
}

/// What to decode and how.
///
/// An empty `ranges` decodes the whole recording. A `None` filter selects
/// everything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    pub categories: Vec<Category>,
    pub stores: Option<Vec<String>>,
    pub channels: Option<Vec<u16>>,
    pub ranges: Vec<TimeRange>,
    /// only decode snippet timestamps, channels and sort codes
    pub nodata: bool,
    /// directory under `sort/` holding custom sort codes
    pub sort_name: Option<String>,
    /// snippet stores recorded in strobe mode that need reassembly
    pub combine: Vec<String>,
    /// epoch or scalar store to split into its 32 bits
    pub bitwise: Option<String>,
    /// sampling rate for per-channel files, overrides the header
    pub sev_fs: Option<f64>,
    pub limits: Limits,
    pub file_names: FileNames,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            categories: Category::ALL.to_vec(),
            stores: None,
            channels: None,
            ranges: Vec::new(),
            nodata: false,
            sort_name: None,
            combine: Vec::new(),
            bitwise: None,
            sev_fs: None,
            limits: Limits::default(),
            file_names: FileNames::default(),
        }
    }
}

impl Options {
    #[instrument]
    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path).map_err(Error::Read)?;
        Self::from_ron(&text)
    }

    pub fn from_ron(text: &str) -> Result<Self, Error> {
        ron::from_str(text).map_err(Error::Parse)
    }

    pub fn to_ron(&self) -> Result<String, Error> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(Error::Serialize)
    }

    #[must_use]
    pub fn categories(mut self, categories: impl IntoIterator<Item = Category>) -> Self {
        self.categories = categories.into_iter().collect();
        self
    }

    #[must_use]
    pub fn stores<S: Into<String>>(mut self, stores: impl IntoIterator<Item = S>) -> Self {
        self.stores = Some(stores.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn channels(mut self, channels: impl IntoIterator<Item = u16>) -> Self {
        self.channels = Some(channels.into_iter().collect());
        self
    }

    #[must_use]
    pub fn range(mut self, range: TimeRange) -> Self {
        self.ranges.push(range);
        self
    }

    /// Decode a single window from `t1` up to `t2`, a `t2` of zero or less
    /// means up to the end of the recording.
    #[must_use]
    pub fn window(mut self, t1: f64, t2: f64) -> Self {
        let stop = if t2 > 0.0 { t2 } else { f64::INFINITY };
        self.ranges = vec![TimeRange::new(t1, stop)];
        self
    }

    #[must_use]
    pub fn nodata(mut self, nodata: bool) -> Self {
        self.nodata = nodata;
        self
    }

    #[must_use]
    pub fn sort_name(mut self, name: impl Into<String>) -> Self {
        self.sort_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn combine(mut self, store: impl Into<String>) -> Self {
        self.combine.push(store.into());
        self
    }

    #[must_use]
    pub fn bitwise(mut self, store: impl Into<String>) -> Self {
        self.bitwise = Some(store.into());
        self
    }

    #[must_use]
    pub fn sev_fs(mut self, fs: f64) -> Self {
        self.sev_fs = Some(fs);
        self
    }

    #[must_use]
    pub fn limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    #[must_use]
    pub fn file_names(mut self, file_names: FileNames) -> Self {
        self.file_names = file_names;
        self
    }

    pub(crate) fn wants(&self, category: Category) -> bool {
        self.categories.contains(&category)
    }

    pub(crate) fn wants_store(&self, name: &str) -> bool {
        self.stores
            .as_ref()
            .map_or(true, |stores| stores.iter().any(|s| s == name))
    }

    pub(crate) fn wants_channel(&self, channel: u16) -> bool {
        self.channels
            .as_ref()
            .map_or(true, |channels| channels.contains(&channel))
    }

    /// Upper bound of the last range, infinite when decoding everything
    pub(crate) fn last_stop(&self) -> f64 {
        self.ranges
            .iter()
            .map(|r| r.stop)
            .reduce(f64::max)
            .unwrap_or(f64::INFINITY)
    }

    /// The ranges to decode, the whole recording if none were given
    pub(crate) fn effective_ranges(&self) -> Vec<TimeRange> {
        if self.ranges.is_empty() {
            vec![TimeRange::everything()]
        } else {
            self.ranges.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn partial_ron_uses_defaults() {
        let options = Options::from_ron(
            "(stores: Some([\"Wav1\"]), limits: (snippet_batch: 16), nodata: true)",
        )
        .unwrap();
        assert_eq!(options.stores, Some(vec!["Wav1".to_owned()]));
        assert!(options.nodata);
        assert_eq!(options.limits.snippet_batch, 16);
        assert_eq!(options.limits.stream_batch, 8192);
        assert_eq!(options.categories, Category::ALL.to_vec());
    }

    #[test]
    fn ron_round_trip() {
        let options = Options::default()
            .window(1.0, 3.0)
            .sort_name("TankSort2")
            .bitwise("PC0/");
        let text = options.to_ron().unwrap();
        assert_eq!(Options::from_ron(&text).unwrap(), options);
    }

    #[test]
    fn window_without_end() {
        let options = Options::default().window(2.5, 0.0);
        assert_eq!(options.ranges, vec![TimeRange::new(2.5, f64::INFINITY)]);
        assert_eq!(options.last_stop(), f64::INFINITY);
    }
}
