//! Recording logs written next to per-channel files (`*_log.txt`).

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

static START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"recording started at sample: (\d*)").expect("regex is valid")
});
static GAP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"gap detected\. last saved sample: (\d*), new saved sample: (\d*)")
        .expect("regex is valid")
});
static HOUR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-(\d+)h").expect("regex is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gap {
    pub last_saved: u64,
    pub new_saved: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingLog {
    /// first four characters of the file name
    pub store: String,
    pub hour: u32,
    pub start_sample: Option<u64>,
    pub gaps: Vec<Gap>,
}

impl RecordingLog {
    /// Samples that should have been recorded but are missing
    #[must_use]
    pub fn missing_samples(&self) -> u64 {
        self.gaps
            .iter()
            .map(|gap| gap.new_saved.saturating_sub(gap.last_saved))
            .sum()
    }
}

pub(crate) fn parse(path: &Path, text: &str) -> RecordingLog {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let store = file_name.chars().take(4).collect();
    let hour = HOUR
        .captures_iter(&file_name)
        .last()
        .and_then(|c| c[1].parse().ok())
        .unwrap_or(0);

    let start_sample = START.captures(text).and_then(|c| c[1].parse().ok());
    let gaps = GAP
        .captures_iter(text)
        .filter_map(|c| {
            Some(Gap {
                last_saved: c[1].parse().ok()?,
                new_saved: c[2].parse().ok()?,
            })
        })
        .collect();

    RecordingLog {
        store,
        hour,
        start_sample,
        gaps,
    }
}
