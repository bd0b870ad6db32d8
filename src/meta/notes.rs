//! Free text experiment notes (`Notes.txt`).
//!
//! ```text
//! Experiment: fear conditioning
//! Subject: M12
//! User: lab
//! Start: 10:22:01am 03/15/2021
//! Stop: 11:02:44am 03/15/2021
//! Note-1 10:23:00am [freeze]
//! Note-2 10:25:10am [none] "Stimulus moved"
//! ```

use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;

static NOTE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(.*?)\s*\]").expect("regex is valid"));

const DATE_CHANGED: &str = "date changed to ";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    #[error("Notes contain notes but no recording start")]
    MissingStart,
    #[error("Could not parse recording start {text:?}: {source}")]
    Start {
        text: String,
        source: chrono::ParseError,
    },
    #[error("Could not parse the time of note {text:?}: {source}")]
    NoteTime {
        text: String,
        source: chrono::ParseError,
    },
    #[error("Note line {0:?} has no time")]
    NoteWithoutTime(String),
    #[error("Could not parse the new date in {text:?}: {source}")]
    DateChange {
        text: String,
        source: chrono::ParseError,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    /// seconds since the recording start
    pub time: f64,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExperimentNotes {
    pub experiment: Option<String>,
    pub subject: Option<String>,
    pub user: Option<String>,
    pub start: Option<String>,
    pub stop: Option<String>,
    pub notes: Vec<Note>,
}

#[derive(Debug, Clone, Copy)]
struct Formats {
    time: &'static str,
    date: &'static str,
}

impl Formats {
    fn for_start(start: &str) -> Self {
        Self {
            time: if start.to_lowercase().contains('m') {
                "%I:%M:%S%p"
            } else {
                "%H:%M:%S"
            },
            date: if start.contains('-') {
                "%Y-%m-%d"
            } else {
                "%m/%d/%Y"
            },
        }
    }
}

struct Clock {
    formats: Formats,
    start: NaiveDateTime,
    date: NaiveDate,
}

impl Clock {
    fn new(start: &str) -> Result<Self, Error> {
        let formats = Formats::for_start(start);
        let format = format!("{} {}", formats.time, formats.date);
        let start = NaiveDateTime::parse_from_str(&start.to_lowercase(), &format).map_err(
            |source| Error::Start {
                text: start.to_owned(),
                source,
            },
        )?;
        Ok(Self {
            formats,
            start,
            date: start.date(),
        })
    }

    fn relative(&self, time: &str) -> Result<f64, Error> {
        let time = NaiveTime::parse_from_str(&time.to_lowercase(), self.formats.time).map_err(
            |source| Error::NoteTime {
                text: time.to_owned(),
                source,
            },
        )?;
        let elapsed = self.date.and_time(time) - self.start;
        #[allow(clippy::cast_precision_loss)]
        let seconds = elapsed.num_milliseconds() as f64 / 1000.0;
        Ok(seconds)
    }

    fn change_date(&mut self, text: &str) -> Result<(), Error> {
        let new_date = text.get(DATE_CHANGED.len()..).unwrap_or_default().trim();
        self.date = NaiveDate::parse_from_str(new_date, self.formats.date).map_err(|source| {
            Error::DateChange {
                text: text.to_owned(),
                source,
            }
        })?;
        Ok(())
    }
}

/// A quoted note text that did not end on the line it started on.
struct OpenNote {
    time: f64,
    text: String,
}

impl From<OpenNote> for Note {
    fn from(OpenNote { time, text }: OpenNote) -> Self {
        Note { time, text }
    }
}

pub(crate) fn parse(text: &str) -> Result<ExperimentNotes, Error> {
    let mut parsed = ExperimentNotes::default();
    let mut clock: Option<Clock> = None;
    let mut open: Option<OpenNote> = None;

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if set_info_field(&mut parsed, line) {
            continue;
        }

        if clock.is_none() {
            let start = parsed.start.as_deref().ok_or(Error::MissingStart)?;
            clock = Some(Clock::new(start)?);
        }
        let Some(clock) = clock.as_mut() else {
            continue;
        };

        let is_note_start = line.starts_with("Note-") && line.len() >= "Note-".len() + 2;
        if !is_note_start {
            if let Some(mut note) = open.take() {
                note.text.push('\n');
                match line.split_once('"') {
                    Some((end, _)) => {
                        note.text.push_str(end);
                        parsed.notes.push(note.into());
                    }
                    None => {
                        note.text.push_str(line);
                        open = Some(note);
                    }
                }
            }
            continue;
        }

        // an unterminated note is closed by the next one
        if let Some(note) = open.take() {
            parsed.notes.push(note.into());
        }

        let time = line
            .split(' ')
            .nth(1)
            .ok_or_else(|| Error::NoteWithoutTime(line.to_owned()))?;
        let time = clock.relative(time)?;

        let note_id = NOTE_ID
            .captures(line)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str());
        match note_id {
            Some(id) if id != "none" => parsed.notes.push(Note {
                time,
                text: id.to_owned(),
            }),
            _ => {
                let mut quotes = line.split('"');
                let text = quotes.nth(1).unwrap_or_default().to_owned();
                let closed = quotes.next().is_some();
                if text.starts_with(DATE_CHANGED) {
                    clock.change_date(&text)?;
                } else if closed {
                    parsed.notes.push(Note { time, text });
                } else {
                    open = Some(OpenNote { time, text });
                }
            }
        }
    }

    parsed.notes.extend(open.map(Note::from));
    Ok(parsed)
}

fn set_info_field(notes: &mut ExperimentNotes, line: &str) -> bool {
    let fields = [
        ("Experiment:", &mut notes.experiment),
        ("Subject:", &mut notes.subject),
        ("User:", &mut notes.user),
        ("Start:", &mut notes.start),
        ("Stop:", &mut notes.stop),
    ];
    for (prefix, field) in fields {
        if line.len() >= prefix.len() + 2 {
            if let Some(value) = line.strip_prefix(prefix) {
                *field = Some(value.trim().to_owned());
                return true;
            }
        }
    }
    false
}
