use std::{
    fmt::{self, Write as _},
    time::{Duration, Instant},
};

use serde::{Deserialize, Serialize};

use crate::{LooperError, Result};

/// Snaps `seconds` to the nearest beat boundary for the given tempo.
///
/// `bpm` is assumed to be positive; [`crate::Recorder::new`] validates it.
pub fn quantise(seconds: f64, bpm: f64) -> f64 {
    let beat_len = 60.0 / bpm;
    (seconds / beat_len).round() * beat_len
}

/// Free-running wall clock used by the recorder and the loop player.
#[derive(Debug, Clone, Copy)]
pub struct PlaybackClock {
    started_at: Instant,
}

impl PlaybackClock {
    /// Starts a clock at the current instant.
    pub fn start() -> Self {
        Self::starting_at(Instant::now())
    }

    /// Starts a clock at `started_at`.
    pub fn starting_at(started_at: Instant) -> Self {
        Self { started_at }
    }

    /// Returns the instant the clock reads zero.
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Rewinds the clock to zero at the current instant.
    pub fn restart(&mut self) {
        self.started_at = Instant::now();
    }

    /// Returns the time since the clock started.
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Returns the time since the clock started, in seconds.
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed().as_secs_f64()
    }

    /// Seconds between the clock start and `at`, saturating at zero.
    pub fn secs_at(&self, at: Instant) -> f64 {
        at.saturating_duration_since(self.started_at).as_secs_f64()
    }
}

/// A single quantised trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub time: f64,
    pub label: String,
}

impl Event {
    /// Creates an event at `time` seconds.
    pub fn new(time: f64, label: impl Into<String>) -> Self {
        Self {
            time,
            label: label.into(),
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3},{}", self.time, self.label)
    }
}

/// Insertion-ordered sequence of events captured during one take.
///
/// Quantisation can place a later insertion on an earlier grid slot, so the
/// log is not necessarily sorted by time. Use [`EventLog::sorted`] before
/// replaying.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event at the end of the log.
    pub fn push(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Removes every event.
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Returns the number of events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Returns the events in insertion order.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Consumes the log, returning the events in insertion order.
    pub fn into_events(self) -> Vec<Event> {
        self.events
    }

    /// Largest event time, or `None` for an empty log.
    pub fn loop_length(&self) -> Option<f64> {
        self.events.iter().map(|event| event.time).reduce(f64::max)
    }

    /// Events ordered by time. Ties keep insertion order.
    pub fn sorted(&self) -> Vec<Event> {
        let mut events = self.events.clone();
        events.sort_by(|a, b| a.time.total_cmp(&b.time));
        events
    }

    /// Renders the flat text form: one `<time>,<label>` line per event, in log
    /// order, each terminated by a newline.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for event in &self.events {
            let _ = writeln!(out, "{event}");
        }
        out
    }

    /// Parses the flat text form produced by [`EventLog::to_text`].
    pub fn parse(text: &str) -> Result<Self> {
        let mut log = Self::new();
        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            log.push(parse_line(line, index + 1)?);
        }
        Ok(log)
    }
}

impl FromIterator<Event> for EventLog {
    fn from_iter<I: IntoIterator<Item = Event>>(iter: I) -> Self {
        Self {
            events: iter.into_iter().collect(),
        }
    }
}

fn parse_line(line: &str, number: usize) -> Result<Event> {
    let parse_err = |reason: String| LooperError::Parse {
        line: number,
        reason,
    };

    let (time, label) = line
        .split_once(',')
        .ok_or_else(|| parse_err(format!("expected `<time>,<label>`, got `{line}`")))?;
    let time: f64 = time
        .trim()
        .parse()
        .map_err(|err| parse_err(format!("invalid time `{time}`: {err}")))?;
    if !time.is_finite() || time < 0.0 {
        return Err(parse_err(format!("time must be non-negative, got {time}")));
    }
    let label = label.trim();
    if label.is_empty() {
        return Err(parse_err("missing label".to_string()));
    }
    Ok(Event::new(time, label))
}
