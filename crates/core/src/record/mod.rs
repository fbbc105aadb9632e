use std::{fs, path::Path, time::Instant};

use serde::{Deserialize, Serialize};

use crate::{quantise, Event, EventLog, LooperError, PlaybackClock, Result};

/// Recording state of a [`Recorder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecorderState {
    Idle,
    Recording,
}

/// Captures gesture triggers into a quantised [`EventLog`].
///
/// Lives on the foreground thread. The loop player never reads the live log;
/// it is handed a copy via [`Recorder::snapshot`].
#[derive(Debug)]
pub struct Recorder {
    tempo: f64,
    session: Option<PlaybackClock>,
    log: EventLog,
}

impl Recorder {
    /// Creates an idle recorder. Fails if `bpm` is not a positive finite tempo.
    pub fn new(bpm: f64) -> Result<Self> {
        if !bpm.is_finite() || bpm <= 0.0 {
            return Err(LooperError::InvalidTempo(bpm));
        }
        Ok(Self {
            tempo: bpm,
            session: None,
            log: EventLog::new(),
        })
    }

    /// Returns the recording tempo in beats per minute.
    pub fn tempo(&self) -> f64 {
        self.tempo
    }

    /// Returns whether a take is in progress.
    pub fn state(&self) -> RecorderState {
        if self.session.is_some() {
            RecorderState::Recording
        } else {
            RecorderState::Idle
        }
    }

    /// Returns `true` while a take is in progress.
    pub fn is_recording(&self) -> bool {
        self.session.is_some()
    }

    /// Instant the current take started, if recording.
    pub fn session_start(&self) -> Option<Instant> {
        self.session.map(|clock| clock.started_at())
    }

    /// Arms a fresh take when idle, or ends the current take when recording.
    /// Ending a take keeps its events as the latest recording.
    pub fn toggle(&mut self) -> RecorderState {
        self.toggle_at(Instant::now())
    }

    /// Same as [`Recorder::toggle`], with an explicit current instant.
    pub fn toggle_at(&mut self, now: Instant) -> RecorderState {
        match self.session.take() {
            None => {
                self.log.clear();
                self.session = Some(PlaybackClock::starting_at(now));
                tracing::info!(bpm = self.tempo, "recording started");
                RecorderState::Recording
            }
            Some(_) => {
                tracing::info!(events = self.log.len(), "recording stopped");
                RecorderState::Idle
            }
        }
    }

    /// Records `label` at the current instant. Does nothing while idle.
    pub fn add_event(&mut self, label: &str) {
        self.record_at(label, Instant::now());
    }

    /// Records `label` as if it arrived at `at`. Does nothing while idle.
    pub fn record_at(&mut self, label: &str, at: Instant) {
        let Some(session) = &self.session else {
            return;
        };
        let time = quantise(session.secs_at(at), self.tempo);
        tracing::debug!(label, time, "event recorded");
        self.log.push(Event::new(time, label));
    }

    /// The latest take, or the take in progress.
    pub fn log(&self) -> &EventLog {
        &self.log
    }

    /// Independent copy of the latest take.
    pub fn snapshot(&self) -> EventLog {
        self.log.clone()
    }

    /// Writes the latest take to `path` in the flat text format.
    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.log.to_text())?;
        tracing::info!(path = %path.display(), events = self.log.len(), "loop saved");
        Ok(())
    }
}
