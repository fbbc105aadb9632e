use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
    thread,
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{
    AppConfig, FrameDecision, GestureMapping, GestureSource, LiveDispatcher, LoopPlayer,
    LooperError, Recorder, Result, SoundSink, SourceStep, StartOutcome,
};

/// Status flags for display purposes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub is_recording: bool,
    pub is_playing_loop: bool,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_recording {
            f.write_str("RECORDING")
        } else if self.is_playing_loop {
            f.write_str("PLAYING LOOP")
        } else {
            f.write_str("IDLE")
        }
    }
}

/// Control actions available to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    ToggleRecording,
    PlayLoop,
    StopLoop,
    Save(Option<PathBuf>),
    Wait(Duration),
    Quit,
}

impl FromStr for Command {
    type Err = LooperError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split_whitespace();
        let name = parts.next().unwrap_or_default();
        let arg = parts.next();

        let command = match (name, arg) {
            ("record" | "r", None) => Self::ToggleRecording,
            ("play" | "p", None) => Self::PlayLoop,
            ("stop", None) => Self::StopLoop,
            ("save" | "s", path) => Self::Save(path.map(PathBuf::from)),
            ("wait", Some(ms)) => {
                let ms: u64 = ms
                    .parse()
                    .map_err(|_| LooperError::msg(format!("invalid wait duration `{ms}`")))?;
                Self::Wait(Duration::from_millis(ms))
            }
            ("quit" | "q", None) => Self::Quit,
            _ => return Err(LooperError::msg(format!("unknown command `{}`", s.trim()))),
        };

        if parts.next().is_some() {
            return Err(LooperError::msg(format!(
                "too many arguments in `{}`",
                s.trim()
            )));
        }
        Ok(command)
    }
}

/// Foreground controller: routes recognised gestures to the sink and the
/// recorder, and drives the loop player on command.
pub struct Session {
    recorder: Recorder,
    player: LoopPlayer,
    dispatcher: LiveDispatcher,
    sink: Arc<dyn SoundSink>,
    loop_file: PathBuf,
}

impl Session {
    /// Builds a session from validated configuration.
    pub fn new(
        config: &AppConfig,
        mapping: &GestureMapping,
        sink: Arc<dyn SoundSink>,
    ) -> Result<Self> {
        config.validate()?;
        if mapping.is_empty() {
            return Err(LooperError::Mapping("mapping is empty".to_string()));
        }
        Ok(Self {
            recorder: Recorder::new(config.looper.bpm)?,
            player: LoopPlayer::with_poll_interval(config.looper.poll_interval())
                .with_min_loop_length(config.looper.beat_length()),
            dispatcher: LiveDispatcher::new(mapping.known_labels()),
            sink,
            loop_file: config.paths.loop_file.clone(),
        })
    }

    /// Returns the recording and loop playback flags.
    pub fn status(&self) -> Status {
        Status {
            is_recording: self.recorder.is_recording(),
            is_playing_loop: self.player.is_playing(),
        }
    }

    /// Returns the recorder holding the latest take.
    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    /// Dispatches the gestures recognised in one frame.
    pub fn process_frame<S: AsRef<str>>(&mut self, labels: &[S]) -> FrameDecision {
        self.dispatcher
            .dispatch(labels, self.sink.as_ref(), &mut self.recorder)
    }

    /// Arms or ends a take. Returns `true` if now recording.
    pub fn toggle_recording(&mut self) -> bool {
        self.recorder.toggle();
        self.recorder.is_recording()
    }

    /// Starts the loop from a copy of the latest take.
    pub fn play_loop(&mut self) -> Result<StartOutcome> {
        self.player
            .start(self.recorder.snapshot(), Arc::clone(&self.sink))
    }

    /// Stops loop playback, waiting for the player thread to exit.
    pub fn stop_loop(&mut self) {
        self.player.stop();
    }

    /// Saves the latest take, to `path` or the configured loop file.
    pub fn save_loop(&self, path: Option<&Path>) -> Result<PathBuf> {
        let path = path.unwrap_or(&self.loop_file).to_path_buf();
        self.recorder.save(&path)?;
        Ok(path)
    }

    /// Applies `command`. Returns `false` once the session should end.
    pub fn apply(&mut self, command: &Command) -> Result<bool> {
        match command {
            Command::ToggleRecording => {
                let on = self.toggle_recording();
                tracing::info!(recording = on, "recording toggled");
            }
            Command::PlayLoop => {
                self.play_loop()?;
            }
            Command::StopLoop => self.stop_loop(),
            Command::Save(path) => {
                self.save_loop(path.as_deref())?;
            }
            Command::Wait(duration) => thread::sleep(*duration),
            Command::Quit => return Ok(false),
        }
        Ok(true)
    }

    /// Pulls steps from `source` until it is exhausted or a quit command
    /// arrives, sleeping `frame_interval` after each frame.
    ///
    /// Recognizer failures count as an empty frame. Rejected or failing
    /// commands are logged and leave the held gestures untouched.
    pub fn run(&mut self, source: &mut dyn GestureSource, frame_interval: Duration) -> usize {
        let mut frames = 0;
        loop {
            let step = match source.next_frame() {
                Ok(Some(step)) => step,
                Ok(None) => break,
                Err(err) => {
                    tracing::warn!(%err, "gesture detection failed");
                    SourceStep::Frame(Vec::new())
                }
            };

            match step {
                SourceStep::Frame(labels) => {
                    self.process_frame(labels.as_slice());
                    frames += 1;
                    thread::sleep(frame_interval);
                }
                SourceStep::Command(command) => match self.apply(&command) {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(err) => tracing::warn!(%err, ?command, "command failed"),
                },
                SourceStep::Rejected { line, reason } => {
                    tracing::warn!(line, %reason, "command ignored");
                }
            }
        }
        tracing::debug!(frames, status = %self.status(), "input exhausted");
        frames
    }

    /// Stops the loop and silences the sink.
    pub fn shutdown(&mut self) {
        self.player.stop();
        self.sink.stop_all();
        tracing::info!("cleanup done");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.player.stop();
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("recorder", &self.recorder)
            .field("player", &self.player)
            .field("dispatcher", &self.dispatcher)
            .field("loop_file", &self.loop_file)
            .finish()
    }
}
