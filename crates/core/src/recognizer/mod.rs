use std::{collections::VecDeque, fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{Command, LooperError, Result, STOP_LABEL};

/// A fingertip counts as raised when it sits this far above its middle joint
/// (normalised image coordinates, y grows downwards).
pub const LIFT_THRESHOLD: f32 = 0.02;

/// Finger code, tip landmark index. The middle joint sits two indices lower.
const TRACKED_FINGERS: [(&str, usize); 2] = [("I", 8), ("M", 12)];

/// One unit of input for the foreground loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceStep {
    /// Gesture labels recognised in one video frame. `STOP` is reserved.
    Frame(Vec<String>),
    /// An operator command interleaved with the frames.
    Command(Command),
    /// A command line that could not be understood. Not a frame: held
    /// gestures stay held.
    Rejected { line: usize, reason: String },
}

/// Anything that can feed recognised gestures to a [`crate::Session`].
///
/// Errors are treated by the session as "no gestures this frame".
pub trait GestureSource {
    /// Next step, or `None` once the input is exhausted.
    fn next_frame(&mut self) -> Result<Option<SourceStep>>;
}

/// Gesture source that replays a text script.
///
/// One frame per line with labels separated by whitespace; a blank line is a
/// frame with no gestures. Lines starting with `#` are comments and lines
/// starting with `!` carry a [`Command`], e.g. `!record` or `!wait 500`.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    lines: VecDeque<(usize, String)>,
}

impl ScriptedSource {
    /// Builds a source from script text, dropping comment lines.
    pub fn from_text(text: &str) -> Self {
        Self {
            lines: text
                .lines()
                .enumerate()
                .map(|(index, line)| (index + 1, line.trim().to_string()))
                .filter(|(_, line)| !line.starts_with('#'))
                .collect(),
        }
    }

    /// Reads a script from disk.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(Self::from_text(&text))
    }

    /// Returns the number of steps left.
    pub fn remaining(&self) -> usize {
        self.lines.len()
    }
}

impl GestureSource for ScriptedSource {
    fn next_frame(&mut self) -> Result<Option<SourceStep>> {
        let Some((number, line)) = self.lines.pop_front() else {
            return Ok(None);
        };

        if let Some(command) = line.strip_prefix('!') {
            let step = match command.parse::<Command>() {
                Ok(command) => SourceStep::Command(command),
                Err(err) => SourceStep::Rejected {
                    line: number,
                    reason: err.to_string(),
                },
            };
            return Ok(Some(step));
        }

        let labels = line.split_whitespace().map(str::to_string).collect();
        Ok(Some(SourceStep::Frame(labels)))
    }
}

/// Which hand a set of landmarks belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Handedness {
    Left,
    Right,
}

impl Handedness {
    /// Returns the label prefix, `L` or `R`.
    pub fn prefix(&self) -> char {
        match self {
            Self::Left => 'L',
            Self::Right => 'R',
        }
    }
}

/// One hand-tracking keypoint in normalised image coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub z: f32,
}

/// Landmarks reported by a hand tracker for one hand in one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandObservation {
    pub handedness: Handedness,
    pub landmarks: Vec<Landmark>,
}

/// Names the pose of one hand.
///
/// Raised fingers give `<L|R>:<fingers>`, e.g. `R:I+M`. A hand with no raised
/// finger is the `STOP` gesture. Fingers whose landmarks are missing are
/// treated as lowered.
pub fn classify_hand(handedness: Handedness, landmarks: &[Landmark]) -> String {
    let raised: Vec<&str> = TRACKED_FINGERS
        .iter()
        .filter(|(_, tip)| {
            let (Some(tip), Some(joint)) = (landmarks.get(*tip), landmarks.get(tip - 2)) else {
                return false;
            };
            tip.y < joint.y - LIFT_THRESHOLD
        })
        .map(|(finger, _)| *finger)
        .collect();

    if raised.is_empty() {
        STOP_LABEL.to_string()
    } else {
        format!("{}:{}", handedness.prefix(), raised.join("+"))
    }
}

/// Labels for every hand seen in a frame, in tracker order.
pub fn classify_frame(hands: &[HandObservation]) -> Vec<String> {
    hands
        .iter()
        .map(|hand| classify_hand(hand.handedness, &hand.landmarks))
        .collect()
}

/// Gesture source that classifies recorded hand-tracking output.
///
/// Input is JSON lines: each line is an array of [`HandObservation`]s for one
/// frame, and a blank line is a frame with no hands. A line that fails to
/// decode is reported as an error, which the session treats as a frame with no
/// gestures.
#[derive(Debug, Clone, Default)]
pub struct LandmarkSource {
    lines: VecDeque<(usize, String)>,
}

impl LandmarkSource {
    /// Builds a source from JSON-lines text.
    pub fn from_text(text: &str) -> Self {
        Self {
            lines: text
                .lines()
                .enumerate()
                .map(|(index, line)| (index + 1, line.trim().to_string()))
                .collect(),
        }
    }

    /// Reads recorded frames from disk.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(Self::from_text(&text))
    }
}

impl GestureSource for LandmarkSource {
    fn next_frame(&mut self) -> Result<Option<SourceStep>> {
        let Some((number, line)) = self.lines.pop_front() else {
            return Ok(None);
        };
        if line.is_empty() {
            return Ok(Some(SourceStep::Frame(Vec::new())));
        }

        let hands: Vec<HandObservation> =
            serde_json::from_str(&line).map_err(|err| LooperError::Parse {
                line: number,
                reason: err.to_string(),
            })?;
        Ok(Some(SourceStep::Frame(classify_frame(&hands))))
    }
}
