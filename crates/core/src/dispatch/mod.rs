use std::collections::HashSet;

use crate::{Recorder, SoundSink};

/// Reserved label that silences everything and resets the held gestures.
pub const STOP_LABEL: &str = "STOP";

/// Gestures considered held as of the last processed frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveLabels(HashSet<String>);

impl ActiveLabels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `label` was held last frame.
    pub fn contains(&self, label: &str) -> bool {
        self.0.contains(label)
    }

    /// Returns the number of held gestures.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the held labels in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl FromIterator<String> for ActiveLabels {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// What a single frame asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameDecision {
    /// `STOP` was present: silence everything and forget held gestures.
    StopAll,
    /// Trigger `started` (sorted) and carry `active` into the next frame.
    Trigger {
        started: Vec<String>,
        active: ActiveLabels,
    },
}

impl FrameDecision {
    /// Held gestures to carry into the next frame.
    pub fn next_active(&self) -> ActiveLabels {
        match self {
            Self::StopAll => ActiveLabels::new(),
            Self::Trigger { active, .. } => active.clone(),
        }
    }
}

/// Edge detection between consecutive frames.
///
/// Labels without a configured sound are dropped; of the rest, only those not
/// held in `previous` are started. Releasing a gesture triggers nothing.
pub fn edge_detect<S: AsRef<str>>(
    current: &[S],
    known: &HashSet<String>,
    previous: &ActiveLabels,
) -> FrameDecision {
    if current.iter().any(|label| label.as_ref() == STOP_LABEL) {
        return FrameDecision::StopAll;
    }

    let active: ActiveLabels = current
        .iter()
        .map(|label| label.as_ref())
        .filter(|label| known.contains(*label))
        .map(str::to_string)
        .collect();

    let mut started: Vec<String> = active
        .iter()
        .filter(|label| !previous.contains(label))
        .map(str::to_string)
        .collect();
    started.sort();

    FrameDecision::Trigger { started, active }
}

/// Per-frame front end: turns recognised gestures into sound triggers and
/// recorded events.
#[derive(Debug, Clone)]
pub struct LiveDispatcher {
    known: HashSet<String>,
    active: ActiveLabels,
}

impl LiveDispatcher {
    /// Creates a dispatcher for the labels that have a sound.
    pub fn new(known: HashSet<String>) -> Self {
        Self {
            known,
            active: ActiveLabels::new(),
        }
    }

    /// Returns the gestures held as of the last frame.
    pub fn active(&self) -> &ActiveLabels {
        &self.active
    }

    /// Processes one frame: plays and records new gestures, or stops everything on `STOP`.
    pub fn dispatch<S: AsRef<str>>(
        &mut self,
        current: &[S],
        sink: &dyn SoundSink,
        recorder: &mut Recorder,
    ) -> FrameDecision {
        let decision = edge_detect(current, &self.known, &self.active);
        match &decision {
            FrameDecision::StopAll => {
                tracing::debug!("stop gesture");
                sink.stop_all();
            }
            FrameDecision::Trigger { started, .. } => {
                for label in started {
                    tracing::debug!(label = %label, "gesture started");
                    sink.play(label);
                    recorder.add_event(label);
                }
            }
        }
        self.active = decision.next_active();
        decision
    }
}
