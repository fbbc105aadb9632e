//! Core library for the Gesture Looper.
//!
//! Recognised gestures flow through the [`LiveDispatcher`], which turns held
//! poses into one trigger per onset. Triggers go to a [`SoundSink`] and, while
//! armed, to the [`Recorder`], which quantises them onto the beat grid. A
//! finished take can be replayed by the [`LoopPlayer`] on its own thread while
//! live gestures keep playing on top. [`Session`] wires the pieces together.

pub mod audio;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod looper;
pub mod mapping;
pub mod recognizer;
pub mod record;
pub mod session;
pub mod timeline;

pub use audio::{LoggingSink, SoundSink};
pub use config::{AppConfig, LiveConfig, LooperConfig, PathsConfig};
pub use dispatch::{edge_detect, ActiveLabels, FrameDecision, LiveDispatcher, STOP_LABEL};
pub use error::{LooperError, Result};
pub use looper::{LoopCursor, LoopPlayer, StartOutcome};
pub use mapping::GestureMapping;
pub use recognizer::{
    classify_frame, classify_hand, GestureSource, HandObservation, Handedness, Landmark,
    LandmarkSource, ScriptedSource, SourceStep,
};
pub use record::{Recorder, RecorderState};
pub use session::{Command, Session, Status};
pub use timeline::{quantise, Event, EventLog, PlaybackClock};
