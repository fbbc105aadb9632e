use std::{
    collections::BTreeMap,
    path::PathBuf,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use crate::GestureMapping;

/// Output seam for triggered sounds.
///
/// Both the live dispatcher and the loop player call into the same sink, from
/// different threads, so implementations must tolerate concurrent calls.
/// Unknown labels are not an error: `play` simply does nothing for them.
pub trait SoundSink: Send + Sync {
    /// Fire-and-forget trigger for `label`.
    fn play(&self, label: &str);

    /// Silences everything currently sounding.
    fn stop_all(&self);
}

impl<S: SoundSink + ?Sized> SoundSink for Arc<S> {
    fn play(&self, label: &str) {
        (**self).play(label)
    }

    fn stop_all(&self) {
        (**self).stop_all()
    }
}

/// Sink that resolves labels through a [`GestureMapping`] and reports each
/// trigger through `tracing` instead of driving a mixer.
#[derive(Debug)]
pub struct LoggingSink {
    sounds: BTreeMap<String, PathBuf>,
    triggered: AtomicU64,
}

impl LoggingSink {
    /// Creates a sink resolving labels through `mapping`.
    pub fn new(mapping: &GestureMapping) -> Self {
        Self {
            sounds: mapping
                .iter()
                .map(|(label, path)| (label.to_string(), path.to_path_buf()))
                .collect(),
            triggered: AtomicU64::new(0),
        }
    }

    /// Number of triggers that resolved to a configured sound.
    pub fn triggered(&self) -> u64 {
        self.triggered.load(Ordering::Relaxed)
    }
}

impl SoundSink for LoggingSink {
    fn play(&self, label: &str) {
        match self.sounds.get(label) {
            Some(path) => {
                self.triggered.fetch_add(1, Ordering::Relaxed);
                tracing::info!(label, sound = %path.display(), "play");
            }
            None => tracing::debug!(label, "no sound mapped"),
        }
    }

    fn stop_all(&self) {
        tracing::info!("stop all sounds");
    }
}
