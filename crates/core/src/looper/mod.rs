//! Background replay of a recorded take.
//!
//! [`LoopPlayer`] owns a worker thread that walks a time-sorted copy of an
//! [`EventLog`] against its own [`PlaybackClock`], triggering the sink for each
//! due event and rewinding the clock once the loop length has passed. The
//! stepping logic lives in [`LoopCursor`] so it can be driven without threads.

use std::{
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use crate::{Event, EventLog, LooperError, PlaybackClock, Result, SoundSink};

/// Default sleep between scheduler polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Outcome of [`LoopPlayer::start`].
#[derive(Debug, Clone, PartialEq)]
pub enum StartOutcome {
    Started { events: usize, loop_length: f64 },
    AlreadyPlaying,
    Empty,
}

/// Playback position within one pass of a loop.
#[derive(Debug, Clone)]
pub struct LoopCursor {
    events: Vec<Event>,
    loop_length: f64,
    next: usize,
}

impl LoopCursor {
    /// Builds a cursor over `log`, sorted by time. The loop lasts until the
    /// last event, but never less than `min_length` seconds. Returns `None` for
    /// an empty log.
    pub fn new(log: &EventLog, min_length: f64) -> Option<Self> {
        let loop_length = log.loop_length()?.max(min_length);
        Some(Self {
            events: log.sorted(),
            loop_length,
            next: 0,
        })
    }

    /// Returns the length of one pass in seconds.
    pub fn loop_length(&self) -> f64 {
        self.loop_length
    }

    /// Returns the number of events in one pass.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Index of the next event due.
    pub fn position(&self) -> usize {
        self.next
    }

    /// Emits every event due at `elapsed` seconds into the pass. Returns `true`
    /// when the pass is over and the caller must restart its clock.
    pub fn advance(&mut self, elapsed: f64, mut emit: impl FnMut(&Event)) -> bool {
        while let Some(event) = self.events.get(self.next) {
            if event.time > elapsed {
                break;
            }
            emit(event);
            self.next += 1;
        }

        if elapsed > self.loop_length {
            self.next = 0;
            true
        } else {
            false
        }
    }
}

/// Cyclic player for a recorded take.
///
/// `start` takes ownership of a snapshot, so a new take recorded meanwhile
/// never touches the running loop.
pub struct LoopPlayer {
    poll_interval: Duration,
    min_loop_length: Duration,
    playing: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl LoopPlayer {
    /// Creates a stopped player polling every [`DEFAULT_POLL_INTERVAL`].
    pub fn new() -> Self {
        Self::with_poll_interval(DEFAULT_POLL_INTERVAL)
    }

    /// Creates a stopped player with an explicit poll interval.
    pub fn with_poll_interval(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            min_loop_length: Duration::ZERO,
            playing: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    /// Floors the loop length, so a take whose events all share one grid slot
    /// repeats at that period instead of on every poll.
    pub fn with_min_loop_length(mut self, min_loop_length: Duration) -> Self {
        self.min_loop_length = min_loop_length;
        self
    }

    /// Returns the sleep between scheduler polls.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Returns `true` while a loop is running in the background.
    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    /// Starts looping `snapshot` in the background.
    ///
    /// Does nothing if a loop is already playing or the snapshot is empty.
    /// Only a failure to spawn the worker thread is reported as an error.
    pub fn start(
        &mut self,
        snapshot: EventLog,
        sink: Arc<dyn SoundSink>,
    ) -> Result<StartOutcome> {
        if self.is_playing() {
            tracing::info!("loop already playing");
            return Ok(StartOutcome::AlreadyPlaying);
        }
        let Some(cursor) = LoopCursor::new(&snapshot, self.min_loop_length.as_secs_f64()) else {
            tracing::warn!("no events recorded, loop not started");
            return Ok(StartOutcome::Empty);
        };

        // Reap a worker left over from an earlier run.
        self.join_worker();

        let outcome = StartOutcome::Started {
            events: cursor.len(),
            loop_length: cursor.loop_length(),
        };
        self.playing.store(true, Ordering::Release);

        let clock = PlaybackClock::start();
        let playing = Arc::clone(&self.playing);
        let poll_interval = self.poll_interval;
        let spawned = thread::Builder::new()
            .name("loop-player".to_string())
            .spawn(move || run_loop(cursor, clock, sink, playing, poll_interval));

        match spawned {
            Ok(handle) => {
                self.worker = Some(handle);
                tracing::info!(?outcome, "loop playback started");
                Ok(outcome)
            }
            Err(err) => {
                self.playing.store(false, Ordering::Release);
                Err(LooperError::msg(format!(
                    "failed to spawn loop player thread: {err}"
                )))
            }
        }
    }

    /// Stops playback and waits for the worker to exit. No sink call from this
    /// player happens after `stop` returns. Calling it while stopped is a no-op.
    pub fn stop(&mut self) {
        let was_playing = self.playing.swap(false, Ordering::AcqRel);
        self.join_worker();
        if was_playing {
            tracing::info!("loop playback stopped");
        }
    }

    fn join_worker(&mut self) {
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                tracing::error!("loop player thread panicked");
            }
        }
    }
}

impl Default for LoopPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LoopPlayer {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for LoopPlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopPlayer")
            .field("poll_interval", &self.poll_interval)
            .field("min_loop_length", &self.min_loop_length)
            .field("playing", &self.is_playing())
            .finish()
    }
}

fn run_loop(
    mut cursor: LoopCursor,
    mut clock: PlaybackClock,
    sink: Arc<dyn SoundSink>,
    playing: Arc<AtomicBool>,
    poll_interval: Duration,
) {
    while playing.load(Ordering::Acquire) {
        let elapsed = clock.elapsed_secs();
        if cursor.advance(elapsed, |event| trigger(sink.as_ref(), event)) {
            clock.restart();
        }
        thread::sleep(poll_interval);
    }
}

/// A panicking sink must not take the loop down with it: log and move on.
fn trigger(sink: &dyn SoundSink, event: &Event) {
    tracing::debug!(label = %event.label, time = event.time, "loop trigger");
    let result = panic::catch_unwind(AssertUnwindSafe(|| sink.play(&event.label)));
    if result.is_err() {
        tracing::error!(label = %event.label, "sound sink panicked during loop playback");
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::Mutex,
        time::{Duration, Instant},
    };

    use super::*;

    #[derive(Default)]
    struct CapturingSink {
        calls: Mutex<Vec<(Instant, String)>>,
    }

    impl CapturingSink {
        fn labels(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .map(|(_, label)| label.clone())
                .collect()
        }

        fn count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl SoundSink for CapturingSink {
        fn play(&self, label: &str) {
            self.calls
                .lock()
                .unwrap()
                .push((Instant::now(), label.to_string()));
        }

        fn stop_all(&self) {}
    }

    struct PanickingSink {
        inner: CapturingSink,
    }

    impl SoundSink for PanickingSink {
        fn play(&self, label: &str) {
            self.inner.play(label);
            if label == "BOOM" {
                panic!("sink failure");
            }
        }

        fn stop_all(&self) {}
    }

    fn take(events: &[(f64, &str)]) -> EventLog {
        events
            .iter()
            .map(|(time, label)| Event::new(*time, *label))
            .collect()
    }

    #[test]
    fn cursor_emits_due_events_and_wraps() {
        let mut cursor = LoopCursor::new(&take(&[(0.5, "B"), (0.0, "A")]), 0.0).unwrap();
        let mut fired = Vec::new();

        assert!(!cursor.advance(0.0, |e| fired.push(e.label.clone())));
        assert_eq!(fired, ["A"]);
        assert!(!cursor.advance(0.3, |e| fired.push(e.label.clone())));
        assert_eq!(fired, ["A"]);
        assert!(!cursor.advance(0.5, |e| fired.push(e.label.clone())));
        assert_eq!(fired, ["A", "B"]);
        assert!(cursor.advance(0.501, |e| fired.push(e.label.clone())));
        assert_eq!(cursor.position(), 0);
        assert!(!cursor.advance(0.0, |e| fired.push(e.label.clone())));
        assert_eq!(fired, ["A", "B", "A"]);
    }

    #[test]
    fn cursor_fires_a_late_burst_in_order() {
        let log = take(&[(1.0, "C"), (0.5, "B1"), (0.5, "B2"), (0.0, "A")]);
        let mut cursor = LoopCursor::new(&log, 0.0).unwrap();
        let mut fired = Vec::new();

        cursor.advance(0.75, |e| fired.push(e.label.clone()));
        assert_eq!(fired, ["A", "B1", "B2"]);
        assert_eq!(cursor.loop_length(), 1.0);
    }

    #[test]
    fn minimum_length_stretches_single_slot_takes() {
        let mut cursor = LoopCursor::new(&take(&[(0.0, "A"), (0.0, "B")]), 0.5).unwrap();
        let mut fired = Vec::new();

        assert!(!cursor.advance(0.1, |e| fired.push(e.label.clone())));
        assert!(!cursor.advance(0.4, |e| fired.push(e.label.clone())));
        assert_eq!(fired, ["A", "B"]);
        assert!(cursor.advance(0.6, |_| {}));
        assert_eq!(cursor.loop_length(), 0.5);
    }

    #[test]
    fn empty_snapshot_never_plays() {
        let mut player = LoopPlayer::new();
        let sink = Arc::new(CapturingSink::default());

        let outcome = player.start(EventLog::new(), sink).unwrap();
        assert_eq!(outcome, StartOutcome::Empty);
        assert!(!player.is_playing());
    }

    #[test]
    fn stop_is_idempotent() {
        let mut player = LoopPlayer::new();
        player.stop();
        player.stop();
        assert!(!player.is_playing());
    }

    #[test]
    fn replays_in_order_and_wraps_around() {
        let mut player = LoopPlayer::new();
        let sink = Arc::new(CapturingSink::default());

        let outcome = player
            .start(take(&[(0.0, "A"), (0.5, "B")]), sink.clone())
            .unwrap();
        assert_eq!(
            outcome,
            StartOutcome::Started {
                events: 2,
                loop_length: 0.5
            }
        );
        assert!(player.is_playing());

        thread::sleep(Duration::from_millis(800));
        player.stop();
        assert!(!player.is_playing());

        let calls = sink.calls.lock().unwrap().clone();
        let labels: Vec<_> = calls.iter().map(|(_, label)| label.as_str()).collect();
        assert!(labels.len() >= 3, "got {labels:?}");
        assert_eq!(&labels[..3], ["A", "B", "A"]);

        let gap = calls[2].0.duration_since(calls[1].0);
        assert!(gap <= Duration::from_millis(500), "wrap took {gap:?}");
    }

    #[test]
    fn playback_clock_runs_from_the_start_call() {
        let mut player = LoopPlayer::new();
        let sink = Arc::new(CapturingSink::default());

        let before = Instant::now();
        player.start(take(&[(0.1, "A"), (1.0, "B")]), sink.clone()).unwrap();
        thread::sleep(Duration::from_millis(300));
        player.stop();

        let calls = sink.calls.lock().unwrap().clone();
        let (fired_at, label) = calls.first().expect("A should have fired");
        assert_eq!(label, "A");
        let offset = fired_at.duration_since(before);
        assert!(offset >= Duration::from_millis(100), "fired early at {offset:?}");
        assert!(offset < Duration::from_millis(200), "fired late at {offset:?}");
    }

    #[test]
    fn rejects_second_start_while_playing() {
        let mut player = LoopPlayer::new();
        let sink = Arc::new(CapturingSink::default());

        player.start(take(&[(0.0, "A"), (2.0, "B")]), sink.clone()).unwrap();
        let outcome = player.start(take(&[(0.0, "C")]), sink.clone()).unwrap();
        assert_eq!(outcome, StartOutcome::AlreadyPlaying);

        thread::sleep(Duration::from_millis(50));
        player.stop();
        assert!(!sink.labels().contains(&"C".to_string()));
    }

    #[test]
    fn no_triggers_after_stop_returns() {
        let mut player = LoopPlayer::new();
        let sink = Arc::new(CapturingSink::default());

        player.start(take(&[(0.0, "A"), (0.02, "B")]), sink.clone()).unwrap();
        thread::sleep(Duration::from_millis(100));
        player.stop();

        let count = sink.count();
        assert!(count > 0);
        thread::sleep(Duration::from_millis(100));
        assert_eq!(sink.count(), count);
    }

    #[test]
    fn can_restart_after_stop() {
        let mut player = LoopPlayer::new();
        let sink = Arc::new(CapturingSink::default());

        player.start(take(&[(0.0, "A"), (1.0, "B")]), sink.clone()).unwrap();
        player.stop();
        let outcome = player.start(take(&[(0.0, "C"), (1.0, "D")]), sink.clone()).unwrap();
        assert!(matches!(outcome, StartOutcome::Started { .. }));

        thread::sleep(Duration::from_millis(50));
        player.stop();
        assert!(sink.labels().contains(&"C".to_string()));
    }

    #[test]
    fn keeps_playing_when_the_sink_panics() {
        let mut player = LoopPlayer::new();
        let sink = Arc::new(PanickingSink {
            inner: CapturingSink::default(),
        });

        player
            .start(take(&[(0.0, "BOOM"), (0.05, "A")]), sink.clone())
            .unwrap();
        thread::sleep(Duration::from_millis(200));
        assert!(player.is_playing());
        player.stop();

        let labels = sink.inner.labels();
        assert!(labels.iter().filter(|l| *l == "A").count() >= 2, "got {labels:?}");
    }
}
