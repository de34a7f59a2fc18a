use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use crate::error::{MidiKeysError, Result};
use crate::inject::{InjectError, KeyInjector};
use crate::timing::{KeyAction, Tempo};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Scheduled,
    Playing,
    Done,
    Cancelled,
    Failed,
}

#[derive(Debug, Default)]
struct CancelInner {
    cancelled: Mutex<bool>,
    wake: Condvar,
}

/// Shared stop request. Cloning hands out another handle to the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        *self.inner.cancelled.lock() = true;
        self.inner.wake.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.cancelled.lock()
    }

    /// Sleeps until `deadline` or until cancelled, whichever comes first.
    /// Returns whether the token is cancelled.
    pub fn wait_until(&self, deadline: Instant) -> bool {
        let mut cancelled = self.inner.cancelled.lock();
        while !*cancelled {
            if self.inner.wake.wait_until(&mut cancelled, deadline).timed_out() {
                break;
            }
        }
        *cancelled
    }

    /// Sleeps until cancelled.
    pub fn wait(&self) {
        let mut cancelled = self.inner.cancelled.lock();
        while !*cancelled {
            self.inner.wake.wait(&mut cancelled);
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PlaybackOptions {
    pub lead_in: Duration,
    pub dry_run: bool,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            lead_in: Duration::from_secs(3),
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackReport {
    pub track: usize,
    pub state: PlaybackState,
    pub taps: usize,
    pub skipped: usize,
}

/// Replays a key action list in real time, one tap at a time.
pub struct Scheduler<I> {
    injector: I,
    tempo: Tempo,
    options: PlaybackOptions,
    cancel: CancelToken,
    state: PlaybackState,
    track: usize,
}

impl<I: KeyInjector> Scheduler<I> {
    pub fn new(injector: I, tempo: Tempo, options: PlaybackOptions) -> Self {
        Self {
            injector,
            tempo,
            options,
            cancel: CancelToken::new(),
            state: PlaybackState::Idle,
            track: 0,
        }
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn for_track(mut self, track: usize) -> Self {
        self.track = track;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn injector(&self) -> &I {
        &self.injector
    }

    fn transition(&mut self, next: PlaybackState) {
        debug!(track = self.track, "playback {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn report(&self, taps: usize, skipped: usize) -> PlaybackReport {
        PlaybackReport {
            track: self.track,
            state: self.state,
            taps,
            skipped,
        }
    }

    /// Plays `actions` in order.
    ///
    /// Delays are measured against the start of playback, so late wake-ups
    /// do not push back later actions. Cancellation is observed only while
    /// waiting, never in the middle of a tap. An injector error abandons the
    /// rest of the queue.
    pub fn run(&mut self, actions: &[KeyAction]) -> Result<PlaybackReport> {
        let dry_run = self.options.dry_run;
        self.transition(PlaybackState::Scheduled);

        if !dry_run && !self.options.lead_in.is_zero() {
            debug!(
                track = self.track,
                "lead-in of {}s",
                self.options.lead_in.as_secs_f64()
            );
            if self.cancel.wait_until(Instant::now() + self.options.lead_in) {
                self.transition(PlaybackState::Cancelled);
                return Ok(self.report(0, 0));
            }
        }

        self.transition(PlaybackState::Playing);
        let start = Instant::now();
        let mut ticks: u64 = 0;
        let mut taps = 0;
        let mut skipped = 0;

        for action in actions {
            ticks = ticks.saturating_add(action.delta_ticks);
            let cancelled = if dry_run {
                self.cancel.is_cancelled()
            } else {
                match start.checked_add(self.tempo.ticks_to_duration(ticks)) {
                    Some(deadline) => self.cancel.wait_until(deadline),
                    None => {
                        self.cancel.wait();
                        true
                    }
                }
            };
            if cancelled {
                self.transition(PlaybackState::Cancelled);
                return Ok(self.report(taps, skipped));
            }

            let Some(press) = action.press else {
                skipped += 1;
                continue;
            };
            if dry_run {
                continue;
            }

            if let Err(source) = self.injector.tap(&press) {
                self.transition(PlaybackState::Failed);
                warn!(track = self.track, "key tap {} failed: {}", press, source);
                return Err(MidiKeysError::InjectionFailure {
                    track: self.track,
                    source,
                });
            }
            taps += 1;
        }

        self.transition(PlaybackState::Done);
        Ok(self.report(taps, skipped))
    }
}

/// One track's queue for concurrent playback.
#[derive(Debug, Clone, Copy)]
pub struct TrackQueue<'a> {
    pub track: usize,
    pub tempo: Tempo,
    pub actions: &'a [KeyAction],
}

/// Plays each queue on its own thread with its own scheduler and injector.
///
/// The only thing the schedulers share is the cancel token. One track failing
/// leaves the others running; every track's outcome is returned in input order.
pub fn play_tracks<I, F>(
    queues: &[TrackQueue<'_>],
    options: PlaybackOptions,
    cancel: &CancelToken,
    make_injector: F,
) -> Vec<(usize, Result<PlaybackReport>)>
where
    I: KeyInjector,
    F: Fn(usize) -> std::result::Result<I, InjectError> + Sync,
{
    thread::scope(|scope| {
        let handles: Vec<_> = queues
            .iter()
            .map(|queue| {
                let cancel = cancel.clone();
                let make_injector = &make_injector;
                let handle = scope.spawn(move || -> Result<PlaybackReport> {
                    let injector =
                        make_injector(queue.track).map_err(|source| {
                            MidiKeysError::InjectionFailure {
                                track: queue.track,
                                source,
                            }
                        })?;
                    Scheduler::new(injector, queue.tempo, options)
                        .for_track(queue.track)
                        .with_cancel_token(cancel)
                        .run(queue.actions)
                });
                (queue.track, handle)
            })
            .collect();

        handles
            .into_iter()
            .map(|(track, handle)| {
                let result = handle.join().unwrap_or_else(|_| {
                    Err(MidiKeysError::InjectionFailure {
                        track,
                        source: InjectError("playback thread panicked".to_string()),
                    })
                });
                (track, result)
            })
            .collect()
    })
}
