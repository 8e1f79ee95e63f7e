use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, info, warn};

use crate::keypad::{
    hw_specific, mutex_poison, AudioOutput, InstrumentSequence, KeyId, KeypadError, LoopWatch,
    SoundAsset, SoundBank,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Playing,
}

/// The running loop thread and the way to stop it.
struct LoopTask {
    stop_sender: Sender<()>,
    thread: thread::JoinHandle<Result<(), KeypadError>>,
}

/// Plays the instrument in one sound bank slot over and over, on a
/// background thread, until stopped.
///
/// The slot is looked up again at the top of every pass, so a fresh
/// recording stored there is picked up on the next time around
/// without restarting. An empty slot (or empty instrument) makes the
/// thread rest and look again, quietly.
///
/// `start()` and `stop()` may be called from any thread; they take
/// turns on a mutex, so there is never more than one loop thread.
/// `stop()` waits until the loop thread has actually exited. The loop
/// thread waits out each interval on the stop channel, so it notices
/// a stop at once, not at the end of the interval.
pub struct LoopPlayer {
    bank: SoundBank,
    audio: Arc<dyn AudioOutput>,
    slot: KeyId,

    /// How long to wait before looking at an empty slot again.
    rest: Duration,

    task: Mutex<Option<LoopTask>>,

    /// Written only by the loop thread: `Playing` as it starts,
    /// `Idle` as it exits.
    state_sender: Arc<tokio::sync::watch::Sender<LoopState>>,
}

impl LoopPlayer {
    /// Loop whatever instrument is stored in `slot` of `bank`.
    pub fn new(bank: SoundBank, audio: Arc<dyn AudioOutput>, slot: KeyId) -> LoopPlayer {
        let (state_sender, _) = tokio::sync::watch::channel(LoopState::Idle);
        LoopPlayer {
            bank,
            audio,
            slot,
            rest: Duration::from_millis(hw_specific::POLL_INTERVAL_MS),
            task: Mutex::new(None),
            state_sender: Arc::new(state_sender),
        }
    }

    pub fn with_rest(mut self, rest: Duration) -> LoopPlayer {
        self.rest = rest;
        self
    }

    pub fn slot(&self) -> &KeyId {
        &self.slot
    }

    /// `Playing` while a loop thread is alive.
    pub fn state(&self) -> LoopState {
        let task = self.task.lock().unwrap_or_else(mutex_poison);
        match task.as_ref() {
            Some(running) if !running.thread.is_finished() => LoopState::Playing,
            _ => LoopState::Idle,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.state() == LoopState::Playing
    }

    /// For async code that wants to know when the loop starts and
    /// stops.
    pub fn watch(&self) -> LoopWatch {
        LoopWatch::new(self.state_sender.subscribe())
    }

    /// Start looping. Does nothing if already playing.
    ///
    /// # Errors
    ///
    /// `KeypadError::Audio` if the loop thread won't start. If an
    /// earlier loop thread died of an error, that error is logged and
    /// we start fresh.
    pub fn start(&self) -> Result<(), KeypadError> {
        let mut task = self.task.lock().unwrap_or_else(mutex_poison);

        if let Some(running) = task.as_ref() {
            if !running.thread.is_finished() {
                debug!(slot = %self.slot, "Loop already playing.");
                return Ok(());
            }
        }
        if let Some(dead) = task.take() {
            if let Err(e) = Self::join(dead) {
                warn!(slot = %self.slot, "Previous loop had failed: {e}");
            }
        }

        let (stop_sender, stop_receiver) = crossbeam_channel::bounded(1);
        let bank = self.bank.clone();
        let audio = Arc::clone(&self.audio);
        let slot = self.slot.clone();
        let rest = self.rest;
        let state_sender = Arc::clone(&self.state_sender);

        let thread = thread::Builder::new()
            .name(format!("loop {}", self.slot))
            .spawn(move || {
                state_sender.send_replace(LoopState::Playing);
                let result = Self::play_until_stopped(&bank, audio.as_ref(), &slot, rest, &stop_receiver);
                state_sender.send_replace(LoopState::Idle);
                if let Err(e) = &result {
                    warn!(slot = %slot, "Loop stopped by failure: {e}");
                }
                result
            })
            .map_err(|e| KeypadError::Audio(format!("spawn of loop thread failed: {e}")))?;

        info!(slot = %self.slot, "Loop started.");
        *task = Some(LoopTask {
            stop_sender,
            thread,
        });
        Ok(())
    }

    /// Stop looping and wait for the loop thread to exit. Returns at
    /// once if not playing.
    ///
    /// A loop thread that already died on its own counts as not
    /// playing: it is cleaned up, its failure logged, and this returns
    /// `Ok`. `take_failure()` is the place to collect that failure.
    ///
    /// # Errors
    ///
    /// The loop thread failed while we were stopping it.
    pub fn stop(&self) -> Result<(), KeypadError> {
        let mut task = self.task.lock().unwrap_or_else(mutex_poison);

        let Some(running) = task.take() else {
            return Ok(());
        };

        if running.thread.is_finished() {
            if let Err(e) = Self::join(running) {
                warn!(slot = %self.slot, "Loop had already stopped: {e}");
            }
            return Ok(());
        }

        // Full means already told; disconnected means already gone.
        let _ = running.stop_sender.try_send(());
        let result = Self::join(running);
        info!(slot = %self.slot, "Loop stopped.");
        result
    }

    /// Start if idle, stop if playing. Returns the new state.
    pub fn toggle(&self) -> Result<LoopState, KeypadError> {
        if self.is_playing() {
            self.stop()?;
            Ok(LoopState::Idle)
        } else {
            self.start()?;
            Ok(LoopState::Playing)
        }
    }

    /// If the loop thread has died on its own (it only does that on
    /// failure), clean it up and return why.
    pub fn take_failure(&self) -> Option<KeypadError> {
        let mut task = self.task.lock().unwrap_or_else(mutex_poison);
        let finished = task
            .as_ref()
            .is_some_and(|running| running.thread.is_finished());
        if !finished {
            return None;
        }
        task.take().and_then(|dead| Self::join(dead).err())
    }

    fn join(task: LoopTask) -> Result<(), KeypadError> {
        match task.thread.join() {
            Ok(result) => result,
            Err(_) => Err(KeypadError::Audio("loop thread panicked".to_string())),
        }
    }

    /// Body of the loop thread.
    fn play_until_stopped(
        bank: &SoundBank,
        audio: &dyn AudioOutput,
        slot: &KeyId,
        rest: Duration,
        stop_receiver: &Receiver<()>,
    ) -> Result<(), KeypadError> {
        loop {
            let asset = bank.lookup(slot).ok();
            let entries = asset
                .as_deref()
                .and_then(SoundAsset::as_instrument)
                .map_or(&[][..], InstrumentSequence::entries);

            let mut pass_time = Duration::ZERO;
            for entry in entries {
                audio.play(&entry.asset)?;
                if Self::wait_or_stop(stop_receiver, entry.interval) {
                    return Ok(());
                }
                pass_time += entry.interval;
            }

            // Nothing to play, or nothing that takes any time. Don't spin.
            if pass_time.is_zero() && Self::wait_or_stop(stop_receiver, rest) {
                return Ok(());
            }
        }
    }

    /// Sleep for `duration` unless told to stop first. True means stop.
    fn wait_or_stop(stop_receiver: &Receiver<()>, duration: Duration) -> bool {
        !matches!(
            stop_receiver.recv_timeout(duration),
            Err(RecvTimeoutError::Timeout)
        )
    }
}

impl Drop for LoopPlayer {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!(slot = %self.slot, "Loop had failed: {e}");
        }
    }
}
