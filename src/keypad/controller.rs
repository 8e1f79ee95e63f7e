use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use tracing::{debug, error, info, warn};

use crate::keypad::{
    AudioInput, AudioOutput, Indicator, InputSurface, InstrumentSequence, KeyEvent, KeyId,
    KeyPosition, KeyTracker, KeypadConfig, KeypadError, LoopPlayer, LoopState, Recorder,
    SoundAsset, SoundBank,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Created, `boot()` not yet called.
    Booting,

    /// Polling.
    Ready,
}

#[derive(Debug, Default, Clone)]
/// What one poll cycle did.
pub struct PollReport {
    /// Presses and releases seen since the previous poll.
    pub events: Vec<KeyEvent>,

    /// Keys whose sound was sent to the audio output.
    pub played: Vec<KeyId>,

    /// The loop key was pressed, and this is the loop's new state.
    pub loop_toggled: Option<LoopState>,

    /// The record key started a recording.
    pub recording_started: bool,

    /// A finished recording was stored in the instrument slot.
    pub instrument_stored: bool,
}

/// Ties it all together: reads the keys, plays sounds, runs the
/// recorder and the loop, keeps the lights up to date.
///
/// The owner calls `boot()` once and then `handle_poll_cycle()` every
/// `poll_interval`, or just calls `run()`, which does both.
///
/// Each poll:
///
/// 1. Read which keys are down.
///
/// 2. The loop key toggles the loop and the record key toggles
///    recording, once per press however long it is held.
///
/// 3. Play the sound bound to each other key that just went down (or
///    each that is down, with `retrigger_held`). Unbound keys are
///    ignored. Playing never waits for the sound to finish.
///
/// 4. A recording that has finished gets stored in the instrument
///    slot, replacing whatever was there.
pub struct KeypadController<S: InputSurface> {
    surface: S,
    bank: SoundBank,
    audio: Arc<dyn AudioOutput>,
    loop_player: LoopPlayer,
    recorder: Recorder,
    config: KeypadConfig,
    tracker: KeyTracker,
    phase: Phase,
}

impl<S: InputSurface> KeypadController<S> {
    pub fn new(
        surface: S,
        bank: SoundBank,
        audio: Arc<dyn AudioOutput>,
        audio_in: Arc<dyn AudioInput>,
        config: KeypadConfig,
    ) -> KeypadController<S> {
        let loop_player = LoopPlayer::new(
            bank.clone(),
            Arc::clone(&audio),
            config.instrument_slot.clone(),
        )
        .with_rest(config.loop_rest);
        let recorder = Recorder::new(audio_in, config.capture_duration);

        KeypadController {
            surface,
            bank,
            audio,
            loop_player,
            recorder,
            config,
            tracker: KeyTracker::new(),
            phase: Phase::Booting,
        }
    }

    /// Light this while recording, e.g. the LED in the record button.
    pub fn with_record_indicator(mut self, indicator: Box<dyn Indicator>) -> KeypadController<S> {
        self.recorder.set_indicator(indicator);
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn config(&self) -> &KeypadConfig {
        &self.config
    }

    pub fn bank(&self) -> &SoundBank {
        &self.bank
    }

    pub fn loop_player(&self) -> &LoopPlayer {
        &self.loop_player
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    pub fn recorder_mut(&mut self) -> &mut Recorder {
        &mut self.recorder
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    /// All lights on for a moment, then off, to show we're alive.
    /// Blocks for `boot_flash`.
    pub fn boot(&mut self) {
        info!(flash = ?self.config.boot_flash, "Booting keypad.");
        self.surface.set_all_indicators(true);
        thread::sleep(self.config.boot_flash);
        self.surface.set_all_indicators(false);
        self.phase = Phase::Ready;
    }

    /// One poll of the keys and everything that follows from it.
    ///
    /// # Errors
    ///
    /// Only a failed read of the keys. Everything else (recorder
    /// misuse, audio trouble, a dead loop) is logged and the cycle
    /// carries on.
    pub fn handle_poll_cycle(&mut self) -> Result<PollReport, KeypadError> {
        let pressed = self.surface.poll()?;
        let events = self.tracker.update(&pressed);
        let mut report = PollReport::default();

        for event in &events {
            if !self.is_control_key(&event.key) {
                self.surface
                    .set_indicator(&event.key, event.key_position == KeyPosition::Down);
            }
        }

        // Controls first, so a sample key pressed in the same poll as
        // the record key lands in the new recording.
        let control_presses: BTreeSet<KeyId> = Self::presses(&events)
            .filter(|key| self.is_control_key(key))
            .cloned()
            .collect();
        if control_presses.contains(&self.config.loop_key) {
            self.toggle_loop(&mut report);
        }
        if control_presses.contains(&self.config.record_key) {
            self.toggle_recording(&mut report);
        }

        let candidates: Vec<&KeyId> = if self.config.retrigger_held {
            pressed.iter().collect()
        } else {
            Self::presses(&events).collect()
        };
        let to_play: Vec<KeyId> = candidates
            .into_iter()
            .filter(|key| !self.is_control_key(key))
            .cloned()
            .collect();
        for key in &to_play {
            self.play_key(key, &mut report);
        }

        if let Some(finished) = self.recorder.poll_finished() {
            self.store_recording(finished, &mut report);
        }

        if let Some(e) = self.loop_player.take_failure() {
            warn!("Loop died: {e}");
        }

        let loop_key = self.config.loop_key.clone();
        let record_key = self.config.record_key.clone();
        self.surface
            .set_indicator(&loop_key, self.loop_player.is_playing());
        self.surface
            .set_indicator(&record_key, self.recorder.is_recording());

        report.events = events;
        Ok(report)
    }

    /// Boot if need be, then poll every `poll_interval` until
    /// something arrives on `shutdown` (or its sender is dropped).
    /// Shuts down tidily either way: loop stopped, any recording
    /// stored, lights off.
    ///
    /// # Errors
    ///
    /// A failed read of the keys ends the run with that error.
    pub fn run(&mut self, shutdown: &Receiver<()>) -> Result<(), KeypadError> {
        if self.phase == Phase::Booting {
            self.boot();
        }
        info!(interval = ?self.config.poll_interval, "Polling keys.");

        let result = loop {
            if let Err(e) = self.handle_poll_cycle() {
                error!("Can't read keys, giving up: {e}");
                break Err(e);
            }
            match shutdown.recv_timeout(self.config.poll_interval) {
                Err(RecvTimeoutError::Timeout) => continue,
                _ => break Ok(()),
            }
        };

        self.shutdown();
        result
    }

    /// Stop the loop, finish and store any recording, lights off.
    pub fn shutdown(&mut self) {
        info!("Shutting down keypad.");
        if let Err(e) = self.loop_player.stop() {
            warn!("Loop had failed: {e}");
        }
        if self.recorder.is_recording() {
            let mut report = PollReport::default();
            let finished = self.recorder.stop_recording();
            self.store_recording(finished, &mut report);
        }
        self.surface.set_all_indicators(false);
    }

    fn is_control_key(&self, key: &KeyId) -> bool {
        *key == self.config.loop_key || *key == self.config.record_key
    }

    fn presses(events: &[KeyEvent]) -> impl Iterator<Item = &KeyId> {
        events
            .iter()
            .filter(|event| event.key_position == KeyPosition::Down)
            .map(|event| &event.key)
    }

    fn play_key(&mut self, key: &KeyId, report: &mut PollReport) {
        let asset = match self.bank.lookup(key) {
            Ok(asset) => asset,
            Err(_) => return, // Unbound, on purpose or not.
        };
        let Some(sample) = asset.lead_sample() else {
            debug!(key = %key, "Empty instrument, nothing to play.");
            return;
        };

        if let SoundAsset::Sample(sample) = asset.as_ref() {
            self.recorder.note_press(sample);
        }

        match self.audio.play(sample) {
            Ok(()) => report.played.push(key.clone()),
            Err(e) => warn!(key = %key, "Playback failed: {e}"),
        }
    }

    fn toggle_loop(&mut self, report: &mut PollReport) {
        match self.loop_player.toggle() {
            Ok(state) => {
                info!(state = ?state, "Loop key.");
                report.loop_toggled = Some(state);
            }
            Err(e) => warn!("Loop key: {e}"),
        }
    }

    fn toggle_recording(&mut self, report: &mut PollReport) {
        if self.recorder.is_recording() {
            let finished = self.recorder.stop_recording();
            self.store_recording(finished, report);
        } else {
            match self.recorder.start_recording(self.config.record_key.clone()) {
                Ok(()) => report.recording_started = true,
                Err(e) => warn!("Record key: {e}"),
            }
        }
    }

    fn store_recording(
        &mut self,
        finished: Result<InstrumentSequence, KeypadError>,
        report: &mut PollReport,
    ) {
        match finished {
            Ok(sequence) => {
                info!(
                    slot = %self.config.instrument_slot,
                    entries = sequence.len(),
                    "Storing recorded instrument."
                );
                self.bank.store(
                    self.config.instrument_slot.clone(),
                    SoundAsset::Instrument(sequence),
                );
                report.instrument_stored = true;
            }
            Err(e) => warn!("Recording lost: {e}"),
        }
    }
}
