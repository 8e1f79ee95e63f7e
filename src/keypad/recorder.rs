use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::keypad::{
    hw_specific, AudioInput, Indicator, InstrumentSequence, KeyId, KeypadError, NoIndicator,
    Sample,
};

/// One recording in progress.
struct RecordingSession {
    /// The key that started it, also the name of the result.
    trigger: KeyId,

    started: Instant,

    /// Sample keys pressed while recording, and when.
    presses: Vec<(Sample, Instant)>,

    /// Tells the capture thread to quit early.
    stop_sender: crossbeam_channel::Sender<()>,

    /// The capture thread. It owns the microphone until it returns
    /// the take.
    capture_thread: thread::JoinHandle<Result<Sample, KeypadError>>,
}

/// Records a new instrument: a microphone take plus the timing of the
/// sample keys pressed while it rolls.
///
/// There is at most one session at a time. While one is open a
/// background thread captures audio, and stops by itself after
/// `capture_duration` if nobody stops it first. Running out of time is
/// not an error; the session just sits there finished until the owner
/// collects it with `poll_finished()` (or `stop_recording()`).
///
/// The recorder has one owner (the controller), hence `&mut self`
/// everywhere and no locks.
pub struct Recorder {
    audio_in: Arc<dyn AudioInput>,
    indicator: Box<dyn Indicator>,
    capture_duration: Duration,
    session: Option<RecordingSession>,
}

impl Recorder {
    pub fn new(audio_in: Arc<dyn AudioInput>, capture_duration: Duration) -> Recorder {
        Recorder {
            audio_in,
            indicator: Box::new(NoIndicator::default()),
            capture_duration,
            session: None,
        }
    }

    /// Recorder with the stock capture length.
    pub fn with_default_duration(audio_in: Arc<dyn AudioInput>) -> Recorder {
        Recorder::new(audio_in, Duration::from_secs(hw_specific::CAPTURE_SECS))
    }

    /// Light this while recording.
    pub fn with_indicator(mut self, indicator: Box<dyn Indicator>) -> Recorder {
        self.set_indicator(indicator);
        self
    }

    pub fn set_indicator(&mut self, indicator: Box<dyn Indicator>) {
        self.indicator = indicator;
        self.indicator.set(self.session.is_some());
    }

    pub fn capture_duration(&self) -> Duration {
        self.capture_duration
    }

    /// True from `start_recording()` until the session is collected,
    /// even if the capture has already timed out.
    pub fn is_recording(&self) -> bool {
        self.session.is_some()
    }

    pub fn is_indicator_on(&self) -> bool {
        self.indicator.is_on()
    }

    /// Start a session and light the indicator.
    ///
    /// # Errors
    ///
    /// `KeypadError::AlreadyRecording` if one is open, and
    /// `KeypadError::Capture` if the capture thread won't start.
    pub fn start_recording(&mut self, trigger: KeyId) -> Result<(), KeypadError> {
        if let Some(session) = &self.session {
            return Err(KeypadError::AlreadyRecording {
                trigger: session.trigger.clone(),
            });
        }

        let (stop_sender, stop_receiver) = crossbeam_channel::bounded(1);
        let audio_in = Arc::clone(&self.audio_in);
        let duration = self.capture_duration;
        let capture_thread = thread::Builder::new()
            .name(format!("capture {trigger}"))
            .spawn(move || audio_in.capture(duration, &stop_receiver))
            .map_err(|e| KeypadError::Capture(format!("spawn of capture thread failed: {e}")))?;

        info!(trigger = %trigger, duration = ?duration, "Recording.");
        self.indicator.set(true);
        self.session = Some(RecordingSession {
            trigger,
            started: Instant::now(),
            presses: Vec::new(),
            stop_sender,
            capture_thread,
        });
        Ok(())
    }

    /// Note a sample key press, if we are recording and the capture
    /// window hasn't closed. Returns whether it was noted.
    pub fn note_press(&mut self, sample: &Sample) -> bool {
        let capture_duration = self.capture_duration;
        match &mut self.session {
            Some(session) if session.started.elapsed() < capture_duration => {
                session.presses.push((sample.clone(), Instant::now()));
                true
            }
            _ => false,
        }
    }

    /// Stop early, wait for the capture thread, and hand back the
    /// instrument. Storing it is up to the caller.
    ///
    /// # Errors
    ///
    /// `KeypadError::NotRecording` if there is no session. A failed
    /// capture comes back as its error, and the session is gone
    /// either way.
    pub fn stop_recording(&mut self) -> Result<InstrumentSequence, KeypadError> {
        let session = self.session.take().ok_or(KeypadError::NotRecording)?;

        // Full means already told; disconnected means already done.
        let _ = session.stop_sender.try_send(());
        self.finish(session)
    }

    /// Wait for the capture to run its full length, then finish as
    /// `stop_recording()` would.
    pub fn wait_for_capture(&mut self) -> Result<InstrumentSequence, KeypadError> {
        let session = self.session.take().ok_or(KeypadError::NotRecording)?;
        self.finish(session)
    }

    /// If the capture has finished on its own, collect it. `None`
    /// while still recording, or when not recording at all.
    pub fn poll_finished(&mut self) -> Option<Result<InstrumentSequence, KeypadError>> {
        let finished = self
            .session
            .as_ref()
            .is_some_and(|session| session.capture_thread.is_finished());
        if !finished {
            return None;
        }
        let session = self.session.take()?;
        Some(self.finish(session))
    }

    fn finish(&mut self, session: RecordingSession) -> Result<InstrumentSequence, KeypadError> {
        self.indicator.set(false);

        let take = match session.capture_thread.join() {
            Ok(Ok(take)) => take,
            Ok(Err(e)) => {
                warn!(trigger = %session.trigger, "Recording discarded: {e}");
                return Err(e);
            }
            Err(_) => {
                return Err(KeypadError::Capture("capture thread panicked".to_string()));
            }
        };

        let sequence = InstrumentSequence::from_capture(
            session.trigger.to_string(),
            take,
            &session.presses,
            session.started,
        );
        info!(
            trigger = %session.trigger,
            presses = session.presses.len(),
            captured = ?sequence.duration(),
            "Recording finished."
        );
        Ok(sequence)
    }
}
