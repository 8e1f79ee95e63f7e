use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::keypad::{hw_specific, KeypadError, Sample};

/// Somewhere to send sounds.
///
/// `play()` must hand the sample off and return right away; the poll
/// loop calls it and must never wait for a sound to finish. Playing a
/// second sample while the first is still going mixes them.
pub trait AudioOutput: Send + Sync {
    fn play(&self, sample: &Sample) -> Result<(), KeypadError>;
}

/// Somewhere to record sounds from.
pub trait AudioInput: Send + Sync {
    /// Record for `duration`, or until a message arrives on `stop` (or
    /// its sender goes away), whichever comes first. Returns what was
    /// recorded, which is shorter than `duration` if stopped early.
    fn capture(
        &self,
        duration: Duration,
        stop: &crossbeam_channel::Receiver<()>,
    ) -> Result<Sample, KeypadError>;
}

#[derive(Debug, Clone)]
/// Audio that isn't there: playing just logs, capturing waits the
/// requested time and returns silence. For running without a sound
/// card, and for tests.
pub struct NullAudio {
    sample_rate: u32,
    plays: Arc<AtomicUsize>,
}

impl Default for NullAudio {
    fn default() -> Self {
        Self::new()
    }
}

impl NullAudio {
    pub fn new() -> NullAudio {
        NullAudio::with_sample_rate(hw_specific::CAPTURE_SAMPLE_RATE)
    }

    pub fn with_sample_rate(sample_rate: u32) -> NullAudio {
        NullAudio {
            sample_rate,
            plays: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of `play()` calls so far, across all clones.
    pub fn play_count(&self) -> usize {
        self.plays.load(Ordering::Relaxed)
    }
}

impl AudioOutput for NullAudio {
    fn play(&self, sample: &Sample) -> Result<(), KeypadError> {
        self.plays.fetch_add(1, Ordering::Relaxed);
        info!(sample = sample.name(), "Playing (no audio device).");
        Ok(())
    }
}

impl AudioInput for NullAudio {
    fn capture(
        &self,
        duration: Duration,
        stop: &crossbeam_channel::Receiver<()>,
    ) -> Result<Sample, KeypadError> {
        let started = Instant::now();

        // Timeout, stop message, or disconnect: all mean we're done.
        let _ = stop.recv_timeout(duration);

        let captured = started.elapsed().min(duration);
        debug!(captured = ?captured, "Captured silence (no audio device).");
        Ok(Sample::silence("capture", captured, self.sample_rate))
    }
}
