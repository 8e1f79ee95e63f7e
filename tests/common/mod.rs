#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use keypad_looper::keypad::{
    AudioInput, AudioOutput, ButtonPin, Indicator, InputSurface, KeyId, KeypadConfig, KeypadError,
    Sample,
};

/// Audio output that remembers the name of everything it was asked to play.
#[derive(Default)]
pub struct RecordingAudio {
    played: Mutex<Vec<String>>,
}

impl RecordingAudio {
    pub fn played(&self) -> Vec<String> {
        self.played.lock().unwrap().clone()
    }
}

impl AudioOutput for RecordingAudio {
    fn play(&self, sample: &Sample) -> Result<(), KeypadError> {
        self.played.lock().unwrap().push(sample.name().to_string());
        Ok(())
    }
}

/// An unplugged speaker.
pub struct FailingAudio;

impl AudioOutput for FailingAudio {
    fn play(&self, _sample: &Sample) -> Result<(), KeypadError> {
        Err(KeypadError::Audio("device unplugged".to_string()))
    }
}

/// An unplugged microphone.
pub struct FailingInput;

impl AudioInput for FailingInput {
    fn capture(
        &self,
        _duration: Duration,
        _stop: &crossbeam_channel::Receiver<()>,
    ) -> Result<Sample, KeypadError> {
        Err(KeypadError::Capture("no microphone".to_string()))
    }
}

/// Keys are whatever the test says is held. Remembers indicator calls.
#[derive(Default)]
pub struct FakeSurface {
    pub held: BTreeSet<KeyId>,
    pub lit: BTreeMap<KeyId, bool>,
    pub all_calls: Vec<bool>,
    pub fail_reads: bool,
}

impl FakeSurface {
    pub fn hold(&mut self, names: &[&str]) {
        self.held = keys(names);
    }

    pub fn is_lit(&self, name: &str) -> bool {
        self.lit.get(&KeyId::from(name)).copied().unwrap_or(false)
    }
}

impl InputSurface for FakeSurface {
    fn poll(&mut self) -> Result<BTreeSet<KeyId>, KeypadError> {
        if self.fail_reads {
            return Err(KeypadError::Capture("I2C bus fell off".to_string()));
        }
        Ok(self.held.clone())
    }

    fn set_indicator(&mut self, key: &KeyId, on: bool) {
        self.lit.insert(key.clone(), on);
    }

    fn set_all_indicators(&mut self, on: bool) {
        self.all_calls.push(on);
        for value in self.lit.values_mut() {
            *value = on;
        }
    }
}

/// An LED the test can look at from the outside.
#[derive(Clone, Default)]
pub struct SharedLed(pub Arc<AtomicBool>);

impl Indicator for SharedLed {
    fn set(&mut self, on: bool) {
        self.0.store(on, Ordering::SeqCst);
    }

    fn is_on(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A GPIO line that reads a script of levels, then stays on the last one.
#[derive(Clone)]
pub struct ScriptedPin {
    levels: Arc<Mutex<VecDeque<bool>>>,
    last: Arc<Mutex<bool>>,
}

impl ScriptedPin {
    pub fn new(levels: &[bool]) -> ScriptedPin {
        ScriptedPin {
            levels: Arc::new(Mutex::new(levels.iter().copied().collect())),
            last: Arc::new(Mutex::new(*levels.last().unwrap_or(&true))),
        }
    }

    pub fn set(&self, high: bool) {
        self.levels.lock().unwrap().clear();
        *self.last.lock().unwrap() = high;
    }
}

impl ButtonPin for ScriptedPin {
    fn is_high(&self) -> bool {
        match self.levels.lock().unwrap().pop_front() {
            Some(level) => level,
            None => *self.last.lock().unwrap(),
        }
    }
}

pub fn keys(names: &[&str]) -> BTreeSet<KeyId> {
    names.iter().map(|name| KeyId::from(*name)).collect()
}

/// A tiny sample, 10 ms at 1 kHz.
pub fn sample(name: &str) -> Sample {
    Sample::new(name, vec![0.25; 10], 1000, 1)
}

/// Named keys and short timings, so tests don't take all day.
pub fn fast_config() -> KeypadConfig {
    KeypadConfig {
        poll_interval: Duration::from_millis(10),
        boot_flash: Duration::from_millis(10),
        capture_duration: Duration::from_millis(300),
        loop_rest: Duration::from_millis(5),
        loop_key: KeyId::from("loop"),
        record_key: KeyId::from("rec1"),
        instrument_slot: KeyId::from("slot"),
        retrigger_held: false,
    }
}
