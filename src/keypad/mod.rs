/*! Module for a Trellis keypad sample pad with a recorder and a looper.
 *
 * The Adafruit Trellis is a 4x4 grid of squishy keys with an LED
 * under each one, all driven by a single HT16K33 chip sitting on the
 * I2C bus. Ours hangs off a PocketBeagle (any small Linux board with
 * I2C will do), together with a couple of arcade buttons and a USB
 * microphone.
 *
 * # What this module does
 *
 * - Press a key, hear its sample. (`SoundBank` holds the samples.)
 *
 * - Press the record key, and for a few seconds we capture the
 *   microphone *and* the timing of whatever sample keys you press.
 *   That becomes a new "instrument", an `InstrumentSequence`, stored
 *   in the bottom-left key.
 *
 * - Press the loop key, and the instrument in the bottom-left key
 *   plays over and over in the background, until you press the loop
 *   key again.
 *
 * # Pieces
 *
 * - `InputSurface` is anything that can tell us which keys are down
 *   and can light indicators. The Trellis is one, GPIO arcade buttons
 *   are another, tests use fakes.
 *
 * - `AudioOutput` and `AudioInput` are the audio boundary. Playing is
 *   fire-and-forget, we never wait for a sound to finish.
 *
 * - `KeypadController` polls the surface at a fixed interval and
 *   dispatches.
 *
 * - `LoopPlayer` and `Recorder` each own at most one background
 *   thread, and both can be stopped and joined.
 *
 * Nothing here is a process-wide singleton. Everything gets handed
 * what it needs when it is created, so tests can build as many
 * isolated instances as they like.
 */

mod audio;
mod button;
mod config;
mod controller;
#[cfg(feature = "cpal")]
mod cpal_audio;
pub mod hw_specific;
mod keys;
mod leds;
mod loop_player;
mod loop_watch;
mod macros;
mod recorder;
mod sound_bank;
mod surface;
mod trellis;

use std::fmt;
use std::sync::{MutexGuard, PoisonError, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Instant, SystemTime};

use thiserror::Error;

pub use audio::{AudioInput, AudioOutput, NullAudio};
pub use button::{Button, ButtonPin, ButtonSurface};
pub use config::KeypadConfig;
pub use controller::{KeypadController, Phase, PollReport};
#[cfg(feature = "cpal")]
pub use cpal_audio::{CpalInput, CpalOutput};
pub use keys::KeyTracker;
pub use leds::{GpioLed, Indicator, NoIndicator};
pub use loop_player::{LoopPlayer, LoopState};
pub use loop_watch::LoopWatch;
pub use recorder::Recorder;
pub use sound_bank::{InstrumentSequence, Sample, SequenceEntry, SoundAsset, SoundBank};
pub use surface::{CompositeSurface, InputSurface};
pub use trellis::TrellisSurface;

#[derive(Error, Debug)]
pub enum KeypadError {
    #[error("nothing bound to key {key}")]
    NotFound { key: KeyId },

    #[error("already recording (started by key {trigger})")]
    AlreadyRecording { trigger: KeyId },

    #[error("not recording")]
    NotRecording,

    #[error(
        "Bad key location {bad_location:?}, (expected < hw_specific::NUM_KEYS, which is {})",
        hw_specific::NUM_KEYS
    )]
    BadKeyLocation { bad_location: KeyLocation },

    #[error("I2C failure talking to the keypad: {0}")]
    I2c(#[from] rppal::i2c::Error),

    #[error("GPIO failure: {0}")]
    Gpio(#[from] rppal::gpio::Error),

    #[error("could not load WAV file: {0}")]
    Wav(#[from] hound::Error),

    #[error("audio output failure: {0}")]
    Audio(String),

    #[error("audio capture failure: {0}")]
    Capture(String),
}

/// Stable identifier for one key, pad or button.
///
/// Trellis keys are numbered, arcade buttons and test keys get names.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyId {
    Index(usize),
    Name(String),
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyId::Index(index) => write!(f, "#{index}"),
            KeyId::Name(name) => write!(f, "{name}"),
        }
    }
}

impl From<usize> for KeyId {
    fn from(index: usize) -> Self {
        KeyId::Index(index)
    }
}

impl From<&str> for KeyId {
    fn from(name: &str) -> Self {
        KeyId::Name(name.to_string())
    }
}

impl From<String> for KeyId {
    fn from(name: String) -> Self {
        KeyId::Name(name)
    }
}

impl From<Point> for KeyId {
    /// Coordinates outside the grid still make a key id, it just
    /// won't be bound to anything.
    fn from(coordinate: Point) -> Self {
        match coord_to_index(coordinate) {
            Ok(index) => KeyId::Index(index),
            Err(_) => KeyId::Name(format!("({},{})", coordinate.x, coordinate.y)),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Point {
    pub x: usize,
    pub y: usize,
}

#[derive(Debug, Clone)]
pub enum KeyLocation {
    Coordinate(Point),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPosition {
    /// Key is not being pressed.
    Up,

    /// Key is being pressed down.
    Down,
}

#[derive(Debug, Clone)]
/// One of these gets produced for every press and every release seen
/// between two consecutive polls.
pub struct KeyEvent {
    /// Which key.
    pub key: KeyId,

    /// Whether the key just went down or just came up.
    pub key_position: KeyPosition,

    /// When the key went down, as an `Instant`.
    pub press_instant: Instant,

    /// When the key came up, `None` while it is still down.
    pub release_instant: Option<Instant>,

    /// When the event was noticed, as a `SystemTime`.
    pub event_systime: SystemTime,

    /// Incrementing event serial number.
    pub event_num: usize,
}

/// Look up (x,y) and get back key/LED index.
pub fn coord_to_index(coordinate: Point) -> Result<usize, KeypadError> {
    let two_d_array = HardwareInfo::get_info().xy_to_index_lookup;

    if coordinate.x >= two_d_array.len() || coordinate.y >= two_d_array[0].len() {
        Err(KeypadError::BadKeyLocation {
            bad_location: KeyLocation::Coordinate(coordinate),
        })
    } else {
        Ok(two_d_array[coordinate.x][coordinate.y])
    }
}

#[derive(Debug)]
pub struct HardwareInfo {
    /// Name of hardware model.
    pub name: &'static str,

    /// Number of keys in keypad.
    pub num_keys: usize,

    /// Number of LEDs in keypad (the same as `num_keys` on a Trellis).
    pub num_leds: usize,

    /// Default 7-bit I2C address of the HT16K33.
    pub i2c_address: u16,

    /// Key index (array index) to HT16K33 key-scan bit (array value).
    pub key_index_to_scan_bit: [u8; hw_specific::NUM_KEYS],

    /// Key index (array index) to HT16K33 display RAM bit (array value).
    pub led_index_to_ram_bit: [u8; hw_specific::NUM_LEDS],

    /// 2D array to map from (X,Y) to key/LED index.
    pub xy_to_index_lookup: [[usize; 4]; 4],

    /// Human-readable description of hardware.
    pub layout_text: &'static str,
}

/// An alternative to calling a generic `.unwrap()`, this is something
/// that can't accidentally be applied to an `Option` or the wrong
/// kind of `Result`.
///
/// ```text
/// some_mutex.lock().unwrap_or_else(mutex_poison);
/// ```
///
/// This will only work against a `MutexGuard`.
#[allow(clippy::needless_pass_by_value)]
fn mutex_poison<T>(g: PoisonError<MutexGuard<'_, T>>) -> MutexGuard<'_, T> {
    panic!("mutex poisoned {g:?}")
}

/// Same idea as `mutex_poison()`, for a `RwLockWriteGuard`.
#[allow(clippy::needless_pass_by_value)]
fn write_poison<T>(g: PoisonError<RwLockWriteGuard<'_, T>>) -> RwLockWriteGuard<'_, T> {
    panic!("rwlock poisoned {g:?}")
}

/// Same idea as `mutex_poison()`, for a `RwLockReadGuard`.
#[allow(clippy::needless_pass_by_value)]
fn read_poison<T>(g: PoisonError<RwLockReadGuard<'_, T>>) -> RwLockReadGuard<'_, T> {
    panic!("rwlock poisoned {g:?}")
}
