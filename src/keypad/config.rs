use std::time::Duration;

use crate::keypad::{hw_specific, KeyId};

#[derive(Debug, Clone)]
/// Knobs for `KeypadController`. `Default` is the stock Trellis
/// layout and timings from `hw_specific`.
pub struct KeypadConfig {
    /// Time between polls of the keys.
    pub poll_interval: Duration,

    /// How long all the lights stay on at boot.
    pub boot_flash: Duration,

    /// Longest a recording runs before finishing by itself.
    pub capture_duration: Duration,

    /// How long the loop thread waits before looking at an empty
    /// instrument slot again.
    pub loop_rest: Duration,

    /// Press to start or stop the loop.
    pub loop_key: KeyId,

    /// Press to start recording, press again to stop early.
    pub record_key: KeyId,

    /// Where finished recordings get stored, and what the loop plays.
    pub instrument_slot: KeyId,

    /// Replay a held key's sound on every poll, not just when it goes
    /// down.
    pub retrigger_held: bool,
}

impl Default for KeypadConfig {
    fn default() -> Self {
        KeypadConfig {
            poll_interval: Duration::from_millis(hw_specific::POLL_INTERVAL_MS),
            boot_flash: Duration::from_millis(hw_specific::BOOT_FLASH_MS),
            capture_duration: Duration::from_secs(hw_specific::CAPTURE_SECS),
            loop_rest: Duration::from_millis(hw_specific::POLL_INTERVAL_MS),
            loop_key: KeyId::Index(hw_specific::LOOP_KEY),
            record_key: KeyId::Index(hw_specific::RECORD_KEY),
            instrument_slot: KeyId::Index(hw_specific::INSTRUMENT_SLOT),
            retrigger_held: false,
        }
    }
}
