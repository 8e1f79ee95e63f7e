use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant, SystemTime};

use crate::keypad::{KeyEvent, KeyId, KeyPosition};

#[derive(Debug, Default)]
/// Turns a series of "which keys are down right now" polls into press
/// and release events.
///
/// The hardware gives us levels, not edges. If we acted on levels, a
/// key held across three polls would look like three presses. So we
/// remember what was down last time and only report changes:
///
/// - down now, not down last poll: `KeyPosition::Down` event.
/// - down last poll, not down now: `KeyPosition::Up` event, carrying
///   the original press time, so the caller knows how long it was held.
/// - down both times: nothing.
pub struct KeyTracker {
    /// Keys down as of the last poll, and when each went down.
    held: BTreeMap<KeyId, Instant>,

    /// Number of events produced so far.
    event_count: usize,
}

impl KeyTracker {
    pub fn new() -> KeyTracker {
        KeyTracker::default()
    }

    /// Feed in one poll's worth of pressed keys, get back what changed.
    pub fn update(&mut self, pressed: &BTreeSet<KeyId>) -> Vec<KeyEvent> {
        self.update_at(pressed, Instant::now())
    }

    /// Same as `update()`, with the poll time supplied by the caller.
    ///
    /// Releases are reported before presses, each group in key order.
    pub fn update_at(&mut self, pressed: &BTreeSet<KeyId>, now: Instant) -> Vec<KeyEvent> {
        let mut events = Vec::new();
        let systime = SystemTime::now();

        let released: Vec<KeyId> = self
            .held
            .keys()
            .filter(|key| !pressed.contains(*key))
            .cloned()
            .collect();

        for key in released {
            if let Some(press_instant) = self.held.remove(&key) {
                crate::debug_waveform!("‾{} ", key);
                self.event_count += 1;
                events.push(KeyEvent {
                    key,
                    key_position: KeyPosition::Up,
                    press_instant,
                    release_instant: Some(now),
                    event_systime: systime,
                    event_num: self.event_count,
                });
            }
        }

        for key in pressed {
            if self.held.contains_key(key) {
                crate::debug_waveform!("={} ", key);
                continue;
            }
            crate::debug_waveform!("_{} ", key);
            self.held.insert(key.clone(), now);
            self.event_count += 1;
            events.push(KeyEvent {
                key: key.clone(),
                key_position: KeyPosition::Down,
                press_instant: now,
                release_instant: None,
                event_systime: systime,
                event_num: self.event_count,
            });
        }

        if !events.is_empty() {
            crate::debug_waveform!(":\n");
        }

        events
    }

    /// Is this key down as of the last poll?
    pub fn is_held(&self, key: &KeyId) -> bool {
        self.held.contains_key(key)
    }

    /// Keys down as of the last poll.
    pub fn held_keys(&self) -> impl Iterator<Item = &KeyId> {
        self.held.keys()
    }

    /// How long a key has been down, if it is down.
    pub fn held_for(&self, key: &KeyId, now: Instant) -> Option<Duration> {
        self.held
            .get(key)
            .map(|pressed_at| now.saturating_duration_since(*pressed_at))
    }

    /// Forget everything, next poll reports every down key as a press.
    pub fn reset(&mut self) {
        self.held.clear();
    }
}
