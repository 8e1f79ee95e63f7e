use std::collections::BTreeSet;

use crate::keypad::{KeyId, KeypadError};

/// Anything that has keys we can read and lights we can set.
///
/// `poll()` takes one sample of the hardware and returns immediately.
/// It reports levels (what is down right now), turning those into
/// presses and releases is `KeyTracker`'s job.
///
/// Indicator calls are fire-and-forget. A surface that has no light
/// for a key just ignores it.
pub trait InputSurface: Send {
    /// Keys currently down. Empty set if none.
    ///
    /// # Errors
    ///
    /// A failed hardware read. Without key input there is nothing we
    /// can do, so the poll loop treats this as fatal.
    fn poll(&mut self) -> Result<BTreeSet<KeyId>, KeypadError>;

    fn set_indicator(&mut self, key: &KeyId, on: bool);

    fn set_all_indicators(&mut self, on: bool);
}

impl<T: InputSurface + ?Sized> InputSurface for Box<T> {
    fn poll(&mut self) -> Result<BTreeSet<KeyId>, KeypadError> {
        (**self).poll()
    }

    fn set_indicator(&mut self, key: &KeyId, on: bool) {
        (**self).set_indicator(key, on);
    }

    fn set_all_indicators(&mut self, on: bool) {
        (**self).set_all_indicators(on);
    }
}

#[derive(Default)]
/// Several surfaces acting as one, say the Trellis plus a couple of
/// arcade buttons. Polls are merged, indicator calls go to everyone.
pub struct CompositeSurface {
    surfaces: Vec<Box<dyn InputSurface>>,
}

impl CompositeSurface {
    pub fn new() -> CompositeSurface {
        CompositeSurface::default()
    }

    pub fn with(mut self, surface: impl InputSurface + 'static) -> CompositeSurface {
        self.surfaces.push(Box::new(surface));
        self
    }

    pub fn push(&mut self, surface: Box<dyn InputSurface>) {
        self.surfaces.push(surface);
    }

    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }
}

impl InputSurface for CompositeSurface {
    /// Any one surface failing fails the whole poll.
    fn poll(&mut self) -> Result<BTreeSet<KeyId>, KeypadError> {
        let mut pressed = BTreeSet::new();
        for surface in &mut self.surfaces {
            pressed.append(&mut surface.poll()?);
        }
        Ok(pressed)
    }

    fn set_indicator(&mut self, key: &KeyId, on: bool) {
        for surface in &mut self.surfaces {
            surface.set_indicator(key, on);
        }
    }

    fn set_all_indicators(&mut self, on: bool) {
        for surface in &mut self.surfaces {
            surface.set_all_indicators(on);
        }
    }
}
