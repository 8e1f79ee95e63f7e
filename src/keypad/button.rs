use std::collections::BTreeSet;
use std::thread;
use std::time::{Duration, Instant};

use rppal::gpio::{Gpio, InputPin};

use crate::keypad::{hw_specific, InputSurface, KeyId, KeypadError};

/// A GPIO line a button is wired to.
pub trait ButtonPin: Send {
    fn is_high(&self) -> bool;
}

impl ButtonPin for InputPin {
    fn is_high(&self) -> bool {
        InputPin::is_high(self)
    }
}

/// Something to call at one of the points in a button press cycle.
/// Whatever it returns is kept, see e.g. `pressed_callback_value()`.
pub type ButtonCallback<V> = Box<dyn FnMut() -> V + Send>;

/// One push button on a GPIO pin, such as the loop and record arcade
/// buttons.
///
/// Buttons are wired one of two ways:
///
/// - Pull-up resistor, button shorts the pin to ground. The pin reads
///   high when not pressed, low when pressed. `press_low = true`.
///
/// - Pull-down resistor, button connects the pin to power. Low when
///   not pressed, high when pressed. `press_low = false`.
///
/// `wait_for_press()` polls every `sleep_time`, and along the way
/// calls any of four optional callbacks:
///
/// - "unpressed", every poll while waiting for the press,
/// - "on press", once, when the press is seen,
/// - "pressed", every poll while waiting for the release,
/// - "on release", once, when the release is seen.
///
/// All of them are called synchronously, on the thread that called
/// `wait_for_press()`.
pub struct Button<P, V = ()> {
    pin: P,
    press_low: bool,
    sleep_time: Duration,
    press_duration: Duration,

    pressed_callback: Option<ButtonCallback<V>>,
    pressed_callback_value: Option<V>,
    unpressed_callback: Option<ButtonCallback<V>>,
    unpressed_callback_value: Option<V>,
    on_press_callback: Option<ButtonCallback<V>>,
    on_press_callback_value: Option<V>,
    on_release_callback: Option<ButtonCallback<V>>,
    on_release_callback_value: Option<V>,
}

impl<V> Button<InputPin, V> {
    /// Claim GPIO `pin_num` for a button, turning on the internal
    /// pull resistor that matches the wiring.
    pub fn from_gpio(gpio: &Gpio, pin_num: u8, press_low: bool) -> Result<Self, KeypadError> {
        let pin = gpio.get(pin_num)?;
        let pin = if press_low {
            pin.into_input_pullup()
        } else {
            pin.into_input_pulldown()
        };
        Ok(Button::new(pin, press_low))
    }
}

impl<P: ButtonPin, V> Button<P, V> {
    pub fn new(pin: P, press_low: bool) -> Self {
        Button {
            pin,
            press_low,
            sleep_time: Duration::from_millis(hw_specific::POLL_INTERVAL_MS),
            press_duration: Duration::ZERO,
            pressed_callback: None,
            pressed_callback_value: None,
            unpressed_callback: None,
            unpressed_callback_value: None,
            on_press_callback: None,
            on_press_callback_value: None,
            on_release_callback: None,
            on_release_callback_value: None,
        }
    }

    /// How long `wait_for_press()` sleeps between looks at the pin.
    pub fn with_sleep_time(mut self, sleep_time: Duration) -> Self {
        self.sleep_time = sleep_time;
        self
    }

    /// Takes no time.
    pub fn is_pressed(&self) -> bool {
        self.pin.is_high() != self.press_low
    }

    /// Block until the button has been pressed *and* released, so
    /// there is no race with the next call. Returns how long it was
    /// held down.
    pub fn wait_for_press(&mut self) -> Duration {
        while !self.is_pressed() {
            Self::call(&mut self.unpressed_callback, &mut self.unpressed_callback_value);
            thread::sleep(self.sleep_time);
        }

        let press_instant = Instant::now();
        Self::call(&mut self.on_press_callback, &mut self.on_press_callback_value);

        while self.is_pressed() {
            Self::call(&mut self.pressed_callback, &mut self.pressed_callback_value);
            thread::sleep(self.sleep_time);
        }

        self.press_duration = press_instant.elapsed();
        Self::call(&mut self.on_release_callback, &mut self.on_release_callback_value);

        self.press_duration
    }

    fn call(callback: &mut Option<ButtonCallback<V>>, value: &mut Option<V>) {
        if let Some(callback) = callback {
            *value = Some(callback());
        }
    }

    /// How long the button was held the last time `wait_for_press()`
    /// saw it. Zero before the first press.
    pub fn last_press_duration(&self) -> Duration {
        self.press_duration
    }

    /// Called every `sleep_time` while the button is held.
    pub fn set_pressed_callback(&mut self, callback: impl FnMut() -> V + Send + 'static) {
        self.pressed_callback = Some(Box::new(callback));
    }

    pub fn pressed_callback_value(&self) -> Option<&V> {
        self.pressed_callback_value.as_ref()
    }

    /// Called every `sleep_time` while waiting for a press.
    pub fn set_unpressed_callback(&mut self, callback: impl FnMut() -> V + Send + 'static) {
        self.unpressed_callback = Some(Box::new(callback));
    }

    pub fn unpressed_callback_value(&self) -> Option<&V> {
        self.unpressed_callback_value.as_ref()
    }

    /// Called once when the press is seen.
    pub fn set_on_press_callback(&mut self, callback: impl FnMut() -> V + Send + 'static) {
        self.on_press_callback = Some(Box::new(callback));
    }

    pub fn on_press_callback_value(&self) -> Option<&V> {
        self.on_press_callback_value.as_ref()
    }

    /// Called once when the release is seen.
    pub fn set_on_release_callback(&mut self, callback: impl FnMut() -> V + Send + 'static) {
        self.on_release_callback = Some(Box::new(callback));
    }

    pub fn on_release_callback_value(&self) -> Option<&V> {
        self.on_release_callback_value.as_ref()
    }
}

/// A handful of named buttons as an `InputSurface`. They have no
/// lights, so indicator calls do nothing.
pub struct ButtonSurface<P: ButtonPin = InputPin> {
    buttons: Vec<(KeyId, Button<P>)>,
}

impl<P: ButtonPin> Default for ButtonSurface<P> {
    fn default() -> Self {
        ButtonSurface {
            buttons: Vec::new(),
        }
    }
}

impl<P: ButtonPin> ButtonSurface<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pressing `button` will report `key`.
    pub fn add(&mut self, key: KeyId, button: Button<P>) {
        self.buttons.push((key, button));
    }

    pub fn len(&self) -> usize {
        self.buttons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buttons.is_empty()
    }
}

impl<P: ButtonPin> InputSurface for ButtonSurface<P> {
    fn poll(&mut self) -> Result<BTreeSet<KeyId>, KeypadError> {
        Ok(self
            .buttons
            .iter()
            .filter(|(_, button)| button.is_pressed())
            .map(|(key, _)| key.clone())
            .collect())
    }

    fn set_indicator(&mut self, _key: &KeyId, _on: bool) {}

    fn set_all_indicators(&mut self, _on: bool) {}
}
