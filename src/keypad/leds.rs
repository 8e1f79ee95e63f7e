use rppal::gpio::{Gpio, OutputPin};

use crate::keypad::KeypadError;

/// A single on/off light, such as the LED in the record arcade
/// button. Setting it is fire-and-forget.
pub trait Indicator: Send {
    fn set(&mut self, on: bool);

    fn is_on(&self) -> bool;
}

#[derive(Debug)]
/// An LED hanging off a GPIO pin, lit when the pin is high.
pub struct GpioLed {
    pin: OutputPin,
}

impl GpioLed {
    /// Claim GPIO `pin_num` as an output, starting dark.
    pub fn new(gpio: &Gpio, pin_num: u8) -> Result<GpioLed, KeypadError> {
        Ok(GpioLed {
            pin: gpio.get(pin_num)?.into_output_low(),
        })
    }
}

impl Indicator for GpioLed {
    fn set(&mut self, on: bool) {
        if on {
            self.pin.set_high();
        } else {
            self.pin.set_low();
        }
    }

    fn is_on(&self) -> bool {
        self.pin.is_set_high()
    }
}

#[derive(Debug, Default, Clone, Copy)]
/// For when there is no LED wired up. Remembers what it was told.
pub struct NoIndicator {
    on: bool,
}

impl Indicator for NoIndicator {
    fn set(&mut self, on: bool) {
        self.on = on;
    }

    fn is_on(&self) -> bool {
        self.on
    }
}
