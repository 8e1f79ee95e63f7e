use std::collections::BTreeSet;

use rppal::i2c::I2c;
use tracing::{info, warn};

use crate::keypad::{hw_specific, HardwareInfo, InputSurface, KeyId, KeypadError};

/// HT16K33 commands. Each is a single byte written to the chip.
const OSCILLATOR_ON: u8 = 0x21;
const DISPLAY_ON_NO_BLINK: u8 = 0x81;
const BRIGHTNESS_MAX: u8 = 0xE0 | 0x0F;
const INTERRUPT_ACTIVE_HIGH: u8 = 0xA1;
const KEY_SCAN_ADDRESS: u8 = 0x40;
const DISPLAY_RAM_ADDRESS: u8 = 0x00;

/// Key-scan RAM, read as bytes.
const KEY_SCAN_BYTES: usize = 6;

/// Eight 16-bit display RAM words, low byte first, after the address byte.
const DISPLAY_WRITE_BYTES: usize = 1 + 16;

/// The Trellis, talked to over I2C.
///
/// The HT16K33 does its own key scanning (and debouncing, it wants
/// two matching scans before it believes a key). We just read its
/// key-scan RAM on each poll. LEDs are set in an off-screen copy and
/// the whole display RAM rewritten whenever one changes.
pub struct TrellisSurface {
    i2c: I2c,
    leds: [bool; hw_specific::NUM_LEDS],
}

impl TrellisSurface {
    /// Open the Trellis at `address` on I2C `bus` and wake it up, with
    /// all LEDs off.
    pub fn new(bus: u8, address: u16) -> Result<TrellisSurface, KeypadError> {
        let mut i2c = I2c::with_bus(bus)?;
        i2c.set_slave_address(address)?;

        for command in [
            OSCILLATOR_ON,
            DISPLAY_ON_NO_BLINK,
            BRIGHTNESS_MAX,
            INTERRUPT_ACTIVE_HIGH,
        ] {
            i2c.write(&[command])?;
        }

        let mut trellis = TrellisSurface {
            i2c,
            leds: [false; hw_specific::NUM_LEDS],
        };
        trellis.show_leds()?;

        info!(
            bus,
            address = %format!("{address:#04x}"),
            hardware = HardwareInfo::get_info().name,
            "Trellis ready."
        );
        Ok(trellis)
    }

    /// Copy the off-screen LED state to the physical LEDs.
    pub fn show_leds(&mut self) -> Result<(), KeypadError> {
        self.i2c.write(&encode_leds(&self.leds))?;
        Ok(())
    }

    fn show_leds_or_warn(&mut self) {
        if let Err(e) = self.show_leds() {
            warn!("Trellis LED update failed: {e}");
        }
    }
}

impl InputSurface for TrellisSurface {
    fn poll(&mut self) -> Result<BTreeSet<KeyId>, KeypadError> {
        let mut scan = [0_u8; KEY_SCAN_BYTES];
        self.i2c.write_read(&[KEY_SCAN_ADDRESS], &mut scan)?;

        Ok(decode_keys(&scan)
            .iter()
            .enumerate()
            .filter(|(_, down)| **down)
            .map(|(index, _)| KeyId::Index(index))
            .collect())
    }

    fn set_indicator(&mut self, key: &KeyId, on: bool) {
        if let KeyId::Index(index) = key {
            if *index < hw_specific::NUM_LEDS && self.leds[*index] != on {
                self.leds[*index] = on;
                self.show_leds_or_warn();
            }
        }
    }

    fn set_all_indicators(&mut self, on: bool) {
        self.leds = [on; hw_specific::NUM_LEDS];
        self.show_leds_or_warn();
    }
}

/// Key-scan RAM to which keys are down, indexed by key.
///
/// Unlike display RAM, the key-scan lookup table addresses bytes: the
/// upper nibble is the byte, the lower nibble the bit within it.
pub(crate) fn decode_keys(scan: &[u8; KEY_SCAN_BYTES]) -> [bool; hw_specific::NUM_KEYS] {
    let scan_bits = HardwareInfo::get_info().key_index_to_scan_bit;
    std::array::from_fn(|key| {
        let bit = scan_bits[key];
        scan[usize::from(bit >> 4)] & (1 << (bit & 0x0F)) != 0
    })
}

/// LED state to the bytes that rewrite all of display RAM, address
/// byte first.
pub(crate) fn encode_leds(leds: &[bool; hw_specific::NUM_LEDS]) -> [u8; DISPLAY_WRITE_BYTES] {
    let mut words = [0_u16; 8];
    let ram_bits = HardwareInfo::get_info().led_index_to_ram_bit;
    for (index, lit) in leds.iter().enumerate() {
        if *lit {
            let bit = ram_bits[index];
            words[usize::from(bit >> 4)] |= 1 << (bit & 0x0F);
        }
    }

    let mut bytes = [0_u8; DISPLAY_WRITE_BYTES];
    bytes[0] = DISPLAY_RAM_ADDRESS;
    for (word_index, word) in words.iter().enumerate() {
        let [low, high] = word.to_le_bytes();
        bytes[1 + 2 * word_index] = low;
        bytes[2 + 2 * word_index] = high;
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nothing_scanned_nothing_down() {
        assert_eq!(decode_keys(&[0; KEY_SCAN_BYTES]), [false; hw_specific::NUM_KEYS]);
    }

    #[test]
    fn scan_bits_map_to_keys() {
        // Key 0 is byte 0 bit 7, key 3 is byte 2 bit 2.
        let mut scan = [0_u8; KEY_SCAN_BYTES];
        scan[0] = 0x80;
        scan[2] = 0x04;

        let down = decode_keys(&scan);
        let down_keys: Vec<usize> = (0..hw_specific::NUM_KEYS).filter(|k| down[*k]).collect();
        assert_eq!(down_keys, vec![0, 3]);
    }

    #[test]
    fn every_key_has_its_own_scan_bit() {
        let mut scan = [0xFF_u8; KEY_SCAN_BYTES];
        assert_eq!(decode_keys(&scan), [true; hw_specific::NUM_KEYS]);

        // Key 15 is byte 3 bit 1, and only key 15.
        scan = [0; KEY_SCAN_BYTES];
        scan[3] = 0x02;
        let down = decode_keys(&scan);
        assert!(down[15]);
        assert_eq!(down.iter().filter(|d| **d).count(), 1);
    }

    #[test]
    fn led_bits_land_in_display_ram() {
        let mut leds = [false; hw_specific::NUM_LEDS];
        leds[15] = true; // 0x02: word 0 bit 2
        leds[0] = true; // 0x3A: word 3 bit 10

        let bytes = encode_leds(&leds);
        assert_eq!(bytes[0], DISPLAY_RAM_ADDRESS);
        assert_eq!(bytes[1], 0x04);
        assert_eq!(bytes[8], 0x04);
        assert_eq!(bytes.iter().skip(1).filter(|b| **b != 0).count(), 2);
    }
}
