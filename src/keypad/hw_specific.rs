use static_assertions::const_assert;

use crate::keypad::HardwareInfo;

pub const HARDWARE_NAME: &str = "Adafruit Trellis 4x4 keypad (HT16K33), PocketBeagle";

pub const NUM_KEYS: usize = 16;
pub const NUM_LEDS: usize = NUM_KEYS;

/// 7-bit address with no address jumpers soldered.
pub const DEFAULT_I2C_ADDRESS: u16 = 0x70;

/// Which I2C bus the Trellis is on. PocketBeagle P2.09/P2.11 is bus 1.
pub const DEFAULT_I2C_BUS: u8 = 1;

/// Key index to HT16K33 key-scan bit. The upper nibble is which
/// key-scan byte, the lower nibble the bit within it.
const KEY_INDEX_TO_SCAN_BIT: [u8; NUM_KEYS] = [
    0x07, 0x04, 0x02, 0x22, 0x05, 0x06, 0x00, 0x01, 0x03, 0x10, 0x30, 0x21, 0x13, 0x12, 0x11, 0x31,
];

/// LED index to HT16K33 display RAM bit. Here the upper nibble picks
/// a 16-bit display word, not a byte.
const LED_INDEX_TO_RAM_BIT: [u8; NUM_LEDS] = [
    0x3A, 0x37, 0x35, 0x34, 0x28, 0x29, 0x23, 0x24, 0x16, 0x1B, 0x11, 0x10, 0x0E, 0x0D, 0x0C, 0x02,
];

/// 2D array to map from (X,Y) to key/LED index.
const XY_TO_INDEX_LOOKUP: [[usize; 4]; 4] = [[0, 4, 8, 12], [1, 5, 9, 13], [2, 6, 10, 14], [3, 7, 11, 15]];

/// Bottom-left key, where a finished recording gets stored.
pub const INSTRUMENT_SLOT: usize = 12;

/// Press to start recording, press again to stop early.
pub const RECORD_KEY: usize = 14;

/// Press to start the loop, press again to stop it.
pub const LOOP_KEY: usize = 15;

pub const POLL_INTERVAL_MS: u64 = 100;
pub const BOOT_FLASH_MS: u64 = 500;
pub const CAPTURE_SECS: u64 = 5;
pub const CAPTURE_SAMPLE_RATE: u32 = 44_100;

/// Samples that come with the keypad, key index to file name.
pub const DEFAULT_SOUND_FILES: [(usize, &str); 11] = [
    (0, "bass_1.wav"),
    (1, "bass_2.wav"),
    (2, "bass_3.wav"),
    (3, "snare_1.wav"),
    (4, "snare_2.wav"),
    (5, "synth_1.wav"),
    (6, "synth_2.wav"),
    (7, "hihat_1.wav"),
    (8, "loop_1.wav"),
    (9, "voice_1.wav"),
    (10, "voice_2.wav"),
];

const LAYOUT_TEXT: &str = "
     00  01  02  03
     04  05  06  07
     08  09  10  11
     12  13  14  15
     ^       ^   ^
     |       |   loop
     |       record
     recorded instrument
";

const_assert!(LOOP_KEY < NUM_KEYS);
const_assert!(RECORD_KEY < NUM_KEYS);
const_assert!(LOOP_KEY != RECORD_KEY);
const_assert!(INSTRUMENT_SLOT != LOOP_KEY && INSTRUMENT_SLOT != RECORD_KEY);
const_assert!(XY_TO_INDEX_LOOKUP[0][3] == INSTRUMENT_SLOT);
const_assert!(DEFAULT_SOUND_FILES.len() < INSTRUMENT_SLOT);

/** Hardware specific information should be contained to this file.
 *
 *  Keypad numbering:
 *
 *  ```text
 *     00  01  02  03
 *     04  05  06  07
 *     08  09  10  11
 *     12  13  14  15
 *  ```
 *
 *  The four-pin I2C header is along the top edge.
 */
impl HardwareInfo {
    pub const fn get_info() -> HardwareInfo {
        HardwareInfo {
            name: HARDWARE_NAME,
            num_keys: NUM_KEYS,
            num_leds: NUM_LEDS,
            i2c_address: DEFAULT_I2C_ADDRESS,
            key_index_to_scan_bit: KEY_INDEX_TO_SCAN_BIT,
            led_index_to_ram_bit: LED_INDEX_TO_RAM_BIT,
            xy_to_index_lookup: XY_TO_INDEX_LOOKUP,
            layout_text: LAYOUT_TEXT,
        }
    }
}
