//! Trellis sample pad with a recorder and a looper. See the `keypad`
//! module.

pub mod keypad;
