/*!

# Trellis Sample Pad

A 4x4 Adafruit Trellis keypad, a PocketBeagle, a USB microphone, a
little speaker and two arcade buttons. Press a pad, hear a sample.
Press record, play something, and a few seconds later it becomes a
new instrument on the bottom-left pad. Press loop and that instrument
plays round and round underneath whatever else you are doing.

This started as a pile of small scripts, each a thin wrapper around
some library, with a shared dictionary here and a bare thread there.
It worked, mostly. Rewriting it in Rust forced all the questions the
scripts never had to answer: who owns the sound map, who owns the loop
flag, what happens when you hold the loop key for three polls, what
happens when you stop a loop that is halfway through a long sleep.

## Lay of the Land

- The Trellis is an HT16K33 on I2C. It scans its own keys; we read the
  key-scan RAM every poll, and write display RAM to set the LEDs.

- Arcade buttons, if wired up, are plain GPIO inputs. The record
  button's LED is a GPIO output.

- Audio is `cpal` (build with `--features cpal`). Without it, or
  without a sound card, everything still runs, it just logs what it
  would have played.

Hardware access is through [rppal](https://docs.rs/rppal/latest/rppal/),
which is written for the Raspberry Pi, though the I2C and GPIO
character devices it uses are plain Linux.

## Threads

- The poll loop, which is the main thread's blocking task. It never
  waits on audio.

- The loop thread, while the loop plays. It sleeps on a channel, so
  stopping it is immediate, and stopping waits for it to exit.

- The capture thread, while recording.

- Whatever threads cpal wants.

## Running

```text
keypad-looper --sounds-dir /home/debian/sounds --record-button-pin 26 --record-led-pin 27
```

`RUST_LOG=debug` for more chatter. Ctrl-C to quit; the loop is stopped,
any recording in progress is kept, and the lights go out.

 */

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use rppal::gpio::Gpio;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use keypad_looper::keypad::{
    self, hw_specific, AudioInput, AudioOutput, Button, ButtonSurface, CompositeSurface, GpioLed,
    HardwareInfo, KeypadConfig, KeypadController, SoundBank, TrellisSurface,
};

#[derive(Parser, Debug)]
#[command(version, about = "Trellis keypad sample pad, recorder and looper.")]
struct Cli {
    /// Directory holding the samples (bass_1.wav, snare_1.wav, ...).
    #[arg(long, default_value = ".")]
    sounds_dir: PathBuf,

    /// I2C bus the Trellis is on.
    #[arg(long, default_value_t = hw_specific::DEFAULT_I2C_BUS)]
    i2c_bus: u8,

    /// Trellis I2C address, decimal or 0x-prefixed hex.
    #[arg(long, default_value = "0x70", value_parser = parse_address)]
    address: u16,

    /// Milliseconds between polls of the keys.
    #[arg(long, default_value_t = hw_specific::POLL_INTERVAL_MS)]
    poll_ms: u64,

    /// Longest a recording runs, in seconds.
    #[arg(long, default_value_t = hw_specific::CAPTURE_SECS)]
    capture_secs: u64,

    /// GPIO pin of an arcade button that works like the loop key.
    #[arg(long)]
    loop_button_pin: Option<u8>,

    /// GPIO pin of an arcade button that works like the record key.
    #[arg(long)]
    record_button_pin: Option<u8>,

    /// GPIO pin of an LED to light while recording.
    #[arg(long)]
    record_led_pin: Option<u8>,

    /// Arcade buttons pull their pin high when pressed (pull-down
    /// wiring). Default is pull-up wiring, pressed reads low.
    #[arg(long)]
    buttons_press_high: bool,

    /// Replay a held key's sound on every poll.
    #[arg(long)]
    retrigger_held: bool,

    /// Don't open any audio devices.
    #[arg(long)]
    no_audio: bool,
}

fn parse_address(text: &str) -> Result<u16, std::num::ParseIntError> {
    match text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
    {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => text.parse(),
    }
}

/// Real audio if we can get it, `NullAudio` otherwise.
fn open_audio(no_audio: bool) -> (Arc<dyn AudioOutput>, Arc<dyn AudioInput>) {
    #[cfg(feature = "cpal")]
    if !no_audio {
        match keypad::CpalOutput::open_default() {
            Ok(output) => return (Arc::new(output), Arc::new(keypad::CpalInput)),
            Err(e) => warn!("No audio output, carrying on silently: {e}"),
        }
    }

    #[cfg(not(feature = "cpal"))]
    if !no_audio {
        warn!("Built without the cpal feature, carrying on silently.");
    }

    let null = keypad::NullAudio::new();
    (Arc::new(null.clone()), Arc::new(null))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let hw_info = HardwareInfo::get_info();
    println!("{}\n{}", hw_info.name, hw_info.layout_text);

    let config = KeypadConfig {
        poll_interval: std::time::Duration::from_millis(cli.poll_ms),
        capture_duration: std::time::Duration::from_secs(cli.capture_secs),
        retrigger_held: cli.retrigger_held,
        ..KeypadConfig::default()
    };

    let bank = SoundBank::with_default_sounds(&cli.sounds_dir);
    let (audio_out, audio_in) = open_audio(cli.no_audio);

    let trellis = TrellisSurface::new(cli.i2c_bus, cli.address).with_context(|| {
        format!(
            "can't open the Trellis at {:#04x} on I2C bus {}",
            cli.address, cli.i2c_bus
        )
    })?;
    let mut surface = CompositeSurface::new().with(trellis);

    let wants_gpio = cli.loop_button_pin.is_some()
        || cli.record_button_pin.is_some()
        || cli.record_led_pin.is_some();
    let gpio = if wants_gpio {
        Some(Gpio::new().context("can't open GPIO")?)
    } else {
        None
    };

    if let Some(gpio) = &gpio {
        let press_low = !cli.buttons_press_high;
        let mut buttons = ButtonSurface::new();
        if let Some(pin) = cli.loop_button_pin {
            buttons.add(config.loop_key.clone(), Button::from_gpio(gpio, pin, press_low)?);
        }
        if let Some(pin) = cli.record_button_pin {
            buttons.add(config.record_key.clone(), Button::from_gpio(gpio, pin, press_low)?);
        }
        if !buttons.is_empty() {
            info!(buttons = buttons.len(), "Arcade buttons ready.");
            surface.push(Box::new(buttons));
        }
    }

    let mut controller = KeypadController::new(surface, bank, audio_out, audio_in, config);
    if let (Some(gpio), Some(pin)) = (&gpio, cli.record_led_pin) {
        controller = controller.with_record_indicator(Box::new(GpioLed::new(gpio, pin)?));
    }

    let (shutdown_sender, shutdown_receiver) = crossbeam_channel::bounded(1);
    let mut poll_loop = tokio::task::spawn_blocking(move || controller.run(&shutdown_receiver));

    tokio::select! {
        finished = &mut poll_loop => {
            // Only a failed key read ends the loop by itself.
            finished.context("poll loop panicked")??;
            return Ok(());
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("can't listen for Ctrl-C")?;
            info!("Interrupted, shutting down.");
        }
    }

    let _ = shutdown_sender.send(());
    poll_loop.await.context("poll loop panicked")??;
    Ok(())
}
