//! Key tracking, buttons, surfaces and sample loading.

mod common;

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{keys, FakeSurface, ScriptedPin};
use keypad_looper::keypad::{
    coord_to_index, Button, ButtonSurface, CompositeSurface, HardwareInfo, InputSurface, KeyId,
    KeyPosition, KeyTracker, KeypadError, Point, Sample, SoundBank,
};

#[test]
fn tracker_reports_edges_not_levels() {
    let mut tracker = KeyTracker::new();
    let t0 = Instant::now();

    let events = tracker.update_at(&keys(&["a"]), t0);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].key, KeyId::from("a"));
    assert_eq!(events[0].key_position, KeyPosition::Down);

    let held = tracker.update_at(&keys(&["a"]), t0 + Duration::from_millis(100));
    assert!(held.is_empty());
    assert!(tracker.is_held(&"a".into()));

    let later = t0 + Duration::from_millis(300);
    let released = tracker.update_at(&BTreeSet::new(), later);
    assert_eq!(released.len(), 1);
    assert_eq!(released[0].key_position, KeyPosition::Up);
    assert_eq!(released[0].press_instant, t0);
    assert_eq!(released[0].release_instant, Some(later));
    assert!(!tracker.is_held(&"a".into()));
}

#[test]
fn tracker_releases_come_before_presses() {
    let mut tracker = KeyTracker::new();
    let t0 = Instant::now();
    tracker.update_at(&keys(&["a"]), t0);

    let events = tracker.update_at(&keys(&["b"]), t0 + Duration::from_millis(10));
    let summary: Vec<(KeyId, KeyPosition)> = events
        .iter()
        .map(|event| (event.key.clone(), event.key_position))
        .collect();
    assert_eq!(
        summary,
        vec![
            (KeyId::from("a"), KeyPosition::Up),
            (KeyId::from("b"), KeyPosition::Down),
        ]
    );
    assert_eq!(events[1].event_num, 3);
}

#[test]
fn tracker_knows_how_long_a_key_is_held() {
    let mut tracker = KeyTracker::new();
    let t0 = Instant::now();
    tracker.update_at(&keys(&["a"]), t0);

    let held_for = tracker.held_for(&"a".into(), t0 + Duration::from_millis(250));
    assert_eq!(held_for, Some(Duration::from_millis(250)));
    assert_eq!(tracker.held_for(&"b".into(), t0), None);

    tracker.reset();
    assert_eq!(tracker.held_keys().count(), 0);
}

#[test]
fn grid_coordinates_map_to_key_numbers() {
    assert_eq!(coord_to_index(Point { x: 0, y: 0 }).unwrap(), 0);
    assert_eq!(coord_to_index(Point { x: 0, y: 3 }).unwrap(), 12);
    assert_eq!(coord_to_index(Point { x: 3, y: 3 }).unwrap(), 15);
    assert!(matches!(
        coord_to_index(Point { x: 4, y: 0 }),
        Err(KeypadError::BadKeyLocation { .. })
    ));
    assert_eq!(KeyId::from(Point { x: 2, y: 1 }), KeyId::Index(6));
}

#[test]
fn hardware_info_is_a_trellis() {
    let info = HardwareInfo::get_info();
    assert_eq!(info.num_keys, 16);
    assert_eq!(info.num_leds, 16);
    assert_eq!(info.i2c_address, 0x70);
}

#[test]
fn button_press_low_reads_inverted() {
    let pin = ScriptedPin::new(&[true]);
    let button: Button<ScriptedPin> = Button::new(pin.clone(), true);
    assert!(!button.is_pressed());
    pin.set(false);
    assert!(button.is_pressed());

    let high_button: Button<ScriptedPin> = Button::new(pin.clone(), false);
    assert!(!high_button.is_pressed());
}

#[test]
fn wait_for_press_runs_callbacks_in_order() {
    // Released, released, pressed, pressed, pressed, released.
    let pin = ScriptedPin::new(&[true, true, false, false, false, true]);
    let mut button: Button<ScriptedPin, usize> =
        Button::new(pin, true).with_sleep_time(Duration::from_millis(1));

    let unpressed = Arc::new(AtomicUsize::new(0));
    let pressed = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&unpressed);
    button.set_unpressed_callback(move || counter.fetch_add(1, Ordering::SeqCst) + 1);
    let counter = Arc::clone(&pressed);
    button.set_pressed_callback(move || counter.fetch_add(1, Ordering::SeqCst) + 1);
    button.set_on_press_callback(|| 100);
    button.set_on_release_callback(|| 200);

    assert!(button.on_press_callback_value().is_none());
    let held = button.wait_for_press();

    assert_eq!(unpressed.load(Ordering::SeqCst), 2);
    assert_eq!(pressed.load(Ordering::SeqCst), 2);
    assert_eq!(button.unpressed_callback_value(), Some(&2));
    assert_eq!(button.pressed_callback_value(), Some(&2));
    assert_eq!(button.on_press_callback_value(), Some(&100));
    assert_eq!(button.on_release_callback_value(), Some(&200));
    assert_eq!(button.last_press_duration(), held);
}

#[test]
fn button_surface_reports_pressed_buttons_by_name() {
    let loop_pin = ScriptedPin::new(&[false]);
    let record_pin = ScriptedPin::new(&[true]);
    let mut buttons = ButtonSurface::new();
    buttons.add("loop".into(), Button::new(loop_pin, true));
    buttons.add("rec1".into(), Button::new(record_pin.clone(), true));
    assert_eq!(buttons.len(), 2);

    assert_eq!(buttons.poll().unwrap(), keys(&["loop"]));
    record_pin.set(false);
    assert_eq!(buttons.poll().unwrap(), keys(&["loop", "rec1"]));
}

#[test]
fn composite_surface_merges_polls() {
    let mut pads = FakeSurface::default();
    pads.hold(&["kick"]);
    let mut buttons = ButtonSurface::new();
    buttons.add("loop".into(), Button::new(ScriptedPin::new(&[false]), true));

    let mut surface = CompositeSurface::new().with(pads).with(buttons);
    assert_eq!(surface.len(), 2);
    assert_eq!(surface.poll().unwrap(), keys(&["kick", "loop"]));

    surface.set_all_indicators(true);
}

#[test]
fn composite_surface_fails_if_any_part_fails() {
    let broken = FakeSurface {
        fail_reads: true,
        ..FakeSurface::default()
    };
    let mut surface = CompositeSurface::new()
        .with(FakeSurface::default())
        .with(broken);
    assert!(surface.poll().is_err());
}

fn write_wav(path: &std::path::Path, frames: &[i16], channels: u16) {
    let spec = hound::WavSpec {
        channels,
        sample_rate: 8000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for value in frames {
        writer.write_sample(*value).unwrap();
    }
    writer.finalize().unwrap();
}

#[test]
fn wav_file_loads_as_a_sample() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kick_1.wav");
    let mut values = vec![0_i16; 1000];
    values[0] = i16::MAX;
    values[1] = i16::MIN;
    write_wav(&path, &values, 1);

    let sample = Sample::from_wav(&path).unwrap();
    assert_eq!(sample.name(), "kick_1");
    assert_eq!(sample.sample_rate(), 8000);
    assert_eq!(sample.channels(), 1);
    assert_eq!(sample.frame_count(), 1000);
    assert_eq!(sample.duration(), Duration::from_millis(125));
    assert!((sample.data()[0] - 1.0).abs() < 0.001);
    assert_eq!(sample.data()[1], -1.0);
}

#[test]
fn stereo_wav_counts_frames_not_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pad.wav");
    write_wav(&path, &[0; 800], 2);

    let sample = Sample::from_wav(&path).unwrap();
    assert_eq!(sample.frame_count(), 400);
    assert_eq!(sample.duration(), Duration::from_millis(50));
}

#[test]
fn missing_wav_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Sample::from_wav(&dir.path().join("nope.wav")).unwrap_err();
    assert!(matches!(err, KeypadError::Wav(_)));
}

#[test]
fn bank_loads_the_files_it_finds() {
    let dir = tempfile::tempdir().unwrap();
    write_wav(&dir.path().join("bass_1.wav"), &[0; 100], 1);
    write_wav(&dir.path().join("snare_1.wav"), &[0; 100], 1);

    let bank = SoundBank::new();
    let loaded = bank.load_files(
        dir.path(),
        &[
            (KeyId::Index(0), "bass_1.wav"),
            (KeyId::Index(1), "snare_1.wav"),
            (KeyId::Index(2), "not_there.wav"),
        ],
    );

    assert_eq!(loaded, 2);
    assert_eq!(bank.lookup(&KeyId::Index(1)).unwrap().name(), "snare_1");
    assert!(!bank.contains(&KeyId::Index(2)));
}

#[test]
fn default_sounds_cover_the_sample_pads() {
    let dir = tempfile::tempdir().unwrap();
    write_wav(&dir.path().join("bass_1.wav"), &[0; 100], 1);

    let bank = SoundBank::with_default_sounds(dir.path());
    assert_eq!(bank.keys(), vec![KeyId::Index(0)]);
}

#[test]
fn sample_drops_a_partial_trailing_frame() {
    let sample = Sample::new("odd", vec![0.5; 5], 1000, 2);
    assert_eq!(sample.data().len(), 4);
    assert_eq!(sample.frame_count(), 2);
}
