use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SampleFormat, SizedSample, StreamConfig};
use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, error, info};

use crate::keypad::{mutex_poison, AudioInput, AudioOutput, KeypadError, Sample};

/// One sample being played.
struct Voice {
    data: Arc<[f32]>,
    channels: usize,
    frame: usize,
}

impl Voice {
    fn new(sample: &Sample) -> Voice {
        Voice {
            data: sample.shared_data(),
            channels: usize::from(sample.channels()).max(1),
            frame: 0,
        }
    }

    /// Next frame, mixed down to mono. `None` once we're past the end.
    fn next_mono(&mut self) -> Option<f32> {
        let start = self.frame * self.channels;
        let frame = self.data.get(start..start + self.channels)?;
        self.frame += 1;
        Some(frame.iter().sum::<f32>() / self.channels as f32)
    }

    /// No whole frame left. A partial one at the end never plays.
    fn finished(&self) -> bool {
        (self.frame + 1) * self.channels > self.data.len()
    }
}

/// The default output device, mixing any number of samples at once.
///
/// `play()` just adds a voice to the list the audio callback mixes
/// from, so it returns immediately. The cpal stream lives on its own
/// thread (streams can't move between threads on every platform) and
/// is closed when this is dropped.
///
/// Samples are played at the device's rate, whatever theirs is.
pub struct CpalOutput {
    voices: Arc<Mutex<Vec<Voice>>>,
    sample_rate: u32,
    shutdown_sender: Option<Sender<()>>,
    stream_thread: Option<thread::JoinHandle<()>>,
}

impl CpalOutput {
    pub fn open_default() -> Result<CpalOutput, KeypadError> {
        let voices = Arc::new(Mutex::new(Vec::new()));
        let (shutdown_sender, shutdown_receiver) = crossbeam_channel::bounded::<()>(1);
        let (ready_sender, ready_receiver) = crossbeam_channel::bounded(1);

        let thread_voices = Arc::clone(&voices);
        let stream_thread = thread::Builder::new()
            .name("audio output".to_string())
            .spawn(move || {
                Self::stream_thread(thread_voices, &ready_sender, &shutdown_receiver);
            })
            .map_err(|e| KeypadError::Audio(format!("spawn of audio thread failed: {e}")))?;

        let sample_rate = ready_receiver
            .recv()
            .map_err(|_| KeypadError::Audio("audio thread died during setup".to_string()))??;

        info!(sample_rate, "Audio output open.");
        Ok(CpalOutput {
            voices,
            sample_rate,
            shutdown_sender: Some(shutdown_sender),
            stream_thread: Some(stream_thread),
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Open the stream, report how that went, then hold the stream
    /// open until told to shut down.
    fn stream_thread(
        voices: Arc<Mutex<Vec<Voice>>>,
        ready_sender: &Sender<Result<u32, KeypadError>>,
        shutdown_receiver: &Receiver<()>,
    ) {
        let stream = match Self::build_stream(voices) {
            Ok((stream, sample_rate)) => {
                let _ = ready_sender.send(Ok(sample_rate));
                stream
            }
            Err(e) => {
                let _ = ready_sender.send(Err(e));
                return;
            }
        };

        // A message or a dropped sender, either means close.
        let _ = shutdown_receiver.recv();
        drop(stream);
    }

    fn build_stream(voices: Arc<Mutex<Vec<Voice>>>) -> Result<(cpal::Stream, u32), KeypadError> {
        let device = cpal::default_host()
            .default_output_device()
            .ok_or_else(|| KeypadError::Audio("no output device".to_string()))?;
        let supported = device
            .default_output_config()
            .map_err(|e| KeypadError::Audio(e.to_string()))?;
        let sample_format = supported.sample_format();
        let config: StreamConfig = supported.into();

        let stream = match sample_format {
            SampleFormat::F32 => Self::build_mixer::<f32>(&device, &config, voices),
            SampleFormat::I16 => Self::build_mixer::<i16>(&device, &config, voices),
            SampleFormat::I32 => Self::build_mixer::<i32>(&device, &config, voices),
            SampleFormat::U16 => Self::build_mixer::<u16>(&device, &config, voices),
            other => Err(KeypadError::Audio(format!(
                "output sample format {other:?} not supported"
            ))),
        }?;
        stream
            .play()
            .map_err(|e| KeypadError::Audio(e.to_string()))?;

        debug!(?sample_format, channels = config.channels, "Output stream playing.");
        Ok((stream, config.sample_rate.0))
    }

    /// Output stream that mixes the voices in f32 and converts to
    /// whatever the device wants.
    fn build_mixer<T>(
        device: &cpal::Device,
        config: &StreamConfig,
        voices: Arc<Mutex<Vec<Voice>>>,
    ) -> Result<cpal::Stream, KeypadError>
    where
        T: SizedSample + FromSample<f32>,
    {
        let channels = usize::from(config.channels);
        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    let mut voices = voices.lock().unwrap_or_else(mutex_poison);
                    for frame in data.chunks_mut(channels) {
                        let mixed: f32 = voices.iter_mut().filter_map(Voice::next_mono).sum();
                        frame.fill(T::from_sample(mixed));
                    }
                    voices.retain(|voice| !voice.finished());
                },
                |e| error!("Audio output stream error: {e}"),
                None,
            )
            .map_err(|e| KeypadError::Audio(e.to_string()))
    }
}

impl AudioOutput for CpalOutput {
    fn play(&self, sample: &Sample) -> Result<(), KeypadError> {
        if sample.sample_rate() != self.sample_rate {
            debug!(
                sample = sample.name(),
                sample_rate = sample.sample_rate(),
                device_rate = self.sample_rate,
                "Sample rate mismatch, playing anyway."
            );
        }
        self.voices
            .lock()
            .unwrap_or_else(mutex_poison)
            .push(Voice::new(sample));
        Ok(())
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        drop(self.shutdown_sender.take());
        if let Some(stream_thread) = self.stream_thread.take() {
            let _ = stream_thread.join();
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
/// The default input device (a USB microphone, say), opened fresh for
/// each capture and mixed down to mono.
pub struct CpalInput;

impl AudioInput for CpalInput {
    fn capture(&self, duration: Duration, stop: &Receiver<()>) -> Result<Sample, KeypadError> {
        let device = cpal::default_host()
            .default_input_device()
            .ok_or_else(|| KeypadError::Capture("no input device".to_string()))?;
        let supported = device
            .default_input_config()
            .map_err(|e| KeypadError::Capture(e.to_string()))?;
        let sample_format = supported.sample_format();
        let config: StreamConfig = supported.into();
        let sample_rate = config.sample_rate.0;
        let max_frames = (duration.as_secs_f64() * f64::from(sample_rate)) as usize;

        let captured = Arc::new(Mutex::new(Vec::with_capacity(max_frames)));
        let sink = Arc::clone(&captured);
        let stream = match sample_format {
            SampleFormat::F32 => Self::build_recorder::<f32>(&device, &config, sink),
            SampleFormat::I16 => Self::build_recorder::<i16>(&device, &config, sink),
            SampleFormat::I32 => Self::build_recorder::<i32>(&device, &config, sink),
            SampleFormat::U16 => Self::build_recorder::<u16>(&device, &config, sink),
            other => Err(KeypadError::Capture(format!(
                "input sample format {other:?} not supported"
            ))),
        }?;
        stream
            .play()
            .map_err(|e| KeypadError::Capture(e.to_string()))?;

        // Timeout, stop message, or disconnect: all mean we're done.
        let _ = stop.recv_timeout(duration);
        drop(stream);

        let mut data = std::mem::take(&mut *captured.lock().unwrap_or_else(mutex_poison));
        data.truncate(max_frames);
        debug!(frames = data.len(), sample_rate, "Captured audio.");
        Ok(Sample::new("capture", data, sample_rate, 1))
    }
}

impl CpalInput {
    /// Input stream that appends each frame, mixed to mono f32, to `sink`.
    fn build_recorder<T>(
        device: &cpal::Device,
        config: &StreamConfig,
        sink: Arc<Mutex<Vec<f32>>>,
    ) -> Result<cpal::Stream, KeypadError>
    where
        T: SizedSample,
        f32: FromSample<T>,
    {
        let channels = usize::from(config.channels);
        device
            .build_input_stream(
                config,
                move |data: &[T], _: &cpal::InputCallbackInfo| {
                    let mut sink = sink.lock().unwrap_or_else(mutex_poison);
                    for frame in data.chunks(channels) {
                        let sum: f32 = frame.iter().map(|value| value.to_sample::<f32>()).sum();
                        sink.push(sum / frame.len() as f32);
                    }
                },
                |e| error!("Audio input stream error: {e}"),
                None,
            )
            .map_err(|e| KeypadError::Capture(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voice_mixes_down_and_finishes() {
        let stereo = Sample::new("pad", vec![0.25, 0.75, 1.0, 0.0], 1000, 2);
        let mut voice = Voice::new(&stereo);

        assert!(!voice.finished());
        assert_eq!(voice.next_mono(), Some(0.5));
        assert_eq!(voice.next_mono(), Some(0.5));
        assert!(voice.finished());
        assert_eq!(voice.next_mono(), None);
    }

    #[test]
    fn voice_with_partial_last_frame_still_finishes() {
        let mut voice = Voice {
            data: Arc::from(vec![0.5_f32; 5]),
            channels: 2,
            frame: 0,
        };

        let mut frames = 0;
        while voice.next_mono().is_some() {
            frames += 1;
        }
        assert_eq!(frames, 2);
        assert!(voice.finished());
    }
}
