use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::keypad::{hw_specific, read_poison, write_poison, KeyId, KeypadError};

#[derive(Debug, Clone, PartialEq)]
/// A loaded, playable piece of audio.
///
/// The audio data sits behind an `Arc`, so cloning a `Sample` (and
/// handing it to the audio thread) is cheap.
pub struct Sample {
    name: String,

    /// Interleaved, -1.0 to 1.0.
    data: Arc<[f32]>,

    sample_rate: u32,
    channels: u16,
}

impl Sample {
    /// A trailing partial frame, if `data` has one, is dropped.
    pub fn new(name: impl Into<String>, mut data: Vec<f32>, sample_rate: u32, channels: u16) -> Sample {
        let channels = channels.max(1);
        data.truncate(data.len() - data.len() % usize::from(channels));
        Sample {
            name: name.into(),
            data: data.into(),
            sample_rate,
            channels,
        }
    }

    /// Mono silence lasting `duration`.
    pub fn silence(name: impl Into<String>, duration: Duration, sample_rate: u32) -> Sample {
        let frames = (duration.as_secs_f64() * f64::from(sample_rate)).round() as usize;
        Sample::new(name, vec![0.0; frames], sample_rate, 1)
    }

    /// Load a WAV file, integer or float, any channel count. The
    /// sample is named after the file stem.
    pub fn from_wav(path: &Path) -> Result<Sample, KeypadError> {
        let mut reader = hound::WavReader::open(path)?;
        let spec = reader.spec();

        let data = match spec.sample_format {
            hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?,
            hound::SampleFormat::Int => {
                let scale = 1.0 / (1_i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|value| value as f32 * scale))
                    .collect::<Result<Vec<_>, _>>()?
            }
        };

        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        debug!(
            name,
            sample_rate = spec.sample_rate,
            channels = spec.channels,
            values = data.len(),
            "Loaded WAV."
        );

        Ok(Sample::new(name, data, spec.sample_rate, spec.channels))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Interleaved audio data.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Another handle to the same audio data, no copying.
    pub fn shared_data(&self) -> Arc<[f32]> {
        Arc::clone(&self.data)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn frame_count(&self) -> usize {
        self.data.len() / usize::from(self.channels)
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frame_count() as f64 / f64::from(self.sample_rate))
    }
}

#[derive(Debug, Clone, PartialEq)]
/// Play `asset`, then wait `interval` before the next entry.
pub struct SequenceEntry {
    pub asset: Sample,
    pub interval: Duration,
}

#[derive(Debug, Clone, PartialEq, Default)]
/// A recorded loop pattern: samples and the gaps between them.
///
/// Can be empty, in which case looping it does nothing.
pub struct InstrumentSequence {
    name: String,
    entries: Vec<SequenceEntry>,
}

impl InstrumentSequence {
    pub fn new(name: impl Into<String>) -> InstrumentSequence {
        InstrumentSequence {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    /// Append an entry. (`Duration` can't be negative, so neither can
    /// an interval.)
    pub fn push(&mut self, asset: Sample, interval: Duration) {
        self.entries.push(SequenceEntry { asset, interval });
    }

    /// Build the instrument for one finished recording session.
    ///
    /// The microphone take goes first, and waits until the first
    /// noted key press. Each press then waits until the next one, the
    /// last until the end of the take. So the intervals add up to the
    /// length of the take, and looping the result keeps the timing
    /// the player recorded.
    pub fn from_capture(
        name: impl Into<String>,
        take: Sample,
        presses: &[(Sample, Instant)],
        started: Instant,
    ) -> InstrumentSequence {
        let ended = started + take.duration();
        let mut sequence = InstrumentSequence::new(name);

        let lead_in = match presses.first() {
            Some((_, first_press)) => first_press.saturating_duration_since(started),
            None => ended.saturating_duration_since(started),
        };
        sequence.push(take, lead_in.min(ended.saturating_duration_since(started)));

        for (index, (sample, pressed_at)) in presses.iter().enumerate() {
            let next = presses.get(index + 1).map_or(ended, |(_, at)| *at);
            sequence.push(sample.clone(), next.saturating_duration_since(*pressed_at));
        }

        sequence
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entries(&self) -> &[SequenceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// One pass through the whole pattern.
    pub fn duration(&self) -> Duration {
        self.entries.iter().map(|entry| entry.interval).sum()
    }

    /// What a single key press on this instrument plays.
    pub fn lead_sample(&self) -> Option<&Sample> {
        self.entries.first().map(|entry| &entry.asset)
    }
}

#[derive(Debug, Clone, PartialEq)]
/// Whatever can be bound to a key.
pub enum SoundAsset {
    Sample(Sample),
    Instrument(InstrumentSequence),
}

impl SoundAsset {
    pub fn name(&self) -> &str {
        match self {
            SoundAsset::Sample(sample) => sample.name(),
            SoundAsset::Instrument(sequence) => sequence.name(),
        }
    }

    /// The sample a key press fires. `None` for an empty instrument.
    pub fn lead_sample(&self) -> Option<&Sample> {
        match self {
            SoundAsset::Sample(sample) => Some(sample),
            SoundAsset::Instrument(sequence) => sequence.lead_sample(),
        }
    }

    pub fn as_instrument(&self) -> Option<&InstrumentSequence> {
        match self {
            SoundAsset::Sample(_) => None,
            SoundAsset::Instrument(sequence) => Some(sequence),
        }
    }
}

impl From<Sample> for SoundAsset {
    fn from(sample: Sample) -> Self {
        SoundAsset::Sample(sample)
    }
}

impl From<InstrumentSequence> for SoundAsset {
    fn from(sequence: InstrumentSequence) -> Self {
        SoundAsset::Instrument(sequence)
    }
}

#[derive(Debug, Clone, Default)]
/// Key id to sound mapping.
///
/// A `SoundBank` is a handle, clones share the same slots. The poll
/// loop and the loop thread both read it, the poll loop writes to it
/// when a recording finishes.
///
/// Each slot holds an `Arc<SoundAsset>`. Storing swaps the whole
/// `Arc` under the write lock, so a reader gets either the old asset
/// or the new one, never a mix. Readers get their own `Arc` and can
/// keep playing an asset after it has been replaced.
pub struct SoundBank {
    slots: Arc<RwLock<HashMap<KeyId, Arc<SoundAsset>>>>,
}

impl SoundBank {
    pub fn new() -> SoundBank {
        SoundBank::default()
    }

    /// Load the stock samples from `dir`. Files that aren't there are
    /// skipped with a warning, those keys just stay silent.
    pub fn with_default_sounds(dir: &Path) -> SoundBank {
        let bank = SoundBank::new();
        let files: Vec<(KeyId, &str)> = hw_specific::DEFAULT_SOUND_FILES
            .iter()
            .map(|(index, file)| (KeyId::Index(*index), *file))
            .collect();
        let loaded = bank.load_files(dir, &files);
        info!(
            dir = %dir.display(),
            loaded,
            wanted = files.len(),
            "Loaded sound bank."
        );
        bank
    }

    /// Load each `(key, file name)` from `dir` and bind it. Returns how
    /// many loaded.
    pub fn load_files(&self, dir: &Path, files: &[(KeyId, &str)]) -> usize {
        let mut loaded = 0;
        for (key, file) in files {
            let path = dir.join(file);
            match Sample::from_wav(&path) {
                Ok(sample) => {
                    self.store(key.clone(), SoundAsset::Sample(sample));
                    loaded += 1;
                }
                Err(e) => {
                    warn!(key = %key, path = %path.display(), "Leaving key unbound: {e}");
                }
            }
        }
        loaded
    }

    /// Get what is bound to `key`.
    ///
    /// # Errors
    ///
    /// `KeypadError::NotFound` if nothing is.
    pub fn lookup(&self, key: &KeyId) -> Result<Arc<SoundAsset>, KeypadError> {
        self.slots
            .read()
            .unwrap_or_else(read_poison)
            .get(key)
            .cloned()
            .ok_or_else(|| KeypadError::NotFound { key: key.clone() })
    }

    /// Bind `asset` to `key`, replacing whatever was there.
    pub fn store(&self, key: KeyId, asset: SoundAsset) {
        debug!(key = %key, asset = asset.name(), "Storing sound.");
        self.slots
            .write()
            .unwrap_or_else(write_poison)
            .insert(key, Arc::new(asset));
    }

    pub fn contains(&self, key: &KeyId) -> bool {
        self.slots.read().unwrap_or_else(read_poison).contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.slots.read().unwrap_or_else(read_poison).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bound keys, sorted.
    pub fn keys(&self) -> Vec<KeyId> {
        let mut keys: Vec<KeyId> = self
            .slots
            .read()
            .unwrap_or_else(read_poison)
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }
}
