use hound::{SampleFormat, WavReader};
use log::{debug, info};
use std::path::Path;

use crate::audio::{downmix_to_mono, resample, to_unit_float};
use crate::config::Config;
use crate::db::DynError;
use crate::recorder::{CompletedRecording, RecordingSession};
use crate::repository::{now_ms, RecordingRepository};
use crate::vad::{EnergyEngine, SpeechProbability, VoiceActivityDetector, VoiceEvent};

/// Samples handed to the monitor per call when ingesting a file
const INGEST_CHUNK_SAMPLES: usize = 4096;

/// Wires voice detection, the capture session and the repository together.
/// Every file the session closes is stored as a PENDING recording.
pub struct VoiceMonitor<E: SpeechProbability> {
    vad: VoiceActivityDetector<E>,
    session: RecordingSession,
    repository: RecordingRepository,
    frame_size: usize,
    sample_rate: u32,
    carry: Vec<i16>,
    clock_start_ms: i64,
    samples_consumed: u64,
}

impl VoiceMonitor<EnergyEngine> {
    pub fn from_config(config: &Config, repository: RecordingRepository, start_ms: i64) -> Self {
        let vad = VoiceActivityDetector::new(EnergyEngine::from_config(&config.vad), &config.vad);
        Self::new(vad, config, repository, start_ms)
    }
}

impl<E: SpeechProbability> VoiceMonitor<E> {
    pub fn new(
        vad: VoiceActivityDetector<E>,
        config: &Config,
        repository: RecordingRepository,
        start_ms: i64,
    ) -> Self {
        Self {
            vad,
            session: RecordingSession::new(config.recordings_dir(), &config.recorder),
            repository: repository.with_sample_rate(config.recorder.sample_rate),
            frame_size: config.vad.frame_size,
            sample_rate: config.recorder.sample_rate,
            carry: Vec::new(),
            clock_start_ms: start_ms,
            samples_consumed: 0,
        }
    }

    /// Monitor clock derived from the number of samples consumed
    pub fn now_ms(&self) -> i64 {
        self.clock_start_ms + (self.samples_consumed * 1000 / self.sample_rate as u64) as i64
    }

    pub fn is_recording(&self) -> bool {
        self.session.is_recording()
    }

    /// Feed mono samples at the capture rate. Returns ids of recordings stored by this call.
    pub async fn process(&mut self, samples: &[i16]) -> Result<Vec<i64>, DynError> {
        self.carry.extend_from_slice(samples);
        let mut saved = Vec::new();

        let mut offset = 0;
        while self.carry.len() - offset >= self.frame_size {
            let frame = self.carry[offset..offset + self.frame_size].to_vec();
            offset += self.frame_size;

            let now = self.now_ms();
            match self.vad.process_frame(&to_unit_float(&frame)) {
                Some(VoiceEvent::Start) => self.session.on_voice_start(now)?,
                Some(VoiceEvent::End) => self.session.on_voice_end(now),
                None => {}
            }

            if let Some(completed) = self.session.write_audio(&frame, now)? {
                saved.push(self.store(completed).await?);
            }
            self.samples_consumed += frame.len() as u64;
        }
        self.carry.drain(..offset);

        Ok(saved)
    }

    /// Flush buffered samples and close any open recording
    pub async fn finish(&mut self) -> Result<Vec<i64>, DynError> {
        let mut saved = Vec::new();
        let rest = std::mem::take(&mut self.carry);
        if !rest.is_empty() {
            let now = self.now_ms();
            if let Some(completed) = self.session.write_audio(&rest, now)? {
                saved.push(self.store(completed).await?);
            }
            self.samples_consumed += rest.len() as u64;
        }

        let now = self.now_ms();
        if let Some(completed) = self.session.force_stop(now)? {
            saved.push(self.store(completed).await?);
        }
        self.vad.reset();
        Ok(saved)
    }

    async fn store(&self, completed: CompletedRecording) -> Result<i64, DynError> {
        debug!(
            "Storing recording {} ({} bytes of audio)",
            completed.path.display(),
            completed.data_bytes
        );
        self.repository
            .save_recording_at(&completed.path, completed.ended_at_ms)
            .await
    }
}

/// Rescale an integer sample of the given bit depth to 16 bits
fn scale_to_i16(value: i32, bits: u16) -> i16 {
    if bits > 16 {
        (value >> (bits - 16)) as i16
    } else {
        (value << (16 - bits)) as i16
    }
}

/// Decode a WAV file into mono samples at the given rate
pub fn read_wav_mono(path: &Path, target_rate: u32) -> Result<Vec<i16>, DynError> {
    let mut reader = WavReader::open(path)
        .map_err(|e| format!("Failed to open WAV file '{}': {}", path.display(), e))?;
    let spec = reader.spec();
    if spec.sample_rate == 0 || spec.channels == 0 {
        return Err(format!(
            "Invalid WAV header in '{}': {} Hz, {} channels",
            path.display(),
            spec.sample_rate,
            spec.channels
        )
        .into());
    }

    let samples: Vec<i16> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Int, 16) => reader.samples::<i16>().collect::<Result<_, _>>()?,
        (SampleFormat::Int, bits) if bits <= 32 => reader
            .samples::<i32>()
            .map(|s| s.map(|v| scale_to_i16(v, bits)))
            .collect::<Result<_, _>>()?,
        (SampleFormat::Float, _) => reader
            .samples::<f32>()
            .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * i16::MAX as f32) as i16))
            .collect::<Result<_, _>>()?,
        (format, bits) => {
            return Err(format!("Unsupported WAV sample format {:?}/{} bits", format, bits).into())
        }
    };

    let mono = downmix_to_mono(&samples, spec.channels);
    Ok(resample(&mono, spec.sample_rate, target_rate))
}

/// Run a WAV file through voice detection and store every detected recording.
/// The monitor clock is placed so that the file ends at the current time.
pub async fn ingest_wav(
    path: &Path,
    config: &Config,
    repository: RecordingRepository,
) -> Result<Vec<i64>, DynError> {
    let sample_rate = config.recorder.sample_rate;
    let samples = read_wav_mono(path, sample_rate)?;
    let duration_ms = (samples.len() as u64 * 1000 / sample_rate as u64) as i64;

    let mut monitor = VoiceMonitor::from_config(config, repository, now_ms() - duration_ms);
    let mut saved = Vec::new();
    for chunk in samples.chunks(INGEST_CHUNK_SAMPLES) {
        saved.extend(monitor.process(chunk).await?);
    }
    saved.extend(monitor.finish().await?);

    info!(
        "Ingested '{}' ({}ms of audio): {} recordings",
        path.display(),
        duration_ms,
        saved.len()
    );
    Ok(saved)
}
