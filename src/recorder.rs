//! Capture session: turns voice start/end notifications and a continuous sample
//! feed into finished WAV files.
//!
//! - Pre-buffer: the most recent `pre_buffer_ms` of audio is written when a
//!   recording starts, so the onset that triggered detection is kept.
//! - Silence gap: after voice ends, recording continues for `silence_gap_ms`;
//!   voice resuming inside the gap keeps the same file.
//! - Post buffer: once the gap elapses, another `post_buffer_ms` is recorded
//!   before the file is closed.
//!
//! Time is supplied by the caller in milliseconds so that live capture and
//! offline ingestion share the same logic.

use chrono::{DateTime, Local, Utc};
use hound::{SampleFormat, WavSpec, WavWriter};
use log::{debug, info};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::config::RecorderConfig;
use crate::constants::{BITS_PER_SAMPLE, CHANNELS, PENDING_DIR};
use crate::db::DynError;

/// Fixed-capacity sample buffer keeping the most recent samples
pub struct RingBuffer {
    buffer: Vec<i16>,
    write_pos: usize,
    size: usize,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: vec![0; capacity],
            write_pos: 0,
            size: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn write(&mut self, data: &[i16]) {
        let capacity = self.buffer.len();
        if capacity == 0 {
            return;
        }
        for &sample in data {
            self.buffer[self.write_pos] = sample;
            self.write_pos = (self.write_pos + 1) % capacity;
            if self.size < capacity {
                self.size += 1;
            }
        }
    }

    /// Buffered samples, oldest first
    pub fn read(&self) -> Vec<i16> {
        if self.size < self.buffer.len() {
            return self.buffer[..self.size].to_vec();
        }
        let mut result = Vec::with_capacity(self.size);
        result.extend_from_slice(&self.buffer[self.write_pos..]);
        result.extend_from_slice(&self.buffer[..self.write_pos]);
        result
    }

    pub fn clear(&mut self) {
        self.write_pos = 0;
        self.size = 0;
    }
}

/// 16-bit mono PCM WAV writer; the header is fixed up on finalize
pub struct WavFileWriter {
    writer: WavWriter<BufWriter<File>>,
    path: PathBuf,
    data_size: u64,
}

impl WavFileWriter {
    pub fn create(path: &Path, sample_rate: u32) -> Result<Self, DynError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create directory '{}': {}", parent.display(), e))?;
        }
        let spec = WavSpec {
            channels: CHANNELS,
            sample_rate,
            bits_per_sample: BITS_PER_SAMPLE,
            sample_format: SampleFormat::Int,
        };
        let writer = WavWriter::create(path, spec)
            .map_err(|e| format!("Failed to create WAV file '{}': {}", path.display(), e))?;
        debug!("Started writing WAV file: {}", path.display());
        Ok(Self {
            writer,
            path: path.to_path_buf(),
            data_size: 0,
        })
    }

    pub fn write(&mut self, samples: &[i16]) -> Result<(), DynError> {
        for &sample in samples {
            self.writer.write_sample(sample)?;
        }
        self.data_size += samples.len() as u64 * 2;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush, patch the header sizes and close the file
    pub fn finalize(self) -> Result<u64, DynError> {
        let data_size = self.data_size;
        self.writer
            .finalize()
            .map_err(|e| format!("Failed to finalize WAV file '{}': {}", self.path.display(), e))?;
        Ok(data_size)
    }
}

/// A closed recording file ready to be stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedRecording {
    pub path: PathBuf,
    pub data_bytes: u64,
    pub started_at_ms: i64,
    pub ended_at_ms: i64,
}

struct ActiveRecording {
    writer: WavFileWriter,
    started_at_ms: i64,
    silence_deadline_ms: Option<i64>,
    stop_deadline_ms: Option<i64>,
}

pub struct RecordingSession {
    recordings_dir: PathBuf,
    sample_rate: u32,
    pre_buffer: RingBuffer,
    silence_gap_ms: i64,
    post_buffer_ms: i64,
    active: Option<ActiveRecording>,
}

/// `pending/voice_YYYYMMDD_HHMMSS.wav`, with `_N` appended if the name is taken
fn recording_file_name(recordings_dir: &Path, now_ms: i64) -> PathBuf {
    let timestamp = DateTime::<Utc>::from_timestamp_millis(now_ms)
        .unwrap_or_else(Utc::now)
        .with_timezone(&Local)
        .format("%Y%m%d_%H%M%S")
        .to_string();
    let dir = recordings_dir.join(PENDING_DIR);

    let mut path = dir.join(format!("voice_{}.wav", timestamp));
    let mut suffix = 1;
    while path.exists() {
        path = dir.join(format!("voice_{}_{}.wav", timestamp, suffix));
        suffix += 1;
    }
    path
}

impl RecordingSession {
    pub fn new(recordings_dir: impl Into<PathBuf>, config: &RecorderConfig) -> Self {
        let pre_buffer_samples =
            (config.sample_rate as u64 * config.pre_buffer_ms / 1000) as usize;
        Self {
            recordings_dir: recordings_dir.into(),
            sample_rate: config.sample_rate,
            pre_buffer: RingBuffer::new(pre_buffer_samples),
            silence_gap_ms: config.silence_gap_ms as i64,
            post_buffer_ms: config.post_buffer_ms as i64,
            active: None,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.active.is_some()
    }

    /// Start a new file seeded with the pre-buffer, or keep the current one going
    pub fn on_voice_start(&mut self, now_ms: i64) -> Result<(), DynError> {
        if let Some(active) = self.active.as_mut() {
            active.silence_deadline_ms = None;
            active.stop_deadline_ms = None;
            debug!("Voice continues, silence check cancelled");
            return Ok(());
        }

        let path = recording_file_name(&self.recordings_dir, now_ms);
        let mut writer = WavFileWriter::create(&path, self.sample_rate)?;
        let pre_buffer = self.pre_buffer.read();
        if !pre_buffer.is_empty() {
            writer.write(&pre_buffer)?;
        }

        info!("Recording started: {}", path.display());
        self.active = Some(ActiveRecording {
            writer,
            started_at_ms: now_ms,
            silence_deadline_ms: None,
            stop_deadline_ms: None,
        });
        Ok(())
    }

    /// Voice stopped: the recording ends unless voice returns within the silence gap
    pub fn on_voice_end(&mut self, now_ms: i64) {
        if let Some(active) = self.active.as_mut() {
            if active.stop_deadline_ms.is_none() {
                active.silence_deadline_ms = Some(now_ms + self.silence_gap_ms);
                debug!("Voice ended, silence check started");
            }
        }
    }

    /// Advance timers without new audio
    pub fn poll(&mut self, now_ms: i64) -> Result<Option<CompletedRecording>, DynError> {
        let Some(active) = self.active.as_mut() else {
            return Ok(None);
        };

        if let Some(deadline) = active.silence_deadline_ms {
            if now_ms >= deadline {
                active.silence_deadline_ms = None;
                active.stop_deadline_ms = Some(deadline + self.post_buffer_ms);
                debug!("Silence gap elapsed, recording post buffer");
            }
        }

        let stop_deadline = active.stop_deadline_ms;
        match stop_deadline {
            Some(deadline) if now_ms >= deadline => self.finish_active(deadline).map(Some),
            _ => Ok(None),
        }
    }

    /// Feed captured samples; returns a recording if this call closed one
    pub fn write_audio(
        &mut self,
        samples: &[i16],
        now_ms: i64,
    ) -> Result<Option<CompletedRecording>, DynError> {
        let completed = self.poll(now_ms)?;

        self.pre_buffer.write(samples);
        if let Some(active) = self.active.as_mut() {
            active.writer.write(samples)?;
        }
        Ok(completed)
    }

    /// Close the current file immediately, skipping gap and post buffer
    pub fn force_stop(&mut self, now_ms: i64) -> Result<Option<CompletedRecording>, DynError> {
        if self.active.is_none() {
            return Ok(None);
        }
        let completed = self.finish_active(now_ms)?;
        debug!("Force stopped: {}", completed.path.display());
        Ok(Some(completed))
    }

    fn finish_active(&mut self, ended_at_ms: i64) -> Result<CompletedRecording, DynError> {
        let active = self
            .active
            .take()
            .ok_or("No active recording to finish")?;
        let path = active.writer.path().to_path_buf();
        let data_bytes = active.writer.finalize()?;

        let bytes_per_second = self.sample_rate as u64 * 2;
        info!(
            "Recording completed: {}, duration: {}s",
            path.display(),
            data_bytes / bytes_per_second.max(1)
        );
        Ok(CompletedRecording {
            path,
            data_bytes,
            started_at_ms: active.started_at_ms,
            ended_at_ms,
        })
    }
}
