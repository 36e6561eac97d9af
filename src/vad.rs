//! Voice activity detection
//!
//! A [`SpeechProbability`] engine scores each fixed-size frame, and
//! [`VoiceActivityDetector`] debounces the scores into start/end events.

use log::debug;

use crate::config::VadConfig;

/// Scores one frame of normalized samples with a speech probability in [0, 1]
pub trait SpeechProbability: Send {
    fn process(&mut self, frame: &[f32]) -> f32;
}

/// Energy-based engine: frame RMS in dBFS mapped linearly between a floor and a ceiling
#[derive(Debug, Clone)]
pub struct EnergyEngine {
    floor_db: f32,
    ceiling_db: f32,
}

impl EnergyEngine {
    pub fn new(floor_db: f32, ceiling_db: f32) -> Self {
        Self {
            floor_db,
            ceiling_db,
        }
    }

    pub fn from_config(config: &VadConfig) -> Self {
        Self::new(config.energy_floor_db, config.energy_ceiling_db)
    }
}

/// Root-mean-square level of a frame in dBFS (silence is -inf)
pub fn rms_dbfs(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return f32::NEG_INFINITY;
    }
    let mean_square = frame.iter().map(|s| s * s).sum::<f32>() / frame.len() as f32;
    10.0 * mean_square.log10()
}

impl SpeechProbability for EnergyEngine {
    fn process(&mut self, frame: &[f32]) -> f32 {
        let db = rms_dbfs(frame);
        ((db - self.floor_db) / (self.ceiling_db - self.floor_db)).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceEvent {
    Start,
    End,
}

/// Debounces per-frame probabilities into voice start/end transitions
pub struct VoiceActivityDetector<E: SpeechProbability> {
    engine: E,
    voice_threshold: f32,
    min_voice_frames: u32,
    min_silence_frames: u32,
    consecutive_voice_frames: u32,
    consecutive_silence_frames: u32,
    voice_active: bool,
}

impl<E: SpeechProbability> VoiceActivityDetector<E> {
    pub fn new(engine: E, config: &VadConfig) -> Self {
        Self {
            engine,
            voice_threshold: config.voice_threshold,
            min_voice_frames: config.min_voice_frames.max(1),
            min_silence_frames: config.min_silence_frames.max(1),
            consecutive_voice_frames: 0,
            consecutive_silence_frames: 0,
            voice_active: false,
        }
    }

    pub fn is_voice_active(&self) -> bool {
        self.voice_active
    }

    /// Score one frame; short frames are zero-padded by the caller or scored as-is
    pub fn process_frame(&mut self, frame: &[f32]) -> Option<VoiceEvent> {
        let probability = self.engine.process(frame);
        self.process_probability(probability)
    }

    /// Advance the state machine with an already computed probability
    pub fn process_probability(&mut self, probability: f32) -> Option<VoiceEvent> {
        if probability > self.voice_threshold {
            self.consecutive_voice_frames += 1;
            self.consecutive_silence_frames = 0;

            if !self.voice_active && self.consecutive_voice_frames >= self.min_voice_frames {
                self.voice_active = true;
                debug!("Voice activity started (prob: {:.2})", probability);
                return Some(VoiceEvent::Start);
            }
        } else {
            self.consecutive_silence_frames += 1;
            self.consecutive_voice_frames = 0;

            if self.voice_active && self.consecutive_silence_frames >= self.min_silence_frames {
                self.voice_active = false;
                debug!("Voice activity ended (prob: {:.2})", probability);
                return Some(VoiceEvent::End);
            }
        }
        None
    }

    pub fn reset(&mut self) {
        self.consecutive_voice_frames = 0;
        self.consecutive_silence_frames = 0;
        self.voice_active = false;
    }
}
