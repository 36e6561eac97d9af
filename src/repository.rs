use chrono::Utc;
use log::{debug, info, warn};
use std::path::Path;
use tokio_stream::wrappers::ReceiverStream;

use crate::constants::{estimate_duration_secs, DEFAULT_SAMPLE_RATE};
use crate::database::{AppDatabase, RecordingDao, TranscriptionDao};
use crate::db::DynError;
use crate::model::{
    NewRecording, NewTranscription, Recording, RecordingStatistics, Transcription,
    TranscriptionStatus,
};

const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Current time as Unix milliseconds
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Remove an audio file; a file that is already gone is not an error
pub(crate) fn remove_audio_file(path: &Path) -> bool {
    match std::fs::remove_file(path) {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            warn!("Failed to delete audio file '{}': {}", path.display(), e);
            false
        }
    }
}

/// Single entry point for recording and transcription data
#[derive(Clone)]
pub struct RecordingRepository {
    recordings: RecordingDao,
    transcriptions: TranscriptionDao,
    retention_days: i64,
    sample_rate: u32,
}

impl RecordingRepository {
    pub fn new(db: &AppDatabase, retention_days: i64) -> Self {
        Self {
            recordings: db.recordings(),
            transcriptions: db.transcriptions(),
            retention_days,
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }

    /// Sample rate used to estimate durations from file sizes
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Store a finished recording file as PENDING, returning its id
    pub async fn save_recording(&self, file: &Path) -> Result<i64, DynError> {
        self.save_recording_at(file, now_ms()).await
    }

    /// Store a finished recording file with an explicit creation time
    pub async fn save_recording_at(&self, file: &Path, created_at: i64) -> Result<i64, DynError> {
        let file_size = std::fs::metadata(file)
            .map_err(|e| format!("Failed to read recording '{}': {}", file.display(), e))?
            .len();
        let absolute = std::fs::canonicalize(file)
            .map_err(|e| format!("Failed to resolve recording '{}': {}", file.display(), e))?;

        let recording = NewRecording {
            file_path: absolute.to_string_lossy().into_owned(),
            duration: estimate_duration_secs(file_size, self.sample_rate),
            file_size: file_size as i64,
            created_at,
            transcription_status: TranscriptionStatus::Pending,
            transcribed_at: None,
            delete_at: created_at + self.retention_days * MS_PER_DAY,
        };

        let id = self.recordings.insert(&recording).await?;
        info!(
            "Saved recording {} ({}s, {} bytes): {}",
            id, recording.duration, recording.file_size, recording.file_path
        );
        Ok(id)
    }

    pub async fn update_recording(&self, recording: &Recording) -> Result<(), DynError> {
        self.recordings.update(recording).await?;
        Ok(())
    }

    /// Delete the audio file, then the row (its transcription cascades)
    pub async fn delete_recording(&self, recording: &Recording) -> Result<(), DynError> {
        remove_audio_file(Path::new(&recording.file_path));
        self.recordings.delete(recording).await?;
        debug!("Deleted recording {}", recording.id);
        Ok(())
    }

    pub async fn get_recording_by_id(&self, id: i64) -> Result<Option<Recording>, DynError> {
        self.recordings.get_by_id(id).await
    }

    /// Live list of every recording, newest first
    pub fn observe_recordings(&self) -> ReceiverStream<Vec<Recording>> {
        self.recordings.observe_all()
    }

    pub async fn get_all_recordings(&self) -> Result<Vec<Recording>, DynError> {
        self.recordings.get_all().await
    }

    pub async fn get_recordings_by_status(
        &self,
        status: TranscriptionStatus,
    ) -> Result<Vec<Recording>, DynError> {
        self.recordings.get_by_status(status).await
    }

    /// Recordings waiting for transcription, oldest first
    pub async fn get_pending_recordings(&self) -> Result<Vec<Recording>, DynError> {
        self.recordings
            .get_by_status(TranscriptionStatus::Pending)
            .await
    }

    /// Change a recording's status. Unknown ids are ignored;
    /// `transcribed_at = None` keeps the stored value.
    pub async fn update_transcription_status(
        &self,
        recording_id: i64,
        status: TranscriptionStatus,
        transcribed_at: Option<i64>,
    ) -> Result<(), DynError> {
        let Some(recording) = self.recordings.get_by_id(recording_id).await? else {
            debug!("Status update for unknown recording {} ignored", recording_id);
            return Ok(());
        };

        let updated = Recording {
            transcription_status: status,
            transcribed_at: transcribed_at.or(recording.transcribed_at),
            ..recording
        };
        self.recordings.update(&updated).await?;
        Ok(())
    }

    /// Store a transcription and mark its recording COMPLETED, returning the transcription id
    pub async fn save_transcription(
        &self,
        recording_id: i64,
        text: &str,
        language: Option<&str>,
        segments: &str,
    ) -> Result<i64, DynError> {
        let transcription = NewTranscription {
            recording_id,
            text: text.to_string(),
            language: language.map(str::to_string),
            segments: segments.to_string(),
            created_at: now_ms(),
        };

        let id = self.transcriptions.insert(&transcription).await.map_err(|e| {
            format!(
                "Failed to save transcription for recording {}: {}",
                recording_id, e
            )
        })?;

        self.update_transcription_status(
            recording_id,
            TranscriptionStatus::Completed,
            Some(now_ms()),
        )
        .await?;

        info!("Saved transcription {} for recording {}", id, recording_id);
        Ok(id)
    }

    pub async fn get_transcription_by_recording_id(
        &self,
        recording_id: i64,
    ) -> Result<Option<Transcription>, DynError> {
        self.transcriptions.get_by_recording_id(recording_id).await
    }

    /// Live substring search over transcription text, newest first
    pub fn search_transcriptions(&self, keyword: &str) -> ReceiverStream<Vec<Transcription>> {
        self.transcriptions.observe_search(keyword)
    }

    pub async fn search_transcriptions_once(
        &self,
        keyword: &str,
    ) -> Result<Vec<Transcription>, DynError> {
        self.transcriptions.search(keyword).await
    }

    pub async fn get_transcriptions_by_date_range(
        &self,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<Transcription>, DynError> {
        self.transcriptions.get_by_date_range(start_ms, end_ms).await
    }

    pub async fn get_expired_recordings(&self) -> Result<Vec<Recording>, DynError> {
        self.get_expired_recordings_at(now_ms()).await
    }

    pub async fn get_expired_recordings_at(&self, now: i64) -> Result<Vec<Recording>, DynError> {
        self.recordings.get_expired(now).await
    }

    /// Delete expired audio files and their rows, returning the number of rows deleted
    pub async fn delete_expired_recordings(&self) -> Result<u64, DynError> {
        self.delete_expired_recordings_at(now_ms()).await
    }

    /// Expiry sweep against an explicit reference time
    pub async fn delete_expired_recordings_at(&self, now: i64) -> Result<u64, DynError> {
        let expired = self.recordings.get_expired(now).await?;
        for recording in &expired {
            remove_audio_file(Path::new(&recording.file_path));
        }

        let deleted = self.recordings.delete_expired(now).await?;
        if deleted > 0 {
            info!("Deleted {} expired recordings", deleted);
        }
        Ok(deleted)
    }

    /// Remove every recording row (files are left to the caller)
    pub async fn delete_all_recordings(&self) -> Result<u64, DynError> {
        self.recordings.delete_all().await
    }

    pub async fn get_recording_file_paths(&self) -> Result<Vec<String>, DynError> {
        self.recordings.file_paths().await
    }

    pub async fn get_statistics(&self) -> Result<RecordingStatistics, DynError> {
        self.recordings.statistics().await
    }
}
