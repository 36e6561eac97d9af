use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::BYTES_PER_MB;

/// Transcription progress of a recording, persisted as its upper-case name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TranscriptionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TranscriptionStatus {
    pub const ALL: [TranscriptionStatus; 4] = [
        TranscriptionStatus::Pending,
        TranscriptionStatus::Processing,
        TranscriptionStatus::Completed,
        TranscriptionStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TranscriptionStatus::Pending => "PENDING",
            TranscriptionStatus::Processing => "PROCESSING",
            TranscriptionStatus::Completed => "COMPLETED",
            TranscriptionStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for TranscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseStatusError(String);

impl fmt::Display for ParseStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Unknown transcription status '{}', expected one of PENDING, PROCESSING, COMPLETED, FAILED",
            self.0
        )
    }
}

impl std::error::Error for ParseStatusError {}

impl FromStr for TranscriptionStatus {
    type Err = ParseStatusError;

    /// Accepts the stored upper-case names; the CLI also passes lower-case input
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(TranscriptionStatus::Pending),
            "PROCESSING" => Ok(TranscriptionStatus::Processing),
            "COMPLETED" => Ok(TranscriptionStatus::Completed),
            "FAILED" => Ok(TranscriptionStatus::Failed),
            _ => Err(ParseStatusError(s.to_string())),
        }
    }
}

/// A persisted recording row. Timestamps are Unix milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recording {
    pub id: i64,
    pub file_path: String,
    /// Seconds
    pub duration: i64,
    /// Bytes
    pub file_size: i64,
    pub created_at: i64,
    pub transcription_status: TranscriptionStatus,
    pub transcribed_at: Option<i64>,
    pub delete_at: i64,
}

/// A recording that has not been inserted yet (id is assigned by the database)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecording {
    pub file_path: String,
    pub duration: i64,
    pub file_size: i64,
    pub created_at: i64,
    pub transcription_status: TranscriptionStatus,
    pub transcribed_at: Option<i64>,
    pub delete_at: i64,
}

/// A persisted transcription row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcription {
    pub id: i64,
    pub recording_id: i64,
    pub text: String,
    pub language: Option<String>,
    /// Opaque text-encoded segment data, see [`TranscriptSegment`]
    pub segments: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTranscription {
    pub recording_id: i64,
    pub text: String,
    pub language: Option<String>,
    pub segments: String,
    pub created_at: i64,
}

/// Aggregate numbers over every stored recording
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecordingStatistics {
    pub total_count: i64,
    pub total_duration_seconds: i64,
    pub total_size_bytes: i64,
    pub pending_count: i64,
}

impl RecordingStatistics {
    pub fn total_duration_minutes(&self) -> i64 {
        self.total_duration_seconds / 60
    }

    pub fn total_size_mb(&self) -> i64 {
        self.total_size_bytes / BYTES_PER_MB as i64
    }
}

/// One timed piece of a transcription
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub start_ms: i64,
    pub end_ms: i64,
    pub text: String,
}

/// Encode segments into the JSON text stored in `transcriptions.segments`
pub fn encode_segments(segments: &[TranscriptSegment]) -> Result<String, serde_json::Error> {
    serde_json::to_string(segments)
}

/// Decode the `segments` column; an empty column means no segments
pub fn decode_segments(data: &str) -> Result<Vec<TranscriptSegment>, serde_json::Error> {
    if data.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_names_match_storage_format() {
        for status in TranscriptionStatus::ALL {
            let parsed: TranscriptionStatus = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
        }
        assert_eq!(TranscriptionStatus::Processing.as_str(), "PROCESSING");
    }

    #[test]
    fn test_status_parse_is_case_insensitive() {
        assert_eq!(
            "completed".parse::<TranscriptionStatus>().unwrap(),
            TranscriptionStatus::Completed
        );
        assert!("done".parse::<TranscriptionStatus>().is_err());
    }

    #[test]
    fn test_statistics_units() {
        let stats = RecordingStatistics {
            total_count: 2,
            total_duration_seconds: 150,
            total_size_bytes: 3 * 1024 * 1024 + 10,
            pending_count: 1,
        };
        assert_eq!(stats.total_duration_minutes(), 2);
        assert_eq!(stats.total_size_mb(), 3);
    }

    #[test]
    fn test_segments_json() {
        let segments = vec![
            TranscriptSegment {
                start_ms: 0,
                end_ms: 1200,
                text: "hello".to_string(),
            },
            TranscriptSegment {
                start_ms: 1200,
                end_ms: 2500,
                text: "world".to_string(),
            },
        ];
        let encoded = encode_segments(&segments).unwrap();
        assert!(encoded.starts_with('['));
        assert_eq!(decode_segments(&encoded).unwrap(), segments);
    }

    #[test]
    fn test_decode_empty_segments() {
        assert!(decode_segments("").unwrap().is_empty());
        assert!(decode_segments("[]").unwrap().is_empty());
        assert!(decode_segments("{not json").is_err());
    }
}
