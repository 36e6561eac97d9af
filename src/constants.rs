use rand::Rng;

/// Expected database schema version
/// All databases must use this version for compatibility
pub const EXPECTED_DB_VERSION: &str = "1";

/// Default retention window for recordings (in days)
pub const DEFAULT_RETENTION_DAYS: i64 = 7;

/// Capture format: mono, 16-bit signed PCM
pub const DEFAULT_SAMPLE_RATE: u32 = 16000;
pub const CHANNELS: u16 = 1;
pub const BITS_PER_SAMPLE: u16 = 16;

/// Size of a canonical PCM WAV header (RIFF + fmt + data chunk headers)
pub const WAV_HEADER_SIZE: u64 = 44;

/// Free space below this watermark triggers cleanup
pub const DEFAULT_MIN_AVAILABLE_SPACE_MB: u64 = 500;
pub const BYTES_PER_MB: u64 = 1024 * 1024;

/// Status subdirectories under the recordings root
pub const PENDING_DIR: &str = "pending";
pub const PROCESSING_DIR: &str = "processing";
pub const COMPLETED_DIR: &str = "completed";
pub const FAILED_DIR: &str = "failed";
pub const STATUS_DIRS: [&str; 4] = [PENDING_DIR, PROCESSING_DIR, COMPLETED_DIR, FAILED_DIR];

/// Generate a unique database ID
pub fn generate_db_unique_id() -> String {
    format!(
        "db_{}",
        rand::thread_rng()
            .sample_iter(&rand::distributions::Alphanumeric)
            .take(12)
            .map(char::from)
            .collect::<String>()
    )
}

/// Estimate the duration (whole seconds) of a mono 16-bit WAV file from its size
pub fn estimate_duration_secs(file_size: u64, sample_rate: u32) -> i64 {
    let bytes_per_second = sample_rate as u64 * (BITS_PER_SAMPLE as u64 / 8) * CHANNELS as u64;
    if bytes_per_second == 0 {
        return 0;
    }
    (file_size.saturating_sub(WAV_HEADER_SIZE) / bytes_per_second) as i64
}
