use fs2::FileExt;
use log::{debug, error, info, warn};
use serde::Serialize;
use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::constants::{
    BYTES_PER_MB, COMPLETED_DIR, FAILED_DIR, PENDING_DIR, PROCESSING_DIR, STATUS_DIRS,
};
use crate::db::DynError;
use crate::repository::{now_ms, remove_audio_file, RecordingRepository};

const CLEANUP_LOCK_FILE: &str = ".cleanup.lock";

/// Outcome of a cleanup pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupResult {
    pub deleted_files: u64,
    pub freed_space_bytes: u64,
}

impl CleanupResult {
    pub fn freed_space_mb(&self) -> u64 {
        self.freed_space_bytes / BYTES_PER_MB
    }
}

/// Snapshot of disk usage and recording counts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageInfo {
    pub available_space_mb: u64,
    pub used_space_mb: u64,
    pub total_recordings: i64,
    pub pending_recordings: i64,
    pub has_enough_space: bool,
}

/// Owns the recordings directory tree and keeps it within bounds
pub struct StorageManager {
    recordings_dir: PathBuf,
    repository: RecordingRepository,
    min_available_space_mb: u64,
}

fn file_len(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

/// Regular files directly inside a directory; a missing directory yields nothing
fn list_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect()
}

/// Total size of every file below a directory
pub fn directory_size(dir: &Path) -> std::io::Result<u64> {
    let mut size = 0;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let metadata = entry.metadata()?;
        size += if metadata.is_dir() {
            directory_size(&entry.path())?
        } else {
            metadata.len()
        };
    }
    Ok(size)
}

impl StorageManager {
    pub fn new(
        recordings_dir: impl Into<PathBuf>,
        repository: RecordingRepository,
        min_available_space_mb: u64,
    ) -> Self {
        Self {
            recordings_dir: recordings_dir.into(),
            repository,
            min_available_space_mb,
        }
    }

    pub fn recordings_dir(&self) -> &Path {
        &self.recordings_dir
    }

    /// Directory for one of pending/processing/completed/failed
    pub fn status_dir(&self, name: &str) -> PathBuf {
        self.recordings_dir.join(name)
    }

    /// Create the recordings root and its status subdirectories
    pub fn init(&self) -> Result<(), DynError> {
        for dir in STATUS_DIRS {
            let path = self.status_dir(dir);
            std::fs::create_dir_all(&path)
                .map_err(|e| format!("Failed to create directory '{}': {}", path.display(), e))?;
        }
        debug!(
            "Storage manager initialized: {}",
            self.recordings_dir.display()
        );
        Ok(())
    }

    /// Free space on the recordings filesystem; 0 when it cannot be determined
    pub fn available_space_mb(&self) -> u64 {
        match fs2::available_space(&self.recordings_dir) {
            Ok(bytes) => bytes / BYTES_PER_MB,
            Err(e) => {
                error!("Failed to get available space: {}", e);
                0
            }
        }
    }

    /// Space used by the recordings tree; 0 when it cannot be determined
    pub fn used_space_mb(&self) -> u64 {
        match directory_size(&self.recordings_dir) {
            Ok(bytes) => bytes / BYTES_PER_MB,
            Err(e) => {
                error!("Failed to get used space: {}", e);
                0
            }
        }
    }

    pub fn has_enough_space(&self) -> bool {
        self.available_space_mb() >= self.min_available_space_mb
    }

    /// Run a cleanup pass against the current time
    pub async fn perform_cleanup(&self) -> Result<CleanupResult, DynError> {
        self.perform_cleanup_at(now_ms()).await
    }

    /// Remove expired recordings, failed files, temporary files and unreferenced audio.
    /// Skipped (empty result) when another cleanup holds the lock.
    pub async fn perform_cleanup_at(&self, now: i64) -> Result<CleanupResult, DynError> {
        self.init()?;
        let lock_path = self.recordings_dir.join(CLEANUP_LOCK_FILE);
        let lock_file = File::create(&lock_path)
            .map_err(|e| format!("Failed to create lock file '{}': {}", lock_path.display(), e))?;
        if lock_file.try_lock_exclusive().is_err() {
            warn!("Another cleanup is already running, skipping");
            return Ok(CleanupResult::default());
        }
        // Lock is held until lock_file is dropped (end of function)

        info!("Starting cleanup...");
        let mut result = CleanupResult::default();

        let expired = self.repository.get_expired_recordings_at(now).await?;
        let expired_bytes: u64 = expired
            .iter()
            .map(|r| file_len(Path::new(&r.file_path)))
            .sum();
        let expired_count = self.repository.delete_expired_recordings_at(now).await?;
        result.deleted_files += expired_count;
        result.freed_space_bytes += expired_bytes;
        debug!("Deleted {} expired recordings", expired_count);

        let mut failed_count = 0;
        for path in list_files(&self.status_dir(FAILED_DIR)) {
            let size = file_len(&path);
            if remove_audio_file(&path) {
                result.deleted_files += 1;
                result.freed_space_bytes += size;
                failed_count += 1;
            }
        }
        debug!("Deleted {} failed files", failed_count);

        let orphans = self.clean_orphan_files().await?;
        result.deleted_files += orphans.deleted_files;
        result.freed_space_bytes += orphans.freed_space_bytes;
        debug!("Deleted {} orphan files", orphans.deleted_files);

        info!(
            "Cleanup completed: {} files, {}MB freed",
            result.deleted_files,
            result.freed_space_mb()
        );
        Ok(result)
    }

    /// Temporary files anywhere outside failed/, plus audio files in processing/ and
    /// completed/ that no recording row refers to. pending/ may hold a capture in
    /// progress, so only its temporary files are touched.
    async fn clean_orphan_files(&self) -> Result<CleanupResult, DynError> {
        let known: HashSet<PathBuf> = self
            .repository
            .get_recording_file_paths()
            .await?
            .into_iter()
            .map(PathBuf::from)
            .collect();

        let mut result = CleanupResult::default();
        for dir in [PENDING_DIR, PROCESSING_DIR, COMPLETED_DIR] {
            for path in list_files(&self.status_dir(dir)) {
                let is_tmp = path.extension().map_or(false, |ext| ext == "tmp");
                let is_unreferenced = dir != PENDING_DIR
                    && !std::fs::canonicalize(&path)
                        .map(|abs| known.contains(&abs))
                        .unwrap_or(false);

                if is_tmp || is_unreferenced {
                    let size = file_len(&path);
                    if remove_audio_file(&path) {
                        result.deleted_files += 1;
                        result.freed_space_bytes += size;
                    }
                }
            }
        }
        Ok(result)
    }

    pub async fn storage_info(&self) -> Result<StorageInfo, DynError> {
        let available_space_mb = self.available_space_mb();
        let used_space_mb = self.used_space_mb();
        let stats = self.repository.get_statistics().await?;

        Ok(StorageInfo {
            available_space_mb,
            used_space_mb,
            total_recordings: stats.total_count,
            pending_recordings: stats.pending_count,
            has_enough_space: available_space_mb >= self.min_available_space_mb,
        })
    }

    /// Delete every audio file and recording row, then recreate the empty tree
    pub async fn clear_all_data(&self) -> Result<(), DynError> {
        if self.recordings_dir.exists() {
            std::fs::remove_dir_all(&self.recordings_dir).map_err(|e| {
                format!(
                    "Failed to remove '{}': {}",
                    self.recordings_dir.display(),
                    e
                )
            })?;
        }
        let rows = self.repository.delete_all_recordings().await?;
        self.init()?;
        info!("All data cleared ({} recordings)", rows);
        Ok(())
    }
}
