use std::path::{Path, PathBuf};

use voice_journal::database::AppDatabase;
use voice_journal::model::TranscriptionStatus;
use voice_journal::repository::{now_ms, RecordingRepository};

const DAY_MS: i64 = 86_400_000;

/// Helper to create a repository over a fresh database
/// Returns (repo, _guard) - keep _guard alive to prevent temp file deletion
async fn create_test_repository(retention_days: i64) -> (RecordingRepository, tempfile::TempDir) {
    let (pool, guard) = voice_journal::db::create_test_connection_in_temporary_file()
        .await
        .unwrap();
    voice_journal::db::init_database_schema(&pool).await.unwrap();
    let db = AppDatabase::new(pool);
    (RecordingRepository::new(&db, retention_days), guard)
}

/// Write a file of exactly `size` bytes (contents are irrelevant to the store)
fn write_audio_file(dir: &Path, name: &str, size: usize) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, vec![0u8; size]).unwrap();
    path
}

#[tokio::test]
async fn test_save_recording_derives_metadata() {
    let (repo, guard) = create_test_repository(7).await;
    // 44-byte header + 5 seconds of 16 kHz mono 16-bit audio
    let file = write_audio_file(guard.path(), "voice.wav", 44 + 160_000);

    let created_at = 1_700_000_000_000;
    let id = repo.save_recording_at(&file, created_at).await.unwrap();
    let recording = repo.get_recording_by_id(id).await.unwrap().unwrap();

    assert_eq!(recording.duration, 5);
    assert_eq!(recording.file_size, 160_044);
    assert_eq!(recording.created_at, created_at);
    assert_eq!(recording.delete_at, created_at + 7 * DAY_MS);
    assert_eq!(recording.transcription_status, TranscriptionStatus::Pending);
    assert_eq!(recording.transcribed_at, None);
    assert!(Path::new(&recording.file_path).is_absolute());
    assert_eq!(
        Path::new(&recording.file_path),
        std::fs::canonicalize(&file).unwrap()
    );
}

#[tokio::test]
async fn test_save_recording_uses_current_time() {
    let (repo, guard) = create_test_repository(3).await;
    let file = write_audio_file(guard.path(), "now.wav", 44);

    let before = now_ms();
    let id = repo.save_recording(&file).await.unwrap();
    let after = now_ms();

    let recording = repo.get_recording_by_id(id).await.unwrap().unwrap();
    assert!(recording.created_at >= before && recording.created_at <= after);
    assert_eq!(recording.delete_at - recording.created_at, 3 * DAY_MS);
}

#[tokio::test]
async fn test_short_file_has_zero_duration() {
    let (repo, guard) = create_test_repository(7).await;
    let file = write_audio_file(guard.path(), "tiny.wav", 10);

    let id = repo.save_recording(&file).await.unwrap();
    let recording = repo.get_recording_by_id(id).await.unwrap().unwrap();
    assert_eq!(recording.duration, 0);
    assert_eq!(recording.file_size, 10);
}

#[tokio::test]
async fn test_save_missing_file_fails() {
    let (repo, guard) = create_test_repository(7).await;
    let result = repo.save_recording(&guard.path().join("missing.wav")).await;
    assert!(result.is_err());
    assert!(repo.get_all_recordings().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_update_status_keeps_transcribed_at_when_absent() {
    let (repo, guard) = create_test_repository(7).await;
    let file = write_audio_file(guard.path(), "a.wav", 1000);
    let id = repo.save_recording_at(&file, 1000).await.unwrap();

    repo.update_transcription_status(id, TranscriptionStatus::Processing, None)
        .await
        .unwrap();
    let recording = repo.get_recording_by_id(id).await.unwrap().unwrap();
    assert_eq!(recording.transcription_status, TranscriptionStatus::Processing);
    assert_eq!(recording.transcribed_at, None);

    repo.update_transcription_status(id, TranscriptionStatus::Completed, Some(5000))
        .await
        .unwrap();
    repo.update_transcription_status(id, TranscriptionStatus::Failed, None)
        .await
        .unwrap();
    let recording = repo.get_recording_by_id(id).await.unwrap().unwrap();
    assert_eq!(recording.transcription_status, TranscriptionStatus::Failed);
    assert_eq!(recording.transcribed_at, Some(5000));

    // Other columns are untouched
    assert_eq!(recording.created_at, 1000);
    assert_eq!(recording.file_size, 1000);
}

#[tokio::test]
async fn test_update_status_of_unknown_recording_is_noop() {
    let (repo, _guard) = create_test_repository(7).await;
    repo.update_transcription_status(99, TranscriptionStatus::Completed, Some(1))
        .await
        .unwrap();
    assert!(repo.get_all_recordings().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_pending_recordings_oldest_first() {
    let (repo, guard) = create_test_repository(7).await;
    let mut ids = Vec::new();
    for (i, created_at) in [3000, 1000, 2000].iter().enumerate() {
        let file = write_audio_file(guard.path(), &format!("{}.wav", i), 100);
        ids.push(repo.save_recording_at(&file, *created_at).await.unwrap());
    }
    repo.update_transcription_status(ids[2], TranscriptionStatus::Processing, None)
        .await
        .unwrap();

    let pending: Vec<i64> = repo
        .get_pending_recordings()
        .await
        .unwrap()
        .iter()
        .map(|r| r.created_at)
        .collect();
    assert_eq!(pending, vec![1000, 3000]);

    let processing = repo
        .get_recordings_by_status(TranscriptionStatus::Processing)
        .await
        .unwrap();
    assert_eq!(processing.len(), 1);
    assert_eq!(processing[0].id, ids[2]);
}

#[tokio::test]
async fn test_save_transcription_completes_recording() {
    let (repo, guard) = create_test_repository(7).await;
    let file = write_audio_file(guard.path(), "a.wav", 1000);
    let id = repo.save_recording_at(&file, 1000).await.unwrap();

    let before = now_ms();
    let transcription_id = repo
        .save_transcription(id, "pick up the kids at five", Some("en"), "[]")
        .await
        .unwrap();

    let recording = repo.get_recording_by_id(id).await.unwrap().unwrap();
    assert_eq!(recording.transcription_status, TranscriptionStatus::Completed);
    assert!(recording.transcribed_at.unwrap() >= before);

    let transcription = repo
        .get_transcription_by_recording_id(id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(transcription.id, transcription_id);
    assert_eq!(transcription.text, "pick up the kids at five");
    assert_eq!(transcription.language.as_deref(), Some("en"));
    assert_eq!(transcription.segments, "[]");
    assert!(transcription.created_at >= before);

    let found = repo.search_transcriptions_once("kids").await.unwrap();
    assert_eq!(found.len(), 1);
}

#[tokio::test]
async fn test_save_transcription_for_unknown_recording_fails() {
    let (repo, _guard) = create_test_repository(7).await;
    let result = repo.save_transcription(12, "nobody", None, "").await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_delete_recording_removes_file_and_transcription() {
    let (repo, guard) = create_test_repository(7).await;
    let file = write_audio_file(guard.path(), "gone.wav", 500);
    let id = repo.save_recording(&file).await.unwrap();
    repo.save_transcription(id, "text", None, "[]").await.unwrap();

    let recording = repo.get_recording_by_id(id).await.unwrap().unwrap();
    repo.delete_recording(&recording).await.unwrap();

    assert!(!file.exists());
    assert!(repo.get_recording_by_id(id).await.unwrap().is_none());
    assert!(repo.get_transcription_by_recording_id(id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_delete_recording_with_missing_file_still_deletes_row() {
    let (repo, guard) = create_test_repository(7).await;
    let file = write_audio_file(guard.path(), "vanishing.wav", 500);
    let id = repo.save_recording(&file).await.unwrap();
    std::fs::remove_file(&file).unwrap();

    let recording = repo.get_recording_by_id(id).await.unwrap().unwrap();
    repo.delete_recording(&recording).await.unwrap();
    assert!(repo.get_recording_by_id(id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_expiry_sweep_removes_files_and_rows() {
    let (repo, guard) = create_test_repository(1).await;
    let old_file = write_audio_file(guard.path(), "old.wav", 300);
    let new_file = write_audio_file(guard.path(), "new.wav", 300);

    let now = 10 * DAY_MS;
    let old_id = repo.save_recording_at(&old_file, now - 2 * DAY_MS).await.unwrap();
    let new_id = repo.save_recording_at(&new_file, now).await.unwrap();
    repo.save_transcription(old_id, "stale", None, "[]").await.unwrap();

    let expired = repo.get_expired_recordings_at(now).await.unwrap();
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].id, old_id);

    let deleted = repo.delete_expired_recordings_at(now).await.unwrap();
    assert_eq!(deleted, 1);
    assert!(!old_file.exists());
    assert!(new_file.exists());
    assert!(repo.get_transcription_by_recording_id(old_id).await.unwrap().is_none());

    let remaining = repo.get_all_recordings().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, new_id);

    // Nothing left to expire at the same instant
    assert_eq!(repo.delete_expired_recordings_at(now).await.unwrap(), 0);
}

#[tokio::test]
async fn test_recording_exactly_at_threshold_is_kept() {
    let (repo, guard) = create_test_repository(1).await;
    let file = write_audio_file(guard.path(), "edge.wav", 300);
    let id = repo.save_recording_at(&file, 0).await.unwrap();

    assert!(repo.get_expired_recordings_at(DAY_MS).await.unwrap().is_empty());
    let expired = repo.get_expired_recordings_at(DAY_MS + 1).await.unwrap();
    assert_eq!(expired[0].id, id);
}

#[tokio::test]
async fn test_statistics_and_date_range() {
    let (repo, guard) = create_test_repository(7).await;
    let a = write_audio_file(guard.path(), "a.wav", 44 + 32_000 * 3);
    let b = write_audio_file(guard.path(), "b.wav", 44 + 32_000 * 2);
    let a_id = repo.save_recording(&a).await.unwrap();
    let b_id = repo.save_recording(&b).await.unwrap();
    repo.save_transcription(a_id, "first note", None, "[]")
        .await
        .unwrap();

    let stats = repo.get_statistics().await.unwrap();
    assert_eq!(stats.total_count, 2);
    assert_eq!(stats.total_duration_seconds, 5);
    assert_eq!(stats.total_size_bytes, 44 * 2 + 32_000 * 5);
    assert_eq!(stats.pending_count, 1);

    let in_range = repo
        .get_transcriptions_by_date_range(0, now_ms())
        .await
        .unwrap();
    assert_eq!(in_range.len(), 1);
    assert_eq!(in_range[0].recording_id, a_id);
    assert!(repo
        .get_transcription_by_recording_id(b_id)
        .await
        .unwrap()
        .is_none());
}
