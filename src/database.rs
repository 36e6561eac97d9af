//! Data-access objects over the recordings and transcriptions tables
//!
//! Writes go through the DAOs so that every change bumps the version counter of
//! the tables it touched. Observers re-run their query whenever a counter they
//! watch moves and push the fresh result set to the subscriber. Writes made by
//! other processes sharing the database file are noticed through
//! `PRAGMA data_version`.

use log::{debug, error};
use sqlx::sqlite::{SqliteConnection, SqlitePool, SqliteRow};
use sqlx::{Connection, Row};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_stream::wrappers::ReceiverStream;

use crate::db::DynError;
use crate::model::{
    NewRecording, NewTranscription, Recording, RecordingStatistics, Transcription,
    TranscriptionStatus,
};
use crate::queries::{recordings, transcriptions};

/// Result sets queued per observer before the producer waits
const OBSERVER_BUFFER: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableName {
    Recordings,
    Transcriptions,
}

/// Per-table change counters
pub struct InvalidationTracker {
    recordings: watch::Sender<u64>,
    transcriptions: watch::Sender<u64>,
}

impl InvalidationTracker {
    pub fn new() -> Self {
        let (recordings, _) = watch::channel(0);
        let (transcriptions, _) = watch::channel(0);
        Self {
            recordings,
            transcriptions,
        }
    }

    fn sender(&self, table: TableName) -> &watch::Sender<u64> {
        match table {
            TableName::Recordings => &self.recordings,
            TableName::Transcriptions => &self.transcriptions,
        }
    }

    /// Mark tables as changed, waking every observer that depends on them
    pub fn notify(&self, tables: &[TableName]) {
        for table in tables {
            self.sender(*table).send_modify(|version| *version += 1);
        }
    }

    /// Current version of a table
    pub fn version(&self, table: TableName) -> u64 {
        *self.sender(table).borrow()
    }

    pub fn subscribe(&self, table: TableName) -> watch::Receiver<u64> {
        self.sender(table).subscribe()
    }
}

impl Default for InvalidationTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// How often an observer checks for commits made outside this process
const DATA_VERSION_POLL: Duration = Duration::from_millis(500);

async fn data_version(conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("PRAGMA data_version")
        .fetch_one(conn)
        .await
}

/// Run `query` now and again after every change to `table`, streaming each result set.
///
/// Changes made through this process's DAOs arrive via the tracker. Commits from
/// other connections or processes are picked up by polling `PRAGMA data_version`
/// on a connection owned by the observer; any such commit counts as a change to
/// `table`. A result set equal to the previous one is not sent again.
/// The background task ends when the stream is dropped or a query fails.
fn observe<T, F, Fut>(
    pool: SqlitePool,
    tracker: &InvalidationTracker,
    table: TableName,
    query: F,
) -> ReceiverStream<Vec<T>>
where
    T: Clone + PartialEq + Send + 'static,
    F: Fn(SqlitePool) -> Fut + Send + 'static,
    Fut: Future<Output = Result<Vec<T>, DynError>> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(OBSERVER_BUFFER);
    let mut changes = tracker.subscribe(table);

    tokio::spawn(async move {
        // Detached so a long-lived observer does not hold a pool slot
        let mut conn = match pool.acquire().await {
            Ok(conn) => conn.detach(),
            Err(e) => {
                error!("Observer on {:?} could not get a connection: {}", table, e);
                return;
            }
        };
        let mut poll = interval_at(Instant::now() + DATA_VERSION_POLL, DATA_VERSION_POLL);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_sent: Option<Vec<T>> = None;

        'observe: loop {
            // Read before querying so a commit racing the query is seen on the next tick
            let seen_version = match data_version(&mut conn).await {
                Ok(version) => version,
                Err(e) => {
                    error!("Observer on {:?} failed to read data_version: {}", table, e);
                    break;
                }
            };

            match query(pool.clone()).await {
                Ok(rows) => {
                    if last_sent.as_ref() != Some(&rows) {
                        if tx.send(rows.clone()).await.is_err() {
                            break;
                        }
                        last_sent = Some(rows);
                    }
                }
                Err(e) => {
                    error!("Observer query on {:?} failed: {}", table, e);
                    break;
                }
            }

            loop {
                tokio::select! {
                    changed = changes.changed() => {
                        if changed.is_err() {
                            break 'observe;
                        }
                        break;
                    }
                    _ = poll.tick() => match data_version(&mut conn).await {
                        Ok(version) if version != seen_version => {
                            debug!("External commit detected by observer on {:?}", table);
                            break;
                        }
                        Ok(_) => {}
                        Err(e) => {
                            error!("Observer on {:?} failed to read data_version: {}", table, e);
                            break 'observe;
                        }
                    },
                    _ = tx.closed() => break 'observe,
                }
            }
        }

        let _ = conn.close().await;
        debug!("Observer on {:?} stopped", table);
    });

    ReceiverStream::new(rx)
}

fn recording_from_row(row: &SqliteRow) -> Result<Recording, DynError> {
    let status: String = row.try_get("transcriptionStatus")?;
    Ok(Recording {
        id: row.try_get("id")?,
        file_path: row.try_get("filePath")?,
        duration: row.try_get("duration")?,
        file_size: row.try_get("fileSize")?,
        created_at: row.try_get("createdAt")?,
        transcription_status: status.parse::<TranscriptionStatus>()?,
        transcribed_at: row.try_get("transcribedAt")?,
        delete_at: row.try_get("deleteAt")?,
    })
}

fn transcription_from_row(row: &SqliteRow) -> Result<Transcription, DynError> {
    Ok(Transcription {
        id: row.try_get("id")?,
        recording_id: row.try_get("recordingId")?,
        text: row.try_get("text")?,
        language: row.try_get("language")?,
        segments: row.try_get("segments")?,
        created_at: row.try_get("createdAt")?,
    })
}

async fn fetch_recordings(pool: &SqlitePool, sql: &str) -> Result<Vec<Recording>, DynError> {
    let rows = sqlx::query(sql).fetch_all(pool).await?;
    rows.iter().map(recording_from_row).collect()
}

async fn fetch_transcriptions(pool: &SqlitePool, sql: &str) -> Result<Vec<Transcription>, DynError> {
    let rows = sqlx::query(sql).fetch_all(pool).await?;
    rows.iter().map(transcription_from_row).collect()
}

/// Single database object handing out the two DAOs
#[derive(Clone)]
pub struct AppDatabase {
    pool: SqlitePool,
    tracker: Arc<InvalidationTracker>,
}

impl AppDatabase {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            tracker: Arc::new(InvalidationTracker::new()),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn tracker(&self) -> &InvalidationTracker {
        &self.tracker
    }

    pub fn recordings(&self) -> RecordingDao {
        RecordingDao {
            pool: self.pool.clone(),
            tracker: Arc::clone(&self.tracker),
        }
    }

    pub fn transcriptions(&self) -> TranscriptionDao {
        TranscriptionDao {
            pool: self.pool.clone(),
            tracker: Arc::clone(&self.tracker),
        }
    }
}

#[derive(Clone)]
pub struct RecordingDao {
    pool: SqlitePool,
    tracker: Arc<InvalidationTracker>,
}

impl RecordingDao {
    /// Insert a recording, returning its assigned id
    pub async fn insert(&self, recording: &NewRecording) -> Result<i64, DynError> {
        let sql = recordings::insert(recording);
        let result = sqlx::query(&sql).execute(&self.pool).await?;
        self.tracker.notify(&[TableName::Recordings]);
        Ok(result.last_insert_rowid())
    }

    /// Overwrite every column of the row with the same id. Returns rows affected.
    pub async fn update(&self, recording: &Recording) -> Result<u64, DynError> {
        let sql = recordings::update(recording);
        let result = sqlx::query(&sql).execute(&self.pool).await?;
        if result.rows_affected() > 0 {
            self.tracker.notify(&[TableName::Recordings]);
        }
        Ok(result.rows_affected())
    }

    /// Delete the row with this recording's id (its transcriptions cascade)
    pub async fn delete(&self, recording: &Recording) -> Result<u64, DynError> {
        let sql = recordings::delete_by_id(recording.id);
        let result = sqlx::query(&sql).execute(&self.pool).await?;
        if result.rows_affected() > 0 {
            self.tracker
                .notify(&[TableName::Recordings, TableName::Transcriptions]);
        }
        Ok(result.rows_affected())
    }

    pub async fn delete_all(&self) -> Result<u64, DynError> {
        let result = sqlx::query(&recordings::delete_all())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() > 0 {
            self.tracker
                .notify(&[TableName::Recordings, TableName::Transcriptions]);
        }
        Ok(result.rows_affected())
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Recording>, DynError> {
        let sql = recordings::select_by_id(id);
        let row = sqlx::query(&sql).fetch_optional(&self.pool).await?;
        row.as_ref().map(recording_from_row).transpose()
    }

    /// Every recording, newest first
    pub async fn get_all(&self) -> Result<Vec<Recording>, DynError> {
        fetch_recordings(&self.pool, &recordings::select_all_newest_first()).await
    }

    /// Live list of every recording, newest first
    pub fn observe_all(&self) -> ReceiverStream<Vec<Recording>> {
        observe(
            self.pool.clone(),
            &self.tracker,
            TableName::Recordings,
            |pool| async move {
                fetch_recordings(&pool, &recordings::select_all_newest_first()).await
            },
        )
    }

    /// Recordings in a given status, oldest first
    pub async fn get_by_status(
        &self,
        status: TranscriptionStatus,
    ) -> Result<Vec<Recording>, DynError> {
        fetch_recordings(&self.pool, &recordings::select_by_status_oldest_first(status)).await
    }

    /// Recordings whose deleteAt is strictly before the threshold
    pub async fn get_expired(&self, threshold_ms: i64) -> Result<Vec<Recording>, DynError> {
        fetch_recordings(&self.pool, &recordings::select_expired(threshold_ms)).await
    }

    /// Delete recordings whose deleteAt is strictly before the threshold, returning the count
    pub async fn delete_expired(&self, threshold_ms: i64) -> Result<u64, DynError> {
        let sql = recordings::delete_expired(threshold_ms);
        let result = sqlx::query(&sql).execute(&self.pool).await?;
        if result.rows_affected() > 0 {
            self.tracker
                .notify(&[TableName::Recordings, TableName::Transcriptions]);
        }
        Ok(result.rows_affected())
    }

    pub async fn statistics(&self) -> Result<RecordingStatistics, DynError> {
        let row = sqlx::query(&recordings::select_statistics())
            .fetch_one(&self.pool)
            .await?;
        let pending_count: i64 =
            sqlx::query_scalar(&recordings::count_by_status(TranscriptionStatus::Pending))
                .fetch_one(&self.pool)
                .await?;

        Ok(RecordingStatistics {
            total_count: row.try_get(0)?,
            total_duration_seconds: row.try_get(1)?,
            total_size_bytes: row.try_get(2)?,
            pending_count,
        })
    }

    /// File paths of every stored recording
    pub async fn file_paths(&self) -> Result<Vec<String>, DynError> {
        let paths: Vec<String> = sqlx::query_scalar(&recordings::select_file_paths())
            .fetch_all(&self.pool)
            .await?;
        Ok(paths)
    }
}

#[derive(Clone)]
pub struct TranscriptionDao {
    pool: SqlitePool,
    tracker: Arc<InvalidationTracker>,
}

impl TranscriptionDao {
    /// Insert a transcription, returning its assigned id.
    /// Fails with a foreign key violation when the recording does not exist.
    pub async fn insert(&self, transcription: &NewTranscription) -> Result<i64, DynError> {
        let sql = transcriptions::insert(transcription);
        let result = sqlx::query(&sql).execute(&self.pool).await?;
        self.tracker.notify(&[TableName::Transcriptions]);
        Ok(result.last_insert_rowid())
    }

    /// The transcription of a recording (lowest id if several were stored)
    pub async fn get_by_recording_id(
        &self,
        recording_id: i64,
    ) -> Result<Option<Transcription>, DynError> {
        let sql = transcriptions::select_by_recording_id(recording_id);
        let row = sqlx::query(&sql).fetch_optional(&self.pool).await?;
        row.as_ref().map(transcription_from_row).transpose()
    }

    /// One-shot substring search, newest first
    pub async fn search(&self, keyword: &str) -> Result<Vec<Transcription>, DynError> {
        fetch_transcriptions(&self.pool, &transcriptions::search_by_keyword(keyword)).await
    }

    /// Live substring search, newest first
    pub fn observe_search(&self, keyword: &str) -> ReceiverStream<Vec<Transcription>> {
        let sql = transcriptions::search_by_keyword(keyword);
        observe(
            self.pool.clone(),
            &self.tracker,
            TableName::Transcriptions,
            move |pool| {
                let sql = sql.clone();
                async move { fetch_transcriptions(&pool, &sql).await }
            },
        )
    }

    /// Transcriptions created within [start_ms, end_ms], newest first
    pub async fn get_by_date_range(
        &self,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<Transcription>, DynError> {
        fetch_transcriptions(
            &self.pool,
            &transcriptions::select_by_date_range(start_ms, end_ms),
        )
        .await
    }
}
