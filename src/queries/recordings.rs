use sea_query::{Expr, Func, Order, Query, SqliteQueryBuilder};

use crate::model::{NewRecording, Recording, TranscriptionStatus};
use crate::schema::Recordings;

const ALL_COLUMNS: [Recordings; 8] = [
    Recordings::Id,
    Recordings::FilePath,
    Recordings::Duration,
    Recordings::FileSize,
    Recordings::CreatedAt,
    Recordings::TranscriptionStatus,
    Recordings::TranscribedAt,
    Recordings::DeleteAt,
];

/// INSERT INTO recordings (filePath, duration, fileSize, createdAt, transcriptionStatus, transcribedAt, deleteAt)
/// VALUES (?, ?, ?, ?, ?, ?, ?)
pub fn insert(recording: &NewRecording) -> String {
    Query::insert()
        .into_table(Recordings::Table)
        .columns([
            Recordings::FilePath,
            Recordings::Duration,
            Recordings::FileSize,
            Recordings::CreatedAt,
            Recordings::TranscriptionStatus,
            Recordings::TranscribedAt,
            Recordings::DeleteAt,
        ])
        .values_panic([
            recording.file_path.as_str().into(),
            recording.duration.into(),
            recording.file_size.into(),
            recording.created_at.into(),
            recording.transcription_status.as_str().into(),
            recording.transcribed_at.into(),
            recording.delete_at.into(),
        ])
        .to_string(SqliteQueryBuilder)
}

/// UPDATE recordings SET <every column> WHERE id = ?
pub fn update(recording: &Recording) -> String {
    Query::update()
        .table(Recordings::Table)
        .values([
            (Recordings::FilePath, recording.file_path.as_str().into()),
            (Recordings::Duration, recording.duration.into()),
            (Recordings::FileSize, recording.file_size.into()),
            (Recordings::CreatedAt, recording.created_at.into()),
            (
                Recordings::TranscriptionStatus,
                recording.transcription_status.as_str().into(),
            ),
            (Recordings::TranscribedAt, recording.transcribed_at.into()),
            (Recordings::DeleteAt, recording.delete_at.into()),
        ])
        .and_where(Expr::col(Recordings::Id).eq(recording.id))
        .to_string(SqliteQueryBuilder)
}

/// DELETE FROM recordings WHERE id = ?
pub fn delete_by_id(id: i64) -> String {
    Query::delete()
        .from_table(Recordings::Table)
        .and_where(Expr::col(Recordings::Id).eq(id))
        .to_string(SqliteQueryBuilder)
}

/// DELETE FROM recordings
pub fn delete_all() -> String {
    Query::delete()
        .from_table(Recordings::Table)
        .to_string(SqliteQueryBuilder)
}

/// SELECT * FROM recordings WHERE id = ?
pub fn select_by_id(id: i64) -> String {
    Query::select()
        .columns(ALL_COLUMNS)
        .from(Recordings::Table)
        .and_where(Expr::col(Recordings::Id).eq(id))
        .to_string(SqliteQueryBuilder)
}

/// SELECT * FROM recordings ORDER BY createdAt DESC
pub fn select_all_newest_first() -> String {
    Query::select()
        .columns(ALL_COLUMNS)
        .from(Recordings::Table)
        .order_by(Recordings::CreatedAt, Order::Desc)
        .order_by(Recordings::Id, Order::Desc)
        .to_string(SqliteQueryBuilder)
}

/// SELECT * FROM recordings WHERE transcriptionStatus = ? ORDER BY createdAt ASC
pub fn select_by_status_oldest_first(status: TranscriptionStatus) -> String {
    Query::select()
        .columns(ALL_COLUMNS)
        .from(Recordings::Table)
        .and_where(Expr::col(Recordings::TranscriptionStatus).eq(status.as_str()))
        .order_by(Recordings::CreatedAt, Order::Asc)
        .order_by(Recordings::Id, Order::Asc)
        .to_string(SqliteQueryBuilder)
}

/// SELECT * FROM recordings WHERE deleteAt < ?
pub fn select_expired(threshold_ms: i64) -> String {
    Query::select()
        .columns(ALL_COLUMNS)
        .from(Recordings::Table)
        .and_where(Expr::col(Recordings::DeleteAt).lt(threshold_ms))
        .order_by(Recordings::Id, Order::Asc)
        .to_string(SqliteQueryBuilder)
}

/// DELETE FROM recordings WHERE deleteAt < ?
pub fn delete_expired(threshold_ms: i64) -> String {
    Query::delete()
        .from_table(Recordings::Table)
        .and_where(Expr::col(Recordings::DeleteAt).lt(threshold_ms))
        .to_string(SqliteQueryBuilder)
}

/// SELECT COUNT(id), COALESCE(SUM(duration), 0), COALESCE(SUM(fileSize), 0) FROM recordings
pub fn select_statistics() -> String {
    Query::select()
        .expr(Func::count(Expr::col(Recordings::Id)))
        .expr(Func::coalesce([
            Func::sum(Expr::col(Recordings::Duration)).into(),
            Expr::val(0).into(),
        ]))
        .expr(Func::coalesce([
            Func::sum(Expr::col(Recordings::FileSize)).into(),
            Expr::val(0).into(),
        ]))
        .from(Recordings::Table)
        .to_string(SqliteQueryBuilder)
}

/// SELECT COUNT(id) FROM recordings WHERE transcriptionStatus = ?
pub fn count_by_status(status: TranscriptionStatus) -> String {
    Query::select()
        .expr(Func::count(Expr::col(Recordings::Id)))
        .from(Recordings::Table)
        .and_where(Expr::col(Recordings::TranscriptionStatus).eq(status.as_str()))
        .to_string(SqliteQueryBuilder)
}

/// SELECT filePath FROM recordings
pub fn select_file_paths() -> String {
    Query::select()
        .column(Recordings::FilePath)
        .from(Recordings::Table)
        .to_string(SqliteQueryBuilder)
}
