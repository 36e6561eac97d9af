use sea_query::{Expr, Order, Query, SqliteQueryBuilder};

use crate::model::NewTranscription;
use crate::schema::Transcriptions;

const ALL_COLUMNS: [Transcriptions; 6] = [
    Transcriptions::Id,
    Transcriptions::RecordingId,
    Transcriptions::Text,
    Transcriptions::Language,
    Transcriptions::Segments,
    Transcriptions::CreatedAt,
];

/// INSERT INTO transcriptions (recordingId, text, language, segments, createdAt) VALUES (?, ?, ?, ?, ?)
pub fn insert(transcription: &NewTranscription) -> String {
    Query::insert()
        .into_table(Transcriptions::Table)
        .columns([
            Transcriptions::RecordingId,
            Transcriptions::Text,
            Transcriptions::Language,
            Transcriptions::Segments,
            Transcriptions::CreatedAt,
        ])
        .values_panic([
            transcription.recording_id.into(),
            transcription.text.as_str().into(),
            transcription.language.clone().into(),
            transcription.segments.as_str().into(),
            transcription.created_at.into(),
        ])
        .to_string(SqliteQueryBuilder)
}

/// SELECT * FROM transcriptions WHERE recordingId = ? ORDER BY id LIMIT 1
pub fn select_by_recording_id(recording_id: i64) -> String {
    Query::select()
        .columns(ALL_COLUMNS)
        .from(Transcriptions::Table)
        .and_where(Expr::col(Transcriptions::RecordingId).eq(recording_id))
        .order_by(Transcriptions::Id, Order::Asc)
        .limit(1)
        .to_string(SqliteQueryBuilder)
}

/// SELECT * FROM transcriptions WHERE text LIKE '%' || ? || '%' ORDER BY createdAt DESC
pub fn search_by_keyword(keyword: &str) -> String {
    Query::select()
        .columns(ALL_COLUMNS)
        .from(Transcriptions::Table)
        .and_where(Expr::col(Transcriptions::Text).like(format!("%{}%", keyword)))
        .order_by(Transcriptions::CreatedAt, Order::Desc)
        .order_by(Transcriptions::Id, Order::Desc)
        .to_string(SqliteQueryBuilder)
}

/// SELECT * FROM transcriptions WHERE createdAt BETWEEN ? AND ? ORDER BY createdAt DESC
pub fn select_by_date_range(start_ms: i64, end_ms: i64) -> String {
    Query::select()
        .columns(ALL_COLUMNS)
        .from(Transcriptions::Table)
        .and_where(Expr::col(Transcriptions::CreatedAt).between(start_ms, end_ms))
        .order_by(Transcriptions::CreatedAt, Order::Desc)
        .order_by(Transcriptions::Id, Order::Desc)
        .to_string(SqliteQueryBuilder)
}
