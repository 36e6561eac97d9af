use sea_query::{ColumnDef, ForeignKey, ForeignKeyAction, Index, SqliteQueryBuilder, Table};

use crate::schema::{Metadata, Recordings, Transcriptions};

/// CREATE TABLE IF NOT EXISTS metadata (key TEXT PRIMARY KEY, value TEXT NOT NULL)
pub fn create_metadata_table() -> String {
    Table::create()
        .table(Metadata::Table)
        .if_not_exists()
        .col(ColumnDef::new(Metadata::Key).text().primary_key())
        .col(ColumnDef::new(Metadata::Value).text().not_null())
        .to_string(SqliteQueryBuilder)
}

/// CREATE TABLE IF NOT EXISTS recordings (
///     id INTEGER PRIMARY KEY AUTOINCREMENT,
///     filePath TEXT NOT NULL,
///     duration INTEGER NOT NULL,
///     fileSize INTEGER NOT NULL,
///     createdAt INTEGER NOT NULL,
///     transcriptionStatus TEXT NOT NULL,
///     transcribedAt INTEGER,
///     deleteAt INTEGER NOT NULL
/// )
pub fn create_recordings_table() -> String {
    Table::create()
        .table(Recordings::Table)
        .if_not_exists()
        .col(
            ColumnDef::new(Recordings::Id)
                .integer()
                .primary_key()
                .auto_increment(),
        )
        .col(ColumnDef::new(Recordings::FilePath).text().not_null())
        .col(ColumnDef::new(Recordings::Duration).integer().not_null())
        .col(ColumnDef::new(Recordings::FileSize).integer().not_null())
        .col(ColumnDef::new(Recordings::CreatedAt).integer().not_null())
        .col(
            ColumnDef::new(Recordings::TranscriptionStatus)
                .text()
                .not_null(),
        )
        .col(ColumnDef::new(Recordings::TranscribedAt).integer())
        .col(ColumnDef::new(Recordings::DeleteAt).integer().not_null())
        .to_string(SqliteQueryBuilder)
}

/// CREATE TABLE IF NOT EXISTS transcriptions (
///     id INTEGER PRIMARY KEY AUTOINCREMENT,
///     recordingId INTEGER NOT NULL REFERENCES recordings(id) ON DELETE CASCADE,
///     text TEXT NOT NULL,
///     language TEXT,
///     segments TEXT NOT NULL,
///     createdAt INTEGER NOT NULL
/// )
pub fn create_transcriptions_table() -> String {
    Table::create()
        .table(Transcriptions::Table)
        .if_not_exists()
        .col(
            ColumnDef::new(Transcriptions::Id)
                .integer()
                .primary_key()
                .auto_increment(),
        )
        .col(
            ColumnDef::new(Transcriptions::RecordingId)
                .integer()
                .not_null(),
        )
        .col(ColumnDef::new(Transcriptions::Text).text().not_null())
        .col(ColumnDef::new(Transcriptions::Language).text())
        .col(ColumnDef::new(Transcriptions::Segments).text().not_null())
        .col(
            ColumnDef::new(Transcriptions::CreatedAt)
                .integer()
                .not_null(),
        )
        .foreign_key(
            ForeignKey::create()
                .from(Transcriptions::Table, Transcriptions::RecordingId)
                .to(Recordings::Table, Recordings::Id)
                .on_delete(ForeignKeyAction::Cascade),
        )
        .to_string(SqliteQueryBuilder)
}

/// CREATE INDEX IF NOT EXISTS index_transcriptions_recordingId ON transcriptions(recordingId)
pub fn create_transcriptions_recording_id_index() -> String {
    Index::create()
        .if_not_exists()
        .name("index_transcriptions_recordingId")
        .table(Transcriptions::Table)
        .col(Transcriptions::RecordingId)
        .to_string(SqliteQueryBuilder)
}

/// CREATE INDEX IF NOT EXISTS index_recordings_deleteAt ON recordings(deleteAt)
pub fn create_recordings_delete_at_index() -> String {
    Index::create()
        .if_not_exists()
        .name("index_recordings_deleteAt")
        .table(Recordings::Table)
        .col(Recordings::DeleteAt)
        .to_string(SqliteQueryBuilder)
}
