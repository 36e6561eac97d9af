use sea_query::Iden;

/// Metadata table - key-value store for database configuration
#[derive(Iden)]
pub enum Metadata {
    Table,
    Key,
    Value,
}

/// Recordings table - one row per captured audio file
#[derive(Iden)]
pub enum Recordings {
    Table,
    Id,
    #[iden = "filePath"]
    FilePath,
    Duration,
    #[iden = "fileSize"]
    FileSize,
    #[iden = "createdAt"]
    CreatedAt,
    #[iden = "transcriptionStatus"]
    TranscriptionStatus,
    #[iden = "transcribedAt"]
    TranscribedAt,
    #[iden = "deleteAt"]
    DeleteAt,
}

/// Transcriptions table - transcribed text for a recording
#[derive(Iden)]
pub enum Transcriptions {
    Table,
    Id,
    #[iden = "recordingId"]
    RecordingId,
    Text,
    Language,
    Segments,
    #[iden = "createdAt"]
    CreatedAt,
}
