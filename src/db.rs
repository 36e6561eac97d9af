use log::info;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::{Path, PathBuf};

use crate::constants::{generate_db_unique_id, EXPECTED_DB_VERSION};
use crate::queries::{ddl, metadata};

pub type DynError = Box<dyn std::error::Error + Send + Sync>;

/// Path of the database file for a data directory and database name
pub fn database_path(data_dir: &Path, name: &str) -> PathBuf {
    data_dir.join(format!("{}.sqlite", name))
}

/// Open a file-based database pool for production use
/// Creates the file if needed, enables WAL mode and foreign keys
pub async fn open_database(data_dir: &Path, name: &str) -> Result<SqlitePool, DynError> {
    std::fs::create_dir_all(data_dir).map_err(|e| {
        format!(
            "Failed to create data directory '{}': {}",
            data_dir.display(),
            e
        )
    })?;
    let db_path = database_path(data_dir, name);
    let pool = open_database_with_path(&db_path).await?;
    info!("SQLite database: {}", db_path.display());
    Ok(pool)
}

/// Open a database pool with a full path
/// Enables WAL mode and foreign keys on every pooled connection
pub async fn open_database_with_path(db_path: &Path) -> Result<SqlitePool, DynError> {
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await
        .map_err(|e| format!("Failed to open database '{}': {}", db_path.display(), e))?;
    Ok(pool)
}

/// Initialize database schema
/// Creates tables and indexes, then records version and unique id if absent
pub async fn init_database_schema(pool: &SqlitePool) -> Result<(), DynError> {
    sqlx::query(&ddl::create_metadata_table())
        .execute(pool)
        .await?;
    sqlx::query(&ddl::create_recordings_table())
        .execute(pool)
        .await?;
    sqlx::query(&ddl::create_transcriptions_table())
        .execute(pool)
        .await?;

    sqlx::query(&ddl::create_transcriptions_recording_id_index())
        .execute(pool)
        .await?;
    sqlx::query(&ddl::create_recordings_delete_at_index())
        .execute(pool)
        .await?;

    sqlx::query(&metadata::insert_or_ignore("version", EXPECTED_DB_VERSION))
        .execute(pool)
        .await?;
    sqlx::query(&metadata::insert_or_ignore(
        "unique_id",
        &generate_db_unique_id(),
    ))
    .execute(pool)
    .await?;

    Ok(())
}

/// Query a single metadata value by key
pub async fn query_metadata(pool: &SqlitePool, key: &str) -> Result<Option<String>, DynError> {
    let sql = metadata::select_by_key(key);
    let result = sqlx::query(&sql).fetch_optional(pool).await?;
    Ok(result.map(|row| row.get::<String, _>(0)))
}

/// Fail if the stored schema version is not the one this build understands
pub async fn verify_schema_version(pool: &SqlitePool) -> Result<(), DynError> {
    match query_metadata(pool, "version").await? {
        Some(version) if version == EXPECTED_DB_VERSION => Ok(()),
        Some(version) => Err(format!(
            "Database version mismatch: expected '{}', found '{}'",
            EXPECTED_DB_VERSION, version
        )
        .into()),
        None => Err("Database has no version metadata".into()),
    }
}

/// Open, initialize and verify a database in one step
pub async fn open_and_init(data_dir: &Path, name: &str) -> Result<SqlitePool, DynError> {
    let pool = open_database(data_dir, name).await?;
    init_database_schema(&pool).await?;
    verify_schema_version(&pool).await?;
    Ok(pool)
}

/// Create a database in a temporary directory for testing
/// Returns (pool, guard) - keep the guard alive to prevent temp file deletion
pub async fn create_test_connection_in_temporary_file() -> Result<(SqlitePool, tempfile::TempDir), DynError> {
    let temp_dir = tempfile::tempdir()?;
    let db_path = temp_dir.path().join("test.sqlite");
    let pool = open_database_with_path(&db_path).await?;
    Ok((pool, temp_dir))
}
