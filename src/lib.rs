// Library interface for testing

// Declare all modules
pub mod audio;
pub mod config;
pub mod constants;
pub mod database;
pub mod db;
pub mod model;
pub mod monitor;
pub mod queries;
pub mod recorder;
pub mod repository;
pub mod schema;
pub mod storage;
pub mod vad;

// Re-export the expected database version for convenience
pub use constants::EXPECTED_DB_VERSION;
