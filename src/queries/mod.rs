//! SQL builders for the SQLite store
//!
//! Each function returns a complete statement with its values inlined and escaped
//! by sea-query, ready to hand to `sqlx::query`.

pub mod ddl;
pub mod metadata;
pub mod recordings;
pub mod transcriptions;
