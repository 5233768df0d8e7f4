//! Storage module for Trellis
//!
//! - `db`: SQLite - 프로세스 간 공유 데이터 (Registration Record, 공유 캐시)
//! - `registration`: Registration Record 타입과 저장소 트레이트

mod db;
mod registration;

// SQLite Storage
pub use db::{Storage, DATABASE_FILE};

// Registration Records
pub use registration::{RegisteredExtension, RegistrationStore};
