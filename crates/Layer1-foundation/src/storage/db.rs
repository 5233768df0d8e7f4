//! SQLite Storage
//!
//! 여러 워커 프로세스가 함께 보는 영속 데이터:
//! - Registered extensions: 확장별 enabled/installed 상태
//! - Cache entries: 프로세스 간 공유 캐시 (동기화 generation 등)
//!
//! 설정 파일은 config/trellis.rs에서 관리
//!
//! ## Migration System
//!
//! Database schema is versioned. Migrations run automatically on startup.
//! - Version 1: Initial schema (registered_extensions, cache_entries)
//! - Version 2: Add per-extension settings column

use super::registration::{RegisteredExtension, RegistrationStore};
use crate::{Error, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Current schema version
const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Database file name inside the data directory
pub const DATABASE_FILE: &str = "trellis.db";

/// Storage service for persisting extension state
#[derive(Clone)]
pub struct Storage {
    conn: Arc<Mutex<Connection>>,

    /// 공유 캐시 항목의 기본 만료 시간 (None이면 만료 없음)
    cache_ttl: Option<Duration>,
}

impl Storage {
    /// Create a new storage instance
    pub fn new(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .map_err(|e| Error::Storage(format!("Failed to create data directory: {}", e)))?;

        let db_path = data_dir.join(DATABASE_FILE);
        let conn = Connection::open(&db_path)
            .map_err(|e| Error::Storage(format!("Failed to open database: {}", e)))?;

        // Several worker processes share this file
        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA busy_timeout=5000;",
        )
        .map_err(|e| Error::Storage(format!("Failed to set pragmas: {}", e)))?;

        Self::from_connection(conn)
    }

    /// Create an in-memory storage (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Storage(format!("Failed to create in-memory database: {}", e)))?;

        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let storage = Self {
            conn: Arc::new(Mutex::new(conn)),
            cache_ttl: None,
        };

        storage.initialize_schema()?;
        storage.run_migrations()?;

        Ok(storage)
    }

    /// 공유 캐시 항목의 만료 시간 설정
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Internal("Lock poisoned".to_string()))
    }

    /// Get current schema version from database
    pub fn get_schema_version(&self) -> Result<i32> {
        let conn = self.lock()?;

        conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .map_err(|e| Error::Storage(format!("Failed to get schema version: {}", e)))
    }

    /// Initialize database schema (base tables)
    fn initialize_schema(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            r#"
            -- Schema version tracking
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            -- One row per known extension id
            CREATE TABLE IF NOT EXISTS registered_extensions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                class_name TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                enabled INTEGER NOT NULL DEFAULT 0,
                installed INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            -- Process-shared cache
            CREATE TABLE IF NOT EXISTS cache_entries (
                key TEXT PRIMARY KEY,
                value INTEGER NOT NULL,
                expires_at INTEGER
            );

            -- Insert initial schema version if not exists
            INSERT OR IGNORE INTO schema_version (version) VALUES (1);
            "#,
        )
        .map_err(|e| Error::Storage(format!("Failed to initialize schema: {}", e)))?;

        Ok(())
    }

    /// Run all pending migrations
    fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version()?;

        if current_version >= CURRENT_SCHEMA_VERSION {
            debug!(
                "Database schema is up to date (version {})",
                current_version
            );
            return Ok(());
        }

        info!(
            "Running database migrations from version {} to {}",
            current_version, CURRENT_SCHEMA_VERSION
        );

        let conn = self.lock()?;

        for version in (current_version + 1)..=CURRENT_SCHEMA_VERSION {
            match version {
                2 => Self::migrate_v2(&conn)?,
                _ => {
                    warn!("Unknown migration version: {}", version);
                }
            }

            conn.execute(
                "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
                params![version],
            )
            .map_err(|e| Error::Storage(format!("Failed to record migration: {}", e)))?;
        }

        Ok(())
    }

    /// Migration v2: per-extension settings
    fn migrate_v2(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "ALTER TABLE registered_extensions ADD COLUMN settings TEXT NOT NULL DEFAULT '{}';",
        )
        .map_err(|e| Error::Storage(format!("Migration v2 failed: {}", e)))
    }

    fn row_to_registration(row: &Row<'_>) -> rusqlite::Result<(RegisteredExtension, String)> {
        Ok((
            RegisteredExtension {
                id: row.get(0)?,
                class_name: row.get(1)?,
                name: row.get(2)?,
                enabled: row.get(3)?,
                installed: row.get(4)?,
                settings: serde_json::Value::Null,
            },
            row.get(5)?,
        ))
    }

    fn with_settings((mut record, settings): (RegisteredExtension, String)) -> Result<RegisteredExtension> {
        record.settings = serde_json::from_str(&settings)?;
        Ok(record)
    }

    // ========================================================================
    // Cache entries
    // ========================================================================

    fn now_ts() -> i64 {
        Utc::now().timestamp()
    }

    /// 캐시 값 조회 (만료되었거나 없으면 None)
    pub fn cache_get(&self, key: &str) -> Result<Option<i64>> {
        let conn = self.lock()?;

        conn.query_row(
            "SELECT value FROM cache_entries
             WHERE key = ?1 AND (expires_at IS NULL OR expires_at > ?2)",
            params![key, Self::now_ts()],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| Error::Storage(format!("Failed to read cache entry: {}", e)))
    }

    /// 캐시 값이 없을 때만 추가
    pub fn cache_add(&self, key: &str, value: i64) -> Result<bool> {
        let mut conn = self.lock()?;
        let now = Self::now_ts();
        let expires_at = self.cache_ttl.map(|ttl| now + ttl.as_secs() as i64);

        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM cache_entries WHERE key = ?1 AND expires_at IS NOT NULL AND expires_at <= ?2",
            params![key, now],
        )?;
        let inserted = tx.execute(
            "INSERT OR IGNORE INTO cache_entries (key, value, expires_at) VALUES (?1, ?2, ?3)",
            params![key, value, expires_at],
        )?;
        tx.commit()?;

        Ok(inserted == 1)
    }

    /// 캐시 값을 원자적으로 1 증가 (없으면 None)
    pub fn cache_incr(&self, key: &str) -> Result<Option<i64>> {
        let mut conn = self.lock()?;
        let now = Self::now_ts();

        let tx = conn.transaction()?;
        let updated = tx.execute(
            "UPDATE cache_entries SET value = value + 1
             WHERE key = ?1 AND (expires_at IS NULL OR expires_at > ?2)",
            params![key, now],
        )?;

        let value = if updated == 1 {
            Some(tx.query_row(
                "SELECT value FROM cache_entries WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )?)
        } else {
            None
        };
        tx.commit()?;

        Ok(value)
    }

    /// 캐시 값 삭제
    pub fn cache_delete(&self, key: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM cache_entries WHERE key = ?1", params![key])?;
        Ok(())
    }
}

// ============================================================================
// RegistrationStore 구현
// ============================================================================

const REGISTRATION_COLUMNS: &str = "id, class_name, name, enabled, installed, settings";

impl RegistrationStore for Storage {
    fn all_registrations(&self) -> Result<Vec<RegisteredExtension>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM registered_extensions ORDER BY id",
            REGISTRATION_COLUMNS
        ))?;

        let rows = stmt
            .query_map([], Self::row_to_registration)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter().map(Self::with_settings).collect()
    }

    fn find_registration(&self, class_name: &str) -> Result<Option<RegisteredExtension>> {
        let conn = self.lock()?;

        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM registered_extensions WHERE class_name = ?1",
                    REGISTRATION_COLUMNS
                ),
                params![class_name],
                Self::row_to_registration,
            )
            .optional()?;

        row.map(Self::with_settings).transpose()
    }

    fn get_or_create_registration(
        &self,
        class_name: &str,
        name: &str,
    ) -> Result<(RegisteredExtension, bool)> {
        let mut conn = self.lock()?;
        let now = Utc::now().to_rfc3339();

        // UNIQUE(class_name) + INSERT OR IGNORE: 동시 발견에도 레코드는 하나
        let tx = conn.transaction()?;
        let created = tx.execute(
            "INSERT OR IGNORE INTO registered_extensions
                (class_name, name, enabled, installed, created_at, updated_at)
             VALUES (?1, ?2, 0, 0, ?3, ?3)",
            params![class_name, name, now],
        )? == 1;

        let row = tx.query_row(
            &format!(
                "SELECT {} FROM registered_extensions WHERE class_name = ?1",
                REGISTRATION_COLUMNS
            ),
            params![class_name],
            Self::row_to_registration,
        )?;
        tx.commit()?;

        if created {
            debug!("Created registration for extension {}", class_name);
        }

        Ok((Self::with_settings(row)?, created))
    }

    fn save_registration(&self, registration: &RegisteredExtension) -> Result<()> {
        let conn = self.lock()?;
        let settings = serde_json::to_string(&registration.settings)?;

        let updated = conn.execute(
            "UPDATE registered_extensions
             SET name = ?2, enabled = ?3, installed = ?4, settings = ?5, updated_at = ?6
             WHERE class_name = ?1",
            params![
                registration.class_name,
                registration.name,
                registration.enabled,
                registration.installed,
                settings,
                Utc::now().to_rfc3339(),
            ],
        )?;

        if updated == 0 {
            return Err(Error::NotFound(format!(
                "Registration for {} not found",
                registration.class_name
            )));
        }

        Ok(())
    }
}

// ============================================================================
// 테스트
// ============================================================================
