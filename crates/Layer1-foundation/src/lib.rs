//! # trellis-foundation
//!
//! Foundation layer for Trellis:
//! - Error: 중앙 에러 타입
//! - Config: 통합 설정 (TrellisConfig, 글로벌 + 프로젝트 병합)
//! - Storage: SQLite (Registration Record, 공유 캐시)
//! - Cache: 프로세스 간 공유 캐시 트레이트와 키 생성
//!
//! ## 아키텍처
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  worker process A          worker process B             │
//! │  ExtensionManager          ExtensionManager             │
//! │        │                         │                      │
//! │        └──────────┬──────────────┘                      │
//! │                   ▼                                     │
//! │   SharedCache (generation)   RegistrationStore          │
//! │        └──────── Storage (SQLite) ────────┘             │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod storage;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Config (설정)
// ============================================================================
pub use config::{TrellisConfig, DEFAULT_ADMIN_PREFIX, DEFAULT_MANAGER_KEY, TRELLIS_CONFIG_FILE};

// ============================================================================
// Storage (저장소)
// ============================================================================
pub use storage::{RegisteredExtension, RegistrationStore, Storage, DATABASE_FILE};

// ============================================================================
// Cache (공유 캐시)
// ============================================================================
pub use cache::{make_cache_key, MemoryCache, SharedCache, MAX_KEY_LENGTH};
