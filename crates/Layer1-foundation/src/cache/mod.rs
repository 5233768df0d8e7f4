//! # Shared Cache
//!
//! 여러 워커 프로세스가 확장 상태 변경을 감지하기 위해 공유하는 캐시.
//!
//! ## 구성
//!
//! - `SharedCache`: get / add / incr / delete 네 가지 원자적 연산만 요구하는 트레이트
//! - `MemoryCache`: 단일 프로세스용 구현 (선택적 TTL로 eviction 재현)
//! - `Storage`: SQLite 테이블을 통한 프로세스 간 구현
//! - `make_cache_key`: 사이트 접두사 + 길이 제한을 적용한 캐시 키 생성

mod key;
mod shared;

pub use key::{make_cache_key, MAX_KEY_LENGTH};
pub use shared::{MemoryCache, SharedCache};
