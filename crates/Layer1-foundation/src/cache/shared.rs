//! SharedCache 트레이트와 구현

use crate::storage::Storage;
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

// ============================================================================
// SharedCache - 프로세스 외부 캐시 인터페이스
// ============================================================================

/// 프로세스 간 공유 캐시
///
/// 모든 연산은 키 단위로 원자적이어야 한다.
pub trait SharedCache: Send + Sync {
    /// 값 조회 (없거나 만료되면 None)
    fn get(&self, key: &str) -> Result<Option<i64>>;

    /// 키가 없을 때만 값 설정. 설정했으면 true
    fn add(&self, key: &str, value: i64) -> Result<bool>;

    /// 값을 1 증가시키고 새 값을 반환. 키가 없으면 None
    fn incr(&self, key: &str) -> Result<Option<i64>>;

    /// 키 삭제
    fn delete(&self, key: &str) -> Result<()>;
}

impl SharedCache for Storage {
    fn get(&self, key: &str) -> Result<Option<i64>> {
        self.cache_get(key)
    }

    fn add(&self, key: &str, value: i64) -> Result<bool> {
        self.cache_add(key, value)
    }

    fn incr(&self, key: &str) -> Result<Option<i64>> {
        self.cache_incr(key)
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.cache_delete(key)
    }
}

// ============================================================================
// MemoryCache - 단일 프로세스용 구현
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    value: i64,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_live(&self) -> bool {
        self.expires_at.map_or(true, |at| Instant::now() < at)
    }
}

/// 메모리 캐시
///
/// 복제본끼리 같은 저장소를 공유하므로, 테스트에서 여러 매니저를
/// 하나의 "공유 캐시"에 붙일 수 있다.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    entries: Arc<Mutex<HashMap<String, CacheEntry>>>,
    ttl: Option<Duration>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 항목 만료 시간 설정
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Arc::default(),
            ttl: Some(ttl),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, CacheEntry>>> {
        self.entries
            .lock()
            .map_err(|_| Error::Internal("Lock poisoned".to_string()))
    }
}

impl SharedCache for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<i64>> {
        let entries = self.lock()?;
        Ok(entries.get(key).filter(|e| e.is_live()).map(|e| e.value))
    }

    fn add(&self, key: &str, value: i64) -> Result<bool> {
        let mut entries = self.lock()?;

        if entries.get(key).map_or(false, |e| e.is_live()) {
            return Ok(false);
        }

        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: self.ttl.map(|ttl| Instant::now() + ttl),
            },
        );
        Ok(true)
    }

    fn incr(&self, key: &str) -> Result<Option<i64>> {
        let mut entries = self.lock()?;

        match entries.get_mut(key) {
            Some(entry) if entry.is_live() => {
                entry.value += 1;
                Ok(Some(entry.value))
            }
            _ => Ok(None),
        }
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}
