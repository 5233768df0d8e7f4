//! DynamicUrlTable - 런타임에 변경 가능한 URL 테이블

use super::pattern::UrlPattern;
use parking_lot::RwLock;
use regex::Regex;
use std::collections::HashMap;
use tracing::debug;
use trellis_foundation::{Error, Result};

// ============================================================================
// UrlResolver - 역방향 조회 인터페이스
// ============================================================================

/// 이름 + 파라미터로 경로를 만드는 리졸버
pub trait UrlResolver: Send + Sync {
    /// 역방향 조회. 맞는 패턴이 없으면 `Error::NoReverseMatch`
    fn reverse(&self, name: &str, kwargs: &HashMap<String, String>) -> Result<String>;
}

// ============================================================================
// DynamicUrlTable
// ============================================================================

struct CompiledPattern {
    pattern: UrlPattern,
    regex: Regex,
}

/// 경로 해석 결과
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedUrl {
    pub pattern: UrlPattern,
    pub kwargs: HashMap<String, String>,
}

/// 확장 라우트 테이블
///
/// 패턴은 추가된 순서대로 매칭된다.
#[derive(Default)]
pub struct DynamicUrlTable {
    patterns: RwLock<Vec<CompiledPattern>>,
}

impl DynamicUrlTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 패턴 추가
    ///
    /// 하나라도 컴파일에 실패하면 아무것도 추가하지 않는다.
    pub fn add_patterns(&self, patterns: &[UrlPattern]) -> Result<()> {
        let compiled = patterns
            .iter()
            .map(|p| {
                Ok(CompiledPattern {
                    regex: p.compile()?,
                    pattern: p.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!("Adding {} URL patterns", compiled.len());
        self.patterns.write().extend(compiled);
        Ok(())
    }

    /// 패턴 제거 (패턴마다 처음 일치하는 항목 하나)
    pub fn remove_patterns(&self, patterns: &[UrlPattern]) {
        let mut table = self.patterns.write();
        for pattern in patterns {
            if let Some(pos) = table.iter().position(|c| &c.pattern == pattern) {
                table.remove(pos);
            }
        }
    }

    /// 현재 패턴 목록
    pub fn patterns(&self) -> Vec<UrlPattern> {
        self.patterns
            .read()
            .iter()
            .map(|c| c.pattern.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.patterns.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.read().is_empty()
    }

    /// 경로 해석
    pub fn resolve(&self, path: &str) -> Option<ResolvedUrl> {
        let table = self.patterns.read();
        table.iter().find_map(|c| {
            let caps = c.regex.captures(path)?;
            let kwargs = c
                .regex
                .capture_names()
                .flatten()
                .filter_map(|name| {
                    caps.name(name)
                        .map(|m| (name.to_string(), m.as_str().to_string()))
                })
                .collect();

            Some(ResolvedUrl {
                pattern: c.pattern.clone(),
                kwargs,
            })
        })
    }
}

impl UrlResolver for DynamicUrlTable {
    fn reverse(&self, name: &str, kwargs: &HashMap<String, String>) -> Result<String> {
        self.patterns
            .read()
            .iter()
            .filter(|c| c.pattern.name.as_deref() == Some(name))
            .find_map(|c| c.pattern.reverse(kwargs))
            .ok_or_else(|| Error::NoReverseMatch(name.to_string()))
    }
}

impl std::fmt::Debug for DynamicUrlTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicUrlTable")
            .field("patterns", &self.patterns())
            .finish()
    }
}
