//! Trellis Config - 통합 설정
//!
//! 글로벌 설정 파일과 프로젝트 설정 파일을 병합한다 (프로젝트 우선).

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 설정 파일명
pub const TRELLIS_CONFIG_FILE: &str = "trellis.json";

/// 기본 확장 그룹 / 캐시 키 네임스페이스
pub const DEFAULT_MANAGER_KEY: &str = "trellis.extensions";

/// 확장 관리 화면 기본 경로
pub const DEFAULT_ADMIN_PREFIX: &str = "/admin/extensions/";

/// 글로벌 설정 디렉토리 (<config_dir>/trellis)
const GLOBAL_DIR: &str = "trellis";

/// 프로젝트 설정 디렉토리
const PROJECT_DIR: &str = ".trellis";

// ============================================================================
// TrellisConfig
// ============================================================================

/// Trellis 통합 설정
///
/// 모든 필드는 선택적이며, 접근자가 기본값을 채운다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrellisConfig {
    /// 확장 그룹 이름 (패키지 레지스트리 그룹, 캐시 키 네임스페이스)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manager_key: Option<String>,

    /// 캐시 키 사이트 접두사
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_prefix: Option<String>,

    /// 사이트 루트 (관리 URL에서 제거됨)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_root: Option<String>,

    /// 확장 관리 URL 접두사
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_prefix: Option<String>,

    /// htdocs 설치 루트
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_root: Option<PathBuf>,

    /// collected static 설치 루트
    #[serde(skip_serializing_if = "Option::is_none")]
    pub static_root: Option<PathBuf>,

    /// 디버그 모드 (static 파일을 원본 위치에서 서빙)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<bool>,

    /// 데이터베이스 디렉토리
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// 확장 패키지 검색 경로
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extension_dirs: Vec<PathBuf>,

    /// 새 테이블 생성 명령
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_sync_command: Option<String>,

    /// 스키마 마이그레이션 명령
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_evolve_command: Option<String>,
}

impl TrellisConfig {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Load / Save
    // ========================================================================

    /// 글로벌 + 프로젝트 병합 로드
    pub fn load() -> Result<Self> {
        let mut config = Self::new();

        // 1. 글로벌 설정
        if let Some(dir) = dirs::config_dir() {
            if let Some(global) = read_optional(&dir.join(GLOBAL_DIR))? {
                config.merge(global);
            }
        }

        // 2. 프로젝트 설정
        if let Ok(cwd) = std::env::current_dir() {
            if let Some(project) = read_optional(&cwd.join(PROJECT_DIR))? {
                config.merge(project);
            }
        }

        Ok(config)
    }

    /// 특정 디렉토리의 설정 파일만 로드 (없으면 기본값)
    pub fn load_from(dir: &Path) -> Result<Self> {
        Ok(read_optional(dir)?.unwrap_or_default())
    }

    /// `<dir>/trellis.json`에 저장
    pub fn save_to(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir).map_err(|e| {
            Error::Config(format!("Failed to create {}: {}", dir.display(), e))
        })?;

        let path = dir.join(TRELLIS_CONFIG_FILE);
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(&path, content)
            .map_err(|e| Error::Config(format!("Failed to write {}: {}", path.display(), e)))
    }

    // ========================================================================
    // Merge
    // ========================================================================

    /// 다른 설정과 병합 (other가 우선)
    pub fn merge(&mut self, other: TrellisConfig) {
        if other.manager_key.is_some() {
            self.manager_key = other.manager_key;
        }
        if other.cache_prefix.is_some() {
            self.cache_prefix = other.cache_prefix;
        }
        if other.site_root.is_some() {
            self.site_root = other.site_root;
        }
        if other.admin_prefix.is_some() {
            self.admin_prefix = other.admin_prefix;
        }
        if other.media_root.is_some() {
            self.media_root = other.media_root;
        }
        if other.static_root.is_some() {
            self.static_root = other.static_root;
        }
        if other.debug.is_some() {
            self.debug = other.debug;
        }
        if other.data_dir.is_some() {
            self.data_dir = other.data_dir;
        }
        if !other.extension_dirs.is_empty() {
            self.extension_dirs = other.extension_dirs;
        }
        if other.schema_sync_command.is_some() {
            self.schema_sync_command = other.schema_sync_command;
        }
        if other.schema_evolve_command.is_some() {
            self.schema_evolve_command = other.schema_evolve_command;
        }
    }

    // ========================================================================
    // 접근자 (기본값 포함)
    // ========================================================================

    pub fn manager_key(&self) -> &str {
        self.manager_key.as_deref().unwrap_or(DEFAULT_MANAGER_KEY)
    }

    pub fn admin_prefix(&self) -> &str {
        self.admin_prefix.as_deref().unwrap_or(DEFAULT_ADMIN_PREFIX)
    }

    pub fn debug(&self) -> bool {
        self.debug.unwrap_or(false)
    }

    /// 데이터 디렉토리 (<data_dir>/trellis, 없으면 ./.trellis/data)
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .map(|d| d.join("trellis"))
                .unwrap_or_else(|| PathBuf::from(".trellis").join("data"))
        })
    }

    pub fn media_root(&self) -> PathBuf {
        self.media_root
            .clone()
            .unwrap_or_else(|| self.data_dir().join("media"))
    }

    pub fn static_root(&self) -> PathBuf {
        self.static_root
            .clone()
            .unwrap_or_else(|| self.data_dir().join("static"))
    }

    /// 확장 검색 경로 (없으면 <data_dir>/extensions)
    pub fn extension_dirs(&self) -> Vec<PathBuf> {
        if self.extension_dirs.is_empty() {
            vec![self.data_dir().join("extensions")]
        } else {
            self.extension_dirs.clone()
        }
    }
}

/// `<dir>/trellis.json` 읽기 (파일이 없으면 None)
fn read_optional(dir: &Path) -> Result<Option<TrellisConfig>> {
    let path = dir.join(TRELLIS_CONFIG_FILE);
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = TrellisConfig::new();
        assert_eq!(config.manager_key(), DEFAULT_MANAGER_KEY);
        assert_eq!(config.admin_prefix(), DEFAULT_ADMIN_PREFIX);
        assert!(!config.debug());
        assert_eq!(config.media_root(), config.data_dir().join("media"));
    }

    #[test]
    fn test_merge_prefers_other() {
        let mut base = TrellisConfig {
            manager_key: Some("base".into()),
            debug: Some(true),
            extension_dirs: vec![PathBuf::from("/base")],
            ..Default::default()
        };

        base.merge(TrellisConfig {
            manager_key: Some("project".into()),
            ..Default::default()
        });

        assert_eq!(base.manager_key(), "project");
        assert!(base.debug());
        assert_eq!(base.extension_dirs, vec![PathBuf::from("/base")]);
    }

    #[test]
    fn test_save_and_load_from_dir() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join(PROJECT_DIR);

        let config = TrellisConfig {
            admin_prefix: Some("/manage/ext/".into()),
            schema_sync_command: Some("manage.py syncdb".into()),
            ..Default::default()
        };
        config.save_to(&dir).unwrap();

        let raw = std::fs::read_to_string(dir.join(TRELLIS_CONFIG_FILE)).unwrap();
        assert!(raw.contains("adminPrefix"));

        let loaded = TrellisConfig::load_from(&dir).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_is_default_and_bad_json_errors() {
        let temp = TempDir::new().unwrap();
        assert_eq!(
            TrellisConfig::load_from(temp.path()).unwrap(),
            TrellisConfig::default()
        );

        std::fs::write(temp.path().join(TRELLIS_CONFIG_FILE), "{ not json").unwrap();
        assert!(matches!(
            TrellisConfig::load_from(temp.path()),
            Err(Error::Config(_))
        ));
    }
}
