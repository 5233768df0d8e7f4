//! Extension Descriptor - 발견 시 한 번 계산되는 확장 정보

use super::manager::ManagerSettings;
use super::registry::PackageEntry;
use super::traits::ExtensionClass;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ============================================================================
// ExtensionMetadata - 확장 클래스가 선언하는 메타데이터
// ============================================================================

/// 확장 메타데이터
///
/// 비어 있는 필드는 패키지 배포 정보로 채워진다.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ExtensionMetadata {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }
}

// ============================================================================
// ExtensionInfo
// ============================================================================

/// 확장 정보
///
/// ID는 발견 시 한 번 정해지고 바뀌지 않는다. `requirements`는 ID 목록이며,
/// 정보 객체로의 해석은 발견 과정이 끝난 뒤 매니저가 한다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionInfo {
    /// 확장 ID (모듈 경로 + 클래스 이름)
    pub id: String,

    /// 배포 패키지 이름
    pub package_name: String,

    /// 기본 앱 이름 (모듈 경로의 마지막 구간을 뺀 것)
    pub app_name: String,

    pub name: String,
    pub version: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub author_url: Option<String>,
    pub license: Option<String>,
    pub url: Option<String>,

    /// 패키지 안의 htdocs 디렉토리 (구 레이아웃)
    pub htdocs_path: PathBuf,

    /// 패키지 안의 static 디렉토리
    pub static_path: PathBuf,

    /// htdocs 설치 위치: `<mediaRoot>/ext/<package>`
    pub installed_htdocs_path: PathBuf,

    /// static 설치 위치: `<staticRoot>/ext/<id>`
    pub installed_static_path: PathBuf,

    pub is_configurable: bool,
    pub has_admin_site: bool,

    /// 선언된 앱 목록 (비어 있으면 `app_name` 하나)
    pub apps: Vec<String>,

    /// 선언된 미들웨어 이름
    pub middleware: Vec<String>,

    /// 필요한 확장 ID
    pub requirements: Vec<String>,
}

impl ExtensionInfo {
    /// 패키지 엔트리와 확장 클래스로부터 정보 계산
    pub fn new(
        id: &str,
        entry: &PackageEntry,
        class: &dyn ExtensionClass,
        settings: &ManagerSettings,
    ) -> Self {
        let metadata = class.metadata();
        let dist = &entry.dist;

        Self {
            id: id.to_string(),
            package_name: dist.project_name.clone(),
            app_name: entry.app_name(),
            name: metadata
                .name
                .unwrap_or_else(|| dist.project_name.clone()),
            version: metadata.version.unwrap_or_else(|| dist.version.clone()),
            summary: metadata.summary,
            description: metadata.description,
            author: metadata.author,
            author_url: metadata.author_url,
            license: metadata.license,
            url: metadata.url,
            htdocs_path: dist.location.join("htdocs"),
            static_path: dist.location.join("static"),
            installed_htdocs_path: settings
                .media_root
                .join("ext")
                .join(&dist.project_name),
            installed_static_path: settings.static_root.join("ext").join(id),
            is_configurable: class.is_configurable(),
            has_admin_site: class.has_admin_site(),
            apps: class.apps(),
            middleware: class.middleware_names(),
            requirements: class.requirements(),
        }
    }

    /// 실제로 설치/활성화되는 앱 목록
    pub fn effective_apps(&self) -> Vec<String> {
        if self.apps.is_empty() {
            vec![self.app_name.clone()]
        } else {
            self.apps.clone()
        }
    }
}
