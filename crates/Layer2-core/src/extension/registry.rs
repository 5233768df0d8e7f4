//! Package Registry - 설치된 확장 패키지 열거
//!
//! 패키지 레지스트리는 그룹(매니저 키) 별로 엔트리를 돌려준다. 엔트리는
//! `module.path:ClassName` 형태의 타깃과 배포 정보, 그리고 확장 클래스를
//! 돌려주는 로더를 가진다.

use super::traits::ExtensionClass;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;
use trellis_foundation::{Error, Result};

// ============================================================================
// 이름 검증
// ============================================================================

/// 설치 경로의 한 구간으로 쓸 수 있는 이름인지 확인
///
/// 경로 구분자, `..`, 점으로 시작하는 이름, 드라이브 표기, 제어 문자를 거부한다.
pub(crate) fn is_safe_path_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains("..")
        && !name
            .chars()
            .any(|c| matches!(c, '/' | '\\' | ':') || c.is_control())
}

/// `module.path:ClassName` 분리. 두 부분 모두 안전한 이름이어야 한다
pub(crate) fn split_target(target: &str) -> Option<(&str, &str)> {
    target
        .split_once(':')
        .filter(|(module, class)| is_safe_path_name(module) && is_safe_path_name(class))
}

// ============================================================================
// Distribution / PackageEntry
// ============================================================================

/// 배포 패키지 정보
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Distribution {
    /// 패키지 이름
    pub project_name: String,

    pub version: String,

    /// 패키지 루트 (htdocs/, static/ 기준)
    pub location: PathBuf,
}

impl Distribution {
    pub fn new(
        project_name: impl Into<String>,
        version: impl Into<String>,
        location: impl Into<PathBuf>,
    ) -> Self {
        Self {
            project_name: project_name.into(),
            version: version.into(),
            location: location.into(),
        }
    }
}

/// 확장 클래스 로더
pub type ExtensionLoader = Arc<dyn Fn() -> Result<Arc<dyn ExtensionClass>> + Send + Sync>;

/// 레지스트리 엔트리
#[derive(Clone)]
pub struct PackageEntry {
    /// 엔트리 이름
    pub name: String,

    /// `module.path:ClassName`
    pub target: String,

    pub dist: Distribution,

    loader: ExtensionLoader,
}

impl PackageEntry {
    pub fn new(
        name: impl Into<String>,
        target: impl Into<String>,
        dist: Distribution,
        loader: ExtensionLoader,
    ) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            dist,
            loader,
        }
    }

    /// 이미 만들어진 클래스 객체를 돌려주는 엔트리
    pub fn for_class(
        name: impl Into<String>,
        target: impl Into<String>,
        dist: Distribution,
        class: Arc<dyn ExtensionClass>,
    ) -> Self {
        Self::new(name, target, dist, Arc::new(move || Ok(class.clone())))
    }

    /// 확장 클래스 로드
    pub fn load(&self) -> Result<Arc<dyn ExtensionClass>> {
        (self.loader)()
    }

    /// `module.path` 부분
    pub fn module_path(&self) -> &str {
        self.target
            .split_once(':')
            .map(|(module, _)| module)
            .unwrap_or(&self.target)
    }

    /// 확장 ID (`module.path.ClassName`)
    ///
    /// ID와 배포 이름은 설치 경로의 구간이 되므로 여기서 함께 검증한다.
    pub fn extension_id(&self) -> Result<String> {
        let (module, class) = split_target(&self.target).ok_or_else(|| {
            Error::extension_load(
                &self.name,
                format!("Invalid target '{}', expected 'module.path:ClassName'", self.target),
            )
        })?;

        if !is_safe_path_name(&self.dist.project_name) {
            return Err(Error::extension_load(
                &self.name,
                format!("Invalid package name '{}'", self.dist.project_name),
            ));
        }

        Ok(format!("{}.{}", module, class))
    }

    /// 모듈 경로의 마지막 구간을 뺀 앱 이름
    pub fn app_name(&self) -> String {
        let module = self.module_path();
        match module.rsplit_once('.') {
            Some((app, _)) => app.to_string(),
            None => module.to_string(),
        }
    }
}

impl std::fmt::Debug for PackageEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageEntry")
            .field("name", &self.name)
            .field("target", &self.target)
            .field("dist", &self.dist)
            .finish()
    }
}

// ============================================================================
// PackageRegistry 트레이트
// ============================================================================

/// 패키지 레지스트리
#[async_trait]
pub trait PackageRegistry: Send + Sync {
    /// 그룹의 엔트리 목록
    async fn entries(&self, group: &str) -> Vec<PackageEntry>;

    /// 패키지 이름으로 배포 정보 찾기
    async fn find_distribution(&self, package_name: &str) -> Option<Distribution>;

    /// 새로 설치된 패키지 반영
    async fn refresh(&self) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// StaticPackageRegistry - 컴파일 시점 능력 테이블
// ============================================================================

/// 호스트 바이너리에 함께 빌드된 확장 목록
#[derive(Default)]
pub struct StaticPackageRegistry {
    entries: RwLock<Vec<(String, PackageEntry)>>,
}

impl StaticPackageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 엔트리 등록 (같은 그룹의 같은 타깃은 교체)
    pub fn register(&self, group: impl Into<String>, entry: PackageEntry) {
        let group = group.into();
        let mut entries = self.entries.write();
        entries.retain(|(g, e)| !(g == &group && e.target == entry.target));
        entries.push((group, entry));
    }

    /// 클래스 객체 등록 편의 함수
    pub fn register_class(
        &self,
        group: impl Into<String>,
        target: impl Into<String>,
        dist: Distribution,
        class: Arc<dyn ExtensionClass>,
    ) {
        let target = target.into();
        let name = dist.project_name.clone();
        self.register(group, PackageEntry::for_class(name, target, dist, class));
    }

    /// 타깃 제거 (패키지 제거에 해당)
    pub fn remove(&self, target: &str) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|(_, e)| e.target != target);
        entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl PackageRegistry for StaticPackageRegistry {
    async fn entries(&self, group: &str) -> Vec<PackageEntry> {
        self.entries
            .read()
            .iter()
            .filter(|(g, _)| g == group)
            .map(|(_, e)| e.clone())
            .collect()
    }

    async fn find_distribution(&self, package_name: &str) -> Option<Distribution> {
        self.entries
            .read()
            .iter()
            .map(|(_, e)| &e.dist)
            .find(|d| d.project_name == package_name)
            .cloned()
    }
}
