//! Extension Manifest - `extension.json`으로 선언하는 확장
//!
//! 매니페스트 확장은 코드 없이 URL 훅, 템플릿 훅, 관리 모델, 설정 URL을
//! 선언한다. 미들웨어와 컴파일된 확장 클래스는 이름으로 `Capabilities`
//! 테이블에서 찾는다.
//!
//! ```json
//! {
//!   "target": "rb_stats.extension:StatsExtension",
//!   "package": "rb-stats",
//!   "name": "Review Stats",
//!   "version": "1.2.0",
//!   "requires": ["rb_base.extension.BaseExtension"],
//!   "middleware": ["stats.timing"],
//!   "adminSite": true,
//!   "adminModels": ["Counter"],
//!   "urls": [{ "route": "/stats/", "name": "stats-index", "handler": "stats.index" }],
//!   "templateHooks": [{ "name": "base-scripts", "template": "stats/scripts.html", "applyTo": ["dashboard"] }]
//! }
//! ```

use super::admin::AdminSite;
use super::context::ExtensionContext;
use super::info::ExtensionMetadata;
use super::registry::{is_safe_path_name, split_target};
use super::traits::{ExtensionClass, Middleware};
use crate::hook::{TemplateHook, UrlHook};
use crate::urls::UrlPattern;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use trellis_foundation::{Error, Result};

/// 매니페스트 파일 이름
pub const MANIFEST_FILE: &str = "extension.json";

// ============================================================================
// ExtensionManifest
// ============================================================================

/// 템플릿 훅 선언
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateHookSpec {
    pub name: String,
    pub template: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub apply_to: Vec<String>,
}

/// `extension.json` 내용
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionManifest {
    /// `module.path:ClassName`
    pub target: String,

    /// 배포 패키지 이름
    pub package: String,

    /// 레지스트리 그룹 (없으면 모든 그룹)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    #[serde(flatten)]
    pub metadata: ExtensionMetadata,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub apps: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub middleware: Vec<String>,

    #[serde(default)]
    pub configurable: bool,

    #[serde(default)]
    pub admin_site: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub admin_models: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub urls: Vec<UrlPattern>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub config_urls: Vec<UrlPattern>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub template_hooks: Vec<TemplateHookSpec>,
}

impl ExtensionManifest {
    /// JSON 파싱 및 검증
    pub fn parse(content: &str) -> Result<Self> {
        let manifest: ExtensionManifest = serde_json::from_str(content)?;
        manifest.validate()?;
        Ok(manifest)
    }

    fn validate(&self) -> Result<()> {
        if self.package.trim().is_empty() {
            return Err(Error::InvalidInput("extension.json missing 'package'".into()));
        }
        if !is_safe_path_name(&self.package) {
            return Err(Error::InvalidInput(format!(
                "extension.json has invalid package '{}'",
                self.package
            )));
        }
        match split_target(&self.target) {
            Some(_) => Ok(()),
            None => Err(Error::InvalidInput(format!(
                "extension.json has invalid target '{}'",
                self.target
            ))),
        }
    }

    pub fn version(&self) -> &str {
        self.metadata.version.as_deref().unwrap_or("0.0.0")
    }

    /// 그룹 일치 여부
    pub fn in_group(&self, group: &str) -> bool {
        self.group.as_deref().map_or(true, |g| g == group)
    }
}

// ============================================================================
// Capabilities - 이름으로 찾는 컴파일된 기능 테이블
// ============================================================================

/// 컴파일된 확장 클래스와 미들웨어 테이블
#[derive(Clone, Default)]
pub struct Capabilities {
    classes: HashMap<String, Arc<dyn ExtensionClass>>,
    middleware: HashMap<String, Arc<dyn Middleware>>,
}

impl Capabilities {
    pub fn new() -> Self {
        Self::default()
    }

    /// 타깃에 대응하는 확장 클래스 등록
    pub fn with_class(mut self, target: impl Into<String>, class: Arc<dyn ExtensionClass>) -> Self {
        self.classes.insert(target.into(), class);
        self
    }

    /// 미들웨어 등록 (이름은 `Middleware::name`)
    pub fn with_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware
            .insert(middleware.name().to_string(), middleware);
        self
    }

    pub fn class(&self, target: &str) -> Option<Arc<dyn ExtensionClass>> {
        self.classes.get(target).cloned()
    }

    pub fn middleware(&self, name: &str) -> Option<Arc<dyn Middleware>> {
        self.middleware.get(name).cloned()
    }

    /// 매니페스트의 확장 클래스
    ///
    /// 컴파일된 클래스가 등록되어 있으면 그것을, 아니면 선언형 확장을 만든다.
    pub fn resolve(&self, manifest: &ExtensionManifest) -> Result<Arc<dyn ExtensionClass>> {
        if let Some(class) = self.class(&manifest.target) {
            return Ok(class);
        }
        Ok(Arc::new(ManifestExtension::new(manifest.clone(), self)?))
    }
}

// ============================================================================
// ManifestExtension - 선언형 확장 클래스
// ============================================================================

/// 매니페스트로 정의된 확장
pub struct ManifestExtension {
    manifest: ExtensionManifest,
    middleware: Vec<Arc<dyn Middleware>>,
}

impl ManifestExtension {
    pub fn new(manifest: ExtensionManifest, capabilities: &Capabilities) -> Result<Self> {
        let middleware = manifest
            .middleware
            .iter()
            .map(|name| {
                capabilities.middleware(name).ok_or_else(|| {
                    Error::extension_load(
                        &manifest.target,
                        format!("Unknown middleware '{}'", name),
                    )
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            manifest,
            middleware,
        })
    }

    pub fn manifest(&self) -> &ExtensionManifest {
        &self.manifest
    }
}

#[async_trait]
impl ExtensionClass for ManifestExtension {
    fn metadata(&self) -> ExtensionMetadata {
        self.manifest.metadata.clone()
    }

    fn requirements(&self) -> Vec<String> {
        self.manifest.requires.clone()
    }

    fn apps(&self) -> Vec<String> {
        self.manifest.apps.clone()
    }

    fn middleware(&self) -> Vec<Arc<dyn Middleware>> {
        self.middleware.clone()
    }

    fn middleware_names(&self) -> Vec<String> {
        self.manifest.middleware.clone()
    }

    fn is_configurable(&self) -> bool {
        self.manifest.configurable
    }

    fn has_admin_site(&self) -> bool {
        self.manifest.admin_site
    }

    fn admin_urlpatterns(&self) -> Vec<UrlPattern> {
        self.manifest.config_urls.clone()
    }

    fn register_admin(&self, site: &mut AdminSite) -> Result<()> {
        for model in &self.manifest.admin_models {
            site.register(model.clone())?;
        }
        Ok(())
    }

    async fn initialize(&self, ctx: &ExtensionContext) -> Result<()> {
        if !self.manifest.urls.is_empty() {
            UrlHook::register(ctx, self.manifest.urls.clone())?;
        }

        for spec in &self.manifest.template_hooks {
            TemplateHook::register(ctx, &spec.name, &spec.template, spec.apply_to.clone());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Timing;

    impl Middleware for Timing {
        fn name(&self) -> &str {
            "stats.timing"
        }
    }

    const MANIFEST: &str = r#"{
        "target": "rb_stats.extension:StatsExtension",
        "package": "rb-stats",
        "name": "Review Stats",
        "version": "1.2.0",
        "requires": ["rb_base.extension.BaseExtension"],
        "middleware": ["stats.timing"],
        "adminSite": true,
        "adminModels": ["Counter"],
        "urls": [{ "route": "/stats/", "name": "stats-index", "handler": "stats.index" }],
        "templateHooks": [{ "name": "base-scripts", "template": "stats/scripts.html" }]
    }"#;

    #[test]
    fn test_parse_manifest() {
        let manifest = ExtensionManifest::parse(MANIFEST).unwrap();

        assert_eq!(manifest.package, "rb-stats");
        assert_eq!(manifest.version(), "1.2.0");
        assert_eq!(manifest.metadata.name.as_deref(), Some("Review Stats"));
        assert_eq!(manifest.urls[0].name.as_deref(), Some("stats-index"));
        assert!(manifest.admin_site);
        assert!(!manifest.configurable);
        assert!(manifest.in_group("anything"));
    }

    #[test]
    fn test_invalid_target_rejected() {
        let result = ExtensionManifest::parse(r#"{"target": "nocolon", "package": "p"}"#);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_path_like_names_rejected() {
        for content in [
            r#"{"target": "ok.extension:Ok", "package": "../../victim"}"#,
            r#"{"target": "ok.extension:Ok", "package": "nested/pkg"}"#,
            r#"{"target": "../up:Ok", "package": "pkg"}"#,
            r#"{"target": "ok.extension:Ok/../x", "package": "pkg"}"#,
        ] {
            assert!(
                matches!(ExtensionManifest::parse(content), Err(Error::InvalidInput(_))),
                "{} should be rejected",
                content
            );
        }
    }

    #[test]
    fn test_unknown_middleware_fails_entry() {
        let manifest = ExtensionManifest::parse(MANIFEST).unwrap();

        let missing = Capabilities::new().resolve(&manifest);
        assert!(matches!(missing, Err(Error::ExtensionLoad { .. })));

        let caps = Capabilities::new().with_middleware(Arc::new(Timing));
        let class = caps.resolve(&manifest).unwrap();
        assert_eq!(class.middleware_names(), vec!["stats.timing"]);
        assert_eq!(class.requirements(), vec!["rb_base.extension.BaseExtension"]);

        let mut site = AdminSite::new("rb_stats");
        class.register_admin(&mut site).unwrap();
        assert_eq!(site.models(), &["Counter".to_string()]);
    }
}
