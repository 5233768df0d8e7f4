//! 확장 라이프사이클 통합 테스트
//!
//! `cargo test -p trellis-core --test lifecycle_tests`

use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use trellis_core::{
    AdminSite, Capabilities, DirectoryPackageInstaller, Distribution, Error, EventType,
    ExtensionClass, ExtensionContext, ExtensionHook, ExtensionManager, ExtensionMetadata,
    ExtensionsMiddleware, HookSet, ManagerSettings, ManifestPackageRegistry, Middleware,
    PackageRegistry, RequestContext, Result, SchemaTools, StaticPackageRegistry, TemplateContext,
    TemplateEngine, TemplateHook, UrlHook, UrlPattern,
};
use trellis_foundation::{RegistrationStore, Storage};

const GROUP: &str = "trellis.extensions";

// ============================================================================
// Fixtures
// ============================================================================

/// 요청 속성 "chain"에 자기 이름을 남기는 미들웨어
struct ChainMiddleware(String);

impl ChainMiddleware {
    fn named(name: &str) -> Arc<dyn Middleware> {
        Arc::new(Self(name.to_string()))
    }
}

impl Middleware for ChainMiddleware {
    fn name(&self) -> &str {
        &self.0
    }

    fn process_request(&self, request: &mut RequestContext) -> Result<()> {
        let chain = request
            .attributes
            .entry("chain".to_string())
            .or_insert_with(|| json!([]));
        if let Some(list) = chain.as_array_mut() {
            list.push(Value::String(self.0.clone()));
        }
        Ok(())
    }
}

/// 제거 요청을 항상 거부하는 훅 지점
#[derive(Default)]
struct PinnedPoint {
    hooks: Mutex<Vec<Arc<PinnedHook>>>,
}

struct PinnedHook(String);

impl ExtensionHook for PinnedHook {
    fn extension_id(&self) -> &str {
        &self.0
    }
}

impl HookSet<PinnedHook> for PinnedPoint {
    fn kind(&self) -> &str {
        "pinned"
    }

    fn add_hook(&self, hook: Arc<PinnedHook>) {
        self.hooks.lock().unwrap().push(hook);
    }

    fn remove_hook(&self, _hook: &Arc<PinnedHook>) -> Result<()> {
        Err(Error::HookNotRegistered("pinned".into()))
    }

    fn contains(&self, hook: &Arc<PinnedHook>) -> bool {
        self.hooks.lock().unwrap().iter().any(|h| Arc::ptr_eq(h, hook))
    }
}

#[derive(Default, Clone)]
struct TestExtension {
    requires: Vec<String>,
    middleware: Vec<Arc<dyn Middleware>>,
    urls: Vec<UrlPattern>,
    template_hooks: Vec<(String, String)>,
    admin_models: Vec<String>,
    config_urls: Vec<UrlPattern>,
    pinned: Option<Arc<PinnedPoint>>,
    fail_init: bool,
}

#[async_trait]
impl ExtensionClass for TestExtension {
    fn metadata(&self) -> ExtensionMetadata {
        ExtensionMetadata::named("Test Extension")
    }

    fn requirements(&self) -> Vec<String> {
        self.requires.clone()
    }

    fn middleware(&self) -> Vec<Arc<dyn Middleware>> {
        self.middleware.clone()
    }

    fn is_configurable(&self) -> bool {
        !self.config_urls.is_empty()
    }

    fn has_admin_site(&self) -> bool {
        !self.admin_models.is_empty()
    }

    fn admin_urlpatterns(&self) -> Vec<UrlPattern> {
        self.config_urls.clone()
    }

    fn register_admin(&self, site: &mut AdminSite) -> Result<()> {
        for model in &self.admin_models {
            site.register(model.clone())?;
        }
        Ok(())
    }

    async fn initialize(&self, ctx: &ExtensionContext) -> Result<()> {
        if !self.urls.is_empty() {
            UrlHook::register(ctx, self.urls.clone())?;
        }
        for (name, template) in &self.template_hooks {
            TemplateHook::register(ctx, name, template, vec![]);
        }
        if let Some(point) = &self.pinned {
            ctx.register_hook(point, PinnedHook(ctx.id().to_string()));
        }
        if self.fail_init {
            return Err(Error::Internal("initialization exploded".into()));
        }
        Ok(())
    }
}

#[derive(Default)]
struct RecordingSchemaTools {
    calls: Mutex<Vec<String>>,
    fail_for: Mutex<Option<String>>,
}

impl RecordingSchemaTools {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn fail_for(&self, app: &str) {
        *self.fail_for.lock().unwrap() = Some(app.to_string());
    }
}

#[async_trait]
impl SchemaTools for RecordingSchemaTools {
    async fn create_tables(&self, apps: &[String]) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("sync:{}", apps.join(",")));

        let fail_for = self.fail_for.lock().unwrap().clone();
        match fail_for {
            Some(app) if apps.contains(&app) => {
                Err(Error::InstallFailed(format!("table {}_counter already exists", app)))
            }
            _ => Ok(()),
        }
    }

    async fn apply_migrations(&self, apps: &[String]) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("evolve:{}", apps.join(",")));
        Ok(())
    }
}

#[derive(Default)]
struct RecordingEngine {
    resets: AtomicUsize,
}

impl TemplateEngine for RecordingEngine {
    fn render(&self, template_name: &str, context: &TemplateContext) -> Result<String> {
        let ext = context
            .get("extension")
            .and_then(Value::as_str)
            .unwrap_or("?");
        Ok(format!("<{}|{}>", template_name, ext))
    }

    fn reset_cache(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }
}

fn ext_id(name: &str) -> String {
    format!("{}.extension.Ext", name)
}

struct Fixture {
    temp: TempDir,
    registry: Arc<StaticPackageRegistry>,
    storage: Storage,
    schema: Arc<RecordingSchemaTools>,
    engine: Arc<RecordingEngine>,
    manager: ExtensionManager,
}

impl Fixture {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let registry = Arc::new(StaticPackageRegistry::new());
        let storage = Storage::in_memory().unwrap();
        let schema = Arc::new(RecordingSchemaTools::default());
        let engine = Arc::new(RecordingEngine::default());

        let manager = build_manager(
            temp.path(),
            registry.clone(),
            &storage,
            schema.clone(),
            engine.clone(),
        );

        Self {
            temp,
            registry,
            storage,
            schema,
            engine,
            manager,
        }
    }

    /// 같은 저장소/캐시를 쓰는 다른 워커 프로세스의 매니저
    fn other_process(&self) -> ExtensionManager {
        build_manager(
            self.temp.path(),
            self.registry.clone(),
            &self.storage,
            Arc::new(RecordingSchemaTools::default()),
            Arc::new(RecordingEngine::default()),
        )
    }

    fn package_dir(&self, name: &str) -> PathBuf {
        self.temp.path().join("packages").join(name)
    }

    fn add(&self, name: &str, ext: TestExtension) -> String {
        self.registry.register_class(
            GROUP,
            format!("{}.extension:Ext", name),
            Distribution::new(format!("{}-pkg", name), "1.0", self.package_dir(name)),
            Arc::new(ext),
        );
        ext_id(name)
    }

    fn record_enabled(&self, id: &str) -> bool {
        self.storage
            .find_registration(id)
            .unwrap()
            .map_or(false, |r| r.enabled)
    }

    async fn enabled_ids(&self) -> Vec<String> {
        self.manager
            .get_enabled_extensions()
            .await
            .iter()
            .map(|e| e.id().to_string())
            .collect()
    }
}

fn build_manager(
    root: &Path,
    registry: Arc<dyn PackageRegistry>,
    storage: &Storage,
    schema: Arc<RecordingSchemaTools>,
    engine: Arc<RecordingEngine>,
) -> ExtensionManager {
    ExtensionManager::builder(ManagerSettings::new(
        GROUP,
        root.join("media"),
        root.join("static"),
    ))
    .package_registry(registry)
    .store(Arc::new(storage.clone()))
    .cache(Arc::new(storage.clone()))
    .schema_tools(schema)
    .template_engine(engine)
    .build()
    .unwrap()
}

// ============================================================================
// Requirement ordering
// ============================================================================

#[tokio::test]
async fn test_enable_enables_requirements_first() {
    let fx = Fixture::new();
    let x = fx.add(
        "x",
        TestExtension {
            middleware: vec![ChainMiddleware::named("x.mw")],
            ..Default::default()
        },
    );
    let y = fx.add(
        "y",
        TestExtension {
            requires: vec![x.clone()],
            middleware: vec![ChainMiddleware::named("y.mw")],
            ..Default::default()
        },
    );
    fx.manager.load(false).await.unwrap();

    let instance = fx.manager.enable_extension(&y).await.unwrap();
    assert_eq!(instance.id(), y);

    assert_eq!(fx.enabled_ids().await, vec![x.clone(), y.clone()]);
    assert!(fx.record_enabled(&x));
    assert!(fx.record_enabled(&y));

    let names: Vec<String> = fx
        .manager
        .middleware()
        .await
        .iter()
        .map(|m| m.name().to_string())
        .collect();
    assert_eq!(names, vec!["x.mw", "y.mw"]);

    assert_eq!(
        fx.schema.calls(),
        vec!["sync:x", "evolve:x", "sync:y", "evolve:y"]
    );

    let installed = fx.manager.get_installed_extension(&y).await.unwrap();
    assert!(installed.enabled);
    assert!(installed.installed);
    assert_eq!(installed.requirements.len(), 1);
    assert_eq!(installed.requirements[0].id, x);
}

#[tokio::test]
async fn test_enable_is_noop_when_already_enabled() {
    let fx = Fixture::new();
    let x = fx.add("x", TestExtension::default());
    fx.manager.load(false).await.unwrap();

    let first = fx.manager.enable_extension(&x).await.unwrap();
    let second = fx.manager.enable_extension(&x).await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(fx.schema.calls().len(), 2);
}

#[tokio::test]
async fn test_disabling_dependency_disables_dependents() {
    let fx = Fixture::new();
    let x = fx.add("x", TestExtension::default());
    let y = fx.add(
        "y",
        TestExtension {
            requires: vec![x.clone()],
            ..Default::default()
        },
    );
    fx.manager.load(false).await.unwrap();
    fx.manager.enable_extension(&y).await.unwrap();

    fx.manager.disable_extension(&x).await.unwrap();

    assert!(fx.enabled_ids().await.is_empty());
    assert!(!fx.record_enabled(&x));
    assert!(!fx.record_enabled(&y));
    assert!(fx.manager.middleware().await.is_empty());
}

#[tokio::test]
async fn test_disable_reaches_transitive_dependents() {
    let fx = Fixture::new();
    let a = fx.add("a", TestExtension::default());
    let d1 = fx.add(
        "d1",
        TestExtension {
            requires: vec![a.clone()],
            ..Default::default()
        },
    );
    let d2 = fx.add(
        "d2",
        TestExtension {
            requires: vec![a.clone()],
            ..Default::default()
        },
    );
    let e = fx.add(
        "e",
        TestExtension {
            requires: vec![d1.clone()],
            ..Default::default()
        },
    );
    fx.manager.load(false).await.unwrap();
    fx.manager.enable_extension(&e).await.unwrap();
    fx.manager.enable_extension(&d2).await.unwrap();
    assert_eq!(fx.enabled_ids().await.len(), 4);

    let mut events = fx.manager.event_bus().subscribe();
    fx.manager.disable_extension(&a).await.unwrap();

    assert!(fx.enabled_ids().await.is_empty());

    let mut disabled = Vec::new();
    while let Ok(event) = events.try_recv() {
        if event.event_type == EventType::Disabled {
            disabled.push(event.extension_id);
        }
    }
    assert_eq!(disabled.last(), Some(&a));
    let pos = |id: &String| disabled.iter().position(|d| d == id).unwrap();
    assert!(pos(&e) < pos(&d1));
    assert_eq!(disabled.len(), 4);
}

#[tokio::test]
async fn test_get_dependent_extensions() {
    let fx = Fixture::new();
    let x = fx.add("x", TestExtension::default());
    let y = fx.add(
        "y",
        TestExtension {
            requires: vec![x.clone()],
            ..Default::default()
        },
    );
    fx.manager.load(false).await.unwrap();

    let dependents = fx.manager.get_dependent_extensions(&x).await.unwrap();
    assert_eq!(dependents.len(), 1);
    assert_eq!(dependents[0].id(), y);

    assert!(fx.manager.get_dependent_extensions(&y).await.unwrap().is_empty());
    assert!(matches!(
        fx.manager.get_dependent_extensions("nope").await,
        Err(Error::UnknownExtension(_))
    ));
}

// ============================================================================
// Unknown ids, missing requirements, cycles
// ============================================================================

#[tokio::test]
async fn test_unknown_extension_errors() {
    let fx = Fixture::new();
    let x = fx.add("x", TestExtension::default());
    fx.manager.load(false).await.unwrap();

    assert!(matches!(
        fx.manager.enable_extension("missing.extension.Ext").await,
        Err(Error::UnknownExtension(_))
    ));
    assert!(matches!(
        fx.manager.disable_extension("missing.extension.Ext").await,
        Err(Error::UnknownExtension(_))
    ));
    assert!(matches!(
        fx.manager.get_installed_extension("missing.extension.Ext").await,
        Err(Error::UnknownExtension(_))
    ));

    // 이미 비활성인 확장은 no-op
    fx.manager.disable_extension(&x).await.unwrap();
}

#[tokio::test]
async fn test_missing_requirement_fails_as_unknown() {
    let fx = Fixture::new();
    let y = fx.add(
        "y",
        TestExtension {
            requires: vec![ext_id("ghost")],
            ..Default::default()
        },
    );
    fx.manager.load(false).await.unwrap();

    let err = fx.manager.enable_extension(&y).await.unwrap_err();
    assert!(matches!(err, Error::UnknownExtension(id) if id == ext_id("ghost")));
    assert!(fx.enabled_ids().await.is_empty());
    assert!(fx.schema.calls().is_empty());
}

#[tokio::test]
async fn test_cyclic_requirements_fail_before_side_effects() {
    let fx = Fixture::new();
    let a = fx.add(
        "a",
        TestExtension {
            requires: vec![ext_id("b")],
            ..Default::default()
        },
    );
    fx.add(
        "b",
        TestExtension {
            requires: vec![a.clone()],
            ..Default::default()
        },
    );
    fx.manager.load(false).await.unwrap();

    let err = fx.manager.enable_extension(&a).await.unwrap_err();
    match err {
        Error::CyclicDependency(path) => {
            assert_eq!(path.first(), Some(&a));
            assert_eq!(path.last(), Some(&a));
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(fx.enabled_ids().await.is_empty());
    assert!(fx.schema.calls().is_empty());
}

// ============================================================================
// Failed enable rolls back
// ============================================================================

#[tokio::test]
async fn test_schema_failure_leaves_extension_disabled() {
    let fx = Fixture::new();
    let x = fx.add("x", TestExtension::default());

    let static_dir = fx.package_dir("x").join("static");
    std::fs::create_dir_all(&static_dir).unwrap();
    std::fs::write(static_dir.join("app.js"), "console.log(1)").unwrap();

    fx.schema.fail_for("x");
    fx.manager.load(false).await.unwrap();

    let err = fx.manager.enable_extension(&x).await.unwrap_err();
    match &err {
        Error::EnablingFailed { id, source } => {
            assert_eq!(id, &x);
            assert!(matches!(**source, Error::InstallFailed(ref msg) if msg.contains("already exists")));
        }
        other => panic!("unexpected error: {}", other),
    }

    assert!(fx.manager.get_enabled_extension(&x).await.is_none());
    assert!(!fx.record_enabled(&x));
    assert!(!fx.temp.path().join("static/ext").join(&x).exists());
    assert!(!fx.manager.apps().contains("x"));
}

#[tokio::test]
async fn test_extensions_sharing_an_app() {
    let fx = Fixture::new();
    for (target, package) in [
        ("shared.extension:A", "shared-a"),
        ("shared.extension:B", "shared-b"),
        ("shared.other:C", "shared-c"),
    ] {
        fx.registry.register_class(
            GROUP,
            target,
            Distribution::new(package, "1.0", fx.package_dir(package)),
            Arc::new(TestExtension::default()),
        );
    }
    let (a, b, c) = ("shared.extension.A", "shared.extension.B", "shared.other.C");
    fx.manager.load(false).await.unwrap();

    fx.manager.enable_extension(a).await.unwrap();
    fx.manager.enable_extension(b).await.unwrap();
    fx.manager.disable_extension(b).await.unwrap();

    assert!(fx.manager.apps().contains("shared"));
    assert!(fx.manager.get_enabled_extension(a).await.is_some());

    // 같은 앱을 쓰는 다른 확장의 스키마 실패도 앱을 빼지 않는다
    fx.schema.fail_for("shared");
    assert!(fx.manager.enable_extension(c).await.is_err());
    assert!(fx.manager.apps().contains("shared"));

    fx.manager.disable_extension(a).await.unwrap();
    assert!(!fx.manager.apps().contains("shared"));
}

#[tokio::test]
async fn test_initialize_failure_tears_down_hooks() {
    let fx = Fixture::new();
    let x = fx.add(
        "x",
        TestExtension {
            urls: vec![UrlPattern::new("/x/", "x.index").with_name("x-index")],
            template_hooks: vec![("head".into(), "x/head.html".into())],
            fail_init: true,
            ..Default::default()
        },
    );
    fx.manager.load(false).await.unwrap();

    let err = fx.manager.enable_extension(&x).await.unwrap_err();
    assert!(matches!(err, Error::EnablingFailed { .. }));

    assert!(fx.manager.get_url_patterns().is_empty());
    assert!(fx.manager.hooks().url_hooks().is_empty());
    assert!(fx.manager.hooks().template_hooks().lookup("head").is_empty());
    assert!(!fx.record_enabled(&x));
    assert!(fx.manager.get_enabled_extension(&x).await.is_none());
}

#[tokio::test]
async fn test_hook_removal_failure_keeps_initialize_error() {
    let fx = Fixture::new();
    let pinned = Arc::new(PinnedPoint::default());
    let x = fx.add(
        "x",
        TestExtension {
            template_hooks: vec![("head".into(), "x/head.html".into())],
            pinned: Some(pinned.clone()),
            fail_init: true,
            ..Default::default()
        },
    );
    fx.manager.load(false).await.unwrap();

    let err = fx.manager.enable_extension(&x).await.unwrap_err();
    match &err {
        Error::EnablingFailed { source, .. } => {
            assert!(matches!(**source, Error::Internal(ref msg) if msg.contains("exploded")));
        }
        other => panic!("unexpected error: {}", other),
    }

    // 나머지 훅은 계속 정리된다
    assert!(fx.manager.hooks().template_hooks().lookup("head").is_empty());
    assert_eq!(pinned.hooks.lock().unwrap().len(), 1);
    assert!(fx.manager.get_enabled_extension(&x).await.is_none());
}

// ============================================================================
// Instance lifecycle
// ============================================================================

#[tokio::test]
async fn test_enable_disable_enable_restores_instance() {
    let fx = Fixture::new();
    let plain = fx.add("plain", TestExtension::default());
    let routed = fx.add(
        "routed",
        TestExtension {
            urls: vec![UrlPattern::new("/routed/{item}/", "routed.item").with_name("routed-item")],
            ..Default::default()
        },
    );
    fx.manager.load(false).await.unwrap();

    let first = fx.manager.enable_extension(&plain).await.unwrap();
    assert!(first.hooks().is_empty());
    fx.manager.disable_extension(&plain).await.unwrap();
    let again = fx.manager.enable_extension(&plain).await.unwrap();

    assert_eq!(again.id(), plain);
    assert!(again.hooks().is_empty());
    assert!(!Arc::ptr_eq(&first, &again));

    let urls = fx.manager.get_url_patterns();
    fx.manager.enable_extension(&routed).await.unwrap();
    assert!(urls.resolve("/routed/7/").is_some());
    assert_eq!(fx.manager.hooks().url_hooks().len(), 1);

    fx.manager.disable_extension(&routed).await.unwrap();
    assert!(urls.resolve("/routed/7/").is_none());
    assert!(fx.manager.hooks().url_hooks().is_empty());

    let restored = fx.manager.enable_extension(&routed).await.unwrap();
    assert_eq!(restored.hooks().len(), 1);
    assert!(urls.resolve("/routed/7/").is_some());
}

#[tokio::test]
async fn test_static_assets_staged_and_removed() {
    let fx = Fixture::new();
    let x = fx.add("x", TestExtension::default());

    let package = fx.package_dir("x");
    std::fs::create_dir_all(package.join("static/css")).unwrap();
    std::fs::write(package.join("static/css/x.css"), "body {}").unwrap();
    std::fs::create_dir_all(package.join("htdocs")).unwrap();
    std::fs::write(package.join("htdocs/logo.png"), "png").unwrap();

    fx.manager.load(false).await.unwrap();
    fx.manager.enable_extension(&x).await.unwrap();

    let installed_static = fx.temp.path().join("static/ext").join(&x);
    let installed_htdocs = fx.temp.path().join("media/ext/x-pkg");
    assert!(installed_static.join("css/x.css").exists());
    assert!(installed_htdocs.join("logo.png").exists());
    assert!(fx.manager.apps().contains("x"));

    fx.manager.disable_extension(&x).await.unwrap();
    assert!(!installed_static.exists());
    assert!(!installed_htdocs.exists());
    assert!(!fx.manager.apps().contains("x"));
}

#[tokio::test]
async fn test_admin_site_and_config_urls() {
    let fx = Fixture::new();
    let x = fx.add(
        "x",
        TestExtension {
            admin_models: vec!["Counter".into()],
            config_urls: vec![UrlPattern::new("", "x.configure").with_name("x-configure")],
            ..Default::default()
        },
    );
    fx.manager.load(false).await.unwrap();

    let instance = fx.manager.enable_extension(&x).await.unwrap();
    assert_eq!(
        instance.admin_site().map(|s| s.models().to_vec()),
        Some(vec!["Counter".to_string()])
    );

    let urls = fx.manager.get_url_patterns();
    let config = format!("/admin/extensions/{}/config/", x);
    let changelist = format!("/admin/extensions/{}/db/counter/", x);
    assert_eq!(urls.resolve(&config).unwrap().pattern.handler, "x.configure");
    assert_eq!(urls.resolve(&changelist).unwrap().pattern.handler, "admin.changelist");

    fx.manager.disable_extension(&x).await.unwrap();
    assert!(urls.is_empty());

    // 재활성화 시 관리 모델이 다시 등록된다
    let instance = fx.manager.enable_extension(&x).await.unwrap();
    assert_eq!(instance.admin_site().map(|s| s.models().len()), Some(1));
    assert!(urls.resolve(&changelist).is_some());
}

#[tokio::test]
async fn test_template_hooks_render_while_enabled() {
    let fx = Fixture::new();
    let x = fx.add(
        "x",
        TestExtension {
            template_hooks: vec![("head".into(), "x/head.html".into())],
            ..Default::default()
        },
    );
    fx.manager.load(false).await.unwrap();
    fx.manager.enable_extension(&x).await.unwrap();

    let urls = fx.manager.get_url_patterns();
    let request = RequestContext::new("/dashboard/");
    let render = || {
        fx.manager.hooks().template_hooks().render(
            "head",
            &request,
            &TemplateContext::new(),
            urls.as_ref(),
            fx.engine.as_ref(),
        )
    };

    assert_eq!(render(), format!("<x/head.html|{}>", x));

    let resets_before = fx.engine.resets.load(Ordering::SeqCst);
    fx.manager.disable_extension(&x).await.unwrap();
    assert_eq!(render(), "");
    assert!(fx.engine.resets.load(Ordering::SeqCst) > resets_before);
}

#[tokio::test]
async fn test_lifecycle_events() {
    let fx = Fixture::new();
    let x = fx.add("x", TestExtension::default());
    fx.manager.load(false).await.unwrap();

    let mut events = fx.manager.event_bus().subscribe();
    fx.manager.enable_extension(&x).await.unwrap();
    fx.manager.disable_extension(&x).await.unwrap();

    let mut types = Vec::new();
    while let Ok(event) = events.try_recv() {
        assert_eq!(event.extension_id, x);
        types.push(event.event_type);
    }

    assert_eq!(
        types,
        vec![
            EventType::Installed,
            EventType::Initialized,
            EventType::Enabled,
            EventType::Uninitialized,
            EventType::Disabled,
        ]
    );
}

#[tokio::test]
async fn test_extension_settings_persist_across_enables() {
    let fx = Fixture::new();
    let x = fx.add("x", TestExtension::default());
    fx.manager.load(false).await.unwrap();

    let instance = fx.manager.enable_extension(&x).await.unwrap();
    instance
        .context()
        .save_settings(json!({ "color": "red" }))
        .unwrap();

    fx.manager.disable_extension(&x).await.unwrap();
    let instance = fx.manager.enable_extension(&x).await.unwrap();

    assert_eq!(instance.context().setting("color"), Some(json!("red")));
    assert!(instance.context().save_settings(json!("not an object")).is_err());
}

// ============================================================================
// Discovery and generation sync
// ============================================================================

#[tokio::test]
async fn test_load_twice_keeps_instances_and_generation() {
    let fx = Fixture::new();
    let x = fx.add("x", TestExtension::default());
    fx.manager.load(false).await.unwrap();
    let instance = fx.manager.enable_extension(&x).await.unwrap();

    fx.manager.load(false).await.unwrap();
    let generation = fx.manager.sync_generation().await;
    let report = fx.manager.load(false).await.unwrap();

    assert!(report.initialized.is_empty());
    assert_eq!(fx.manager.sync_generation().await, generation);
    let current = fx.manager.get_enabled_extension(&x).await.unwrap();
    assert!(Arc::ptr_eq(&instance, &current));
}

#[tokio::test]
async fn test_is_expired_tracks_shared_generation() {
    let fx = Fixture::new();
    fx.add("x", TestExtension::default());

    assert!(fx.manager.is_expired().await);
    fx.manager.load(false).await.unwrap();
    assert!(!fx.manager.is_expired().await);

    fx.manager.clear_sync_cache().unwrap();
    assert!(fx.manager.is_expired().await);

    fx.manager.load(false).await.unwrap();
    assert!(!fx.manager.is_expired().await);
}

#[tokio::test]
async fn test_enable_reseeds_cleared_generation() {
    let fx = Fixture::new();
    let x = fx.add("x", TestExtension::default());
    let worker = fx.other_process();

    fx.manager.load(false).await.unwrap();
    worker.load(false).await.unwrap();
    let before = fx.manager.sync_generation().await.unwrap();

    fx.manager.clear_sync_cache().unwrap();
    fx.manager.enable_extension(&x).await.unwrap();

    let sync_key = fx.manager.settings().sync_key();
    let stored = fx.storage.cache_get(&sync_key).unwrap();
    assert!(stored.is_some());
    assert!(stored.unwrap() > before);
    assert_eq!(fx.manager.sync_generation().await, stored);
    assert!(!fx.manager.is_expired().await);
    assert!(worker.is_expired().await);
}

#[tokio::test]
async fn test_other_process_converges() {
    let fx = Fixture::new();
    let x = fx.add("x", TestExtension::default());
    let worker = fx.other_process();

    fx.manager.load(false).await.unwrap();
    worker.load(false).await.unwrap();
    assert!(!worker.is_expired().await);

    fx.manager.enable_extension(&x).await.unwrap();
    assert!(!fx.manager.is_expired().await);
    assert!(worker.is_expired().await);

    let report = worker.load(false).await.unwrap();
    assert_eq!(report.initialized, vec![x.clone()]);
    assert!(worker.get_enabled_extension(&x).await.is_some());
    assert!(!worker.is_expired().await);

    fx.manager.disable_extension(&x).await.unwrap();
    assert!(worker.is_expired().await);
    worker.load(false).await.unwrap();
    assert!(worker.get_enabled_extension(&x).await.is_none());
}

#[tokio::test]
async fn test_enabled_record_initialized_on_load() {
    let fx = Fixture::new();
    let x = fx.add("x", TestExtension::default());

    let (mut record, created) = fx.storage.get_or_create_registration(&x, "x-pkg").unwrap();
    assert!(created);
    record.enabled = true;
    fx.storage.save_registration(&record).unwrap();

    let report = fx.manager.load(false).await.unwrap();
    assert_eq!(report.initialized, vec![x.clone()]);
    assert!(fx.manager.get_enabled_extension(&x).await.is_some());
}

#[tokio::test]
async fn test_removed_package_is_dropped() {
    let fx = Fixture::new();
    let x = fx.add("x", TestExtension::default());
    fx.manager.load(false).await.unwrap();
    fx.manager.enable_extension(&x).await.unwrap();

    assert!(fx.registry.remove("x.extension:Ext"));
    let report = fx.manager.load(false).await.unwrap();

    assert_eq!(report.removed, vec![x.clone()]);
    assert!(fx.manager.get_enabled_extension(&x).await.is_none());
    assert!(matches!(
        fx.manager.get_installed_extension(&x).await,
        Err(Error::UnknownExtension(_))
    ));
    // 레코드는 지워지지 않는다
    assert!(fx.storage.find_registration(&x).unwrap().is_some());
}

#[tokio::test]
async fn test_full_reload_recreates_instances() {
    let fx = Fixture::new();
    let x = fx.add("x", TestExtension::default());
    fx.manager.load(false).await.unwrap();
    let before = fx.manager.enable_extension(&x).await.unwrap();

    let report = fx.manager.load(true).await.unwrap();

    assert_eq!(report.initialized, vec![x.clone()]);
    let after = fx.manager.get_enabled_extension(&x).await.unwrap();
    assert!(!Arc::ptr_eq(&before, &after));
}

#[tokio::test]
async fn test_broken_entry_does_not_abort_discovery() {
    let fx = Fixture::new();
    fx.registry.register_class(
        GROUP,
        "no_class_separator",
        Distribution::new("broken", "1.0", fx.package_dir("broken")),
        Arc::new(TestExtension::default()),
    );
    let x = fx.add("x", TestExtension::default());

    let report = fx.manager.load(false).await.unwrap();

    assert_eq!(report.discovered, vec![x]);
    assert_eq!(report.failed, vec!["no_class_separator".to_string()]);
}

#[tokio::test]
async fn test_path_like_package_name_cannot_escape_media_root() {
    let fx = Fixture::new();
    let victim = fx.temp.path().join("victim");
    std::fs::create_dir_all(&victim).unwrap();
    std::fs::write(victim.join("precious.txt"), "keep").unwrap();
    std::fs::create_dir_all(fx.temp.path().join("media/ext")).unwrap();

    fx.registry.register_class(
        GROUP,
        "evil.extension:Ext",
        Distribution::new("../../victim", "1.0", fx.package_dir("evil")),
        Arc::new(TestExtension::default()),
    );
    let report = fx.manager.load(false).await.unwrap();

    assert_eq!(report.failed, vec!["evil.extension:Ext".to_string()]);
    assert!(report.discovered.is_empty());
    assert!(matches!(
        fx.manager.enable_extension("evil.extension.Ext").await,
        Err(Error::UnknownExtension(_))
    ));
    assert!(victim.join("precious.txt").exists());
}

// ============================================================================
// Request middleware
// ============================================================================

#[tokio::test]
async fn test_extensions_middleware_reloads_and_runs_chain() {
    let fx = Fixture::new();
    let x = fx.add(
        "x",
        TestExtension {
            middleware: vec![ChainMiddleware::named("x.mw")],
            urls: vec![UrlPattern::new("/x/{item}/", "x.item").with_name("x-item")],
            ..Default::default()
        },
    );
    let y = fx.add(
        "y",
        TestExtension {
            requires: vec![x.clone()],
            middleware: vec![ChainMiddleware::named("y.mw")],
            ..Default::default()
        },
    );

    let worker = Arc::new(fx.other_process());
    worker.load(false).await.unwrap();
    let middleware = ExtensionsMiddleware::new(worker.clone());

    fx.manager.load(false).await.unwrap();
    fx.manager.enable_extension(&y).await.unwrap();

    let mut request = RequestContext::new("/x/42/");
    middleware.process_request(&mut request).await.unwrap();

    assert_eq!(worker.get_enabled_extensions().await.len(), 2);
    assert_eq!(request.url_kwargs.get("item").map(String::as_str), Some("42"));
    assert_eq!(request.attributes.get("chain"), Some(&json!(["x.mw", "y.mw"])));
}

// ============================================================================
// Package installation
// ============================================================================

async fn manifest_manager(temp: &TempDir, storage: &Storage) -> ExtensionManager {
    let extensions_dir = temp.path().join("extensions");
    tokio::fs::create_dir_all(&extensions_dir).await.unwrap();

    ExtensionManager::builder(ManagerSettings::new(
        GROUP,
        temp.path().join("media"),
        temp.path().join("static"),
    ))
    .package_registry(Arc::new(ManifestPackageRegistry::new(
        vec![extensions_dir.clone()],
        Capabilities::new().with_middleware(ChainMiddleware::named("stats.timing")),
    )))
    .store(Arc::new(storage.clone()))
    .cache(Arc::new(storage.clone()))
    .package_installer(Arc::new(DirectoryPackageInstaller::new(extensions_dir)))
    .build()
    .unwrap()
}

#[tokio::test]
async fn test_install_manifest_package_then_enable() {
    let temp = TempDir::new().unwrap();
    let storage = Storage::in_memory().unwrap();
    let manager = manifest_manager(&temp, &storage).await;
    manager.load(false).await.unwrap();

    let source = temp.path().join("downloads/rb-stats");
    tokio::fs::create_dir_all(&source).await.unwrap();
    tokio::fs::write(
        source.join("extension.json"),
        r#"{
            "target": "rb_stats.extension:StatsExtension",
            "package": "rb-stats",
            "name": "Review Stats",
            "middleware": ["stats.timing"],
            "urls": [{ "route": "/stats/", "name": "stats-index", "handler": "stats.index" }],
            "templateHooks": [{ "name": "base-scripts", "template": "stats/scripts.html" }]
        }"#,
    )
    .await
    .unwrap();

    let generation = manager.sync_generation().await;
    manager
        .install_extension(source.to_str().unwrap(), "rb-stats")
        .await
        .unwrap();
    assert_ne!(manager.sync_generation().await, generation);

    let id = "rb_stats.extension.StatsExtension";
    let installed = manager.get_installed_extension(id).await.unwrap();
    assert_eq!(installed.info.name, "Review Stats");
    assert_eq!(installed.info.package_name, "rb-stats");
    assert!(!installed.enabled);

    manager.enable_extension(id).await.unwrap();
    assert!(manager.get_url_patterns().resolve("/stats/").is_some());
    assert_eq!(manager.hooks().template_hooks().lookup("base-scripts").len(), 1);
    assert_eq!(manager.middleware().await.len(), 1);
}

#[tokio::test]
async fn test_install_failures_are_reported() {
    let temp = TempDir::new().unwrap();
    let storage = Storage::in_memory().unwrap();
    let manager = manifest_manager(&temp, &storage).await;

    let err = manager
        .install_extension("/definitely/not/here", "rb-stats")
        .await
        .unwrap_err();
    assert!(
        matches!(err, Error::InstallFailed(ref msg) if msg == "Installation failed (probably malformed URL).")
    );

    let source = temp.path().join("downloads/rb-other");
    tokio::fs::create_dir_all(&source).await.unwrap();
    tokio::fs::write(
        source.join("extension.json"),
        r#"{"target": "rb_other.extension:Other", "package": "rb-other"}"#,
    )
    .await
    .unwrap();

    let err = manager
        .install_extension(source.to_str().unwrap(), "wrong-name")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InstallFailed(ref msg) if msg == "Invalid package name."));
}
