//! Extension Manager - 확장 라이프사이클 관리
//!
//! 패키지 레지스트리에서 발견한 확장과 Registration Record를 맞추고,
//! 활성화/비활성화(요구 관계 순서 포함), 설치 부수 효과, 관리 URL 연결,
//! 프로세스 간 세대(generation) 동기화를 담당한다.
//!
//! ## 동시성
//!
//! 관리 작업(`load`, `enable_extension`, `disable_extension`, `install_extension`)은
//! 상태 쓰기 락을 작업 전체 동안 잡는다. 한 프로세스 안의 관리 작업은 이 락으로
//! 직렬화되고, 프로세스 사이의 수렴은 공유 캐시의 세대 값과 Registration Record로만
//! 이루어진다.

use super::admin::AdminSite;
use super::apps::AppRegistry;
use super::context::ExtensionContext;
use super::dependency::{disable_order, enable_order};
use super::events::{EventBus, EventType};
use super::info::ExtensionInfo;
use super::installer::{AssetInstaller, NoopSchemaTools, PackageInstaller, SchemaTools};
use super::instance::EnabledExtension;
use super::registry::PackageRegistry;
use super::traits::{ExtensionClass, Middleware};
use crate::hook::HookRegistry;
use crate::template::{NullTemplateEngine, TemplateEngine};
use crate::urls::{join_route, DynamicUrlTable, UrlPattern};
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use trellis_foundation::{
    make_cache_key, Error, RegisteredExtension, RegistrationStore, Result, SharedCache,
    TrellisConfig, DEFAULT_ADMIN_PREFIX,
};

// ============================================================================
// ManagerSettings
// ============================================================================

/// 매니저 설정
#[derive(Debug, Clone)]
pub struct ManagerSettings {
    /// 레지스트리 그룹 / 캐시 키 네임스페이스
    pub key: String,

    /// 캐시 키 사이트 접두사
    pub cache_prefix: Option<String>,

    /// 사이트 루트 (관리 URL 접두사에서 제거)
    pub site_root: Option<String>,

    /// 확장 관리 URL 접두사
    pub admin_prefix: String,

    pub media_root: PathBuf,
    pub static_root: PathBuf,

    /// 디버그 모드에서는 static 파일을 수집하지 않는다
    pub debug: bool,
}

impl ManagerSettings {
    pub fn new(
        key: impl Into<String>,
        media_root: impl Into<PathBuf>,
        static_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            key: key.into(),
            cache_prefix: None,
            site_root: None,
            admin_prefix: DEFAULT_ADMIN_PREFIX.to_string(),
            media_root: media_root.into(),
            static_root: static_root.into(),
            debug: false,
        }
    }

    pub fn from_config(config: &TrellisConfig) -> Self {
        Self {
            key: config.manager_key().to_string(),
            cache_prefix: config.cache_prefix.clone(),
            site_root: config.site_root.clone(),
            admin_prefix: config.admin_prefix().to_string(),
            media_root: config.media_root(),
            static_root: config.static_root(),
            debug: config.debug(),
        }
    }

    /// 공유 캐시의 세대 키
    pub fn sync_key(&self) -> String {
        make_cache_key(
            self.cache_prefix.as_deref(),
            &format!("extensionmgr:{}:gen", self.key),
        )
    }

    /// 사이트 루트를 뺀 관리 URL 접두사
    pub fn admin_url_prefix(&self) -> String {
        let prefix = match self.site_root.as_deref() {
            Some(root) if !root.is_empty() && self.admin_prefix.starts_with(root) => {
                &self.admin_prefix[root.len()..]
            }
            _ => self.admin_prefix.as_str(),
        };

        if prefix.starts_with('/') {
            prefix.to_string()
        } else {
            format!("/{}", prefix)
        }
    }
}

// ============================================================================
// 조회 결과 타입
// ============================================================================

/// 설치된(발견된) 확장 스냅샷
#[derive(Debug, Clone)]
pub struct InstalledExtension {
    pub info: Arc<ExtensionInfo>,

    /// 이 프로세스에서 활성 상태인지
    pub enabled: bool,

    /// 설치 부수 효과가 완료되었는지
    pub installed: bool,

    /// 해석된 요구 확장 (발견되지 않은 ID는 빠진다)
    pub requirements: Vec<Arc<ExtensionInfo>>,
}

impl InstalledExtension {
    pub fn id(&self) -> &str {
        &self.info.id
    }
}

/// `load()` 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// 이번에 발견된 확장
    pub discovered: Vec<String>,

    /// 새로 인스턴스를 만든 확장
    pub initialized: Vec<String>,

    /// 더 이상 발견되지 않아 제거된 확장
    pub removed: Vec<String>,

    /// 로드/초기화에 실패해 건너뛴 엔트리
    pub failed: Vec<String>,
}

// ============================================================================
// 내부 상태
// ============================================================================

struct KnownExtension {
    class: Arc<dyn ExtensionClass>,
    info: Arc<ExtensionInfo>,
    registration: RegisteredExtension,
    resolved_requirements: Vec<Arc<ExtensionInfo>>,
}

#[derive(Default)]
struct ManagerState {
    /// 발견된 확장 (ID 순)
    known: BTreeMap<String, KnownExtension>,

    /// 활성 인스턴스 (활성화 순)
    enabled: Vec<Arc<EnabledExtension>>,

    /// 결합된 미들웨어 체인
    middleware: Vec<Arc<dyn Middleware>>,

    /// 마지막으로 본 세대 값
    last_sync_gen: Option<i64>,
}

impl ManagerState {
    fn enabled(&self, id: &str) -> Option<&Arc<EnabledExtension>> {
        self.enabled.iter().find(|e| e.id() == id)
    }

    fn is_enabled(&self, id: &str) -> bool {
        self.enabled(id).is_some()
    }

    fn dependents_of(&self, id: &str) -> Vec<String> {
        self.known
            .iter()
            .filter(|(_, k)| k.info.requirements.iter().any(|r| r == id))
            .map(|(ext_id, _)| ext_id.clone())
            .collect()
    }

    fn snapshot(&self, known: &KnownExtension) -> InstalledExtension {
        InstalledExtension {
            info: known.info.clone(),
            enabled: self.is_enabled(&known.info.id),
            installed: known.registration.installed,
            requirements: known.resolved_requirements.clone(),
        }
    }

    /// 요구 대상의 미들웨어가 먼저 오도록 결합 (확장마다 한 번)
    fn combined_middleware(&self) -> Vec<Arc<dyn Middleware>> {
        let mut done = HashSet::new();
        let mut chain = Vec::new();

        for ext in &self.enabled {
            self.collect_middleware(ext.id(), &mut done, &mut chain);
        }
        chain
    }

    fn collect_middleware(
        &self,
        id: &str,
        done: &mut HashSet<String>,
        chain: &mut Vec<Arc<dyn Middleware>>,
    ) {
        if !done.insert(id.to_string()) {
            return;
        }
        let Some(ext) = self.enabled(id) else {
            return;
        };

        for req in &ext.info().requirements {
            self.collect_middleware(req, done, chain);
        }
        chain.extend(ext.middleware().iter().cloned());
    }
}

// ============================================================================
// ExtensionManagerBuilder
// ============================================================================

/// 매니저 빌더
pub struct ExtensionManagerBuilder {
    settings: ManagerSettings,
    registry: Option<Arc<dyn PackageRegistry>>,
    store: Option<Arc<dyn RegistrationStore>>,
    cache: Option<Arc<dyn SharedCache>>,
    schema_tools: Arc<dyn SchemaTools>,
    template_engine: Arc<dyn TemplateEngine>,
    package_installer: Option<Arc<dyn PackageInstaller>>,
    hooks: Option<Arc<HookRegistry>>,
    apps: Option<Arc<AppRegistry>>,
    event_bus: Option<Arc<EventBus>>,
}

impl ExtensionManagerBuilder {
    fn new(settings: ManagerSettings) -> Self {
        Self {
            settings,
            registry: None,
            store: None,
            cache: None,
            schema_tools: Arc::new(NoopSchemaTools),
            template_engine: Arc::new(NullTemplateEngine),
            package_installer: None,
            hooks: None,
            apps: None,
            event_bus: None,
        }
    }

    pub fn package_registry(mut self, registry: Arc<dyn PackageRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn store(mut self, store: Arc<dyn RegistrationStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn cache(mut self, cache: Arc<dyn SharedCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn schema_tools(mut self, tools: Arc<dyn SchemaTools>) -> Self {
        self.schema_tools = tools;
        self
    }

    pub fn template_engine(mut self, engine: Arc<dyn TemplateEngine>) -> Self {
        self.template_engine = engine;
        self
    }

    pub fn package_installer(mut self, installer: Arc<dyn PackageInstaller>) -> Self {
        self.package_installer = Some(installer);
        self
    }

    /// 호스트와 공유할 훅 지점
    pub fn hooks(mut self, hooks: Arc<HookRegistry>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// 호스트와 공유할 앱 목록
    pub fn apps(mut self, apps: Arc<AppRegistry>) -> Self {
        self.apps = Some(apps);
        self
    }

    pub fn event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn build(self) -> Result<ExtensionManager> {
        let registry = self
            .registry
            .ok_or_else(|| Error::Config("ExtensionManager requires a package registry".into()))?;
        let store = self
            .store
            .ok_or_else(|| Error::Config("ExtensionManager requires a registration store".into()))?;
        let cache = self
            .cache
            .ok_or_else(|| Error::Config("ExtensionManager requires a shared cache".into()))?;

        Ok(ExtensionManager {
            sync_key: self.settings.sync_key(),
            assets: AssetInstaller::new(&self.settings.media_root, &self.settings.static_root),
            settings: self.settings,
            registry,
            store,
            cache,
            schema_tools: self.schema_tools,
            template_engine: self.template_engine,
            package_installer: self.package_installer,
            urls: Arc::new(DynamicUrlTable::new()),
            hooks: self.hooks.unwrap_or_default(),
            apps: self.apps.unwrap_or_default(),
            event_bus: self.event_bus.unwrap_or_default(),
            state: RwLock::new(ManagerState::default()),
        })
    }
}

// ============================================================================
// ExtensionManager
// ============================================================================

/// 확장 매니저
pub struct ExtensionManager {
    settings: ManagerSettings,

    /// 공유 캐시 세대 키
    sync_key: String,

    registry: Arc<dyn PackageRegistry>,
    store: Arc<dyn RegistrationStore>,
    cache: Arc<dyn SharedCache>,
    schema_tools: Arc<dyn SchemaTools>,
    template_engine: Arc<dyn TemplateEngine>,
    package_installer: Option<Arc<dyn PackageInstaller>>,
    assets: AssetInstaller,

    /// 확장 라우트 테이블 (호스트가 한 번 마운트)
    urls: Arc<DynamicUrlTable>,

    hooks: Arc<HookRegistry>,
    apps: Arc<AppRegistry>,
    event_bus: Arc<EventBus>,

    state: RwLock<ManagerState>,
}

impl ExtensionManager {
    pub fn builder(settings: ManagerSettings) -> ExtensionManagerBuilder {
        ExtensionManagerBuilder::new(settings)
    }

    // ========================================================================
    // 호스트 접근자
    // ========================================================================

    /// 확장 라우트 테이블
    pub fn get_url_patterns(&self) -> Arc<DynamicUrlTable> {
        self.urls.clone()
    }

    /// 확장 관리 화면 URL
    pub fn get_absolute_url(&self) -> &str {
        &self.settings.admin_prefix
    }

    pub fn settings(&self) -> &ManagerSettings {
        &self.settings
    }

    pub fn hooks(&self) -> &Arc<HookRegistry> {
        &self.hooks
    }

    pub fn apps(&self) -> &Arc<AppRegistry> {
        &self.apps
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    pub fn template_engine(&self) -> &Arc<dyn TemplateEngine> {
        &self.template_engine
    }

    // ========================================================================
    // 조회
    // ========================================================================

    pub async fn get_enabled_extension(&self, id: &str) -> Option<Arc<EnabledExtension>> {
        self.state.read().await.enabled(id).cloned()
    }

    pub async fn get_enabled_extensions(&self) -> Vec<Arc<EnabledExtension>> {
        self.state.read().await.enabled.clone()
    }

    pub async fn get_installed_extensions(&self) -> Vec<InstalledExtension> {
        let state = self.state.read().await;
        state.known.values().map(|k| state.snapshot(k)).collect()
    }

    pub async fn get_installed_extension(&self, id: &str) -> Result<InstalledExtension> {
        let state = self.state.read().await;
        state
            .known
            .get(id)
            .map(|k| state.snapshot(k))
            .ok_or_else(|| Error::UnknownExtension(id.to_string()))
    }

    /// `id`를 요구하는 확장들
    pub async fn get_dependent_extensions(&self, id: &str) -> Result<Vec<InstalledExtension>> {
        let state = self.state.read().await;
        if !state.known.contains_key(id) {
            return Err(Error::UnknownExtension(id.to_string()));
        }

        Ok(state
            .dependents_of(id)
            .iter()
            .filter_map(|dep| state.known.get(dep))
            .map(|k| state.snapshot(k))
            .collect())
    }

    /// 결합된 미들웨어 체인
    pub async fn middleware(&self) -> Vec<Arc<dyn Middleware>> {
        self.state.read().await.middleware.clone()
    }

    /// 마지막으로 동기화한 세대 값
    pub async fn sync_generation(&self) -> Option<i64> {
        self.state.read().await.last_sync_gen
    }

    // ========================================================================
    // 세대 동기화
    // ========================================================================

    /// 다른 프로세스가 확장 상태를 바꿨는지 확인
    ///
    /// 공유 캐시에 세대 값이 없거나 로컬 값과 다르면 true.
    pub async fn is_expired(&self) -> bool {
        let last = self.state.read().await.last_sync_gen;
        match self.read_sync_gen() {
            Some(gen) => Some(gen) != last,
            None => true,
        }
    }

    /// 공유 캐시의 세대 값 삭제
    pub fn clear_sync_cache(&self) -> Result<()> {
        self.cache.delete(&self.sync_key)
    }

    fn read_sync_gen(&self) -> Option<i64> {
        self.cache.get(&self.sync_key).unwrap_or_else(|e| {
            warn!("Failed to read extension sync generation: {}", e);
            None
        })
    }

    /// 세대 값이 없을 때만 새로 심는다
    ///
    /// 새 값은 현재 시각과 `floor + 1` 중 큰 값이다. 같은 초 안에 다시 심어도
    /// 다른 프로세스가 기억하는 이전 값과 겹치지 않는다.
    fn add_new_sync_gen(&self, floor: Option<i64>) {
        let seed = floor.map_or(Utc::now().timestamp(), |f| {
            Utc::now().timestamp().max(f.saturating_add(1))
        });
        if let Err(e) = self.cache.add(&self.sync_key, seed) {
            warn!("Failed to seed extension sync generation: {}", e);
        }
    }

    fn bump_sync_gen(&self, state: &mut ManagerState) {
        match self.cache.incr(&self.sync_key) {
            Ok(Some(gen)) => state.last_sync_gen = Some(gen),
            Ok(None) => {
                self.add_new_sync_gen(state.last_sync_gen);
                state.last_sync_gen = self.read_sync_gen();
            }
            Err(e) => warn!("Failed to bump extension sync generation: {}", e),
        }
        debug!("Extension sync generation is now {:?}", state.last_sync_gen);
    }

    // ========================================================================
    // 발견 / 로드
    // ========================================================================

    /// 확장 발견 및 동기화
    ///
    /// 반복 호출해도 안전하다. 레코드가 활성 상태인데 인스턴스가 없으면
    /// 초기화하고, 다른 프로세스가 비활성화한 확장은 이 프로세스에서도 내린다.
    /// 확장 하나의 로드/초기화 실패는 로그만 남기고 건너뛴다.
    pub async fn load(&self, full_reload: bool) -> Result<LoadReport> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let mut report = LoadReport::default();

        if full_reload {
            self.clear_extensions(state).await;
            self.template_engine.reset_cache();
        }

        let mut registrations: HashMap<String, RegisteredExtension> = self
            .store
            .all_registrations()?
            .into_iter()
            .map(|r| (r.class_name.clone(), r))
            .collect();

        let mut found = HashSet::new();
        let mut changed = false;

        for entry in self.registry.entries(&self.settings.key).await {
            let id = match entry.extension_id() {
                Ok(id) => id,
                Err(e) => {
                    error!("{}", e);
                    report.failed.push(entry.target.clone());
                    continue;
                }
            };

            if found.contains(&id) {
                warn!("Extension {} is provided more than once; ignoring {}", id, entry.name);
                continue;
            }

            let registration = match registrations.remove(&id) {
                Some(registration) => registration,
                None => match self
                    .store
                    .get_or_create_registration(&id, &entry.dist.project_name)
                {
                    Ok((registration, created)) => {
                        if created {
                            info!("Registered new extension {}", id);
                        }
                        registration
                    }
                    Err(e) => {
                        error!("Error registering extension {}: {}", id, e);
                        report.failed.push(id);
                        continue;
                    }
                },
            };

            if let Some(known) = state.known.get_mut(&id) {
                known.registration = registration;
            } else {
                let class = match entry.load() {
                    Ok(class) => class,
                    Err(e) => {
                        error!("Error loading extension {}: {}", entry.name, e);
                        report.failed.push(id);
                        continue;
                    }
                };

                let info = Arc::new(ExtensionInfo::new(&id, &entry, class.as_ref(), &self.settings));
                debug!("Discovered extension {} ({})", id, info.name);
                state.known.insert(
                    id.clone(),
                    KnownExtension {
                        class,
                        info,
                        registration,
                        resolved_requirements: Vec::new(),
                    },
                );
            }

            found.insert(id.clone());
            report.discovered.push(id.clone());

            let record_enabled = state
                .known
                .get(&id)
                .map_or(false, |k| k.registration.enabled);

            if record_enabled && !state.is_enabled(&id) {
                match self.init_extension(state, &id).await {
                    Ok(_) => {
                        changed = true;
                        report.initialized.push(id);
                    }
                    Err(e) => {
                        error!("Failed to initialize extension {}: {}", id, e);
                        report.failed.push(id);
                    }
                }
            } else if !record_enabled && state.is_enabled(&id) {
                info!("Extension {} was disabled elsewhere; shutting it down", id);
                self.uninit_extension(state, &id).await;
                changed = true;
            }
        }

        // 더 이상 발견되지 않는 확장 제거
        let removed: Vec<String> = state
            .known
            .keys()
            .filter(|id| !found.contains(*id))
            .cloned()
            .collect();

        for id in removed {
            if state.is_enabled(&id) {
                if let Err(e) = self.disable_locked(state, &id).await {
                    warn!("Failed to disable removed extension {}: {}", id, e);
                }
            }
            state.known.remove(&id);
            info!("Extension {} is no longer installed", id);
            report.removed.push(id);
            changed = true;
        }

        self.resolve_requirements(state);

        self.add_new_sync_gen(state.last_sync_gen);
        state.last_sync_gen = self.read_sync_gen();

        if changed {
            state.middleware = state.combined_middleware();
        }

        debug!(
            "Loaded {} extensions ({} enabled)",
            state.known.len(),
            state.enabled.len()
        );
        Ok(report)
    }

    fn resolve_requirements(&self, state: &mut ManagerState) {
        let resolved: Vec<(String, Vec<Arc<ExtensionInfo>>)> = state
            .known
            .iter()
            .map(|(id, known)| {
                let reqs = known
                    .info
                    .requirements
                    .iter()
                    .filter_map(|req| match state.known.get(req) {
                        Some(k) => Some(k.info.clone()),
                        None => {
                            warn!("Extension {} requires unknown extension {}", id, req);
                            None
                        }
                    })
                    .collect();
                (id.clone(), reqs)
            })
            .collect();

        for (id, reqs) in resolved {
            if let Some(known) = state.known.get_mut(&id) {
                known.resolved_requirements = reqs;
            }
        }
    }

    async fn clear_extensions(&self, state: &mut ManagerState) {
        let ids: Vec<String> = state
            .enabled
            .iter()
            .rev()
            .map(|e| e.id().to_string())
            .collect();

        for id in ids {
            self.uninit_extension(state, &id).await;
        }

        state.known.clear();
        state.middleware.clear();
    }

    // ========================================================================
    // 활성화
    // ========================================================================

    /// 확장 활성화 (요구 확장 먼저)
    ///
    /// 이미 활성 상태면 기존 인스턴스를 돌려준다.
    pub async fn enable_extension(&self, id: &str) -> Result<Arc<EnabledExtension>> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        if let Some(existing) = state.enabled(id) {
            return Ok(existing.clone());
        }

        let order = enable_order(id, |ext_id| {
            state
                .known
                .get(ext_id)
                .map(|k| k.info.requirements.clone())
        })?;

        let mut instance = None;
        for ext_id in &order {
            instance = Some(self.enable_one(state, ext_id).await?);
        }

        instance.ok_or_else(|| Error::UnknownExtension(id.to_string()))
    }

    /// 설치 → 인스턴스 생성 → 레코드 저장. 실패하면 모두 되돌린다
    async fn enable_one(&self, state: &mut ManagerState, id: &str) -> Result<Arc<EnabledExtension>> {
        if let Some(existing) = state.enabled(id) {
            return Ok(existing.clone());
        }

        let info = state
            .known
            .get(id)
            .map(|k| k.info.clone())
            .ok_or_else(|| Error::UnknownExtension(id.to_string()))?;

        info!("Enabling extension {}", id);

        if let Err(e) = self.install_extension_data(state, id).await {
            error!("Failed to install extension {}: {}", id, e);
            self.assets.uninstall(&info).await;
            return Err(Error::enabling_failed(id, e));
        }

        let instance = match self.init_extension(state, id).await {
            Ok(instance) => instance,
            Err(e) => {
                self.assets.uninstall(&info).await;
                return Err(e);
            }
        };

        if let Err(e) = self.update_registration(state, id, |r| r.enabled = true) {
            error!("Failed to save registration for {}: {}", id, e);
            self.uninit_extension(state, id).await;
            self.assets.uninstall(&info).await;
            return Err(Error::enabling_failed(id, e));
        }

        self.template_engine.reset_cache();
        self.bump_sync_gen(state);
        state.middleware = state.combined_middleware();
        self.event_bus.emit(EventType::Enabled, id);

        info!("Enabled extension {}", id);
        Ok(instance)
    }

    /// 정적 파일 설치, 스키마 동기화/마이그레이션, installed 플래그 저장
    async fn install_extension_data(&self, state: &mut ManagerState, id: &str) -> Result<()> {
        let info = state
            .known
            .get(id)
            .map(|k| k.info.clone())
            .ok_or_else(|| Error::UnknownExtension(id.to_string()))?;

        self.assets.install(&info, self.settings.debug).await?;

        let apps = info.effective_apps();
        self.apps.add(&apps);
        let synced = self.sync_schema(&apps).await;
        self.apps.remove(&apps);
        synced?;

        self.update_registration(state, id, |r| r.installed = true)?;
        self.event_bus.emit(EventType::Installed, id);
        Ok(())
    }

    async fn sync_schema(&self, apps: &[String]) -> Result<()> {
        debug!("Synchronizing schema for apps {:?}", apps);
        self.schema_tools
            .create_tables(apps)
            .await
            .map_err(into_install_failed)?;
        self.schema_tools
            .apply_migrations(apps)
            .await
            .map_err(into_install_failed)
    }

    /// 인스턴스 생성, 관리 URL 연결, 앱 등록
    async fn init_extension(&self, state: &mut ManagerState, id: &str) -> Result<Arc<EnabledExtension>> {
        if let Some(existing) = state.enabled(id) {
            return Ok(existing.clone());
        }

        let known = state
            .known
            .get(id)
            .ok_or_else(|| Error::UnknownExtension(id.to_string()))?;
        let class = known.class.clone();
        let info = known.info.clone();

        let ctx = ExtensionContext::new(
            info.clone(),
            self.hooks.clone(),
            self.urls.clone(),
            self.store.clone(),
            known.registration.settings.clone(),
        );

        if let Err(e) = class.initialize(&ctx).await {
            error!("Unable to initialize extension {}: {}", id, e);
            if let Err(hook_err) = ctx.shutdown_hooks() {
                warn!("Failed to remove hooks for {}: {}", id, hook_err);
            }
            return Err(Error::enabling_failed(id, e));
        }

        let (admin_site, admin_urls) = match self.install_admin(class.as_ref(), &info) {
            Ok(admin) => admin,
            Err(e) => {
                error!("Unable to set up admin for extension {}: {}", id, e);
                if let Err(hook_err) = ctx.shutdown_hooks() {
                    warn!("Failed to remove hooks for {}: {}", id, hook_err);
                }
                return Err(Error::enabling_failed(id, e));
            }
        };

        let middleware = class.middleware();
        self.apps.add(&info.effective_apps());

        let instance = Arc::new(EnabledExtension::new(
            class, ctx, middleware, admin_site, admin_urls,
        ));
        state.enabled.push(instance.clone());

        self.template_engine.reset_cache();
        self.event_bus.emit(EventType::Initialized, id);
        debug!("Initialized extension {}", id);

        Ok(instance)
    }

    /// 관리 사이트 생성 및 관리/설정 URL 추가
    fn install_admin(
        &self,
        class: &dyn ExtensionClass,
        info: &ExtensionInfo,
    ) -> Result<(Option<AdminSite>, Vec<UrlPattern>)> {
        let prefix = self.settings.admin_url_prefix();
        let mut patterns = Vec::new();

        let admin_site = if info.has_admin_site {
            let mut site = AdminSite::new(&info.app_name);
            class.register_admin(&mut site)?;

            let base = join_route(&prefix, &format!("{}/db/", info.id));
            patterns.extend(site.urls().iter().map(|p| p.prefixed(&base)));
            Some(site)
        } else {
            None
        };

        if info.is_configurable {
            let base = join_route(&prefix, &format!("{}/config/", info.id));
            patterns.extend(class.admin_urlpatterns().iter().map(|p| p.prefixed(&base)));
        }

        if !patterns.is_empty() {
            self.urls.add_patterns(&patterns)?;
        }

        Ok((admin_site, patterns))
    }

    // ========================================================================
    // 비활성화
    // ========================================================================

    /// 확장 비활성화 (의존하는 확장 먼저)
    ///
    /// 활성 상태가 아니면 아무것도 하지 않는다.
    pub async fn disable_extension(&self, id: &str) -> Result<()> {
        let mut guard = self.state.write().await;
        self.disable_locked(&mut guard, id).await
    }

    async fn disable_locked(&self, state: &mut ManagerState, id: &str) -> Result<()> {
        if !state.known.contains_key(id) {
            return Err(Error::UnknownExtension(id.to_string()));
        }

        if !state.is_enabled(id) {
            debug!("Extension {} is not enabled", id);
            return Ok(());
        }

        let order = disable_order(id, |ext_id| state.dependents_of(ext_id));
        for ext_id in &order {
            if state.is_enabled(ext_id) {
                self.disable_one(state, ext_id).await?;
            }
        }

        Ok(())
    }

    async fn disable_one(&self, state: &mut ManagerState, id: &str) -> Result<()> {
        let info = state
            .known
            .get(id)
            .map(|k| k.info.clone())
            .ok_or_else(|| Error::UnknownExtension(id.to_string()))?;

        info!("Disabling extension {}", id);

        self.assets.uninstall(&info).await;
        self.uninit_extension(state, id).await;
        self.update_registration(state, id, |r| r.enabled = false)?;

        self.template_engine.reset_cache();
        self.bump_sync_gen(state);
        state.middleware = state.combined_middleware();
        self.event_bus.emit(EventType::Disabled, id);

        info!("Disabled extension {}", id);
        Ok(())
    }

    /// 인스턴스 제거: 훅, 관리 URL, 앱 등록 해제
    async fn uninit_extension(&self, state: &mut ManagerState, id: &str) {
        let Some(pos) = state.enabled.iter().position(|e| e.id() == id) else {
            return;
        };
        let instance = state.enabled.remove(pos);

        if let Err(e) = instance.class().shutdown(instance.context()).await {
            warn!("Extension {} failed to shut down cleanly: {}", id, e);
        }
        if let Err(e) = instance.context().shutdown_hooks() {
            warn!("Failed to remove hooks for {}: {}", id, e);
        }

        if !instance.admin_urls().is_empty() {
            self.urls.remove_patterns(instance.admin_urls());
        }
        self.apps.remove(&instance.info().effective_apps());

        self.template_engine.reset_cache();
        self.event_bus.emit(EventType::Uninitialized, id);
        debug!("Uninitialized extension {}", id);
    }

    // ========================================================================
    // 패키지 설치
    // ========================================================================

    /// 새 확장 패키지 설치 후 전체 재로드
    pub async fn install_extension(&self, source: &str, package_name: &str) -> Result<LoadReport> {
        let installer = self
            .package_installer
            .as_ref()
            .ok_or_else(|| Error::InstallFailed("No package installer is configured.".into()))?;

        if let Err(e) = installer.install(source).await {
            error!("Failed to install extension package from {}: {}", source, e);
            return Err(Error::InstallFailed(
                "Installation failed (probably malformed URL).".into(),
            ));
        }

        self.registry.refresh().await?;
        if self.registry.find_distribution(package_name).await.is_none() {
            return Err(Error::InstallFailed("Invalid package name.".into()));
        }

        let report = self.load(true).await?;

        let mut guard = self.state.write().await;
        self.bump_sync_gen(&mut guard);
        Ok(report)
    }

    // ========================================================================
    // Registration Record
    // ========================================================================

    /// 저장소의 최신 레코드에 변경을 적용해 저장
    fn update_registration<F>(&self, state: &mut ManagerState, id: &str, update: F) -> Result<()>
    where
        F: FnOnce(&mut RegisteredExtension),
    {
        let known = state
            .known
            .get_mut(id)
            .ok_or_else(|| Error::UnknownExtension(id.to_string()))?;

        let mut record = self
            .store
            .find_registration(id)?
            .unwrap_or_else(|| known.registration.clone());
        update(&mut record);

        self.store.save_registration(&record)?;
        known.registration = record;
        Ok(())
    }
}

fn into_install_failed(e: Error) -> Error {
    match e {
        Error::InstallFailed(_) => e,
        other => Error::InstallFailed(other.to_string()),
    }
}
