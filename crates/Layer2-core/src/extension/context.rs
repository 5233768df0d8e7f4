//! ExtensionContext - 활성화된 확장이 호스트와 상호작용하는 인터페이스

use super::info::ExtensionInfo;
use crate::hook::{ActiveHook, ExtensionHook, HookHandle, HookRegistration, HookRegistry, HookSet};
use crate::urls::DynamicUrlTable;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};
use trellis_foundation::{Error, RegistrationStore, Result};

/// 확장 컨텍스트
///
/// 활성화될 때마다 새로 만들어지며, 이 컨텍스트로 등록된 훅은 확장이
/// 비활성화될 때 모두 제거된다.
pub struct ExtensionContext {
    info: Arc<ExtensionInfo>,

    /// 기본 훅 지점
    hooks: Arc<HookRegistry>,

    /// 동적 URL 테이블
    urls: Arc<DynamicUrlTable>,

    /// Registration Record 저장소 (설정 저장용)
    store: Arc<dyn RegistrationStore>,

    /// 이 확장이 등록한 훅
    active: Mutex<Vec<Arc<dyn ActiveHook>>>,

    /// 확장 설정 캐시
    settings: Mutex<Value>,
}

impl ExtensionContext {
    pub(crate) fn new(
        info: Arc<ExtensionInfo>,
        hooks: Arc<HookRegistry>,
        urls: Arc<DynamicUrlTable>,
        store: Arc<dyn RegistrationStore>,
        settings: Value,
    ) -> Self {
        Self {
            info,
            hooks,
            urls,
            store,
            active: Mutex::new(Vec::new()),
            settings: Mutex::new(settings),
        }
    }

    pub fn id(&self) -> &str {
        &self.info.id
    }

    pub fn info(&self) -> &Arc<ExtensionInfo> {
        &self.info
    }

    pub fn hooks(&self) -> &Arc<HookRegistry> {
        &self.hooks
    }

    pub fn urls(&self) -> &Arc<DynamicUrlTable> {
        &self.urls
    }

    // ========================================================================
    // 훅 등록
    // ========================================================================

    /// 훅을 훅 지점에 등록하고 이 확장의 훅으로 추적
    pub fn register_hook<H, P>(&self, point: &Arc<P>, hook: H) -> HookHandle<H>
    where
        H: ExtensionHook,
        P: HookSet<H> + 'static,
    {
        let hook = Arc::new(hook);
        let set: Arc<dyn HookSet<H>> = point.clone();
        set.add_hook(hook.clone());

        let registration: Arc<dyn ActiveHook> =
            Arc::new(HookRegistration::new(set, hook.clone()));
        self.active.lock().push(registration.clone());

        HookHandle::new(hook, registration)
    }

    /// 아직 등록되어 있는 훅
    pub fn active_hooks(&self) -> Vec<Arc<dyn ActiveHook>> {
        self.active
            .lock()
            .iter()
            .filter(|h| h.is_registered())
            .cloned()
            .collect()
    }

    /// 등록된 훅 모두 제거
    ///
    /// 확장 코드가 직접 shutdown한 훅은 건너뛴다. 실패가 있으면 나머지를
    /// 모두 처리한 뒤 첫 번째 에러를 반환한다.
    pub(crate) fn shutdown_hooks(&self) -> Result<()> {
        let hooks: Vec<_> = self.active.lock().drain(..).collect();
        let mut first_error = None;

        for hook in hooks.into_iter().rev() {
            if !hook.is_registered() {
                continue;
            }

            debug!("Shutting down {} hook for {}", hook.kind(), self.id());
            if let Err(e) = hook.shutdown() {
                warn!("Failed to shut down {} hook for {}: {}", hook.kind(), self.id(), e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    // ========================================================================
    // 설정
    // ========================================================================

    /// 확장 설정 전체
    pub fn settings(&self) -> Value {
        self.settings.lock().clone()
    }

    /// 설정 값 하나
    pub fn setting(&self, key: &str) -> Option<Value> {
        self.settings.lock().get(key).cloned()
    }

    /// 설정 저장 (Registration Record에 기록)
    pub fn save_settings(&self, settings: Value) -> Result<()> {
        if !settings.is_object() {
            return Err(Error::InvalidInput(
                "Extension settings must be a JSON object".into(),
            ));
        }

        let mut record = self
            .store
            .find_registration(self.id())?
            .ok_or_else(|| Error::NotFound(format!("registration for {}", self.id())))?;
        record.settings = settings.clone();
        self.store.save_registration(&record)?;

        *self.settings.lock() = settings;
        Ok(())
    }
}

impl std::fmt::Debug for ExtensionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionContext")
            .field("id", &self.info.id)
            .field("hooks", &self.active.lock().len())
            .finish()
    }
}
