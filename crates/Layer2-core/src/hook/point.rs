//! HookPoint - 훅 종류별 등록 목록

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;
use trellis_foundation::{Error, Result};

// ============================================================================
// ExtensionHook - 모든 훅이 구현하는 트레이트
// ============================================================================

/// 확장이 등록하는 훅
pub trait ExtensionHook: Send + Sync + 'static {
    /// 훅을 등록한 확장 ID
    fn extension_id(&self) -> &str;

    /// 훅 포인트에서 제거된 직후 호출
    ///
    /// 훅이 등록 시 호스트에 걸어 둔 것(URL 패턴 등)을 여기서 되돌린다.
    fn on_shutdown(&self) {}
}

// ============================================================================
// HookSet - 훅 포인트 공통 인터페이스
// ============================================================================

/// 훅을 담는 컬렉션
pub trait HookSet<H: ?Sized>: Send + Sync {
    /// 훅 종류 이름 (에러 메시지용)
    fn kind(&self) -> &str;

    fn add_hook(&self, hook: Arc<H>);

    /// 제거. 등록되어 있지 않으면 `Error::HookNotRegistered`
    fn remove_hook(&self, hook: &Arc<H>) -> Result<()>;

    fn contains(&self, hook: &Arc<H>) -> bool;
}

// ============================================================================
// HookPoint
// ============================================================================

/// 한 종류의 훅이 등록되는 지점
///
/// 같은 훅 인스턴스는 포인터 동일성으로 구분한다. 조회는 등록 순서를 따른다.
pub struct HookPoint<H> {
    kind: String,
    hooks: RwLock<Vec<Arc<H>>>,
}

impl<H: ExtensionHook> HookPoint<H> {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            hooks: RwLock::new(Vec::new()),
        }
    }

    pub fn register(&self, hook: Arc<H>) {
        debug!(
            "Registering {} hook for {}",
            self.kind,
            hook.extension_id()
        );
        self.hooks.write().push(hook);
    }

    pub fn unregister(&self, hook: &Arc<H>) -> Result<()> {
        let mut hooks = self.hooks.write();
        let pos = hooks
            .iter()
            .position(|h| Arc::ptr_eq(h, hook))
            .ok_or_else(|| Error::HookNotRegistered(self.kind.clone()))?;
        hooks.remove(pos);
        Ok(())
    }

    /// 현재 등록된 훅 스냅샷
    pub fn hooks(&self) -> Vec<Arc<H>> {
        self.hooks.read().clone()
    }

    /// 특정 확장이 등록한 훅
    pub fn hooks_for(&self, extension_id: &str) -> Vec<Arc<H>> {
        self.hooks
            .read()
            .iter()
            .filter(|h| h.extension_id() == extension_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.hooks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.read().is_empty()
    }
}

impl<H: ExtensionHook> HookSet<H> for HookPoint<H> {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn add_hook(&self, hook: Arc<H>) {
        self.register(hook);
    }

    fn remove_hook(&self, hook: &Arc<H>) -> Result<()> {
        self.unregister(hook)
    }

    fn contains(&self, hook: &Arc<H>) -> bool {
        self.hooks.read().iter().any(|h| Arc::ptr_eq(h, hook))
    }
}

// ============================================================================
// ActiveHook - 확장 인스턴스가 추적하는 등록 핸들
// ============================================================================

/// 타입이 지워진 훅 등록
pub trait ActiveHook: Send + Sync {
    fn kind(&self) -> &str;

    fn extension_id(&self) -> &str;

    /// 아직 훅 포인트에 등록되어 있는지
    fn is_registered(&self) -> bool;

    /// 훅 포인트에서 제거
    fn shutdown(&self) -> Result<()>;
}

pub(crate) struct HookRegistration<H: ExtensionHook> {
    set: Arc<dyn HookSet<H>>,
    hook: Arc<H>,
}

impl<H: ExtensionHook> HookRegistration<H> {
    pub(crate) fn new(set: Arc<dyn HookSet<H>>, hook: Arc<H>) -> Self {
        Self { set, hook }
    }
}

impl<H: ExtensionHook> ActiveHook for HookRegistration<H> {
    fn kind(&self) -> &str {
        self.set.kind()
    }

    fn extension_id(&self) -> &str {
        self.hook.extension_id()
    }

    fn is_registered(&self) -> bool {
        self.set.contains(&self.hook)
    }

    fn shutdown(&self) -> Result<()> {
        self.set.remove_hook(&self.hook)?;
        self.hook.on_shutdown();
        Ok(())
    }
}

// ============================================================================
// HookHandle - 확장 코드가 받는 핸들
// ============================================================================

/// 등록된 훅과 그 등록 핸들
pub struct HookHandle<H> {
    hook: Arc<H>,
    registration: Arc<dyn ActiveHook>,
}

impl<H> HookHandle<H> {
    pub(crate) fn new(hook: Arc<H>, registration: Arc<dyn ActiveHook>) -> Self {
        Self { hook, registration }
    }

    pub fn hook(&self) -> &Arc<H> {
        &self.hook
    }

    pub fn is_registered(&self) -> bool {
        self.registration.is_registered()
    }

    /// 훅 제거. 이미 제거된 훅이면 `Error::HookNotRegistered`
    pub fn shutdown(&self) -> Result<()> {
        self.registration.shutdown()
    }
}

impl<H> Clone for HookHandle<H> {
    fn clone(&self) -> Self {
        Self {
            hook: self.hook.clone(),
            registration: self.registration.clone(),
        }
    }
}

impl<H> std::ops::Deref for HookHandle<H> {
    type Target = H;

    fn deref(&self) -> &H {
        &self.hook
    }
}
