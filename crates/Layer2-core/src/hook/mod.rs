//! # Hook System
//!
//! 확장이 호스트에 기여하는 지점(훅)을 종류별로 관리한다.
//!
//! ## 구성
//!
//! - `HookPoint<H>`: 한 종류의 훅 목록 (등록 순서 유지)
//! - `TemplateHookPoint`: 이름별 버킷을 가진 템플릿 훅 지점
//! - `UrlHook`: 동적 URL 테이블에 라우트를 추가하는 훅
//! - `HookRegistry`: 매니저가 소유하는 기본 훅 지점 묶음
//!
//! 훅은 `ExtensionContext::register_hook`으로 등록되고, 확장 인스턴스가
//! 종료될 때 함께 제거된다. 호스트가 자체 훅 종류를 만들 때는
//! `HookPoint<MyHook>`을 `Arc`로 만들어 확장 클래스에 넘기면 된다.
//!
//! ```ignore
//! struct NavigationHook { extension_id: String, label: String }
//!
//! impl ExtensionHook for NavigationHook {
//!     fn extension_id(&self) -> &str { &self.extension_id }
//! }
//!
//! let nav = Arc::new(HookPoint::<NavigationHook>::new("navigation"));
//! let handle = ctx.register_hook(&nav, NavigationHook { .. });
//! handle.shutdown()?;
//! ```

mod point;
mod template;
mod url;

pub use point::{ActiveHook, ExtensionHook, HookHandle, HookPoint, HookSet};
pub(crate) use point::HookRegistration;
pub use template::{TemplateHook, TemplateHookPoint};
pub use url::UrlHook;

use std::sync::Arc;

/// 기본 훅 지점 묶음
pub struct HookRegistry {
    url_hooks: Arc<HookPoint<UrlHook>>,
    template_hooks: Arc<TemplateHookPoint>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self {
            url_hooks: Arc::new(HookPoint::new("url")),
            template_hooks: Arc::new(TemplateHookPoint::new()),
        }
    }

    pub fn url_hooks(&self) -> &Arc<HookPoint<UrlHook>> {
        &self.url_hooks
    }

    pub fn template_hooks(&self) -> &Arc<TemplateHookPoint> {
        &self.template_hooks
    }
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::new()
    }
}
