//! EnabledExtension - 현재 프로세스에서 활성화된 확장 인스턴스

use super::admin::AdminSite;
use super::context::ExtensionContext;
use super::info::ExtensionInfo;
use super::traits::{ExtensionClass, Middleware};
use crate::hook::ActiveHook;
use crate::urls::UrlPattern;
use std::sync::Arc;

/// 활성화된 확장
///
/// ID당 최대 하나만 존재하며, 존재하는 동안 해당 확장은 이 프로세스에서
/// 활성 상태이다.
pub struct EnabledExtension {
    class: Arc<dyn ExtensionClass>,
    context: ExtensionContext,
    middleware: Vec<Arc<dyn Middleware>>,
    admin_site: Option<AdminSite>,

    /// 이 인스턴스가 URL 테이블에 추가한 관리 라우트
    admin_urls: Vec<UrlPattern>,
}

impl EnabledExtension {
    pub(crate) fn new(
        class: Arc<dyn ExtensionClass>,
        context: ExtensionContext,
        middleware: Vec<Arc<dyn Middleware>>,
        admin_site: Option<AdminSite>,
        admin_urls: Vec<UrlPattern>,
    ) -> Self {
        Self {
            class,
            context,
            middleware,
            admin_site,
            admin_urls,
        }
    }

    pub fn id(&self) -> &str {
        self.context.id()
    }

    pub fn info(&self) -> &Arc<ExtensionInfo> {
        self.context.info()
    }

    pub fn class(&self) -> &Arc<dyn ExtensionClass> {
        &self.class
    }

    pub fn context(&self) -> &ExtensionContext {
        &self.context
    }

    /// 현재 등록된 훅
    pub fn hooks(&self) -> Vec<Arc<dyn ActiveHook>> {
        self.context.active_hooks()
    }

    pub fn middleware(&self) -> &[Arc<dyn Middleware>] {
        &self.middleware
    }

    pub fn admin_site(&self) -> Option<&AdminSite> {
        self.admin_site.as_ref()
    }

    pub fn admin_urls(&self) -> &[UrlPattern] {
        &self.admin_urls
    }
}

impl std::fmt::Debug for EnabledExtension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnabledExtension")
            .field("id", &self.id())
            .field("middleware", &self.middleware.len())
            .field("admin_site", &self.admin_site)
            .finish()
    }
}
