//! UrlHook - 확장 라우트를 동적 URL 테이블에 추가하는 훅

use super::point::{ExtensionHook, HookHandle};
use crate::extension::ExtensionContext;
use crate::urls::{DynamicUrlTable, UrlPattern};
use std::sync::Arc;
use trellis_foundation::Result;

/// URL 패턴 훅
///
/// 등록 시 패턴을 테이블에 추가하고, shutdown 시 같은 패턴을 제거한다.
pub struct UrlHook {
    extension_id: String,
    patterns: Vec<UrlPattern>,
    urls: Arc<DynamicUrlTable>,
}

impl UrlHook {
    /// 패턴을 추가하고 훅을 등록
    pub fn register(ctx: &ExtensionContext, patterns: Vec<UrlPattern>) -> Result<HookHandle<UrlHook>> {
        ctx.urls().add_patterns(&patterns)?;

        let hook = UrlHook {
            extension_id: ctx.id().to_string(),
            patterns,
            urls: ctx.urls().clone(),
        };
        Ok(ctx.register_hook(ctx.hooks().url_hooks(), hook))
    }

    pub fn patterns(&self) -> &[UrlPattern] {
        &self.patterns
    }
}

impl ExtensionHook for UrlHook {
    fn extension_id(&self) -> &str {
        &self.extension_id
    }

    fn on_shutdown(&self) {
        self.urls.remove_patterns(&self.patterns);
    }
}
