//! TemplateHook - 이름 붙은 템플릿 지점에 UI 조각을 끼워 넣는 훅

use super::point::{ExtensionHook, HookHandle, HookPoint, HookSet};
use crate::extension::ExtensionContext;
use crate::request::RequestContext;
use crate::template::{TemplateContext, TemplateEngine};
use crate::urls::UrlResolver;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::error;
use trellis_foundation::{Error, Result};

// ============================================================================
// TemplateHook
// ============================================================================

/// 템플릿 훅
pub struct TemplateHook {
    extension_id: String,

    /// 훅 지점 이름
    name: String,

    /// 렌더링할 템플릿
    template_name: String,

    /// 적용할 라우트 이름 목록 (비어 있으면 모든 페이지)
    apply_to: Vec<String>,
}

impl TemplateHook {
    pub fn new(
        extension_id: impl Into<String>,
        name: impl Into<String>,
        template_name: impl Into<String>,
        apply_to: Vec<String>,
    ) -> Self {
        Self {
            extension_id: extension_id.into(),
            name: name.into(),
            template_name: template_name.into(),
            apply_to,
        }
    }

    /// 훅을 만들어 확장의 템플릿 훅 지점에 등록
    pub fn register(
        ctx: &ExtensionContext,
        name: impl Into<String>,
        template_name: impl Into<String>,
        apply_to: Vec<String>,
    ) -> HookHandle<TemplateHook> {
        let hook = TemplateHook::new(ctx.id(), name, template_name, apply_to);
        ctx.register_hook(ctx.hooks().template_hooks(), hook)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn template_name(&self) -> &str {
        &self.template_name
    }

    pub fn apply_to(&self) -> &[String] {
        &self.apply_to
    }

    /// 현재 요청에 이 훅을 적용할지
    ///
    /// 라우트 이름은 요청의 캡처 파라미터로 먼저 역조회하고, 실패하면
    /// 파라미터 없이 다시 시도한다.
    pub fn applies_to(&self, request: &RequestContext, resolver: &dyn UrlResolver) -> bool {
        if self.apply_to.is_empty() {
            return true;
        }

        let no_kwargs = HashMap::new();
        self.apply_to.iter().any(|route_name| {
            resolver
                .reverse(route_name, &request.url_kwargs)
                .or_else(|_| resolver.reverse(route_name, &no_kwargs))
                .map(|path| path == request.path_info)
                .unwrap_or(false)
        })
    }

    /// 템플릿 렌더링. 컨텍스트에 `extension` 키로 확장 ID를 넣는다
    pub fn render_to_string(
        &self,
        engine: &dyn TemplateEngine,
        context: &TemplateContext,
    ) -> Result<String> {
        let mut context = context.clone();
        context.insert(
            "extension".to_string(),
            Value::String(self.extension_id.clone()),
        );
        engine.render(&self.template_name, &context)
    }
}

impl ExtensionHook for TemplateHook {
    fn extension_id(&self) -> &str {
        &self.extension_id
    }
}

// ============================================================================
// TemplateHookPoint - 이름별 인덱스를 가진 훅 지점
// ============================================================================

/// 템플릿 훅 지점
///
/// 전체 등록 목록과 이름별 버킷을 함께 관리한다.
pub struct TemplateHookPoint {
    point: HookPoint<TemplateHook>,
    by_name: RwLock<HashMap<String, Vec<Arc<TemplateHook>>>>,
}

impl TemplateHookPoint {
    pub fn new() -> Self {
        Self {
            point: HookPoint::new("template"),
            by_name: RwLock::new(HashMap::new()),
        }
    }

    /// 이름 버킷에 추가 (버킷이 없으면 생성)
    pub fn register_named(&self, name: &str, hook: Arc<TemplateHook>) {
        self.by_name
            .write()
            .entry(name.to_string())
            .or_default()
            .push(hook);
    }

    /// 이름 버킷에서 제거
    pub fn unregister_named(&self, name: &str, hook: &Arc<TemplateHook>) -> Result<()> {
        let mut by_name = self.by_name.write();
        let bucket = by_name
            .get_mut(name)
            .ok_or_else(|| Error::HookNotRegistered(format!("template '{}'", name)))?;
        let pos = bucket
            .iter()
            .position(|h| Arc::ptr_eq(h, hook))
            .ok_or_else(|| Error::HookNotRegistered(format!("template '{}'", name)))?;

        bucket.remove(pos);
        if bucket.is_empty() {
            by_name.remove(name);
        }
        Ok(())
    }

    /// 이름으로 조회 (등록 순서). 없는 이름이면 빈 목록
    pub fn lookup(&self, name: &str) -> Vec<Arc<TemplateHook>> {
        self.by_name.read().get(name).cloned().unwrap_or_default()
    }

    /// 등록된 모든 템플릿 훅
    pub fn hooks(&self) -> Vec<Arc<TemplateHook>> {
        self.point.hooks()
    }

    /// 이름 지점의 훅 중 현재 요청에 적용되는 것을 모두 렌더링해 이어 붙인다
    ///
    /// 렌더링에 실패한 훅은 로그만 남기고 건너뛴다.
    pub fn render(
        &self,
        name: &str,
        request: &RequestContext,
        context: &TemplateContext,
        resolver: &dyn UrlResolver,
        engine: &dyn TemplateEngine,
    ) -> String {
        let mut output = String::new();

        for hook in self.lookup(name) {
            if !hook.applies_to(request, resolver) {
                continue;
            }

            match hook.render_to_string(engine, context) {
                Ok(fragment) => output.push_str(&fragment),
                Err(e) => error!(
                    "Error rendering template hook '{}' from {}: {}",
                    name, hook.extension_id, e
                ),
            }
        }

        output
    }
}

impl Default for TemplateHookPoint {
    fn default() -> Self {
        Self::new()
    }
}

impl HookSet<TemplateHook> for TemplateHookPoint {
    fn kind(&self) -> &str {
        "template"
    }

    fn add_hook(&self, hook: Arc<TemplateHook>) {
        self.register_named(&hook.name, hook.clone());
        self.point.register(hook);
    }

    fn remove_hook(&self, hook: &Arc<TemplateHook>) -> Result<()> {
        self.unregister_named(&hook.name, hook)?;
        self.point.unregister(hook)
    }

    fn contains(&self, hook: &Arc<TemplateHook>) -> bool {
        self.point.contains(hook)
    }
}
