//! 템플릿 엔진 인터페이스
//!
//! 렌더링 자체는 호스트가 제공한다. 매니저는 확장 상태가 바뀔 때마다
//! `reset_cache()`를 호출해 확장이 제공하던 템플릿 캐시를 비운다.

use serde_json::{Map, Value};
use trellis_foundation::Result;

/// 템플릿 렌더링 컨텍스트
pub type TemplateContext = Map<String, Value>;

/// 호스트 템플릿 엔진
pub trait TemplateEngine: Send + Sync {
    /// 템플릿 렌더링
    fn render(&self, template_name: &str, context: &TemplateContext) -> Result<String>;

    /// 템플릿 로더/태그 캐시 초기화
    fn reset_cache(&self) {}
}

/// 아무것도 렌더링하지 않는 엔진 (CLI 등 화면이 없는 호스트용)
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTemplateEngine;

impl TemplateEngine for NullTemplateEngine {
    fn render(&self, _template_name: &str, _context: &TemplateContext) -> Result<String> {
        Ok(String::new())
    }
}
