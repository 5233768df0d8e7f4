//! Extension traits - 확장 클래스와 미들웨어 인터페이스

use super::admin::AdminSite;
use super::context::ExtensionContext;
use super::info::ExtensionMetadata;
use crate::request::RequestContext;
use crate::urls::UrlPattern;
use async_trait::async_trait;
use std::sync::Arc;
use trellis_foundation::Result;

// ============================================================================
// Middleware - 요청 처리 단위
// ============================================================================

/// 확장이 기여하는 요청 미들웨어
pub trait Middleware: Send + Sync {
    /// 미들웨어 이름
    fn name(&self) -> &str;

    /// 요청 처리 (핸들러 실행 전)
    fn process_request(&self, _request: &mut RequestContext) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// ExtensionClass - 확장 클래스
// ============================================================================

/// 확장 클래스
///
/// 클래스 수준 선언(메타데이터, 요구 사항, 앱, 미들웨어, 관리 기능)과
/// 활성화 시 실행되는 초기화 코드를 제공한다. 클래스 객체는 프로세스 안에서
/// 공유되고, 활성화마다 새 `ExtensionContext`가 만들어진다.
///
/// ```ignore
/// struct ReviewBot;
///
/// #[async_trait]
/// impl ExtensionClass for ReviewBot {
///     fn metadata(&self) -> ExtensionMetadata {
///         ExtensionMetadata::named("Review Bot")
///     }
///
///     fn requirements(&self) -> Vec<String> {
///         vec!["rb_base.extension.Base".into()]
///     }
///
///     async fn initialize(&self, ctx: &ExtensionContext) -> Result<()> {
///         UrlHook::register(ctx, vec![UrlPattern::new("/reviewbot/", "reviewbot.index")])?;
///         TemplateHook::register(ctx, "base-scripts", "reviewbot/scripts.html", vec![]);
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait ExtensionClass: Send + Sync {
    /// 메타데이터
    fn metadata(&self) -> ExtensionMetadata {
        ExtensionMetadata::default()
    }

    /// 필요한 확장 ID 목록
    fn requirements(&self) -> Vec<String> {
        Vec::new()
    }

    /// 앱 목록 (비어 있으면 모듈 경로에서 유도한 앱 하나)
    fn apps(&self) -> Vec<String> {
        Vec::new()
    }

    /// 미들웨어 인스턴스 (활성화마다 호출)
    fn middleware(&self) -> Vec<Arc<dyn Middleware>> {
        Vec::new()
    }

    /// 미들웨어 이름 (정보 표시용)
    fn middleware_names(&self) -> Vec<String> {
        self.middleware()
            .iter()
            .map(|m| m.name().to_string())
            .collect()
    }

    /// 설정 화면 제공 여부
    fn is_configurable(&self) -> bool {
        false
    }

    /// 전용 관리 사이트 제공 여부
    fn has_admin_site(&self) -> bool {
        false
    }

    /// 설정 화면 URL (`<adminPrefix><id>/config/` 아래에 마운트)
    fn admin_urlpatterns(&self) -> Vec<UrlPattern> {
        Vec::new()
    }

    /// 관리 사이트에 모델 등록. 활성화될 때마다 호출된다
    fn register_admin(&self, _site: &mut AdminSite) -> Result<()> {
        Ok(())
    }

    /// 활성화 시 초기화 (훅 등록 등)
    async fn initialize(&self, ctx: &ExtensionContext) -> Result<()>;

    /// 비활성화 직전 호출. 등록한 훅은 이후 자동으로 제거된다
    async fn shutdown(&self, _ctx: &ExtensionContext) -> Result<()> {
        Ok(())
    }
}
