//! trellis-core: Extension runtime for Trellis
//!
//! Layer2 - 확장 라이프사이클과 훅 시스템
//!
//! # 주요 모듈
//!
//! - `hook`: 훅 지점 (URL 훅, 이름별 템플릿 훅, 호스트 정의 훅)
//! - `urls`: 동적 URL 테이블 (`{param}` 라우트, 역방향 조회)
//! - `extension`: 확장 발견, 활성화/비활성화, 설치, 세대 동기화
//! - `middleware`: 요청마다 확장 상태를 갱신하는 미들웨어
//! - `template`: 호스트 템플릿 엔진 인터페이스
//!
//! # 사용 예시
//!
//! ```ignore
//! use trellis_core::{ExtensionManager, ExtensionsMiddleware, ManagerSettings, RequestContext};
//!
//! let manager = Arc::new(
//!     ExtensionManager::builder(ManagerSettings::from_config(&config))
//!         .package_registry(registry)
//!         .store(store)
//!         .cache(cache)
//!         .build()?,
//! );
//! manager.load(false).await?;
//!
//! // 호스트는 라우트 테이블을 한 번 마운트한다
//! let routes = manager.get_url_patterns();
//!
//! // 요청마다
//! let middleware = ExtensionsMiddleware::new(manager.clone());
//! let mut request = RequestContext::new("/dashboard/");
//! middleware.process_request(&mut request).await?;
//!
//! // 템플릿 훅 렌더링
//! let html = manager.hooks().template_hooks().render(
//!     "base-scripts", &request, &context, routes.as_ref(), engine.as_ref(),
//! );
//! ```

pub mod extension;
pub mod hook;
pub mod middleware;
pub mod request;
pub mod template;
pub mod urls;

// Re-exports: Extension
pub use extension::{
    AdminSite, AppRegistry, AssetInstaller, Capabilities, CommandSchemaTools, DirectoryPackageInstaller,
    Distribution, EnabledExtension, EventBus, EventType, ExtensionClass, ExtensionContext,
    ExtensionEvent, ExtensionInfo, ExtensionManager, ExtensionManagerBuilder, ExtensionManifest,
    ExtensionMetadata, InstalledExtension, LoadReport, ManagerSettings, ManifestPackageRegistry,
    Middleware, NoopSchemaTools, PackageEntry, PackageInstaller, PackageRegistry, SchemaTools,
    StaticPackageRegistry,
};

// Re-exports: Hook
pub use hook::{
    ActiveHook, ExtensionHook, HookHandle, HookPoint, HookRegistry, HookSet, TemplateHook,
    TemplateHookPoint, UrlHook,
};

// Re-exports: URL / Request / Template
pub use middleware::ExtensionsMiddleware;
pub use request::RequestContext;
pub use template::{NullTemplateEngine, TemplateContext, TemplateEngine};
pub use urls::{DynamicUrlTable, ResolvedUrl, UrlPattern, UrlResolver};

// Re-exports: Foundation
pub use trellis_foundation::{Error, Result};
