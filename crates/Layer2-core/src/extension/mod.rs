//! # Extension System
//!
//! 확장 발견, 활성화/비활성화, 설치 부수 효과, 프로세스 간 동기화.
//!
//! ## 구성
//!
//! - `ExtensionClass`: 확장 클래스 (선언 + 초기화 코드)
//! - `ExtensionInfo`: 발견 시 계산되는 확장 정보
//! - `ExtensionManager`: 라이프사이클 관리
//! - `PackageRegistry`: 설치된 패키지 열거 (`StaticPackageRegistry`, `ManifestPackageRegistry`)
//! - `AssetInstaller` / `SchemaTools` / `PackageInstaller`: 설치 부수 효과
//! - `EventBus`: 라이프사이클 이벤트
//!
//! ## 사용 예시
//!
//! ```ignore
//! let storage = Storage::new(&config.data_dir())?;
//! let registry = StaticPackageRegistry::new();
//! registry.register_class(
//!     "trellis.extensions",
//!     "rb_stats.extension:StatsExtension",
//!     Distribution::new("rb-stats", "1.0", "/opt/rb-stats"),
//!     Arc::new(StatsExtension),
//! );
//!
//! let manager = ExtensionManager::builder(ManagerSettings::from_config(&config))
//!     .package_registry(Arc::new(registry))
//!     .store(Arc::new(storage.clone()))
//!     .cache(Arc::new(storage))
//!     .build()?;
//!
//! manager.load(false).await?;
//! manager.enable_extension("rb_stats.extension.StatsExtension").await?;
//! ```

mod admin;
mod apps;
mod context;
mod dependency;
mod discovery;
mod events;
mod info;
mod installer;
mod instance;
mod manager;
mod manifest;
mod registry;
mod traits;

pub use admin::AdminSite;
pub use apps::AppRegistry;
pub use context::ExtensionContext;
pub use discovery::{DiscoveredExtension, ManifestPackageRegistry};
pub use events::{EventBus, EventType, ExtensionEvent};
pub use info::{ExtensionInfo, ExtensionMetadata};
pub use installer::{
    AssetInstaller, CommandSchemaTools, DirectoryPackageInstaller, NoopSchemaTools,
    PackageInstaller, SchemaTools,
};
pub use instance::EnabledExtension;
pub use manager::{
    ExtensionManager, ExtensionManagerBuilder, InstalledExtension, LoadReport, ManagerSettings,
};
pub use manifest::{Capabilities, ExtensionManifest, ManifestExtension, TemplateHookSpec, MANIFEST_FILE};
pub use registry::{Distribution, ExtensionLoader, PackageEntry, PackageRegistry, StaticPackageRegistry};
pub use traits::{ExtensionClass, Middleware};
