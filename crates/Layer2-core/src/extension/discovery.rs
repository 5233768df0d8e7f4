//! Extension Discovery - 디렉토리에서 `extension.json` 매니페스트 발견
//!
//! 검색 경로의 하위 디렉토리마다 매니페스트를 찾는다. 디렉토리 하나가
//! 배포 패키지 하나이며, 그 디렉토리가 패키지 루트(`htdocs/`, `static/`)가 된다.

use super::manifest::{Capabilities, ExtensionManifest, MANIFEST_FILE};
use super::registry::{Distribution, PackageEntry, PackageRegistry};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info, warn};
use trellis_foundation::Result;

// ============================================================================
// DiscoveredExtension
// ============================================================================

/// 발견된 매니페스트
#[derive(Debug, Clone)]
pub struct DiscoveredExtension {
    pub manifest: ExtensionManifest,

    /// 패키지 디렉토리
    pub path: PathBuf,
}

impl DiscoveredExtension {
    pub fn distribution(&self) -> Distribution {
        Distribution::new(
            self.manifest.package.clone(),
            self.manifest.version(),
            self.path.clone(),
        )
    }
}

// ============================================================================
// ManifestPackageRegistry
// ============================================================================

/// 매니페스트 기반 패키지 레지스트리
pub struct ManifestPackageRegistry {
    search_paths: Vec<PathBuf>,
    capabilities: Capabilities,
}

impl ManifestPackageRegistry {
    pub fn new(search_paths: Vec<PathBuf>, capabilities: Capabilities) -> Self {
        Self {
            search_paths,
            capabilities,
        }
    }

    /// 검색 경로 추가
    pub fn add_search_path(&mut self, path: impl Into<PathBuf>) {
        self.search_paths.push(path.into());
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// 모든 검색 경로에서 매니페스트 발견
    pub async fn discover(&self) -> Vec<DiscoveredExtension> {
        let mut found = Vec::new();

        for path in &self.search_paths {
            if !path.exists() {
                continue;
            }

            match scan_directory(path).await {
                Ok(extensions) => found.extend(extensions),
                Err(e) => warn!("Failed to scan extension directory {:?}: {}", path, e),
            }
        }

        debug!("Discovered {} extension manifests", found.len());
        found
    }
}

/// 디렉토리 하나 스캔 (이름순)
async fn scan_directory(dir: &Path) -> Result<Vec<DiscoveredExtension>> {
    let mut dirs = Vec::new();
    let mut entries = fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.is_dir() && path.join(MANIFEST_FILE).exists() {
            dirs.push(path);
        }
    }
    dirs.sort();

    let mut found = Vec::new();
    for path in dirs {
        let manifest_path = path.join(MANIFEST_FILE);
        match read_manifest(&manifest_path).await {
            Ok(manifest) => {
                debug!("Found extension {} at {:?}", manifest.target, path);
                found.push(DiscoveredExtension { manifest, path });
            }
            Err(e) => warn!("Failed to parse extension manifest {:?}: {}", manifest_path, e),
        }
    }

    Ok(found)
}

async fn read_manifest(path: &Path) -> Result<ExtensionManifest> {
    let content = fs::read_to_string(path).await?;
    ExtensionManifest::parse(&content)
}

#[async_trait]
impl PackageRegistry for ManifestPackageRegistry {
    async fn entries(&self, group: &str) -> Vec<PackageEntry> {
        self.discover()
            .await
            .into_iter()
            .filter(|d| d.manifest.in_group(group))
            .map(|d| {
                let dist = d.distribution();
                let capabilities = self.capabilities.clone();
                let manifest = d.manifest;
                let target = manifest.target.clone();

                PackageEntry::new(
                    manifest.package.clone(),
                    target,
                    dist,
                    Arc::new(move || capabilities.resolve(&manifest)),
                )
            })
            .collect()
    }

    async fn find_distribution(&self, package_name: &str) -> Option<Distribution> {
        self.discover()
            .await
            .into_iter()
            .find(|d| d.manifest.package == package_name)
            .map(|d| d.distribution())
    }

    async fn refresh(&self) -> Result<()> {
        info!("Rescanning {} extension directories", self.search_paths.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn write_manifest(root: &Path, dir: &str, body: &str) {
        let path = root.join(dir);
        fs::create_dir_all(&path).await.unwrap();
        fs::write(path.join(MANIFEST_FILE), body).await.unwrap();
    }

    #[tokio::test]
    async fn test_discover_and_entries() {
        let temp = TempDir::new().unwrap();
        write_manifest(
            temp.path(),
            "rb-stats",
            r#"{"target": "rb_stats.extension:Stats", "package": "rb-stats", "version": "1.0"}"#,
        )
        .await;
        write_manifest(
            temp.path(),
            "rb-other",
            r#"{"target": "rb_other.ext:Other", "package": "rb-other", "group": "other.group"}"#,
        )
        .await;

        let registry = ManifestPackageRegistry::new(
            vec![temp.path().to_path_buf()],
            Capabilities::new(),
        );

        assert_eq!(registry.discover().await.len(), 2);

        let entries = registry.entries("trellis.extensions").await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].extension_id().unwrap(), "rb_stats.extension.Stats");
        assert_eq!(entries[0].dist.location, temp.path().join("rb-stats"));
        assert!(entries[0].load().is_ok());

        let dist = registry.find_distribution("rb-other").await.unwrap();
        assert_eq!(dist.version, "0.0.0");
    }

    #[tokio::test]
    async fn test_malformed_manifest_skipped() {
        let temp = TempDir::new().unwrap();
        write_manifest(temp.path(), "broken", "{ not json").await;
        write_manifest(
            temp.path(),
            "good",
            r#"{"target": "good.ext:Good", "package": "good"}"#,
        )
        .await;

        let registry = ManifestPackageRegistry::new(
            vec![temp.path().to_path_buf(), temp.path().join("missing")],
            Capabilities::new(),
        );

        let found = registry.discover().await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].manifest.package, "good");
    }
}
