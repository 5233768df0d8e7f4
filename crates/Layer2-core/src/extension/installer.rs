//! Extension Installer - 활성화 시의 설치 부수 효과
//!
//! - `AssetInstaller`: htdocs/static 파일 스테이징 (지운 뒤 복사)
//! - `SchemaTools`: 외부 스키마 동기화/마이그레이션 도구
//! - `PackageInstaller`: 새 확장 패키지 설치

use super::info::ExtensionInfo;
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, info, warn};
use trellis_foundation::{Error, Result};

// ============================================================================
// AssetInstaller
// ============================================================================

/// 정적 파일 설치기
///
/// 설치와 삭제는 `<media_root>/ext`, `<static_root>/ext` 아래에서만 일어난다.
#[derive(Debug, Clone, Default)]
pub struct AssetInstaller {
    media_root: PathBuf,
    static_root: PathBuf,
}

impl AssetInstaller {
    pub fn new(media_root: impl AsRef<Path>, static_root: impl AsRef<Path>) -> Self {
        Self {
            media_root: media_root.as_ref().join("ext"),
            static_root: static_root.as_ref().join("ext"),
        }
    }

    /// 확장 정적 파일 설치
    ///
    /// 이전 설치본을 먼저 지운다. `debug`가 꺼져 있을 때만 static 파일을
    /// 수집 위치로 복사한다.
    pub async fn install(&self, info: &ExtensionInfo, debug: bool) -> Result<()> {
        let htdocs_dest = contained(&self.media_root, &info.installed_htdocs_path)?;
        let static_dest = contained(&self.static_root, &info.installed_static_path)?;

        remove_tree(htdocs_dest).await;

        if info.htdocs_path.is_dir() {
            warn!(
                "Extension {} uses the deprecated htdocs/ layout; move media files to static/",
                info.id
            );
            copy_tree(&info.htdocs_path, htdocs_dest).await?;
        }

        if !debug {
            remove_tree(static_dest).await;

            if info.static_path.is_dir() {
                copy_tree(&info.static_path, static_dest).await?;
            }
        }

        debug!("Installed media files for {}", info.id);
        Ok(())
    }

    /// 설치된 정적 파일 제거
    pub async fn uninstall(&self, info: &ExtensionInfo) {
        for (root, path) in [
            (&self.media_root, &info.installed_htdocs_path),
            (&self.static_root, &info.installed_static_path),
        ] {
            match contained(root, path) {
                Ok(path) => remove_tree(path).await,
                Err(e) => warn!("Not removing media files for {}: {}", info.id, e),
            }
        }
        debug!("Removed media files for {}", info.id);
    }
}

/// `path`가 `root` 바로 아래 구간들로만 이루어졌는지 확인
///
/// `..`, 루트, 현재 디렉토리 구간이 하나라도 있으면 거부한다.
fn contained<'a>(root: &Path, path: &'a Path) -> Result<&'a Path> {
    let escapes = || {
        Error::InvalidInput(format!(
            "Install path {} is outside {}",
            path.display(),
            root.display()
        ))
    };

    let relative = path.strip_prefix(root).map_err(|_| escapes())?;
    let mut components = relative.components().peekable();
    if components.peek().is_none() {
        return Err(escapes());
    }
    if components.all(|c| matches!(c, Component::Normal(_))) {
        Ok(path)
    } else {
        Err(escapes())
    }
}

/// 디렉토리 삭제 (에러 무시)
async fn remove_tree(path: &Path) {
    if fs::symlink_metadata(path).await.is_ok() {
        if let Err(e) = fs::remove_dir_all(path).await {
            debug!("Failed to remove {:?}: {}", path, e);
        }
    }
}

/// 디렉토리 재귀 복사 (심볼릭 링크는 링크로 복사)
pub(crate) async fn copy_tree(src: &Path, dest: &Path) -> Result<()> {
    fs::create_dir_all(dest).await?;

    let mut entries = fs::read_dir(src).await?;
    while let Some(entry) = entries.next_entry().await? {
        let src_path = entry.path();
        let dest_path = dest.join(entry.file_name());
        let file_type = entry.file_type().await?;

        if file_type.is_symlink() {
            copy_symlink(&src_path, &dest_path).await?;
        } else if file_type.is_dir() {
            Box::pin(copy_tree(&src_path, &dest_path)).await?;
        } else {
            fs::copy(&src_path, &dest_path).await?;
        }
    }

    Ok(())
}

#[cfg(unix)]
async fn copy_symlink(src: &Path, dest: &Path) -> Result<()> {
    let target = fs::read_link(src).await?;
    fs::symlink(target, dest).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn copy_symlink(src: &Path, dest: &Path) -> Result<()> {
    fs::copy(src, dest).await?;
    Ok(())
}

// ============================================================================
// SchemaTools
// ============================================================================

/// 외부 스키마 도구
#[async_trait]
pub trait SchemaTools: Send + Sync {
    /// 새 테이블 생성
    async fn create_tables(&self, apps: &[String]) -> Result<()>;

    /// 증분 마이그레이션 적용
    async fn apply_migrations(&self, apps: &[String]) -> Result<()>;
}

/// 데이터베이스가 없는 호스트용
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSchemaTools;

#[async_trait]
impl SchemaTools for NoopSchemaTools {
    async fn create_tables(&self, _apps: &[String]) -> Result<()> {
        Ok(())
    }

    async fn apply_migrations(&self, _apps: &[String]) -> Result<()> {
        Ok(())
    }
}

/// 설정된 셸 명령으로 스키마 도구 실행
///
/// 앱 목록은 `TRELLIS_APPS` 환경 변수(쉼표 구분)로 전달된다. 종료 코드가
/// 0이 아니면 stderr 내용을 `InstallFailed`로 돌려준다.
#[derive(Debug, Clone, Default)]
pub struct CommandSchemaTools {
    sync_command: Option<Vec<String>>,
    evolve_command: Option<Vec<String>>,
}

impl CommandSchemaTools {
    pub fn new(sync_command: Option<&str>, evolve_command: Option<&str>) -> Result<Self> {
        Ok(Self {
            sync_command: sync_command.map(parse_command).transpose()?,
            evolve_command: evolve_command.map(parse_command).transpose()?,
        })
    }

    async fn run(&self, command: &Option<Vec<String>>, apps: &[String]) -> Result<()> {
        let Some(argv) = command else {
            return Ok(());
        };
        let Some((program, args)) = argv.split_first() else {
            return Ok(());
        };

        info!("Running schema command: {}", argv.join(" "));
        let output = Command::new(program)
            .args(args)
            .env("TRELLIS_APPS", apps.join(","))
            .output()
            .await
            .map_err(|e| Error::InstallFailed(format!("{}: {}", program, e)))?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Err(Error::InstallFailed(if stderr.is_empty() {
            format!("{} exited with {}", program, output.status)
        } else {
            stderr
        }))
    }
}

fn parse_command(command: &str) -> Result<Vec<String>> {
    shlex::split(command)
        .filter(|argv| !argv.is_empty())
        .ok_or_else(|| Error::Config(format!("Invalid schema command: {}", command)))
}

#[async_trait]
impl SchemaTools for CommandSchemaTools {
    async fn create_tables(&self, apps: &[String]) -> Result<()> {
        self.run(&self.sync_command, apps).await
    }

    async fn apply_migrations(&self, apps: &[String]) -> Result<()> {
        self.run(&self.evolve_command, apps).await
    }
}

// ============================================================================
// PackageInstaller
// ============================================================================

/// 확장 패키지 설치기
#[async_trait]
pub trait PackageInstaller: Send + Sync {
    /// 소스에서 패키지 설치
    async fn install(&self, source: &str) -> Result<()>;
}

/// 로컬 확장 디렉토리를 확장 검색 경로로 복사
#[derive(Debug, Clone)]
pub struct DirectoryPackageInstaller {
    target_dir: PathBuf,
}

impl DirectoryPackageInstaller {
    pub fn new(target_dir: impl Into<PathBuf>) -> Self {
        Self {
            target_dir: target_dir.into(),
        }
    }
}

#[async_trait]
impl PackageInstaller for DirectoryPackageInstaller {
    async fn install(&self, source: &str) -> Result<()> {
        let source_path = PathBuf::from(source);
        if !source_path.join(super::manifest::MANIFEST_FILE).is_file() {
            return Err(Error::NotFound(format!(
                "{} not found in {}",
                super::manifest::MANIFEST_FILE,
                source
            )));
        }

        let name = source_path
            .file_name()
            .ok_or_else(|| Error::InvalidInput(format!("Invalid package source: {}", source)))?;
        let dest = self.target_dir.join(name);

        info!("Installing extension package {:?} into {:?}", source_path, dest);
        remove_tree(&dest).await;
        copy_tree(&source_path, &dest).await
    }
}
