//! 서브커맨드 구현

use anyhow::Context;
use std::sync::Arc;
use trellis_core::{
    Capabilities, CommandSchemaTools, DirectoryPackageInstaller, ExtensionManager, LoadReport,
    ManagerSettings, ManifestPackageRegistry,
};
use trellis_foundation::{Storage, TrellisConfig};

/// 설정으로 매니저 구성
///
/// 같은 SQLite 파일이 Registration Record 저장소와 공유 캐시를 겸한다.
pub fn build_manager(config: &TrellisConfig) -> anyhow::Result<ExtensionManager> {
    let data_dir = config.data_dir();
    let storage = Storage::new(&data_dir)
        .with_context(|| format!("Failed to open database in {}", data_dir.display()))?;

    let search_paths = config.extension_dirs();
    let install_dir = search_paths
        .first()
        .cloned()
        .unwrap_or_else(|| data_dir.join("extensions"));

    let schema_tools = CommandSchemaTools::new(
        config.schema_sync_command.as_deref(),
        config.schema_evolve_command.as_deref(),
    )?;

    let manager = ExtensionManager::builder(ManagerSettings::from_config(config))
        .package_registry(Arc::new(ManifestPackageRegistry::new(
            search_paths,
            Capabilities::new(),
        )))
        .store(Arc::new(storage.clone()))
        .cache(Arc::new(storage))
        .schema_tools(Arc::new(schema_tools))
        .package_installer(Arc::new(DirectoryPackageInstaller::new(install_dir)))
        .build()?;

    Ok(manager)
}

/// 설치된 확장 목록
pub async fn list(manager: &ExtensionManager, json: bool) -> anyhow::Result<()> {
    let extensions = manager.get_installed_extensions().await;

    if json {
        let infos: Vec<_> = extensions
            .iter()
            .map(|ext| {
                serde_json::json!({
                    "info": ext.info.as_ref(),
                    "enabled": ext.enabled,
                    "installed": ext.installed,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&infos)?);
        return Ok(());
    }

    if extensions.is_empty() {
        println!("No extensions found.");
        return Ok(());
    }

    println!(
        "{:<45} {:<25} {:<10} {:<8}",
        "ID", "Name", "Version", "Enabled"
    );
    println!("{}", "-".repeat(90));

    for ext in extensions {
        let name = if ext.info.name.chars().count() > 23 {
            format!("{}...", ext.info.name.chars().take(20).collect::<String>())
        } else {
            ext.info.name.clone()
        };
        println!(
            "{:<45} {:<25} {:<10} {:<8}",
            ext.id(),
            name,
            ext.info.version,
            if ext.enabled { "yes" } else { "no" }
        );
    }

    Ok(())
}

/// 확장 상세
pub async fn show(manager: &ExtensionManager, id: &str) -> anyhow::Result<()> {
    let ext = manager.get_installed_extension(id).await?;
    let dependents = manager.get_dependent_extensions(id).await?;
    let info = &ext.info;

    println!("\n{} ({})", info.name, info.id);
    println!("  Package:    {} {}", info.package_name, info.version);
    if let Some(summary) = &info.summary {
        println!("  Summary:    {}", summary);
    }
    if let Some(author) = &info.author {
        println!("  Author:     {}", author);
    }
    println!("  Enabled:    {}", ext.enabled);
    println!("  Installed:  {}", ext.installed);
    println!("  Apps:       {}", info.effective_apps().join(", "));

    if !info.middleware.is_empty() {
        println!("  Middleware: {}", info.middleware.join(", "));
    }
    if !ext.requirements.is_empty() {
        println!("  Requires:");
        for req in &ext.requirements {
            println!("    - {}", req.id);
        }
    }
    if !dependents.is_empty() {
        println!("  Required by:");
        for dep in &dependents {
            println!("    - {}", dep.id());
        }
    }
    println!();

    Ok(())
}

pub async fn enable(manager: &ExtensionManager, id: &str) -> anyhow::Result<()> {
    let instance = manager.enable_extension(id).await?;
    println!("✓ Enabled {}", instance.info().name);
    Ok(())
}

pub async fn disable(manager: &ExtensionManager, id: &str) -> anyhow::Result<()> {
    manager.disable_extension(id).await?;
    println!("✓ Disabled {}", id);
    Ok(())
}

pub async fn reload(manager: &ExtensionManager) -> anyhow::Result<()> {
    let report = manager.load(true).await?;
    print_report(&report);
    Ok(())
}

pub async fn install(manager: &ExtensionManager, source: &str, package: &str) -> anyhow::Result<()> {
    let report = manager.install_extension(source, package).await?;
    println!("✓ Installed {}", package);
    print_report(&report);
    Ok(())
}

/// 세대 값, 라우트, 미들웨어 체인
pub async fn status(manager: &ExtensionManager) -> anyhow::Result<()> {
    let generation = manager
        .sync_generation()
        .await
        .map(|g| g.to_string())
        .unwrap_or_else(|| "-".to_string());

    println!("\n📋 Extension Manager ({})\n", manager.settings().key);
    println!("  Generation: {}", generation);
    println!("  Expired:    {}", manager.is_expired().await);
    println!("  Enabled:    {}", manager.get_enabled_extensions().await.len());

    let routes = manager.get_url_patterns().patterns();
    println!("  Routes:     {}", routes.len());
    for pattern in routes {
        println!("    {:<50} {}", pattern.route, pattern.handler);
    }

    let middleware = manager.middleware().await;
    if !middleware.is_empty() {
        println!("  Middleware:");
        for m in middleware {
            println!("    - {}", m.name());
        }
    }
    println!();

    Ok(())
}

fn print_report(report: &LoadReport) {
    println!(
        "Discovered {}, initialized {}, removed {}",
        report.discovered.len(),
        report.initialized.len(),
        report.removed.len()
    );
    for entry in &report.failed {
        println!("  ✗ {}", entry);
    }
}
