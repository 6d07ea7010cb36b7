//! The provisioning pipeline: per-target processing and run sequencing.
//!
//! Targets are processed strictly in declared order, one at a time. Mount
//! points are a shared host resource, so serializing the run avoids
//! cross-target collisions without locking. Menu rendering happens only
//! after every target succeeded; a failed target aborts the whole run and
//! leaves prior targets' artifacts in place.

use anyhow::{bail, Context, Result};
use std::fs;
use std::time::Duration;

use crate::artifacts;
use crate::config::{Config, Target};
use crate::download::{self, FetchOptions};
use crate::error::ProvisionError;
use crate::menu;
use crate::mount::{self, Mounter};
use crate::report::Reporter;

/// Options for one provisioning run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Re-download ISOs even when a completed download is present.
    pub force: bool,
    /// Per-request download timeout.
    pub timeout: Option<Duration>,
}

/// Verify the external commands the run will need are available.
///
/// Only targets that declare boot files need the mount primitives, so a
/// config without any is runnable on a host without them.
pub fn preflight(config: &Config) -> Result<()> {
    if !config.targets.iter().any(|t| t.boot_files.is_some()) {
        return Ok(());
    }
    for tool in ["mount", "umount"] {
        if which::which(tool).is_err() {
            bail!(
                "required command '{}' not found in PATH (needed to extract boot files)",
                tool
            );
        }
    }
    Ok(())
}

/// Process a single target: directories, download, and (when boot files are
/// declared) mount + extract.
pub async fn process_target(
    reporter: &dyn Reporter,
    config: &Config,
    client: &reqwest::Client,
    mounter: &dyn Mounter,
    target: &Target,
    fetch_options: &FetchOptions,
) -> std::result::Result<(), ProvisionError> {
    let paths = config.target_paths(target);

    fs::create_dir_all(&paths.iso_dir).map_err(|e| ProvisionError::Directory {
        path: paths.iso_dir.clone(),
        source: e,
    })?;

    if target.boot_files.is_some() {
        for dir in [&paths.tftp_dir, &paths.mount_point] {
            fs::create_dir_all(dir).map_err(|e| ProvisionError::Directory {
                path: dir.clone(),
                source: e,
            })?;
        }
    }

    download::fetch(reporter, client, &target.iso_file, &paths.iso_file, fetch_options).await?;

    match &target.boot_files {
        Some(boot_files) => {
            let guard = mount::mount_scoped(mounter, reporter, &paths.iso_file, &paths.mount_point)?;
            let copied =
                artifacts::copy_boot_files(reporter, &paths.mount_point, &paths.tftp_dir, boot_files);
            // Release always runs, including when the copy failed.
            guard.release(reporter);
            copied?;
        }
        None => {
            reporter.info(&format!(
                "Skipping mount and copy for {} (boot_files not configured)",
                target.name
            ));
        }
    }

    Ok(())
}

/// Run the full pipeline: every target in order, then one menu render.
pub async fn run(
    reporter: &dyn Reporter,
    config: &Config,
    mounter: &dyn Mounter,
    options: &RunOptions,
) -> Result<()> {
    preflight(config)?;

    let client = reqwest::Client::builder()
        .user_agent(concat!("pxeforge/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to create HTTP client")?;

    let fetch_options = FetchOptions {
        force: options.force,
        timeout: options.timeout,
        ..FetchOptions::default()
    };

    let total = config.targets.len();
    for (i, target) in config.targets.iter().enumerate() {
        reporter.info(&format!(
            "Processing target {}/{}: {} {} {}",
            i + 1,
            total,
            target.name,
            target.codename,
            target.version.as_deref().unwrap_or("")
        ));
        process_target(reporter, config, &client, mounter, target, &fetch_options)
            .await
            .with_context(|| {
                format!("failed to process target {} {}", target.name, target.codename)
            })?;
    }

    menu::render_menus(reporter, config).context("failed to generate boot menus")?;
    Ok(())
}
