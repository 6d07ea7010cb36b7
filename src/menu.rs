//! Aggregate boot menu rendering.
//!
//! After all targets are processed, the full target list is rendered into
//! one menu per boot-loader dialect: the PXELinux text menu and the iPXE
//! script. Menus are always rewritten whole; there is no patching of an
//! existing file. Rendering also maintains the `bios/images` symlink that
//! lets PXELinux reach the TFTP image tree.

use minijinja::{context, path_loader, Environment};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{Config, Target};
use crate::error::{ProvisionError, Result};
use crate::report::Reporter;

/// Template filename for the PXELinux menu.
pub const PXE_MENU_TEMPLATE: &str = "pxe_menu.tpl";

/// Template filename for the iPXE script.
pub const IPXE_MENU_TEMPLATE: &str = "ipxe_menu.tpl";

/// Per-target fields exposed to menu templates.
#[derive(Debug, Serialize)]
pub struct MenuTarget {
    pub name: String,
    pub codename: String,
    pub version: String,
    /// Menu label, unique per target (name-codename[-version])
    pub label: String,
    /// Identity path under the image trees (name/codename[/version])
    pub image_path: String,
    /// Filename of the target's ISO
    pub iso_file: String,
    pub has_boot_files: bool,
}

impl MenuTarget {
    fn from_target(target: &Target) -> Self {
        let mut label = format!("{}-{}", target.name, target.codename);
        if let Some(version) = &target.version {
            label.push('-');
            label.push_str(version);
        }
        Self {
            name: target.name.clone(),
            codename: target.codename.clone(),
            version: target.version.clone().unwrap_or_default(),
            label,
            image_path: target.identity_path().to_string_lossy().into_owned(),
            iso_file: target.iso_file_name().to_string(),
            has_boot_files: target.boot_files.is_some(),
        }
    }
}

/// Build a template environment over the configured template directory.
pub fn template_env(template_dir: &Path) -> Environment<'static> {
    let mut env = Environment::new();
    env.set_loader(path_loader(template_dir));
    env
}

/// Render one menu template to text.
///
/// Pure function of the target list and server host; the same inputs always
/// produce the same output.
pub fn render_menu_text(
    env: &Environment<'_>,
    template_name: &str,
    pxe_server_host: &str,
    targets: &[Target],
) -> Result<String> {
    let template = env
        .get_template(template_name)
        .map_err(|e| ProvisionError::Render(format!("template {}: {}", template_name, e)))?;

    let menu_targets: Vec<MenuTarget> = targets.iter().map(MenuTarget::from_target).collect();
    template
        .render(context! {
            pxe_server_host => pxe_server_host,
            targets => menu_targets,
        })
        .map_err(|e| ProvisionError::Render(format!("template {}: {}", template_name, e)))
}

/// Replace `tftpboot_dir/bios/images` with a symlink to the TFTP image tree.
///
/// Unconditional destructive replacement; this tool does not run
/// concurrently with itself (see DESIGN.md).
pub fn maintain_images_symlink(reporter: &dyn Reporter, config: &Config) -> Result<()> {
    let bios_dir = config.tftpboot_dir.join("bios");
    fs::create_dir_all(&bios_dir).map_err(|e| ProvisionError::Directory {
        path: bios_dir.clone(),
        source: e,
    })?;

    let link = bios_dir.join("images");
    let images_dir = config.tftp_images_dir();

    if fs::symlink_metadata(&link).is_ok() {
        fs::remove_file(&link)
            .map_err(|e| ProvisionError::Render(format!("failed to remove {}: {}", link.display(), e)))?;
    }
    std::os::unix::fs::symlink(&images_dir, &link)
        .map_err(|e| ProvisionError::Render(format!("failed to create symlink {}: {}", link.display(), e)))?;

    reporter.info(&format!(
        "Linked {} -> {}",
        link.display(),
        images_dir.display()
    ));
    Ok(())
}

/// Destination of the rendered PXELinux menu.
pub fn pxelinux_menu_path(config: &Config) -> PathBuf {
    config.tftpboot_dir.join("bios/pxelinux.cfg/default")
}

/// Destination of the rendered iPXE script.
pub fn ipxe_menu_path(config: &Config) -> PathBuf {
    config.tftpboot_dir.join("ipxe/boot.ipxe")
}

/// Render all aggregate menus and maintain the image symlink.
///
/// A failure here leaves already-extracted boot artifacts in place; only the
/// render phase needs re-running afterwards.
pub fn render_menus(reporter: &dyn Reporter, config: &Config) -> Result<()> {
    maintain_images_symlink(reporter, config)?;

    let env = template_env(&config.template_dir);
    let outputs = [
        (PXE_MENU_TEMPLATE, pxelinux_menu_path(config)),
        (IPXE_MENU_TEMPLATE, ipxe_menu_path(config)),
    ];

    for (template_name, dest) in outputs {
        let text = render_menu_text(&env, template_name, &config.pxe_server_host, &config.targets)?;
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| ProvisionError::Directory {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        fs::write(&dest, text)
            .map_err(|e| ProvisionError::Render(format!("failed to write {}: {}", dest.display(), e)))?;
        reporter.info(&format!("Generated menu at {}", dest.display()));
    }

    Ok(())
}
