//! Per-host boot configuration: request payloads, MAC-derived filenames,
//! and the ISO inventory walk.

use minijinja::context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{ProvisionError, Result};
use crate::menu::template_env;
use crate::report::Reporter;

/// Template filename for the per-host PXELinux entry.
pub const HOST_PXELINUX_TEMPLATE: &str = "host_pxelinux.tpl";

/// Template filename for the per-host dnsmasq stanza.
pub const DNSMASQ_TEMPLATE: &str = "dnsmasq.tpl";

/// One host's boot request: identity plus the target image to install.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    pub mac_address: String,
    pub ip_address: String,
    pub hostname: String,
    pub name: String,
    pub codename: String,
    #[serde(rename = "iso")]
    pub iso_file: String,
}

/// One provisioned ISO, inferred from its location in the image tree.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IsoInfo {
    pub name: String,
    pub codename: String,
    pub filename: String,
}

/// Files written for one host.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedFiles {
    pub pxelinux_config: PathBuf,
    pub dnsmasq_config: PathBuf,
}

impl HostConfig {
    /// PXELinux boot file name: `01-` plus the lowercased MAC with colons
    /// replaced by hyphens.
    pub fn pxelinux_file_name(&self) -> String {
        format!("01-{}", self.mac_address.to_lowercase().replace(':', "-"))
    }

    /// dnsmasq stanza file name: `fixip-<hostname>-<mac>.conf`.
    pub fn dnsmasq_file_name(&self) -> String {
        format!(
            "fixip-{}-{}.conf",
            self.hostname,
            self.mac_address.replace(':', "-")
        )
    }

    /// Verify the requested ISO was provisioned.
    ///
    /// The ISO may sit directly under `name/codename/` or one level deeper
    /// in a version directory, so the check walks the codename subtree.
    pub fn find_iso(&self, config: &Config) -> Option<PathBuf> {
        let root = config
            .iso_images_dir()
            .join(&self.name)
            .join(&self.codename);
        WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .find(|e| {
                e.file_type().is_file()
                    && e.file_name() == std::ffi::OsStr::new(&self.iso_file)
            })
            .map(|e| e.into_path())
    }
}

/// Enumerate provisioned ISOs by walking the archive image tree.
///
/// Path segments relative to the tree root carry the identity:
/// `<name>/<codename>[/<version>]/<file>`.
pub fn list_isos(iso_images_dir: &Path) -> Result<Vec<IsoInfo>> {
    let mut isos = Vec::new();
    if !iso_images_dir.exists() {
        return Ok(isos);
    }

    for entry in WalkDir::new(iso_images_dir) {
        let entry = entry.map_err(|e| {
            ProvisionError::Io(e.into_io_error().unwrap_or_else(|| {
                std::io::Error::other("walk failed")
            }))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        // Download manifests live next to the ISOs; not images.
        if entry.file_name().to_string_lossy().ends_with(".manifest.json") {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(iso_images_dir) else {
            continue;
        };
        let mut components = rel.components().map(|c| c.as_os_str().to_string_lossy());
        let (Some(name), Some(codename)) = (components.next(), components.next()) else {
            continue;
        };
        // A file directly under <name>/ has no codename segment.
        if rel.components().count() < 3 {
            continue;
        }
        isos.push(IsoInfo {
            name: name.into_owned(),
            codename: codename.into_owned(),
            filename: entry.file_name().to_string_lossy().into_owned(),
        });
    }

    isos.sort_by(|a, b| {
        (&a.name, &a.codename, &a.filename).cmp(&(&b.name, &b.codename, &b.filename))
    });
    Ok(isos)
}

/// Render and write the PXELinux entry and dnsmasq stanza for one host.
pub fn generate_host_configs(
    reporter: &dyn Reporter,
    config: &Config,
    host: &HostConfig,
) -> Result<GeneratedFiles> {
    let env = template_env(&config.template_dir);
    let ctx = context! {
        mac_address => host.mac_address,
        ip_address => host.ip_address,
        hostname => host.hostname,
        name => host.name,
        codename => host.codename,
        iso_file => host.iso_file,
        pxe_server_host => config.pxe_server_host,
    };

    let files = GeneratedFiles {
        pxelinux_config: config
            .tftpboot_dir
            .join("bios/pxelinux.cfg")
            .join(host.pxelinux_file_name()),
        dnsmasq_config: config.dnsmasq_dir.join(host.dnsmasq_file_name()),
    };

    for (template_name, dest) in [
        (HOST_PXELINUX_TEMPLATE, &files.pxelinux_config),
        (DNSMASQ_TEMPLATE, &files.dnsmasq_config),
    ] {
        let template = env
            .get_template(template_name)
            .map_err(|e| ProvisionError::Render(format!("template {}: {}", template_name, e)))?;
        let text = template
            .render(ctx.clone())
            .map_err(|e| ProvisionError::Render(format!("template {}: {}", template_name, e)))?;

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| ProvisionError::Directory {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        fs::write(dest, text).map_err(|e| {
            ProvisionError::Render(format!("failed to write {}: {}", dest.display(), e))
        })?;
        reporter.info(&format!("Generated {}", dest.display()));
    }

    Ok(files)
}
