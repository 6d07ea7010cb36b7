//! Configuration management for pxeforge.
//!
//! The operator supplies one YAML file: global directory roots plus an
//! ordered list of install targets. The list is validated at load time and
//! immutable for the rest of the run.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ProvisionError, Result};

/// Default mount root when the config does not set one.
pub const DEFAULT_MOUNT_DIR: &str = "/mnt";

/// Default template directory, resolved relative to the config file.
pub const DEFAULT_TEMPLATE_DIR: &str = "templates";

/// Default directory for per-host dnsmasq stanzas.
pub const DEFAULT_DNSMASQ_DIR: &str = "/etc/dnsmasq.d";

/// Boot files to extract from a mounted ISO, paths relative to the ISO root.
#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct BootFiles {
    pub vmlinuz: String,
    pub initrd: String,
}

/// One OS install target: an ISO plus optional boot assets.
#[derive(Debug, Clone, Deserialize)]
pub struct Target {
    /// Distribution name (e.g. "debian")
    pub name: String,
    /// Release codename (e.g. "bookworm")
    pub codename: String,
    /// Release version (e.g. "12.5"); optional
    #[serde(default)]
    pub version: Option<String>,
    /// Source URL of the installation ISO
    pub iso_file: String,
    /// Kernel/initrd to extract; targets without this contribute only the ISO
    #[serde(default)]
    pub boot_files: Option<BootFiles>,
}

impl Target {
    /// Filename component of the ISO URL.
    pub fn iso_file_name(&self) -> &str {
        self.iso_file
            .rsplit('/')
            .next()
            .unwrap_or(self.iso_file.as_str())
    }

    /// Identity path segments: name/codename[/version].
    pub fn identity_path(&self) -> PathBuf {
        let mut path = PathBuf::from(&self.name).join(&self.codename);
        if let Some(version) = &self.version {
            path.push(version);
        }
        path
    }
}

/// Pxeforge configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// TFTP root served to booting clients
    pub tftpboot_dir: PathBuf,
    /// Root of the ISO archive
    pub iso_dir: PathBuf,
    /// Root under which per-target mount points are created
    #[serde(default = "default_mount_dir")]
    pub mount_dir: PathBuf,
    /// Host (IP or name) booting clients use to reach this server
    pub pxe_server_host: String,
    /// Directory holding menu and host-config templates
    #[serde(default = "default_template_dir")]
    pub template_dir: PathBuf,
    /// Directory receiving per-host dnsmasq stanzas
    #[serde(default = "default_dnsmasq_dir")]
    pub dnsmasq_dir: PathBuf,
    /// Ordered list of install targets; must be non-empty
    pub targets: Vec<Target>,
}

fn default_mount_dir() -> PathBuf {
    PathBuf::from(DEFAULT_MOUNT_DIR)
}

fn default_template_dir() -> PathBuf {
    PathBuf::from(DEFAULT_TEMPLATE_DIR)
}

fn default_dnsmasq_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DNSMASQ_DIR)
}

/// Filesystem locations for one target, recomputed every run.
#[derive(Debug, Clone)]
pub struct TargetPaths {
    /// Directory holding the downloaded ISO
    pub iso_dir: PathBuf,
    /// Full path of the downloaded ISO file
    pub iso_file: PathBuf,
    /// Directory receiving vmlinuz/initrd in the TFTP tree
    pub tftp_dir: PathBuf,
    /// Loopback mount point for the ISO
    pub mount_point: PathBuf,
}

impl Config {
    /// Load and validate configuration from a YAML file.
    ///
    /// Fails before any side effect on an unreadable file, a parse error, or
    /// an empty target list. A relative `template_dir` is resolved against
    /// the config file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| ProvisionError::ConfigLoad {
            path: path.to_path_buf(),
            reason: format!("failed to read file: {}", e),
        })?;

        let mut config: Config =
            serde_yaml::from_str(&content).map_err(|e| ProvisionError::ConfigLoad {
                path: path.to_path_buf(),
                reason: format!("failed to parse YAML: {}", e),
            })?;

        if config.targets.is_empty() {
            return Err(ProvisionError::ConfigLoad {
                path: path.to_path_buf(),
                reason: "no targets found in configuration".to_string(),
            });
        }

        if config.template_dir.is_relative() {
            if let Some(parent) = path.parent() {
                config.template_dir = parent.join(&config.template_dir);
            }
        }

        Ok(config)
    }

    /// Derive the per-target filesystem locations.
    pub fn target_paths(&self, target: &Target) -> TargetPaths {
        let identity = target.identity_path();
        let iso_dir = self.iso_dir.join("images").join(&identity);
        let iso_file = iso_dir.join(target.iso_file_name());
        TargetPaths {
            iso_dir,
            iso_file,
            tftp_dir: self.tftpboot_dir.join("images").join(&identity),
            mount_point: self.mount_dir.join(&identity),
        }
    }

    /// Root of the TFTP image tree.
    pub fn tftp_images_dir(&self) -> PathBuf {
        self.tftpboot_dir.join("images")
    }

    /// Root of the ISO archive image tree.
    pub fn iso_images_dir(&self) -> PathBuf {
        self.iso_dir.join("images")
    }

    /// Print configuration for `show config`.
    pub fn print(&self) {
        println!("Configuration:");
        println!("  tftpboot_dir:    {}", self.tftpboot_dir.display());
        println!("  iso_dir:         {}", self.iso_dir.display());
        println!("  mount_dir:       {}", self.mount_dir.display());
        println!("  pxe_server_host: {}", self.pxe_server_host);
        println!("  template_dir:    {}", self.template_dir.display());
        println!("  dnsmasq_dir:     {}", self.dnsmasq_dir.display());
        println!("  targets:         {}", self.targets.len());
        for target in &self.targets {
            let boot = if target.boot_files.is_some() {
                "kernel+initrd"
            } else {
                "iso only"
            };
            println!(
                "    - {} {} {} ({})",
                target.name,
                target.codename,
                target.version.as_deref().unwrap_or("-"),
                boot
            );
        }
    }
}
