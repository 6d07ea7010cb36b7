//! Shared test utilities for pxeforge tests.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;

use pxeforge::config::{BootFiles, Config, Target};
use pxeforge::download::{manifest_path, DownloadManifest};
use pxeforge::error::{ProvisionError, Result};
use pxeforge::mount::Mounter;

/// Test environment with temporary roots for every directory the pipeline
/// touches. Templates are copied from the repo's real `templates/` dir.
pub struct TestEnv {
    /// Temporary directory (kept alive for lifetime of TestEnv)
    pub _temp_dir: TempDir,
    pub tftpboot_dir: PathBuf,
    pub iso_dir: PathBuf,
    pub mount_dir: PathBuf,
    pub template_dir: PathBuf,
    pub dnsmasq_dir: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let base = temp_dir.path();

        let tftpboot_dir = base.join("tftpboot");
        let iso_dir = base.join("iso");
        let mount_dir = base.join("mnt");
        let template_dir = base.join("templates");
        let dnsmasq_dir = base.join("dnsmasq.d");

        for dir in [&tftpboot_dir, &iso_dir, &mount_dir, &template_dir, &dnsmasq_dir] {
            fs::create_dir_all(dir).expect("Failed to create test dir");
        }

        let repo_templates = Path::new(env!("CARGO_MANIFEST_DIR")).join("templates");
        for entry in fs::read_dir(&repo_templates).expect("Failed to read templates dir") {
            let entry = entry.expect("Failed to read template entry");
            fs::copy(entry.path(), template_dir.join(entry.file_name()))
                .expect("Failed to copy template");
        }

        Self {
            _temp_dir: temp_dir,
            tftpboot_dir,
            iso_dir,
            mount_dir,
            template_dir,
            dnsmasq_dir,
        }
    }

    /// Config over this environment's directories.
    pub fn config(&self, targets: Vec<Target>) -> Config {
        Config {
            tftpboot_dir: self.tftpboot_dir.clone(),
            iso_dir: self.iso_dir.clone(),
            mount_dir: self.mount_dir.clone(),
            pxe_server_host: "192.168.10.1".to_string(),
            template_dir: self.template_dir.clone(),
            dnsmasq_dir: self.dnsmasq_dir.clone(),
            targets,
        }
    }

    /// Place a completed "download" for a target so the pipeline skips the
    /// network: ISO file plus a matching manifest.
    pub fn place_completed_iso(&self, config: &Config, target: &Target, contents: &[u8]) {
        let paths = config.target_paths(target);
        fs::create_dir_all(&paths.iso_dir).expect("Failed to create iso dir");
        fs::write(&paths.iso_file, contents).expect("Failed to write iso");

        let manifest = DownloadManifest {
            url: target.iso_file.clone(),
            size: contents.len() as u64,
            sha256: "test".to_string(),
        };
        fs::write(
            manifest_path(&paths.iso_file),
            serde_json::to_string(&manifest).expect("Failed to encode manifest"),
        )
        .expect("Failed to write manifest");
    }
}

/// Build a debian/bookworm target.
pub fn debian_target(with_boot_files: bool) -> Target {
    Target {
        name: "debian".to_string(),
        codename: "bookworm".to_string(),
        version: Some("12.5".to_string()),
        iso_file: "https://example/debian-12.5.iso".to_string(),
        boot_files: with_boot_files.then(|| BootFiles {
            vmlinuz: "install.amd/vmlinuz".to_string(),
            initrd: "install.amd/initrd.gz".to_string(),
        }),
    }
}

/// Mounter double: "mounting" materializes files into the mount point,
/// "unmounting" clears it. Records every call.
pub struct StubMounter {
    /// Relative path and contents of each file the mounted ISO provides.
    pub files: Vec<(String, Vec<u8>)>,
    pub fail_mount: bool,
    pub fail_unmount: bool,
    pub mounts: Mutex<Vec<PathBuf>>,
    pub unmounts: Mutex<Vec<PathBuf>>,
    mounted: Mutex<HashSet<PathBuf>>,
}

impl StubMounter {
    pub fn new(files: Vec<(&str, &[u8])>) -> Self {
        Self {
            files: files
                .into_iter()
                .map(|(p, c)| (p.to_string(), c.to_vec()))
                .collect(),
            fail_mount: false,
            fail_unmount: false,
            mounts: Mutex::new(Vec::new()),
            unmounts: Mutex::new(Vec::new()),
            mounted: Mutex::new(HashSet::new()),
        }
    }

    /// Stub serving the boot files `debian_target` declares.
    pub fn with_debian_boot_files() -> Self {
        Self::new(vec![
            ("install.amd/vmlinuz", b"kernel bits" as &[u8]),
            ("install.amd/initrd.gz", b"initrd bits"),
        ])
    }

    pub fn mount_count(&self) -> usize {
        self.mounts.lock().unwrap().len()
    }

    pub fn unmount_count(&self) -> usize {
        self.unmounts.lock().unwrap().len()
    }
}

impl Mounter for StubMounter {
    fn mount(&self, _iso: &Path, mount_point: &Path) -> Result<()> {
        self.mounts.lock().unwrap().push(mount_point.to_path_buf());
        if self.fail_mount {
            return Err(ProvisionError::Mount {
                mount_point: mount_point.to_path_buf(),
                detail: "stub mount failure".to_string(),
            });
        }
        for (rel, contents) in &self.files {
            let dest = mount_point.join(rel);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent).expect("Failed to create stub mount dir");
            }
            fs::write(dest, contents).expect("Failed to write stub mount file");
        }
        self.mounted
            .lock()
            .unwrap()
            .insert(mount_point.to_path_buf());
        Ok(())
    }

    fn unmount(&self, mount_point: &Path) -> Result<()> {
        self.unmounts
            .lock()
            .unwrap()
            .push(mount_point.to_path_buf());
        if self.fail_unmount {
            return Err(ProvisionError::Mount {
                mount_point: mount_point.to_path_buf(),
                detail: "stub unmount failure".to_string(),
            });
        }
        for entry in fs::read_dir(mount_point).expect("Failed to read stub mount point") {
            let entry = entry.expect("Failed to read stub mount entry");
            if entry.file_type().expect("Failed to stat").is_dir() {
                fs::remove_dir_all(entry.path()).expect("Failed to clear stub mount");
            } else {
                fs::remove_file(entry.path()).expect("Failed to clear stub mount");
            }
        }
        self.mounted.lock().unwrap().remove(mount_point);
        Ok(())
    }

    fn is_mounted(&self, mount_point: &Path) -> Result<bool> {
        Ok(self.mounted.lock().unwrap().contains(mount_point))
    }
}
