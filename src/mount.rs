//! Loopback mounting of installation ISOs.
//!
//! The mount/unmount primitives sit behind the `Mounter` trait so the
//! pipeline can be exercised without loop devices or root privileges. The
//! real implementation shells out to `mount -o loop,ro` / `umount` and
//! answers "is this mounted?" from `/proc/self/mounts` rather than guessing
//! from directory contents.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ProvisionError, Result};
use crate::process::Cmd;
use crate::report::Reporter;

/// Platform interface for attaching an ISO at a mount point.
pub trait Mounter: Send + Sync {
    /// Attach `iso` read-only at `mount_point`.
    fn mount(&self, iso: &Path, mount_point: &Path) -> Result<()>;

    /// Detach whatever is mounted at `mount_point`.
    fn unmount(&self, mount_point: &Path) -> Result<()>;

    /// Whether `mount_point` appears in the mount table.
    fn is_mounted(&self, mount_point: &Path) -> Result<bool>;
}

/// `Mounter` backed by the system mount/umount commands.
pub struct LoopMounter;

impl Mounter for LoopMounter {
    fn mount(&self, iso: &Path, mount_point: &Path) -> Result<()> {
        Cmd::new("mount")
            .arg("-o")
            .arg("loop,ro")
            .arg_path(iso)
            .arg_path(mount_point)
            .error_msg(format!("mount of {} failed", iso.display()))
            .run()
            .map_err(|e| ProvisionError::Mount {
                mount_point: mount_point.to_path_buf(),
                detail: format!("{:#}", e),
            })?;
        Ok(())
    }

    fn unmount(&self, mount_point: &Path) -> Result<()> {
        Cmd::new("umount")
            .arg_path(mount_point)
            .error_msg("umount failed")
            .run()
            .map_err(|e| ProvisionError::Mount {
                mount_point: mount_point.to_path_buf(),
                detail: format!("{:#}", e),
            })?;
        Ok(())
    }

    fn is_mounted(&self, mount_point: &Path) -> Result<bool> {
        let table = fs::read_to_string("/proc/self/mounts")?;
        let canonical = mount_point.canonicalize().ok();
        Ok(table.lines().any(|line| {
            let Some(entry) = line.split_whitespace().nth(1) else {
                return false;
            };
            let entry = Path::new(entry);
            entry == mount_point || Some(entry) == canonical.as_deref()
        }))
    }
}

/// Scoped handle over a mounted ISO.
///
/// Created by [`mount_scoped`]. Release is a no-op when this run did not
/// perform the mount (already mounted, or the mount point was pre-populated
/// by something else).
pub struct MountGuard<'a> {
    mounter: &'a dyn Mounter,
    mount_point: PathBuf,
    owns_mount: bool,
    released: bool,
}

impl<'a> MountGuard<'a> {
    /// Unmount if this guard owns the mount. A failure is downgraded to a
    /// reporter warning: cleanup must not turn a successful extraction into
    /// a failed run, but it has to be visible.
    pub fn release(mut self, reporter: &dyn Reporter) {
        self.released = true;
        if !self.owns_mount {
            return;
        }
        reporter.info(&format!("Unmounting {}", self.mount_point.display()));
        if let Err(e) = self.mounter.unmount(&self.mount_point) {
            reporter.warn(&format!(
                "failed to unmount {}: {}",
                self.mount_point.display(),
                e
            ));
        }
    }

    /// Whether this guard performed the mount (as opposed to finding one).
    pub fn owns_mount(&self) -> bool {
        self.owns_mount
    }
}

impl Drop for MountGuard<'_> {
    fn drop(&mut self) {
        // Backstop for unwinds; the normal path releases explicitly.
        if self.owns_mount && !self.released {
            if let Err(e) = self.mounter.unmount(&self.mount_point) {
                eprintln!(
                    "Warning: failed to unmount {}: {}",
                    self.mount_point.display(),
                    e
                );
            }
        }
    }
}

/// Attach `iso` at `mount_point` and return a scoped handle.
///
/// If the mount point is already in the mount table, or is non-empty (taken
/// as populated by a prior run), no mount is performed and the returned
/// guard will not unmount on release.
pub fn mount_scoped<'a>(
    mounter: &'a dyn Mounter,
    reporter: &dyn Reporter,
    iso: &Path,
    mount_point: &Path,
) -> Result<MountGuard<'a>> {
    let already = mounter.is_mounted(mount_point)? || !is_dir_empty(mount_point)?;
    if already {
        reporter.info(&format!(
            "Mount point {} is already mounted or contains files",
            mount_point.display()
        ));
    } else {
        reporter.info(&format!(
            "Mounting ISO {} at {}",
            iso.display(),
            mount_point.display()
        ));
        mounter.mount(iso, mount_point)?;
    }

    Ok(MountGuard {
        mounter,
        mount_point: mount_point.to_path_buf(),
        owns_mount: !already,
        released: false,
    })
}

/// Whether a directory has zero entries.
pub fn is_dir_empty(path: &Path) -> Result<bool> {
    let mut entries = fs::read_dir(path).map_err(|e| ProvisionError::Mount {
        mount_point: path.to_path_buf(),
        detail: format!("failed to inspect mount point: {}", e),
    })?;
    Ok(entries.next().is_none())
}
