//! Boot artifact extraction from a mounted ISO tree.

use std::fs;
use std::path::Path;

use crate::config::BootFiles;
use crate::error::{ProvisionError, Result};
use crate::report::Reporter;

/// Destination filename for the kernel.
pub const KERNEL_NAME: &str = "vmlinuz";

/// Destination filename for the initial ramdisk.
pub const INITRD_NAME: &str = "initrd";

/// Copy the declared kernel and initrd out of the mounted tree into the
/// TFTP image directory.
///
/// Destinations are always overwritten so a re-run reflects the current
/// target configuration. The first failing file aborts the copy.
pub fn copy_boot_files(
    reporter: &dyn Reporter,
    mount_point: &Path,
    dest_dir: &Path,
    boot_files: &BootFiles,
) -> Result<()> {
    let copies = [
        (mount_point.join(&boot_files.vmlinuz), dest_dir.join(KERNEL_NAME)),
        (mount_point.join(&boot_files.initrd), dest_dir.join(INITRD_NAME)),
    ];

    for (src, dest) in &copies {
        reporter.info(&format!("Copying {} to {}", src.display(), dest.display()));
        fs::copy(src, dest).map_err(|e| ProvisionError::Copy {
            src: src.clone(),
            dest: dest.clone(),
            source: e,
        })?;
    }

    Ok(())
}
