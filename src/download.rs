//! ISO download with atomic writes and completion manifests.
//!
//! File presence alone is not trusted as "download complete": a crash
//! mid-transfer must never leave a file indistinguishable from a finished
//! one. Two mechanisms close that gap:
//!
//! - the transfer streams into `<dest>.partial` and is renamed into place
//!   only after the last byte arrived;
//! - a manifest (`<dest>.manifest.json`) recording url, size and sha256 is
//!   written after the rename. A later run skips the download only when the
//!   manifest exists, points at the same URL, and the recorded size matches
//!   the file on disk.

use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

use crate::error::{ProvisionError, Result};
use crate::report::Reporter;

/// Download configuration options.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Re-fetch even when a completed download is present.
    pub force: bool,
    /// Per-request timeout. None for large transfers.
    pub timeout: Option<Duration>,
    /// Retry attempts for transient failures.
    pub retries: u32,
    /// Delay before the first retry; doubles each attempt.
    pub retry_delay: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            force: false,
            timeout: None,
            retries: 3,
            retry_delay: Duration::from_secs(2),
        }
    }
}

/// What `fetch` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Transferred from the remote.
    Downloaded,
    /// Completed download already present; no transfer performed.
    SkippedExisting,
}

/// Completion marker written next to a finished download.
#[derive(Debug, Serialize, Deserialize)]
pub struct DownloadManifest {
    pub url: String,
    pub size: u64,
    pub sha256: String,
}

/// Path of the completion manifest for a download destination.
pub fn manifest_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".manifest.json");
    dest.with_file_name(name)
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".partial");
    dest.with_file_name(name)
}

/// True when `dest` holds a completed download of `url`.
fn is_complete(url: &str, dest: &Path) -> bool {
    let Ok(meta) = fs::metadata(dest) else {
        return false;
    };
    let Ok(content) = fs::read_to_string(manifest_path(dest)) else {
        return false;
    };
    let Ok(manifest) = serde_json::from_str::<DownloadManifest>(&content) else {
        return false;
    };
    manifest.url == url && manifest.size == meta.len()
}

/// Fetch `url` to `dest`, skipping the transfer when a completed download is
/// already present and `force` is off.
pub async fn fetch(
    reporter: &dyn Reporter,
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
    options: &FetchOptions,
) -> Result<FetchOutcome> {
    if !options.force && is_complete(url, dest) {
        reporter.info(&format!("ISO already present at {}", dest.display()));
        return Ok(FetchOutcome::SkippedExisting);
    }

    reporter.info(&format!("Downloading {}", url));

    let mut attempt = 0;
    loop {
        if attempt > 0 {
            let delay = options.retry_delay * (1 << (attempt - 1).min(4));
            reporter.warn(&format!(
                "download of {} failed, retry {}/{} in {:?}",
                url, attempt, options.retries, delay
            ));
            tokio::time::sleep(delay).await;
        }

        match fetch_attempt(client, url, dest, options).await {
            Ok(()) => break,
            Err(e) => {
                attempt += 1;
                if attempt > options.retries || !is_retryable(&e) {
                    return Err(ProvisionError::Download {
                        url: url.to_string(),
                        reason: e,
                    });
                }
            }
        }
    }

    reporter.info(&format!("Downloaded to {}", dest.display()));
    Ok(FetchOutcome::Downloaded)
}

/// Single transfer attempt. Returns the failure reason as text so the caller
/// can decide on retries.
async fn fetch_attempt(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
    options: &FetchOptions,
) -> std::result::Result<(), String> {
    let mut request = client.get(url);
    if let Some(timeout) = options.timeout {
        request = request.timeout(timeout);
    }

    let response = request
        .send()
        .await
        .map_err(|e| format!("request failed: {}", e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(format!(
            "HTTP {} {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("")
        ));
    }

    let partial = partial_path(dest);
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| format!("failed to create {}: {}", parent.display(), e))?;
    }
    let file = tokio::fs::File::create(&partial)
        .await
        .map_err(|e| format!("failed to create {}: {}", partial.display(), e))?;
    let mut writer = tokio::io::BufWriter::new(file);

    let mut hasher = Sha256::new();
    let mut size: u64 = 0;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| format!("failed to read response body: {}", e))?;
        hasher.update(&chunk);
        size += chunk.len() as u64;
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| format!("failed to write {}: {}", partial.display(), e))?;
    }
    writer
        .flush()
        .await
        .map_err(|e| format!("failed to flush {}: {}", partial.display(), e))?;
    drop(writer);

    // Only a fully transferred file ever appears at the destination.
    fs::rename(&partial, dest)
        .map_err(|e| format!("failed to move download into place: {}", e))?;

    let manifest = DownloadManifest {
        url: url.to_string(),
        size,
        sha256: format!("{:x}", hasher.finalize()),
    };
    let content = serde_json::to_string_pretty(&manifest)
        .map_err(|e| format!("failed to encode manifest: {}", e))?;
    fs::write(manifest_path(dest), content)
        .map_err(|e| format!("failed to write manifest: {}", e))?;

    Ok(())
}

fn is_retryable(reason: &str) -> bool {
    let msg = reason.to_lowercase();
    msg.contains("timeout")
        || msg.contains("connection reset")
        || msg.contains("connection refused")
        || msg.contains("temporarily unavailable")
        || msg.contains("502")
        || msg.contains("503")
        || msg.contains("504")
}
