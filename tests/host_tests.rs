//! Per-host config generation and the HTTP service boundary.

mod helpers;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use helpers::{debian_target, TestEnv};
use pxeforge::host::{self, HostConfig};
use pxeforge::report::MemoryReporter;
use pxeforge::server::{app, AppState};
use serde_json::Value;
use std::fs;
use std::sync::Arc;
use tower::ServiceExt;

fn sample_host() -> HostConfig {
    HostConfig {
        mac_address: "AA:BB:CC:00:11:22".to_string(),
        ip_address: "192.168.10.42".to_string(),
        hostname: "node01".to_string(),
        name: "debian".to_string(),
        codename: "bookworm".to_string(),
        iso_file: "debian-12.5.iso".to_string(),
    }
}

/// Provision the debian ISO into the archive tree so host requests resolve.
fn place_iso(env: &TestEnv) {
    let dir = env.iso_dir.join("images/debian/bookworm/12.5");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("debian-12.5.iso"), b"iso").unwrap();
}

#[test]
fn test_generate_host_configs_writes_both_files() {
    let env = TestEnv::new();
    let config = env.config(vec![debian_target(true)]);
    let reporter = MemoryReporter::new();

    let files = host::generate_host_configs(&reporter, &config, &sample_host()).unwrap();

    assert_eq!(
        files.pxelinux_config,
        env.tftpboot_dir.join("bios/pxelinux.cfg/01-aa-bb-cc-00-11-22")
    );
    assert_eq!(
        files.dnsmasq_config,
        env.dnsmasq_dir.join("fixip-node01-AA-BB-CC-00-11-22.conf")
    );

    let pxelinux = fs::read_to_string(&files.pxelinux_config).unwrap();
    assert!(pxelinux.contains("images/debian/bookworm/vmlinuz"));
    assert!(pxelinux.contains("debian-12.5.iso"));

    let dnsmasq = fs::read_to_string(&files.dnsmasq_config).unwrap();
    assert!(dnsmasq.contains("dhcp-host=AA:BB:CC:00:11:22,192.168.10.42,node01"));
}

#[test]
fn test_find_iso_descends_into_version_dir() {
    let env = TestEnv::new();
    let config = env.config(vec![debian_target(true)]);
    place_iso(&env);

    let found = sample_host().find_iso(&config).unwrap();
    assert!(found.ends_with("debian/bookworm/12.5/debian-12.5.iso"));

    let mut missing = sample_host();
    missing.iso_file = "other.iso".to_string();
    assert!(missing.find_iso(&config).is_none());
}

#[tokio::test]
async fn test_generate_config_endpoint() {
    let env = TestEnv::new();
    let config = env.config(vec![debian_target(true)]);
    place_iso(&env);

    let state = Arc::new(AppState {
        config,
        reporter: Arc::new(MemoryReporter::new()),
    });

    let request = Request::builder()
        .method("POST")
        .uri("/generate-config")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&sample_host()).unwrap()))
        .unwrap();
    let response = app(state).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["status"], "success");

    let written = env.tftpboot_dir.join("bios/pxelinux.cfg/01-aa-bb-cc-00-11-22");
    assert!(written.is_file());
}

#[tokio::test]
async fn test_generate_config_missing_iso_is_404() {
    let env = TestEnv::new();
    let config = env.config(vec![debian_target(true)]);
    // No ISO placed.

    let state = Arc::new(AppState {
        config,
        reporter: Arc::new(MemoryReporter::new()),
    });

    let request = Request::builder()
        .method("POST")
        .uri("/generate-config")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&sample_host()).unwrap()))
        .unwrap();
    let response = app(state).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(!env
        .tftpboot_dir
        .join("bios/pxelinux.cfg/01-aa-bb-cc-00-11-22")
        .exists());
}

#[tokio::test]
async fn test_list_isos_endpoint() {
    let env = TestEnv::new();
    let config = env.config(vec![debian_target(true)]);
    place_iso(&env);

    let state = Arc::new(AppState {
        config,
        reporter: Arc::new(MemoryReporter::new()),
    });

    let request = Request::builder()
        .uri("/list-isos")
        .body(Body::empty())
        .unwrap();
    let response = app(state).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["status"], "success");
    assert_eq!(body["isos"][0]["name"], "debian");
    assert_eq!(body["isos"][0]["codename"], "bookworm");
    assert_eq!(body["isos"][0]["filename"], "debian-12.5.iso");
}
