//! Per-host HTTP config service.
//!
//! Two endpoints: `POST /generate-config` materializes the PXELinux entry
//! and dnsmasq stanza for one host, `GET /list-isos` enumerates what the
//! pipeline has provisioned. Both are thin wrappers over `host`; all state
//! is the loaded config plus a reporter.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::Config;
use crate::host::{self, HostConfig};
use crate::report::Reporter;

/// Shared state for the HTTP handlers.
pub struct AppState {
    pub config: Config,
    pub reporter: Arc<dyn Reporter>,
}

/// Build the service router.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/generate-config", post(generate_config))
        .route("/list-isos", get(list_isos))
        .with_state(state)
}

async fn generate_config(
    State(state): State<Arc<AppState>>,
    Json(host): Json<HostConfig>,
) -> impl IntoResponse {
    state.reporter.info(&format!(
        "Processing configuration for host {} (MAC {})",
        host.hostname, host.mac_address
    ));

    if host.find_iso(&state.config).is_none() {
        state.reporter.warn(&format!(
            "required ISO not found for host {}: {}/{}/{}",
            host.hostname, host.name, host.codename, host.iso_file
        ));
        return (
            StatusCode::NOT_FOUND,
            Json(json!({
                "status": "error",
                "message": format!("required file not found: {}", host.iso_file),
            })),
        );
    }

    match host::generate_host_configs(state.reporter.as_ref(), &state.config, &host) {
        Ok(files) => (
            StatusCode::OK,
            Json(json!({
                "status": "success",
                "message": "Configuration files generated successfully",
                "files": files,
            })),
        ),
        Err(e) => {
            state
                .reporter
                .warn(&format!("failed to generate config for {}: {}", host.hostname, e));
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "status": "error",
                    "message": e.to_string(),
                })),
            )
        }
    }
}

async fn list_isos(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match host::list_isos(&state.config.iso_images_dir()) {
        Ok(isos) => (
            StatusCode::OK,
            Json(json!({
                "status": "success",
                "isos": isos,
            })),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "status": "error",
                "message": e.to_string(),
            })),
        ),
    }
}

/// Bind and serve until the process is stopped.
pub async fn serve(
    reporter: Arc<dyn Reporter>,
    config: Config,
    addr: SocketAddr,
) -> anyhow::Result<()> {
    reporter.info(&format!("Serving host config API on {}", addr));
    reporter.info(&format!("TFTP boot directory: {}", config.tftpboot_dir.display()));
    reporter.info(&format!("ISO directory: {}", config.iso_dir.display()));

    let state = Arc::new(AppState { config, reporter });
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state)).await?;
    Ok(())
}
