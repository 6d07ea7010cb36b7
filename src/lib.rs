//! Pxeforge library exports.
//!
//! The binary is thin; everything it calls lives here so integration tests
//! can drive the pipeline with injected reporters and mounters.

pub mod artifacts;
pub mod config;
pub mod download;
pub mod error;
pub mod host;
pub mod menu;
pub mod mount;
pub mod process;
pub mod provision;
pub mod report;
pub mod server;
