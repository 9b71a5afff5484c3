// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The rooted configuration document and its `FNS-ACTIVE` overlay
//! (`spec.md` §6).

use figment::providers::{Format, Json, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::LifecycleError;

/// Name of the environment variable that selects an overlay file, e.g.
/// `FNS-ACTIVE=local` layers `fns-local.yaml` on top of the base document.
pub const ACTIVE_OVERLAY_VAR: &str = "FNS-ACTIVE";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: default_log_level(), json: false }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    #[serde(default = "default_node_id")]
    pub node_id: String,
    /// HMAC secret used by `fns-wire` to sign and verify proxy envelopes.
    #[serde(default)]
    pub hmac_secret: String,
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self { node_id: default_node_id(), hmac_secret: String::new(), max_workers: default_max_workers() }
    }
}

fn default_node_id() -> String {
    format!("node-{}", nanoid::nanoid!(8))
}

fn default_max_workers() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1).saturating_mul(32_000)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_shutdown_deadline_ms")]
    pub shutdown_deadline_ms: u64,
}

impl TransportConfig {
    pub fn shutdown_deadline(&self) -> Duration {
        Duration::from_millis(self.shutdown_deadline_ms)
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self { bind: default_bind(), shutdown_deadline_ms: default_shutdown_deadline_ms() }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_shutdown_deadline_ms() -> u64 {
    5_000
}

/// The rooted configuration document (`spec.md` §6): `name`, `version`,
/// `log`, `cluster`, `transport`, `services` (keyed by service name, each
/// subtree opaque to the core).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub cluster: ClusterConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub services: HashMap<String, serde_json::Value>,
}

fn default_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

impl Config {
    /// Loads the rooted document at `path`, then merges an overlay selected
    /// by `FNS-ACTIVE` if that file exists alongside it (`spec.md` §6).
    /// Missing overlay files are not an error — the base document alone is
    /// a complete, valid configuration.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LifecycleError> {
        let base_path = path.as_ref();
        let mut figment = merge_file(Figment::new(), base_path);

        if let Ok(active) = std::env::var(ACTIVE_OVERLAY_VAR) {
            if !active.is_empty() {
                let overlay = overlay_path(base_path, &active);
                if overlay.exists() {
                    figment = merge_file(figment, &overlay);
                }
            }
        }

        figment.extract().map_err(LifecycleError::Config)
    }
}

fn merge_file(figment: Figment, path: &Path) -> Figment {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml") | Some("yml") => figment.merge(Yaml::file(path)),
        _ => figment.merge(Json::file(path)),
    }
}

/// `fns.yaml` + `FNS-ACTIVE=local` -> `fns-local.yaml`, in the same directory.
fn overlay_path(base: &Path, active: &str) -> PathBuf {
    let stem = base.file_stem().and_then(|s| s.to_str()).unwrap_or("fns");
    let ext = base.extension().and_then(|e| e.to_str()).unwrap_or("yaml");
    base.with_file_name(format!("{stem}-{active}.{ext}"))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
