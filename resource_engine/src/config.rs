//! Configuration system.
//!
//! Loads loader/driver configuration from JSON strings/files.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::state::ResolveMode;

/// Configuration for a loader and the frame loop that drains it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Directory stock resource paths are relative to.
    #[serde(default = "default_asset_root")]
    pub asset_root: String,
    /// Package manifest listing the resources to register.
    #[serde(default = "default_manifest")]
    pub manifest: String,
    /// Frame rate of the drain loop.
    #[serde(default = "default_frame_hz")]
    pub frame_hz: u32,
    /// Frames to run before giving up on unfinished resources.
    #[serde(default = "default_max_frames")]
    pub max_frames: u32,
    /// How resources are first requested.
    #[serde(default)]
    pub mode: ResolveMode,
}

fn default_asset_root() -> String {
    "assets".to_string()
}

fn default_manifest() -> String {
    "manifest.json".to_string()
}

fn default_frame_hz() -> u32 {
    60
}

fn default_max_frames() -> u32 {
    600
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            asset_root: default_asset_root(),
            manifest: default_manifest(),
            frame_hz: default_frame_hz(),
            max_frames: default_max_frames(),
            mode: ResolveMode::Deferred,
        }
    }
}

impl LoaderConfig {
    /// Parses config from JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    /// Reads and parses a JSON config file.
    pub fn from_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("parse config {}", path.display()))
    }
}
