//! Backend selection
//!
//! Probes the host in fixed priority order and returns the first backend
//! that can run. Selection is re-run on every fresh capture start so a
//! camera that appears or disappears between sessions is picked up without
//! a restart of the server.

use std::path::PathBuf;

use crate::error::{Result, StreamError};

use super::probe;
use super::{CaptureBackend, StartOptions};

/// Source of capture backends
///
/// The supervisor re-selects through this trait on crash recovery, and the
/// control plane uses it for explicit start requests and the status report.
pub trait Selector: Send + Sync + 'static {
    /// Pick the highest-priority available backend
    fn select(&self, opts: StartOptions) -> Result<CaptureBackend>;

    /// Whether camera hardware is visible right now (status reporting only)
    fn camera_present(&self) -> bool;
}

/// Selector configuration
#[derive(Debug, Clone)]
pub struct SelectorConfig {
    /// Hardware video device node probed first
    pub device_node: PathBuf,
    /// High-performance capture utility probed second
    pub hardware_util: String,
    /// Legacy capture utility probed last
    pub legacy_util: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            device_node: PathBuf::from("/dev/video0"),
            hardware_util: "libcamera-vid".to_string(),
            legacy_util: "raspivid".to_string(),
        }
    }
}

impl SelectorConfig {
    /// Set the device node path
    pub fn device_node(mut self, path: impl Into<PathBuf>) -> Self {
        self.device_node = path.into();
        self
    }

    /// Set the high-performance capture utility name
    pub fn hardware_util(mut self, name: impl Into<String>) -> Self {
        self.hardware_util = name.into();
        self
    }

    /// Set the legacy capture utility name
    pub fn legacy_util(mut self, name: impl Into<String>) -> Self {
        self.legacy_util = name.into();
        self
    }
}

/// Probing selector over the host filesystem and `PATH`
pub struct BackendSelector {
    config: SelectorConfig,
}

impl BackendSelector {
    /// Create a selector with default probe targets
    pub fn new() -> Self {
        Self::with_config(SelectorConfig::default())
    }

    /// Create a selector with custom probe targets
    pub fn with_config(config: SelectorConfig) -> Self {
        Self { config }
    }
}

impl Default for BackendSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl Selector for BackendSelector {
    fn select(&self, opts: StartOptions) -> Result<CaptureBackend> {
        if probe::device_node_present(&self.config.device_node) {
            tracing::debug!(device = %self.config.device_node.display(), "Camera device node found");
            return Ok(CaptureBackend::hardware_encoder(opts));
        }

        if probe::binary_on_path(&self.config.hardware_util) {
            tracing::debug!(util = %self.config.hardware_util, "Capture utility found");
            return Ok(CaptureBackend::software_transcode(opts));
        }

        if probe::binary_on_path(&self.config.legacy_util) {
            tracing::debug!(util = %self.config.legacy_util, "Legacy capture utility found");
            return Ok(CaptureBackend::legacy_capture(opts));
        }

        tracing::warn!("No camera backend available");
        Err(StreamError::NoCameraAvailable)
    }

    fn camera_present(&self) -> bool {
        probe::device_node_present(&self.config.device_node)
    }
}
