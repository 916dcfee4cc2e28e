// Rewind - Time-Travel Debugging Engine
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Engine configuration.
//!
//! Settings can be built in code with the `with_*` setters or loaded from a TOML file.
//! Every field has a default, so a file only needs to list what it overrides:
//!
//! ```toml
//! record_every_step = false
//! step_exclusions = ["java.*", "kotlin.*"]
//!
//! [capture]
//! object_node_budget = 64
//! ```

use std::{fs, path::Path};

use eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Type patterns excluded from single stepping unless configured otherwise.
pub const DEFAULT_STEP_EXCLUSIONS: &[&str] =
    &["java.*", "javax.*", "sun.*", "com.sun.*", "jdk.*", "oracle.*"];

/// Default number of objects copied into each snapshot's object graph.
pub const DEFAULT_OBJECT_NODE_BUDGET: usize = 256;

/// Configuration of a recording session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Declaring-type patterns that single steps never stop in. A pattern ending in
    /// `.*` matches every type under that prefix; any other pattern must match exactly.
    pub step_exclusions: Vec<String>,
    /// Re-arm a single step after every recorded pause, producing a line-by-line trace
    pub record_every_step: bool,
    /// What is copied out of the live process at each pause
    pub capture: CaptureConfig,
}

/// Controls how much state each snapshot denormalizes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Maximum number of objects copied per snapshot
    pub object_node_budget: usize,
    /// Capture the receiver (`this`) of the innermost frame
    pub capture_receiver: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            step_exclusions: DEFAULT_STEP_EXCLUSIONS.iter().map(|s| s.to_string()).collect(),
            record_every_step: true,
            capture: CaptureConfig::default(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self { object_node_budget: DEFAULT_OBJECT_NODE_BUDGET, capture_receiver: true }
    }
}

impl EngineConfig {
    /// Parses a configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).wrap_err("Failed to parse engine configuration")
    }

    /// Loads a configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_toml_str(&content)?;
        debug!(path = %path.display(), "Loaded engine configuration");
        Ok(config)
    }

    /// Serializes the configuration to TOML text.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).wrap_err("Failed to serialize engine configuration")
    }

    /// Replace the step exclusion patterns
    pub fn with_step_exclusions<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.step_exclusions = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Enable or disable line-by-line trace recording
    pub fn with_record_every_step(mut self, enabled: bool) -> Self {
        self.record_every_step = enabled;
        self
    }

    /// Set the per-snapshot object budget
    pub fn with_object_node_budget(mut self, budget: usize) -> Self {
        self.capture.object_node_budget = budget;
        self
    }

    /// Enable or disable receiver capture
    pub fn with_capture_receiver(mut self, enabled: bool) -> Self {
        self.capture.capture_receiver = enabled;
        self
    }
}
