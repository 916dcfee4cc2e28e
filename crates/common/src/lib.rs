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

//! Rewind Common - Shared functionality for Rewind components
//!
//! This crate holds the data model shared by the recording engine and its front ends:
//! captured values, code locations, execution snapshots, variable modifications and
//! breakpoints. It also provides the error taxonomy, engine configuration and the
//! logging setup used across the workspace.

/// Data types captured from paused execution points and recorded on the timeline
pub mod types;

/// Engine configuration loaded from TOML or built programmatically
pub mod config;
/// Error taxonomy returned by every core operation
pub mod error;
/// Logging setup and utilities for consistent logging across Rewind components
pub mod logging;

pub use config::*;
pub use error::*;
pub use logging::*;
