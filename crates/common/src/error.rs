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

//! Error taxonomy for the recording and replay engine.
//!
//! Every core operation returns a [`DebugResult`]. None of these conditions abort the
//! process: the front end receives the error and decides how to surface it. Losing the
//! live source is deliberately absent from this list, since it is the expected trigger
//! for switching a session into replay.
//!
//! Each variant carries a human-readable message and maps to a stable numeric code in
//! [`error_codes`], so clients can branch on the kind of failure without matching on
//! message text.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type returned by engine operations.
pub type DebugResult<T> = Result<T, DebugError>;

/// Failure of a debugging operation.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum DebugError {
    /// Unknown snapshot id, unresolved `file:line`, or unknown variable/method name.
    #[error("{0}")]
    NotFound(String),
    /// The operation is not valid in the current phase or position.
    #[error("{0}")]
    InvalidState(String),
    /// The live source has no symbol or line metadata for the requested frame.
    #[error("{0}")]
    MissingDebugInfo(String),
}

impl DebugError {
    /// Creates a [`DebugError::NotFound`] error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Creates a [`DebugError::InvalidState`] error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    /// Creates a [`DebugError::MissingDebugInfo`] error.
    pub fn missing_debug_info(message: impl Into<String>) -> Self {
        Self::MissingDebugInfo(message.into())
    }

    /// Numeric code of this error, see [`error_codes`].
    pub fn code(&self) -> i32 {
        match self {
            Self::NotFound(_) => error_codes::NOT_FOUND,
            Self::InvalidState(_) => error_codes::INVALID_STATE,
            Self::MissingDebugInfo(_) => error_codes::MISSING_DEBUG_INFO,
        }
    }

    /// The message carried by this error.
    pub fn message(&self) -> &str {
        match self {
            Self::NotFound(msg) | Self::InvalidState(msg) | Self::MissingDebugInfo(msg) => msg,
        }
    }

    /// Returns true for [`DebugError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns true for [`DebugError::InvalidState`].
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Self::InvalidState(_))
    }

    /// Returns true for [`DebugError::MissingDebugInfo`].
    pub fn is_missing_debug_info(&self) -> bool {
        matches!(self, Self::MissingDebugInfo(_))
    }
}

/// Error codes for consistent error reporting to front ends.
///
/// Codes start at -34000 so they never collide with the standard JSON-RPC 2.0 range
/// when a front end forwards them over such a transport.
pub mod error_codes {
    /// A snapshot, location, variable or method could not be found
    pub const NOT_FOUND: i32 = -34001;
    /// The operation is invalid for the current phase or cursor position
    pub const INVALID_STATE: i32 = -34002;
    /// No symbol or line metadata is available from the live source
    pub const MISSING_DEBUG_INFO: i32 = -34003;
}
