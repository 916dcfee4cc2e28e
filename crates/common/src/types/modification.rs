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

//! Recorded variable changes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{MethodSignature, SnapshotId};

/// Rendering of the old value of the first modification in a history.
pub const UNSET: &str = "<unset>";

/// Scope-qualified variable identity: the variable name plus the signature of the
/// method it lives in.
///
/// Two locals named `x` in `Point.move` and `Point.distanceFromOrigin` have different
/// context keys, so their histories never mix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContextKey {
    /// Bare variable name
    pub variable: String,
    /// Rendered signature of the enclosing method
    pub method: String,
}

impl ContextKey {
    /// Creates the context key of `variable` inside `method`.
    pub fn new(variable: impl Into<String>, method: &MethodSignature) -> Self {
        Self { variable: variable.into(), method: method.to_string() }
    }
}

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.variable, self.method)
    }
}

/// One observed change of a variable's value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableModification {
    /// Bare variable name
    pub variable: String,
    /// Scope the variable belongs to
    pub context: ContextKey,
    /// Previous value, `None` for the first observation
    pub old_value: Option<String>,
    /// Value observed at `snapshot_id`
    pub new_value: String,
    /// Snapshot at which the change was observed
    pub snapshot_id: SnapshotId,
    /// Line of that snapshot
    pub line: usize,
    /// Bare name of the enclosing method
    pub method: String,
}

impl VariableModification {
    /// Old value rendered for display, [`UNSET`] for the first observation.
    pub fn old_value_display(&self) -> &str {
        self.old_value.as_deref().unwrap_or(UNSET)
    }

    /// Returns true if this is the first observation of the variable.
    pub fn is_initial(&self) -> bool {
        self.old_value.is_none()
    }
}

impl fmt::Display for VariableModification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} -> {} (line {} in {}())",
            self.variable,
            self.old_value_display(),
            self.new_value,
            self.line,
            self.method
        )
    }
}
