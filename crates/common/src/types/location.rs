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

//! Source locations, method signatures and call-stack frames.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::ObjectId;

/// Identity of a thread in the debuggee.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::From,
)]
pub struct ThreadId(pub u64);

/// A method, identified by its declaring type, name and signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MethodSignature {
    /// Fully qualified name of the declaring type
    pub declaring_type: String,
    /// Bare method name
    pub name: String,
    /// Parameter/return descriptor, e.g. `(II)V`
    pub signature: String,
}

impl MethodSignature {
    /// Creates a method signature.
    pub fn new(
        declaring_type: impl Into<String>,
        name: impl Into<String>,
        signature: impl Into<String>,
    ) -> Self {
        Self { declaring_type: declaring_type.into(), name: name.into(), signature: signature.into() }
    }

    /// `Type.method`, without the descriptor.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.declaring_type, self.name)
    }

    /// Whether `name` designates this method, either bare or qualified.
    pub fn matches_name(&self, name: &str) -> bool {
        self.name == name || self.qualified_name() == name
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}{}", self.declaring_type, self.name, self.signature)
    }
}

/// A paused position in the source: file, line and enclosing method.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CodeLocation {
    /// Source file name, e.g. `Point.java`
    pub file: String,
    /// Line number in the source file (1-based)
    pub line: usize,
    /// Enclosing method
    pub method: MethodSignature,
}

impl CodeLocation {
    /// Creates a code location.
    pub fn new(file: impl Into<String>, line: usize, method: MethodSignature) -> Self {
        Self { file: file.into(), line, method }
    }

    /// Returns true if this location is on `file:line`.
    pub fn is_at(&self, file: &str, line: usize) -> bool {
        self.line == line && self.file == file
    }
}

impl fmt::Display for CodeLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Descriptor of one call-stack frame, captured by value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameDescriptor {
    /// Declaring type of the frame's method
    pub declaring_type: String,
    /// Bare method name
    pub method: String,
    /// Current line in the frame
    pub line: usize,
    /// The receiver (`this`) of the frame, `None` for static methods
    #[serde(default)]
    pub receiver: Option<ObjectId>,
}

impl FrameDescriptor {
    /// Creates a frame descriptor without a receiver.
    pub fn new(declaring_type: impl Into<String>, method: impl Into<String>, line: usize) -> Self {
        Self { declaring_type: declaring_type.into(), method: method.into(), line, receiver: None }
    }

    /// Sets the receiver of this frame.
    pub fn with_receiver(mut self, receiver: ObjectId) -> Self {
        self.receiver = Some(receiver);
        self
    }
}

impl fmt::Display for FrameDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}() line {}", self.declaring_type, self.method, self.line)
    }
}
