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

//! Approximate method-call index.
//!
//! A call is assumed to start wherever the call-stack depth grows compared to the
//! previous snapshot. Sibling calls at equal depth (a call that returns between two
//! pauses followed by another call at the same depth) are not detected, and recursion
//! is only seen as deeper frames. This is a navigation aid, not a call graph.

use std::fmt;

use rewind_common::types::{ExecutionSnapshot, SnapshotId};
use serde::{Deserialize, Serialize};

/// A call detected at a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodCallRecord {
    /// Snapshot where the call was first seen
    pub snapshot_id: SnapshotId,
    /// Bare method name
    pub method: String,
    /// Declaring type of the method
    pub declaring_type: String,
    /// Call-stack depth at that snapshot
    pub depth: usize,
    /// Line of that snapshot
    pub line: usize,
}

impl MethodCallRecord {
    /// Whether the call targets `name`, bare (`move`) or qualified (`Point.move`).
    pub fn matches_name(&self, name: &str) -> bool {
        match name.rsplit_once('.') {
            Some((declaring_type, method)) => {
                self.declaring_type == declaring_type && self.method == method
            }
            None => self.method == name,
        }
    }
}

impl fmt::Display for MethodCallRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {}.{}() line {} (depth {})",
            self.snapshot_id, self.declaring_type, self.method, self.line, self.depth
        )
    }
}

/// Ordered list of detected calls.
#[derive(Debug, Clone, Default)]
pub struct CallIndex {
    records: Vec<MethodCallRecord>,
    last_depth: usize,
}

impl CallIndex {
    /// Feeds the next snapshot, returning the call record it opened, if any.
    pub fn observe(&mut self, snapshot: &ExecutionSnapshot) -> Option<&MethodCallRecord> {
        let depth = snapshot.depth();
        let previous = std::mem::replace(&mut self.last_depth, depth);
        if depth <= previous {
            return None;
        }

        self.records.push(MethodCallRecord {
            snapshot_id: snapshot.id(),
            method: snapshot.method().name.clone(),
            declaring_type: snapshot.method().declaring_type.clone(),
            depth,
            line: snapshot.line(),
        });
        self.records.last()
    }

    /// All records.
    pub fn records(&self) -> &[MethodCallRecord] {
        &self.records
    }

    /// Records opened at or before `snapshot_id`.
    pub fn up_to(&self, snapshot_id: SnapshotId) -> &[MethodCallRecord] {
        let end = self.records.partition_point(|r| r.snapshot_id <= snapshot_id);
        &self.records[..end]
    }

    /// The record opened exactly at `snapshot_id`.
    pub fn opened_at(&self, snapshot_id: SnapshotId) -> Option<&MethodCallRecord> {
        self.records
            .binary_search_by_key(&snapshot_id, |r| r.snapshot_id)
            .ok()
            .map(|index| &self.records[index])
    }
}
