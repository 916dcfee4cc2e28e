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

//! Immutable capture of one paused execution point.
//!
//! A snapshot denormalizes everything replay needs: variable values, call-stack
//! descriptors, the receiver, reachable objects and the program output so far. Once a
//! snapshot exists, nothing about it requires contacting the live process again.
//!
//! Fields are private and only exposed through shared references, so a snapshot cannot
//! be changed after it has been handed to the timeline.

use std::{collections::BTreeMap, fmt};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{
    CapturedValue, CapturedVariable, CodeLocation, FrameDescriptor, MethodSignature, ObjectGraph,
    ThreadId,
};

/// Position of a snapshot on the timeline. Ids start at 0 and increase by 1.
pub type SnapshotId = usize;

/// Frame state read from the live source at one pause, before it is assigned an id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedState {
    /// Thread the pause happened on
    pub thread: ThreadId,
    /// Locals visible in the innermost frame
    pub variables: Vec<CapturedVariable>,
    /// Call stack, innermost frame first
    pub call_stack: Vec<FrameDescriptor>,
    /// Receiver (`this`) of the innermost frame
    pub receiver: Option<CapturedValue>,
    /// Objects reachable from the variables and the receiver
    pub objects: ObjectGraph,
}

/// One recorded pause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionSnapshot {
    id: SnapshotId,
    timestamp: DateTime<Utc>,
    thread: ThreadId,
    location: CodeLocation,
    variables: BTreeMap<String, CapturedValue>,
    arguments: Vec<String>,
    call_stack: Vec<FrameDescriptor>,
    receiver: Option<CapturedValue>,
    objects: ObjectGraph,
    output: String,
}

impl ExecutionSnapshot {
    /// Builds a snapshot from a captured frame state.
    ///
    /// If two variables share a name (shadowing), the one listed first wins, matching
    /// the innermost-scope-first order sources report them in.
    pub fn new(
        id: SnapshotId,
        location: CodeLocation,
        state: CapturedState,
        output: impl Into<String>,
    ) -> Self {
        let CapturedState { thread, variables: captured, call_stack, receiver, objects } = state;

        let mut variables = BTreeMap::new();
        let mut arguments = Vec::new();
        for var in captured {
            if variables.contains_key(&var.name) {
                continue;
            }
            if var.is_argument {
                arguments.push(var.name.clone());
            }
            variables.insert(var.name, var.value);
        }

        Self {
            id,
            timestamp: Utc::now(),
            thread,
            location,
            variables,
            arguments,
            call_stack,
            receiver,
            objects,
            output: output.into(),
        }
    }

    /// Sequential id of this snapshot.
    pub fn id(&self) -> SnapshotId {
        self.id
    }

    /// Wall-clock time the snapshot was taken.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Thread the snapshot was taken on.
    pub fn thread(&self) -> ThreadId {
        self.thread
    }

    /// Paused location.
    pub fn location(&self) -> &CodeLocation {
        &self.location
    }

    /// Source file of the paused location.
    pub fn file(&self) -> &str {
        &self.location.file
    }

    /// Line of the paused location.
    pub fn line(&self) -> usize {
        self.location.line
    }

    /// Enclosing method of the paused location.
    pub fn method(&self) -> &MethodSignature {
        &self.location.method
    }

    /// Visible locals, by name.
    pub fn variables(&self) -> &BTreeMap<String, CapturedValue> {
        &self.variables
    }

    /// Looks up a visible local.
    pub fn variable(&self, name: &str) -> Option<&CapturedValue> {
        self.variables.get(name)
    }

    /// Visible locals rendered to strings.
    pub fn rendered_variables(&self) -> BTreeMap<&str, String> {
        self.variables.iter().map(|(name, value)| (name.as_str(), value.to_string())).collect()
    }

    /// Names of the locals that are arguments of the enclosing method.
    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    /// Call stack, innermost frame first.
    pub fn call_stack(&self) -> &[FrameDescriptor] {
        &self.call_stack
    }

    /// Call-stack depth.
    pub fn depth(&self) -> usize {
        self.call_stack.len()
    }

    /// Receiver of the innermost frame.
    pub fn receiver(&self) -> Option<&CapturedValue> {
        self.receiver.as_ref()
    }

    /// Objects captured with this snapshot.
    pub fn objects(&self) -> &ObjectGraph {
        &self.objects
    }

    /// Program output captured up to this snapshot.
    pub fn output(&self) -> &str {
        &self.output
    }
}

impl fmt::Display for ExecutionSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Snapshot #{}: {}:{} in {}()",
            self.id, self.location.file, self.location.line, self.location.method.name
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location() -> CodeLocation {
        CodeLocation::new("Point.java", 7, MethodSignature::new("Point", "move", "(II)V"))
    }

    #[test]
    fn test_snapshot_from_state() {
        let state = CapturedState {
            thread: ThreadId(1),
            variables: vec![
                CapturedVariable::argument("dx", "int", CapturedValue::primitive(2)),
                CapturedVariable::local("tmp", "int", CapturedValue::primitive(5)),
            ],
            call_stack: vec![
                FrameDescriptor::new("Point", "move", 7),
                FrameDescriptor::new("Main", "main", 3),
            ],
            receiver: Some(CapturedValue::reference("Point", 1)),
            objects: ObjectGraph::default(),
        };

        let snapshot = ExecutionSnapshot::new(4, location(), state, "hello\n");

        assert_eq!(snapshot.id(), 4);
        assert_eq!(snapshot.depth(), 2);
        assert_eq!(snapshot.arguments(), ["dx".to_string()]);
        assert_eq!(snapshot.variable("tmp"), Some(&CapturedValue::primitive(5)));
        assert_eq!(snapshot.rendered_variables().get("dx").map(String::as_str), Some("2"));
        assert_eq!(snapshot.output(), "hello\n");
        assert_eq!(snapshot.to_string(), "Snapshot #4: Point.java:7 in move()");
    }

    #[test]
    fn test_shadowed_variable_keeps_first() {
        let state = CapturedState {
            variables: vec![
                CapturedVariable::local("x", "int", CapturedValue::primitive(1)),
                CapturedVariable::local("x", "int", CapturedValue::primitive(2)),
            ],
            ..Default::default()
        };

        let snapshot = ExecutionSnapshot::new(0, location(), state, "");
        assert_eq!(snapshot.variable("x"), Some(&CapturedValue::primitive(1)));
        assert_eq!(snapshot.variables().len(), 1);
    }
}
