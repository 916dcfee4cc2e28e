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

//! Read-only queries over one snapshot.
//!
//! Everything here works on the denormalized snapshot alone, so the same queries
//! answer identically while recording and during replay.

use rewind_common::{
    types::{
        CapturedValue, ExecutionSnapshot, FieldValue, FrameDescriptor, MethodSignature, ObjectId,
        ObjectNode,
    },
    DebugError, DebugResult,
};

/// The caller's receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sender<'a> {
    /// Caller frame
    pub frame: &'a FrameDescriptor,
    /// Receiver of the caller frame
    pub receiver: ObjectId,
    /// Receiver contents, if they were captured
    pub object: Option<&'a ObjectNode>,
}

/// Inspection queries over a snapshot.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotInspector<'a> {
    snapshot: &'a ExecutionSnapshot,
}

impl<'a> SnapshotInspector<'a> {
    /// Inspects `snapshot`.
    pub fn new(snapshot: &'a ExecutionSnapshot) -> Self {
        Self { snapshot }
    }

    /// The inspected snapshot.
    pub fn snapshot(&self) -> &'a ExecutionSnapshot {
        self.snapshot
    }

    /// Innermost frame.
    pub fn frame(&self) -> DebugResult<&'a FrameDescriptor> {
        self.snapshot
            .call_stack()
            .first()
            .ok_or_else(|| DebugError::invalid_state("No frame was captured"))
    }

    /// Call stack, innermost frame first.
    pub fn stack(&self) -> &'a [FrameDescriptor] {
        self.snapshot.call_stack()
    }

    /// Every captured local, sorted by name.
    pub fn temporaries(&self) -> Vec<(&'a str, &'a CapturedValue)> {
        self.snapshot.variables().iter().map(|(name, value)| (name.as_str(), value)).collect()
    }

    /// Captured locals that are arguments of the method, in declaration order.
    pub fn arguments(&self) -> Vec<(&'a str, &'a CapturedValue)> {
        self.snapshot
            .arguments()
            .iter()
            .filter_map(|name| self.snapshot.variable(name).map(|value| (name.as_str(), value)))
            .collect()
    }

    /// Signature of the executing method.
    pub fn method(&self) -> &'a MethodSignature {
        self.snapshot.method()
    }

    /// Receiver (`this`) of the executing method.
    pub fn receiver(&self) -> DebugResult<&'a CapturedValue> {
        self.snapshot
            .receiver()
            .ok_or_else(|| DebugError::not_found("No receiver (static method)"))
    }

    /// Fields of the receiver, from the captured object graph.
    pub fn receiver_fields(&self) -> DebugResult<&'a [FieldValue]> {
        let receiver = self.receiver()?;
        receiver
            .object_id()
            .and_then(|id| self.snapshot.objects().get(id))
            .map(|node| node.fields.as_slice())
            .ok_or_else(|| DebugError::not_found(format!("Fields of {receiver} were not captured")))
    }

    /// Receiver of the calling frame.
    pub fn sender(&self) -> DebugResult<Sender<'a>> {
        let frame = self
            .snapshot
            .call_stack()
            .get(1)
            .ok_or_else(|| DebugError::not_found("No sender (top-level call)"))?;
        let receiver =
            frame.receiver.ok_or_else(|| DebugError::not_found("Sender is a static context"))?;

        Ok(Sender { frame, receiver, object: self.snapshot.objects().get(receiver) })
    }

    /// Program output up to this snapshot.
    pub fn output(&self) -> &'a str {
        self.snapshot.output()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rewind_common::types::{CapturedState, CapturedVariable, CodeLocation, ObjectGraph};

    fn point(x: i32) -> ObjectNode {
        ObjectNode::new("Point", vec![FieldValue::new("x", "int", CapturedValue::primitive(x))])
    }

    fn snapshot(receiver: bool, caller_receiver: Option<u64>) -> ExecutionSnapshot {
        let method = MethodSignature::new("Point", "move", "(II)V");
        let mut callee = FrameDescriptor::new("Point", "move", 7);
        if receiver {
            callee = callee.with_receiver(ObjectId(1));
        }
        let mut caller = FrameDescriptor::new("Main", "main", 3);
        if let Some(id) = caller_receiver {
            caller = caller.with_receiver(ObjectId(id));
        }

        let objects = ObjectGraph::collect([ObjectId(1), ObjectId(2)], 8, |id| {
            Ok::<_, DebugError>(Some(point(id.0 as i32)))
        })
        .unwrap();
        let state = CapturedState {
            variables: vec![
                CapturedVariable::local("tmp", "int", CapturedValue::primitive(0)),
                CapturedVariable::argument("dy", "int", CapturedValue::primitive(2)),
                CapturedVariable::argument("dx", "int", CapturedValue::primitive(1)),
            ],
            call_stack: vec![callee, caller],
            receiver: receiver.then(|| CapturedValue::reference("Point", 1)),
            objects,
            ..Default::default()
        };
        ExecutionSnapshot::new(4, CodeLocation::new("Point.java", 7, method), state, "moved\n")
    }

    #[test]
    fn test_frame_stack_and_method() {
        let snapshot = snapshot(true, None);
        let inspector = SnapshotInspector::new(&snapshot);

        assert_eq!(inspector.frame().unwrap().to_string(), "Point.move() line 7");
        assert_eq!(inspector.stack().len(), 2);
        assert_eq!(inspector.method().to_string(), "Point.move(II)V");
        assert_eq!(inspector.output(), "moved\n");
    }

    #[test]
    fn test_temporaries_and_arguments() {
        let snapshot = snapshot(true, None);
        let inspector = SnapshotInspector::new(&snapshot);

        let names = inspector.temporaries().iter().map(|(name, _)| *name).collect::<Vec<_>>();
        assert_eq!(names, vec!["dx", "dy", "tmp"]);
        let args = inspector.arguments().iter().map(|(name, _)| *name).collect::<Vec<_>>();
        assert_eq!(args, vec!["dy", "dx"]);
    }

    #[test]
    fn test_receiver_and_fields() {
        let snapshot = snapshot(true, None);
        let inspector = SnapshotInspector::new(&snapshot);
        assert_eq!(inspector.receiver().unwrap().to_string(), "Point@1");
        assert_eq!(inspector.receiver_fields().unwrap()[0].name, "x");

        let snapshot = self::snapshot(false, None);
        let err = SnapshotInspector::new(&snapshot).receiver().unwrap_err();
        assert_eq!(err.message(), "No receiver (static method)");
    }

    #[test]
    fn test_sender() {
        let snapshot = snapshot(true, Some(2));
        let sender = SnapshotInspector::new(&snapshot).sender().unwrap();
        assert_eq!(sender.receiver, ObjectId(2));
        assert!(sender.object.is_some());

        let snapshot = self::snapshot(true, None);
        let err = SnapshotInspector::new(&snapshot).sender().unwrap_err();
        assert_eq!(err.message(), "Sender is a static context");
    }
}
