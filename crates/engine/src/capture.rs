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

//! Copies frame state out of a paused program.

use itertools::Itertools;
use rewind_common::{
    types::{CapturedState, ObjectGraph, ThreadId},
    CaptureConfig, DebugResult,
};
use tracing::warn;

use crate::source::LiveDebugSource;

/// Reads everything a snapshot needs from the suspended `thread`.
///
/// A frame without debug information yields no variables; the pause is still recorded.
/// Objects are collected breadth first from the variables, the receiver and the
/// receivers of all frames, up to the configured node budget.
pub fn capture_state<S: LiveDebugSource + ?Sized>(
    source: &S,
    thread: ThreadId,
    config: &CaptureConfig,
) -> DebugResult<CapturedState> {
    let variables = match source.visible_variables(thread) {
        Ok(variables) => variables,
        Err(e) if e.is_missing_debug_info() => {
            warn!(%thread, "Recording pause without variables: {e}");
            Vec::new()
        }
        Err(e) => return Err(e),
    };
    let call_stack = source.call_stack(thread)?;
    let receiver = if config.capture_receiver { source.receiver(thread)? } else { None };

    let roots = variables
        .iter()
        .filter_map(|var| var.value.object_id())
        .chain(receiver.iter().filter_map(|value| value.object_id()))
        .chain(call_stack.iter().filter_map(|frame| frame.receiver))
        .unique()
        .collect::<Vec<_>>();
    let objects = ObjectGraph::collect(roots, config.object_node_budget, |id| source.object(id))?;

    Ok(CapturedState { thread, variables, call_stack, receiver, objects })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{Script, ScriptedPause, ScriptedSource};
    use rewind_common::types::{
        CapturedValue, CapturedVariable, CodeLocation, FieldValue, MethodSignature, ObjectId,
        ObjectNode,
    };

    fn point_pause() -> ScriptedPause {
        let location =
            CodeLocation::new("Point.java", 7, MethodSignature::new("Point", "move", "(II)V"));
        ScriptedPause::new(location)
            .with_variable(CapturedVariable::argument("dx", "int", CapturedValue::primitive(1)))
            .with_variable(CapturedVariable::local(
                "other",
                "Point",
                CapturedValue::reference("Point", 2),
            ))
            .with_receiver(CapturedValue::reference("Point", 1))
    }

    fn point(x: i32, next: Option<u64>) -> ObjectNode {
        let next = next.map_or(CapturedValue::Null, |id| CapturedValue::reference("Point", id));
        ObjectNode::new(
            "Point",
            vec![
                FieldValue::new("x", "int", CapturedValue::primitive(x)),
                FieldValue::new("next", "Point", next),
            ],
        )
    }

    fn source(debug_info: bool) -> ScriptedSource {
        let script = Script { debug_info, stop_at_start: true, ..Script::new(vec![point_pause()]) };
        let mut source = ScriptedSource::new(script)
            .with_object(ObjectId(1), point(1, Some(3)))
            .with_object(ObjectId(2), point(2, None))
            .with_object(ObjectId(3), point(3, Some(1)));
        source.next_event().unwrap();
        source
    }

    #[test]
    fn test_capture_collects_reachable_objects() {
        let source = source(true);
        let state = capture_state(&source, ThreadId(0), &CaptureConfig::default()).unwrap();

        assert_eq!(state.variables.len(), 2);
        assert_eq!(state.receiver, Some(CapturedValue::reference("Point", 1)));
        assert_eq!(state.objects.len(), 3);
        assert!(!state.objects.is_truncated());
    }

    #[test]
    fn test_capture_respects_budget() {
        let source = source(true);
        let config = CaptureConfig { object_node_budget: 1, capture_receiver: true };
        let state = capture_state(&source, ThreadId(0), &config).unwrap();

        // Variables are visited before the receiver
        assert_eq!(state.objects.len(), 1);
        assert!(state.objects.contains(ObjectId(2)));
        assert!(state.objects.is_truncated());
    }

    #[test]
    fn test_capture_without_receiver() {
        let source = source(true);
        let config = CaptureConfig { capture_receiver: false, ..CaptureConfig::default() };
        let state = capture_state(&source, ThreadId(0), &config).unwrap();

        assert_eq!(state.receiver, None);
        assert_eq!(state.objects.len(), 1);
        assert!(!state.objects.contains(ObjectId(1)));
    }

    #[test]
    fn test_capture_without_debug_info() {
        let source = source(false);
        let state = capture_state(&source, ThreadId(0), &CaptureConfig::default()).unwrap();

        assert!(state.variables.is_empty());
        assert_eq!(state.call_stack.len(), 1);
    }
}
