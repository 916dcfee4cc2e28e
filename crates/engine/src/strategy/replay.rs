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

use rewind_common::{
    types::{Breakpoint, StopPolicy},
    DebugError, DebugResult,
};
use tracing::debug;

use super::{Navigation, SessionState, Strategy, VariableOrigin, VariableView};
use crate::breakpoints::HitOutcome;

/// Navigation over a complete, sealed timeline.
#[derive(Debug, Clone, Default)]
pub struct ReplayStrategy;

impl ReplayStrategy {
    /// Creates the replay strategy.
    pub fn new() -> Self {
        Self::default()
    }

    fn travel(state: &mut SessionState, id: usize, message: String) -> DebugResult<Navigation> {
        if !state.timeline.travel_to_snapshot(id) {
            return Err(DebugError::not_found(format!("Snapshot #{id} not found")));
        }
        Ok(Navigation::moved(id, message))
    }
}

fn current_index(state: &SessionState) -> DebugResult<usize> {
    state.timeline.current_index().ok_or_else(|| DebugError::invalid_state("Timeline empty"))
}

impl Strategy for ReplayStrategy {
    fn step(&mut self, state: &mut SessionState) -> DebugResult<Navigation> {
        let next = current_index(state)? + 1;
        if next >= state.timeline.len() {
            return Err(DebugError::invalid_state("End of timeline reached"));
        }
        Self::travel(state, next, format!("Stepped to snapshot #{next}"))
    }

    fn step_over(&mut self, state: &mut SessionState) -> DebugResult<Navigation> {
        let current = current_index(state)?;
        let depth = state.timeline.snapshots()[current].depth();

        let target = state.timeline.snapshots()[current + 1..]
            .iter()
            .find(|snapshot| snapshot.depth() <= depth)
            .map(|snapshot| snapshot.id())
            .ok_or_else(|| DebugError::invalid_state("Reached end of execution"))?;
        Self::travel(state, target, format!("Stepped over to snapshot #{target}"))
    }

    fn continue_run(&mut self, state: &mut SessionState) -> DebugResult<Navigation> {
        let current = current_index(state)?;

        for id in current + 1..state.timeline.len() {
            let snapshot = &state.timeline.snapshots()[id];
            let (file, line) = (snapshot.file().to_string(), snapshot.line());

            if let HitOutcome::Stop { breakpoint, .. } = state.breakpoints.evaluate_hit(&file, line)
            {
                return Self::travel(state, id, format!("Breakpoint hit at {breakpoint}"));
            }

            if let Some(call) = state.timeline.call_opened_at(id) {
                if state.breakpoints.method_breakpoints().any(|method| call.matches_name(method)) {
                    let message =
                        format!("Method breakpoint hit: {}.{}()", call.declaring_type, call.method);
                    return Self::travel(state, id, message);
                }
            }
        }

        let last = state.timeline.len() - 1;
        debug!(last, "No breakpoint ahead");
        Self::travel(state, last, "Reached end of execution".to_string())
    }

    fn set_breakpoint_with(
        &mut self,
        state: &mut SessionState,
        file: &str,
        line: usize,
        policy: StopPolicy,
    ) -> DebugResult<Breakpoint> {
        let breakpoint = Breakpoint::new(file, line, policy);
        state.breakpoints.insert(breakpoint.clone());
        Ok(breakpoint)
    }

    fn break_before_method_call(
        &mut self,
        state: &mut SessionState,
        method: &str,
    ) -> DebugResult<()> {
        let known = state.timeline.snapshots().iter().any(|s| s.method().matches_name(method));
        if !known {
            return Err(DebugError::not_found(format!("Method '{method}' not found")));
        }
        state.breakpoints.add_method_breakpoint(method);
        Ok(())
    }

    fn print_variable(&self, state: &SessionState, name: &str) -> DebugResult<VariableView> {
        let snapshot = state
            .timeline
            .current_snapshot()
            .ok_or_else(|| DebugError::invalid_state("Timeline empty"))?;
        let value = snapshot.variable(name).ok_or_else(|| {
            DebugError::not_found(format!(
                "Variable '{name}' not found in snapshot #{}",
                snapshot.id()
            ))
        })?;

        Ok(VariableView {
            name: name.to_string(),
            value: value.clone(),
            origin: VariableOrigin::Snapshot,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rewind_common::types::{
        CapturedState, CapturedValue, CapturedVariable, CodeLocation, FrameDescriptor,
        MethodSignature,
    };

    /// Records `(file, line, depth)` triples into a sealed timeline and rewinds to #0.
    fn replay(points: &[(&str, usize, usize)]) -> SessionState {
        let mut state = SessionState::default();
        for &(file, line, depth) in points {
            let method = MethodSignature::new("T", if depth > 1 { "inner" } else { "main" }, "()V");
            let frames = (0..depth).map(|_| FrameDescriptor::new("T", "main", line)).collect();
            let variable = CapturedVariable::local("i", "int", CapturedValue::primitive(line));
            let captured = CapturedState {
                variables: vec![variable],
                call_stack: frames,
                ..Default::default()
            };
            let location = CodeLocation::new(file, line, method);
            state.timeline.record_snapshot(location, captured).unwrap();
        }
        state.timeline.seal();
        state.timeline.travel_to_snapshot(0);
        state
    }

    #[test]
    fn test_step_until_end() {
        let mut state = replay(&[("T.java", 1, 1), ("T.java", 2, 1)]);
        let mut replay = ReplayStrategy::new();

        assert_eq!(replay.step(&mut state).unwrap().snapshot_id, Some(1));
        let err = replay.step(&mut state).unwrap_err();
        assert!(err.is_invalid_state());
        assert_eq!(err.message(), "End of timeline reached");
        assert_eq!(state.timeline.current_index(), Some(1));
    }

    #[test]
    fn test_step_over_skips_nested_calls() {
        let mut state =
            replay(&[("T.java", 1, 1), ("T.java", 20, 2), ("T.java", 21, 2), ("T.java", 2, 1)]);
        let mut replay = ReplayStrategy::new();

        assert_eq!(replay.step_over(&mut state).unwrap().snapshot_id, Some(3));
        assert!(replay.step_over(&mut state).unwrap_err().is_invalid_state());
    }

    #[test]
    fn test_continue_without_breakpoints_goes_to_end() {
        let mut state = replay(&[("T.java", 1, 1), ("T.java", 2, 1), ("T.java", 3, 1)]);
        let mut replay = ReplayStrategy::new();

        let navigation = replay.continue_run(&mut state).unwrap();
        assert_eq!(navigation.snapshot_id, Some(2));
        assert_eq!(navigation.message, "Reached end of execution");
        // Already at the end: stays there
        assert_eq!(replay.continue_run(&mut state).unwrap().snapshot_id, Some(2));
    }

    #[test]
    fn test_continue_stops_at_method_entry() {
        let mut state =
            replay(&[("T.java", 1, 1), ("T.java", 2, 1), ("T.java", 20, 2), ("T.java", 3, 1)]);
        let mut replay = ReplayStrategy::new();

        replay.break_before_method_call(&mut state, "inner").unwrap();
        assert_eq!(replay.continue_run(&mut state).unwrap().snapshot_id, Some(2));
        assert!(replay.break_before_method_call(&mut state, "missing").unwrap_err().is_not_found());
    }

    #[test]
    fn test_print_variable_reads_snapshot() {
        let state = replay(&[("T.java", 4, 1)]);
        let replay = ReplayStrategy::new();

        let view = replay.print_variable(&state, "i").unwrap();
        assert_eq!(view.origin, VariableOrigin::Snapshot);
        assert_eq!(view.to_string(), "i = 4");
        assert!(replay.print_variable(&state, "j").unwrap_err().is_not_found());
    }

    #[test]
    fn test_empty_timeline() {
        let mut state = SessionState::default();
        let mut replay = ReplayStrategy::new();
        assert!(replay.step(&mut state).unwrap_err().is_invalid_state());
        assert!(replay.continue_run(&mut state).unwrap_err().is_invalid_state());
    }
}
