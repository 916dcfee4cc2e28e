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

//! The recorded timeline and its cursor.
//!
//! [`TimelineManager`] owns every snapshot of a session together with the data derived
//! from them while recording: per-context variable trackers and the method-call index.
//! Snapshots are only appended while the session is recording; afterwards the timeline
//! is sealed and only the cursor moves.
//!
//! All history queries are bounded by the cursor. A query never reveals a modification
//! or a call recorded after the snapshot navigation currently stands on, even though
//! the full trace is already in memory.

mod calls;
mod tracker;

pub use calls::*;
pub use tracker::*;

use std::{collections::BTreeMap, fmt};

use itertools::Itertools;
use rewind_common::{
    types::{
        CapturedState, CapturedValue, CodeLocation, ContextKey, ExecutionSnapshot, SnapshotId,
        VariableModification,
    },
    DebugError, DebugResult,
};
use tracing::{debug, trace};

use crate::output::OutputBuffer;

/// Callback invoked with the new current snapshot after every cursor move.
pub type NavigationObserver = Box<dyn FnMut(&ExecutionSnapshot) + Send>;

/// A variable being followed from the current snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowedVariable {
    /// Scope the variable belongs to
    pub context: ContextKey,
    /// Value at the current snapshot
    pub value: CapturedValue,
    /// Modifications up to the current snapshot
    pub history: Vec<VariableModification>,
}

/// Owner of the snapshot sequence, trackers, call index and cursor.
pub struct TimelineManager {
    snapshots: Vec<ExecutionSnapshot>,
    cursor: Option<usize>,
    trackers: BTreeMap<ContextKey, VariableTracker>,
    calls: CallIndex,
    output: OutputBuffer,
    sealed: bool,
    observer: Option<NavigationObserver>,
}

impl fmt::Debug for TimelineManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimelineManager")
            .field("snapshots", &self.snapshots.len())
            .field("cursor", &self.cursor)
            .field("trackers", &self.trackers.len())
            .field("calls", &self.calls.records().len())
            .field("sealed", &self.sealed)
            .finish_non_exhaustive()
    }
}

impl Default for TimelineManager {
    fn default() -> Self {
        Self::new(OutputBuffer::new())
    }
}

impl TimelineManager {
    /// Creates an empty timeline whose snapshots copy the contents of `output`.
    pub fn new(output: OutputBuffer) -> Self {
        Self {
            snapshots: Vec::new(),
            cursor: None,
            trackers: BTreeMap::new(),
            calls: CallIndex::default(),
            output,
            sealed: false,
            observer: None,
        }
    }

    /// Registers the navigation observer, replacing any previous one.
    pub fn set_observer(&mut self, observer: impl FnMut(&ExecutionSnapshot) + Send + 'static) {
        self.observer = Some(Box::new(observer));
    }

    /// Builder variant of [`Self::set_observer`].
    pub fn with_observer(
        mut self,
        observer: impl FnMut(&ExecutionSnapshot) + Send + 'static,
    ) -> Self {
        self.set_observer(observer);
        self
    }

    /// Appends a snapshot of the pause at `location` and moves the cursor to it.
    ///
    /// Fails with `InvalidState` once the timeline has been sealed.
    pub fn record_snapshot(
        &mut self,
        location: CodeLocation,
        state: CapturedState,
    ) -> DebugResult<&ExecutionSnapshot> {
        if self.sealed {
            return Err(DebugError::invalid_state(
                "Recording has ended; the timeline can no longer grow",
            ));
        }

        let id = self.snapshots.len();
        let snapshot = ExecutionSnapshot::new(id, location, state, self.output.contents());
        if let Some(last) = self.snapshots.last() {
            assert_eq!(last.id() + 1, snapshot.id(), "non-monotonic snapshot id");
        }

        for (name, value) in snapshot.variables() {
            let context = ContextKey::new(name.as_str(), snapshot.method());
            let tracker = self
                .trackers
                .entry(context)
                .or_insert_with_key(|context| VariableTracker::new(context.clone()));
            if let Some(modification) =
                tracker.observe(&value.to_string(), id, snapshot.line(), &snapshot.method().name)
            {
                trace!("Modification: {modification}");
            }
        }

        if let Some(call) = self.calls.observe(&snapshot) {
            trace!("Call opened: {call}");
        }

        debug!(id, location = %snapshot.location(), depth = snapshot.depth(), "Recorded snapshot");
        self.snapshots.push(snapshot);
        self.cursor = Some(id);
        Ok(&self.snapshots[id])
    }

    /// Moves the cursor to snapshot `id` and notifies the observer.
    ///
    /// Returns false, leaving the cursor unchanged, if no such snapshot exists.
    pub fn travel_to_snapshot(&mut self, id: SnapshotId) -> bool {
        let Some(snapshot) = self.snapshots.get(id) else {
            return false;
        };

        self.cursor = Some(id);
        debug!(id, location = %snapshot.location(), "Travelled to snapshot");
        if let Some(observer) = self.observer.as_mut() {
            observer(snapshot);
        }
        true
    }

    /// Snapshot under the cursor.
    pub fn current_snapshot(&self) -> Option<&ExecutionSnapshot> {
        self.cursor.map(|index| &self.snapshots[index])
    }

    /// Id of the snapshot under the cursor.
    pub fn current_index(&self) -> Option<SnapshotId> {
        self.cursor
    }

    /// All recorded snapshots, ordered by id.
    pub fn snapshots(&self) -> &[ExecutionSnapshot] {
        &self.snapshots
    }

    /// Looks up a snapshot by id.
    pub fn get(&self, id: SnapshotId) -> Option<&ExecutionSnapshot> {
        self.snapshots.get(id)
    }

    /// The most recent snapshot.
    pub fn last(&self) -> Option<&ExecutionSnapshot> {
        self.snapshots.last()
    }

    /// Number of snapshots.
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Whether snapshots can still be appended.
    pub fn is_recording(&self) -> bool {
        !self.sealed
    }

    /// Shared program output.
    pub fn output(&self) -> &OutputBuffer {
        &self.output
    }

    /// Stops accepting snapshots. Irreversible.
    pub(crate) fn seal(&mut self) {
        self.sealed = true;
    }

    /// History of every variable named `name` up to the cursor, across all method
    /// contexts, ordered by snapshot id.
    pub fn variable_history_up_to_current(&self, name: &str) -> Vec<VariableModification> {
        let Some(current) = self.cursor else {
            return Vec::new();
        };

        self.trackers
            .iter()
            .filter(|(context, _)| context.variable == name)
            .flat_map(|(_, tracker)| tracker.history_up_to(current))
            .sorted_by_key(|modification| modification.snapshot_id)
            .cloned()
            .collect()
    }

    /// History of one context-keyed variable up to the cursor.
    pub fn context_history_up_to_current(&self, context: &ContextKey) -> &[VariableModification] {
        match (self.cursor, self.trackers.get(context)) {
            (Some(current), Some(tracker)) => tracker.history_up_to(current),
            _ => &[],
        }
    }

    /// Histories of every variable modified at or before the cursor.
    pub fn all_variables_with_history_up_to_current(
        &self,
    ) -> BTreeMap<&ContextKey, &[VariableModification]> {
        let Some(current) = self.cursor else {
            return BTreeMap::new();
        };

        self.trackers
            .iter()
            .map(|(context, tracker)| (context, tracker.history_up_to(current)))
            .filter(|(_, history)| !history.is_empty())
            .collect()
    }

    /// Calls detected at or before the cursor.
    pub fn all_method_calls_up_to_current(&self) -> &[MethodCallRecord] {
        match self.cursor {
            Some(current) => self.calls.up_to(current),
            None => &[],
        }
    }

    /// Calls to `name` (bare or `Type.name`) detected at or before the cursor.
    pub fn calls_to_method_up_to_current(&self, name: &str) -> Vec<&MethodCallRecord> {
        self.all_method_calls_up_to_current()
            .iter()
            .filter(|record| record.matches_name(name))
            .collect()
    }

    /// The call opened by snapshot `id`, if the heuristic detected one there.
    pub fn call_opened_at(&self, id: SnapshotId) -> Option<&MethodCallRecord> {
        self.calls.opened_at(id)
    }

    /// Starts following the variable `name` visible at the current snapshot.
    pub fn follow_variable(&self, name: &str) -> DebugResult<FollowedVariable> {
        let snapshot = self
            .current_snapshot()
            .ok_or_else(|| DebugError::invalid_state("No snapshot recorded yet"))?;
        let value = snapshot
            .variable(name)
            .ok_or_else(|| DebugError::not_found(format!("Variable '{name}' not found")))?;

        let context = ContextKey::new(name, snapshot.method());
        let history = self.context_history_up_to_current(&context).to_vec();
        Ok(FollowedVariable { context, value: value.clone(), history })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use rewind_common::types::{CapturedVariable, FrameDescriptor, MethodSignature};

    fn state(depth: usize, vars: &[(&str, i64)]) -> CapturedState {
        CapturedState {
            variables: vars
                .iter()
                .map(|(name, value)| {
                    CapturedVariable::local(*name, "int", CapturedValue::primitive(value))
                })
                .collect(),
            call_stack: (0..depth).map(|_| FrameDescriptor::new("Main", "run", 1)).collect(),
            ..Default::default()
        }
    }

    fn location(line: usize) -> CodeLocation {
        CodeLocation::new("Main.java", line, MethodSignature::new("Main", "run", "()V"))
    }

    #[test]
    fn test_empty_timeline_queries() {
        let timeline = TimelineManager::default();
        assert!(timeline.current_snapshot().is_none());
        assert!(timeline.variable_history_up_to_current("x").is_empty());
        assert!(timeline.all_variables_with_history_up_to_current().is_empty());
        assert!(timeline.all_method_calls_up_to_current().is_empty());
        assert!(timeline.calls_to_method_up_to_current("run").is_empty());
    }

    #[test]
    fn test_record_assigns_sequential_ids() {
        let mut timeline = TimelineManager::default();
        for line in 1..=3 {
            timeline.record_snapshot(location(line), state(1, &[])).unwrap();
        }

        let ids = timeline.snapshots().iter().map(|s| s.id()).collect::<Vec<_>>();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(timeline.current_index(), Some(2));
    }

    #[test]
    fn test_sealed_timeline_rejects_snapshots() {
        let mut timeline = TimelineManager::default();
        timeline.record_snapshot(location(1), state(1, &[])).unwrap();
        timeline.seal();

        let err = timeline.record_snapshot(location(2), state(1, &[])).unwrap_err();
        assert!(err.is_invalid_state());
        assert_eq!(timeline.len(), 1);
    }

    #[test]
    fn test_snapshot_copies_output() {
        let output = OutputBuffer::new();
        let mut timeline = TimelineManager::new(output.clone());
        output.append("hello\n");
        timeline.record_snapshot(location(1), state(1, &[])).unwrap();
        output.append("world\n");
        timeline.record_snapshot(location(2), state(1, &[])).unwrap();

        assert_eq!(timeline.get(0).unwrap().output(), "hello\n");
        assert_eq!(timeline.get(1).unwrap().output(), "hello\nworld\n");
    }

    #[test]
    fn test_travel_notifies_observer() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut timeline = TimelineManager::default()
            .with_observer(move |snapshot| sink.lock().unwrap().push(snapshot.id()));
        for line in 1..=3 {
            timeline.record_snapshot(location(line), state(1, &[])).unwrap();
        }

        assert!(timeline.travel_to_snapshot(1));
        assert!(!timeline.travel_to_snapshot(9));
        assert_eq!(timeline.current_index(), Some(1));
        assert_eq!(*seen.lock().unwrap(), vec![1]);
    }

    #[test]
    fn test_history_is_cursor_bounded() {
        let mut timeline = TimelineManager::default();
        for (line, x) in [(1, 1), (2, 2), (3, 3)] {
            timeline.record_snapshot(location(line), state(1, &[("x", x)])).unwrap();
        }

        timeline.travel_to_snapshot(1);
        let history = timeline.variable_history_up_to_current("x");
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].new_value, "2");
        assert_eq!(timeline.all_variables_with_history_up_to_current().len(), 1);
    }

    #[test]
    fn test_follow_variable() {
        let mut timeline = TimelineManager::default();
        timeline.record_snapshot(location(1), state(1, &[("x", 1)])).unwrap();
        timeline.record_snapshot(location(2), state(1, &[("x", 5)])).unwrap();

        let followed = timeline.follow_variable("x").unwrap();
        assert_eq!(followed.context.to_string(), "x@Main.run()V");
        assert_eq!(followed.value, CapturedValue::primitive(5));
        assert_eq!(followed.history.len(), 2);

        assert!(timeline.follow_variable("y").unwrap_err().is_not_found());
    }
}
