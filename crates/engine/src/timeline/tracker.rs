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

use rewind_common::types::{ContextKey, SnapshotId, VariableModification};

/// Accumulates the modification history of one context-keyed variable.
#[derive(Debug, Clone)]
pub struct VariableTracker {
    context: ContextKey,
    last_value: Option<String>,
    history: Vec<VariableModification>,
}

impl VariableTracker {
    /// Creates a tracker that has not observed any value yet.
    pub fn new(context: ContextKey) -> Self {
        Self { context, last_value: None, history: Vec::new() }
    }

    /// The tracked context.
    pub fn context(&self) -> &ContextKey {
        &self.context
    }

    /// Most recently observed value.
    pub fn last_value(&self) -> Option<&str> {
        self.last_value.as_deref()
    }

    /// Every recorded modification, ordered by snapshot id.
    pub fn history(&self) -> &[VariableModification] {
        &self.history
    }

    /// Modifications recorded at or before `snapshot_id`.
    pub fn history_up_to(&self, snapshot_id: SnapshotId) -> &[VariableModification] {
        let end = self.history.partition_point(|m| m.snapshot_id <= snapshot_id);
        &self.history[..end]
    }

    /// Observes the rendered value of the variable at a snapshot.
    ///
    /// The first observation and every change produce a modification. Observing the
    /// same value again produces nothing.
    pub fn observe(
        &mut self,
        value: &str,
        snapshot_id: SnapshotId,
        line: usize,
        method: &str,
    ) -> Option<&VariableModification> {
        if self.last_value.as_deref() == Some(value) {
            return None;
        }

        if let Some(previous) = self.history.last() {
            assert!(
                previous.snapshot_id < snapshot_id,
                "non-monotonic modification for {}: #{} after #{}",
                self.context,
                snapshot_id,
                previous.snapshot_id
            );
        }

        let old_value = self.last_value.replace(value.to_string());
        assert_eq!(
            old_value.as_deref(),
            self.history.last().map(|m| m.new_value.as_str()),
            "broken modification chain for {}",
            self.context
        );

        self.history.push(VariableModification {
            variable: self.context.variable.clone(),
            context: self.context.clone(),
            old_value,
            new_value: value.to_string(),
            snapshot_id,
            line,
            method: method.to_string(),
        });
        self.history.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rewind_common::types::MethodSignature;

    fn tracker() -> VariableTracker {
        let method = MethodSignature::new("Counter", "run", "()V");
        VariableTracker::new(ContextKey::new("counter", &method))
    }

    #[test]
    fn test_first_observation_is_initial() {
        let mut tracker = tracker();
        let modification = tracker.observe("0", 0, 3, "run").unwrap();
        assert!(modification.is_initial());
        assert_eq!(modification.to_string(), "counter: <unset> -> 0 (line 3 in run())");
    }

    #[test]
    fn test_repeated_values_are_ignored() {
        let mut tracker = tracker();
        assert!(tracker.observe("0", 0, 3, "run").is_some());
        assert!(tracker.observe("0", 1, 4, "run").is_none());
        assert!(tracker.observe("10", 2, 5, "run").is_some());

        let history = tracker.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].old_value.as_deref(), Some("0"));
        assert_eq!(tracker.last_value(), Some("10"));
    }

    #[test]
    fn test_history_up_to() {
        let mut tracker = tracker();
        tracker.observe("0", 0, 3, "run");
        tracker.observe("10", 2, 5, "run");
        tracker.observe("20", 4, 7, "run");

        assert_eq!(tracker.history_up_to(1).len(), 1);
        assert_eq!(tracker.history_up_to(2).len(), 2);
        assert_eq!(tracker.history_up_to(100).len(), 3);
    }

    #[test]
    #[should_panic(expected = "non-monotonic")]
    fn test_out_of_order_observation_panics() {
        let mut tracker = tracker();
        tracker.observe("0", 5, 3, "run");
        tracker.observe("1", 2, 3, "run");
    }
}
