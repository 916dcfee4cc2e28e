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

//! Active breakpoints of a session.
//!
//! The registry is shared by both execution strategies, so live and replayed
//! navigation count hits and retire `Once` breakpoints the same way.

use std::collections::{BTreeMap, BTreeSet};

use rewind_common::types::{Breakpoint, StopPolicy};
use tracing::debug;

/// Result of visiting a location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HitOutcome {
    /// No breakpoint is set there.
    NoBreakpoint,
    /// A breakpoint counted the visit but does not stop on it.
    Skipped(Breakpoint),
    /// A breakpoint stops execution.
    Stop {
        /// The breakpoint after counting the hit
        breakpoint: Breakpoint,
        /// Set when the breakpoint retired itself (`Once`)
        removed: bool,
    },
}

impl HitOutcome {
    /// Whether execution stops.
    pub fn is_stop(&self) -> bool {
        matches!(self, Self::Stop { .. })
    }
}

/// Line breakpoints keyed by `file:line`, plus method-entry breakpoints.
#[derive(Debug, Clone, Default)]
pub struct BreakpointRegistry {
    breakpoints: BTreeMap<String, Breakpoint>,
    methods: BTreeSet<String>,
}

impl BreakpointRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a breakpoint, replacing any breakpoint on the same line.
    pub fn insert(&mut self, breakpoint: Breakpoint) -> Option<Breakpoint> {
        debug!(%breakpoint, "Breakpoint set");
        self.breakpoints.insert(breakpoint.key(), breakpoint)
    }

    /// Removes the breakpoint on `file:line`.
    pub fn remove(&mut self, file: &str, line: usize) -> Option<Breakpoint> {
        self.breakpoints.remove(&Breakpoint::location_key(file, line))
    }

    /// The breakpoint on `file:line`.
    pub fn get(&self, file: &str, line: usize) -> Option<&Breakpoint> {
        self.breakpoints.get(&Breakpoint::location_key(file, line))
    }

    /// Whether any breakpoint is set on `file:line`.
    pub fn contains(&self, file: &str, line: usize) -> bool {
        self.breakpoints.contains_key(&Breakpoint::location_key(file, line))
    }

    /// All line breakpoints, sorted by key.
    pub fn list(&self) -> Vec<&Breakpoint> {
        self.breakpoints.values().collect()
    }

    /// Number of line breakpoints.
    pub fn len(&self) -> usize {
        self.breakpoints.len()
    }

    /// Whether no line breakpoint is set.
    pub fn is_empty(&self) -> bool {
        self.breakpoints.is_empty()
    }

    /// Adds a breakpoint on entry to any method named `method`.
    pub fn add_method_breakpoint(&mut self, method: impl Into<String>) -> bool {
        let method = method.into();
        debug!(%method, "Method breakpoint set");
        self.methods.insert(method)
    }

    /// Removes a method-entry breakpoint.
    pub fn remove_method_breakpoint(&mut self, method: &str) -> bool {
        self.methods.remove(method)
    }

    /// Whether a method-entry breakpoint covers `method`.
    pub fn has_method_breakpoint(&self, method: &str) -> bool {
        self.methods.contains(method)
    }

    /// Method names with an entry breakpoint.
    pub fn method_breakpoints(&self) -> impl Iterator<Item = &str> {
        self.methods.iter().map(String::as_str)
    }

    /// Resets the hit counters of all line breakpoints.
    pub fn reset_hits(&mut self) {
        self.breakpoints.values_mut().for_each(Breakpoint::reset_hits);
    }

    /// Counts a visit of `file:line` and decides whether it stops.
    ///
    /// A `Once` breakpoint that stops is removed from the registry.
    pub fn evaluate_hit(&mut self, file: &str, line: usize) -> HitOutcome {
        let key = Breakpoint::location_key(file, line);
        let Some(breakpoint) = self.breakpoints.get_mut(&key) else {
            return HitOutcome::NoBreakpoint;
        };

        if !breakpoint.register_hit() {
            debug!(%breakpoint, "Breakpoint skipped");
            return HitOutcome::Skipped(breakpoint.clone());
        }

        let breakpoint = breakpoint.clone();
        if breakpoint.policy() == StopPolicy::Once {
            self.breakpoints.remove(&key);
            debug!(%breakpoint, "Breakpoint hit and removed");
            return HitOutcome::Stop { breakpoint, removed: true };
        }

        debug!(%breakpoint, "Breakpoint hit");
        HitOutcome::Stop { breakpoint, removed: false }
    }
}
