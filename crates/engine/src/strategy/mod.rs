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

//! Navigation behavior of a session.
//!
//! A session navigates in one of two ways. While the program runs, [`LiveStrategy`]
//! drives the [`LiveDebugSource`]: stepping arms a single step and lets the program
//! run into it. Once the program is gone, [`ReplayStrategy`] moves the cursor over the
//! recorded timeline instead. [`ExecutionStrategy`] holds exactly one of them; turning
//! it into replay consumes the live strategy together with its source, so a replaying
//! session cannot reach the dead process.

mod live;
mod replay;

pub use live::*;
pub use replay::*;

use std::fmt;

use rewind_common::{
    types::{Breakpoint, CapturedValue, SnapshotId, StopPolicy},
    DebugResult, EngineConfig,
};
use serde::{Deserialize, Serialize};

use crate::{breakpoints::BreakpointRegistry, source::LiveDebugSource, timeline::TimelineManager};

/// Everything a strategy operates on besides the live source.
#[derive(Debug, Default)]
pub struct SessionState {
    /// Recorded snapshots and the cursor
    pub timeline: TimelineManager,
    /// Active breakpoints
    pub breakpoints: BreakpointRegistry,
    /// Session configuration
    pub config: EngineConfig,
}

/// Successful navigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Navigation {
    /// What happened, for display
    pub message: String,
    /// Snapshot the cursor stands on afterwards, `None` while the program is running
    pub snapshot_id: Option<SnapshotId>,
}

impl Navigation {
    /// The cursor moved to `snapshot_id`.
    pub fn moved(snapshot_id: SnapshotId, message: impl Into<String>) -> Self {
        Self { message: message.into(), snapshot_id: Some(snapshot_id) }
    }

    /// The program was resumed and has not paused yet.
    pub fn running(message: impl Into<String>) -> Self {
        Self { message: message.into(), snapshot_id: None }
    }
}

impl fmt::Display for Navigation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Where a printed variable was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariableOrigin {
    /// A local of the live frame
    Local,
    /// A field of the live receiver
    Field,
    /// The current snapshot
    Snapshot,
}

/// Result of printing a variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableView {
    /// Variable name
    pub name: String,
    /// Its value
    pub value: CapturedValue,
    /// Where it was found
    pub origin: VariableOrigin,
}

impl fmt::Display for VariableView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.name, self.value)
    }
}

/// Navigation contract shared by the live and replay strategies.
pub trait Strategy {
    /// Moves to the next line, entering calls.
    fn step(&mut self, state: &mut SessionState) -> DebugResult<Navigation>;

    /// Moves to the next line at the same or a shallower call depth.
    fn step_over(&mut self, state: &mut SessionState) -> DebugResult<Navigation>;

    /// Runs until the next breakpoint.
    fn continue_run(&mut self, state: &mut SessionState) -> DebugResult<Navigation>;

    /// Sets a breakpoint that always stops.
    fn set_breakpoint(
        &mut self,
        state: &mut SessionState,
        file: &str,
        line: usize,
    ) -> DebugResult<Breakpoint> {
        self.set_breakpoint_with(state, file, line, StopPolicy::Normal)
    }

    /// Sets a breakpoint with the given stop policy.
    fn set_breakpoint_with(
        &mut self,
        state: &mut SessionState,
        file: &str,
        line: usize,
        policy: StopPolicy,
    ) -> DebugResult<Breakpoint>;

    /// Stops on entry to any method named `method`.
    fn break_before_method_call(
        &mut self,
        state: &mut SessionState,
        method: &str,
    ) -> DebugResult<()>;

    /// Reads a variable at the current position.
    fn print_variable(&self, state: &SessionState, name: &str) -> DebugResult<VariableView>;
}

/// The active strategy of a session.
#[derive(Debug)]
pub enum ExecutionStrategy<S> {
    /// The program is running
    Live(LiveStrategy<S>),
    /// The program is gone; navigating the recorded timeline
    Replay(ReplayStrategy),
}

impl<S: LiveDebugSource> ExecutionStrategy<S> {
    /// Starts in live mode on `source`.
    pub fn live(source: S) -> Self {
        Self::Live(LiveStrategy::new(source))
    }

    /// Whether the program is still running.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live(_))
    }

    /// Switches to replay, dropping the live source. Replay stays replay.
    pub fn into_replay(self) -> Self {
        match self {
            Self::Live(live) => Self::Replay(live.finish()),
            replay @ Self::Replay(_) => replay,
        }
    }

    fn as_strategy(&self) -> &dyn Strategy {
        match self {
            Self::Live(live) => live,
            Self::Replay(replay) => replay,
        }
    }

    fn as_strategy_mut(&mut self) -> &mut dyn Strategy {
        match self {
            Self::Live(live) => live,
            Self::Replay(replay) => replay,
        }
    }
}

impl<S: LiveDebugSource> Strategy for ExecutionStrategy<S> {
    fn step(&mut self, state: &mut SessionState) -> DebugResult<Navigation> {
        self.as_strategy_mut().step(state)
    }

    fn step_over(&mut self, state: &mut SessionState) -> DebugResult<Navigation> {
        self.as_strategy_mut().step_over(state)
    }

    fn continue_run(&mut self, state: &mut SessionState) -> DebugResult<Navigation> {
        self.as_strategy_mut().continue_run(state)
    }

    fn set_breakpoint_with(
        &mut self,
        state: &mut SessionState,
        file: &str,
        line: usize,
        policy: StopPolicy,
    ) -> DebugResult<Breakpoint> {
        self.as_strategy_mut().set_breakpoint_with(state, file, line, policy)
    }

    fn break_before_method_call(
        &mut self,
        state: &mut SessionState,
        method: &str,
    ) -> DebugResult<()> {
        self.as_strategy_mut().break_before_method_call(state, method)
    }

    fn print_variable(&self, state: &SessionState, name: &str) -> DebugResult<VariableView> {
        self.as_strategy().print_variable(state, name)
    }
}
