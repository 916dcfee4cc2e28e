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
    types::{Breakpoint, StopPolicy, ThreadId},
    DebugError, DebugResult,
};
use tracing::{debug, warn};

use super::{Navigation, ReplayStrategy, SessionState, Strategy, VariableOrigin, VariableView};
use crate::source::{LiveDebugSource, StepDepth};

/// Navigation while the program is running.
#[derive(Debug)]
pub struct LiveStrategy<S> {
    source: S,
    /// Thread of the pause the program is suspended at
    suspended: Option<ThreadId>,
    /// A single step was armed and has not completed yet
    step_pending: bool,
}

impl<S: LiveDebugSource> LiveStrategy<S> {
    /// Wraps a running source.
    pub fn new(source: S) -> Self {
        Self { source, suspended: None, step_pending: false }
    }

    /// The live source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Mutable access to the live source.
    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Thread the program is suspended on, `None` while it runs.
    pub fn suspended_thread(&self) -> Option<ThreadId> {
        self.suspended
    }

    /// Whether an armed single step has not completed yet.
    pub fn is_step_pending(&self) -> bool {
        self.step_pending
    }

    /// Marks the program as suspended at a recorded pause on `thread`.
    pub(crate) fn mark_suspended(&mut self, thread: ThreadId) {
        self.suspended = Some(thread);
        self.step_pending = false;
    }

    /// Lets the program run without recording the current pause.
    pub(crate) fn resume(&mut self) -> DebugResult<()> {
        self.suspended = None;
        self.source.resume()
    }

    /// Drops a pause that could not be recorded and lets the program run on.
    ///
    /// A pending step is spent by that pause.
    pub(crate) fn release_pause(&mut self) {
        self.step_pending = false;
        if let Err(err) = self.resume() {
            warn!(%err, "Failed to resume after an unrecorded pause");
        }
    }

    /// Ends live navigation. The source is dropped here.
    pub fn finish(self) -> ReplayStrategy {
        ReplayStrategy::new()
    }

    fn require_suspended(&self) -> DebugResult<ThreadId> {
        self.suspended.ok_or_else(|| DebugError::invalid_state("No execution context available"))
    }

    fn single_step(&mut self, state: &SessionState, depth: StepDepth) -> DebugResult<()> {
        let thread = self.require_suspended()?;
        self.source.arm_single_step(thread, depth, &state.config.step_exclusions)?;
        self.step_pending = true;
        debug!(%thread, ?depth, "Single step armed");
        self.resume()
    }
}

impl<S: LiveDebugSource> Strategy for LiveStrategy<S> {
    fn step(&mut self, state: &mut SessionState) -> DebugResult<Navigation> {
        self.single_step(state, StepDepth::Into)?;
        Ok(Navigation::running("Stepping into next line"))
    }

    fn step_over(&mut self, state: &mut SessionState) -> DebugResult<Navigation> {
        self.single_step(state, StepDepth::Over)?;
        Ok(Navigation::running("Stepping over next line"))
    }

    fn continue_run(&mut self, _state: &mut SessionState) -> DebugResult<Navigation> {
        self.require_suspended()?;
        self.resume()?;
        Ok(Navigation::running("Continuing execution"))
    }

    fn set_breakpoint_with(
        &mut self,
        state: &mut SessionState,
        file: &str,
        line: usize,
        policy: StopPolicy,
    ) -> DebugResult<Breakpoint> {
        let location = self.source.resolve(file, line)?.ok_or_else(|| {
            DebugError::not_found(format!("Could not set breakpoint at {file}:{line}"))
        })?;
        self.source.install_breakpoint(&location)?;

        // The device fires at the resolved line, so the entry is keyed on it
        let breakpoint = Breakpoint::new(location.file.as_str(), location.line, policy);
        state.breakpoints.insert(breakpoint.clone());
        Ok(breakpoint)
    }

    fn break_before_method_call(
        &mut self,
        state: &mut SessionState,
        method: &str,
    ) -> DebugResult<()> {
        self.source.install_method_entry(method)?;
        state.breakpoints.add_method_breakpoint(method);
        Ok(())
    }

    fn print_variable(&self, _state: &SessionState, name: &str) -> DebugResult<VariableView> {
        let thread = self.require_suspended()?;

        if let Some(local) = self.source.read_local(thread, name)? {
            return Ok(VariableView {
                name: local.name,
                value: local.value,
                origin: VariableOrigin::Local,
            });
        }

        let receiver = self.source.receiver(thread)?.and_then(|value| value.object_id());
        if let Some(receiver) = receiver {
            if let Some(value) = self.source.read_field(receiver, name)? {
                return Ok(VariableView {
                    name: name.to_string(),
                    value,
                    origin: VariableOrigin::Field,
                });
            }
        }

        Err(DebugError::not_found(format!("Variable '{name}' not found")))
    }
}
