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

//! A debugging session from first pause to the end of replay.
//!
//! The session owns the [`SessionState`] and the active [`ExecutionStrategy`]. It runs
//! the recording loop: take one pause event, decide whether it stops, record exactly one
//! snapshot for it, and only then let the program continue. When the source reports
//! that the program disconnected, the session seals the timeline and switches to replay
//! for good.

use rewind_common::{
    types::{Breakpoint, ExecutionSnapshot, SnapshotId, StopPolicy},
    DebugError, DebugResult, EngineConfig,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    breakpoints::{BreakpointRegistry, HitOutcome},
    capture::capture_state,
    inspect::SnapshotInspector,
    output::OutputBuffer,
    source::{LiveDebugSource, PauseEvent, PauseKind, SourceEvent},
    strategy::{
        ExecutionStrategy, LiveStrategy, Navigation, ReplayStrategy, SessionState, Strategy,
        VariableView,
    },
    timeline::TimelineManager,
};

/// Lifecycle phase of a session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display,
)]
pub enum Phase {
    /// The program is running and pauses are being recorded
    #[display("recording")]
    Recording,
    /// The program is gone; the timeline is complete
    #[display("replaying")]
    Replaying,
}

/// One debugging session over a [`LiveDebugSource`].
#[derive(Debug)]
pub struct Session<S> {
    state: SessionState,
    strategy: ExecutionStrategy<S>,
}

impl<S: LiveDebugSource> Session<S> {
    /// Starts a session on a running program.
    pub fn new(source: S, config: EngineConfig) -> Self {
        Self::with_output(source, config, OutputBuffer::new())
    }

    /// Starts a session whose snapshots copy the program output collected in `output`.
    pub fn with_output(source: S, config: EngineConfig, output: OutputBuffer) -> Self {
        debug!(?config, "Starting session");
        Self {
            state: SessionState {
                timeline: TimelineManager::new(output),
                breakpoints: BreakpointRegistry::new(),
                config,
            },
            strategy: ExecutionStrategy::live(source),
        }
    }

    /// Registers the callback invoked after every cursor move.
    pub fn set_observer(&mut self, observer: impl FnMut(&ExecutionSnapshot) + Send + 'static) {
        self.state.timeline.set_observer(observer);
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        if self.strategy.is_live() {
            Phase::Recording
        } else {
            Phase::Replaying
        }
    }

    /// Whether the program is still running.
    pub fn is_live(&self) -> bool {
        self.strategy.is_live()
    }

    /// Session configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.state.config
    }

    /// The recorded timeline.
    pub fn timeline(&self) -> &TimelineManager {
        &self.state.timeline
    }

    /// Active breakpoints.
    pub fn breakpoints(&self) -> &BreakpointRegistry {
        &self.state.breakpoints
    }

    /// Program output collected so far.
    pub fn output(&self) -> &OutputBuffer {
        self.state.timeline.output()
    }

    /// The live source, `None` once the session replays.
    pub fn source(&self) -> Option<&S> {
        match &self.strategy {
            ExecutionStrategy::Live(live) => Some(live.source()),
            ExecutionStrategy::Replay(_) => None,
        }
    }

    /// The active strategy.
    pub fn strategy(&self) -> &ExecutionStrategy<S> {
        &self.strategy
    }

    /// Waits for the next pause that stops and records it.
    ///
    /// Breakpoint hits that do not stop are counted and resumed without a snapshot.
    /// Returns `None` when the program disconnected instead; the session is replaying
    /// from then on.
    pub fn wait_for_pause(&mut self) -> DebugResult<Option<SnapshotId>> {
        let ExecutionStrategy::Live(live) = &mut self.strategy else {
            return Err(DebugError::invalid_state("The program has already disconnected"));
        };

        loop {
            let pause = match live.source_mut().next_event()? {
                SourceEvent::Paused(pause) => pause,
                SourceEvent::Disconnected => break,
            };

            match accept_pause(&mut self.state, live, pause) {
                Ok(Some(id)) => return Ok(Some(id)),
                Ok(None) => live.resume()?,
                Err(err) => {
                    // The pause is consumed, so the program must not stay suspended
                    live.release_pause();
                    return Err(err);
                }
            }
        }

        self.finish_recording();
        Ok(None)
    }

    /// Records until the program disconnects and returns the number of new snapshots.
    ///
    /// With `record_every_step` every line is recorded; otherwise only breakpoint and
    /// method-entry pauses are. A line-by-line trace needs a source that stops at the
    /// program's first line.
    pub fn record_to_end(&mut self) -> DebugResult<usize> {
        let start = self.state.timeline.len();

        while let ExecutionStrategy::Live(live) = &mut self.strategy {
            if live.suspended_thread().is_some() {
                if self.state.config.record_every_step {
                    live.step(&mut self.state)?;
                } else {
                    live.continue_run(&mut self.state)?;
                }
            }
            self.wait_for_pause()?;
        }

        let recorded = self.state.timeline.len() - start;
        info!(recorded, "Recording finished");
        Ok(recorded)
    }

    /// Moves to the next line, entering calls.
    pub fn step(&mut self) -> DebugResult<Navigation> {
        self.navigate(|strategy, state| strategy.step(state))
    }

    /// Moves to the next line at the same or a shallower call depth.
    pub fn step_over(&mut self) -> DebugResult<Navigation> {
        self.navigate(|strategy, state| strategy.step_over(state))
    }

    /// Runs to the next breakpoint, or to the end of the timeline during replay.
    pub fn continue_run(&mut self) -> DebugResult<Navigation> {
        self.navigate(|strategy, state| strategy.continue_run(state))
    }

    /// Moves back one snapshot. Works in both phases.
    pub fn step_back(&mut self) -> DebugResult<Navigation> {
        let current = self
            .state
            .timeline
            .current_index()
            .ok_or_else(|| DebugError::invalid_state("Timeline empty"))?;
        if current == 0 {
            return Err(DebugError::invalid_state("Already at the first snapshot"));
        }
        self.travel_to_snapshot(current - 1)
    }

    /// Moves the cursor to an already recorded snapshot.
    pub fn travel_to_snapshot(&mut self, id: SnapshotId) -> DebugResult<Navigation> {
        if !self.state.timeline.travel_to_snapshot(id) {
            return Err(DebugError::not_found(format!("Snapshot #{id} not found")));
        }
        Ok(Navigation::moved(id, format!("Travelled to snapshot #{id}")))
    }

    /// Sets a breakpoint that always stops.
    pub fn set_breakpoint(&mut self, file: &str, line: usize) -> DebugResult<Breakpoint> {
        self.strategy.set_breakpoint(&mut self.state, file, line)
    }

    /// Sets a breakpoint with an explicit stop policy.
    pub fn set_breakpoint_with(
        &mut self,
        file: &str,
        line: usize,
        policy: StopPolicy,
    ) -> DebugResult<Breakpoint> {
        self.strategy.set_breakpoint_with(&mut self.state, file, line, policy)
    }

    /// Stops on entry to any method named `method`.
    pub fn break_before_method_call(&mut self, method: &str) -> DebugResult<()> {
        self.strategy.break_before_method_call(&mut self.state, method)
    }

    /// Removes the breakpoint on `file:line`.
    pub fn remove_breakpoint(&mut self, file: &str, line: usize) -> DebugResult<Breakpoint> {
        let breakpoint = self.state.breakpoints.remove(file, line).ok_or_else(|| {
            DebugError::not_found(format!("No breakpoint at {file}:{line}"))
        })?;
        if let ExecutionStrategy::Live(live) = &mut self.strategy {
            live.source_mut().uninstall_breakpoint(file, line)?;
        }
        Ok(breakpoint)
    }

    /// Reads a variable at the current position.
    pub fn print_variable(&self, name: &str) -> DebugResult<VariableView> {
        self.strategy.print_variable(&self.state, name)
    }

    /// Inspection queries over the current snapshot.
    pub fn inspect(&self) -> DebugResult<SnapshotInspector<'_>> {
        self.state
            .timeline
            .current_snapshot()
            .map(SnapshotInspector::new)
            .ok_or_else(|| DebugError::invalid_state("No snapshot recorded yet"))
    }

    /// Runs a strategy operation. In live mode the operation lets the program run, so
    /// this waits for the pause it leads to.
    fn navigate<F>(&mut self, op: F) -> DebugResult<Navigation>
    where
        F: FnOnce(&mut ExecutionStrategy<S>, &mut SessionState) -> DebugResult<Navigation>,
    {
        let navigation = op(&mut self.strategy, &mut self.state)?;
        if navigation.snapshot_id.is_some() || !self.is_live() {
            return Ok(navigation);
        }

        match self.wait_for_pause()? {
            Some(id) => {
                let location = self.state.timeline.snapshots()[id].location();
                Ok(Navigation::moved(id, format!("Paused at {location}")))
            }
            None => Ok(Navigation {
                message: "Program finished; replaying the recorded timeline".to_string(),
                snapshot_id: self.state.timeline.current_index(),
            }),
        }
    }

    /// One-way transition to replay. The live source is dropped here.
    fn finish_recording(&mut self) {
        let strategy =
            std::mem::replace(&mut self.strategy, ExecutionStrategy::Replay(ReplayStrategy::new()));
        self.strategy = strategy.into_replay();
        self.state.timeline.seal();
        // Replay starts a fresh pass over the breakpoints
        self.state.breakpoints.reset_hits();
        info!(snapshots = self.state.timeline.len(), "Program disconnected, switching to replay");
    }
}

/// Records the pause if it stops and leaves the program suspended at it.
///
/// Returns `None` for a pause that only counted a breakpoint hit.
fn accept_pause<S: LiveDebugSource>(
    state: &mut SessionState,
    live: &mut LiveStrategy<S>,
    pause: PauseEvent,
) -> DebugResult<Option<SnapshotId>> {
    if !stops_at(&mut state.breakpoints, live, &pause)? {
        return Ok(None);
    }

    let captured = capture_state(live.source(), pause.thread, &state.config.capture)?;
    let id = state.timeline.record_snapshot(pause.location, captured)?.id();
    live.mark_suspended(pause.thread);
    Ok(Some(id))
}

/// Counts the pause against the breakpoints and decides whether it is recorded.
///
/// A pause while a single step is pending always stops: the step and the breakpoint
/// land on the same line. A line breakpoint on the first line of a method does not hide
/// a method breakpoint on it.
fn stops_at<S: LiveDebugSource>(
    breakpoints: &mut BreakpointRegistry,
    live: &mut LiveStrategy<S>,
    pause: &PauseEvent,
) -> DebugResult<bool> {
    let line_stop = match pause.kind {
        PauseKind::Step => true,
        PauseKind::Breakpoint => {
            let (file, line) = (pause.location.file.as_str(), pause.location.line);
            let outcome = breakpoints.evaluate_hit(file, line);
            if let HitOutcome::Stop { removed: true, .. } = outcome {
                live.source_mut().uninstall_breakpoint(file, line)?;
            }
            outcome.is_stop()
        }
        PauseKind::MethodEntry => false,
    };
    let method = &pause.location.method;
    let entry_stop = pause.enters_method()
        && breakpoints.method_breakpoints().any(|name| method.matches_name(name));
    Ok(line_stop || entry_stop || live.is_step_pending())
}
