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

//! The seam between the engine and a running program.
//!
//! A [`LiveDebugSource`] wraps whatever actually suspends threads and reads frames (a
//! JDWP connection, a ptrace backend, an in-process hook). The engine only consumes it
//! through this trait, one pause at a time, and drops it when the program disconnects.
//!
//! # Handshake
//!
//! [`LiveDebugSource::next_event`] delivers one [`SourceEvent`]. After a
//! [`SourceEvent::Paused`] event the program stays suspended, and the frame queries
//! refer to that pause, until [`LiveDebugSource::resume`] is called. No second event is
//! delivered before that.

pub mod scripted;
pub use scripted::*;

use auto_impl::auto_impl;
use rewind_common::{
    types::{
        CapturedValue, CapturedVariable, CodeLocation, FrameDescriptor, ObjectId, ObjectNode,
        ThreadId,
    },
    DebugResult,
};
use serde::{Deserialize, Serialize};

/// Why the program paused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PauseKind {
    /// An armed single step completed.
    Step,
    /// A breakpoint device fired.
    Breakpoint,
    /// A method-entry request fired.
    MethodEntry,
}

/// One pause delivered by the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PauseEvent {
    /// Suspended thread
    pub thread: ThreadId,
    /// Where it is suspended
    pub location: CodeLocation,
    /// What caused the pause
    pub kind: PauseKind,
    /// A method-entry request matched this pause too. A breakpoint device on the first
    /// line of a method takes precedence in `kind`.
    #[serde(default)]
    pub method_entry: bool,
}

impl PauseEvent {
    /// Whether the pause is the entry of a requested method.
    pub fn enters_method(&self) -> bool {
        self.kind == PauseKind::MethodEntry || self.method_entry
    }
}

/// What the source reports when asked for the next event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceEvent {
    /// The program paused and waits for [`LiveDebugSource::resume`].
    Paused(PauseEvent),
    /// The program is gone. The source is permanently invalid from now on.
    Disconnected,
}

/// How far a single step goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepDepth {
    /// Stop at the next line, entering calls.
    Into,
    /// Stop at the next line at the same or a shallower call depth.
    Over,
}

/// Pause-event provider and frame introspection for a running program.
#[auto_impl(&mut, Box)]
pub trait LiveDebugSource {
    /// Blocks until the program pauses or disconnects.
    fn next_event(&mut self) -> DebugResult<SourceEvent>;

    /// Lets the suspended program run again.
    fn resume(&mut self) -> DebugResult<()>;

    /// Locals visible in the innermost frame of `thread`, innermost scope first.
    ///
    /// Fails with `MissingDebugInfo` when the frame has no symbol table.
    fn visible_variables(&self, thread: ThreadId) -> DebugResult<Vec<CapturedVariable>>;

    /// Full call stack of `thread`, innermost frame first.
    fn call_stack(&self, thread: ThreadId) -> DebugResult<Vec<FrameDescriptor>>;

    /// Receiver (`this`) of the innermost frame, `None` in static code.
    fn receiver(&self, thread: ThreadId) -> DebugResult<Option<CapturedValue>>;

    /// Contents of a heap object, `None` if the identity is unknown.
    fn object(&self, id: ObjectId) -> DebugResult<Option<ObjectNode>>;

    /// Resolves `file:line` to a breakable location, `None` if there is none.
    fn resolve(&self, file: &str, line: usize) -> DebugResult<Option<CodeLocation>>;

    /// Installs a breakpoint device at a resolved location.
    fn install_breakpoint(&mut self, location: &CodeLocation) -> DebugResult<()>;

    /// Removes the breakpoint device on `file:line`, if any.
    fn uninstall_breakpoint(&mut self, file: &str, line: usize) -> DebugResult<()>;

    /// Requests a pause on entry to any method named `method`.
    ///
    /// Fails with `NotFound` if no loaded type declares such a method.
    fn install_method_entry(&mut self, method: &str) -> DebugResult<()>;

    /// Requests exactly one forthcoming step pause on `thread`, never stopping in a
    /// type matched by `exclusions` (see [`is_excluded`]).
    fn arm_single_step(
        &mut self,
        thread: ThreadId,
        depth: StepDepth,
        exclusions: &[String],
    ) -> DebugResult<()>;

    /// Reads a local variable of the innermost frame of `thread`.
    fn read_local(&self, thread: ThreadId, name: &str) -> DebugResult<Option<CapturedVariable>>;

    /// Reads a field of a heap object.
    fn read_field(&self, receiver: ObjectId, name: &str) -> DebugResult<Option<CapturedValue>>;
}

/// Whether `declaring_type` is matched by one of the step-exclusion patterns.
///
/// `java.*` matches `java.lang.String` but not `javax.swing.JFrame` or `java`.
pub fn is_excluded(declaring_type: &str, exclusions: &[String]) -> bool {
    exclusions.iter().any(|pattern| match pattern.strip_suffix('*') {
        Some(prefix) => declaring_type.starts_with(prefix) && declaring_type.len() > prefix.len(),
        None => declaring_type == pattern,
    })
}
