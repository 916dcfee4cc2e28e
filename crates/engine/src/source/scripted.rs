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

//! A deterministic, in-memory [`LiveDebugSource`].
//!
//! The script lists every line the program would pause at if it were single-stepped
//! from start to end. The source walks that list as the "execution" and delivers only
//! the pauses a real debugger would report: completed single steps, breakpoint hits
//! and method entries. Everything else runs past silently, exactly like resumed code.
//!
//! Scripts can be built in code or loaded from JSON:
//!
//! ```json
//! {
//!   "stop_at_start": true,
//!   "pauses": [
//!     {
//!       "location": {
//!         "file": "Main.java",
//!         "line": 3,
//!         "method": { "declaring_type": "Main", "name": "main", "signature": "()V" }
//!       },
//!       "call_stack": [{ "declaring_type": "Main", "method": "main", "line": 3 }],
//!       "variables": [{ "name": "i", "type_name": "int", "value": { "Primitive": "0" } }],
//!       "output": "starting\n"
//!     }
//!   ]
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet};

use eyre::{Result, WrapErr};
use rewind_common::{
    types::{
        CapturedValue, CapturedVariable, CodeLocation, FrameDescriptor, ObjectId, ObjectNode,
        ThreadId,
    },
    DebugError, DebugResult,
};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::{
    output::OutputBuffer,
    source::{is_excluded, LiveDebugSource, PauseEvent, PauseKind, SourceEvent, StepDepth},
};

/// One line the scripted program passes through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptedPause {
    /// Thread executing the line
    #[serde(default)]
    pub thread: ThreadId,
    /// The line
    pub location: CodeLocation,
    /// Locals visible at the line
    #[serde(default)]
    pub variables: Vec<CapturedVariable>,
    /// Call stack at the line, innermost first
    #[serde(default)]
    pub call_stack: Vec<FrameDescriptor>,
    /// Receiver of the innermost frame
    #[serde(default)]
    pub receiver: Option<CapturedValue>,
    /// Output the program prints on its way to this line
    #[serde(default)]
    pub output: Option<String>,
}

impl ScriptedPause {
    /// A pause at `location` on thread 0 with a one-frame stack.
    pub fn new(location: CodeLocation) -> Self {
        let frame = FrameDescriptor::new(
            location.method.declaring_type.clone(),
            location.method.name.clone(),
            location.line,
        );
        Self {
            thread: ThreadId::default(),
            location,
            variables: Vec::new(),
            call_stack: vec![frame],
            receiver: None,
            output: None,
        }
    }

    /// Sets the thread.
    pub fn on_thread(mut self, thread: ThreadId) -> Self {
        self.thread = thread;
        self
    }

    /// Adds a visible local.
    pub fn with_variable(mut self, variable: CapturedVariable) -> Self {
        self.variables.push(variable);
        self
    }

    /// Replaces the call stack.
    pub fn with_stack(mut self, call_stack: Vec<FrameDescriptor>) -> Self {
        self.call_stack = call_stack;
        self
    }

    /// Sets the receiver.
    pub fn with_receiver(mut self, receiver: CapturedValue) -> Self {
        self.receiver = Some(receiver);
        self
    }

    /// Sets the output printed before reaching this line.
    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    fn depth(&self) -> usize {
        self.call_stack.len()
    }
}

/// A heap object known to the scripted program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptedObject {
    /// Object identity
    pub id: ObjectId,
    /// Object contents
    #[serde(flatten)]
    pub node: ObjectNode,
}

/// A complete scripted execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    /// Every line the program passes through, in execution order
    pub pauses: Vec<ScriptedPause>,
    /// Heap objects referenced by the pauses
    #[serde(default)]
    pub objects: Vec<ScriptedObject>,
    /// Whether symbol tables are available
    #[serde(default = "default_debug_info")]
    pub debug_info: bool,
    /// Deliver the first line as a pause, like an initial breakpoint
    #[serde(default)]
    pub stop_at_start: bool,
}

fn default_debug_info() -> bool {
    true
}

impl Script {
    /// A script over `pauses` with debug info and no initial stop.
    pub fn new(pauses: Vec<ScriptedPause>) -> Self {
        Self { pauses, objects: Vec::new(), debug_info: true, stop_at_start: false }
    }
}

#[derive(Debug, Clone)]
struct ArmedStep {
    thread: ThreadId,
    depth: StepDepth,
    base_depth: usize,
    exclusions: Vec<String>,
}

/// Scripted [`LiveDebugSource`] implementation.
#[derive(Debug)]
pub struct ScriptedSource {
    pauses: Vec<ScriptedPause>,
    objects: BTreeMap<ObjectId, ObjectNode>,
    debug_info: bool,
    stop_at_start: bool,

    /// Index of the next line to execute
    next: usize,
    /// Line the program is suspended at
    current: Option<usize>,
    suspended: bool,
    disconnected: bool,

    step: Option<ArmedStep>,
    breakpoints: BTreeSet<(String, usize)>,
    method_entries: BTreeSet<String>,

    output: Option<OutputBuffer>,
    resumes: usize,
}

impl ScriptedSource {
    /// Creates a source that will execute `script`.
    pub fn new(script: Script) -> Self {
        let Script { pauses, objects, debug_info, stop_at_start } = script;
        Self {
            pauses,
            objects: objects.into_iter().map(|object| (object.id, object.node)).collect(),
            debug_info,
            stop_at_start,
            next: 0,
            current: None,
            suspended: false,
            disconnected: false,
            step: None,
            breakpoints: BTreeSet::new(),
            method_entries: BTreeSet::new(),
            output: None,
            resumes: 0,
        }
    }

    /// Creates a source from a list of lines, stopping at the first one.
    pub fn from_pauses(pauses: Vec<ScriptedPause>) -> Self {
        Self::new(Script { stop_at_start: true, ..Script::new(pauses) })
    }

    /// Parses a JSON script.
    pub fn from_json(json: &str) -> Result<Self> {
        let script: Script = serde_json::from_str(json).wrap_err("Failed to parse debug script")?;
        Ok(Self::new(script))
    }

    /// Appends the program's output to `output` as execution passes each line.
    pub fn with_output(mut self, output: OutputBuffer) -> Self {
        self.output = Some(output);
        self
    }

    /// Adds a heap object.
    pub fn with_object(mut self, id: ObjectId, node: ObjectNode) -> Self {
        self.objects.insert(id, node);
        self
    }

    /// Number of times the program was resumed.
    pub fn resume_count(&self) -> usize {
        self.resumes
    }

    /// Installed breakpoint devices, as `(file, line)`.
    pub fn installed_breakpoints(&self) -> &BTreeSet<(String, usize)> {
        &self.breakpoints
    }

    /// Whether the program is currently suspended.
    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Whether the program has finished.
    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }

    fn ensure_connected(&self) -> DebugResult<()> {
        if self.disconnected {
            return Err(DebugError::invalid_state("The debugged program has disconnected"));
        }
        Ok(())
    }

    fn ensure_debug_info(&self) -> DebugResult<()> {
        if !self.debug_info {
            return Err(DebugError::missing_debug_info("No debug information available"));
        }
        Ok(())
    }

    /// The line `thread` is suspended at.
    fn suspended_pause(&self, thread: ThreadId) -> DebugResult<&ScriptedPause> {
        self.ensure_connected()?;
        match self.current.map(|index| &self.pauses[index]) {
            Some(pause) if self.suspended && pause.thread == thread => Ok(pause),
            _ => Err(DebugError::invalid_state(format!("Thread {thread} is not suspended"))),
        }
    }

    fn opens_call(&self, index: usize) -> bool {
        let previous = index.checked_sub(1).map_or(0, |prev| self.pauses[prev].depth());
        self.pauses[index].depth() > previous
    }

    fn enters_requested_method(&self, index: usize) -> bool {
        let method = &self.pauses[index].location.method;
        self.opens_call(index) && self.method_entries.iter().any(|name| method.matches_name(name))
    }

    fn pause_kind(&self, index: usize) -> Option<PauseKind> {
        let pause = &self.pauses[index];

        if self.breakpoints.contains(&(pause.location.file.clone(), pause.location.line)) {
            return Some(PauseKind::Breakpoint);
        }

        if let Some(step) = &self.step {
            let in_scope = match step.depth {
                StepDepth::Into => true,
                StepDepth::Over => pause.depth() <= step.base_depth,
            };
            if pause.thread == step.thread
                && in_scope
                && !is_excluded(&pause.location.method.declaring_type, &step.exclusions)
            {
                return Some(PauseKind::Step);
            }
        }

        if self.enters_requested_method(index) {
            return Some(PauseKind::MethodEntry);
        }

        if index == 0 && self.stop_at_start {
            return Some(PauseKind::Step);
        }

        None
    }
}

impl LiveDebugSource for ScriptedSource {
    fn next_event(&mut self) -> DebugResult<SourceEvent> {
        if self.disconnected {
            return Ok(SourceEvent::Disconnected);
        }
        if self.suspended {
            return Err(DebugError::invalid_state(
                "The program is suspended; resume it before waiting for the next event",
            ));
        }

        while self.next < self.pauses.len() {
            let index = self.next;
            self.next += 1;

            if let (Some(buffer), Some(text)) = (&self.output, &self.pauses[index].output) {
                buffer.append(text);
            }

            if let Some(kind) = self.pause_kind(index) {
                let method_entry = self.enters_requested_method(index);
                let pause = &self.pauses[index];
                trace!(index, ?kind, location = %pause.location, "Scripted program paused");

                self.current = Some(index);
                self.suspended = true;
                self.step = None;
                return Ok(SourceEvent::Paused(PauseEvent {
                    thread: pause.thread,
                    location: pause.location.clone(),
                    kind,
                    method_entry,
                }));
            }
        }

        self.current = None;
        self.disconnected = true;
        Ok(SourceEvent::Disconnected)
    }

    fn resume(&mut self) -> DebugResult<()> {
        self.ensure_connected()?;
        if !self.suspended {
            return Err(DebugError::invalid_state("The program is not suspended"));
        }
        self.suspended = false;
        self.resumes += 1;
        Ok(())
    }

    fn visible_variables(&self, thread: ThreadId) -> DebugResult<Vec<CapturedVariable>> {
        let pause = self.suspended_pause(thread)?;
        self.ensure_debug_info()?;
        Ok(pause.variables.clone())
    }

    fn call_stack(&self, thread: ThreadId) -> DebugResult<Vec<FrameDescriptor>> {
        Ok(self.suspended_pause(thread)?.call_stack.clone())
    }

    fn receiver(&self, thread: ThreadId) -> DebugResult<Option<CapturedValue>> {
        Ok(self.suspended_pause(thread)?.receiver.clone())
    }

    fn object(&self, id: ObjectId) -> DebugResult<Option<ObjectNode>> {
        self.ensure_connected()?;
        Ok(self.objects.get(&id).cloned())
    }

    fn resolve(&self, file: &str, line: usize) -> DebugResult<Option<CodeLocation>> {
        self.ensure_connected()?;
        self.ensure_debug_info()?;
        Ok(self
            .pauses
            .iter()
            .find(|pause| pause.location.is_at(file, line))
            .map(|pause| pause.location.clone()))
    }

    fn install_breakpoint(&mut self, location: &CodeLocation) -> DebugResult<()> {
        self.ensure_connected()?;
        self.breakpoints.insert((location.file.clone(), location.line));
        Ok(())
    }

    fn uninstall_breakpoint(&mut self, file: &str, line: usize) -> DebugResult<()> {
        self.ensure_connected()?;
        self.breakpoints.remove(&(file.to_string(), line));
        Ok(())
    }

    fn install_method_entry(&mut self, method: &str) -> DebugResult<()> {
        self.ensure_connected()?;
        if !self.pauses.iter().any(|pause| pause.location.method.matches_name(method)) {
            return Err(DebugError::not_found(format!("Method '{method}' not found")));
        }
        self.method_entries.insert(method.to_string());
        Ok(())
    }

    fn arm_single_step(
        &mut self,
        thread: ThreadId,
        depth: StepDepth,
        exclusions: &[String],
    ) -> DebugResult<()> {
        let base_depth = self.suspended_pause(thread)?.depth();
        self.step = Some(ArmedStep { thread, depth, base_depth, exclusions: exclusions.to_vec() });
        Ok(())
    }

    fn read_local(&self, thread: ThreadId, name: &str) -> DebugResult<Option<CapturedVariable>> {
        let pause = self.suspended_pause(thread)?;
        self.ensure_debug_info()?;
        Ok(pause.variables.iter().find(|var| var.name == name).cloned())
    }

    fn read_field(&self, receiver: ObjectId, name: &str) -> DebugResult<Option<CapturedValue>> {
        self.ensure_connected()?;
        Ok(self
            .objects
            .get(&receiver)
            .and_then(|node| node.field(name))
            .map(|field| field.value.clone()))
    }
}
