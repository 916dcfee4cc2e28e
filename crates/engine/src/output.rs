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

//! Program output captured during recording.
//!
//! The debugged program writes to stdout and stderr. Both streams are drained by
//! background tasks into one shared, append-only buffer; every snapshot stores the
//! buffer contents at the moment it was taken.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use parking_lot::Mutex;
use rewind_common::{DebugError, DebugResult};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    task::JoinHandle,
};
use tracing::{debug, warn};

/// Number of streams that may feed one buffer (stdout and stderr).
pub const MAX_READERS: usize = 2;

/// Shared, append-only program output.
#[derive(Debug, Clone, Default)]
pub struct OutputBuffer {
    inner: Arc<Mutex<String>>,
    readers: Arc<AtomicUsize>,
}

impl OutputBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends text.
    pub fn append(&self, text: &str) {
        self.inner.lock().push_str(text);
    }

    /// Everything appended so far.
    pub fn contents(&self) -> String {
        self.inner.lock().clone()
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether nothing was appended yet.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Spawns a task that drains `stream` into the buffer line by line until EOF.
    ///
    /// At most [`MAX_READERS`] streams can be attached; further attempts fail with
    /// `InvalidState`. Must be called from within a tokio runtime.
    pub fn spawn_reader<R>(&self, name: &'static str, stream: R) -> DebugResult<JoinHandle<()>>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let attached = self
            .readers
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| {
                (count < MAX_READERS).then_some(count + 1)
            })
            .map_err(|_| {
                DebugError::invalid_state(format!(
                    "Output buffer already has {MAX_READERS} readers attached"
                ))
            })?;
        debug!(stream = name, reader = attached + 1, "Attaching output reader");

        let buffer = self.clone();
        Ok(tokio::spawn(async move {
            let mut reader = BufReader::new(stream);
            let mut line = Vec::new();
            loop {
                line.clear();
                match reader.read_until(b'\n', &mut line).await {
                    Ok(0) => break,
                    Ok(_) => buffer.append(&String::from_utf8_lossy(&line)),
                    Err(e) => {
                        warn!(stream = name, "Failed to read program output: {e}");
                        break;
                    }
                }
            }
            debug!(stream = name, "Output stream closed");
        }))
    }
}
