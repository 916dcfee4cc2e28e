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

//! Rewind Engine - trace recording and replay
//!
//! A [`Session`] consumes pause events from a [`LiveDebugSource`], records each stopping
//! pause as an immutable snapshot on the [`TimelineManager`], and switches to replay
//! for good once the program disconnects.

pub mod breakpoints;
pub use breakpoints::*;

pub mod capture;
pub use capture::*;

pub mod inspect;
pub use inspect::*;

pub mod output;
pub use output::*;

pub mod session;
pub use session::*;

pub mod source;
pub use source::*;

pub mod strategy;
pub use strategy::*;

pub mod timeline;
pub use timeline::*;
