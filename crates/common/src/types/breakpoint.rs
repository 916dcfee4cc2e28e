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

use std::{fmt::Display, str::FromStr};

use eyre::{bail, eyre, Error, Result};
use serde::{Deserialize, Serialize};

/// When a breakpoint actually stops execution.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum StopPolicy {
    /// Stop on every hit.
    Normal,
    /// Stop on the first hit only; the breakpoint is removed afterwards.
    Once,
    /// Stop from the n-th hit onward.
    OnCount(usize),
}

/// A source-line breakpoint with its stop policy and hit counter.
///
/// Breakpoints are keyed by `"file:line"` (see [`Breakpoint::key`]). The same type and
/// the same hit evaluation ([`Breakpoint::register_hit`]) serve both live and replayed
/// navigation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Breakpoint {
    file: String,
    line: usize,
    policy: StopPolicy,
    hit_count: usize,
}

impl Display for Breakpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file, self.line)?;
        match self.policy {
            StopPolicy::Normal => Ok(()),
            StopPolicy::Once => write!(f, " [once]"),
            StopPolicy::OnCount(target) => write!(f, " [count: {}/{target}]", self.hit_count),
        }
    }
}

impl FromStr for Breakpoint {
    type Err = Error;

    /// Parses a breakpoint from a string.
    /// Format: `<file>:<line> [once | count <n>]`
    /// Examples:
    /// - `Point.java:12` - Normal breakpoint
    /// - `Point.java:12 once` - Removed after its first stop
    /// - `Point.java:12 count 3` - Stops from the third hit onward
    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split_whitespace();
        let Some(loc) = parts.next() else {
            bail!("Empty breakpoint specification");
        };

        let (file, line) = loc
            .rsplit_once(':')
            .ok_or_else(|| eyre!("Invalid breakpoint location, expected <file>:<line>, got: {loc}"))?;
        if file.is_empty() {
            bail!("Missing file name in breakpoint location: {loc}");
        }
        let line = line.parse::<usize>().map_err(|e| eyre!("Invalid line number: {e}"))?;

        let policy = match (parts.next(), parts.next()) {
            (None, _) => StopPolicy::Normal,
            (Some("once"), None) => StopPolicy::Once,
            (Some("count"), Some(n)) => {
                StopPolicy::OnCount(n.parse::<usize>().map_err(|e| eyre!("Invalid count: {e}"))?)
            }
            _ => bail!("Invalid breakpoint format. Expected <file>:<line> [once | count <n>], got: {s}"),
        };

        if parts.next().is_some() {
            bail!("Trailing input in breakpoint specification: {s}");
        }

        Ok(Self::new(file, line, policy))
    }
}

impl Breakpoint {
    /// Creates a breakpoint with the given stop policy and no hits.
    pub fn new(file: impl Into<String>, line: usize, policy: StopPolicy) -> Self {
        Self { file: file.into(), line, policy, hit_count: 0 }
    }

    /// Creates a breakpoint that stops on every hit.
    pub fn normal(file: impl Into<String>, line: usize) -> Self {
        Self::new(file, line, StopPolicy::Normal)
    }

    /// Creates a breakpoint that stops once.
    pub fn once(file: impl Into<String>, line: usize) -> Self {
        Self::new(file, line, StopPolicy::Once)
    }

    /// Creates a breakpoint that stops from the `count`-th hit onward.
    pub fn on_count(file: impl Into<String>, line: usize, count: usize) -> Self {
        Self::new(file, line, StopPolicy::OnCount(count))
    }

    /// Map key for a location: `"file:line"`.
    pub fn location_key(file: &str, line: usize) -> String {
        format!("{file}:{line}")
    }

    /// Map key of this breakpoint.
    pub fn key(&self) -> String {
        Self::location_key(&self.file, self.line)
    }

    /// Source file.
    pub fn file(&self) -> &str {
        &self.file
    }

    /// Line number (1-based).
    pub fn line(&self) -> usize {
        self.line
    }

    /// Stop policy.
    pub fn policy(&self) -> StopPolicy {
        self.policy
    }

    /// Number of visits so far, stopping or not.
    pub fn hit_count(&self) -> usize {
        self.hit_count
    }

    /// Returns true if this breakpoint sits on `file:line`.
    pub fn matches(&self, file: &str, line: usize) -> bool {
        self.line == line && self.file == file
    }

    /// Whether the next visit stops, evaluated against the hits recorded so far.
    ///
    /// Normal always stops. Once stops while no hit has been recorded. `OnCount(n)`
    /// stops when the next visit is the n-th or later, so visits 1..n-1 pass through.
    pub fn should_stop(&self) -> bool {
        match self.policy {
            StopPolicy::Normal => true,
            StopPolicy::Once => self.hit_count == 0,
            StopPolicy::OnCount(target) => self.hit_count + 1 >= target,
        }
    }

    /// Forgets every recorded visit.
    pub fn reset_hits(&mut self) {
        self.hit_count = 0;
    }

    /// Records one visit and returns whether it stops.
    ///
    /// The decision is taken before the counter is incremented. The counter is
    /// incremented on every visit, whether it stops or not.
    pub fn register_hit(&mut self) -> bool {
        let stop = self.should_stop();
        self.hit_count += 1;
        stop
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_breakpoint_from_str_normal() {
        let bp = Breakpoint::from_str("Point.java:12").unwrap();
        assert_eq!(bp.file(), "Point.java");
        assert_eq!(bp.line(), 12);
        assert_eq!(bp.policy(), StopPolicy::Normal);
        assert_eq!(bp.hit_count(), 0);
    }

    #[test]
    fn test_breakpoint_from_str_policies() {
        let bp = Breakpoint::from_str("  Point.java:12   once ").unwrap();
        assert_eq!(bp.policy(), StopPolicy::Once);

        let bp = Breakpoint::from_str("Point.java:12 count 3").unwrap();
        assert_eq!(bp.policy(), StopPolicy::OnCount(3));
    }

    #[test]
    fn test_breakpoint_from_str_path_with_colon() {
        let bp = Breakpoint::from_str("C:/src/Point.java:12").unwrap();
        assert_eq!(bp.file(), "C:/src/Point.java");
        assert_eq!(bp.line(), 12);
    }

    #[test]
    fn test_breakpoint_from_str_invalid() {
        // Empty
        assert!(Breakpoint::from_str("").is_err());
        assert!(Breakpoint::from_str("   ").is_err());

        // Missing line
        assert!(Breakpoint::from_str("Point.java").is_err());
        assert!(Breakpoint::from_str(":12").is_err());

        // Invalid line
        assert!(Breakpoint::from_str("Point.java:twelve").is_err());

        // Invalid policy
        assert!(Breakpoint::from_str("Point.java:12 twice").is_err());
        assert!(Breakpoint::from_str("Point.java:12 count").is_err());
        assert!(Breakpoint::from_str("Point.java:12 count x").is_err());
        assert!(Breakpoint::from_str("Point.java:12 once more").is_err());
    }

    #[test]
    fn test_breakpoint_display() {
        assert_eq!(Breakpoint::normal("T.java", 10).to_string(), "T.java:10");
        assert_eq!(Breakpoint::once("T.java", 10).to_string(), "T.java:10 [once]");

        let mut bp = Breakpoint::on_count("T.java", 10, 3);
        bp.register_hit();
        assert_eq!(bp.to_string(), "T.java:10 [count: 1/3]");
    }

    #[test]
    fn test_breakpoint_key() {
        let bp = Breakpoint::normal("T.java", 10);
        assert_eq!(bp.key(), "T.java:10");
        assert_eq!(Breakpoint::location_key("T.java", 10), bp.key());
        assert!(bp.matches("T.java", 10));
        assert!(!bp.matches("T.java", 11));
        assert!(!bp.matches("U.java", 10));
    }

    #[test]
    fn test_normal_always_stops() {
        let mut bp = Breakpoint::normal("T.java", 10);
        for _ in 0..5 {
            assert!(bp.register_hit());
        }
        assert_eq!(bp.hit_count(), 5);
    }

    #[test]
    fn test_once_stops_exactly_once() {
        let mut bp = Breakpoint::once("T.java", 10);
        let stops = (0..10).filter(|_| bp.register_hit()).count();
        assert_eq!(stops, 1);
        assert_eq!(bp.hit_count(), 10);
    }

    #[test]
    fn test_once_stops_on_first_hit() {
        let mut bp = Breakpoint::once("T.java", 10);
        assert!(bp.should_stop());
        assert!(bp.register_hit());
        assert!(!bp.should_stop());
    }

    #[test]
    fn test_on_count_stops_from_nth_hit() {
        let mut bp = Breakpoint::on_count("T.java", 10, 3);
        let decisions: Vec<bool> = (0..6).map(|_| bp.register_hit()).collect();
        assert_eq!(decisions, vec![false, false, true, true, true, true]);
    }

    #[test]
    fn test_on_count_degenerate_targets() {
        let mut zero = Breakpoint::on_count("T.java", 10, 0);
        assert!(zero.register_hit());

        let mut one = Breakpoint::on_count("T.java", 10, 1);
        assert!(one.register_hit());
    }

    #[test]
    fn test_breakpoint_serde() {
        let mut bp = Breakpoint::on_count("T.java", 10, 2);
        bp.register_hit();
        let json = serde_json::to_string(&bp).unwrap();
        let back: Breakpoint = serde_json::from_str(&json).unwrap();
        assert_eq!(bp, back);
        assert_eq!(back.hit_count(), 1);
    }
}
