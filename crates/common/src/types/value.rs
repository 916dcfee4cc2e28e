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

//! Captured runtime values.
//!
//! A value is classified once, when it is captured from the live source, into one of
//! the closed shapes of [`CapturedValue`]. Rendering and history comparison work on
//! that classification only, so a recorded value never needs the process it came from.
//!
//! Objects reachable from the captured variables are copied into an [`ObjectGraph`].
//! The graph is collected with a visited-identity set and a node budget, which keeps
//! the traversal finite on cyclic structures without cutting it at a fixed depth.

use std::{
    collections::{BTreeMap, HashSet, VecDeque},
    fmt,
};

use serde::{Deserialize, Serialize};

/// Identity of a heap object in the debuggee, as reported by the live source.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::From,
)]
pub struct ObjectId(pub u64);

/// A value read from the paused program.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CapturedValue {
    /// A primitive (number, boolean, char, string literal), already rendered.
    Primitive(String),
    /// A reference to a heap object.
    Reference {
        /// Runtime type of the referenced object
        type_name: String,
        /// Identity of the referenced object
        id: ObjectId,
    },
    /// A reference to an array object.
    Array {
        /// Runtime type of the array, e.g. `int[]`
        type_name: String,
        /// Identity of the array object
        id: ObjectId,
        /// Number of elements
        length: usize,
    },
    /// The null reference.
    Null,
}

impl CapturedValue {
    /// Creates a primitive value from anything printable.
    pub fn primitive(value: impl ToString) -> Self {
        Self::Primitive(value.to_string())
    }

    /// Creates an object reference.
    pub fn reference(type_name: impl Into<String>, id: u64) -> Self {
        Self::Reference { type_name: type_name.into(), id: ObjectId(id) }
    }

    /// Creates an array reference.
    pub fn array(type_name: impl Into<String>, id: u64, length: usize) -> Self {
        Self::Array { type_name: type_name.into(), id: ObjectId(id), length }
    }

    /// The object this value points to, if any.
    pub fn object_id(&self) -> Option<ObjectId> {
        match self {
            Self::Reference { id, .. } | Self::Array { id, .. } => Some(*id),
            Self::Primitive(_) | Self::Null => None,
        }
    }

    /// Returns true for the null reference.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl fmt::Display for CapturedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive(value) => f.write_str(value),
            Self::Reference { type_name, id } => write!(f, "{type_name}@{id}"),
            Self::Array { type_name, id, length } => {
                // `int[]` renders as `int[3]@7`
                let element = type_name.strip_suffix("[]").unwrap_or(type_name);
                write!(f, "{element}[{length}]@{id}")
            }
            Self::Null => f.write_str("null"),
        }
    }
}

/// A local variable visible in a frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedVariable {
    /// Variable name
    pub name: String,
    /// Declared type, as reported by the source
    pub type_name: String,
    /// Value at capture time
    pub value: CapturedValue,
    /// Whether the variable is an argument of the enclosing method
    #[serde(default)]
    pub is_argument: bool,
}

impl CapturedVariable {
    /// Creates a local (non-argument) variable.
    pub fn local(name: impl Into<String>, type_name: impl Into<String>, value: CapturedValue) -> Self {
        Self { name: name.into(), type_name: type_name.into(), value, is_argument: false }
    }

    /// Creates a method argument.
    pub fn argument(
        name: impl Into<String>,
        type_name: impl Into<String>,
        value: CapturedValue,
    ) -> Self {
        Self { name: name.into(), type_name: type_name.into(), value, is_argument: true }
    }
}

impl fmt::Display for CapturedVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) = {}", self.name, self.type_name, self.value)
    }
}

/// A named field (or array element) of a captured object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldValue {
    /// Field name; array elements use `[index]`
    pub name: String,
    /// Declared type of the field
    pub type_name: String,
    /// Value at capture time
    pub value: CapturedValue,
}

impl FieldValue {
    /// Creates a field value.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>, value: CapturedValue) -> Self {
        Self { name: name.into(), type_name: type_name.into(), value }
    }
}

/// The captured contents of one heap object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectNode {
    /// Runtime type of the object
    pub type_name: String,
    /// Fields in declaration order
    pub fields: Vec<FieldValue>,
}

impl ObjectNode {
    /// Creates an object node.
    pub fn new(type_name: impl Into<String>, fields: Vec<FieldValue>) -> Self {
        Self { type_name: type_name.into(), fields }
    }

    /// Looks up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|field| field.name == name)
    }
}

/// Objects reachable from a snapshot's roots, keyed by identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectGraph {
    nodes: BTreeMap<ObjectId, ObjectNode>,
    /// Set when the node budget stopped the traversal with identities still queued.
    /// Those may turn out unknown, so the graph is possibly, not certainly, incomplete.
    truncated: bool,
}

impl ObjectGraph {
    /// Collects the objects reachable from `roots`, breadth first.
    ///
    /// `fetch` returns the contents of one object, or `None` when the source no longer
    /// knows it. Every identity is fetched at most once. At most `budget` objects are
    /// copied; if the budget runs out with identities still queued the graph is marked
    /// as truncated, meaning it may be incomplete. Queued identities are not fetched just
    /// to check whether they still exist.
    pub fn collect<E, F>(
        roots: impl IntoIterator<Item = ObjectId>,
        budget: usize,
        mut fetch: F,
    ) -> Result<Self, E>
    where
        F: FnMut(ObjectId) -> Result<Option<ObjectNode>, E>,
    {
        let mut graph = Self::default();
        let mut visited = HashSet::new();
        let mut queue: VecDeque<ObjectId> = VecDeque::new();

        for root in roots {
            if visited.insert(root) {
                queue.push_back(root);
            }
        }

        while let Some(id) = queue.pop_front() {
            if graph.nodes.len() >= budget {
                graph.truncated = true;
                break;
            }

            let Some(node) = fetch(id)? else { continue };
            for child in node.fields.iter().filter_map(|field| field.value.object_id()) {
                if visited.insert(child) {
                    queue.push_back(child);
                }
            }
            graph.nodes.insert(id, node);
        }

        Ok(graph)
    }

    /// Looks up a captured object.
    pub fn get(&self, id: ObjectId) -> Option<&ObjectNode> {
        self.nodes.get(&id)
    }

    /// Returns true if the object was captured.
    pub fn contains(&self, id: ObjectId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Number of captured objects.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if no object was captured.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether the traversal hit its node budget, i.e. the graph may be incomplete.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Iterates captured objects in identity order.
    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, &ObjectNode)> {
        self.nodes.iter().map(|(id, node)| (*id, node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    fn node(type_name: &str, fields: Vec<(&str, CapturedValue)>) -> ObjectNode {
        ObjectNode::new(
            type_name,
            fields.into_iter().map(|(name, value)| FieldValue::new(name, "Object", value)).collect(),
        )
    }

    #[test]
    fn test_value_display() {
        assert_eq!(CapturedValue::primitive(42).to_string(), "42");
        assert_eq!(CapturedValue::reference("Point", 7).to_string(), "Point@7");
        assert_eq!(CapturedValue::array("int[]", 3, 5).to_string(), "int[5]@3");
        assert_eq!(CapturedValue::Null.to_string(), "null");
    }

    #[test]
    fn test_object_id() {
        assert_eq!(CapturedValue::reference("Point", 7).object_id(), Some(ObjectId(7)));
        assert_eq!(CapturedValue::array("int[]", 3, 5).object_id(), Some(ObjectId(3)));
        assert_eq!(CapturedValue::primitive("1").object_id(), None);
        assert_eq!(CapturedValue::Null.object_id(), None);
    }

    #[test]
    fn test_collect_cyclic_graph_terminates() {
        // 1 -> 2 -> 1, a two-node cycle
        let mut heap = BTreeMap::new();
        heap.insert(ObjectId(1), node("Node", vec![("next", CapturedValue::reference("Node", 2))]));
        heap.insert(ObjectId(2), node("Node", vec![("next", CapturedValue::reference("Node", 1))]));

        let mut fetches = 0;
        let graph = ObjectGraph::collect([ObjectId(1)], 100, |id| {
            fetches += 1;
            Ok::<_, Infallible>(heap.get(&id).cloned())
        })
        .unwrap();

        assert_eq!(graph.len(), 2);
        assert_eq!(fetches, 2);
        assert!(!graph.is_truncated());
        let back = graph.get(ObjectId(2)).unwrap().field("next").unwrap();
        assert_eq!(back.value.object_id(), Some(ObjectId(1)));
    }

    #[test]
    fn test_collect_respects_budget() {
        // A linked list of 10 nodes
        let heap: BTreeMap<_, _> = (0..10u64)
            .map(|i| {
                let next =
                    if i < 9 { CapturedValue::reference("Node", i + 1) } else { CapturedValue::Null };
                (ObjectId(i), node("Node", vec![("next", next)]))
            })
            .collect();

        let graph =
            ObjectGraph::collect([ObjectId(0)], 4, |id| Ok::<_, Infallible>(heap.get(&id).cloned()))
                .unwrap();

        assert_eq!(graph.len(), 4);
        assert!(graph.is_truncated());
        assert!(graph.contains(ObjectId(3)));
        assert!(!graph.contains(ObjectId(4)));
    }

    #[test]
    fn test_truncation_only_means_possibly_incomplete() {
        // Node 0 points at an identity the heap no longer knows
        let heap = BTreeMap::from([(
            ObjectId(0),
            node("Node", vec![("next", CapturedValue::reference("Node", 7))]),
        )]);
        let fetch = |id: ObjectId| Ok::<_, Infallible>(heap.get(&id).cloned());

        let graph = ObjectGraph::collect([ObjectId(0)], 1, fetch).unwrap();
        assert_eq!(graph.len(), 1);
        assert!(graph.is_truncated());

        // With room left the unknown identity is fetched and skipped
        let graph = ObjectGraph::collect([ObjectId(0)], 2, fetch).unwrap();
        assert_eq!(graph.len(), 1);
        assert!(!graph.is_truncated());
    }

    #[test]
    fn test_collect_skips_unknown_objects() {
        let graph = ObjectGraph::collect([ObjectId(1), ObjectId(1)], 10, |_| {
            Ok::<Option<ObjectNode>, Infallible>(None)
        })
        .unwrap();
        assert!(graph.is_empty());
    }

    #[test]
    fn test_collect_propagates_errors() {
        let result = ObjectGraph::collect([ObjectId(1)], 10, |_| Err("gone"));
        assert_eq!(result, Err("gone"));
    }
}
