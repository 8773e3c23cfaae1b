//! Member selection for object graphs.
//!
//! A [Graph] names the members of an object that take part in an encode or decode pass and,
//! optionally, a nested graph for each selected member. The same graph must be used on both
//! sides. Bounding a graph is how callers serialize cyclic or deep structures partially.
//!
//! ```
//! use strata_codec::Graph;
//!
//! // Everything on the root, but only the `name` of each child.
//! let graph = Graph::all().with_child("children", Graph::only(["name"]));
//! assert!(graph.includes("children"));
//! assert!(graph.child("children").unwrap().includes("name"));
//! assert!(!graph.child("children").unwrap().includes("children"));
//! ```

use std::{collections::BTreeMap, sync::Arc};

/// A structural filter over object members.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Graph {
    include_all: bool,
    members: BTreeMap<String, Option<Arc<Graph>>>,
    excluded: Vec<String>,
}

impl Graph {
    /// Selects every member, with no nested restriction.
    pub fn all() -> Self {
        Self {
            include_all: true,
            ..Self::default()
        }
    }

    /// Selects only the named members.
    pub fn only<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            include_all: false,
            members: members.into_iter().map(|m| (m.into(), None)).collect(),
            excluded: Vec::new(),
        }
    }

    /// Adds a member to the selection.
    pub fn with(mut self, member: impl Into<String>) -> Self {
        self.members.entry(member.into()).or_insert(None);
        self
    }

    /// Adds a member with a nested graph applied to its value.
    pub fn with_child(mut self, member: impl Into<String>, child: Graph) -> Self {
        self.members.insert(member.into(), Some(Arc::new(child)));
        self
    }

    /// Removes a member from the selection.
    pub fn without(mut self, member: impl Into<String>) -> Self {
        let member = member.into();
        self.members.remove(&member);
        self.excluded.push(member);
        self
    }

    /// Returns true if the member takes part in the pass.
    pub fn includes(&self, member: &str) -> bool {
        if self.excluded.iter().any(|m| m == member) {
            return false;
        }
        self.include_all || self.members.contains_key(member)
    }

    /// Returns the nested graph for a member, if one was given.
    pub fn child(&self, member: &str) -> Option<&Arc<Graph>> {
        self.members.get(member).and_then(Option::as_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_and_without() {
        let graph = Graph::only(["a", "b"]).without("b");
        assert!(graph.includes("a"));
        assert!(!graph.includes("b"));
        assert!(!graph.includes("c"));

        let graph = Graph::all().without("secret");
        assert!(graph.includes("anything"));
        assert!(!graph.includes("secret"));
    }

    #[test]
    fn test_nested() {
        let graph = Graph::only(["a"]).with_child("b", Graph::only(["c"]));
        assert!(graph.includes("b"));
        assert!(graph.child("a").is_none());
        assert!(graph.child("b").unwrap().includes("c"));
    }
}
