//! Stable function identifier.
//!
//! A [`FunctionId`] is the registration index of a function inside its
//! [`Registry`](crate::registry::Registry) and doubles as the petgraph node
//! index in the [`DependencyGraph`](crate::graph::DependencyGraph).

use std::fmt;

use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};

/// Function identity within a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FunctionId(pub u32);

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Bridge between FunctionId and petgraph's NodeIndex<u32>.

impl From<NodeIndex<u32>> for FunctionId {
    fn from(idx: NodeIndex<u32>) -> Self {
        FunctionId(idx.index() as u32)
    }
}

impl From<FunctionId> for NodeIndex<u32> {
    fn from(id: FunctionId) -> Self {
        NodeIndex::new(id.0 as usize)
    }
}
