//! The static dependency graph over a [`Registry`].
//!
//! Nodes are functions (node index == [`FunctionId`]); a directed edge
//! `caller -> callee` is either a scanned call or a `monitor` annotation.
//! `ignore` annotations are resolved here but never become edges: they only
//! filter the declaring function's own effective set at hashing time.

use std::collections::{BTreeSet, VecDeque};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};

use crate::category::Category;
use crate::diagnostic::Diagnostic;
use crate::error::CoreError;
use crate::function::base_name;
use crate::id::FunctionId;
use crate::registry::Registry;
use crate::scan;

/// How an edge was discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    /// The callee appears as a call target in the caller's source.
    Call,
    /// The caller declares `monitor` for the callee.
    Monitor,
}

/// How far a dependency query reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Depth {
    /// Only immediate neighbours.
    Direct,
    /// The full closure.
    #[default]
    Transitive,
}

/// One entry of a dependency query result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyInfo {
    pub name: String,
    pub category: Category,
}

/// Call and monitor edges between registered functions.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    registry: Registry,
    graph: DiGraph<FunctionId, DependencyKind, u32>,
    /// Resolved `ignore` set per function, indexed by `FunctionId`.
    ignored: Vec<BTreeSet<FunctionId>>,
    diagnostics: Vec<Diagnostic>,
}

impl DependencyGraph {
    /// Scans every registered source and builds the graph.
    ///
    /// Scanned references count only when they resolve to a function of a
    /// scanned category; unresolved calls named like pipeline functions are
    /// reported as [`Diagnostic::UnresolvedDependency`]. Monitored names may resolve to any function; unresolved ones
    /// are reported as [`Diagnostic::UnresolvedDependency`] and dropped.
    pub fn build(registry: Registry) -> Self {
        let mut graph = DiGraph::with_capacity(registry.len(), registry.len());
        for descriptor in registry.iter() {
            graph.add_node(descriptor.id);
        }

        let mut diagnostics = registry.diagnostics().to_vec();
        let mut ignored = Vec::with_capacity(registry.len());

        for descriptor in registry.iter() {
            let caller: NodeIndex<u32> = descriptor.id.into();

            for reference in scan::references(&descriptor.source) {
                let Some(callee) = registry.resolve(&reference) else {
                    continue;
                };
                let scanned = registry
                    .get(callee)
                    .is_some_and(|target| target.category.is_scanned());
                if callee == descriptor.id || !scanned {
                    continue;
                }
                if graph.find_edge(caller, callee.into()).is_none() {
                    graph.add_edge(caller, callee.into(), DependencyKind::Call);
                }
            }

            // Calls that look like pipeline functions but are not registered.
            for reference in scan::call_targets(&descriptor.source) {
                if registry.resolve(&reference).is_none()
                    && Category::follows_convention(base_name(&reference))
                {
                    let diag = Diagnostic::UnresolvedDependency {
                        function: descriptor.name.clone(),
                        reference,
                    };
                    diag.emit();
                    diagnostics.push(diag);
                }
            }

            for reference in descriptor.monitor_deps() {
                match registry.resolve(reference) {
                    Some(target) if target == descriptor.id => {}
                    Some(target) => {
                        if graph.find_edge(caller, target.into()).is_none() {
                            graph.add_edge(caller, target.into(), DependencyKind::Monitor);
                        }
                    }
                    None => {
                        let diag = Diagnostic::UnresolvedDependency {
                            function: descriptor.name.clone(),
                            reference: reference.to_string(),
                        };
                        diag.emit();
                        diagnostics.push(diag);
                    }
                }
            }

            let ignore: BTreeSet<FunctionId> = descriptor
                .ignore_deps()
                .filter_map(|reference| {
                    let resolved = registry.resolve(reference);
                    if resolved.is_none() {
                        tracing::debug!(
                            function = %descriptor.name,
                            reference,
                            "ignored name is not registered"
                        );
                    }
                    resolved
                })
                .collect();
            ignored.push(ignore);
        }

        tracing::debug!(
            functions = graph.node_count(),
            edges = graph.edge_count(),
            "built dependency graph"
        );

        DependencyGraph {
            registry,
            graph,
            ignored,
            diagnostics,
        }
    }

    // -----------------------------------------------------------------------
    // Read-only accessors
    // -----------------------------------------------------------------------

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The underlying petgraph graph.
    pub fn graph(&self) -> &DiGraph<FunctionId, DependencyKind, u32> {
        &self.graph
    }

    /// Every recoverable issue found during registration and graph building.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Functions `id` names in an `ignore` annotation.
    pub fn ignored(&self, id: FunctionId) -> &BTreeSet<FunctionId> {
        static EMPTY: BTreeSet<FunctionId> = BTreeSet::new();
        self.ignored.get(id.0 as usize).unwrap_or(&EMPTY)
    }

    /// Immediate callees of `id` with the kind of each edge, ordered by ID.
    pub fn direct(&self, id: FunctionId) -> Vec<(FunctionId, DependencyKind)> {
        let mut edges: Vec<(FunctionId, DependencyKind)> = self
            .graph
            .edges_directed(id.into(), Direction::Outgoing)
            .map(|edge| (FunctionId::from(edge.target()), *edge.weight()))
            .collect();
        edges.sort_by_key(|(target, _)| *target);
        edges
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Functions `name` depends on, as `(name, category)` sorted by name.
    ///
    /// Includes monitored functions. `ignore` annotations are not applied:
    /// they shape fingerprints, not the graph.
    pub fn dependencies(&self, name: &str, depth: Depth) -> Result<Vec<DependencyInfo>, CoreError> {
        self.related(name, depth, Direction::Outgoing)
    }

    /// Functions that depend on `name`, sorted by name.
    pub fn dependents(&self, name: &str, depth: Depth) -> Result<Vec<DependencyInfo>, CoreError> {
        self.related(name, depth, Direction::Incoming)
    }

    /// IDs reachable from `id` in `direction`, excluding `id` itself.
    pub fn closure(&self, id: FunctionId, direction: Direction) -> BTreeSet<FunctionId> {
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::from([NodeIndex::<u32>::from(id)]);
        while let Some(node) = queue.pop_front() {
            for next in self.graph.neighbors_directed(node, direction) {
                if seen.insert(FunctionId::from(next)) {
                    queue.push_back(next);
                }
            }
        }
        seen.remove(&id);
        seen
    }

    fn related(
        &self,
        name: &str,
        depth: Depth,
        direction: Direction,
    ) -> Result<Vec<DependencyInfo>, CoreError> {
        let id = self.registry.require(name)?.id;

        let ids: BTreeSet<FunctionId> = match depth {
            Depth::Direct => self
                .graph
                .neighbors_directed(id.into(), direction)
                .map(FunctionId::from)
                .filter(|other| *other != id)
                .collect(),
            Depth::Transitive => self.closure(id, direction),
        };

        let mut infos: Vec<DependencyInfo> = ids
            .into_iter()
            .filter_map(|other| self.registry.get(other))
            .map(|descriptor| DependencyInfo {
                name: descriptor.name.clone(),
                category: descriptor.category,
            })
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(infos)
    }
}
