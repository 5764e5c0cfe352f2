//! The fingerprint engine.
//!
//! A fingerprint summarises a function's own content plus the content of
//! every function it effectively depends on. The engine computes fingerprints
//! lazily and memoises them for the lifetime of the engine, which is one
//! session: a source change means building a new registry, graph and engine.
//!
//! # Effective dependencies
//!
//! Each function `g` *forwards* itself plus everything its callees forward,
//! along call and monitor edges. A function `f` then depends on
//!
//! ```text
//! effective(f) = (⋃ forwarded(d) for each edge f -> d) \ ignore(f) \ {f}
//! ```
//!
//! so a `monitor` declared anywhere below `f` reaches `f`, while an `ignore`
//! only trims the declaring function's own set. Under
//! [`IgnoreScope::Shadowing`] an ignored name is also dropped from what the
//! declaring function forwards to its callers.
//!
//! # Cycles and concurrency
//!
//! Strongly connected components are computed once at construction. A
//! component is the unit of memoisation: it is computed exactly once, after
//! all components it points to, inside a `OnceLock`. Pending components are
//! visited in an explicit post-order over the component DAG, so pipeline
//! depth never turns into call-stack depth. Members of a cycle reach each
//! other through a fixed-point iteration over their forwarded sets, so a
//! back-edge contributes a finite value that does not depend on which member
//! was requested first. Threads racing on the same component block on its
//! `OnceLock` and observe the same result.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;
use std::sync::{Arc, OnceLock};

use petgraph::algo::tarjan_scc;
use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};

use fpcache_core::graph::{DependencyGraph, DependencyInfo};
use fpcache_core::id::FunctionId;
use fpcache_core::FunctionDescriptor;

use crate::error::StorageError;
use crate::folder::SourceFolderHasher;
use crate::hash::{combine_fingerprint, hash_content, UNREADABLE_FOLDER};
use crate::types::Fingerprint;

/// How far an `ignore` annotation reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IgnoreScope {
    /// `ignore` only affects the declaring function's own fingerprint.
    #[default]
    Local,
    /// `ignore` also stops the declaring function from forwarding the
    /// ignored name to its callers.
    Shadowing,
}

/// Tunables for a [`FingerprintEngine`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintOptions {
    #[serde(default)]
    pub ignore_scope: IgnoreScope,
}

/// A fingerprint together with the hashes it was combined from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FingerprintReport {
    pub function: String,
    pub fingerprint: Fingerprint,
    /// Hex blake3 of the function's own source text.
    pub source_hash: String,
    /// Hex content hash of the function itself (source plus source folder).
    pub content_hash: String,
    /// Effective dependencies and their content hashes, sorted by name.
    pub dependencies: Vec<DependencyHash>,
}

/// One dependency's contribution to a fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyHash {
    pub name: String,
    pub hash: String,
}

/// Memoised results for one function.
#[derive(Debug)]
struct MemberState {
    forwarded: BTreeSet<FunctionId>,
    effective: BTreeSet<FunctionId>,
    fingerprint: Fingerprint,
}

/// Memoised results for one strongly connected component, in member order.
#[derive(Debug)]
struct ComponentState {
    members: Vec<MemberState>,
}

/// Computes and memoises fingerprints over a [`DependencyGraph`].
pub struct FingerprintEngine {
    graph: Arc<DependencyGraph>,
    options: FingerprintOptions,
    folders: Option<Arc<dyn SourceFolderHasher>>,
    /// Members of each component, sorted by ID.
    components: Vec<Vec<FunctionId>>,
    /// Component index per function.
    component_of: Vec<usize>,
    /// Position of each function inside its component.
    position: Vec<usize>,
    /// Components each component has edges into, excluding itself.
    successors: Vec<Vec<usize>>,
    component_state: Vec<OnceLock<ComponentState>>,
    content: Vec<OnceLock<blake3::Hash>>,
}

impl std::fmt::Debug for FingerprintEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FingerprintEngine")
            .field("functions", &self.component_of.len())
            .field("components", &self.components.len())
            .field("options", &self.options)
            .field("folders", &self.folders.is_some())
            .finish()
    }
}

impl FingerprintEngine {
    /// Creates an engine for one session. Nothing is hashed until requested.
    pub fn new(graph: Arc<DependencyGraph>, options: FingerprintOptions) -> Self {
        let count = graph.registry().len();
        let mut components = Vec::new();
        let mut component_of = vec![0; count];
        let mut position = vec![0; count];

        for (index, scc) in tarjan_scc(graph.graph()).into_iter().enumerate() {
            let mut members: Vec<FunctionId> = scc.into_iter().map(FunctionId::from).collect();
            members.sort();
            for (slot, id) in members.iter().enumerate() {
                component_of[id.0 as usize] = index;
                position[id.0 as usize] = slot;
            }
            components.push(members);
        }

        let successors = components
            .iter()
            .enumerate()
            .map(|(index, members)| {
                let targets: BTreeSet<usize> = members
                    .iter()
                    .flat_map(|&id| graph.graph().neighbors(NodeIndex::<u32>::from(id)))
                    .map(|node| component_of[node.index()])
                    .filter(|&other| other != index)
                    .collect();
                targets.into_iter().collect()
            })
            .collect();

        let component_state = components.iter().map(|_| OnceLock::new()).collect();
        let content = (0..count).map(|_| OnceLock::new()).collect();

        FingerprintEngine {
            graph,
            options,
            folders: None,
            components,
            component_of,
            position,
            successors,
            component_state,
            content,
        }
    }

    /// Hashes functions' source folders with `hasher`. Without a hasher,
    /// source folders are not part of any fingerprint.
    pub fn with_folder_hasher(mut self, hasher: Arc<dyn SourceFolderHasher>) -> Self {
        self.folders = Some(hasher);
        self
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn options(&self) -> FingerprintOptions {
        self.options
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Returns the fingerprint of `name`, computing it on first request.
    pub fn fingerprint(&self, name: &str) -> Result<Fingerprint, StorageError> {
        let id = self.graph.registry().require(name)?.id;
        Ok(self.member(id).fingerprint)
    }

    /// Fingerprint by ID. `id` must come from this engine's registry.
    pub(crate) fn fingerprint_of(&self, id: FunctionId) -> Fingerprint {
        self.member(id).fingerprint
    }

    /// Fingerprints of every registered function, keyed by name.
    pub fn fingerprint_all(&self) -> BTreeMap<String, Fingerprint> {
        self.graph
            .registry()
            .iter()
            .map(|descriptor| (descriptor.name.clone(), self.fingerprint_of(descriptor.id)))
            .collect()
    }

    /// The functions hashed into `name`'s fingerprint, sorted by name.
    pub fn effective_dependencies(&self, name: &str) -> Result<Vec<DependencyInfo>, StorageError> {
        let id = self.graph.registry().require(name)?.id;
        let mut infos: Vec<DependencyInfo> = self
            .member(id)
            .effective
            .iter()
            .map(|dep| {
                let descriptor = self.descriptor(*dep);
                DependencyInfo {
                    name: descriptor.name.clone(),
                    category: descriptor.category,
                }
            })
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(infos)
    }

    /// The fingerprint of `name` with every hash that went into it.
    pub fn fingerprint_report(&self, name: &str) -> Result<FingerprintReport, StorageError> {
        let descriptor = self.graph.registry().require(name)?;
        let member = self.member(descriptor.id);

        let mut dependencies: Vec<DependencyHash> = member
            .effective
            .iter()
            .map(|dep| DependencyHash {
                name: self.descriptor(*dep).name.clone(),
                hash: self.content_hash(*dep).to_hex().to_string(),
            })
            .collect();
        dependencies.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(FingerprintReport {
            function: descriptor.name.clone(),
            fingerprint: member.fingerprint,
            source_hash: descriptor.source_hash.to_hex().to_string(),
            content_hash: self.content_hash(descriptor.id).to_hex().to_string(),
            dependencies,
        })
    }

    // -----------------------------------------------------------------------
    // Computation
    // -----------------------------------------------------------------------

    fn descriptor(&self, id: FunctionId) -> &FunctionDescriptor {
        self.graph
            .registry()
            .get(id)
            .unwrap_or_else(|| panic!("function {id} is not in this engine's registry"))
    }

    fn member(&self, id: FunctionId) -> &MemberState {
        let index = id.0 as usize;
        &self.component(self.component_of[index]).members[self.position[index]]
    }

    fn component(&self, index: usize) -> &ComponentState {
        if let Some(state) = self.component_state[index].get() {
            return state;
        }
        for pending in self.pending_post_order(index) {
            self.component_state[pending].get_or_init(|| self.compute_component(pending));
        }
        self.component_state[index].get_or_init(|| self.compute_component(index))
    }

    /// Uncomputed components reachable from `root`, successors before the
    /// components that point to them, ending with `root`.
    fn pending_post_order(&self, root: usize) -> Vec<usize> {
        let mut order = Vec::new();
        let mut seen = HashSet::from([root]);
        let mut stack = vec![(root, 0usize)];
        while let Some(&(component, next)) = stack.last() {
            match self.successors[component].get(next) {
                Some(&successor) => {
                    let top = stack.len() - 1;
                    stack[top].1 += 1;
                    if self.component_state[successor].get().is_none() && seen.insert(successor) {
                        stack.push((successor, 0));
                    }
                }
                None => {
                    stack.pop();
                    order.push(component);
                }
            }
        }
        order
    }

    fn callees(&self, id: FunctionId) -> impl Iterator<Item = FunctionId> + '_ {
        self.graph
            .graph()
            .neighbors(NodeIndex::<u32>::from(id))
            .map(FunctionId::from)
    }

    fn compute_component(&self, index: usize) -> ComponentState {
        let members = &self.components[index];

        // Forwarded sets; a single pass suffices outside cycles.
        let mut forwarded: Vec<BTreeSet<FunctionId>> =
            members.iter().map(|&id| BTreeSet::from([id])).collect();
        loop {
            let mut changed = false;
            for (slot, &id) in members.iter().enumerate() {
                let mut next = BTreeSet::from([id]);
                for callee in self.callees(id) {
                    next.extend(self.forwarded_within(index, &forwarded, callee));
                }
                if self.options.ignore_scope == IgnoreScope::Shadowing {
                    for ignored in self.graph.ignored(id) {
                        if *ignored != id {
                            next.remove(ignored);
                        }
                    }
                }
                if next != forwarded[slot] {
                    forwarded[slot] = next;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        let effective_sets: Vec<BTreeSet<FunctionId>> = members
            .iter()
            .map(|&id| {
                let mut effective = BTreeSet::new();
                for callee in self.callees(id) {
                    effective.extend(self.forwarded_within(index, &forwarded, callee));
                }
                for ignored in self.graph.ignored(id) {
                    effective.remove(ignored);
                }
                effective.remove(&id);
                effective
            })
            .collect();

        let states = members
            .iter()
            .zip(forwarded.into_iter().zip(effective_sets))
            .map(|(&id, (forwarded, effective))| {
                let dependencies: Vec<(&str, blake3::Hash)> = effective
                    .iter()
                    .map(|dep| (self.descriptor(*dep).name.as_str(), self.content_hash(*dep)))
                    .collect();
                let fingerprint =
                    Fingerprint::from(combine_fingerprint(&self.content_hash(id), &dependencies));

                tracing::trace!(
                    function = %self.descriptor(id).name,
                    dependencies = effective.len(),
                    fingerprint = %fingerprint.short(),
                    "computed fingerprint"
                );

                MemberState {
                    forwarded,
                    effective,
                    fingerprint,
                }
            })
            .collect::<Vec<_>>();

        if members.len() > 1 {
            let names: Vec<&str> = members
                .iter()
                .map(|id| self.descriptor(*id).name.as_str())
                .collect();
            tracing::debug!(members = ?names, "resolved dependency cycle");
        }

        ComponentState { members: states }
    }

    /// Forwarded set of `callee`, read from the in-progress sets when it is in
    /// the component being computed and from the memo otherwise.
    fn forwarded_within<'a>(
        &'a self,
        index: usize,
        in_progress: &'a [BTreeSet<FunctionId>],
        callee: FunctionId,
    ) -> impl Iterator<Item = FunctionId> + 'a {
        let slot = callee.0 as usize;
        let set = if self.component_of[slot] == index {
            &in_progress[self.position[slot]]
        } else {
            &self.member(callee).forwarded
        };
        set.iter().copied()
    }

    fn content_hash(&self, id: FunctionId) -> blake3::Hash {
        *self.content[id.0 as usize].get_or_init(|| {
            let descriptor = self.descriptor(id);
            let folder = match (&self.folders, &descriptor.source_folder) {
                (Some(hasher), Some(folder)) => {
                    Some(self.folder_hash(hasher.as_ref(), &descriptor.name, folder))
                }
                _ => None,
            };
            hash_content(&descriptor.source_hash, folder.as_ref())
        })
    }

    fn folder_hash(&self, hasher: &dyn SourceFolderHasher, function: &str, folder: &Path) -> blake3::Hash {
        match hasher.hash_folder(folder) {
            Ok(hash) => hash,
            Err(err) => {
                tracing::warn!(
                    function,
                    folder = %folder.display(),
                    error = %err,
                    "source folder could not be hashed; using placeholder"
                );
                blake3::hash(UNREADABLE_FOLDER)
            }
        }
    }
}
