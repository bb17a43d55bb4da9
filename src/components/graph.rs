//! # Dependency graph between components.
//!
//! A `petgraph` [`StableDiGraph`] with one node per component. Names are also kept
//! in registration order, which breaks ties in [`DependencyGraph::topological_order`]
//! so startup order is deterministic.
//!
//! ## Rules
//! - Every dependency must name a registered component (or a member of the same batch).
//! - The graph is acyclic; violations are rejected when registering, never at runtime.
//! - A failed registration leaves the graph untouched.
//!
//! ```text
//! insert("db", [])            order: db
//! insert("cache", [])         order: db, cache
//! insert("api", ["cache"])    order: db, cache, api
//! insert("ws", ["db", "api"]) order: db, cache, api, ws
//! ```

use std::collections::{BTreeSet, HashMap, HashSet};

use petgraph::Direction::{Incoming, Outgoing};
use petgraph::algo::{is_cyclic_directed, tarjan_scc};
use petgraph::stable_graph::{NodeIndex, StableDiGraph};

use crate::error::{CycleError, RegistrationError};

#[derive(Debug, Clone)]
struct Node {
    name: String,
    /// Direct dependencies as declared (duplicates collapsed).
    deps: Vec<String>,
}

/// Directed acyclic graph of component dependencies.
///
/// Edges point from a dependency to its dependent (`db → api`), so a topological
/// sort yields start order directly.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: StableDiGraph<Node, ()>,
    index: HashMap<String, NodeIndex>,
    /// Names in registration order.
    names: Vec<String>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one node whose dependencies are already present.
    pub fn insert(&mut self, name: &str, deps: &[String]) -> Result<(), RegistrationError> {
        self.insert_all(&[(name.to_string(), deps.to_vec())])
    }

    /// Registers a batch atomically.
    ///
    /// Dependencies may point at earlier registrations or at any member of the batch.
    /// On error nothing is inserted.
    pub fn insert_all(&mut self, batch: &[(String, Vec<String>)]) -> Result<(), RegistrationError> {
        let mut incoming: HashSet<&str> = HashSet::with_capacity(batch.len());
        for (name, _) in batch {
            if self.contains(name) || !incoming.insert(name.as_str()) {
                return Err(RegistrationError::DuplicateName { name: name.clone() });
            }
        }

        for (name, deps) in batch {
            if let Some(dep) = deps
                .iter()
                .find(|d| !self.contains(d) && !incoming.contains(d.as_str()))
            {
                return Err(RegistrationError::UnknownDependency {
                    component: name.clone(),
                    dependency: dep.clone(),
                });
            }
        }

        let mut next = self.clone();
        for (name, deps) in batch {
            let mut unique: Vec<String> = Vec::with_capacity(deps.len());
            for d in deps {
                if !unique.contains(d) {
                    unique.push(d.clone());
                }
            }
            let ix = next.graph.add_node(Node {
                name: name.clone(),
                deps: unique,
            });
            next.index.insert(name.clone(), ix);
            next.names.push(name.clone());
        }
        for (name, deps) in batch {
            let Some(&to) = next.index.get(name) else {
                continue;
            };
            for dep in deps {
                if let Some(&from) = next.index.get(dep) {
                    next.graph.update_edge(from, to, ());
                }
            }
        }
        next.topological_order()?;

        *self = next;
        Ok(())
    }

    /// Removes a node nobody depends on.
    pub fn remove(&mut self, name: &str) -> Result<(), RegistrationError> {
        let Some(&ix) = self.index.get(name) else {
            return Err(RegistrationError::UnknownComponent {
                name: name.to_string(),
            });
        };
        let dependents = self.dependents(name);
        if !dependents.is_empty() {
            return Err(RegistrationError::HasDependents {
                name: name.to_string(),
                dependents,
            });
        }
        self.graph.remove_node(ix);
        self.index.remove(name);
        self.names.retain(|n| n != name);
        Ok(())
    }

    /// Returns an order in which every name appears after all of its dependencies.
    ///
    /// Among nodes that are ready at the same time, the earlier registration wins.
    pub fn topological_order(&self) -> Result<Vec<String>, CycleError> {
        if is_cyclic_directed(&self.graph) {
            return Err(self.cycle());
        }

        let rank: HashMap<NodeIndex, usize> = self
            .names
            .iter()
            .enumerate()
            .filter_map(|(i, n)| self.index.get(n).map(|&ix| (ix, i)))
            .collect();
        let mut pending: HashMap<NodeIndex, usize> = self
            .graph
            .node_indices()
            .map(|ix| (ix, self.graph.neighbors_directed(ix, Incoming).count()))
            .collect();

        let mut ready: BTreeSet<usize> = rank
            .iter()
            .filter(|(ix, _)| pending.get(*ix) == Some(&0))
            .map(|(_, &r)| r)
            .collect();
        let mut order = Vec::with_capacity(self.names.len());
        while let Some(r) = ready.pop_first() {
            let Some(&ix) = self.index.get(&self.names[r]) else {
                continue;
            };
            order.push(self.graph[ix].name.clone());
            for next in self.graph.neighbors_directed(ix, Outgoing) {
                if let Some(left) = pending.get_mut(&next) {
                    *left -= 1;
                    if *left == 0 {
                        ready.extend(rank.get(&next));
                    }
                }
            }
        }
        Ok(order)
    }

    /// Every node on a cycle (self-loops included), in registration order.
    fn cycle(&self) -> CycleError {
        let mut looped: HashSet<NodeIndex> = HashSet::new();
        for scc in tarjan_scc(&self.graph) {
            let self_loop = scc.len() == 1 && self.graph.contains_edge(scc[0], scc[0]);
            if scc.len() > 1 || self_loop {
                looped.extend(scc);
            }
        }
        let members = self
            .names
            .iter()
            .filter(|n| self.index.get(*n).is_some_and(|ix| looped.contains(ix)))
            .cloned()
            .collect();
        CycleError { members }
    }

    /// Direct dependencies of `name` in declaration order (empty when unknown).
    pub fn dependencies(&self, name: &str) -> &[String] {
        self.index
            .get(name)
            .map(|&ix| self.graph[ix].deps.as_slice())
            .unwrap_or(&[])
    }

    /// Names that directly depend on `name`, in registration order.
    pub fn dependents(&self, name: &str) -> Vec<String> {
        let Some(&ix) = self.index.get(name) else {
            return Vec::new();
        };
        let direct: HashSet<NodeIndex> = self.graph.neighbors_directed(ix, Outgoing).collect();
        self.names
            .iter()
            .filter(|n| self.index.get(*n).is_some_and(|d| direct.contains(d)))
            .cloned()
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Names in registration order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
