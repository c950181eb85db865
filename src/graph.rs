//! Tag-to-tag dependency graph: cycle detection, deterministic cycle removal
//! and hierarchy leveling.
//!
//! Edges run from a dependency to its dependent: if tag `B` contains
//! `tags contains A`, the graph holds `A -> B`.

use std::collections::HashMap;

use tracing::warn;

use crate::{PlanError, TagSet};

#[derive(Debug, Clone, PartialEq, Eq)]
struct TagNode {
    name: String,
    depends_on: Vec<String>,
}

/// An edge dropped by [`DependencyGraph::remove_cycles`]: `dependent` no
/// longer depends on `dependency`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedEdge {
    pub dependency: String,
    pub dependent: String,
}

/// Resolved dependency entry for one tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyInfo {
    pub depends_on: Vec<String>,
    pub level: u32,
}

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: Vec<TagNode>,
    index: HashMap<String, usize>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum DfsState {
    Unvisited,
    InStack,
    Done,
}

impl DependencyGraph {
    /// Scan every tag for tag-reference conditions.
    #[must_use]
    pub fn build(tags: &TagSet) -> Self {
        Self::from_edges(tags.iter().map(|tag| (tag.name().to_owned(), tag.depends_on())))
    }

    /// Build from `(tag, depends_on)` pairs in declaration order. A repeated
    /// tag name adds its dependencies to the first declaration.
    pub fn from_edges<I, S, D>(edges: I) -> Self
    where
        I: IntoIterator<Item = (S, D)>,
        S: Into<String>,
        D: IntoIterator,
        D::Item: Into<String>,
    {
        let mut graph = Self::default();
        for (name, deps) in edges {
            let name = name.into();
            let i = match graph.index.get(&name) {
                Some(&i) => i,
                None => {
                    graph.index.insert(name.clone(), graph.nodes.len());
                    graph.nodes.push(TagNode {
                        name,
                        depends_on: Vec::new(),
                    });
                    graph.nodes.len() - 1
                }
            };
            for dep in deps {
                let dep = dep.into();
                if !graph.nodes[i].depends_on.contains(&dep) {
                    graph.nodes[i].depends_on.push(dep);
                }
            }
        }
        graph
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Tag names in declaration order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.name.as_str()).collect()
    }

    /// Direct dependencies of `tag`, or `None` if the tag is unknown.
    #[must_use]
    pub fn depends_on(&self, tag: &str) -> Option<&[String]> {
        self.index
            .get(tag)
            .map(|&i| self.nodes[i].depends_on.as_slice())
    }

    /// `succ[i]` lists the tags that depend on tag `i`, in declaration order.
    /// Dangling dependencies have no node and contribute no edge.
    fn successors(&self) -> Vec<Vec<usize>> {
        let mut succ = vec![Vec::new(); self.nodes.len()];
        for (j, node) in self.nodes.iter().enumerate() {
            for dep in &node.depends_on {
                if let Some(&i) = self.index.get(dep) {
                    succ[i].push(j);
                }
            }
        }
        succ
    }

    fn has_edge(&self, from: usize, to: usize) -> bool {
        self.nodes[to].depends_on.contains(&self.nodes[from].name)
    }

    /// Every simple cycle, each listed once as the member names in edge
    /// order, starting from its earliest-declared member. A self-reference
    /// is the one-element cycle `[tag]`.
    #[must_use]
    pub fn find_all_cycles(&self) -> Vec<Vec<String>> {
        self.cycle_indices()
            .into_iter()
            .map(|cycle| {
                cycle
                    .into_iter()
                    .map(|i| self.nodes[i].name.clone())
                    .collect()
            })
            .collect()
    }

    fn cycle_indices(&self) -> Vec<Vec<usize>> {
        let succ = self.successors();
        let mut cycles = Vec::new();
        let mut on_path = vec![false; self.nodes.len()];
        for start in 0..self.nodes.len() {
            let mut path = vec![start];
            on_path[start] = true;
            walk_cycles(start, start, &succ, &mut path, &mut on_path, &mut cycles);
            on_path[start] = false;
        }
        cycles
    }

    /// Whether any cycle exists. Stops at the first one found.
    #[must_use]
    pub fn has_cycles(&self) -> bool {
        self.find_cycle().is_some()
    }

    /// One cycle as a path that repeats its first tag at the end, if any.
    fn find_cycle(&self) -> Option<Vec<String>> {
        let succ = self.successors();
        let mut state = vec![DfsState::Unvisited; self.nodes.len()];
        let mut stack = Vec::new();
        for i in 0..self.nodes.len() {
            if state[i] == DfsState::Unvisited {
                if let Some(cycle) = self.dfs(i, &succ, &mut state, &mut stack) {
                    return Some(cycle);
                }
            }
        }
        None
    }

    fn dfs(
        &self,
        node: usize,
        succ: &[Vec<usize>],
        state: &mut [DfsState],
        stack: &mut Vec<usize>,
    ) -> Option<Vec<String>> {
        state[node] = DfsState::InStack;
        stack.push(node);
        for &next in &succ[node] {
            match state[next] {
                DfsState::InStack => return Some(self.cycle_path(stack, next)),
                DfsState::Unvisited => {
                    if let Some(cycle) = self.dfs(next, succ, state, stack) {
                        return Some(cycle);
                    }
                }
                DfsState::Done => {}
            }
        }
        stack.pop();
        state[node] = DfsState::Done;
        None
    }

    fn cycle_path(&self, stack: &[usize], repeat: usize) -> Vec<String> {
        let pos = stack.iter().position(|&n| n == repeat).unwrap_or(0);
        stack[pos..]
            .iter()
            .chain(std::iter::once(&repeat))
            .map(|&i| self.nodes[i].name.clone())
            .collect()
    }

    /// Break every cycle by dropping one edge per cycle.
    ///
    /// For each cycle, in [`find_all_cycles`](Self::find_all_cycles) order,
    /// whose edges are all still present, the member declared last loses its
    /// outgoing edge inside the cycle. Cycles already broken by an earlier
    /// removal are skipped. Returns the removed edges.
    pub fn remove_cycles(&mut self) -> Vec<RemovedEdge> {
        let mut removed = Vec::new();
        for cycle in self.cycle_indices() {
            let intact = (0..cycle.len())
                .all(|k| self.has_edge(cycle[k], cycle[(k + 1) % cycle.len()]));
            if !intact {
                continue;
            }
            let Some(pos) = (0..cycle.len()).max_by_key(|&k| cycle[k]) else {
                continue;
            };
            let last = cycle[pos];
            let dependent = cycle[(pos + 1) % cycle.len()];
            let dependency = self.nodes[last].name.clone();
            self.nodes[dependent].depends_on.retain(|d| *d != dependency);
            let edge = RemovedEdge {
                dependency,
                dependent: self.nodes[dependent].name.clone(),
            };
            warn!(
                dependency = %edge.dependency,
                dependent = %edge.dependent,
                cycle = ?cycle.iter().map(|&i| self.nodes[i].name.as_str()).collect::<Vec<_>>(),
                "removed cyclic tag dependency"
            );
            removed.push(edge);
        }
        removed
    }

    /// Hierarchy level of every tag: 0 without dependencies, otherwise one
    /// more than the highest dependency. Dangling dependencies count as 0.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::CyclicDependency`] if the graph has a cycle.
    pub fn levels(&self) -> Result<HashMap<String, u32>, PlanError> {
        Ok(self
            .level_vec()?
            .into_iter()
            .enumerate()
            .map(|(i, level)| (self.nodes[i].name.clone(), level))
            .collect())
    }

    pub(crate) fn level_vec(&self) -> Result<Vec<u32>, PlanError> {
        let mut state = vec![DfsState::Unvisited; self.nodes.len()];
        let mut levels = vec![0; self.nodes.len()];
        let mut stack = Vec::new();
        for i in 0..self.nodes.len() {
            self.level_of(i, &mut state, &mut levels, &mut stack)?;
        }
        Ok(levels)
    }

    fn level_of(
        &self,
        node: usize,
        state: &mut [DfsState],
        levels: &mut [u32],
        stack: &mut Vec<usize>,
    ) -> Result<u32, PlanError> {
        match state[node] {
            DfsState::Done => return Ok(levels[node]),
            DfsState::InStack => {
                let mut path: Vec<String> = self.cycle_path(stack, node);
                path.reverse();
                return Err(PlanError::CyclicDependency { path });
            }
            DfsState::Unvisited => {}
        }
        state[node] = DfsState::InStack;
        stack.push(node);
        let mut level = 0;
        for dep in &self.nodes[node].depends_on {
            let dep_level = match self.index.get(dep) {
                Some(&d) => self.level_of(d, state, levels, stack)?,
                None => {
                    warn!(
                        tag = %self.nodes[node].name,
                        dependency = %dep,
                        "tag references an unknown tag"
                    );
                    0
                }
            };
            level = level.max(dep_level + 1);
        }
        stack.pop();
        state[node] = DfsState::Done;
        levels[node] = level;
        Ok(level)
    }

    /// Declaration indices sorted by level, ties in declaration order.
    pub(crate) fn level_order(&self) -> Result<Vec<(usize, u32)>, PlanError> {
        let mut order: Vec<(usize, u32)> = self.level_vec()?.into_iter().enumerate().collect();
        order.sort_by_key(|&(i, level)| (level, i));
        Ok(order)
    }

    /// Dependencies and level of every tag.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::CyclicDependency`] if the graph has a cycle.
    pub fn resolve(&self) -> Result<HashMap<String, DependencyInfo>, PlanError> {
        let levels = self.level_vec()?;
        Ok(self
            .nodes
            .iter()
            .zip(levels)
            .map(|(node, level)| {
                (
                    node.name.clone(),
                    DependencyInfo {
                        depends_on: node.depends_on.clone(),
                        level,
                    },
                )
            })
            .collect())
    }
}

/// Enumerate simple paths from `start` that only visit nodes declared at or
/// after it and close back on it.
fn walk_cycles(
    start: usize,
    node: usize,
    succ: &[Vec<usize>],
    path: &mut Vec<usize>,
    on_path: &mut [bool],
    cycles: &mut Vec<Vec<usize>>,
) {
    for &next in &succ[node] {
        if next == start {
            cycles.push(path.clone());
        } else if next > start && !on_path[next] {
            on_path[next] = true;
            path.push(next);
            walk_cycles(start, next, succ, path, on_path, cycles);
            path.pop();
            on_path[next] = false;
        }
    }
}
