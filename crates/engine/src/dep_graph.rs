//! Dependency graph maintenance for formula cells.
//!
//! Edges live on the cells themselves, keyed by `CellRef`:
//!
//! ```text
//! B ∈ A.depends_on  ⇔  A ∈ B.dependents
//! ```
//!
//! Structural edits renumber keys and rebuild every edge from formula text,
//! so no edge ever points at a stale slot.

use log::warn;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::cell::Cell;
use crate::cell_ref::CellRef;
use crate::sheet::Sheet;

impl Sheet {
    /// Look for a path from `origin` back to itself if `origin` read
    /// `candidates` instead of its current references.
    ///
    /// The live graph is not touched: the origin's outgoing edges are taken
    /// from `candidates`, every other formula cell contributes its installed
    /// `depends_on`, and non-formula cells end a branch. Returns the cycle as
    /// a path starting and ending at `origin`.
    pub fn find_cycle(&self, origin: CellRef, candidates: &[CellRef]) -> Option<Vec<CellRef>> {
        let mut visited = FxHashSet::default();
        visited.insert(origin);
        // (node, index of the next outgoing edge to try)
        let mut stack: Vec<(CellRef, usize)> = vec![(origin, 0)];

        while let Some(frame) = stack.last_mut() {
            let (node, next) = *frame;
            let edges = self.outgoing(node, origin, candidates);
            let Some(&target) = edges.get(next) else {
                stack.pop();
                continue;
            };
            frame.1 += 1;

            if target == origin {
                let mut path: Vec<CellRef> = stack.iter().map(|(cell, _)| *cell).collect();
                path.push(origin);
                return Some(path);
            }
            if visited.insert(target) {
                stack.push((target, 0));
            }
        }
        None
    }

    fn outgoing<'a>(&'a self, node: CellRef, origin: CellRef, candidates: &'a [CellRef]) -> &'a [CellRef] {
        if node == origin {
            return candidates;
        }
        match self.cells.get(&node) {
            Some(cell) if cell.is_formula() => &cell.depends_on,
            _ => &[],
        }
    }

    /// Point `at` at `refs`: unhook its old dependencies, then register it
    /// with each new one. Missing cells are created.
    pub(crate) fn install_edges(&mut self, at: CellRef, refs: &[CellRef]) {
        self.detach_edges(at);
        for &target in refs {
            let cell = self.get_or_create(target);
            if !cell.dependents.contains(&at) {
                cell.dependents.push(at);
            }
        }
        self.get_or_create(at).depends_on = refs.to_vec();
    }

    /// Remove `at` from the dependents of everything it reads and clear its
    /// `depends_on`. Its own dependents are kept.
    pub(crate) fn detach_edges(&mut self, at: CellRef) {
        let old = match self.cells.get_mut(&at) {
            Some(cell) => std::mem::take(&mut cell.depends_on),
            None => return,
        };
        for target in old {
            if let Some(cell) = self.cells.get_mut(&target) {
                cell.dependents.retain(|d| *d != at);
            }
        }
    }

    /// Drop every edge in the sheet.
    pub(crate) fn clear_all_edges(&mut self) {
        for cell in self.cells.values_mut() {
            cell.depends_on.clear();
            cell.dependents.clear();
        }
    }

    /// Cells reading `at`, transitively, in discovery order.
    pub fn transitive_dependents(&self, at: CellRef) -> Vec<CellRef> {
        let mut seen = FxHashSet::default();
        let mut order = Vec::new();
        let mut stack = vec![at];
        while let Some(current) = stack.pop() {
            let Some(cell) = self.cells.get(&current) else {
                continue;
            };
            for &dependent in cell.dependents.iter().rev() {
                if seen.insert(dependent) {
                    order.push(dependent);
                    stack.push(dependent);
                }
            }
        }
        order
    }

    /// Formula cells reading `at`, transitively, ordered so that each comes
    /// after every cell of the set it reads.
    ///
    /// Kahn's algorithm over the edges inside the set, smallest ready cell
    /// first for a deterministic order. Cells left over by a cycle are
    /// appended in row-major order.
    pub fn dependents_in_order(&self, at: CellRef) -> Vec<CellRef> {
        let members: FxHashSet<CellRef> = self
            .transitive_dependents(at)
            .into_iter()
            .filter(|d| *d != at && self.cells.get(d).is_some_and(|c| c.is_formula()))
            .collect();
        if members.is_empty() {
            return Vec::new();
        }

        let mut in_degree: FxHashMap<CellRef, usize> = members
            .iter()
            .map(|&member| {
                let count = self
                    .cells
                    .get(&member)
                    .map(|c| c.depends_on.iter().filter(|p| members.contains(p)).count())
                    .unwrap_or(0);
                (member, count)
            })
            .collect();

        // Descending, so the smallest is popped first
        let mut ready: Vec<CellRef> = in_degree
            .iter()
            .filter(|(_, &degree)| degree == 0)
            .map(|(&cell, _)| cell)
            .collect();
        ready.sort_unstable_by(|a, b| b.cmp(a));

        let mut order = Vec::with_capacity(members.len());
        while let Some(current) = ready.pop() {
            order.push(current);
            let Some(cell) = self.cells.get(&current) else {
                continue;
            };
            let mut unblocked = Vec::new();
            for dependent in &cell.dependents {
                if let Some(degree) = in_degree.get_mut(dependent) {
                    if *degree > 0 {
                        *degree -= 1;
                        if *degree == 0 {
                            unblocked.push(*dependent);
                        }
                    }
                }
            }
            ready.extend(unblocked);
            ready.sort_unstable_by(|a, b| b.cmp(a));
        }

        if order.len() < members.len() {
            let placed: FxHashSet<CellRef> = order.iter().copied().collect();
            let mut rest: Vec<CellRef> = members.into_iter().filter(|c| !placed.contains(c)).collect();
            rest.sort_unstable();
            warn!("{}: {} cells below {} sit on a cycle", self.name, rest.len(), at);
            order.extend(rest);
        }
        order
    }

    /// Verify the bidirectional edge invariant and that no edge list holds
    /// duplicates or dangling keys.
    pub fn check_graph_consistency(&self) -> Result<(), String> {
        for (at, cell) in &self.cells {
            if cell.at() != *at {
                return Err(format!("cell stored at {} claims to be {}", at, cell.at()));
            }
            check_unique(*at, "depends_on", &cell.depends_on)?;
            check_unique(*at, "dependents", &cell.dependents)?;

            for target in &cell.depends_on {
                let linked = self.cells.get(target).is_some_and(|c| c.dependents.contains(at));
                if !linked {
                    return Err(format!("{} reads {} but is missing from its dependents", at, target));
                }
            }
            for dependent in &cell.dependents {
                let linked = self
                    .cells
                    .get(dependent)
                    .is_some_and(|c: &Cell| c.depends_on.contains(at));
                if !linked {
                    return Err(format!("{} lists {} as a dependent that does not read it", at, dependent));
                }
            }
        }
        Ok(())
    }
}

fn check_unique(at: CellRef, name: &str, refs: &[CellRef]) -> Result<(), String> {
    let mut seen = FxHashSet::default();
    for r in refs {
        if !seen.insert(*r) {
            return Err(format!("{}.{} lists {} twice", at, name, r));
        }
    }
    Ok(())
}
