//! The universe of known packages and the dependency graph derived from it.

use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use crate::error::{Error, Result};
use crate::package::{Package, PackageKey, PackageName};
use crate::version::VersionOrd;

/// The set of currently-installed `(name, version)` pairs, as supplied
/// by the front end. Kept as a thin alias rather than a newtype since it
/// carries no behavior of its own beyond membership testing.
pub type PackageSet = AHashSet<PackageKey>;

/// All known package versions, indexed by name, plus the comparator used
/// to order them.
///
/// Mirrors the teacher's `PackageEntry`/`PackageIndex` shape but drops
/// the TTL cache and network `PackageSource` entirely — a `Universe` is
/// always a fully-materialized, in-memory snapshot. There is no partial
/// loading in this core; assembling one from a repository backend is a
/// front-end concern.
pub struct Universe {
    packages: AHashMap<PackageName, Vec<Package>>,
    order: Arc<dyn VersionOrd>,
}

impl Universe {
    pub fn new(order: Arc<dyn VersionOrd>) -> Self {
        Self {
            packages: AHashMap::new(),
            order,
        }
    }

    pub fn from_packages(
        packages: impl IntoIterator<Item = Package>,
        order: Arc<dyn VersionOrd>,
    ) -> Result<Self> {
        let mut universe = Self::new(order);
        for pkg in packages {
            universe.insert(pkg)?;
        }
        Ok(universe)
    }

    /// Inserts a package version, enforcing the "at most one `installed`
    /// per name" invariant (spec.md §3).
    pub fn insert(&mut self, pkg: Package) -> Result<()> {
        let entry = self.packages.entry(pkg.name.clone()).or_default();
        if pkg.installed && entry.iter().any(|p| p.installed) {
            return Err(Error::InvalidRequest(format!(
                "package {} already has an installed version",
                pkg.name
            )));
        }
        entry.push(pkg);
        Ok(())
    }

    pub fn order(&self) -> &dyn VersionOrd {
        self.order.as_ref()
    }

    pub fn order_arc(&self) -> Arc<dyn VersionOrd> {
        self.order.clone()
    }

    pub fn versions_of(&self, name: &PackageName) -> &[Package] {
        self.packages.get(name).map_or(&[], |v| v.as_slice())
    }

    pub fn get(&self, name: &PackageName, version: &crate::version::Version) -> Option<&Package> {
        self.versions_of(name).iter().find(|p| &p.version == version)
    }

    pub fn installed_version(&self, name: &PackageName) -> Option<&Package> {
        self.versions_of(name).iter().find(|p| p.installed)
    }

    pub fn names(&self) -> impl Iterator<Item = &PackageName> {
        self.packages.keys()
    }

    pub fn all_packages(&self) -> impl Iterator<Item = &Package> {
        self.packages.values().flatten()
    }

    pub fn installed_packages(&self) -> impl Iterator<Item = &Package> {
        self.all_packages().filter(|p| p.installed)
    }

    pub fn len(&self) -> usize {
        self.packages.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Builds the dependency graph restricted to `subset`: one node per
    /// package in `subset`, one edge `a -> b` whenever some clause of
    /// `a`'s formula (`depends`, plus `depopts` when `include_depopts`)
    /// is satisfiable only by packages in `subset`, and `b` is the
    /// highest-ordered satisfying candidate present in `subset`.
    ///
    /// Edges never leave `subset` — this is what makes `graph_simple`
    /// ("the dependency graph of currently-installed packages") a
    /// well-defined, self-contained graph rather than one that reaches
    /// out into uninstalled versions elsewhere in the universe.
    pub fn dependency_graph(&self, subset: &[&Package], include_depopts: bool) -> DependencyGraph {
        let mut graph = DiGraph::new();
        let mut index = AHashMap::new();
        for pkg in subset {
            let idx = graph.add_node(pkg.key());
            index.insert(pkg.key(), idx);
        }

        for pkg in subset {
            let from = index[&pkg.key()];
            let mut clauses: Vec<&Vec<crate::package::Atom>> = pkg.depends.iter().collect();
            if include_depopts {
                clauses.extend(pkg.depopts.iter());
            }
            for clause in clauses {
                if let Some(target) = self.best_match_in(clause, subset) {
                    let to = index[&target.key()];
                    if to != from {
                        graph.update_edge(from, to, ());
                    }
                }
            }
        }

        transitive_reduce(&mut graph);
        DependencyGraph { graph, index }
    }

    /// Among `subset`, finds the highest-ordered package satisfying any
    /// atom in `clause` (a disjunctive dependency clause).
    fn best_match_in<'a>(
        &self,
        clause: &[crate::package::Atom],
        subset: &[&'a Package],
    ) -> Option<&'a Package> {
        let order = self.order();
        clause
            .iter()
            .flat_map(|atom| subset.iter().copied().filter(move |p| atom.matches(p, order)))
            .max_by(|a, b| order.compare(&a.version, &b.version))
    }
}

/// A transitively-reduced dependency graph over a fixed subset of
/// packages, plus the lookup from `PackageKey` to graph node.
pub struct DependencyGraph {
    pub graph: DiGraph<PackageKey, ()>,
    pub index: AHashMap<PackageKey, NodeIndex>,
}

impl DependencyGraph {
    pub fn node_of(&self, key: &PackageKey) -> Option<NodeIndex> {
        self.index.get(key).copied()
    }
}

/// Removes every edge `u -> v` for which `v` remains reachable from `u`
/// through some other path, leaving the minimal edge set with the same
/// reachability relation.
///
/// Implemented directly (remove-edge, check-reachability, restore if
/// needed) rather than via `petgraph::algo::tred`'s toposorted-adjacency
/// machinery: the package graphs this core operates on are small enough
/// that the O(V·E) cost of this straightforward approach never matters,
/// and it is far easier to read against spec.md's own description of
/// "the" dependency graph than a bit-packed closure representation would
/// be.
fn transitive_reduce<N, E: Default>(graph: &mut DiGraph<N, E>) {
    let nodes: Vec<_> = graph.node_indices().collect();
    for u in nodes {
        let direct: Vec<_> = graph.neighbors_directed(u, Direction::Outgoing).collect();
        for v in direct {
            let Some(edge) = graph.find_edge(u, v) else {
                continue;
            };
            let removed = graph.remove_edge(edge);
            if !petgraph::algo::has_path_connecting(&*graph, u, v, None) {
                // No alternate path — the direct edge was load-bearing, restore it.
                if let Some(weight) = removed {
                    graph.add_edge(u, v, weight);
                } else {
                    graph.add_edge(u, v, E::default());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::{Atom, Constraint, PackageName};
    use crate::version::{DottedVersionOrd, Version};

    fn name(s: &str) -> PackageName {
        PackageName::new(s).unwrap()
    }

    #[test]
    fn insert_rejects_second_installed_version() {
        let mut u = Universe::new(Arc::new(DottedVersionOrd));
        u.insert(Package::new(name("a"), Version::new("1.0")).installed())
            .unwrap();
        let err = u
            .insert(Package::new(name("a"), Version::new("2.0")).installed())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[test]
    fn dependency_graph_reduces_transitive_edge() {
        let order: Arc<dyn VersionOrd> = Arc::new(DottedVersionOrd);
        let a = Package::new(name("a"), Version::new("1.0"))
            .with_depends(vec![vec![Atom::any(name("b"))], vec![Atom::any(name("c"))]]);
        let b = Package::new(name("b"), Version::new("1.0"))
            .with_depends(vec![vec![Atom::any(name("c"))]]);
        let c = Package::new(name("c"), Version::new("1.0"));

        let refs = [&a, &b, &c];
        let universe = Universe::from_packages(vec![], order).unwrap();
        let graph = universe.dependency_graph(&refs, false);

        // a -> c should have been reduced away since a -> b -> c exists.
        let a_idx = graph.node_of(&a.key()).unwrap();
        let c_idx = graph.node_of(&c.key()).unwrap();
        assert!(graph.graph.find_edge(a_idx, c_idx).is_none());
        assert!(petgraph::algo::has_path_connecting(&graph.graph, a_idx, c_idx, None));
    }

    #[test]
    fn atom_constraint_unused_directly_but_module_compiles() {
        let _ = Constraint::Any;
    }
}
