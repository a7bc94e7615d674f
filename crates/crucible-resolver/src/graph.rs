//! The Action Graph Builder (spec.md §4.6): turns the diff engine's flat
//! action list into a [`Plan`] — an unordered deletion set plus a
//! partially-ordered graph of everything else, dependencies before
//! dependents.
//!
//! Four phases, matching spec.md's own numbering:
//! - **A** classifies each [`InternalAction`] into a tentative
//!   [`ExternalAction`] (install / upgrade / downgrade / delete).
//! - **B** builds `graph_simple` (installed packages, hard deps plus
//!   depopts) alongside the hard-dependency-only graph, the substrate
//!   Phase C uses to tell a hard edge from an optional one.
//! - **C** cascades deletions: any installed package with an edge (hard
//!   or optional) to a package already being deleted is reclassified.
//!   It becomes `Delete` only if removal was explicitly requested for
//!   it, or its edge to the deleted package is an *optional* one (not
//!   present in the hard-dependency-only graph) — otherwise it's
//!   `Recompile`, since losing a hard dependency means rebuilding, not
//!   necessarily vanishing. Visits `graph_simple`'s deletion-induced
//!   subgraph in dependency-before-dependent order, checking each
//!   node's edges against the set of packages already classified for
//!   deletion earlier in the same traversal — this is the fixed,
//!   deterministic resolution of spec.md §9's first open question.
//! - **D** builds `to_add`: orders every surviving install/upgrade/
//!   downgrade dependencies-first over the *target* universe's
//!   dependency graph, then runs `reinstall_fixup`, which promotes
//!   otherwise-unchanged packages to `Recompile` when a hard dependency
//!   of theirs changed underneath them.

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};

use ahash::{AHashMap, AHashSet};
use crucible_core::{ExternalAction, InternalAction, Package, PackageName, Plan, Universe};

use crate::diff;

pub fn build_plan(
    before: &Universe,
    after: &Universe,
    actions: &[InternalAction],
    requested_removals: &AHashSet<PackageName>,
) -> Plan {
    // Phase A
    let mut to_remove = Vec::new();
    let mut tentative: AHashMap<PackageName, ExternalAction> = AHashMap::new();
    for action in actions {
        match action {
            InternalAction::Delete(pkg) => {
                to_remove.push(pkg.clone());
            }
            InternalAction::Change { from: None, to } => {
                tentative.insert(to.name.clone(), ExternalAction::Install(to.clone()));
            }
            InternalAction::Change {
                from: Some(from),
                to,
            } => {
                let order = before.order();
                let action = if order.compare(&to.version, &from.version) == std::cmp::Ordering::Less
                {
                    ExternalAction::Downgrade {
                        from: from.clone(),
                        to: to.clone(),
                    }
                } else {
                    ExternalAction::Upgrade {
                        from: from.clone(),
                        to: to.clone(),
                    }
                };
                tentative.insert(to.name.clone(), action);
            }
        }
    }

    // Phase B: graph_simple includes optional (depopts) edges, over the
    // currently-installed set — Phase C needs to tell an optional edge
    // apart from a hard one, which only works if graph_simple is the
    // superset of the hard-dependency-only graph built alongside it.
    let installed: Vec<&Package> = before.installed_packages().collect();
    let graph_simple = before.dependency_graph(&installed, true);
    let graph_hard = before.dependency_graph(&installed, false);

    // Phase C: cascade deletions, classifying each cascaded candidate as
    // Delete or Recompile.
    let mut deleted_names: AHashSet<PackageName> =
        to_remove.iter().map(|p| p.name.clone()).collect();

    if let Ok(topo) = toposort(&graph_simple.graph, None) {
        // toposort orders dependents before dependencies (edge a->b means
        // "a depends on b", so a precedes b); reversed, it visits
        // dependencies before dependents, which is what cascade
        // classification needs.
        for node in topo.into_iter().rev() {
            let key = &graph_simple.graph[node];
            if deleted_names.contains(&key.name) {
                continue;
            }
            let mut has_optional_edge_to_deleted = false;
            let mut cascades = false;
            for dep in graph_simple.graph.neighbors_directed(node, petgraph::Direction::Outgoing) {
                let dep_key = &graph_simple.graph[dep];
                if !deleted_names.contains(&dep_key.name) {
                    continue;
                }
                cascades = true;
                let is_hard = graph_hard
                    .node_of(key)
                    .is_some_and(|hard_node| {
                        graph_hard
                            .graph
                            .neighbors_directed(hard_node, petgraph::Direction::Outgoing)
                            .any(|hard_dep| graph_hard.graph[hard_dep].name == dep_key.name)
                    });
                if !is_hard {
                    has_optional_edge_to_deleted = true;
                }
            }
            if !cascades {
                continue;
            }

            if requested_removals.contains(&key.name) || has_optional_edge_to_deleted {
                deleted_names.insert(key.name.clone());
                if let Some(pkg) = before.installed_version(&key.name) {
                    to_remove.push(pkg.clone());
                }
                tentative.remove(&key.name);
            } else if let Some(pkg) = before.installed_version(&key.name) {
                tentative.insert(key.name.clone(), ExternalAction::Recompile(pkg.clone()));
            }
        }
    }

    // Phase D: order the survivors dependencies-first over the target graph.
    let target_packages: Vec<&Package> = tentative
        .values()
        .filter_map(|action| action.resulting_package())
        .collect();
    // Include unchanged installed packages too, so reinstall_fixup can see
    // whether their dependencies moved underneath them.
    let unchanged: Vec<&Package> = after
        .installed_packages()
        .filter(|p| !tentative.contains_key(&p.name))
        .collect();
    let mut all_target: Vec<&Package> = target_packages;
    all_target.extend(unchanged.iter().copied());
    let graph_target = after.dependency_graph(&all_target, false);

    let mut to_add: DiGraph<ExternalAction, ()> = DiGraph::new();
    let mut node_for: AHashMap<PackageName, NodeIndex> = AHashMap::new();
    for (name, action) in &tentative {
        let idx = to_add.add_node(action.clone());
        node_for.insert(name.clone(), idx);
    }

    for (name, action) in &tentative {
        let Some(to) = action.resulting_package() else {
            continue;
        };
        let Some(from_node) = graph_target.node_of(&to.key()) else {
            continue;
        };
        for dep in graph_target
            .graph
            .neighbors_directed(from_node, petgraph::Direction::Outgoing)
        {
            let dep_key = &graph_target.graph[dep];
            if let Some(&dep_idx) = node_for.get(&dep_key.name) {
                let &this_idx = node_for.get(name).unwrap();
                // Dependency must be applied before dependent.
                to_add.update_edge(dep_idx, this_idx, ());
            }
        }
    }

    reinstall_fixup(&graph_target, before, after, &tentative, &mut to_add, &mut node_for);

    Plan { to_remove, to_add }
}

/// Promotes an otherwise-unchanged installed package to `Recompile` when
/// one of its hard dependencies is in `changed` — its own version didn't
/// move, but something it links against did, so it still needs to be
/// rebuilt (spec.md §4.6 Phase D).
fn reinstall_fixup(
    graph_target: &crucible_core::DependencyGraph,
    before: &Universe,
    after: &Universe,
    changed: &AHashMap<PackageName, ExternalAction>,
    to_add: &mut DiGraph<ExternalAction, ()>,
    node_for: &mut AHashMap<PackageName, NodeIndex>,
) {
    for pkg in after.installed_packages() {
        if changed.contains_key(&pkg.name) {
            continue;
        }
        let Some(node) = graph_target.node_of(&pkg.key()) else {
            continue;
        };
        let depends_on_changed = graph_target
            .graph
            .neighbors_directed(node, petgraph::Direction::Outgoing)
            .any(|dep| changed.contains_key(&graph_target.graph[dep].name));
        if !depends_on_changed {
            continue;
        }
        // Only recompile if the package was already installed before too
        // (never became newly relevant mid-resolution).
        if before.installed_version(&pkg.name).is_none() {
            continue;
        }

        let idx = *node_for
            .entry(pkg.name.clone())
            .or_insert_with(|| to_add.add_node(ExternalAction::Recompile(pkg.clone())));

        for dep in graph_target
            .graph
            .neighbors_directed(node, petgraph::Direction::Outgoing)
        {
            let dep_key = &graph_target.graph[dep];
            if let Some(&dep_idx) = node_for.get(&dep_key.name) {
                to_add.update_edge(dep_idx, idx, ());
            }
        }
    }
}

/// Rebuilds an [`InternalAction`] list via [`diff::diff`] and feeds it
/// straight into [`build_plan`] — the composition `resolve()` actually
/// calls.
pub fn build_plan_from_universes(before: &Universe, after: &Universe) -> Plan {
    let actions = diff::diff(before, after);
    build_plan(before, after, &actions, &AHashSet::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crucible_core::{Atom, DottedVersionOrd, Package, PackageName as PN, Version};
    use std::sync::Arc;

    fn name(s: &str) -> PN {
        PN::new(s).unwrap()
    }

    #[test]
    fn cascade_deletes_dependent_on_removed_package() {
        let order = Arc::new(DottedVersionOrd);
        let mut before = Universe::new(order.clone());
        before
            .insert(
                Package::new(name("a"), Version::new("1.0"))
                    .installed()
                    .with_depends(vec![vec![Atom::any(name("b"))]]),
            )
            .unwrap();
        before
            .insert(Package::new(name("b"), Version::new("1.0")).installed())
            .unwrap();

        let after = Universe::new(order);

        let actions = diff::diff(&before, &after);
        let plan = build_plan(&before, &after, &actions, &AHashSet::default());

        let removed: Vec<_> = plan.to_remove.iter().map(|p| p.name.clone()).collect();
        assert!(removed.contains(&name("a")));
        assert!(removed.contains(&name("b")));
    }

    #[test]
    fn hard_dependency_loss_recompiles_rather_than_deletes() {
        // a hard-depends on b. Only b is removed from `after` and removal
        // of a was never requested — spec.md §4.6 Phase C says that's a
        // Recompile, not a cascade Delete: a hard dependency going away
        // forces a rebuild, not necessarily a removal.
        let order = Arc::new(DottedVersionOrd);
        let mut before = Universe::new(order.clone());
        before
            .insert(
                Package::new(name("a"), Version::new("1.0"))
                    .installed()
                    .with_depends(vec![vec![Atom::any(name("b"))]]),
            )
            .unwrap();
        before
            .insert(Package::new(name("b"), Version::new("1.0")).installed())
            .unwrap();

        let mut after = Universe::new(order);
        after
            .insert(
                Package::new(name("a"), Version::new("1.0"))
                    .installed()
                    .with_depends(vec![vec![Atom::any(name("b"))]]),
            )
            .unwrap();

        let plan = build_plan_from_universes(&before, &after);

        let removed: Vec<_> = plan.to_remove.iter().map(|p| p.name.clone()).collect();
        assert!(!removed.contains(&name("a")));
        let recompiled = plan
            .to_add
            .node_weights()
            .any(|action| matches!(action, ExternalAction::Recompile(p) if p.name == name("a")));
        assert!(recompiled, "expected a to be recompiled, got {:?}", plan.to_add);
    }

    #[test]
    fn optional_dependency_loss_cascades_as_delete() {
        // a only depopts b (no hard edge); once b is deleted, the edge
        // a->b exists in graph_simple but not the hard graph, so a
        // cascades as Delete per spec.md §4.6 Phase C.
        let order = Arc::new(DottedVersionOrd);
        let mut before = Universe::new(order.clone());
        before
            .insert(
                Package::new(name("a"), Version::new("1.0"))
                    .installed()
                    .with_depopts(vec![vec![Atom::any(name("b"))]]),
            )
            .unwrap();
        before
            .insert(Package::new(name("b"), Version::new("1.0")).installed())
            .unwrap();

        let mut after = Universe::new(order);
        after
            .insert(
                Package::new(name("a"), Version::new("1.0"))
                    .installed()
                    .with_depopts(vec![vec![Atom::any(name("b"))]]),
            )
            .unwrap();

        let plan = build_plan_from_universes(&before, &after);

        let removed: Vec<_> = plan.to_remove.iter().map(|p| p.name.clone()).collect();
        assert!(removed.contains(&name("a")));
        assert!(removed.contains(&name("b")));
    }

    #[test]
    fn dependency_applied_before_dependent() {
        let order = Arc::new(DottedVersionOrd);
        let before = Universe::new(order.clone());
        let mut after = Universe::new(order);
        after
            .insert(
                Package::new(name("a"), Version::new("1.0"))
                    .installed()
                    .with_depends(vec![vec![Atom::any(name("b"))]]),
            )
            .unwrap();
        after
            .insert(Package::new(name("b"), Version::new("1.0")).installed())
            .unwrap();

        let plan = build_plan_from_universes(&before, &after);
        let idx_a = plan
            .to_add
            .node_indices()
            .find(|&i| plan.to_add[i].name() == &name("a"))
            .unwrap();
        let idx_b = plan
            .to_add
            .node_indices()
            .find(|&i| plan.to_add[i].name() == &name("b"))
            .unwrap();
        assert!(plan.to_add.find_edge(idx_b, idx_a).is_some());
    }
}
