//! Dependency resolution and action-planning core.
//!
//! `resolve` is the single entry point most callers need: given a
//! universe of known package versions and a request relative to
//! whichever packages in it are marked `installed`, it returns either a
//! partially-ordered [`Plan`] or a [`ResolveError::Conflict`] carrying a
//! lazily-rendered explanation. Everything else this crate exports
//! (`diff`, `graph`, `minimize`, `solver`, `stats`) is the pipeline
//! `resolve` itself drives, exposed for callers that want to run a
//! stage in isolation (tests, tooling, debugging).

pub mod debug;
pub mod diff;
pub mod encode;
pub mod error;
pub mod explain;
pub mod graph;
pub mod minimize;
pub mod solver;
pub mod stats;

pub use error::{ResolveError, Result};
pub use explain::Lazy;
pub use stats::Stats;

use std::path::PathBuf;

use petgraph::algo::toposort;
use petgraph::Direction;

use ahash::AHashSet;
use crucible_core::{ExternalAction, Package, Plan, Request, Universe};

use solver::{PubgrubSolver, SolverConfig};

/// Knobs that shape a `resolve()` call without changing the request or
/// universe themselves.
///
/// Mirrors the teacher's `ResolverConfig`/`ProviderConfig` in spirit,
/// trimmed to what this core actually uses: `crucible_core::Version` has
/// no notion of stability tiers (dropped along with Composer's
/// branch/stability handling, see `DESIGN.md`), so there is no
/// `minimum_stability` knob here, only the debug side-channel gate.
#[derive(Debug, Clone, Default)]
pub struct ResolverConfig {
    /// When set, `resolve()` writes `.cudf`/`.dot` snapshots of the
    /// universes and graphs it builds into this directory. Absence (the
    /// default) means none of that I/O happens; it never affects the
    /// resolution itself (spec.md §6).
    pub debug_dir: Option<PathBuf>,
}

/// Resolves `request` against `universe`, where `universe` already
/// marks the currently-installed packages via `Package::installed`.
///
/// Runs the full pipeline: removal filtering, the minimizing resolver
/// (itself driving the base solver adapter one or more times), the diff
/// engine, and the action graph builder — spec.md §2's five stages in
/// order.
pub fn resolve(universe: &Universe, request: &Request, config: &ResolverConfig) -> Result<Plan> {
    request.validate()?;

    let restricted = apply_removals(universe, request)?;

    let depopts_hard = !request.wish_remove.is_empty();
    let base_solver = PubgrubSolver::new(SolverConfig { depopts_hard });
    let minimizer = minimize::Resolver::new(&base_solver);

    let after = minimizer.resolve(&restricted, request)?;

    if let Some(dir) = &config.debug_dir {
        let _ = debug::dump_universe_cudf(dir, "universe.cudf", &restricted);
        let _ = debug::dump_universe_cudf(dir, "universe-all.cudf", universe);
    }

    let actions = diff::diff(universe, &after);
    let requested_removals: AHashSet<_> = request.wish_remove.iter().map(|a| a.name.clone()).collect();
    let plan = graph::build_plan(universe, &after, &actions, &requested_removals);

    if let Some(dir) = &config.debug_dir {
        let installed: Vec<&Package> = universe.installed_packages().collect();
        let graph_simple = universe.dependency_graph(&installed, false);
        let _ = debug::dump_dependency_dot(dir, "filter-depends.dot", &graph_simple.graph);
        let _ = debug::dump_action_dot(dir, "to-install.dot", &plan.to_add);
    }

    Ok(plan)
}

/// The base solver has no native "must not be present" primitive, so
/// `wish_remove` is applied by simply not offering those package
/// versions to it at all. If something else still needs a removed
/// package, that surfaces as an ordinary unsatisfiable-request conflict
/// rather than being silently ignored.
fn apply_removals(universe: &Universe, request: &Request) -> Result<Universe> {
    if request.wish_remove.is_empty() {
        return Ok(clone_universe(universe));
    }
    let order = universe.order();
    let surviving = universe
        .all_packages()
        .filter(|pkg| !request.wish_remove.iter().any(|atom| atom.matches(pkg, order)))
        .cloned();
    Universe::from_packages(surviving, universe.order_arc()).map_err(ResolveError::from)
}

fn clone_universe(universe: &Universe) -> Universe {
    Universe::from_packages(universe.all_packages().cloned(), universe.order_arc())
        .expect("re-inserting an already-valid universe cannot violate its own invariants")
}

/// Every package `subset` depends on, directly or transitively, as
/// known to `universe` (hard `depends` edges only).
pub fn filter_backward_dependencies(universe: &Universe, subset: &[Package]) -> Vec<Package> {
    walk_graph(universe, subset, Direction::Outgoing)
}

/// Every package that depends on something in `subset`, directly or
/// transitively (hard `depends` edges only) — the set a caller must
/// consider before deleting `subset`.
pub fn filter_forward_dependencies(universe: &Universe, subset: &[Package]) -> Vec<Package> {
    walk_graph(universe, subset, Direction::Incoming)
}

fn walk_graph(universe: &Universe, subset: &[Package], direction: Direction) -> Vec<Package> {
    let all: Vec<&Package> = universe.all_packages().collect();
    let graph = universe.dependency_graph(&all, false);

    let mut visited = AHashSet::new();
    let mut stack: Vec<_> = subset.iter().filter_map(|p| graph.node_of(&p.key())).collect();
    let mut result = Vec::new();

    while let Some(node) = stack.pop() {
        for next in graph.graph.neighbors_directed(node, direction) {
            if visited.insert(next) {
                let key = &graph.graph[next];
                if let Some(pkg) = universe.get(&key.name, &key.version) {
                    result.push(pkg.clone());
                }
                stack.push(next);
            }
        }
    }

    result
}

/// Whether `plan` removes or changes anything already installed, as
/// opposed to only adding fresh installs on top of an untouched base.
pub fn delete_or_update(plan: &Plan) -> bool {
    !plan.to_remove.is_empty()
        || plan
            .actions()
            .any(|a| matches!(a, ExternalAction::Upgrade { .. } | ExternalAction::Downgrade { .. }))
}

/// Computes summary statistics for `plan` (spec.md §4.7).
pub fn stats(plan: &Plan) -> Stats {
    stats::compute(plan)
}

/// Renders `plan` as a human-readable, dependency-ordered listing.
pub fn print_plan(plan: &Plan) -> String {
    let mut out = String::new();
    for pkg in &plan.to_remove {
        out.push_str(&format!("remove {pkg}\n"));
    }
    match toposort(&plan.to_add, None) {
        Ok(order) => {
            for node in order {
                out.push_str(&format!("{}\n", plan.to_add[node]));
            }
        }
        Err(_) => {
            // A cycle here is a bug in the action graph builder, not a
            // condition callers should need to handle — print in
            // whatever order the graph happens to store instead of
            // panicking on a best-effort debug aid.
            for action in plan.actions() {
                out.push_str(&format!("{action}\n"));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crucible_core::{Atom, DottedVersionOrd, PackageName, Version};
    use std::sync::Arc;

    fn name(s: &str) -> PackageName {
        PackageName::new(s).unwrap()
    }

    #[test]
    fn resolve_fresh_install_of_single_package() {
        let mut universe = Universe::new(Arc::new(DottedVersionOrd));
        universe.insert(Package::new(name("a"), Version::new("1.0"))).unwrap();

        let request = Request::new().install(Atom::any(name("a")));
        let plan = resolve(&universe, &request, &ResolverConfig::default()).unwrap();

        assert!(plan.to_remove.is_empty());
        assert_eq!(plan.to_add.node_count(), 1);
        assert!(!delete_or_update(&plan));
    }

    #[test]
    fn resolve_conflict_reports_missing_package() {
        let universe = Universe::new(Arc::new(DottedVersionOrd));
        let request = Request::new().install(Atom::any(name("missing")));
        let err = resolve(&universe, &request, &ResolverConfig::default()).unwrap_err();
        match err {
            ResolveError::Conflict(lazy) => assert!(!lazy.render().is_empty()),
            other => panic!("expected Conflict, got {other:?}"),
        }
    }

    #[test]
    fn resolve_request_install_and_remove_same_package_is_rejected() {
        let universe = Universe::new(Arc::new(DottedVersionOrd));
        let request = Request::new()
            .install(Atom::any(name("a")))
            .remove(Atom::any(name("a")));
        let err = resolve(&universe, &request, &ResolverConfig::default()).unwrap_err();
        assert!(matches!(err, ResolveError::InvalidRequest(_)));
    }
}
