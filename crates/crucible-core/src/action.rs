//! Actions the diff engine and action graph builder produce, and the
//! final ordered plan they assemble into.

use std::fmt;

use petgraph::graph::DiGraph;

use crate::package::Package;

/// One change between two universes, as produced by the diff engine
/// (spec.md §4.3). Internal actions carry full `Package` values, not
/// just keys, since the minimizing resolver and action graph builder
/// both need to inspect dependency clauses while classifying them.
#[derive(Debug, Clone)]
pub enum InternalAction {
    /// A package moves from `from` (or nothing, if freshly installed) to `to`.
    Change { from: Option<Package>, to: Package },
    /// A package present in the starting universe is absent from the target.
    Delete(Package),
}

impl InternalAction {
    pub fn name(&self) -> &crate::package::PackageName {
        match self {
            InternalAction::Change { to, .. } => &to.name,
            InternalAction::Delete(pkg) => &pkg.name,
        }
    }
}

/// The user-facing classification of an [`InternalAction`] once ordering
/// (upgrade vs. downgrade) and the recompile-only case have been
/// determined by the action graph builder (spec.md §4.6 Phase B/D).
#[derive(Debug, Clone)]
pub enum ExternalAction {
    Install(Package),
    Upgrade { from: Package, to: Package },
    Downgrade { from: Package, to: Package },
    Recompile(Package),
    Delete(Package),
}

impl ExternalAction {
    pub fn name(&self) -> &crate::package::PackageName {
        match self {
            ExternalAction::Install(pkg)
            | ExternalAction::Recompile(pkg)
            | ExternalAction::Delete(pkg) => &pkg.name,
            ExternalAction::Upgrade { to, .. } | ExternalAction::Downgrade { to, .. } => &to.name,
        }
    }

    /// The package version this action leaves installed, if any
    /// (`None` for `Delete`).
    pub fn resulting_package(&self) -> Option<&Package> {
        match self {
            ExternalAction::Install(pkg) | ExternalAction::Recompile(pkg) => Some(pkg),
            ExternalAction::Upgrade { to, .. } | ExternalAction::Downgrade { to, .. } => Some(to),
            ExternalAction::Delete(_) => None,
        }
    }
}

impl fmt::Display for ExternalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExternalAction::Install(pkg) => write!(f, "install {pkg}"),
            ExternalAction::Upgrade { from, to } => {
                write!(f, "upgrade {} {} -> {}", from.name, from.version, to.version)
            }
            ExternalAction::Downgrade { from, to } => {
                write!(f, "downgrade {} {} -> {}", from.name, from.version, to.version)
            }
            ExternalAction::Recompile(pkg) => write!(f, "recompile {pkg}"),
            ExternalAction::Delete(pkg) => write!(f, "delete {pkg}"),
        }
    }
}

/// The result of a successful `resolve()`: an unordered set of packages
/// to remove (removal order is the caller's problem, per spec.md §4.6's
/// "deletes have no ordering requirement" note) plus a partially-ordered
/// graph of everything else, where an edge `a -> b` means `a` must be
/// applied before `b` (spec.md §4.6 Phase D: dependencies before
/// dependents).
#[derive(Debug)]
pub struct Plan {
    pub to_remove: Vec<Package>,
    pub to_add: DiGraph<ExternalAction, ()>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.to_remove.is_empty() && self.to_add.node_count() == 0
    }

    pub fn actions(&self) -> impl Iterator<Item = &ExternalAction> {
        self.to_add.node_weights()
    }
}
