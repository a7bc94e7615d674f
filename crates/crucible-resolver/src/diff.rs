//! The Diff Engine (spec.md §4.3): a pure function comparing the
//! currently-installed universe against the base solver's chosen target
//! universe, producing the internal action list the rest of the
//! pipeline classifies and orders.

use crucible_core::{InternalAction, Package, PackageName, Universe};

/// Compares `before` (the currently-installed packages) against `after`
/// (the target universe the base solver selected) and returns one
/// `InternalAction` per package whose installed status changes.
///
/// Unchanged packages (same name, same version, installed in both) are
/// omitted entirely — recompute-only changes (a dependency moved but
/// this package's own version didn't) are not this engine's concern;
/// the action graph builder derives `Recompile` from the dependency
/// graph in a later phase (spec.md §4.6 Phase D), not from the diff.
pub fn diff(before: &Universe, after: &Universe) -> Vec<InternalAction> {
    let mut actions = Vec::new();

    let mut names: Vec<PackageName> = before
        .installed_packages()
        .map(|p| p.name.clone())
        .chain(after.installed_packages().map(|p| p.name.clone()))
        .collect();
    names.sort();
    names.dedup();

    for name in names {
        let from = before.installed_version(&name).cloned();
        let to = after.installed_version(&name).cloned();

        match (from, to) {
            (Some(from), Some(to)) if from.version == to.version => {
                // No change.
            }
            (Some(from), Some(to)) => actions.push(InternalAction::Change {
                from: Some(from),
                to,
            }),
            (Some(from), None) => actions.push(InternalAction::Delete(from)),
            (None, Some(to)) => actions.push(InternalAction::Change { from: None, to }),
            (None, None) => {}
        }
    }

    actions
}

/// Whether `pkg` appears, with any version, as installed in `universe`.
pub fn is_installed(universe: &Universe, pkg: &Package) -> bool {
    universe
        .installed_version(&pkg.name)
        .map(|p| p.version == pkg.version)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crucible_core::{DottedVersionOrd, PackageName as PN, Version};
    use std::sync::Arc;

    fn name(s: &str) -> PN {
        PN::new(s).unwrap()
    }

    fn universe_of(pkgs: Vec<Package>) -> Universe {
        Universe::from_packages(pkgs, Arc::new(DottedVersionOrd)).unwrap()
    }

    #[test]
    fn detects_install_upgrade_and_delete() {
        let before = universe_of(vec![
            Package::new(name("a"), Version::new("1.0")).installed(),
            Package::new(name("b"), Version::new("1.0")).installed(),
        ]);
        let after = universe_of(vec![
            Package::new(name("a"), Version::new("2.0")).installed(),
            Package::new(name("c"), Version::new("1.0")).installed(),
        ]);

        let actions = diff(&before, &after);
        assert_eq!(actions.len(), 3);

        let has_delete_b = actions
            .iter()
            .any(|a| matches!(a, InternalAction::Delete(p) if p.name == name("b")));
        let has_install_c = actions
            .iter()
            .any(|a| matches!(a, InternalAction::Change { from: None, to } if to.name == name("c")));
        let has_upgrade_a = actions.iter().any(|a| {
            matches!(a, InternalAction::Change { from: Some(f), to } if f.name == name("a") && to.version == Version::new("2.0"))
        });

        assert!(has_delete_b && has_install_c && has_upgrade_a);
    }

    #[test]
    fn unchanged_package_produces_no_action() {
        let before = universe_of(vec![Package::new(name("a"), Version::new("1.0")).installed()]);
        let after = universe_of(vec![Package::new(name("a"), Version::new("1.0")).installed()]);
        assert!(diff(&before, &after).is_empty());
    }
}
