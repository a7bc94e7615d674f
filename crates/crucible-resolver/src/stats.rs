//! Statistics (spec.md §4.7): a plain tally of what a [`Plan`] does, for
//! front ends that want a one-line summary ("3 to install, 1 to
//! remove") without walking the action graph themselves.

use crucible_core::{ExternalAction, Plan};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub install: usize,
    pub reinstall: usize,
    pub upgrade: usize,
    pub downgrade: usize,
    pub remove: usize,
}

pub fn compute(plan: &Plan) -> Stats {
    let mut stats = Stats {
        remove: plan.to_remove.len(),
        ..Stats::default()
    };
    for action in plan.actions() {
        match action {
            ExternalAction::Install(_) => stats.install += 1,
            ExternalAction::Upgrade { .. } => stats.upgrade += 1,
            ExternalAction::Downgrade { .. } => stats.downgrade += 1,
            ExternalAction::Recompile(_) => stats.reinstall += 1,
            ExternalAction::Delete(_) => stats.remove += 1,
        }
    }
    stats
}

impl std::fmt::Display for Stats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to install, {} to reinstall, {} to upgrade, {} to downgrade, {} to remove",
            self.install, self.reinstall, self.upgrade, self.downgrade, self.remove
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crucible_core::{Package, PackageName, Version};
    use petgraph::graph::DiGraph;

    fn name(s: &str) -> PackageName {
        PackageName::new(s).unwrap()
    }

    #[test]
    fn tallies_each_action_kind() {
        let mut to_add = DiGraph::new();
        to_add.add_node(ExternalAction::Install(Package::new(
            name("a"),
            Version::new("1.0"),
        )));
        to_add.add_node(ExternalAction::Upgrade {
            from: Package::new(name("b"), Version::new("1.0")),
            to: Package::new(name("b"), Version::new("2.0")),
        });
        let plan = Plan {
            to_remove: vec![Package::new(name("c"), Version::new("1.0"))],
            to_add,
        };

        let stats = compute(&plan);
        assert_eq!(
            stats,
            Stats {
                install: 1,
                reinstall: 0,
                upgrade: 1,
                downgrade: 0,
                remove: 1,
            }
        );
    }
}
