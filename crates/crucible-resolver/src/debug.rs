//! Optional `.cudf`/`.dot` side-channel dumps.
//!
//! Gated entirely behind [`crate::ResolverConfig::debug_dir`]; when it's
//! `None` (the default) none of this module's functions are even
//! called. The dumps exist purely to let a developer inspect a
//! resolution with standard CUDF/Graphviz tooling — they never feed
//! back into `resolve()`'s control flow, which is the property spec.md
//! §6 requires of them.

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::Path;

use petgraph::dot::Dot;
use petgraph::graph::DiGraph;

use crucible_core::{ExternalAction, Universe};

/// Writes a minimal CUDF-flavored package listing for `universe` to
/// `dir/filename`. Not a full CUDF document (no request stanza, no
/// preamble) — just enough of the package-stanza format for
/// `universe.cudf`/`universe-all.cudf` to be diffed against known-good
/// snapshots or opened in a text editor during debugging.
pub fn dump_universe_cudf(dir: &Path, filename: &str, universe: &Universe) -> io::Result<()> {
    let mut out = String::new();
    let mut names: Vec<_> = universe.names().cloned().collect();
    names.sort();
    for name in names {
        for pkg in universe.versions_of(&name) {
            writeln!(out, "package: {}", pkg.name).ok();
            writeln!(out, "version: {}", pkg.version).ok();
            writeln!(out, "installed: {}", pkg.installed).ok();
            if !pkg.depends.is_empty() {
                let depends = pkg
                    .depends
                    .iter()
                    .map(|clause| {
                        clause
                            .iter()
                            .map(|atom| atom.to_string())
                            .collect::<Vec<_>>()
                            .join(" | ")
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                writeln!(out, "depends: {depends}").ok();
            }
            if !pkg.conflicts.is_empty() {
                let conflicts = pkg
                    .conflicts
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                writeln!(out, "conflicts: {conflicts}").ok();
            }
            writeln!(out).ok();
        }
    }
    fs::create_dir_all(dir)?;
    fs::write(dir.join(filename), out)
}

/// Writes a Graphviz `.dot` rendering of `graph` to `dir/filename`.
pub fn dump_dependency_dot(
    dir: &Path,
    filename: &str,
    graph: &DiGraph<crucible_core::PackageKey, ()>,
) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    fs::write(dir.join(filename), format!("{}", Dot::with_config(graph, &[])))
}

/// Writes a Graphviz `.dot` rendering of the action graph (`to_add`)
/// part of a resolved plan.
pub fn dump_action_dot(dir: &Path, filename: &str, to_add: &DiGraph<ExternalAction, ()>) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    fs::write(dir.join(filename), format!("{}", Dot::with_config(to_add, &[])))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crucible_core::{DottedVersionOrd, Package, PackageName, Version};
    use std::sync::Arc;

    #[test]
    fn cudf_dump_writes_expected_file() {
        let dir = std::env::temp_dir().join("crucible-debug-test");
        let mut universe = Universe::new(Arc::new(DottedVersionOrd));
        universe
            .insert(Package::new(PackageName::new("a").unwrap(), Version::new("1.0")))
            .unwrap();
        dump_universe_cudf(&dir, "universe.cudf", &universe).unwrap();
        let contents = fs::read_to_string(dir.join("universe.cudf")).unwrap();
        assert!(contents.contains("package: a"));
        let _ = fs::remove_dir_all(&dir);
    }
}
