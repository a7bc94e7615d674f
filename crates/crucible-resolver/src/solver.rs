//! The Base Solver Adapter (spec.md §4.2): a narrow `BaseSolver` trait,
//! and `PubgrubSolver`, the shipped implementation built on the
//! `pubgrub` crate.
//!
//! Grounded in `libretto-resolver::resolver::PubGrubProvider` (the
//! `DependencyProvider` impl shape, `Reverse<usize>` priority) and
//! `libretto-resolver::provider::ComposerProvider` (locked-version
//! preference, platform-package style filtering generalized away since
//! spec.md has no platform-package concept). Disjunctive `depends`
//! clauses are encoded via synthetic "clause" packages — pubgrub's
//! dependency model is a conjunction of package-range edges, so a
//! genuine `a or b` clause needs one virtual package per disjunction
//! site whose versions enumerate the choices, the same technique real
//! pubgrub consumers (cargo's resolver, uv) use for or-dependencies.

use std::cmp::Reverse;
use std::convert::Infallible;
use std::fmt;

use pubgrub::{
    resolve, DependencyConstraints, DependencyProvider, Dependencies, Map, PubGrubError, Range,
};

use crucible_core::{Atom, Package, PackageName, Request, Universe, VersionOrd};

use crate::encode::{EncodedVersion, Table};
use crate::explain::ConflictExplainer;
use crate::error::ResolveError;

pub const ROOT_NAME: &str = "dose-dummy-request";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ClauseKind {
    Depends,
    Depopt,
}

/// The package dimension pubgrub solves over: either the synthetic
/// request root, a real package, or a virtual disjunction site.
///
/// A `Clause` site carries the owner's `EncodedVersion` alongside its
/// name: two versions of the same package can disagree on what sits at
/// a given clause index, so the site alone isn't enough to look the
/// clause back up — `find_clause` needs to know exactly which version
/// produced the edge.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum PPkg {
    Root,
    Real(PackageName),
    Clause {
        owner: PackageName,
        owner_version: EncodedVersion,
        kind: ClauseKind,
        site: usize,
    },
}

impl fmt::Debug for PPkg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl fmt::Display for PPkg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PPkg::Root => write!(f, "<{ROOT_NAME}>"),
            PPkg::Real(name) => write!(f, "{name}"),
            PPkg::Clause {
                owner,
                owner_version,
                kind,
                site,
            } => {
                let tag = match kind {
                    ClauseKind::Depends => "depends",
                    ClauseKind::Depopt => "depopt",
                };
                write!(f, "{owner}@{owner_version}::{tag}#{site}")
            }
        }
    }
}

/// The outcome of asking the base solver whether a request is
/// satisfiable, exactly spec.md §4.2's narrow contract.
pub enum SolverOutcome {
    Satisfiable { universe: Universe },
    Unsatisfiable(crate::explain::Lazy<String>),
}

/// The narrow contract spec.md §4.2 asks of a base solver.
pub trait BaseSolver {
    fn check_request(&self, universe: &Universe, request: &Request) -> Result<SolverOutcome, ResolveError>;
}

/// Per-probe configuration: whether optional dependencies should be
/// treated as hard requirements. spec.md §4.1's policy is that depopts
/// become hard exactly when the request has a non-empty `wish_remove` —
/// the minimizing resolver sets this per probe rather than the adapter
/// inferring it, so `PubgrubSolver` stays a pure function of whatever
/// flag it's given.
#[derive(Debug, Clone, Copy, Default)]
pub struct SolverConfig {
    pub depopts_hard: bool,
}

pub struct PubgrubSolver {
    config: SolverConfig,
}

impl PubgrubSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }
}

impl BaseSolver for PubgrubSolver {
    fn check_request(&self, universe: &Universe, request: &Request) -> Result<SolverOutcome, ResolveError> {
        let table = Table::init(universe)?;
        let provider = Provider {
            table: &table,
            universe,
            request,
            config: self.config,
        };

        match resolve(&provider, PPkg::Root, EncodedVersion(0)) {
            Ok(selected) => {
                let mut out = Universe::new(universe.order_arc());
                for (pkg, version) in selected {
                    if let PPkg::Real(name) = pkg {
                        if let Some(encoded_id) = table.encode_package(&name) {
                            if let Ok(package) = table.decode_version(encoded_id, version) {
                                out.insert(as_installed(package.clone()))?;
                            }
                        }
                    }
                }
                Ok(SolverOutcome::Satisfiable { universe: out })
            }
            Err(PubGrubError::NoSolution(tree)) => {
                let explainer = ConflictExplainer::new();
                Ok(SolverOutcome::Unsatisfiable(explainer.explain(tree)))
            }
            Err(other) => Err(ResolveError::SolverError(other.to_string())),
        }
    }
}

/// Every package pubgrub selected is, by construction, part of the
/// *target* installed set — spec.md §4.2's `Sat(target_universe)` has
/// `installed=true` set on exactly the packages supposed to be
/// installed after the operation, whether or not they were installed
/// before. Marking it from the pre-resolution universe instead (as a
/// prior version of this adapter did) would leave every fresh install
/// and upgrade looking untouched to `diff::diff`, which compares
/// `installed_packages()`/`installed_version()` between universes.
fn as_installed(mut package: Package) -> Package {
    package.installed = true;
    package
}

struct Provider<'a> {
    table: &'a Table,
    universe: &'a Universe,
    request: &'a Request,
    config: SolverConfig,
}

impl<'a> Provider<'a> {
    fn order(&self) -> &dyn VersionOrd {
        self.universe.order()
    }

    fn matching_range(&self, atom: &Atom) -> Range<EncodedVersion> {
        let matches = self.table.matching_versions(atom, self.order());
        matches
            .into_iter()
            .map(|(_, v)| Range::singleton(v))
            .fold(Range::empty(), |acc, r| acc.union(&r))
    }

    fn clause_dependencies(
        &self,
        owner: &PackageName,
        owner_version: EncodedVersion,
        kind: ClauseKind,
        site: usize,
        clause: &[Atom],
    ) -> DependencyConstraints<PPkg, Range<EncodedVersion>> {
        let mut map = Map::default();
        match clause {
            [] => {}
            [single] => {
                map.insert(PPkg::Real(single.name.clone()), self.matching_range(single));
            }
            _many => {
                // Genuine disjunction: depend on the virtual clause package,
                // which itself enumerates one "version" per disjunct.
                map.insert(
                    PPkg::Clause {
                        owner: owner.clone(),
                        owner_version,
                        kind,
                        site,
                    },
                    Range::full(),
                );
            }
        }
        map
    }
}

impl<'a> DependencyProvider for Provider<'a> {
    type P = PPkg;
    type V = EncodedVersion;
    type VS = Range<EncodedVersion>;
    type M = String;
    type Priority = Reverse<usize>;
    type Err = Infallible;

    fn prioritize(&self, package: &Self::P, range: &Self::VS) -> Self::Priority {
        match package {
            PPkg::Root => Reverse(0),
            // Fewer candidate versions means a more constrained package;
            // solve those first, matching the teacher's `PackagePriority`
            // (fewest remaining versions first after the root).
            PPkg::Real(name) => {
                let Some(id) = self.table.encode_package(name) else {
                    return Reverse(usize::MAX);
                };
                let count = self
                    .table
                    .versions(id)
                    .iter()
                    .enumerate()
                    .filter(|(idx, _)| range.contains(&EncodedVersion(*idx as u32)))
                    .count();
                Reverse(count.max(1))
            }
            PPkg::Clause { .. } => Reverse(1),
        }
    }

    fn choose_version(
        &self,
        package: &Self::P,
        range: &Self::VS,
    ) -> Result<Option<Self::V>, Self::Err> {
        match package {
            PPkg::Root => Ok(Some(EncodedVersion(0))),
            PPkg::Real(name) => {
                let Some(id) = self.table.encode_package(name) else {
                    return Ok(None);
                };
                let versions = self.table.versions(id);
                // Prefer staying at the currently-installed version when
                // it's still allowed by `range` — the base solver's half
                // of spec.md §4.4's "touch nothing else" bias. Once a
                // package genuinely has to move (its installed version
                // falls outside `range`), fall back to the highest
                // version within range; `minimize.rs`'s probe sequence
                // handles pushing a forced move to its true maximum.
                if let Some(installed_idx) = versions.iter().position(|p| p.installed) {
                    let installed_v = EncodedVersion(installed_idx as u32);
                    if range.contains(&installed_v) {
                        return Ok(Some(installed_v));
                    }
                }
                let best = versions
                    .iter()
                    .enumerate()
                    .map(|(idx, _)| EncodedVersion(idx as u32))
                    .filter(|v| range.contains(v))
                    .max();
                Ok(best)
            }
            PPkg::Clause {
                owner,
                owner_version,
                kind,
                site,
            } => {
                let Some(clause) = self.find_clause(owner, *owner_version, *kind, *site) else {
                    return Ok(None);
                };
                let choice = clause
                    .iter()
                    .enumerate()
                    .map(|(idx, _)| EncodedVersion(idx as u32))
                    .find(|v| range.contains(v));
                Ok(choice)
            }
        }
    }

    fn get_dependencies(
        &self,
        package: &Self::P,
        version: &Self::V,
    ) -> Result<Dependencies<Self::P, Self::VS, Self::M>, Self::Err> {
        match package {
            PPkg::Root => {
                let mut map = Map::default();
                let request = self.root_request();
                for atom in request.wish_install.iter().chain(request.wish_upgrade.iter()) {
                    let existing = map.entry(PPkg::Real(atom.name.clone())).or_insert_with(Range::full);
                    *existing = existing.intersection(&self.matching_range(atom));
                }
                // Every currently-installed package must stay part of the
                // solution unless the request explicitly asks to remove
                // it — otherwise the solver is free to drop anything not
                // named by `wish_install`/`wish_upgrade`, silently
                // uninstalling unrelated packages (spec.md §8 invariant
                // 1: untouched installed packages must remain satisfied).
                let order = self.order();
                for pkg in self.universe.installed_packages() {
                    if request.wish_remove.iter().any(|atom| atom.matches(pkg, order)) {
                        continue;
                    }
                    map.entry(PPkg::Real(pkg.name.clone())).or_insert_with(Range::full);
                }
                Ok(Dependencies::Available(map))
            }
            PPkg::Real(name) => {
                let Some(id) = self.table.encode_package(name) else {
                    return Ok(Dependencies::Unavailable("unknown package".to_string()));
                };
                let Ok(pkg) = self.table.decode_version(id, *version) else {
                    return Ok(Dependencies::Unavailable("unknown version".to_string()));
                };

                let mut map = Map::default();
                for (i, clause) in pkg.depends.iter().enumerate() {
                    let clause_deps = self.clause_dependencies(name, *version, ClauseKind::Depends, i, clause);
                    merge_into(&mut map, clause_deps);
                }
                if self.config.depopts_hard {
                    for (i, clause) in pkg.depopts.iter().enumerate() {
                        let clause_deps = self.clause_dependencies(name, *version, ClauseKind::Depopt, i, clause);
                        merge_into(&mut map, clause_deps);
                    }
                }
                for conflict in &pkg.conflicts {
                    let excluded = self.matching_range(conflict);
                    let existing = map
                        .entry(PPkg::Real(conflict.name.clone()))
                        .or_insert_with(Range::full);
                    *existing = existing.intersection(&excluded.complement());
                }
                Ok(Dependencies::Available(map))
            }
            PPkg::Clause {
                owner,
                owner_version,
                kind,
                site,
            } => {
                let Some(clause) = self.find_clause(owner, *owner_version, *kind, *site) else {
                    return Ok(Dependencies::Unavailable("stale clause reference".to_string()));
                };
                let Some(atom) = clause.get(version.0 as usize) else {
                    return Ok(Dependencies::Unavailable("stale clause choice".to_string()));
                };
                let mut map = Map::default();
                map.insert(PPkg::Real(atom.name.clone()), self.matching_range(atom));
                Ok(Dependencies::Available(map))
            }
        }
    }
}

impl<'a> Provider<'a> {
    /// Looks up the clause that produced a `PPkg::Clause` edge, keyed by
    /// the exact `(owner, owner_version)` that owns it — two versions of
    /// the same package can disagree on what sits at a given clause
    /// index, so resolving by name alone could return the wrong
    /// disjunct's atom set.
    fn find_clause(
        &self,
        owner: &PackageName,
        owner_version: EncodedVersion,
        kind: ClauseKind,
        site: usize,
    ) -> Option<&[Atom]> {
        let id = self.table.encode_package(owner)?;
        let pkg = self.table.decode_version(id, owner_version).ok()?;
        let clauses = match kind {
            ClauseKind::Depends => &pkg.depends,
            ClauseKind::Depopt => &pkg.depopts,
        };
        clauses.get(site).map(|c| c.as_slice())
    }

    fn root_request(&self) -> &Request {
        self.request
    }
}

fn merge_into(
    map: &mut DependencyConstraints<PPkg, Range<EncodedVersion>>,
    other: DependencyConstraints<PPkg, Range<EncodedVersion>>,
) {
    for (pkg, range) in other {
        let existing = map.entry(pkg).or_insert_with(Range::full);
        *existing = existing.intersection(&range);
    }
}
