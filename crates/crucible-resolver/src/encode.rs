//! Translates the opaque `crucible_core` package/version model into the
//! integer-keyed representation `pubgrub`'s `DependencyProvider` wants.
//!
//! Grounded in `libretto-resolver::resolver::PubGrubProvider` and
//! `provider::ComposerProvider`, both of which hand `pubgrub` their
//! domain types directly (`PackageName`, `ComposerVersion`) since
//! `pubgrub`'s bounds (`Clone + Eq + Hash + Debug + Display` for `P`,
//! `Ord + Clone` for the version inside a `VersionSet`) are satisfied by
//! those types already. This implementation keeps spec.md §4.1's
//! explicit Encoder component instead of folding it into the provider,
//! so the reversible-escaping shape spec.md describes has a home: a
//! `Table` built once per `resolve()` call, with `encode`/`decode` pairs
//! for both packages and versions.
//!
//! spec.md §9 calls out a "known wart" in the original: optional-
//! dependency (`depopts`) formulas are stored as reparsed-on-every-access
//! text in a package's extras map. That wart doesn't arise here —
//! `crucible_core::Package` keeps `depopts` as a structurally-parsed
//! [`Cnf`](crucible_core::Cnf) from the moment a package enters a
//! [`Universe`](crucible_core::Universe), the same way `depends` is, so
//! there is no textual formula left to parse or cache at this layer;
//! `solver::Provider` reads clauses directly off the `Table`-indexed
//! `Package` values it already holds.

use std::fmt;

use ahash::AHashMap;
use thiserror::Error;

use crucible_core::{Atom, Package, PackageName, Universe, Version};

/// Encoding errors this `Table` can actually produce. spec.md §4.1 also
/// names `MalformedDepopt` (a textual optional-dependency formula that
/// fails to parse), but that case cannot arise in this encoding:
/// `crucible_core::Package::depopts` is already a structurally-valid
/// `Cnf` by the time it reaches a `Universe`, never a string, so there is
/// nothing for the encoder to reject.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("reference to unknown package id {0}")]
    UnknownName(u32),
    #[error("reference to unknown version id {0} of package {1}")]
    UnknownVersion(u32, String),
}

/// An encoded package identity: an index into the `Table`'s name list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EncodedPackage(pub u32);

impl fmt::Display for EncodedPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

/// An encoded version: an index into the per-package sorted version
/// list, so `Ord` on `EncodedVersion` agrees with the universe's
/// `VersionOrd` by construction — pubgrub never needs to know about
/// `VersionOrd` at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EncodedVersion(pub u32);

impl fmt::Display for EncodedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

struct PerPackage {
    name: PackageName,
    /// Versions sorted ascending by the universe's `VersionOrd`; index
    /// into this list is the package's `EncodedVersion` space.
    versions: Vec<Package>,
}

/// The encoding table for one `resolve()` call. Built once from a
/// `Universe` snapshot via [`Table::init`] and then used read-only for
/// the remainder of resolution.
pub struct Table {
    by_id: Vec<PerPackage>,
    by_name: AHashMap<PackageName, u32>,
}

impl Table {
    /// Builds a table covering every package name present in `universe`.
    pub fn init(universe: &Universe) -> Result<Self, EncodeError> {
        let order = universe.order();
        let mut by_id = Vec::new();
        let mut by_name = AHashMap::new();

        let mut names: Vec<_> = universe.names().cloned().collect();
        names.sort();

        for name in names {
            let mut versions: Vec<Package> = universe.versions_of(&name).to_vec();
            versions.sort_by(|a, b| order.compare(&a.version, &b.version));
            let id = by_id.len() as u32;
            by_name.insert(name.clone(), id);
            by_id.push(PerPackage { name, versions });
        }

        Ok(Self { by_id, by_name })
    }

    pub fn encode_package(&self, name: &PackageName) -> Option<EncodedPackage> {
        self.by_name.get(name).copied().map(EncodedPackage)
    }

    pub fn decode_package(&self, id: EncodedPackage) -> Result<&PackageName, EncodeError> {
        self.by_id
            .get(id.0 as usize)
            .map(|p| &p.name)
            .ok_or(EncodeError::UnknownName(id.0))
    }

    pub fn encode_version(
        &self,
        pkg: EncodedPackage,
        version: &Version,
    ) -> Option<EncodedVersion> {
        let entry = self.by_id.get(pkg.0 as usize)?;
        entry
            .versions
            .iter()
            .position(|p| &p.version == version)
            .map(|idx| EncodedVersion(idx as u32))
    }

    pub fn decode_version(
        &self,
        pkg: EncodedPackage,
        version: EncodedVersion,
    ) -> Result<&Package, EncodeError> {
        let entry = self
            .by_id
            .get(pkg.0 as usize)
            .ok_or(EncodeError::UnknownName(pkg.0))?;
        entry
            .versions
            .get(version.0 as usize)
            .ok_or_else(|| EncodeError::UnknownVersion(version.0, entry.name.to_string()))
    }

    pub fn versions(&self, pkg: EncodedPackage) -> &[Package] {
        self.by_id
            .get(pkg.0 as usize)
            .map_or(&[], |p| p.versions.as_slice())
    }

    /// Encodes every version of `name` that satisfies `atom`, as a set
    /// of `(EncodedPackage, EncodedVersion)` pairs. Used by the
    /// minimizing resolver to translate a request atom into the probe
    /// constraints pubgrub expects.
    pub fn matching_versions(
        &self,
        atom: &Atom,
        order: &dyn crucible_core::VersionOrd,
    ) -> Vec<(EncodedPackage, EncodedVersion)> {
        let Some(pkg_id) = self.encode_package(&atom.name) else {
            return Vec::new();
        };
        self.versions(pkg_id)
            .iter()
            .enumerate()
            .filter(|(_, pkg)| atom.constraint.is_satisfied_by(&pkg.version, order))
            .map(|(idx, _)| (pkg_id, EncodedVersion(idx as u32)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
