//! Package identity, version constraints, and the package record itself.

use std::fmt;
use std::sync::Arc;

use ahash::AHashMap;
use smallvec::SmallVec;

use crate::error::{Error, Result};
use crate::version::{Version, VersionOrd};

/// A validated, opaque package name.
///
/// Generalized from the teacher's `vendor/name` scheme — spec.md does
/// not mandate any particular naming convention, so the only invariant
/// kept is "non-empty, no embedded NUL, no surrounding whitespace".
#[derive(Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct PackageName(Arc<str>);

#[cfg(feature = "serde")]
impl serde::Serialize for PackageName {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for PackageName {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        PackageName::new(raw).map_err(serde::de::Error::custom)
    }
}

impl PackageName {
    pub fn new(raw: impl Into<Arc<str>>) -> Result<Self> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(Error::InvalidPackageName("name is empty".into()));
        }
        if raw.contains('\0') {
            return Err(Error::InvalidPackageName("name contains NUL".into()));
        }
        if raw.trim() != raw.as_ref() {
            return Err(Error::InvalidPackageName(format!(
                "name {raw:?} has leading or trailing whitespace"
            )));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PackageName({:?})", self.0)
    }
}

impl fmt::Display for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A relational operator used in a version [`Constraint`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relop {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Relop {
    pub fn as_str(self) -> &'static str {
        match self {
            Relop::Eq => "=",
            Relop::Ne => "!=",
            Relop::Lt => "<",
            Relop::Le => "<=",
            Relop::Gt => ">",
            Relop::Ge => ">=",
        }
    }

    /// Evaluates `self` given the `Ordering` of the candidate version
    /// relative to the constraint's version (`candidate.cmp(constraint)`).
    pub fn holds(self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match (self, ordering) {
            (Relop::Eq, Equal) => true,
            (Relop::Ne, Equal) => false,
            (Relop::Ne, _) => true,
            (Relop::Lt, Less) => true,
            (Relop::Le, Less | Equal) => true,
            (Relop::Gt, Greater) => true,
            (Relop::Ge, Greater | Equal) => true,
            _ => false,
        }
    }
}

/// A version constraint: either unconstrained or a single relational
/// bound. Ranges (e.g. `>=1.0,<2.0`) are expressed as a conjunctive
/// clause of two `Atom`s with the same name rather than as a richer
/// constraint variant, which keeps `Cnf` the single place multi-bound
/// constraints live — matching spec.md §3's CNF-of-atoms model exactly.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Constraint {
    Any,
    Versioned(Relop, Version),
}

impl Constraint {
    pub fn is_satisfied_by(&self, candidate: &Version, order: &dyn VersionOrd) -> bool {
        match self {
            Constraint::Any => true,
            Constraint::Versioned(op, v) => op.holds(order.compare(candidate, v)),
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Any => write!(f, "*"),
            Constraint::Versioned(op, v) => write!(f, "{} {v}", op.as_str()),
        }
    }
}

/// One literal in a dependency formula: "a package named `name`
/// satisfying `constraint`".
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Atom {
    pub name: PackageName,
    pub constraint: Constraint,
}

impl Atom {
    pub fn new(name: PackageName, constraint: Constraint) -> Self {
        Self { name, constraint }
    }

    pub fn any(name: PackageName) -> Self {
        Self::new(name, Constraint::Any)
    }

    pub fn matches(&self, candidate: &Package, order: &dyn VersionOrd) -> bool {
        self.name == candidate.name && self.constraint.is_satisfied_by(&candidate.version, order)
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.constraint {
            Constraint::Any => write!(f, "{}", self.name),
            Constraint::Versioned(..) => write!(f, "{} ({})", self.name, self.constraint),
        }
    }
}

/// Conjunctive normal form: a conjunction of disjunctive clauses of
/// [`Atom`]s. `depends` and `depopts` are both `Cnf`; a bare `conflicts`
/// list is a degenerate CNF where every clause has exactly one atom and
/// is negated by the caller rather than represented here (spec.md keeps
/// `conflicts` as a flat `Vec<Atom>` rather than a `Cnf`, since conflict
/// clauses are never disjunctive).
pub type Cnf = Vec<Vec<Atom>>;

/// One version of one package in a [`Universe`](crate::universe::Universe).
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone)]
pub struct Package {
    pub name: PackageName,
    pub version: Version,
    pub installed: bool,
    pub depends: Cnf,
    pub conflicts: Vec<Atom>,
    pub depopts: Cnf,
    pub extras: AHashMap<String, String>,
}

impl Package {
    pub fn new(name: PackageName, version: Version) -> Self {
        Self {
            name,
            version,
            installed: false,
            depends: Vec::new(),
            conflicts: Vec::new(),
            depopts: Vec::new(),
            extras: AHashMap::new(),
        }
    }

    pub fn installed(mut self) -> Self {
        self.installed = true;
        self
    }

    pub fn with_depends(mut self, depends: Cnf) -> Self {
        self.depends = depends;
        self
    }

    pub fn with_conflicts(mut self, conflicts: Vec<Atom>) -> Self {
        self.conflicts = conflicts;
        self
    }

    pub fn with_depopts(mut self, depopts: Cnf) -> Self {
        self.depopts = depopts;
        self
    }

    pub fn key(&self) -> PackageKey {
        PackageKey {
            name: self.name.clone(),
            version: self.version.clone(),
        }
    }
}

impl PartialEq for Package {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.version == other.version
    }
}

impl Eq for Package {}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.version)
    }
}

/// A small, cheaply-cloned identity for a `(name, version)` pair — used
/// as a graph node payload and a map key where carrying the full
/// `Package` (with its dependency clauses) would be wasteful.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageKey {
    pub name: PackageName,
    pub version: Version,
}

impl fmt::Display for PackageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.version)
    }
}

/// Small-vector alias used where a handful of atoms/clauses is the
/// overwhelmingly common case (mirrors the teacher's use of `SmallVec`
/// for per-package dependency lists in `PackageVersion`).
pub type AtomVec = SmallVec<[Atom; 4]>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::DottedVersionOrd;

    fn name(s: &str) -> PackageName {
        PackageName::new(s).unwrap()
    }

    #[test]
    fn rejects_empty_name() {
        assert!(PackageName::new("").is_err());
    }

    #[test]
    fn atom_matches_respects_constraint() {
        let order = DottedVersionOrd;
        let pkg = Package::new(name("a"), Version::new("1.2.0"));
        let atom = Atom::new(name("a"), Constraint::Versioned(Relop::Ge, Version::new("1.0.0")));
        assert!(atom.matches(&pkg, &order));

        let atom2 = Atom::new(name("a"), Constraint::Versioned(Relop::Lt, Version::new("1.0.0")));
        assert!(!atom2.matches(&pkg, &order));
    }

    #[test]
    fn atom_name_mismatch_never_matches() {
        let order = DottedVersionOrd;
        let pkg = Package::new(name("a"), Version::new("1.0.0"));
        let atom = Atom::any(name("b"));
        assert!(!atom.matches(&pkg, &order));
    }
}
