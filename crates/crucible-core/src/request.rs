//! The user's request relative to the currently-installed package set.

use ahash::AHashSet;

use crate::error::{Error, Result};
use crate::package::Atom;

/// What the caller wants changed, expressed as atoms against the
/// universe — never against concrete package objects, since a request
/// is resolved against whichever universe it is paired with.
#[derive(Debug, Clone, Default)]
pub struct Request {
    pub wish_install: Vec<Atom>,
    pub wish_remove: Vec<Atom>,
    pub wish_upgrade: Vec<Atom>,
}

impl Request {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(mut self, atom: Atom) -> Self {
        self.wish_install.push(atom);
        self
    }

    pub fn remove(mut self, atom: Atom) -> Self {
        self.wish_remove.push(atom);
        self
    }

    pub fn upgrade(mut self, atom: Atom) -> Self {
        self.wish_upgrade.push(atom);
        self
    }

    /// Checks the name-disjointness invariant: no package name may
    /// appear in both `wish_install` and `wish_remove` (spec.md §3) —
    /// asking to install and remove the same package in one request is
    /// a caller error, not something the solver should be asked to
    /// arbitrate.
    pub fn validate(&self) -> Result<()> {
        let installs: AHashSet<_> = self.wish_install.iter().map(|a| &a.name).collect();
        for atom in &self.wish_remove {
            if installs.contains(&atom.name) {
                return Err(Error::InvalidRequest(format!(
                    "package {} is requested both for install and for removal",
                    atom.name
                )));
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.wish_install.is_empty() && self.wish_remove.is_empty() && self.wish_upgrade.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::PackageName;

    fn name(s: &str) -> PackageName {
        PackageName::new(s).unwrap()
    }

    #[test]
    fn rejects_install_and_remove_of_same_name() {
        let req = Request::new()
            .install(Atom::any(name("a")))
            .remove(Atom::any(name("a")));
        assert!(req.validate().is_err());
    }

    #[test]
    fn accepts_disjoint_request() {
        let req = Request::new()
            .install(Atom::any(name("a")))
            .remove(Atom::any(name("b")));
        assert!(req.validate().is_ok());
    }
}
