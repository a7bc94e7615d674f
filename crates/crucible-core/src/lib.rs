//! Package, universe, and action-plan data model shared by the Crucible
//! dependency resolver.
//!
//! This crate owns the data spec.md §3 describes: package identity,
//! version constraints, universes, requests, and the internal/external
//! action vocabulary that `crucible-resolver` builds plans out of. It has
//! no knowledge of solving, diffing, or plan construction — those live in
//! `crucible-resolver`, which depends on this crate.

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod action;
pub mod error;
pub mod package;
pub mod request;
pub mod universe;
pub mod version;

pub use action::{ExternalAction, InternalAction, Plan};
pub use error::{Error, Result};
pub use package::{Atom, Cnf, Constraint, Package, PackageName, Relop};
pub use request::Request;
pub use universe::{DependencyGraph, PackageSet, Universe};
pub use version::{DottedVersionOrd, Version, VersionOrd};

pub use ahash::{AHashMap, AHashSet};
