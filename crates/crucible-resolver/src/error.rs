//! The resolver's top-level error type.
//!
//! Narrowed to exactly the categories spec.md §7 names: a conflict (not
//! fatal — carries a lazily-rendered explanation), a fatal solver error,
//! and a fatal encoder failure. Everything else spec.md calls out as
//! "not caught" (malformed universe invariants, base-solver contract
//! violations) is a `debug_assert!`/`unreachable!` panic instead, per
//! the teacher's own use of `assert!` for invariant breaks in
//! `PackageName::new` and friends.

use thiserror::Error;

use crate::encode::EncodeError;
use crate::explain::Lazy;

pub type Result<T> = std::result::Result<T, ResolveError>;

#[derive(Debug, Error)]
pub enum ResolveError {
    /// No plan satisfies the request. Carries a lazily-rendered
    /// explanation (spec.md §4.5) so callers that only care whether
    /// resolution succeeded never pay the formatting cost.
    #[error("no resolution satisfies the request")]
    Conflict(Lazy<String>),

    /// The base solver itself failed in a way that is not "no
    /// solution" — e.g. it reported an error while fetching
    /// dependencies that the `DependencyProvider` impl propagated.
    #[error("base solver error: {0}")]
    SolverError(String),

    /// Encoding the universe or request failed.
    #[error("encoding error: {0}")]
    Encode(#[from] EncodeError),

    /// The request itself violated an invariant (e.g. a package named in
    /// both `wish_install` and `wish_remove`).
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] crucible_core::Error),
}
