//! Errors this crate's own constructors can raise.
//!
//! Deliberately narrow compared to the teacher's `libretto-core::error`,
//! which covers an entire package manager's network/VCS/archive/plugin
//! surface. None of that applies to a pure data model with no I/O; only
//! the invariant violations `crucible-core`'s own types can detect are
//! represented here. Solver/encoder-specific failures live in
//! `crucible-resolver::ResolveError` instead.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid package name: {0}")]
    InvalidPackageName(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}
