//! The typed error taxonomy shared by every core component.

use crate::object::Kind;

/// Any error a core operation can return.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No such object, ref, or file at the path looked up.
    #[error("missing: {0}")]
    Missing(String),

    /// Name resolution produced zero candidates.
    #[error("not found: {0}")]
    NotFound(String),

    /// A short prefix matched more than one object.
    #[error("ambiguous name {name:?}, candidates: {candidates:?}")]
    Ambiguous {
        /// The name that was resolved.
        name: String,
        /// The full hashes it could refer to.
        candidates: Vec<String>,
    },

    /// An object's envelope headers could not be parsed at all.
    #[error("malformed object {0}: cannot parse")]
    MalformedCannotParse(String),

    /// An object's declared body length did not match its actual length.
    #[error("malformed object {0}: bad length")]
    MalformedBadLength(String),

    /// An identity line (`author`/`committer`/`tagger` value) was not in the
    /// expected `name <email> seconds tz` shape.
    #[error("malformed identity line: {0:?}")]
    MalformedIdentity(String),

    /// An object was loaded expecting one kind but turned out to be another.
    #[error("object {hash} has type {actual}, expected {expected}")]
    TypeMismatch {
        /// The object's hash.
        hash: String,
        /// The kind the caller required.
        expected: Kind,
        /// The kind the object actually is.
        actual: Kind,
    },

    /// An object kind string did not name one of the four known kinds.
    #[error("invalid object kind: {0:?}")]
    InvalidKind(String),

    /// A caller-supplied argument was malformed or out of contract.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A ref write would have overwritten an existing ref without `force`.
    #[error("ref already exists: {0}")]
    AlreadyExists(String),

    /// A checkout destination exists and is not a directory.
    #[error("not a directory: {}", .0.display())]
    NotDirectory(std::path::PathBuf),

    /// A checkout destination exists and is a non-empty directory.
    #[error("not empty: {}", .0.display())]
    NotEmpty(std::path::PathBuf),

    /// `core.repositoryformatversion` named a version this crate cannot read.
    #[error("unsupported repository format version: {0:?}")]
    UnsupportedVersion(String),

    /// A symbolic reference chain exceeded the depth cap without resolving.
    #[error("reference cycle detected resolving {0:?}")]
    RefCycle(String),

    /// A tag indirection chain exceeded the depth cap without resolving.
    #[error("tag cycle detected resolving {0:?}")]
    TagCycle(String),

    /// An underlying filesystem operation failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
