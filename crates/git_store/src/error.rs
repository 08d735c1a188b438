use std::path::PathBuf;

use thiserror::Error;

use crate::oid::ObjectId;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the object database, refs, and walker layers.
///
/// Each variant is a distinct, stable condition that callers map to their own
/// surface (exit codes, degenerate values). `GitObjectNotFound` is upgraded to
/// `ShallowClone` by the store when the repository carries a `shallow` marker.
#[derive(Error, Debug)]
pub enum Error {
    #[error("no git repository found at or above {0}")]
    NotARepository(PathBuf),

    #[error("object {0} not found in the repository")]
    GitObjectNotFound(ObjectId),

    #[error("object {0} is missing and the repository is a shallow clone; fetch full history first")]
    ShallowClone(ObjectId),

    #[error("short id {0} is ambiguous")]
    AmbiguousId(String),

    #[error("cannot resolve '{0}' to a commit")]
    BadCommittish(String),

    #[error("malformed pathspec '{spec}': {reason}")]
    PathSpecFormat { spec: String, reason: String },

    #[error("malformed {kind} object {id}: {reason}")]
    InvalidObject {
        kind: &'static str,
        id: ObjectId,
        reason: String,
    },

    #[error("corrupt pack data in {path}: {reason}")]
    CorruptPack { path: PathBuf, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
