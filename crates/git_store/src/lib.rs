//! Direct read access to git repositories: repository discovery, the object
//! database (loose and packed), refs, and a commit walker with scoped tree
//! comparison.
//!
//! Everything here reads the on-disk repository layout itself; no git
//! library or subprocess is involved. The store is single-threaded and pure
//! apart from tag-ref creation.

mod error;
mod loose;
mod object;
mod oid;
mod pack;
mod pathspec;
mod refs;
mod repo;
mod store;
mod walker;

pub use error::{Error, Result};
pub use object::{Commit, EntryKind, ObjectKind, RawObject, Tag, Tree, TreeEntry};
pub use oid::{ObjectId, is_hex_id};
pub use pathspec::PathScope;
pub use refs::{Head, RefEntry, RefSource};
pub use repo::GitPaths;
pub use store::ObjectStore;
pub use walker::{Ancestors, ancestors, changes_path_scope};
