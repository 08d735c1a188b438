//! Loose refs, `packed-refs`, and HEAD resolution.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};
use crate::oid::ObjectId;

/// Where a reference's value came from.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RefSource {
    Loose,
    Packed,
    Symbolic,
}

#[derive(Clone, Debug)]
pub struct RefEntry {
    /// Canonical name, e.g. `refs/heads/main`.
    pub name: String,
    pub id: ObjectId,
    pub source: RefSource,
}

/// The state of `HEAD`.
#[derive(Clone, Debug)]
pub enum Head {
    /// HEAD names a branch that has a commit.
    Branch { name: String, id: ObjectId },
    /// HEAD names a branch with no commit yet (fresh repository).
    Unborn { name: String },
    Detached { id: ObjectId },
}

impl Head {
    pub fn id(&self) -> Option<ObjectId> {
        match self {
            Self::Branch { id, .. } | Self::Detached { id } => Some(*id),
            Self::Unborn { .. } => None,
        }
    }

    /// The canonical ref name, when HEAD is symbolic.
    pub fn ref_name(&self) -> Option<&str> {
        match self {
            Self::Branch { name, .. } | Self::Unborn { name } => Some(name),
            Self::Detached { .. } => None,
        }
    }
}

#[derive(Debug)]
pub(crate) struct Refs {
    git_dir: PathBuf,
}

impl Refs {
    pub(crate) fn new(git_dir: &Path) -> Self {
        Self {
            git_dir: git_dir.to_path_buf(),
        }
    }

    /// Looks up a fully qualified ref, loose first then packed, following
    /// symbolic refs.
    pub(crate) fn lookup(&self, name: &str) -> Result<Option<ObjectId>> {
        self.lookup_inner(name, 0)
    }

    fn lookup_inner(&self, name: &str, depth: u8) -> Result<Option<ObjectId>> {
        // symref chains in real repositories are HEAD -> branch; anything
        // deeper than a handful of hops is a broken repository
        if depth > 10 {
            return Ok(None);
        }
        match self.read_loose_ref(name)? {
            Some(LooseRef::Id(id)) => return Ok(Some(id)),
            Some(LooseRef::Symbolic(target)) => {
                return self.lookup_inner(&target, depth + 1);
            }
            None => {}
        }
        Ok(self.packed_refs()?.get(name).copied())
    }

    fn read_loose_ref(&self, name: &str) -> Result<Option<LooseRef>> {
        let path = self.git_dir.join(name);
        let contents = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            // A directory with the same name as a ref prefix is not a ref.
            Err(e) if path.is_dir() => {
                debug!(ref_name = name, error = %e, "ref path is a directory");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        let contents = contents.trim();
        if let Some(target) = contents.strip_prefix("ref:") {
            return Ok(Some(LooseRef::Symbolic(target.trim().to_string())));
        }
        Ok(ObjectId::from_hex(contents).map(LooseRef::Id))
    }

    /// Parses `packed-refs`, applying `^` peel lines to the preceding tag so
    /// lookups see the tag object itself (peeling happens at the store).
    fn packed_refs(&self) -> Result<BTreeMap<String, ObjectId>> {
        let path = self.git_dir.join("packed-refs");
        let contents = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(BTreeMap::new());
            }
            Err(e) => return Err(e.into()),
        };
        let mut refs = BTreeMap::new();
        for line in contents.lines() {
            let line = line.trim_end();
            if line.is_empty() || line.starts_with('#') || line.starts_with('^') {
                continue;
            }
            if let Some((hex, name)) = line.split_once(' ') {
                if let Some(id) = ObjectId::from_hex(hex) {
                    refs.insert(name.to_string(), id);
                }
            }
        }
        Ok(refs)
    }

    /// Reads HEAD.
    pub(crate) fn head(&self) -> Result<Head> {
        let contents = std::fs::read_to_string(self.git_dir.join("HEAD"))?;
        let contents = contents.trim();
        if let Some(target) = contents.strip_prefix("ref:") {
            let name = target.trim().to_string();
            return match self.lookup(&name)? {
                Some(id) => Ok(Head::Branch { name, id }),
                None => Ok(Head::Unborn { name }),
            };
        }
        ObjectId::from_hex(contents)
            .map(|id| Head::Detached { id })
            .ok_or_else(|| Error::BadCommittish("HEAD".to_string()))
    }

    /// Unions loose refs and packed-refs; a loose ref shadows its packed
    /// counterpart.
    pub(crate) fn list(&self) -> Result<Vec<RefEntry>> {
        let mut merged: BTreeMap<String, RefEntry> = self
            .packed_refs()?
            .into_iter()
            .map(|(name, id)| {
                (
                    name.clone(),
                    RefEntry {
                        name,
                        id,
                        source: RefSource::Packed,
                    },
                )
            })
            .collect();

        let refs_root = self.git_dir.join("refs");
        let mut pending = vec![refs_root.clone()];
        while let Some(dir) = pending.pop() {
            let entries = match std::fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            for entry in entries {
                let entry = entry?;
                let path = entry.path();
                if entry.file_type()?.is_dir() {
                    pending.push(path);
                    continue;
                }
                let Ok(relative) = path.strip_prefix(&self.git_dir) else {
                    continue;
                };
                let name: String = relative
                    .components()
                    .filter_map(|c| c.as_os_str().to_str())
                    .collect::<Vec<_>>()
                    .join("/");
                if let Some(LooseRef::Id(id)) = self.read_loose_ref(&name)? {
                    merged.insert(
                        name.clone(),
                        RefEntry {
                            name,
                            id,
                            source: RefSource::Loose,
                        },
                    );
                }
            }
        }
        Ok(merged.into_values().collect())
    }

    /// Writes a loose ref. Only tags are ever created through this store.
    pub(crate) fn write(&self, name: &str, id: &ObjectId) -> Result<()> {
        let path = self.git_dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, format!("{}\n", id.to_hex()))?;
        Ok(())
    }
}

enum LooseRef {
    Id(ObjectId),
    Symbolic(String),
}
