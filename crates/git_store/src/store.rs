//! The object store facade: object reads across loose and packed storage,
//! committish resolution, short ids, and ref enumeration.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::loose;
use crate::object::{Commit, ObjectKind, RawObject, Tag, Tree};
use crate::oid::{self, ObjectId};
use crate::pack::PackFile;
use crate::refs::{Head, RefEntry, Refs};
use crate::repo::GitPaths;

/// Read access to one repository's object database and refs.
///
/// All reads are pure; the only mutation this type ever performs is writing a
/// tag ref. Packfile handles are owned here and closed on drop.
#[derive(Debug)]
pub struct ObjectStore {
    paths: GitPaths,
    objects_dir: PathBuf,
    packs: Vec<PackFile>,
    refs: Refs,
    commits: RefCell<HashMap<ObjectId, Rc<Commit>>>,
    trees: RefCell<HashMap<ObjectId, Rc<Tree>>>,
}

impl ObjectStore {
    /// Opens the store for a discovered repository.
    pub fn open(paths: GitPaths) -> Result<Self> {
        let objects_dir = paths.git_dir().join("objects");
        let mut packs = Vec::new();
        let pack_dir = objects_dir.join("pack");
        match std::fs::read_dir(&pack_dir) {
            Ok(entries) => {
                for entry in entries {
                    let path = entry?.path();
                    if path.extension().is_some_and(|ext| ext == "idx") {
                        let pack = PackFile::open(&path)?;
                        debug!(idx = %path.display(), objects = pack.object_count(), "opened pack");
                        packs.push(pack);
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        let refs = Refs::new(paths.git_dir());
        Ok(Self {
            paths,
            objects_dir,
            packs,
            refs,
            commits: RefCell::new(HashMap::new()),
            trees: RefCell::new(HashMap::new()),
        })
    }

    /// Discovers the repository containing `path` and opens it.
    pub fn discover(path: &Path) -> Result<Self> {
        Self::open(GitPaths::discover(path)?)
    }

    pub fn git_dir(&self) -> &Path {
        self.paths.git_dir()
    }

    pub fn work_tree(&self) -> Option<&Path> {
        self.paths.work_tree()
    }

    pub fn is_shallow(&self) -> bool {
        self.paths.is_shallow()
    }

    /// Reads any object by id. Missing objects in a shallow clone surface as
    /// [`Error::ShallowClone`].
    pub fn read_object(&self, id: &ObjectId) -> Result<RawObject> {
        match self.try_read_object(id)? {
            Some(obj) => Ok(obj),
            None if self.is_shallow() => {
                warn!(%id, "object missing from a shallow clone");
                Err(Error::ShallowClone(*id))
            }
            None => Err(Error::GitObjectNotFound(*id)),
        }
    }

    fn try_read_object(&self, id: &ObjectId) -> Result<Option<RawObject>> {
        if let Some(obj) = loose::read_loose(&self.objects_dir, id)? {
            return Ok(Some(obj));
        }
        for pack in &self.packs {
            if let Some(offset) = pack.offset_of(id) {
                let obj = pack.read_at(offset, &|base| self.read_object(base))?;
                return Ok(Some(obj));
            }
        }
        Ok(None)
    }

    /// Reads a commit, peeling annotated tags.
    pub fn commit(&self, id: &ObjectId) -> Result<Rc<Commit>> {
        if let Some(commit) = self.commits.borrow().get(id) {
            return Ok(Rc::clone(commit));
        }
        let commit_id = self.peel_to_commit(id)?;
        let cached = self.commits.borrow().get(&commit_id).cloned();
        if let Some(commit) = cached {
            self.commits.borrow_mut().insert(*id, Rc::clone(&commit));
            return Ok(commit);
        }
        let raw = self.read_object(&commit_id)?;
        let commit = Rc::new(Commit::parse(commit_id, &raw.data)?);
        let mut cache = self.commits.borrow_mut();
        cache.insert(commit_id, Rc::clone(&commit));
        cache.insert(*id, Rc::clone(&commit));
        Ok(commit)
    }

    pub fn tree(&self, id: &ObjectId) -> Result<Rc<Tree>> {
        if let Some(tree) = self.trees.borrow().get(id) {
            return Ok(Rc::clone(tree));
        }
        let raw = self.read_object(id)?;
        if raw.kind != ObjectKind::Tree {
            return Err(Error::InvalidObject {
                kind: "tree",
                id: *id,
                reason: format!("expected tree, found {}", raw.kind.as_str()),
            });
        }
        let tree = Rc::new(Tree::parse(*id, &raw.data)?);
        self.trees.borrow_mut().insert(*id, Rc::clone(&tree));
        Ok(tree)
    }

    /// Follows annotated tags until a commit id is reached.
    pub fn peel_to_commit(&self, id: &ObjectId) -> Result<ObjectId> {
        let mut current = *id;
        loop {
            let raw = self.read_object(&current)?;
            match raw.kind {
                ObjectKind::Commit => return Ok(current),
                ObjectKind::Tag => {
                    current = Tag::parse(current, &raw.data)?.target;
                }
                other => {
                    return Err(Error::InvalidObject {
                        kind: "commit",
                        id: current,
                        reason: format!("expected commit, found {}", other.as_str()),
                    });
                }
            }
        }
    }

    /// Resolves any committish to a commit id.
    ///
    /// Search order: exact or abbreviated hex id, `refs/heads/`,
    /// `refs/remotes/`, `refs/tags/`, then packed-refs (covered by each ref
    /// lookup) and symbolic `HEAD`.
    pub fn resolve_committish(&self, committish: &str) -> Result<ObjectId> {
        let committish = committish.trim();
        if committish.is_empty() {
            return Err(Error::BadCommittish(committish.to_string()));
        }

        if oid::is_hex_id(committish) {
            let matches = self.ids_with_prefix(committish)?;
            match matches.len() {
                1 => return self.peel_to_commit(&matches[0]),
                0 => {} // may still be a ref that happens to look like hex
                _ => return Err(Error::AmbiguousId(committish.to_string())),
            }
        }

        if committish.eq_ignore_ascii_case("HEAD") {
            return match self.refs.head()? {
                head @ (Head::Branch { .. } | Head::Detached { .. }) => {
                    Ok(head.id().expect("branch and detached heads carry an id"))
                }
                Head::Unborn { .. } => Err(Error::BadCommittish(committish.to_string())),
            };
        }

        let candidates: Vec<String> = if committish.starts_with("refs/") {
            vec![committish.to_string()]
        } else {
            vec![
                format!("refs/heads/{committish}"),
                format!("refs/remotes/{committish}"),
                format!("refs/tags/{committish}"),
            ]
        };
        for name in &candidates {
            if let Some(id) = self.refs.lookup(name)? {
                return self.peel_to_commit(&id);
            }
        }

        // compatibility fallback for case-mismatched ref names
        let entries = self.refs.list()?;
        for name in &candidates {
            if let Some(entry) = entries
                .iter()
                .find(|entry| entry.name.eq_ignore_ascii_case(name))
            {
                return self.peel_to_commit(&entry.id);
            }
        }

        Err(Error::BadCommittish(committish.to_string()))
    }

    /// All object ids (loose and packed) matching a hex prefix.
    pub fn ids_with_prefix(&self, prefix: &str) -> Result<Vec<ObjectId>> {
        let mut ids = loose::loose_ids(&self.objects_dir, prefix)?;
        for pack in &self.packs {
            ids.extend(pack.ids_with_prefix(prefix));
        }
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }

    /// The shortest unique hex prefix of `id`, never shorter than `min_len`.
    pub fn short_id(&self, id: &ObjectId, min_len: usize) -> Result<String> {
        let hex = id.to_hex();
        for len in min_len.clamp(4, 40)..=40 {
            let prefix = &hex[..len];
            if self.ids_with_prefix(prefix)?.len() <= 1 {
                return Ok(prefix.to_string());
            }
        }
        Ok(hex)
    }

    pub fn head(&self) -> Result<Head> {
        self.refs.head()
    }

    pub fn list_refs(&self) -> Result<Vec<RefEntry>> {
        self.refs.list()
    }

    pub fn ref_target(&self, name: &str) -> Result<Option<ObjectId>> {
        self.refs.lookup(name)
    }

    /// Creates a lightweight tag. The only ref this store ever writes.
    pub fn write_tag_ref(&self, tag_name: &str, id: &ObjectId) -> Result<()> {
        self.refs.write(&format!("refs/tags/{tag_name}"), id)
    }
}
