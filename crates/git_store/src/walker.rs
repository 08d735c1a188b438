//! Commit-graph traversal and scoped tree comparison.

use std::collections::HashSet;
use std::rc::Rc;

use crate::error::Result;
use crate::object::{Commit, EntryKind, TreeEntry};
use crate::oid::ObjectId;
use crate::pathspec::PathScope;
use crate::store::ObjectStore;

/// Lazily iterates every commit reachable from a starting point, visiting
/// each exactly once. A commit is always yielded before its ancestors are
/// exhausted.
#[derive(Debug)]
pub struct Ancestors<'a> {
    store: &'a ObjectStore,
    stack: Vec<ObjectId>,
    visited: HashSet<ObjectId>,
}

pub fn ancestors(store: &ObjectStore, start: ObjectId) -> Ancestors<'_> {
    Ancestors {
        store,
        stack: vec![start],
        visited: HashSet::new(),
    }
}

impl Iterator for Ancestors<'_> {
    type Item = Result<Rc<Commit>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let id = self.stack.pop()?;
            if !self.visited.insert(id) {
                continue;
            }
            match self.store.commit(&id) {
                Ok(commit) => {
                    self.stack.extend(
                        commit
                            .parents
                            .iter()
                            .filter(|parent| !self.visited.contains(parent)),
                    );
                    return Some(Ok(commit));
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// True iff some path inside `scope` differs between `commit` and **every**
/// parent. Root commits count when the scope is non-empty in their tree.
///
/// A merge that is identical in scope to one of its parents does not count:
/// the change arrived through that parent and was already counted there.
pub fn changes_path_scope(
    store: &ObjectStore,
    commit: &Commit,
    scope: &PathScope,
) -> Result<bool> {
    if scope.matches_everything() {
        return Ok(true);
    }
    if commit.parents.is_empty() {
        return tree_contains_in_scope(store, &commit.tree, "", scope);
    }
    for parent in &commit.parents {
        let parent = store.commit(parent)?;
        if !trees_differ_in_scope(store, &commit.tree, &parent.tree, "", scope)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Compares two trees inside `scope`, fast-skipping identical subtree ids.
fn trees_differ_in_scope(
    store: &ObjectStore,
    ours: &ObjectId,
    theirs: &ObjectId,
    prefix: &str,
    scope: &PathScope,
) -> Result<bool> {
    if ours == theirs || !scope.may_contain(prefix) {
        return Ok(false);
    }
    let ours = store.tree(ours)?;
    let theirs = store.tree(theirs)?;

    for entry in &ours.entries {
        let counterpart = theirs.entry(&entry.name);
        if entry_differs(store, entry, counterpart, prefix, scope)? {
            return Ok(true);
        }
    }
    // entries present only on their side
    for entry in &theirs.entries {
        if ours.entry(&entry.name).is_none()
            && entry_differs(store, entry, None, prefix, scope)?
        {
            return Ok(true);
        }
    }
    Ok(false)
}

fn entry_differs(
    store: &ObjectStore,
    entry: &TreeEntry,
    counterpart: Option<&TreeEntry>,
    prefix: &str,
    scope: &PathScope,
) -> Result<bool> {
    let path = join(prefix, &entry.name);
    match counterpart {
        Some(other) if other.id == entry.id && other.kind == entry.kind => Ok(false),
        Some(other) if other.kind == EntryKind::Tree && entry.kind == EntryKind::Tree => {
            trees_differ_in_scope(store, &entry.id, &other.id, &path, scope)
        }
        Some(other) => {
            // changed in place, or changed kind
            if entry.kind != EntryKind::Tree && other.kind != EntryKind::Tree {
                return Ok(scope.is_in_scope(&path));
            }
            for side in [entry, other] {
                if side.kind == EntryKind::Tree {
                    if tree_contains_in_scope(store, &side.id, &path, scope)? {
                        return Ok(true);
                    }
                } else if scope.is_in_scope(&path) {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        None => {
            if entry.kind == EntryKind::Tree {
                tree_contains_in_scope(store, &entry.id, &path, scope)
            } else {
                Ok(scope.is_in_scope(&path))
            }
        }
    }
}

/// True when the tree holds at least one in-scope file, recursing only into
/// directories the scope may reach. Submodule entries are opaque: they count
/// as files at their own path and are never entered.
fn tree_contains_in_scope(
    store: &ObjectStore,
    tree: &ObjectId,
    prefix: &str,
    scope: &PathScope,
) -> Result<bool> {
    if !scope.may_contain(prefix) {
        return Ok(false);
    }
    let tree = store.tree(tree)?;
    for entry in &tree.entries {
        let path = join(prefix, &entry.name);
        if entry.kind == EntryKind::Tree {
            if tree_contains_in_scope(store, &entry.id, &path, scope)? {
                return Ok(true);
            }
        } else if scope.is_in_scope(&path) {
            return Ok(true);
        }
    }
    Ok(false)
}

fn join(prefix: &str, name: &[u8]) -> String {
    let name = String::from_utf8_lossy(name);
    if prefix.is_empty() {
        name.into_owned()
    } else {
        format!("{prefix}/{name}")
    }
}
