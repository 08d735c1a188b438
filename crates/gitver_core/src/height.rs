//! Version-height computation: the longest ancestor path that stays within
//! one version lineage, with scope-aware skipping and an advisory on-disk
//! cache.

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

use git_store::{ObjectId, ObjectStore, PathScope, changes_path_scope};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;
use crate::options::VersionOptions;
use crate::version_file;

pub const VERSION_CACHE_JSON: &str = "version.cache.json";

/// The identity-bearing slice of a configuration. Two commits belong to the
/// same lineage iff their signatures are equal; a signature change resets the
/// height count.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct LineageSignature {
    base_version: String,
    build_number_offset: i64,
    path_filters: Vec<String>,
}

impl LineageSignature {
    pub fn of(options: &VersionOptions) -> Self {
        Self {
            base_version: options.version_or_default().base_version_string(),
            build_number_offset: options.build_number_offset_or_default(),
            path_filters: options.path_filters_or_default().to_vec(),
        }
    }

    /// The string stored in the height cache to detect version-base changes.
    pub fn base_version(&self) -> &str {
        &self.base_version
    }
}

/// Computes heights for one `(scope, lineage)` pair, memoizing per commit.
///
/// `project_subdir` is where configuration lookups start; `scope_dir` is the
/// directory the path scope is rooted at, normally the directory holding the
/// effective `version.json` (path filters are relative to it).
#[derive(Debug)]
pub struct HeightEngine<'a> {
    store: &'a ObjectStore,
    project_subdir: String,
    reference: LineageSignature,
    scope: PathScope,
    heights: HashMap<ObjectId, u64>,
    lineages: HashMap<ObjectId, LineageSignature>,
}

impl<'a> HeightEngine<'a> {
    pub fn new(
        store: &'a ObjectStore,
        project_subdir: &str,
        scope_dir: &str,
        options: &VersionOptions,
    ) -> Result<Self> {
        let scope = PathScope::new(scope_dir, options.path_filters_or_default())?;
        Ok(Self {
            store,
            project_subdir: project_subdir.to_string(),
            reference: LineageSignature::of(options),
            scope,
            heights: HashMap::new(),
            lineages: HashMap::new(),
        })
    }

    /// The height of `start`: an explicit post-order walk so arbitrarily deep
    /// histories cannot overflow the call stack.
    ///
    /// Per commit: outside the lineage contributes 0 and stops the walk;
    /// inside the lineage, the commit adds 1 on top of the maximum parent
    /// height when its tree change touches the scope, and is skipped (but
    /// not terminal) otherwise. A commit with no qualifying parent started
    /// the lineage and always counts.
    pub fn height(&mut self, start: &ObjectId) -> Result<u64> {
        let start = self.store.peel_to_commit(start)?;
        let mut stack = vec![start];
        while let Some(&id) = stack.last() {
            if self.heights.contains_key(&id) {
                stack.pop();
                continue;
            }
            if self.lineage_at(&id)? != self.reference {
                self.heights.insert(id, 0);
                stack.pop();
                continue;
            }
            let commit = self.store.commit(&id)?;
            let mut parents_pending = false;
            for parent in &commit.parents {
                if !self.heights.contains_key(parent) {
                    stack.push(*parent);
                    parents_pending = true;
                }
            }
            if parents_pending {
                continue;
            }
            let parent_max = commit
                .parents
                .iter()
                .map(|parent| self.heights[parent])
                .max()
                .unwrap_or(0);
            // a lineage-boundary commit (root, or every parent outside the
            // lineage) always counts; within the lineage only scoped tree
            // changes do
            let mut qualifying_parent = false;
            for parent in &commit.parents {
                if self.lineage_at(parent)? == self.reference {
                    qualifying_parent = true;
                    break;
                }
            }
            let contributes =
                !qualifying_parent || changes_path_scope(self.store, &commit, &self.scope)?;
            self.heights
                .insert(id, parent_max + u64::from(contributes));
            stack.pop();
        }
        Ok(self.heights[&start])
    }

    fn lineage_at(&mut self, commit: &ObjectId) -> Result<LineageSignature> {
        if let Some(lineage) = self.lineages.get(commit) {
            return Ok(lineage.clone());
        }
        let options = version_file::load_from_commit(self.store, commit, &self.project_subdir)?
            .map(|loaded| loaded.options)
            .unwrap_or_default();
        let lineage = LineageSignature::of(&options);
        self.lineages.insert(*commit, lineage.clone());
        Ok(lineage)
    }
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct CacheDocument {
    version: String,
    commit_id: String,
    height: u64,
}

/// Reads the cache beside the effective `version.json`. A hit requires both
/// the stored base version and the commit id to match; anything else,
/// including a corrupt or partially written file, is a miss.
pub fn read_cached_height(path: &Path, base_version: &str, commit: &ObjectId) -> Option<u64> {
    let bytes = std::fs::read(path).ok()?;
    let document: CacheDocument = serde_json::from_slice(&bytes).ok()?;
    if document.version == base_version && document.commit_id == commit.to_hex() {
        debug!(path = %path.display(), height = document.height, "height cache hit");
        Some(document.height)
    } else {
        debug!(path = %path.display(), "height cache is for a different commit or version base");
        None
    }
}

/// Replaces the cache atomically (write to a temp file, then rename). The
/// cache is advisory: failures are logged and swallowed.
pub fn write_cached_height(path: &Path, base_version: &str, commit: &ObjectId, height: u64) {
    let document = CacheDocument {
        version: base_version.to_string(),
        commit_id: commit.to_hex(),
        height,
    };
    let json = serde_json::to_string_pretty(&document).expect("cache document serializes");
    let result = (|| -> std::io::Result<()> {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        let mut file = tempfile::NamedTempFile::new_in(parent)?;
        file.write_all(json.as_bytes())?;
        file.write_all(b"\n")?;
        file.persist(path).map_err(|e| e.error)?;
        Ok(())
    })();
    if let Err(e) = result {
        warn!(path = %path.display(), error = %e, "could not write height cache");
    }
}
