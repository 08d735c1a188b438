//! Locating and loading version configuration documents, from the working
//! tree or from a commit's trees, walking parent directories and applying
//! `inherit` merges.

use std::path::Path;
use std::rc::Rc;

use git_store::{Commit, EntryKind, ObjectId, ObjectStore};
use tracing::debug;

use crate::error::{Error, Result};
use crate::options::VersionOptions;
use crate::version::SemanticVersion;

pub const VERSION_JSON: &str = "version.json";
pub const VERSION_TXT: &str = "version.txt";

/// A resolved configuration and where it was found.
#[derive(Clone, Debug)]
pub struct LoadedOptions {
    pub options: VersionOptions,
    /// Repo-relative directory holding the effective document; empty for the
    /// repository root.
    pub directory: String,
}

/// Looks the configuration up in the working tree, starting at
/// `project_subdir` (repo-relative) and walking toward the root.
pub fn load_from_working_tree(
    work_tree: &Path,
    project_subdir: &str,
) -> Result<Option<LoadedOptions>> {
    let source = Source::WorkTree { root: work_tree };
    load_walk(&source, &normalize_dir(project_subdir))
}

/// Looks the configuration up inside a commit's trees.
pub fn load_from_commit(
    store: &ObjectStore,
    commit: &ObjectId,
    project_subdir: &str,
) -> Result<Option<LoadedOptions>> {
    let commit = store.commit(commit)?;
    let source = Source::Commit { store, commit };
    load_walk(&source, &normalize_dir(project_subdir))
}

/// True when some configuration document exists at or above the directory.
/// Checks existence only; nothing is parsed.
pub fn is_version_defined_in_working_tree(work_tree: &Path, project_subdir: &str) -> bool {
    let source = Source::WorkTree { root: work_tree };
    defined_walk(&source, &normalize_dir(project_subdir))
}

pub fn is_version_defined_in_commit(
    store: &ObjectStore,
    commit: &ObjectId,
    project_subdir: &str,
) -> Result<bool> {
    let commit = store.commit(commit)?;
    let source = Source::Commit { store, commit };
    Ok(defined_walk(&source, &normalize_dir(project_subdir)))
}

/// Writes a pretty-printed `version.json` into `dir`, replacing any
/// existing document. Returns the written path.
pub fn save_to_directory(
    options: &VersionOptions,
    dir: &Path,
) -> Result<std::path::PathBuf> {
    let path = dir.join(VERSION_JSON);
    let mut json = serde_json::to_string_pretty(options).expect("options serialize");
    json.push('\n');
    fs_err::write(&path, json)?;
    Ok(path)
}

enum Source<'a> {
    WorkTree {
        root: &'a Path,
    },
    Commit {
        store: &'a ObjectStore,
        commit: Rc<Commit>,
    },
}

impl Source<'_> {
    fn read(&self, dir: &str, file: &str) -> Result<Option<Vec<u8>>> {
        match self {
            Self::WorkTree { root } => {
                let mut path = root.to_path_buf();
                if !dir.is_empty() {
                    path.push(dir);
                }
                path.push(file);
                match fs_err::read(&path) {
                    Ok(bytes) => Ok(Some(bytes)),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
                    Err(e) => Err(e.into()),
                }
            }
            Self::Commit { store, commit } => {
                match find_entry(store, commit, dir, file)? {
                    Some((id, EntryKind::Blob)) => Ok(Some(store.read_object(&id)?.data)),
                    _ => Ok(None),
                }
            }
        }
    }

    fn exists(&self, dir: &str, file: &str) -> bool {
        match self {
            Self::WorkTree { root } => {
                let mut path = root.to_path_buf();
                if !dir.is_empty() {
                    path.push(dir);
                }
                path.push(file);
                path.is_file()
            }
            Self::Commit { store, commit } => matches!(
                find_entry(store, commit, dir, file),
                Ok(Some((_, EntryKind::Blob)))
            ),
        }
    }

    fn commit_hex(&self) -> Option<String> {
        match self {
            Self::WorkTree { .. } => None,
            Self::Commit { commit, .. } => Some(commit.id.to_hex()),
        }
    }
}

fn find_entry(
    store: &ObjectStore,
    commit: &Commit,
    dir: &str,
    file: &str,
) -> Result<Option<(ObjectId, EntryKind)>> {
    let mut tree = store.tree(&commit.tree)?;
    if !dir.is_empty() {
        for component in dir.split('/') {
            let Some(entry) = tree.entry(component.as_bytes()) else {
                return Ok(None);
            };
            if entry.kind != EntryKind::Tree {
                return Ok(None);
            }
            tree = store.tree(&entry.id)?;
        }
    }
    Ok(tree
        .entry(file.as_bytes())
        .map(|entry| (entry.id, entry.kind)))
}

fn load_walk(source: &Source<'_>, start_dir: &str) -> Result<Option<LoadedOptions>> {
    let mut dir = start_dir.to_string();
    loop {
        if let Some(options) = read_options_at(source, &dir)? {
            let resolved = if options.inherit {
                let Some(parent_dir) = parent_of(&dir) else {
                    return Err(inherit_unsatisfied(source, &dir));
                };
                match load_walk(source, &parent_dir)? {
                    Some(parent) => options.merge_from(parent.options),
                    None => return Err(inherit_unsatisfied(source, &dir)),
                }
            } else {
                options
            };
            debug!(directory = %dir, "resolved version configuration");
            return Ok(Some(LoadedOptions {
                options: resolved,
                directory: dir,
            }));
        }
        match parent_of(&dir) {
            Some(parent) => dir = parent,
            None => return Ok(None),
        }
    }
}

fn inherit_unsatisfied(source: &Source<'_>, dir: &str) -> Error {
    Error::ConfigFormat {
        path: join_dir(dir, VERSION_JSON),
        commit_id: source.commit_hex(),
        message: "inherit is true but no ancestor configuration exists".to_string(),
    }
}

fn defined_walk(source: &Source<'_>, start_dir: &str) -> bool {
    let mut dir = start_dir.to_string();
    loop {
        if source.exists(&dir, VERSION_JSON) || source.exists(&dir, VERSION_TXT) {
            return true;
        }
        match parent_of(&dir) {
            Some(parent) => dir = parent,
            None => return false,
        }
    }
}

fn read_options_at(source: &Source<'_>, dir: &str) -> Result<Option<VersionOptions>> {
    if let Some(bytes) = source.read(dir, VERSION_JSON)? {
        let options =
            serde_json::from_slice::<VersionOptions>(&bytes).map_err(|e| Error::ConfigFormat {
                path: join_dir(dir, VERSION_JSON),
                commit_id: source.commit_hex(),
                message: e.to_string(),
            })?;
        if !options.inherit && options.version.is_none() {
            return Err(Error::ConfigFormat {
                path: join_dir(dir, VERSION_JSON),
                commit_id: source.commit_hex(),
                message: "a version is required unless inherit is true".to_string(),
            });
        }
        return Ok(Some(options));
    }
    if let Some(bytes) = source.read(dir, VERSION_TXT)? {
        let options = parse_version_txt(&bytes).map_err(|message| Error::ConfigFormat {
            path: join_dir(dir, VERSION_TXT),
            commit_id: source.commit_hex(),
            message,
        })?;
        return Ok(Some(options));
    }
    Ok(None)
}

/// The legacy format: `major.minor[.build]` on line one, an optional
/// prerelease on line two. A missing leading hyphen is tolerated.
fn parse_version_txt(bytes: &[u8]) -> std::result::Result<VersionOptions, String> {
    let text = std::str::from_utf8(bytes).map_err(|_| "not valid UTF-8".to_string())?;
    let mut lines = text.lines();
    let numeric = lines.next().map(str::trim).unwrap_or_default();
    if numeric.is_empty() {
        return Err("missing version line".to_string());
    }
    let prerelease = lines.next().map(str::trim).unwrap_or_default();
    let full = if prerelease.is_empty() {
        numeric.to_string()
    } else if prerelease.starts_with('-') {
        format!("{numeric}{prerelease}")
    } else {
        format!("{numeric}-{prerelease}")
    };
    let version = SemanticVersion::parse(&full)?;
    Ok(VersionOptions {
        version: Some(version),
        ..VersionOptions::default()
    })
}

fn parent_of(dir: &str) -> Option<String> {
    if dir.is_empty() {
        return None;
    }
    Some(match dir.rsplit_once('/') {
        Some((parent, _)) => parent.to_string(),
        None => String::new(),
    })
}

fn join_dir(dir: &str, file: &str) -> String {
    if dir.is_empty() {
        file.to_string()
    } else {
        format!("{dir}/{file}")
    }
}

fn normalize_dir(dir: &str) -> String {
    dir.replace('\\', "/")
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}
