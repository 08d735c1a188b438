//! Locating the git directory and working tree for a filesystem path.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};

/// The on-disk locations backing a repository.
#[derive(Clone, Debug)]
pub struct GitPaths {
    git_dir: PathBuf,
    work_tree: Option<PathBuf>,
}

impl GitPaths {
    /// Walks upward from `start` until a git directory is found.
    ///
    /// Recognizes a `.git` directory, a `.git` gitlink file of the form
    /// `gitdir: <path>` (worktrees and submodules), and bare repository
    /// layouts.
    pub fn discover(start: &Path) -> Result<Self> {
        let start = if start.is_absolute() {
            start.to_path_buf()
        } else {
            std::env::current_dir()?.join(start)
        };
        let mut dir = start.as_path();
        loop {
            if let Some(found) = Self::open(dir)? {
                debug!(git_dir = %found.git_dir.display(), "discovered git directory");
                return Ok(found);
            }
            match dir.parent() {
                Some(parent) => dir = parent,
                None => return Err(Error::NotARepository(start)),
            }
        }
    }

    /// Checks whether `dir` itself is a repository root. Does not walk.
    pub fn open(dir: &Path) -> Result<Option<Self>> {
        let dot_git = dir.join(".git");
        let metadata = match std::fs::symlink_metadata(&dot_git) {
            Ok(m) => Some(m),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };
        if let Some(metadata) = metadata {
            if metadata.is_dir() {
                return Ok(Some(Self {
                    git_dir: dot_git,
                    work_tree: Some(dir.to_path_buf()),
                }));
            }
            let contents = std::fs::read_to_string(&dot_git)?;
            let target = parse_gitlink(&contents).ok_or_else(|| {
                Error::NotARepository(dot_git.clone())
            })?;
            let git_dir = if Path::new(target).is_absolute() {
                PathBuf::from(target)
            } else {
                dir.join(target)
            };
            return Ok(Some(Self {
                git_dir,
                work_tree: Some(dir.to_path_buf()),
            }));
        }
        if is_bare_layout(dir) {
            return Ok(Some(Self {
                git_dir: dir.to_path_buf(),
                work_tree: None,
            }));
        }
        Ok(None)
    }

    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    /// The working tree root, absent for bare repositories.
    pub fn work_tree(&self) -> Option<&Path> {
        self.work_tree.as_deref()
    }

    /// True when the repository carries a shallow-clone marker.
    pub fn is_shallow(&self) -> bool {
        self.git_dir.join("shallow").is_file()
    }
}

fn parse_gitlink(contents: &str) -> Option<&str> {
    let target = contents.strip_prefix("gitdir:")?.trim();
    (!target.is_empty()).then_some(target)
}

fn is_bare_layout(dir: &Path) -> bool {
    dir.join("HEAD").is_file() && dir.join("objects").is_dir() && dir.join("refs").is_dir()
}
