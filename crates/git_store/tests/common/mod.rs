//! Fixture helpers that build real repositories by driving the `git` binary.
#![allow(dead_code)]

use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

pub struct TestRepo {
    dir: TempDir,
}

impl TestRepo {
    /// Initializes a repository with a configured identity on branch `main`.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp directory");
        let repo = Self { dir };
        repo.git(&["init", "--initial-branch=main"]);
        repo.git(&["config", "user.email", "test@example.com"]);
        repo.git(&["config", "user.name", "Test User"]);
        repo.git(&["config", "commit.gpgsign", "false"]);
        repo.git(&["config", "tag.gpgsign", "false"]);
        repo
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Runs git in the repository, asserting success, returning stdout.
    pub fn git(&self, args: &[&str]) -> String {
        git_in(self.path(), args)
    }

    pub fn head(&self) -> String {
        self.git(&["rev-parse", "HEAD"]).trim().to_string()
    }

    pub fn write_file(&self, relative: &str, contents: &str) {
        let path = self.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, contents).unwrap();
    }

    /// Writes a file, stages everything, and commits. Returns the commit id.
    pub fn commit_file(&self, relative: &str, contents: &str, message: &str) -> String {
        self.write_file(relative, contents);
        self.git(&["add", "-A"]);
        self.git(&["commit", "-m", message]);
        self.head()
    }

    pub fn commit_empty(&self, message: &str) -> String {
        self.git(&["commit", "--allow-empty", "-m", message]);
        self.head()
    }

    /// Packs all loose objects into a single packfile.
    pub fn repack(&self) {
        self.git(&["repack", "-ad"]);
        self.git(&["prune-packed"]);
    }
}

pub fn git_in(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}
