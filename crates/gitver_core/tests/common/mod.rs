//! Fixture helpers that build real repositories by driving the `git` binary.
#![allow(dead_code)]

use std::path::Path;
use std::process::Command;

use gitver_core::BuildContext;
use tempfile::TempDir;

pub struct TestRepo {
    dir: TempDir,
}

impl TestRepo {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp directory");
        let repo = Self { dir };
        repo.git(&["init", "--initial-branch=main"]);
        repo.git(&["config", "user.email", "test@example.com"]);
        repo.git(&["config", "user.name", "Test User"]);
        repo.git(&["config", "commit.gpgsign", "false"]);
        repo
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn git(&self, args: &[&str]) -> String {
        let output = Command::new("git")
            .args(args)
            .current_dir(self.path())
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

    /// Commits a `version.json` with the given contents at `dir` ("" for the
    /// repository root).
    pub fn set_version_json(&self, dir: &str, json: &str) -> String {
        let relative = if dir.is_empty() {
            "version.json".to_string()
        } else {
            format!("{dir}/version.json")
        };
        self.commit_file(&relative, json, "set version configuration")
    }
}

/// A build context with no cloud environment and captured output.
pub fn plain_context() -> BuildContext {
    BuildContext::for_testing(Vec::<(String, String)>::new())
}
