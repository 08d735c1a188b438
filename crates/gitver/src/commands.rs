mod get_commits;
mod get_version;
mod install;
mod prepare_release;
mod set_version;
mod tag;

use std::path::{Path, PathBuf};

use camino::Utf8PathBuf;
use clap::ValueEnum;
use gitver_core::{SemanticVersion, VERSION_JSON, VersionOptions};
use serde::Serialize;
use thiserror::Error;

use self::{
    get_commits::GetCommits, get_version::GetVersion, install::Install,
    prepare_release::PrepareRelease, set_version::SetVersion, tag::Tag,
};

#[derive(clap::Subcommand, Debug)]
pub enum Command {
    GetVersion(GetVersion),
    SetVersion(SetVersion),
    Install(Install),
    GetCommits(GetCommits),
    Tag(Tag),
    PrepareRelease(PrepareRelease),
}

impl Command {
    pub fn run(self) -> anyhow::Result<()> {
        match self {
            Command::GetVersion(command) => command.run(),
            Command::SetVersion(command) => command.run(),
            Command::Install(command) => command.run(),
            Command::GetCommits(command) => command.run(),
            Command::Tag(command) => command.run(),
            Command::PrepareRelease(command) => command.run(),
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, Eq, PartialEq)]
pub enum OutputFormat {
    Text,
    Json,
}

pub fn print_json(output: impl Serialize) {
    match serde_json::to_string_pretty(&output) {
        Ok(json) => println!("{json}"),
        Err(e) => tracing::error!("can't serialize output to json: {e}"),
    }
}

/// Failures that belong to the command layer itself, each owning one of the
/// documented exit codes.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("'{0}' is not a valid version: {1}")]
    InvalidVersionSpec(String, String),

    #[error("unknown version variable '{0}'")]
    UnknownVariable(String),

    #[error("tag '{0}' already exists and points at a different commit")]
    TagConflict(String),

    #[error("no git repository found at {0}")]
    NoRepository(PathBuf),

    #[error("version {0} does not map to exactly one commit ({1} candidates)")]
    AmbiguousVersion(String, usize),
}

/// Exit codes are a stable contract: additions are appended, never
/// renumbered.
pub fn exit_code_for(error: &anyhow::Error) -> u8 {
    if let Some(cli) = error.downcast_ref::<CliError>() {
        return match cli {
            CliError::InvalidVersionSpec(_, _) => 2,
            CliError::AmbiguousVersion(_, _) => 3,
            CliError::TagConflict(_) => 10,
            CliError::UnknownVariable(_) => 11,
            CliError::NoRepository(_) => 1,
        };
    }
    if let Some(core) = error.downcast_ref::<gitver_core::Error>() {
        return core_exit_code(core);
    }
    if let Some(git) = error.downcast_ref::<git_store::Error>() {
        return git_exit_code(git);
    }
    1
}

fn core_exit_code(error: &gitver_core::Error) -> u8 {
    use gitver_core::Error;
    match error {
        Error::ConfigMissing(_) | Error::ConfigFormat { .. } => 9,
        Error::ReleaseBranchExists(_) => 12,
        Error::ReleaseDetachedHead => 13,
        Error::ReleaseUncommittedChanges(_) => 14,
        Error::ReleaseInvalidBranchName(_, _) => 15,
        Error::ReleaseInvalidVersionIncrement(_, _) => 16,
        Error::ReleaseVersionDecrement { .. } => 17,
        Error::ReleaseUserNotConfigured => 18,
        Error::Git(git) => git_exit_code(git),
        Error::Io(_) => 1,
    }
}

fn git_exit_code(error: &git_store::Error) -> u8 {
    use git_store::Error;
    match error {
        Error::BadCommittish(_) | Error::AmbiguousId(_) => 3,
        Error::ShallowClone(_) => 6,
        Error::NotARepository(_) => 1,
        _ => 1,
    }
}

/// The directory a command operates on: `--project` or the working
/// directory.
pub fn project_directory(project: Option<&Utf8PathBuf>) -> anyhow::Result<PathBuf> {
    match project {
        Some(path) => Ok(path.as_std_path().to_path_buf()),
        None => Ok(std::env::current_dir()?),
    }
}

/// The repo-relative subdirectory of `dir` ("" for the root or a bare
/// repository).
pub fn subdir_of(store: &git_store::ObjectStore, dir: &Path) -> String {
    match store.work_tree() {
        Some(work_tree) => relative_to(work_tree, dir),
        None => String::new(),
    }
}

/// `dir` relative to `root`, `/`-separated; empty when they are the same or
/// unrelated.
pub fn relative_to(root: &Path, dir: &Path) -> String {
    let root = std::fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
    let dir = std::fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf());
    dir.strip_prefix(&root)
        .map(|relative| {
            relative
                .components()
                .filter_map(|c| c.as_os_str().to_str())
                .collect::<Vec<_>>()
                .join("/")
        })
        .unwrap_or_default()
}

/// Rewrites only the `version` field of the document in `dir`, preserving
/// everything else in it; creates a fresh document when none exists.
pub fn update_version_field(dir: &Path, version: &SemanticVersion) -> anyhow::Result<PathBuf> {
    let path = dir.join(VERSION_JSON);
    let mut options: VersionOptions = match fs_err::read(&path) {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map_err(|e| gitver_core::Error::ConfigFormat {
                path: path.display().to_string(),
                commit_id: None,
                message: e.to_string(),
            })?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => VersionOptions::default(),
        Err(e) => return Err(e.into()),
    };
    options.version = Some(version.clone());
    let written = gitver_core::save_to_directory(&options, dir)?;
    Ok(written)
}

/// Parses a version expression from the command line.
pub fn parse_version_spec(text: &str) -> anyhow::Result<SemanticVersion> {
    SemanticVersion::parse(text)
        .map_err(|reason| CliError::InvalidVersionSpec(text.to_string(), reason).into())
}
