//! Stateless release planning: the versions and branch name a release
//! preparation would produce, plus the repository precondition checks.
//!
//! Nothing here mutates the repository; acting on a plan is the caller's
//! business, limited to the writes this tool permits itself (a working-tree
//! `version.json`).

use std::path::Path;

use git_store::ObjectStore;
use tracing::debug;

use crate::cloud::BuildContext;
use crate::error::{Error, Result};
use crate::options::{ReleaseOptions, ReleaseVersionIncrement, VersionOptions};
use crate::version::{HEIGHT_MACRO, SemanticVersion};
use crate::version_file;

pub const VERSION_PLACEHOLDER: &str = "{version}";

/// What a release preparation would do.
#[derive(Clone, PartialEq, Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleasePlan {
    /// The branch to create, derived from `release.branchName`.
    pub branch_name: String,
    /// The version to commit on the release branch: the current version with
    /// the prerelease pinned to the release tag (static, no height macro).
    pub release_branch_version: SemanticVersion,
    /// The version to commit on the current branch afterwards.
    pub next_main_version: SemanticVersion,
}

/// Computes a release plan from the current configuration.
///
/// `tag` pins the release branch prerelease (`None` or empty means a stable
/// release); `next_version` overrides the increment-derived next version;
/// `increment` overrides `release.versionIncrement`.
pub fn plan_release(
    current: &VersionOptions,
    tag: Option<&str>,
    next_version: Option<&semver::Version>,
    increment: Option<ReleaseVersionIncrement>,
) -> Result<ReleasePlan> {
    let version = current
        .version
        .clone()
        .ok_or_else(|| Error::ConfigMissing("the version configuration".to_string()))?;
    let release = current.release.clone().unwrap_or_default();

    let branch_name = release_branch_name(&release, &version)?;

    let release_prerelease = match tag {
        Some(tag) if !tag.is_empty() => {
            validate_prerelease_tag(tag)?;
            format!("-{tag}")
        }
        _ => String::new(),
    };
    // the release branch version is fully static: no height macro survives
    // in either the prerelease or the build metadata
    let release_branch_version = version
        .with_prerelease(&release_prerelease)
        .with_build_metadata(&version.build_metadata_without_height());

    let next_main_version = match next_version {
        Some(next) => {
            let next = from_strict_semver(next, version.component_count());
            ensure_newer(&version, &next)?;
            next
        }
        None => incremented(
            &version,
            increment.unwrap_or(release.version_increment),
            &release.first_unstable_tag,
        )?,
    };

    debug!(branch = %branch_name, next = %next_main_version, "planned release");
    Ok(ReleasePlan {
        branch_name,
        release_branch_version,
        next_main_version,
    })
}

fn release_branch_name(release: &ReleaseOptions, version: &SemanticVersion) -> Result<String> {
    if !release.branch_name.contains(VERSION_PLACEHOLDER) {
        return Err(Error::ReleaseInvalidBranchName(
            release.branch_name.clone(),
            format!("the template must contain {VERSION_PLACEHOLDER}"),
        ));
    }
    let field_count = match release.version_field_count {
        Some(count) if (1..=3).contains(&count) => count,
        Some(count) => {
            return Err(Error::ReleaseInvalidBranchName(
                release.branch_name.clone(),
                format!("versionFieldCount must be 1, 2, or 3, not {count}"),
            ));
        }
        None => version.component_count().min(3),
    };
    Ok(release
        .branch_name
        .replace(VERSION_PLACEHOLDER, &version.truncated_numeric(field_count)))
}

fn validate_prerelease_tag(tag: &str) -> Result<()> {
    let valid = !tag.is_empty()
        && tag
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'.');
    if valid {
        Ok(())
    } else {
        Err(Error::ReleaseInvalidBranchName(
            tag.to_string(),
            "prerelease tags may contain only alphanumerics, hyphens, and dots".to_string(),
        ))
    }
}

/// An explicit next version is used as given, including its prerelease.
fn from_strict_semver(next: &semver::Version, current_count: usize) -> SemanticVersion {
    let mut components = vec![next.major, next.minor];
    if current_count >= 3 || next.patch != 0 {
        components.push(next.patch);
    }
    let base = SemanticVersion::new(components);
    if next.pre.is_empty() {
        base
    } else {
        base.with_prerelease(&format!("-{}", next.pre))
    }
}

fn ensure_newer(current: &SemanticVersion, next: &SemanticVersion) -> Result<()> {
    if next.components() > current.components() {
        Ok(())
    } else {
        Err(Error::ReleaseVersionDecrement {
            current: current.to_string(),
            next: next.to_string(),
        })
    }
}

fn incremented(
    version: &SemanticVersion,
    increment: ReleaseVersionIncrement,
    first_unstable_tag: &str,
) -> Result<SemanticVersion> {
    let mut components = version.components().to_vec();
    match increment {
        ReleaseVersionIncrement::Major => {
            components[0] += 1;
            for later in components.iter_mut().skip(1) {
                *later = 0;
            }
        }
        ReleaseVersionIncrement::Minor => {
            components[1] += 1;
            for later in components.iter_mut().skip(2) {
                *later = 0;
            }
        }
        ReleaseVersionIncrement::Build => {
            if components.len() < 3 {
                return Err(Error::ReleaseInvalidVersionIncrement(
                    "Build".to_string(),
                    version.to_string(),
                ));
            }
            components[2] += 1;
        }
    }
    let next = SemanticVersion::new(components);
    let prerelease = if first_unstable_tag.is_empty() {
        version.prerelease().to_string()
    } else if version.prerelease_contains_height_macro() {
        format!("-{first_unstable_tag}.{HEIGHT_MACRO}")
    } else {
        format!("-{first_unstable_tag}")
    };
    Ok(next.with_prerelease(&prerelease))
}

/// Repository checks that must pass before a release plan is acted on.
/// Returned errors are the enumerated release-planning kinds.
pub fn validate_preconditions(
    store: &ObjectStore,
    project_subdir: &str,
    plan: &ReleasePlan,
    ctx: &BuildContext,
) -> Result<()> {
    let head = store.head()?;
    if head.ref_name().is_none() {
        return Err(Error::ReleaseDetachedHead);
    }

    let branch_ref = format!("refs/heads/{}", plan.branch_name);
    if store.ref_target(&branch_ref)?.is_some() {
        return Err(Error::ReleaseBranchExists(plan.branch_name.clone()));
    }

    if !has_user_identity(store, ctx) {
        return Err(Error::ReleaseUserNotConfigured);
    }

    // The only file release preparation rewrites is the effective
    // version.json; refuse to clobber local edits to it.
    if let (Some(work_tree), Some(commit)) = (store.work_tree(), head.id()) {
        if let Some(loaded) = version_file::load_from_commit(store, &commit, project_subdir)? {
            let committed = version_file::load_from_working_tree(work_tree, project_subdir)?;
            let dirty = match committed {
                Some(in_tree) => {
                    in_tree.directory != loaded.directory || in_tree.options != loaded.options
                }
                None => true,
            };
            if dirty {
                let path = if loaded.directory.is_empty() {
                    version_file::VERSION_JSON.to_string()
                } else {
                    format!("{}/{}", loaded.directory, version_file::VERSION_JSON)
                };
                return Err(Error::ReleaseUncommittedChanges(path));
            }
        }
    }

    Ok(())
}

/// True when git has a usable author identity: `user.name` and `user.email`
/// from the repository config or the user-global config files.
fn has_user_identity(store: &ObjectStore, ctx: &BuildContext) -> bool {
    let mut name = false;
    let mut email = false;
    let mut paths = vec![store.git_dir().join("config")];
    if let Some(home) = ctx.env("HOME") {
        paths.push(Path::new(home).join(".gitconfig"));
        paths.push(Path::new(home).join(".config/git/config"));
    }
    if let Some(xdg) = ctx.env("XDG_CONFIG_HOME") {
        paths.push(Path::new(xdg).join("git/config"));
    }
    for path in paths {
        if let Ok(contents) = std::fs::read_to_string(&path) {
            scan_git_config(&contents, &mut name, &mut email);
        }
    }
    name && email
}

/// Just enough INI to find `[user] name` and `[user] email`.
fn scan_git_config(contents: &str, name: &mut bool, email: &mut bool) {
    let mut in_user_section = false;
    for line in contents.lines() {
        let line = line.trim();
        if line.starts_with('[') {
            in_user_section = line.eq_ignore_ascii_case("[user]");
            continue;
        }
        if !in_user_section {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim();
            let has_value = !value.trim().is_empty();
            if key.eq_ignore_ascii_case("name") {
                *name |= has_value;
            } else if key.eq_ignore_ascii_case("email") {
                *email |= has_value;
            }
        }
    }
}
