//! The version oracle: everything a build stamps, computed from the
//! repository, the configuration, and the build context.

use std::path::Path;

use git_store::{Error as GitError, GitPaths, ObjectId, ObjectStore};
use itertools::Itertools;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info};

use crate::cloud::{BuildContext, CloudProvider};
use crate::encode::{self, StampedVersion};
use crate::error::{Error, Result};
use crate::height::{self, HeightEngine, LineageSignature};
use crate::options::{
    DEFAULT_SHORT_ID_LENGTH, IncludeCommitIdWhen, IncludeCommitIdWhere, NuGetSemVerLevel,
    VersionOptions,
};
use crate::version::{SemanticVersion, semver1_prerelease};
use crate::version_file;

/// The version shown when there is no repository, or an empty repository
/// with no configuration.
const FALLBACK_VERSION: &str = "0.0.1";

/// The full artifact set for one build. Read-only after construction.
#[derive(Serialize, Clone, PartialEq, Debug)]
#[serde(rename_all = "camelCase")]
pub struct VersionArtifacts {
    /// Four-component stamped version.
    pub version: String,
    pub assembly_version: String,
    pub assembly_file_version: String,
    pub assembly_informational_version: String,
    /// `major.minor.height`.
    pub simple_version: String,
    pub major_minor_version: String,
    /// Includes the leading hyphen; empty for stable versions.
    pub prerelease_version: String,
    pub build_number: u64,
    pub build_number_first_component: String,
    pub build_number_second_component: String,
    pub build_number_first_and_second_components_if_applicable: String,
    pub sem_ver1: String,
    pub sem_ver2: String,
    pub nu_get_package_version: String,
    pub npm_package_version: String,
    pub chocolatey_package_version: String,
    /// Empty unless `cloudBuild.buildNumber.enabled`.
    pub cloud_build_number: String,
    /// Full 40-hex id; empty when no commit backs the build.
    pub git_commit_id: String,
    pub git_commit_id_short: String,
    pub git_version_height: u64,
    pub public_release: bool,
}

impl VersionArtifacts {
    /// Stable variable names, as published to cloud builds and addressed by
    /// `--variable`.
    pub fn variables(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Version", self.version.clone()),
            ("AssemblyVersion", self.assembly_version.clone()),
            ("AssemblyFileVersion", self.assembly_file_version.clone()),
            (
                "AssemblyInformationalVersion",
                self.assembly_informational_version.clone(),
            ),
            ("SimpleVersion", self.simple_version.clone()),
            ("MajorMinorVersion", self.major_minor_version.clone()),
            ("PrereleaseVersion", self.prerelease_version.clone()),
            ("BuildNumber", self.build_number.to_string()),
            (
                "BuildNumberFirstComponent",
                self.build_number_first_component.clone(),
            ),
            (
                "BuildNumberSecondComponent",
                self.build_number_second_component.clone(),
            ),
            (
                "BuildNumberFirstAndSecondComponentsIfApplicable",
                self.build_number_first_and_second_components_if_applicable
                    .clone(),
            ),
            ("SemVer1", self.sem_ver1.clone()),
            ("SemVer2", self.sem_ver2.clone()),
            ("NuGetPackageVersion", self.nu_get_package_version.clone()),
            ("NpmPackageVersion", self.npm_package_version.clone()),
            (
                "ChocolateyPackageVersion",
                self.chocolatey_package_version.clone(),
            ),
            ("CloudBuildNumber", self.cloud_build_number.clone()),
            ("GitCommitId", self.git_commit_id.clone()),
            ("GitCommitIdShort", self.git_commit_id_short.clone()),
            ("GitVersionHeight", self.git_version_height.to_string()),
            ("PublicRelease", self.public_release.to_string()),
        ]
    }

    /// Case-insensitive lookup of one variable.
    pub fn variable(&self, name: &str) -> Option<String> {
        self.variables()
            .into_iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }
}

/// A computed version plus the effective configuration it came from.
#[derive(Debug)]
pub struct VersionComputation {
    pub artifacts: VersionArtifacts,
    pub options: VersionOptions,
    /// Repo-relative directory of the effective configuration document.
    pub config_directory: Option<String>,
    /// The commit the artifacts describe, when one exists.
    pub commit: Option<ObjectId>,
}

/// Computes the artifact set for a project directory and an optional
/// committish (default `HEAD`).
///
/// A missing repository is not an error: the result is the degenerate
/// `0.0.1.0` set. An empty repository falls back to the working-copy
/// configuration with zero build and revision components.
pub fn compute(
    project_dir: &Path,
    committish: Option<&str>,
    metadata: &[String],
    ctx: &BuildContext,
) -> Result<VersionComputation> {
    let paths = match GitPaths::discover(project_dir) {
        Ok(paths) => paths,
        Err(GitError::NotARepository(_)) => {
            info!("no git repository found; producing the default version");
            return Ok(degenerate(metadata));
        }
        Err(e) => return Err(e.into()),
    };
    let work_tree = paths.work_tree().map(Path::to_path_buf);
    let store = ObjectStore::open(paths)?;
    let subdir = match &work_tree {
        Some(root) => relative_subdir(root, project_dir)?,
        None => String::new(),
    };

    let commit = match committish {
        Some(text) => Some(store.resolve_committish(text)?),
        None => store.head()?.id(),
    };

    let Some(commit) = commit else {
        // unborn HEAD: no commits yet
        return working_tree_fallback(&store, work_tree.as_deref(), &subdir, metadata, ctx);
    };

    let loaded = version_file::load_from_commit(&store, &commit, &subdir)?;
    let (options, config_directory) = match loaded {
        Some(loaded) => (loaded.options, Some(loaded.directory)),
        None => {
            debug!("no version configuration in the commit; synthesizing the default");
            (VersionOptions::default(), None)
        }
    };
    let version = options.version_or_default();

    let signature = LineageSignature::of(&options);
    let cache_path = match (&work_tree, &config_directory) {
        (Some(root), Some(dir)) => {
            let mut path = root.clone();
            if !dir.is_empty() {
                path.push(dir);
            }
            path.push(height::VERSION_CACHE_JSON);
            Some(path)
        }
        _ => None,
    };
    let cached = cache_path
        .as_deref()
        .and_then(|path| height::read_cached_height(path, signature.base_version(), &commit));
    let height = match cached {
        Some(height) => height,
        None => {
            let scope_dir = config_directory.as_deref().unwrap_or(subdir.as_str());
            let mut engine = HeightEngine::new(&store, &subdir, scope_dir, &options)?;
            let height = engine.height(&commit)?;
            if let Some(path) = cache_path.as_deref() {
                height::write_cached_height(path, signature.base_version(), &commit, height);
            }
            height
        }
    };
    let stamped_height = encode::apply_offset(height, options.build_number_offset_or_default());

    let short_id = short_commit_id(&store, &commit, &options)?;
    let public_release = is_public_release(&store, &options, ctx)?;

    let artifacts = assemble(
        &options,
        &version,
        height,
        stamped_height,
        Some(&commit),
        &short_id,
        public_release,
        metadata,
    );
    Ok(VersionComputation {
        artifacts,
        options,
        config_directory,
        commit: Some(commit),
    })
}

fn working_tree_fallback(
    store: &ObjectStore,
    work_tree: Option<&Path>,
    subdir: &str,
    metadata: &[String],
    ctx: &BuildContext,
) -> Result<VersionComputation> {
    let loaded = match work_tree {
        Some(root) => version_file::load_from_working_tree(root, subdir)?,
        None => None,
    };
    let (options, config_directory, version) = match loaded {
        Some(loaded) => {
            let version = loaded.options.version_or_default();
            (loaded.options, Some(loaded.directory), version)
        }
        None => (
            VersionOptions::default(),
            None,
            SemanticVersion::parse(FALLBACK_VERSION).expect("fallback parses"),
        ),
    };
    let public_release = is_public_release(store, &options, ctx)?;
    let artifacts = assemble(
        &options,
        &version,
        0,
        0,
        None,
        "",
        public_release,
        metadata,
    );
    Ok(VersionComputation {
        artifacts,
        options,
        config_directory,
        commit: None,
    })
}

fn degenerate(metadata: &[String]) -> VersionComputation {
    let options = VersionOptions::default();
    let version = SemanticVersion::parse(FALLBACK_VERSION).expect("fallback parses");
    let artifacts = assemble(&options, &version, 0, 0, None, "", false, metadata);
    VersionComputation {
        artifacts,
        options,
        config_directory: None,
        commit: None,
    }
}

/// The working ref used for the public-release decision: the cloud-provided
/// ref when a build service is detected, otherwise HEAD's canonical name.
fn is_public_release(
    store: &ObjectStore,
    options: &VersionOptions,
    ctx: &BuildContext,
) -> Result<bool> {
    let specs = options.public_release_ref_spec_or_default();
    if specs.is_empty() {
        return Ok(false);
    }
    let cloud_ref = CloudProvider::detect(ctx).and_then(|provider| provider.building_ref(ctx));
    let effective_ref = match cloud_ref {
        Some(r) => Some(r),
        None => store.head()?.ref_name().map(str::to_string),
    };
    let Some(effective_ref) = effective_ref else {
        return Ok(false);
    };
    for spec in specs {
        let regex = Regex::new(spec).map_err(|e| Error::ConfigFormat {
            path: version_file::VERSION_JSON.to_string(),
            commit_id: None,
            message: format!("bad publicReleaseRefSpec entry '{spec}': {e}"),
        })?;
        if regex.is_match(&effective_ref) {
            debug!(git_ref = %effective_ref, spec, "public release ref matched");
            return Ok(true);
        }
    }
    Ok(false)
}

fn short_commit_id(
    store: &ObjectStore,
    commit: &ObjectId,
    options: &VersionOptions,
) -> Result<String> {
    if let Some(minimum) = options.git_commit_id_short_auto_minimum {
        if minimum > 0 {
            return Ok(store.short_id(commit, minimum)?);
        }
    }
    let length = options
        .git_commit_id_short_fixed_length
        .unwrap_or(DEFAULT_SHORT_ID_LENGTH)
        .clamp(4, 40);
    Ok(commit.to_hex()[..length].to_string())
}

fn relative_subdir(work_tree: &Path, project_dir: &Path) -> Result<String> {
    let root = std::fs::canonicalize(work_tree)?;
    let project = std::fs::canonicalize(project_dir)?;
    let relative = project.strip_prefix(&root).unwrap_or(Path::new(""));
    Ok(relative
        .components()
        .filter_map(|c| c.as_os_str().to_str())
        .join("/"))
}

#[expect(clippy::too_many_arguments)]
fn assemble(
    options: &VersionOptions,
    version: &SemanticVersion,
    height: u64,
    stamped_height: u64,
    commit: Option<&ObjectId>,
    short_id: &str,
    public_release: bool,
    metadata: &[String],
) -> VersionArtifacts {
    let quad = encode::encode(version, stamped_height, commit);
    let substituted = version.substitute_height(stamped_height);
    let prerelease = substituted.prerelease().to_string();

    let simple_version = format!("{}.{}.{}", quad.major, quad.minor, quad.build);
    let major_minor_version = format!("{}.{}", quad.major, quad.minor);

    // build metadata: configured identifiers, then the commit, then caller
    // supplied items
    let mut metadata_parts: Vec<String> = substituted
        .build_metadata()
        .strip_prefix('+')
        .map(|meta| meta.split('.').map(str::to_string).collect())
        .unwrap_or_default();
    if commit.is_some() {
        metadata_parts.push(format!("g{short_id}"));
    }
    metadata_parts.extend(metadata.iter().cloned());
    let metadata_suffix = if metadata_parts.is_empty() {
        String::new()
    } else {
        format!("+{}", metadata_parts.iter().join("."))
    };

    let sem_ver2 = format!("{simple_version}{prerelease}{metadata_suffix}");
    let sem_ver1 = format!(
        "{simple_version}{}",
        semver1_prerelease(&prerelease, options.semver1_padding_or_default())
    );

    let package_suffix_needed = !public_release && commit.is_some();
    let package_sem_ver1 = if package_suffix_needed {
        format!("{sem_ver1}-g{short_id}")
    } else {
        sem_ver1.clone()
    };
    let package_sem_ver2 = if package_suffix_needed {
        if prerelease.is_empty() {
            format!("{simple_version}-g{short_id}")
        } else {
            format!("{simple_version}{prerelease}.g{short_id}")
        }
    } else {
        format!("{simple_version}{prerelease}")
    };
    let nu_get_package_version = match options.nuget_semver_or_default() {
        NuGetSemVerLevel::One => package_sem_ver1.clone(),
        NuGetSemVerLevel::Two => package_sem_ver2.clone(),
    };

    let assembly_quad = options.assembly_version_quad(version, quad.build);
    let assembly_version = assembly_quad.iter().join(".");

    let (first, second) = split_build_number(stamped_height);
    let build_number_first_component = first.to_string();
    let build_number_second_component = second.map(|s| s.to_string()).unwrap_or_default();
    let build_number_first_and_second_components_if_applicable = match second {
        Some(second) => format!("{first}.{second}"),
        None => build_number_first_component.clone(),
    };

    let cloud_build_number = cloud_build_number(
        options,
        &simple_version,
        &prerelease,
        quad,
        commit,
        short_id,
        public_release,
    );

    VersionArtifacts {
        version: quad.to_string(),
        assembly_version,
        assembly_file_version: quad.to_string(),
        assembly_informational_version: sem_ver2.clone(),
        simple_version,
        major_minor_version,
        prerelease_version: prerelease,
        build_number: stamped_height,
        build_number_first_component,
        build_number_second_component,
        build_number_first_and_second_components_if_applicable,
        sem_ver1,
        sem_ver2,
        nu_get_package_version,
        npm_package_version: package_sem_ver2,
        chocolatey_package_version: package_sem_ver1,
        cloud_build_number,
        git_commit_id: commit.map(ObjectId::to_hex).unwrap_or_default(),
        git_commit_id_short: short_id.to_string(),
        git_version_height: height,
        public_release,
    }
}

/// Build numbers above 0xFFFF split into two 16-bit halves so hosts with
/// 16-bit component limits can still represent them.
fn split_build_number(stamped_height: u64) -> (u64, Option<u64>) {
    if stamped_height <= 0xFFFF {
        (stamped_height, None)
    } else {
        (stamped_height >> 16, Some(stamped_height & 0xFFFF))
    }
}

fn cloud_build_number(
    options: &VersionOptions,
    simple_version: &str,
    prerelease: &str,
    quad: StampedVersion,
    commit: Option<&ObjectId>,
    short_id: &str,
    public_release: bool,
) -> String {
    let Some(cloud) = &options.cloud_build else {
        return String::new();
    };
    if !cloud.build_number.enabled {
        return String::new();
    }
    let include = commit.is_some()
        && match cloud.build_number.include_commit_id.when {
            IncludeCommitIdWhen::Always => true,
            IncludeCommitIdWhen::NonPublicReleaseOnly => !public_release,
            IncludeCommitIdWhen::Never => false,
        };
    if !include {
        return format!("{simple_version}{prerelease}");
    }
    match cloud.build_number.include_commit_id.r#where {
        IncludeCommitIdWhere::BuildMetadata => {
            format!("{simple_version}{prerelease}+g{short_id}")
        }
        IncludeCommitIdWhere::FourthVersionComponent => {
            format!("{simple_version}.{}{prerelease}", quad.revision)
        }
    }
}

/// Publishes the computed version to a detected cloud build service, per the
/// configuration's `cloudBuild` section.
pub fn emit_cloud_build(computation: &VersionComputation, ctx: &BuildContext) {
    let Some(provider) = CloudProvider::detect(ctx) else {
        return;
    };
    let Some(cloud) = &computation.options.cloud_build else {
        return;
    };
    let artifacts = &computation.artifacts;
    if cloud.build_number.enabled && !artifacts.cloud_build_number.is_empty() {
        provider.emit_build_number(ctx, &artifacts.cloud_build_number);
    }
    if cloud.set_version_variables {
        for (key, value) in artifacts.variables() {
            provider.emit_variable(ctx, key, &value);
        }
    }
}
