//! Deterministic, tag-independent versioning from the shape of a git
//! repository's history.
//!
//! Given a repository, a project subdirectory, and a committish, the oracle
//! in this crate produces the complete set of version artifacts a build
//! stamps: numeric versions, package versions, build numbers, commit-id
//! encodings, and the public-release flag. Every output is a pure function
//! of the commit DAG and the checked-in `version.json`; two builds of the
//! same commit always agree.

mod cloud;
mod encode;
mod error;
mod height;
mod options;
mod oracle;
mod release;
mod version;
mod version_file;

pub use cloud::{BuildContext, CloudProvider};
pub use encode::{
    MAX_REVISION_COMPONENT, MAX_STAMP_COMPONENT, StampedVersion, apply_offset,
    commit_id_fragment, decode, encode,
};
pub use error::{Error, Result};
pub use height::{HeightEngine, LineageSignature, VERSION_CACHE_JSON};
pub use options::{
    AssemblyVersionOptions, AssemblyVersionPrecision, BuildNumberOptions, CloudBuildOptions,
    DEFAULT_VERSION, IncludeCommitIdOptions, IncludeCommitIdWhen, IncludeCommitIdWhere,
    NuGetPackageVersionOptions, NuGetSemVerLevel, ReleaseOptions, ReleaseVersionIncrement,
    VersionOptions,
};
pub use oracle::{VersionArtifacts, VersionComputation, compute, emit_cloud_build};
pub use release::{ReleasePlan, plan_release, validate_preconditions};
pub use version::SemanticVersion;
pub use version_file::{
    LoadedOptions, VERSION_JSON, VERSION_TXT, is_version_defined_in_commit,
    is_version_defined_in_working_tree, load_from_commit, load_from_working_tree,
    save_to_directory,
};
