use camino::Utf8PathBuf;
use clap::ValueEnum;
use gitver_core::{
    BuildContext, ReleaseVersionIncrement, load_from_working_tree, plan_release,
    validate_preconditions,
};
use git_store::ObjectStore;

use super::{CliError, OutputFormat, print_json, project_directory, relative_to,
    update_version_field};

/// Plan a release branch and advance the current branch to the next version.
///
/// Computes the release-branch version and branch name from the `release`
/// section of version.json, validates the repository state, and rewrites the
/// working-tree version.json with the next version. Creating the branch and
/// committing are left to git.
#[derive(clap::Parser, Debug)]
pub struct PrepareRelease {
    /// Prerelease tag for the release branch (e.g. `rc`). Omit it for a
    /// stable release version.
    pub tag: Option<String>,
    /// The version the current branch moves to, e.g. `2.1.0`.
    /// Defaults to incrementing the current version.
    #[arg(long = "nextVersion", value_name = "VERSION")]
    pub next_version: Option<String>,
    /// Which version field to increment when --nextVersion is not given.
    /// Defaults to the configured `release.versionIncrement`.
    #[arg(long = "versionIncrement", value_enum, value_name = "FIELD")]
    pub version_increment: Option<IncrementArg>,
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
    /// The project directory whose configuration is released.
    /// Defaults to the current directory.
    #[arg(long, value_name = "PATH")]
    pub project: Option<Utf8PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum IncrementArg {
    Major,
    Minor,
    Build,
}

impl From<IncrementArg> for ReleaseVersionIncrement {
    fn from(value: IncrementArg) -> Self {
        match value {
            IncrementArg::Major => Self::Major,
            IncrementArg::Minor => Self::Minor,
            IncrementArg::Build => Self::Build,
        }
    }
}

impl PrepareRelease {
    pub fn run(self) -> anyhow::Result<()> {
        let project = project_directory(self.project.as_ref())?;
        let store = ObjectStore::discover(&project)?;
        let Some(work_tree) = store.work_tree().map(std::path::Path::to_path_buf) else {
            return Err(CliError::NoRepository(project).into());
        };
        let subdir = relative_to(&work_tree, &project);

        let loaded = load_from_working_tree(&work_tree, &subdir)?
            .ok_or_else(|| gitver_core::Error::ConfigMissing(project.display().to_string()))?;

        let next_version = self
            .next_version
            .as_deref()
            .map(|text| {
                semver::Version::parse(text).map_err(|e| {
                    CliError::InvalidVersionSpec(text.to_string(), e.to_string())
                })
            })
            .transpose()?;

        let plan = plan_release(
            &loaded.options,
            self.tag.as_deref(),
            next_version.as_ref(),
            self.version_increment.map(Into::into),
        )?;

        let ctx = BuildContext::from_process_env();
        validate_preconditions(&store, &subdir, &plan, &ctx)?;

        let config_dir = if loaded.directory.is_empty() {
            work_tree.clone()
        } else {
            work_tree.join(&loaded.directory)
        };
        let written = update_version_field(&config_dir, &plan.next_main_version)?;

        match self.format {
            OutputFormat::Json => print_json(&plan),
            OutputFormat::Text => {
                println!(
                    "release branch {} carries version {}",
                    plan.branch_name, plan.release_branch_version
                );
                println!(
                    "{} updated to {}; commit it to finish",
                    written.display(),
                    plan.next_main_version
                );
            }
        }
        Ok(())
    }
}
