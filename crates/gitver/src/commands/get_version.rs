use camino::Utf8PathBuf;
use gitver_core::BuildContext;

use super::{CliError, OutputFormat, print_json, project_directory};

/// Compute the version for a commit and print the full artifact set.
///
/// The version is a pure function of the commit graph and the checked-in
/// version.json: every clone of the repository computes the same answer for
/// the same commit.
#[derive(clap::Parser, Debug)]
pub struct GetVersion {
    /// The commit to compute the version for: a ref name, a full or
    /// abbreviated commit id, or HEAD. Defaults to HEAD.
    pub committish: Option<String>,
    /// Extra build-metadata identifiers to append to the informational
    /// version. May be repeated.
    #[arg(long = "metadata", value_name = "IDENTIFIER")]
    pub metadata: Vec<String>,
    /// Print only this variable (e.g. `SemVer2`, `GitCommitId`) instead of
    /// the whole set.
    #[arg(long, value_name = "NAME")]
    pub variable: Option<String>,
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
    /// The project directory the version applies to.
    /// Defaults to the current directory.
    #[arg(long, value_name = "PATH")]
    pub project: Option<Utf8PathBuf>,
}

impl GetVersion {
    pub fn run(self) -> anyhow::Result<()> {
        let project = project_directory(self.project.as_ref())?;
        let ctx = BuildContext::from_process_env();
        let computation = gitver_core::compute(
            &project,
            self.committish.as_deref(),
            &self.metadata,
            &ctx,
        )?;
        gitver_core::emit_cloud_build(&computation, &ctx);

        let artifacts = &computation.artifacts;
        if let Some(name) = &self.variable {
            let value = artifacts
                .variable(name)
                .ok_or_else(|| CliError::UnknownVariable(name.clone()))?;
            println!("{value}");
            return Ok(());
        }
        match self.format {
            OutputFormat::Json => print_json(artifacts),
            OutputFormat::Text => {
                for (key, value) in artifacts.variables() {
                    println!("{key}: {value}");
                }
            }
        }
        Ok(())
    }
}
