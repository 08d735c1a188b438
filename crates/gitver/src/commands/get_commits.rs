use camino::Utf8PathBuf;
use git_store::ObjectStore;
use gitver_core::StampedVersion;
use tracing::info;

use super::{CliError, project_directory, subdir_of};

/// List the commits that could have produced a stamped version.
///
/// Decoding matches the commit-id fragment embedded in the fourth version
/// component and recomputes the version height for each candidate.
#[derive(clap::Parser, Debug)]
pub struct GetCommits {
    /// The stamped version, e.g. `5.8.7.19133`.
    pub version: String,
    /// Print only the commit ids, one per line.
    #[arg(long, short)]
    pub quiet: bool,
    /// The project directory the version applies to.
    /// Defaults to the current directory.
    #[arg(long, value_name = "PATH")]
    pub project: Option<Utf8PathBuf>,
}

impl GetCommits {
    pub fn run(self) -> anyhow::Result<()> {
        let query: StampedVersion = self
            .version
            .parse()
            .map_err(|reason| CliError::InvalidVersionSpec(self.version.clone(), reason))?;
        let project = project_directory(self.project.as_ref())?;
        let store = ObjectStore::discover(&project)?;
        let subdir = subdir_of(&store, &project);

        let candidates = gitver_core::decode(&store, &subdir, &query)?;
        for id in &candidates {
            if self.quiet {
                println!("{id}");
            } else {
                println!("{id} (version {query})");
            }
        }
        if !self.quiet {
            info!("{} candidate commit(s) for {query}", candidates.len());
        }
        Ok(())
    }
}
