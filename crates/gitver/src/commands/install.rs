use camino::Utf8PathBuf;
use git_store::GitPaths;

use super::{CliError, parse_version_spec, update_version_field};

/// Initialize versioning for a repository by writing a version.json.
#[derive(clap::Parser, Debug)]
pub struct Install {
    /// The initial version to configure.
    #[arg(long, default_value = "1.0-beta")]
    pub version: String,
    /// Directory to place version.json in. Defaults to the current
    /// directory. Must live inside a git repository.
    #[arg(long, value_name = "PATH")]
    pub path: Option<Utf8PathBuf>,
}

impl Install {
    pub fn run(self) -> anyhow::Result<()> {
        let version = parse_version_spec(&self.version)?;
        let dir = match &self.path {
            Some(path) => path.as_std_path().to_path_buf(),
            None => std::env::current_dir()?,
        };
        if GitPaths::discover(&dir).is_err() {
            return Err(CliError::NoRepository(dir).into());
        }

        let written = update_version_field(&dir, &version)?;
        println!(
            "{} initialized with version {version}; commit it to start versioning",
            written.display()
        );
        Ok(())
    }
}
