use camino::Utf8PathBuf;
use gitver_core::load_from_working_tree;
use git_store::GitPaths;

use super::{parse_version_spec, project_directory, relative_to, update_version_field};

/// Change the configured version, rewriting the effective version.json.
///
/// The new version may carry a prerelease with the `{height}` macro, e.g.
/// `gitver set-version 1.3-beta.{height}`.
#[derive(clap::Parser, Debug)]
pub struct SetVersion {
    /// The new version, e.g. `1.2`, `1.2.3-beta`, or `2.0-rc.{height}`.
    pub version: String,
    /// The project directory whose configuration is edited.
    /// Defaults to the current directory.
    #[arg(long, value_name = "PATH")]
    pub project: Option<Utf8PathBuf>,
}

impl SetVersion {
    pub fn run(self) -> anyhow::Result<()> {
        let version = parse_version_spec(&self.version)?;
        let project = project_directory(self.project.as_ref())?;

        // edit the document that currently governs this project, or start a
        // new one in the project directory
        let target_dir = match GitPaths::discover(&project) {
            Ok(paths) => match paths.work_tree() {
                Some(work_tree) => {
                    let subdir = relative_to(work_tree, &project);
                    match load_from_working_tree(work_tree, &subdir)? {
                        Some(loaded) if loaded.directory.is_empty() => work_tree.to_path_buf(),
                        Some(loaded) => work_tree.join(loaded.directory),
                        None => project.clone(),
                    }
                }
                None => project.clone(),
            },
            Err(_) => project.clone(),
        };

        let written = update_version_field(&target_dir, &version)?;
        println!("{} now specifies version {version}", written.display());
        Ok(())
    }
}
