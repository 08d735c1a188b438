use camino::Utf8PathBuf;
use gitver_core::{BuildContext, StampedVersion};
use git_store::ObjectStore;

use super::{CliError, project_directory, subdir_of};

/// Create a git tag naming the version of a commit.
///
/// The target may be given as a committish or as a previously stamped
/// four-component version; it defaults to HEAD. The tag is named
/// `v<version>` and never moves an existing tag.
#[derive(clap::Parser, Debug)]
pub struct Tag {
    /// A committish, or a stamped version like `1.2.5.19133` to look the
    /// commit up by. Defaults to HEAD.
    pub version_or_ref: Option<String>,
    /// The project directory the version applies to.
    /// Defaults to the current directory.
    #[arg(long, value_name = "PATH")]
    pub project: Option<Utf8PathBuf>,
}

impl Tag {
    pub fn run(self) -> anyhow::Result<()> {
        let project = project_directory(self.project.as_ref())?;
        let store = ObjectStore::discover(&project)?;

        let committish = match &self.version_or_ref {
            Some(text) => match text.parse::<StampedVersion>() {
                Ok(stamped) => {
                    let subdir = subdir_of(&store, &project);
                    let candidates = gitver_core::decode(&store, &subdir, &stamped)?;
                    match candidates.as_slice() {
                        [only] => only.to_hex(),
                        _ => {
                            return Err(CliError::AmbiguousVersion(
                                stamped.to_string(),
                                candidates.len(),
                            )
                            .into());
                        }
                    }
                }
                Err(_) => text.clone(),
            },
            None => "HEAD".to_string(),
        };

        let ctx = BuildContext::from_process_env();
        let computation = gitver_core::compute(&project, Some(&committish), &[], &ctx)?;
        let artifacts = &computation.artifacts;
        let commit = computation
            .commit
            .expect("an explicit committish always resolves to a commit");

        let tag_name = format!(
            "v{}{}",
            artifacts.simple_version, artifacts.prerelease_version
        );
        let existing = store.ref_target(&format!("refs/tags/{tag_name}"))?;
        match existing {
            Some(id) if store.peel_to_commit(&id)? == commit => {
                println!("tag {tag_name} already points at {commit}");
            }
            Some(_) => return Err(CliError::TagConflict(tag_name).into()),
            None => {
                store.write_tag_ref(&tag_name, &commit)?;
                println!("created tag {tag_name} at {commit}");
            }
        }
        Ok(())
    }
}
