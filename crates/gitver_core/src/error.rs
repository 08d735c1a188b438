use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Stable error taxonomy for the versioning core.
///
/// Recoverable situations (no repository, no configuration anywhere) are not
/// errors; the oracle produces degenerate values for those instead.
#[derive(Error, Debug)]
pub enum Error {
    /// No `version.json` or `version.txt` at or above the requested location,
    /// on a path that requires one.
    #[error("no version configuration found at or above {0}")]
    ConfigMissing(String),

    /// The configuration exists but cannot be parsed or violates the schema.
    #[error("invalid version configuration in {path}{}: {message}", commit_suffix(.commit_id))]
    ConfigFormat {
        path: String,
        /// Set when the document was read out of a commit's tree.
        commit_id: Option<String>,
        message: String,
    },

    #[error("release branch '{0}' already exists")]
    ReleaseBranchExists(String),

    #[error("HEAD is detached; check out a branch before preparing a release")]
    ReleaseDetachedHead,

    #[error("uncommitted changes to {0} would be lost by preparing a release")]
    ReleaseUncommittedChanges(String),

    #[error("release branch name template '{0}' is invalid: {1}")]
    ReleaseInvalidBranchName(String, String),

    #[error("cannot increment the {0} field of version {1}")]
    ReleaseInvalidVersionIncrement(String, String),

    #[error("next version {next} would not be newer than {current}")]
    ReleaseVersionDecrement { current: String, next: String },

    #[error("git user identity is not configured; set user.name and user.email")]
    ReleaseUserNotConfigured,

    #[error(transparent)]
    Git(#[from] git_store::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn commit_suffix(commit_id: &Option<String>) -> String {
    match commit_id {
        Some(id) => format!(" (commit {id})"),
        None => String::new(),
    }
}
