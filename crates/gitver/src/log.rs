use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

/// Initialize logging to stderr via the tracing crate.
///
/// Uses the `WARN` level by default so version output stays clean for shell
/// substitution. Verbosity flags raise it; the `GITVER_LOG` environment
/// variable overrides everything, falling back to `RUST_LOG`.
pub fn init(verbosity: Option<LevelFilter>) {
    let default = verbosity.unwrap_or(LevelFilter::WARN);
    let env_filter = EnvFilter::try_from_env("GITVER_LOG").unwrap_or_else(|_| {
        EnvFilter::builder()
            .with_default_directive(default.into())
            .from_env_lossy()
    });

    let verbose = verbosity.is_some_and(|level| level > LevelFilter::INFO);

    fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .with_file(verbose)
        .with_line_number(verbose)
        .init();
}
