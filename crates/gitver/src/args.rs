use anyhow::bail;
use clap::builder::{Styles, styling::AnsiColor};
use tracing::level_filters::LevelFilter;

use crate::commands::Command;

const MAIN_COLOR: AnsiColor = AnsiColor::Green;
const SECONDARY_COLOR: AnsiColor = AnsiColor::Cyan;
const HELP_STYLES: Styles = Styles::styled()
    .header(MAIN_COLOR.on_default().bold())
    .usage(MAIN_COLOR.on_default().bold())
    .placeholder(SECONDARY_COLOR.on_default())
    .literal(SECONDARY_COLOR.on_default());

/// Gitver stamps every commit of a git repository with a deterministic,
/// reproducible semver version computed from the commit graph and the
/// checked-in version.json. No tags, no counters, no clocks.
#[derive(clap::Parser, Debug)]
#[command(version, author, styles = HELP_STYLES)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,
    /// Print more of what the tool is doing.
    ///
    /// `-v` shows informational logs, `-vv` debug logs, `-vvv` trace logs.
    /// The `GITVER_LOG` environment variable overrides this flag.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl CliArgs {
    pub fn verbosity(&self) -> anyhow::Result<Option<LevelFilter>> {
        let level = match self.verbose {
            0 => None,
            1 => Some(LevelFilter::INFO),
            2 => Some(LevelFilter::DEBUG),
            3 => Some(LevelFilter::TRACE),
            _ => bail!("invalid verbosity level. Use -v, -vv, or -vvv."),
        };
        Ok(level)
    }
}
