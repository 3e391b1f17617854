#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::use_self, clippy::missing_const_for_fn)] // not 100% reliable

use clap::Parser;
use eyre::Result;

use command::HistsyncCmd;

mod command;

const VERSION: &str = env!("CARGO_PKG_VERSION");

static HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}";

/// Keep a shell history file and a database in step
#[derive(Parser)]
#[command(
    author = "histsync contributors",
    version = VERSION,
    help_template(HELP_TEMPLATE),
)]
struct Histsync {
    #[command(subcommand)]
    histsync: HistsyncCmd,
}

impl Histsync {
    fn run(self) -> Result<()> {
        self.histsync.run()
    }
}

fn main() -> Result<()> {
    Histsync::parse().run()
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn verify_cli() {
        Histsync::command().debug_assert();
    }

    #[test]
    fn parses_search_prefix() {
        let cli = Histsync::try_parse_from(["histsync", "search", "git", "--json"]);
        assert!(cli.is_ok());

        let cli = Histsync::try_parse_from(["histsync", "search"]);
        assert!(cli.is_err());
    }
}
