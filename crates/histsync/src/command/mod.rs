use clap::Subcommand;
use eyre::{Result, WrapErr};
use histsync_client::settings::Settings;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

mod daemon;
mod history;

#[derive(Subcommand, Debug)]
#[command(infer_subcommands = true)]
pub enum HistsyncCmd {
    /// Run the scheduler and the HTTP API in the foreground
    Daemon,

    /// Replace the stored commands with the history file
    Import,

    /// Replace the history file with the stored commands
    Export,

    /// Print every stored command
    List(history::ListArgs),

    /// Print stored commands starting with a prefix
    Search(history::SearchArgs),

    /// Print the default histsync configuration (config.toml)
    #[command()]
    DefaultConfig,
}

impl HistsyncCmd {
    pub fn run(self) -> Result<()> {
        if let Self::DefaultConfig = self {
            print!("{}", Settings::example_config());
            return Ok(());
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .wrap_err("could not start the async runtime")?;

        let settings = Settings::new().wrap_err("could not load histsync settings")?;

        init_logging(matches!(self, Self::Daemon))?;

        let res = runtime.block_on(self.run_inner(settings));

        runtime.shutdown_timeout(std::time::Duration::from_millis(50));

        res
    }

    async fn run_inner(self, settings: Settings) -> Result<()> {
        match self {
            Self::Daemon => daemon::run(settings).await,
            Self::Import => history::import(&settings).await,
            Self::Export => history::export(&settings).await,
            Self::List(args) => history::list(&settings, &args).await,
            Self::Search(args) => history::search(&settings, &args).await,
            Self::DefaultConfig => Ok(()),
        }
    }
}

const DAEMON_LOG_DIRECTIVES: &str =
    "histsync=info,histsync_client=info,histsync_daemon=info,tower_http=info";

/// One-shot commands only report warnings so their output stays readable.
const COMMAND_LOG_DIRECTIVES: &str = "warn";

fn default_directives(is_daemon: bool) -> &'static str {
    if is_daemon {
        DAEMON_LOG_DIRECTIVES
    } else {
        COMMAND_LOG_DIRECTIVES
    }
}

/// HISTSYNC_LOG overrides the defaults.
fn init_logging(is_daemon: bool) -> Result<()> {
    let filter = match std::env::var("HISTSYNC_LOG") {
        Ok(directives) => EnvFilter::try_new(directives)?,
        Err(_) => EnvFilter::try_new(default_directives(is_daemon))?,
    }
    .add_directive("sqlx=warn".parse()?);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_log_directives_parse() {
        for is_daemon in [true, false] {
            assert!(EnvFilter::try_new(default_directives(is_daemon)).is_ok());
        }

        assert!(default_directives(true).contains("histsync_daemon=info"));
        assert_eq!(default_directives(false), "warn");
    }
}
