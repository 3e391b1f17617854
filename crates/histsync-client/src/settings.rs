use std::path::{Path, PathBuf};

use config::{
    Config, ConfigBuilder, Environment, File as ConfigFile, FileFormat, builder::DefaultState,
};
use eyre::{Context, Result, eyre};
use fs_err::{File, create_dir_all};
use serde::Deserialize;
use std::io::Write;

pub const HISTORY_FILE_NAME: &str = ".zsh_history";
pub const DB_FILE_NAME: &str = "history.db";

static EXAMPLE_CONFIG: &str = include_str!("../config.toml");

#[derive(Clone, Debug, Deserialize)]
pub struct Server {
    /// Address the HTTP API binds to.
    pub host: String,
    pub port: u16,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Daemon {
    /// Run the periodic import at all.
    pub sync_enabled: bool,

    /// Seconds between two scheduled imports.
    pub sync_frequency: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Settings {
    pub db_path: String,
    pub history_path: String,

    /// Seconds to wait on a locked database before giving up.
    pub db_timeout: f64,

    pub server: Server,
    pub daemon: Daemon,
}

impl Settings {
    /// Default sources only. Callers layer files, environment or overrides
    /// on top before building.
    pub fn builder() -> Result<ConfigBuilder<DefaultState>> {
        let db_path = data_dir().join(DB_FILE_NAME);
        let history_path = home_dir().join(HISTORY_FILE_NAME);

        Ok(Config::builder()
            .set_default("db_path", db_path.to_str())?
            .set_default("history_path", history_path.to_str())?
            .set_default("db_timeout", 5.0)?
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("daemon.sync_enabled", true)?
            .set_default("daemon.sync_frequency", 60)?)
    }

    pub fn new() -> Result<Self> {
        let config_dir = config_dir();
        create_dir_all(&config_dir)
            .wrap_err_with(|| format!("could not create dir {config_dir:?}"))?;

        let config_file = config_dir.join("config.toml");

        let mut config_builder = Self::builder()?;

        config_builder = if config_file.exists() {
            let path = config_file
                .to_str()
                .ok_or_else(|| eyre!("config path {config_file:?} is not valid utf-8"))?;
            config_builder.add_source(ConfigFile::new(path, FileFormat::Toml))
        } else {
            let mut file = File::create(&config_file).wrap_err("could not create config file")?;
            file.write_all(EXAMPLE_CONFIG.as_bytes())
                .wrap_err("could not write default config file")?;

            config_builder
        };

        config_builder = config_builder.add_source(
            Environment::with_prefix("histsync")
                .prefix_separator("_")
                .separator("__"),
        );

        let config = config_builder.build()?;
        let settings: Settings = config
            .try_deserialize()
            .map_err(|e| eyre!("failed to deserialize: {}", e))?;

        settings.expanded()
    }

    /// Expand `~` and environment variables in every path setting, and
    /// reject values the rest of the crate cannot use.
    pub fn expanded(mut self) -> Result<Self> {
        self.db_path = shellexpand::full(&self.db_path)?.to_string();
        self.history_path = shellexpand::full(&self.history_path)?.to_string();

        if !self.db_timeout.is_finite() || self.db_timeout < 0.0 {
            return Err(eyre!(
                "db_timeout must be a non-negative number of seconds, got {}",
                self.db_timeout
            ));
        }

        Ok(self)
    }

    pub fn db_path(&self) -> &Path {
        Path::new(&self.db_path)
    }

    pub fn history_path(&self) -> &Path {
        Path::new(&self.history_path)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn example_config() -> &'static str {
        EXAMPLE_CONFIG
    }
}

fn base_dirs() -> Option<directories::BaseDirs> {
    directories::BaseDirs::new()
}

pub fn home_dir() -> PathBuf {
    base_dirs()
        .map(|dirs| dirs.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("HISTSYNC_CONFIG_DIR") {
        return PathBuf::from(dir);
    }

    let config_dir = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"));

    config_dir.join("histsync")
}

pub fn data_dir() -> PathBuf {
    let data_dir = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local").join("share"));

    data_dir.join("histsync")
}
