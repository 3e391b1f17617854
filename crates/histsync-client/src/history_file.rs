//! Reading and writing the zsh extended history format.
//!
//! Each entry is a single line of the form `: <epoch>:<elapsed>;<command>`.
//! Lines written by older shells (or with extended history disabled) carry no
//! prefix and are taken verbatim.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use fs_err::tokio as fs;
use regex::Regex;
use tokio::io::AsyncWriteExt;

use crate::{Error, Result};

static EXTENDED_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^: \d+(?::\d+)?;").expect("history prefix regex is valid"));

/// Strip the extended history prefix from a line. Returns `None` for lines
/// that hold no command.
pub fn parse_line(line: &str) -> Option<String> {
    let command = EXTENDED_PREFIX.replace(line, "");
    let command = command.trim();

    (!command.is_empty()).then(|| command.to_string())
}

pub fn format_line(command: &str, timestamp: i64) -> String {
    format!(": {timestamp}:0;{command}\n")
}

/// The shell history file we synchronize with.
#[derive(Debug, Clone)]
pub struct HistoryFile {
    path: PathBuf,
}

impl HistoryFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every command in the file, in file order. A missing file reads as
    /// empty.
    pub async fn read_all(&self) -> Result<Vec<String>> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!(path = ?self.path, "history file not found, nothing to read");
                return Ok(Vec::new());
            }
            Err(e) => {
                tracing::error!(path = ?self.path, "failed to read history file: {e}");
                return Err(Error::file_io(&self.path, e));
            }
        };

        let contents = String::from_utf8_lossy(&bytes);
        let commands: Vec<String> = contents.split('\n').filter_map(parse_line).collect();

        tracing::debug!(path = ?self.path, count = commands.len(), "read history file");

        Ok(commands)
    }

    pub async fn delete_file(&self) -> Result<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => {
                tracing::info!(path = ?self.path, "history file deleted");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!(path = ?self.path, "no history file to delete");
                Ok(())
            }
            Err(e) => {
                tracing::error!(path = ?self.path, "failed to delete history file: {e}");
                Err(Error::file_io(&self.path, e))
            }
        }
    }

    /// Append one line per command, in order, creating the file if needed.
    ///
    /// A failed append does not stop the remaining ones; the first failure is
    /// returned once every command has been attempted.
    pub async fn append_commands<S: AsRef<str>>(
        &self,
        commands: &[S],
        timestamp: i64,
    ) -> Result<()> {
        let mut first_error = None;

        for command in commands {
            let command = command.as_ref();

            if let Err(e) = self.append_line(&format_line(command, timestamp)).await {
                tracing::error!(command, "failed to append to history file: {e}");
                first_error.get_or_insert(Error::file_io(&self.path, e));
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn append_line(&self, line: &str) -> std::io::Result<()> {
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }

    /// Replace the whole file with the given commands.
    ///
    /// The new contents are written to a temporary file beside the target and
    /// renamed over it, so readers see either the old file or the new one.
    pub async fn write_all<S: AsRef<str>>(&self, commands: &[S], timestamp: i64) -> Result<()> {
        let buffer: String = commands
            .iter()
            .map(|command| format_line(command.as_ref(), timestamp))
            .collect();

        let path = self.path.clone();
        let written = tokio::task::spawn_blocking(move || replace_file(&path, buffer.as_bytes()))
            .await
            .map_err(|e| Error::file_io(&self.path, std::io::Error::other(e)))?;

        match written {
            Ok(()) => {
                tracing::info!(path = ?self.path, count = commands.len(), "history file written");
                Ok(())
            }
            Err(e) => {
                tracing::error!(path = ?self.path, "failed to write history file: {e}");
                Err(Error::file_io(&self.path, e))
            }
        }
    }
}

fn replace_file(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    // Rename onto the link's target, not the link. Dotfile managers commonly
    // symlink the history file.
    let path = match fs_err::canonicalize(path) {
        Ok(target) => target,
        Err(e) if e.kind() == ErrorKind::NotFound => path.to_path_buf(),
        Err(e) => return Err(e),
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(&path).map_err(|e| e.error)?;

    Ok(())
}
