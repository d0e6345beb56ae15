use std::io::{self, Read};
use std::process::{Command, ExitStatus, Stdio};
use std::thread::JoinHandle;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::DevicesConfig;
use crate::util::wait_timeout;

const SINKS_ARGS: &[&str] = &["list", "sinks", "short"];
const SOURCES_ARGS: &[&str] = &["list", "sources", "short"];
const LINKS_ARGS: &[&str] = &["-o"];

/// The three read-only listings the catalog needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceQuery {
    /// Playback endpoints (`id\tname\t...` lines)
    Sinks,
    /// Capture endpoints (`id\tname\t...` lines)
    Sources,
    /// Output ports of routing nodes (`node:port` lines)
    Links,
}

/// Errors from an external audio-control query
#[derive(Debug, Error)]
pub enum QueryError {
    /// Executable missing or not runnable
    #[error("failed to run {program}: {source}")]
    Spawn {
        /// Executable name
        program: String,
        /// Underlying error
        source: io::Error,
    },

    /// Query did not finish in time and was killed
    #[error("{program} timed out after {timeout:?}")]
    Timeout {
        /// Executable name
        program: String,
        /// Limit that elapsed
        timeout: Duration,
    },

    /// Query exited unsuccessfully
    #[error("{program} exited with {status}")]
    Status {
        /// Executable name
        program: String,
        /// Exit status
        status: ExitStatus,
    },

    /// Output could not be read
    #[error("failed to read output of {program}: {source}")]
    Io {
        /// Executable name
        program: String,
        /// Underlying error
        source: io::Error,
    },
}

/// Source of raw device listings (enables testing via mocking)
#[cfg_attr(test, mockall::automock)]
pub trait AudioQuery: Send + Sync {
    /// Runs one listing and returns its stdout
    ///
    /// # Errors
    /// Returns error on spawn failure, timeout, non-zero exit or unreadable output
    fn query(&self, query: DeviceQuery) -> Result<String, QueryError>;
}

/// `pactl` / `pw-link` backed queries
#[derive(Debug, Clone)]
pub struct CommandQuery {
    pactl: String,
    pw_link: String,
    timeout: Duration,
}

impl CommandQuery {
    /// Creates a query runner from config
    #[must_use]
    pub fn new(config: &DevicesConfig) -> Self {
        Self {
            pactl: config.pactl.clone(),
            pw_link: config.pw_link.clone(),
            timeout: Duration::from_secs(config.query_timeout_secs),
        }
    }

    fn command_for(&self, query: DeviceQuery) -> (&str, &'static [&'static str]) {
        match query {
            DeviceQuery::Sinks => (self.pactl.as_str(), SINKS_ARGS),
            DeviceQuery::Sources => (self.pactl.as_str(), SOURCES_ARGS),
            DeviceQuery::Links => (self.pw_link.as_str(), LINKS_ARGS),
        }
    }
}

impl AudioQuery for CommandQuery {
    fn query(&self, query: DeviceQuery) -> Result<String, QueryError> {
        let (program, args) = self.command_for(query);
        debug!(?query, program, "running device query");
        run_with_timeout(program, args, self.timeout)
    }
}

/// Runs `program`, returning stdout if it exits successfully within `timeout`
///
/// # Errors
/// Returns error on spawn failure, timeout, non-zero exit or unreadable output
pub fn run_with_timeout(
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<String, QueryError> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|source| QueryError::Spawn {
            program: program.to_owned(),
            source,
        })?;

    // Drain stdout concurrently so a chatty child cannot block on a full pipe
    let reader = child.stdout.take().map(|mut stdout| {
        std::thread::spawn(move || {
            let mut output = String::new();
            stdout.read_to_string(&mut output).map(|_| output)
        })
    });

    let status = match wait_timeout(&mut child, timeout) {
        Ok(Some(status)) => status,
        Ok(None) => {
            let _ = child.kill();
            let _ = child.wait();
            discard(reader);
            return Err(QueryError::Timeout {
                program: program.to_owned(),
                timeout,
            });
        }
        Err(source) => {
            let _ = child.kill();
            let _ = child.wait();
            discard(reader);
            return Err(QueryError::Io {
                program: program.to_owned(),
                source,
            });
        }
    };

    if !status.success() {
        return Err(QueryError::Status {
            program: program.to_owned(),
            status,
        });
    }

    let Some(reader) = reader else {
        return Ok(String::new());
    };
    reader
        .join()
        .map_err(|_| io::Error::other("output reader panicked"))
        .and_then(|result| result)
        .map_err(|source| QueryError::Io {
            program: program.to_owned(),
            source,
        })
}

// The child is dead, so its end of the pipe is closed and the join returns
fn discard(reader: Option<JoinHandle<io::Result<String>>>) {
    if let Some(reader) = reader {
        let _ = reader.join();
    }
}
