use std::io;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::util::wait_timeout;

/// Parameters for one playback stream
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackRequest<'a> {
    /// Audio file to play
    pub file: &'a Path,
    /// Target device raw name; `None` plays to the default output
    pub target: Option<&'a str>,
    /// Stream volume, 0.0–1.0
    pub volume: f64,
}

/// Errors from starting or controlling a player process
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// Player executable is not installed
    #[error("{program} not found")]
    PlayerMissing {
        /// Executable name
        program: String,
    },

    /// Player could not be started
    #[error("failed to start {program}: {source}")]
    Spawn {
        /// Executable name
        program: String,
        /// Underlying error
        source: io::Error,
    },

    /// Interrupt or kill could not be delivered
    #[error("failed to signal player (pid {pid}): {source}")]
    Signal {
        /// Process id
        pid: u32,
        /// Underlying error
        source: io::Error,
    },

    /// Exit status could not be queried
    #[error("failed to wait for player (pid {pid}): {source}")]
    Wait {
        /// Process id
        pid: u32,
        /// Underlying error
        source: io::Error,
    },
}

/// A running player
pub trait PlaybackProcess: Send {
    /// Process id, for logging
    fn id(&self) -> u32;

    /// Requests graceful termination (SIGINT)
    ///
    /// # Errors
    /// Returns error if the signal cannot be delivered
    fn interrupt(&mut self) -> Result<(), PlaybackError>;

    /// Waits up to `timeout`; returns true if the process has exited
    ///
    /// # Errors
    /// Returns error if the exit status cannot be queried
    fn wait_timeout(&mut self, timeout: Duration) -> Result<bool, PlaybackError>;

    /// Forcibly terminates the process and reaps it
    ///
    /// # Errors
    /// Returns error if the kill fails
    fn kill(&mut self) -> Result<(), PlaybackError>;

    /// Non-blocking check for a natural exit
    fn has_exited(&mut self) -> bool;
}

/// Something that can start players
pub trait PlaybackBackend {
    /// Handle type for started players
    type Process: PlaybackProcess;

    /// Starts one player; never waits for it to finish
    ///
    /// # Errors
    /// Returns error if the player cannot be started
    fn spawn(&self, request: &PlaybackRequest<'_>) -> Result<Self::Process, PlaybackError>;
}

/// PipeWire `pw-play` backend
#[derive(Debug, Clone)]
pub struct PwPlay {
    program: String,
}

impl PwPlay {
    /// Creates a backend running `program` (normally `pw-play`)
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Command-line arguments for `request`
    #[must_use]
    pub fn args(request: &PlaybackRequest<'_>) -> Vec<String> {
        let mut args = Vec::with_capacity(5);
        if let Some(target) = request.target {
            args.push("--target".to_owned());
            args.push(target.to_owned());
        }
        args.push("--volume".to_owned());
        args.push(request.volume.to_string());
        args.push(request.file.to_string_lossy().into_owned());
        args
    }
}

impl PlaybackBackend for PwPlay {
    type Process = ChildProcess;

    fn spawn(&self, request: &PlaybackRequest<'_>) -> Result<ChildProcess, PlaybackError> {
        let child = Command::new(&self.program)
            .args(Self::args(request))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| {
                if source.kind() == io::ErrorKind::NotFound {
                    PlaybackError::PlayerMissing {
                        program: self.program.clone(),
                    }
                } else {
                    PlaybackError::Spawn {
                        program: self.program.clone(),
                        source,
                    }
                }
            })?;

        debug!(
            pid = child.id(),
            target = request.target.unwrap_or("default"),
            volume = request.volume,
            "player spawned"
        );
        Ok(ChildProcess { child })
    }
}

/// OS child process running a player
#[derive(Debug)]
pub struct ChildProcess {
    child: Child,
}

impl ChildProcess {
    fn already_exited(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(Some(_)))
    }
}

impl PlaybackProcess for ChildProcess {
    fn id(&self) -> u32 {
        self.child.id()
    }

    fn interrupt(&mut self) -> Result<(), PlaybackError> {
        // A reaped pid may already belong to another process
        if self.already_exited() {
            return Ok(());
        }
        send_interrupt(&mut self.child)
    }

    fn wait_timeout(&mut self, timeout: Duration) -> Result<bool, PlaybackError> {
        wait_timeout(&mut self.child, timeout)
            .map(|status| status.is_some())
            .map_err(|source| PlaybackError::Wait {
                pid: self.child.id(),
                source,
            })
    }

    fn kill(&mut self) -> Result<(), PlaybackError> {
        let pid = self.child.id();
        self.child
            .kill()
            .map_err(|source| PlaybackError::Signal { pid, source })?;
        self.child
            .wait()
            .map(|_| ())
            .map_err(|source| PlaybackError::Wait { pid, source })
    }

    fn has_exited(&mut self) -> bool {
        // An unqueryable child cannot be tracked any further
        !matches!(self.child.try_wait(), Ok(None))
    }
}

#[cfg(unix)]
fn send_interrupt(child: &mut Child) -> Result<(), PlaybackError> {
    let pid = child.id();
    let raw_pid = libc::pid_t::try_from(pid).map_err(|_| PlaybackError::Signal {
        pid,
        source: io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"),
    })?;

    // SAFETY: kill(2) takes plain integers and has no memory-safety
    // preconditions. The child is still unreaped, so the pid is ours.
    #[allow(unsafe_code)]
    let rc = unsafe { libc::kill(raw_pid, libc::SIGINT) };
    if rc == 0 {
        Ok(())
    } else {
        Err(PlaybackError::Signal {
            pid,
            source: io::Error::last_os_error(),
        })
    }
}

#[cfg(not(unix))]
fn send_interrupt(child: &mut Child) -> Result<(), PlaybackError> {
    let pid = child.id();
    child
        .kill()
        .map_err(|source| PlaybackError::Signal { pid, source })
}
