use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::process::{PlaybackBackend, PlaybackError, PlaybackProcess, PlaybackRequest};
use crate::config::PlaybackConfig;

/// Volume percentage, 0–100
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Volume(u8);

impl Volume {
    /// Creates a volume, clamping to 100
    #[must_use]
    pub fn new(percent: u8) -> Self {
        Self(percent.min(100))
    }

    /// Percentage value
    #[must_use]
    pub const fn percent(self) -> u8 {
        self.0
    }

    /// Fraction 0.0–1.0 as passed to the player
    #[must_use]
    pub fn fraction(self) -> f64 {
        f64::from(self.0) / 100.0
    }
}

/// Routing and volume settings consumed by the manager
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSettings {
    /// Target device raw name
    pub target: Option<String>,
    /// Target stream volume
    pub mic_volume: Volume,
    /// Local monitor volume; zero disables the monitor stream
    pub local_volume: Volume,
    /// Grace period between interrupt and kill
    pub stop_timeout: Duration,
}

impl From<&PlaybackConfig> for PlaybackSettings {
    fn from(config: &PlaybackConfig) -> Self {
        Self {
            target: config.target().map(str::to_owned),
            mic_volume: Volume::new(config.mic_volume),
            local_volume: Volume::new(config.local_volume),
            stop_timeout: config.stop_timeout(),
        }
    }
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self::from(&PlaybackConfig::default())
    }
}

/// Human-facing playback state change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackStatus {
    /// At least one stream started
    Playing {
        /// File being played
        file: PathBuf,
        /// Problem with the other stream, if any
        warning: Option<String>,
    },
    /// Session stopped on request (or there was nothing to stop)
    Stopped,
    /// Every player in the session exited on its own
    Finished,
    /// File does not exist; nothing spawned
    FileNotFound {
        /// Requested file
        file: PathBuf,
    },
    /// No target device configured; nothing spawned
    NoTarget,
    /// Player executable missing; nothing spawned
    PlayerMissing {
        /// Executable name
        program: String,
    },
    /// Player failed to start; nothing spawned
    Failed {
        /// Error text
        reason: String,
    },
}

impl PlaybackStatus {
    /// Whether this status reports a problem
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(
            self,
            Self::FileNotFound { .. } | Self::NoTarget | Self::PlayerMissing { .. } | Self::Failed { .. }
        )
    }
}

impl fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Playing { file, warning } => {
                let name = file
                    .file_name()
                    .map_or_else(|| file.display().to_string(), |n| n.to_string_lossy().into_owned());
                write!(f, "Playing: {name}")?;
                if let Some(warning) = warning {
                    write!(f, " ({warning})")?;
                }
                Ok(())
            }
            Self::Stopped => f.write_str("Stopped"),
            Self::Finished => f.write_str("Finished"),
            Self::FileNotFound { file } => write!(f, "File not found: {}", file.display()),
            Self::NoTarget => f.write_str("No target device selected!"),
            Self::PlayerMissing { program } if program == crate::config::DEFAULT_PLAYER => {
                write!(f, "Error: {program} not found. Install pipewire.")
            }
            Self::PlayerMissing { program } => write!(f, "Error: {program} not found."),
            Self::Failed { reason } => write!(f, "Error: {reason}"),
        }
    }
}

impl From<PlaybackError> for PlaybackStatus {
    fn from(e: PlaybackError) -> Self {
        match e {
            PlaybackError::PlayerMissing { program } => Self::PlayerMissing { program },
            other => Self::Failed {
                reason: other.to_string(),
            },
        }
    }
}

/// Existence check for files about to be played
pub type FileCheck = Box<dyn Fn(&Path) -> bool + Send + Sync>;

/// The single live dual-stream playback
struct PlaybackSession<P> {
    target: Option<P>,
    local: Option<P>,
    file: PathBuf,
}

impl<P: PlaybackProcess> PlaybackSession<P> {
    fn processes_mut(&mut self) -> impl Iterator<Item = &mut P> {
        self.target.iter_mut().chain(self.local.iter_mut())
    }

    fn all_exited(&mut self) -> bool {
        self.processes_mut().all(|p| p.has_exited())
    }
}

/// Owns at most one active session and enforces toggle semantics
///
/// Lives on the control context; nothing here is shared with the listener.
pub struct PlaybackManager<B: PlaybackBackend> {
    backend: B,
    file_exists: FileCheck,
    settings: PlaybackSettings,
    session: Option<PlaybackSession<B::Process>>,
}

impl<B: PlaybackBackend> PlaybackManager<B> {
    /// Creates a manager with an explicit file-existence check
    pub fn new(backend: B, settings: PlaybackSettings, file_exists: FileCheck) -> Self {
        Self {
            backend,
            file_exists,
            settings,
            session: None,
        }
    }

    /// Creates a manager that checks the real filesystem
    pub fn with_filesystem(backend: B, settings: PlaybackSettings) -> Self {
        Self::new(backend, settings, Box::new(|path: &Path| path.exists()))
    }

    /// Current settings
    pub const fn settings(&self) -> &PlaybackSettings {
        &self.settings
    }

    /// Replaces settings; the active session keeps the routing it started with
    pub fn update_settings(&mut self, settings: PlaybackSettings) {
        debug!(?settings, "playback settings updated");
        self.settings = settings;
    }

    /// File of the active session
    pub fn current_file(&self) -> Option<&Path> {
        self.session.as_ref().map(|s| s.file.as_path())
    }

    /// Whether a session is active
    pub const fn is_playing(&self) -> bool {
        self.session.is_some()
    }

    /// Hotkey entry point: stops if `file` is already playing, else replaces
    /// any session with a new one for `file`
    pub fn trigger(&mut self, file: &Path) -> PlaybackStatus {
        self.reap_finished();

        if self.current_file() == Some(file) {
            info!(file = %file.display(), "same sound re-triggered, stopping");
            return self.stop();
        }

        self.stop();
        self.start(file)
    }

    /// Manual play: always (re)starts `file`
    pub fn play(&mut self, file: &Path) -> PlaybackStatus {
        self.stop();
        self.start(file)
    }

    /// Starts target and optional monitor streams for `file`
    ///
    /// Fails fast, spawning nothing, if the file is missing or no target is
    /// configured. The two spawns are independent; one failing does not undo
    /// the other.
    pub fn start(&mut self, file: &Path) -> PlaybackStatus {
        if !(self.file_exists)(file) {
            warn!(file = %file.display(), "file not found");
            return PlaybackStatus::FileNotFound {
                file: file.to_path_buf(),
            };
        }
        let Some(target) = self.settings.target.clone() else {
            warn!("no target device configured");
            return PlaybackStatus::NoTarget;
        };

        if self.session.is_some() {
            self.stop();
        }

        let target_result = self.backend.spawn(&PlaybackRequest {
            file,
            target: Some(target.as_str()),
            volume: self.settings.mic_volume.fraction(),
        });

        let local_result = (self.settings.local_volume.percent() > 0).then(|| {
            self.backend.spawn(&PlaybackRequest {
                file,
                target: None,
                volume: self.settings.local_volume.fraction(),
            })
        });

        let (target_process, target_error) = split(target_result);
        let (local_process, local_error) = match local_result {
            Some(result) => split(result),
            None => (None, None),
        };

        if target_process.is_none() && local_process.is_none() {
            let error = target_error
                .or(local_error)
                .map_or(PlaybackStatus::Failed { reason: "no stream started".to_owned() }, PlaybackStatus::from);
            warn!(file = %file.display(), status = %error, "playback failed");
            return error;
        }

        let warning = match (&target_error, &local_error) {
            (Some(e), _) => {
                warn!(error = %e, "target stream failed, monitor only");
                Some(format!("target stream failed: {e}"))
            }
            (None, Some(e)) => {
                warn!(error = %e, "monitor stream failed, target only");
                Some(format!("local monitor failed: {e}"))
            }
            (None, None) => None,
        };

        info!(
            file = %file.display(),
            target = %target,
            mic_volume = self.settings.mic_volume.percent(),
            local_volume = self.settings.local_volume.percent(),
            "playback started"
        );

        self.session = Some(PlaybackSession {
            target: target_process,
            local: local_process,
            file: file.to_path_buf(),
        });

        PlaybackStatus::Playing {
            file: file.to_path_buf(),
            warning,
        }
    }

    /// Terminates every player in the session and clears it
    ///
    /// Best effort and idempotent: never fails, fine with no session.
    pub fn stop(&mut self) -> PlaybackStatus {
        if let Some(mut session) = self.session.take() {
            let timeout = self.settings.stop_timeout;
            for process in session.processes_mut() {
                terminate(process, timeout);
            }
            info!(file = %session.file.display(), "playback stopped");
        }
        PlaybackStatus::Stopped
    }

    /// Clears the session if every player finished on its own
    pub fn poll(&mut self) -> Option<PlaybackStatus> {
        self.reap_finished().then_some(PlaybackStatus::Finished)
    }

    fn reap_finished(&mut self) -> bool {
        let finished = self.session.as_mut().is_some_and(PlaybackSession::all_exited);
        if finished {
            if let Some(session) = self.session.take() {
                info!(file = %session.file.display(), "playback finished");
            }
        }
        finished
    }
}

impl<B: PlaybackBackend> Drop for PlaybackManager<B> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn split<P>(result: Result<P, PlaybackError>) -> (Option<P>, Option<PlaybackError>) {
    match result {
        Ok(process) => (Some(process), None),
        Err(e) => (None, Some(e)),
    }
}

/// Interrupt, wait briefly, then kill; every failure is logged and dropped
fn terminate<P: PlaybackProcess>(process: &mut P, timeout: Duration) {
    let pid = process.id();
    if let Err(e) = process.interrupt() {
        debug!(pid, error = %e, "interrupt failed");
    }
    match process.wait_timeout(timeout) {
        Ok(true) => {
            debug!(pid, "player exited after interrupt");
            return;
        }
        Ok(false) => debug!(pid, "player still running, killing"),
        Err(e) => debug!(pid, error = %e, "wait failed, killing"),
    }
    if let Err(e) = process.kill() {
        debug!(pid, error = %e, "kill failed, player likely already gone");
    }
}
