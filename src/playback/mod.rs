/// External player processes
pub mod process;
/// Single-session playback with toggle semantics
pub mod session;

pub use process::{ChildProcess, PlaybackBackend, PlaybackError, PlaybackProcess, PlaybackRequest, PwPlay};
pub use session::{FileCheck, PlaybackManager, PlaybackSettings, PlaybackStatus, Volume};
