//! Linuxpad - hotkey soundboard for PipeWire
//!
//! Plays short clips into a virtual microphone (and optionally the local
//! output) from global hotkeys. This library exports the core modules for
//! the `linuxpad` binary and for testing.

/// Host capability probe
pub mod capabilities;
/// Configuration management
pub mod config;
/// Audio device enumeration and labels
pub mod devices;
/// Control context tying listener and playback together
pub mod engine;
/// Input handling (key normalization, bindings, global listener)
pub mod input;
/// Sound-list editing
pub mod library;
/// External player processes and the playback session
pub mod playback;
/// Telemetry and logging
pub mod telemetry;
/// Process and text helpers
pub mod util;
/// Config hot reload
pub mod watch;
