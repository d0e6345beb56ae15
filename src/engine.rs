use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info};

use crate::config::{Config, Sound};
use crate::input::{HotkeyRegistry, HotkeyTrigger, InputBackend, KeyListener};
use crate::playback::{PlaybackBackend, PlaybackManager, PlaybackSettings, PlaybackStatus, PwPlay};

/// Capacity of the presentation event channel
const EVENT_CAPACITY: usize = 64;

/// Notification for presentation subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A hotkey fired for this file
    Triggered(PathBuf),
    /// Playback state changed
    Status(PlaybackStatus),
}

/// Control context
///
/// Owns the registry, playback session and settings. The key listener only
/// reads the registry and hands triggers over through a bounded channel; all
/// mutation and process spawning happens here.
pub struct Engine<B: PlaybackBackend> {
    registry: Arc<HotkeyRegistry>,
    listener: KeyListener,
    triggers: mpsc::Receiver<HotkeyTrigger>,
    playback: PlaybackManager<B>,
    events: broadcast::Sender<EngineEvent>,
}

impl Engine<PwPlay> {
    /// Engine playing through the configured external player
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let playback = PlaybackManager::with_filesystem(
            PwPlay::new(config.playback.player.clone()),
            PlaybackSettings::from(&config.playback),
        );
        let mut engine = Self::new(playback, config.hotkeys.channel_capacity);
        engine.update_sounds(&config.sounds);
        engine
    }
}

impl<B: PlaybackBackend> Engine<B> {
    /// Creates an engine with an empty registry and a stopped listener
    pub fn new(playback: PlaybackManager<B>, channel_capacity: usize) -> Self {
        let registry = Arc::new(HotkeyRegistry::new());
        let (tx, rx) = mpsc::channel(channel_capacity.max(1));
        let listener = KeyListener::new(Arc::clone(&registry), tx);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            registry,
            listener,
            triggers: rx,
            playback,
            events,
        }
    }

    /// Registers a presentation subscriber
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Shared hotkey table
    pub const fn registry(&self) -> &Arc<HotkeyRegistry> {
        &self.registry
    }

    /// Key listener handle
    pub const fn listener(&self) -> &KeyListener {
        &self.listener
    }

    /// Starts global key capture on the OS keyboard
    pub fn start_listener(&mut self) {
        self.listener.start();
    }

    /// Starts global key capture from an explicit backend
    pub fn start_listener_with<I: InputBackend>(&mut self, backend: I) {
        self.listener.start_with(backend);
    }

    /// Stops global key capture
    pub fn stop_listener(&mut self) {
        self.listener.stop();
    }

    /// Rebuilds hotkey bindings from the sound list
    pub fn update_sounds(&mut self, sounds: &[Sound]) {
        self.registry.rebuild(sounds);
    }

    /// Applies an edited configuration: bindings and playback settings
    ///
    /// The active session keeps playing with the routing it started with.
    pub fn apply_config(&mut self, config: &Config) {
        self.update_sounds(&config.sounds);
        self.playback
            .update_settings(PlaybackSettings::from(&config.playback));
        info!(bindings = self.registry.len(), "configuration applied");
    }

    /// Re-reads the config file and applies it
    ///
    /// A missing or blank file (mid-save) leaves everything as it was and
    /// returns `Ok(false)`. The file is never written.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn reload_from(&mut self, path: &Path) -> Result<bool> {
        let Some(config) = Config::read_from(path)? else {
            debug!(path = %path.display(), "config missing or empty, reload skipped");
            return Ok(false);
        };
        self.apply_config(&config);
        Ok(true)
    }

    /// Current playback settings
    pub const fn settings(&self) -> &PlaybackSettings {
        self.playback.settings()
    }

    /// File of the active session
    pub fn current_file(&self) -> Option<&Path> {
        self.playback.current_file()
    }

    /// Whether a session is active
    pub const fn is_playing(&self) -> bool {
        self.playback.is_playing()
    }

    /// Waits for the next hotkey hand-off; `None` once the listener is gone
    pub async fn next_trigger(&mut self) -> Option<HotkeyTrigger> {
        self.triggers.recv().await
    }

    /// Handles every queued trigger without waiting; returns how many ran
    pub fn drain_triggers(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(trigger) = self.triggers.try_recv() {
            self.handle_trigger(&trigger);
            handled += 1;
        }
        handled
    }

    /// Toggle-or-start for a hotkey press
    pub fn handle_trigger(&mut self, trigger: &HotkeyTrigger) -> PlaybackStatus {
        debug!(key = %trigger.key, file = %trigger.file.display(), "handling trigger");
        self.publish(EngineEvent::Triggered(trigger.file.clone()));
        let status = self.playback.trigger(&trigger.file);
        self.publish_status(status)
    }

    /// Manual playback; restarts the file even if it is already playing
    pub fn play(&mut self, file: &Path) -> PlaybackStatus {
        let status = self.playback.play(file);
        self.publish_status(status)
    }

    /// Stops the active session, if any
    pub fn stop(&mut self) -> PlaybackStatus {
        let status = self.playback.stop();
        self.publish_status(status)
    }

    /// Reaps a session whose players all finished on their own
    pub fn poll(&mut self) -> Option<PlaybackStatus> {
        self.playback.poll().map(|status| self.publish_status(status))
    }

    /// Stops capture and playback
    pub fn shutdown(&mut self) {
        self.listener.stop();
        self.stop();
        info!("engine shut down");
    }

    fn publish_status(&self, status: PlaybackStatus) -> PlaybackStatus {
        info!(status = %status, "playback status");
        self.publish(EngineEvent::Status(status.clone()));
        status
    }

    fn publish(&self, event: EngineEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::CanonicalKey;
    use crate::playback::{PlaybackError, PlaybackProcess, PlaybackRequest, Volume};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct RecordingBackend {
        spawned: Arc<Mutex<Vec<(PathBuf, Option<String>)>>>,
    }

    struct Idle(Arc<AtomicBool>);

    impl PlaybackProcess for Idle {
        fn id(&self) -> u32 {
            1
        }

        fn interrupt(&mut self) -> Result<(), PlaybackError> {
            self.0.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn wait_timeout(&mut self, _timeout: Duration) -> Result<bool, PlaybackError> {
            Ok(self.0.load(Ordering::SeqCst))
        }

        fn kill(&mut self) -> Result<(), PlaybackError> {
            self.0.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn has_exited(&mut self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    impl PlaybackBackend for RecordingBackend {
        type Process = Idle;

        fn spawn(&self, request: &PlaybackRequest<'_>) -> Result<Idle, PlaybackError> {
            self.spawned.lock().unwrap().push((
                request.file.to_path_buf(),
                request.target.map(str::to_owned),
            ));
            Ok(Idle(Arc::new(AtomicBool::new(false))))
        }
    }

    fn engine(target: Option<&str>) -> (Engine<RecordingBackend>, RecordingBackend) {
        let backend = RecordingBackend::default();
        let settings = PlaybackSettings {
            target: target.map(str::to_owned),
            mic_volume: Volume::new(100),
            local_volume: Volume::new(0),
            stop_timeout: Duration::from_millis(10),
        };
        let playback = PlaybackManager::new(backend.clone(), settings, Box::new(|_: &Path| true));
        (Engine::new(playback, 4), backend)
    }

    fn trigger(file: &str) -> HotkeyTrigger {
        HotkeyTrigger {
            key: CanonicalKey::Char('a'),
            file: PathBuf::from(file),
        }
    }

    #[test]
    fn test_trigger_publishes_trigger_then_status() {
        let (mut engine, _backend) = engine(Some("virtual_mic"));
        let mut events = engine.subscribe();

        engine.handle_trigger(&trigger("/a.wav"));

        assert_eq!(
            events.try_recv().unwrap(),
            EngineEvent::Triggered(PathBuf::from("/a.wav"))
        );
        assert!(matches!(
            events.try_recv().unwrap(),
            EngineEvent::Status(PlaybackStatus::Playing { .. })
        ));
    }

    #[test]
    fn test_events_without_subscribers() {
        let (mut engine, _backend) = engine(Some("virtual_mic"));
        assert_eq!(engine.stop(), PlaybackStatus::Stopped);
    }

    #[test]
    fn test_no_target_reported_as_status() {
        let (mut engine, backend) = engine(None);
        let mut events = engine.subscribe();

        let status = engine.handle_trigger(&trigger("/a.wav"));

        assert_eq!(status, PlaybackStatus::NoTarget);
        assert!(backend.spawned.lock().unwrap().is_empty());
        events.try_recv().unwrap();
        assert_eq!(
            events.try_recv().unwrap(),
            EngineEvent::Status(PlaybackStatus::NoTarget)
        );
    }

    #[test]
    fn test_apply_config_rebinds_and_retargets() {
        let (mut engine, backend) = engine(Some("old"));
        let mut config = Config::default();
        config.playback.target = "new".to_owned();
        config.playback.local_volume = 0;
        config.sounds = vec![Sound {
            file: PathBuf::from("/b.wav"),
            name: "b".to_owned(),
            hotkey: Some("F2".to_owned()),
        }];

        engine.apply_config(&config);
        let file = engine.registry().lookup(CanonicalKey::Function(2)).unwrap();
        engine.handle_trigger(&HotkeyTrigger {
            key: CanonicalKey::Function(2),
            file,
        });

        assert_eq!(
            backend.spawned.lock().unwrap().as_slice(),
            [(PathBuf::from("/b.wav"), Some("new".to_owned()))]
        );
    }

    #[test]
    fn test_poll_without_finished_session() {
        let (mut engine, _backend) = engine(Some("t"));
        engine.play(Path::new("/a.wav"));
        assert_eq!(engine.poll(), None);

        engine.stop();
        assert_eq!(engine.poll(), None);
        assert!(!engine.is_playing());
    }

    #[test]
    fn test_shutdown_stops_everything() {
        let (mut engine, _backend) = engine(Some("t"));
        engine.play(Path::new("/a.wav"));

        engine.shutdown();

        assert!(!engine.is_playing());
        assert!(!engine.listener().is_active());
    }
}
