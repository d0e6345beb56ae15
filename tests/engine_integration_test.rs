//! Integration tests for the hotkey → control context → playback path
//!
//! Key events are injected through a channel-fed input backend and players
//! are fakes that record what they were asked to do, so no display server
//! or PipeWire is needed. The test that drives the real player is ignored.
//!
//! Run the ignored one with: cargo test --test engine_integration_test -- --ignored

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{mpsc as std_mpsc, Arc, Mutex};
use std::time::Duration;

use linuxpad::config::{Config, Sound};
use linuxpad::engine::{Engine, EngineEvent};
use linuxpad::input::{normalize, InputBackend, KeyInput, ListenerCore, PhysicalKey};
use linuxpad::playback::{
    PlaybackBackend, PlaybackError, PlaybackManager, PlaybackProcess, PlaybackRequest,
    PlaybackSettings, PlaybackStatus, PwPlay, Volume,
};
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Spawn { id: u32, file: PathBuf, target: Option<String> },
    Interrupt(u32),
}

#[derive(Clone, Default)]
struct FakePlayer {
    calls: Arc<Mutex<Vec<Call>>>,
    next_id: Arc<AtomicU32>,
}

impl FakePlayer {
    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn spawns(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Spawn { .. }))
            .count()
    }
}

struct FakeStream {
    id: u32,
    calls: Arc<Mutex<Vec<Call>>>,
    exited: AtomicBool,
}

impl PlaybackProcess for FakeStream {
    fn id(&self) -> u32 {
        self.id
    }

    fn interrupt(&mut self) -> Result<(), PlaybackError> {
        self.calls.lock().unwrap().push(Call::Interrupt(self.id));
        self.exited.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn wait_timeout(&mut self, _timeout: Duration) -> Result<bool, PlaybackError> {
        Ok(self.exited.load(Ordering::SeqCst))
    }

    fn kill(&mut self) -> Result<(), PlaybackError> {
        self.exited.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn has_exited(&mut self) -> bool {
        self.exited.load(Ordering::SeqCst)
    }
}

impl PlaybackBackend for FakePlayer {
    type Process = FakeStream;

    fn spawn(&self, request: &PlaybackRequest<'_>) -> Result<FakeStream, PlaybackError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.calls.lock().unwrap().push(Call::Spawn {
            id,
            file: request.file.to_path_buf(),
            target: request.target.map(str::to_owned),
        });
        Ok(FakeStream {
            id,
            calls: Arc::clone(&self.calls),
            exited: AtomicBool::new(false),
        })
    }
}

/// Feeds events sent on a std channel into the listener until it closes
struct ChannelInput(std_mpsc::Receiver<KeyInput<PhysicalKey>>);

impl InputBackend for ChannelInput {
    fn run(self, mut core: ListenerCore<PhysicalKey>) -> Result<(), String> {
        for input in self.0 {
            core.handle(input);
        }
        Ok(())
    }
}

fn settings(target: Option<&str>, local: u8) -> PlaybackSettings {
    PlaybackSettings {
        target: target.map(str::to_owned),
        mic_volume: Volume::new(100),
        local_volume: Volume::new(local),
        stop_timeout: Duration::from_millis(100),
    }
}

fn engine_with(
    player: &FakePlayer,
    settings: PlaybackSettings,
    existing: &[&str],
) -> Engine<FakePlayer> {
    let existing: Vec<PathBuf> = existing.iter().map(PathBuf::from).collect();
    let playback = PlaybackManager::new(
        player.clone(),
        settings,
        Box::new(move |path: &Path| existing.iter().any(|e| e == path)),
    );
    Engine::new(playback, 8)
}

fn sound(file: &str, hotkey: &str) -> Sound {
    Sound {
        file: PathBuf::from(file),
        name: String::new(),
        hotkey: Some(hotkey.to_owned()),
    }
}

fn down(physical: &str, c: char) -> KeyInput<PhysicalKey> {
    KeyInput::Down {
        physical: physical.to_owned(),
        key: normalize(&c.to_string()),
    }
}

fn up(physical: &str) -> KeyInput<PhysicalKey> {
    KeyInput::Up {
        physical: physical.to_owned(),
        key: None,
    }
}

#[test]
fn test_toggle_law_same_file() {
    let player = FakePlayer::default();
    let mut engine = engine_with(&player, settings(Some("virtual_mic"), 50), &["/a.wav"]);
    engine.update_sounds(&[sound("/a.wav", "a")]);

    let file = engine.registry().lookup(normalize("a").unwrap()).unwrap();
    let trigger = linuxpad::input::HotkeyTrigger {
        key: normalize("a").unwrap(),
        file,
    };

    assert!(matches!(
        engine.handle_trigger(&trigger),
        PlaybackStatus::Playing { .. }
    ));
    assert_eq!(engine.handle_trigger(&trigger), PlaybackStatus::Stopped);

    assert!(!engine.is_playing());
    assert_eq!(player.spawns(), 2);
}

#[test]
fn test_switching_files_interrupts_previous_player() {
    let player = FakePlayer::default();
    let mut engine = engine_with(&player, settings(Some("virtual_mic"), 0), &["/a.wav", "/b.wav"]);

    for file in ["/a.wav", "/b.wav"] {
        engine.handle_trigger(&linuxpad::input::HotkeyTrigger {
            key: normalize("x").unwrap(),
            file: PathBuf::from(file),
        });
    }

    assert_eq!(engine.current_file(), Some(Path::new("/b.wav")));
    assert_eq!(
        player.calls(),
        vec![
            Call::Spawn {
                id: 1,
                file: PathBuf::from("/a.wav"),
                target: Some("virtual_mic".to_owned()),
            },
            Call::Interrupt(1),
            Call::Spawn {
                id: 2,
                file: PathBuf::from("/b.wav"),
                target: Some("virtual_mic".to_owned()),
            },
        ]
    );
}

#[test]
fn test_stop_is_idempotent() {
    let player = FakePlayer::default();
    let mut engine = engine_with(&player, settings(Some("t"), 50), &[]);

    assert_eq!(engine.stop(), PlaybackStatus::Stopped);
    assert_eq!(engine.stop(), PlaybackStatus::Stopped);
    assert!(player.calls().is_empty());
}

#[test]
fn test_configuration_errors_spawn_nothing() {
    let player = FakePlayer::default();
    let mut engine = engine_with(&player, settings(Some("t"), 50), &[]);
    assert_eq!(
        engine.play(Path::new("/missing.wav")),
        PlaybackStatus::FileNotFound {
            file: PathBuf::from("/missing.wav")
        }
    );

    let mut engine = engine_with(&player, settings(None, 50), &["/a.wav"]);
    assert_eq!(engine.play(Path::new("/a.wav")), PlaybackStatus::NoTarget);

    assert_eq!(player.spawns(), 0);
}

#[test]
fn test_local_monitor_only_when_volume_above_zero() {
    let player = FakePlayer::default();
    let mut engine = engine_with(&player, settings(Some("t"), 0), &["/a.wav"]);
    engine.play(Path::new("/a.wav"));
    assert_eq!(player.spawns(), 1);

    let player = FakePlayer::default();
    let mut engine = engine_with(&player, settings(Some("t"), 30), &["/a.wav"]);
    engine.play(Path::new("/a.wav"));
    let targets: Vec<_> = player
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            Call::Spawn { target, .. } => Some(target),
            Call::Interrupt(_) => None,
        })
        .collect();
    assert_eq!(targets, vec![Some("t".to_owned()), None]);
}

#[tokio::test]
async fn test_held_key_plays_once_through_listener() {
    let player = FakePlayer::default();
    let mut engine = engine_with(&player, settings(Some("t"), 0), &["/a.wav"]);
    engine.update_sounds(&[sound("/a.wav", "A")]);
    let mut events = engine.subscribe();

    let (keys, rx) = std_mpsc::channel();
    engine.start_listener_with(ChannelInput(rx));

    // Auto-repeat while held, then release
    for _ in 0..3 {
        keys.send(down("KeyA", 'a')).unwrap();
    }
    keys.send(up("KeyA")).unwrap();

    let trigger = tokio::time::timeout(Duration::from_secs(5), engine.next_trigger())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(trigger.file, PathBuf::from("/a.wav"));
    engine.handle_trigger(&trigger);

    // Give the listener thread time to process anything else it might emit
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(engine.drain_triggers(), 0);

    assert_eq!(
        events.try_recv().unwrap(),
        EngineEvent::Triggered(PathBuf::from("/a.wav"))
    );
    assert!(matches!(
        events.try_recv().unwrap(),
        EngineEvent::Status(PlaybackStatus::Playing { .. })
    ));
    assert_eq!(player.spawns(), 1);
}

#[tokio::test]
async fn test_stopped_listener_drops_presses() {
    let player = FakePlayer::default();
    let mut engine = engine_with(&player, settings(Some("t"), 0), &["/a.wav"]);
    engine.update_sounds(&[sound("/a.wav", "a")]);

    let (keys, rx) = std_mpsc::channel();
    engine.start_listener_with(ChannelInput(rx));
    engine.stop_listener();

    keys.send(down("KeyA", 'a')).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(engine.drain_triggers(), 0);
    assert!(!engine.listener().is_active());
}

#[test]
fn test_reload_from_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("linuxpad.toml");
    std::fs::write(
        &path,
        r#"[playback]
target = "virtual_mic"
local_volume = 0

[[sounds]]
file = "/a.wav"
name = "a"
hotkey = "F1"

[[sounds]]
file = "/b.wav"
name = "b"
hotkey = "f1"
"#,
    )
    .unwrap();

    let config = Config::load_from(&path).unwrap();
    let player = FakePlayer::default();
    let mut engine = engine_with(&player, settings(None, 50), &[]);
    engine.apply_config(&config);

    // Last binding for the same key wins
    assert_eq!(
        engine.registry().lookup(normalize("F1").unwrap()),
        Some(PathBuf::from("/b.wav"))
    );
    assert_eq!(engine.settings().target.as_deref(), Some("virtual_mic"));
    assert_eq!(engine.settings().local_volume.percent(), 0);
}

#[test]
fn test_reload_skips_missing_or_blank_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("linuxpad.toml");
    let player = FakePlayer::default();
    let mut engine = engine_with(&player, settings(Some("virtual_mic"), 40), &[]);
    engine.update_sounds(&[sound("/a.wav", "a")]);

    // Editors may delete or truncate the file before writing it back
    assert!(!engine.reload_from(&path).unwrap());
    assert!(!path.exists());

    std::fs::write(&path, "").unwrap();
    assert!(!engine.reload_from(&path).unwrap());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "");

    assert_eq!(engine.settings().target.as_deref(), Some("virtual_mic"));
    assert_eq!(engine.settings().local_volume.percent(), 40);
    assert_eq!(engine.registry().len(), 1);
}

#[test]
fn test_reload_applies_written_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("linuxpad.toml");
    std::fs::write(&path, "[playback]\ntarget = \"headset\"\nlocal_volume = 300\n").unwrap();
    let player = FakePlayer::default();
    let mut engine = engine_with(&player, settings(Some("virtual_mic"), 40), &[]);
    engine.update_sounds(&[sound("/a.wav", "a")]);

    assert!(engine.reload_from(&path).unwrap());

    assert_eq!(engine.settings().target.as_deref(), Some("headset"));
    assert_eq!(engine.settings().local_volume.percent(), 100);
    assert!(engine.registry().is_empty());
}

#[test]
fn test_reload_keeps_settings_on_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("linuxpad.toml");
    std::fs::write(&path, "[playback\n").unwrap();
    let player = FakePlayer::default();
    let mut engine = engine_with(&player, settings(Some("virtual_mic"), 40), &[]);

    assert!(engine.reload_from(&path).is_err());
    assert_eq!(engine.settings().target.as_deref(), Some("virtual_mic"));
}

#[test]
#[ignore = "requires PipeWire (pw-play) and a configured target"]
fn test_real_player_starts_and_stops() {
    let config = Config::load().unwrap();
    let Some(sound) = config.sounds.first() else {
        eprintln!("Skipping: no sounds configured");
        return;
    };
    let mut engine = Engine::<PwPlay>::from_config(&config);

    let status = engine.play(&sound.file);
    assert!(matches!(status, PlaybackStatus::Playing { .. }), "{status}");

    std::thread::sleep(Duration::from_millis(300));
    assert_eq!(engine.stop(), PlaybackStatus::Stopped);
    assert!(!engine.is_playing());
}
