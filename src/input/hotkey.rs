use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, trace, warn};

use super::key::CanonicalKey;
use super::registry::HotkeyRegistry;

/// A bound key was pressed
///
/// Sent from the listener thread to the control context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HotkeyTrigger {
    /// Key that fired
    pub key: CanonicalKey,
    /// File bound to that key at the time of the press
    pub file: PathBuf,
}

/// Decoded raw key event
///
/// `physical` identifies the hardware key so that a release can be matched to
/// its press even when the release carries no typed character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyInput<P> {
    /// Key went down (initial press or OS auto-repeat)
    Down {
        /// Hardware key
        physical: P,
        /// Check-key, `None` if the key can never be bound
        key: Option<CanonicalKey>,
    },
    /// Key went up
    Up {
        /// Hardware key
        physical: P,
        /// Check-key, if the release could be decoded
        key: Option<CanonicalKey>,
    },
}

/// Per-key `Released → Pressed → Released` state
///
/// Only a key-down for a check-key that is not already pressed counts as a
/// new press; repeats while held are swallowed.
#[derive(Debug)]
pub struct PressTracker<P> {
    pressed: HashSet<CanonicalKey>,
    held: HashMap<P, CanonicalKey>,
}

impl<P> Default for PressTracker<P> {
    fn default() -> Self {
        Self {
            pressed: HashSet::new(),
            held: HashMap::new(),
        }
    }
}

impl<P: Eq + Hash> PressTracker<P> {
    /// Records a key-down; returns true only for a fresh press
    pub fn key_down(&mut self, physical: P, key: CanonicalKey) -> bool {
        if !self.pressed.insert(key) {
            return false;
        }
        self.held.insert(physical, key);
        true
    }

    /// Records a key-up, clearing the key resolved at press time
    pub fn key_up(&mut self, physical: &P, key: Option<CanonicalKey>) {
        if let Some(resolved) = self.held.remove(physical) {
            self.pressed.remove(&resolved);
        }
        if let Some(key) = key {
            self.pressed.remove(&key);
        }
    }

    /// Whether `key` is currently held
    #[must_use]
    pub fn is_pressed(&self, key: CanonicalKey) -> bool {
        self.pressed.contains(&key)
    }

    /// Forgets every held key
    pub fn clear(&mut self) {
        self.pressed.clear();
        self.held.clear();
    }
}

/// Flags shared between the listener handle and its thread
#[derive(Debug, Default)]
struct ListenerShared {
    /// Gates event processing independently of the backend's lifecycle
    active: AtomicBool,
    /// Bumped by `stop()`; the thread clears its pressed state when it changes
    generation: AtomicU64,
    /// Set once the backend reports it cannot listen
    unavailable: AtomicBool,
}

/// Listener-side state machine, independent of the input backend
///
/// Owned and mutated only by the listener thread.
pub struct ListenerCore<P> {
    tracker: PressTracker<P>,
    registry: Arc<HotkeyRegistry>,
    shared: Arc<ListenerShared>,
    seen_generation: u64,
    triggers: mpsc::Sender<HotkeyTrigger>,
}

impl<P: Eq + Hash> ListenerCore<P> {
    fn new(
        registry: Arc<HotkeyRegistry>,
        shared: Arc<ListenerShared>,
        triggers: mpsc::Sender<HotkeyTrigger>,
    ) -> Self {
        let seen_generation = shared.generation.load(Ordering::Acquire);
        Self {
            tracker: PressTracker::default(),
            registry,
            shared,
            seen_generation,
            triggers,
        }
    }

    /// Processes one decoded event, emitting at most one trigger
    pub fn handle(&mut self, input: KeyInput<P>) {
        let generation = self.shared.generation.load(Ordering::Acquire);
        if generation != self.seen_generation {
            self.tracker.clear();
            self.seen_generation = generation;
        }

        if !self.shared.active.load(Ordering::Acquire) {
            return;
        }

        match input {
            KeyInput::Down { physical, key } => {
                let Some(key) = key else {
                    return;
                };
                if !self.tracker.key_down(physical, key) {
                    trace!(key = %key, "key repeat ignored");
                    return;
                }
                if let Some(file) = self.registry.lookup(key) {
                    self.emit(HotkeyTrigger { key, file });
                }
            }
            KeyInput::Up { physical, key } => self.tracker.key_up(&physical, key),
        }
    }

    fn emit(&self, trigger: HotkeyTrigger) {
        debug!(key = %trigger.key, file = %trigger.file.display(), "hotkey triggered");
        match self.triggers.try_send(trigger) {
            Ok(()) => {}
            Err(TrySendError::Full(trigger)) => {
                warn!(key = %trigger.key, "trigger queue full, dropping hotkey press");
            }
            Err(TrySendError::Closed(_)) => {
                debug!("trigger receiver gone, dropping hotkey press");
            }
        }
    }
}

/// Hardware key identity as reported by the backend
pub type PhysicalKey = String;

/// Decodes a backend event into a `KeyInput`
///
/// Returns `None` for non-keyboard events. The check-key is the typed
/// character when it is printable, otherwise the symbolic key.
#[must_use]
pub fn decode(event: &rdev::Event) -> Option<KeyInput<PhysicalKey>> {
    match event.event_type {
        rdev::EventType::KeyPress(key) => Some(KeyInput::Down {
            physical: format!("{key:?}"),
            key: check_key(key, event.name.as_deref()),
        }),
        rdev::EventType::KeyRelease(key) => Some(KeyInput::Up {
            physical: format!("{key:?}"),
            key: check_key(key, event.name.as_deref()),
        }),
        _ => None,
    }
}

fn check_key(key: rdev::Key, typed: Option<&str>) -> Option<CanonicalKey> {
    let typed = typed.and_then(|name| {
        let mut chars = name.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => CanonicalKey::from_typed(c),
            _ => None,
        }
    });
    typed.or_else(|| symbolic_key(key))
}

fn symbolic_key(key: rdev::Key) -> Option<CanonicalKey> {
    use rdev::Key;

    let function = match key {
        Key::F1 => 1,
        Key::F2 => 2,
        Key::F3 => 3,
        Key::F4 => 4,
        Key::F5 => 5,
        Key::F6 => 6,
        Key::F7 => 7,
        Key::F8 => 8,
        Key::F9 => 9,
        Key::F10 => 10,
        Key::F11 => 11,
        Key::F12 => 12,
        other => return printable_fallback(other).map(CanonicalKey::Char),
    };
    CanonicalKey::function(function)
}

// Used when the backend reports no typed text (commonly on release).
const fn printable_fallback(key: rdev::Key) -> Option<char> {
    use rdev::Key;

    let c = match key {
        Key::KeyA => 'a',
        Key::KeyB => 'b',
        Key::KeyC => 'c',
        Key::KeyD => 'd',
        Key::KeyE => 'e',
        Key::KeyF => 'f',
        Key::KeyG => 'g',
        Key::KeyH => 'h',
        Key::KeyI => 'i',
        Key::KeyJ => 'j',
        Key::KeyK => 'k',
        Key::KeyL => 'l',
        Key::KeyM => 'm',
        Key::KeyN => 'n',
        Key::KeyO => 'o',
        Key::KeyP => 'p',
        Key::KeyQ => 'q',
        Key::KeyR => 'r',
        Key::KeyS => 's',
        Key::KeyT => 't',
        Key::KeyU => 'u',
        Key::KeyV => 'v',
        Key::KeyW => 'w',
        Key::KeyX => 'x',
        Key::KeyY => 'y',
        Key::KeyZ => 'z',
        Key::Num0 | Key::Kp0 => '0',
        Key::Num1 | Key::Kp1 => '1',
        Key::Num2 | Key::Kp2 => '2',
        Key::Num3 | Key::Kp3 => '3',
        Key::Num4 | Key::Kp4 => '4',
        Key::Num5 | Key::Kp5 => '5',
        Key::Num6 | Key::Kp6 => '6',
        Key::Num7 | Key::Kp7 => '7',
        Key::Num8 | Key::Kp8 => '8',
        Key::Num9 | Key::Kp9 => '9',
        _ => return None,
    };
    Some(c)
}

/// Blocking source of key events, run on the listener thread
pub trait InputBackend: Send + 'static {
    /// Feeds decoded events into `core` until the source ends
    ///
    /// # Errors
    /// Returns a description of why global capture is unavailable
    fn run(self, core: ListenerCore<PhysicalKey>) -> Result<(), String>;
}

/// Passive global capture through `rdev`; never suppresses events
#[derive(Debug, Clone, Copy, Default)]
pub struct RdevBackend;

impl InputBackend for RdevBackend {
    fn run(self, mut core: ListenerCore<PhysicalKey>) -> Result<(), String> {
        rdev::listen(move |event| {
            if let Some(input) = decode(&event) {
                core.handle(input);
            }
        })
        .map_err(|e| format!("{e:?}"))
    }
}

/// Global key listener
///
/// Runs an input backend (`rdev` by default) on a dedicated thread.
/// `rdev::listen` blocks for the life of the process and cannot be
/// cancelled, so `stop()` only clears the `active` flag; the thread keeps
/// receiving events and discards them.
pub struct KeyListener {
    registry: Arc<HotkeyRegistry>,
    triggers: mpsc::Sender<HotkeyTrigger>,
    shared: Arc<ListenerShared>,
    thread: Option<JoinHandle<()>>,
}

impl KeyListener {
    /// Creates a stopped listener that reports presses on `triggers`
    #[must_use]
    pub fn new(registry: Arc<HotkeyRegistry>, triggers: mpsc::Sender<HotkeyTrigger>) -> Self {
        Self {
            registry,
            triggers,
            shared: Arc::new(ListenerShared::default()),
            thread: None,
        }
    }

    /// Begins listening on the OS keyboard; a no-op while already listening
    ///
    /// Never fails: if the host offers no global input capture, hotkeys are
    /// logged as unavailable and the rest of the app keeps working.
    pub fn start(&mut self) {
        self.start_with(RdevBackend);
    }

    /// Begins listening with an explicit backend
    ///
    /// The backend only runs on the first start; later calls resume the
    /// existing thread.
    pub fn start_with<B: InputBackend>(&mut self, backend: B) {
        if self.shared.active.swap(true, Ordering::AcqRel) {
            debug!("key listener already active");
            return;
        }

        if self.thread.is_some() {
            info!("key listener resumed");
            return;
        }

        let core: ListenerCore<PhysicalKey> = self.core();
        let shared = Arc::clone(&self.shared);

        let spawned = std::thread::Builder::new()
            .name("hotkey-listener".to_owned())
            .spawn(move || {
                if let Err(e) = backend.run(core) {
                    shared.unavailable.store(true, Ordering::Release);
                    warn!(error = %e, "global key capture unavailable, hotkeys disabled");
                }
            });

        match spawned {
            Ok(handle) => {
                info!("key listener started");
                self.thread = Some(handle);
            }
            Err(e) => {
                self.shared.active.store(false, Ordering::Release);
                self.shared.unavailable.store(true, Ordering::Release);
                warn!(error = %e, "failed to spawn key listener thread, hotkeys disabled");
            }
        }
    }

    /// Stops processing events and forgets held keys; safe when never started
    pub fn stop(&mut self) {
        let was_active = self.shared.active.swap(false, Ordering::AcqRel);
        self.shared.generation.fetch_add(1, Ordering::AcqRel);
        if was_active {
            info!("key listener stopped");
        }
    }

    /// Whether events are currently being processed
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::Acquire)
    }

    /// Whether the backend reported that it cannot capture global input
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        self.shared.unavailable.load(Ordering::Acquire)
    }

    /// State machine bound to this listener's flags, for driving it without
    /// the OS backend
    #[must_use]
    pub fn core<P: Eq + Hash>(&self) -> ListenerCore<P> {
        ListenerCore::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.shared),
            self.triggers.clone(),
        )
    }
}

impl Drop for KeyListener {
    fn drop(&mut self) {
        self.stop();
    }
}
