/// Global key listener and press/repeat state machine
pub mod hotkey;
/// Hotkey string normalization
pub mod key;
/// Canonical key → file bindings
pub mod registry;

pub use hotkey::{HotkeyTrigger, InputBackend, KeyInput, KeyListener, ListenerCore, PhysicalKey, RdevBackend};
pub use key::{normalize, CanonicalKey};
pub use registry::HotkeyRegistry;
