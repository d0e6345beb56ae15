use std::path::PathBuf;
use tracing::{info, warn};

use crate::config::Config;

/// What the host can do, probed once at startup
///
/// Nothing here is fatal: a missing tool only disables the feature that
/// needs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    /// Resolved player executable
    pub player: Option<PathBuf>,
    /// Resolved `pactl`
    pub pactl: Option<PathBuf>,
    /// Resolved `pw-link`
    pub pw_link: Option<PathBuf>,
    /// An X11 or Wayland session is present
    pub display: bool,
}

impl Capabilities {
    /// Probes tools named in `config` and the session environment
    #[must_use]
    pub fn probe(config: &Config) -> Self {
        Self {
            player: locate(&config.playback.player),
            pactl: locate(&config.devices.pactl),
            pw_link: locate(&config.devices.pw_link),
            display: has_display(|name| std::env::var_os(name)),
        }
    }

    /// Whether sounds can be played at all
    #[must_use]
    pub const fn can_play(&self) -> bool {
        self.player.is_some()
    }

    /// Whether any device query can succeed
    #[must_use]
    pub const fn can_enumerate(&self) -> bool {
        self.pactl.is_some() || self.pw_link.is_some()
    }

    /// Logs the probe results, warning for each missing piece
    pub fn report(&self, config: &Config) {
        for (name, found) in [
            (config.playback.player.as_str(), &self.player),
            (config.devices.pactl.as_str(), &self.pactl),
            (config.devices.pw_link.as_str(), &self.pw_link),
        ] {
            match found {
                Some(path) => info!(tool = name, path = %path.display(), "tool found"),
                None => warn!(tool = name, "tool not found on PATH"),
            }
        }
        if !self.can_play() {
            warn!("playback unavailable, install pipewire");
        }
        if !self.can_enumerate() {
            warn!("device listing unavailable, set the target manually");
        }
        if self.display {
            info!("display server detected");
        } else {
            warn!("no display server detected, global hotkeys may be unavailable");
        }
    }
}

fn locate(program: &str) -> Option<PathBuf> {
    which::which(program).ok()
}

fn has_display<F>(var: F) -> bool
where
    F: Fn(&str) -> Option<std::ffi::OsString>,
{
    ["DISPLAY", "WAYLAND_DISPLAY"]
        .iter()
        .any(|name| var(name).is_some_and(|v| !v.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;

    #[test]
    fn test_missing_tools_degrade() {
        let mut config = Config::default();
        config.playback.player = "linuxpad-no-such-player".to_owned();
        config.devices.pactl = "linuxpad-no-such-pactl".to_owned();
        config.devices.pw_link = "linuxpad-no-such-pw-link".to_owned();

        let caps = Capabilities::probe(&config);

        assert!(!caps.can_play());
        assert!(!caps.can_enumerate());
        caps.report(&config);
    }

    #[cfg(unix)]
    #[test]
    fn test_locates_tool_on_path() {
        assert!(locate("sh").is_some());
    }

    #[test]
    fn test_display_detection() {
        assert!(has_display(|name| (name == "WAYLAND_DISPLAY").then(|| OsString::from("wayland-0"))));
        assert!(has_display(|name| (name == "DISPLAY").then(|| OsString::from(":0"))));
        assert!(!has_display(|_| Some(OsString::new())));
        assert!(!has_display(|_| None));
    }

    #[test]
    #[ignore = "requires PipeWire tools installed"]
    fn test_pipewire_tools_present() {
        let caps = Capabilities::probe(&Config::default());
        assert!(caps.can_play());
        assert!(caps.can_enumerate());
    }
}
