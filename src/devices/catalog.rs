use std::collections::HashSet;
use std::fmt;
use tracing::{debug, info, warn};

use super::label::format_label;
use super::query::{AudioQuery, DeviceQuery};

/// Substrings (lowercase) that mark a capture endpoint as a sink monitor
const MONITOR_MARKER: &str = ".monitor";

/// Substrings (lowercase) that suggest a virtual/routing device
const VIRTUAL_HINTS: &[&str] = &["virtual", "null", "mic", "soundboard", "easyeffects"];

/// How a device was discovered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    /// Playback endpoint
    Sink,
    /// Capture endpoint
    Source,
    /// Generic routing node
    Node,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sink => "Sink",
            Self::Source => "Source",
            Self::Node => "Node",
        })
    }
}

/// One routable audio target
///
/// `name` is the identity used for routing; `label` is display-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioDevice {
    /// Raw name, passed to the player as the target
    pub name: String,
    /// Numeric id from the listing, when one was reported
    pub node_id: Option<String>,
    /// Human-readable label
    pub label: String,
    /// Discovery kind
    pub kind: DeviceKind,
}

impl AudioDevice {
    fn new(name: &str, node_id: Option<&str>, kind: DeviceKind) -> Self {
        Self {
            name: name.to_owned(),
            node_id: node_id.map(str::to_owned),
            label: format_label(name),
            kind,
        }
    }

    /// Whether the raw name looks like a virtual microphone or routing sink
    #[must_use]
    pub fn is_likely_virtual(&self) -> bool {
        let name = self.name.to_lowercase();
        VIRTUAL_HINTS.iter().any(|hint| name.contains(hint))
    }
}

impl fmt::Display for AudioDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.label)
    }
}

/// Enumerates routable devices from an external query backend
pub struct DeviceCatalog<Q> {
    query: Q,
}

impl<Q: AudioQuery> DeviceCatalog<Q> {
    /// Creates a catalog over `query`
    pub const fn new(query: Q) -> Self {
        Self { query }
    }

    /// Lists sinks, then non-monitor sources, then unseen routing nodes
    ///
    /// A failing query contributes nothing; the rest are still returned.
    pub fn list_targets(&self) -> Vec<AudioDevice> {
        let mut devices = Vec::new();
        let mut seen = HashSet::new();

        let mut push = |device: AudioDevice, devices: &mut Vec<AudioDevice>| {
            if seen.insert(device.name.clone()) {
                devices.push(device);
            } else {
                debug!(name = %device.name, "duplicate device skipped");
            }
        };

        for (id, name) in self.run(DeviceQuery::Sinks).iter().filter_map(|l| parse_short_line(l)) {
            push(AudioDevice::new(name, Some(id), DeviceKind::Sink), &mut devices);
        }

        for (id, name) in self.run(DeviceQuery::Sources).iter().filter_map(|l| parse_short_line(l)) {
            if is_monitor_source(name) {
                debug!(name, "monitor source excluded");
                continue;
            }
            push(AudioDevice::new(name, Some(id), DeviceKind::Source), &mut devices);
        }

        for name in self.run(DeviceQuery::Links).iter().filter_map(|l| parse_link_line(l)) {
            push(AudioDevice::new(name, None, DeviceKind::Node), &mut devices);
        }

        info!(count = devices.len(), "audio devices enumerated");
        devices
    }

    /// Looks up a device by raw name
    pub fn find(&self, name: &str) -> Option<AudioDevice> {
        self.list_targets().into_iter().find(|d| d.name == name)
    }

    fn run(&self, query: DeviceQuery) -> Vec<String> {
        match self.query.query(query) {
            Ok(output) => output.lines().map(str::to_owned).collect(),
            Err(e) => {
                warn!(?query, error = %e, "device query failed, skipping");
                Vec::new()
            }
        }
    }
}

/// Parses an `id\tname[\t...]` line
fn parse_short_line(line: &str) -> Option<(&str, &str)> {
    if line.trim().is_empty() {
        return None;
    }
    let mut parts = line.split('\t');
    let id = parts.next()?;
    let name = parts.next()?;
    Some((id, name))
}

/// Parses a `node:port` line into the node name
fn parse_link_line(line: &str) -> Option<&str> {
    let (node, _port) = line.split_once(':')?;
    let node = node.trim();
    (!node.is_empty()).then_some(node)
}

fn is_monitor_source(name: &str) -> bool {
    name.to_lowercase().contains(MONITOR_MARKER)
}
