use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Watches the config file and signals the control context on changes
///
/// The parent directory is watched so editors that save by renaming over
/// the file are still noticed. Signals coalesce: a burst of writes leaves
/// at most one pending reload.
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
    path: PathBuf,
}

impl ConfigWatcher {
    /// Starts watching `path`; returns the watcher and the reload signal
    ///
    /// # Errors
    /// Returns error if the platform watcher cannot be created or the
    /// directory cannot be watched
    pub fn new(path: &Path) -> Result<(Self, mpsc::Receiver<()>)> {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();
        let file_name = path
            .file_name()
            .context("config path has no file name")?
            .to_os_string();

        let (tx, rx) = mpsc::channel(1);
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) if is_config_change(&event, &file_name) => {
                debug!(kind = ?event.kind, "config file changed");
                // Full means a reload is already pending
                let _ = tx.try_send(());
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "config watcher error"),
        })
        .context("failed to create config watcher")?;

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("failed to watch {}", dir.display()))?;

        info!(path = %path.display(), "watching config for changes");
        Ok((
            Self {
                _watcher: watcher,
                path: path.to_path_buf(),
            },
            rx,
        ))
    }

    /// Watched config file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn is_config_change(event: &Event, file_name: &OsString) -> bool {
    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
        && event
            .paths
            .iter()
            .any(|p| p.file_name() == Some(file_name.as_os_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind, RemoveKind};
    use std::time::Duration;
    use tempfile::TempDir;

    fn event(kind: EventKind, path: &str) -> Event {
        Event::new(kind).add_path(PathBuf::from(path))
    }

    #[test]
    fn test_only_config_file_changes_count() {
        let name = OsString::from("linuxpad.toml");

        assert!(is_config_change(
            &event(EventKind::Modify(ModifyKind::Any), "/home/u/linuxpad.toml"),
            &name
        ));
        assert!(is_config_change(
            &event(EventKind::Create(CreateKind::File), "/home/u/linuxpad.toml"),
            &name
        ));
        assert!(!is_config_change(
            &event(EventKind::Modify(ModifyKind::Any), "/home/u/other.toml"),
            &name
        ));
        assert!(!is_config_change(
            &event(EventKind::Remove(RemoveKind::File), "/home/u/linuxpad.toml"),
            &name
        ));
    }

    #[tokio::test]
    async fn test_write_signals_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("linuxpad.toml");
        std::fs::write(&path, "").unwrap();

        let (watcher, mut rx) = ConfigWatcher::new(&path).unwrap();
        assert_eq!(watcher.path(), path);

        std::fs::write(&path, "[playback]\ntarget = \"x\"\n").unwrap();

        let signal = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
        assert_eq!(signal.unwrap(), Some(()));
    }
}
