//! Sound-list editing
//!
//! Indices are 1-based, matching what `list` prints. Callers persist the
//! config afterwards; nothing here touches the filesystem except to resolve
//! relative paths.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::Sound;

/// Audio extensions accepted by `add` (compared case-insensitively)
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg", "flac", "m4a", "opus", "aac"];

/// Result of adding files
#[derive(Debug, Default, PartialEq, Eq)]
pub struct AddReport {
    /// Files appended to the list
    pub added: Vec<PathBuf>,
    /// Files skipped for an unsupported extension
    pub skipped: Vec<PathBuf>,
}

/// Whether `path` has a supported audio extension
#[must_use]
pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| AUDIO_EXTENSIONS.iter().any(|a| a.eq_ignore_ascii_case(ext)))
}

/// Appends unbound sounds for every supported file, named after the file stem
///
/// # Errors
/// Returns error if a relative path cannot be resolved against the working
/// directory
pub fn add(sounds: &mut Vec<Sound>, files: &[PathBuf]) -> Result<AddReport> {
    let mut report = AddReport::default();
    for file in files {
        if !is_audio_file(file) {
            debug!(file = %file.display(), "unsupported extension, skipping");
            report.skipped.push(file.clone());
            continue;
        }
        let file = absolute(file)?;
        sounds.push(Sound::from_file(file.clone()));
        report.added.push(file);
    }
    info!(added = report.added.len(), skipped = report.skipped.len(), "sounds added");
    Ok(report)
}

/// Removes the sound at `index`, returning it
///
/// # Errors
/// Returns error if `index` is out of range
pub fn remove(sounds: &mut Vec<Sound>, index: usize) -> Result<Sound> {
    let i = position(sounds, index)?;
    let sound = sounds.remove(i);
    info!(name = %sound.name, "sound removed");
    Ok(sound)
}

/// Renames the sound at `index`
///
/// # Errors
/// Returns error if `index` is out of range or `name` is blank
pub fn rename(sounds: &mut [Sound], index: usize, name: &str) -> Result<()> {
    let i = position(sounds, index)?;
    let name = name.trim();
    if name.is_empty() {
        bail!("name must not be empty");
    }
    sounds[i].name = name.to_owned();
    Ok(())
}

/// Sets the hotkey of the sound at `index`, stored upper-cased; blank clears it
///
/// The string is stored even if it can never be bound; the registry skips it.
///
/// # Errors
/// Returns error if `index` is out of range
pub fn bind(sounds: &mut [Sound], index: usize, hotkey: &str) -> Result<()> {
    let i = position(sounds, index)?;
    let hotkey = hotkey.trim();
    sounds[i].hotkey = (!hotkey.is_empty()).then(|| hotkey.to_uppercase());
    if let Some(hotkey) = &sounds[i].hotkey {
        if crate::input::normalize(hotkey).is_none() {
            tracing::warn!(hotkey = %hotkey, "hotkey cannot be bound globally, it will be ignored");
        }
    }
    Ok(())
}

/// Resolves a `play` argument: a 1-based index into the list, else a path
///
/// # Errors
/// Returns error if a numeric argument is out of range
pub fn resolve(sounds: &[Sound], arg: &str) -> Result<PathBuf> {
    match arg.parse::<usize>() {
        Ok(index) => Ok(sounds[position(sounds, index)?].file.clone()),
        Err(_) => absolute(Path::new(arg)),
    }
}

/// Listing rows: index, hotkey, name, path
#[must_use]
pub fn rows(sounds: &[Sound]) -> Vec<String> {
    sounds
        .iter()
        .enumerate()
        .map(|(i, s)| {
            format!(
                "{:>3}  {:<6} {}  ({})",
                i + 1,
                s.hotkey().unwrap_or("-"),
                s.name,
                s.file.display()
            )
        })
        .collect()
}

fn position(sounds: &[Sound], index: usize) -> Result<usize> {
    if index == 0 || index > sounds.len() {
        bail!("no sound #{index} (have {})", sounds.len());
    }
    Ok(index - 1)
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("failed to read working directory")?;
    Ok(cwd.join(path))
}
