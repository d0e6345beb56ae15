//! Display labels for raw device names
//!
//! An ordered, pure pipeline: strip one known prefix, replace separators,
//! drop noise tokens, title-case, truncate. The tables below are the only
//! knobs.

use crate::util::truncate_with_ellipsis;

/// Driver prefixes; only the first match is stripped
pub const KNOWN_PREFIXES: &[&str] = &["alsa_output.", "alsa_input.", "bluez_sink.", "bluez_source."];

/// Characters treated as word separators
pub const SEPARATORS: &[char] = &['_', '.', '-'];

/// Word sequences removed wherever they appear (case-insensitive)
pub const NOISE_TOKENS: &[&[&str]] = &[&["monitor"], &["analog", "stereo"], &["pro", "audio"]];

/// Longest label in characters, including the ellipsis
pub const MAX_LABEL_LEN: usize = 50;

/// Label used when nothing survives the pipeline
pub const UNKNOWN_DEVICE: &str = "Unknown Device";

/// Human-readable label for a raw device name
#[must_use]
pub fn format_label(raw: &str) -> String {
    let stripped = strip_prefix(raw);
    let spaced = stripped.replace(SEPARATORS, " ");
    let words = remove_noise(spaced.split_whitespace().collect());
    let titled = words
        .iter()
        .map(|w| capitalize(w))
        .collect::<Vec<_>>()
        .join(" ");

    if titled.is_empty() {
        UNKNOWN_DEVICE.to_owned()
    } else {
        truncate_with_ellipsis(&titled, MAX_LABEL_LEN)
    }
}

/// Shortened label for compact status displays
#[must_use]
pub fn short_label(raw: &str, max: usize) -> String {
    truncate_with_ellipsis(&format_label(raw), max)
}

fn strip_prefix(raw: &str) -> &str {
    KNOWN_PREFIXES
        .iter()
        .find_map(|prefix| raw.strip_prefix(prefix))
        .unwrap_or(raw)
}

fn remove_noise(words: Vec<&str>) -> Vec<&str> {
    let mut kept = Vec::with_capacity(words.len());
    let mut i = 0;
    while i < words.len() {
        let matched = NOISE_TOKENS.iter().find(|token| {
            words.len() - i >= token.len()
                && token
                    .iter()
                    .zip(&words[i..])
                    .all(|(t, w)| w.eq_ignore_ascii_case(t))
        });
        match matched {
            Some(token) => i += token.len(),
            None => {
                kept.push(words[i]);
                i += 1;
            }
        }
    }
    kept
}

// First character upper, rest lower
fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| {
        first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect()
    })
}
