use std::fmt;

/// Highest function key the global input backend can report (F1..=F12)
pub const MAX_FUNCTION_KEY: u8 = 12;

/// Normalized identifier for a hotkey binding
///
/// Either a single lowercase character or a named function key. Both the
/// registry (from user-supplied strings) and the listener (from raw key
/// events) produce this type, so lookups compare like with like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalKey {
    /// Printable character, already lowercased
    Char(char),
    /// Function key `F<n>`, `1..=MAX_FUNCTION_KEY`
    Function(u8),
}

impl CanonicalKey {
    /// Builds a function key, rejecting numbers outside the supported set
    #[must_use]
    pub const fn function(number: u8) -> Option<Self> {
        if number >= 1 && number <= MAX_FUNCTION_KEY {
            Some(Self::Function(number))
        } else {
            None
        }
    }

    /// Builds a character key from a typed character
    ///
    /// Returns `None` for control characters or characters whose lowercase
    /// form is not a single character.
    #[must_use]
    pub fn from_typed(c: char) -> Option<Self> {
        if c.is_control() {
            return None;
        }
        let mut lower = c.to_lowercase();
        match (lower.next(), lower.next()) {
            (Some(l), None) => Some(Self::Char(l)),
            _ => None,
        }
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Char(c) => write!(f, "{c}"),
            Self::Function(n) => write!(f, "f{n}"),
        }
    }
}

/// Parses a user-supplied hotkey string into a canonical key
///
/// Total: anything that is not a single character or a supported `F<n>`
/// yields `None` rather than an error.
#[must_use]
pub fn normalize(raw: &str) -> Option<CanonicalKey> {
    let lowered = raw.trim().to_lowercase();

    if let Some(digits) = lowered.strip_prefix('f') {
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            return parse_function_number(digits).and_then(CanonicalKey::function);
        }
    }

    let mut chars = lowered.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(CanonicalKey::Char(c)),
        _ => None,
    }
}

// "f01" is not a key name, only the canonical spelling is.
fn parse_function_number(digits: &str) -> Option<u8> {
    if digits.starts_with('0') {
        return None;
    }
    digits.parse().ok()
}
