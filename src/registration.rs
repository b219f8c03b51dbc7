//! Hierarchical registration matching.
//!
//! Registrations are slash separated levels (`org/imaging/icc.lcms`), each
//! level a dot separated list of keys. Patterns use the same shape. A pattern
//! key may carry a modifier:
//!
//! - `+key` (or plain `key`): must be present in the level
//! - `-key`: must be absent, its presence rejects the match
//! - `_key`: optional, raises the rank when present
//!
//! A pattern without any `/` is compared against the last level only, so
//! `"lcms"` selects `org/imaging/icc.lcms`.

/// Level delimiter.
pub const LEVEL_SEPARATOR: char = '/';
/// Key delimiter inside a level.
pub const KEY_SEPARATOR: char = '.';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyModifier {
    Require,
    Exclude,
    Prefer,
}

fn split_modifier(key: &str) -> (KeyModifier, &str) {
    match key.as_bytes().first() {
        Some(b'+') => (KeyModifier::Require, &key[1..]),
        Some(b'-') => (KeyModifier::Exclude, &key[1..]),
        Some(b'_') => (KeyModifier::Prefer, &key[1..]),
        _ => (KeyModifier::Require, key),
    }
}

fn keys(level: &str) -> impl Iterator<Item = &str> {
    level.split(KEY_SEPARATOR).filter(|k| !k.is_empty())
}

/// Compare one registration level against one pattern level.
///
/// Returns `None` when the level rejects the match, otherwise the number of
/// matched required and preferred keys.
fn match_level(reg_level: &str, pattern_level: &str) -> Option<u32> {
    let mut rank = 0;
    for raw in keys(pattern_level) {
        let (modifier, key) = split_modifier(raw);
        if key.is_empty() {
            continue;
        }
        let present = keys(reg_level).any(|k| k == key);
        match (modifier, present) {
            (KeyModifier::Exclude, true) => return None,
            (KeyModifier::Require, false) => return None,
            (KeyModifier::Require | KeyModifier::Prefer, true) => rank += 1,
            _ => {}
        }
    }
    Some(rank)
}

/// Match `registration` against `pattern`.
///
/// Returns 0 for no match, otherwise a rank of at least 1; higher ranks mean
/// more keys agreed.
pub fn registration_match(registration: &str, pattern: &str) -> u32 {
    let mut rank = 0;

    if !pattern.contains(LEVEL_SEPARATOR) {
        let last = registration
            .rsplit(LEVEL_SEPARATOR)
            .find(|level| !level.is_empty())
            .unwrap_or("");
        if last.is_empty() || pattern.is_empty() {
            return if pattern.is_empty() { 1 } else { 0 };
        }
        return match match_level(last, pattern) {
            Some(r) => r.max(1),
            None => 0,
        };
    }

    let reg_levels: Vec<&str> = registration.split(LEVEL_SEPARATOR).collect();
    let pattern_levels: Vec<&str> = pattern.split(LEVEL_SEPARATOR).collect();

    for (reg_level, pattern_level) in reg_levels.iter().zip(pattern_levels.iter()) {
        if reg_level.is_empty() || pattern_level.is_empty() {
            continue;
        }
        match match_level(reg_level, pattern_level) {
            Some(r) => rank += r,
            None => return 0,
        }
    }

    // Pattern levels past the end of the registration may only exclude or prefer.
    for pattern_level in pattern_levels.iter().skip(reg_levels.len()) {
        let requires = keys(pattern_level)
            .map(split_modifier)
            .any(|(m, k)| m == KeyModifier::Require && !k.is_empty());
        if requires {
            return 0;
        }
    }

    rank.max(1)
}

/// Return the level at `index`, skipping nothing.
pub fn registration_level(registration: &str, index: usize) -> Option<&str> {
    registration.split(LEVEL_SEPARATOR).nth(index)
}

/// The last non-empty level, usually the most specific key.
pub fn registration_key(registration: &str) -> &str {
    registration
        .rsplit(LEVEL_SEPARATOR)
        .find(|level| !level.is_empty())
        .unwrap_or("")
}
