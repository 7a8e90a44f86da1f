//! Storage name generation and validation

use chrono::Utc;
use rand::Rng;

use crate::storage::StorageError;

/// Upper bound (inclusive) of the random component of a storage name
pub const RANDOM_SUFFIX_MAX: u64 = 1_000_000_000;

/// Name substituted when sanitising leaves nothing usable
const FALLBACK_NAME: &str = "unnamed";

/// Longest name, in bytes, that common filesystems accept for one path segment
pub const MAX_STORAGE_NAME_BYTES: usize = 255;

/// Extensions longer than this are treated as part of the stem when shortening
const MAX_KEPT_EXTENSION_BYTES: usize = 16;

/// Generate a collision-resistant storage name for an uploaded file.
///
/// The name is `<millis>-<random>-<original>`. Uniqueness is probabilistic:
/// existing entries are never consulted.
pub fn generate_storage_name(original: &str) -> String {
    let timestamp = Utc::now().timestamp_millis();
    let suffix = rand::thread_rng().gen_range(0..=RANDOM_SUFFIX_MAX);
    compose_storage_name(timestamp, suffix, original)
}

/// Assemble a storage name from its parts
///
/// The original part is shortened when needed so the result never exceeds
/// `MAX_STORAGE_NAME_BYTES`.
pub fn compose_storage_name(timestamp: i64, suffix: u64, original: &str) -> String {
    let prefix = format!("{}-{}-", timestamp, suffix);
    let budget = MAX_STORAGE_NAME_BYTES.saturating_sub(prefix.len());
    let original = shorten_name(&sanitize_original_name(original), budget);
    prefix + &original
}

/// Cut `name` down to at most `max_bytes`, on a char boundary, keeping a short extension
fn shorten_name(name: &str, max_bytes: usize) -> String {
    if name.len() <= max_bytes {
        return name.to_string();
    }
    let (stem, extension) = match name.rfind('.') {
        Some(dot) if dot > 0 && name.len() - dot <= MAX_KEPT_EXTENSION_BYTES && name.len() - dot < max_bytes => {
            name.split_at(dot)
        }
        _ => (name, ""),
    };
    let mut end = max_bytes - extension.len();
    while !stem.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{}", &stem[..end], extension)
}

/// Recover the original file name from a storage name.
///
/// Names that do not carry the `<millis>-<random>-` prefix are returned unchanged.
pub fn original_name(storage_name: &str) -> &str {
    let mut parts = storage_name.splitn(3, '-');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(ts), Some(rand), Some(rest))
            if is_digits(ts) && is_digits(rand) && !rest.is_empty() =>
        {
            rest
        }
        _ => storage_name,
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Reduce a client-supplied file name to something safe to embed in a storage name.
///
/// Only the final path component is kept and control characters are dropped.
pub fn sanitize_original_name(raw: &str) -> String {
    let last = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
    let cleaned: String = last.chars().filter(|c| !c.is_control()).collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        FALLBACK_NAME.to_string()
    } else {
        cleaned.to_string()
    }
}

/// Check that `name` addresses a single entry directly inside a storage root.
pub fn validate_storage_name(name: &str) -> Result<&str, StorageError> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.starts_with('.')
        || name.contains(['/', '\\', '\0']);
    if invalid {
        return Err(StorageError::InvalidName(name.to_string()));
    }
    Ok(name)
}

/// Guess a MIME type from the file extension
pub fn guess_mime_type(name: &str) -> String {
    mime_guess::from_path(name)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}
