//! Service layer.
//!
//! Services own the workflows: they resolve the records involved, ask the policy engine
//! for a decision, and drive the stores. They hold no mutable state of their own, only
//! the shared repository handle and the password/token helpers, so they are cheap to
//! clone into the application state.

pub mod content;
pub mod identity;

pub use content::ContentService;
pub use identity::IdentityService;

use crate::{
    error::{AppError, AppResult},
    repository::StoreError,
};

/// Rejects a blank (empty or whitespace-only) required field.
pub(crate) fn require(value: &str, message: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::validation(message));
    }
    Ok(())
}

/// Maps the two "nothing happened" store outcomes to caller-facing messages. Every other
/// store failure keeps its default mapping.
pub(crate) fn store_error(err: StoreError, not_found: &str, no_rows: &str) -> AppError {
    match err {
        StoreError::NotFound => AppError::not_found(not_found),
        StoreError::NoRowsAffected => AppError::AlreadyInState(no_rows.to_string()),
        other => other.into(),
    }
}

/// Decodes a blog title taken from a URL path segment.
///
/// Follows query-unescape rules: `+` is a space, `%XX` is a byte, and a `%` that is not
/// followed by two hex digits is an error. The decoded bytes must be valid UTF-8.
pub fn decode_title(raw: &str) -> AppResult<String> {
    if raw.is_empty() {
        return Err(AppError::validation("invalid title"));
    }

    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes
                .get(i + 1..i + 3)
                .is_some_and(|pair| pair.iter().all(u8::is_ascii_hexdigit));
            if !valid {
                return Err(AppError::Validation(format!(
                    "invalid escape sequence in title '{raw}'"
                )));
            }
            i += 3;
        } else {
            i += 1;
        }
    }

    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|decoded| decoded.into_owned())
        .map_err(|_| AppError::validation("title is not valid UTF-8"))
}
