//! Small shared helpers.

use std::borrow::Cow;

/// Base delay of the first idle poll, in milliseconds.
pub const BASE_BACKOFF_MS: u64 = 10;

/// Delay before the next poll of an empty queue.
///
/// Doubles with every consecutive empty poll, starting at
/// [`BASE_BACKOFF_MS`], and never exceeds `max_ms`. With the `jitter`
/// feature, up to a quarter of the delay is added, mixed with `seed` so
/// that workers of the same pool do not wake in lockstep.
pub fn calculate_backoff(attempt: u32, seed: u64, max_ms: u64) -> u64 {
    let exponent = attempt.saturating_sub(1).min(16);
    let delay = BASE_BACKOFF_MS.saturating_mul(1 << exponent);

    #[cfg(feature = "jitter")]
    let delay = delay.saturating_add(jitter(delay / 4, attempt, seed));
    #[cfg(not(feature = "jitter"))]
    let _ = seed;

    delay.min(max_ms)
}

#[cfg(feature = "jitter")]
fn jitter(range: u64, attempt: u32, seed: u64) -> u64 {
    use std::hash::{BuildHasher, Hasher};

    if range == 0 {
        return 0;
    }
    let mut hasher = std::collections::hash_map::RandomState::new().build_hasher();
    hasher.write_u64(seed);
    hasher.write_u32(attempt);
    hasher.finish() % (range + 1)
}

/// Strip URL credentials (`user:password@`) from text embedding a URL.
///
/// Derived connection identifiers carry their DSN verbatim, secret key
/// included. Identifiers go through this before they reach a log line or an
/// error message.
pub fn redact_credentials(text: &str) -> Cow<'_, str> {
    let Some(scheme_end) = text.find("://") else {
        return Cow::Borrowed(text);
    };
    let authority_start = scheme_end + 3;
    let rest = &text[authority_start..];
    let authority_len = rest
        .find(|c| matches!(c, '/' | '?' | '#'))
        .unwrap_or(rest.len());

    match rest[..authority_len].rfind('@') {
        Some(at) => Cow::Owned(format!(
            "{}{}",
            &text[..authority_start],
            &rest[at + 1..]
        )),
        None => Cow::Borrowed(text),
    }
}
