//! Domain identity normalizer.
//!
//! # Invariants
//! - Output never carries a scheme prefix, trailing slash, surrounding
//!   whitespace or upper-case ASCII letters.
//! - `normalize(normalize(x)) == normalize(x)`.

use once_cell::sync::Lazy;
use regex::Regex;

static SCHEME_PREFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i)[a-z][a-z0-9+.\-]*://").expect("valid scheme prefix regex")
});

/// Canonicalizes one raw domain string into a domain identity.
///
/// Strips a leading `<scheme>://`, strips trailing slashes, lower-cases and
/// trims. Blank input yields an empty identity.
pub fn normalize(raw: &str) -> String {
    let mut current = raw.trim();
    // Repeat until stable so inputs like `https://http://x` settle in one call.
    loop {
        let without_scheme = match SCHEME_PREFIX_RE.find(current) {
            Some(found) => current[found.end()..].trim(),
            None => current,
        };
        let without_slash = without_scheme.trim_end_matches('/').trim();
        if without_slash.len() == current.len() {
            break;
        }
        current = without_slash;
    }
    current.to_lowercase()
}

/// Normalizes an optional domain. `None` behaves like blank input.
pub fn normalize_opt(raw: Option<&str>) -> String {
    raw.map(normalize).unwrap_or_default()
}

/// Returns whether the raw domain normalizes to an empty identity.
pub fn is_blank_domain(raw: &str) -> bool {
    normalize(raw).is_empty()
}
