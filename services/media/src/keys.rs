//! Object key generation and URL-to-key resolution

use chrono::Utc;
use rand::Rng;
use regex::Regex;
use std::sync::OnceLock;
use url::Url;

/// Prefix every stored object lives under
pub const KEY_PREFIX: &str = "uploads";

/// Replace every character outside `[A-Za-z0-9.]` with `-`.
pub fn sanitize_file_name(file_name: &str) -> String {
    static UNSAFE_CHARS: OnceLock<Regex> = OnceLock::new();
    let regex = UNSAFE_CHARS
        .get_or_init(|| Regex::new(r"[^a-zA-Z0-9.]").expect("Failed to compile file name regex"));

    regex.replace_all(file_name, "-").into_owned()
}

/// Build a unique key: `uploads/<millis>-<random>-<sanitised name>`.
pub fn object_key(original_name: &str) -> String {
    let millis = Utc::now().timestamp_millis();
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000_000);
    format!(
        "{}/{}-{}-{}",
        KEY_PREFIX,
        millis,
        suffix,
        sanitize_file_name(original_name)
    )
}

/// Extract the object key from a stored URL.
///
/// Absolute URLs yield their path without the leading slash, root-relative
/// paths (`/uploads/..`) lose the slash, and bare keys pass through.
pub fn key_from_url(url: &str) -> Option<String> {
    let url = url.trim();
    if url.is_empty() {
        return None;
    }

    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.to_string(),
    };

    let key = path.trim_start_matches('/');
    if key.is_empty() {
        None
    } else {
        Some(key.to_string())
    }
}
