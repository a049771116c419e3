//! Object key derivation
//!
//! Keys look like `[prefix/]{unix_millis}-{ulid}-{sanitized filename}` so two
//! uploads of the same file never collide and the poller can query the key
//! right after the write.

const MAX_NAME_LEN: usize = 128;
const FALLBACK_NAME: &str = "file";

/// Reduce a client filename to a storage-safe name
///
/// Keeps ASCII alphanumerics, `.`, `-` and `_`; everything else becomes `_`.
/// Directory components are dropped and leading dots stripped.
pub fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename);

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = cleaned.trim_start_matches('.');
    let truncated: String = trimmed.chars().take(MAX_NAME_LEN).collect();

    if truncated.trim_matches('_').is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        truncated
    }
}

/// Build a collision-resistant storage key for an upload
pub fn derive_object_key(prefix: Option<&str>, filename: &str) -> String {
    let name = format!(
        "{}-{}-{}",
        chrono::Utc::now().timestamp_millis(),
        ulid::Ulid::new().to_string().to_lowercase(),
        sanitize_filename(filename)
    );

    match prefix.map(|p| p.trim_matches('/')).filter(|p| !p.is_empty()) {
        Some(prefix) => format!("{prefix}/{name}"),
        None => name,
    }
}
