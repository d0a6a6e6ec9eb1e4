//! Extension hints carried in envelope headers
//!
//! The header records the original file's extension so a recovered file can
//! be named sensibly even when the stored object name is opaque. Hints are
//! attacker-controllable on read, so only short ASCII alphanumeric values
//! are ever placed into a filename.

/// Longest extension hint accepted on write or honoured on read.
pub const MAX_HINT_LEN: usize = 16;

/// Extract the extension hint from a filename or path.
///
/// `"report.PDF"` → `Some("PDF")`, `"archive.tar.gz"` → `Some("gz")`,
/// `".bashrc"` and `"README"` → `None`.
pub fn extension_hint(filename: &str) -> Option<String> {
    let base = filename.rsplit(&['/', '\\'][..]).next().unwrap_or(filename);
    let (stem, ext) = base.rsplit_once('.')?;
    if stem.is_empty() || !is_valid_hint(ext) {
        return None;
    }
    Some(ext.to_string())
}

pub fn is_valid_hint(ext: &str) -> bool {
    !ext.is_empty() && ext.len() <= MAX_HINT_LEN && ext.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// Name for recovered plaintext: the fallback plus the hint, unless the
/// fallback already carries that extension or the hint is unusable.
pub fn suggested_name(fallback: &str, hint: Option<&str>) -> String {
    let Some(ext) = hint else {
        return fallback.to_string();
    };

    if !is_valid_hint(ext) {
        tracing::warn!(len = ext.len(), "ignoring invalid extension hint in header");
        return fallback.to_string();
    }

    let already_named = fallback
        .rsplit_once('.')
        .is_some_and(|(stem, current)| !stem.is_empty() && current.eq_ignore_ascii_case(ext));
    if already_named {
        fallback.to_string()
    } else {
        format!("{fallback}.{ext}")
    }
}
