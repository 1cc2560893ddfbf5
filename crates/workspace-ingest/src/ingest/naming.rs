//! Safe, unique names for uploaded files.

use crate::config::UploadConfig;
use crate::error::{IngestError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Characters reserved on NTFS plus ASCII control characters.
static RESERVED_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[<>:"|?*\x00-\x1F]"#).unwrap());

static WHITESPACE_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Reserved device names on Windows.
const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

const FALLBACK_NAME: &str = "upload";

/// Reduce a client-supplied file name to a safe single path component.
///
/// Directory parts are dropped, reserved characters removed, whitespace runs
/// collapsed to `_`, and overlong names truncated while keeping the
/// extension. Case is preserved.
///
/// ```
/// use workspace_ingest::ingest::safe_filename;
///
/// assert_eq!(safe_filename("../../etc/passwd"), "passwd");
/// assert_eq!(safe_filename("My Session?.cmdi"), "My_Session.cmdi");
/// ```
pub fn safe_filename(name: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let mut result = RESERVED_CHARS.replace_all(base, "").to_string();
    result = WHITESPACE_RUNS.replace_all(result.trim(), "_").to_string();
    result = result.trim_start_matches('.').to_string();

    if result.len() > UploadConfig::MAX_NAME_LENGTH {
        result = truncate_keeping_extension(&result, UploadConfig::MAX_NAME_LENGTH);
    }

    let (stem, _) = split_extension(&result);
    if RESERVED_NAMES.contains(&stem.to_uppercase().as_str()) {
        result = format!("{}_file{}", stem, &result[stem.len()..]);
    }

    if result.is_empty() {
        result = FALLBACK_NAME.to_string();
    }

    result
}

/// First free path for `name` in `dir`, appending `_1`, `_2`, … to the stem.
pub fn unique_path(dir: &Path, name: &str) -> Result<PathBuf> {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return Ok(candidate);
    }

    let (stem, extension) = split_extension(name);
    for n in 1..=UploadConfig::MAX_NAME_SUFFIX {
        let candidate = dir.join(format!("{}_{}{}", stem, n, extension));
        if !candidate.exists() {
            return Ok(candidate);
        }
    }

    Err(IngestError::NameExhausted {
        dir: dir.to_path_buf(),
        name: name.to_string(),
    })
}

/// Split `name` into stem and extension (with its dot).
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(pos) if pos > 0 => (&name[..pos], &name[pos..]),
        _ => (name, ""),
    }
}

fn truncate_keeping_extension(name: &str, max: usize) -> String {
    let (stem, extension) = split_extension(name);
    let budget = max.saturating_sub(extension.len());
    let mut cut = budget.min(stem.len());
    while !stem.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}{}", &stem[..cut], extension)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_safe_filename() {
        assert_eq!(safe_filename("audio.wav"), "audio.wav");
        assert_eq!(safe_filename("C:\\Users\\me\\rec 01.wav"), "rec_01.wav");
        assert_eq!(safe_filename("a<b>c.txt"), "abc.txt");
        assert_eq!(safe_filename(".hidden"), "hidden");
        assert_eq!(safe_filename("CON.txt"), "CON_file.txt");
        assert_eq!(safe_filename("???"), "upload");
        assert_eq!(safe_filename(""), "upload");
    }

    #[test]
    fn test_long_name_keeps_extension() {
        let long = format!("{}.cmdi", "x".repeat(400));
        let safe = safe_filename(&long);
        assert!(safe.len() <= UploadConfig::MAX_NAME_LENGTH);
        assert!(safe.ends_with(".cmdi"));
    }

    #[test]
    fn test_unique_path() {
        let temp = TempDir::new().unwrap();
        let first = unique_path(temp.path(), "a.wav").unwrap();
        assert_eq!(first, temp.path().join("a.wav"));
        std::fs::write(&first, b"x").unwrap();

        let second = unique_path(temp.path(), "a.wav").unwrap();
        assert_eq!(second, temp.path().join("a_1.wav"));
        std::fs::write(&second, b"x").unwrap();

        assert_eq!(
            unique_path(temp.path(), "a.wav").unwrap(),
            temp.path().join("a_2.wav")
        );
    }
}
