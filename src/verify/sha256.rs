//! Checksum gate: SHA-256 digest against the release's checksum manifest

use sha2::{Digest, Sha256};

use crate::verify::IntegrityError;

/// Verify `data` against the manifest entry named `file_name`.
///
/// The manifest is the plain-text `<hex-digest>  <filename>` table
/// published next to the assets. The entry must exist and its digest
/// must match exactly; anything else is a hard failure.
pub fn check(data: &[u8], manifest: &[u8], file_name: &str) -> Result<(), IntegrityError> {
    let manifest = std::str::from_utf8(manifest)
        .map_err(|e| IntegrityError::MalformedManifest(e.to_string()))?;

    let expected = find_entry(manifest, file_name)?;
    let actual = hex::encode(Sha256::digest(data));

    if !expected.eq_ignore_ascii_case(&actual) {
        return Err(IntegrityError::ChecksumMismatch {
            file_name: file_name.to_string(),
            expected: expected.to_string(),
            actual,
        });
    }

    Ok(())
}

fn find_entry<'a>(manifest: &'a str, file_name: &str) -> Result<&'a str, IntegrityError> {
    for line in manifest.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut fields = line.split_whitespace();
        let (Some(digest), Some(name)) = (fields.next(), fields.next()) else {
            return Err(IntegrityError::MalformedManifest(format!(
                "expected '<digest>  <filename>', got '{line}'"
            )));
        };

        // Binary-mode sum tools prefix the filename with '*'.
        if name.trim_start_matches('*') == file_name {
            return Ok(digest);
        }
    }

    Err(IntegrityError::MissingEntry(file_name.to_string()))
}
