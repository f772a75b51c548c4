//! Shared fixtures for integration tests

use std::io::{Cursor, Write};

use sha2::{Digest, Sha256};

/// Render a `<hex-digest>  <filename>` checksum manifest for the given
/// blobs.
pub fn sha256_manifest(entries: &[(&str, &[u8])]) -> String {
    entries
        .iter()
        .map(|(name, data)| format!("{}  {}\n", hex::encode(Sha256::digest(data)), name))
        .collect()
}

/// Build an in-memory zip archive with executable entries.
pub fn zip_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored)
        .unix_permissions(0o755);

    for (name, content) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content).unwrap();
    }

    writer.finish().unwrap().into_inner()
}
