//! Integrity verification gates run before any unpack
//! - sha256.rs: checksum manifest gate
//! - pgp.rs: detached signature gate over the manifest

pub mod pgp;
pub mod sha256;

/// Error type for both verification gates.
///
/// Every variant is fatal: an install is aborted before any write to
/// the final store path.
#[derive(Debug, thiserror::Error)]
pub enum IntegrityError {
    #[error("Checksum mismatch for {file_name}: manifest says {expected}, got {actual}")]
    ChecksumMismatch {
        file_name: String,
        expected: String,
        actual: String,
    },

    #[error("No checksum entry for {0} in manifest")]
    MissingEntry(String),

    #[error("Malformed checksum manifest: {0}")]
    MalformedManifest(String),

    #[error("Unusable public key: {0}")]
    Key(String),

    #[error("Signature verification failed: {0}")]
    Signature(String),
}
