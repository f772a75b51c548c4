//! Signature gate: detached OpenPGP signature over the checksum manifest

use std::io::Cursor;

use pgp::composed::{Deserializable, SignedPublicKey, StandaloneSignature};

use crate::verify::IntegrityError;

const ARMOR_PREFIX: &[u8] = b"-----BEGIN PGP";

/// Verify the checksum manifest bytes against a detached signature.
///
/// The signature covers the manifest, not the asset: a forged manifest
/// with self-consistent digests would otherwise pass the checksum gate.
/// Both armored and binary signature/key encodings are accepted. The
/// primary key and every subkey are tried, since vendors routinely sign
/// with a signing subkey.
pub fn check(manifest: &[u8], signature: &[u8], public_key: &[u8]) -> Result<(), IntegrityError> {
    let key = parse_public_key(public_key)?;
    let signature = parse_signature(signature)?;

    if signature.verify(&key, manifest).is_ok() {
        return Ok(());
    }

    for subkey in &key.public_subkeys {
        if signature.verify(subkey, manifest).is_ok() {
            return Ok(());
        }
    }

    Err(IntegrityError::Signature(
        "checksum manifest does not match its detached signature under the given key".to_string(),
    ))
}

fn parse_public_key(raw: &[u8]) -> Result<SignedPublicKey, IntegrityError> {
    let key = if raw.starts_with(ARMOR_PREFIX) {
        SignedPublicKey::from_armor_single(Cursor::new(raw))
            .map_err(|e| IntegrityError::Key(e.to_string()))?
            .0
    } else {
        SignedPublicKey::from_bytes(Cursor::new(raw))
            .map_err(|e| IntegrityError::Key(e.to_string()))?
    };

    Ok(key)
}

fn parse_signature(raw: &[u8]) -> Result<StandaloneSignature, IntegrityError> {
    let signature = if raw.starts_with(ARMOR_PREFIX) {
        StandaloneSignature::from_armor_single(Cursor::new(raw))
            .map_err(|e| IntegrityError::Signature(e.to_string()))?
            .0
    } else {
        StandaloneSignature::from_bytes(Cursor::new(raw))
            .map_err(|e| IntegrityError::Signature(e.to_string()))?
    };

    Ok(signature)
}
