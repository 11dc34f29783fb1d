//! Raw key material and its on-disk form.
//!
//! Every scheme key is backed by 32 bytes of material:
//! - seeded builds derive it with HKDF-SHA256 from the seed string,
//! - unseeded builds draw it from the OS RNG.
//!
//! Material is persisted as two files in the key directory:
//!
//! ```text
//! <Owner>.<scheme>.priv.key   raw 32 bytes, owner-only permissions
//! <Owner>.<scheme>.pub.json   scheme, parameters, fingerprint, timestamp
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::errors::{ModsecError, Result};

/// Length of key material in bytes (256 bits).
pub const MATERIAL_LEN: usize = 32;

/// Size of the AES-256-GCM nonce in bytes.
const NONCE_LEN: usize = 12;

/// 32 bytes of secret material, zeroed on drop.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct KeyMaterial {
    bytes: [u8; MATERIAL_LEN],
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

impl KeyMaterial {
    pub fn new(bytes: [u8; MATERIAL_LEN]) -> Self {
        Self { bytes }
    }

    /// Fresh material from the OS RNG.
    pub fn random() -> Self {
        let mut bytes = [0u8; MATERIAL_LEN];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Deterministic material for `seed`, bound to `context`.
    ///
    /// The same seed and context always give the same material; a change
    /// in either gives unrelated material.
    pub fn from_seed(seed: &str, context: &str) -> Result<Self> {
        let hk = Hkdf::<Sha256>::new(Some(&b"modsec-seed"[..]), seed.as_bytes());
        let mut bytes = [0u8; MATERIAL_LEN];
        hk.expand(context.as_bytes(), &mut bytes)
            .map_err(|e| ModsecError::KeyStore(format!("HKDF expand failed: {e}")))?;
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8; MATERIAL_LEN] {
        &self.bytes
    }

    /// Base64 SHA-256 of the material, safe to store in public metadata.
    pub fn fingerprint(&self) -> String {
        BASE64.encode(Sha256::digest(self.bytes))
    }

    /// Derive a 32-byte sub-key for a given purpose.
    pub fn subkey(&self, info: &[u8]) -> Result<[u8; MATERIAL_LEN]> {
        let hk = Hkdf::<Sha256>::new(None, &self.bytes);
        let mut okm = [0u8; MATERIAL_LEN];
        hk.expand(info, &mut okm)
            .map_err(|e| ModsecError::KeyStore(format!("HKDF expand failed: {e}")))?;
        Ok(okm)
    }

    /// Derive a 128-bit integer for a given purpose.
    pub fn derive_u128(&self, info: &[u8]) -> Result<u128> {
        let mut okm = self.subkey(info)?;
        let mut word = [0u8; 16];
        word.copy_from_slice(&okm[..16]);
        okm.zeroize();
        Ok(u128::from_be_bytes(word))
    }

    /// Encrypt `payload` deterministically.
    ///
    /// The nonce is an HMAC over (`index`, `payload`), so the same input
    /// always yields the same blob while distinct copies differ.
    /// Layout: `[ 12-byte nonce | ciphertext + 16-byte tag ]`.
    pub fn seal_deterministic(&self, payload: &[u8], index: u64) -> Result<Vec<u8>> {
        let mut enc_key = self.subkey(b"modsec-encrypt")?;
        let mut nonce_key = self.subkey(b"modsec-nonce")?;

        let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(&nonce_key)
            .map_err(|e| ModsecError::EncryptionFailed(format!("HMAC init failed: {e}")))?;
        nonce_key.zeroize();
        mac.update(&index.to_le_bytes());
        mac.update(payload);
        let tag = mac.finalize().into_bytes();
        let nonce = Nonce::from_slice(&tag[..NONCE_LEN]);

        let cipher = <Aes256Gcm as KeyInit>::new_from_slice(&enc_key)
            .map_err(|e| ModsecError::EncryptionFailed(format!("invalid key length: {e}")));
        enc_key.zeroize();

        let ciphertext = cipher?
            .encrypt(nonce, payload)
            .map_err(|e| ModsecError::EncryptionFailed(format!("encryption error: {e}")))?;

        let mut output = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        output.extend_from_slice(nonce);
        output.extend_from_slice(&ciphertext);
        Ok(output)
    }
}

// ---------------------------------------------------------------------------
// Key files
// ---------------------------------------------------------------------------

/// Names of the two files holding one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFiles {
    pub private: String,
    pub public: String,
}

impl KeyFiles {
    pub fn for_key(owner: &str, scheme: &str) -> Self {
        Self {
            private: format!("{owner}.{scheme}.priv.key"),
            public: format!("{owner}.{scheme}.pub.json"),
        }
    }

    fn private_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.private)
    }

    fn public_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.public)
    }
}

/// Public metadata stored next to the private material.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicRecord {
    pub owner: String,
    pub scheme: String,
    /// Parameter descriptor the material was generated for.
    pub params: String,
    pub slots: usize,
    pub created_at: DateTime<Utc>,
    pub fingerprint: String,
}

/// Write material and its public record, replacing existing files.
pub fn write_key_files(
    dir: &Path,
    files: &KeyFiles,
    material: &KeyMaterial,
    record: &PublicRecord,
) -> Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir).map_err(|e| {
            ModsecError::KeyStore(format!("cannot create key directory {}: {e}", dir.display()))
        })?;
    }

    let private_path = files.private_path(dir);
    fs::write(&private_path, material.as_bytes())
        .map_err(|e| ModsecError::KeyStore(format!("failed to write key file: {e}")))?;

    // On Unix, restrict permissions to owner-only read/write.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = fs::Permissions::from_mode(0o600);
        fs::set_permissions(&private_path, perms).map_err(|e| {
            ModsecError::KeyStore(format!("failed to set key file permissions: {e}"))
        })?;
    }

    let json = serde_json::to_string_pretty(record)
        .map_err(|e| ModsecError::SerializationError(format!("public key record: {e}")))?;
    fs::write(files.public_path(dir), json)
        .map_err(|e| ModsecError::KeyStore(format!("failed to write public record: {e}")))?;

    tracing::debug!(
        private = %private_path.display(),
        "wrote key files"
    );
    Ok(())
}

/// Load material and its public record.
///
/// Returns `Ok(None)` when neither file exists. A half-present pair, a
/// bad length or a fingerprint mismatch is an error.
pub fn load_key_files(dir: &Path, files: &KeyFiles) -> Result<Option<(KeyMaterial, PublicRecord)>> {
    let private_path = files.private_path(dir);
    let public_path = files.public_path(dir);

    match (private_path.exists(), public_path.exists()) {
        (false, false) => return Ok(None),
        (true, true) => {}
        _ => {
            return Err(ModsecError::KeyStore(format!(
                "incomplete key files for {} in {}",
                files.private,
                dir.display()
            )))
        }
    }

    let mut data = fs::read(&private_path)
        .map_err(|e| ModsecError::KeyStore(format!("failed to read key file: {e}")))?;
    if data.len() != MATERIAL_LEN {
        let len = data.len();
        data.zeroize();
        return Err(ModsecError::KeyStore(format!(
            "key file {} must be exactly {MATERIAL_LEN} bytes, got {len}",
            private_path.display()
        )));
    }
    let mut bytes = [0u8; MATERIAL_LEN];
    bytes.copy_from_slice(&data);
    data.zeroize();
    let material = KeyMaterial::new(bytes);
    bytes.zeroize();

    let json = fs::read_to_string(&public_path)
        .map_err(|e| ModsecError::KeyStore(format!("failed to read public record: {e}")))?;
    let record: PublicRecord = serde_json::from_str(&json).map_err(|e| {
        ModsecError::SerializationError(format!("{}: {e}", public_path.display()))
    })?;

    verify_fingerprint(&material, &record.fingerprint)?;

    tracing::debug!(private = %private_path.display(), "loaded key files");
    Ok(Some((material, record)))
}

/// Check that material matches the fingerprint in its public record.
pub fn verify_fingerprint(material: &KeyMaterial, expected: &str) -> Result<()> {
    use subtle::ConstantTimeEq;

    let actual = material.fingerprint();
    if actual.as_bytes().ct_eq(expected.as_bytes()).into() {
        Ok(())
    } else {
        Err(ModsecError::KeyStore(
            "key material does not match its public record".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record_for(material: &KeyMaterial) -> PublicRecord {
        PublicRecord {
            owner: "SecureInt".into(),
            scheme: "pila".into(),
            params: "pila:l=2".into(),
            slots: 1,
            created_at: Utc::now(),
            fingerprint: material.fingerprint(),
        }
    }

    #[test]
    fn seeded_material_is_deterministic() {
        let a = KeyMaterial::from_seed("SecureInt42", "pila:l=2").unwrap();
        let b = KeyMaterial::from_seed("SecureInt42", "pila:l=2").unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn seeded_material_depends_on_context() {
        let a = KeyMaterial::from_seed("seed", "pila:l=2").unwrap();
        let b = KeyMaterial::from_seed("seed", "pila:l=3").unwrap();
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn deterministic_seal_repeats_and_varies_by_index() {
        let m = KeyMaterial::new([7u8; MATERIAL_LEN]);
        let one = m.seal_deterministic(b"0_0", 0).unwrap();
        let again = m.seal_deterministic(b"0_0", 0).unwrap();
        let other = m.seal_deterministic(b"0_0", 1).unwrap();
        assert_eq!(one, again);
        assert_ne!(one, other);
        // nonce + payload + tag
        assert_eq!(one.len(), 12 + 3 + 16);
    }

    #[test]
    fn key_files_round_trip() {
        let dir = TempDir::new().unwrap();
        let files = KeyFiles::for_key("SecureInt", "pila");
        let material = KeyMaterial::random();

        write_key_files(dir.path(), &files, &material, &record_for(&material)).unwrap();
        let (loaded, record) = load_key_files(dir.path(), &files).unwrap().unwrap();
        assert_eq!(loaded.as_bytes(), material.as_bytes());
        assert_eq!(record.scheme, "pila");
    }

    #[test]
    fn missing_files_load_as_none() {
        let dir = TempDir::new().unwrap();
        let files = KeyFiles::for_key("Nope", "pail");
        assert!(load_key_files(dir.path(), &files).unwrap().is_none());
    }

    #[test]
    fn tampered_material_is_rejected() {
        let dir = TempDir::new().unwrap();
        let files = KeyFiles::for_key("SecureInt", "pila");
        let material = KeyMaterial::random();
        write_key_files(dir.path(), &files, &material, &record_for(&material)).unwrap();

        fs::write(dir.path().join(&files.private), [0u8; MATERIAL_LEN]).unwrap();
        assert!(load_key_files(dir.path(), &files).is_err());
    }

    #[test]
    fn wrong_length_is_rejected() {
        let dir = TempDir::new().unwrap();
        let files = KeyFiles::for_key("SecureInt", "pila");
        let material = KeyMaterial::random();
        write_key_files(dir.path(), &files, &material, &record_for(&material)).unwrap();

        fs::write(dir.path().join(&files.private), [1u8; 16]).unwrap();
        let err = load_key_files(dir.path(), &files).unwrap_err();
        assert!(err.to_string().contains("exactly 32 bytes"));
    }

    #[test]
    fn half_present_pair_is_an_error() {
        let dir = TempDir::new().unwrap();
        let files = KeyFiles::for_key("SecureInt", "pila");
        fs::write(dir.path().join(&files.private), [1u8; MATERIAL_LEN]).unwrap();
        assert!(load_key_files(dir.path(), &files).is_err());
    }
}
