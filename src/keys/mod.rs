//! Scheme keys.
//!
//! This module provides:
//! - typed per-scheme parameters (`params`)
//! - raw key material and key files (`material`)
//! - the `KeyProvider` capability trait used by the emitter
//! - `SchemeKey`, the owned key of one section, with construction and
//!   bridge adaptation

pub mod material;
pub mod params;

use std::path::Path;

use chrono::Utc;

use crate::errors::{ModsecError, Result};

pub use material::{KeyFiles, KeyMaterial, PublicRecord};
pub use params::{BfvParams, CkksParams, KeyFamily, Scheme, SchemeParams};

/// Schemes that may borrow a key through a bridge, and the capability
/// family the borrowed key must belong to.
pub const BRIDGE_TABLE: [(Scheme, KeyFamily); 2] = [
    (Scheme::Pila, KeyFamily::RingBase),
    (Scheme::Seal, KeyFamily::Bfv),
];

/// Family a bridged key must come from for `requested`, if bridging is
/// supported for that scheme at all.
pub fn bridge_family(requested: Scheme) -> Option<KeyFamily> {
    BRIDGE_TABLE
        .iter()
        .find(|(scheme, _)| *scheme == requested)
        .map(|(_, family)| *family)
}

/// What the emitter needs from a key.
pub trait KeyProvider {
    fn scheme(&self) -> Scheme;

    /// Type name of the section this key is tagged with.
    fn owner(&self) -> &str;

    fn lambda(&self) -> u32;

    /// Number of plaintext lanes.
    fn slots(&self) -> usize;

    /// Encrypt a `_`-joined lane vector, producing `repeat` ciphertexts
    /// in text form.
    fn encrypt(&self, plaintext: &str, repeat: usize) -> Result<String>;

    /// Internal generator factor; only Paillier-with-generator keys have one.
    /// A key that has a factor but cannot derive it reports the error.
    fn generator_factor(&self) -> Result<Option<String>> {
        Ok(None)
    }

    /// File names holding the key material.
    fn key_files(&self) -> &KeyFiles;
}

/// Inputs of a key constructor besides the scheme parameters.
#[derive(Debug, Clone, Copy)]
pub struct KeyRequest<'a> {
    /// Type name of the section the key is built for.
    pub owner: &'a str,
    pub force_generate: bool,
    pub force_load: bool,
    /// Seed actually used; empty means OS randomness.
    pub seed: &'a str,
    pub key_dir: &'a Path,
}

/// The key owned by one section.
#[derive(Debug, Clone)]
pub struct SchemeKey {
    owner: String,
    params: SchemeParams,
    material: KeyMaterial,
    files: KeyFiles,
}

impl SchemeKey {
    /// Build a key for `params`, generating or loading its material.
    ///
    /// - `force_generate`: always create fresh material and overwrite files
    /// - `force_load`: key files must already exist
    /// - neither: load when present, otherwise generate
    pub fn construct(request: &KeyRequest<'_>, params: SchemeParams) -> Result<Self> {
        if request.force_generate && request.force_load {
            return Err(ModsecError::Config(format!(
                "cannot force both generation and loading of keys for {}",
                request.owner
            )));
        }

        let scheme = params.scheme();
        let files = KeyFiles::for_key(request.owner, scheme.as_str());
        let descriptor = params.descriptor();

        let loaded = if request.force_generate {
            None
        } else {
            material::load_key_files(request.key_dir, &files)?
        };

        let material = match loaded {
            Some((material, record)) => {
                if record.params != descriptor {
                    return Err(ModsecError::KeyStore(format!(
                        "stored key {} was made for [{}], section asks for [{descriptor}]; regenerate it",
                        files.private, record.params
                    )));
                }
                tracing::debug!(owner = request.owner, %scheme, "loaded existing key");
                material
            }
            None if request.force_load => {
                return Err(ModsecError::KeyStore(format!(
                    "no key material for {} in {}",
                    files.private,
                    request.key_dir.display()
                )));
            }
            None => {
                if request.force_generate && request.key_dir.join(&files.private).exists() {
                    tracing::warn!(owner = request.owner, %scheme, "overwriting stored key");
                }
                let material = if request.seed.is_empty() {
                    KeyMaterial::random()
                } else {
                    KeyMaterial::from_seed(request.seed, &descriptor)?
                };
                let record = PublicRecord {
                    owner: request.owner.to_string(),
                    scheme: scheme.as_str().to_string(),
                    params: descriptor,
                    slots: params.slots(),
                    created_at: Utc::now(),
                    fingerprint: material.fingerprint(),
                };
                material::write_key_files(request.key_dir, &files, &material, &record)?;
                tracing::info!(owner = request.owner, %scheme, "generated key");
                material
            }
        };

        Ok(Self {
            owner: request.owner.to_string(),
            params,
            material,
            files,
        })
    }

    /// Build a key of the `requested` scheme from this (bridged) key.
    ///
    /// The result is a fresh value tagged with `owner`. Fails with an
    /// invariant fault when this key is not in the family `requested`
    /// needs, and with a configuration error when `requested` does not
    /// support bridging.
    pub fn adapt(&self, requested: Scheme, owner: &str) -> Result<Self> {
        let family = bridge_family(requested).ok_or_else(|| {
            ModsecError::Config(format!(
                "bridge is not supported for type [{requested}] in {owner}"
            ))
        })?;

        let mismatch = || {
            ModsecError::Invariant(format!(
                "bad bridge: {} key cannot back {requested} in {owner}",
                self.scheme()
            ))
        };

        if self.scheme().family() != family {
            return Err(mismatch());
        }
        let params = self.params.convert(requested).ok_or_else(mismatch)?;

        Ok(Self {
            owner: owner.to_string(),
            params,
            material: self.material.clone(),
            files: self.files.clone(),
        })
    }

    pub fn params(&self) -> &SchemeParams {
        &self.params
    }

    pub fn fingerprint(&self) -> String {
        self.material.fingerprint()
    }

    /// Check and normalise a `_`-joined plaintext lane vector.
    fn lanes(&self, plaintext: &str) -> Result<Vec<i64>> {
        let lanes = plaintext
            .split('_')
            .map(|lane| {
                lane.trim().parse::<i64>().map_err(|_| {
                    ModsecError::EncryptionFailed(format!(
                        "plaintext lane '{lane}' is not an integer"
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        if lanes.len() > self.slots() {
            return Err(ModsecError::EncryptionFailed(format!(
                "{} lanes given but {} key has {} slots",
                lanes.len(),
                self.scheme(),
                self.slots()
            )));
        }
        Ok(lanes)
    }
}

impl KeyProvider for SchemeKey {
    fn scheme(&self) -> Scheme {
        self.params.scheme()
    }

    fn owner(&self) -> &str {
        &self.owner
    }

    fn lambda(&self) -> u32 {
        self.params.lambda()
    }

    fn slots(&self) -> usize {
        self.params.slots()
    }

    fn encrypt(&self, plaintext: &str, repeat: usize) -> Result<String> {
        if repeat == 0 {
            return Err(ModsecError::EncryptionFailed(
                "repeat count must be at least 1".into(),
            ));
        }

        let lanes = self.lanes(plaintext)?;
        let canonical = lanes
            .iter()
            .map(i64::to_string)
            .collect::<Vec<_>>()
            .join("_");
        let payload = format!("{}|{canonical}", self.scheme());

        let mut copies = Vec::with_capacity(repeat);
        for index in 0..repeat {
            let blob = self
                .material
                .seal_deterministic(payload.as_bytes(), index as u64)?;
            copies.push(hex::encode(blob));
        }
        Ok(copies.join("_"))
    }

    fn generator_factor(&self) -> Result<Option<String>> {
        match self.params {
            SchemeParams::Pailg { beta, .. } => {
                let info = format!("pailg-fkf:{beta}");
                let value = self.material.derive_u128(info.as_bytes())?;
                // Odd so the factor is never trivially zero.
                Ok(Some((value | 1).to_string()))
            }
            _ => Ok(None),
        }
    }

    fn key_files(&self) -> &KeyFiles {
        &self.files
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn request<'a>(owner: &'a str, seed: &'a str, dir: &'a Path) -> KeyRequest<'a> {
        KeyRequest {
            owner,
            force_generate: false,
            force_load: false,
            seed,
            key_dir: dir,
        }
    }

    #[test]
    fn bridge_table_lists_ring_base_and_plain_lattice() {
        assert_eq!(bridge_family(Scheme::Pila), Some(KeyFamily::RingBase));
        assert_eq!(bridge_family(Scheme::Seal), Some(KeyFamily::Bfv));
        assert_eq!(bridge_family(Scheme::Pail), None);
        assert_eq!(bridge_family(Scheme::SealCkks), None);
    }

    #[test]
    fn construct_generates_then_loads_same_material() {
        let dir = TempDir::new().unwrap();
        let req = request("SecureInt", "", dir.path());

        let first = SchemeKey::construct(&req, SchemeParams::Pila { lambda: 4 }).unwrap();
        let second = SchemeKey::construct(&req, SchemeParams::Pila { lambda: 4 }).unwrap();
        assert_eq!(first.fingerprint(), second.fingerprint());
    }

    #[test]
    fn force_load_without_files_fails() {
        let dir = TempDir::new().unwrap();
        let req = KeyRequest {
            force_load: true,
            ..request("SecureInt", "", dir.path())
        };
        let err = SchemeKey::construct(&req, SchemeParams::Pail { lambda: 4 }).unwrap_err();
        assert!(matches!(err, ModsecError::KeyStore(_)));
    }

    #[test]
    fn both_force_flags_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        let req = KeyRequest {
            force_load: true,
            force_generate: true,
            ..request("SecureInt", "", dir.path())
        };
        let err = SchemeKey::construct(&req, SchemeParams::Pail { lambda: 4 }).unwrap_err();
        assert!(matches!(err, ModsecError::Config(_)));
    }

    #[test]
    fn stored_key_with_other_params_is_rejected() {
        let dir = TempDir::new().unwrap();
        let req = request("SecureInt", "s", dir.path());
        SchemeKey::construct(&req, SchemeParams::Pila { lambda: 4 }).unwrap();
        let err = SchemeKey::construct(&req, SchemeParams::Pila { lambda: 8 }).unwrap_err();
        assert!(err.to_string().contains("regenerate"));
    }

    #[test]
    fn encrypt_checks_lane_count_and_repeats() {
        let dir = TempDir::new().unwrap();
        let key = SchemeKey::construct(
            &request("SecureInt", "s", dir.path()),
            SchemeParams::Pila { lambda: 4 },
        )
        .unwrap();

        assert!(key.encrypt("0_0", 1).is_err());
        assert!(key.encrypt("x", 1).is_err());
        assert!(key.encrypt("1", 0).is_err());

        let single = key.encrypt("1", 1).unwrap();
        let double = key.encrypt("1", 2).unwrap();
        assert!(!single.contains('_'));
        assert_eq!(double.split('_').count(), 2);
        assert!(double.starts_with(&single));
    }

    #[test]
    fn only_pailg_has_a_generator_factor() {
        let dir = TempDir::new().unwrap();
        let req = request("G", "s", dir.path());
        let pailg = SchemeKey::construct(&req, SchemeParams::Pailg { lambda: 4, beta: 3 }).unwrap();
        let pail = SchemeKey::construct(&req, SchemeParams::Pail { lambda: 4 }).unwrap();

        let fkf = pailg.generator_factor().unwrap().unwrap();
        assert_eq!(fkf.parse::<u128>().unwrap() % 2, 1);
        assert!(pail.generator_factor().unwrap().is_none());
    }

    #[test]
    fn adapt_retags_and_converts_within_family() {
        let dir = TempDir::new().unwrap();
        let bfv = SchemeParams::bfv("3", "17", "").unwrap();
        let prot = SchemeKey::construct(
            &request("Target", "s", dir.path()),
            SchemeParams::BfvProt { lambda: 4, bfv },
        )
        .unwrap();

        let seal = prot.adapt(Scheme::Seal, "Bridged").unwrap();
        assert_eq!(seal.scheme(), Scheme::Seal);
        assert_eq!(seal.owner(), "Bridged");
        assert_eq!(seal.fingerprint(), prot.fingerprint());
        assert_eq!(seal.slots(), 8);
    }

    #[test]
    fn adapt_across_families_is_an_invariant_fault() {
        let dir = TempDir::new().unwrap();
        let pail = SchemeKey::construct(
            &request("Target", "s", dir.path()),
            SchemeParams::Pail { lambda: 4 },
        )
        .unwrap();

        let err = pail.adapt(Scheme::Pila, "Bridged").unwrap_err();
        assert!(err.is_fatal());

        let err = pail.adapt(Scheme::Pailg, "Bridged").unwrap_err();
        assert!(matches!(err, ModsecError::Config(_)));
        assert!(err.to_string().contains("pailg"));
    }
}
