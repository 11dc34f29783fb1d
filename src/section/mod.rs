//! The modular security section.
//!
//! A `ModularSection` is built once per build from a configuration block:
//! 1. `parse` loads and validates its parameters,
//! 2. `gen_keys` materializes (or borrows through a bridge) its key,
//! 3. `write_h` / `write_inc` / `write_cpp` emit the generated sources
//!    (see `emit`).

pub mod emit;
pub mod fields;

use std::collections::HashMap;
use std::path::PathBuf;

use crate::bridge::Bridge;
use crate::config::SectionBlock;
use crate::errors::{ModsecError, Result};
use crate::keys::{bridge_family, KeyProvider, KeyRequest, Scheme, SchemeKey, SchemeParams};
use crate::names;

use fields::{Field, RawFields};

/// Name of a module: the user type name and its file stem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleName {
    /// Type name used in generated code and as the seed prefix.
    pub typ: String,
    /// Lowercase file stem for generated artifacts.
    pub fil: String,
}

impl ModuleName {
    pub fn new(typ: &str) -> Self {
        Self {
            typ: typ.to_string(),
            fil: typ.to_lowercase(),
        }
    }
}

/// Options of one key-generation pass.
#[derive(Debug, Clone, Default)]
pub struct KeyGenOptions {
    pub force_generate: bool,
    pub force_load: bool,
    /// Caller seed. `None` draws key material from the OS RNG and the type
    /// name is not used. `Some(s)` seeds deterministically from the type
    /// name followed by `s`, so `Some("")` seeds from the type name alone.
    pub seed: Option<String>,
    pub key_dir: PathBuf,
}

/// One modular security section.
#[derive(Debug)]
pub struct ModularSection {
    name: ModuleName,
    enc_type: String,
    /// `None` for bridged sections.
    lambda: Option<u32>,
    beta: u32,
    postfix_p: String,
    postfix_n: String,
    poly_modulus_degree: String,
    plaintext_modulus: String,
    encoder: String,
    scale: String,
    primes: String,
    cophee_is_arduino: String,
    cophee_baud_rate: String,
    plaintext_size: Option<u32>,
    sk: Option<SchemeKey>,
}

/// Rewrite legacy scheme spellings to their canonical identifier.
fn fix_enc_type(enc_type: &mut String) {
    if enc_type == names::ENC_PIL_BASE {
        *enc_type = names::ENC_PILA.to_string();
    }
}

fn validate_enc_type(enc_type: &str, name: &str) -> Result<()> {
    if enc_type.is_empty() {
        return Err(ModsecError::Config(format!(
            "encryption type must be defined for {name}"
        )));
    }
    if names::VALID_SCHEMES.contains(&enc_type) || enc_type.starts_with(names::BRIDGE_MARKER) {
        return Ok(());
    }
    let valid: String = names::VALID_SCHEMES
        .iter()
        .map(|s| format!(" {s}"))
        .collect();
    Err(ModsecError::Config(format!(
        "bad encryption type [{enc_type}] for {name}; valid:{valid}"
    )))
}

impl ModularSection {
    /// Build a section from its configuration pairs and the global
    /// defaults.
    pub fn parse(
        name: &str,
        pairs: &[(String, String)],
        globals: &HashMap<String, String>,
    ) -> Result<Self> {
        let raw: RawFields = fields::load_known_fields(name, pairs, globals)?;

        let mut enc_type = raw.get(Field::Encryption).trim().to_string();
        fix_enc_type(&mut enc_type);

        let beta = raw.number(Field::Beta)?;

        validate_enc_type(&enc_type, name)?;

        let lambda = if enc_type.starts_with(names::BRIDGE_MARKER) {
            None
        } else {
            Some(raw.number(Field::Lambda)?)
        };

        tracing::debug!(section = name, enc_type = %enc_type, ?lambda, "parsed modular section");

        Ok(Self {
            name: ModuleName::new(name),
            enc_type,
            lambda,
            beta,
            postfix_p: raw.get(Field::Postfix).to_string(),
            postfix_n: raw.get(Field::Postneg).to_string(),
            poly_modulus_degree: raw.get(Field::PolyModulusDegree).to_string(),
            plaintext_modulus: raw.get(Field::PlaintextModulus).to_string(),
            encoder: raw.get(Field::Encoder).to_string(),
            scale: raw.get(Field::Scale).to_string(),
            primes: raw.get(Field::Primes).to_string(),
            cophee_is_arduino: raw.get(Field::Arduino).to_string(),
            cophee_baud_rate: raw.get(Field::Baud).to_string(),
            plaintext_size: None,
            sk: None,
        })
    }

    /// Build a section from a parsed project block.
    pub fn from_block(block: &SectionBlock, globals: &HashMap<String, String>) -> Result<Self> {
        if block.kind != names::TYPE_MODULAR {
            return Err(ModsecError::Config(format!(
                "section {} has type '{}', expected '{}'",
                block.name,
                block.kind,
                names::TYPE_MODULAR
            )));
        }
        Self::parse(&block.name, &block.pairs, globals)
    }

    /// Materialize this section's key.
    ///
    /// Runs once per section. Direct schemes construct their key;
    /// bridged schemes adapt the raw key of the linked module, which must
    /// already be published to `bridge`.
    pub fn gen_keys(&mut self, options: &KeyGenOptions, bridge: &dyn Bridge) -> Result<()> {
        if self.sk.is_some() {
            return Err(ModsecError::Invariant(format!(
                "keys for {} were already generated",
                self.name.typ
            )));
        }

        let seed = match &options.seed {
            Some(s) => format!("{}{s}", self.name.typ),
            None => String::new(),
        };
        let request = KeyRequest {
            owner: &self.name.typ,
            force_generate: options.force_generate,
            force_load: options.force_load,
            seed: &seed,
            key_dir: &options.key_dir,
        };

        let key = if let Some(requested) = self.bridge_request() {
            self.bridge_key(requested, bridge)?
        } else if let Some(params) = self.direct_params()? {
            SchemeKey::construct(&request, params)?
        } else {
            return Err(ModsecError::Config(format!(
                "bad encryption type [{}] in {}",
                self.enc_type, self.name.typ
            )));
        };

        // Largest constant size defaults to lambda - 1.
        if self.plaintext_size.is_none() {
            self.plaintext_size = Some(key.lambda().saturating_sub(1));
        }

        tracing::info!(
            section = %self.name.typ,
            scheme = %key.scheme(),
            slots = key.slots(),
            bridged = self.is_bridged(),
            "key ready"
        );
        self.sk = Some(key);
        Ok(())
    }

    /// Requested scheme text after the bridge marker, if bridged.
    fn bridge_request(&self) -> Option<&str> {
        self.enc_type.strip_prefix(names::BRIDGE_MARKER)
    }

    fn bridge_key(&self, requested: &str, bridge: &dyn Bridge) -> Result<SchemeKey> {
        let unsupported = || {
            ModsecError::Config(format!(
                "bridge is not supported for type [{requested}] in {}",
                self.name.typ
            ))
        };
        let scheme = Scheme::from_name(requested).ok_or_else(unsupported)?;
        if bridge_family(scheme).is_none() {
            return Err(unsupported());
        }

        let raw = bridge.raw_key(&self.name.typ).ok_or_else(|| {
            ModsecError::Invariant(format!(
                "bridge target for {} has no materialized key",
                self.name.typ
            ))
        })?;

        raw.adapt(scheme, &self.name.typ)
    }

    /// Constructor parameters for a direct scheme; `None` if the
    /// encryption type is not one.
    fn direct_params(&self) -> Result<Option<SchemeParams>> {
        let Some(scheme) = Scheme::from_name(&self.enc_type) else {
            return Ok(None);
        };
        let lambda = self.lambda.ok_or_else(|| {
            ModsecError::Invariant(format!("lambda missing for {}", self.name.typ))
        })?;

        let params = match scheme {
            Scheme::Pila => SchemeParams::Pila { lambda },
            Scheme::Pail => SchemeParams::Pail { lambda },
            Scheme::Pailg => SchemeParams::Pailg {
                lambda,
                beta: self.beta,
            },
            Scheme::Seal => SchemeParams::Seal {
                lambda,
                bfv: SchemeParams::bfv(
                    &self.poly_modulus_degree,
                    &self.plaintext_modulus,
                    &self.encoder,
                )?,
            },
            Scheme::BfvProt => SchemeParams::BfvProt {
                lambda,
                bfv: SchemeParams::bfv(
                    &self.poly_modulus_degree,
                    &self.plaintext_modulus,
                    &self.encoder,
                )?,
            },
            Scheme::SealCkks => SchemeParams::SealCkks {
                lambda,
                ckks: SchemeParams::ckks(&self.poly_modulus_degree, &self.primes, &self.scale)?,
            },
        };
        Ok(Some(params))
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn name(&self) -> &ModuleName {
        &self.name
    }

    pub fn enc_type(&self) -> &str {
        &self.enc_type
    }

    pub fn is_bridged(&self) -> bool {
        self.enc_type.starts_with(names::BRIDGE_MARKER)
    }

    pub fn lambda(&self) -> Option<u32> {
        self.lambda
    }

    pub fn beta(&self) -> u32 {
        self.beta
    }

    pub fn postfix(&self) -> &str {
        &self.postfix_p
    }

    pub fn postneg(&self) -> &str {
        &self.postfix_n
    }

    pub fn poly_modulus_degree(&self) -> &str {
        &self.poly_modulus_degree
    }

    pub fn plaintext_modulus(&self) -> &str {
        &self.plaintext_modulus
    }

    pub fn encoder(&self) -> &str {
        &self.encoder
    }

    pub fn scale(&self) -> &str {
        &self.scale
    }

    pub fn primes(&self) -> &str {
        &self.primes
    }

    pub fn arduino(&self) -> &str {
        &self.cophee_is_arduino
    }

    pub fn baud_rate(&self) -> &str {
        &self.cophee_baud_rate
    }

    pub fn plaintext_size(&self) -> Option<u32> {
        self.plaintext_size
    }

    /// Fix the plaintext size before keys are generated.
    ///
    /// The size is set once; a second assignment is an invariant fault.
    pub fn set_plaintext_size(&mut self, size: u32) -> Result<()> {
        if self.plaintext_size.is_some() {
            return Err(ModsecError::Invariant(format!(
                "plaintext size of {} is already fixed",
                self.name.typ
            )));
        }
        self.plaintext_size = Some(size);
        Ok(())
    }

    /// The materialized key, once `gen_keys` has run.
    pub fn key(&self) -> Option<&SchemeKey> {
        self.sk.as_ref()
    }
}
