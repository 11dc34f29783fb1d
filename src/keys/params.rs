//! Per-scheme key parameters.
//!
//! Section parameters arrive as strings; the constructors here turn them
//! into typed values and reject anything the key layer cannot use.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{ModsecError, Result};
use crate::names;

/// Ring dimension used when neither `polyModulusDegree` nor `logn` is set.
pub const DEFAULT_POLY_MODULUS_DEGREE: usize = 4096;

/// Largest accepted ring dimension.
const MAX_POLY_MODULUS_DEGREE: u64 = 1 << 16;

/// Values below this are read as a base-2 logarithm of the degree.
const LOG_DEGREE_LIMIT: u64 = 64;

/// Encoder name that disables slot batching for BFV keys.
const SCALAR_ENCODER: &str = "scalar";

/// The fixed set of supported schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scheme {
    Pila,
    Pail,
    Pailg,
    Seal,
    SealCkks,
    BfvProt,
}

/// Capability families. A bridged key must come from the family the
/// requested scheme expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFamily {
    RingBase,
    Paillier,
    Bfv,
    Ckks,
}

impl Scheme {
    pub const ALL: [Scheme; 6] = [
        Scheme::Pila,
        Scheme::Pail,
        Scheme::Pailg,
        Scheme::Seal,
        Scheme::SealCkks,
        Scheme::BfvProt,
    ];

    /// Identifier as written in configuration and template names.
    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Pila => names::ENC_PILA,
            Scheme::Pail => names::ENC_PAIL,
            Scheme::Pailg => names::ENC_PAILG,
            Scheme::Seal => names::ENC_SEAL,
            Scheme::SealCkks => names::ENC_SEAL_CKKS,
            Scheme::BfvProt => names::ENC_BFV_PROT,
        }
    }

    /// Look up a canonical identifier. Legacy aliases are not accepted here.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == name)
    }

    pub fn family(self) -> KeyFamily {
        match self {
            Scheme::Pila => KeyFamily::RingBase,
            Scheme::Pail | Scheme::Pailg => KeyFamily::Paillier,
            Scheme::Seal | Scheme::BfvProt => KeyFamily::Bfv,
            Scheme::SealCkks => KeyFamily::Ckks,
        }
    }

    /// CamelCase form used in generated class names (`seal_ckks` -> `SealCkks`).
    pub fn camel_case(self) -> String {
        self.as_str()
            .split('_')
            .map(|part| {
                let mut chars = part.chars();
                match chars.next() {
                    Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                    None => String::new(),
                }
            })
            .collect()
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lattice parameters shared by the BFV-style schemes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BfvParams {
    pub poly_modulus_degree: usize,
    pub plaintext_modulus: String,
    pub encoder: String,
}

/// Lattice parameters for the CKKS scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CkksParams {
    pub poly_modulus_degree: usize,
    pub primes: String,
    pub scale: String,
}

/// Typed constructor parameters, one variant per scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemeParams {
    Pila { lambda: u32 },
    Pail { lambda: u32 },
    Pailg { lambda: u32, beta: u32 },
    Seal { lambda: u32, bfv: BfvParams },
    BfvProt { lambda: u32, bfv: BfvParams },
    SealCkks { lambda: u32, ckks: CkksParams },
}

/// Parse a ring dimension given either as a degree or as its logarithm.
pub fn parse_poly_modulus_degree(text: &str) -> Result<usize> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(DEFAULT_POLY_MODULUS_DEGREE);
    }

    let value: u64 = text.parse().map_err(|_| {
        ModsecError::Config(format!(
            "polyModulusDegree must be an integer, got '{text}'"
        ))
    })?;

    let degree = if value < LOG_DEGREE_LIMIT {
        1u64 << value
    } else {
        value
    };

    if degree < 2 || !degree.is_power_of_two() || degree > MAX_POLY_MODULUS_DEGREE {
        return Err(ModsecError::Config(format!(
            "polyModulusDegree '{text}' does not give a power of two between 2 and {MAX_POLY_MODULUS_DEGREE}"
        )));
    }

    Ok(degree as usize)
}

impl SchemeParams {
    pub fn bfv(
        poly_modulus_degree: &str,
        plaintext_modulus: &str,
        encoder: &str,
    ) -> Result<BfvParams> {
        Ok(BfvParams {
            poly_modulus_degree: parse_poly_modulus_degree(poly_modulus_degree)?,
            plaintext_modulus: plaintext_modulus.to_string(),
            encoder: encoder.to_string(),
        })
    }

    pub fn ckks(poly_modulus_degree: &str, primes: &str, scale: &str) -> Result<CkksParams> {
        Ok(CkksParams {
            poly_modulus_degree: parse_poly_modulus_degree(poly_modulus_degree)?,
            primes: primes.to_string(),
            scale: scale.to_string(),
        })
    }

    pub fn scheme(&self) -> Scheme {
        match self {
            SchemeParams::Pila { .. } => Scheme::Pila,
            SchemeParams::Pail { .. } => Scheme::Pail,
            SchemeParams::Pailg { .. } => Scheme::Pailg,
            SchemeParams::Seal { .. } => Scheme::Seal,
            SchemeParams::BfvProt { .. } => Scheme::BfvProt,
            SchemeParams::SealCkks { .. } => Scheme::SealCkks,
        }
    }

    pub fn lambda(&self) -> u32 {
        match *self {
            SchemeParams::Pila { lambda }
            | SchemeParams::Pail { lambda }
            | SchemeParams::Pailg { lambda, .. }
            | SchemeParams::Seal { lambda, .. }
            | SchemeParams::BfvProt { lambda, .. }
            | SchemeParams::SealCkks { lambda, .. } => lambda,
        }
    }

    /// Number of plaintext lanes a key with these parameters packs.
    pub fn slots(&self) -> usize {
        match self {
            SchemeParams::Pila { .. } | SchemeParams::Pail { .. } | SchemeParams::Pailg { .. } => 1,
            SchemeParams::Seal { bfv, .. } | SchemeParams::BfvProt { bfv, .. } => {
                if bfv.encoder == SCALAR_ENCODER {
                    1
                } else {
                    bfv.poly_modulus_degree
                }
            }
            SchemeParams::SealCkks { ckks, .. } => ckks.poly_modulus_degree / 2,
        }
    }

    /// Stable description, bound into seeded key derivation and stored
    /// next to persisted key material.
    pub fn descriptor(&self) -> String {
        match self {
            SchemeParams::Pila { lambda } | SchemeParams::Pail { lambda } => {
                format!("{}:l={lambda}", self.scheme())
            }
            SchemeParams::Pailg { lambda, beta } => {
                format!("{}:l={lambda}:b={beta}", self.scheme())
            }
            SchemeParams::Seal { lambda, bfv } | SchemeParams::BfvProt { lambda, bfv } => format!(
                "{}:l={lambda}:n={}:t={}:e={}",
                self.scheme(),
                bfv.poly_modulus_degree,
                bfv.plaintext_modulus,
                bfv.encoder
            ),
            SchemeParams::SealCkks { lambda, ckks } => format!(
                "{}:l={lambda}:n={}:p={}:s={}",
                self.scheme(),
                ckks.poly_modulus_degree,
                ckks.primes,
                ckks.scale
            ),
        }
    }

    /// Re-express these parameters as the `requested` scheme.
    ///
    /// Only conversions inside one capability family exist; anything else
    /// returns `None`.
    pub fn convert(&self, requested: Scheme) -> Option<SchemeParams> {
        match (requested, self) {
            (Scheme::Pila, SchemeParams::Pila { lambda }) => {
                Some(SchemeParams::Pila { lambda: *lambda })
            }
            (Scheme::Seal, SchemeParams::Seal { lambda, bfv })
            | (Scheme::Seal, SchemeParams::BfvProt { lambda, bfv }) => Some(SchemeParams::Seal {
                lambda: *lambda,
                bfv: bfv.clone(),
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_names_round_trip() {
        for s in Scheme::ALL {
            assert_eq!(Scheme::from_name(s.as_str()), Some(s));
        }
        assert_eq!(Scheme::from_name("pil"), None);
        assert_eq!(Scheme::from_name("@pila"), None);
    }

    #[test]
    fn camel_case_names() {
        assert_eq!(Scheme::SealCkks.camel_case(), "SealCkks");
        assert_eq!(Scheme::BfvProt.camel_case(), "BfvProt");
        assert_eq!(Scheme::Pila.camel_case(), "Pila");
    }

    #[test]
    fn degree_accepts_log_and_plain_forms() {
        assert_eq!(parse_poly_modulus_degree("").unwrap(), 4096);
        assert_eq!(parse_poly_modulus_degree("13").unwrap(), 8192);
        assert_eq!(parse_poly_modulus_degree("8192").unwrap(), 8192);
        assert_eq!(parse_poly_modulus_degree(" 2 ").unwrap(), 4);
    }

    #[test]
    fn degree_rejects_bad_values() {
        assert!(parse_poly_modulus_degree("abc").is_err());
        assert!(parse_poly_modulus_degree("0").is_err());
        assert!(parse_poly_modulus_degree("100").is_err());
        assert!(parse_poly_modulus_degree("40").is_err());
    }

    #[test]
    fn slot_counts_follow_scheme() {
        let bfv = SchemeParams::bfv("3", "65537", "").unwrap();
        assert_eq!(SchemeParams::Seal { lambda: 2, bfv: bfv.clone() }.slots(), 8);

        let scalar = BfvParams {
            encoder: "scalar".into(),
            ..bfv
        };
        assert_eq!(SchemeParams::BfvProt { lambda: 2, bfv: scalar }.slots(), 1);

        let ckks = SchemeParams::ckks("4", "60 40", "40").unwrap();
        assert_eq!(SchemeParams::SealCkks { lambda: 2, ckks }.slots(), 8);

        assert_eq!(SchemeParams::Pailg { lambda: 2, beta: 3 }.slots(), 1);
    }

    #[test]
    fn conversion_stays_inside_family() {
        let bfv = SchemeParams::bfv("3", "17", "").unwrap();
        let prot = SchemeParams::BfvProt { lambda: 4, bfv: bfv.clone() };
        assert_eq!(
            prot.convert(Scheme::Seal),
            Some(SchemeParams::Seal { lambda: 4, bfv })
        );
        assert_eq!(prot.convert(Scheme::Pila), None);
        assert_eq!(SchemeParams::Pail { lambda: 4 }.convert(Scheme::Pila), None);
        assert_eq!(
            SchemeParams::Pila { lambda: 4 }.convert(Scheme::Pila),
            Some(SchemeParams::Pila { lambda: 4 })
        );
    }
}
