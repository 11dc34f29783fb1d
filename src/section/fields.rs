//! Declarative table of the parameters a modular section accepts.
//!
//! Every accepted configuration key maps to one target field. Two keys
//! may share a field (historical aliases). Numeric fields carry their
//! default and lower bound so one routine can parse all of them.

use std::collections::{BTreeMap, HashMap};

use crate::errors::{ModsecError, Result};
use crate::names;

/// Target fields of a modular section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Encryption,
    Postfix,
    Postneg,
    PolyModulusDegree,
    PlaintextModulus,
    Encoder,
    Scale,
    Primes,
    Lambda,
    Beta,
    Arduino,
    Baud,
}

/// How a field's text is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Kept verbatim.
    Text,
    /// Unsigned integer; empty text means `default`.
    Number { default: u32, min: u32 },
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub key: &'static str,
    pub field: Field,
    pub kind: FieldKind,
}

const fn text(key: &'static str, field: Field) -> FieldSpec {
    FieldSpec {
        key,
        field,
        kind: FieldKind::Text,
    }
}

const fn number(key: &'static str, field: Field, default: u32, min: u32) -> FieldSpec {
    FieldSpec {
        key,
        field,
        kind: FieldKind::Number { default, min },
    }
}

/// Lambda used when none is configured.
pub const DEFAULT_LAMBDA: u32 = 2;

/// Every parameter a modular section understands.
pub static FIELD_TABLE: [FieldSpec; 14] = [
    text(names::KEY_ENCRYPTION, Field::Encryption),
    text(names::KEY_POSTFIX, Field::Postfix),
    text(names::KEY_POSTNEG, Field::Postneg),
    text(names::KEY_POLY_MODULUS_DEGREE, Field::PolyModulusDegree),
    text(names::KEY_LOGN, Field::PolyModulusDegree),
    text(names::KEY_PLAINTEXT_MODULUS, Field::PlaintextModulus),
    text(names::KEY_T, Field::PlaintextModulus),
    text(names::KEY_ENCODER, Field::Encoder),
    text(names::KEY_SCALE, Field::Scale),
    text(names::KEY_PRIMES, Field::Primes),
    number(names::KEY_LAMBDA, Field::Lambda, DEFAULT_LAMBDA, 1),
    number(names::KEY_BETA, Field::Beta, 0, 0),
    text(names::KEY_ARDUINO, Field::Arduino),
    text(names::KEY_BAUD, Field::Baud),
];

fn spec_for_key(key: &str) -> Option<&'static FieldSpec> {
    FIELD_TABLE.iter().find(|s| s.key == key)
}

fn spec_for_field(field: Field) -> Option<&'static FieldSpec> {
    FIELD_TABLE.iter().find(|s| s.field == field)
}

/// Raw text of every field after stream and global values are merged.
#[derive(Debug, Clone, Default)]
pub struct RawFields {
    values: BTreeMap<Field, String>,
}

impl RawFields {
    /// Text of a field; unset fields read as empty.
    pub fn get(&self, field: Field) -> &str {
        self.values.get(&field).map(String::as_str).unwrap_or("")
    }

    fn set(&mut self, field: Field, value: &str) {
        self.values.insert(field, value.to_string());
    }

    /// Parse a numeric field, applying its default and lower bound.
    pub fn number(&self, field: Field) -> Result<u32> {
        let spec = spec_for_field(field).ok_or_else(|| {
            ModsecError::Invariant(format!("no parameter table entry for {field:?}"))
        })?;
        let (default, min) = match spec.kind {
            FieldKind::Number { default, min } => (default, min),
            FieldKind::Text => {
                return Err(ModsecError::Invariant(format!(
                    "parameter {} is not numeric",
                    spec.key
                )))
            }
        };

        let text = self.get(field).trim();
        if text.is_empty() {
            return Ok(default);
        }

        let value: u32 = text.parse().map_err(|_| {
            ModsecError::Config(format!(
                "{} must be a non-negative integer, got '{text}'",
                spec.key
            ))
        })?;
        if value < min {
            return Err(ModsecError::Config(format!(
                "{} must be at least {min}, got {value}",
                spec.key
            )));
        }
        Ok(value)
    }
}

/// Load every known parameter for section `name`.
///
/// Stream pairs are applied in order (later ones win, also across alias
/// keys). Fields still empty afterwards are filled from `globals`;
/// globals never override stream values. Unknown stream keys are
/// configuration errors; unknown global keys are ignored.
pub fn load_known_fields(
    name: &str,
    pairs: &[(String, String)],
    globals: &HashMap<String, String>,
) -> Result<RawFields> {
    let mut raw = RawFields::default();

    for (key, value) in pairs {
        let spec = spec_for_key(key).ok_or_else(|| {
            ModsecError::Config(format!("unknown parameter '{key}' in section {name}"))
        })?;
        raw.set(spec.field, value);
    }

    for spec in &FIELD_TABLE {
        if !raw.get(spec.field).is_empty() {
            continue;
        }
        if let Some(value) = globals.get(spec.key) {
            if !value.is_empty() {
                raw.set(spec.field, value);
            }
        }
    }

    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn globals(items: &[(&str, &str)]) -> HashMap<String, String> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn stream_values_win_over_globals() {
        let raw = load_known_fields(
            "S",
            &pairs(&[("lambda", "9")]),
            &globals(&[("lambda", "4"), ("beta", "3")]),
        )
        .unwrap();
        assert_eq!(raw.get(Field::Lambda), "9");
        assert_eq!(raw.get(Field::Beta), "3");
    }

    #[test]
    fn aliases_share_one_field_and_last_wins() {
        let raw = load_known_fields(
            "S",
            &pairs(&[("polyModulusDegree", "8192"), ("logn", "12"), ("t", "17")]),
            &HashMap::new(),
        )
        .unwrap();
        assert_eq!(raw.get(Field::PolyModulusDegree), "12");
        assert_eq!(raw.get(Field::PlaintextModulus), "17");
    }

    #[test]
    fn global_alias_fills_empty_field() {
        let raw = load_known_fields("S", &[], &globals(&[("logn", "13")])).unwrap();
        assert_eq!(raw.get(Field::PolyModulusDegree), "13");
    }

    #[test]
    fn unknown_stream_key_is_rejected() {
        let err = load_known_fields("S", &pairs(&[("colour", "red")]), &HashMap::new())
            .unwrap_err();
        assert!(err.to_string().contains("colour"));
        assert!(err.to_string().contains("S"));
    }

    #[test]
    fn unknown_global_is_ignored() {
        assert!(load_known_fields("S", &[], &globals(&[("colour", "red")])).is_ok());
    }

    #[test]
    fn numbers_default_and_validate() {
        let raw = RawFields::default();
        assert_eq!(raw.number(Field::Lambda).unwrap(), DEFAULT_LAMBDA);
        assert_eq!(raw.number(Field::Beta).unwrap(), 0);

        let raw = load_known_fields("S", &pairs(&[("lambda", "0")]), &HashMap::new()).unwrap();
        assert!(raw.number(Field::Lambda).is_err());

        let raw = load_known_fields("S", &pairs(&[("beta", "x")]), &HashMap::new()).unwrap();
        assert!(raw.number(Field::Beta).is_err());

        assert!(RawFields::default().number(Field::Encoder).is_err());
    }

    #[test]
    fn every_field_has_a_table_entry() {
        let all = [
            Field::Encryption,
            Field::Postfix,
            Field::Postneg,
            Field::PolyModulusDegree,
            Field::PlaintextModulus,
            Field::Encoder,
            Field::Scale,
            Field::Primes,
            Field::Lambda,
            Field::Beta,
            Field::Arduino,
            Field::Baud,
        ];
        for field in all {
            let spec = spec_for_field(field);
            assert!(spec.is_some(), "{field:?} missing from FIELD_TABLE");
            assert_eq!(spec.unwrap().field, field);
        }
    }

    #[test]
    fn text_field_read_as_number_names_its_own_key() {
        let err = RawFields::default().number(Field::Postneg).unwrap_err();
        assert!(matches!(err, ModsecError::Invariant(_)));
        assert!(err.to_string().contains("postneg"));
        assert!(!err.to_string().contains("encryption"));
    }
}
