//! Fixed vocabulary shared by the parser, the key layer and the emitter.
//!
//! - Scheme identifiers and the bridge marker
//! - Configuration parameter names
//! - Template placeholder tokens
//! - Template family file names

// ---------------------------------------------------------------------------
// Schemes
// ---------------------------------------------------------------------------

/// Legacy spelling of the ring-base scheme, rewritten to [`ENC_PILA`].
pub const ENC_PIL_BASE: &str = "pil";
/// Ring-base scheme.
pub const ENC_PILA: &str = "pila";
/// Classic Paillier.
pub const ENC_PAIL: &str = "pail";
/// Paillier with generator exponent.
pub const ENC_PAILG: &str = "pailg";
/// Lattice scheme, BFV encoding.
pub const ENC_SEAL: &str = "seal";
/// Lattice scheme, CKKS encoding.
pub const ENC_SEAL_CKKS: &str = "seal_ckks";
/// Lattice scheme behind a protocol wrapper.
pub const ENC_BFV_PROT: &str = "bfv_prot";

/// Leading character of an `encryption` value that borrows a key.
pub const BRIDGE_MARKER: char = '@';

/// Scheme names accepted by the parser, in the order they are reported.
///
/// The ring-base entry is listed twice; error messages keep that listing.
pub const VALID_SCHEMES: [&str; 7] = [
    ENC_PILA,
    ENC_PILA,
    ENC_PAIL,
    ENC_PAILG,
    ENC_SEAL,
    ENC_SEAL_CKKS,
    ENC_BFV_PROT,
];

// ---------------------------------------------------------------------------
// Configuration keys
// ---------------------------------------------------------------------------

pub const KEY_ENCRYPTION: &str = "encryption";
pub const KEY_POSTFIX: &str = "postfix";
pub const KEY_POSTNEG: &str = "postneg";
pub const KEY_POLY_MODULUS_DEGREE: &str = "polyModulusDegree";
pub const KEY_LOGN: &str = "logn";
pub const KEY_PLAINTEXT_MODULUS: &str = "plaintextModulus";
pub const KEY_T: &str = "t";
pub const KEY_ENCODER: &str = "encoder";
pub const KEY_SCALE: &str = "scale";
pub const KEY_PRIMES: &str = "primes";
pub const KEY_LAMBDA: &str = "lambda";
pub const KEY_BETA: &str = "beta";
pub const KEY_ARDUINO: &str = "arduino";
pub const KEY_BAUD: &str = "baud";

/// Section type handled by this crate.
pub const TYPE_MODULAR: &str = "modular";
/// Section type declaring bridge links.
pub const TYPE_BRIDGE: &str = "bridge";

// ---------------------------------------------------------------------------
// Template tokens
// ---------------------------------------------------------------------------

pub const R_TYP_NAME: &str = "$Name";
pub const R_FIL_NAME: &str = "$Filencname";
pub const R_CLS_NAME: &str = "$Clsencname";
pub const R_POSTFIX_DEFINES: &str = "$PostfixDefines";
pub const R_BIT_ZERO: &str = "$BitZero";
pub const R_BIT_UNIT: &str = "$BitUnit";
pub const R_CT_SIZE: &str = "$CtSize";
pub const R_DEC: &str = "$dec";
pub const R_ENC: &str = "$enc";
pub const R_TID: &str = "$tid";
pub const R_MODIFIER: &str = "$Modifier";
pub const R_ARI_ZERO: &str = "$ArithZero";
pub const R_ARI_UNIT: &str = "$ArithUnit";
pub const R_PAILG_FKF: &str = "$Pailgfkf";
pub const R_ARDUINO: &str = "$Cophee_isUsingArduino";
pub const R_BAUD_RATE: &str = "$Cophee_baudRate";

// ---------------------------------------------------------------------------
// Template family
// ---------------------------------------------------------------------------

/// Template family name for modular sections.
pub const DBFILE_MODULAR: &str = "modular";

pub fn dot_h(stem: &str) -> String {
    format!("{stem}.h")
}

pub fn dot_inc(stem: &str) -> String {
    format!("{stem}.inc")
}

pub fn dot_cpp(stem: &str) -> String {
    format!("{stem}.cpp")
}
