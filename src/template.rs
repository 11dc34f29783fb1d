//! Template loading and generic token substitution.

use std::fs;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::errors::{ModsecError, Result};
use crate::names;

/// Source of template text.
pub trait TemplateStore {
    /// Load the template `name` under `root`.
    fn load(&self, root: &Path, name: &str) -> Result<String>;
}

/// Reads templates from `<root>/<name>` on disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsTemplateStore;

impl TemplateStore for FsTemplateStore {
    fn load(&self, root: &Path, name: &str) -> Result<String> {
        let path = root.join(name);
        fs::read_to_string(&path).map_err(|e| {
            ModsecError::Template(format!("cannot load template {}: {e}", path.display()))
        })
    }
}

/// Replace every occurrence of `token` in `text`.
pub fn replace_all(text: &mut String, token: &str, value: &str) {
    if text.contains(token) {
        *text = text.replace(token, value);
    }
}

/// Naming values substituted into every template of a section.
#[derive(Debug, Clone)]
pub struct NamingTokens {
    pub type_name: String,
    pub file_name: String,
    pub class_name: String,
    pub ct_size: u32,
    pub type_id: String,
    pub modifier: String,
    pub enc_file: String,
    pub dec_file: String,
}

impl NamingTokens {
    /// Apply the naming substitutions. `$BitZero`/`$BitUnit` belong to
    /// other section types and are left alone.
    pub fn apply(&self, text: &mut String) {
        replace_all(text, names::R_TYP_NAME, &self.type_name);
        replace_all(text, names::R_FIL_NAME, &self.file_name);
        replace_all(text, names::R_CLS_NAME, &self.class_name);
        replace_all(text, names::R_CT_SIZE, &self.ct_size.to_string());
        replace_all(text, names::R_TID, &self.type_id);
        replace_all(text, names::R_MODIFIER, &self.modifier);
        replace_all(text, names::R_ENC, &self.enc_file);
        replace_all(text, names::R_DEC, &self.dec_file);
    }
}

/// Short stable identifier for a type name: 8 hex chars of its SHA-256.
pub fn type_id(type_name: &str) -> String {
    let digest = Sha256::digest(type_name.as_bytes());
    hex::encode(&digest[..4])
}

/// Quote text as a C string literal.
pub fn long_const(text: &str) -> String {
    format!("\"{text}\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tokens() -> NamingTokens {
        NamingTokens {
            type_name: "SecureInt".into(),
            file_name: "secureint".into(),
            class_name: "ModularPila".into(),
            ct_size: 16,
            type_id: type_id("SecureInt"),
            modifier: "Ep".into(),
            enc_file: "SecureInt.pila.pub.json".into(),
            dec_file: "SecureInt.pila.priv.key".into(),
        }
    }

    #[test]
    fn replace_all_handles_repeats_and_absence() {
        let mut s = "a $X b $X".to_string();
        replace_all(&mut s, "$X", "1");
        assert_eq!(s, "a 1 b 1");
        replace_all(&mut s, "$Y", "2");
        assert_eq!(s, "a 1 b 1");
    }

    #[test]
    fn naming_tokens_are_substituted() {
        let mut s = "class $Clsencname_$Name; // $Filencname $CtSize $Modifier $enc $dec"
            .to_string();
        tokens().apply(&mut s);
        assert_eq!(
            s,
            "class ModularPila_SecureInt; // secureint 16 Ep SecureInt.pila.pub.json SecureInt.pila.priv.key"
        );
    }

    #[test]
    fn bit_tokens_are_left_for_other_sections() {
        let mut s = "$BitZero $BitUnit".to_string();
        tokens().apply(&mut s);
        assert_eq!(s, "$BitZero $BitUnit");
    }

    #[test]
    fn type_id_is_stable_and_short() {
        assert_eq!(type_id("SecureInt"), type_id("SecureInt"));
        assert_eq!(type_id("SecureInt").len(), 8);
        assert_ne!(type_id("SecureInt"), type_id("SecureMod"));
    }

    #[test]
    fn fs_store_reads_and_reports_missing() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("modular.pila.h"), "hello").unwrap();
        let store = FsTemplateStore;
        assert_eq!(store.load(dir.path(), "modular.pila.h").unwrap(), "hello");
        let err = store.load(dir.path(), "modular.pail.h").unwrap_err();
        assert!(matches!(err, ModsecError::Template(_)));
    }
}
