//! Generated source emission for a modular section.
//!
//! Each artifact is loaded from the `modular` template family, run through
//! the standard naming substitution and then through the arithmetic
//! tokens, whose values may need the section's key to encrypt.

use std::io::Write;
use std::path::Path;

use crate::constants;
use crate::errors::{ModsecError, Result};
use crate::keys::{KeyProvider, SchemeKey};
use crate::names;
use crate::template::{self, NamingTokens, TemplateStore};

use super::ModularSection;

/// `modular.<encType>.h`
pub fn header_template(enc_type: &str) -> String {
    names::dot_h(&format!("{}.{enc_type}", names::DBFILE_MODULAR))
}

/// `modular.<encType><ver>.inc`
pub fn inc_template(enc_type: &str, impl_version: &str) -> String {
    names::dot_inc(&format!("{}.{enc_type}{impl_version}", names::DBFILE_MODULAR))
}

/// `modular.<encType><ver>.cpp`
pub fn cpp_template(enc_type: &str, impl_version: &str) -> String {
    names::dot_cpp(&format!("{}.{enc_type}{impl_version}", names::DBFILE_MODULAR))
}

/// Plaintext vector with `digit` in every lane: `"0_0_0"` for three slots.
pub fn lane_vector(digit: char, slots: usize) -> String {
    vec![digit.to_string(); slots.max(1)].join("_")
}

/// Substitute the arithmetic and device-target tokens.
///
/// Ciphertext tokens are only computed when they occur in `text`; the
/// generator factor is only substituted when the key has one.
pub fn substitute_arith(
    text: &mut String,
    key: &dyn KeyProvider,
    arduino: &str,
    baud: &str,
) -> Result<()> {
    for (token, digit) in [(names::R_ARI_ZERO, '0'), (names::R_ARI_UNIT, '1')] {
        if !text.contains(token) {
            continue;
        }
        let plaintext = lane_vector(digit, key.slots());
        let ciphertext = key.encrypt(&plaintext, 1)?;
        tracing::debug!(token, owner = key.owner(), lanes = key.slots(), "encrypted constant");
        template::replace_all(text, token, &template::long_const(&ciphertext));
    }

    if text.contains(names::R_PAILG_FKF) {
        if let Some(factor) = key.generator_factor()? {
            template::replace_all(text, names::R_PAILG_FKF, &factor);
        }
    }

    template::replace_all(text, names::R_ARDUINO, arduino);
    template::replace_all(text, names::R_BAUD_RATE, baud);
    Ok(())
}

impl ModularSection {
    fn active_key(&self) -> Result<&SchemeKey> {
        self.key().ok_or_else(|| {
            ModsecError::Invariant(format!(
                "{} emitted before its keys were generated",
                self.name().typ
            ))
        })
    }

    /// Naming values for this section and its active key.
    pub fn naming_tokens(&self) -> Result<NamingTokens> {
        let key = self.active_key()?;
        let files = key.key_files();
        Ok(NamingTokens {
            type_name: self.name().typ.clone(),
            file_name: self.name().fil.clone(),
            class_name: format!("Modular{}", key.scheme().camel_case()),
            ct_size: key.lambda(),
            type_id: template::type_id(&self.name().typ),
            modifier: self.postfix().to_string(),
            enc_file: files.public.clone(),
            dec_file: files.private.clone(),
        })
    }

    fn render(&self, store: &dyn TemplateStore, root: &Path, name: &str) -> Result<String> {
        let key = self.active_key()?;
        let mut text = store.load(root, name)?;
        self.naming_tokens()?.apply(&mut text);
        substitute_arith(&mut text, key, self.arduino(), self.baud_rate())?;
        Ok(text)
    }

    /// Emit the header, including `#define`s for every named constant
    /// found in `user_dir`.
    pub fn write_h(
        &self,
        store: &dyn TemplateStore,
        root: &Path,
        user_dir: &Path,
        out: &mut dyn Write,
    ) -> Result<()> {
        let name = header_template(self.enc_type());
        let mut text = self.render(store, root, &name)?;

        let found = constants::find_constants(user_dir, self.postfix(), self.postneg())?;
        let defines = constants::make_defines(&found, &self.name().typ);
        template::replace_all(&mut text, names::R_POSTFIX_DEFINES, &defines);

        out.write_all(text.as_bytes())?;
        tracing::debug!(section = %self.name().typ, template = %name, "header written");
        Ok(())
    }

    /// Emit the declarations file.
    pub fn write_inc(
        &self,
        store: &dyn TemplateStore,
        root: &Path,
        impl_version: &str,
        out: &mut dyn Write,
    ) -> Result<()> {
        let name = inc_template(self.enc_type(), impl_version);
        let text = self.render(store, root, &name)?;
        out.write_all(text.as_bytes())?;
        tracing::debug!(section = %self.name().typ, template = %name, "declarations written");
        Ok(())
    }

    /// Emit the implementation file.
    pub fn write_cpp(
        &self,
        store: &dyn TemplateStore,
        root: &Path,
        impl_version: &str,
        out: &mut dyn Write,
    ) -> Result<()> {
        let name = cpp_template(self.enc_type(), impl_version);
        let text = self.render(store, root, &name)?;
        out.write_all(text.as_bytes())?;
        tracing::debug!(section = %self.name().typ, template = %name, "implementation written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_names_keep_the_bridge_marker() {
        assert_eq!(header_template("pila"), "modular.pila.h");
        assert_eq!(header_template("@pila"), "modular.@pila.h");
        assert_eq!(inc_template("seal", "_v2"), "modular.seal_v2.inc");
        assert_eq!(cpp_template("pail", ""), "modular.pail.cpp");
    }

    #[test]
    fn lane_vector_repeats_per_slot() {
        assert_eq!(lane_vector('0', 3), "0_0_0");
        assert_eq!(lane_vector('1', 1), "1");
        assert_eq!(lane_vector('0', 0), "0");
    }
}
