//! Named constant discovery.
//!
//! User code refers to encrypted constants by symbols such as `_5_Ep`
//! (value 5 with postfix `Ep`) or `_5_En` (value -5 with postneg `En`).
//! The header of a section defines every such symbol it finds in the
//! user directory.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use regex::Regex;

use crate::errors::{ModsecError, Result};

/// Symbol -> signed decimal value, sorted by symbol.
pub type Constants = BTreeMap<String, String>;

fn symbol_pattern(postfix: &str) -> Result<Regex> {
    let pattern = format!(r"\b_(\d+)_{}\b", regex::escape(postfix));
    Regex::new(&pattern)
        .map_err(|e| ModsecError::Config(format!("bad postfix '{postfix}': {e}")))
}

/// Collect constants from the text of one file.
pub fn scan_text(text: &str, postfix: &str, postneg: &str, out: &mut Constants) -> Result<()> {
    if !postfix.is_empty() {
        let re = symbol_pattern(postfix)?;
        for cap in re.captures_iter(text) {
            out.insert(cap[0].to_string(), normalise(&cap[1], false));
        }
    }
    if !postneg.is_empty() {
        let re = symbol_pattern(postneg)?;
        for cap in re.captures_iter(text) {
            out.insert(cap[0].to_string(), normalise(&cap[1], true));
        }
    }
    Ok(())
}

/// Strip leading zeros and apply the sign.
fn normalise(digits: &str, negative: bool) -> String {
    let trimmed = digits.trim_start_matches('0');
    let magnitude = if trimmed.is_empty() { "0" } else { trimmed };
    if negative && magnitude != "0" {
        format!("-{magnitude}")
    } else {
        magnitude.to_string()
    }
}

/// Scan the regular files directly inside `user_dir`.
///
/// A missing directory yields no constants; unreadable (e.g. binary)
/// files are skipped.
pub fn find_constants(user_dir: &Path, postfix: &str, postneg: &str) -> Result<Constants> {
    let mut found = Constants::new();
    if !user_dir.is_dir() {
        tracing::debug!(dir = %user_dir.display(), "no user directory, no constants");
        return Ok(found);
    }

    let mut entries: Vec<_> = fs::read_dir(user_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    entries.sort();

    for path in entries {
        match fs::read_to_string(&path) {
            Ok(text) => scan_text(&text, postfix, postneg, &mut found)?,
            Err(e) => tracing::debug!(file = %path.display(), error = %e, "skipping file"),
        }
    }

    tracing::debug!(count = found.len(), "constants discovered");
    Ok(found)
}

/// Render one `#define` per constant.
pub fn make_defines(constants: &Constants, type_name: &str) -> String {
    constants
        .iter()
        .map(|(symbol, value)| format!("#define {symbol} {type_name}(\"{value}\")\n"))
        .collect()
}
