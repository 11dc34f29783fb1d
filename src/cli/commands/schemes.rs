//! `modsec schemes` — list supported encryption schemes.

use crate::cli::output;
use crate::errors::Result;
use crate::names;

/// Execute the `schemes` command.
pub fn execute() -> Result<()> {
    output::print_schemes_table();
    output::tip(&format!(
        "Prefix a scheme with '{}' to borrow the key of a linked section.",
        names::BRIDGE_MARKER
    ));
    output::tip(&format!(
        "'{}' is accepted as a legacy spelling of '{}'.",
        names::ENC_PIL_BASE,
        names::ENC_PILA
    ));
    Ok(())
}
