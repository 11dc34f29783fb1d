//! Colored terminal output helpers.
//!
//! All user-facing output goes through these functions so we get
//! consistent styling across every command.

use comfy_table::{ContentArrangement, Table};
use console::style;

use crate::keys::{KeyProvider, Scheme};
use crate::section::ModularSection;

/// Print a green success message: "check_mark {msg}"
pub fn success(msg: &str) {
    println!("{} {}", style("\u{2713}").green().bold(), msg);
}

/// Print a red error message: "x_mark {msg}"
pub fn error(msg: &str) {
    eprintln!("{} {}", style("\u{2717}").red().bold(), msg);
}

/// Print a yellow warning: "warning_sign {msg}"
pub fn warning(msg: &str) {
    eprintln!("{} {}", style("\u{26a0}").yellow().bold(), msg);
}

/// Print a blue info message: "info_sign {msg}"
pub fn info(msg: &str) {
    println!("{} {}", style("\u{2139}").blue().bold(), msg);
}

/// Print a dim tip/hint: "arrow {msg}"
pub fn tip(msg: &str) {
    println!("{} {}", style("\u{2192}").dim(), style(msg).dim());
}

fn or_dash(value: &str) -> String {
    if value.is_empty() {
        "-".to_string()
    } else {
        value.to_string()
    }
}

/// Print one row per section (Section, Encryption, Lambda, Postfix, Key).
///
/// The key column shows the fingerprint once keys have been generated.
pub fn print_sections_table(sections: &[ModularSection]) {
    if sections.is_empty() {
        info("No modular sections in this project.");
        tip("Declare one with `Name : modular { encryption = pila }`.");
        return;
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Section", "Encryption", "Lambda", "Postfix", "Key"]);

    for s in sections {
        let lambda = match (s.lambda(), s.key()) {
            (_, Some(key)) => key.lambda().to_string(),
            (Some(lambda), None) => lambda.to_string(),
            (None, None) => "bridged".to_string(),
        };
        let key = s
            .key()
            .map(|k| k.fingerprint())
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            s.name().typ.clone(),
            s.enc_type().to_string(),
            lambda,
            or_dash(s.postfix()),
            key,
        ]);
    }

    println!("{table}");
}

/// Print the supported schemes (Scheme, Family, Class, Bridgeable).
pub fn print_schemes_table() {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Scheme", "Family", "Class", "Bridgeable"]);

    for scheme in Scheme::ALL {
        let bridgeable = if crate::keys::bridge_family(scheme).is_some() {
            style("yes").green().to_string()
        } else {
            style("no").dim().to_string()
        };
        table.add_row(vec![
            scheme.as_str().to_string(),
            format!("{:?}", scheme.family()),
            format!("Modular{}", scheme.camel_case()),
            bridgeable,
        ]);
    }

    println!("{table}");
}
