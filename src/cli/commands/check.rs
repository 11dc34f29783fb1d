//! `modsec check` — validate a project file without touching keys.

use std::path::Path;

use crate::bridge::BridgeRegistry;
use crate::cli::commands::check_links;
use crate::cli::{load_sections, output};
use crate::errors::Result;

/// Execute the `check` command.
pub fn execute(config: &str) -> Result<()> {
    let (project, sections) = load_sections(Path::new(config))?;

    let registry = BridgeRegistry::from_config(&project);
    check_links(&sections, &registry)?;
    let names: Vec<&str> = sections.iter().map(|s| s.name().typ.as_str()).collect();
    registry.build_order(&names)?;

    output::print_sections_table(&sections);
    output::success(&format!("{} modular section(s) valid", sections.len()));
    Ok(())
}
