//! CLI module: Clap argument parser, output helpers, and command implementations.

pub mod commands;
pub mod output;

use std::path::{Path, PathBuf};

use clap::Parser;

use crate::config::{ProjectConfig, Settings};
use crate::errors::{ErrorKind, ModsecError, Result};
use crate::section::ModularSection;

/// modsec: modular security section generator.
#[derive(Parser)]
#[command(
    name = "modsec",
    about = "Build keys and generated sources for modular security sections",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Show debug diagnostics on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only report errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Directory holding .modsec.toml (default: current directory)
    #[arg(long, global = true, env = "MODSEC_SETTINGS")]
    pub settings: Option<String>,
}

/// All available subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Generate keys and sources for the modular sections of a project file
    Generate {
        /// Project configuration file
        config: String,

        /// Only build these sections (repeatable; bridge targets are added)
        #[arg(short, long = "section")]
        sections: Vec<String>,

        /// Output directory for generated sources
        #[arg(short, long)]
        out: Option<String>,

        /// Template root directory
        #[arg(long)]
        root: Option<String>,

        /// Key directory
        #[arg(long)]
        key_dir: Option<String>,

        /// Directory scanned for named constants
        #[arg(long)]
        user_dir: Option<String>,

        /// Derive key material from this seed instead of OS randomness
        #[arg(long, env = "MODSEC_SEED")]
        seed: Option<String>,

        /// Always create fresh keys, overwriting stored ones
        #[arg(long, conflicts_with = "force_load")]
        force_generate: bool,

        /// Require stored keys; never generate
        #[arg(long)]
        force_load: bool,
    },

    /// Parse and validate every modular section of a project file
    Check {
        /// Project configuration file
        config: String,
    },

    /// List supported encryption schemes
    Schemes,
}

// ---------------------------------------------------------------------------
// Shared helpers used by multiple commands
// ---------------------------------------------------------------------------

/// Directory the settings file is read from and relative paths resolve
/// against.
pub fn project_dir(cli: &Cli) -> Result<PathBuf> {
    match &cli.settings {
        Some(dir) => Ok(PathBuf::from(dir)),
        None => Ok(std::env::current_dir()?),
    }
}

/// Load `.modsec.toml` for this invocation.
pub fn load_settings(cli: &Cli) -> Result<(PathBuf, Settings)> {
    let dir = project_dir(cli)?;
    let settings = Settings::load(&dir)?;
    Ok((dir, settings))
}

/// Load a project file and parse all of its modular sections.
pub fn load_sections(config: &Path) -> Result<(ProjectConfig, Vec<ModularSection>)> {
    let project = ProjectConfig::load(config)?;
    let sections = project
        .modular_sections()
        .map(|block| ModularSection::from_block(block, project.globals()))
        .collect::<Result<Vec<_>>>()?;
    Ok((project, sections))
}

/// Process exit code for an error.
pub fn exit_code(err: &ModsecError) -> i32 {
    match err {
        ModsecError::CommandFailed(_) => 1,
        other => match other.kind() {
            ErrorKind::Configuration => 78,
            ErrorKind::InternalInvariant => 70,
            ErrorKind::Environment => 74,
        },
    }
}
