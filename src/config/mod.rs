//! Configuration: toolchain settings (`.modsec.toml`) and the project
//! configuration stream.

pub mod settings;
pub mod stream;

pub use settings::Settings;
pub use stream::{ProjectConfig, SectionBlock};
