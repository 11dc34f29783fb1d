pub mod bridge;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;
pub mod keys;
pub mod logging;
pub mod names;
pub mod section;
pub mod template;
