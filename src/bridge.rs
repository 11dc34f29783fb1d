//! Key bridging between sections.
//!
//! A section whose `encryption` starts with `@` does not build its own
//! key; it borrows the material of the module it is linked to. Links are
//! declared in `bridge` blocks of the project configuration, and keys are
//! published to the registry as sections finish `gen_keys`.

use std::collections::{BTreeMap, HashMap};

use crate::config::ProjectConfig;
use crate::errors::{ModsecError, Result};
use crate::keys::SchemeKey;

/// Resolves the raw key a bridging module borrows.
pub trait Bridge {
    /// Raw key of the module `module` is linked to, if it has been
    /// materialized.
    fn raw_key(&self, module: &str) -> Option<&SchemeKey>;
}

/// Bridge links plus the keys published so far.
#[derive(Debug, Default)]
pub struct BridgeRegistry {
    links: BTreeMap<String, String>,
    keys: HashMap<String, SchemeKey>,
}

impl BridgeRegistry {
    pub fn new(links: BTreeMap<String, String>) -> Self {
        Self {
            links,
            keys: HashMap::new(),
        }
    }

    /// Registry seeded with the links declared in a project configuration.
    pub fn from_config(config: &ProjectConfig) -> Self {
        Self::new(config.bridge_links())
    }

    /// Declare that `module` borrows the key of `target`.
    pub fn link(&mut self, module: &str, target: &str) {
        self.links.insert(module.to_string(), target.to_string());
    }

    /// Module that `module` is linked to.
    pub fn target_of(&self, module: &str) -> Option<&str> {
        self.links.get(module).map(String::as_str)
    }

    /// Record the key materialized for `module`.
    ///
    /// Keys are published once; a second publish for the same module is
    /// an invariant fault.
    pub fn publish(&mut self, module: &str, key: SchemeKey) -> Result<()> {
        if self.keys.contains_key(module) {
            return Err(ModsecError::Invariant(format!(
                "key for {module} published twice"
            )));
        }
        self.keys.insert(module.to_string(), key);
        Ok(())
    }

    /// Order `modules` so every link target comes before the modules that
    /// borrow from it. Targets outside `modules` impose no constraint.
    pub fn build_order<'a>(&self, modules: &[&'a str]) -> Result<Vec<&'a str>> {
        let mut ordered: Vec<&'a str> = Vec::with_capacity(modules.len());
        let mut pending: Vec<&'a str> = modules.to_vec();

        while !pending.is_empty() {
            let before = pending.len();
            pending.retain(|module| {
                let ready = match self.target_of(module) {
                    Some(target) => {
                        !modules.iter().any(|m| *m == target)
                            || ordered.iter().any(|m| *m == target)
                    }
                    None => true,
                };
                if ready {
                    ordered.push(*module);
                }
                !ready
            });

            if pending.len() == before {
                return Err(ModsecError::Config(format!(
                    "bridge links form a cycle among: {}",
                    pending.join(", ")
                )));
            }
        }

        Ok(ordered)
    }
}

impl Bridge for BridgeRegistry {
    fn raw_key(&self, module: &str) -> Option<&SchemeKey> {
        let target = self.target_of(module)?;
        self.keys.get(target)
    }
}
