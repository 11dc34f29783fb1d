pub mod check;
pub mod generate;
pub mod schemes;

use crate::bridge::BridgeRegistry;
use crate::errors::{ModsecError, Result};
use crate::section::ModularSection;

/// Every bridged section must have a declared link target.
pub(crate) fn check_links(sections: &[ModularSection], registry: &BridgeRegistry) -> Result<()> {
    for s in sections.iter().filter(|s| s.is_bridged()) {
        if registry.target_of(&s.name().typ).is_none() {
            return Err(ModsecError::Config(format!(
                "{} uses {} but no bridge block links it to a target",
                s.name().typ,
                s.enc_type()
            )));
        }
    }
    Ok(())
}
