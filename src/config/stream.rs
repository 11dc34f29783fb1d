//! Project configuration parsing.
//!
//! A project file declares global defaults followed by named section
//! blocks:
//!
//! ```text
//! lambda = 8
//!
//! SecureInt : modular
//! {
//!     encryption = pila
//!     postfix = Ep
//! }
//! ```
//!
//! Blocks of type `bridge` declare `<bridging module> = <target module>`
//! links used for key borrowing.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use crate::errors::{ModsecError, Result};
use crate::names;

/// One `Name : type { ... }` block, with its pairs in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionBlock {
    pub name: String,
    pub kind: String,
    pub pairs: Vec<(String, String)>,
    /// 1-based line of the block header.
    pub line: usize,
}

/// A fully parsed project file.
#[derive(Debug, Clone, Default)]
pub struct ProjectConfig {
    globals: HashMap<String, String>,
    sections: Vec<SectionBlock>,
}

enum State {
    Outside,
    AwaitOpen(SectionBlock),
    Inside(SectionBlock),
}

/// Split a `key = value` line. The value is the trimmed rest of the line.
fn parse_pair(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() || key.contains(char::is_whitespace) {
        return None;
    }
    Some((key, value.trim()))
}

/// Parse a `Name : type` header, returning the block and whether the
/// opening brace was on the same line.
fn parse_header(line: &str, line_no: usize) -> Option<(SectionBlock, bool)> {
    let (name, rest) = line.split_once(':')?;
    let name = name.trim();
    let rest = rest.trim();
    let (kind, opened) = match rest.strip_suffix('{') {
        Some(k) => (k.trim(), true),
        None => (rest, false),
    };
    if name.is_empty() || kind.is_empty() || name.contains(char::is_whitespace) {
        return None;
    }
    Some((
        SectionBlock {
            name: name.to_string(),
            kind: kind.to_string(),
            pairs: Vec::new(),
            line: line_no,
        },
        opened,
    ))
}

impl ProjectConfig {
    /// Parse project configuration text.
    pub fn parse(text: &str) -> Result<Self> {
        let mut config = Self::default();
        let mut state = State::Outside;

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = match raw.split_once('#') {
                Some((before, _)) => before.trim(),
                None => raw.trim(),
            };
            if line.is_empty() {
                continue;
            }

            state = match state {
                State::Outside => {
                    // A header has a ':' before any '='.
                    let is_header = match (line.find(':'), line.find('=')) {
                        (Some(c), Some(e)) => c < e,
                        (Some(_), None) => true,
                        _ => false,
                    };
                    if is_header {
                        let (block, opened) = parse_header(line, line_no).ok_or_else(|| {
                            ModsecError::Config(format!("line {line_no}: malformed section header"))
                        })?;
                        if opened {
                            State::Inside(block)
                        } else {
                            State::AwaitOpen(block)
                        }
                    } else {
                        let (key, value) = parse_pair(line).ok_or_else(|| {
                            ModsecError::Config(format!(
                                "line {line_no}: expected 'key = value' or a section header"
                            ))
                        })?;
                        config.globals.insert(key.to_string(), value.to_string());
                        State::Outside
                    }
                }
                State::AwaitOpen(block) => {
                    if line != "{" {
                        return Err(ModsecError::Config(format!(
                            "line {line_no}: expected '{{' to open section {}",
                            block.name
                        )));
                    }
                    State::Inside(block)
                }
                State::Inside(mut block) => {
                    if line == "}" {
                        config.push_section(block)?;
                        State::Outside
                    } else {
                        let (key, value) = parse_pair(line).ok_or_else(|| {
                            ModsecError::Config(format!(
                                "line {line_no}: expected 'key = value' in section {}",
                                block.name
                            ))
                        })?;
                        block.pairs.push((key.to_string(), value.to_string()));
                        State::Inside(block)
                    }
                }
            };
        }

        match state {
            State::Outside => Ok(config),
            State::AwaitOpen(block) | State::Inside(block) => Err(ModsecError::Config(format!(
                "section {} opened at line {} is not closed",
                block.name, block.line
            ))),
        }
    }

    /// Read and parse a project file from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            ModsecError::Config(format!("cannot read config {}: {e}", path.display()))
        })?;
        Self::parse(&text)
    }

    fn push_section(&mut self, block: SectionBlock) -> Result<()> {
        if let Some(prev) = self.section(&block.name) {
            return Err(ModsecError::Config(format!(
                "line {}: section {} already declared at line {}",
                block.line, block.name, prev.line
            )));
        }
        if block.kind == names::TYPE_BRIDGE {
            self.check_bridge_links(&block)?;
        }
        self.sections.push(block);
        Ok(())
    }

    /// A module may be linked to one target only, across all bridge blocks.
    /// Repeating the same link is allowed.
    fn check_bridge_links(&self, block: &SectionBlock) -> Result<()> {
        let mut seen: HashMap<&str, (&str, &SectionBlock)> = HashMap::new();
        let earlier = self
            .sections
            .iter()
            .filter(|s| s.kind == names::TYPE_BRIDGE)
            .chain(std::iter::once(block));
        for bridge in earlier {
            for (module, target) in &bridge.pairs {
                if let Some((prev, at)) = seen.get(module.as_str()) {
                    if *prev != target.as_str() {
                        return Err(ModsecError::Config(format!(
                            "line {}: {module} is linked to both {prev} ({} at line {}) and {target} ({})",
                            bridge.line, at.name, at.line, bridge.name
                        )));
                    }
                }
                seen.insert(module.as_str(), (target.as_str(), bridge));
            }
        }
        Ok(())
    }

    /// Global default values declared outside any block.
    pub fn globals(&self) -> &HashMap<String, String> {
        &self.globals
    }

    /// All sections in declaration order.
    pub fn sections(&self) -> &[SectionBlock] {
        &self.sections
    }

    /// Look up a section by name.
    pub fn section(&self, name: &str) -> Option<&SectionBlock> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// Sections of the `modular` type, in declaration order.
    pub fn modular_sections(&self) -> impl Iterator<Item = &SectionBlock> {
        self.sections
            .iter()
            .filter(|s| s.kind == names::TYPE_MODULAR)
    }

    /// Bridge links collected from every `bridge` block:
    /// bridging module -> target module.
    pub fn bridge_links(&self) -> BTreeMap<String, String> {
        self.sections
            .iter()
            .filter(|s| s.kind == names::TYPE_BRIDGE)
            .flat_map(|s| s.pairs.iter().cloned())
            .collect()
    }
}
