//! `modsec generate` — materialize keys and emit sources for each section.
//!
//! Steps:
//! 1. parse the project file and pick the sections to build
//! 2. order them so bridge targets get their keys first
//! 3. run `gen_keys` per section, publishing each key to the registry
//! 4. write `<stem>.h`, `<stem>.inc` and `<stem>.cpp` per section

use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::bridge::BridgeRegistry;
use crate::cli::commands::check_links;
use crate::cli::{load_sections, load_settings, output, Cli};
use crate::errors::{ModsecError, Result};
use crate::keys::KeyProvider;
use crate::names;
use crate::section::{KeyGenOptions, ModularSection};
use crate::template::FsTemplateStore;

/// Arguments of the `generate` command.
#[derive(Debug, Default)]
pub struct GenerateArgs<'a> {
    pub config: &'a str,
    pub sections: &'a [String],
    pub out: Option<&'a str>,
    pub root: Option<&'a str>,
    pub key_dir: Option<&'a str>,
    pub user_dir: Option<&'a str>,
    pub seed: Option<&'a str>,
    pub force_generate: bool,
    pub force_load: bool,
}

/// Execute the `generate` command.
pub fn execute(cli: &Cli, args: &GenerateArgs<'_>) -> Result<()> {
    let (project_dir, settings) = load_settings(cli)?;
    let pick = |flag: Option<&str>, configured: &str| -> PathBuf {
        match flag {
            Some(dir) => PathBuf::from(dir),
            None => settings.resolve(&project_dir, configured),
        }
    };
    let out_dir = pick(args.out, &settings.output_dir);
    let root = pick(args.root, &settings.template_root);
    let key_dir = pick(args.key_dir, &settings.key_dir);
    let user_dir = pick(args.user_dir, &settings.user_dir);

    let (project, sections) = load_sections(Path::new(args.config))?;
    let mut registry = BridgeRegistry::from_config(&project);
    let mut sections = select(sections, args.sections, &registry)?;
    check_links(&sections, &registry)?;

    let names: Vec<String> = sections.iter().map(|s| s.name().typ.clone()).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let order = registry.build_order(&refs)?;

    // 1. Keys, in dependency order.
    let options = KeyGenOptions {
        force_generate: args.force_generate,
        force_load: args.force_load,
        seed: args.seed.map(str::to_string),
        key_dir,
    };
    if args.seed.is_none() && !args.force_load {
        tracing::debug!("no seed given, new keys use OS randomness");
    }
    for name in order {
        let section = sections
            .iter_mut()
            .find(|s| s.name().typ == name)
            .ok_or_else(|| ModsecError::Invariant(format!("section {name} vanished")))?;
        section.gen_keys(&options, &registry)?;
        let key = section
            .key()
            .cloned()
            .ok_or_else(|| ModsecError::Invariant(format!("no key after gen_keys for {name}")))?;
        registry.publish(name, key)?;
    }

    // 2. Sources. Everything is rendered before any file is touched so a
    // failing template leaves the previous outputs intact.
    let store = FsTemplateStore;
    let mut rendered = Vec::with_capacity(sections.len());
    for section in &sections {
        let version = section
            .key()
            .map(|k| settings.impl_version(k.scheme().as_str()))
            .unwrap_or("");
        let h = render(|w| section.write_h(&store, &root, &user_dir, w))?;
        let inc = render(|w| section.write_inc(&store, &root, version, w))?;
        let cpp = render(|w| section.write_cpp(&store, &root, version, w))?;
        rendered.push((section, h, inc, cpp));
    }

    fs::create_dir_all(&out_dir)?;
    for (section, h, inc, cpp) in &rendered {
        let stem = &section.name().fil;
        write_artifact(&out_dir.join(names::dot_h(stem)), h)?;
        write_artifact(&out_dir.join(names::dot_inc(stem)), inc)?;
        write_artifact(&out_dir.join(names::dot_cpp(stem)), cpp)?;

        tracing::info!(section = %section.name().typ, dir = %out_dir.display(), "sources emitted");
        output::success(&format!(
            "{} ({}) -> {}.h/.inc/.cpp",
            section.name().typ,
            section.enc_type(),
            out_dir.join(stem).display()
        ));
    }

    if !cli.quiet {
        output::print_sections_table(&sections);
    }
    Ok(())
}

/// Render one artifact into memory.
fn render<F>(write: F) -> Result<Vec<u8>>
where
    F: FnOnce(&mut dyn Write) -> Result<()>,
{
    let mut buf = Vec::new();
    write(&mut buf)?;
    Ok(buf)
}

/// Replace `path` with `contents` via a sibling temp file and a rename.
fn write_artifact(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = path.parent().unwrap_or(Path::new("."));
    let tmp_path = parent.join(format!(
        ".{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy()
    ));

    fs::write(&tmp_path, contents)?;
    fs::rename(&tmp_path, path)?;
    tracing::debug!(file = %path.display(), bytes = contents.len(), "artifact written");
    Ok(())
}

/// Keep the requested sections plus every bridge target they depend on.
/// An empty request keeps everything.
fn select(
    sections: Vec<ModularSection>,
    requested: &[String],
    registry: &BridgeRegistry,
) -> Result<Vec<ModularSection>> {
    if requested.is_empty() {
        return Ok(sections);
    }

    let mut wanted: BTreeSet<String> = BTreeSet::new();
    for name in requested {
        if !sections.iter().any(|s| &s.name().typ == name) {
            return Err(ModsecError::Config(format!(
                "no modular section named '{name}'"
            )));
        }
        let mut current = name.as_str();
        while wanted.insert(current.to_string()) {
            match registry.target_of(current) {
                Some(target) => current = target,
                None => break,
            }
        }
    }

    Ok(sections
        .into_iter()
        .filter(|s| wanted.contains(&s.name().typ))
        .collect())
}
