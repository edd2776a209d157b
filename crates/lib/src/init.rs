//! Initialize the configuration directory: create ~/.concierge, a default config, and the bundled knowledge documents.
//!
//! Layout mirrors `crates/lib/config/`: `config/knowledge/` → `~/.concierge/knowledge/`.

use anyhow::{Context, Result};
use include_dir::{include_dir, Dir};
use std::path::{Path, PathBuf};

use crate::config;

static BUNDLED_KNOWLEDGE: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/config/knowledge");

/// Ensure the configuration directory has been initialized (config file and knowledge directory exist).
pub fn require_initialized(config_path: &Path, config: &config::Config) -> Result<()> {
    if !config_path.exists() {
        anyhow::bail!(
            "configuration not initialized; run `concierge init` first (config file not found: {})",
            config_path.display()
        );
    }
    let knowledge_dir = config::resolve_knowledge_dir(config, config_path);
    if !knowledge_dir.exists() {
        anyhow::bail!(
            "configuration not initialized; run `concierge init` first (knowledge directory not found: {})",
            knowledge_dir.display()
        );
    }
    Ok(())
}

/// Create the config directory and default files if they do not exist.
/// - Creates the config directory (parent of config file path).
/// - Writes `config.json` with `{}` if missing.
/// - Extracts the bundled sample documents into the knowledge directory (`knowledge.directory`
///   from the config, or `knowledge` next to it) if that directory does not exist.
pub fn init_config_dir(config_path: &Path) -> Result<PathBuf> {
    let config_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("creating config directory {}", config_dir.display()))?;

    if !config_path.exists() {
        std::fs::write(config_path, b"{}")
            .with_context(|| format!("writing default config to {}", config_path.display()))?;
        log::info!("created default config at {}", config_path.display());
    }

    let (loaded, _) = config::load_config(Some(config_path.to_path_buf()))?;
    let knowledge_dir = config::resolve_knowledge_dir(&loaded, config_path);
    if !knowledge_dir.exists() {
        std::fs::create_dir_all(&knowledge_dir)
            .with_context(|| format!("creating knowledge directory {}", knowledge_dir.display()))?;
        if let Err(e) = BUNDLED_KNOWLEDGE.extract(&knowledge_dir) {
            anyhow::bail!(
                "extracting bundled knowledge to {}: {}",
                knowledge_dir.display(),
                e
            );
        }
        log::info!("extracted bundled knowledge to {}", knowledge_dir.display());
    } else {
        log::debug!("knowledge directory already exists at {}, skipping", knowledge_dir.display());
    }

    Ok(config_dir.to_path_buf())
}
