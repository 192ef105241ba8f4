//! services/api/src/prompts.rs
//!
//! Applies prompt template overrides from the prompts directory to the catalog.
//!
//! A file named `<stage>_<n>.txt` replaces the template of question `n` of
//! `stage`. Other files are ignored. A missing directory means no overrides.

use crate::config::ConfigError;
use std::path::Path;
use tracing::info;
use value_coach_core::{Catalog, Stage};

pub fn apply_prompt_overrides(mut catalog: Catalog, dir: &Path) -> Result<Catalog, ConfigError> {
    if !dir.is_dir() {
        info!("No prompts directory at {}; using built-in templates", dir.display());
        return Ok(catalog);
    }

    let invalid = |name: &str, reason: String| ConfigError::InvalidPrompt(name.to_string(), reason);

    let entries = std::fs::read_dir(dir)
        .map_err(|e| invalid(&dir.display().to_string(), e.to_string()))?;
    for entry in entries {
        let entry = entry.map_err(|e| invalid(&dir.display().to_string(), e.to_string()))?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("txt") {
            continue;
        }
        let Some(file_stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let file_name = path.display().to_string();

        let (stage, index) = file_stem
            .rsplit_once('_')
            .ok_or_else(|| invalid(&file_name, "expected <stage>_<n>.txt".to_string()))?;
        let stage: Stage = stage.parse().map_err(|e| invalid(&file_name, format!("{}", e)))?;
        let index: u32 = index
            .parse()
            .map_err(|_| invalid(&file_name, format!("'{}' is not a question number", index)))?;

        let template = std::fs::read_to_string(&path)
            .map_err(|e| invalid(&file_name, e.to_string()))?;
        let template = template.trim();
        if template.is_empty() {
            return Err(invalid(&file_name, "template is empty".to_string()));
        }

        catalog = catalog
            .with_prompt_template(stage, index, template)
            .map_err(|e| invalid(&file_name, e.to_string()))?;
        info!("Loaded prompt override for {} question {}", stage, index);
    }
    Ok(catalog)
}
