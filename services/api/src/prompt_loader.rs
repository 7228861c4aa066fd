use anyhow::{Context, Result};
use situ_core::{PromptSet, SituationVariant};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Reads every `<key>.md` file in `dir` into a key → text map.
pub fn load_overrides(dir: &Path) -> Result<HashMap<String, String>> {
    let mut overrides = HashMap::new();

    for entry in fs::read_dir(dir)
        .with_context(|| format!("Failed to read prompts directory: {}", dir.display()))?
    {
        let path = entry?.path();
        if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some("md") {
            continue;
        }

        let key = path
            .file_stem()
            .and_then(|s| s.to_str())
            .context("Could not get file stem for prompt file")?
            .to_string();
        let text = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read prompt file: {}", path.display()))?;

        overrides.insert(key, text);
    }

    Ok(overrides)
}

/// Compiled-in prompts, the selected situational variant, and any overrides
/// found in `dir`.
pub fn build_prompts(dir: Option<&Path>, variant: SituationVariant) -> Result<PromptSet> {
    let prompts = PromptSet::default().with_variant(variant);
    let Some(dir) = dir else {
        return Ok(prompts);
    };

    let overrides = load_overrides(dir)?;
    tracing::info!("Loaded {} prompt overrides from {}", overrides.len(), dir.display());
    Ok(prompts.with_overrides(&overrides))
}
