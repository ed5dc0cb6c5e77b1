use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Yaml,
    Toml,
}

impl Format {
    fn of(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => Some(Format::Yaml),
            Some("toml") => Some(Format::Toml),
            _ => None,
        }
    }
}

/// Reads a YAML or TOML document, picking the parser from the file extension.
/// `kind` names the document in error messages ("config", "service").
pub fn load_by_extension<T: DeserializeOwned>(path: &Path, kind: &str) -> Result<T> {
    let format = Format::of(path).with_context(|| {
        format!("Unsupported {} file format {:?}. Use .yaml, .yml, or .toml", kind, path)
    })?;
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {} file: {:?}", kind, path))?;

    match format {
        Format::Yaml => serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse {} file: {:?}", kind, path)),
        Format::Toml => toml::from_str(&content)
            .with_context(|| format!("Failed to parse {} file: {:?}", kind, path)),
    }
}
