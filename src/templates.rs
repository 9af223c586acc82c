//! Built-in section template catalog.
//!
//! The catalog ships inside the binary so a fresh workspace never depends on
//! files next to the executable.
use anyhow::{Context, Result};
use serde::Deserialize;
use std::sync::OnceLock;

pub const TEMPLATE_REGISTRY_JSON: &str = include_str!("../templates/registry.json");

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RegistryFile {
    templates: Vec<Template>,
}

/// A named document template made of ordered sections.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Template {
    pub name: String,
    pub sections: Vec<SectionTemplate>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SectionTemplate {
    pub title: String,
    pub criteria: String,
    pub template_structure: String,
    /// Pre-filled content for demonstration templates.
    #[serde(default)]
    pub example_content: Option<String>,
}

fn registry() -> Result<&'static [Template]> {
    static REGISTRY: OnceLock<Vec<Template>> = OnceLock::new();
    if let Some(templates) = REGISTRY.get() {
        return Ok(templates);
    }
    let parsed: RegistryFile =
        serde_json::from_str(TEMPLATE_REGISTRY_JSON).context("parse template registry")?;
    Ok(REGISTRY.get_or_init(|| parsed.templates))
}

/// Template names in registry order.
pub fn available_templates() -> Result<Vec<&'static str>> {
    Ok(registry()?.iter().map(|t| t.name.as_str()).collect())
}

pub fn find_template(name: &str) -> Result<Option<&'static Template>> {
    Ok(registry()?.iter().find(|t| t.name == name))
}

pub fn template_sections(name: &str) -> Result<Option<&'static [SectionTemplate]>> {
    Ok(find_template(name)?.map(|t| t.sections.as_slice()))
}
