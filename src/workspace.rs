//! Document workspace state and its on-disk home.
//!
//! The workspace is an explicit value handed to the workflow by reference;
//! nothing in the crate keeps document state in globals. It is persisted as
//! a single JSON file so each CLI invocation can pick up where the last one
//! stopped.
use crate::lm::ChatMessage;
use crate::model::{AuditResult, ConsistencyResult, Section, SectionData, SectionMeta, SectionStatus};
use crate::templates;
use crate::workflow::BatchAuditResult;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

pub const WORKSPACE_SCHEMA_VERSION: u32 = 1;

/// Paths for workspace-owned files under `<root>/.charter`.
#[derive(Debug, Clone)]
pub struct WorkspacePaths {
    root: PathBuf,
}

impl WorkspacePaths {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root.join(".charter")
    }

    pub fn workspace_path(&self) -> PathBuf {
        self.state_dir().join("workspace.json")
    }

    pub fn config_path(&self) -> PathBuf {
        self.state_dir().join("config.json")
    }

    pub fn lm_log_path(&self) -> PathBuf {
        self.state_dir().join("lm_log.jsonl")
    }
}

/// Section fields supplied by an importer rather than the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionDraft {
    pub title: String,
    pub criteria: String,
    pub template_structure: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    pub schema_version: u32,
    #[serde(default)]
    pub active_template: Option<String>,
    #[serde(default)]
    sections: Vec<Section>,
    #[serde(default)]
    global_result: Option<ConsistencyResult>,
    #[serde(default)]
    pub last_review_epoch_ms: Option<u128>,
    #[serde(default)]
    pub chat_history: Vec<ChatMessage>,
    #[serde(default)]
    next_section_seq: u64,
}

impl Default for Workspace {
    fn default() -> Self {
        Self {
            schema_version: WORKSPACE_SCHEMA_VERSION,
            active_template: None,
            sections: Vec::new(),
            global_result: None,
            last_review_epoch_ms: None,
            chat_history: Vec::new(),
            next_section_seq: 0,
        }
    }
}

impl Workspace {
    /// Load the persisted workspace, or an empty one if none exists yet.
    pub fn load_or_default(paths: &WorkspacePaths) -> Result<Self> {
        let path = paths.workspace_path();
        if !path.is_file() {
            return Ok(Self::default());
        }
        let bytes = fs::read(&path).with_context(|| format!("read {}", path.display()))?;
        let workspace: Workspace = serde_json::from_slice(&bytes)
            .with_context(|| format!("parse workspace {}", path.display()))?;
        if workspace.schema_version != WORKSPACE_SCHEMA_VERSION {
            return Err(anyhow!(
                "unsupported workspace schema_version {} in {}",
                workspace.schema_version,
                path.display()
            ));
        }
        Ok(workspace)
    }

    /// Persist the workspace, replacing the previous file atomically.
    pub fn save(&self, paths: &WorkspacePaths) -> Result<()> {
        let dir = paths.state_dir();
        fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
        let bytes = serde_json::to_vec_pretty(self).context("serialize workspace")?;
        let mut staged = tempfile::NamedTempFile::new_in(&dir)
            .with_context(|| format!("create temp file in {}", dir.display()))?;
        staged.write_all(&bytes).context("write workspace")?;
        let path = paths.workspace_path();
        staged
            .persist(&path)
            .map_err(|err| anyhow!("replace {}: {}", path.display(), err.error))?;
        Ok(())
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn section(&self, id: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == id)
    }

    pub fn require_section(&self, id: &str) -> Result<&Section> {
        self.section(id)
            .ok_or_else(|| anyhow!("unknown section id `{id}` (see `charter show`)"))
    }

    fn section_mut(&mut self, id: &str) -> Result<&mut Section> {
        self.sections
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| anyhow!("unknown section id `{id}` (see `charter show`)"))
    }

    /// All sections carrying exactly this title.
    pub fn sections_titled<'a>(&'a self, title: &'a str) -> impl Iterator<Item = &'a Section> + 'a {
        self.sections.iter().filter(move |s| s.meta.title == title)
    }

    pub fn global_result(&self) -> Option<&ConsistencyResult> {
        self.global_result.as_ref()
    }

    /// Replace every section with a fresh copy of a registry template.
    pub fn load_template(&mut self, name: &str) -> Result<()> {
        let sections = templates::template_sections(name)?
            .ok_or_else(|| anyhow!("unknown template `{name}` (see `charter templates`)"))?;
        let drafts: Vec<SectionDraft> = sections
            .iter()
            .map(|t| SectionDraft {
                title: t.title.clone(),
                criteria: t.criteria.clone(),
                template_structure: t.template_structure.clone(),
                content: t.example_content.clone().unwrap_or_default(),
            })
            .collect();
        self.replace_sections(name, drafts);
        Ok(())
    }

    /// Replace every section with imported drafts.
    pub fn import_sections(&mut self, label: &str, drafts: Vec<SectionDraft>) {
        self.replace_sections(label, drafts);
    }

    fn replace_sections(&mut self, label: &str, drafts: Vec<SectionDraft>) {
        let mut sections = Vec::with_capacity(drafts.len());
        for draft in drafts {
            self.next_section_seq += 1;
            sections.push(Section {
                id: format!("sec-{}", self.next_section_seq),
                meta: SectionMeta {
                    title: draft.title,
                    criteria: draft.criteria,
                    template_structure: draft.template_structure,
                },
                user_data: SectionData {
                    content: draft.content,
                    last_audit: None,
                    status: SectionStatus::Draft,
                },
            });
        }
        self.active_template = Some(label.to_string());
        self.sections = sections;
        self.global_result = None;
        self.last_review_epoch_ms = None;
    }

    /// Set a section's content. Any edit invalidates a previous audit.
    pub fn update_section_content(&mut self, id: &str, content: &str) -> Result<()> {
        let section = self.section_mut(id)?;
        if section.user_data.content == content {
            return Ok(());
        }
        section.user_data.content = content.to_string();
        if section.user_data.status != SectionStatus::Draft {
            section.user_data.status = SectionStatus::Draft;
            section.user_data.last_audit = None;
        }
        Ok(())
    }

    pub fn update_section_audit_result(&mut self, id: &str, result: AuditResult) -> Result<()> {
        let section = self.section_mut(id)?;
        section.user_data.status = if result.is_compliant {
            SectionStatus::Compliant
        } else {
            SectionStatus::Flagged
        };
        section.user_data.last_audit = Some(result);
        Ok(())
    }

    pub fn update_global_audit_result(&mut self, result: ConsistencyResult) {
        self.global_result = Some(result);
    }

    /// Deposit a whole-document review into the workspace.
    pub fn apply_review(&mut self, review: BatchAuditResult) -> Result<()> {
        for (id, result) in review.section_results {
            self.update_section_audit_result(&id, result)?;
        }
        self.update_global_audit_result(review.global_result);
        self.last_review_epoch_ms = Some(now_epoch_ms()?);
        Ok(())
    }

    pub fn clear(&mut self) {
        let seq = self.next_section_seq;
        *self = Self {
            next_section_seq: seq,
            ..Self::default()
        };
    }
}

pub fn now_epoch_ms() -> Result<u128> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system clock before unix epoch")?
        .as_millis())
}
