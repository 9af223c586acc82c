//! CLI argument parsing for the charter authoring workflow.
use crate::config::LmSettingsLayer;
use crate::model::Severity;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "charter",
    version,
    about = "Draft, audit, and fix project charter sections with an LM reviewer",
    after_help = "Examples:\n  charter new --template \"Standard Project Charter\"\n  charter edit --section sec-2 --file problem.md\n  charter audit --section sec-2\n  charter fix --section sec-2 --issue 1\n  charter review --severity High\n  charter chat \"What is the main objective?\"",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Workspace root; state is kept under <DIR>/.charter
    #[arg(long, global = true, value_name = "DIR", env = "CHARTER_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(flatten)]
    pub lm: LmArgs,
}

/// Provider overrides; these take precedence over config files and env.
#[derive(Args, Debug, Clone, Default)]
pub struct LmArgs {
    /// Command that reads a prompt on stdin and writes the reply to stdout
    #[arg(long, global = true, value_name = "CMD")]
    pub lm_command: Option<String>,

    /// API key for an OpenAI-compatible endpoint
    #[arg(long, global = true, value_name = "KEY")]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint
    #[arg(long, global = true, value_name = "URL")]
    pub base_url: Option<String>,

    /// Model or deployment name
    #[arg(long, global = true, value_name = "NAME")]
    pub model: Option<String>,

    /// Timeout for one LM call, in seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout_secs: Option<u64>,
}

impl LmArgs {
    pub fn layer(&self) -> LmSettingsLayer {
        LmSettingsLayer {
            lm_command: self.lm_command.clone(),
            api_key: self.api_key.clone(),
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            timeout_secs: self.timeout_secs,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List available document templates
    Templates,
    New(NewArgs),
    Import(ImportArgs),
    Show(ShowArgs),
    Edit(EditArgs),
    Audit(AuditArgs),
    Fix(FixArgs),
    Review(ReviewArgs),
    Status(StatusArgs),
    Chat(ChatArgs),
    /// Remove every section, review result, and chat message
    Clear,
}

#[derive(Parser, Debug)]
#[command(about = "Start a document from a template")]
pub struct NewArgs {
    /// Template name (see `charter templates`)
    #[arg(long, value_name = "NAME")]
    pub template: String,

    /// Replace existing sections
    #[arg(long)]
    pub force: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Import an existing charter from markdown or plain text")]
pub struct ImportArgs {
    /// Markdown or text file to import
    #[arg(long, value_name = "PATH")]
    pub file: PathBuf,

    /// Replace existing sections
    #[arg(long)]
    pub force: bool,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Print sections with guidance, format, content, and last audit")]
pub struct ShowArgs {
    /// Show only this section
    #[arg(long, value_name = "ID")]
    pub section: Option<String>,

    /// Print the whole document as the consistency check reads it
    #[arg(long, conflicts_with_all = ["section", "json"])]
    pub document: bool,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Replace a section's content")]
pub struct EditArgs {
    #[arg(long, value_name = "ID")]
    pub section: String,

    /// New content
    #[arg(long, value_name = "TEXT", conflicts_with = "file", required_unless_present = "file")]
    pub content: Option<String>,

    /// Read new content from a file ("-" for stdin)
    #[arg(long, value_name = "PATH")]
    pub file: Option<PathBuf>,
}

#[derive(Parser, Debug)]
#[command(about = "Audit one section against its guidance and format")]
pub struct AuditArgs {
    #[arg(long, value_name = "ID")]
    pub section: String,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Apply an automatic fix for one issue from the last audit")]
pub struct FixArgs {
    #[arg(long, value_name = "ID")]
    pub section: String,

    /// Issue id from the section's last audit
    #[arg(long, value_name = "ISSUE_ID")]
    pub issue: String,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Audit every section, check cross-section consistency, and report")]
pub struct ReviewArgs {
    /// Keep only findings of these severities
    #[arg(long, value_name = "LEVEL", value_delimiter = ',')]
    pub severity: Vec<Severity>,

    /// Keep only findings whose title or description contains this text
    #[arg(long, value_name = "TEXT")]
    pub query: Option<String>,

    /// Drop findings that cannot be tied to a section
    #[arg(long)]
    pub only_linked: bool,

    /// Print the stored report without calling the LM
    #[arg(long)]
    pub no_run: bool,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Summarize document health and LM configuration")]
pub struct StatusArgs {
    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Ask the assistant about the current draft")]
pub struct ChatArgs {
    /// Question for the assistant
    #[arg(value_name = "MESSAGE", required_unless_present = "reset")]
    pub message: Option<String>,

    /// Forget the conversation so far
    #[arg(long)]
    pub reset: bool,
}
