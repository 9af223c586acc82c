//! Command handlers. Each loads the workspace, runs one operation, persists
//! what changed, and prints either text or JSON.
use crate::chat::chat_response;
use crate::cli::{
    AuditArgs, ChatArgs, Command, EditArgs, FixArgs, GlobalArgs, ImportArgs, NewArgs, ReviewArgs,
    RootArgs, ShowArgs, StatusArgs,
};
use crate::config::{self, LmSettings};
use crate::ingest::ingest_text;
use crate::lm::log::{read_entries, summarize};
use crate::lm::{ChatMessage, LmProvider};
use crate::model::{AgentRequest, Section, Severity};
use crate::render;
use crate::report::{build_report, document_health, ReportFilter};
use crate::templates;
use crate::workflow::{self, render_document, review_workspace, run_request, AgentOutcome, FixStatus};
use crate::workspace::{Workspace, WorkspacePaths};
use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use serde_json::json;
use std::fs;
use std::io::Read;
use std::path::Path;

/// Resolved workspace location and provider settings for one invocation.
struct AppContext {
    paths: WorkspacePaths,
    settings: Option<LmSettings>,
}

impl AppContext {
    fn load(global: &GlobalArgs) -> Result<Self> {
        let root = match &global.workspace {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().context("resolve current directory")?,
        };
        let paths = WorkspacePaths::new(root);
        let layers = config::collect_layers(global.lm.layer(), &paths.config_path())?;
        let settings = config::resolve(&layers);
        tracing::debug!(lm = %config::describe(settings.as_ref()), "resolved LM settings");
        Ok(Self { paths, settings })
    }

    /// Build the configured provider; `None` when nothing is configured.
    fn provider(&self) -> Result<Option<Box<dyn LmProvider>>> {
        self.settings
            .as_ref()
            .map(|settings| config::build_provider(settings, self.paths.lm_log_path()))
            .transpose()
    }

    fn load_workspace(&self) -> Result<Workspace> {
        Workspace::load_or_default(&self.paths)
    }
}

pub fn run(args: RootArgs) -> Result<()> {
    if let Command::Templates = args.command {
        return run_templates();
    }
    let ctx = AppContext::load(&args.global)?;
    match args.command {
        Command::Templates => run_templates(),
        Command::New(args) => run_new(&ctx, args),
        Command::Import(args) => run_import(&ctx, args),
        Command::Show(args) => run_show(&ctx, args),
        Command::Edit(args) => run_edit(&ctx, args),
        Command::Audit(args) => run_audit(&ctx, args),
        Command::Fix(args) => run_fix(&ctx, args),
        Command::Review(args) => run_review(&ctx, args),
        Command::Status(args) => run_status(&ctx, args),
        Command::Chat(args) => run_chat(&ctx, args),
        Command::Clear => run_clear(&ctx),
    }
}

fn print_json<T: Serialize>(value: &T, what: &str) -> Result<()> {
    let text = serde_json::to_string_pretty(value).with_context(|| format!("serialize {what}"))?;
    println!("{text}");
    Ok(())
}

fn ensure_replaceable(workspace: &Workspace, force: bool) -> Result<()> {
    if !workspace.is_empty() && !force {
        return Err(anyhow!(
            "workspace already has {} section(s) (use --force to replace them)",
            workspace.sections().len()
        ));
    }
    Ok(())
}

fn run_templates() -> Result<()> {
    for name in templates::available_templates()? {
        let count = templates::template_sections(name)?.map_or(0, <[_]>::len);
        println!("{name} ({count} sections)");
    }
    Ok(())
}

fn run_new(ctx: &AppContext, args: NewArgs) -> Result<()> {
    let mut workspace = ctx.load_workspace()?;
    ensure_replaceable(&workspace, args.force)?;
    workspace.load_template(&args.template)?;
    workspace.save(&ctx.paths)?;
    println!("started \"{}\" with {} section(s):", args.template, workspace.sections().len());
    for section in workspace.sections() {
        println!("  {} {}", section.id, section.meta.title);
    }
    Ok(())
}

fn run_import(ctx: &AppContext, args: ImportArgs) -> Result<()> {
    let mut workspace = ctx.load_workspace()?;
    ensure_replaceable(&workspace, args.force)?;
    let text = fs::read_to_string(&args.file)
        .with_context(|| format!("read {}", args.file.display()))?;
    let lm = ctx.provider()?;
    let outcome = ingest_text(lm.as_deref(), &text)
        .with_context(|| format!("import {}", args.file.display()))?;
    let label = args
        .file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "imported".to_string());
    workspace.import_sections(&label, outcome.drafts);
    workspace.save(&ctx.paths)?;

    if args.json {
        return print_json(
            &json!({
                "stats": outcome.stats,
                "truncated": outcome.truncated,
                "sections": workspace.sections(),
            }),
            "import result",
        );
    }
    print!("{}", render::import_text(&outcome.stats, outcome.truncated));
    for section in workspace.sections() {
        println!("  {} {}", section.id, section.meta.title);
    }
    Ok(())
}

fn run_show(ctx: &AppContext, args: ShowArgs) -> Result<()> {
    let workspace = ctx.load_workspace()?;
    let sections: Vec<&Section> = match &args.section {
        Some(id) => vec![workspace.require_section(id)?],
        None => workspace.sections().iter().collect(),
    };
    if args.json {
        return print_json(&sections, "sections");
    }
    if args.document {
        print!("{}", render_document(workspace.sections()));
        println!();
        return Ok(());
    }
    if sections.is_empty() {
        println!("no sections; start with `charter new --template <NAME>` (see `charter templates`)");
        return Ok(());
    }
    let blocks: Vec<String> = sections.iter().map(|s| render::section_text(s)).collect();
    print!("{}", blocks.join("\n"));
    Ok(())
}

fn read_content(args: &EditArgs) -> Result<String> {
    if let Some(content) = &args.content {
        return Ok(content.clone());
    }
    let path = args
        .file
        .as_deref()
        .ok_or_else(|| anyhow!("provide --content or --file"))?;
    if path == Path::new("-") {
        let mut content = String::new();
        std::io::stdin()
            .read_to_string(&mut content)
            .context("read content from stdin")?;
        return Ok(content);
    }
    fs::read_to_string(path).with_context(|| format!("read {}", path.display()))
}

fn run_edit(ctx: &AppContext, args: EditArgs) -> Result<()> {
    let content = read_content(&args)?;
    let mut workspace = ctx.load_workspace()?;
    workspace.update_section_content(&args.section, &content)?;
    workspace.save(&ctx.paths)?;
    let section = workspace.require_section(&args.section)?;
    println!(
        "updated {} ({})",
        section.id,
        section.user_data.status.as_str()
    );
    Ok(())
}

fn run_audit(ctx: &AppContext, args: AuditArgs) -> Result<()> {
    let mut workspace = ctx.load_workspace()?;
    let request = AgentRequest::for_section(workspace.require_section(&args.section)?);
    let route = workflow::route(&request);
    let lm = ctx.provider()?;
    let result = match run_request(lm.as_deref(), request) {
        AgentOutcome::Audited(result) => result,
        AgentOutcome::Fixed(_) => return Err(anyhow!("audit request was routed to fix")),
    };
    workspace.update_section_audit_result(&args.section, result.clone())?;
    workspace.save(&ctx.paths)?;

    if args.json {
        return print_json(
            &json!({ "section_id": args.section, "route": route, "result": result }),
            "audit result",
        );
    }
    print!("{}", render::audit_text(&result));
    Ok(())
}

fn run_fix(ctx: &AppContext, args: FixArgs) -> Result<()> {
    let mut workspace = ctx.load_workspace()?;
    let section = workspace.require_section(&args.section)?;
    let audit = section.user_data.last_audit.as_ref().ok_or_else(|| {
        anyhow!(
            "section {} has no audit; run `charter audit --section {}` first",
            section.id,
            section.id
        )
    })?;
    let issue = audit.issue(&args.issue).ok_or_else(|| {
        let known: Vec<&str> = audit.issues.iter().map(|i| i.id.as_str()).collect();
        anyhow!(
            "no issue `{}` in the last audit of {} (known: {})",
            args.issue,
            section.id,
            if known.is_empty() { "none".to_string() } else { known.join(", ") }
        )
    })?;
    if !issue.fixable {
        return Err(anyhow!(
            "issue {} needs input required from the author and cannot be fixed automatically: {}",
            issue.id,
            issue.recommendation
        ));
    }
    let request = AgentRequest::for_section(section).with_target(issue.clone());

    let lm = ctx.provider()?;
    let outcome = match run_request(lm.as_deref(), request) {
        AgentOutcome::Fixed(outcome) => outcome,
        AgentOutcome::Audited(_) => return Err(anyhow!("fix request was routed to audit")),
    };
    if outcome.applied() {
        workspace.update_section_content(&args.section, outcome.content())?;
        workspace.save(&ctx.paths)?;
    }

    if args.json {
        let (status, message) = match &outcome.status {
            FixStatus::Applied => ("applied", None),
            FixStatus::NoTarget => ("no_target", None),
            FixStatus::NotConfigured(message) => ("not_configured", Some(message.as_str())),
            FixStatus::Failed => ("failed", None),
        };
        return print_json(
            &json!({
                "section_id": args.section,
                "issue_id": args.issue,
                "status": status,
                "message": message,
                "content": outcome.content(),
            }),
            "fix result",
        );
    }
    print!("{}", render::fix_text(&outcome));
    Ok(())
}

fn run_review(ctx: &AppContext, args: ReviewArgs) -> Result<()> {
    let mut workspace = ctx.load_workspace()?;
    if !args.no_run {
        if workspace.is_empty() {
            return Err(anyhow!(
                "no sections to review; start with `charter new --template <NAME>`"
            ));
        }
        let lm = ctx.provider()?;
        review_workspace(lm.as_deref(), &mut workspace)?;
        workspace.save(&ctx.paths)?;
    }
    let filter = ReportFilter {
        severities: if args.severity.is_empty() {
            Severity::ALL.to_vec()
        } else {
            args.severity
        },
        query: args.query,
        only_linked: args.only_linked,
    };
    let report = build_report(&workspace, &filter);
    if args.json {
        return print_json(&report, "review report");
    }
    print!("{}", render::report_text(&report));
    Ok(())
}

fn run_status(ctx: &AppContext, args: StatusArgs) -> Result<()> {
    let workspace = ctx.load_workspace()?;
    let health = document_health(&workspace);
    let usage = summarize(&read_entries(&ctx.paths.lm_log_path())?);
    let lm = config::describe(ctx.settings.as_ref());
    if args.json {
        return print_json(
            &json!({
                "workspace": ctx.paths.root().display().to_string(),
                "lm": lm,
                "lm_usage": usage,
                "health": health,
            }),
            "status",
        );
    }
    println!("workspace: {}", ctx.paths.root().display());
    print!("{}", render::health_text(&health, &lm, &usage));
    Ok(())
}

fn run_chat(ctx: &AppContext, args: ChatArgs) -> Result<()> {
    let mut workspace = ctx.load_workspace()?;
    if args.reset {
        workspace.chat_history.clear();
    }
    let Some(message) = args.message else {
        workspace.save(&ctx.paths)?;
        println!("chat history cleared");
        return Ok(());
    };
    workspace.chat_history.push(ChatMessage::user(message));
    let lm = ctx.provider()?;
    let reply = chat_response(lm.as_deref(), &workspace.chat_history, workspace.sections());
    workspace.chat_history.push(ChatMessage::assistant(reply.clone()));
    workspace.save(&ctx.paths)?;
    println!("{reply}");
    Ok(())
}

fn run_clear(ctx: &AppContext) -> Result<()> {
    let mut workspace = ctx.load_workspace()?;
    workspace.clear();
    workspace.save(&ctx.paths)?;
    println!("workspace cleared");
    Ok(())
}
