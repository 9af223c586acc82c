//! Local LM command provider.
//!
//! Delegates to a user-configured command instead of talking HTTP, so any
//! local model runner or wrapper script can act as the LM. The prompt is
//! written to the command's stdin and the reply is read from stdout.
//!
//! Argument placeholders:
//! - `{schema}` is replaced with the response JSON schema (compact JSON)
//!
//! The child also sees `CHARTER_LM_KIND` (`audit`, `fix`, `consistency`,
//! `ingest`, or `chat`) so a wrapper can route calls.
use super::{excerpt, parse_json_response, ChatMessage, LmCallKind, LmProvider, StructuredCall};
use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use std::time::Instant;

pub const LM_KIND_ENV: &str = "CHARTER_LM_KIND";

#[derive(Debug)]
pub struct CommandProvider {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandProvider {
    /// Parse a shell-style command line and resolve its program on `PATH`.
    pub fn new(command: &str) -> Result<Self> {
        let mut argv =
            shell_words::split(command).with_context(|| format!("parse LM command: {command}"))?;
        if argv.is_empty() {
            return Err(anyhow!("LM command is empty"));
        }
        let name = argv.remove(0);
        let program =
            which::which(&name).with_context(|| format!("resolve LM command program `{name}`"))?;
        Ok(Self {
            program,
            args: argv,
        })
    }

    fn run(&self, kind: LmCallKind, prompt: &str, schema: Option<&str>) -> Result<String> {
        let args: Vec<String> = self
            .args
            .iter()
            .map(|arg| match schema {
                Some(schema) if arg == "{schema}" => schema.to_string(),
                _ => arg.clone(),
            })
            .collect();

        let start = Instant::now();
        let mut child = Command::new(&self.program)
            .args(&args)
            .env(LM_KIND_ENV, kind.as_str())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("spawn LM command {}", self.program.display()))?;

        // Feed stdin while stdout/stderr drain, so a chatty child cannot
        // fill its pipes and stall on a prompt it has not finished reading.
        let stdin = child.stdin.take();
        let output = std::thread::scope(|scope| -> Result<Output> {
            let writer = scope.spawn(move || match stdin {
                Some(mut stdin) => stdin.write_all(prompt.as_bytes()),
                None => Ok(()),
            });
            let output = child.wait_with_output().context("wait for LM command")?;
            match writer.join() {
                Ok(Ok(())) => {}
                // The child may answer without reading the whole prompt.
                Ok(Err(err)) if err.kind() == ErrorKind::BrokenPipe => {
                    tracing::debug!(kind = kind.as_str(), "LM command closed stdin early");
                }
                Ok(Err(err)) => return Err(err).context("write prompt to LM stdin"),
                Err(_) => return Err(anyhow!("LM stdin writer panicked")),
            }
            Ok(output)
        })?;
        tracing::info!(
            kind = kind.as_str(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            prompt_bytes = prompt.len(),
            response_bytes = output.stdout.len(),
            "lm command complete"
        );

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "LM command failed with status {}: {}",
                output.status,
                excerpt(stderr.trim(), 500)
            ));
        }
        String::from_utf8(output.stdout).context("decode LM stdout as UTF-8")
    }
}

impl LmProvider for CommandProvider {
    fn structured(&self, call: &StructuredCall<'_>) -> Result<Value> {
        let schema = serde_json::to_string(&call.schema.schema).context("serialize schema")?;
        let prompt = structured_prompt(call)?;
        let text = self.run(call.kind, &prompt, Some(&schema))?;
        parse_json_response(&text)
    }

    fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        let prompt = chat_prompt(messages);
        let text = self.run(LmCallKind::Chat, &prompt, None)?;
        let reply = text.trim();
        if reply.is_empty() {
            return Err(anyhow!("LM command returned an empty reply"));
        }
        Ok(reply.to_string())
    }
}

fn structured_prompt(call: &StructuredCall<'_>) -> Result<String> {
    let schema =
        serde_json::to_string_pretty(&call.schema.schema).context("serialize schema")?;
    Ok(format!(
        "{system}\n\n# Request\n{user}\n\n# Response Format\nRespond with a single JSON object matching this schema. No prose or code fences.\n```json\n{schema}\n```\n",
        system = call.system.trim_end(),
        user = call.user,
    ))
}

fn chat_prompt(messages: &[ChatMessage]) -> String {
    let mut prompt = String::new();
    for message in messages {
        prompt.push_str("## ");
        prompt.push_str(message.role.as_str());
        prompt.push('\n');
        prompt.push_str(message.content.trim_end());
        prompt.push_str("\n\n");
    }
    prompt.push_str("## assistant\n");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::fix_schema;

    fn call(schema: &crate::schema::ResponseSchema) -> StructuredCall<'_> {
        StructuredCall {
            kind: LmCallKind::Fix,
            system: "Fix the text.",
            user: "Apply the fix.",
            schema,
        }
    }

    #[test]
    fn empty_command_is_rejected() {
        assert!(CommandProvider::new("   ").is_err());
        assert!(CommandProvider::new("definitely-not-a-real-lm-binary-xyz").is_err());
    }

    #[test]
    fn structured_prompt_embeds_schema() {
        let schema = fix_schema();
        let prompt = structured_prompt(&call(&schema)).unwrap();
        assert!(prompt.starts_with("Fix the text."));
        assert!(prompt.contains("# Request\nApply the fix."));
        assert!(prompt.contains("\"fixed_content\""));
    }

    #[test]
    fn chat_prompt_ends_with_assistant_turn() {
        let prompt = chat_prompt(&[ChatMessage::system("ctx"), ChatMessage::user("q?")]);
        assert_eq!(prompt, "## system\nctx\n\n## user\nq?\n\n## assistant\n");
    }

    #[cfg(unix)]
    #[test]
    fn runs_command_and_parses_stdout() {
        let lm = CommandProvider::new(
            r#"sh -c 'cat >/dev/null; printf "%s" "{\"fixed_content\": \"$CHARTER_LM_KIND\"}"'"#,
        )
        .unwrap();
        let schema = fix_schema();
        let value = lm.structured(&call(&schema)).unwrap();
        assert_eq!(value["fixed_content"], "fix");
    }

    #[cfg(unix)]
    #[test]
    fn substitutes_schema_placeholder() {
        let lm = CommandProvider::new(r#"sh -c 'cat >/dev/null; printf "%s" "$1"' sh {schema}"#)
            .unwrap();
        let schema = fix_schema();
        let value = lm.structured(&call(&schema)).unwrap();
        assert_eq!(value["type"], "object");
    }

    #[cfg(unix)]
    #[test]
    fn failing_command_reports_stderr() {
        let lm = CommandProvider::new(r#"sh -c 'cat >/dev/null; echo boom >&2; exit 3'"#).unwrap();
        let err = lm.chat(&[ChatMessage::user("hi")]).unwrap_err();
        assert!(format!("{err:#}").contains("boom"));
    }

    #[cfg(unix)]
    #[test]
    fn large_stderr_before_reading_prompt_does_not_stall() {
        let lm = CommandProvider::new(
            r#"sh -c 'head -c 262144 /dev/zero >&2; cat >/dev/null; echo ok'"#,
        )
        .unwrap();
        let question = "x".repeat(256 * 1024);
        assert_eq!(lm.chat(&[ChatMessage::user(&question)]).unwrap(), "ok");
    }

    #[cfg(unix)]
    #[test]
    fn command_may_ignore_the_prompt() {
        let lm = CommandProvider::new("sh -c 'echo ok'").unwrap();
        let question = "x".repeat(1024 * 1024);
        assert_eq!(lm.chat(&[ChatMessage::user(&question)]).unwrap(), "ok");
    }
}
