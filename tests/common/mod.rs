//! Shared test infrastructure for integration tests.
//!
//! Every test gets its own temporary workspace and runs the compiled
//! `charter` binary against it. The LM is `tests/mock-lm.sh`, which answers
//! from response files the test writes up front.
#![allow(dead_code)]

use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

const LM_ENV_VARS: &[&str] = &[
    "CHARTER_LM_COMMAND",
    "CHARTER_LM_TIMEOUT_SECS",
    "CHARTER_WORKSPACE",
    "OPENAI_API_KEY",
    "OPENAI_BASE_URL",
    "OPENAI_DEPLOYMENT_NAME",
    "RUST_LOG",
];

fn manifest_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

pub struct TestWorkspace {
    dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("create temp dir");
        fs::create_dir_all(dir.path().join("responses")).expect("create responses dir");
        fs::create_dir_all(dir.path().join("config")).expect("create config dir");
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    fn responses(&self) -> PathBuf {
        self.dir.path().join("responses")
    }

    /// Default reply for every call of `kind`.
    pub fn respond(&self, kind: &str, body: &str) {
        fs::write(self.responses().join(format!("{kind}.txt")), body).expect("write response");
    }

    /// Reply for the `n`-th call (1-based) of `kind`.
    pub fn respond_nth(&self, kind: &str, n: u32, body: &str) {
        fs::write(self.responses().join(format!("{kind}.{n}.txt")), body)
            .expect("write response");
    }

    /// Prompt the mock received on its latest call of `kind`.
    pub fn last_prompt(&self, kind: &str) -> String {
        fs::read_to_string(self.responses().join(format!("prompt.{kind}.txt")))
            .unwrap_or_default()
    }

    pub fn lm_command(&self) -> String {
        let script = manifest_dir().join("tests/mock-lm.sh");
        shell_words::join([
            "sh".to_string(),
            script.display().to_string(),
            self.responses().display().to_string(),
        ])
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_charter"));
        for var in LM_ENV_VARS {
            cmd.env_remove(var);
        }
        cmd.env("XDG_CONFIG_HOME", self.dir.path().join("config"))
            .env("HOME", self.dir.path())
            .arg("--workspace")
            .arg(self.dir.path());
        cmd
    }

    /// Run with the mock LM configured.
    pub fn run(&self, args: &[&str]) -> Output {
        self.command()
            .env("CHARTER_LM_COMMAND", self.lm_command())
            .args(args)
            .output()
            .expect("run charter")
    }

    /// Run with no LM configured anywhere.
    pub fn run_without_lm(&self, args: &[&str]) -> Output {
        self.command().args(args).output().expect("run charter")
    }

    pub fn run_ok(&self, args: &[&str]) -> String {
        expect_success(self.run(args))
    }

    pub fn json(&self, args: &[&str]) -> Value {
        let stdout = self.run_ok(args);
        serde_json::from_str(&stdout).unwrap_or_else(|err| panic!("bad JSON ({err}): {stdout}"))
    }

    pub fn workspace_json(&self) -> Value {
        let text = fs::read_to_string(self.dir.path().join(".charter/workspace.json"))
            .expect("read workspace.json");
        serde_json::from_str(&text).expect("parse workspace.json")
    }

    /// Entries of the LM invocation log.
    pub fn lm_log(&self) -> Vec<Value> {
        let path = self.dir.path().join(".charter/lm_log.jsonl");
        fs::read_to_string(path)
            .unwrap_or_default()
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).expect("parse lm log line"))
            .collect()
    }

    /// Start from the standard template and fill the given sections.
    pub fn standard_charter(&self, contents: &[(&str, &str)]) {
        self.run_ok(&["new", "--template", "Standard Project Charter"]);
        for (id, content) in contents {
            self.run_ok(&["edit", "--section", id, "--content", content]);
        }
    }
}

pub fn expect_success(output: Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    assert!(
        output.status.success(),
        "charter failed ({}):\nstdout: {stdout}\nstderr: {}",
        output.status,
        String::from_utf8_lossy(&output.stderr)
    );
    stdout
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}
