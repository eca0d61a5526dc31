//! Testing utilities for the Strix workspace
//!
//! Shared catalog fixture, scope helpers and a scripted tool runner.

#![allow(missing_docs)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use strix_core::{EngineConfig, ExecutionFault, RunOutput, RunRequest, ToolRunner};
use strix_model::prelude::*;

/// Catalog with a port scanner, a directory brute-forcer and a login
/// brute-forcer chained in the `recon` process
pub const CATALOG: &str = r#"
[[tools]]
name = "nmap"
command = "nmap"
output_format = "gnmap"
intensities = [
    { rank = "sneaky", argument = "-T1" },
    { rank = "normal", argument = "-T3" },
    { rank = "insane", argument = "-T5" },
]

[[tools.configurations]]
name = "tcp"
stage = "enumeration"
default = true
template = "{command} {intensity} -sV {ports} {host} -oG {output}"
outputs = ["host", "port"]

[[tools.configurations.arguments]]
name = "host"
template = "{host}"
required = true
inputs = [{ type = "host" }]

[[tools.configurations.arguments]]
name = "ports"
template = "-p {ports_commas}"
multiple = true
inputs = [{ type = "port" }]

[[tools]]
name = "gobuster"
command = "gobuster"
intensities = [
    { rank = "low", argument = "-t 10" },
    { rank = "hard", argument = "-t 50" },
]

[[tools.configurations]]
name = "dir"
stage = "enumeration"
template = "{command} dir {intensity} -u {url} -w {wordlist}"
outputs = ["path"]

[[tools.configurations.arguments]]
name = "url"
template = "{url}"
required = true
inputs = [{ type = "port", filter = "http" }]

[[tools.configurations.arguments]]
name = "wordlist"
template = "{wordlist}"
required = true
inputs = [{ type = "wordlist", filter = "endpoint" }]

[[tools]]
name = "hydra"
command = "hydra"
intensities = [
    { rank = "hard", argument = "-t 4" },
    { rank = "insane", argument = "-t 16" },
]

[[tools.configurations]]
name = "ssh"
stage = "services"
template = "{command} {intensity} {target} ssh"
outputs = ["credential"]

[[tools.configurations.arguments]]
name = "target"
template = "-s {port} {host}"
required = true
inputs = [{ type = "port", filter = "ssh" }]

[[processes]]
name = "recon"
description = "Port scan, then web and ssh follow-ups"
steps = [
    { tool = "hydra", priority = 1 },
    { tool = "gobuster", priority = 5 },
    { tool = "nmap", priority = 10 },
]
"#;

/// Greppable nmap report with one ssh and two web ports
pub const NMAP_REPORT: &str = "# Nmap 7.94 scan\n\
Host: 10.0.0.1 ()\tStatus: Up\n\
Host: 10.0.0.1 ()\tPorts: 22/open/tcp//ssh//OpenSSH 8.9/, 80/open/tcp//http///, 8080/open/tcp//http-proxy///\n\
# Nmap done\n";

pub fn catalog() -> Arc<Catalog> {
    Arc::new(Catalog::from_toml_str(CATALOG).unwrap())
}

pub fn scope() -> TargetScope {
    TargetScope::new("10.0.0.1")
}

pub fn scope_with_wordlist() -> TargetScope {
    scope().with_wordlist("common", WordlistKind::Endpoint, "/usr/share/wordlists/common.txt")
}

pub fn host(address: &str) -> Arc<Host> {
    Arc::new(Host::new(address))
}

pub fn port(host: &Arc<Host>, number: u16, service: &str) -> Entity {
    Port::new(Some(Arc::clone(host)), number).with_service(service).into()
}

pub fn engine_config(reports_dir: &Path) -> EngineConfig {
    EngineConfig::new().with_workers(2).with_reports_dir(reports_dir)
}

/// Canned behaviour of one tool
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    /// Written to the argument ending in `.<output format>`
    pub report: Option<String>,
    pub delay: Option<Duration>,
}

impl Script {
    pub fn stdout(stdout: &str) -> Self {
        Self {
            stdout: stdout.to_string(),
            ..Self::default()
        }
    }

    pub fn failing(exit_code: i32, stderr: &str) -> Self {
        Self {
            stderr: stderr.to_string(),
            exit_code,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_report(mut self, report: &str) -> Self {
        self.report = Some(report.to_string());
        self
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// One recorded invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub tool: String,
    pub argv: Vec<String>,
    pub env: Vec<(String, String)>,
}

/// Tool runner answering from scripts instead of spawning processes.
/// Tools without a script are reported as not installed.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    scripts: Mutex<HashMap<String, Script>>,
    missing: Mutex<HashSet<String>>,
    invocations: Mutex<Vec<Invocation>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_script(self, tool: &str, script: Script) -> Self {
        self.scripts.lock().insert(tool.to_string(), script);
        self
    }

    /// Script the tool but report it as not installed
    #[must_use]
    pub fn uninstalled(self, tool: &str) -> Self {
        self.missing.lock().insert(tool.to_string());
        self
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().clone()
    }

    pub fn invocations_of(&self, tool: &str) -> Vec<Invocation> {
        self.invocations().into_iter().filter(|i| i.tool == tool).collect()
    }
}

#[async_trait]
impl ToolRunner for ScriptedRunner {
    async fn is_installed(&self, tool: &Tool) -> bool {
        !self.missing.lock().contains(&tool.name) && self.scripts.lock().contains_key(&tool.name)
    }

    async fn run(&self, request: RunRequest<'_>) -> Result<RunOutput, ExecutionFault> {
        let script = self
            .scripts
            .lock()
            .get(&request.tool.name)
            .cloned()
            .unwrap_or_default();
        self.invocations.lock().push(Invocation {
            tool: request.tool.name.clone(),
            argv: request.argv.to_vec(),
            env: request.env.to_vec(),
        });

        if let Some(delay) = script.delay {
            match request.timeout {
                Some(limit) if limit < delay => {
                    tokio::time::sleep(limit).await;
                    return Err(ExecutionFault::ToolFault {
                        tool: request.tool.name.clone(),
                        exit_code: None,
                        message: format!("timed out after {}s", limit.as_secs()),
                    });
                }
                _ => tokio::time::sleep(delay).await,
            }
        }

        if let (Some(report), Some(format)) = (&script.report, &request.tool.output_format) {
            let suffix = format!(".{format}");
            if let Some(path) = request.argv.iter().find(|a| a.ends_with(&suffix)) {
                std::fs::write(path, report).map_err(|source| ExecutionFault::Io {
                    path: path.into(),
                    source,
                })?;
            }
        }

        Ok(RunOutput {
            stdout: script.stdout,
            stderr: script.stderr,
            exit_code: Some(script.exit_code),
        })
    }
}
