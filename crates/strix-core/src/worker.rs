//! Worker pool
//!
//! Each worker pulls one ready job at a time from the shared queue, runs it
//! to a terminal status and publishes a [`CompletionEvent`]. Workers keep no
//! state of their own; everything lives in [`Shared`].

use crate::config::EngineConfig;
use crate::error::ExecutionFault;
use crate::parser::{ParseInput, ParserRegistry};
use crate::runner::{RunOutput, RunRequest, ToolRunner};
use crate::types::ExecutionPayload;
use std::path::PathBuf;
use std::sync::Arc;
use strix_kernel::{
    CompletionEvent, ExecutionRecord, ExecutionStatus, FindingStore, Job, Ledger, WorkQueue,
};
use strix_model::{Entity, ExecutionId, TypeRegistry};
use strix_planner::{fan_out, resolve, ResolveContext};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::Instrument;

/// State shared by the engine and its workers
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) registry: Arc<TypeRegistry>,
    pub(crate) config: EngineConfig,
    pub(crate) ledger: Ledger,
    pub(crate) queue: WorkQueue<ExecutionPayload>,
    pub(crate) store: FindingStore,
    pub(crate) runner: Arc<dyn ToolRunner>,
    pub(crate) parsers: ParserRegistry,
    pub(crate) events: mpsc::UnboundedSender<CompletionEvent>,
}

/// Result of a successful run
#[derive(Debug)]
struct RunSummary {
    output: RunOutput,
    output_file: Option<String>,
    findings: usize,
}

/// Spawn `count` workers over the shared queue
pub(crate) fn spawn_workers(shared: &Arc<Shared>, count: usize) -> Vec<JoinHandle<()>> {
    (0..count)
        .map(|index| tokio::spawn(worker_loop(index, Arc::clone(shared))))
        .collect()
}

async fn worker_loop(index: usize, shared: Arc<Shared>) {
    tracing::debug!(worker = index, "worker started");
    while let Some(job) = shared.queue.next().await {
        let id = job.id;
        let task = job.task;
        let span = tracing::info_span!("execution", worker = index, execution = %id, task = %task);
        let status = run_job(&shared, job).instrument(span).await;
        shared.queue.complete(id);
        if let Some(status) = status {
            if shared.events.send(CompletionEvent { execution: id, task, status }).is_err() {
                tracing::warn!(execution = %id, "completion event dropped, aggregator is gone");
            }
        }
    }
    tracing::debug!(worker = index, "worker stopped");
}

/// Run one job. Returns the terminal status it reached, or `None` when
/// the execution was cancelled underneath the worker.
async fn run_job(shared: &Shared, job: Job<ExecutionPayload>) -> Option<ExecutionStatus> {
    match shared.ledger.transition(job.id, ExecutionStatus::Running) {
        Ok(_) => {}
        Err(e) if e.is_stale() => {
            tracing::debug!("execution already terminal, discarding job");
            return None;
        }
        Err(e) => {
            tracing::error!(error = %e, "execution could not start");
            return None;
        }
    }
    tracing::info!(configuration = %job.payload.configuration.key(), "execution started");

    let bundle = if job.dependencies.is_empty() {
        job.payload.bundle.clone()
    } else {
        expand(shared, &job)
    };

    let (status, fault) = match execute(shared, job.id, &job.payload, &bundle).await {
        Ok(summary) => {
            let RunSummary {
                output,
                output_file,
                findings,
            } = summary;
            let recorded = shared.ledger.update_execution(job.id, |record| {
                record.output_file = output_file;
                record.output_plain = Some(output.stdout);
                record.output_error = (!output.stderr.is_empty()).then_some(output.stderr);
            });
            if let Err(e) = recorded {
                tracing::error!(error = %e, "execution output not recorded");
            }
            tracing::info!(findings, "execution completed");
            (ExecutionStatus::Completed, None)
        }
        Err(fault) if fault.is_skip() => {
            tracing::info!(reason = %fault, "execution skipped");
            (ExecutionStatus::Skipped, Some(fault))
        }
        Err(fault) => {
            tracing::warn!(error = %fault, "execution failed");
            (ExecutionStatus::Error, Some(fault))
        }
    };

    if let Some(fault) = fault {
        let format = job.payload.tool.output_format.clone();
        let recorded = shared.ledger.update_execution(job.id, |record| {
            record.output_error = Some(fault.to_string());
            if status == ExecutionStatus::Error {
                record.output_file = format.map(|f| format!("output.{f}"));
            }
        });
        if let Err(e) = recorded {
            tracing::error!(error = %e, "execution fault not recorded");
        }
    }

    match shared.ledger.transition(job.id, status) {
        Ok(_) => Some(status),
        Err(e) if e.is_stale() => {
            tracing::debug!("execution cancelled while running, result discarded");
            None
        }
        Err(e) => {
            tracing::error!(error = %e, "execution could not terminate");
            None
        }
    }
}

/// Re-partition a dependent job over the findings of its dependencies.
/// Keeps the first bundle and enqueues the others as new executions.
fn expand(shared: &Shared, job: &Job<ExecutionPayload>) -> Vec<Entity> {
    let payload = &job.payload;
    let upstream = shared.store.observed_by(&job.dependencies);
    let ctx = ResolveContext {
        registry: &shared.registry,
        tool: &payload.tool,
        intensity: &payload.intensity,
        output: None,
        filter: payload.scope.filter_context(),
    };
    let mut bundles = fan_out(&payload.configuration, &payload.bundle, &upstream, &ctx).into_iter();
    let Some(own) = bundles.next() else {
        return payload.bundle.clone();
    };

    let Some(parent) = shared.ledger.execution(job.id) else {
        return own;
    };
    let mut jobs = Vec::new();
    for bundle in bundles {
        let id = ExecutionId::new();
        let record = ExecutionRecord::new(id, job.task, parent.step, payload.configuration.key(), parent.group);
        match shared.ledger.insert_execution(record) {
            Ok(()) => {}
            Err(e) if e.is_stale() => {
                tracing::debug!("task finalized during fan-out, remaining bundles dropped");
                break;
            }
            Err(e) => {
                tracing::warn!(error = %e, "fan-out execution not recorded");
                continue;
            }
        }
        jobs.push(Job {
            id,
            task: job.task,
            dependencies: Vec::new(),
            payload: ExecutionPayload {
                bundle,
                ..payload.clone()
            },
        });
    }
    if jobs.is_empty() {
        return own;
    }

    let added: Vec<ExecutionId> = jobs.iter().map(|j| j.id).collect();
    match shared.queue.push_fan_out(job.id, jobs) {
        Ok(()) => tracing::info!(extra = added.len(), "execution fanned out"),
        Err(e) => {
            tracing::warn!(error = %e, "fan-out executions not queued");
            for id in added {
                if let Err(e) = shared.ledger.transition(id, ExecutionStatus::Cancelled) {
                    tracing::debug!(error = %e, execution = %id, "fan-out execution already terminal");
                }
            }
        }
    }
    own
}

/// Run the tool on one bundle and persist what it found
async fn execute(
    shared: &Shared,
    id: ExecutionId,
    payload: &ExecutionPayload,
    bundle: &[Entity],
) -> Result<RunSummary, ExecutionFault> {
    let tool = &payload.tool;
    if !shared.runner.is_installed(tool).await {
        return Err(ExecutionFault::ToolNotInstalled(tool.name.clone()));
    }

    let reports_dir = &shared.config.reports_dir;
    let report_path: Option<PathBuf> = match &tool.output_format {
        Some(format) => {
            tokio::fs::create_dir_all(reports_dir)
                .await
                .map_err(|source| ExecutionFault::Io {
                    path: reports_dir.clone(),
                    source,
                })?;
            Some(reports_dir.join(format!("{}.{format}", uuid::Uuid::new_v4())))
        }
        None => None,
    };
    let output_file = report_path.as_ref().map(|p| p.display().to_string());

    let ctx = ResolveContext {
        registry: &shared.registry,
        tool,
        intensity: &payload.intensity,
        output: output_file.as_deref(),
        filter: payload.scope.filter_context(),
    };
    let resolved = resolve(bundle, &payload.configuration, &ctx)?;
    let (env, argv) = resolved.split_environment(&tool.command);

    let cwd = if reports_dir.is_dir() {
        reports_dir.clone()
    } else {
        std::env::temp_dir()
    };
    let output = shared
        .runner
        .run(RunRequest {
            tool,
            argv: &argv,
            env: &env,
            cwd: &cwd,
            timeout: tool.timeout.or_else(|| shared.config.default_timeout()),
        })
        .await?;

    if !output.success() && !tool.ignore_exit_code {
        let stderr = output.stderr.trim();
        let message = if stderr.is_empty() {
            match output.exit_code {
                Some(code) => format!("exit status {code}"),
                None => "terminated by signal".to_string(),
            }
        } else {
            stderr.to_string()
        };
        return Err(ExecutionFault::ToolFault {
            tool: tool.name.clone(),
            exit_code: output.exit_code,
            message,
        });
    }

    let report = match &report_path {
        Some(path) => tokio::fs::read_to_string(path).await.ok(),
        None => None,
    };
    let drafts = shared.parsers.parse(&ParseInput {
        tool: &tool.name,
        stdout: &output.stdout,
        report: report.as_deref(),
    })?;

    // a cancelled execution must not contribute findings
    if shared
        .ledger
        .execution(id)
        .is_some_and(|r| r.status.is_terminal())
    {
        return Ok(RunSummary {
            output,
            output_file,
            findings: 0,
        });
    }
    let findings = shared
        .store
        .persist_batch(payload.scope.target.id, &drafts, &resolved.used, id)
        .len();

    Ok(RunSummary {
        output,
        output_file,
        findings,
    })
}
