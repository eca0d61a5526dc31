//! End-to-end engine tests over the scripted runner

use mockall::mock;
use pretty_assertions::assert_eq;
use std::time::Duration;
use strix_core::prelude::*;
use strix_core::ObserverError;
use strix_kernel::{ExecutionRecord, FindingRecord, TaskRecord};
use strix_model::EntityKind;
use strix_test_utils::{catalog, engine_config, scope, scope_with_wordlist, Script, ScriptedRunner, NMAP_REPORT};
use tokio::sync::mpsc;

mock! {
    pub Observer {}

    #[async_trait::async_trait]
    impl TaskObserver for Observer {
        fn name(&self) -> &'static str;
        async fn on_task_finished(&self, task: &TaskRecord, findings: &[FindingRecord]) -> Result<(), ObserverError>;
    }
}

fn nmap() -> Script {
    Script::stdout("Nmap done").with_report(NMAP_REPORT)
}

fn engine(runner: ScriptedRunner, reports: &tempfile::TempDir) -> (Engine, Arc<ScriptedRunner>) {
    let runner = Arc::new(runner);
    let engine = Engine::builder(catalog())
        .with_config(engine_config(reports.path()))
        .with_runner(runner.clone())
        .build()
        .unwrap();
    (engine, runner)
}

async fn finish(engine: &Engine, task: strix_model::TaskId) -> TaskRecord {
    tokio::time::timeout(Duration::from_secs(10), engine.wait_for(task))
        .await
        .expect("task did not finish")
        .unwrap()
}

fn statuses(executions: &[ExecutionRecord], configuration: &str) -> Vec<ExecutionStatus> {
    executions
        .iter()
        .filter(|e| e.configuration == configuration)
        .map(|e| e.status)
        .collect()
}

#[tokio::test]
async fn test_tool_task_persists_findings() {
    let reports = tempfile::tempdir().unwrap();
    let (engine, runner) = engine(ScriptedRunner::new().with_script("nmap", nmap()), &reports);

    let task = engine
        .create_task(TaskRequest::new(TaskSubject::tool("nmap"), scope(), IntensityRank::Normal))
        .unwrap();
    let record = finish(&engine, task).await;
    assert_eq!(record.status, TaskStatus::Completed);
    assert!(record.start.is_some());

    let executions = engine.executions(task).unwrap();
    assert_eq!(executions.len(), 1);
    let execution = &executions[0];
    assert_eq!(execution.status, ExecutionStatus::Completed);
    assert_eq!(execution.output_plain.as_deref(), Some("Nmap done"));
    let report = execution.output_file.clone().unwrap();
    assert!(report.ends_with(".gnmap"));
    assert!(report.starts_with(&reports.path().display().to_string()));

    let argv = &runner.invocations_of("nmap")[0].argv;
    assert_eq!(argv[..4].to_vec(), vec!["nmap", "-T3", "-sV", "10.0.0.1"]);
    assert_eq!(argv[4..].to_vec(), vec!["-oG".to_string(), report]);

    let findings = engine.task_findings(task).unwrap();
    assert_eq!(findings.len(), 4);
    let ports = findings.iter().filter(|f| f.entity.kind() == EntityKind::Port).count();
    assert_eq!(ports, 3);
    assert!(findings.iter().all(|f| f.executions == vec![execution.id]));

    engine.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_process_fans_out_over_upstream_findings() {
    let reports = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::new()
        .with_script("nmap", nmap())
        .with_script("gobuster", Script::stdout("/admin (Status: 301)"))
        .with_script("hydra", Script::stdout("0 valid passwords found"));
    let (engine, runner) = engine(runner, &reports);

    let task = engine
        .create_task(TaskRequest::new(
            TaskSubject::process("recon"),
            scope_with_wordlist(),
            IntensityRank::Insane,
        ))
        .unwrap();
    let record = finish(&engine, task).await;
    assert_eq!(record.status, TaskStatus::Completed);

    let executions = engine.executions(task).unwrap();
    assert_eq!(statuses(&executions, "nmap/tcp"), vec![ExecutionStatus::Completed]);
    assert_eq!(statuses(&executions, "gobuster/dir").len(), 2);
    assert_eq!(statuses(&executions, "hydra/ssh"), vec![ExecutionStatus::Completed]);
    assert!(executions
        .iter()
        .filter(|e| e.configuration != "nmap/tcp")
        .all(|e| e.group == 1 && e.status == ExecutionStatus::Completed));

    let mut urls: Vec<String> = runner
        .invocations_of("gobuster")
        .into_iter()
        .map(|i| i.argv[i.argv.iter().position(|a| a == "-u").unwrap() + 1].clone())
        .collect();
    urls.sort();
    assert_eq!(urls, vec!["http://10.0.0.1/", "http://10.0.0.1:8080/"]);
    assert!(runner.invocations_of("gobuster").iter().all(|i| i.argv.contains(&"-t".to_string())
        && i.argv.contains(&"/usr/share/wordlists/common.txt".to_string())));

    let hydra = &runner.invocations_of("hydra")[0].argv;
    assert_eq!(hydra.clone(), vec!["hydra", "-t", "16", "-s", "22", "10.0.0.1", "ssh"]);

    engine.shutdown().await;
}

#[tokio::test]
async fn test_missing_required_argument_skips() {
    let reports = tempfile::tempdir().unwrap();
    let runner = ScriptedRunner::new()
        .with_script("nmap", nmap())
        .with_script("gobuster", Script::stdout(""));
    let (engine, runner) = engine(runner, &reports);

    // no wordlist declared, hydra not admissible at this intensity
    let request = TaskRequest::new(TaskSubject::process("recon"), scope(), IntensityRank::Normal);
    let plan = engine.plan(&request).unwrap();
    assert_eq!(plan.dropped.len(), 1);
    assert_eq!(plan.dropped[0].configuration, "hydra/ssh");

    let task = engine.create_task(request).unwrap();
    let record = finish(&engine, task).await;
    assert_eq!(record.status, TaskStatus::Completed);

    let executions = engine.executions(task).unwrap();
    assert_eq!(statuses(&executions, "gobuster/dir"), vec![ExecutionStatus::Skipped]);
    let skipped = executions.iter().find(|e| e.configuration == "gobuster/dir").unwrap();
    assert!(skipped
        .output_error
        .as_deref()
        .unwrap()
        .contains("is required to execute tool 'gobuster'"));
    assert!(runner.invocations_of("gobuster").is_empty());

    engine.shutdown().await;
}

#[tokio::test]
async fn test_uninstalled_tool_skips() {
    let reports = tempfile::tempdir().unwrap();
    let (engine, runner) = engine(ScriptedRunner::new().with_script("nmap", nmap()).uninstalled("nmap"), &reports);

    let task = engine
        .create_task(TaskRequest::new(TaskSubject::tool("nmap"), scope(), IntensityRank::Insane))
        .unwrap();
    assert_eq!(finish(&engine, task).await.status, TaskStatus::Completed);

    let execution = &engine.executions(task).unwrap()[0];
    assert_eq!(execution.status, ExecutionStatus::Skipped);
    assert_eq!(execution.output_error.as_deref(), Some("tool 'nmap' is not installed"));
    assert!(runner.invocations().is_empty());

    engine.shutdown().await;
}

#[tokio::test]
async fn test_tool_fault_errors_task() {
    let reports = tempfile::tempdir().unwrap();
    let (engine, _) = engine(
        ScriptedRunner::new().with_script("nmap", Script::failing(1, "requires root privileges")),
        &reports,
    );

    let task = engine
        .create_task(TaskRequest::new(TaskSubject::tool("nmap"), scope(), IntensityRank::Sneaky))
        .unwrap();
    assert_eq!(finish(&engine, task).await.status, TaskStatus::Error);

    let execution = &engine.executions(task).unwrap()[0];
    assert_eq!(execution.status, ExecutionStatus::Error);
    assert_eq!(execution.output_file.as_deref(), Some("output.gnmap"));
    assert_eq!(execution.output_error.as_deref(), Some("nmap failed: requires root privileges"));
    assert!(engine.task_findings(task).unwrap().is_empty());

    engine.shutdown().await;
}

#[tokio::test]
async fn test_inadmissible_requests_rejected() {
    let reports = tempfile::tempdir().unwrap();
    let (engine, _) = engine(ScriptedRunner::new(), &reports);

    let err = engine
        .create_task(TaskRequest::new(TaskSubject::tool("hydra"), scope(), IntensityRank::Normal))
        .unwrap_err();
    assert!(err.is_rejection());
    let err = engine
        .create_task(TaskRequest::new(TaskSubject::process("takeover"), scope(), IntensityRank::Normal))
        .unwrap_err();
    assert!(err.is_rejection());
    assert!(engine.tasks().is_empty());

    engine.shutdown().await;
}

#[tokio::test]
async fn test_cancel_discards_running_result() {
    let reports = tempfile::tempdir().unwrap();
    let (engine, _) = engine(
        ScriptedRunner::new().with_script("nmap", nmap().with_delay(Duration::from_millis(300))),
        &reports,
    );

    let task = engine
        .create_task(TaskRequest::new(TaskSubject::tool("nmap"), scope(), IntensityRank::Normal))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let cancelled = engine.cancel_task(task).unwrap();
    assert_eq!(cancelled.len(), 1);
    assert_eq!(finish(&engine, task).await.status, TaskStatus::Cancelled);

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(engine.task(task).unwrap().status, TaskStatus::Cancelled);
    assert_eq!(engine.executions(task).unwrap()[0].status, ExecutionStatus::Cancelled);
    assert!(engine.task_findings(task).unwrap().is_empty());

    assert!(engine.cancel_task(strix_model::TaskId::new()).is_err());
    engine.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancel_during_fan_out_stops_every_branch() {
    let reports = tempfile::tempdir().unwrap();
    let slow = Duration::from_millis(300);
    let runner = ScriptedRunner::new()
        .with_script("nmap", nmap())
        .with_script("gobuster", Script::stdout("/admin (Status: 301)").with_delay(slow))
        .with_script("hydra", Script::stdout("0 valid passwords found").with_delay(slow));
    let (engine, runner) = engine(runner, &reports);

    let task = engine
        .create_task(TaskRequest::new(
            TaskSubject::process("recon"),
            scope_with_wordlist(),
            IntensityRank::Insane,
        ))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    engine.cancel_task(task).unwrap();
    let record = finish(&engine, task).await;
    assert_eq!(record.status, TaskStatus::Cancelled);
    let at_cancel = engine.executions(task).unwrap();
    let invoked = runner.invocations().len();

    tokio::time::sleep(Duration::from_millis(600)).await;
    let executions = engine.executions(task).unwrap();
    assert_eq!(executions.len(), at_cancel.len());
    assert_eq!(statuses(&executions, "nmap/tcp"), vec![ExecutionStatus::Completed]);
    assert!(executions
        .iter()
        .filter(|e| e.configuration != "nmap/tcp")
        .all(|e| e.status == ExecutionStatus::Cancelled));
    assert_eq!(runner.invocations().len(), invoked);
    assert_eq!(engine.task(task).unwrap().status, TaskStatus::Cancelled);
    assert!(engine.task_findings(task).unwrap().iter().all(|f| f.entity.kind() != EntityKind::Path));

    engine.shutdown().await;
}

#[tokio::test]
async fn test_repeat_runs_definition_again() {
    let reports = tempfile::tempdir().unwrap();
    let (engine, runner) = engine(ScriptedRunner::new().with_script("nmap", nmap()), &reports);

    let first = engine
        .create_task(TaskRequest::new(TaskSubject::tool("nmap"), scope(), IntensityRank::Normal))
        .unwrap();
    finish(&engine, first).await;
    let second = engine.repeat_task(first).unwrap();
    assert_ne!(first, second);
    assert_eq!(finish(&engine, second).await.status, TaskStatus::Completed);
    assert_eq!(runner.invocations_of("nmap").len(), 2);

    // findings merge into the same records
    let hosts = engine.findings(&FindingQuery {
        kind: Some(EntityKind::Host),
        ..FindingQuery::default()
    });
    assert_eq!(hosts.len(), 1);
    assert_eq!(hosts[0].executions.len(), 2);

    engine.shutdown().await;
}

#[tokio::test]
async fn test_scheduled_task_starts_later() {
    let reports = tempfile::tempdir().unwrap();
    let (engine, runner) = engine(ScriptedRunner::new().with_script("nmap", nmap()), &reports);

    let task = engine
        .create_task(
            TaskRequest::new(TaskSubject::tool("nmap"), scope(), IntensityRank::Normal)
                .scheduled_in(Duration::from_millis(200)),
        )
        .unwrap();
    assert_eq!(engine.task(task).unwrap().status, TaskStatus::Requested);
    assert!(engine.executions(task).unwrap().is_empty());
    assert!(runner.invocations().is_empty());

    assert_eq!(finish(&engine, task).await.status, TaskStatus::Completed);
    assert_eq!(runner.invocations().len(), 1);

    engine.shutdown().await;
}

#[tokio::test]
async fn test_cancelled_schedule_never_starts() {
    let reports = tempfile::tempdir().unwrap();
    let (engine, runner) = engine(ScriptedRunner::new().with_script("nmap", nmap()), &reports);

    let task = engine
        .create_task(
            TaskRequest::new(TaskSubject::tool("nmap"), scope(), IntensityRank::Normal)
                .scheduled_in(Duration::from_millis(100)),
        )
        .unwrap();
    assert!(engine.cancel_task(task).unwrap().is_empty());
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(engine.task(task).unwrap().status, TaskStatus::Cancelled);
    assert!(runner.invocations().is_empty());

    engine.shutdown().await;
}

#[tokio::test]
async fn test_repeat_every_until_cancelled() {
    let reports = tempfile::tempdir().unwrap();
    let (engine, _) = engine(ScriptedRunner::new().with_script("nmap", nmap()), &reports);

    let task = engine
        .create_task(
            TaskRequest::new(TaskSubject::tool("nmap"), scope(), IntensityRank::Normal)
                .repeat_every(Duration::from_millis(100)),
        )
        .unwrap();
    tokio::time::sleep(Duration::from_millis(450)).await;
    let repeated = engine.tasks().len();
    assert!(repeated >= 3, "only {repeated} tasks after four intervals");

    // the first run has long completed; cancelling still ends the series
    assert!(engine.cancel_task(task).unwrap().is_empty());
    let record = engine.task(task).unwrap();
    assert_eq!(record.status, TaskStatus::Completed);
    assert!(record.cancel_requested);
    tokio::time::sleep(Duration::from_millis(350)).await;
    assert!(engine.tasks().len() <= repeated + 1);

    engine.shutdown().await;
}

#[tokio::test]
async fn test_observer_receives_findings() {
    let reports = tempfile::tempdir().unwrap();
    let (sender, mut received) = mpsc::unbounded_channel();
    let mut observer = MockObserver::new();
    observer.expect_name().return_const("mock");
    observer
        .expect_on_task_finished()
        .times(1)
        .returning(move |task, findings| {
            sender.send((task.status, findings.len())).unwrap();
            Err(ObserverError {
                observer: "mock".into(),
                message: "sync endpoint unreachable".into(),
            })
        });

    let engine = Engine::builder(catalog())
        .with_config(engine_config(reports.path()))
        .with_runner(Arc::new(ScriptedRunner::new().with_script("nmap", nmap())))
        .with_observer(Arc::new(observer))
        .build()
        .unwrap();

    let task = engine
        .create_task(TaskRequest::new(TaskSubject::tool("nmap"), scope(), IntensityRank::Normal))
        .unwrap();
    finish(&engine, task).await;
    let (status, findings) = tokio::time::timeout(Duration::from_secs(5), received.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(status, TaskStatus::Completed);
    assert_eq!(findings, 4);

    // a failing observer leaves the task untouched
    assert_eq!(engine.task(task).unwrap().status, TaskStatus::Completed);
    engine.shutdown().await;
}
