//! `strix` command line

use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use strix_core::{Engine, EngineConfig, ProcessRunner, TaskRequest, TracingObserver};
use strix_kernel::TaskStatus;
use strix_model::prelude::*;
use strix_planner::{Plan, PlanBuilder, TaskSubject};
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    let task_args = [
        Arg::new("catalog")
            .long("catalog")
            .required(true)
            .value_parser(value_parser!(PathBuf))
            .help("Tool catalog file"),
        Arg::new("tool")
            .long("tool")
            .conflicts_with("process")
            .required_unless_present("process")
            .help("Run a single tool"),
        Arg::new("configuration")
            .long("configuration")
            .requires("tool")
            .help("Tool configuration, the default one when omitted"),
        Arg::new("process")
            .long("process")
            .help("Run a process"),
        Arg::new("target")
            .long("target")
            .required(true)
            .help("Target address: host, IP, network or IP range"),
        Arg::new("intensity")
            .long("intensity")
            .default_value("normal")
            .value_parser(value_parser!(IntensityRank))
            .help("Intensity ceiling: sneaky, low, normal, hard or insane"),
        Arg::new("port")
            .long("port")
            .action(ArgAction::Append)
            .value_parser(value_parser!(u16))
            .help("Declared target port"),
        Arg::new("wordlist")
            .long("wordlist")
            .action(ArgAction::Append)
            .help("Endpoint wordlist file"),
        Arg::new("subdomain-wordlist")
            .long("subdomain-wordlist")
            .action(ArgAction::Append)
            .help("Subdomain wordlist file"),
        Arg::new("cve")
            .long("cve")
            .action(ArgAction::Append)
            .help("Vulnerability known to affect the target"),
        Arg::new("auth")
            .long("auth")
            .action(ArgAction::Append)
            .help("Port authentication as PORT:TYPE:NAME:SECRET, TYPE one of basic, bearer, cookie, digest, jwt or ntlm"),
        Arg::new("json")
            .long("json")
            .action(ArgAction::SetTrue)
            .help("Output as JSON"),
    ];

    Command::new("strix")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Dependency-aware planner and executor for security-testing tools")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Engine configuration file"),
        )
        .subcommand(
            Command::new("catalog")
                .about("Validate a catalog and list its contents")
                .arg(
                    Arg::new("path")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Catalog file"),
                ),
        )
        .subcommand(
            Command::new("plan")
                .about("Show the executions a task would run")
                .args(task_args.clone()),
        )
        .subcommand(
            Command::new("run")
                .about("Run a task to completion")
                .args(task_args),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("loading engine configuration {}", path.display()))?,
        None => EngineConfig::default(),
    };
    init_tracing(&config);

    match matches.subcommand() {
        Some(("catalog", args)) => {
            let path = args
                .get_one::<PathBuf>("path")
                .context("catalog path is required")?;
            let catalog = Catalog::from_file(path)
                .with_context(|| format!("loading catalog {}", path.display()))?;
            print_catalog(&catalog);
            Ok(())
        }
        Some(("plan", args)) => {
            let (catalog, request) = task_request(args)?;
            let registry = TypeRegistry::standard();
            let planner = PlanBuilder::new(&catalog, &registry);
            let plan = planner.build(&request.subject, &request.scope, request.intensity)?;
            if args.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&plan_json(&plan))?);
            } else {
                print_plan(&plan);
            }
            Ok(())
        }
        Some(("run", args)) => run(args, config).await,
        _ => bail!("unknown command"),
    }
}

fn init_tracing(config: &EngineConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if config.json_logs {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn task_request(args: &ArgMatches) -> Result<(Arc<Catalog>, TaskRequest)> {
    let path = args
        .get_one::<PathBuf>("catalog")
        .context("--catalog is required")?;
    let catalog = Catalog::from_file(path).with_context(|| format!("loading catalog {}", path.display()))?;

    let subject = match (args.get_one::<String>("tool"), args.get_one::<String>("process")) {
        (Some(tool), _) => TaskSubject::Tool {
            tool: tool.clone(),
            configuration: args.get_one::<String>("configuration").cloned(),
        },
        (None, Some(process)) => TaskSubject::process(process.clone()),
        (None, None) => bail!("either --tool or --process is required"),
    };
    let intensity = args
        .get_one::<IntensityRank>("intensity")
        .copied()
        .unwrap_or(IntensityRank::Normal);
    Ok((Arc::new(catalog), TaskRequest::new(subject, scope(args)?, intensity)))
}

fn scope(args: &ArgMatches) -> Result<TargetScope> {
    let target = args.get_one::<String>("target").context("--target is required")?;
    let mut scope = TargetScope::new(target.clone());
    for port in args.get_many::<u16>("port").into_iter().flatten() {
        scope = scope.with_port(*port);
    }
    for path in args.get_many::<String>("wordlist").into_iter().flatten() {
        scope = scope.with_wordlist(wordlist_name(path), WordlistKind::Endpoint, path.clone());
    }
    for path in args.get_many::<String>("subdomain-wordlist").into_iter().flatten() {
        scope = scope.with_wordlist(wordlist_name(path), WordlistKind::Subdomain, path.clone());
    }
    for cve in args.get_many::<String>("cve").into_iter().flatten() {
        scope = scope.with_vulnerability(cve.clone());
    }
    for auth in args.get_many::<String>("auth").into_iter().flatten() {
        let (port, kind, name, secret) = authentication(auth)?;
        scope = scope.with_authentication(port, name, secret, kind);
    }
    Ok(scope)
}

fn authentication(value: &str) -> Result<(u16, AuthenticationKind, &str, &str)> {
    let mut fields = value.splitn(4, ':');
    let (Some(port), Some(kind), Some(name), Some(secret)) =
        (fields.next(), fields.next(), fields.next(), fields.next())
    else {
        bail!("--auth expects PORT:TYPE:NAME:SECRET, got {value:?}");
    };
    let port = port.parse::<u16>().with_context(|| format!("invalid --auth port {port:?}"))?;
    let kind = AuthenticationKind::from_keyword(kind)
        .with_context(|| format!("unknown --auth type {kind:?}"))?;
    Ok((port, kind, name, secret))
}

fn wordlist_name(path: &str) -> String {
    std::path::Path::new(path)
        .file_stem()
        .map_or_else(|| path.to_string(), |s| s.to_string_lossy().into_owned())
}

async fn run(args: &ArgMatches, config: EngineConfig) -> Result<()> {
    let (catalog, request) = task_request(args)?;
    let engine = Engine::builder(catalog)
        .with_config(config)
        .with_runner(Arc::new(ProcessRunner::new()))
        .with_observer(Arc::new(TracingObserver))
        .build()?;

    let task = engine.create_task(request).context("task rejected")?;
    let record = tokio::select! {
        record = engine.wait_for(task) => record?,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!(task = %task, "interrupted, cancelling task");
            engine.cancel_task(task)?;
            engine.wait_for(task).await?
        }
    };

    let executions = engine.executions(task)?;
    let findings = engine.task_findings(task)?;
    if args.get_flag("json") {
        let report = json!({
            "task": record,
            "executions": executions,
            "findings": findings,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("task {} {} ({} on {})", record.id, record.status, record.subject, record.target);
        for execution in &executions {
            println!("  {:<24} group {} {}", execution.configuration, execution.group, execution.status);
            if let Some(error) = &execution.output_error {
                println!("    {}", error.lines().next().unwrap_or_default());
            }
        }
        println!("{} findings", findings.len());
        for finding in &findings {
            println!("  {}", finding.entity);
        }
    }
    engine.shutdown().await;

    if record.status == TaskStatus::Error {
        bail!("task {task} finished with errors");
    }
    Ok(())
}

fn print_catalog(catalog: &Catalog) {
    for tool in catalog.tools() {
        let ranks: Vec<String> = tool.intensities.iter().map(|i| i.rank.to_string()).collect();
        println!("{} ({}) [{}]", tool.name, tool.command, ranks.join(", "));
        for configuration in catalog.configurations().filter(|c| c.tool == tool.name) {
            let default = if configuration.default { " default" } else { "" };
            println!("  {} stage {}{default}", configuration.name, configuration.stage);
        }
    }
    for process in catalog.processes() {
        println!("process {} ({} steps)", process.name, process.steps.len());
        if let Some(description) = &process.description {
            println!("  {description}");
        }
    }
}

fn print_plan(plan: &Plan) {
    for step in &plan.steps {
        println!(
            "step {} group {} intensity {}",
            step.configuration.key(),
            step.group,
            step.intensity.rank
        );
    }
    for dropped in &plan.dropped {
        println!("dropped {} (nothing at or below {})", dropped.configuration, dropped.requested);
    }
    for execution in &plan.executions {
        let bundle: Vec<String> = execution.bundle.iter().map(ToString::to_string).collect();
        println!(
            "execution {} group {} [{}]",
            execution.configuration.key(),
            execution.group,
            bundle.join(", ")
        );
    }
}

fn plan_json(plan: &Plan) -> serde_json::Value {
    json!({
        "steps": plan.steps.iter().map(|s| json!({
            "id": s.id,
            "configuration": s.configuration.key(),
            "intensity": s.intensity.rank,
            "group": s.group,
            "covered": s.covered,
        })).collect::<Vec<_>>(),
        "dropped": plan.dropped,
        "executions": plan.executions.iter().map(|e| json!({
            "id": e.id,
            "configuration": e.configuration.key(),
            "group": e.group,
            "dependencies": e.dependencies,
            "bundle": e.bundle,
        })).collect::<Vec<_>>(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_tool_and_process_are_exclusive() {
        let parsed = cli().try_get_matches_from([
            "strix", "plan", "--catalog", "c.toml", "--tool", "nmap", "--process", "recon", "--target", "10.0.0.1",
        ]);
        assert!(parsed.is_err());
        let parsed = cli().try_get_matches_from(["strix", "plan", "--catalog", "c.toml", "--target", "10.0.0.1"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_scope_from_arguments() {
        let matches = cli()
            .try_get_matches_from([
                "strix",
                "run",
                "--catalog",
                "c.toml",
                "--process",
                "recon",
                "--target",
                "example.com",
                "--port",
                "80",
                "--port",
                "443",
                "--wordlist",
                "/lists/common.txt",
                "--cve",
                "CVE-2021-44228",
                "--intensity",
                "hard",
            ])
            .unwrap();
        let (_, args) = matches.subcommand().unwrap();
        let scope = scope(args).unwrap();
        assert_eq!(scope.target.address, "example.com");
        assert_eq!(scope.ports.iter().map(|p| p.port).collect::<Vec<_>>(), vec![80, 443]);
        assert_eq!(scope.wordlists[0].name, "common");
        assert_eq!(scope.vulnerabilities[0].cve, "CVE-2021-44228");
        assert_eq!(args.get_one::<IntensityRank>("intensity"), Some(&IntensityRank::Hard));
    }

    #[test]
    fn test_authentication_argument() {
        let matches = cli()
            .try_get_matches_from([
                "strix", "plan", "--catalog", "c.toml", "--process", "web", "--target", "example.com", "--auth",
                "8443:bearer::tok:en",
            ])
            .unwrap();
        let (_, args) = matches.subcommand().unwrap();
        let scope = scope(args).unwrap();
        assert_eq!(scope.ports[0].port, 8443);
        let auth = &scope.authentications[0];
        assert_eq!(auth.kind, AuthenticationKind::Bearer);
        assert_eq!(auth.name, "");
        assert_eq!(auth.secret, "tok:en");

        assert!(authentication("80:kerberos:a:b").is_err());
        assert!(authentication("80:basic:admin").is_err());
    }

    #[test]
    fn test_task_request_loads_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.toml");
        std::fs::write(
            &path,
            r#"
[[tools]]
name = "whatweb"
command = "whatweb"
intensities = [{ rank = "low", argument = "-a 1" }]

[[tools.configurations]]
name = "default"
stage = "enumeration"
template = "{command} {intensity} {url}"

[[tools.configurations.arguments]]
name = "url"
template = "{url}"
required = true
inputs = [{ type = "port" }]
"#,
        )
        .unwrap();
        let matches = cli()
            .try_get_matches_from([
                "strix",
                "plan",
                "--catalog",
                path.to_str().unwrap(),
                "--tool",
                "whatweb",
                "--target",
                "10.0.0.1",
                "--port",
                "8080",
            ])
            .unwrap();
        let (_, args) = matches.subcommand().unwrap();
        let (catalog, request) = task_request(args).unwrap();
        assert!(catalog.tool("whatweb").is_some());
        assert_eq!(request.intensity, IntensityRank::Normal);
        assert_eq!(request.subject, TaskSubject::tool("whatweb"));
    }
}
