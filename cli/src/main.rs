//! CLI entrypoint for relay
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

mod commands;
mod console;
mod session;

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use colored::Colorize;
use relay_application::{
    AbortOnEscalation, AdaptiveTaskInput, EscalationPort, RunAdaptiveTaskUseCase,
    RunTurnUseCase, ToolSchemaPort,
};
use relay_domain::ConversationHistory;
use relay_infrastructure::{
    CandidateSuggester, ConfigLoader, FileConfig, JsonSchemaToolConverter, RuleBasedEvaluator,
    ScriptedModelGateway, config::FileLoggingConfig,
};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use commands::{Cli, Command, ConfigCommand, ConfirmMode, TaskArgs, ToolsArgs, TurnArgs};
use console::StdinEscalation;
use session::Session;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let file_config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_ref()).context("Failed to load configuration")?
    };

    let _log_guard = init_logging(&cli, &file_config.logging)?;
    info!("Starting relay");

    // Ctrl-C cancels the running turn or task
    let cancellation = CancellationToken::new();
    let interrupt = cancellation.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            interrupt.cancel();
        }
    });

    match &cli.command {
        Command::Turn(args) => {
            let session = Session::build(&cli, &file_config).await?;
            run_turn(&session, args, cancellation).await
        }
        Command::Task(args) => {
            let session = Session::build(&cli, &file_config).await?;
            run_task(&session, args, cancellation).await
        }
        Command::Tools(args) => {
            let session = Session::build(&cli, &file_config).await?;
            list_tools(&session, args);
            Ok(())
        }
        Command::Config(command) => run_config(&cli, command, &file_config),
    }
}

fn init_logging(cli: &Cli, logging: &FileLoggingConfig) -> Result<Option<WorkerGuard>> {
    // Initialize logging based on verbosity level
    let filter = match cli.verbose {
        0 => logging
            .level
            .as_deref()
            .and_then(|level| EnvFilter::try_new(level).ok())
            .unwrap_or_else(|| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"), // -vvv or more
    };

    let Some(path) = cli.log_file.clone().or_else(|| logging.file.clone()) else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
        return Ok(None);
    };

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| anyhow!("Invalid log file path: {}", path.display()))?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Cannot create log directory {}", dir.display()))?;

    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false)
        .init();
    Ok(Some(guard))
}

async fn run_turn(session: &Session, args: &TurnArgs, cancellation: CancellationToken) -> Result<()> {
    let mut gateway = ScriptedModelGateway::from_file(&args.script)?;
    if args.fragment_delay_ms > 0 {
        gateway = gateway.with_fragment_delay(Duration::from_millis(args.fragment_delay_ms));
    }

    let mut use_case =
        RunTurnUseCase::new(Arc::new(gateway), session.scheduler.clone(), &session.config);
    if let Some(logger) = session.logger() {
        use_case = use_case.with_conversation_logger(logger);
    }

    let mut history = ConversationHistory::from_user(args.prompt.as_str());
    let result = use_case.execute(&mut history, Some(cancellation)).await;
    println!();

    if args.transcript {
        println!("{}", serde_json::to_string_pretty(&history)?);
    }

    let output = result?;
    let failed = output.outcomes.iter().filter(|o| !o.is_success()).count();
    eprintln!(
        "{} {} in {} model invocation(s), {} tool call(s), {} failed",
        "done".green().bold(),
        output.turn_id,
        output.depth,
        output.outcomes.len(),
        failed
    );
    Ok(())
}

fn parse_arguments(json: &str) -> Result<HashMap<String, Value>> {
    serde_json::from_str(json).with_context(|| format!("Arguments must be a JSON object: {json}"))
}

async fn run_task(session: &Session, args: &TaskArgs, cancellation: CancellationToken) -> Result<()> {
    let arguments = parse_arguments(&args.args)?;
    let candidates = args
        .candidates
        .iter()
        .map(|c| parse_arguments(c).map(|map| Value::Object(map.into_iter().collect())))
        .collect::<Result<Vec<_>>>()?;

    let mut evaluator = RuleBasedEvaluator::new();
    if !args.retry_codes.is_empty() {
        evaluator = evaluator.with_retry_codes(args.retry_codes.iter().cloned());
    }
    for field in &args.required_fields {
        evaluator = evaluator.require_field(field.as_str());
    }

    let escalation: Arc<dyn EscalationPort> = match session.confirm {
        ConfirmMode::Prompt => Arc::new(StdinEscalation),
        ConfirmMode::Approve | ConfirmMode::Deny => Arc::new(AbortOnEscalation),
    };

    let mut use_case = RunAdaptiveTaskUseCase::new(
        session.scheduler.clone(),
        Arc::new(evaluator),
        Arc::new(CandidateSuggester::from_values(candidates)),
        &session.config,
    )
    .with_escalation(escalation);
    if let Some(logger) = session.logger() {
        use_case = use_case.with_conversation_logger(logger);
    }

    let bound = args.bound.unwrap_or(session.config.adaptive.bound);
    let mut input = AdaptiveTaskInput::new(args.tool.as_str(), arguments, bound);
    if let Some(n) = args.escalate_after {
        input = input.with_escalate_after(n);
    }

    match use_case.execute(input, Some(cancellation)).await {
        Ok(output) => {
            let payload = output.outcome.payload().cloned().unwrap_or(Value::Null);
            println!("{}", serde_json::to_string_pretty(&payload)?);
            eprintln!(
                "{} after {} attempt(s)",
                "success".green().bold(),
                output.attempts
            );
            Ok(())
        }
        Err(e) => {
            for record in e.history() {
                eprintln!(
                    "  attempt {}: {} {}",
                    record.attempt,
                    record.verdict,
                    serde_json::to_string(&record.arguments).unwrap_or_default().dimmed()
                );
            }
            Err(e.into())
        }
    }
}

fn list_tools(session: &Session, args: &ToolsArgs) {
    if args.schema {
        let definitions = session.registry.definitions(&session.config.tool_inclusion);
        let schema = JsonSchemaToolConverter.tools_schema(&definitions);
        match serde_json::to_string_pretty(&schema) {
            Ok(json) => println!("{json}"),
            Err(e) => warn!(error = %e, "Could not render tool schema"),
        }
        return;
    }

    for descriptor in session.registry.list() {
        let def = &descriptor.definition;
        let risk = if def.is_high_risk() {
            def.risk_level.as_str().red()
        } else {
            def.risk_level.as_str().green()
        };
        println!(
            "{:<24} {:<8} {:<10} {:<8} {}",
            def.name.bold(),
            def.version,
            descriptor.source,
            def.category.as_str(),
            risk
        );
        println!("    {}", def.description.dimmed());
    }

    let stats = session.registry.stats();
    println!();
    println!("{} tools", stats.total_tools);
    for (source, count) in &stats.tools_per_source {
        println!("  {source}: {count}");
    }
}

fn run_config(cli: &Cli, command: &ConfigCommand, file_config: &FileConfig) -> Result<()> {
    match command {
        ConfigCommand::Sources => {
            println!("Configuration sources (in priority order):");
            for source in ConfigLoader::sources(cli.config.as_ref()) {
                let mark = if source.found { "FOUND" } else { "     " };
                println!("  [{mark}] {:<12} {}", source.kind.as_str(), source.location);
            }
            Ok(())
        }
        ConfigCommand::Validate => {
            let issues = file_config.validate();
            if issues.is_empty() {
                println!("{}", "configuration is valid".green());
                return Ok(());
            }
            for issue in &issues {
                let label = if issue.is_error() {
                    "error".red().bold()
                } else {
                    "warning".yellow().bold()
                };
                println!("{label}: {}", issue.message);
            }
            if let Err(e) = file_config.ensure_valid() {
                bail!(e);
            }
            Ok(())
        }
        ConfigCommand::Show => {
            print!("{}", toml::to_string_pretty(file_config)?);
            Ok(())
        }
    }
}
