use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use shift_config::SourceConfiguration;
use shift_core::{
    assess, FlowStatus, JsonStore, MigrationFlow, MigrationOrchestrator, NoDelay,
    OrchestratorConfig, SeededRandom, StepAction, StepContext, StepFailure, StepKind,
};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod sample;

/// Fails the step it is installed on
struct InjectedFailure;

#[async_trait::async_trait]
impl StepAction for InjectedFailure {
    async fn execute(&self, ctx: &mut StepContext<'_>) -> Result<String, StepFailure> {
        Err(StepFailure::new(format!("injected failure at {}", ctx.kind)))
    }
}

fn cli() -> Command {
    Command::new("shift")
        .version(shift_core::VERSION)
        .about("Migrate rule-based bots to conversational agents (demo)")
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("migrate")
                .about("Run migrations of the built-in sample bot")
                .arg(
                    Arg::new("flows")
                        .long("flows")
                        .default_value("1")
                        .value_parser(value_parser!(usize))
                        .help("Number of independent flows to run concurrently"),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .default_value("42")
                        .value_parser(value_parser!(u64))
                        .help(
                            "Random seed for progress ticks and test checks; \
                             flow N draws from seed + N",
                        ),
                )
                .arg(
                    Arg::new("fail-at")
                        .long("fail-at")
                        .value_parser(StepKind::PLAN.map(|k| k.id()))
                        .help("Force the given step to fail"),
                )
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_parser(value_parser!(std::path::PathBuf))
                        .help("Orchestrator configuration (TOML)"),
                )
                .arg(
                    Arg::new("fast")
                        .long("fast")
                        .action(ArgAction::SetTrue)
                        .help("Skip simulated latency"),
                ),
        )
        .subcommand(
            Command::new("assess").about("Report what the sample bot would carry over"),
        )
        .subcommand(Command::new("config").about("Print the default configuration as TOML"))
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(args: &ArgMatches) -> anyhow::Result<OrchestratorConfig> {
    match args.get_one::<std::path::PathBuf>("config") {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            Ok(OrchestratorConfig::from_toml_str(&text)?)
        }
        None => Ok(OrchestratorConfig::default()),
    }
}

/// Orchestrator for the `index`-th flow, drawing from its own seeded stream
///
/// Clones share stores, observers and ticker accounting.
fn seeded(
    orchestrator: &MigrationOrchestrator,
    seed: u64,
    index: usize,
) -> anyhow::Result<MigrationOrchestrator> {
    let flow_seed = seed.wrapping_add(u64::try_from(index)?);
    Ok(orchestrator
        .clone()
        .with_random(Arc::new(SeededRandom::new(flow_seed))))
}

async fn migrate(args: &ArgMatches, source: SourceConfiguration) -> anyhow::Result<ExitCode> {
    let flows = args.get_one::<usize>("flows").copied().unwrap_or(1);
    let seed = args.get_one::<u64>("seed").copied().unwrap_or(42);
    let config = load_config(args)?;

    let checkpoints: Arc<JsonStore<MigrationFlow>> = Arc::new(JsonStore::new());
    let mut orchestrator = MigrationOrchestrator::new(config)?.with_flow_store(checkpoints);
    if args.get_flag("fast") {
        orchestrator = orchestrator.with_delay(Arc::new(NoDelay));
    }
    if let Some(step) = args.get_one::<String>("fail-at") {
        let kind = StepKind::PLAN
            .into_iter()
            .find(|k| k.id() == step.as_str())
            .with_context(|| format!("unknown step {step}"))?;
        orchestrator = orchestrator.with_action(kind, Arc::new(InjectedFailure));
    }

    let source = Arc::new(source);
    let mut handles = Vec::with_capacity(flows);
    for i in 1..=flows {
        let (flow_id, handle) = seeded(&orchestrator, seed, i)?
            .launch(Arc::clone(&source), format!("{} Agent {i}", source.name))
            .await;
        tracing::debug!(flow_id = %flow_id, "flow launched");
        handles.push(handle);
    }

    let mut reports = Vec::with_capacity(flows);
    let mut failed = 0usize;
    for joined in futures::future::join_all(handles).await {
        let finished = joined.context("migration task panicked")?;
        // report what was persisted, decoded back from its JSON checkpoint
        let flow = orchestrator.load_flow(finished.id()).await?;
        if flow.status() == FlowStatus::Failed {
            failed += 1;
        }
        let delta = flow.capability_delta()?;
        reports.push(serde_json::json!({
            "flow": flow,
            "delta": delta,
            "delta_summary": delta.to_string(),
        }));
    }

    println!("{}", serde_json::to_string_pretty(&reports)?);
    let stats = orchestrator.ticker_stats();
    tracing::info!(
        flows,
        failed,
        tickers_started = stats.started,
        tickers_stopped = stats.stopped,
        "migrations finished"
    );
    Ok(if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("json"));

    let source = sample::retail_bot()?;
    match matches.subcommand() {
        Some(("migrate", args)) => migrate(args, source).await,
        Some(("assess", _)) => {
            println!("{}", serde_json::to_string_pretty(&assess(&source))?);
            Ok(ExitCode::SUCCESS)
        }
        Some(("config", _)) => {
            print!("{}", OrchestratorConfig::default().to_toml_string()?);
            Ok(ExitCode::SUCCESS)
        }
        _ => unreachable!("subcommand_required"),
    }
}
