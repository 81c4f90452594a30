// crates/reelgraph-cli/src/main.rs
// ============================================================================
// Module: Reelgraph CLI Entry Point
// Description: Command dispatcher for planning and running a blueprint
//              against one movie's storage subtree.
// Purpose: Give the planning/dispatch engine a minimal offline front end;
//          blueprint authoring and provider handlers stay out of scope.
// Dependencies: clap, reelgraph-config, reelgraph-core, reelgraph-dispatch,
//               reelgraph-expand, reelgraph-plan, reelgraph-providers,
//               reelgraph-store, tokio, tracing-subscriber.
// ============================================================================

//! ## Overview
//! Three subcommands cover the engine's whole surface: `plan` computes and
//! prints a layered execution plan without running anything, `run` expands
//! a blueprint against a set of input values and executes the resulting
//! plan, and `resume` re-executes a movie's current plan from its last
//! recorded inputs, picking up any jobs that never reached a terminal
//! state. All three share one orchestration path through
//! [`execute_movie`].

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use reelgraph_config::EngineConfig;
use reelgraph_core::core::blueprint::BlueprintNode;
use reelgraph_core::core::event::InputEvent;
use reelgraph_core::core::hashing::hash_canonical_json;
use reelgraph_core::core::manifest::Manifest;
use reelgraph_core::core::manifest::Plan;
use reelgraph_core::core::manifest::Revision;
use reelgraph_core::core::manifest::RunConfig;
use reelgraph_core::core::time::Timestamp;
use reelgraph_core::interfaces::BlobStore;
use reelgraph_core::interfaces::EventLog;
use reelgraph_core::interfaces::NullObserver;
use reelgraph_core::interfaces::ProgressObserver;
use reelgraph_dispatch::ExecuteOpts;
use reelgraph_dispatch::ExecutionContext;
use reelgraph_dispatch::RunResult;
use reelgraph_dispatch::execute_plan;
use reelgraph_providers::ProducerRegistry;
use reelgraph_store::FsBlobStore;
use reelgraph_store::FsEventLog;
use reelgraph_store::FsManifestService;
use reelgraph_store::MoviePaths;
use reelgraph_store::initialize_movie_storage;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Conventional subdirectory of `storage.root` every movie is nested under.
const MOVIES_BASE_PATH: &str = "movies";

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(
    name = "reelgraph",
    disable_help_subcommand = true,
    arg_required_else_help = true
)]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Compute and print a layered execution plan without running it.
    Plan(PlanArgs),
    /// Expand a blueprint against a set of inputs and execute the result.
    Run(RunArgs),
    /// Re-execute a movie's current plan from its last recorded inputs.
    Resume(ResumeArgs),
}

/// Shared blueprint/movie location arguments.
#[derive(Args, Debug)]
struct MovieArgs {
    /// Path to the blueprint JSON file.
    #[arg(long, value_name = "PATH")]
    blueprint: PathBuf,
    /// Movie id this run executes against.
    #[arg(long, value_name = "ID")]
    movie_id: String,
    /// Optional engine config path (defaults to reelgraph.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Arguments for the `plan` command.
#[derive(Args, Debug)]
struct PlanArgs {
    #[command(flatten)]
    movie: MovieArgs,
    /// Path to a JSON object of input values, keyed by dotted input name.
    #[arg(long, value_name = "PATH")]
    inputs: Option<PathBuf>,
}

/// Arguments for the `run` command.
#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    movie: MovieArgs,
    /// Path to a JSON object of input values, keyed by dotted input name.
    #[arg(long, value_name = "PATH")]
    inputs: Option<PathBuf>,
    /// Overrides `execution.concurrency` from config for this run.
    #[arg(long, value_name = "N")]
    concurrency: Option<u32>,
    /// Force-schedule every job from this layer forward.
    #[arg(long, value_name = "LAYER")]
    re_run_from: Option<u32>,
    /// Schedule no job beyond this layer.
    #[arg(long, value_name = "LAYER")]
    up_to_layer: Option<u32>,
}

/// Arguments for the `resume` command.
#[derive(Args, Debug)]
struct ResumeArgs {
    #[command(flatten)]
    movie: MovieArgs,
    /// Overrides `execution.concurrency` from config for this run.
    #[arg(long, value_name = "N")]
    concurrency: Option<u32>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`] from a message.
    fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Plan(args) => command_plan(&args).await,
        Commands::Run(args) => command_run(&args).await,
        Commands::Resume(args) => command_resume(&args).await,
    }
}

// ============================================================================
// SECTION: Plan Command
// ============================================================================

async fn command_plan(args: &PlanArgs) -> CliResult<ExitCode> {
    let config = load_config(args.movie.config.as_deref())?;
    let blueprint = read_blueprint(&args.movie.blueprint)?;
    let new_inputs = match &args.inputs {
        Some(path) => read_inputs(path)?,
        None => BTreeMap::new(),
    };

    let store = MovieStore::open(&config, &args.movie.movie_id).await?;
    let base_manifest = store.load_base_manifest().await?.0;

    let mut input_values = store.load_latest_inputs().await?;
    let mut changed_input_ids = BTreeSet::new();
    merge_new_inputs(&new_inputs, &base_manifest, &mut input_values, &mut changed_input_ids);

    let jobs = reelgraph_expand::expand(&blueprint, &input_values)
        .map_err(|err| CliError::new(format!("blueprint expansion failed: {err}")))?;
    let run_config = RunConfig { concurrency: None, re_run_from: None, up_to_layer: None };
    let plan = reelgraph_plan::build_plan(&jobs, &base_manifest, &changed_input_ids, &run_config, now())
        .map_err(|err| CliError::new(format!("planning failed: {err}")))?;

    print_json(&PlanSummary::from(&plan))
}

/// JSON-serializable view of a [`Plan`] for CLI output.
#[derive(Serialize)]
struct PlanSummary {
    revision: String,
    blueprint_layer_count: u32,
    scheduled_job_count: usize,
    layers: Vec<LayerSummary>,
}

#[derive(Serialize)]
struct LayerSummary {
    layer_index: usize,
    scheduled: Vec<String>,
    skipped: Vec<SkippedJob>,
}

#[derive(Serialize)]
struct SkippedJob {
    job_id: String,
    reason: String,
}

impl From<&Plan> for PlanSummary {
    fn from(plan: &Plan) -> Self {
        let layers = plan
            .layers
            .iter()
            .enumerate()
            .map(|(layer_index, layer)| {
                let mut scheduled = Vec::new();
                let mut skipped = Vec::new();
                for planned in layer {
                    match planned {
                        reelgraph_core::core::job::PlannedJob::Scheduled(job) => {
                            scheduled.push(job.job_id.clone());
                        }
                        reelgraph_core::core::job::PlannedJob::Skipped { job, reason } => {
                            skipped.push(SkippedJob { job_id: job.job_id.clone(), reason: reason.clone() });
                        }
                    }
                }
                LayerSummary { layer_index, scheduled, skipped }
            })
            .collect();

        Self {
            revision: plan.revision.to_string(),
            blueprint_layer_count: plan.blueprint_layer_count,
            scheduled_job_count: plan.scheduled_job_count(),
            layers,
        }
    }
}

// ============================================================================
// SECTION: Run / Resume Commands
// ============================================================================

async fn command_run(args: &RunArgs) -> CliResult<ExitCode> {
    let config = load_config(args.movie.config.as_deref())?;
    let blueprint = read_blueprint(&args.movie.blueprint)?;
    let new_inputs = match &args.inputs {
        Some(path) => read_inputs(path)?,
        None => BTreeMap::new(),
    };
    let run_config = RunConfig {
        concurrency: args.concurrency,
        re_run_from: args.re_run_from,
        up_to_layer: args.up_to_layer,
    };

    let result = execute_movie(&config, &args.movie.movie_id, &blueprint, new_inputs, run_config, args.concurrency)
        .await?;
    print_json(&RunSummary::from(result))
}

async fn command_resume(args: &ResumeArgs) -> CliResult<ExitCode> {
    let config = load_config(args.movie.config.as_deref())?;
    let blueprint = read_blueprint(&args.movie.blueprint)?;
    let run_config = RunConfig::default();

    let result = execute_movie(
        &config,
        &args.movie.movie_id,
        &blueprint,
        BTreeMap::new(),
        run_config,
        args.concurrency,
    )
    .await?;
    print_json(&RunSummary::from(result))
}

/// JSON-serializable view of a [`RunResult`] for CLI output.
#[derive(Serialize)]
struct RunSummary {
    status: reelgraph_core::core::event::ArtefactStatus,
    succeeded: u32,
    failed: u32,
    skipped: u32,
    revision: String,
}

impl From<RunResult> for RunSummary {
    fn from(result: RunResult) -> Self {
        Self {
            status: result.status,
            succeeded: result.succeeded,
            failed: result.failed,
            skipped: result.skipped,
            revision: result.revision.to_string(),
        }
    }
}

/// Expands `blueprint` against the movie's recorded inputs plus `new_inputs`,
/// builds a plan, and executes it, persisting the resulting manifest.
async fn execute_movie(
    config: &EngineConfig,
    movie_id: &str,
    blueprint: &BlueprintNode,
    new_inputs: BTreeMap<String, Value>,
    run_config: RunConfig,
    concurrency_override: Option<u32>,
) -> CliResult<RunResult> {
    let store = MovieStore::open(config, movie_id).await?;
    let (base_manifest, previous_hash) = store.load_base_manifest().await?;

    let mut input_values = store.load_latest_inputs().await?;
    let mut changed_input_ids = BTreeSet::new();
    merge_new_inputs(&new_inputs, &base_manifest, &mut input_values, &mut changed_input_ids);

    for id in &changed_input_ids {
        let value = input_values.get(id).cloned().unwrap_or(Value::Null);
        store.record_input(id, &value).await?;
    }

    let jobs = reelgraph_expand::expand(blueprint, &input_values)
        .map_err(|err| CliError::new(format!("blueprint expansion failed: {err}")))?;
    let plan = reelgraph_plan::build_plan(&jobs, &base_manifest, &changed_input_ids, &run_config, now())
        .map_err(|err| CliError::new(format!("planning failed: {err}")))?;
    tracing::info!(
        movie_id,
        revision = %plan.revision,
        scheduled = plan.scheduled_job_count(),
        "plan built"
    );

    let concurrency = concurrency_override
        .or(run_config.concurrency)
        .unwrap_or(config.execution.concurrency);
    let result = store.execute(&plan, concurrency).await?;
    tracing::info!(
        movie_id,
        succeeded = result.succeeded,
        failed = result.failed,
        skipped = result.skipped,
        "run complete"
    );

    store.persist_manifest(&plan, &base_manifest, previous_hash, run_config).await?;
    Ok(result)
}

/// Folds `new_inputs` into `input_values`, recording which canonical input
/// ids actually changed relative to `base_manifest`.
fn merge_new_inputs(
    new_inputs: &BTreeMap<String, Value>,
    base_manifest: &Manifest,
    input_values: &mut BTreeMap<String, Value>,
    changed_input_ids: &mut BTreeSet<String>,
) {
    for (name, value) in new_inputs {
        let canonical_id =
            if name.starts_with("Input:") { name.clone() } else { format!("Input:{name}") };
        let digest = hash_canonical_json(value);
        let unchanged = base_manifest
            .inputs
            .get(&canonical_id)
            .is_some_and(|entry| entry.payload_digest == digest);
        if !unchanged {
            changed_input_ids.insert(canonical_id.clone());
        }
        input_values.insert(canonical_id, value.clone());
    }
}

// ============================================================================
// SECTION: Movie Storage Wiring
// ============================================================================

/// The filesystem backends for one movie, opened once per command.
struct MovieStore {
    movie_id: String,
    event_log: Arc<dyn EventLog>,
    blob_store: Arc<dyn BlobStore>,
    manifest_service: FsManifestService,
    observer: Arc<dyn ProgressObserver>,
    provider_policy: reelgraph_providers::ProviderAccessPolicy,
}

impl MovieStore {
    async fn open(config: &EngineConfig, movie_id: &str) -> CliResult<Self> {
        let paths = MoviePaths::new(&config.storage.root, MOVIES_BASE_PATH, movie_id);
        initialize_movie_storage(&paths)
            .await
            .map_err(|err| CliError::new(format!("failed to initialize movie storage: {err}")))?;

        let event_log: Arc<dyn EventLog> = Arc::new(FsEventLog::new(paths.events_dir()));
        let blob_store: Arc<dyn BlobStore> = Arc::new(FsBlobStore::new(paths.blobs_dir()));
        let manifest_service = FsManifestService::new(paths.root.clone(), event_log.clone());

        Ok(Self {
            movie_id: movie_id.to_string(),
            event_log,
            blob_store,
            manifest_service,
            observer: Arc::new(NullObserver),
            provider_policy: config.provider_policy(),
        })
    }

    async fn load_base_manifest(&self) -> CliResult<(Manifest, Option<reelgraph_core::core::hashing::HashDigest>)> {
        use reelgraph_core::interfaces::ManifestService;
        match self
            .manifest_service
            .load_current(&self.movie_id)
            .await
            .map_err(|err| CliError::new(format!("failed to load manifest: {err}")))?
        {
            Some((manifest, hash)) => Ok((manifest, Some(hash))),
            None => Ok((empty_manifest(), None)),
        }
    }

    async fn load_latest_inputs(&self) -> CliResult<BTreeMap<String, Value>> {
        use futures::StreamExt;
        let mut events = self
            .event_log
            .stream_inputs(&self.movie_id)
            .await
            .map_err(|err| CliError::new(format!("failed to read input events: {err}")))?;
        let mut latest = BTreeMap::new();
        while let Some(event) = events.next().await {
            let event = event.map_err(|err| CliError::new(format!("failed to read input events: {err}")))?;
            latest.insert(event.id, event.payload);
        }
        Ok(latest)
    }

    async fn record_input(&self, canonical_id: &str, value: &Value) -> CliResult<()> {
        let event = InputEvent {
            id: canonical_id.to_string(),
            payload: value.clone(),
            payload_digest: hash_canonical_json(value),
            revision: Revision::INITIAL.to_string(),
            created_at: now(),
        };
        self.event_log
            .append_input(&self.movie_id, event)
            .await
            .map_err(|err| CliError::new(format!("failed to record input: {err}")))
    }

    async fn execute(&self, plan: &Plan, concurrency: u32) -> CliResult<RunResult> {
        let mut registry = ProducerRegistry::new(self.provider_policy.clone());
        registry.register_producer(
            reelgraph_providers::DEFAULT_PROVIDER_ID,
            Box::new(reelgraph_providers::SimulatedProducer::new()),
        );
        let ctx = ExecutionContext {
            event_log: self.event_log.clone(),
            blob_store: self.blob_store.clone(),
            producer: Arc::new(registry),
            observer: self.observer.clone(),
            cancellation: CancellationToken::new(),
        };
        let opts = ExecuteOpts { movie_id: self.movie_id.clone(), concurrency };
        execute_plan(plan, &ctx, &opts)
            .await
            .map_err(|err| CliError::new(format!("execution failed: {err}")))
    }

    async fn persist_manifest(
        &self,
        plan: &Plan,
        base_manifest: &Manifest,
        previous_hash: Option<reelgraph_core::core::hashing::HashDigest>,
        run_config: RunConfig,
    ) -> CliResult<()> {
        use reelgraph_core::interfaces::ManifestService;
        let rebuilt = self
            .manifest_service
            .rebuild_from_events(&self.movie_id)
            .await
            .map_err(|err| CliError::new(format!("failed to rebuild manifest: {err}")))?;

        let base_revision = if base_manifest.revision == Revision::INITIAL && previous_hash.is_none() {
            None
        } else {
            Some(base_manifest.revision)
        };

        let manifest = Manifest {
            revision: plan.revision,
            base_revision,
            created_at: now(),
            inputs: rebuilt.inputs,
            artefacts: rebuilt.artefacts,
            run_config: Some(run_config),
        };

        self.manifest_service
            .save_manifest(&self.movie_id, &manifest, previous_hash.as_ref())
            .await
            .map_err(|err| CliError::new(format!("failed to save manifest: {err}")))?;
        Ok(())
    }
}

/// The manifest state assumed for a movie that has never been planned.
fn empty_manifest() -> Manifest {
    Manifest {
        revision: Revision::INITIAL,
        base_revision: None,
        created_at: now(),
        inputs: BTreeMap::new(),
        artefacts: BTreeMap::new(),
        run_config: None,
    }
}

// ============================================================================
// SECTION: Input/Output Helpers
// ============================================================================

fn load_config(path: Option<&Path>) -> CliResult<EngineConfig> {
    EngineConfig::load(path).map_err(|err| CliError::new(format!("failed to load config: {err}")))
}

fn read_blueprint(path: &Path) -> CliResult<BlueprintNode> {
    let bytes =
        fs::read(path).map_err(|err| CliError::new(format!("failed to read {}: {err}", path.display())))?;
    serde_json::from_slice(&bytes)
        .map_err(|err| CliError::new(format!("failed to parse blueprint {}: {err}", path.display())))
}

fn read_inputs(path: &Path) -> CliResult<BTreeMap<String, Value>> {
    let bytes =
        fs::read(path).map_err(|err| CliError::new(format!("failed to read {}: {err}", path.display())))?;
    serde_json::from_slice(&bytes)
        .map_err(|err| CliError::new(format!("failed to parse inputs {}: {err}", path.display())))
}

fn print_json<T: Serialize>(value: &T) -> CliResult<ExitCode> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::new(format!("failed to render output: {err}")))?;
    write_stdout_line(&rendered).map_err(|err| CliError::new(format!("failed to write output: {err}")))?;
    Ok(ExitCode::SUCCESS)
}

fn write_stdout_line(message: &str) -> std::io::Result<()> {
    use std::io::Write;
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

fn write_stderr_line(message: &str) -> std::io::Result<()> {
    use std::io::Write;
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}

/// The current wall-clock time, rounded down to milliseconds since the Unix
/// epoch. The CLI is a process boundary, so it is one of the few places
/// allowed to read the clock directly.
fn now() -> Timestamp {
    let millis = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
    Timestamp::from_unix_millis(i64::try_from(millis).unwrap_or(i64::MAX))
}
