//! Claim Sentinel Core - ensemble anomaly detection for billing claims
//!
//! The main entry point for cs-core, handling:
//! - Detection runs over JSON / JSON Lines claim batches
//! - Grouped summary tables
//! - Synthetic claim generation
//! - Configuration inspection and validation
//! - JSON Schemas of the output types

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use cs_common::{
    format_error_human, DetectionMethod, Error, OutputFormat, RunId, StructuredError,
    SCHEMA_VERSION,
};
use cs_core::claims::ClaimBatch;
use cs_core::config::{self, ConfigOptions, ConfigOverrides, LoadedConfig, PresetName};
use cs_core::engine::DetectionEngine;
use cs_core::exit_codes::ExitCode;
use cs_core::features::prepare_features;
use cs_core::log_event;
use cs_core::logging::{
    event_names, init_logging, LogConfig, LogContext, LogFormat, LogLevel, Stage,
};
use cs_core::output::{self, markdown, DetectionReport, FieldSelector};
use cs_core::schema::{self, SchemaFormat};
use cs_core::summary::{GroupBy, SortKey, SummaryTable};
use cs_core::synth::{self, GeneratorOptions};

/// Claim Sentinel Core - flag anomalous billing claims by ensemble consensus
#[derive(Parser)]
#[command(name = "cs-core")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Detection config file (TOML or JSON)
    #[arg(long, global = true, env = "CS_CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Start from a named preset (standard, strict, sensitive, robust)
    #[arg(long, global = true, value_parser = config::parse_preset, conflicts_with = "config")]
    preset: Option<PresetName>,

    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "json")]
    format: OutputFormat,

    /// Write the payload to a file instead of stdout
    #[arg(long, short = 'o', global = true)]
    out: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log format on stderr
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormat>,

    /// Disable colored error output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(flatten)]
    overrides: OverrideArgs,
}

/// Individual detection options, applied on top of the config file or preset
#[derive(Args, Debug)]
struct OverrideArgs {
    /// Methods that vote (comma-separated)
    #[arg(long, global = true, value_enum, value_delimiter = ',')]
    methods: Option<Vec<DetectionMethod>>,

    #[arg(long, global = true)]
    z_threshold: Option<f64>,

    #[arg(long, global = true)]
    iqr_multiplier: Option<f64>,

    /// LOW,HIGH percentiles, e.g. 1,99
    #[arg(long, global = true, value_parser = config::parse_percentile_bounds)]
    percentile_bounds: Option<(f64, f64)>,

    #[arg(long, global = true)]
    modified_z_threshold: Option<f64>,

    /// Expected anomaly fraction for model-based methods
    #[arg(long, global = true)]
    contamination: Option<f64>,

    #[arg(long, global = true)]
    k_neighbors: Option<usize>,

    /// Minimum votes for a claim to be flagged
    #[arg(long, global = true)]
    consensus: Option<usize>,

    /// Random seed for isolation trees and `generate`
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[arg(long, global = true)]
    n_estimators: Option<usize>,

    #[arg(long, global = true)]
    max_samples: Option<usize>,
}

impl OverrideArgs {
    fn to_overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            methods: self.methods.clone(),
            z_threshold: self.z_threshold,
            iqr_multiplier: self.iqr_multiplier,
            percentile_bounds: self.percentile_bounds,
            modified_z_threshold: self.modified_z_threshold,
            contamination: self.contamination,
            k_neighbors: self.k_neighbors,
            consensus_threshold: self.consensus,
            random_seed: self.seed,
            n_estimators: self.n_estimators,
            max_samples: self.max_samples,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the ensemble over a claim batch and emit the augmented claims
    Detect(DetectArgs),

    /// Run detection and emit grouped summary tables only
    Summarize(SummarizeArgs),

    /// Generate a synthetic claim batch with injected anomalies
    Generate(GenerateArgs),

    /// Validate configuration and, optionally, an input file
    Check(CheckArgs),

    /// Configuration management
    Config(ConfigArgs),

    /// Print JSON Schemas of output types
    Schema(SchemaArgs),

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Print version information
    Version,
}

// ============================================================================
// Command argument structs
// ============================================================================

#[derive(Args, Debug)]
struct DetectArgs {
    /// Claims file (JSON array or JSON Lines); `-` reads stdin
    #[arg(default_value = "-")]
    input: PathBuf,

    /// Add a summary table per dimension (repeatable)
    #[arg(long, short = 'g', value_enum)]
    group_by: Vec<GroupBy>,

    /// Claim columns to emit: minimal, standard, full, or a comma-separated list
    #[arg(long, default_value = "full")]
    fields: String,

    /// Emit only flagged claims
    #[arg(long)]
    flagged_only: bool,
}

#[derive(Args, Debug)]
struct SummarizeArgs {
    /// Claims file (JSON array or JSON Lines); `-` reads stdin
    #[arg(default_value = "-")]
    input: PathBuf,

    /// Dimensions to summarize (default: all)
    #[arg(long, short = 'g', value_enum)]
    group_by: Vec<GroupBy>,

    /// Keep only the N highest-ranked groups per table
    #[arg(long)]
    top: Option<usize>,

    /// Ranking used with --top
    #[arg(long, value_enum, default_value = "anomaly-rate")]
    sort: SortKey,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Number of claims
    #[arg(long, short = 'n', default_value_t = 1000)]
    count: usize,

    /// Fraction of claims with an injected anomaly
    #[arg(long, default_value_t = 0.05)]
    anomaly_rate: f64,
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// Claims file to validate against the required columns
    input: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show the effective configuration and where it came from
    Show,
    /// List the built-in presets
    Presets,
}

#[derive(Args, Debug)]
struct SchemaArgs {
    /// Type name (see --list)
    name: Option<String>,

    /// List available types
    #[arg(long)]
    list: bool,

    /// Print every schema
    #[arg(long)]
    all: bool,

    /// Single-line JSON
    #[arg(long)]
    compact: bool,
}

// ============================================================================
// Main entry point
// ============================================================================

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            let code = if err.use_stderr() {
                ExitCode::ArgsError
            } else {
                ExitCode::Clean
            };
            std::process::exit(code.as_i32());
        }
    };

    let log_config = LogConfig::from_env(
        LogLevel::from_verbosity(cli.global.verbose, cli.global.quiet),
        cli.global.log_format,
    );
    init_logging(&log_config);

    let ctx = LogContext::new(RunId::new().to_string());
    let result = match &cli.command {
        Commands::Detect(args) => run_detect(&cli.global, args, &ctx),
        Commands::Summarize(args) => run_summarize(&cli.global, args, &ctx),
        Commands::Generate(args) => run_generate(&cli.global, args, &ctx),
        Commands::Check(args) => run_check(&cli.global, args, &ctx),
        Commands::Config(args) => run_config(&cli.global, args, &ctx),
        Commands::Schema(args) => run_schema(&cli.global, args),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(*shell, &mut cmd, "cs-core", &mut std::io::stdout());
            Ok(ExitCode::Clean)
        }
        Commands::Version => print_version(&cli.global),
    };

    let exit_code = match result {
        Ok(code) => code,
        Err(err) => report_error(&cli.global, &ctx, &err),
    };
    std::process::exit(exit_code.as_i32());
}

fn report_error(global: &GlobalOpts, ctx: &LogContext, err: &Error) -> ExitCode {
    let code = ExitCode::from(err);
    if code.is_internal_error() {
        log_event!(
            ctx,
            ERROR,
            event_names::INTERNAL_ERROR,
            Stage::Output,
            "command failed",
            error = tracing::field::display(err)
        );
    }
    if global.format.is_machine() {
        let structured = StructuredError::from(err).with_context("run_id", &ctx.run_id);
        println!("{}", structured.to_json());
    } else {
        eprintln!("{}", format_error_human(err, !global.no_color));
    }
    code
}

// ============================================================================
// Shared helpers
// ============================================================================

fn load_config(global: &GlobalOpts, ctx: &LogContext) -> cs_common::Result<LoadedConfig> {
    config::load(
        &ConfigOptions {
            config_path: global.config.clone(),
            preset: global.preset,
            overrides: global.overrides.to_overrides(),
        },
        ctx,
    )
}

fn read_batch(path: &Path, ctx: &LogContext) -> cs_common::Result<ClaimBatch> {
    let started = Instant::now();
    let batch = ClaimBatch::from_path(path)?;
    log_event!(
        ctx,
        INFO,
        event_names::INGEST_FINISHED,
        Stage::Ingest,
        "claims loaded",
        claims = batch.len(),
        source = tracing::field::display(path.display()),
        duration_ms = started.elapsed().as_millis() as u64
    );
    Ok(batch)
}

/// Write a payload to `--out` or stdout, newline-terminated.
fn emit(global: &GlobalOpts, payload: &str) -> cs_common::Result<()> {
    let mut text = payload.to_string();
    if !text.ends_with('\n') {
        text.push('\n');
    }
    match &global.out {
        Some(path) => std::fs::write(path, text)?,
        None => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            lock.write_all(text.as_bytes())?;
            lock.flush()?;
        }
    }
    Ok(())
}

fn emit_json(global: &GlobalOpts, value: &serde_json::Value) -> cs_common::Result<()> {
    emit(global, &serde_json::to_string_pretty(value)?)
}

fn summary_log(ctx: &LogContext, table: &SummaryTable) {
    log_event!(
        ctx,
        DEBUG,
        event_names::SUMMARY_BUILT,
        Stage::Summarize,
        "summary table built",
        group_by = table.group_by.as_str(),
        groups = table.rows.len()
    );
}

// ============================================================================
// Command implementations
// ============================================================================

fn run_detect(
    global: &GlobalOpts,
    args: &DetectArgs,
    ctx: &LogContext,
) -> cs_common::Result<ExitCode> {
    let selector = FieldSelector::parse(&args.fields)
        .map_err(|e| Error::InvalidInput(format!("--fields: {}", e)))?;
    let loaded = load_config(global, ctx)?;
    let batch = read_batch(&args.input, ctx)?;
    let engine = DetectionEngine::new(loaded.config)?;
    let run = engine.run_with_context(&batch, ctx)?;

    let summaries: Vec<SummaryTable> = args
        .group_by
        .iter()
        .map(|g| {
            let table = run.summarize(*g);
            summary_log(ctx, &table);
            table
        })
        .collect();

    let mut report = DetectionReport::new(&run, loaded.snapshot, summaries);
    if args.flagged_only {
        report = report.flagged_only();
    }
    let report = report.select_fields(&selector);
    emit(global, &output::render(&report, global.format)?)?;
    log_event!(
        ctx,
        DEBUG,
        event_names::OUTPUT_WRITTEN,
        Stage::Output,
        "report written",
        format = tracing::field::display(global.format)
    );

    Ok(ExitCode::for_flags(run.metadata().flagged_count))
}

fn run_summarize(
    global: &GlobalOpts,
    args: &SummarizeArgs,
    ctx: &LogContext,
) -> cs_common::Result<ExitCode> {
    let loaded = load_config(global, ctx)?;
    let batch = read_batch(&args.input, ctx)?;
    let engine = DetectionEngine::new(loaded.config)?;
    let run = engine.run_with_context(&batch, ctx)?;

    let dimensions: Vec<GroupBy> = if args.group_by.is_empty() {
        GroupBy::ALL.to_vec()
    } else {
        args.group_by.clone()
    };
    let tables: Vec<SummaryTable> = dimensions
        .iter()
        .map(|g| {
            let mut table = run.summarize(*g);
            if let Some(n) = args.top {
                table.rows = table.top_rows(n, args.sort).into_iter().cloned().collect();
            }
            summary_log(ctx, &table);
            table
        })
        .collect();

    match global.format {
        OutputFormat::Json => emit_json(
            global,
            &serde_json::json!({
                "schema_version": SCHEMA_VERSION,
                "metadata": run.metadata(),
                "summaries": tables,
            }),
        )?,
        OutputFormat::Jsonl => {
            let rows: Vec<serde_json::Value> = tables
                .iter()
                .flat_map(|t| {
                    t.rows.iter().map(move |r| {
                        let mut v = serde_json::to_value(r).unwrap_or_default();
                        if let Some(obj) = v.as_object_mut() {
                            obj.insert("group_by".into(), serde_json::json!(t.group_by));
                        }
                        v
                    })
                })
                .collect();
            emit(global, &output::render_jsonl(&rows)?)?
        }
        OutputFormat::Md => {
            let body: Vec<String> = tables.iter().map(markdown::render_summary_table).collect();
            emit(global, &body.join("\n"))?
        }
        OutputFormat::Summary => emit(global, &output::render_summary_line(run.metadata()))?,
    }

    Ok(ExitCode::Clean)
}

fn run_generate(
    global: &GlobalOpts,
    args: &GenerateArgs,
    ctx: &LogContext,
) -> cs_common::Result<ExitCode> {
    if !(0.0..=1.0).contains(&args.anomaly_rate) {
        return Err(Error::InvalidInput(format!(
            "--anomaly-rate must be in [0, 1], got {}",
            args.anomaly_rate
        )));
    }
    let seed = global.overrides.seed.unwrap_or(GeneratorOptions::default().seed);
    let data = synth::generate(&GeneratorOptions {
        count: args.count,
        seed,
        anomaly_rate: args.anomaly_rate,
        ..Default::default()
    })?;
    log_event!(
        ctx,
        INFO,
        event_names::GENERATE_FINISHED,
        Stage::Generate,
        "synthetic claims generated",
        claims = data.rows.len(),
        injected = data.injected.len(),
        seed = seed
    );

    match global.format {
        OutputFormat::Json => emit(global, &serde_json::to_string_pretty(&data.rows)?)?,
        OutputFormat::Jsonl => emit(global, &output::render_jsonl(&data.rows)?)?,
        OutputFormat::Md | OutputFormat::Summary => emit(
            global,
            &format!(
                "generated claims={} injected={} seed={}",
                data.rows.len(),
                data.injected.len(),
                seed
            ),
        )?,
    }
    Ok(ExitCode::Clean)
}

fn run_check(
    global: &GlobalOpts,
    args: &CheckArgs,
    ctx: &LogContext,
) -> cs_common::Result<ExitCode> {
    let mut checks: Vec<serde_json::Value> = Vec::new();
    let mut failure: Option<Error> = None;

    match load_config(global, ctx).and_then(|loaded| {
        DetectionEngine::new(loaded.config.clone())?;
        Ok(loaded)
    }) {
        Ok(loaded) => checks.push(serde_json::json!({
            "check": "config",
            "status": "ok",
            "source": loaded.snapshot.source,
            "path": loaded.snapshot.path,
            "effective_hash": loaded.snapshot.effective_hash,
        })),
        Err(e) => {
            checks.push(serde_json::json!({
                "check": "config",
                "status": "error",
                "error": e.to_string(),
            }));
            failure = Some(e);
        }
    }

    if let Some(input) = &args.input {
        match read_batch(input, ctx).and_then(|batch| {
            let features = prepare_features(&batch)?;
            Ok((batch.len(), features.imputations.len()))
        }) {
            Ok((claims, imputed_columns)) => checks.push(serde_json::json!({
                "check": "input",
                "status": "ok",
                "claims": claims,
                "imputed_columns": imputed_columns,
            })),
            Err(e) => {
                checks.push(serde_json::json!({
                    "check": "input",
                    "status": "error",
                    "error": e.to_string(),
                }));
                failure.get_or_insert(e);
            }
        }
    }

    let all_ok = failure.is_none();
    match global.format {
        OutputFormat::Json | OutputFormat::Jsonl => emit_json(
            global,
            &serde_json::json!({
                "schema_version": SCHEMA_VERSION,
                "run_id": ctx.run_id,
                "status": if all_ok { "ok" } else { "error" },
                "checks": checks,
            }),
        )?,
        OutputFormat::Summary => emit(
            global,
            &format!("[{}] check: {}", ctx.run_id, if all_ok { "OK" } else { "FAILED" }),
        )?,
        OutputFormat::Md => {
            let mut out = String::from("# cs-core check\n\n");
            for check in &checks {
                let name = check["check"].as_str().unwrap_or("?");
                let status = check["status"].as_str().unwrap_or("?");
                let symbol = if status == "ok" { "✓" } else { "✗" };
                out.push_str(&format!("{} {}: {}\n", symbol, name, status));
                if let Some(error) = check.get("error").and_then(|v| v.as_str()) {
                    out.push_str(&format!("  Error: {}\n", error));
                }
            }
            emit(global, &out)?
        }
    }

    Ok(failure.map(|e| ExitCode::from(&e)).unwrap_or(ExitCode::Clean))
}

fn run_config(
    global: &GlobalOpts,
    args: &ConfigArgs,
    ctx: &LogContext,
) -> cs_common::Result<ExitCode> {
    match args.command {
        ConfigCommands::Show => {
            let loaded = load_config(global, ctx)?;
            match global.format {
                OutputFormat::Json | OutputFormat::Jsonl => emit_json(
                    global,
                    &serde_json::json!({
                        "schema_version": SCHEMA_VERSION,
                        "snapshot": loaded.snapshot,
                        "config": loaded.config,
                    }),
                )?,
                _ => {
                    let toml = loaded
                        .config
                        .to_toml_string()
                        .map_err(|e| Error::Config(e.to_string()))?;
                    emit(
                        global,
                        &format!(
                            "# source: {}\n# effective hash: {}\n{}",
                            loaded.snapshot.source, loaded.snapshot.effective_hash, toml
                        ),
                    )?
                }
            }
        }
        ConfigCommands::Presets => {
            let presets = config::list_presets();
            match global.format {
                OutputFormat::Json | OutputFormat::Jsonl => {
                    emit_json(global, &serde_json::json!({ "presets": presets }))?
                }
                _ => {
                    let lines: Vec<String> = presets
                        .iter()
                        .map(|p| format!("{:<10} {}", p.name, p.description))
                        .collect();
                    emit(global, &lines.join("\n"))?
                }
            }
        }
    }
    Ok(ExitCode::Clean)
}

fn run_schema(global: &GlobalOpts, args: &SchemaArgs) -> cs_common::Result<ExitCode> {
    let format = if args.compact {
        SchemaFormat::JsonCompact
    } else {
        SchemaFormat::Json
    };

    if args.list {
        let lines: Vec<String> = schema::available_schemas()
            .iter()
            .map(|(name, desc)| format!("{:<18} {}", name, desc))
            .collect();
        emit(global, &lines.join("\n"))?;
        return Ok(ExitCode::Clean);
    }
    if args.all {
        let all = serde_json::to_value(schema::generate_all_schemas())?;
        emit(global, &schema::format_schema(&all, format))?;
        return Ok(ExitCode::Clean);
    }

    let name = args.name.as_deref().ok_or_else(|| {
        Error::InvalidInput("schema name required (see --list)".to_string())
    })?;
    let value = schema::generate_schema(name)
        .ok_or_else(|| Error::InvalidInput(format!("unknown schema type '{}'", name)))?;
    emit(global, &schema::format_schema(&value, format))?;
    Ok(ExitCode::Clean)
}

fn print_version(global: &GlobalOpts) -> cs_common::Result<ExitCode> {
    match global.format {
        OutputFormat::Json | OutputFormat::Jsonl => emit_json(
            global,
            &serde_json::json!({
                "schema_version": SCHEMA_VERSION,
                "cs_core_version": env!("CARGO_PKG_VERSION"),
                "rust_version": env!("CARGO_PKG_RUST_VERSION"),
            }),
        )?,
        _ => emit(
            global,
            &format!(
                "cs-core {}\nschema version: {}",
                env!("CARGO_PKG_VERSION"),
                SCHEMA_VERSION
            ),
        )?,
    }
    Ok(ExitCode::Clean)
}
