//! CLI command implementations
//!
//! Each command loads configuration, applies the log level, registers the
//! built-in providers once per process and then drives a scan through the
//! same path the executor takes: plan → encode → decode → create → begin.

use std::path::Path;
use std::sync::{Arc, OnceLock};
use std::thread;

use serde::Serialize;
use serde_json::json;

use crate::custom_scan::{
    create_custom_scan_plan, get_custom_scan_methods, global_registry, CustomPath, CustomScan,
    CustomScanError, CustomScanResult, CustomScanState, EState, ExecFlags, ExplainFormat,
    ExplainState, ParallelContext, ParallelScanCoordinator, PlannerInfo, RelOptInfo,
    ScanDirection, ShmToc, Tuple,
};
use crate::observability::{Logger, MetricsRegistry, MetricsSnapshot, ObservationScope};
use crate::providers::{
    register_builtin_providers, series_path, values_path, SERIES_SCAN_NAME, VALUES_SCAN_NAME,
};

use super::args::{Cli, Command, OutputFormat};
use super::config::ScanConfig;
use super::errors::{CliError, CliErrorCode, CliResult};
use super::io::{write_response, write_text};

static BUILTINS: OnceLock<Result<(), String>> = OnceLock::new();

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Providers { config } => {
            setup(config.as_deref())?;
            write_response(json!({ "providers": list_providers()? }))
        }
        Command::Scan {
            config,
            provider,
            parallel,
            backward,
        } => {
            let config = setup(config.as_deref())?;
            let options = ScanOptions { parallel, backward };
            let report = run_scan(&config, &provider, options)?;
            write_response(serde_json::to_value(report)?)
        }
        Command::Explain {
            config,
            provider,
            verbose,
            format,
        } => {
            let config = setup(config.as_deref())?;
            match format {
                OutputFormat::Text => {
                    let text = explain_scan(&config, &provider, verbose, ExplainFormat::Text)?;
                    write_text(&text)
                }
                OutputFormat::Json => {
                    let rendered = explain_scan(&config, &provider, verbose, ExplainFormat::Json)?;
                    write_response(serde_json::from_str(&rendered)?)
                }
            }
        }
    }
}

fn setup(config_path: Option<&Path>) -> CliResult<ScanConfig> {
    let config = ScanConfig::load_or_default(config_path)?;
    Logger::set_min_severity(config.severity()?);
    ensure_builtin_providers()?;
    Ok(config)
}

/// Register the built-in providers exactly once per process
pub fn ensure_builtin_providers() -> CliResult<()> {
    BUILTINS
        .get_or_init(|| register_builtin_providers().map_err(|e| e.to_string()))
        .clone()
        .map_err(|msg| CliError::new(CliErrorCode::ScanError, msg))
}

/// Names of every registered provider, sorted
pub fn list_providers() -> CliResult<Vec<String>> {
    Ok(global_registry().names()?)
}

/// Options for [`run_scan`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanOptions {
    pub parallel: bool,
    pub backward: bool,
}

/// Outcome of one scan
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub provider: String,
    pub plan_node_id: u32,
    pub workers: usize,
    pub tuples: Vec<Tuple>,
    pub metrics: MetricsSnapshot,
}

/// Plan and run a scan through `provider`
pub fn run_scan(config: &ScanConfig, provider: &str, options: ScanOptions) -> CliResult<ScanReport> {
    let scope = ObservationScope::with_fields(
        "SCAN",
        &[
            ("provider", provider),
            ("parallel", if options.parallel { "true" } else { "false" }),
        ],
    );

    let result = plan_and_run(config, provider, options);
    match &result {
        Ok(report) => scope.complete_with_fields(&[("tuples", &report.tuples.len().to_string())]),
        Err(e) => scope.fail(e.message()),
    }
    result
}

fn plan_and_run(config: &ScanConfig, provider: &str, options: ScanOptions) -> CliResult<ScanReport> {
    let plan = plan_for(config, provider)?;
    // Plan nodes reach the executor only through the encoded envelope.
    let bytes = plan.encode()?;

    let metrics = Arc::new(MetricsRegistry::new());
    let direction = if options.backward {
        ScanDirection::Backward
    } else {
        ScanDirection::Forward
    };
    let estate = EState::new(Arc::clone(&metrics)).with_direction(direction);

    let (tuples, workers) = if options.parallel {
        run_parallel(&bytes, &estate, config.parallel_workers)?
    } else {
        let plan = CustomScan::decode(&bytes)?;
        let mut node = CustomScanState::create(&plan)?;
        node.begin(&estate, ExecFlags::NONE)?;
        let tuples = drain(&mut node)?;
        node.end()?;
        (tuples, 0)
    };

    Ok(ScanReport {
        provider: provider.to_string(),
        plan_node_id: plan.plan_node_id,
        workers,
        tuples,
        metrics: metrics.snapshot(),
    })
}

fn run_parallel(
    bytes: &[u8],
    estate: &EState,
    nworkers: usize,
) -> CliResult<(Vec<Tuple>, usize)> {
    let plan = CustomScan::decode(bytes)?;
    let mut leader = CustomScanState::create(&plan)?;
    leader.begin(estate, ExecFlags::NONE)?;

    let mut coordinator = ParallelScanCoordinator::new(&leader);
    let mut pcxt = ParallelContext::new(nworkers);
    coordinator.estimate(&mut leader, &mut pcxt)?;
    coordinator.initialize(&mut leader, &mut pcxt)?;
    let toc = pcxt.worker_toc();
    let coordinator = &coordinator;

    let (leader_tuples, worker_results) = thread::scope(|s| {
        let handles: Vec<_> = (0..nworkers)
            .map(|worker| {
                let toc = &toc;
                let worker_estate = estate.for_worker(worker);
                s.spawn(move || run_worker(coordinator, bytes, toc, &worker_estate))
            })
            .collect();

        let leader_tuples = drain(&mut leader);
        let worker_results: Vec<_> = handles
            .into_iter()
            .enumerate()
            .map(|(worker, h)| h.join().map_err(|_| CliError::worker_failed(worker)))
            .collect();
        (leader_tuples, worker_results)
    });

    let mut tuples = leader_tuples?;
    leader.end()?;
    for result in worker_results {
        tuples.extend(result??);
    }
    Ok((tuples, coordinator.workers_attached()))
}

fn run_worker(
    coordinator: &ParallelScanCoordinator,
    bytes: &[u8],
    toc: &ShmToc,
    estate: &EState,
) -> CustomScanResult<Vec<Tuple>> {
    let plan = CustomScan::decode(bytes)?;
    let mut node = CustomScanState::create(&plan)?;
    node.begin(estate, ExecFlags::NONE)?;
    coordinator.attach_worker(&mut node, toc)?;
    let tuples = drain(&mut node)?;
    node.end()?;
    Ok(tuples)
}

/// Render the EXPLAIN properties of `provider`'s scan node
pub fn explain_scan(
    config: &ScanConfig,
    provider: &str,
    verbose: bool,
    format: ExplainFormat,
) -> CliResult<String> {
    let plan = CustomScan::decode(&plan_for(config, provider)?.encode()?)?;
    let estate = EState::new(Arc::new(MetricsRegistry::new()));

    let mut node = CustomScanState::create(&plan)?;
    node.begin(&estate, ExecFlags::EXPLAIN_ONLY)?;
    let mut es = ExplainState::new(format).verbose(verbose);
    node.explain(&[], &mut es)?;
    node.end()?;

    Ok(es.render())
}

fn plan_for(config: &ScanConfig, provider: &str) -> CliResult<CustomScan> {
    get_custom_scan_methods(provider, false)?;
    let path: CustomPath = match provider {
        VALUES_SCAN_NAME => values_path(config.rows.clone()),
        SERIES_SCAN_NAME => series_path(1, config.series_stop, 1),
        other => {
            return Err(CustomScanError::plan_invalid(format!(
                "no planner path for provider \"{}\"",
                other
            ))
            .into())
        }
    };

    let mut root = PlannerInfo::new();
    let rel = RelOptInfo::new(1, provider);
    Ok(create_custom_scan_plan(
        &mut root,
        &rel,
        &path,
        &[],
        &[],
        Vec::new(),
    )?)
}

fn drain(node: &mut CustomScanState) -> CustomScanResult<Vec<Tuple>> {
    let mut tuples = Vec::new();
    while let Some(tuple) = node.exec()? {
        tuples.push(tuple);
    }
    Ok(tuples)
}
