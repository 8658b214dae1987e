// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod snapshot;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::config::validate::parse_duration;
use crate::dag::cycle::check_acyclic;
use crate::dag::expand::expand_roots;
use crate::dag::{TaskGraph, TaskId};
use crate::engine::{RunOptions, run_tasks_until};
use crate::exec::CommandRunner;
use crate::snapshot::FileSnapshotStore;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - pipeline file loading
/// - CLI overrides of `[config]`
/// - graph construction and root selection
/// - the runtime with the command runner and file snapshots
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = load_and_validate(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;

    let options = run_options(&cfg, &args)?;
    let graph = cfg.to_graph()?;
    let roots = select_roots(&graph, &args.tasks)?;

    if args.dry_run {
        print_dry_run(&graph, &roots, &options)?;
        return Ok(());
    }

    let state_dir = args
        .state_dir
        .clone()
        .unwrap_or_else(|| cfg.config.state_dir.clone());
    let store = FileSnapshotStore::new(state_dir);

    // Ctrl-C → graceful shutdown.
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    info!(
        tasks = graph.len(),
        roots = roots.len(),
        pool_size = options.pool_size,
        run_id = options.run_id().unwrap_or("-"),
        "starting run"
    );

    let summary = run_tasks_until(&graph, &roots, CommandRunner::new(), &store, &options, ctrl_c)
        .await?;

    println!(
        "dagrun: {} task(s) done{}",
        summary.done.len(),
        if summary.resumed { " (resumed)" } else { "" }
    );
    Ok(())
}

/// `[config]` values with CLI flags applied on top.
fn run_options(cfg: &ConfigFile, args: &CliArgs) -> Result<RunOptions> {
    let mut options = cfg.run_options();

    if let Some(size) = args.pool_size {
        options.pool_size = usize::try_from(size).context("--pool-size out of range")?;
    }
    if let Some(tick) = args.tick.as_deref() {
        options.tick = parse_duration(tick).map_err(|e| anyhow!("--tick: {e}"))?;
        if options.tick.is_zero() {
            return Err(anyhow!("--tick must be greater than zero"));
        }
    }
    if let Some(run_id) = &args.run_id {
        options.run_id = Some(run_id.clone());
    }

    debug!(?options, "effective run options");
    Ok(options)
}

/// Requested roots, or every task nothing depends on.
fn select_roots(graph: &TaskGraph, names: &[String]) -> Result<Vec<TaskId>> {
    if names.is_empty() {
        return Ok(graph.sinks());
    }
    names
        .iter()
        .map(|name| {
            graph
                .id_of(name)
                .ok_or_else(|| anyhow!("unknown task '{name}' passed to --task"))
        })
        .collect()
}

/// Validate the plan and print tasks in an order the scheduler could run
/// them.
fn print_dry_run(graph: &TaskGraph, roots: &[TaskId], options: &RunOptions) -> Result<()> {
    check_acyclic(graph, roots)?;
    let order = graph.topological_order(expand_roots(graph, roots))?;

    println!("dagrun dry-run");
    println!("  pool_size = {}", options.pool_size);
    println!("  tick = {:?}", options.tick);
    println!("  run_id = {}", options.run_id().unwrap_or("(none)"));
    println!("  default_retries = {}", options.default_retries);
    println!();

    println!("plan ({} task(s)):", order.len());
    for (step, id) in order.iter().enumerate() {
        let Some(spec) = graph.spec(*id) else {
            continue;
        };
        println!("  {}. {}", step + 1, spec.name);
        if let Some(cmd) = spec.config.get("cmd").and_then(|v| v.as_str()) {
            println!("      cmd: {cmd}");
        }
        let deps: Vec<String> = graph
            .dependencies_of(*id)
            .iter()
            .map(|dep| graph.name_of(*dep))
            .collect();
        if !deps.is_empty() {
            println!("      after: {:?}", deps);
        }
        if let Some(retries) = spec.retries {
            println!("      retries: {retries}");
        }
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}
