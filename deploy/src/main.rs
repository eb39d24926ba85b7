// ============ LaunchKit Deployment Tool ============
// Validates a launch config, prints the resolved vesting schedules and
// dry-runs the whole launch against an in-memory cluster.
//
// Usage:
//   cargo run -p launchkit-deploy -- plan --config deploy/launch.example.json
//   cargo run -p launchkit-deploy -- simulate --config deploy/launch.example.json \
//       --creator <ADDRESS> --output report.json
//
// Nothing here talks to a real cluster. A live launch wires the same
// Orchestrator to RPC-backed collaborators.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use launchkit_math::amount::from_base_units;
use launchkit_math::timing::{activation_time, cliff_time, final_unlock_time};
use launchkit_sdk::config::{LaunchConfig, LaunchPlan};
use launchkit_sdk::keys::{Identity, KeyLoader, KeypairFile};
use launchkit_sdk::orchestrator::{Orchestrator, ProvisioningReport};
use launchkit_sdk::position::{lock_first_position, LockOutcome, LockRequest};
use launchkit_sdk::simulated::SimulatedCluster;
use launchkit_types::Address;
use serde::Serialize;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

// ============ CLI ============

#[derive(Parser, Debug)]
#[command(name = "launchkit-deploy", version, about = "Plan and dry-run token launches")]
struct Cli {
    /// Log at debug level regardless of RUST_LOG
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a launch config and print every vesting schedule
    Plan(PlanArgs),
    /// Run the full launch against a simulated cluster
    Simulate(SimulateArgs),
}

#[derive(Args, Debug)]
struct PlanArgs {
    /// Launch config (JSON)
    #[arg(short, long)]
    config: PathBuf,

    /// Write the resolved plan as JSON
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Block time used to print absolute cliff timestamps
    #[arg(long)]
    block_time: Option<i64>,
}

#[derive(Args, Debug)]
struct SimulateArgs {
    /// Launch config (JSON)
    #[arg(short, long)]
    config: PathBuf,

    /// Creator address; defaults to the public key in the config's keypair file
    #[arg(long)]
    creator: Option<Address>,

    /// Block time the simulated cluster reports
    #[arg(long, default_value_t = 1_700_000_000)]
    block_time: i64,

    /// Make the escrow for this recipient label fail (repeatable)
    #[arg(long = "fail-recipient")]
    fail_recipients: Vec<String>,

    /// After the launch, lock the pool position for this many seconds
    #[arg(long)]
    lock_duration: Option<u64>,

    /// Write the run report as JSON
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

// ============ Main ============

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Command::Plan(args) => plan(args),
        Command::Simulate(args) => simulate(args),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_plan(path: &Path) -> Result<LaunchPlan> {
    let config = LaunchConfig::load(path)?;
    config.validate().with_context(|| format!("{} failed validation", path.display()))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("cannot write {}", path.display()))?;
    info!(path = %path.display(), "written");
    Ok(())
}

// ============ plan ============

fn plan(args: PlanArgs) -> Result<()> {
    let plan = load_plan(&args.config)?;
    print_plan(&plan, args.block_time)?;
    if let Some(output) = &args.output {
        write_json(output, &plan)?;
    }
    Ok(())
}

fn print_plan(plan: &LaunchPlan, block_time: Option<i64>) -> Result<()> {
    let decimals = plan.config.token.decimals;
    let activation = block_time
        .map(|t| activation_time(t, plan.config.activation_delay_secs))
        .transpose()?;

    println!("=== Launch Plan ===");
    println!("Supply:      {} ({} base units)", plan.config.token.supply, plan.supply_units);
    println!("Decimals:    {}", decimals);
    if let Some(activation) = activation {
        println!("Activation:  {}", activation);
    }
    println!();
    println!(
        "  {:<20} {:>16} {:>16} {:>14} {:>4} {:>9} {:>10}",
        "label", "total", "cliff", "per period", "n", "freq", "residual"
    );

    for allocation in &plan.allocations {
        println!(
            "  {:<20} {:>16} {:>16} {:>14} {:>4} {:>9} {:>10}",
            allocation.label,
            allocation.total_amount,
            allocation.cliff_unlock_amount,
            allocation.per_period_amount,
            allocation.number_of_periods,
            allocation.period_frequency_secs,
            allocation.residual,
        );
        if let Some(activation) = activation {
            let cliff = cliff_time(activation, allocation.cliff_offset_secs)?;
            let last = final_unlock_time(cliff, &allocation.schedule)?;
            println!("  {:<20} cliff at {}, fully vested at {}", "", cliff, last);
        }
        if allocation.schedule.folded != 0 {
            println!("  {:<20} {} base units folded into the cliff", "", allocation.schedule.folded);
        }
    }

    if let Some(pool) = plan.pool_amounts {
        println!();
        println!("Pool:        {} token A / {} token B (base units)", pool.token_a, pool.token_b);
    }
    println!("Unallocated: {}", from_base_units(plan.unallocated_units as u128, decimals)?);
    Ok(())
}

// ============ simulate ============

#[derive(Serialize)]
struct SimulationOutput {
    report: ProvisioningReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    position_lock: Option<LockOutcome>,
}

fn simulate(args: SimulateArgs) -> Result<()> {
    let plan = load_plan(&args.config)?;
    let creator = match args.creator {
        Some(address) => Identity { address },
        None => {
            let keypair = resolve_relative(&args.config, &plan.config.keypair_path);
            KeypairFile::new(&keypair).load().context("pass --creator to simulate without a keypair")?
        }
    };

    let cluster = SimulatedCluster::new(args.block_time);
    for label in &args.fail_recipients {
        let allocation = plan
            .allocations
            .iter()
            .find(|a| &a.label == label)
            .ok_or_else(|| anyhow!("no recipient labelled {:?}", label))?;
        warn!(label = %label, recipient = %allocation.recipient, "injecting escrow failure");
        cluster.fail_recipient(allocation.recipient);
    }

    let has_pool = plan.config.pool.is_some();
    let mut orchestrator = Orchestrator::new(plan, creator, cluster.collaborators());
    let outcome = orchestrator.run();
    let report = orchestrator.report().clone();
    print_report(&report, &cluster);

    let position_lock = match (&outcome, args.lock_duration, &report.pool) {
        (Ok(_), Some(duration), Some(pool)) => {
            let request = LockRequest::new(pool.pool, creator.address, duration);
            Some(lock_first_position(&cluster, &cluster, &request)?)
        }
        (Ok(_), Some(_), None) if !has_pool => {
            warn!("no pool in config, nothing to lock");
            None
        }
        _ => None,
    };

    if let Some(output) = &args.output {
        write_json(output, &SimulationOutput { report, position_lock })?;
    }
    outcome.map(|_| ()).context("simulated launch failed")
}

fn resolve_relative(config: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    config.parent().map(|dir| dir.join(path)).unwrap_or_else(|| path.to_path_buf())
}

fn print_report(report: &ProvisioningReport, cluster: &SimulatedCluster) {
    println!("=== Simulated Launch ===");
    println!("Creator:     {}", report.creator);
    if let Some(mint) = &report.mint {
        println!("Mint:        {}", mint);
        if let Some(balance) = cluster.balance(&report.creator, mint) {
            println!("Left over:   {} base units", balance);
        }
    }
    if let Some(activation) = report.activation_time {
        println!("Activation:  {}", activation);
    }
    println!();
    for receipt in report.succeeded() {
        println!("  OK     {:<20} escrow {} cliff {}", receipt.label, receipt.escrow, receipt.cliff_time);
    }
    for failure in report.failed() {
        println!("  FAILED {:<20} {}", failure.label, failure.reason);
    }
    if let Some(pool) = &report.pool {
        println!();
        println!("Pool:        {}", pool.pool);
        println!("Position:    {}", pool.position);
    }
}
