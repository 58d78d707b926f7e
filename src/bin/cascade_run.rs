// SPDX-License-Identifier: AGPL-3.0-only

//! Run one cascade and print the result.
//!
//! Usage:
//!   cargo run --release --bin cascade_run -- --fuel=H-1,Li7 --max-loops=5
//!   cargo run --release --bin cascade_run -- --config=params.json --json
//!
//! Parameters start from the defaults below, or from `--config=<file.json>`
//! (camelCase keys) when given; other flags then override single fields. The reaction database is `--db=<path>`
//! or discovered (`CASCADE_DATA_ROOT`, crate root, CWD).
//!
//! `--timeout-s=<secs>` cancels the run from this side once the wall-clock
//! budget is spent; the simulator itself never times out.

use nuclide_cascade::analysis::{analyze_pathways, PathwayAnalysis, PathwayFilter, PathwaySummary};
use nuclide_cascade::data::load_reaction_database;
use nuclide_cascade::discovery;
use nuclide_cascade::harness::{CascadeHarness, HarnessEvent};
use nuclide_cascade::progress::{ProgressPhase, ProgressUpdate};
use nuclide_cascade::{CascadeParams, CascadeResult};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

const USAGE: &str = "usage: cascade_run [--config=FILE] [--fuel=E-A,...] [--temperature=K] \
[--min-fusion=MeV] [--min-two-to-two=MeV] [--max-nuclides=N] [--max-loops=N] \
[--feedback-bosons=BOOL] [--feedback-fermions=BOOL] [--allow-dimers] [--exclude-melted] \
[--exclude-boiled-off] [--db=FILE] [--data-root=DIR] [--top=N] [--search=TEXT] \
[--feedback-only] [--timeout-s=SECS] [--json]";

struct CliArgs {
    params: CascadeParams,
    db: Option<PathBuf>,
    data_root: Option<PathBuf>,
    filter: PathwayFilter,
    timeout: Option<Duration>,
    json: bool,
}

fn parse<T: std::str::FromStr>(flag: &str, val: &str) -> Result<T, String> {
    val.parse()
        .map_err(|_| format!("{flag}: cannot parse {val:?}"))
}

fn parse_timeout(val: &str) -> Result<Duration, String> {
    let secs: f64 = parse("--timeout-s", val)?;
    Duration::try_from_secs_f64(secs).map_err(|e| format!("--timeout-s: {val:?}: {e}"))
}

fn default_params() -> CascadeParams {
    CascadeParams {
        fuel: vec!["H-1".into(), "Li-7".into()],
        temperature_k: 1200.0,
        min_fusion_mev: 0.0,
        min_two_to_two_mev: 0.0,
        max_nuclides: 500,
        max_loops: 10,
        feedback_bosons: true,
        feedback_fermions: true,
        allow_dimers: false,
        exclude_melted: false,
        exclude_boiled_off: false,
    }
}

fn parse_args(args: &[String]) -> Result<CliArgs, String> {
    let config = args
        .iter()
        .rev()
        .find_map(|a| a.strip_prefix("--config="))
        .map(PathBuf::from);
    let mut params = match config {
        Some(path) => CascadeParams::from_json_file(&path).map_err(|e| e.to_string())?,
        None => default_params(),
    };
    let mut db = None;
    let mut data_root = None;
    let mut filter = PathwayFilter {
        limit: Some(20),
        ..PathwayFilter::default()
    };
    let mut timeout = None;
    let mut json = false;

    for arg in args {
        if arg.starts_with("--config=") {
            // Loaded before the loop.
        } else if let Some(val) = arg.strip_prefix("--fuel=") {
            params.fuel = val.split(',').map(str::to_string).collect();
        } else if let Some(val) = arg.strip_prefix("--temperature=") {
            params.temperature_k = parse("--temperature", val)?;
        } else if let Some(val) = arg.strip_prefix("--min-fusion=") {
            params.min_fusion_mev = parse("--min-fusion", val)?;
        } else if let Some(val) = arg.strip_prefix("--min-two-to-two=") {
            params.min_two_to_two_mev = parse("--min-two-to-two", val)?;
        } else if let Some(val) = arg.strip_prefix("--max-nuclides=") {
            params.max_nuclides = parse("--max-nuclides", val)?;
        } else if let Some(val) = arg.strip_prefix("--max-loops=") {
            params.max_loops = parse("--max-loops", val)?;
        } else if let Some(val) = arg.strip_prefix("--feedback-bosons=") {
            params.feedback_bosons = parse("--feedback-bosons", val)?;
        } else if let Some(val) = arg.strip_prefix("--feedback-fermions=") {
            params.feedback_fermions = parse("--feedback-fermions", val)?;
        } else if arg == "--allow-dimers" {
            params.allow_dimers = true;
        } else if arg == "--exclude-melted" {
            params.exclude_melted = true;
        } else if arg == "--exclude-boiled-off" {
            params.exclude_boiled_off = true;
        } else if let Some(val) = arg.strip_prefix("--db=") {
            db = Some(PathBuf::from(val));
        } else if let Some(val) = arg.strip_prefix("--data-root=") {
            data_root = Some(PathBuf::from(val));
        } else if let Some(val) = arg.strip_prefix("--top=") {
            filter.limit = Some(parse("--top", val)?);
        } else if let Some(val) = arg.strip_prefix("--search=") {
            filter.search = Some(val.to_string());
        } else if arg == "--feedback-only" {
            filter.feedback_only = true;
        } else if let Some(val) = arg.strip_prefix("--timeout-s=") {
            timeout = Some(parse_timeout(val)?);
        } else if arg == "--json" {
            json = true;
        } else {
            return Err(format!("unknown argument {arg:?}"));
        }
    }

    Ok(CliArgs {
        params,
        db,
        data_root,
        filter,
        timeout,
        json,
    })
}

fn print_progress(update: &ProgressUpdate) {
    match &update.phase {
        ProgressPhase::Generation { reactions } => eprintln!(
            "  [cascade] generation {}/{}: {} reactions",
            update.generation + 1,
            update.total_generations,
            reactions.len()
        ),
        ProgressPhase::Finalizing => eprintln!("  [cascade] finalizing"),
        ProgressPhase::CalculatingEnergy { processed, total } => {
            eprintln!("  [cascade] energy {processed}/{total}");
        }
        ProgressPhase::PreparingResults => eprintln!("  [cascade] preparing results"),
    }
}

/// Drain harness events, cancelling once `timeout` has elapsed.
fn wait_with_deadline(
    harness: &CascadeHarness,
    timeout: Option<Duration>,
) -> Result<CascadeResult, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let mut cancel_sent = false;
    loop {
        match harness.recv_timeout(Duration::from_millis(100)) {
            Some(HarnessEvent::Progress(update)) => print_progress(&update),
            Some(HarnessEvent::Complete(result)) => return Ok(*result),
            Some(HarnessEvent::Failed(failure)) => return Err(failure.into()),
            None if !harness.is_worker_alive() => return Err("cascade worker stopped".into()),
            None => {}
        }
        if !cancel_sent && timeout.is_some_and(|t| start.elapsed() >= t) {
            log::warn!("wall-clock budget spent, cancelling");
            harness.cancel();
            cancel_sent = true;
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Report<'a> {
    result: &'a CascadeResult,
    pathway_summary: PathwaySummary,
    pathways: Vec<&'a PathwayAnalysis>,
}

fn database_path(args: &CliArgs) -> Result<PathBuf, Box<dyn std::error::Error>> {
    if let Some(db) = &args.db {
        return Ok(db.clone());
    }
    let root = discovery::try_discover_with_override(args.data_root.as_deref())?;
    Ok(discovery::reaction_database_path(&root))
}

fn run(args: CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    let path = database_path(&args)?;
    let db = load_reaction_database(&path)?;
    let harness = CascadeHarness::with_source(Arc::new(db))?;

    harness.run(args.params)?;
    let result = wait_with_deadline(&harness, args.timeout)?;
    harness.shutdown();

    let pathways = analyze_pathways(&result.reactions);
    let summary = PathwaySummary::from_pathways(&pathways);
    let shown = args.filter.apply(&pathways);

    if args.json {
        let report = Report {
            result: &result,
            pathway_summary: summary,
            pathways: shown,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!();
    print!("{}", result.summary());
    println!();
    println!(
        "  Pathways: {} unique, {} feedback, {} reactions, {:.3} MeV",
        summary.unique_pathways,
        summary.feedback_pathways,
        summary.total_reactions,
        summary.total_energy_mev
    );
    println!(
        "  {:<34} {:>5} {:>10} {:>7}  {:<8} gens",
        "pathway", "freq", "avg MeV", "rarity", "feedback"
    );
    for p in shown {
        let gens: Vec<String> = p.generations_seen.iter().map(ToString::to_string).collect();
        println!(
            "  {:<34} {:>5} {:>10.3} {:>7.1}  {:<8} {}",
            p.signature(),
            p.frequency,
            p.average_energy_mev,
            p.rarity_score,
            if p.is_feedback { "yes" } else { "" },
            gens.join(",")
        );
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let argv: Vec<String> = std::env::args().skip(1).collect();
    let args = match parse_args(&argv) {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("cascade_run: {msg}");
            eprintln!("{USAGE}");
            std::process::exit(2);
        }
    };
    if let Err(e) = run(args) {
        eprintln!("cascade_run: {e}");
        std::process::exit(1);
    }
}
