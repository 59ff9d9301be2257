//! Fill-rate simulator for the cuckoo placement engine.
//!
//! Inserts random keys into an in-memory table and reports how full the
//! table got, how many inserts were rejected and how long the eviction
//! chains were. Run with `RUST_LOG=exm_cuckoo=debug` for per-placement events.
#![forbid(unsafe_code)]

use std::error::Error;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, ValueEnum};
use exm_cuckoo::cuckoo::{
    CounterMetrics, CuckooConfig, CuckooOptions, MemorySlots, MoveGraph, PlacementRequest,
};
use exm_cuckoo::types::{EntryHandle, SlotId};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

/// One handle per key; handles are `u32`.
const MAX_KEYS: u64 = 1 << 32;

#[derive(Parser, Debug)]
#[command(
    name = "cuckoo-sim",
    version,
    about = "Simulate cuckoo placement into a hash-way table"
)]
struct Cli {
    #[arg(long, default_value_t = 4096, help = "Number of slots in the table")]
    slots: u32,

    #[arg(long, default_value_t = 4, help = "Hash ways; each key gets one candidate per way")]
    ways: u32,

    #[arg(
        long,
        value_parser = clap::value_parser!(u64).range(..=MAX_KEYS),
        help = "Keys to insert (defaults to slots * entries-per-node)"
    )]
    keys: Option<u64>,

    #[arg(long, default_value_t = 0x5eed, help = "RNG seed")]
    seed: u64,

    #[arg(long, help = "Sub-entries packed per node")]
    entries_per_node: Option<u32>,

    #[arg(long, help = "BFS queue capacity")]
    bfs_queue_len: Option<usize>,

    #[arg(long, help = "Longest eviction chain allowed")]
    max_moves: Option<usize>,

    #[arg(
        long,
        default_value_t = 0,
        help = "Commit the graph transaction every N placements (0 disables transactions)"
    )]
    batch: usize,

    #[arg(long, value_name = "FILE", env = "CUCKOO_CONFIG", help = "TOML options file")]
    config: Option<PathBuf>,

    #[arg(
        long,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for the report"
    )]
    format: OutputFormat,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Serialize)]
struct SimReport {
    slots: u32,
    ways: u32,
    entries_per_node: u32,
    keys: u64,
    placed: u64,
    failed: u64,
    fill_ratio: f64,
    first_failure_fill: Option<f64>,
    bfs_explored: u64,
    elapsed_ms: f64,
    move_histogram: Vec<u64>,
}

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    if cli.ways == 0 || cli.ways > cli.slots {
        return Err("--ways must be between 1 and --slots".into());
    }

    let cfg = match &cli.config {
        Some(path) => CuckooConfig::load(path)?,
        None => CuckooConfig::default(),
    };
    let metrics = Arc::new(CounterMetrics::default());
    let mut opts = CuckooOptions::from_config(&cfg).metrics(metrics.clone());
    if let Some(entries) = cli.entries_per_node {
        opts = opts.entries_per_node(entries);
    }
    if let Some(len) = cli.bfs_queue_len {
        opts = opts.bfs_queue_len(len);
    }
    if let Some(moves) = cli.max_moves {
        opts = opts.max_moves(moves);
    }

    let mut graph = MoveGraph::new(cli.slots, &opts)?;
    let mut store = MemorySlots::new(cli.slots);
    let capacity = u64::from(cli.slots) * u64::from(graph.entries_per_node());
    let keys = key_budget(cli.keys, capacity)?;
    let way_len = cli.slots / cli.ways;
    let is_txn = cli.batch > 0;

    let mut rng = ChaCha8Rng::seed_from_u64(cli.seed);
    let mut candidates = Vec::with_capacity(cli.ways as usize);
    let mut first_failure = None;
    let start = Instant::now();
    for key in 0..keys {
        candidates.clear();
        for way in 0..cli.ways {
            candidates.push(SlotId(way * way_len + rng.gen_range(0..way_len)));
        }
        let request = PlacementRequest {
            candidates: &candidates,
            handle: EntryHandle(u32::try_from(key)?),
            payload: key,
        };
        match graph.place_entry(request, &mut store, is_txn) {
            Ok(_) => {}
            Err(err) if err.is_retryable() => {
                if first_failure.is_none() {
                    first_failure = Some(graph.occupied_entries());
                }
            }
            Err(err) => return Err(err.into()),
        }
        if is_txn && (key + 1) % cli.batch as u64 == 0 {
            graph.txn_commit();
        }
    }
    if is_txn {
        graph.txn_commit();
    }
    let elapsed = start.elapsed();

    let report = SimReport {
        slots: cli.slots,
        ways: cli.ways,
        entries_per_node: graph.entries_per_node(),
        keys,
        placed: metrics.placements.load(Ordering::Relaxed),
        failed: metrics.failures(),
        fill_ratio: graph.occupied_entries() as f64 / capacity as f64,
        first_failure_fill: first_failure.map(|at| at as f64 / capacity as f64),
        bfs_explored: metrics.bfs_nodes_explored.load(Ordering::Relaxed),
        elapsed_ms: elapsed.as_secs_f64() * 1_000.0,
        move_histogram: metrics.histogram().to_vec(),
    };
    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_report_text(&report),
    }
    Ok(())
}

/// Number of keys to insert, capped so every key gets a distinct handle.
fn key_budget(requested: Option<u64>, capacity: u64) -> Result<u64, String> {
    let keys = requested.unwrap_or(capacity);
    if keys > MAX_KEYS {
        return Err(format!(
            "{keys} keys exceed the {MAX_KEYS} distinct entry handles; pass a smaller --keys"
        ));
    }
    Ok(keys)
}

fn print_report_text(report: &SimReport) {
    println!("slots            {}", report.slots);
    println!("ways             {}", report.ways);
    println!("entries/node     {}", report.entries_per_node);
    println!("keys             {}", report.keys);
    println!("placed           {}", report.placed);
    println!("failed           {}", report.failed);
    println!("fill ratio       {:.4}", report.fill_ratio);
    if let Some(fill) = report.first_failure_fill {
        println!("first failure    {fill:.4}");
    }
    println!("bfs explored     {}", report.bfs_explored);
    println!("elapsed          {:.2} ms", report.elapsed_ms);
    println!("moves histogram");
    for (moves, count) in report.move_histogram.iter().enumerate().skip(1) {
        println!("  {moves:>2}  {count}");
    }
}
