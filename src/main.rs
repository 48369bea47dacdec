//! engram-db CLI
//!
//! Demo glue around the library.
//!
//! # Usage
//!
//! ```bash
//! # Seed a store with random vectors and run a query against it
//! engram-db demo --dimension 64 --count 1000 --k 5
//!
//! # Seed, snapshot to disk, then summarize the snapshot
//! engram-db demo --snapshot memory.json
//! engram-db inspect --path memory.json
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use engram_db::{JsonMap, MemoryStore, Snapshot, StoreConfig};

#[derive(Parser)]
#[command(name = "engram-db")]
#[command(about = "In-process vector store for AI-agent memory")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Seed a demo store with random vectors and query it
    Demo {
        /// Vector dimension
        #[arg(long, default_value = "64")]
        dimension: usize,

        /// Number of vectors to seed
        #[arg(long, default_value = "1000")]
        count: usize,

        /// Results per query
        #[arg(short, long, default_value = "5")]
        k: usize,

        /// RNG seed for the demo data
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Write a snapshot of the seeded store to this path
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },

    /// Summarize a snapshot file
    Inspect {
        /// Path to a snapshot written by `demo --snapshot`
        #[arg(short, long)]
        path: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Demo {
            dimension,
            count,
            k,
            seed,
            snapshot,
        } => run_demo(dimension, count, k, seed, snapshot),
        Commands::Inspect { path } => inspect(&path),
    }
}

fn run_demo(
    dimension: usize,
    count: usize,
    k: usize,
    seed: u64,
    snapshot: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut store = MemoryStore::new(StoreConfig::with_dimension(dimension))?;
    store.on_event(|event| tracing::debug!(?event, "store event"));

    let mut rng = StdRng::seed_from_u64(seed);
    for slot in 0..count {
        let vector: Vec<f32> = (0..dimension).map(|_| rng.gen::<f32>() - 0.5).collect();
        let mut metadata = JsonMap::new();
        metadata.insert("slot".into(), json!(slot));
        store.add_vector(vector, Some(metadata))?;
    }
    store.add_reasoning(
        "demo seeding",
        format!("seeded {count} random vectors of dimension {dimension}"),
        None,
    );

    let query: Vec<f32> = (0..dimension).map(|_| rng.gen::<f32>() - 0.5).collect();
    let hits = store.search(&query, k)?;
    println!("top {} of {} vectors:", hits.len(), count);
    for hit in &hits {
        println!(
            "  id={:<6} distance={:.4} metadata={}",
            hit.id,
            hit.distance,
            serde_json::to_string(&hit.metadata)?
        );
    }
    println!("{}", serde_json::to_string_pretty(&store.stats())?);

    if let Some(path) = snapshot {
        store.export().save(&path)?;
        println!("snapshot written to {}", path.display());
    }
    Ok(())
}

fn inspect(path: &PathBuf) -> anyhow::Result<()> {
    let snapshot =
        Snapshot::load(path).with_context(|| format!("loading snapshot {}", path.display()))?;
    println!("version:      {}", snapshot.version);
    println!("dimension:    {}", snapshot.config.dimension);
    println!("metric:       {:?}", snapshot.config.metric);
    println!(
        "index params: m={} ef_construction={} ef_search={}",
        snapshot.config.m, snapshot.config.ef_construction, snapshot.config.ef_search
    );
    println!("next id:      {}", snapshot.next_id);
    println!("vectors:      {}", snapshot.vectors.len());
    println!("reasoning:    {}", snapshot.reasoning.len());
    Ok(())
}
