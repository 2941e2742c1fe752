//! Samyama Vector CLI: demo and benchmark driver for the vector engine
//!
//! Runs entirely in process; there is no server to connect to.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{ContentArrangement, Table};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use samyama_vector::{
    AsyncClient, Client, DistanceMetric, EngineConfig, IndexKind, NewRow, Predicate, RankedRow, ScalarType,
    Schema, SearchRequest, Value, VectorDbError,
};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "samyama-vector", version, about = "Samyama vector engine CLI")]
struct Cli {
    /// Engine configuration file (YAML)
    #[arg(long, global = true, env = "SAMYAMA_VECTOR_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, clap::ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Sentence search over random embeddings
    Demo {
        /// Number of sentences to insert
        #[arg(long, default_value_t = 50)]
        rows: usize,

        /// Embedding dimensionality
        #[arg(long, default_value_t = 384)]
        dims: usize,

        /// Results per query
        #[arg(long, default_value_t = 3)]
        k: usize,

        /// Row whose vector is used as the query
        #[arg(long, default_value_t = 7)]
        probe: usize,

        /// Optional filter, e.g. "page >= 2"
        #[arg(long)]
        filter: Option<String>,

        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
    /// Compare HNSW recall and throughput against exact search
    Bench {
        #[arg(long, default_value_t = 10_000)]
        rows: usize,

        #[arg(long, default_value_t = 128)]
        dims: usize,

        #[arg(long, default_value_t = 200)]
        queries: usize,

        #[arg(long, default_value_t = 10)]
        k: usize,

        /// Search width override for HNSW
        #[arg(long)]
        ef: Option<usize>,

        /// Distance metric: l2, inner_product or cosine
        #[arg(long, default_value = "l2")]
        metric: String,

        #[arg(long, default_value_t = 7)]
        seed: u64,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let result = match load_config(cli.config.as_ref()) {
        Ok(config) => match cli.command {
            Commands::Demo {
                rows,
                dims,
                k,
                probe,
                filter,
                seed,
            } => run_demo(config, rows, dims, k, probe, filter.as_deref(), seed, &cli.format).await,
            Commands::Bench {
                rows,
                dims,
                queries,
                k,
                ef,
                metric,
                seed,
            } => run_bench(config, rows, dims, queries, k, ef, &metric, seed, &cli.format),
        },
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<EngineConfig> {
    match path {
        Some(path) => {
            let config = EngineConfig::from_yaml_file(path)
                .with_context(|| format!("loading config from {}", path.display()))?;
            info!("Loaded engine config from {}", path.display());
            Ok(config)
        }
        None => Ok(EngineConfig::default()),
    }
}

fn random_vectors(rng: &mut StdRng, n: usize, dims: usize) -> Vec<Vec<f32>> {
    (0..n)
        .map(|_| (0..dims).map(|_| rng.gen::<f32>() * 2.0 - 1.0).collect())
        .collect()
}

const TOPICS: [&str; 5] = ["storage", "indexing", "graphs", "queries", "recall"];

#[allow(clippy::too_many_arguments)]
async fn run_demo(
    config: EngineConfig,
    rows: usize,
    dims: usize,
    k: usize,
    probe: usize,
    filter: Option<&str>,
    seed: u64,
    format: &OutputFormat,
) -> Result<()> {
    if probe >= rows {
        bail!("probe row {} is outside the {} inserted rows", probe, rows);
    }
    let client = AsyncClient::new(config);
    let schema = Schema::builder()
        .scalar("sentences", ScalarType::String)
        .scalar("page", ScalarType::Integer)
        .vector("vectors", dims, DistanceMetric::L2, IndexKind::Hnsw)
        .build()?;

    let acquired = client.get_or_create_table("sentences", schema).await?;
    info!("Table sentences acquired (created: {})", acquired.is_created());

    let mut rng = StdRng::seed_from_u64(seed);
    let vectors = random_vectors(&mut rng, rows, dims);
    let batch: Vec<NewRow> = vectors
        .iter()
        .enumerate()
        .map(|(i, v)| {
            NewRow::new(v.clone())
                .with("sentences", format!("Sentence {} about {}", i, TOPICS[i % TOPICS.len()]))
                .with("page", (i / 10) as i64)
        })
        .collect();
    let inserted = client.insert("sentences", batch).await?;
    info!("Inserted {} sentences", inserted);

    let mut request = SearchRequest::new(k);
    if let Some(filter) = filter {
        request = request.with_filter(Predicate::parse(filter)?);
    }
    let results = client
        .search("sentences", vec![vectors[probe].clone()], request)
        .await?;
    let hits = results.into_iter().next().unwrap_or_default();

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&hits)?),
        OutputFormat::Table => print_hits(&hits),
    }

    // Mismatched vectors are rejected before anything is stored
    let short_len = if dims > 300 { 300 } else { dims + 1 };
    let short = NewRow::new(vec![0.0; short_len])
        .with("sentences", "too short")
        .with("page", 0i64);
    match client.insert("sentences", vec![short]).await {
        Err(VectorDbError::DimensionMismatch { expected, got }) => {
            println!("Rejected vector of length {} (table expects {})", got, expected)
        }
        other => bail!("expected a dimension mismatch, got {:?}", other),
    }

    client.drop_table("sentences").await?;
    match client.scan("sentences", None).await {
        Err(VectorDbError::TableNotFound(name)) => println!("Dropped table {}", name),
        other => bail!("expected the table to be gone, got {:?}", other.map(|rows| rows.len())),
    }
    Ok(())
}

fn print_hits(hits: &[RankedRow]) {
    if hits.is_empty() {
        println!("(no results)");
        return;
    }
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    let mut header = vec!["row_id".to_string()];
    header.extend(hits[0].attributes.keys().cloned());
    header.push("distance".to_string());
    table.set_header(header);

    for hit in hits {
        let mut cells = vec![hit.row_id.as_u64().to_string()];
        cells.extend(hit.attributes.values().map(format_value));
        cells.push(format!("{:.4}", hit.distance));
        table.add_row(cells);
    }
    println!("{}", table);
    println!("{} row(s)", hits.len());
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[derive(Serialize)]
struct BenchReport {
    rows: usize,
    dims: usize,
    queries: usize,
    k: usize,
    metric: String,
    hnsw_insert_secs: f64,
    flat_insert_secs: f64,
    hnsw_qps: f64,
    flat_qps: f64,
    recall: f64,
    max_layer: usize,
    total_edges: usize,
}

#[allow(clippy::too_many_arguments)]
fn run_bench(
    config: EngineConfig,
    rows: usize,
    dims: usize,
    queries: usize,
    k: usize,
    ef: Option<usize>,
    metric: &str,
    seed: u64,
    format: &OutputFormat,
) -> Result<()> {
    let metric: DistanceMetric = metric.parse()?;
    let client = Client::new(config);
    for (name, index) in [("bench_hnsw", IndexKind::Hnsw), ("bench_flat", IndexKind::Flat)] {
        let schema = Schema::builder()
            .scalar("id", ScalarType::Integer)
            .vector("embedding", dims, metric, index)
            .build()?;
        client.create_table(name, schema)?;
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let data = random_vectors(&mut rng, rows, dims);
    let probes = random_vectors(&mut rng, queries, dims);
    let batch = || -> Vec<NewRow> {
        data.iter()
            .enumerate()
            .map(|(i, v)| NewRow::new(v.clone()).with("id", i as i64))
            .collect()
    };

    let started = Instant::now();
    client.insert("bench_hnsw", batch())?;
    let hnsw_insert_secs = started.elapsed().as_secs_f64();
    let started = Instant::now();
    client.insert("bench_flat", batch())?;
    let flat_insert_secs = started.elapsed().as_secs_f64();
    info!("Inserted {} rows of {} dims", rows, dims);

    let mut request = SearchRequest::new(k);
    request.ef = ef;
    let started = Instant::now();
    let approximate = client.search_with("bench_hnsw", &probes, &request)?;
    let hnsw_secs = started.elapsed().as_secs_f64();
    let started = Instant::now();
    let exact = client.search("bench_flat", &probes, k, None)?;
    let flat_secs = started.elapsed().as_secs_f64();

    let recall = mean_recall(&approximate, &exact);
    let stats = client.stats("bench_hnsw")?.hnsw.context("hnsw table reported no graph stats")?;
    let report = BenchReport {
        rows,
        dims,
        queries,
        k,
        metric: metric.to_string(),
        hnsw_insert_secs,
        flat_insert_secs,
        hnsw_qps: queries as f64 / hnsw_secs.max(f64::EPSILON),
        flat_qps: queries as f64 / flat_secs.max(f64::EPSILON),
        recall,
        max_layer: stats.max_layer,
        total_edges: stats.total_edges,
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Table => {
            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["index", "insert (s)", "queries/s", "recall@k"]);
            table.add_row(vec![
                "hnsw".to_string(),
                format!("{:.3}", report.hnsw_insert_secs),
                format!("{:.0}", report.hnsw_qps),
                format!("{:.4}", report.recall),
            ]);
            table.add_row(vec![
                "flat".to_string(),
                format!("{:.3}", report.flat_insert_secs),
                format!("{:.0}", report.flat_qps),
                "1.0000".to_string(),
            ]);
            println!("{}", table);
            println!(
                "{} rows, {} dims, k={}, {} | hnsw layers: {}, edges: {}",
                rows,
                dims,
                k,
                report.metric,
                report.max_layer + 1,
                report.total_edges
            );
        }
    }
    Ok(())
}

/// Average fraction of the exact top-k found by the approximate search
fn mean_recall(approximate: &[Vec<RankedRow>], exact: &[Vec<RankedRow>]) -> f64 {
    let per_query: Vec<f64> = approximate
        .iter()
        .zip(exact)
        .filter(|(_, truth)| !truth.is_empty())
        .map(|(found, truth)| {
            let found: Vec<_> = found.iter().map(|r| r.get("id")).collect();
            let hits = truth.iter().filter(|r| found.contains(&r.get("id"))).count();
            hits as f64 / truth.len() as f64
        })
        .collect();
    if per_query.is_empty() {
        return 1.0;
    }
    per_query.iter().sum::<f64>() / per_query.len() as f64
}
