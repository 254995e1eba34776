use clap::Parser;
use colored::*;
use common::{GpuSummary, Sample, TopConsumer};
use hdrhistogram::Histogram;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use reqwest::Client;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::time::sleep;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Aggregator base URL
    #[arg(short, long, default_value = "http://127.0.0.1:8080")]
    url: String,

    /// Number of simulated reporters
    #[arg(short, long, default_value_t = 300)]
    nodes: usize,

    /// Records pushed by each reporter
    #[arg(short, long, default_value_t = 10)]
    rounds: usize,

    /// Delay between two pushes of one reporter in ms
    #[arg(short, long, default_value_t = 1000)]
    delay: u64,

    /// Per-request timeout in ms
    #[arg(short, long, default_value_t = 5000)]
    timeout: u64,
}

#[derive(Clone)]
struct MetricsCollector {
    push_times: Arc<Mutex<Histogram<u64>>>,
    total_pushes: Arc<Mutex<usize>>,
    failed_pushes: Arc<Mutex<usize>>,
}

impl MetricsCollector {
    fn new() -> Self {
        Self {
            push_times: Arc::new(Mutex::new(Histogram::<u64>::new(3).unwrap())),
            total_pushes: Arc::new(Mutex::new(0)),
            failed_pushes: Arc::new(Mutex::new(0)),
        }
    }

    fn record(&self, elapsed: Duration, success: bool) {
        let mut push = self.push_times.lock().unwrap();
        push.record(elapsed.as_millis() as u64).unwrap();

        let mut total = self.total_pushes.lock().unwrap();
        *total += 1;

        if !success {
            let mut failed = self.failed_pushes.lock().unwrap();
            *failed += 1;
        }
    }
}

/// Node names fit the 6 character column, so they survive encoding intact.
fn node_name(index: usize) -> String {
    format!("ld{:04}", index % 10_000)
}

/// Deterministic but varied readings for one simulated push.
fn synthetic_sample(index: usize, round: usize) -> Sample {
    let spread = ((index * 31 + round * 17) % 1000) as f64 / 1000.0;
    Sample {
        node: node_name(index),
        cpu: Some(spread),
        memory: Some(1.0 - spread / 2.0),
        gpu: GpuSummary {
            busy: (index % 5) as u32,
            total: 4,
        },
        top_cpu: TopConsumer::new(format!("user{}", index % 7), spread * 400.0),
        top_memory: TopConsumer::new(format!("user{}", index % 3), spread * 40.0),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    println!("{}", "Starting Load Test...".green().bold());
    println!("Target: {}", args.url);
    println!("Nodes: {}", args.nodes);
    println!("Rounds/Node: {}", args.rounds);

    let client = Client::builder()
        .timeout(Duration::from_millis(args.timeout))
        .build()?;
    let metrics = MetricsCollector::new();
    let multi_pb = MultiProgress::new();
    let main_pb = multi_pb.add(ProgressBar::new((args.nodes * args.rounds) as u64));
    main_pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .unwrap()
            .progress_chars("#>-"),
    );

    let ingest_url = format!("{}/in", args.url.trim_end_matches('/'));
    let mut handles = vec![];

    for node in 0..args.nodes {
        let client = client.clone();
        let url = ingest_url.clone();
        let rounds = args.rounds;
        let delay = args.delay;
        let metrics = metrics.clone();
        let pb = main_pb.clone();

        let handle = tokio::spawn(async move {
            for round in 0..rounds {
                let record = common::encode(&synthetic_sample(node, round));
                let start = Instant::now();
                let result = client.post(&url).body(record).send().await;
                let success = matches!(&result, Ok(res) if res.status().is_success());
                metrics.record(start.elapsed(), success);
                if let Err(e) = result {
                    pb.println(format!("Node {} round {} failed: {}", node, round, e));
                }
                pb.inc(1);
                sleep(Duration::from_millis(delay)).await;
            }
        });
        handles.push(handle);
    }

    for handle in handles {
        handle.await?;
    }

    main_pb.finish_with_message("Done");

    // Every simulated node must appear exactly once in the table.
    let table = client
        .get(format!("{}/", args.url.trim_end_matches('/')))
        .send()
        .await?
        .text()
        .await?;
    let mut rows: HashMap<String, usize> = HashMap::new();
    for line in table.lines().skip(1) {
        if let Some(id) = line.split_whitespace().nth(1) {
            *rows.entry(id.to_string()).or_default() += 1;
        }
    }
    let expected = args.nodes.min(10_000);
    let missing = (0..expected)
        .filter(|i| rows.get(&node_name(*i)) != Some(&1))
        .count();

    // Report
    println!("\n{}", "Load Test Results".bold().underline());

    let total = *metrics.total_pushes.lock().unwrap();
    let failed = *metrics.failed_pushes.lock().unwrap();
    let push = metrics.push_times.lock().unwrap();

    println!("Total Pushes: {}", total);
    println!("Failed Pushes: {} ({:.2}%)", failed, (failed as f64 / total.max(1) as f64) * 100.0);

    println!("\n{}:", "Push Latency".cyan());
    println!("  Min: {} ms", push.min());
    println!("  P50: {} ms", push.value_at_quantile(0.5));
    println!("  P95: {} ms", push.value_at_quantile(0.95));
    println!("  P99: {} ms", push.value_at_quantile(0.99));
    println!("  Max: {} ms", push.max());

    println!("\n{}:", "Table Check".cyan());
    if missing == 0 {
        println!("  {}", format!("all {} nodes listed once", expected).green());
    } else {
        println!("  {}", format!("{} of {} nodes missing or duplicated", missing, expected).red());
    }

    // Generate JSON report
    let report = serde_json::json!({
        "config": {
            "nodes": args.nodes,
            "rounds_per_node": args.rounds,
            "url": args.url
        },
        "results": {
            "total_pushes": total,
            "failed_pushes": failed,
            "push_latency": {
                "p50": push.value_at_quantile(0.5),
                "p95": push.value_at_quantile(0.95),
                "p99": push.value_at_quantile(0.99)
            },
            "table_rows": rows.len(),
            "nodes_missing": missing
        }
    });

    std::fs::write("load_test_report.json", serde_json::to_string_pretty(&report)?)?;
    println!("\nReport saved to load_test_report.json");

    Ok(())
}
