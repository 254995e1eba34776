use std::collections::HashSet;

use common::{GpuSummary, Sample, TopConsumer};
use futures::future::join_all;
use master::config::MasterConfig;
use master::state::{display_order, AppState};
use rand::distr::Alphanumeric;
use rand::Rng;

async fn spawn_aggregator() -> (String, AppState) {
    let config = MasterConfig {
        http_addr: "127.0.0.1:0".to_string(),
        identity: "integration".to_string(),
    };
    let state = AppState::new(&config);
    let listener = tokio::net::TcpListener::bind(&config.http_addr)
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let app = master::http::create_router(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    (format!("http://{addr}"), state)
}

/// `count` distinct node names of random length, each with a random record.
fn random_records(count: usize) -> Vec<(String, String)> {
    let mut rng = rand::rng();
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(count);
    while out.len() < count {
        let len = rng.random_range(1..=6);
        let name: String = (&mut rng)
            .sample_iter(Alphanumeric)
            .take(len)
            .map(char::from)
            .collect();
        if !seen.insert(name.clone()) {
            continue;
        }
        let sample = Sample {
            node: name.clone(),
            cpu: Some(rng.random_range(0.0..1.0)),
            memory: Some(rng.random_range(0.0..1.0)),
            gpu: GpuSummary {
                busy: rng.random_range(0..4),
                total: 4,
            },
            top_cpu: TopConsumer::new("alice", rng.random_range(0.0..400.0)),
            top_memory: TopConsumer::new("bob", rng.random_range(0.0..50.0)),
        };
        out.push((name, common::encode(&sample)));
    }
    out
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_writers_then_single_reader_sees_every_node() {
    let (base, _) = spawn_aggregator().await;
    let client = reqwest::Client::new();
    let records = random_records(64);

    let pushes = records.iter().map(|(_, record)| {
        let client = client.clone();
        let url = format!("{base}/in");
        let record = record.clone();
        async move {
            let res = client.post(url).body(record).send().await.expect("push");
            assert!(res.status().is_success());
            assert_eq!(res.text().await.expect("ack"), "OK");
        }
    });
    join_all(pushes).await;

    let table = client
        .get(format!("{base}/"))
        .send()
        .await
        .expect("render")
        .text()
        .await
        .expect("table body");

    let mut expected = records.clone();
    expected.sort_by(|a, b| display_order(&a.0, &b.0));

    let rows: Vec<&str> = table.lines().skip(1).collect();
    assert_eq!(rows.len(), expected.len());
    for (row, (_, record)) in rows.iter().zip(&expected) {
        // "HHMM " prefix, then the record untouched.
        assert_eq!(&row[5..], record.as_str());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_writes_for_one_node_keep_one_whole_record() {
    let (base, state) = spawn_aggregator().await;
    let client = reqwest::Client::new();
    let sent: Vec<String> = (0..50).map(|i| format!("same {i:>4} payload")).collect();

    join_all(sent.iter().map(|record| {
        client
            .post(format!("{base}/in"))
            .body(record.clone())
            .send()
    }))
    .await;

    assert_eq!(state.nodes.len().await, 1);
    let kept = state.nodes.get("same").await.expect("entry").record;
    assert!(sent.contains(&kept), "torn record {kept:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn view_counter_matches_renders_despite_ingests() {
    let (base, state) = spawn_aggregator().await;
    let client = reqwest::Client::new();
    let renders: u64 = 20;

    let render_calls = (0..renders).map(|_| {
        let client = client.clone();
        let url = format!("{base}/");
        async move {
            client.get(url).send().await.expect("render");
        }
    });
    let ingest_calls = (0..40).map(|i| {
        let client = client.clone();
        let url = format!("{base}/in");
        async move {
            client
                .post(url)
                .body(format!("w{i} data"))
                .send()
                .await
                .expect("push");
        }
    });
    tokio::join!(join_all(render_calls), join_all(ingest_calls));

    assert_eq!(state.nodes.views(), renders);
    let ver = client
        .get(format!("{base}/ver"))
        .send()
        .await
        .expect("ver")
        .text()
        .await
        .expect("ver body");
    assert!(ver.starts_with(&format!("view: {renders}\n")), "got {ver:?}");
}
