//! nodestat - push-based cluster status
//!
//! One binary, two roles:
//! - `--listen ADDR` runs the aggregator
//! - `--send URL[,URL...]` runs the reporter
//!
//! Both may be given, in which case the node reports to others while
//! serving its own table.

use clap::Parser;
use master::config::MasterConfig;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;
use worker::config::WorkerConfig;

#[derive(Parser, Debug)]
#[command(name = "nodestat", version, about)]
struct Cli {
    /// Aggregator base URLs to push reports to, separated by ','
    #[arg(long)]
    send: Option<String>,

    /// Address to serve the aggregator on, e.g. `:8080`
    #[arg(long)]
    listen: Option<String>,

    /// Seconds between two reports
    #[arg(long)]
    duration: Option<u64>,

    /// Used GPU memory (MiB) above which a GPU counts as busy
    #[arg(long)]
    gpu_threshold: Option<u64>,

    /// Per-push timeout in milliseconds
    #[arg(long)]
    push_timeout_ms: Option<u64>,

    /// Logging verbosity level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: Level,
}

impl Cli {
    fn master_config(&self) -> Option<MasterConfig> {
        match &self.listen {
            Some(listen) => Some(MasterConfig::new(listen)),
            None => MasterConfig::from_env(),
        }
    }

    fn worker_config(&self) -> Option<WorkerConfig> {
        let mut config = WorkerConfig::from_env();
        if let Some(send) = &self.send {
            config = config.with_master_urls(send);
        }
        if let Some(secs) = self.duration {
            config = config.with_report_interval_secs(secs);
        }
        if let Some(threshold) = self.gpu_threshold {
            config.gpu_busy_threshold_mb = threshold;
        }
        if let Some(ms) = self.push_timeout_ms {
            config.push_timeout = std::time::Duration::from_millis(ms);
        }
        (!config.master_urls.is_empty()).then_some(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let master_config = cli.master_config();
    let worker_config = cli.worker_config();

    match (master_config, worker_config) {
        (Some(master_config), Some(worker_config)) => {
            info!("Starting aggregator and reporter...");
            tokio::select! {
                res = master::serve(master_config) => {
                    if let Err(e) = &res {
                        error!("Aggregator terminated: {}", e);
                    }
                    res
                }
                res = worker::run(worker_config) => {
                    if let Err(e) = &res {
                        error!("Reporter terminated: {}", e);
                    }
                    res
                }
            }
        }
        (Some(master_config), None) => {
            info!("Starting aggregator...");
            master::serve(master_config).await
        }
        (None, Some(worker_config)) => {
            info!("Starting reporter...");
            worker::run(worker_config).await
        }
        (None, None) => Err("nothing to do: pass --listen and/or --send".into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_is_validated() {
        let cli = Cli::try_parse_from(["nodestat", "--log-level", "debug"]).unwrap();
        assert_eq!(cli.log_level, Level::DEBUG);
        assert_eq!(Cli::try_parse_from(["nodestat"]).unwrap().log_level, Level::INFO);
        assert!(Cli::try_parse_from(["nodestat", "--log-level", "verbose"]).is_err());
    }

    #[test]
    fn flags_select_roles() {
        let cli = Cli::try_parse_from([
            "nodestat",
            "--listen",
            ":9000",
            "--send",
            "http://a:9000,http://b:9000",
            "--duration",
            "0",
        ])
        .unwrap();

        let master = cli.master_config().expect("aggregator enabled");
        assert_eq!(master.http_addr, "0.0.0.0:9000");

        let worker = cli.worker_config().expect("reporter enabled");
        assert_eq!(worker.master_urls, vec!["http://a:9000", "http://b:9000"]);
        assert_eq!(worker.report_interval, std::time::Duration::from_secs(1));
    }
}
