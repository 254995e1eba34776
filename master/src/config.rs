use std::env;

#[derive(Clone, Debug)]
pub struct MasterConfig {
    /// Address the HTTP server binds, e.g. `0.0.0.0:8080`.
    pub http_addr: String,
    /// Free-form identity line served by `/ver`.
    pub identity: String,
}

impl MasterConfig {
    /// Aggregator on `listen`, identity from `NODESTAT_IDENTITY`.
    pub fn new(listen: &str) -> Self {
        dotenv::dotenv().ok();

        let identity = env::var("NODESTAT_IDENTITY")
            .unwrap_or_else(|_| format!("nodestat aggregator {}", env!("CARGO_PKG_VERSION")));

        Self {
            http_addr: normalize_listen_addr(listen),
            identity,
        }
    }

    /// `None` unless `NODESTAT_LISTEN` is set; the aggregator is opt-in.
    pub fn from_env() -> Option<Self> {
        dotenv::dotenv().ok();
        env::var("NODESTAT_LISTEN").ok().map(|listen| Self::new(&listen))
    }
}

/// Accept the `:PORT` shorthand for "all interfaces".
pub fn normalize_listen_addr(addr: &str) -> String {
    let addr = addr.trim();
    if addr.starts_with(':') {
        format!("0.0.0.0{}", addr)
    } else {
        addr.to_string()
    }
}
