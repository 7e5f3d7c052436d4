pub mod aggregate;
pub mod engine;
pub mod error;
pub mod gate;
pub mod links;
pub mod resolver;
pub mod result;
pub mod scorer;

pub use aggregate::aggregate;
pub use engine::{CrawlEngine, CrawlProgress, CrawlRequest, ProgressCallback, ResultCallback};
pub use error::{Result, ScanError};
pub use gate::PolitenessGate;
pub use resolver::{EntrypointResolver, SearchConfig};
pub use result::{Category, CrawlResult, CrawlState, ExhaustReason, ResultRecord, TargetKind};
pub use scorer::{RelevanceScorer, Scored};

/// User agent sent with every request unless the caller overrides it.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (compatible; Ledgerscout/0.1; +https://github.com/trapdoorsec/ledgerscout)";

/// Builds the shared HTTP client used by the gate, the resolver and the engine.
pub fn build_client(user_agent: &str, timeout_secs: u64) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .connect_timeout(std::time::Duration::from_secs((timeout_secs / 2).max(1)))
        .pool_max_idle_per_host(8)
        .pool_idle_timeout(std::time::Duration::from_secs(90))
        .tcp_keepalive(std::time::Duration::from_secs(60))
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()?;
    Ok(client)
}
