//! Per-host robots.txt cache and request pacing.
//!
//! One gate is shared by every crawl run in the process. Host state lives in a
//! `DashMap` of per-host mutexes, so a slow host never blocks another one.

use crate::links::host_key;
use dashmap::DashMap;
use reqwest::Client;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use texting_robots::Robot;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};
use tracing::{debug, warn};
use url::Url;

/// Upper bound applied to a robots.txt `Crawl-delay`.
pub const MAX_CRAWL_DELAY: Duration = Duration::from_secs(10);

enum RobotsRules {
    /// robots.txt missing, unreachable or unreadable.
    AllowAll,
    Fetched {
        body: String,
        /// Parsed rules per user agent; `None` when parsing failed.
        by_agent: HashMap<String, Option<Robot>>,
    },
}

impl fmt::Debug for RobotsRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RobotsRules::AllowAll => f.write_str("AllowAll"),
            RobotsRules::Fetched { body, by_agent } => f
                .debug_struct("Fetched")
                .field("bytes", &body.len())
                .field("agents", &by_agent.keys().collect::<Vec<_>>())
                .finish(),
        }
    }
}

#[derive(Debug, Default)]
struct HostPolicy {
    robots: Option<RobotsRules>,
    crawl_delay: Option<Duration>,
    last_request: Option<Instant>,
}

pub struct PolitenessGate {
    client: Client,
    user_agent: String,
    honor_crawl_delay: bool,
    hosts: DashMap<String, Arc<Mutex<HostPolicy>>>,
}

impl PolitenessGate {
    pub fn new(client: Client, user_agent: impl Into<String>) -> Self {
        Self {
            client,
            user_agent: user_agent.into(),
            honor_crawl_delay: true,
            hosts: DashMap::new(),
        }
    }

    pub fn with_crawl_delay(mut self, honor: bool) -> Self {
        self.honor_crawl_delay = honor;
        self
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Number of hosts with cached state.
    pub fn tracked_hosts(&self) -> usize {
        self.hosts.len()
    }

    fn host_entry(&self, key: &str) -> Arc<Mutex<HostPolicy>> {
        // Clone the Arc out so the shard lock is released before any await.
        self.hosts
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(HostPolicy::default())))
            .clone()
    }

    /// Check robots.txt for `url`, fetching and caching it on first use of the host.
    ///
    /// Any failure to fetch or parse allows the request.
    pub async fn is_allowed(&self, url: &Url, user_agent: &str) -> bool {
        let Some(key) = host_key(url) else {
            return true;
        };
        let entry = self.host_entry(&key);
        let mut policy = entry.lock().await;

        if policy.robots.is_none() {
            let rules = self.fetch_robots(url).await;
            policy.last_request = Some(Instant::now());
            if let RobotsRules::Fetched { body, .. } = &rules
                && let Ok(robot) = Robot::new(&self.user_agent, body.as_bytes())
            {
                policy.crawl_delay = robot
                    .delay
                    .filter(|d| d.is_finite() && *d > 0.0)
                    .map(|d| Duration::from_secs_f32(d.min(MAX_CRAWL_DELAY.as_secs_f32())));
            }
            policy.robots = Some(rules);
        }

        match policy.robots.as_mut() {
            Some(RobotsRules::Fetched { body, by_agent }) => {
                let robot = by_agent
                    .entry(user_agent.to_string())
                    .or_insert_with(|| match Robot::new(user_agent, body.as_bytes()) {
                        Ok(robot) => Some(robot),
                        Err(e) => {
                            warn!("Unparsable robots.txt for {}: {}", key, e);
                            None
                        }
                    });
                robot.as_ref().is_none_or(|r| r.allowed(url.as_str()))
            }
            _ => true,
        }
    }

    async fn fetch_robots(&self, url: &Url) -> RobotsRules {
        let Ok(robots_url) = url.join("/robots.txt") else {
            return RobotsRules::AllowAll;
        };
        debug!("Fetching {}", robots_url);

        let response = match self.client.get(robots_url.as_str()).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!("robots.txt unreachable at {}: {}", robots_url, e);
                return RobotsRules::AllowAll;
            }
        };
        if !response.status().is_success() {
            debug!("robots.txt at {} returned {}", robots_url, response.status());
            return RobotsRules::AllowAll;
        }
        match response.text().await {
            Ok(body) => RobotsRules::Fetched {
                body,
                by_agent: HashMap::new(),
            },
            Err(e) => {
                debug!("robots.txt body unreadable at {}: {}", robots_url, e);
                RobotsRules::AllowAll
            }
        }
    }

    /// Wait until `min_delay` (or the host's crawl-delay, if longer) has passed
    /// since the previous request to `host`, then record a new request time.
    ///
    /// Callers for the same host queue on that host's lock; other hosts are unaffected.
    pub async fn throttle(&self, host: &str, min_delay: Duration) {
        let entry = self.host_entry(host);
        let mut policy = entry.lock().await;

        let delay = if self.honor_crawl_delay {
            policy.crawl_delay.map_or(min_delay, |d| d.max(min_delay))
        } else {
            min_delay
        };

        if let Some(last) = policy.last_request {
            let elapsed = last.elapsed();
            if elapsed < delay {
                let wait = delay - elapsed;
                debug!("Throttling {} for {:?}", host, wait);
                sleep(wait).await;
            }
        }
        policy.last_request = Some(Instant::now());
    }

    /// Throttle using the host key derived from `url`.
    pub async fn throttle_url(&self, url: &Url, min_delay: Duration) {
        if let Some(key) = host_key(url) {
            self.throttle(&key, min_delay).await;
        }
    }
}

impl fmt::Debug for PolitenessGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolitenessGate")
            .field("user_agent", &self.user_agent)
            .field("honor_crawl_delay", &self.honor_crawl_delay)
            .field("hosts", &self.hosts.len())
            .finish()
    }
}
