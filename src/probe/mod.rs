//! Live verification of secret candidates
//!
//! Each Firebase URL and each (Google key, endpoint) pair becomes one
//! [`ProbeTask`]. Tasks run on a bounded pool, every request has its own
//! timeout, and results are put back in declaration order before they are
//! returned. A failed request is an `Unreachable` result, never an error.

use crate::secrets::{SecretCandidate, SecretCategory};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Body text Google returns for keys restricted away from the probed API
pub const UNAUTHORIZED_MARKER: &str = "API project is not authorized";

/// Longest response fragment kept as evidence
const FRAGMENT_LEN: usize = 160;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Exposed,
    Protected,
    Unreachable,
    Skipped,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Exposed => "exposed",
            Verdict::Protected => "protected",
            Verdict::Unreachable => "unreachable",
            Verdict::Skipped => "skipped",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the probe saw
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Evidence {
    pub status: Option<u16>,
    pub fragment: Option<String>,
    pub error: Option<String>,
}

impl Evidence {
    fn status(status: u16) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    fn error(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeResult {
    /// Position of the candidate in declaration order
    #[serde(skip)]
    pub candidate_index: usize,
    pub candidate: SecretCandidate,
    pub url: String,
    pub verdict: Verdict,
    pub evidence: Evidence,
}

/// One outbound request to make
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTask {
    /// Position of the candidate in declaration order
    pub candidate_index: usize,
    /// Position of the endpoint template; always 0 for Firebase
    pub endpoint_index: usize,
    pub candidate: SecretCandidate,
    pub url: String,
}

impl ProbeTask {
    fn order_key(&self) -> (usize, usize) {
        (self.candidate_index, self.endpoint_index)
    }

    fn finish(self, verdict: Verdict, evidence: Evidence) -> ProbeResult {
        ProbeResult {
            candidate_index: self.candidate_index,
            candidate: self.candidate,
            url: self.url,
            verdict,
            evidence,
        }
    }
}

/// Probe results in declaration order
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProbeBatch {
    pub results: Vec<ProbeResult>,
    /// The run was interrupted; `results` holds only the probes that finished
    pub cancelled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeSettings {
    pub concurrency: usize,
    pub timeout: Duration,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            concurrency: 4,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Only a 401 means the database rules deny anonymous reads; every other
/// answer counts as open
pub fn classify_firebase(status: u16) -> Verdict {
    match status {
        401 => Verdict::Protected,
        _ => Verdict::Exposed,
    }
}

/// A Google key counts as exposed unless the endpoint refused it
pub fn classify_google(status: u16, body: &str, key: &str) -> Verdict {
    if key.is_empty() {
        Verdict::Skipped
    } else if status == 403 || body.contains(UNAUTHORIZED_MARKER) {
        Verdict::Protected
    } else {
        Verdict::Exposed
    }
}

/// Expand candidates into tasks, in declaration order
///
/// Generic API keys are never probed. Google keys produce one task per
/// endpoint template; empty keys produce none.
pub fn plan(candidates: &[SecretCandidate], endpoints: &[String]) -> Vec<ProbeTask> {
    let mut tasks = Vec::new();

    for (candidate_index, candidate) in candidates.iter().enumerate() {
        match candidate.category {
            SecretCategory::FirebaseDbUrl => tasks.push(ProbeTask {
                candidate_index,
                endpoint_index: 0,
                candidate: candidate.clone(),
                url: format!("{}/.json", candidate.raw_value),
            }),
            SecretCategory::GoogleApiKey if !candidate.raw_value.is_empty() => {
                for (endpoint_index, endpoint) in endpoints.iter().enumerate() {
                    tasks.push(ProbeTask {
                        candidate_index,
                        endpoint_index,
                        candidate: candidate.clone(),
                        url: format!("{}{}", endpoint, candidate.raw_value),
                    });
                }
            }
            _ => {}
        }
    }

    tasks
}

type Observer = Arc<dyn Fn(&ProbeResult) + Send + Sync>;

/// Runs probe tasks over HTTP
pub struct Prober {
    client: reqwest::Client,
    endpoints: Vec<String>,
    settings: ProbeSettings,
    observer: Option<Observer>,
}

impl Prober {
    pub fn new(endpoints: Vec<String>, settings: ProbeSettings) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("slicer/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(settings.timeout)
            .build()?;

        Ok(Self {
            client,
            endpoints,
            settings,
            observer: None,
        })
    }

    /// Called once per finished probe, in completion order
    pub fn with_observer(mut self, observer: impl Fn(&ProbeResult) + Send + Sync + 'static) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    pub fn plan(&self, candidates: &[SecretCandidate]) -> Vec<ProbeTask> {
        plan(candidates, &self.endpoints)
    }

    /// Mark every task as skipped without touching the network
    pub fn skip_all(&self, candidates: &[SecretCandidate]) -> ProbeBatch {
        let results = self
            .plan(candidates)
            .into_iter()
            .map(|task| task.finish(Verdict::Skipped, Evidence::default()))
            .collect();

        ProbeBatch {
            results,
            cancelled: false,
        }
    }

    /// Probe all candidates until done or until `cancel` resolves
    pub async fn probe_all<C>(&self, candidates: &[SecretCandidate], cancel: C) -> ProbeBatch
    where
        C: Future<Output = ()>,
    {
        let tasks = self.plan(candidates);
        if tasks.is_empty() {
            return ProbeBatch::default();
        }

        info!(
            "Probing {} URLs ({} at a time, {}s timeout)",
            tasks.len(),
            self.settings.concurrency,
            self.settings.timeout.as_secs()
        );

        let permits = Arc::new(Semaphore::new(self.settings.concurrency.max(1)));
        let mut set = JoinSet::new();

        for task in tasks {
            let client = self.client.clone();
            let permits = Arc::clone(&permits);
            let timeout = self.settings.timeout;

            set.spawn(async move {
                // The semaphore is never closed
                let _permit = permits.acquire_owned().await.ok();
                let key = task.order_key();
                (key, execute(&client, task, timeout).await)
            });
        }

        let mut finished = Vec::new();
        let mut cancelled = false;
        tokio::pin!(cancel);

        loop {
            tokio::select! {
                biased;
                _ = &mut cancel => {
                    warn!("Probing interrupted, aborting {} in-flight probes", set.len());
                    set.abort_all();
                    cancelled = true;
                    break;
                }
                joined = set.join_next() => match joined {
                    Some(Ok((key, result))) => {
                        if let Some(observer) = &self.observer {
                            observer(&result);
                        }
                        finished.push((key, result));
                    }
                    Some(Err(e)) => warn!("Probe task failed: {}", e),
                    None => break,
                },
            }
        }

        finished.sort_by_key(|(key, _)| *key);

        ProbeBatch {
            results: finished.into_iter().map(|(_, result)| result).collect(),
            cancelled,
        }
    }
}

async fn execute(client: &reqwest::Client, task: ProbeTask, timeout: Duration) -> ProbeResult {
    if task.candidate.raw_value.is_empty() {
        return task.finish(Verdict::Skipped, Evidence::default());
    }

    let category = task.candidate.category;
    let read_body = category == SecretCategory::GoogleApiKey;

    match tokio::time::timeout(timeout, fetch(client, &task.url, read_body)).await {
        Ok(Ok((status, body))) => {
            let verdict = match category {
                SecretCategory::FirebaseDbUrl => classify_firebase(status),
                _ => classify_google(status, &body, &task.candidate.raw_value),
            };
            debug!("{} -> {} ({})", task.url, status, verdict);

            let mut evidence = Evidence::status(status);
            if !body.is_empty() {
                evidence.fragment = Some(fragment(&body));
            }
            task.finish(verdict, evidence)
        }
        Ok(Err(e)) => {
            warn!("Could not reach {}: {}", task.url, e);
            task.finish(Verdict::Unreachable, Evidence::error(e.to_string()))
        }
        Err(_) => {
            warn!("Probe of {} timed out after {}s", task.url, timeout.as_secs());
            task.finish(
                Verdict::Unreachable,
                Evidence::error(format!("timed out after {}s", timeout.as_secs())),
            )
        }
    }
}

async fn fetch(
    client: &reqwest::Client,
    url: &str,
    read_body: bool,
) -> Result<(u16, String), reqwest::Error> {
    let response = client.get(url).send().await?;
    let status = response.status().as_u16();
    // An open Firebase database answers with its entire contents
    let body = if read_body {
        response.text().await?
    } else {
        String::new()
    };
    Ok((status, body))
}

fn fragment(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(FRAGMENT_LEN) {
        Some((end, _)) => format!("{}...", &trimmed[..end]),
        None => trimmed.to_string(),
    }
}
