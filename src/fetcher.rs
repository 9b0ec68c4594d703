//! Batched location enrichment.
//!
//! Consumes the collected identifier sequence strictly in order, one request
//! in flight at a time, with a fixed delay after every attempt. Every
//! `batch_size` processed identifiers the fetcher suspends, emits a
//! checkpoint event, and blocks until the consumer answers continue or stop.
//! Per-request failures are never retried and never abort the run; they
//! degrade to an empty location for that identifier.

use anyhow::{bail, Result};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::config::{ApiConfig, EnrichmentConfig};
use crate::events::{BatchCheckpoint, BatchDecision, EventSender, RunEvent, StopSignal};
use crate::run_state::{EnrichedRecord, SharedRunState};

/// How often a blocked checkpoint re-checks the stop signal. Cancellation
/// raised while blocked must win even against a racing continue reply.
const CHECKPOINT_POLL: Duration = Duration::from_millis(100);

/// The API rejects clients that don't look like a browser.
pub(crate) const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

/// Client for the profile-about API. Construction fails when no query id is
/// available; enrichment must not start at all in that case.
pub struct EnrichmentClient {
    http: reqwest::Client,
    base_url: String,
    bearer_token: String,
    query_id: String,
}

impl EnrichmentClient {
    pub fn new(api: &ApiConfig, query_id: &str) -> Result<Self> {
        if query_id.is_empty() {
            bail!(
                "No AboutAccountQuery id available. Open any profile's About page once \
                 with the browser session running, or pass --query-id."
            );
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(api.request_timeout_secs))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            http,
            base_url: api.base_url.trim_end_matches('/').to_string(),
            bearer_token: api.bearer_token.clone(),
            query_id: query_id.to_string(),
        })
    }

    /// Fetch one profile's self-reported location. Any failure (network
    /// error, non-2xx status, malformed payload, missing field) yields
    /// `None`; the caller substitutes an empty location and moves on.
    pub async fn fetch_location(&self, handle: &str, csrf: &str) -> Option<String> {
        let url = format!(
            "{}/i/api/graphql/{}/AboutAccountQuery",
            self.base_url, self.query_id
        );
        let variables = serde_json::json!({ "screenName": handle }).to_string();

        let response = self
            .http
            .get(&url)
            .query(&[("variables", variables.as_str())])
            .header("authorization", format!("Bearer {}", self.bearer_token))
            .header("x-csrf-token", csrf)
            .header("x-twitter-auth-type", "OAuth2Session")
            .header("x-twitter-active-user", "yes")
            .header("content-type", "application/json")
            .send()
            .await;

        let response = match response {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                debug!("about query for @{} returned HTTP {}", handle, r.status());
                return None;
            }
            Err(e) => {
                debug!("about query for @{} failed: {}", handle, e);
                return None;
            }
        };

        let json: Value = response.json().await.ok()?;
        location_from_about_response(&json).map(str::to_string)
    }
}

/// The location field lives at a fixed path in the about-account payload.
/// Absence is not an error, it just means the profile reports no location.
pub fn location_from_about_response(json: &Value) -> Option<&str> {
    nested_str(
        json,
        &[
            "data",
            "user_result_by_screen_name",
            "result",
            "about_profile",
            "account_based_in",
        ],
    )
}

fn nested_str<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    let mut current = value;
    for key in path {
        current = current.get(key)?;
    }
    current.as_str().filter(|s| !s.is_empty())
}

/// Enrich every collected identifier in discovery order.
///
/// `csrf` is the session credential read from the hosting browser's cookie
/// store; when absent each identifier still yields a placeholder record
/// (empty location, Unknown region) without issuing a request. Returns the
/// number of identifiers processed.
pub async fn enrich_all(
    client: &EnrichmentClient,
    config: &EnrichmentConfig,
    csrf: Option<&str>,
    state: &SharedRunState,
    stop: &StopSignal,
    events: &EventSender,
) -> Result<usize> {
    let identifiers = state.identifiers();
    let total = identifiers.len();

    if csrf.is_none() {
        warn!("no session credential found; records will carry empty locations");
    }

    let mut processed = 0usize;

    for (i, handle) in identifiers.iter().enumerate() {
        if stop.is_stopped() {
            break;
        }

        // Suspend before the (kN+1)-th identifier, k >= 1.
        if i > 0 && i % config.batch_size == 0 {
            let decision = checkpoint_pause(i, total, stop, events).await;
            if decision == BatchDecision::Stop || stop.is_stopped() {
                debug!("run ended at batch checkpoint after {} identifiers", i);
                break;
            }
        }

        let location = match csrf {
            Some(token) => client.fetch_location(handle, token).await.unwrap_or_default(),
            None => String::new(),
        };

        // A stop raised mid-request lets the request finish but discards
        // its result.
        if stop.is_stopped() {
            break;
        }

        let record = EnrichedRecord::from_location(handle, location);
        let count = state.insert_record(record.clone());
        processed += 1;
        let _ = events.send(RunEvent::RecordEnriched {
            current: i + 1,
            total,
            count,
            latest: record,
        });

        // Fixed pacing after every attempt, success or failure.
        tokio::time::sleep(config.request_delay()).await;
    }

    Ok(processed)
}

/// Emit a checkpoint event and block until a decision arrives or the run is
/// cancelled. The reply handle lives exactly as long as this one pause; a
/// dropped handle or a cancellation both resolve to Stop.
async fn checkpoint_pause(
    completed: usize,
    total: usize,
    stop: &StopSignal,
    events: &EventSender,
) -> BatchDecision {
    let (tx, mut rx) = oneshot::channel();
    let sent = events.send(RunEvent::BatchCheckpoint(BatchCheckpoint {
        completed,
        total,
        remaining: total - completed,
        decision: tx,
    }));
    if sent.is_err() {
        // Consumer is gone; nobody can approve another batch.
        return BatchDecision::Stop;
    }

    loop {
        if stop.is_stopped() {
            return BatchDecision::Stop;
        }
        match tokio::time::timeout(CHECKPOINT_POLL, &mut rx).await {
            Ok(Ok(decision)) => {
                // A racing stop still wins over a continue reply.
                if stop.is_stopped() {
                    return BatchDecision::Stop;
                }
                return decision;
            }
            Ok(Err(_)) => return BatchDecision::Stop,
            Err(_) => continue,
        }
    }
}
