//! GraphQL query id acquisition.
//!
//! The about-profile endpoint embeds an operation id in its URL path that
//! rotates with frontend deploys. There is no stable way to derive it, so it
//! is acquired in priority order: an explicit CLI/config value, passive
//! capture - watching the browser's own GraphQL traffic while the list page
//! loads and lifting the id out of a matching request URL - or a cached
//! value from an earlier run. The rest of the pipeline consumes the id as
//! an opaque string.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use headless_chrome::Tab;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Operation whose id unlocks the about-profile endpoint.
const TARGET_OPERATION: &str = "AboutAccountQuery";

/// Matches `/i/api/graphql/{id}/{operation}` request URLs.
static GRAPHQL_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/i/api/graphql/([A-Za-z0-9_-]+)/([A-Za-z0-9_]+)")
        .expect("graphql url pattern is valid")
});

/// Cached query id with the capture timestamp, persisted as a small JSON
/// file so later runs skip capture entirely.
#[derive(Debug, Serialize, Deserialize)]
struct CachedQueryId {
    query_id: String,
    captured_at: DateTime<Utc>,
}

/// File-backed query id cache.
pub struct QueryIdCache {
    path: PathBuf,
}

impl QueryIdCache {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Default cache location under the platform cache directory.
    pub fn default_path() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("flockscan")
            .join("query_id.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the cached id, if any. A missing or unreadable cache file is
    /// not an error; it just means capture will run.
    pub fn load(&self) -> Option<String> {
        let content = fs::read_to_string(&self.path).ok()?;
        let cached: CachedQueryId = serde_json::from_str(&content).ok()?;
        if cached.query_id.is_empty() {
            return None;
        }
        debug!(
            "using cached query id from {} (captured {})",
            self.path.display(),
            cached.captured_at
        );
        Some(cached.query_id)
    }

    pub fn store(&self, query_id: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let cached = CachedQueryId {
            query_id: query_id.to_string(),
            captured_at: Utc::now(),
        };
        let content = serde_json::to_string_pretty(&cached)?;
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        Ok(())
    }
}

/// Extract the operation id from a GraphQL request URL, if the URL is for
/// the target operation.
pub fn query_id_from_url(url: &str) -> Option<String> {
    let caps = GRAPHQL_URL_RE.captures(url)?;
    if &caps[2] == TARGET_OPERATION {
        Some(caps[1].to_string())
    } else {
        None
    }
}

/// Passive capture of the query id from browser traffic.
///
/// Attach before navigation; the handler watches every response URL and
/// keeps the first match. `take()` after the page has loaded.
pub struct QueryIdCapture {
    captured: Arc<Mutex<Option<String>>>,
}

impl QueryIdCapture {
    pub fn new() -> Self {
        Self {
            captured: Arc::new(Mutex::new(None)),
        }
    }

    pub fn attach(&self, tab: &Arc<Tab>) -> Result<()> {
        let captured = self.captured.clone();
        tab.register_response_handling(
            "query_id_capture",
            Box::new(move |event_params, _fetch_body| {
                let url = &event_params.response.url;
                if let Some(id) = query_id_from_url(url) {
                    if let Ok(mut slot) = captured.lock() {
                        if slot.is_none() {
                            debug!("captured query id {} from {}", id, url);
                            *slot = Some(id);
                        }
                    }
                }
            }),
        )
        .map_err(|e| anyhow!("Failed to register query id capture: {}", e))?;
        Ok(())
    }

    pub fn detach(&self, tab: &Arc<Tab>) {
        let _ = tab.deregister_response_handling("query_id_capture");
    }

    pub fn take(&self) -> Option<String> {
        self.captured.lock().ok().and_then(|mut slot| slot.take())
    }
}

impl Default for QueryIdCapture {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve the query id from the available sources, caching a freshly
/// captured value for later runs.
pub fn resolve(
    explicit: Option<&str>,
    cache: &QueryIdCache,
    captured: Option<String>,
) -> Result<String> {
    if let Some(id) = explicit.filter(|s| !s.is_empty()) {
        return Ok(id.to_string());
    }

    if let Some(id) = captured {
        info!("captured query id {}", id);
        if let Err(e) = cache.store(&id) {
            debug!("could not cache query id: {}", e);
        }
        return Ok(id);
    }

    if let Some(id) = cache.load() {
        return Ok(id);
    }

    Err(anyhow!(
        "No query id available: pass --query-id, set api.query_id in the config, \
         or run against a list page so it can be captured from browser traffic"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_query_id_from_matching_url() {
        let url = "https://x.com/i/api/graphql/abc123_XY-z/AboutAccountQuery?variables=%7B%7D";
        assert_eq!(query_id_from_url(url).as_deref(), Some("abc123_XY-z"));
    }

    #[test]
    fn test_other_operations_ignored() {
        let url = "https://x.com/i/api/graphql/qqq111/UserByScreenName?variables=%7B%7D";
        assert_eq!(query_id_from_url(url), None);
        assert_eq!(query_id_from_url("https://x.com/home"), None);
    }

    #[test]
    fn test_cache_round_trip() {
        let dir = TempDir::new().unwrap();
        let cache = QueryIdCache::new(dir.path().join("nested").join("query_id.json"));

        assert_eq!(cache.load(), None);
        cache.store("deadbeef42").unwrap();
        assert_eq!(cache.load().as_deref(), Some("deadbeef42"));
    }

    #[test]
    fn test_resolve_priority() {
        let dir = TempDir::new().unwrap();
        let cache = QueryIdCache::new(dir.path().join("query_id.json"));
        cache.store("cached-id").unwrap();

        // Explicit beats everything.
        let id = resolve(Some("explicit-id"), &cache, Some("captured-id".into())).unwrap();
        assert_eq!(id, "explicit-id");

        // Fresh capture beats the cache and refreshes it.
        let id = resolve(None, &cache, Some("captured-id".into())).unwrap();
        assert_eq!(id, "captured-id");
        assert_eq!(cache.load().as_deref(), Some("captured-id"));

        // Cache is the fallback.
        let id = resolve(None, &cache, None).unwrap();
        assert_eq!(id, "captured-id");
    }

    #[test]
    fn test_resolve_without_any_source_fails() {
        let dir = TempDir::new().unwrap();
        let cache = QueryIdCache::new(dir.path().join("query_id.json"));
        assert!(resolve(None, &cache, None).is_err());
    }

    #[test]
    fn test_empty_explicit_is_skipped() {
        let dir = TempDir::new().unwrap();
        let cache = QueryIdCache::new(dir.path().join("query_id.json"));
        cache.store("cached-id").unwrap();
        let id = resolve(Some(""), &cache, None).unwrap();
        assert_eq!(id, "cached-id");
    }
}
