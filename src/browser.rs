//! Headless Chrome plumbing for the username collector.
//!
//! Launches the browser, navigates to a profile's follower/following list,
//! and exposes the rendered page as a [`ListView`](crate::collector::ListView)
//! so the collection loop never touches CDP types directly. Also reads the
//! session csrf cookie the enrichment stage needs.

use anyhow::{anyhow, bail, Context, Result};
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::sync::Arc;
use tracing::debug;

use crate::collector::ListView;

/// Which relationship list to walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Followers,
    Following,
}

impl ListKind {
    pub fn path_segment(&self) -> &'static str {
        match self {
            ListKind::Followers => "followers",
            ListKind::Following => "following",
        }
    }
}

impl std::fmt::Display for ListKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path_segment())
    }
}

/// Launch a headless Chrome instance.
/// Automatically disables sandbox when running inside a container
/// (detected via /.dockerenv or FLOCKSCAN_CONTAINER env var), and honors
/// a CHROME_PATH override for non-standard installs.
pub fn create_browser() -> Result<Browser> {
    let is_container = std::env::var("FLOCKSCAN_CONTAINER").is_ok()
        || std::path::Path::new("/.dockerenv").exists();

    // Try to find Chrome binary: check env var, then well-known paths
    let chrome_path: Option<std::path::PathBuf> = std::env::var("CHROME_PATH")
        .ok()
        .map(std::path::PathBuf::from)
        .or_else(|| {
            // WSL: Windows Chrome installation
            let wsl_path = std::path::Path::new(
                "/mnt/c/Program Files/Google/Chrome/Application/chrome.exe",
            );
            if wsl_path.exists() {
                Some(wsl_path.to_path_buf())
            } else {
                None
            }
        });

    let browser = match (is_container, &chrome_path) {
        (true, Some(path)) => {
            let options = LaunchOptions::default_builder()
                .sandbox(false)
                .path(Some(path.clone()))
                .build()
                .map_err(|e| anyhow!("Failed to build Chrome launch options: {}", e))?;
            Browser::new(options)
                .map_err(|e| anyhow!("Failed to launch headless Chrome: {}", e))?
        }
        (true, None) => {
            let options = LaunchOptions::default_builder()
                .sandbox(false)
                .build()
                .map_err(|e| anyhow!("Failed to build Chrome launch options: {}", e))?;
            Browser::new(options)
                .map_err(|e| anyhow!("Failed to launch headless Chrome: {}", e))?
        }
        (false, Some(path)) => {
            let options = LaunchOptions::default_builder()
                .path(Some(path.clone()))
                .build()
                .map_err(|e| anyhow!("Failed to build Chrome launch options: {}", e))?;
            Browser::new(options)
                .map_err(|e| anyhow!("Failed to launch headless Chrome: {}", e))?
        }
        (false, None) => Browser::default()
            .map_err(|e| anyhow!("Failed to launch headless Chrome: {}", e))?,
    };

    Ok(browser)
}

/// Navigate a tab to a profile's follower/following list and verify we
/// actually landed on it. A login redirect or suspended-profile page leaves
/// the tab on a different path, which is a precondition failure: the run
/// must not start against the wrong page kind.
pub fn navigate_to_list(
    tab: &Arc<Tab>,
    base_url: &str,
    profile: &str,
    kind: ListKind,
) -> Result<()> {
    let url = format!(
        "{}/{}/{}",
        base_url.trim_end_matches('/'),
        profile,
        kind.path_segment()
    );
    debug!("navigating to {}", url);

    tab.navigate_to(&url)
        .map_err(|e| anyhow!("Navigation to {} failed: {}", url, e))?;
    tab.wait_until_navigated()
        .map_err(|e| anyhow!("Page load failed for {}: {}", url, e))?;

    let landed = tab.get_url();
    let expected_suffix = format!("/{}/{}", profile, kind.path_segment());
    if !landed.ends_with(&expected_suffix) {
        bail!(
            "Expected the {} list of @{} but the page ended up at {} \
             (not logged in, or the profile is unavailable)",
            kind,
            profile,
            landed
        );
    }

    Ok(())
}

/// Read the session csrf cookie (`ct0`) from the browser's cookie store.
/// Returns None when the user has no active session; enrichment then
/// degrades to placeholder records instead of failing the run.
pub fn read_csrf_cookie(tab: &Arc<Tab>) -> Result<Option<String>> {
    let cookies = tab
        .get_cookies()
        .map_err(|e| anyhow!("Failed to read browser cookies: {}", e))?;

    Ok(cookies
        .into_iter()
        .find(|c| c.name == "ct0")
        .map(|c| c.value))
}

/// [`ListView`] backed by a live Chrome tab.
///
/// Row scanning runs a single JS expression per poll so each snapshot of the
/// rendered rows is internally consistent.
pub struct BrowserListView {
    tab: Arc<Tab>,
    row_selector: String,
}

impl BrowserListView {
    pub fn new(tab: Arc<Tab>, row_selector: &str) -> Self {
        Self {
            tab,
            row_selector: row_selector.to_string(),
        }
    }

    fn evaluate_json(&self, expression: &str) -> Result<serde_json::Value> {
        let result = self
            .tab
            .evaluate(expression, false)
            .map_err(|e| anyhow!("Browser evaluation failed: {}", e))?;
        result
            .value
            .ok_or_else(|| anyhow!("Browser evaluation returned no value"))
    }
}

impl ListView for BrowserListView {
    fn rendered_row_links(&self) -> Result<Vec<Vec<String>>> {
        // Selector is embedded as a JS string literal; serde_json handles
        // the quoting (selectors routinely contain double quotes).
        let selector_literal = serde_json::to_string(&self.row_selector)
            .context("row selector is not encodable")?;
        let expression = format!(
            "JSON.stringify(Array.from(document.querySelectorAll({sel})).map(row => \
             Array.from(row.querySelectorAll('a[href]')).map(a => a.getAttribute('href'))))",
            sel = selector_literal
        );

        let value = self.evaluate_json(&expression)?;
        let encoded = value
            .as_str()
            .ok_or_else(|| anyhow!("Row scan returned a non-string result"))?;
        let links: Vec<Vec<String>> =
            serde_json::from_str(encoded).context("Failed to decode rendered row links")?;
        Ok(links)
    }

    fn scroll_to_bottom(&self) -> Result<()> {
        self.evaluate_json("window.scrollTo(0, document.body.scrollHeight); 0")?;
        Ok(())
    }

    fn scroll_to_top(&self) -> Result<()> {
        self.evaluate_json("window.scrollTo(0, 0); 0")?;
        Ok(())
    }

    fn scroll_extent(&self) -> Result<f64> {
        let value = self.evaluate_json("document.body.scrollHeight")?;
        value
            .as_f64()
            .ok_or_else(|| anyhow!("Scroll extent is not numeric"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_kind_paths() {
        assert_eq!(ListKind::Followers.path_segment(), "followers");
        assert_eq!(ListKind::Following.path_segment(), "following");
        assert_eq!(ListKind::Following.to_string(), "following");
    }
}
