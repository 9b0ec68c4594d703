//! Username collection by incremental list scrolling.
//!
//! The collector walks a live, already-navigated list view: scan rendered
//! rows, take the first identifier-shaped link per row, scroll to the
//! bottom, wait for the page to settle, and stop once the scrollable extent
//! has not grown for a fixed number of consecutive checks. The sequence is
//! append-only, order-preserving, and unique per run; a new run starts a
//! fresh sequence.

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::time::Duration;
use tracing::debug;

use crate::events::{EventSender, RunEvent, StopSignal};
use crate::run_state::SharedRunState;

/// Strict identifier-shaped link target: a single path segment of handle
/// characters. Reserved paths ("/i/...", "/search?q=...") and anything with
/// extra segments fail this shape and are ignored.
static HANDLE_PATH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/([A-Za-z0-9_]+)$").expect("handle path pattern is valid"));

/// Abstraction over the scrollable list page. The production implementation
/// drives headless Chrome; tests script a fake.
pub trait ListView {
    /// Link targets of the currently rendered rows, one inner vec per row,
    /// in row order.
    fn rendered_row_links(&self) -> Result<Vec<Vec<String>>>;

    /// Scroll the scrollable region to its bottom.
    fn scroll_to_bottom(&self) -> Result<()>;

    /// Scroll back to the top. Courtesy reset on termination.
    fn scroll_to_top(&self) -> Result<()>;

    /// Total scrollable extent (page height in the browser case). Collection
    /// ends after this value stops changing.
    fn scroll_extent(&self) -> Result<f64>;
}

/// Tuning knobs for the collection loop.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Delay after each scroll before re-reading the extent.
    pub settle_delay: Duration,
    /// Consecutive unchanged-extent checks that end collection.
    pub stall_threshold: u32,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(800),
            stall_threshold: 3,
        }
    }
}

/// Extract a row's identifier: the first link whose target is strictly
/// handle-shaped. Remaining links in the row are not considered.
fn row_handle(links: &[String]) -> Option<String> {
    links
        .iter()
        .find_map(|href| HANDLE_PATH_RE.captures(href))
        .map(|caps| caps[1].to_string())
}

/// Run the collection loop to completion or cancellation.
///
/// Appends each distinct handle to `state` in order of first appearance and
/// emits a `UsernameCollected` event per append. Blocking; callers on the
/// async side wrap this in `spawn_blocking`.
pub fn collect_usernames(
    view: &dyn ListView,
    config: &CollectorConfig,
    state: &SharedRunState,
    stop: &StopSignal,
    events: &EventSender,
) -> Result<usize> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut last_extent = 0.0_f64;
    let mut stalls = 0u32;

    while !stop.is_stopped() && stalls < config.stall_threshold {
        for links in view.rendered_row_links()? {
            let Some(handle) = row_handle(&links) else {
                continue;
            };
            if seen.insert(handle.clone()) {
                let count = state.push_identifier(&handle);
                debug!("collected @{} ({} total)", handle, count);
                let _ = events.send(RunEvent::UsernameCollected { handle, count });
            }
        }

        view.scroll_to_bottom()?;
        std::thread::sleep(config.settle_delay);

        let extent = view.scroll_extent()?;
        if extent == last_extent {
            stalls += 1;
        } else {
            stalls = 0;
            last_extent = extent;
        }
    }

    // Leave the page where the user expects it.
    view.scroll_to_top()?;

    Ok(seen.len())
}
