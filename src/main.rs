use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use flockscan::browser::{self, BrowserListView, ListKind};
use flockscan::cli::Args;
use flockscan::collector::{self, CollectorConfig};
use flockscan::config::{self, AppConfig};
use flockscan::events::{event_channel, BatchDecision, EventReceiver, RunEvent, StopSignal};
use flockscan::export;
use flockscan::fetcher::{self, EnrichmentClient};
use flockscan::input;
use flockscan::logger::{ScanLogger, VerbosityLevel};
use flockscan::lookup::LookupClient;
use flockscan::query_id::{self, QueryIdCache, QueryIdCapture};
use flockscan::run_state::SharedRunState;
use flockscan::sink::RecordSink;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle --init flag first (before any other processing)
    if args.init {
        match AppConfig::create_default_config() {
            Ok(path) => {
                println!("✅ Created default configuration file at: {}", path.display());
                println!("   Edit this file to customize settings, then run flockscan again.");
                std::process::exit(0);
            }
            Err(e) => {
                eprintln!("❌ Failed to create configuration file: {}", e);
                std::process::exit(1);
            }
        }
    }

    // Load configuration
    let app_config = match AppConfig::load() {
        Ok(cfg) => cfg,
        Err(config::ConfigError::FileNotFound(path)) => {
            // Config not found - prompt to create if interactive
            match AppConfig::prompt_create_config() {
                Ok(Some(created_path)) => {
                    println!(
                        "✅ Created default configuration file at: {}",
                        created_path.display()
                    );
                    println!("   Edit this file to customize settings, then run flockscan again.");
                    std::process::exit(0);
                }
                Ok(None) => {
                    eprintln!("❌ Configuration file not found at: {}", path.display());
                    eprintln!("   Run with --init to create a default configuration file.");
                    std::process::exit(1);
                }
                Err(e) => {
                    eprintln!("❌ Failed to create configuration file: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Err(e) => {
            eprintln!("❌ Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let verbosity = VerbosityLevel::from_verbose_count(args.verbose);
    let mut logger = match &args.log_file {
        Some(log_file_path) => ScanLogger::with_log_file(verbosity, log_file_path.clone()),
        None => ScanLogger::new(verbosity),
    };
    if args.no_color || std::env::var_os("NO_COLOR").is_some() {
        logger.disable_colors();
    }
    let logger = Arc::new(logger);

    if let Err(e) = args.validate() {
        logger.error(&format!("Invalid arguments: {}", e));
        std::process::exit(1);
    }

    // Cooperative cancellation: Ctrl-C requests a stop, the pipeline winds
    // down at its next suspension point. A second Ctrl-C force-exits.
    let stop = StopSignal::new();
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || {
            if stop.is_stopped() {
                eprintln!("\n⚠️  Force exiting.");
                std::process::exit(130);
            }
            stop.stop();
            eprintln!("\n⚠️  Interrupt received. Finishing the current request and stopping...");
        })
        .unwrap_or_else(|e| {
            eprintln!("⚠️  Warning: Failed to set Ctrl-C handler: {}", e);
        });
    }

    let result = if let Some(username) = &args.lookup {
        run_lookup(username, &args, &app_config, &logger).await
    } else if args.is_enrich_only() {
        run_enrich_only(&args, &app_config, &logger, &stop).await
    } else {
        run_scan(&args, &app_config, &logger, &stop).await
    };

    // Export buffered logs whether the run succeeded or not
    if logger.is_log_export_enabled() {
        if let Err(e) = logger.export_logs() {
            logger.error(&format!("Failed to export logs: {}", e));
        }
    }

    if let Err(e) = result {
        logger.error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}

/// Full pipeline: collect the list in a browser, then enrich every handle.
async fn run_scan(
    args: &Args,
    config: &AppConfig,
    logger: &Arc<ScanLogger>,
    stop: &StopSignal,
) -> Result<()> {
    let profile = args.profile.as_ref().expect("validated").clone();
    let kind = if args.list == "following" {
        ListKind::Following
    } else {
        ListKind::Followers
    };

    let state = SharedRunState::new();
    let (events, receiver) = event_channel();
    let _ = events.send(RunEvent::Started);

    logger.log_collection_start(&profile, kind.path_segment());

    // Phase 1: drive the browser on a blocking thread. The closure also
    // reads the session cookie and passively captures the query id from the
    // page's own GraphQL traffic while the list loads.
    let (csrf, captured_id) = {
        let base_url = config.api.base_url.clone();
        let row_selector = config.collector.row_selector.clone();
        let collector_config = CollectorConfig {
            settle_delay: config.collector.settle_delay(),
            stall_threshold: config.collector.stall_threshold,
        };
        let state = state.clone();
        let stop = stop.clone();
        let events = events.clone();
        let task_events = events.clone();

        let outcome = tokio::task::spawn_blocking(move || -> Result<(Option<String>, Option<String>)> {
            let browser = browser::create_browser()?;
            let tab = browser
                .new_tab()
                .map_err(|e| anyhow::anyhow!("Failed to create tab: {}", e))?;

            let capture = QueryIdCapture::new();
            capture.attach(&tab)?;

            browser::navigate_to_list(&tab, &base_url, &profile, kind)?;
            let csrf = browser::read_csrf_cookie(&tab)?;

            let view = BrowserListView::new(tab.clone(), &row_selector);
            collector::collect_usernames(&view, &collector_config, &state, &stop, &task_events)?;

            capture.detach(&tab);
            Ok((csrf, capture.take()))
        })
        .await
        .map_err(|e| anyhow::anyhow!("Browser task panicked: {}", e));

        match outcome.and_then(|inner| inner) {
            Ok(pair) => pair,
            Err(e) => return Err(report_run_error(&events, e)),
        }
    };

    let collected = state.status().collected;
    logger.log_collection_complete(collected);

    if stop.is_stopped() || collected == 0 {
        let records = state.records_in_order();
        let _ = events.send(RunEvent::Stopped { count: records.len(), records });
        state.finish();
        if collected == 0 {
            logger.info("Nothing to enrich");
        }
        return Ok(());
    }

    // Phase 2: enrichment over the collected handles
    let query_id = query_id::resolve(
        args.query_id.as_deref().or(non_empty(&config.api.query_id)),
        &QueryIdCache::new(QueryIdCache::default_path()),
        captured_id,
    );
    let client = match query_id.and_then(|id| EnrichmentClient::new(&config.api, &id)) {
        Ok(client) => client,
        Err(e) => return Err(report_run_error(&events, e)),
    };

    if csrf.is_none() {
        logger.log_credential_missing();
    }

    enrich_and_export(args, config, logger, stop, &state, client, csrf, events, receiver).await
}

/// Enrich-only mode: handles come from a file, no browser, no collection.
async fn run_enrich_only(
    args: &Args,
    config: &AppConfig,
    logger: &Arc<ScanLogger>,
    stop: &StopSignal,
) -> Result<()> {
    let input_path = PathBuf::from(args.input_file.as_ref().expect("validated"));
    let handles = input::parse_handle_file(&input_path)?;
    if handles.is_empty() {
        anyhow::bail!("No usernames found in {}", input_path.display());
    }
    logger.info(&format!(
        "Loaded {} usernames from {}",
        handles.len(),
        input_path.display()
    ));

    let state = SharedRunState::new();
    for handle in &handles {
        state.push_identifier(handle);
    }

    let (events, receiver) = event_channel();
    let _ = events.send(RunEvent::Started);

    // No browser in this mode, so the query id must come from the CLI,
    // the config, or a previous run's cache.
    let query_id = query_id::resolve(
        args.query_id.as_deref().or(non_empty(&config.api.query_id)),
        &QueryIdCache::new(QueryIdCache::default_path()),
        None,
    );
    let client = match query_id.and_then(|id| EnrichmentClient::new(&config.api, &id)) {
        Ok(client) => client,
        Err(e) => return Err(report_run_error(&events, e)),
    };

    // The session cookie lives in a browser; read it from a short-lived
    // instance, tolerating failure (records then carry empty locations).
    let csrf = read_csrf_via_browser(&config.api.base_url).await;
    if csrf.is_none() {
        logger.log_credential_missing();
    }

    enrich_and_export(args, config, logger, stop, &state, client, csrf, events, receiver).await
}

/// One-off lookup of a single profile; prints the record as JSON.
async fn run_lookup(
    username: &str,
    args: &Args,
    config: &AppConfig,
    logger: &Arc<ScanLogger>,
) -> Result<()> {
    let csrf = read_csrf_via_browser(&config.api.base_url)
        .await
        .context("Not logged in: no session cookie found in the browser")?;

    let query_id = query_id::resolve(
        args.query_id.as_deref().or(non_empty(&config.api.query_id)),
        &QueryIdCache::new(QueryIdCache::default_path()),
        None,
    )?;
    let about = EnrichmentClient::new(&config.api, &query_id)?;
    let client = LookupClient::new(&config.api)?;

    logger.info(&format!("Looking up @{}", username.trim_start_matches('@')));
    let record = client.lookup(username, &csrf, &about).await?;

    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

/// Shared tail of the scan and enrich-only modes: run the fetcher with a
/// live event consumer, then export and summarize.
#[allow(clippy::too_many_arguments)]
async fn enrich_and_export(
    args: &Args,
    config: &AppConfig,
    logger: &Arc<ScanLogger>,
    stop: &StopSignal,
    state: &SharedRunState,
    client: EnrichmentClient,
    csrf: Option<String>,
    events: flockscan::events::EventSender,
    receiver: EventReceiver,
) -> Result<()> {
    let total = state.status().collected;
    logger.log_enrichment_start(total);
    logger.start_progress(total as u64).await;

    let output_dir = args.get_output_dir().map_err(anyhow::Error::msg)?;
    let sink = RecordSink::new(std::path::Path::new(&output_dir))?;

    // Consumer answers checkpoints and streams records to the sink while
    // the fetcher runs
    let consumer = tokio::spawn(consume_events(
        receiver,
        logger.clone(),
        sink,
        args.yes,
        stop.clone(),
    ));

    let processed = fetcher::enrich_all(
        &client,
        &config.enrichment,
        csrf.as_deref(),
        state,
        stop,
        &events,
    )
    .await?;

    let records = state.records_in_order();
    let _ = events.send(RunEvent::Stopped { count: records.len(), records: records.clone() });
    state.finish();
    drop(events);

    let sink = consumer
        .await
        .map_err(|e| anyhow::anyhow!("Event consumer panicked: {}", e))?;
    let sink_path = sink.path().to_path_buf();
    let persisted = sink.drain_all()?;

    logger.finish_progress(&format!("Enrichment complete: {} records", processed)).await;
    logger.record_records_enriched(processed);

    // The sink read-back is the crash-safe source of truth; the in-memory
    // state should agree with it
    if persisted.len() != records.len() {
        logger.warn(&format!(
            "Sink holds {} records but state holds {}",
            persisted.len(),
            records.len()
        ));
    }

    let output_path = args.get_output_path().map_err(anyhow::Error::msg)?;
    logger.log_export_start(&args.output_format);
    match args.output_format.as_str() {
        "json" => export::export_json(&records, &output_path)?,
        _ => export::export_csv(&records, &output_path)?,
    }
    logger.log_export_success(&output_path);

    // The working stream has served its purpose once the export exists
    let _ = std::fs::remove_file(&sink_path);

    export::print_scan_summary(&records);
    logger.print_final_summary();

    Ok(())
}

/// Drain run events: progress updates, sink writes, checkpoint decisions.
/// Returns the sink once the channel closes.
async fn consume_events(
    mut receiver: EventReceiver,
    logger: Arc<ScanLogger>,
    mut sink: RecordSink,
    auto_continue: bool,
    stop: StopSignal,
) -> RecordSink {
    while let Some(event) = receiver.recv().await {
        match event {
            RunEvent::Started => {}
            RunEvent::UsernameCollected { handle, count } => {
                logger.debug(&format!("collected @{} ({} total)", handle, count));
            }
            RunEvent::RecordEnriched { current, total, latest, .. } => {
                if let Err(e) = sink.append_one(&latest) {
                    logger.error(&format!("Failed to persist record: {}", e));
                }
                logger.set_progress_position(current as u64).await;
                logger
                    .update_progress(&format!("@{} ({}/{})", latest.handle, current, total))
                    .await;
            }
            RunEvent::BatchCheckpoint(checkpoint) => {
                logger.log_batch_checkpoint(
                    checkpoint.completed,
                    checkpoint.total,
                    checkpoint.remaining,
                );
                let decision = if auto_continue || !AppConfig::is_interactive() {
                    BatchDecision::Continue
                } else {
                    prompt_batch_decision(checkpoint.remaining).await
                };
                if decision == BatchDecision::Stop {
                    stop.stop();
                }
                let _ = checkpoint.decision.send(decision);
            }
            RunEvent::Stopped { count, .. } => {
                logger.debug(&format!("run stopped with {} records", count));
            }
            RunEvent::Error { message } => {
                logger.error(&message);
            }
        }
    }
    sink
}

/// Interactive continue/stop prompt at a batch checkpoint.
async fn prompt_batch_decision(remaining: usize) -> BatchDecision {
    let answer = tokio::task::spawn_blocking(move || {
        print!("Continue with the next batch? {} remaining [Y/n] ", remaining);
        let _ = std::io::stdout().flush();
        let mut input = String::new();
        if std::io::stdin().read_line(&mut input).is_err() {
            return BatchDecision::Stop;
        }
        let input = input.trim().to_lowercase();
        if input.is_empty() || input == "y" || input == "yes" {
            BatchDecision::Continue
        } else {
            BatchDecision::Stop
        }
    })
    .await;

    answer.unwrap_or(BatchDecision::Stop)
}

/// Read the `ct0` cookie from a short-lived browser instance.
async fn read_csrf_via_browser(base_url: &str) -> Option<String> {
    let base_url = base_url.to_string();
    tokio::task::spawn_blocking(move || -> Option<String> {
        let browser = browser::create_browser().ok()?;
        let tab = browser.new_tab().ok()?;
        tab.navigate_to(&base_url).ok()?;
        tab.wait_until_navigated().ok()?;
        browser::read_csrf_cookie(&tab).ok().flatten()
    })
    .await
    .ok()
    .flatten()
}

/// Put a run-fatal error on the event stream before propagating it, so an
/// attached observer sees the run end with an error rather than go silent.
fn report_run_error(
    events: &flockscan::events::EventSender,
    error: anyhow::Error,
) -> anyhow::Error {
    let _ = events.send(RunEvent::Error {
        message: format!("{:#}", error),
    });
    error
}

/// Treat an empty config value as absent.
fn non_empty(value: &str) -> Option<&str> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flockscan::events::BatchCheckpoint;
    use tempfile::TempDir;

    #[test]
    fn test_run_error_lands_on_event_stream() {
        let (events, mut receiver) = event_channel();

        let err = report_run_error(&events, anyhow::anyhow!("no query id available"));
        assert_eq!(err.to_string(), "no query id available");

        match receiver.try_recv().unwrap() {
            RunEvent::Error { message } => assert!(message.contains("no query id available")),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_consumer_counts_each_checkpoint_once() {
        let tmp = TempDir::new().unwrap();
        let sink = RecordSink::new(tmp.path()).unwrap();
        let logger = Arc::new(ScanLogger::new(VerbosityLevel::Silent));
        let (events, receiver) = event_channel();

        let (decision_tx, decision_rx) = tokio::sync::oneshot::channel();
        events
            .send(RunEvent::BatchCheckpoint(BatchCheckpoint {
                completed: 50,
                total: 120,
                remaining: 70,
                decision: decision_tx,
            }))
            .unwrap();
        drop(events);

        let consumer = tokio::spawn(consume_events(
            receiver,
            logger.clone(),
            sink,
            true,
            StopSignal::new(),
        ));
        assert_eq!(decision_rx.await.unwrap(), BatchDecision::Continue);
        consumer.await.unwrap();

        assert_eq!(logger.get_batch_count(), 1);
    }
}
