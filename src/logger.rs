use indicatif::{ProgressBar, ProgressStyle};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub enum VerbosityLevel {
    Silent = 0,   // Only show progress bar and final summary
    Summary = 1,  // High-level scan progress (default)
    Detailed = 2, // Detailed steps, results, warnings
    Debug = 3,    // All messages including debug info and errors
}

impl VerbosityLevel {
    pub fn from_verbose_count(count: u8) -> Self {
        match count {
            0 => VerbosityLevel::Summary,
            1 => VerbosityLevel::Detailed,
            2.. => VerbosityLevel::Debug,
        }
    }
}

#[derive(Clone)]
pub struct ScanLogger {
    verbosity: VerbosityLevel,
    progress_bar: Arc<RwLock<Option<ProgressBar>>>,
    scan_metadata: Arc<Mutex<ScanMetadata>>,
    log_buffer: Arc<Mutex<Vec<String>>>,
    log_file_path: Option<String>,
    use_colors: bool,
}

#[derive(Default, Clone)]
struct ScanMetadata {
    start_time: Option<SystemTime>,
    end_time: Option<SystemTime>,
    usernames_collected: usize,
    records_enriched: usize,
    batches_completed: usize,
    output_file: String,
}

impl ScanLogger {
    pub fn new(verbosity: VerbosityLevel) -> Self {
        Self {
            verbosity,
            progress_bar: Arc::new(RwLock::new(None)),
            scan_metadata: Arc::new(Mutex::new(ScanMetadata::default())),
            log_buffer: Arc::new(Mutex::new(Vec::new())),
            log_file_path: None,
            use_colors: true,
        }
    }

    pub fn with_log_file(verbosity: VerbosityLevel, log_file_path: String) -> Self {
        Self {
            verbosity,
            progress_bar: Arc::new(RwLock::new(None)),
            scan_metadata: Arc::new(Mutex::new(ScanMetadata::default())),
            log_buffer: Arc::new(Mutex::new(Vec::new())),
            log_file_path: Some(log_file_path),
            use_colors: true,
        }
    }

    /// Drop color codes from the progress display (--no-color / NO_COLOR).
    pub fn disable_colors(&mut self) {
        self.use_colors = false;
    }

    pub fn colors_enabled(&self) -> bool {
        self.use_colors
    }

    // Core logging functions with consistent timestamp formatting
    pub fn info(&self, message: &str) {
        if self.verbosity >= VerbosityLevel::Summary {
            self.print_message("INFO", message);
        }
    }

    pub fn warn(&self, message: &str) {
        if self.verbosity >= VerbosityLevel::Detailed {
            self.print_message("WARN", message);
        }
    }

    pub fn error(&self, message: &str) {
        // Always show errors regardless of verbosity
        self.print_message("ERROR", message);
    }

    pub fn debug(&self, message: &str) {
        if self.verbosity >= VerbosityLevel::Debug {
            self.print_message("DEBUG", message);
        }
    }

    fn print_message(&self, level: &str, message: &str) {
        let timestamp = self.get_timestamp();
        let msg = format!("[{}] {}: {}", timestamp, level, message);

        // Store in log buffer if log file export is enabled
        if self.log_file_path.is_some() {
            if let Ok(mut buffer) = self.log_buffer.lock() {
                buffer.push(msg.clone());
            }
        }

        // Route through the progress bar when one is active so the fixed
        // bar position is not disturbed
        if let Ok(guard) = self.progress_bar.try_read() {
            if let Some(pb) = guard.as_ref() {
                pb.println(msg);
                return;
            }
        }

        eprintln!("{}", msg);
    }

    fn get_timestamp(&self) -> String {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let secs = now.as_secs();
        let millis = now.subsec_millis();

        let hours = (secs / 3600) % 24;
        let minutes = (secs % 3600) / 60;
        let seconds = secs % 60;

        format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, millis)
    }

    // Progress bar management
    pub async fn start_progress(&self, total_steps: u64) {
        let pb = ProgressBar::new(total_steps);

        let template = if self.use_colors {
            "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}"
        } else {
            "[{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"
        };
        pb.set_style(
            ProgressStyle::default_bar()
                .template(template)
                .unwrap_or_else(|_| {
                    ProgressStyle::default_bar()
                        .template("{bar:40} {pos}/{len} {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                })
                .progress_chars("##-"),
        );

        pb.set_message("Initializing...");

        let mut progress_guard = self.progress_bar.write().await;
        *progress_guard = Some(pb);

        let mut metadata = self.scan_metadata.lock().unwrap();
        metadata.start_time = Some(SystemTime::now());
    }

    pub async fn update_progress(&self, message: &str) {
        if let Some(pb) = self.progress_bar.read().await.as_ref() {
            pb.set_message(message.to_string());
        }
    }

    pub async fn set_progress_position(&self, position: u64) {
        if let Some(pb) = self.progress_bar.read().await.as_ref() {
            pb.set_position(position);
        }
    }

    pub async fn finish_progress(&self, final_message: &str) {
        let mut progress_guard = self.progress_bar.write().await;
        if let Some(pb) = progress_guard.take() {
            pb.finish_and_clear();
        }

        let mut metadata = self.scan_metadata.lock().unwrap();
        metadata.end_time = Some(SystemTime::now());
        drop(metadata);

        if self.verbosity >= VerbosityLevel::Summary {
            self.print_message("INFO", final_message);
        }
    }

    // Metadata recording functions
    pub fn record_usernames_collected(&self, count: usize) {
        let mut metadata = self.scan_metadata.lock().unwrap();
        metadata.usernames_collected = count;
    }

    pub fn record_records_enriched(&self, count: usize) {
        let mut metadata = self.scan_metadata.lock().unwrap();
        metadata.records_enriched = count;
    }

    pub fn record_batch_completed(&self) {
        let mut metadata = self.scan_metadata.lock().unwrap();
        metadata.batches_completed += 1;
    }

    pub fn record_output_file(&self, path: &str) {
        let mut metadata = self.scan_metadata.lock().unwrap();
        metadata.output_file = path.to_string();
    }

    // Final summary message
    pub fn print_final_summary(&self) {
        let metadata = self.scan_metadata.lock().unwrap();

        // Clear any remaining progress bar artifacts
        print!("\x1b[2K\r");
        let _ = io::stdout().flush();

        println!("\n=== SCAN SUMMARY ===");

        if let (Some(start), Some(end)) = (metadata.start_time, metadata.end_time) {
            let duration = end.duration_since(start).unwrap_or_default();
            println!("Scan Duration: {:.2}s", duration.as_secs_f64());
        }

        println!("Usernames Collected: {}", metadata.usernames_collected);
        println!("Records Enriched: {}", metadata.records_enriched);
        println!("Batches Completed: {}", metadata.batches_completed);

        if !metadata.output_file.is_empty() {
            println!("Results Exported: {}", metadata.output_file);
        }

        println!("====================\n");
    }

    // Specialized logging methods for the scan phases
    pub fn log_collection_start(&self, profile: &str, kind: &str) {
        self.info(&format!("Collecting the {} list of @{}", kind, profile));
    }

    pub fn log_collection_complete(&self, count: usize) {
        self.record_usernames_collected(count);
        self.info(&format!("Collection complete: {} usernames", count));
    }

    pub fn log_enrichment_start(&self, total: usize) {
        self.info(&format!("Enriching {} profiles", total));
    }

    pub fn log_batch_checkpoint(&self, completed: usize, total: usize, remaining: usize) {
        self.record_batch_completed();
        self.info(&format!(
            "Batch complete: {}/{} enriched, {} remaining",
            completed, total, remaining
        ));
    }

    pub fn log_credential_missing(&self) {
        self.warn("No active session cookie found; records will have no location data");
    }

    pub fn log_export_start(&self, format: &str) {
        self.info(&format!("Exporting results in {} format", format));
    }

    pub fn log_export_success(&self, path: &str) {
        self.record_output_file(path);
        self.info(&format!("Export completed: {}", path));
    }

    /// Export all collected logs to the specified file
    pub fn export_logs(&self) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(ref log_file_path) = self.log_file_path {
            if let Ok(buffer) = self.log_buffer.lock() {
                if let Some(parent) = Path::new(log_file_path).parent() {
                    std::fs::create_dir_all(parent)?;
                }

                let mut file = OpenOptions::new()
                    .create(true)
                    .write(true)
                    .truncate(true)
                    .open(log_file_path)?;

                for log_entry in buffer.iter() {
                    writeln!(file, "{}", log_entry)?;
                }

                file.flush()?;
                return Ok(());
            }
        }
        Ok(())
    }

    /// Check if log export is enabled
    pub fn is_log_export_enabled(&self) -> bool {
        self.log_file_path.is_some()
    }

    /// Get the current number of logged messages
    pub fn get_log_count(&self) -> usize {
        if let Ok(buffer) = self.log_buffer.lock() {
            buffer.len()
        } else {
            0
        }
    }

    /// Get the number of batch checkpoints recorded so far
    pub fn get_batch_count(&self) -> usize {
        self.scan_metadata.lock().unwrap().batches_completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_from_verbose_count() {
        assert_eq!(VerbosityLevel::from_verbose_count(0), VerbosityLevel::Summary);
        assert_eq!(VerbosityLevel::from_verbose_count(1), VerbosityLevel::Detailed);
        assert_eq!(VerbosityLevel::from_verbose_count(2), VerbosityLevel::Debug);
        assert_eq!(VerbosityLevel::from_verbose_count(9), VerbosityLevel::Debug);
    }

    #[test]
    fn test_log_buffer_only_with_file() {
        let plain = ScanLogger::new(VerbosityLevel::Summary);
        plain.info("not buffered");
        assert_eq!(plain.get_log_count(), 0);
        assert!(!plain.is_log_export_enabled());

        let buffered =
            ScanLogger::with_log_file(VerbosityLevel::Summary, "/tmp/flockscan-test.log".into());
        buffered.info("buffered");
        assert_eq!(buffered.get_log_count(), 1);
        assert!(buffered.is_log_export_enabled());
    }

    #[test]
    fn test_batch_checkpoint_counts_once_per_call() {
        let logger = ScanLogger::new(VerbosityLevel::Silent);
        assert_eq!(logger.get_batch_count(), 0);

        logger.log_batch_checkpoint(50, 120, 70);
        assert_eq!(logger.get_batch_count(), 1);

        logger.log_batch_checkpoint(100, 120, 20);
        assert_eq!(logger.get_batch_count(), 2);
    }

    #[test]
    fn test_disable_colors() {
        let mut logger = ScanLogger::new(VerbosityLevel::Silent);
        assert!(logger.colors_enabled());
        logger.disable_colors();
        assert!(!logger.colors_enabled());
    }
}
