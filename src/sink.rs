// sink.rs - Disk-backed record storage using zstd-compressed JSONL
//
// Enriched records are appended as JSONL (one JSON object per line),
// compressed with zstd level 3, and flushed every 50 records so an
// interrupted run keeps everything enriched up to the last checkpoint.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::run_state::EnrichedRecord;

const FLUSH_INTERVAL: usize = 50;
const ZSTD_LEVEL: i32 = 3;

pub struct RecordSink {
    writer: zstd::stream::write::Encoder<'static, BufWriter<File>>,
    path: PathBuf,
    count: usize,
    unflushed: usize,
}

impl RecordSink {
    /// Create a new RecordSink writing to a zstd-compressed JSONL file.
    /// The file is created in the given directory with a PID-stamped name.
    pub fn new(output_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(output_dir)
            .with_context(|| format!("Failed to create output directory: {}", output_dir.display()))?;

        let pid = std::process::id();
        let filename = format!("flockscan-records-{}.jsonl.zst", pid);
        Self::with_path(&output_dir.join(filename))
    }

    /// Create a RecordSink at a specific path (for testing or explicit path control).
    pub fn with_path(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create parent directory: {}", parent.display()))?;
        }

        let file = File::create(path)
            .with_context(|| format!("Failed to create record sink file: {}", path.display()))?;
        let buf_writer = BufWriter::new(file);
        let encoder = zstd::stream::write::Encoder::new(buf_writer, ZSTD_LEVEL)
            .context("Failed to create zstd encoder")?;

        Ok(Self {
            writer: encoder,
            path: path.to_path_buf(),
            count: 0,
            unflushed: 0,
        })
    }

    /// Append a single record to the sink.
    pub fn append_one(&mut self, record: &EnrichedRecord) -> Result<()> {
        let json = serde_json::to_string(record).context("Failed to serialize record")?;
        self.writer.write_all(json.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.count += 1;
        self.unflushed += 1;

        if self.unflushed >= FLUSH_INTERVAL {
            self.flush()?;
        }

        Ok(())
    }

    /// Flush the zstd encoder to ensure data is written to disk.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush().context("Failed to flush zstd encoder")?;
        self.unflushed = 0;
        Ok(())
    }

    /// Finalize the zstd stream and return all records by reading back the
    /// file. This consumes the RecordSink.
    pub fn drain_all(mut self) -> Result<Vec<EnrichedRecord>> {
        self.flush()?;

        // Finalize the zstd stream (writes the end-of-frame marker)
        self.writer.finish().context("Failed to finalize zstd stream")?;

        Self::read_records(&self.path)
    }

    /// Read records from a zstd-compressed JSONL file.
    /// Uses a tolerant parser that skips corrupt lines (crash recovery).
    pub fn read_records(path: &Path) -> Result<Vec<EnrichedRecord>> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open record file: {}", path.display()))?;
        let decoder = zstd::stream::read::Decoder::new(file)
            .context("Failed to create zstd decoder")?;
        let reader = BufReader::new(decoder);

        let mut records = Vec::new();
        let mut errors = 0;

        for (line_num, line_result) in reader.lines().enumerate() {
            match line_result {
                Ok(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<EnrichedRecord>(&line) {
                        Ok(record) => records.push(record),
                        Err(e) => {
                            errors += 1;
                            if errors <= 3 {
                                eprintln!(
                                    "Warning: Skipping corrupt line {} in {}: {}",
                                    line_num + 1,
                                    path.display(),
                                    e
                                );
                            }
                        }
                    }
                }
                Err(_) => {
                    // Truncated zstd frame; we've read everything recoverable
                    break;
                }
            }
        }

        if errors > 3 {
            eprintln!("Warning: {} total corrupt lines skipped in {}", errors, path.display());
        }

        Ok(records)
    }

    /// Get the number of records written so far.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Get the path to the record file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_record(handle: &str, location: &str) -> EnrichedRecord {
        EnrichedRecord::from_location(handle, location)
    }

    #[test]
    fn test_roundtrip_single() {
        let tmp = TempDir::new().unwrap();
        let mut sink = RecordSink::new(tmp.path()).unwrap();

        sink.append_one(&make_record("alice", "London")).unwrap();

        let records = sink.drain_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].handle, "alice");
    }

    #[test]
    fn test_roundtrip_many() {
        let tmp = TempDir::new().unwrap();
        let mut sink = RecordSink::new(tmp.path()).unwrap();

        for i in 0..120 {
            sink.append_one(&make_record(&format!("user{}", i), "Tokyo")).unwrap();
        }
        assert_eq!(sink.count(), 120);

        let records = sink.drain_all().unwrap();
        assert_eq!(records.len(), 120);
        assert_eq!(records[119].handle, "user119");
    }

    #[test]
    fn test_flush_interval() {
        let tmp = TempDir::new().unwrap();
        let mut sink = RecordSink::new(tmp.path()).unwrap();

        for i in 0..FLUSH_INTERVAL {
            sink.append_one(&make_record(&format!("u{}", i), "")).unwrap();
        }
        // After FLUSH_INTERVAL, unflushed should be 0 (auto-flushed)
        assert_eq!(sink.unflushed, 0);
        assert_eq!(sink.count(), FLUSH_INTERVAL);
    }

    #[test]
    fn test_empty_sink() {
        let tmp = TempDir::new().unwrap();
        let sink = RecordSink::new(tmp.path()).unwrap();
        assert_eq!(sink.count(), 0);

        let records = sink.drain_all().unwrap();
        assert_eq!(records.len(), 0);
    }

    #[test]
    fn test_with_path() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("custom-records.jsonl.zst");
        let mut sink = RecordSink::with_path(&path).unwrap();

        sink.append_one(&make_record("bob", "Paris")).unwrap();
        let records = sink.drain_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].location, "Paris");
    }
}
