use crate::region::Region;
use crate::run_state::EnrichedRecord;
use anyhow::Result;
use csv::Writer;
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use tracing::{debug, info};

pub fn export_csv(records: &[EnrichedRecord], output_path: &str) -> Result<()> {
    debug!("Exporting {} records to CSV: {}", records.len(), output_path);

    let file = File::create(output_path)?;
    let mut wtr = Writer::from_writer(file);

    // Write CSV headers
    wtr.write_record([
        "Username",
        "Display Name",
        "Location",
        "Region",
        "Profile URL",
        "Followers",
        "Verified",
        "Scraped At",
    ])?;

    // Write data rows
    for record in records {
        let followers = record.followers_count.to_string();
        let verified = record.verified.to_string();
        wtr.write_record([
            record.handle.as_str(),
            record.display_name.as_str(),
            record.location.as_str(),
            record.region.label(),
            record.profile_url.as_str(),
            followers.as_str(),
            verified.as_str(),
            record.scraped_at.as_str(),
        ])?;
    }

    wtr.flush()?;
    info!("Successfully exported {} records to CSV: {}", records.len(), output_path);

    Ok(())
}

pub fn export_json(records: &[EnrichedRecord], output_path: &str) -> Result<()> {
    debug!("Exporting {} records to JSON: {}", records.len(), output_path);

    let region_counts = count_by_region(records);
    let json_output = JsonExport {
        summary: ExportSummary {
            total_records: records.len(),
            with_location: records.iter().filter(|r| !r.location.is_empty()).count(),
            unique_regions: region_counts.len(),
            region_counts: region_counts
                .into_iter()
                .map(|(region, count)| (region.label().to_string(), count))
                .collect(),
        },
        records: records.to_vec(),
    };

    let json_string = serde_json::to_string_pretty(&json_output)?;

    let mut file = File::create(output_path)?;
    file.write_all(json_string.as_bytes())?;

    info!("Successfully exported {} records to JSON: {}", records.len(), output_path);

    Ok(())
}

#[derive(serde::Serialize)]
struct JsonExport {
    summary: ExportSummary,
    records: Vec<EnrichedRecord>,
}

#[derive(serde::Serialize)]
struct ExportSummary {
    total_records: usize,
    with_location: usize,
    unique_regions: usize,
    region_counts: Vec<(String, usize)>,
}

/// Count records per region, sorted by count descending (label as tiebreak
/// so the output is stable).
fn count_by_region(records: &[EnrichedRecord]) -> Vec<(Region, usize)> {
    let mut counts: HashMap<Region, usize> = HashMap::new();
    for record in records {
        *counts.entry(record.region).or_insert(0) += 1;
    }

    let mut counts: Vec<_> = counts.into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.label().cmp(b.0.label())));
    counts
}

pub fn print_scan_summary(records: &[EnrichedRecord]) {
    if records.is_empty() {
        println!("No records collected.");
        return;
    }

    let with_location = records.iter().filter(|r| !r.location.is_empty()).count();
    let region_counts = count_by_region(records);

    println!("\n=== Scan Summary ===");
    println!("Total profiles: {}", records.len());
    println!("With a listed location: {}", with_location);

    // Region breakdown, largest first
    println!("\nBy region:");
    for (region, count) in &region_counts {
        println!("  {:<14} {}", region.label(), count);
    }

    println!("====================\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_records() -> Vec<EnrichedRecord> {
        vec![
            EnrichedRecord::from_location("alice", "San Francisco, CA"),
            EnrichedRecord::from_location("bob", "London"),
            EnrichedRecord::from_location("carol", "Scotland"),
            EnrichedRecord::from_location("dave", ""),
        ]
    }

    #[test]
    fn test_csv_export_structure() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out.csv");
        export_csv(&sample_records(), path.to_str().unwrap()).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("Username,Display Name,Location,Region"));
        assert_eq!(lines.count(), 4);
        assert!(content.contains("AMERICA"));
        assert!(content.contains("UK"));
    }

    #[test]
    fn test_json_export_summary() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out.json");
        export_json(&sample_records(), path.to_str().unwrap()).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed["summary"]["total_records"], 4);
        assert_eq!(parsed["summary"]["with_location"], 3);
        assert_eq!(parsed["records"].as_array().unwrap().len(), 4);
    }

    #[test]
    fn test_region_counts_sorted() {
        let counts = count_by_region(&sample_records());
        // UK appears twice (London, Scotland), so it sorts first.
        assert_eq!(counts[0].0, Region::Uk);
        assert_eq!(counts[0].1, 2);
        let total: usize = counts.iter().map(|(_, c)| c).sum();
        assert_eq!(total, 4);
        // Only the empty location is Unknown; every named place classifies.
        let unknown = counts.iter().find(|(r, _)| *r == Region::Unknown).map(|(_, c)| *c);
        assert_eq!(unknown, Some(1));
    }
}
