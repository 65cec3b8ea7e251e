//! Inspect command implementation.

use crate::Format;
use seglog_core::{Config, Log, SegmentInfo};
use serde::Serialize;
use std::path::Path;

/// Log inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Log directory.
    pub path: String,
    /// Lowest readable offset.
    pub lowest_offset: u64,
    /// Highest written offset, if any.
    pub highest_offset: Option<u64>,
    /// Number of records across all segments.
    pub record_count: u64,
    /// Total store bytes.
    pub total_store_bytes: u64,
    /// Segments ordered by base offset.
    pub segments: Vec<SegmentRow>,
}

/// One row of the segment table.
#[derive(Debug, Serialize)]
pub struct SegmentRow {
    /// First offset of the segment.
    pub base_offset: u64,
    /// Next offset the segment would assign.
    pub next_offset: u64,
    /// Store size in bytes.
    pub store_bytes: u64,
    /// Used index bytes.
    pub index_bytes: u64,
    /// Whether the segment is full.
    pub maxed: bool,
    /// Whether the segment receives appends.
    pub active: bool,
}

impl From<SegmentInfo> for SegmentRow {
    fn from(info: SegmentInfo) -> Self {
        Self {
            base_offset: info.base_offset,
            next_offset: info.next_offset,
            store_bytes: info.store_size,
            index_bytes: info.index_size,
            maxed: info.maxed,
            active: info.active,
        }
    }
}

/// Runs the inspect command.
pub fn run(path: &Path, config: Config, format: Format) -> Result<(), Box<dyn std::error::Error>> {
    let result = inspect(path, config)?;
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        Format::Text => print_text_output(&result),
    }
    Ok(())
}

fn inspect(path: &Path, config: Config) -> Result<InspectResult, Box<dyn std::error::Error>> {
    if !path.is_dir() {
        return Err(format!("no log directory at {}", path.display()).into());
    }

    let log = Log::open(path, config)?;
    let segments: Vec<SegmentRow> = log.segments()?.into_iter().map(SegmentRow::from).collect();
    let result = InspectResult {
        path: path.display().to_string(),
        lowest_offset: log.lowest_offset()?,
        highest_offset: log.highest_offset()?,
        record_count: segments
            .iter()
            .map(|s| s.next_offset - s.base_offset)
            .sum(),
        total_store_bytes: segments.iter().map(|s| s.store_bytes).sum(),
        segments,
    };
    log.close()?;
    Ok(result)
}

fn print_text_output(result: &InspectResult) {
    println!("SegLog Inspection");
    println!("=================");
    println!();
    println!("Path: {}", result.path);
    println!();
    println!("Offsets:");
    println!("  Lowest:  {}", result.lowest_offset);
    match result.highest_offset {
        Some(highest) => println!("  Highest: {highest}"),
        None => println!("  Highest: (empty)"),
    }
    println!("  Records: {}", result.record_count);
    println!("  Store:   {}", format_size(result.total_store_bytes));
    println!();
    println!(
        "{:>20}  {:>20}  {:>10}  {:>10}  flags",
        "base", "next", "store", "index"
    );
    for segment in &result.segments {
        let mut flags = Vec::new();
        if segment.active {
            flags.push("active");
        }
        if segment.maxed {
            flags.push("maxed");
        }
        println!(
            "{:>20}  {:>20}  {:>10}  {:>10}  {}",
            segment.base_offset,
            segment.next_offset,
            format_size(segment.store_bytes),
            format_size(segment.index_bytes),
            flags.join(",")
        );
    }
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn segment_table() {
        let dir = TempDir::new().unwrap();
        let config = Config::new().max_index_bytes(24);
        {
            let log = Log::open(dir.path(), config.clone()).unwrap();
            for value in [&b"a"[..], b"b", b"c"] {
                log.append(value).unwrap();
            }
            log.close().unwrap();
        }

        let result = inspect(dir.path(), config).unwrap();
        assert_eq!(result.lowest_offset, 0);
        assert_eq!(result.highest_offset, Some(2));
        assert_eq!(result.record_count, 3);
        assert_eq!(result.segments.len(), 2);
        assert!(result.segments[1].active);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["segments"][0]["base_offset"], 0);
    }

    #[test]
    fn missing_directory() {
        let dir = TempDir::new().unwrap();
        assert!(inspect(&dir.path().join("nope"), Config::default()).is_err());
    }

    #[test]
    fn sizes() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
    }
}
