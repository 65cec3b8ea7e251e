//! Dump command implementation.

use crate::Format;
use seglog_core::{Config, Log};
use serde::Serialize;
use std::path::Path;

/// A record prepared for output.
#[derive(Debug, Serialize)]
pub struct RecordInfo {
    /// Record offset.
    pub offset: u64,
    /// Payload size in bytes.
    pub size: usize,
    /// Payload as UTF-8 text, when it is valid UTF-8.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Payload as lowercase hex, when it is not valid UTF-8.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hex: Option<String>,
}

impl RecordInfo {
    fn new(offset: u64, value: Vec<u8>) -> Self {
        let size = value.len();
        match String::from_utf8(value) {
            Ok(text) => Self {
                offset,
                size,
                text: Some(text),
                hex: None,
            },
            Err(e) => Self {
                offset,
                size,
                text: None,
                hex: Some(e.as_bytes().iter().map(|b| format!("{b:02x}")).collect()),
            },
        }
    }
}

/// Runs the dump command.
pub fn run(
    path: &Path,
    config: Config,
    start: Option<u64>,
    limit: Option<usize>,
    format: Format,
) -> Result<(), Box<dyn std::error::Error>> {
    let records = read_records(path, config, start, limit)?;
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&records)?),
        Format::Text => print_text_output(&records),
    }
    Ok(())
}

fn read_records(
    path: &Path,
    config: Config,
    start: Option<u64>,
    limit: Option<usize>,
) -> Result<Vec<RecordInfo>, Box<dyn std::error::Error>> {
    if !path.is_dir() {
        return Err(format!("no log directory at {}", path.display()).into());
    }

    let log = Log::open(path, config)?;
    let lowest = log.lowest_offset()?;
    let mut records = Vec::new();

    if let Some(highest) = log.highest_offset()? {
        let first = start.unwrap_or(lowest).max(lowest);
        let max_records = limit.unwrap_or(usize::MAX);
        for offset in first..=highest {
            if records.len() >= max_records {
                break;
            }
            records.push(RecordInfo::new(offset, log.read(offset)?));
        }
    }

    log.close()?;
    Ok(records)
}

fn print_text_output(records: &[RecordInfo]) {
    if records.is_empty() {
        println!("(no records)");
        return;
    }
    for record in records {
        let shown = match (&record.text, &record.hex) {
            (Some(text), _) => format!("{text:?}"),
            (None, Some(hex)) => format!("0x{hex}"),
            (None, None) => String::new(),
        };
        println!("{:>20}  {:>8} B  {}", record.offset, record.size, shown);
    }
}
