use crate::config::AppConfig;
use crate::types::BeneficiaryRecord;
use anyhow::{anyhow, Context, Result};
use csv::{ReaderBuilder, StringRecord};
use serde_json::Value;
use std::fs::File;
use std::io::{BufReader, Read};
use tracing::{info, warn};

pub fn load_records(config: &AppConfig) -> Result<Vec<BeneficiaryRecord>> {
    let path = &config.input.records;
    info!("Loading beneficiary records from {:?}", path);

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s: &str| s.to_lowercase())
        .ok_or_else(|| anyhow!("Records file has no extension: {:?}", path))?;

    let file = File::open(path)
        .with_context(|| format!("Failed to open records file: {:?}", path))?;
    let reader = BufReader::new(file);

    let records = match extension.as_str() {
        "csv" => load_csv_records(reader)?,
        "json" => load_json_records(reader)?,
        _ => return Err(anyhow!("Unsupported records format: {}", extension)),
    };

    info!("Loaded {} records", records.len());
    Ok(records)
}

/// Rows are decoded lossily, so a stray Latin-1 byte in any column never
/// costs the whole record.
pub fn load_csv_records<R: Read>(reader: R) -> Result<Vec<BeneficiaryRecord>> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = StringRecord::from_byte_record_lossy(rdr.byte_headers()?.clone());

    for column in ["comuna", "barrio"] {
        if !headers.iter().any(|h| h == column) {
            warn!("CSV has no '{}' column; every row will lack it", column);
        }
    }

    let mut records = Vec::new();
    let mut skipped = 0usize;
    let mut lossy = 0usize;
    for (line, result) in rdr.byte_records().enumerate() {
        let raw = result?;
        if std::str::from_utf8(raw.as_slice()).is_err() {
            lossy += 1;
        }
        let row = StringRecord::from_byte_record_lossy(raw);
        match row.deserialize::<BeneficiaryRecord>(Some(&headers)) {
            Ok(record) => records.push(record),
            Err(e) => {
                skipped += 1;
                warn!("Skipping CSV row {}: {}", line + 2, e);
            }
        }
    }
    if lossy > 0 {
        warn!("{} CSV rows were not valid UTF-8 and were decoded lossily", lossy);
    }
    if skipped > 0 {
        warn!("Skipped {} unreadable CSV rows", skipped);
    }

    Ok(records)
}

/// Reads either a bare JSON array or a paginated listing page
/// (`{"count": .., "results": [..]}`).
pub fn load_json_records<R: Read>(reader: R) -> Result<Vec<BeneficiaryRecord>> {
    let json: Value = serde_json::from_reader(reader).context("Failed to parse records JSON")?;

    let rows = match json {
        Value::Array(rows) => rows,
        Value::Object(mut page) => match page.remove("results") {
            Some(Value::Array(rows)) => rows,
            _ => return Err(anyhow!("JSON object has no 'results' array")),
        },
        _ => return Err(anyhow!("Records JSON must be an array or a listing page")),
    };

    Ok(rows.iter().map(record_from_json).collect())
}

fn record_from_json(row: &Value) -> BeneficiaryRecord {
    BeneficiaryRecord {
        comuna: text_field(row, "comuna"),
        barrio: text_field(row, "barrio"),
        lat: number_field(row, "barrio_lat"),
        lng: number_field(row, "barrio_lng"),
    }
}

// Anything that is not a string counts as missing.
fn text_field(row: &Value, name: &str) -> Option<String> {
    match row.get(name)? {
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

fn number_field(row: &Value, name: &str) -> Option<f64> {
    let value = match row.get(name)? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    value.is_finite().then_some(value)
}
