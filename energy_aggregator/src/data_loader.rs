use crate::error::{AggregationError, Result};
use crate::models::{first_duplicate, Dataset, Reading};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use csv::ReaderBuilder;
use log::{debug, info, warn};
use std::fs::File;
use std::io::Read;
use std::path::Path;

pub const TIMESTAMP_COLUMN: &str = "Timestamp";

// Only year-first layouts; day/month order is never guessed.
const DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

// Cell spellings that mean "no reading", same as an empty cell.
const MISSING_MARKERS: [&str; 8] = ["NaN", "nan", "NA", "N/A", "n/a", "#N/A", "null", "NULL"];

const SAMPLE_CSV: &str = "\
Timestamp,Fan (W),Light (W),Fridge (W),TV (W)
2025-12-26 08:00,120,60,200,150
2025-12-26 09:00,100,40,220,160
2025-12-26 10:00,130,70,210,140
2025-12-26 11:00,90,50,230,170
2025-12-26 12:00,110,65,205,155
2025-12-26 13:00,95,55,215,145
2025-12-26 14:00,105,45,225,165
2025-12-26 15:00,115,60,210,150
2025-12-26 16:00,98,52,220,160
";

/// Parse a timestamp cell. Returns `None` for anything not in an accepted
/// year-first layout.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    for format in DATETIME_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(ts);
        }
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.naive_utc());
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN))
}

pub struct DataLoader {
    delimiter: u8,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    pub fn new() -> Self {
        Self { delimiter: b',' }
    }

    pub fn with_delimiter(delimiter: u8) -> Self {
        Self { delimiter }
    }

    /// Load a meter table from a CSV file
    pub fn load_path<P: AsRef<Path>>(&self, path: P) -> Result<Dataset> {
        let path = path.as_ref();
        info!("Loading readings from {}", path.display());
        let file = File::open(path)?;
        self.load_reader(file)
    }

    /// Load the built-in sample table
    pub fn load_sample(&self) -> Result<Dataset> {
        info!("Loading built-in sample readings");
        DataLoader::new().load_reader(SAMPLE_CSV.as_bytes())
    }

    /// Load a meter table from any reader. The header is validated before
    /// any row is parsed.
    pub fn load_reader<R: Read>(&self, reader: R) -> Result<Dataset> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .delimiter(self.delimiter)
            .from_reader(reader);

        let headers = rdr.headers()?.clone();
        let ts_idx = headers
            .iter()
            .position(|h| h.trim() == TIMESTAMP_COLUMN)
            .ok_or_else(|| AggregationError::MissingColumn(TIMESTAMP_COLUMN.to_string()))?;

        // Every other column is a device, in header order
        let device_cols: Vec<(usize, String)> = headers
            .iter()
            .enumerate()
            .filter(|(idx, _)| *idx != ts_idx)
            .map(|(idx, name)| (idx, name.trim().to_string()))
            .collect();

        if device_cols.is_empty() {
            return Err(AggregationError::NoDeviceColumns);
        }
        let device_names: Vec<String> = device_cols.iter().map(|(_, name)| name.clone()).collect();
        if let Some(dup) = first_duplicate(&device_names) {
            return Err(AggregationError::DuplicateColumn(dup.to_string()));
        }

        let mut readings = Vec::new();
        let mut missing_cells = 0usize;

        for (row_idx, record) in rdr.records().enumerate() {
            let record = record?;
            let row = row_idx + 1;

            let raw_ts = record.get(ts_idx).unwrap_or("");
            let timestamp = parse_timestamp(raw_ts).ok_or_else(|| {
                AggregationError::UnparsableTimestamp {
                    row,
                    value: raw_ts.to_string(),
                }
            })?;

            let mut values = Vec::with_capacity(device_cols.len());
            for (col_idx, name) in &device_cols {
                let cell = record.get(*col_idx).unwrap_or("").trim();
                if cell.is_empty() || MISSING_MARKERS.contains(&cell) {
                    missing_cells += 1;
                    values.push(None);
                    continue;
                }
                let invalid = || AggregationError::InvalidReading {
                    row,
                    column: name.clone(),
                    value: cell.to_string(),
                };
                let watts = cell.parse::<f64>().map_err(|_| invalid())?;
                if !watts.is_finite() {
                    return Err(invalid());
                }
                values.push(Some(watts));
            }

            readings.push(Reading { timestamp, values });
        }

        if missing_cells > 0 {
            warn!("{} empty device cells will be skipped", missing_cells);
        }
        debug!(
            "Parsed {} readings across {} devices",
            readings.len(),
            device_cols.len()
        );

        Dataset::new(device_names, readings)
    }
}
