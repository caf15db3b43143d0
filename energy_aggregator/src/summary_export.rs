use crate::error::{AggregationError, Result};
use crate::models::{DeviceSummary, Summary};
use csv::{ReaderBuilder, WriterBuilder};
use log::info;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

pub const SUMMARY_FILE_NAME: &str = "summary.csv";

const DEVICE_HEADER: &str = "Device";
const KWH_HEADER: &str = "Total kWh";
const COST_HEADER_PREFIX: &str = "Estimated Cost";

/// A summary read back from its exported form. Values carry the export
/// rounding (3 dp for kWh, 2 dp for cost).
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedSummary {
    pub currency: String,
    pub devices: Vec<DeviceSummary>,
}

fn cost_header(currency: &str) -> String {
    format!("{} ({})", COST_HEADER_PREFIX, currency)
}

/// Write the per-device breakdown as CSV: device, kWh (3 dp), cost (2 dp).
pub fn write_summary_csv<W: Write>(summary: &Summary, writer: W) -> Result<()> {
    let mut wtr = WriterBuilder::new().from_writer(writer);
    let cost_col = cost_header(&summary.currency);
    wtr.write_record([DEVICE_HEADER, KWH_HEADER, cost_col.as_str()])?;

    for device in &summary.devices {
        let kwh = format!("{:.3}", device.total_kwh);
        let cost = format!("{:.2}", device.estimated_cost);
        wtr.write_record([device.device.as_str(), kwh.as_str(), cost.as_str()])?;
    }

    wtr.flush()?;
    Ok(())
}

/// UTF-8 bytes of the exported summary, ready to offer as a download.
pub fn summary_to_csv_bytes(summary: &Summary) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    write_summary_csv(summary, &mut buf)?;
    Ok(buf)
}

/// Write `summary.csv` into `dir`, returning the file path.
pub fn write_summary_file(summary: &Summary, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(SUMMARY_FILE_NAME);
    let file = File::create(&path)?;
    write_summary_csv(summary, file)?;
    info!("Wrote summary for {} devices to {}", summary.devices.len(), path.display());
    Ok(path)
}

fn parse_number(raw: &str, row: usize, column: &str) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| AggregationError::InvalidReading {
            row,
            column: column.to_string(),
            value: raw.to_string(),
        })
}

/// Parse a summary previously written by `write_summary_csv`.
pub fn read_summary_csv<R: Read>(reader: R) -> Result<ExportedSummary> {
    let mut rdr = ReaderBuilder::new().has_headers(true).from_reader(reader);
    let headers = rdr.headers()?.clone();

    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| AggregationError::MissingColumn(name.to_string()))
    };
    let device_idx = column(DEVICE_HEADER)?;
    let kwh_idx = column(KWH_HEADER)?;
    let (cost_idx, cost_name) = headers
        .iter()
        .enumerate()
        .find(|(_, h)| h.starts_with(COST_HEADER_PREFIX))
        .map(|(idx, h)| (idx, h.to_string()))
        .ok_or_else(|| AggregationError::MissingColumn(COST_HEADER_PREFIX.to_string()))?;

    let currency = cost_name
        .trim_start_matches(COST_HEADER_PREFIX)
        .trim()
        .trim_start_matches('(')
        .trim_end_matches(')')
        .to_string();

    let mut devices = Vec::new();
    for (row_idx, record) in rdr.records().enumerate() {
        let record = record?;
        let row = row_idx + 1;

        devices.push(DeviceSummary {
            device: record.get(device_idx).unwrap_or("").to_string(),
            total_kwh: parse_number(record.get(kwh_idx).unwrap_or(""), row, KWH_HEADER)?,
            estimated_cost: parse_number(record.get(cost_idx).unwrap_or(""), row, &cost_name)?,
        });
    }

    Ok(ExportedSummary { currency, devices })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::EnergyAggregator;
    use crate::data_loader::DataLoader;
    use crate::models::AggregationConfig;

    fn sample_summary() -> Summary {
        let dataset = DataLoader::new().load_sample().unwrap();
        EnergyAggregator::new(AggregationConfig::new(8.0))
            .unwrap()
            .summarize(&dataset, dataset.devices())
            .unwrap()
    }

    #[test]
    fn test_export_format() {
        let bytes = summary_to_csv_bytes(&sample_summary()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines();

        assert_eq!(lines.next(), Some("Device,Total kWh,Estimated Cost (INR)"));
        assert_eq!(lines.next(), Some("Fan (W),0.963,7.70"));
        assert_eq!(lines.next(), Some("Light (W),0.497,3.98"));
        assert_eq!(lines.next(), Some("Fridge (W),1.935,15.48"));
        assert_eq!(lines.next(), Some("TV (W),1.395,11.16"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_export_then_parse_keeps_devices_and_values() {
        let summary = sample_summary();
        let bytes = summary_to_csv_bytes(&summary).unwrap();
        let parsed = read_summary_csv(bytes.as_slice()).unwrap();

        assert_eq!(parsed.currency, "INR");
        assert_eq!(parsed.devices.len(), summary.devices.len());
        for (original, read) in summary.devices.iter().zip(&parsed.devices) {
            assert_eq!(original.device, read.device);
            assert!((original.total_kwh - read.total_kwh).abs() <= 0.0005);
            assert!((original.estimated_cost - read.estimated_cost).abs() <= 0.005);
        }
    }

    #[test]
    fn test_device_names_with_commas_are_quoted() {
        let summary = Summary {
            tariff: 1.0,
            currency: "EUR".into(),
            devices: vec![DeviceSummary {
                device: "Oven, main (W)".into(),
                total_kwh: 1.23456,
                estimated_cost: 1.23456,
            }],
        };
        let bytes = summary_to_csv_bytes(&summary).unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.contains("\"Oven, main (W)\",1.235,1.23"));

        let parsed = read_summary_csv(bytes.as_slice()).unwrap();
        assert_eq!(parsed.currency, "EUR");
        assert_eq!(parsed.devices[0].device, "Oven, main (W)");
    }

    #[test]
    fn test_write_summary_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_summary_file(&sample_summary(), dir.path()).unwrap();

        assert_eq!(path.file_name().unwrap(), SUMMARY_FILE_NAME);
        let parsed = read_summary_csv(File::open(&path).unwrap()).unwrap();
        assert_eq!(parsed.devices.len(), 4);
    }

    #[test]
    fn test_read_rejects_garbage_numbers() {
        let csv = "Device,Total kWh,Estimated Cost (INR)\nFan (W),lots,1.00\n";
        let err = read_summary_csv(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, AggregationError::InvalidReading { row: 1, .. }));

        let csv = "Device,Total kWh\nFan (W),1.0\n";
        assert!(matches!(
            read_summary_csv(csv.as_bytes()),
            Err(AggregationError::MissingColumn(_))
        ));
    }
}
