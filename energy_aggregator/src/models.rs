use crate::device_filter::DeviceFilter;
use crate::error::{AggregationError, Result};
use chrono::{Datelike, Duration, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AggregationConfig {
    pub tariff: f64, // currency units per kWh
    pub currency: String,
    // Every reading is assumed to stand for this much consumption time.
    pub sampling_interval_hours: f64,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            tariff: 8.0,
            currency: "INR".to_string(),
            sampling_interval_hours: 1.0,
        }
    }
}

impl AggregationConfig {
    pub fn new(tariff: f64) -> Self {
        Self {
            tariff,
            ..Self::default()
        }
    }

    /// Load a config from a JSON file; missing keys keep their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Layer explicitly supplied values over this config.
    pub fn with_overrides(
        mut self,
        tariff: Option<f64>,
        currency: Option<String>,
        sampling_interval_hours: Option<f64>,
    ) -> Self {
        if let Some(tariff) = tariff {
            self.tariff = tariff;
        }
        if let Some(currency) = currency {
            self.currency = currency;
        }
        if let Some(hours) = sampling_interval_hours {
            self.sampling_interval_hours = hours;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.tariff.is_finite() || self.tariff < 0.0 {
            return Err(AggregationError::InvalidConfig(format!(
                "tariff must be a non-negative number, got {}",
                self.tariff
            )));
        }
        if !self.sampling_interval_hours.is_finite() || self.sampling_interval_hours <= 0.0 {
            return Err(AggregationError::InvalidConfig(format!(
                "sampling interval must be positive, got {} h",
                self.sampling_interval_hours
            )));
        }
        Ok(())
    }

    /// Convert a sum of watt readings into kilowatt-hours.
    pub fn watts_to_kwh(&self, watt_sum: f64) -> f64 {
        watt_sum * self.sampling_interval_hours / 1000.0
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Hourly,
    Daily,
    Weekly,
    Monthly,
}

impl Granularity {
    pub const ALL: [Granularity; 4] = [
        Granularity::Hourly,
        Granularity::Daily,
        Granularity::Weekly,
        Granularity::Monthly,
    ];

    /// Start of the calendar bucket containing `timestamp`.
    ///
    /// Weeks start on Monday (ISO 8601); months on the 1st.
    pub fn bucket_start(&self, timestamp: NaiveDateTime) -> NaiveDateTime {
        let date = timestamp.date();
        match self {
            Granularity::Hourly => {
                date.and_time(NaiveTime::MIN) + Duration::hours(timestamp.hour() as i64)
            }
            Granularity::Daily => date.and_time(NaiveTime::MIN),
            Granularity::Weekly => {
                let monday = date - Duration::days(date.weekday().num_days_from_monday() as i64);
                monday.and_time(NaiveTime::MIN)
            }
            Granularity::Monthly => {
                let first = date - Duration::days(date.day0() as i64);
                first.and_time(NaiveTime::MIN)
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Hourly => "Hourly",
            Granularity::Daily => "Daily",
            Granularity::Weekly => "Weekly",
            Granularity::Monthly => "Monthly",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = AggregationError;

    fn from_str(s: &str) -> Result<Self> {
        Granularity::ALL
            .into_iter()
            .find(|g| g.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AggregationError::InvalidConfig(format!("unknown granularity '{}'", s)))
    }
}

/// One row of the meter table. `values` is positional and lines up with
/// `Dataset::devices`; `None` marks an empty cell.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reading {
    pub timestamp: NaiveDateTime,
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Dataset {
    devices: Vec<String>,
    readings: Vec<Reading>,
}

impl Dataset {
    pub fn new(devices: Vec<String>, readings: Vec<Reading>) -> Result<Self> {
        if devices.is_empty() {
            return Err(AggregationError::NoDeviceColumns);
        }
        // Columns are looked up by name, so names must be unique
        if let Some(dup) = first_duplicate(&devices) {
            return Err(AggregationError::DuplicateColumn(dup.to_string()));
        }
        for (idx, reading) in readings.iter().enumerate() {
            if reading.values.len() != devices.len() {
                return Err(AggregationError::ColumnCountMismatch {
                    row: idx + 1,
                    expected: devices.len(),
                    found: reading.values.len(),
                });
            }
        }
        Ok(Self { devices, readings })
    }

    pub fn devices(&self) -> &[String] {
        &self.devices
    }

    pub fn readings(&self) -> &[Reading] {
        &self.readings
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn device_index(&self, device: &str) -> Option<usize> {
        self.devices.iter().position(|d| d == device)
    }

    /// Look up the value of one device in one reading by name.
    pub fn value(&self, row: usize, device: &str) -> Option<f64> {
        let col = self.device_index(device)?;
        self.readings.get(row)?.values[col]
    }

    /// Resolve device names to column positions, rejecting unknown names.
    pub fn resolve(&self, devices: &[String]) -> Result<Vec<usize>> {
        devices
            .iter()
            .map(|d| {
                self.device_index(d)
                    .ok_or_else(|| AggregationError::UnknownDevice(d.clone()))
            })
            .collect()
    }

    pub fn time_span(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let first = self.readings.iter().map(|r| r.timestamp).min()?;
        let last = self.readings.iter().map(|r| r.timestamp).max()?;
        Some((first, last))
    }
}

/// First name that occurs more than once, in list order.
pub fn first_duplicate(names: &[String]) -> Option<&str> {
    let mut seen = HashSet::new();
    names
        .iter()
        .find(|name| !seen.insert(name.as_str()))
        .map(String::as_str)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BucketMean {
    pub start: NaiveDateTime,
    pub readings: usize,
    pub means: Vec<Option<f64>>,
}

/// Mean power per device per calendar bucket, ordered by bucket start.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BucketedSeries {
    pub granularity: Granularity,
    pub devices: Vec<String>,
    pub buckets: Vec<BucketMean>,
}

impl BucketedSeries {
    /// Points for a single device, skipping buckets where it had no values.
    pub fn points(&self, device: &str) -> Vec<(NaiveDateTime, f64)> {
        let Some(col) = self.devices.iter().position(|d| d == device) else {
            return Vec::new();
        };
        self.buckets
            .iter()
            .filter_map(|b| b.means[col].map(|m| (b.start, m)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceSummary {
    pub device: String,
    pub total_kwh: f64,
    pub estimated_cost: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Summary {
    pub tariff: f64,
    pub currency: String,
    pub devices: Vec<DeviceSummary>,
}

impl Summary {
    pub fn total_kwh(&self) -> f64 {
        self.devices.iter().map(|d| d.total_kwh).sum()
    }

    pub fn total_cost(&self) -> f64 {
        self.devices.iter().map(|d| d.estimated_cost).sum()
    }

    pub fn device(&self, name: &str) -> Option<&DeviceSummary> {
        self.devices.iter().find(|d| d.device == name)
    }

    /// Largest consumers first; equal consumption keeps column order.
    pub fn top_consumers(&self, n: usize) -> Vec<DeviceSummary> {
        let mut sorted = self.devices.clone();
        sorted.sort_by(|a, b| b.total_kwh.total_cmp(&a.total_kwh));
        sorted.truncate(n);
        sorted
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DashboardKpis {
    pub total_kwh: f64,
    pub total_cost: f64,
    pub record_count: usize,
}

/// Everything one render pass produces.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DashboardView {
    pub filter: DeviceFilter,
    pub granularity: Granularity,
    pub devices: Vec<String>,
    pub series: BucketedSeries,
    pub summary: Summary,
    pub kpis: DashboardKpis,
    pub top_consumers: Vec<DeviceSummary>,
}

/// Inputs for a single render pass. The dataset is borrowed and never
/// mutated; a new context is built whenever a selection changes.
#[derive(Debug, Clone)]
pub struct RenderContext<'a> {
    pub dataset: &'a Dataset,
    pub filter: DeviceFilter,
    pub granularity: Granularity,
}

impl<'a> RenderContext<'a> {
    pub fn new(dataset: &'a Dataset, filter: DeviceFilter, granularity: Granularity) -> Self {
        Self {
            dataset,
            filter,
            granularity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn test_bucket_start_alignment() {
        // Friday afternoon
        let ts = at(2025, 12, 26, 14, 37);

        assert_eq!(Granularity::Hourly.bucket_start(ts), at(2025, 12, 26, 14, 0));
        assert_eq!(Granularity::Daily.bucket_start(ts), at(2025, 12, 26, 0, 0));
        assert_eq!(Granularity::Weekly.bucket_start(ts), at(2025, 12, 22, 0, 0));
        assert_eq!(Granularity::Monthly.bucket_start(ts), at(2025, 12, 1, 0, 0));
    }

    #[test]
    fn test_weekly_bucket_crosses_month_boundary() {
        // Sunday 2 March 2025 belongs to the week starting Monday 24 February
        let ts = at(2025, 3, 2, 23, 59);
        assert_eq!(Granularity::Weekly.bucket_start(ts), at(2025, 2, 24, 0, 0));
        // A Monday is its own week start
        assert_eq!(Granularity::Weekly.bucket_start(at(2025, 3, 3, 0, 0)), at(2025, 3, 3, 0, 0));
    }

    #[test]
    fn test_granularity_parsing() {
        assert_eq!("monthly".parse::<Granularity>().unwrap(), Granularity::Monthly);
        assert_eq!(" Hourly ".parse::<Granularity>().unwrap(), Granularity::Hourly);
        assert!("fortnightly".parse::<Granularity>().is_err());
    }

    #[test]
    fn test_config_validation() {
        assert!(AggregationConfig::default().validate().is_ok());
        assert!(AggregationConfig::new(0.0).validate().is_ok());
        assert!(AggregationConfig::new(-1.0).validate().is_err());
        assert!(AggregationConfig::new(f64::NAN).validate().is_err());

        let config = AggregationConfig {
            sampling_interval_hours: 0.0,
            ..AggregationConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_watts_to_kwh_uses_sampling_interval() {
        let hourly = AggregationConfig::default();
        assert!((hourly.watts_to_kwh(963.0) - 0.963).abs() < 1e-12);

        let quarter = AggregationConfig {
            sampling_interval_hours: 0.25,
            ..AggregationConfig::default()
        };
        assert!((quarter.watts_to_kwh(1000.0) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_config_from_json_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dashboard.json");
        std::fs::write(&path, r#"{ "tariff": 6.5 }"#).unwrap();

        let config = AggregationConfig::from_json_file(&path).unwrap();
        assert_eq!(config.tariff, 6.5);
        assert_eq!(config.currency, "INR");
        assert_eq!(config.sampling_interval_hours, 1.0);

        std::fs::write(&path, r#"{ "tariff": -2 }"#).unwrap();
        assert!(matches!(
            AggregationConfig::from_json_file(&path),
            Err(AggregationError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_overrides_replace_only_given_values() {
        let config = AggregationConfig::default().with_overrides(Some(5.0), None, Some(0.5));
        assert_eq!(config.tariff, 5.0);
        assert_eq!(config.currency, "INR");
        assert_eq!(config.sampling_interval_hours, 0.5);
    }

    #[test]
    fn test_dataset_rejects_ragged_rows() {
        let readings = vec![Reading {
            timestamp: at(2025, 1, 1, 0, 0),
            values: vec![Some(1.0)],
        }];
        let err = Dataset::new(vec!["A (W)".into(), "B (W)".into()], readings).unwrap_err();
        assert!(matches!(
            err,
            AggregationError::ColumnCountMismatch {
                row: 1,
                expected: 2,
                found: 1
            }
        ));

        assert!(matches!(
            Dataset::new(vec![], vec![]),
            Err(AggregationError::NoDeviceColumns)
        ));
    }

    #[test]
    fn test_dataset_rejects_repeated_device_names() {
        let devices = vec!["Fan (W)".into(), "TV (W)".into(), "Fan (W)".into()];
        let err = Dataset::new(devices, vec![]).unwrap_err();
        assert!(matches!(err, AggregationError::DuplicateColumn(ref d) if d == "Fan (W)"));
    }

    fn consumer(device: &str, kwh: f64) -> DeviceSummary {
        DeviceSummary {
            device: device.into(),
            total_kwh: kwh,
            estimated_cost: kwh,
        }
    }

    #[test]
    fn test_top_consumers_ordering() {
        let summary = Summary {
            tariff: 1.0,
            currency: "INR".into(),
            devices: vec![
                consumer("A", 1.0),
                consumer("B", 3.0),
                consumer("C", 1.0),
                consumer("D", 2.0),
            ],
        };

        let top: Vec<_> = summary.top_consumers(3).into_iter().map(|d| d.device).collect();
        assert_eq!(top, vec!["B", "D", "A"]);
    }
}
