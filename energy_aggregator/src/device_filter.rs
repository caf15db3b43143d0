use crate::error::{AggregationError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Device types offered by the dashboard's filter.
pub const DEVICE_TYPES: [&str; 4] = ["Fan", "Light", "Fridge", "TV"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum DeviceFilter {
    #[default]
    All,
    /// Keep columns whose header contains this label (case-sensitive).
    Type(String),
}

impl DeviceFilter {
    pub fn parse(label: &str) -> Self {
        let label = label.trim();
        if label.is_empty() || label == "All" {
            DeviceFilter::All
        } else {
            DeviceFilter::Type(label.to_string())
        }
    }

    pub fn label(&self) -> &str {
        match self {
            DeviceFilter::All => "All",
            DeviceFilter::Type(label) => label,
        }
    }

    pub fn matches(&self, column: &str) -> bool {
        match self {
            DeviceFilter::All => true,
            DeviceFilter::Type(label) => column.contains(label.as_str()),
        }
    }

    /// Select the device columns this filter keeps, in their original order.
    pub fn apply(&self, devices: &[String]) -> Result<Vec<String>> {
        let selected: Vec<String> = devices
            .iter()
            .filter(|d| self.matches(d))
            .cloned()
            .collect();

        if selected.is_empty() {
            return Err(AggregationError::EmptyFilterResult(self.label().to_string()));
        }
        Ok(selected)
    }
}

impl fmt::Display for DeviceFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for DeviceFilter {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(DeviceFilter::parse(s))
    }
}

fn unit_suffix() -> &'static Regex {
    static UNIT_SUFFIX: OnceLock<Regex> = OnceLock::new();
    UNIT_SUFFIX.get_or_init(|| {
        Regex::new(r"^(?P<name>.*?)\s*\((?P<unit>[^()]+)\)\s*$").expect("unit suffix pattern")
    })
}

/// Header without its unit suffix: "Fan (W)" -> "Fan".
pub fn display_name(column: &str) -> String {
    match unit_suffix().captures(column) {
        Some(caps) if !caps["name"].is_empty() => caps["name"].to_string(),
        _ => column.trim().to_string(),
    }
}

/// Unit named in a header's suffix: "Fan (W)" -> Some("W").
pub fn unit(column: &str) -> Option<String> {
    unit_suffix()
        .captures(column)
        .map(|caps| caps["unit"].trim().to_string())
}
