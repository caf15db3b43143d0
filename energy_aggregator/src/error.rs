use thiserror::Error;

/// Everything that can stop a render pass.
///
/// The first group are validation outcomes of user-supplied data and are
/// reported back to the user as-is. The wrapped I/O and parse errors are
/// genuine faults.
#[derive(Debug, Error)]
pub enum AggregationError {
    #[error("CSV must include a '{0}' column")]
    MissingColumn(String),

    #[error("CSV must include device columns like 'Fan (W)', 'Fridge (W)', etc.")]
    NoDeviceColumns,

    #[error("device column '{0}' appears more than once")]
    DuplicateColumn(String),

    #[error("No data found for {0}")]
    EmptyFilterResult(String),

    #[error("row {row}: cannot parse timestamp '{value}'")]
    UnparsableTimestamp { row: usize, value: String },

    #[error("row {row}, column '{column}': '{value}' is not a number")]
    InvalidReading {
        row: usize,
        column: String,
        value: String,
    },

    #[error("row {row}: expected {expected} device values, found {found}")]
    ColumnCountMismatch {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("unknown device column '{0}'")]
    UnknownDevice(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AggregationError {
    /// True for errors caused by the supplied data or settings rather than
    /// by the environment. These end the render pass but are not faults.
    pub fn is_validation(&self) -> bool {
        !matches!(self, Self::Csv(_) | Self::Io(_) | Self::Json(_))
    }
}

pub type Result<T> = std::result::Result<T, AggregationError>;
