pub mod aggregator;
pub mod data_loader;
pub mod device_filter;
pub mod error;
pub mod models;
pub mod summary_export;

pub use aggregator::EnergyAggregator;
pub use data_loader::{DataLoader, TIMESTAMP_COLUMN};
pub use device_filter::DeviceFilter;
pub use error::{AggregationError, Result};
pub use models::{
    AggregationConfig, BucketedSeries, DashboardView, Dataset, DeviceSummary, Granularity,
    Reading, RenderContext, Summary,
};
pub use summary_export::{read_summary_csv, write_summary_csv, SUMMARY_FILE_NAME};
