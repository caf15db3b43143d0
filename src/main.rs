use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use energy_aggregator::summary_export::write_summary_file;
use energy_aggregator::{
    AggregationConfig, AggregationError, DataLoader, Dataset, DeviceFilter, EnergyAggregator,
    Granularity, RenderContext,
};
use log::info;
use std::path::PathBuf;
use std::process::ExitCode;

mod charts;
mod report;

use charts::DashboardCharts;
use report::DashboardReport;

#[derive(Parser)]
#[command(name = "energy_dashboard")]
#[command(about = "Smart energy monitoring dashboard: per-device kWh, cost and trend charts")]
struct Args {
    /// Meter CSV with a Timestamp column and one column per device (watts)
    #[arg(short, long, conflicts_with = "sample")]
    input: Option<PathBuf>,

    /// Use the built-in sample readings
    #[arg(long)]
    sample: bool,

    /// Device type: All, Fan, Light, Fridge, TV, or any header substring
    #[arg(short, long, default_value = "All")]
    device: String,

    /// Time view for the trend chart
    #[arg(short, long, value_enum, default_value = "hourly")]
    granularity: TimeView,

    /// Tariff per kWh
    #[arg(short, long)]
    tariff: Option<f64>,

    /// Currency label
    #[arg(long)]
    currency: Option<String>,

    /// Hours of consumption each reading stands for
    #[arg(long)]
    interval_hours: Option<f64>,

    /// JSON config with tariff / currency / sampling_interval_hours
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Where summary.csv and the charts are written
    #[arg(short, long, default_value = "dashboard")]
    output_dir: PathBuf,

    /// Skip chart rendering
    #[arg(long)]
    no_charts: bool,
}

#[derive(Clone, ValueEnum)]
enum TimeView {
    Hourly,
    Daily,
    Weekly,
    Monthly,
}

impl From<TimeView> for Granularity {
    fn from(view: TimeView) -> Self {
        match view {
            TimeView::Hourly => Granularity::Hourly,
            TimeView::Daily => Granularity::Daily,
            TimeView::Weekly => Granularity::Weekly,
            TimeView::Monthly => Granularity::Monthly,
        }
    }
}

fn load_dataset(args: &Args) -> Result<Option<Dataset>> {
    let loader = DataLoader::new();
    match (&args.input, args.sample) {
        (Some(path), _) => {
            let dataset = loader
                .load_path(path)
                .with_context(|| format!("Failed to load readings from {}", path.display()))?;
            Ok(Some(dataset))
        }
        (None, true) => Ok(Some(loader.load_sample()?)),
        (None, false) => Ok(None),
    }
}

fn run(args: Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => AggregationConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => AggregationConfig::default(),
    }
    .with_overrides(args.tariff, args.currency.clone(), args.interval_hours);

    // Loaded once; every render pass below only borrows it
    let Some(dataset) = load_dataset(&args)? else {
        println!(
            "ℹ️  Upload a CSV to proceed (--input <file>) or switch to the sample data (--sample)."
        );
        return Ok(());
    };
    info!("Loaded {} readings for {} devices", dataset.len(), dataset.devices().len());

    let aggregator = EnergyAggregator::new(config)?;
    let ctx = RenderContext::new(
        &dataset,
        DeviceFilter::parse(&args.device),
        args.granularity.clone().into(),
    );
    let view = aggregator.render(&ctx)?;

    DashboardReport::new(&view).write(&mut std::io::stdout().lock())?;

    let summary_path = write_summary_file(&view.summary, &args.output_dir)
        .with_context(|| format!("Failed to export summary to {}", args.output_dir.display()))?;
    println!("\n📥 Summary exported to {}", summary_path.display());

    if !args.no_charts {
        let charts = DashboardCharts::new(args.output_dir.clone())?;
        let paths = charts.render_all(&view)?;
        println!("📈 {} charts saved to {}", paths.len(), charts.output_dir().display());
    }

    Ok(())
}

fn main() -> Result<ExitCode> {
    env_logger::init();
    let args = Args::parse();

    match run(args) {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(err) => match err.downcast_ref::<AggregationError>() {
            // Bad input ends the pass with a message, not a fault
            Some(validation) if validation.is_validation() => {
                eprintln!("❌ {}", validation);
                Ok(ExitCode::from(2))
            }
            _ => Err(err),
        },
    }
}
