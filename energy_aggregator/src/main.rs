use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use energy_aggregator::{
    summary_export, AggregationConfig, DataLoader, DeviceFilter, EnergyAggregator, Granularity,
    RenderContext,
};
use log::info;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "energy_aggregator")]
#[command(about = "Aggregate appliance power readings into energy and cost summaries")]
struct Args {
    /// Meter CSV with a Timestamp column and one column per device (watts)
    #[arg(short, long, conflicts_with = "sample")]
    input: Option<PathBuf>,

    /// Use the built-in sample readings instead of a file
    #[arg(long)]
    sample: bool,

    /// Device type to keep (e.g. Fan, Light, Fridge, TV) or "All"
    #[arg(short, long, default_value = "All")]
    device: String,

    /// Bucket width for the mean power series
    #[arg(short, long, value_enum, default_value = "hourly")]
    granularity: GranularityArg,

    /// Price per kWh
    #[arg(short, long)]
    tariff: Option<f64>,

    /// Currency label used in the cost column
    #[arg(long)]
    currency: Option<String>,

    /// Hours of consumption each reading stands for
    #[arg(long)]
    interval_hours: Option<f64>,

    /// JSON file with tariff / currency / sampling_interval_hours
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "summary")]
    output: OutputFormat,
}

#[derive(Clone, ValueEnum)]
enum GranularityArg {
    Hourly,
    Daily,
    Weekly,
    Monthly,
}

impl From<GranularityArg> for Granularity {
    fn from(arg: GranularityArg) -> Self {
        match arg {
            GranularityArg::Hourly => Granularity::Hourly,
            GranularityArg::Daily => Granularity::Daily,
            GranularityArg::Weekly => Granularity::Weekly,
            GranularityArg::Monthly => Granularity::Monthly,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
    Summary,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    // File values first, then CLI overrides
    let config = match &args.config {
        Some(path) => AggregationConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => AggregationConfig::default(),
    }
    .with_overrides(args.tariff, args.currency.clone(), args.interval_hours);

    let loader = DataLoader::new();
    let dataset = match (&args.input, args.sample) {
        (Some(path), _) => loader
            .load_path(path)
            .with_context(|| format!("Failed to load readings from {}", path.display()))?,
        (None, true) => loader.load_sample()?,
        (None, false) => anyhow::bail!("Provide --input <csv> or --sample"),
    };
    info!("Loaded {} readings for {} devices", dataset.len(), dataset.devices().len());

    let aggregator = EnergyAggregator::new(config)?;
    let ctx = RenderContext::new(
        &dataset,
        DeviceFilter::parse(&args.device),
        args.granularity.into(),
    );
    let view = aggregator.render(&ctx)?;

    match args.output {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&view)?;
            println!("{}", json);
        }
        OutputFormat::Csv => {
            summary_export::write_summary_csv(&view.summary, std::io::stdout().lock())?;
        }
        OutputFormat::Summary => {
            let currency = &view.summary.currency;
            println!("Energy Summary");
            println!("==============");
            println!("Devices: {} ({} filter)", view.devices.len(), view.filter);
            println!("Records: {}", view.kpis.record_count);
            println!("Tariff: {:.2} {}/kWh", view.summary.tariff, currency);
            println!();
            for device in &view.summary.devices {
                println!(
                    "  {}: {:.3} kWh, {:.2} {}",
                    device.device, device.total_kwh, device.estimated_cost, currency
                );
            }
            println!();
            println!(
                "Total: {:.2} kWh, {:.2} {}",
                view.kpis.total_kwh, view.kpis.total_cost, currency
            );
            println!();
            println!("{} mean power:", view.granularity);
            for bucket in &view.series.buckets {
                let means: Vec<String> = bucket
                    .means
                    .iter()
                    .map(|m| m.map(|w| format!("{:.1}", w)).unwrap_or_else(|| "-".to_string()))
                    .collect();
                println!("  {}  {}", bucket.start.format("%Y-%m-%d %H:%M"), means.join("  "));
            }
        }
    }

    Ok(())
}
