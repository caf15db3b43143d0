use energy_aggregator::{
    AggregationConfig, DataLoader, DeviceFilter, EnergyAggregator, Granularity, RenderContext,
};

fn main() -> energy_aggregator::Result<()> {
    // Built-in readings: four appliances, nine hourly samples
    let dataset = DataLoader::new().load_sample()?;
    let aggregator = EnergyAggregator::new(AggregationConfig::new(8.0))?;

    let view = aggregator.render(&RenderContext::new(
        &dataset,
        DeviceFilter::All,
        Granularity::Hourly,
    ))?;

    println!("Energy Summary");
    println!("==============");
    println!("Records: {}", view.kpis.record_count);
    println!("Total: {:.2} kWh", view.kpis.total_kwh);
    println!("Cost: {:.2} {}", view.kpis.total_cost, view.summary.currency);
    println!();

    println!("Top consumers:");
    for (i, device) in view.top_consumers.iter().enumerate() {
        println!("  {}. {} {:.3} kWh", i + 1, device.device, device.total_kwh);
    }
    println!();

    println!("Hourly mean power (W):");
    for device in &view.devices {
        let points = view.series.points(device);
        let values: Vec<String> = points.iter().map(|(_, w)| format!("{:.0}", w)).collect();
        println!("  {:<12} {}", device, values.join(" "));
    }

    Ok(())
}
