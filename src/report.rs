use energy_aggregator::DashboardView;
use std::io::{self, Write};

const TITLE: &str = "⚡ Smart Energy Monitoring Dashboard";

/// Terminal rendering of one dashboard pass: KPI cards, device breakdown
/// and the top consumers.
pub struct DashboardReport<'a> {
    view: &'a DashboardView,
}

impl<'a> DashboardReport<'a> {
    pub fn new(view: &'a DashboardView) -> Self {
        Self { view }
    }

    pub fn write<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "\n{}", TITLE)?;
        writeln!(out, "{}", "=".repeat(80))?;
        writeln!(
            out,
            "Filter: {}   Time view: {}   Tariff: {:.2} {}/kWh",
            self.view.filter,
            self.view.granularity,
            self.view.summary.tariff,
            self.view.summary.currency
        )?;

        self.write_kpis(out)?;
        self.write_breakdown(out)?;
        self.write_top_consumers(out)?;
        Ok(())
    }

    fn write_kpis<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let kpis = &self.view.kpis;
        writeln!(out)?;
        writeln!(out, "🔌 Total kWh: {:.2}", kpis.total_kwh)?;
        writeln!(
            out,
            "💰 Estimated Cost: {:.2} {}",
            kpis.total_cost, self.view.summary.currency
        )?;
        writeln!(out, "📁 Records: {} rows", kpis.record_count)?;
        Ok(())
    }

    fn write_breakdown<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let cost_header = format!("Estimated Cost ({})", self.view.summary.currency);
        let width = self
            .view
            .summary
            .devices
            .iter()
            .map(|d| d.device.chars().count())
            .max()
            .unwrap_or(0)
            .max("Device".len());

        writeln!(out, "\n📊 Device Breakdown")?;
        writeln!(out, "{:<width$}  {:>10}  {:>22}", "Device", "Total kWh", cost_header)?;
        writeln!(out, "{}", "-".repeat(width + 36))?;
        for device in &self.view.summary.devices {
            writeln!(
                out,
                "{:<width$}  {:>10.3}  {:>22.2}",
                device.device, device.total_kwh, device.estimated_cost
            )?;
        }
        Ok(())
    }

    fn write_top_consumers<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "\n🏆 Top Energy Consumers")?;
        for (rank, device) in self.view.top_consumers.iter().enumerate() {
            writeln!(
                out,
                "  {}. {}: {:.3} kWh ({:.2} {})",
                rank + 1,
                device.device,
                device.total_kwh,
                device.estimated_cost,
                self.view.summary.currency
            )?;
        }
        Ok(())
    }
}
