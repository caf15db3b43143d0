use anyhow::Result;
use chrono::NaiveDateTime;
use energy_aggregator::device_filter::display_name;
use energy_aggregator::models::{BucketedSeries, Summary};
use energy_aggregator::{DashboardView, Granularity};
use log::{info, warn};
use plotters::element::Pie;
use plotters::prelude::*;
use std::path::{Path, PathBuf};

pub const TREND_FILE: &str = "trend.svg";
pub const COMPARISON_FILE: &str = "comparison.svg";
pub const BREAKDOWN_FILE: &str = "breakdown.svg";

const PALETTE: [RGBColor; 8] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
    RGBColor(227, 119, 194),
    RGBColor(127, 127, 127),
];

fn color_for(idx: usize) -> RGBColor {
    PALETTE[idx % PALETTE.len()]
}

/// Axis label for a bucket start at the given granularity.
pub fn bucket_label(start: NaiveDateTime, granularity: Granularity) -> String {
    let format = match granularity {
        Granularity::Hourly => "%m-%d %H:%M",
        Granularity::Daily | Granularity::Weekly => "%Y-%m-%d",
        Granularity::Monthly => "%Y-%m",
    };
    start.format(format).to_string()
}

/// Upper bound of a value axis starting at zero.
pub fn axis_upper(max_value: f64) -> f64 {
    if max_value > 0.0 {
        max_value * 1.1
    } else {
        1.0
    }
}

/// (bucket index, mean watts) for one device column, skipping gaps.
pub fn trend_points(series: &BucketedSeries, column: usize) -> Vec<(usize, f64)> {
    series
        .buckets
        .iter()
        .enumerate()
        .filter_map(|(idx, bucket)| {
            bucket
                .means
                .get(column)
                .copied()
                .flatten()
                .map(|m| (idx, m))
        })
        .collect()
}

/// Pie slices: devices with non-zero consumption, labelled by display name.
pub fn share_slices(summary: &Summary) -> Vec<(String, f64, RGBColor)> {
    summary
        .devices
        .iter()
        .enumerate()
        .filter(|(_, d)| d.total_kwh > 0.0)
        .map(|(idx, d)| (display_name(&d.device), d.total_kwh, color_for(idx)))
        .collect()
}

pub struct DashboardCharts {
    output_dir: PathBuf,
}

impl DashboardCharts {
    pub fn new(output_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&output_dir)?;
        Ok(Self { output_dir })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Render the trend, comparison and breakdown charts.
    pub fn render_all(&self, view: &DashboardView) -> Result<Vec<PathBuf>> {
        let (trend, (comparison, breakdown)) = rayon::join(
            || self.render_trend(view),
            || {
                rayon::join(
                    || self.render_comparison(view),
                    || self.render_breakdown(view),
                )
            },
        );

        Ok(vec![trend?, comparison?, breakdown?])
    }

    /// Line per device of mean power over bucket starts
    pub fn render_trend(&self, view: &DashboardView) -> Result<PathBuf> {
        let path = self.output_dir.join(TREND_FILE);
        let series = &view.series;

        let labels: Vec<String> = series
            .buckets
            .iter()
            .map(|b| bucket_label(b.start, series.granularity))
            .collect();
        let max_watts = series
            .buckets
            .iter()
            .flat_map(|b| b.means.iter().flatten())
            .fold(0.0_f64, |a, b| a.max(*b));
        let x_max = labels.len().max(2) - 1;

        let root = SVGBackend::new(&path, (1200, 600)).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(
                format!("{} Mean Power", series.granularity),
                ("sans-serif", 30).into_font(),
            )
            .margin(15)
            .x_label_area_size(50)
            .y_label_area_size(70)
            .build_cartesian_2d(0..x_max, 0.0..axis_upper(max_watts))?;

        chart
            .configure_mesh()
            .x_desc("Timestamp")
            .y_desc("Power (W)")
            .x_labels(labels.len().clamp(1, 12))
            .x_label_formatter(&|x| labels.get(*x).cloned().unwrap_or_default())
            .draw()?;

        for (col, device) in series.devices.iter().enumerate() {
            let color = color_for(col);
            let points = trend_points(series, col);

            chart
                .draw_series(LineSeries::new(points.clone(), color.stroke_width(2)))?
                .label(display_name(device))
                .legend(move |(x, y)| {
                    PathElement::new(vec![(x, y), (x + 10, y)], color.stroke_width(2))
                });

            // Markers keep single-bucket series visible
            chart.draw_series(
                points
                    .iter()
                    .map(|&(x, y)| Circle::new((x, y), 3, color.filled())),
            )?;
        }

        chart
            .configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()?;

        root.present()?;
        info!("Saved trend chart to {}", path.display());
        Ok(path.clone())
    }

    /// Bar of total kWh per device
    pub fn render_comparison(&self, view: &DashboardView) -> Result<PathBuf> {
        let path = self.output_dir.join(COMPARISON_FILE);

        let data: Vec<(String, f64)> = view
            .summary
            .devices
            .iter()
            .map(|d| (display_name(&d.device), d.total_kwh))
            .collect();
        let max_kwh = data.iter().map(|(_, v)| *v).fold(0.0_f64, f64::max);

        let root = SVGBackend::new(&path, (800, 600)).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption("Total Energy by Device", ("sans-serif", 30).into_font())
            .margin(15)
            .x_label_area_size(50)
            .y_label_area_size(80)
            .build_cartesian_2d((0..data.len()).into_segmented(), 0.0..axis_upper(max_kwh))?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_desc("Device")
            .y_desc("Total kWh")
            .x_labels(data.len())
            .x_label_formatter(&|x| match x {
                SegmentValue::CenterOf(idx) => {
                    data.get(*idx).map(|(name, _)| name.clone()).unwrap_or_default()
                }
                _ => String::new(),
            })
            .draw()?;

        chart.draw_series(data.iter().enumerate().map(|(idx, (_, kwh))| {
            let mut bar = Rectangle::new(
                [(SegmentValue::Exact(idx), 0.0), (SegmentValue::Exact(idx + 1), *kwh)],
                color_for(idx).filled(),
            );
            bar.set_margin(0, 0, 10, 10);
            bar
        }))?;

        root.present()?;
        info!("Saved comparison chart to {}", path.display());
        Ok(path.clone())
    }

    /// Pie of each device's share of total kWh
    pub fn render_breakdown(&self, view: &DashboardView) -> Result<PathBuf> {
        let path = self.output_dir.join(BREAKDOWN_FILE);

        let root = SVGBackend::new(&path, (800, 600)).into_drawing_area();
        root.fill(&WHITE)?;
        let area = root.titled("Energy Share by Device", ("sans-serif", 30))?;

        let slices = share_slices(&view.summary);
        if slices.is_empty() {
            warn!("No consumption recorded; breakdown chart left empty");
        } else {
            let (width, height) = area.dim_in_pixel();
            let center = ((width / 2) as i32, (height / 2) as i32);
            let radius = width.min(height) as f64 * 0.35;

            let labels: Vec<String> = slices.iter().map(|(name, _, _)| name.clone()).collect();
            let sizes: Vec<f64> = slices.iter().map(|(_, kwh, _)| *kwh).collect();
            let colors: Vec<RGBColor> = slices.iter().map(|(_, _, color)| *color).collect();

            let mut pie = Pie::new(&center, &radius, &sizes, &colors, &labels);
            pie.start_angle(-90.0);
            pie.label_style(("sans-serif", 18).into_font().color(&BLACK));
            pie.percentages(("sans-serif", 16).into_font().color(&WHITE));
            area.draw(&pie)?;
        }

        root.present()?;
        info!("Saved breakdown chart to {}", path.display());
        Ok(path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use energy_aggregator::models::{BucketMean, DeviceSummary};
    use energy_aggregator::{
        AggregationConfig, DataLoader, DeviceFilter, EnergyAggregator, RenderContext,
    };

    fn at(d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 12, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_bucket_labels() {
        assert_eq!(bucket_label(at(26, 8), Granularity::Hourly), "12-26 08:00");
        assert_eq!(bucket_label(at(22, 0), Granularity::Weekly), "2025-12-22");
        assert_eq!(bucket_label(at(1, 0), Granularity::Monthly), "2025-12");
    }

    #[test]
    fn test_axis_upper() {
        assert_eq!(axis_upper(0.0), 1.0);
        assert!((axis_upper(200.0) - 220.0).abs() < 1e-9);
    }

    #[test]
    fn test_trend_points_skip_gaps() {
        let series = BucketedSeries {
            granularity: Granularity::Hourly,
            devices: vec!["Fan (W)".into(), "TV (W)".into()],
            buckets: vec![
                BucketMean {
                    start: at(26, 8),
                    readings: 1,
                    means: vec![Some(100.0), None],
                },
                BucketMean {
                    start: at(26, 9),
                    readings: 1,
                    means: vec![Some(120.0), Some(80.0)],
                },
            ],
        };

        assert_eq!(trend_points(&series, 0), vec![(0, 100.0), (1, 120.0)]);
        assert_eq!(trend_points(&series, 1), vec![(1, 80.0)]);
        assert!(trend_points(&series, 5).is_empty());
    }

    #[test]
    fn test_share_slices_drop_idle_devices() {
        let summary = Summary {
            tariff: 8.0,
            currency: "INR".into(),
            devices: vec![
                DeviceSummary {
                    device: "Fan (W)".into(),
                    total_kwh: 0.963,
                    estimated_cost: 7.704,
                },
                DeviceSummary {
                    device: "Heater (W)".into(),
                    total_kwh: 0.0,
                    estimated_cost: 0.0,
                },
                DeviceSummary {
                    device: "TV (W)".into(),
                    total_kwh: 1.395,
                    estimated_cost: 11.16,
                },
            ],
        };

        let slices = share_slices(&summary);
        let names: Vec<_> = slices.iter().map(|(n, _, _)| n.as_str()).collect();
        assert_eq!(names, vec!["Fan", "TV"]);
        // colours stay tied to column position
        let RGBColor(r, g, b) = slices[1].2;
        assert_eq!((r, g, b), (44, 160, 44));
    }

    #[test]
    fn test_render_all_writes_three_svgs() {
        let dataset = DataLoader::new().load_sample().unwrap();
        let view = EnergyAggregator::new(AggregationConfig::default())
            .unwrap()
            .render(&RenderContext::new(&dataset, DeviceFilter::All, Granularity::Hourly))
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let charts = DashboardCharts::new(dir.path().join("charts")).unwrap();
        let paths = charts.render_all(&view).unwrap();

        let names: Vec<_> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec![TREND_FILE, COMPARISON_FILE, BREAKDOWN_FILE]);
        for path in &paths {
            let svg = std::fs::read_to_string(path).unwrap();
            assert!(svg.contains("<svg"), "{} is not an SVG", path.display());
        }
    }

    #[test]
    fn test_single_bucket_and_idle_charts_render() {
        // One monthly bucket and an all-zero device exercise the degenerate axes
        let csv = "Timestamp,Fan (W),Heater (W)\n2025-12-26 08:00,120,0\n";
        let dataset = DataLoader::new().load_reader(csv.as_bytes()).unwrap();
        let view = EnergyAggregator::new(AggregationConfig::default())
            .unwrap()
            .render(&RenderContext::new(
                &dataset,
                DeviceFilter::parse("Heater"),
                Granularity::Monthly,
            ))
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let charts = DashboardCharts::new(dir.path().to_path_buf()).unwrap();
        assert!(charts.render_trend(&view).unwrap().exists());
        assert!(charts.render_comparison(&view).unwrap().exists());
        assert!(charts.render_breakdown(&view).unwrap().exists());
    }
}
