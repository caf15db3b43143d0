use crate::error::Result;
use crate::models::{
    AggregationConfig, BucketMean, BucketedSeries, DashboardKpis, DashboardView, Dataset,
    DeviceSummary, Granularity, RenderContext, Summary,
};
use chrono::NaiveDateTime;
use log::{debug, info};
use rayon::prelude::*;
use std::collections::BTreeMap;

/// Number of devices listed as top consumers on the dashboard.
pub const TOP_CONSUMERS: usize = 3;

pub struct EnergyAggregator {
    config: AggregationConfig,
}

// Running totals for one bucket
struct BucketAccumulator {
    readings: usize,
    sums: Vec<f64>,
    counts: Vec<usize>,
}

impl BucketAccumulator {
    fn new(width: usize) -> Self {
        Self {
            readings: 0,
            sums: vec![0.0; width],
            counts: vec![0; width],
        }
    }

    fn finish(self, start: NaiveDateTime) -> BucketMean {
        let means = self
            .sums
            .iter()
            .zip(&self.counts)
            .map(|(sum, count)| (*count > 0).then(|| sum / *count as f64))
            .collect();

        BucketMean {
            start,
            readings: self.readings,
            means,
        }
    }
}

impl EnergyAggregator {
    pub fn new(mut config: AggregationConfig) -> Result<Self> {
        config.validate()?;
        // -0.0 passes validation; fold it to 0.0 so costs never print as -0.00
        config.tariff += 0.0;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AggregationConfig {
        &self.config
    }

    /// Average each device's watts inside calendar buckets.
    ///
    /// Buckets are emitted in ascending order of their start, whatever the
    /// order of the readings. Buckets without readings are left out.
    pub fn bucketed_means(
        &self,
        dataset: &Dataset,
        devices: &[String],
        granularity: Granularity,
    ) -> Result<BucketedSeries> {
        let columns = dataset.resolve(devices)?;
        let mut buckets: BTreeMap<NaiveDateTime, BucketAccumulator> = BTreeMap::new();

        for reading in dataset.readings() {
            let start = granularity.bucket_start(reading.timestamp);
            let acc = buckets
                .entry(start)
                .or_insert_with(|| BucketAccumulator::new(columns.len()));

            acc.readings += 1;
            for (slot, &col) in columns.iter().enumerate() {
                if let Some(watts) = reading.values[col] {
                    acc.sums[slot] += watts;
                    acc.counts[slot] += 1;
                }
            }
        }

        debug!(
            "{} readings fell into {} {} buckets",
            dataset.len(),
            buckets.len(),
            granularity
        );

        Ok(BucketedSeries {
            granularity,
            devices: devices.to_vec(),
            buckets: buckets
                .into_iter()
                .map(|(start, acc)| acc.finish(start))
                .collect(),
        })
    }

    /// Total energy and cost per device over the whole dataset.
    ///
    /// Each reading counts for `sampling_interval_hours` of consumption,
    /// so kWh = sum(W) * interval / 1000. Empty cells contribute nothing.
    pub fn summarize(&self, dataset: &Dataset, devices: &[String]) -> Result<Summary> {
        let columns = dataset.resolve(devices)?;

        let per_device: Vec<DeviceSummary> = columns
            .par_iter()
            .zip(devices.par_iter())
            .map(|(&col, name)| {
                let watt_sum: f64 = dataset
                    .readings()
                    .iter()
                    .filter_map(|r| r.values[col])
                    .sum();
                let total_kwh = self.config.watts_to_kwh(watt_sum);

                DeviceSummary {
                    device: name.clone(),
                    total_kwh,
                    estimated_cost: total_kwh * self.config.tariff,
                }
            })
            .collect();

        Ok(Summary {
            tariff: self.config.tariff,
            currency: self.config.currency.clone(),
            devices: per_device,
        })
    }

    /// Run one full render pass: filter, bucket, summarize.
    pub fn render(&self, ctx: &RenderContext<'_>) -> Result<DashboardView> {
        let devices = ctx.filter.apply(ctx.dataset.devices())?;
        info!(
            "Rendering {} devices ({} filter) at {} granularity",
            devices.len(),
            ctx.filter,
            ctx.granularity
        );

        let series = self.bucketed_means(ctx.dataset, &devices, ctx.granularity)?;
        let summary = self.summarize(ctx.dataset, &devices)?;

        let kpis = DashboardKpis {
            total_kwh: summary.total_kwh(),
            total_cost: summary.total_cost(),
            record_count: ctx.dataset.len(),
        };
        let top_consumers = summary.top_consumers(TOP_CONSUMERS);

        Ok(DashboardView {
            filter: ctx.filter.clone(),
            granularity: ctx.granularity,
            devices,
            series,
            summary,
            kpis,
            top_consumers,
        })
    }
}
