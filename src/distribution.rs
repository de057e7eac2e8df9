/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::{
    aggregate::SchedulerMetrics,
    catalog::JobIdentity,
    config::{Display, Palette},
    percentile::{self, PercentileTable},
};
use anyhow::anyhow;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// Empirical CDF over a fixed sample set: the fraction of samples `<= x`.
#[derive(Debug, Clone, PartialEq)]
pub struct Ecdf {
    sorted: Vec<f64>,
}
impl Ecdf {
    pub fn new(samples: &[f64]) -> Self {
        Self {
            sorted: percentile::sorted(samples),
        }
    }

    pub fn evaluate(&self, x: f64) -> f64 {
        if self.sorted.is_empty() {
            return 0.0;
        }
        let below = self.sorted.partition_point(|v| *v <= x);
        below as f64 / self.sorted.len() as f64
    }

    pub fn sorted(&self) -> &[f64] {
        &self.sorted
    }

    pub fn min(&self) -> Option<f64> {
        self.sorted.first().copied()
    }

    pub fn max(&self) -> Option<f64> {
        self.sorted.last().copied()
    }

    pub fn len(&self) -> usize {
        self.sorted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }
}

/// `points` log-spaced values from one decade below `min` to one decade above `max`, both rounded
/// outwards to a whole decade. Empty unless `0 < min <= max`.
pub fn log_grid(min: f64, max: f64, points: usize) -> Vec<f64> {
    if !(min > 0.0 && min <= max && max.is_finite()) || points == 0 {
        return vec![];
    }

    let lo = min.log10().floor() - 1.0;
    let hi = max.log10().ceil() + 1.0;
    if points == 1 {
        return vec![10_f64.powf(lo)];
    }

    let step = (hi - lo) / (points - 1) as f64;
    (0..points)
        .map(|i| 10_f64.powf(lo + step * i as f64))
        .collect()
}

/// Replaces non-positive values so they can sit on a log axis. Display only, statistics are
/// always computed on the raw values.
pub fn clamp_for_log(samples: &[f64], epsilon: f64) -> Vec<f64> {
    samples
        .iter()
        .map(|v| if *v <= 0.0 { epsilon } else { *v })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Curve {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}
impl Curve {
    pub fn points(&self) -> Vec<(f32, f32)> {
        self.x
            .iter()
            .zip(self.y.iter())
            .map(|(x, y)| (*x as f32, *y as f32))
            .collect()
    }
}

/// Sorted raw samples and the ECDF evaluated on a log grid around them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SampleCurve {
    pub samples: Vec<f64>,
    pub curve: Curve,
}
impl SampleCurve {
    /// Curve over the raw samples. The grid spans the positive samples only. Zero values still
    /// count towards every point on it.
    pub fn build(samples: &[f64], display: &Display) -> Self {
        let ecdf = Ecdf::new(samples);
        let curve = log_curve(&ecdf, display.grid_points);
        Self {
            samples: ecdf.sorted,
            curve,
        }
    }

    /// Curve for values that are legitimately zero, such as tail ratios. Non-positive values are
    /// moved to `display.epsilon` before the curve is evaluated; `samples` keeps the raw values.
    pub fn build_clamped(samples: &[f64], display: &Display) -> Self {
        let curve = log_curve(
            &Ecdf::new(&clamp_for_log(samples, display.epsilon)),
            display.grid_points,
        );
        Self {
            samples: percentile::sorted(samples),
            curve,
        }
    }
}

fn log_curve(ecdf: &Ecdf, points: usize) -> Curve {
    let min_positive = ecdf.sorted().iter().copied().find(|v| *v > 0.0);
    let x = match (min_positive, ecdf.max()) {
        (Some(min), Some(max)) => log_grid(min, max, points),
        _ => vec![],
    };
    let y = x.iter().map(|x| ecdf.evaluate(*x)).collect();
    Curve { x, y }
}

/// Everything a renderer needs to draw one scheduler's curves.
#[derive(Debug, Clone, Serialize)]
pub struct DistributionSeries {
    pub scheduler: String,
    pub colour: Option<String>,
    pub dashed: bool,
    pub execution: SampleCurve,
    pub tail_latency: SampleCurve,
}
impl DistributionSeries {
    pub fn build(metrics: &SchedulerMetrics, display: &Display, palette: &Palette) -> Self {
        Self {
            scheduler: metrics.scheduler().to_string(),
            colour: palette.colour_for(metrics.scheduler()).map(str::to_string),
            dashed: display.is_dashed(metrics.scheduler()),
            execution: SampleCurve::build(&metrics.execution_samples(), display),
            tail_latency: SampleCurve::build_clamped(&metrics.tail_samples(), display),
        }
    }
}

/// A named half-open complexity range, `start..end`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CategoryBucket {
    pub name: String,
    pub start: u32,
    pub end: u32,
}
impl CategoryBucket {
    pub fn contains(&self, complexity: u32) -> bool {
        (self.start..self.end).contains(&complexity)
    }

    fn overlaps(&self, other: &CategoryBucket) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Non-empty, disjoint, uniquely named buckets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryBuckets {
    buckets: Vec<CategoryBucket>,
}
impl CategoryBuckets {
    pub fn try_new(buckets: Vec<CategoryBucket>) -> anyhow::Result<Self> {
        if let Some(bucket) = buckets.iter().find(|b| b.start >= b.end) {
            return Err(anyhow!(
                "Category {} has an empty range [{}, {})",
                bucket.name,
                bucket.start,
                bucket.end
            ));
        }

        if let Some(name) = buckets.iter().map(|b| &b.name).duplicates().next() {
            return Err(anyhow!("Category {} is defined more than once", name));
        }

        if let Some((a, b)) = buckets
            .iter()
            .tuple_combinations()
            .find(|(a, b)| a.overlaps(b))
        {
            return Err(anyhow!("Categories {} and {} overlap", a.name, b.name));
        }

        Ok(Self { buckets })
    }

    pub fn iter(&self) -> impl Iterator<Item = &CategoryBucket> {
        self.buckets.iter()
    }

    pub fn find(&self, name: &str) -> Option<&CategoryBucket> {
        self.buckets.iter().find(|b| b.name == name)
    }

    pub fn bucket_for(&self, complexity: u32) -> Option<&CategoryBucket> {
        self.buckets.iter().find(|b| b.contains(complexity))
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Splits a scheduler's execution times by category, one entry per bucket in bucket order.
    /// Jobs without a known complexity, or whose complexity no bucket claims, are dropped.
    pub fn partition(
        &self,
        metrics: &SchedulerMetrics,
        identity: &JobIdentity,
    ) -> Vec<(&CategoryBucket, Vec<f64>)> {
        let mut parts = self
            .buckets
            .iter()
            .map(|b| (b, vec![]))
            .collect::<Vec<_>>();

        for (job, exec_ms) in metrics.execution_ms() {
            let Some(complexity) = identity.complexity_of(*job) else {
                continue;
            };
            if let Some(idx) = self.buckets.iter().position(|b| b.contains(complexity)) {
                parts[idx].1.push(*exec_ms);
            }
        }

        parts
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CategorySeries {
    pub scheduler: String,
    pub execution: SampleCurve,
    /// `None` when the scheduler has no samples in this category.
    pub percentiles: Option<PercentileTable>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryBreakdown {
    pub bucket: CategoryBucket,
    pub series: Vec<CategorySeries>,
}

/// Per-category execution-time curves and percentiles for every scheduler.
pub fn categorize(
    series: &[SchedulerMetrics],
    buckets: &CategoryBuckets,
    identity: &JobIdentity,
    display: &Display,
) -> Vec<CategoryBreakdown> {
    let partitioned = series
        .iter()
        .map(|metrics| (metrics.scheduler(), buckets.partition(metrics, identity)))
        .collect::<Vec<_>>();

    buckets
        .iter()
        .enumerate()
        .map(|(idx, bucket)| CategoryBreakdown {
            bucket: bucket.clone(),
            series: partitioned
                .iter()
                .map(|(scheduler, parts)| {
                    let samples = &parts[idx].1;
                    CategorySeries {
                        scheduler: scheduler.to_string(),
                        execution: SampleCurve::build(samples, display),
                        percentiles: PercentileTable::try_from_samples(
                            samples,
                            &percentile::CATEGORY,
                        ),
                    }
                })
                .collect(),
        })
        .collect()
}
