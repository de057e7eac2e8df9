/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Fixed-percentile summaries of per-scheduler samples.
//!
//! Percentiles interpolate linearly between the two closest order statistics (the default
//! behaviour of numpy's `percentile`), so for `n` sorted samples the value at rank `p` sits at
//! position `p / 100 * (n - 1)`.

use crate::aggregate::SchedulerMetrics;
use itertools::Itertools;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Percentile {
    pub label: &'static str,
    pub rank: f64,
}

pub const P50: Percentile = Percentile { label: "P50", rank: 50.0 };
pub const P80: Percentile = Percentile { label: "P80", rank: 80.0 };
pub const P90: Percentile = Percentile { label: "P90", rank: 90.0 };
pub const P95: Percentile = Percentile { label: "P95", rank: 95.0 };
pub const P99: Percentile = Percentile { label: "P99", rank: 99.0 };
pub const P99_9: Percentile = Percentile { label: "P99.9", rank: 99.9 };

/// Percentiles reported for whole-workload tables.
pub const STANDARD: [Percentile; 4] = [P90, P95, P99, P99_9];

/// Percentiles reported for complexity-category breakdowns.
pub const CATEGORY: [Percentile; 4] = [P50, P80, P90, P99_9];

/// Interpolated percentile of an ascending slice. `None` when the slice is empty.
pub fn percentile_sorted(sorted: &[f64], rank: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let pos = (rank / 100.0).clamp(0.0, 1.0) * last as f64;
    let lo = pos.floor() as usize;
    let hi = (pos.ceil() as usize).min(last);

    let lo_v = sorted[lo];
    let hi_v = sorted[hi];
    let frac = pos - lo as f64;

    // rounding must never push the result past the upper order statistic, otherwise
    // neighbouring percentiles could come out of order
    Some((lo_v + (hi_v - lo_v) * frac).clamp(lo_v, hi_v))
}

pub fn sorted(samples: &[f64]) -> Vec<f64> {
    samples
        .iter()
        .copied()
        .sorted_by(|a, b| a.total_cmp(b))
        .collect()
}

/// Percentile label -> value for a single sample set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PercentileTable {
    values: Vec<(&'static str, f64)>,
}
impl PercentileTable {
    /// An empty sample set yields zero for every percentile.
    pub fn from_samples(samples: &[f64], percentiles: &[Percentile]) -> Self {
        Self::try_from_samples(samples, percentiles).unwrap_or_else(|| Self {
            values: percentiles.iter().map(|p| (p.label, 0.0)).collect(),
        })
    }

    /// Like `from_samples` but `None` for an empty sample set.
    pub fn try_from_samples(samples: &[f64], percentiles: &[Percentile]) -> Option<Self> {
        let sorted = sorted(samples);
        let values = percentiles
            .iter()
            .map(|p| percentile_sorted(&sorted, p.rank).map(|v| (p.label, v)))
            .collect::<Option<Vec<_>>>()?;
        Some(Self { values })
    }

    pub fn get(&self, label: &str) -> Option<f64> {
        self.values
            .iter()
            .find(|(l, _)| *l == label)
            .map(|(_, v)| *v)
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().map(|(_, v)| *v)
    }
}

/// The two sample universes every scheduler is summarised over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Universe {
    ExecutionTime,
    TailLatency,
}
impl Universe {
    pub fn samples(&self, metrics: &SchedulerMetrics) -> Vec<f64> {
        match self {
            Universe::ExecutionTime => metrics.execution_samples(),
            Universe::TailLatency => metrics.tail_samples(),
        }
    }

    /// Decimal places used when writing a table.
    pub fn precision(&self) -> usize {
        match self {
            Universe::ExecutionTime => 2,
            Universe::TailLatency => 4,
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            Universe::ExecutionTime => "percentiles_with_schedulers.txt",
            Universe::TailLatency => "tail_with_schedulers.txt",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Universe::ExecutionTime => "Execution time (ms)",
            Universe::TailLatency => "Tail latency ((turnaround / SLO) - 1)",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PercentileRow {
    pub scheduler: String,
    pub table: PercentileTable,
}

/// One row per scheduler, in the order the series were given.
#[derive(Debug, Clone, Serialize)]
pub struct PercentileReport {
    pub universe: Universe,
    pub percentiles: Vec<Percentile>,
    pub rows: Vec<PercentileRow>,
}
impl PercentileReport {
    pub fn summarize(series: &[SchedulerMetrics], universe: Universe) -> Self {
        let rows = series
            .iter()
            .map(|metrics| PercentileRow {
                scheduler: metrics.scheduler().to_string(),
                table: PercentileTable::from_samples(&universe.samples(metrics), &STANDARD),
            })
            .collect();

        Self {
            universe,
            percentiles: STANDARD.to_vec(),
            rows,
        }
    }

    pub fn row(&self, scheduler: &str) -> Option<&PercentileTable> {
        self.rows
            .iter()
            .find(|row| row.scheduler == scheduler)
            .map(|row| &row.table)
    }

    /// Tab-separated table with a `Scheduler` header column.
    pub fn to_tsv(&self) -> String {
        let precision = self.universe.precision();
        let mut out = header_line(&self.percentiles);
        for row in &self.rows {
            let cells = row.table.values().map(|v| format!("{:.*}", precision, v));
            out.push_str(&format!("{}\t{}\n", row.scheduler, cells.format("\t")));
        }
        out
    }
}

pub fn header_line(percentiles: &[Percentile]) -> String {
    format!(
        "Scheduler\t{}\n",
        percentiles.iter().map(|p| p.label).format("\t")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
    }

    #[test]
    fn interpolates_between_order_statistics() {
        let samples = (1..=10).map(f64::from).collect::<Vec<_>>();
        assert_close(percentile_sorted(&samples, 50.0).unwrap(), 5.5);
        assert_close(percentile_sorted(&samples, 90.0).unwrap(), 9.1);
        assert_close(percentile_sorted(&samples, 99.9).unwrap(), 9.991);
        assert_close(percentile_sorted(&samples, 100.0).unwrap(), 10.0);
        assert_close(percentile_sorted(&samples, 0.0).unwrap(), 1.0);
    }

    #[test]
    fn single_sample_is_every_percentile() {
        let table = PercentileTable::from_samples(&[42.0], &STANDARD);
        assert!(table.values().all(|v| v == 42.0));
    }

    #[test]
    fn empty_samples_give_zeros() {
        let table = PercentileTable::from_samples(&[], &STANDARD);
        assert_eq!(table.values().collect::<Vec<_>>(), vec![0.0; 4]);
        assert!(PercentileTable::try_from_samples(&[], &CATEGORY).is_none());
    }

    #[test]
    fn percentiles_are_monotonic() {
        let sample_sets: Vec<Vec<f64>> = vec![
            vec![3.0, 3.0, 3.0],
            vec![1.0, 1.0, 1.0, 1.0, 1e9],
            vec![0.1, 0.2, 0.30000000000000004, 1e-12, 7.7, 7.7000001],
            (0..1000).map(|i| ((i * 7919) % 1013) as f64 / 3.0).collect(),
        ];
        for samples in sample_sets {
            let table = PercentileTable::from_samples(&samples, &STANDARD);
            let values = table.values().collect::<Vec<_>>();
            assert!(values.windows(2).all(|w| w[0] <= w[1]), "{:?}", values);
        }
    }

    #[test]
    fn unsorted_input_is_sorted_first() {
        let table = PercentileTable::from_samples(&[10.0, 1.0, 5.0], &[P50]);
        assert_eq!(table.get("P50"), Some(5.0));
    }

    #[test]
    fn writes_tab_separated_rows() {
        let report = PercentileReport {
            universe: Universe::TailLatency,
            percentiles: STANDARD.to_vec(),
            rows: vec![
                PercentileRow {
                    scheduler: "ideal".to_string(),
                    table: PercentileTable::from_samples(&[0.0], &STANDARD),
                },
                PercentileRow {
                    scheduler: "sfs".to_string(),
                    table: PercentileTable::from_samples(&[0.2], &STANDARD),
                },
            ],
        };

        assert_eq!(
            report.to_tsv(),
            "Scheduler\tP90\tP95\tP99\tP99.9\n\
             ideal\t0.0000\t0.0000\t0.0000\t0.0000\n\
             sfs\t0.2000\t0.2000\t0.2000\t0.2000\n"
        );
    }
}
