/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::{
    catalog::{JobId, ReferenceCatalog},
    log_extractor::ExecutionRecords,
};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// Label of the synthetic baseline in which every job finishes exactly on its SLO.
pub const IDEAL: &str = "ideal";

/// Normalised SLO overshoot, `max(avg / slo - 1, 0)`. Jobs that beat their SLO count as zero.
pub fn tail_ratio(avg_ms: f64, slo_ms: f64) -> f64 {
    (avg_ms / slo_ms - 1.0).max(0.0)
}

/// Running mean, so samples near `f64::MAX` average without the sum overflowing.
fn mean(samples: &[f64]) -> f64 {
    samples
        .iter()
        .enumerate()
        .fold(0_f64, |mean, (i, x)| mean + (x - mean) / (i + 1) as f64)
}

/// Read-only per-job metrics for a single scheduler.
///
/// Every job with at least one sample has an execution-time entry. Only jobs whose SLO could be
/// resolved through the reference catalog also have a tail-latency entry.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerMetrics {
    scheduler: String,
    execution_ms: BTreeMap<JobId, f64>,
    tail_latency: BTreeMap<JobId, f64>,
}
impl SchedulerMetrics {
    pub fn aggregate(records: &ExecutionRecords, catalog: &ReferenceCatalog) -> Self {
        let execution_ms = records
            .samples()
            .iter()
            .filter(|(_, samples)| !samples.is_empty())
            .map(|(job, samples)| (*job, mean(samples)))
            .collect::<BTreeMap<_, _>>();

        let tail_latency = execution_ms
            .iter()
            .filter_map(|(job, avg)| catalog.slo_for(*job).map(|slo| (*job, tail_ratio(*avg, slo))))
            .collect::<BTreeMap<_, _>>();

        debug!(
            "{}: {} jobs, {} with a resolvable SLO",
            records.scheduler(),
            execution_ms.len(),
            tail_latency.len()
        );

        Self {
            scheduler: records.scheduler().to_string(),
            execution_ms,
            tail_latency,
        }
    }

    /// Builds the ideal baseline straight from the reference tables: every job with a known SLO
    /// runs for exactly its SLO and has a tail ratio of exactly zero.
    pub fn ideal(catalog: &ReferenceCatalog) -> Self {
        let execution_ms = catalog
            .identity()
            .iter()
            .filter_map(|(job, complexity)| catalog.slo().get(complexity).map(|slo| (job, slo)))
            .collect::<BTreeMap<_, _>>();

        let tail_latency = execution_ms.keys().map(|job| (*job, 0.0)).collect();

        Self {
            scheduler: IDEAL.to_string(),
            execution_ms,
            tail_latency,
        }
    }

    pub fn scheduler(&self) -> &str {
        &self.scheduler
    }

    pub fn is_ideal(&self) -> bool {
        self.scheduler == IDEAL
    }

    pub fn execution_ms(&self) -> &BTreeMap<JobId, f64> {
        &self.execution_ms
    }

    pub fn tail_latency(&self) -> &BTreeMap<JobId, f64> {
        &self.tail_latency
    }

    pub fn execution_samples(&self) -> Vec<f64> {
        self.execution_ms.values().copied().collect()
    }

    pub fn tail_samples(&self) -> Vec<f64> {
        self.tail_latency.values().copied().collect()
    }
}

/// Moves the ideal series to the front, leaving every other scheduler in its original order.
pub fn ideal_first(series: &mut [SchedulerMetrics]) {
    series.sort_by_key(|s| if s.is_ideal() { 0 } else { 1 });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        catalog::{JobIdentity, SloTable},
        log_extractor::LogSample,
    };

    fn catalog() -> ReferenceCatalog {
        ReferenceCatalog::new(
            SloTable::parse("30 500.0\n31 1000.0\n"),
            JobIdentity::parse("fib7 1000 30\nfib8 1100 31\nfib9 1200 99\n"),
        )
    }

    fn records(lines: &[&str]) -> ExecutionRecords {
        let mut records = ExecutionRecords::new("sfs");
        for line in lines {
            records.ingest_line(line);
        }
        records
    }

    #[test]
    fn computes_tail_ratio_against_slo() {
        let metrics = SchedulerMetrics::aggregate(
            &records(&["logs TIME: fib7 12.3ms 600.0ms Request# 4"]),
            &catalog(),
        );
        assert_eq!(metrics.execution_ms().get(&JobId(7)), Some(&600.0));
        let tail = metrics.tail_latency()[&JobId(7)];
        assert!((tail - 0.2).abs() < 1e-12);
    }

    #[test]
    fn averages_repeated_samples() {
        let metrics = SchedulerMetrics::aggregate(
            &records(&[
                "logs TIME: fib8 1ms 100.0ms Request# 1",
                "logs TIME: fib8 1ms 300.0ms Request# 2",
            ]),
            &catalog(),
        );
        assert_eq!(metrics.execution_ms()[&JobId(8)], 200.0);
    }

    #[test]
    fn large_samples_average_without_overflow() {
        let big = f64::MAX / 2.0;
        let mut records = ExecutionRecords::new("sfs");
        for request in 0..3 {
            records.push(&LogSample {
                job: JobId(7),
                started_ms: 0.0,
                execution_ms: big,
                request,
            });
        }

        let metrics = SchedulerMetrics::aggregate(&records, &catalog());
        let avg = metrics.execution_ms()[&JobId(7)];
        assert!(avg.is_finite());
        assert!((avg / big - 1.0).abs() < 1e-12);
        assert!(metrics.tail_latency()[&JobId(7)].is_finite());
    }

    #[test]
    fn clamps_jobs_that_beat_their_slo() {
        let metrics = SchedulerMetrics::aggregate(
            &records(&["logs TIME: fib8 1ms 400.0ms Request# 1"]),
            &catalog(),
        );
        assert_eq!(metrics.tail_latency()[&JobId(8)], 0.0);
        assert!(metrics.tail_samples().iter().all(|t| *t >= 0.0));
    }

    #[test]
    fn unresolved_jobs_only_count_for_execution_time() {
        let metrics = SchedulerMetrics::aggregate(
            &records(&[
                "logs TIME: fib9 1ms 100.0ms Request# 1",
                "logs TIME: fib10 1ms 100.0ms Request# 2",
            ]),
            &catalog(),
        );
        assert_eq!(metrics.execution_ms().len(), 2);
        assert!(metrics.tail_latency().is_empty());
    }

    #[test]
    fn ideal_runs_exactly_on_slo() {
        let ideal = SchedulerMetrics::ideal(&catalog());
        assert!(ideal.is_ideal());
        assert_eq!(ideal.execution_ms().len(), 2);
        assert_eq!(ideal.execution_ms()[&JobId(7)], 500.0);
        assert_eq!(ideal.execution_ms()[&JobId(8)], 1000.0);
        assert!(ideal.tail_samples().iter().all(|t| *t == 0.0));
        assert!(!ideal.execution_ms().contains_key(&JobId(9)));
    }

    #[test]
    fn ideal_sorts_first() {
        let catalog = catalog();
        let mut series = vec![
            SchedulerMetrics::aggregate(&ExecutionRecords::new("tla"), &catalog),
            SchedulerMetrics::aggregate(&ExecutionRecords::new("sfs"), &catalog),
            SchedulerMetrics::ideal(&catalog),
        ];
        ideal_first(&mut series);
        let names = series.iter().map(|s| s.scheduler()).collect::<Vec<_>>();
        assert_eq!(names, vec!["ideal", "tla", "sfs"]);
    }
}
