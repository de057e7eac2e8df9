/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

pub mod aggregate;
pub mod catalog;
pub mod clap_args;
pub mod config;
pub mod distribution;
pub mod duration;
pub mod log_extractor;
pub mod percentile;
pub mod render;
pub mod report;

use aggregate::SchedulerMetrics;
use catalog::ReferenceCatalog;
use config::Config;
use distribution::DistributionSeries;
use percentile::{PercentileReport, Universe};
use report::{Report, SchedulerExtraction};
use tracing::info;

/// Runs the whole pipeline over the files named in `config`.
///
/// Fails if either reference table cannot be read or a log file exists but cannot be read. A
/// scheduler without any log still appears in every table, with zeroes.
///
/// # Arguments
///
/// * config - validated configuration naming the inputs and display settings
///
/// # Returns
///
/// The report for all schedulers, ideal baseline first. Nothing is written to disk, see
/// `Report::write_artifacts`.
pub fn run(config: &Config) -> anyhow::Result<Report> {
    let buckets = config.category_buckets()?;
    let catalog = ReferenceCatalog::load(&config.inputs.slo, &config.inputs.identity)?;

    let mut series = vec![SchedulerMetrics::ideal(&catalog)];
    let mut extraction = vec![];
    for scheduler in config.schedulers.iter() {
        let records = log_extractor::extract_scheduler(scheduler, &config.inputs.logs)?;
        info!(
            "Extracted {} samples for {} ({} jobs)",
            records.stats().matched,
            scheduler,
            records.samples().len()
        );

        series.push(SchedulerMetrics::aggregate(&records, &catalog));
        extraction.push(SchedulerExtraction {
            scheduler: scheduler.clone(),
            stats: records.stats(),
        });
    }
    aggregate::ideal_first(&mut series);

    let execution = PercentileReport::summarize(&series, Universe::ExecutionTime);
    let tail_latency = PercentileReport::summarize(&series, Universe::TailLatency);

    let distributions = series
        .iter()
        .map(|metrics| DistributionSeries::build(metrics, &config.display, &config.palette))
        .collect();

    let categories =
        distribution::categorize(&series, &buckets, catalog.identity(), &config.display);

    Ok(Report {
        series,
        extraction,
        execution,
        tail_latency,
        distributions,
        categories,
    })
}
