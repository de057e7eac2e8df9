/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::{
    aggregate::SchedulerMetrics,
    distribution::{CategoryBreakdown, DistributionSeries},
    log_extractor::ExtractionStats,
    percentile::{self, PercentileReport},
};
use anyhow::Context;
use itertools::Itertools;
use serde::Serialize;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::info;

pub const CATEGORY_FILE: &str = "category_percentiles.txt";
pub const DISTRIBUTIONS_FILE: &str = "distributions.json";

#[derive(Debug, Clone, Serialize)]
pub struct SchedulerExtraction {
    pub scheduler: String,
    pub stats: ExtractionStats,
}

/// Everything a single run produces. Series are ordered with the ideal baseline first, followed by
/// the schedulers in configuration order.
#[derive(Debug)]
pub struct Report {
    pub series: Vec<SchedulerMetrics>,
    pub extraction: Vec<SchedulerExtraction>,
    pub execution: PercentileReport,
    pub tail_latency: PercentileReport,
    pub distributions: Vec<DistributionSeries>,
    pub categories: Vec<CategoryBreakdown>,
}

#[derive(Serialize)]
struct DistributionArtifact<'a> {
    schedulers: Vec<&'a str>,
    series: &'a [DistributionSeries],
    categories: &'a [CategoryBreakdown],
}

impl Report {
    pub fn series(&self, scheduler: &str) -> Option<&SchedulerMetrics> {
        self.series.iter().find(|s| s.scheduler() == scheduler)
    }

    pub fn scheduler_names(&self) -> Vec<&str> {
        self.series.iter().map(|s| s.scheduler()).collect()
    }

    /// One block per category: a `# name [start, end)` line followed by a tab-separated table.
    /// Schedulers without samples in a category show `--`.
    pub fn category_tsv(&self) -> String {
        self.categories
            .iter()
            .map(|breakdown| {
                let mut block = format!(
                    "# {} [{}, {})\n",
                    breakdown.bucket.name, breakdown.bucket.start, breakdown.bucket.end
                );
                block.push_str(&percentile::header_line(&percentile::CATEGORY));
                for series in breakdown.series.iter() {
                    let cells = match &series.percentiles {
                        Some(table) => table.values().map(|v| format!("{:.2}", v)).join("\t"),
                        None => vec!["--"; percentile::CATEGORY.len()].join("\t"),
                    };
                    block.push_str(&format!("{}\t{}\n", series.scheduler, cells));
                }
                block
            })
            .join("\n")
    }

    pub fn distributions_json(&self) -> anyhow::Result<String> {
        let artifact = DistributionArtifact {
            schedulers: self.scheduler_names(),
            series: &self.distributions,
            categories: &self.categories,
        };
        serde_json::to_string_pretty(&artifact).context("Error serialising distributions")
    }

    /// Writes every table and the distribution data into `dir`, creating it if needed.
    ///
    /// # Returns
    /// The paths written, in the order they were written.
    pub fn write_artifacts(&self, dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Unable to create output directory {}", dir.display()))?;

        let mut artifacts = vec![
            (dir.join(self.execution.universe.file_name()), self.execution.to_tsv()),
            (
                dir.join(self.tail_latency.universe.file_name()),
                self.tail_latency.to_tsv(),
            ),
        ];
        if !self.categories.is_empty() {
            artifacts.push((dir.join(CATEGORY_FILE), self.category_tsv()));
        }
        artifacts.push((dir.join(DISTRIBUTIONS_FILE), self.distributions_json()?));

        let mut written = vec![];
        for (path, contents) in artifacts {
            fs::write(&path, contents)
                .with_context(|| format!("Unable to write {}", path.display()))?;
            info!("Wrote {}", path.display());
            written.push(path);
        }

        Ok(written)
    }
}
