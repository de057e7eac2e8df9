/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Terminal output for a finished report.

use crate::{
    config::Palette,
    distribution::{DistributionSeries, SampleCurve},
    percentile::PercentileReport,
    report::Report,
};
use colored::*;
use itertools::{Itertools, MinMaxResult};
use term_table::{row::Row, table_cell::*, Table, TableStyle};
use textplots::{Chart, Plot, Shape};

fn scheduler_label(scheduler: &str, palette: &Palette) -> ColoredString {
    let label = scheduler.to_uppercase();
    match palette.rgb_for(scheduler) {
        Some((r, g, b)) => label.truecolor(r, g, b),
        None => label.normal(),
    }
}

/// Renders a percentile report as a rounded table, one row per scheduler.
pub fn percentile_table(report: &PercentileReport, palette: &Palette) -> String {
    let precision = report.universe.precision();

    let header = Row::new(
        std::iter::once(TableCell::builder("Scheduler".bold()).build())
            .chain(
                report
                    .percentiles
                    .iter()
                    .map(|p| TableCell::builder(p.label.bold()).build()),
            )
            .collect_vec(),
    );

    let rows = report.rows.iter().map(|row| {
        Row::new(
            std::iter::once(TableCell::new(scheduler_label(&row.scheduler, palette)))
                .chain(
                    row.table
                        .values()
                        .map(|v| TableCell::new(format!("{:.*}", precision, v))),
                )
                .collect_vec(),
        )
    });

    Table::builder()
        .rows(std::iter::once(header).chain(rows).collect_vec())
        .style(TableStyle::rounded())
        .build()
        .render()
}

pub fn print_summary(report: &Report, palette: &Palette) {
    println!("\n{}", " Summary ".reversed().green());

    for extraction in report.extraction.iter() {
        let stats = extraction.stats;
        let line = format!(
            "{}: {} samples from {} file(s), {} malformed timing lines",
            extraction.scheduler, stats.matched, stats.files, stats.malformed
        );
        if stats.matched == 0 {
            println!("{}", line.yellow());
        } else {
            println!("{}", line.bright_black());
        }
    }

    for percentiles in [&report.execution, &report.tail_latency] {
        println!("\n{}:", percentiles.universe.title().green());
        println!("{}", percentile_table(percentiles, palette));
    }
}

/// Shared log10 x-range across every non-empty curve, so charts line up.
fn log_range<'a>(curves: impl Iterator<Item = &'a SampleCurve>) -> Option<(f32, f32)> {
    let bounds = curves
        .flat_map(|c| [c.curve.x.first(), c.curve.x.last()])
        .flatten()
        .map(|x| x.log10() as f32)
        .minmax();

    match bounds {
        MinMaxResult::MinMax(lo, hi) => Some((lo, hi)),
        _ => None,
    }
}

fn plot_curves(
    title: &str,
    series: &[DistributionSeries],
    palette: &Palette,
    pick: fn(&DistributionSeries) -> &SampleCurve,
) {
    let Some((xmin, xmax)) = log_range(series.iter().map(pick)) else {
        return;
    };

    println!("\n{} {}", title.green(), "(x: log10)".bright_black());
    for s in series {
        let curve = pick(s);
        if curve.curve.x.is_empty() {
            continue;
        }

        let points = curve
            .curve
            .points()
            .into_iter()
            .map(|(x, y)| (x.log10(), y))
            .collect_vec();

        println!("{}", scheduler_label(&s.scheduler, palette).bold());
        Chart::new(120, 40, xmin, xmax)
            .lineplot(&Shape::Steps(&points))
            .display();
    }
}

/// Draws execution-time and tail-latency ECDFs for each scheduler in the terminal.
pub fn plot_distributions(report: &Report, palette: &Palette) {
    plot_curves(
        "CDF of execution time (ms)",
        &report.distributions,
        palette,
        |s| &s.execution,
    );
    plot_curves(
        "CDF of tail latency ((turnaround / SLO) - 1)",
        &report.distributions,
        palette,
        |s| &s.tail_latency,
    );
}
