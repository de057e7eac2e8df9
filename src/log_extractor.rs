/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Turns scheduler log output into execution-time samples.
//!
//! Only lines of the form
//!
//! ```text
//! logs TIME:  fib<N> <started><unit> <completed><unit> Request# <index>
//! ```
//!
//! carry a sample. The marker may be preceded by anything (timestamps, prefixes) and anything may
//! follow the request index. Every other line is reported as [`LogLine::Unparsed`] and ignored by
//! the extractor. Only lines that carry the marker but fail to parse are counted, as `malformed`.

use crate::{
    catalog::JobId,
    duration::{DurationValue, Unit},
};
use anyhow::Context;
use serde::Serialize;
use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

const MARKER: &str = "logs TIME:";
const REQUEST_MARKER: &str = "Request#";

#[derive(Debug, Clone, PartialEq)]
pub struct LogSample {
    pub job: JobId,
    /// Offset at which the job started. Present in the log, not used for statistics.
    pub started_ms: f64,
    pub execution_ms: f64,
    pub request: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LogLine {
    Sample(LogSample),
    Unparsed,
}

/// Tokenizes a single log line.
pub fn parse_line(line: &str) -> LogLine {
    line.match_indices(MARKER)
        .find_map(|(idx, _)| parse_after_marker(&line[idx + MARKER.len()..]))
        .map(LogLine::Sample)
        .unwrap_or(LogLine::Unparsed)
}

fn parse_after_marker(rest: &str) -> Option<LogSample> {
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }

    let mut tokens = rest.split_whitespace();
    let job = tokens.next()?.parse::<JobId>().ok()?;
    let started_ms = parse_plain_duration(tokens.next()?)?;
    let execution_ms = parse_execution_duration(tokens.next()?)?;
    if tokens.next()? != REQUEST_MARKER {
        return None;
    }
    let request = leading_digits(tokens.next()?)?;

    Some(LogSample {
        job,
        started_ms,
        execution_ms,
        request,
    })
}

/// Splits `12.3ms` into `("12.3", "ms")`. The unit is everything after the last digit or dot.
fn split_unit(token: &str) -> Option<(&str, &str)> {
    let end = token.rfind(|c: char| c.is_ascii_digit() || c == '.')? + 1;
    let (value, unit) = token.split_at(end);
    if unit.is_empty() {
        return None;
    }
    Some((value, unit))
}

fn parse_plain_duration(token: &str) -> Option<f64> {
    let (value, unit) = split_unit(token)?;
    if value.contains('m') {
        return None;
    }
    parse_duration(value, unit)
}

fn parse_execution_duration(token: &str) -> Option<f64> {
    let (value, unit) = split_unit(token)?;
    parse_duration(value, unit)
}

fn parse_duration(value: &str, unit: &str) -> Option<f64> {
    // units outside µs/ms/s are a grammar miss here, never a conversion error
    Unit::try_from_suffix(unit).ok()?;
    DurationValue::parse(value, unit)
        .ok()
        .map(|d| d.as_millis())
}

fn leading_digits(token: &str) -> Option<u64> {
    let end = token
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(token.len());
    token[..end].parse::<u64>().ok()
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExtractionStats {
    pub files: usize,
    pub matched: usize,
    /// Lines with a `logs TIME:` marker that did not parse. Unrelated log output is not counted.
    pub malformed: usize,
}

/// Every execution-time sample observed for one scheduler, grouped by job.
#[derive(Debug, Clone)]
pub struct ExecutionRecords {
    scheduler: String,
    samples: BTreeMap<JobId, Vec<f64>>,
    stats: ExtractionStats,
}
impl ExecutionRecords {
    pub fn new(scheduler: &str) -> Self {
        Self {
            scheduler: scheduler.to_string(),
            samples: BTreeMap::new(),
            stats: ExtractionStats::default(),
        }
    }

    pub fn scheduler(&self) -> &str {
        &self.scheduler
    }

    pub fn samples(&self) -> &BTreeMap<JobId, Vec<f64>> {
        &self.samples
    }

    pub fn stats(&self) -> ExtractionStats {
        self.stats
    }

    pub fn push(&mut self, sample: &LogSample) {
        self.samples
            .entry(sample.job)
            .or_default()
            .push(sample.execution_ms);
    }

    pub fn ingest_line(&mut self, line: &str) {
        match parse_line(line) {
            LogLine::Sample(sample) => {
                self.push(&sample);
                self.stats.matched += 1;
            }
            LogLine::Unparsed if line.contains(MARKER) => self.stats.malformed += 1,
            LogLine::Unparsed => {}
        }
    }

    /// Reads every line from `reader`. Lines that are not valid UTF-8 are decoded lossily, which
    /// can only turn them into misses.
    pub fn ingest_reader<R: BufRead>(&mut self, reader: R) -> std::io::Result<()> {
        for line in reader.split(b'\n') {
            let line = line?;
            self.ingest_line(&String::from_utf8_lossy(&line));
        }
        Ok(())
    }

    pub fn ingest_file(&mut self, path: &Path) -> anyhow::Result<()> {
        let before = self.stats;
        let file = File::open(path)
            .with_context(|| format!("Unable to open scheduler log {}", path.display()))?;
        self.ingest_reader(BufReader::new(file))
            .with_context(|| format!("Error reading scheduler log {}", path.display()))?;
        self.stats.files += 1;

        debug!(
            "{}: {} samples, {} malformed timing lines",
            path.display(),
            self.stats.matched - before.matched,
            self.stats.malformed - before.malformed
        );
        Ok(())
    }
}

/// Path of a scheduler's log inside one result directory.
pub fn log_path(dir: &Path, scheduler: &str) -> PathBuf {
    dir.join(format!("{}.txt", scheduler))
}

/// Collects samples for `scheduler` from `<dir>/<scheduler>.txt` in every directory, in order.
/// A directory without a log for the scheduler contributes nothing.
pub fn extract_scheduler(scheduler: &str, log_dirs: &[PathBuf]) -> anyhow::Result<ExecutionRecords> {
    let mut records = ExecutionRecords::new(scheduler);
    for dir in log_dirs {
        let path = log_path(dir, scheduler);
        if !path.is_file() {
            warn!("No log for scheduler {} at {}", scheduler, path.display());
            continue;
        }
        records.ingest_file(&path)?;
    }
    Ok(records)
}
