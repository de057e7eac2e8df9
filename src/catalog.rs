/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use anyhow::Context;
use serde::{Serialize, Serializer};
use std::{collections::BTreeMap, fmt, fs, path::Path, str::FromStr};
use tracing::{debug, info};

/// Identifies a job across the identity table and scheduler logs.
///
/// Jobs are written as `fib<digits>` everywhere but keyed by the numeric part, so `fib007` and
/// `fib7` refer to the same job. This is looser than matching the literal `fib{n}` string: a
/// zero-padded identity entry resolves log lines that print the unpadded id, where an exact
/// string lookup would leave that job without an SLO.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobId(pub u64);

impl FromStr for JobId {
    type Err = anyhow::Error;

    fn from_str(token: &str) -> anyhow::Result<JobId> {
        let digits = token
            .strip_prefix("fib")
            .filter(|d| !d.is_empty() && d.chars().all(|c| c.is_ascii_digit()))
            .with_context(|| format!("Job id should look like fib<digits>, got {}", token))?;

        digits
            .parse::<u64>()
            .map(JobId)
            .with_context(|| format!("Job id out of range: {}", token))
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fib{}", self.0)
    }
}

impl Serialize for JobId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Complexity -> SLO in milliseconds.
#[derive(Debug, Default, Clone)]
pub struct SloTable {
    entries: BTreeMap<u32, f64>,
}
impl SloTable {
    /// Each line must hold exactly `<complexity> <slo_ms>`. Anything else is skipped. A repeated
    /// complexity keeps the last value seen.
    pub fn parse(text: &str) -> Self {
        let mut entries = BTreeMap::new();
        for line in text.lines() {
            let parts = line.split_whitespace().collect::<Vec<_>>();
            let [complexity, slo_ms] = parts.as_slice() else {
                continue;
            };

            let complexity = complexity.parse::<u32>().ok().filter(|c| *c > 0);
            let slo_ms = slo_ms
                .parse::<f64>()
                .ok()
                .filter(|slo| slo.is_finite() && *slo > 0.0);
            if let (Some(complexity), Some(slo_ms)) = (complexity, slo_ms) {
                entries.insert(complexity, slo_ms);
            }
        }

        Self { entries }
    }

    pub fn get(&self, complexity: u32) -> Option<f64> {
        self.entries.get(&complexity).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.entries.iter().map(|(c, slo)| (*c, *slo))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Job id -> complexity, read from the workload file the schedulers were driven with.
#[derive(Debug, Default, Clone)]
pub struct JobIdentity {
    entries: BTreeMap<JobId, u32>,
}
impl JobIdentity {
    /// Lines need at least three fields: the job id first and the complexity third. Trailing
    /// fields are ignored.
    pub fn parse(text: &str) -> Self {
        let mut entries = BTreeMap::new();
        for line in text.lines() {
            let parts = line.split_whitespace().collect::<Vec<_>>();
            if parts.len() < 3 {
                continue;
            }

            let job = parts[0].parse::<JobId>();
            let complexity = parts[2].parse::<u32>().ok().filter(|c| *c > 0);
            match (job, complexity) {
                (Ok(job), Some(complexity)) => {
                    entries.insert(job, complexity);
                }
                (Err(err), _) => debug!("Skipping identity line: {}", err),
                _ => {}
            }
        }

        Self { entries }
    }

    pub fn complexity_of(&self, job: JobId) -> Option<u32> {
        self.entries.get(&job).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (JobId, u32)> + '_ {
        self.entries.iter().map(|(job, c)| (*job, *c))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The two reference tables every scheduler is measured against. Read-only once loaded.
#[derive(Debug, Default, Clone)]
pub struct ReferenceCatalog {
    slo: SloTable,
    identity: JobIdentity,
}
impl ReferenceCatalog {
    pub fn new(slo: SloTable, identity: JobIdentity) -> Self {
        Self { slo, identity }
    }

    /// Loads both tables. Either file being unreadable fails the whole run.
    pub fn load(slo_path: &Path, identity_path: &Path) -> anyhow::Result<Self> {
        let slo_text = fs::read_to_string(slo_path)
            .with_context(|| format!("Unable to read SLO table {}", slo_path.display()))?;
        let identity_text = fs::read_to_string(identity_path).with_context(|| {
            format!(
                "Unable to read job identity table {}",
                identity_path.display()
            )
        })?;

        let catalog = Self::new(SloTable::parse(&slo_text), JobIdentity::parse(&identity_text));
        info!(
            "Loaded {} SLO entries and {} job identities",
            catalog.slo.len(),
            catalog.identity.len()
        );

        Ok(catalog)
    }

    pub fn slo(&self) -> &SloTable {
        &self.slo
    }

    pub fn identity(&self) -> &JobIdentity {
        &self.identity
    }

    pub fn complexity_of(&self, job: JobId) -> Option<u32> {
        self.identity.complexity_of(job)
    }

    /// Resolves job -> complexity -> SLO. `None` if either hop is missing.
    pub fn slo_for(&self, job: JobId) -> Option<f64> {
        self.complexity_of(job).and_then(|c| self.slo.get(c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_ids_are_keyed_by_number() -> anyhow::Result<()> {
        assert_eq!("fib7".parse::<JobId>()?, JobId(7));
        assert_eq!("fib007".parse::<JobId>()?, JobId(7));
        assert_eq!(JobId(39).to_string(), "fib39");

        assert!("fib".parse::<JobId>().is_err());
        assert!("fib_1".parse::<JobId>().is_err());
        assert!("job7".parse::<JobId>().is_err());
        Ok(())
    }

    #[test]
    fn padded_identity_entries_resolve_unpadded_log_ids() -> anyhow::Result<()> {
        let catalog = ReferenceCatalog::new(
            SloTable::parse("30 500.0\n"),
            JobIdentity::parse("fib007 1000 30\n"),
        );
        let from_log = "fib7".parse::<JobId>()?;
        assert_eq!(catalog.slo_for(from_log), Some(500.0));
        Ok(())
    }

    #[test]
    fn slo_table_skips_malformed_lines() {
        let table = SloTable::parse("30 500.0\n31 800\nnot a line\n32\n33 abc\n34 1.0 extra\n\n");
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(30), Some(500.0));
        assert_eq!(table.get(31), Some(800.0));
        assert_eq!(table.get(33), None);
        assert_eq!(table.get(34), None);
    }

    #[test]
    fn slo_table_last_write_wins() {
        let table = SloTable::parse("30 500.0\n30 650.0\n");
        assert_eq!(table.get(30), Some(650.0));
    }

    #[test]
    fn identity_needs_three_fields() {
        let identity = JobIdentity::parse(
            "fib1 fib.py 21 0 1\nfib2 22\nfib3 1000 30\nfib4 fib.py abc\nfoo x 25\n",
        );
        assert_eq!(identity.len(), 2);
        assert_eq!(identity.complexity_of(JobId(1)), Some(21));
        assert_eq!(identity.complexity_of(JobId(2)), None);
        assert_eq!(identity.complexity_of(JobId(3)), Some(30));
    }

    #[test]
    fn resolves_slo_through_complexity() {
        let catalog = ReferenceCatalog::new(
            SloTable::parse("30 500.0\n"),
            JobIdentity::parse("fib7 1000 30\nfib8 1000 31\n"),
        );
        assert_eq!(catalog.slo_for(JobId(7)), Some(500.0));
        assert_eq!(catalog.slo_for(JobId(8)), None);
        assert_eq!(catalog.slo_for(JobId(9)), None);
    }

    #[test]
    fn missing_reference_file_is_fatal() {
        let res = ReferenceCatalog::load(
            Path::new("./fixtures/does_not_exist.txt"),
            Path::new("./fixtures/workload/identity.txt"),
        );
        assert!(res.is_err());
    }
}
