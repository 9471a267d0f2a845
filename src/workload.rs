//! Randomized stress run over an INT index.
//!
//! Inserts, deletes and searches random keys, checking every answer against a
//! `BTreeMap` and validating the tree structure as it goes.
use crate::config::Config;
use crate::errors::Error;
use crate::index::IndexManager;
use crate::storage::{ColumnType, ColumnValue, Offset};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::ops::RangeBounds;
use std::time::{Duration, Instant};
use tracing::{debug, info};

const INDEX: &str = "workload";
const KEY_MIN: i32 = -1000;
const KEY_MAX: i32 = 1000;
const CHECK_EVERY: usize = 1000;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct WorkloadReport {
    pub inserted: usize,
    pub duplicates: usize,
    pub deleted: usize,
    pub missing: usize,
    pub searches: usize,
    pub keys: usize,
    pub height: usize,
    pub nodes: usize,
    pub elapsed: Duration,
}

impl std::fmt::Display for WorkloadReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "inserted {} (duplicates {}), deleted {} (missing {}), searched {}; \
             {} keys, height {}, {} nodes ({:.2} sec)",
            self.inserted,
            self.duplicates,
            self.deleted,
            self.missing,
            self.searches,
            self.keys,
            self.height,
            self.nodes,
            self.elapsed.as_secs_f64()
        )
    }
}

struct Workload {
    indexes: IndexManager,
    model: BTreeMap<i32, Offset>,
    rng: StdRng,
    report: WorkloadReport,
}

/// Runs `ops` inserts, then `ops` deletes, then `ops` searches.
///
/// # Errors
/// `Error::InnerInvariant` when the index disagrees with the model or fails
/// validation; any other index error is passed through.
pub fn run(config: &Config, ops: usize, seed: u64) -> Result<WorkloadReport, Error> {
    let start = Instant::now();
    let mut indexes = IndexManager::new(Config {
        persist: false,
        ..config.clone()
    });
    indexes.create_index(INDEX, ColumnType::INT)?;
    info!(ops, seed, "Starting workload...");

    let mut w = Workload {
        indexes,
        model: BTreeMap::new(),
        rng: StdRng::seed_from_u64(seed),
        report: WorkloadReport::default(),
    };
    for i in 0..ops {
        w.insert(i as Offset)?;
        w.checkpoint(i)?;
    }
    w.indexes.check(INDEX)?;
    debug!(keys = w.model.len(), "Insert phase done.");

    for i in 0..ops {
        w.delete()?;
        w.checkpoint(i)?;
    }
    w.indexes.check(INDEX)?;
    debug!(keys = w.model.len(), "Delete phase done.");

    for _ in 0..ops {
        w.search()?;
    }

    let mut report = w.report;
    if let Some(info) = w.indexes.describe().into_iter().next() {
        report.keys = info.keys;
        report.height = info.height;
        report.nodes = info.nodes;
    }
    report.elapsed = start.elapsed();
    info!(%report, "Finished workload.");
    Ok(report)
}

fn mismatch(what: &str, key: i32) -> Error {
    err!(InnerInvariant, "Index disagrees with model on {} of key {}.", what, key)
}

impl Workload {
    fn key(&mut self) -> i32 {
        self.rng.gen_range(KEY_MIN..KEY_MAX)
    }

    fn checkpoint(&self, i: usize) -> Result<(), Error> {
        if (i + 1) % CHECK_EVERY == 0 {
            self.indexes.check(INDEX)?;
        }
        Ok(())
    }

    fn insert(&mut self, offset: Offset) -> Result<(), Error> {
        let key = self.key();
        match self.indexes.insert_index(INDEX, &ColumnValue::Int(key), offset) {
            Ok(()) if !self.model.contains_key(&key) => {
                self.model.insert(key, offset);
                self.report.inserted += 1;
            }
            Err(Error::DuplicateKey(_)) if self.model.contains_key(&key) => {
                self.report.duplicates += 1;
            }
            Ok(()) | Err(Error::DuplicateKey(_)) => return Err(mismatch("insert", key)),
            Err(e) => return Err(e),
        }
        Ok(())
    }

    fn delete(&mut self) -> Result<(), Error> {
        let key = self.key();
        match self.indexes.delete_index(INDEX, &ColumnValue::Int(key)) {
            Ok(offset) => {
                if self.model.remove(&key) != Some(offset) {
                    return Err(mismatch("delete", key));
                }
                self.report.deleted += 1;
            }
            Err(Error::KeyNotExist(_)) | Err(Error::InnerInvariant(_))
                if !self.model.contains_key(&key) =>
            {
                self.report.missing += 1;
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }

    fn search(&mut self) -> Result<(), Error> {
        let a = self.key();
        let b = self.key();
        let (lo, hi) = (a.min(b), a.max(b));
        self.report.searches += 1;
        let agrees = match self.rng.gen_range(0..4) {
            0 => {
                let found = self.indexes.search_equal(INDEX, &ColumnValue::Int(a))?;
                found == self.model.get(&a).copied()
            }
            1 => {
                let found = self.indexes.search_between(
                    INDEX,
                    &ColumnValue::Int(a),
                    &ColumnValue::Int(b),
                )?;
                found == self.expected(lo..=hi)
            }
            2 => {
                let found = self.indexes.search_smaller(INDEX, &ColumnValue::Int(a))?;
                found == self.expected(..=a)
            }
            _ => {
                let found = self.indexes.search_greater(INDEX, &ColumnValue::Int(a))?;
                found == self.expected(a..)
            }
        };
        if agrees {
            Ok(())
        } else {
            Err(mismatch("search", a))
        }
    }

    fn expected<R: RangeBounds<i32>>(&self, range: R) -> Vec<Offset> {
        let mut offsets: Vec<Offset> = self.model.range(range).map(|(_, v)| *v).collect();
        offsets.sort_unstable();
        offsets.dedup();
        offsets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_degree_workload() {
        let config = Config {
            degree: Some(3),
            ..Config::in_memory()
        };
        let report = run(&config, 3000, 7).unwrap();
        assert_eq!(report.inserted + report.duplicates, 3000);
        assert_eq!(report.deleted + report.missing, 3000);
        assert_eq!(report.searches, 3000);
        assert_eq!(report.keys, report.inserted - report.deleted);
        assert!(report.duplicates > 0);
    }

    #[test]
    fn test_page_sized_workload() {
        let report = run(&Config::in_memory(), 2000, 42).unwrap();
        assert!(report.keys > 0);
        assert!(report.height >= 1);
    }

    #[test]
    fn test_seed_is_reproducible() {
        let config = Config {
            degree: Some(5),
            ..Config::in_memory()
        };
        let first = run(&config, 500, 1).unwrap();
        let second = run(&config, 500, 1).unwrap();
        assert_eq!(
            (first.inserted, first.deleted, first.keys, first.height),
            (second.inserted, second.deleted, second.keys, second.height)
        );
    }
}
