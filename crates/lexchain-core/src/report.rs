//! Result persistence and summary statistics.
//!
//! Results are stored as JSONL, one serialized [`ChainResult`] per line.
//! Instances use the same layout, one [`ChainInstance`] per line.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

use crate::schemas::{ChainInstance, ChainResult, StepStatus};

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid JSON on line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Write one result as a single JSON line.
pub fn write_result<W: Write>(result: &ChainResult, mut writer: W) -> Result<(), ReportError> {
    serde_json::to_writer(&mut writer, result)?;
    writer.write_all(b"\n")?;
    Ok(())
}

/// Write results to a JSONL file, creating parent directories.
///
/// Returns the number of results written.
pub fn write_results(results: &[ChainResult], path: impl AsRef<Path>) -> Result<usize, ReportError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut writer = BufWriter::new(File::create(path)?);
    for result in results {
        write_result(result, &mut writer)?;
    }
    writer.flush()?;

    tracing::info!(path = %path.display(), count = results.len(), "Wrote results");
    Ok(results.len())
}

fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, ReportError> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|source| ReportError::Parse {
            line: index + 1,
            source,
        })?;
        records.push(record);
    }

    Ok(records)
}

/// Read results from a JSONL file. Blank lines are skipped.
pub fn read_results(path: impl AsRef<Path>) -> Result<Vec<ChainResult>, ReportError> {
    read_jsonl(path.as_ref())
}

/// Read chain instances from a JSONL file. Blank lines are skipped.
pub fn read_instances(path: impl AsRef<Path>) -> Result<Vec<ChainInstance>, ReportError> {
    read_jsonl(path.as_ref())
}

/// Read a citation list, one citation per line.
///
/// Blank lines and lines starting with `#` are ignored.
pub fn read_reference_file(path: impl AsRef<Path>) -> Result<Vec<String>, ReportError> {
    let contents = fs::read_to_string(path)?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Per-step aggregate over a set of chain results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepStats {
    pub count: usize,
    pub ok_count: usize,
    pub skipped_coverage: usize,
    pub skipped_dependency: usize,
    pub total_score: f64,
    pub correct_count: usize,
    pub voided_count: usize,

    /// Mean score over OK results
    pub avg_score: f64,

    /// Fraction of OK results that were correct
    pub accuracy: f64,
}

/// Aggregate statistics over a set of chain results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChainSummary {
    pub total_instances: usize,
    pub voided_instances: usize,
    pub voided_rate: f64,
    pub step_stats: BTreeMap<String, StepStats>,
}

/// Compute summary statistics.
pub fn summarize_results(results: &[ChainResult]) -> ChainSummary {
    let mut step_stats: BTreeMap<String, StepStats> = BTreeMap::new();

    for chain in results {
        for (step_id, result) in &chain.step_results {
            let stats = step_stats.entry(step_id.clone()).or_default();
            stats.count += 1;

            match result.status() {
                StepStatus::Ok => {
                    stats.ok_count += 1;
                    stats.total_score += result.score();
                    if result.correct() {
                        stats.correct_count += 1;
                    }
                }
                StepStatus::SkippedCoverage => stats.skipped_coverage += 1,
                StepStatus::SkippedDependency => stats.skipped_dependency += 1,
            }

            if result.voided() {
                stats.voided_count += 1;
            }
        }
    }

    for stats in step_stats.values_mut() {
        if stats.ok_count > 0 {
            stats.avg_score = stats.total_score / stats.ok_count as f64;
            stats.accuracy = stats.correct_count as f64 / stats.ok_count as f64;
        }
    }

    let total_instances = results.len();
    let voided_instances = results.iter().filter(|r| r.voided).count();
    let voided_rate = if total_instances > 0 {
        voided_instances as f64 / total_instances as f64
    } else {
        0.0
    };

    ChainSummary {
        total_instances,
        voided_instances,
        voided_rate,
        step_stats,
    }
}

impl fmt::Display for ChainSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Instances: {}", self.total_instances)?;
        writeln!(
            f,
            "Voided:    {} ({:.1}%)",
            self.voided_instances,
            self.voided_rate * 100.0
        )?;
        writeln!(f)?;
        writeln!(
            f,
            "{:<10} {:>6} {:>6} {:>9} {:>9} {:>7} {:>9} {:>7}",
            "step", "count", "ok", "skip_cov", "skip_dep", "voided", "avg_score", "acc"
        )?;
        for (step_id, s) in &self.step_stats {
            writeln!(
                f,
                "{:<10} {:>6} {:>6} {:>9} {:>9} {:>7} {:>9.3} {:>6.1}%",
                step_id,
                s.count,
                s.ok_count,
                s.skipped_coverage,
                s.skipped_dependency,
                s.voided_count,
                s.avg_score,
                s.accuracy * 100.0
            )?;
        }
        Ok(())
    }
}
