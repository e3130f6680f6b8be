//! Completion estimates for pending jobs.
//!
//! Greedy list scheduling: running jobs go first, submitted jobs follow in
//! submission order, and each job lands on the lane with the least work so
//! far (lowest index on ties). The lane count is the number of running
//! jobs. This approximates how the external queue drains; nothing enforces
//! it.

use super::{Fleet, tolerate};
use crate::calculation::JobEnvironment;
use crate::domain::{BatchResult, BulkMode, CalculationStatus};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::SystemTime;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingJob {
    pub expected_seconds: f64,
    /// Time already spent by a running job; `None` for queued jobs.
    pub elapsed_seconds: Option<f64>,
}

impl PendingJob {
    fn remaining_seconds(&self) -> f64 {
        match self.elapsed_seconds {
            Some(elapsed) => (self.expected_seconds - elapsed).max(0.0),
            None => self.expected_seconds,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EtaEstimate {
    /// Position of the calculation in the fleet.
    pub index: usize,
    pub seconds: f64,
}

/// Offset from now at which each job in `queue` is expected to finish.
pub fn schedule_lanes(queue: &[PendingJob], lanes: usize) -> Vec<f64> {
    let mut totals = vec![0.0_f64; lanes.max(1)];
    queue
        .iter()
        .map(|job| {
            let mut lane = 0;
            for (index, total) in totals.iter().enumerate().skip(1) {
                if *total < totals[lane] {
                    lane = index;
                }
            }
            totals[lane] += job.remaining_seconds();
            totals[lane]
        })
        .collect()
}

#[derive(Debug, Default)]
struct DurationStats {
    by_identity: BTreeMap<String, (f64, usize)>,
    total: f64,
    count: usize,
}

impl DurationStats {
    fn record(&mut self, identity: Option<String>, seconds: f64) {
        if let Some(identity) = identity {
            let entry = self.by_identity.entry(identity).or_default();
            entry.0 += seconds;
            entry.1 += 1;
        }
        self.total += seconds;
        self.count += 1;
    }

    fn expected(&self, identity: Option<&str>) -> f64 {
        identity
            .and_then(|identity| self.by_identity.get(identity))
            .map(|(sum, count)| sum / *count as f64)
            .unwrap_or(self.total / self.count as f64)
    }
}

impl Fleet {
    /// Estimates completion offsets for running and submitted members and
    /// stores them on each calculation. Nothing is estimated without at
    /// least one completed and one pending job.
    pub fn estimate_completion(
        &mut self,
        env: &JobEnvironment,
        now: SystemTime,
        mode: BulkMode,
    ) -> BatchResult<Vec<EtaEstimate>> {
        let statuses = self.statuses(env, mode)?;
        let namer = env.namer();

        let mut stats = DurationStats::default();
        let mut running = Vec::new();
        let mut submitted = Vec::new();

        for (index, (calculation, status)) in self.calculations.iter().zip(&statuses).enumerate() {
            match status {
                Some(CalculationStatus::Completed) => match calculation.completed_duration(env) {
                    Ok(Some(seconds)) => stats.record(calculation.name(namer), seconds),
                    Ok(None) => {
                        debug!(directory = %calculation.directory_label(), "completed job reports no duration");
                    }
                    Err(error) => tolerate(mode, "estimate", calculation, error)?,
                },
                Some(CalculationStatus::Running) => {
                    let elapsed = calculation
                        .started_at(env)
                        .and_then(|started| now.duration_since(started).ok())
                        .map(|elapsed| elapsed.as_secs_f64())
                        .unwrap_or(0.0);
                    running.push((index, elapsed));
                }
                Some(CalculationStatus::Submitted) => {
                    submitted.push((index, calculation.submitted_at(env)));
                }
                _ => {}
            }
        }

        for calculation in &mut self.calculations {
            calculation.set_eta_seconds(None);
        }

        if stats.count == 0 || (running.is_empty() && submitted.is_empty()) {
            debug!(
                completed = stats.count,
                pending = running.len() + submitted.len(),
                "not enough history for an estimate"
            );
            return Ok(Vec::new());
        }

        submitted.sort_by_key(|(_, submitted_at)| (submitted_at.is_none(), *submitted_at));

        let order: Vec<usize> = running
            .iter()
            .map(|(index, _)| *index)
            .chain(submitted.iter().map(|(index, _)| *index))
            .collect();
        let queue: Vec<PendingJob> = running
            .iter()
            .map(|(index, elapsed)| (*index, Some(*elapsed)))
            .chain(submitted.iter().map(|(index, _)| (*index, None)))
            .map(|(index, elapsed_seconds)| {
                let identity = self.calculations[index].name(namer);
                PendingJob {
                    expected_seconds: stats.expected(identity.as_deref()),
                    elapsed_seconds,
                }
            })
            .collect();

        let offsets = schedule_lanes(&queue, running.len());
        let estimates: Vec<EtaEstimate> = order
            .into_iter()
            .zip(offsets)
            .map(|(index, seconds)| EtaEstimate { index, seconds })
            .collect();

        for estimate in &estimates {
            self.calculations[estimate.index].set_eta_seconds(Some(estimate.seconds));
        }
        debug!(
            lanes = running.len().max(1),
            estimated = estimates.len(),
            "estimated completion times"
        );
        Ok(estimates)
    }
}
