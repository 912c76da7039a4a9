use crate::engine::config::CalibrationConfig;
use crate::engine::error::EngineError;
use crate::engine::oracle::SolvationOracle;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::state::{CalibrationOutcome, CalibrationPoint, CalibrationResult};
use std::cmp::Ordering;
use tracing::{debug, info, instrument, warn};

/// Distance step offsets in query order: `0, +1, -1, +2, -2, ..., +attempts, -attempts`.
pub fn distance_offsets(attempts: usize) -> Vec<i64> {
    let mut offsets = Vec::with_capacity(2 * attempts + 1);
    offsets.push(0);
    for k in 1..=attempts as i64 {
        offsets.push(k);
        offsets.push(-k);
    }
    offsets
}

/// The buffer distances a search will try, in query order.
pub fn candidate_distances(config: &CalibrationConfig) -> Vec<f64> {
    distance_offsets(config.attempts)
        .into_iter()
        .map(|offset| config.distance_at(offset))
        .collect()
}

/// Searches the (distance, closeness) grid for the point whose solvent count best
/// matches `config.target_count`.
///
/// For every candidate distance the closeness is walked from its start value: up by one
/// step while the oracle reports too many molecules, down while it reports too few. The
/// walk for a distance ends on an exact match or on the first surplus that follows a
/// shortfall, i.e. once the target has been straddled. Across distances the smallest
/// surplus wins, ties keeping the earlier distance, and an exact match ends the search.
///
/// # Arguments
///
/// * `oracle` - The solvation oracle; queried once per grid point visited.
/// * `config` - Target count and grid parameters.
/// * `reporter` - Receives one [`Progress::OracleCall`] per query and one task increment
///   per distance.
///
/// A distance whose walk exhausts `max_inner_iterations`, or drives closeness to zero,
/// without straddling the target is logged and skipped.
///
/// # Errors
///
/// Returns [`EngineError::Oracle`] as soon as the oracle fails and
/// [`EngineError::CalibrationUnconverged`], naming the first distance that failed, when
/// no candidate distance produced a result.
#[instrument(skip_all, name = "calibration_task", fields(target = config.target_count))]
pub fn run<O>(
    oracle: &mut O,
    config: &CalibrationConfig,
    reporter: &ProgressReporter,
) -> Result<CalibrationOutcome, EngineError>
where
    O: SolvationOracle + ?Sized,
{
    info!(
        initial_distance = config.initial_distance,
        attempts = config.attempts,
        "Starting solvation calibration search."
    );

    let offsets = distance_offsets(config.attempts);
    reporter.report(Progress::TaskStart {
        total_steps: offsets.len() as u64,
    });

    let mut history = Vec::new();
    let mut best: Option<CalibrationResult> = None;
    let mut first_failure: Option<EngineError> = None;

    for offset in offsets {
        let distance = config.distance_at(offset);
        let walk = search_closeness(oracle, config, distance, &mut history, reporter)?;
        reporter.report(Progress::TaskIncrement);

        let result = match walk {
            ClosenessWalk::Settled(result) => result,
            ClosenessWalk::Unconverged { calls } => {
                first_failure.get_or_insert(EngineError::CalibrationUnconverged {
                    distance,
                    iterations: calls,
                });
                continue;
            }
        };
        if best.is_none_or(|current| result.signed_diff < current.signed_diff) {
            best = Some(result);
        }
        if result.is_exact() {
            break;
        }
    }
    reporter.report(Progress::TaskFinish);

    let Some(best) = best else {
        return Err(first_failure.unwrap_or(EngineError::CalibrationUnconverged {
            distance: config.initial_distance,
            iterations: 0,
        }));
    };

    info!(
        distance = best.point.distance,
        closeness = best.point.closeness,
        count = best.observed_count,
        surplus = best.surplus(),
        oracle_calls = history.len(),
        "Calibration search complete."
    );

    Ok(CalibrationOutcome {
        target_count: config.target_count,
        best,
        attempts: history,
    })
}

enum ClosenessWalk {
    Settled(CalibrationResult),
    Unconverged { calls: usize },
}

fn search_closeness<O>(
    oracle: &mut O,
    config: &CalibrationConfig,
    distance: f64,
    history: &mut Vec<CalibrationResult>,
    reporter: &ProgressReporter,
) -> Result<ClosenessWalk, EngineError>
where
    O: SolvationOracle + ?Sized,
{
    let mut offset: i64 = 0;
    let mut last_diff: Option<i64> = None;
    let mut calls = 0usize;

    while calls < config.max_inner_iterations {
        let closeness = config.closeness_at(offset);
        if closeness <= 0.0 {
            break;
        }
        let point = CalibrationPoint {
            distance,
            closeness,
        };
        let count = oracle.solvate(point)?;
        calls += 1;

        let result = CalibrationResult::new(point, count, config.target_count);
        history.push(result);
        reporter.report(Progress::OracleCall {
            distance,
            closeness,
            count,
        });
        debug!(distance, closeness, count, diff = result.signed_diff, "Oracle answered.");

        match result.signed_diff.cmp(&0) {
            Ordering::Equal => return Ok(ClosenessWalk::Settled(result)),
            Ordering::Greater if last_diff.is_some_and(|diff| diff < 0) => {
                return Ok(ClosenessWalk::Settled(result));
            }
            Ordering::Greater => offset += 1,
            Ordering::Less => offset -= 1,
        }
        last_diff = Some(result.signed_diff);
    }

    warn!(
        distance,
        calls, "Closeness search ended without straddling the target count; skipping distance."
    );
    Ok(ClosenessWalk::Unconverged { calls })
}
