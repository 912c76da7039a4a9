use serde::Serialize;

/// A `solvateBox` parameter pair: buffer distance (Angstroms) and closeness.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CalibrationPoint {
    pub distance: f64,
    pub closeness: f64,
}

/// One oracle answer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CalibrationResult {
    pub point: CalibrationPoint,
    pub observed_count: usize,
    /// `observed_count - target_count`.
    pub signed_diff: i64,
}

impl CalibrationResult {
    pub fn new(point: CalibrationPoint, observed_count: usize, target_count: usize) -> Self {
        Self {
            point,
            observed_count,
            signed_diff: observed_count as i64 - target_count as i64,
        }
    }

    pub fn is_exact(&self) -> bool {
        self.signed_diff == 0
    }

    /// Number of surplus solvent molecules placed by this point.
    pub fn surplus(&self) -> usize {
        self.signed_diff.max(0) as usize
    }
}

/// The best point found by a calibration search together with every oracle answer
/// that led to it, in query order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationOutcome {
    pub target_count: usize,
    pub best: CalibrationResult,
    pub attempts: Vec<CalibrationResult>,
}

impl CalibrationOutcome {
    pub fn is_exact(&self) -> bool {
        self.best.is_exact()
    }

    /// Residue numbers of the surplus solvent molecules to delete from the best build.
    ///
    /// The build tool numbers solvent residues after the `solute_residues` residues of
    /// the solute, so the last `surplus` of them are `solute + count - surplus + k` for
    /// `k` in `1..=surplus`.
    pub fn residues_to_remove(&self, solute_residues: usize) -> Vec<usize> {
        let surplus = self.best.surplus();
        let first = solute_residues + self.best.observed_count - surplus;
        (1..=surplus).map(|k| first + k).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(observed: usize, target: usize) -> CalibrationOutcome {
        let best = CalibrationResult::new(
            CalibrationPoint {
                distance: 10.0,
                closeness: 1.0,
            },
            observed,
            target,
        );
        CalibrationOutcome {
            target_count: target,
            best,
            attempts: vec![best],
        }
    }

    #[test]
    fn signed_diff_is_observed_minus_target() {
        assert_eq!(outcome(1498, 1500).best.signed_diff, -2);
        assert_eq!(outcome(1502, 1500).best.signed_diff, 2);
    }

    #[test]
    fn residues_to_remove_lists_last_surplus_solvent_residues() {
        let outcome = outcome(1502, 1500);
        assert_eq!(outcome.residues_to_remove(120), vec![1621, 1622]);
    }

    #[test]
    fn exact_outcome_removes_nothing() {
        let outcome = outcome(1500, 1500);
        assert!(outcome.is_exact());
        assert!(outcome.residues_to_remove(120).is_empty());
    }
}
