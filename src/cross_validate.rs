use tracing::warn;

use crate::eval::{order_error, Predictor};
use crate::game::GameRecord;

/// A named rating system the cross-validator can train from scratch on a
/// fold's training games.
pub struct System {
    name: String,
    train: Box<dyn Fn(&[GameRecord]) -> Box<dyn Predictor>>,
}

impl System {
    pub fn new(
        name: impl Into<String>,
        train: impl Fn(&[GameRecord]) -> Box<dyn Predictor> + 'static,
    ) -> System {
        System {
            name: name.into(),
            train: Box::new(train),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Per-system fold errors with their summary statistics.
#[derive(Debug, Clone)]
pub struct SystemSummary {
    pub name: String,
    pub fold_errors: Vec<f64>,
}

impl SystemSummary {
    pub fn mean(&self) -> f64 {
        mean(&self.fold_errors)
    }

    /// Sample standard deviation; `0.0` with fewer than two folds.
    pub fn stdev(&self) -> f64 {
        stdev(&self.fold_errors)
    }
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn stdev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean(values);
    let variance = values
        .iter()
        .map(|value| (value - mean) * (value - mean))
        .sum::<f64>()
        / (values.len() - 1) as f64;
    variance.sqrt()
}

pub fn cross_validate(folds: &[Vec<GameRecord>], systems: &[System]) -> Vec<SystemSummary> {
    cross_validate_with(folds, systems, |_, _, _| {})
}

/// Score every system against every fold.
///
/// Each fold in turn is the held-out test set; every system is trained fresh
/// on the concatenation of the remaining folds (sorted by game id, so the
/// order-dependent systems see a deterministic sequence) and scored with the
/// order-error metric on the held-out fold. `progress` is invoked after each
/// `(fold, system)` score with the 1-based fold number, the system name, and
/// the fold error.
pub fn cross_validate_with(
    folds: &[Vec<GameRecord>],
    systems: &[System],
    mut progress: impl FnMut(usize, &str, f64),
) -> Vec<SystemSummary> {
    if let (Some(largest), Some(smallest)) = (
        folds.iter().map(Vec::len).max(),
        folds.iter().map(Vec::len).min(),
    ) {
        if largest - smallest > 1 {
            warn!(
                largest,
                smallest,
                "fold sizes vary by {} games",
                largest - smallest
            );
        }
    }

    let mut summaries: Vec<SystemSummary> = systems
        .iter()
        .map(|system| SystemSummary {
            name: system.name.clone(),
            fold_errors: Vec::with_capacity(folds.len()),
        })
        .collect();

    for (test_index, test) in folds.iter().enumerate() {
        let mut training: Vec<GameRecord> = folds
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != test_index)
            .flat_map(|(_, fold)| fold.iter().cloned())
            .collect();
        training.sort_by_key(GameRecord::id);

        for (system, summary) in systems.iter().zip(&mut summaries) {
            let ratings = (system.train)(&training);
            let error = order_error(test, ratings.as_ref(), None).error_rate();
            summary.fold_errors.push(error);
            progress(test_index + 1, &system.name, error);
        }
    }

    summaries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{PlayerId, PlayerIds, Rank};
    use crate::plackett_luce::{PlConfig, PlEstimator};
    use crate::weng_lin::{UpdateRule, WengLin};

    /// Five equal folds of 100 games over four players, with enough upsets to
    /// keep every training corpus strongly connected.
    fn folds(players: &mut PlayerIds) -> Vec<Vec<GameRecord>> {
        let ids: Vec<PlayerId> = (0..4)
            .map(|i| players.get_or_insert(&format!("p{i}")))
            .collect();
        let mut id = 0u64;
        (0..5)
            .map(|_| {
                (0..100)
                    .map(|_| {
                        id += 1;
                        // Rotate the winner so nobody is undefeated.
                        let offset = (id % 4) as usize;
                        let placements = (0..4)
                            .map(|slot| (ids[(slot + offset) % 4], Rank(slot as u32 + 1)))
                            .collect();
                        GameRecord::new(id, placements)
                    })
                    .collect()
            })
            .collect()
    }

    fn registry() -> Vec<System> {
        vec![
            System::new("plackett-luce", |games| {
                Box::new(PlEstimator::new(PlConfig::default()).estimate(games))
            }),
            System::new("weng-lin-bt", |games| {
                let weng_lin = WengLin::new(UpdateRule::BradleyTerry);
                let mut ratings = weng_lin.new_table();
                weng_lin.rate(&mut ratings, games);
                Box::new(ratings)
            }),
        ]
    }

    #[test]
    fn one_summary_per_system_with_one_error_per_fold() {
        let mut players = PlayerIds::default();
        let folds = folds(&mut players);
        let max = folds.iter().map(Vec::len).max().unwrap();
        let min = folds.iter().map(Vec::len).min().unwrap();
        assert!(max - min <= 1);

        let summaries = cross_validate(&folds, &registry());
        assert_eq!(summaries.len(), 2);
        for summary in &summaries {
            assert_eq!(summary.fold_errors.len(), 5);
            assert!(summary.mean().is_finite());
            assert!(summary.stdev().is_finite());
            assert!(summary.mean() >= 0.0 && summary.mean() <= 1.0);
        }
    }

    #[test]
    fn progress_reports_every_fold_system_pair() {
        let mut players = PlayerIds::default();
        let folds = folds(&mut players);
        let mut seen = Vec::new();
        cross_validate_with(&folds, &registry(), |fold, name, error| {
            seen.push((fold, name.to_string(), error));
        });
        assert_eq!(seen.len(), 10);
        assert_eq!(seen[0].0, 1);
        assert_eq!(seen[9].0, 5);
    }

    #[test]
    fn sample_statistics_match_hand_values() {
        let summary = SystemSummary {
            name: "x".into(),
            fold_errors: vec![0.1, 0.2, 0.3],
        };
        assert!((summary.mean() - 0.2).abs() < 1e-12);
        assert!((summary.stdev() - 0.1).abs() < 1e-12);
    }
}
