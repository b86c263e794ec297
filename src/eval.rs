use rustc_hash::FxHashSet;

use crate::game::{GameRecord, PlayerId, Rank};
use crate::plackett_luce::PlRatings;
use crate::weng_lin::WlRatings;

/// Prediction capabilities a rating table carries with it.
///
/// Every table knows up front how to turn itself into a win probability and a
/// decisive-order comparison; the evaluator never inspects the table's
/// representation.
pub trait Predictor {
    /// Whether the table can score this player at all. Pairs touching an
    /// unknown player are counted as missed, never scored.
    fn contains(&self, player: PlayerId) -> bool;

    /// Probability that `a` finishes ahead of `b`. Only called for players
    /// the table contains.
    fn win_probability(&self, a: PlayerId, b: PlayerId) -> f64;

    /// Decisive-order predicate: does the table place `a` strictly ahead of
    /// `b`? Indecision shows up as answering the same in both directions.
    fn ahead(&self, a: PlayerId, b: PlayerId) -> bool;
}

impl Predictor for PlRatings {
    fn contains(&self, player: PlayerId) -> bool {
        self.gamma(player).is_some()
    }

    fn win_probability(&self, a: PlayerId, b: PlayerId) -> f64 {
        let ga = self.gamma(a).unwrap_or(0.0);
        let gb = self.gamma(b).unwrap_or(0.0);
        ga / (ga + gb)
    }

    fn ahead(&self, a: PlayerId, b: PlayerId) -> bool {
        self.gamma(a) > self.gamma(b)
    }
}

impl Predictor for WlRatings {
    fn contains(&self, player: PlayerId) -> bool {
        self.rating(player).is_some()
    }

    /// Logistic link on the mean difference, scaled by the pair's combined
    /// uncertainty.
    fn win_probability(&self, a: PlayerId, b: PlayerId) -> f64 {
        let (Some(ra), Some(rb)) = (self.rating(a), self.rating(b)) else {
            return 0.5;
        };
        let beta_sq = self.beta() * self.beta();
        let ciq = (ra.sigma * ra.sigma + rb.sigma * rb.sigma + 2.0 * beta_sq).sqrt();
        1.0 / (1.0 + ((rb.mu - ra.mu) / ciq).exp())
    }

    fn ahead(&self, a: PlayerId, b: PlayerId) -> bool {
        match (self.rating(a), self.rating(b)) {
            (Some(ra), Some(rb)) => ra.conservative_score() > rb.conservative_score(),
            _ => false,
        }
    }
}

/// Probability-calibration error over scored pairs.
#[derive(Debug, Copy, Clone, Default)]
pub struct Calibration {
    pub sum_squared_error: f64,
    pub predictions: u64,
    /// Pairs skipped because a participant is missing from the table.
    pub missed: u64,
}

impl Calibration {
    /// Root-mean-square error over the scored pairs; `0.0` when nothing was
    /// scorable.
    pub fn rmse(&self) -> f64 {
        if self.predictions == 0 {
            return 0.0;
        }
        (self.sum_squared_error / self.predictions as f64).sqrt()
    }
}

/// Relative-order error over scored pairs.
#[derive(Debug, Copy, Clone, Default)]
pub struct OrderAccuracy {
    pub wrong: u64,
    pub predictions: u64,
    /// Pairs skipped because a participant is missing from the table.
    pub missed: u64,
}

impl OrderAccuracy {
    /// Fraction of scored pairs predicted wrongly; `0.0` when nothing was
    /// scorable.
    pub fn error_rate(&self) -> f64 {
        if self.predictions == 0 {
            return 0.0;
        }
        self.wrong as f64 / self.predictions as f64
    }
}

/// Both metrics over the same held-out games.
#[derive(Debug, Copy, Clone, Default)]
pub struct Evaluation {
    pub calibration: Calibration,
    pub order: OrderAccuracy,
}

pub fn evaluate<P: Predictor + ?Sized>(games: &[GameRecord], predictor: &P) -> Evaluation {
    Evaluation {
        calibration: probability_rmse(games, predictor, None),
        order: order_error(games, predictor, None),
    }
}

/// Squared-error calibration of predicted win probabilities against observed
/// pairwise outcomes.
///
/// Every unordered pair of co-participants is taken in finish order; the
/// observed outcome is `1.0` exactly when the first player's rank is strictly
/// better. When `subjects` is given, only pairs touching a subject count.
pub fn probability_rmse<P: Predictor + ?Sized>(
    games: &[GameRecord],
    predictor: &P,
    subjects: Option<&FxHashSet<PlayerId>>,
) -> Calibration {
    let mut sum_squared_error = 0.0;
    let (missed, predictions) =
        for_scorable_pairs(games, predictor, subjects, |player, prank, opp, orank| {
            let winp = predictor.win_probability(player, opp);
            let winr = if prank < orank { 1.0 } else { 0.0 };
            sum_squared_error += (winp - winr) * (winp - winr);
        });
    Calibration {
        sum_squared_error,
        predictions,
        missed,
    }
}

/// Fraction of co-participant pairs whose predicted order is indecisive or
/// disagrees with the true finish order.
///
/// Stricter than a majority-vote comparison: a table that cannot separate two
/// players is wrong on that pair even when the true outcome is unambiguous
/// (Weng & Lin 2011, section 6).
pub fn order_error<P: Predictor + ?Sized>(
    games: &[GameRecord],
    predictor: &P,
    subjects: Option<&FxHashSet<PlayerId>>,
) -> OrderAccuracy {
    let mut wrong = 0u64;
    let (missed, predictions) =
        for_scorable_pairs(games, predictor, subjects, |player, prank, opp, orank| {
            let better = predictor.ahead(player, opp);
            let worse = predictor.ahead(opp, player);
            if better == worse || better != (prank < orank) {
                wrong += 1;
            }
        });
    OrderAccuracy {
        wrong,
        predictions,
        missed,
    }
}

/// Drive `score` over every scorable co-participant pair in finish order.
/// Returns the `(missed, scored)` pair totals.
fn for_scorable_pairs<P: Predictor + ?Sized>(
    games: &[GameRecord],
    predictor: &P,
    subjects: Option<&FxHashSet<PlayerId>>,
    mut score: impl FnMut(PlayerId, Rank, PlayerId, Rank),
) -> (u64, u64) {
    let mut missed = 0u64;
    let mut predictions = 0u64;
    for game in games {
        let mut order: Vec<(PlayerId, Rank)> = game.placements().to_vec();
        order.sort_by_key(|&(_, rank)| rank);
        for (i, &(player, prank)) in order.iter().enumerate().take(order.len().saturating_sub(1)) {
            for &(opp, orank) in &order[i + 1..] {
                if let Some(subjects) = subjects {
                    if !subjects.contains(&player) && !subjects.contains(&opp) {
                        continue;
                    }
                }
                if !predictor.contains(player) || !predictor.contains(opp) {
                    missed += 1;
                    continue;
                }
                score(player, prank, opp, orank);
                predictions += 1;
            }
        }
    }
    (missed, predictions)
}
