use rayon::prelude::*;

use crate::game::{ByPlayerId, GameRecord, PlayerId, Rank};

/// Configuration for the minorization-maximization estimator.
#[derive(Debug, Clone)]
pub struct PlConfig {
    /// Stop once the L2 distance between successive gamma vectors drops to
    /// this value or below.
    pub tolerance: f64,
    pub backend: PlBackend,
    /// Inject a synthetic player with one win and one loss against every real
    /// player, then strip it from the result. Forces the comparison graph to
    /// be strongly connected without changing the relative order of real
    /// players.
    pub anchor: bool,
}

impl Default for PlConfig {
    fn default() -> PlConfig {
        PlConfig {
            tolerance: 1e-9,
            backend: PlBackend::Parallel,
            anchor: false,
        }
    }
}

/// Backend evaluating the per-iteration summations. Both compute the same
/// update; `Parallel` spreads the per-game work across threads and
/// accumulates in a fixed order, so the converged table does not depend on
/// scheduling.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PlBackend {
    Scalar,
    Parallel,
}

/// Progress of one MM iteration, handed to the caller's observer.
#[derive(Debug, Copy, Clone)]
pub struct PlIteration {
    pub iteration: u32,
    /// L2 distance between the previous and current gamma vectors.
    pub l2_delta: f64,
    /// The distance grew relative to the previous iteration. Not an error:
    /// the distance is not guaranteed monotonic, and growth usually points at
    /// a poorly connected comparison graph.
    pub increased: bool,
}

/// Unnormalized strength per player. Only ratios between players carry
/// meaning; [`PlRatings::normalized`] rescales to a unit sum for display.
#[derive(Debug, Clone, Default)]
pub struct PlRatings {
    gammas: ByPlayerId<f64>,
}

impl PlRatings {
    pub fn gamma(&self, player: PlayerId) -> Option<f64> {
        self.gammas.get(player).copied()
    }

    pub fn set(&mut self, player: PlayerId, gamma: f64) {
        self.gammas.set(player, gamma);
    }

    pub fn len(&self) -> usize {
        self.gammas.count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (PlayerId, f64)> + '_ {
        self.gammas.iter().map(|(player, &gamma)| (player, gamma))
    }

    #[must_use]
    pub fn normalized(&self) -> PlRatings {
        let total: f64 = self.iter().map(|(_, gamma)| gamma).sum();
        if total <= 0.0 {
            return self.clone();
        }
        let mut gammas = ByPlayerId::default();
        for (player, gamma) in self.iter() {
            gammas.set(player, gamma / total);
        }
        PlRatings { gammas }
    }
}

/// Players whose game history pins them to one side of every comparison.
///
/// The MM iteration diverges when some players never lose or never win
/// relative to the rest; this is surfaced for the caller to warn about (or to
/// fix with [`PlConfig::anchor`]), never treated as an error here.
#[derive(Debug, Clone, Default)]
pub struct ConnectivityReport {
    /// Never ranked worse than first place.
    pub undefeated: Vec<PlayerId>,
    /// No game where they finished strictly better than last place.
    pub winless: Vec<PlayerId>,
}

impl ConnectivityReport {
    pub fn is_connected(&self) -> bool {
        self.undefeated.is_empty() && self.winless.is_empty()
    }
}

pub fn connectivity_report(games: &[GameRecord]) -> ConnectivityReport {
    let mut has_win: ByPlayerId<bool> = ByPlayerId::default();
    let mut has_loss: ByPlayerId<bool> = ByPlayerId::default();
    let mut players = Vec::new();

    for game in games {
        let Some(worst) = game.worst_rank() else {
            continue;
        };
        for &(player, rank) in game.placements() {
            let win = has_win.get_mut_or_insert_with(player, || {
                players.push(player);
                has_loss.set(player, false);
                false
            });
            if rank < worst {
                *win = true;
            }
            if rank > Rank::FIRST {
                has_loss.set(player, true);
            }
        }
    }

    players.sort_unstable();
    let mut report = ConnectivityReport::default();
    for &player in &players {
        if has_loss.get(player) != Some(&true) {
            report.undefeated.push(player);
        }
        if has_win.get(player) != Some(&true) {
            report.winless.push(player);
        }
    }
    report
}

/// Batch Plackett-Luce estimator.
///
/// Hunter's MM algorithm for generalized Bradley-Terry models, applied to the
/// full game history at once. The result is independent of game order.
#[derive(Debug, Clone, Default)]
pub struct PlEstimator {
    config: PlConfig,
}

impl PlEstimator {
    pub fn new(config: PlConfig) -> PlEstimator {
        PlEstimator { config }
    }

    pub fn estimate(&self, games: &[GameRecord]) -> PlRatings {
        self.estimate_with(games, |_| {})
    }

    /// Run the estimator, invoking `observer` once per iteration.
    pub fn estimate_with(
        &self,
        games: &[GameRecord],
        observer: impl FnMut(PlIteration),
    ) -> PlRatings {
        if self.config.anchor {
            let (augmented, anchor) = with_anchor(games);
            let mut ratings = self.run(&augmented, observer);
            ratings.gammas.remove(anchor);
            ratings
        } else {
            self.run(games, observer)
        }
    }

    fn run(&self, games: &[GameRecord], mut observer: impl FnMut(PlIteration)) -> PlRatings {
        let corpus = Corpus::prepare(games);
        if corpus.players.is_empty() {
            return PlRatings::default();
        }

        let prior = 1.0 / corpus.players.len() as f64;
        let mut gammas: ByPlayerId<f64> = ByPlayerId::default();
        for &player in &corpus.players {
            gammas.set(player, prior);
        }

        let mut last_delta = f64::INFINITY;
        let mut iteration = 0u32;
        loop {
            iteration += 1;
            let denoms = match self.config.backend {
                PlBackend::Scalar => corpus.denominators_scalar(&gammas),
                PlBackend::Parallel => corpus.denominators_parallel(&gammas),
            };

            let mut next: ByPlayerId<f64> = ByPlayerId::default();
            let mut delta_sq = 0.0;
            for &player in &corpus.players {
                let wins = corpus.wins.get(player).copied().unwrap_or(0.0);
                let denom = denoms.get(player).copied().unwrap_or(0.0);
                let updated = wins / denom;
                let previous = gammas.get(player).copied().unwrap_or(0.0);
                delta_sq += (updated - previous) * (updated - previous);
                next.set(player, updated);
            }
            gammas = next;

            let l2_delta = delta_sq.sqrt();
            observer(PlIteration {
                iteration,
                l2_delta,
                increased: l2_delta > last_delta,
            });
            // Written so a NaN delta (divergent input) falls out of the loop
            // instead of spinning.
            if !(l2_delta > self.config.tolerance) {
                break;
            }
            last_delta = l2_delta;
        }

        PlRatings { gammas }
    }
}

/// Append one synthetic win and one synthetic loss against every participant,
/// as two-player games. Returns the augmented corpus and the synthetic id.
fn with_anchor(games: &[GameRecord]) -> (Vec<GameRecord>, PlayerId) {
    let max_index = games
        .iter()
        .filter_map(GameRecord::max_player_index)
        .max()
        .unwrap_or(0);
    let anchor = PlayerId(max_index + 1);

    let mut seen: ByPlayerId<()> = ByPlayerId::default();
    let mut players = Vec::new();
    for game in games {
        for &(player, _) in game.placements() {
            seen.get_mut_or_insert_with(player, || {
                players.push(player);
            });
        }
    }
    players.sort_unstable();

    let mut augmented = games.to_vec();
    let mut next_id = games.iter().map(GameRecord::id).max().unwrap_or(0);
    for &player in &players {
        next_id += 1;
        augmented.push(GameRecord::new(
            next_id,
            vec![(anchor, Rank(1)), (player, Rank(2))],
        ));
        next_id += 1;
        augmented.push(GameRecord::new(
            next_id,
            vec![(anchor, Rank(2)), (player, Rank(1))],
        ));
    }
    (augmented, anchor)
}

struct PreparedGame {
    placements: Vec<(PlayerId, Rank)>,
    /// Participants ordered by ascending rank.
    by_rank: Vec<(PlayerId, Rank)>,
    /// Distinct rank values in ascending order, excluding the worst. These
    /// are the places whose choice sets enter the denominator.
    places: Vec<Rank>,
}

struct Corpus {
    players: Vec<PlayerId>,
    /// Win credit: games finished strictly better than the worst rank.
    wins: ByPlayerId<f64>,
    games: Vec<PreparedGame>,
}

impl Corpus {
    fn prepare(games: &[GameRecord]) -> Corpus {
        let mut players = Vec::new();
        let mut wins: ByPlayerId<f64> = ByPlayerId::default();
        let mut prepared = Vec::with_capacity(games.len());

        for game in games {
            let Some(worst) = game.worst_rank() else {
                continue;
            };
            for &(player, rank) in game.placements() {
                let credit = wins.get_mut_or_insert_with(player, || {
                    players.push(player);
                    0.0
                });
                if rank < worst {
                    *credit += 1.0;
                }
            }

            let mut by_rank = game.placements().to_vec();
            by_rank.sort_by_key(|&(_, rank)| rank);
            let mut places: Vec<Rank> = by_rank.iter().map(|&(_, rank)| rank).collect();
            places.dedup();
            places.pop();

            prepared.push(PreparedGame {
                placements: game.placements().to_vec(),
                by_rank,
                places,
            });
        }

        players.sort_unstable();
        Corpus {
            players,
            wins,
            games: prepared,
        }
    }

    /// Per-player denominator contributions of a single game under the
    /// current gammas.
    ///
    /// For every place (distinct rank except the worst) the choice set is
    /// everyone ranked at or below it; a participant collects the reciprocals
    /// of the choice-set gamma sums for every place at or better than its own
    /// rank.
    fn game_contributions<'a>(
        game: &'a PreparedGame,
        gammas: &ByPlayerId<f64>,
    ) -> impl Iterator<Item = (PlayerId, f64)> + 'a {
        let mut suffix = vec![0.0; game.by_rank.len() + 1];
        for (i, &(player, _)) in game.by_rank.iter().enumerate().rev() {
            suffix[i] = suffix[i + 1] + gammas.get(player).copied().unwrap_or(0.0);
        }

        let mut cumulative = Vec::with_capacity(game.places.len());
        let mut running = 0.0;
        let mut start = 0;
        for &place in &game.places {
            while game.by_rank[start].1 < place {
                start += 1;
            }
            running += suffix[start].recip();
            cumulative.push(running);
        }

        game.placements.iter().map(move |&(player, rank)| {
            let covered = game.places.partition_point(|&place| place <= rank);
            let contribution = if covered == 0 {
                0.0
            } else {
                cumulative[covered - 1]
            };
            (player, contribution)
        })
    }

    fn denominators_scalar(&self, gammas: &ByPlayerId<f64>) -> ByPlayerId<f64> {
        let mut denoms: ByPlayerId<f64> = ByPlayerId::default();
        for game in &self.games {
            for (player, contribution) in Self::game_contributions(game, gammas) {
                *denoms.get_mut_or_insert_with(player, || 0.0) += contribution;
            }
        }
        denoms
    }

    fn denominators_parallel(&self, gammas: &ByPlayerId<f64>) -> ByPlayerId<f64> {
        let per_game: Vec<Vec<(PlayerId, f64)>> = self
            .games
            .par_iter()
            .map(|game| Self::game_contributions(game, gammas).collect())
            .collect();

        let mut denoms: ByPlayerId<f64> = ByPlayerId::default();
        for contributions in per_game {
            for (player, contribution) in contributions {
                *denoms.get_mut_or_insert_with(player, || 0.0) += contribution;
            }
        }
        denoms
    }
}
