//! Delegated TrueSkill baseline behind the `skillratings` factor-graph
//! implementation.
//!
//! Processes games sequentially with one single-player team per
//! participant, so free-for-all outcomes map directly onto the multi-team
//! update. Draws are disabled to match the other systems' treatment of
//! rank ties.

use ffarank::{ByPlayerId, GameRecord, PlayerId, Predictor};
use skillratings::{
    trueskill::{expected_score, trueskill_multi_team, TrueSkillConfig, TrueSkillRating},
    MultiTeamOutcome,
};

#[derive(Debug, Clone)]
pub struct TrueSkill {
    config: TrueSkillConfig,
}

impl Default for TrueSkill {
    fn default() -> TrueSkill {
        TrueSkill::new()
    }
}

impl TrueSkill {
    pub fn new() -> TrueSkill {
        TrueSkill {
            config: TrueSkillConfig {
                draw_probability: 0.0,
                ..TrueSkillConfig::new()
            },
        }
    }

    /// The `tau = 0` variant: no dynamics factor, so uncertainty only ever
    /// shrinks.
    pub fn without_dynamics() -> TrueSkill {
        TrueSkill::with_dynamics(0.0)
    }

    pub fn with_dynamics(tau: f64) -> TrueSkill {
        TrueSkill {
            config: TrueSkillConfig {
                draw_probability: 0.0,
                default_dynamics: tau,
                ..TrueSkillConfig::new()
            },
        }
    }

    /// Fresh table where every player not yet seen starts from the crate's
    /// default prior.
    pub fn new_table(&self) -> TsRatings {
        TsRatings {
            table: ByPlayerId::default(),
            config: self.config.clone(),
        }
    }

    pub fn rate(&self, ratings: &mut TsRatings, games: &[GameRecord]) {
        self.rate_with(ratings, games, |_| {});
    }

    /// Apply `games` in order, invoking `progress` with the running count
    /// after each game.
    pub fn rate_with(
        &self,
        ratings: &mut TsRatings,
        games: &[GameRecord],
        mut progress: impl FnMut(u64),
    ) {
        for (gnum, game) in games.iter().enumerate() {
            self.rate_game(ratings, game);
            progress(gnum as u64 + 1);
        }
    }

    fn rate_game(&self, ratings: &mut TsRatings, game: &GameRecord) {
        let teams: Vec<[TrueSkillRating; 1]> = game
            .placements()
            .iter()
            .map(|&(player, _)| [*ratings.table.get_mut_or_insert_with(player, TrueSkillRating::new)])
            .collect();
        let teams_and_ranks: Vec<(&[TrueSkillRating], MultiTeamOutcome)> = teams
            .iter()
            .zip(game.placements())
            .map(|(team, &(_, rank))| {
                (&team[..], MultiTeamOutcome::new(u32::from(rank) as usize))
            })
            .collect();
        for (updated, &(player, _)) in trueskill_multi_team(&teams_and_ranks, &self.config)
            .into_iter()
            .zip(game.placements())
        {
            ratings.table.set(player, updated[0]);
        }
    }
}

/// TrueSkill beliefs per player, with the prediction capabilities the
/// evaluator needs.
#[derive(Debug, Clone)]
pub struct TsRatings {
    table: ByPlayerId<TrueSkillRating>,
    config: TrueSkillConfig,
}

impl TsRatings {
    pub fn rating(&self, player: PlayerId) -> Option<TrueSkillRating> {
        self.table.get(player).copied()
    }

    pub fn set(&mut self, player: PlayerId, rating: TrueSkillRating) {
        self.table.set(player, rating);
    }

    pub fn iter(&self) -> impl Iterator<Item = (PlayerId, TrueSkillRating)> + '_ {
        self.table.iter().map(|(player, &rating)| (player, rating))
    }

    pub fn conservative_score(rating: &TrueSkillRating) -> f64 {
        rating.rating - 3.0 * rating.uncertainty
    }
}

impl Predictor for TsRatings {
    fn contains(&self, player: PlayerId) -> bool {
        self.table.get(player).is_some()
    }

    /// Normal-CDF win probability under the configured beta, with draws
    /// disabled.
    fn win_probability(&self, a: PlayerId, b: PlayerId) -> f64 {
        match (self.table.get(a), self.table.get(b)) {
            (Some(ra), Some(rb)) => expected_score(ra, rb, &self.config).0,
            _ => 0.5,
        }
    }

    fn ahead(&self, a: PlayerId, b: PlayerId) -> bool {
        match (self.table.get(a), self.table.get(b)) {
            (Some(ra), Some(rb)) => {
                Self::conservative_score(ra) > Self::conservative_score(rb)
            }
            _ => false,
        }
    }
}
