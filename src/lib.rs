//! Skill estimation for rank-ordered free-for-all games.
//!
//! A game is a set of players with 1-based finishing ranks, lower is better,
//! ties allowed. Two families of estimators fit latent skill to a corpus of
//! such games:
//!
//! - [`PlEstimator`] batch-fits a Plackett-Luce model with Hunter's
//!   minorization-maximization algorithm. The result is independent of game
//!   order: one positive strength per player, meaningful only in ratio.
//! - [`WengLin`] applies the online Bayesian update rules of Weng & Lin,
//!   "A Bayesian Approximation Method for Online Ranking" (JMLR 2011), in
//!   either the pairwise Bradley-Terry or the pooled Plackett-Luce variant.
//!   Games are processed strictly in sequence and each player carries a
//!   Gaussian `(mu, sigma)` belief.
//!
//! Every rating table implements [`Predictor`], so [`evaluate`] can score it
//! against held-out games with a probability-calibration error and a
//! relative-order error, and [`cross_validate`] can compare any set of
//! registered systems fold by fold.

pub mod cross_validate;
pub mod eval;
pub mod game;
pub mod plackett_luce;
pub mod weng_lin;

pub use cross_validate::{cross_validate, cross_validate_with, System, SystemSummary};
pub use eval::{
    evaluate, order_error, probability_rmse, Calibration, Evaluation, OrderAccuracy, Predictor,
};
pub use game::{ByPlayerId, GameRecord, PlayerId, PlayerIds, Rank};
pub use plackett_luce::{
    connectivity_report, ConnectivityReport, PlBackend, PlConfig, PlEstimator, PlIteration,
    PlRatings,
};
pub use weng_lin::{Rating, UpdateRule, WengLin, WlRatings, DEFAULT_MU, DEFAULT_SIGMA};
