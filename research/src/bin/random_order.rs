use std::{error::Error, path::PathBuf};

use clap::Parser as _;
use ffarank::{order_error, PlayerIds, UpdateRule, WengLin};
use ffarank_research::games;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use rustc_hash::FxHashSet;

/// Measure how sensitive the online ratings are to game order by rating
/// repeatedly shuffled corpora.
#[derive(clap::Parser)]
struct Opt {
    /// JSON files containing game data.
    #[clap(required = true)]
    game_files: Vec<PathBuf>,
    /// JSON files with games to test ratings against (defaults to the
    /// training games).
    #[clap(short, long)]
    test_games: Vec<PathBuf>,
    /// Number of shuffled trials to run.
    #[clap(short, long, default_value_t = 100)]
    num_trials: usize,
    /// Use the pairwise Bradley-Terry rule instead of pooled
    /// Plackett-Luce.
    #[clap(long)]
    bradley_terry: bool,
    /// Seed for the shuffles, for reproducible trials.
    #[clap(long)]
    seed: Option<u64>,
}

fn main() -> Result<(), Box<dyn Error>> {
    ffarank_research::init_tracing();
    let opt = Opt::parse();

    let raw = games::load_games(&opt.game_files)?;
    let mut players = PlayerIds::default();
    let excluded = FxHashSet::default();
    let mut records = games::to_records(&raw, &mut players, &excluded);
    let test_records = if opt.test_games.is_empty() {
        records.clone()
    } else {
        let test_raw = games::load_games(&opt.test_games)?;
        games::to_records(&test_raw, &mut players, &excluded)
    };

    let rule = if opt.bradley_terry {
        UpdateRule::BradleyTerry
    } else {
        UpdateRule::PlackettLuce
    };
    let weng_lin = WengLin::new(rule);
    let mut rng = match opt.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let mut errors: Vec<f64> = Vec::with_capacity(opt.num_trials);
    for trial in 1..=opt.num_trials {
        records.shuffle(&mut rng);
        let mut ratings = weng_lin.new_table();
        weng_lin.rate(&mut ratings, &records);
        let error = order_error(&test_records, &ratings, None).error_rate();
        errors.push(error);

        let min = errors.iter().copied().fold(f64::INFINITY, f64::min);
        let max = errors.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let avg = errors.iter().sum::<f64>() / errors.len() as f64;
        let stdev = if errors.len() > 1 {
            (errors
                .iter()
                .map(|error| (error - avg) * (error - avg))
                .sum::<f64>()
                / (errors.len() - 1) as f64)
                .sqrt()
        } else {
            0.0
        };
        println!(
            "{trial}: {:.2}% Min: {:.2}% Avg: {:.2}% ({:.2}%) Max: {:.2}%",
            error * 100.0,
            min * 100.0,
            avg * 100.0,
            stdev * 100.0,
            max * 100.0
        );
    }

    Ok(())
}
