use std::{error::Error, fs::File, path::PathBuf, time::Instant};

use clap::Parser as _;
use ffarank::{connectivity_report, PlBackend, PlConfig, PlEstimator, PlayerIds};
use ffarank_research::{games, store};
use rustc_hash::FxHashSet;

/// Create Plackett-Luce ratings from game data.
#[derive(clap::Parser)]
struct Opt {
    /// JSON files containing game data.
    #[clap(required = true)]
    game_files: Vec<PathBuf>,
    /// Add a synthetic player with a win and a loss against every other
    /// player, forcing the comparison graph to be connected.
    #[clap(short, long)]
    anchor_player: bool,
    /// Exclude a player by username (may be repeated).
    #[clap(short = 'x', long)]
    exclude: Vec<String>,
    /// Convergence tolerance on the distance between iterations.
    #[clap(short, long, default_value_t = 1e-9)]
    tolerance: f64,
    /// Limit display of ratings to the top N (0 for all).
    #[clap(short, long, default_value_t = 40)]
    display: usize,
    /// Limit the number of games used (positive for first, negative for
    /// last).
    #[clap(short, long)]
    num_games: Option<i64>,
    /// Write the full ratings to the given file.
    #[clap(short, long)]
    out_file: Option<PathBuf>,
    /// Filter out games that had bot errors.
    #[clap(long)]
    no_error: bool,
    /// Filter out suspect games based on worker id.
    #[clap(long)]
    remove_suspect: bool,
    /// Evaluate iterations on a single thread.
    #[clap(long)]
    scalar: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    ffarank_research::init_tracing();
    let opt = Opt::parse();

    let mut raw = games::load_games(&opt.game_files)?;
    if opt.no_error {
        games::filter_error_games(&mut raw);
        println!("Filtered out error games, leaving {}", raw.len());
    }
    if opt.remove_suspect {
        let before = raw.len();
        games::filter_suspect_games(&mut raw);
        println!(
            "Filtered out {} suspect games, leaving {}",
            before - raw.len(),
            raw.len()
        );
    }

    if !opt.exclude.is_empty() {
        println!("Excluding {:?}", opt.exclude);
    }
    let excluded: FxHashSet<String> = opt.exclude.iter().cloned().collect();
    let mut players = PlayerIds::default();
    let mut records = games::to_records(&raw, &mut players, &excluded);
    if let Some(num_games) = opt.num_games {
        games::truncate(&mut records, num_games);
        println!(
            "Using {} {} games.",
            if num_games > 0 { "first" } else { "last" },
            records.len()
        );
    }

    let report = connectivity_report(&records);
    if !report.undefeated.is_empty() {
        println!("{} were undefeated", report.undefeated.len());
    }
    if !report.winless.is_empty() {
        println!("{} never won", report.winless.len());
    }
    if !opt.anchor_player && !report.is_connected() {
        println!("WARNING: Ratings will almost certainly not converge.");
        println!("(Maybe run with --anchor-player)");
    }
    println!("{} players", players.len());
    if opt.anchor_player {
        println!("Adding anchor player.");
    }

    let estimator = PlEstimator::new(PlConfig {
        tolerance: opt.tolerance,
        backend: if opt.scalar {
            PlBackend::Scalar
        } else {
            PlBackend::Parallel
        },
        anchor: opt.anchor_player,
    });
    let mut last = Instant::now();
    let ratings = estimator.estimate_with(&records, |iteration| {
        let now = Instant::now();
        println!(
            "{} {:.2} seconds L2={:.2e}",
            iteration.iteration,
            (now - last).as_secs_f64(),
            iteration.l2_delta
        );
        if iteration.increased {
            println!("Gamma difference increased");
        }
        last = now;
    });

    if let Some(out_file) = &opt.out_file {
        store::write_pl_ratings(File::create(out_file)?, &players, &ratings)?;
    }
    store::print_pl_table(&players, &ratings, opt.display);

    Ok(())
}
