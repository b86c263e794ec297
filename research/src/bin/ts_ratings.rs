use std::{error::Error, fs::File, path::PathBuf};

use clap::Parser as _;
use ffarank::PlayerIds;
use ffarank_research::{games, store, trueskill::TrueSkill};
use rustc_hash::FxHashSet;

/// Create TrueSkill ratings from game data.
#[derive(clap::Parser)]
struct Opt {
    /// JSON files containing game data.
    #[clap(required = true)]
    game_files: Vec<PathBuf>,
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
    /// Dynamics factor added to uncertainty before each update.
    #[clap(short, long)]
    tau: Option<f64>,
}

fn main() -> Result<(), Box<dyn Error>> {
    ffarank_research::init_tracing();
    let opt = Opt::parse();

    let raw = games::load_games(&opt.game_files)?;
    let mut players = PlayerIds::default();
    let mut records = games::to_records(&raw, &mut players, &FxHashSet::default());
    if let Some(num_games) = opt.num_games {
        games::truncate(&mut records, num_games);
        println!(
            "Using {} {} games.",
            if num_games > 0 { "first" } else { "last" },
            records.len()
        );
    }

    let trueskill = match opt.tau {
        Some(tau) => TrueSkill::with_dynamics(tau),
        None => TrueSkill::new(),
    };
    let mut ratings = trueskill.new_table();
    trueskill.rate_with(&mut ratings, &records, |gnum| {
        if gnum % 10_000 == 0 {
            println!("Rated {gnum} games");
        }
    });
    println!("Rated {} games", records.len());

    let rows: Vec<(String, f64, f64)> = ratings
        .iter()
        .map(|(player, rating)| {
            (
                players.name(player).to_owned(),
                rating.rating,
                rating.uncertainty,
            )
        })
        .collect();
    if let Some(out_file) = &opt.out_file {
        store::write_score_ratings(File::create(out_file)?, rows.clone())?;
    }
    store::print_score_table(rows, opt.display);

    Ok(())
}
