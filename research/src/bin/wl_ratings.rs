use std::{
    error::Error,
    fs::File,
    io::{self, Write},
    path::PathBuf,
};

use clap::Parser as _;
use ffarank::{PlayerIds, UpdateRule, WengLin};
use ffarank_research::{games, store};
use rustc_hash::FxHashSet;

/// Create Weng-Lin ratings from game data.
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
    /// Filter out suspect games based on worker id.
    #[clap(long)]
    remove_suspect: bool,
    /// Filter out games that had bot errors.
    #[clap(long)]
    no_error: bool,
    /// Write the full ratings to the given file.
    #[clap(short, long)]
    out_file: Option<PathBuf>,
    /// Use the pooled Plackett-Luce update rule instead of pairwise
    /// Bradley-Terry.
    #[clap(long)]
    plackett_luce: bool,
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

    let rule = if opt.plackett_luce {
        UpdateRule::PlackettLuce
    } else {
        UpdateRule::BradleyTerry
    };
    let weng_lin = WengLin::new(rule);
    let mut ratings = weng_lin.new_table();
    weng_lin.rate_with(&mut ratings, &records, |gnum| {
        if gnum % 10_000 == 0 {
            print!("\rRated {gnum} games");
            let _ = io::stdout().flush();
        }
    });
    if records.len() > 5_000 {
        println!("\rRated {} games", records.len());
    }

    let rows: Vec<(String, f64, f64)> = ratings
        .iter()
        .map(|(player, rating)| (players.name(player).to_owned(), rating.mu, rating.sigma))
        .collect();
    if let Some(out_file) = &opt.out_file {
        store::write_score_ratings(File::create(out_file)?, rows.clone())?;
    }
    store::print_score_table(rows, opt.display);

    Ok(())
}
