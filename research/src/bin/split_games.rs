use std::{error::Error, fs::File, io::BufWriter, path::PathBuf};

use clap::Parser as _;
use ffarank_research::games;
use rand::{rngs::StdRng, SeedableRng};

/// Split games into separate training and test sets.
#[derive(clap::Parser)]
struct Opt {
    /// JSON files containing game data.
    #[clap(required = true)]
    game_files: Vec<PathBuf>,
    /// Output files will be named training-<name>.json and
    /// test-<name>.json.
    #[clap(short, long)]
    out_file: String,
    /// Percentage of games to use for testing.
    #[clap(short = 'p', long, default_value_t = 10.0)]
    test_percentage: f64,
    /// Seed for the selection, for reproducible splits.
    #[clap(long)]
    seed: Option<u64>,
}

fn main() -> Result<(), Box<dyn Error>> {
    ffarank_research::init_tracing();
    let opt = Opt::parse();

    let games = games::load_games(&opt.game_files)?;
    let mut rng = match opt.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let (training, test) = games::train_test_split(games, opt.test_percentage, &mut rng);
    println!(
        "{} training and {} test games selected.",
        training.len(),
        test.len()
    );

    serde_json::to_writer(
        BufWriter::new(File::create(format!("training-{}.json", opt.out_file))?),
        &training,
    )?;
    serde_json::to_writer(
        BufWriter::new(File::create(format!("test-{}.json", opt.out_file))?),
        &test,
    )?;

    Ok(())
}
