use std::{error::Error, fs, fs::File, io::BufWriter, path::PathBuf};

use clap::Parser as _;
use ffarank_research::games;
use rand::{rngs::StdRng, SeedableRng};

/// Shuffle games into multiple parts of roughly equal size.
#[derive(clap::Parser)]
struct Opt {
    /// JSON files containing game data.
    #[clap(required = true)]
    game_files: Vec<PathBuf>,
    /// Directory name for the output files.
    #[clap(short, long)]
    out_dir: PathBuf,
    /// Number of parts to split games into.
    #[clap(short, long, default_value_t = 10)]
    num_parts: usize,
    /// Seed for the shuffle, for reproducible partitions.
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
    let parts = games::partition(games, opt.num_parts, &mut rng);

    let width = (opt.num_parts as f64).log10().ceil() as usize;
    fs::create_dir(&opt.out_dir)?;
    for (i, part) in parts.iter().enumerate() {
        let path = opt.out_dir.join(format!("part-{i:0width$}.json"));
        serde_json::to_writer_pretty(BufWriter::new(File::create(&path)?), part)?;
        println!("Wrote {} games to {}", part.len(), path.display());
    }

    Ok(())
}
