use std::{error::Error, ffi::OsStr, path::PathBuf};

use clap::Parser as _;
use ffarank::{
    cross_validate_with, PlConfig, PlEstimator, PlayerIds, System, UpdateRule, WengLin,
};
use ffarank_research::{games, trueskill::TrueSkill};
use rustc_hash::FxHashSet;

/// Cross-validate rating systems on a set of partitioned games.
#[derive(clap::Parser)]
struct Opt {
    /// Directory containing the partition files.
    game_dir: PathBuf,
}

fn registry() -> Vec<System> {
    vec![
        System::new("plackett-luce", |games| {
            Box::new(PlEstimator::new(PlConfig::default()).estimate(games))
        }),
        System::new("trueskill-default", |games| {
            let trueskill = TrueSkill::new();
            let mut ratings = trueskill.new_table();
            trueskill.rate(&mut ratings, games);
            Box::new(ratings)
        }),
        System::new("trueskill-t0", |games| {
            let trueskill = TrueSkill::without_dynamics();
            let mut ratings = trueskill.new_table();
            trueskill.rate(&mut ratings, games);
            Box::new(ratings)
        }),
        System::new("weng-lin-bt", |games| {
            let weng_lin = WengLin::new(UpdateRule::BradleyTerry);
            let mut ratings = weng_lin.new_table();
            weng_lin.rate(&mut ratings, games);
            Box::new(ratings)
        }),
        System::new("weng-lin-pl", |games| {
            let weng_lin = WengLin::new(UpdateRule::PlackettLuce);
            let mut ratings = weng_lin.new_table();
            weng_lin.rate(&mut ratings, games);
            Box::new(ratings)
        }),
    ]
}

fn main() -> Result<(), Box<dyn Error>> {
    ffarank_research::init_tracing();
    let opt = Opt::parse();

    let mut part_files: Vec<PathBuf> = std::fs::read_dir(&opt.game_dir)?
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<Result<_, _>>()?;
    part_files.retain(|path| path.extension() == Some(OsStr::new("json")));
    part_files.sort();

    let mut players = PlayerIds::default();
    let excluded = FxHashSet::default();
    let mut folds = Vec::with_capacity(part_files.len());
    for path in &part_files {
        let raw = games::load_games(std::slice::from_ref(path))?;
        folds.push(games::to_records(&raw, &mut players, &excluded));
    }
    let total: usize = folds.iter().map(Vec::len).sum();
    println!("Loaded {} games in {} parts", total, folds.len());

    let summaries = cross_validate_with(&folds, &registry(), |fold, system, error| {
        println!(
            "Finished {} parts for {:<17} {:.2} error",
            fold,
            system,
            error * 100.0
        );
    });
    for summary in &summaries {
        println!(
            "Prediction error for {:<17} {:.2}% ({:.2}%)",
            summary.name,
            summary.mean() * 100.0,
            summary.stdev() * 100.0
        );
    }

    Ok(())
}
