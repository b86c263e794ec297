use std::{
    error::Error,
    fs::File,
    io::{BufRead, BufReader},
    path::PathBuf,
};

use clap::Parser as _;
use ffarank::{
    order_error, probability_rmse, GameRecord, PlRatings, PlayerId, PlayerIds, Predictor, Rating,
    UpdateRule, WengLin,
};
use ffarank_research::{
    games,
    store::{self, RatingKind},
    trueskill::TrueSkill,
};
use rustc_hash::{FxHashMap, FxHashSet};
use skillratings::trueskill::TrueSkillRating;

/// Gather prediction performance statistics from stored ratings.
#[derive(clap::Parser)]
struct Opt {
    /// JSON files containing game data.
    #[clap(required = true)]
    game_files: Vec<PathBuf>,
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
    /// File with ratings of players.
    #[clap(short, long)]
    ratings: PathBuf,
    /// Kind of the rating file: pl, wl or ts.
    #[clap(short, long)]
    kind: RatingKind,
    /// File with players to restrict the statistics to.
    #[clap(long)]
    subjects: Option<PathBuf>,
    /// Only use the first (positive) or last (negative) N subjects.
    #[clap(long)]
    subjects_num: Option<i64>,
    /// Also report the best possible rates from true win percentages.
    #[clap(long)]
    calc_best: bool,
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

    let predictor = load_predictor(&opt, &players)?;

    let subjects = match &opt.subjects {
        Some(path) => Some(load_subjects(path, opt.subjects_num, &players)?),
        None => None,
    };

    let calibration = probability_rmse(&records, predictor.as_ref(), subjects.as_ref());
    if calibration.missed > 0 {
        println!("Could not make a prediction for {} pairs.", calibration.missed);
        println!("With {} predictions made.", calibration.predictions);
    }
    println!("Given ratings RMSE {:.6}", calibration.rmse());

    let order = order_error(&records, predictor.as_ref(), subjects.as_ref());
    println!(
        "Given ratings incorrectly ordered {:.2}% results",
        order.error_rate() * 100.0
    );

    if opt.calc_best {
        best_scores(&records);
    }

    Ok(())
}

fn load_predictor(opt: &Opt, players: &PlayerIds) -> Result<Box<dyn Predictor>, Box<dyn Error>> {
    let file = File::open(&opt.ratings)?;
    Ok(match opt.kind {
        RatingKind::PlackettLuce => {
            let rows = store::load_pl_ratings(file)?;
            println!("Loaded ratings for {} players.", rows.len());
            let mut table = PlRatings::default();
            for (name, gamma) in rows {
                if let Some(player) = players.get(&name) {
                    table.set(player, gamma);
                }
            }
            Box::new(table)
        }
        RatingKind::WengLin => {
            let rows = store::load_scored_ratings(file, RatingKind::WengLin)?;
            println!("Loaded ratings for {} players.", rows.len());
            let mut table = WengLin::new(UpdateRule::BradleyTerry).new_table();
            for (name, mu, sigma) in rows {
                if let Some(player) = players.get(&name) {
                    table.set(player, Rating { mu, sigma });
                }
            }
            Box::new(table)
        }
        RatingKind::TrueSkill => {
            let rows = store::load_scored_ratings(file, RatingKind::TrueSkill)?;
            println!("Loaded ratings for {} players.", rows.len());
            let mut table = TrueSkill::new().new_table();
            for (name, mu, sigma) in rows {
                if let Some(player) = players.get(&name) {
                    table.set(
                        player,
                        TrueSkillRating {
                            rating: mu,
                            uncertainty: sigma,
                        },
                    );
                }
            }
            Box::new(table)
        }
    })
}

/// Subject files are either bare names or rating-file rows, one per line;
/// in the latter case the name is the second field.
fn load_subjects(
    path: &PathBuf,
    subjects_num: Option<i64>,
    players: &PlayerIds,
) -> Result<FxHashSet<PlayerId>, Box<dyn Error>> {
    let mut lines: Vec<String> = BufReader::new(File::open(path)?)
        .lines()
        .collect::<Result<_, _>>()?;
    if lines.first().is_some_and(|line| line.contains(',')) {
        lines = lines
            .iter()
            .map(|line| line.split(',').nth(1).unwrap_or("").to_owned())
            .collect();
    }
    if let Some(subjects_num) = subjects_num {
        games::truncate(&mut lines, subjects_num);
    }
    let subjects: FxHashSet<PlayerId> = lines
        .iter()
        .filter_map(|line| players.get(line.trim()))
        .collect();
    println!("Restricting stats to {} players", subjects.len());
    Ok(subjects)
}

/// Empirical head-to-head record over the evaluated games themselves: an
/// upper bound on what any fixed rating of these players could predict.
struct HeadToHead {
    wins: FxHashMap<(PlayerId, PlayerId), u32>,
    players: FxHashSet<PlayerId>,
}

impl HeadToHead {
    fn tally(games: &[GameRecord]) -> HeadToHead {
        let mut wins: FxHashMap<(PlayerId, PlayerId), u32> = FxHashMap::default();
        let mut players = FxHashSet::default();
        for game in games {
            for &(player, prank) in game.placements() {
                players.insert(player);
                for &(opp, orank) in game.placements() {
                    if player != opp && prank < orank {
                        *wins.entry((player, opp)).or_insert(0) += 1;
                    }
                }
            }
        }
        HeadToHead { wins, players }
    }

    fn wins(&self, a: PlayerId, b: PlayerId) -> u32 {
        self.wins.get(&(a, b)).copied().unwrap_or(0)
    }
}

impl Predictor for HeadToHead {
    fn contains(&self, player: PlayerId) -> bool {
        self.players.contains(&player)
    }

    fn win_probability(&self, a: PlayerId, b: PlayerId) -> f64 {
        let ab = self.wins(a, b);
        let ba = self.wins(b, a);
        if ab == 0 {
            0.0
        } else if ba == 0 {
            1.0
        } else {
            f64::from(ab) / f64::from(ab + ba)
        }
    }

    fn ahead(&self, a: PlayerId, b: PlayerId) -> bool {
        self.wins(a, b) > self.wins(b, a)
    }
}

fn best_scores(records: &[GameRecord]) {
    let head_to_head = HeadToHead::tally(records);
    let calibration = probability_rmse(records, &head_to_head, None);
    println!("True probability RMSE {:.6}", calibration.rmse());
    let order = order_error(records, &head_to_head, None);
    println!(
        "True probability incorrectly ordered {:.2}% results",
        order.error_rate() * 100.0
    );
}
