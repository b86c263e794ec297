//! The JSON game store: loading, deduplication, filtering, partitioning,
//! and conversion into the core's game records.

use std::{
    fs::File,
    io::BufReader,
    path::PathBuf,
};

use ffarank::{GameRecord, PlayerIds, Rank};
use rand::{rngs::StdRng, seq::SliceRandom};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use serde_aux::field_attributes::{
    deserialize_number_from_string, deserialize_option_number_from_string,
};
use thiserror::Error;
use tracing::info;

/// Games from workers above this id, or with no worker id at all, are
/// dropped by [`filter_suspect_games`] when they also carry an error log.
const WORKER_CUTOFF: u32 = 160;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{}: {source}", .path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// One game as stored in the JSON game files. Numeric fields may be
/// string-encoded in older dumps.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawGame {
    #[serde(
        rename = "gameID",
        deserialize_with = "deserialize_number_from_string"
    )]
    pub game_id: u64,
    #[serde(
        rename = "workerID",
        default,
        deserialize_with = "deserialize_option_number_from_string"
    )]
    pub worker_id: Option<u32>,
    pub users: Vec<RawUser>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawUser {
    pub username: String,
    #[serde(
        rename = "userID",
        deserialize_with = "deserialize_number_from_string"
    )]
    pub user_id: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub rank: u32,
    #[serde(rename = "errorLogName", default)]
    pub error_log_name: Option<String>,
    #[serde(
        rename = "workerID",
        default,
        deserialize_with = "deserialize_option_number_from_string"
    )]
    pub worker_id: Option<u32>,
}

/// The display name players are interned and reported under.
pub fn display_name(user: &RawUser) -> String {
    format!("{} ({})", user.username, user.user_id)
}

/// Load one or more game files, drop duplicate game ids (first occurrence
/// wins) and sort ascending by game id.
pub fn load_games(paths: &[PathBuf]) -> Result<Vec<RawGame>, LoadError> {
    let mut games = Vec::new();
    for path in paths {
        info!("reading {}", path.display());
        let file = File::open(path).map_err(|source| LoadError::Io {
            path: path.clone(),
            source,
        })?;
        let mut part: Vec<RawGame> = serde_json::from_reader(BufReader::new(file))
            .map_err(|source| LoadError::Json {
                path: path.clone(),
                source,
            })?;
        games.append(&mut part);
    }
    dedup_and_sort(&mut games);
    info!("{} games loaded", games.len());
    Ok(games)
}

/// First occurrence of a game id wins; the survivors are sorted ascending
/// by game id.
pub fn dedup_and_sort(games: &mut Vec<RawGame>) {
    let mut seen = FxHashSet::default();
    games.retain(|game| seen.insert(game.game_id));
    games.sort_by_key(|game| game.game_id);
}

fn has_error(game: &RawGame) -> bool {
    game.users.iter().any(|user| user.error_log_name.is_some())
}

/// Drop games in which any participant left an error log.
pub fn filter_error_games(games: &mut Vec<RawGame>) {
    games.retain(|game| !has_error(game));
}

/// Drop games from unknown or above-cutoff workers that also carry an
/// error log.
pub fn filter_suspect_games(games: &mut Vec<RawGame>) {
    games.retain(|game| match game.worker_id {
        Some(worker_id) if worker_id <= WORKER_CUTOFF => true,
        _ => !has_error(game),
    });
}

/// Keep only games touching at least one of the named players.
pub fn filter_in_players(games: &mut Vec<RawGame>, players: &FxHashSet<String>) {
    games.retain(|game| {
        game.users
            .iter()
            .any(|user| players.contains(user.username.as_str()))
    });
}

/// Convert raw games to core records, interning display names and dropping
/// excluded players. Games left with fewer than two participants are
/// discarded.
pub fn to_records(
    games: &[RawGame],
    players: &mut PlayerIds,
    excluded: &FxHashSet<String>,
) -> Vec<GameRecord> {
    games
        .iter()
        .filter_map(|game| {
            let placements: Vec<_> = game
                .users
                .iter()
                .filter(|user| !excluded.contains(user.username.as_str()))
                .map(|user| (players.get_or_insert(&display_name(user)), Rank(user.rank)))
                .collect();
            (placements.len() > 1).then(|| GameRecord::new(game.game_id, placements))
        })
        .collect()
}

/// Keep the first `n` items when `n` is positive, the last `-n` when
/// negative.
pub fn truncate<T>(items: &mut Vec<T>, n: i64) {
    if n > 0 {
        items.truncate(n as usize);
    } else if n < 0 {
        let keep = n.unsigned_abs() as usize;
        if items.len() > keep {
            items.drain(..items.len() - keep);
        }
    }
}

/// Shuffle and split into `parts` sets whose sizes differ by at most one,
/// each re-sorted by game id.
pub fn partition(mut games: Vec<RawGame>, parts: usize, rng: &mut StdRng) -> Vec<Vec<RawGame>> {
    games.shuffle(rng);
    let base = games.len() / parts;
    let excess = games.len() % parts;
    let mut out = Vec::with_capacity(parts);
    let mut rest = games;
    for i in 0..parts {
        let take = base + usize::from(i < excess);
        let tail = rest.split_off(take.min(rest.len()));
        let mut part = rest;
        rest = tail;
        part.sort_by_key(|game| game.game_id);
        out.push(part);
    }
    out
}

/// Randomly select `test_percentage` percent of games for the test set,
/// preserving corpus order in both halves.
pub fn train_test_split(
    games: Vec<RawGame>,
    test_percentage: f64,
    rng: &mut StdRng,
) -> (Vec<RawGame>, Vec<RawGame>) {
    let test_size = (games.len() as f64 * test_percentage / 100.0) as usize;
    let test_ix: FxHashSet<usize> = rand::seq::index::sample(rng, games.len(), test_size)
        .into_iter()
        .collect();
    let mut training = Vec::with_capacity(games.len() - test_size);
    let mut test = Vec::with_capacity(test_size);
    for (i, game) in games.into_iter().enumerate() {
        if test_ix.contains(&i) {
            test.push(game);
        } else {
            training.push(game);
        }
    }
    (training, test)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn user(name: &str, rank: u32) -> RawUser {
        RawUser {
            username: name.to_owned(),
            user_id: name.len() as u64,
            rank,
            error_log_name: None,
            worker_id: None,
        }
    }

    fn game(id: u64, users: &[(&str, u32)]) -> RawGame {
        RawGame {
            game_id: id,
            worker_id: Some(1),
            users: users.iter().map(|&(name, rank)| user(name, rank)).collect(),
        }
    }

    #[test]
    fn parses_string_encoded_numbers() {
        let raw: Vec<RawGame> = serde_json::from_str(
            r#"[{"gameID": "42", "workerID": null, "users":
                [{"username": "ada", "userID": "7", "rank": "1", "errorLogName": null},
                 {"username": "bob", "userID": 9, "rank": 2, "workerID": "3"}]}]"#,
        )
        .unwrap();
        assert_eq!(raw[0].game_id, 42);
        assert_eq!(raw[0].worker_id, None);
        assert_eq!(raw[0].users[0].user_id, 7);
        assert_eq!(raw[0].users[0].rank, 1);
        assert_eq!(raw[0].users[1].worker_id, Some(3));
        assert_eq!(display_name(&raw[0].users[0]), "ada (7)");
    }

    #[test]
    fn dedup_keeps_the_first_occurrence_and_sorts() {
        let mut games = vec![
            game(3, &[("a", 1), ("b", 2)]),
            game(1, &[("c", 1), ("d", 2)]),
            game(3, &[("x", 1), ("y", 2)]),
        ];
        dedup_and_sort(&mut games);
        assert_eq!(games.len(), 2);
        assert_eq!(games[0].game_id, 1);
        assert_eq!(games[1].game_id, 3);
        assert_eq!(games[1].users[0].username, "a");
    }

    #[test]
    fn error_and_suspect_filters() {
        let mut flagged = game(1, &[("a", 1), ("b", 2)]);
        flagged.users[1].error_log_name = Some("crash.log".to_owned());

        let mut games = vec![flagged.clone(), game(2, &[("a", 1), ("b", 2)])];
        filter_error_games(&mut games);
        assert_eq!(games.len(), 1);
        assert_eq!(games[0].game_id, 2);

        // Trusted worker: the error log alone does not make a game suspect.
        let mut trusted = flagged.clone();
        trusted.worker_id = Some(WORKER_CUTOFF);
        let mut late = flagged.clone();
        late.game_id = 3;
        late.worker_id = Some(WORKER_CUTOFF + 1);
        let mut unknown = flagged;
        unknown.game_id = 4;
        unknown.worker_id = None;
        let mut games = vec![trusted, late, unknown];
        filter_suspect_games(&mut games);
        assert_eq!(games.len(), 1);
        assert_eq!(games[0].game_id, 1);
    }

    #[test]
    fn include_filter_keeps_games_touching_a_named_player() {
        let mut games = vec![
            game(1, &[("a", 1), ("b", 2)]),
            game(2, &[("c", 1), ("d", 2)]),
        ];
        let keep: FxHashSet<String> = ["c".to_owned()].into_iter().collect();
        filter_in_players(&mut games, &keep);
        assert_eq!(games.len(), 1);
        assert_eq!(games[0].game_id, 2);
    }

    #[test]
    fn records_drop_excluded_players_and_tiny_games() {
        let games = vec![
            game(1, &[("a", 1), ("b", 2), ("c", 3)]),
            game(2, &[("a", 1), ("b", 2)]),
        ];
        let mut players = PlayerIds::default();
        let excluded: FxHashSet<String> = ["b".to_owned()].into_iter().collect();
        let records = to_records(&games, &mut players, &excluded);
        // Game 2 shrinks below two players and is dropped.
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].player_count(), 2);
        assert!(players.get("b (1)").is_none());
        assert!(players.get("a (1)").is_some());
    }

    #[test]
    fn truncate_keeps_first_or_last() {
        let mut first = vec![1, 2, 3, 4, 5];
        truncate(&mut first, 2);
        assert_eq!(first, vec![1, 2]);

        let mut last = vec![1, 2, 3, 4, 5];
        truncate(&mut last, -2);
        assert_eq!(last, vec![4, 5]);

        let mut all = vec![1, 2];
        truncate(&mut all, -5);
        assert_eq!(all, vec![1, 2]);
    }

    #[test]
    fn partition_is_balanced_and_sorted() {
        let games: Vec<RawGame> = (0..23).map(|id| game(id, &[("a", 1), ("b", 2)])).collect();
        let mut rng = StdRng::seed_from_u64(7);
        let parts = partition(games, 5, &mut rng);
        assert_eq!(parts.len(), 5);
        assert_eq!(parts.iter().map(Vec::len).sum::<usize>(), 23);
        let max = parts.iter().map(Vec::len).max().unwrap();
        let min = parts.iter().map(Vec::len).min().unwrap();
        assert!(max - min <= 1);

        let mut seen = FxHashSet::default();
        for part in &parts {
            for pair in part.windows(2) {
                assert!(pair[0].game_id < pair[1].game_id);
            }
            for game in part {
                assert!(seen.insert(game.game_id));
            }
        }
        assert_eq!(seen.len(), 23);
    }

    #[test]
    fn split_respects_the_test_percentage_and_order() {
        let games: Vec<RawGame> = (0..100).map(|id| game(id, &[("a", 1), ("b", 2)])).collect();
        let mut rng = StdRng::seed_from_u64(11);
        let (training, test) = train_test_split(games, 10.0, &mut rng);
        assert_eq!(test.len(), 10);
        assert_eq!(training.len(), 90);
        for half in [&training, &test] {
            for pair in half.windows(2) {
                assert!(pair[0].game_id < pair[1].game_id);
            }
        }
    }
}
