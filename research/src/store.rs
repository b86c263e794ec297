//! Stored rating files and console tables.
//!
//! Rating files are header-less CSV. Plackett-Luce files hold
//! `rank,score,player` rows with normalized scores; Weng-Lin and TrueSkill
//! files hold `rank,player,score,mu,sigma` rows where `score` is the
//! conservative `mu - 3*sigma` estimate used for ranking. Files do not
//! encode which system produced them, so loaders require the kind up front
//! and validate the column count against it.

use std::{cmp::Reverse, fmt, io, io::Write, num::ParseFloatError, str::FromStr};

use csv::StringRecord;
use ffarank::{PlRatings, PlayerId, PlayerIds};
use ordered_float::OrderedFloat;
use thiserror::Error;

/// Which system produced a rating file.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RatingKind {
    PlackettLuce,
    WengLin,
    TrueSkill,
}

impl fmt::Display for RatingKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            RatingKind::PlackettLuce => "pl",
            RatingKind::WengLin => "wl",
            RatingKind::TrueSkill => "ts",
        })
    }
}

#[derive(Debug, Error)]
#[error("invalid rating kind (expected pl, wl or ts)")]
pub struct InvalidRatingKind;

impl FromStr for RatingKind {
    type Err = InvalidRatingKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "pl" => RatingKind::PlackettLuce,
            "wl" => RatingKind::WengLin,
            "ts" => RatingKind::TrueSkill,
            _ => return Err(InvalidRatingKind),
        })
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error("record {record}: expected {expected} fields in a {kind} rating file, found {found}")]
    Fields {
        record: u64,
        kind: RatingKind,
        expected: usize,
        found: usize,
    },
    #[error("record {record}: {source}")]
    Number {
        record: u64,
        source: ParseFloatError,
    },
}

/// Write `rank,score,player` rows, best first, scores normalized to a unit
/// sum over the whole table.
pub fn write_pl_ratings<W: Write>(
    mut writer: W,
    players: &PlayerIds,
    ratings: &PlRatings,
) -> io::Result<()> {
    let mut rows: Vec<(PlayerId, f64)> = ratings.normalized().iter().collect();
    rows.sort_by_key(|&(_, gamma)| Reverse(OrderedFloat(gamma)));
    for (rank, &(player, gamma)) in rows.iter().enumerate() {
        writeln!(writer, "{},{:e},{}", rank + 1, gamma, players.name(player))?;
    }
    Ok(())
}

/// Write `rank,player,score,mu,sigma` rows with the conservative
/// `mu - 3*sigma` score, best first. `rows` holds `(name, mu, sigma)`.
pub fn write_score_ratings<W: Write>(
    mut writer: W,
    mut rows: Vec<(String, f64, f64)>,
) -> io::Result<()> {
    rows.sort_by_key(|row| Reverse(OrderedFloat(row.1 - 3.0 * row.2)));
    for (rank, (name, mu, sigma)) in rows.iter().enumerate() {
        writeln!(
            writer,
            "{},{},{:.6},{},{}",
            rank + 1,
            name,
            mu - 3.0 * sigma,
            mu,
            sigma
        )?;
    }
    Ok(())
}

fn reader<R: io::Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader)
}

fn parse_float(record: &StringRecord, field: usize, row: u64) -> Result<f64, StoreError> {
    record[field]
        .trim()
        .parse()
        .map_err(|source| StoreError::Number { record: row, source })
}

/// Load a Plackett-Luce rating file as `(player, score)` rows.
pub fn load_pl_ratings<R: io::Read>(input: R) -> Result<Vec<(String, f64)>, StoreError> {
    let mut out = Vec::new();
    for (i, record) in reader(input).records().enumerate() {
        let record = record?;
        let row = i as u64 + 1;
        if record.len() != 3 {
            return Err(StoreError::Fields {
                record: row,
                kind: RatingKind::PlackettLuce,
                expected: 3,
                found: record.len(),
            });
        }
        let score = parse_float(&record, 1, row)?;
        out.push((record[2].trim().to_owned(), score));
    }
    Ok(out)
}

/// Load a Weng-Lin or TrueSkill rating file as `(player, mu, sigma)` rows.
pub fn load_scored_ratings<R: io::Read>(
    input: R,
    kind: RatingKind,
) -> Result<Vec<(String, f64, f64)>, StoreError> {
    let mut out = Vec::new();
    for (i, record) in reader(input).records().enumerate() {
        let record = record?;
        let row = i as u64 + 1;
        if record.len() != 5 {
            return Err(StoreError::Fields {
                record: row,
                kind,
                expected: 5,
                found: record.len(),
            });
        }
        let mu = parse_float(&record, 3, row)?;
        let sigma = parse_float(&record, 4, row)?;
        out.push((record[1].trim().to_owned(), mu, sigma));
    }
    Ok(out)
}

/// Print the top of the Plackett-Luce table the way the analysis scripts
/// always have: truncate first, then normalize over the displayed subset.
pub fn print_pl_table(players: &PlayerIds, ratings: &PlRatings, limit: usize) {
    let mut rows: Vec<(PlayerId, f64)> = ratings.iter().collect();
    rows.sort_by_key(|&(_, gamma)| Reverse(OrderedFloat(gamma)));
    if limit > 0 {
        rows.truncate(limit);
    }
    let total: f64 = rows.iter().map(|&(_, gamma)| gamma).sum();
    for (rank, &(player, gamma)) in rows.iter().enumerate() {
        println!("{}: {:.4} - {}", rank + 1, gamma / total, players.name(player));
    }
}

/// Print a width-aligned conservative-score table. `rows` holds
/// `(name, mu, sigma)`.
pub fn print_score_table(mut rows: Vec<(String, f64, f64)>, limit: usize) {
    rows.sort_by_key(|row| Reverse(OrderedFloat(row.1 - 3.0 * row.2)));
    if limit > 0 {
        rows.truncate(limit);
    }
    if rows.is_empty() {
        return;
    }
    let rank_width = rows.len().ilog10() as usize + 1;
    let name_width = rows.iter().map(|row| row.0.len()).max().unwrap_or(0);
    for (rank, (name, mu, sigma)) in rows.iter().enumerate() {
        println!(
            "{:>rank_width$}: {:>name_width$} {:.2} ({:.2}, {:.2})",
            rank + 1,
            name,
            mu - 3.0 * sigma,
            mu,
            sigma
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_kind_round_trips_through_strings() {
        for kind in [RatingKind::PlackettLuce, RatingKind::WengLin, RatingKind::TrueSkill] {
            assert_eq!(kind.to_string().parse::<RatingKind>().unwrap(), kind);
        }
        assert!("elo".parse::<RatingKind>().is_err());
    }

    #[test]
    fn pl_files_round_trip_normalized() {
        let mut players = PlayerIds::default();
        let a = players.get_or_insert("ada (7)");
        let b = players.get_or_insert("bob (9)");
        let mut ratings = PlRatings::default();
        ratings.set(a, 3.0);
        ratings.set(b, 1.0);

        let mut buffer = Vec::new();
        write_pl_ratings(&mut buffer, &players, &ratings).unwrap();
        let rows = load_pl_ratings(&buffer[..]).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0, "ada (7)");
        assert!((rows[0].1 - 0.75).abs() < 1e-12);
        assert_eq!(rows[1].0, "bob (9)");
        assert!((rows[1].1 - 0.25).abs() < 1e-12);
    }

    #[test]
    fn scored_files_round_trip_sorted_by_conservative_score() {
        let rows = vec![
            ("bob (9)".to_owned(), 20.0, 1.0),
            ("ada (7)".to_owned(), 25.0, 2.0),
        ];
        let mut buffer = Vec::new();
        write_score_ratings(&mut buffer, rows).unwrap();
        let loaded = load_scored_ratings(&buffer[..], RatingKind::WengLin).unwrap();
        // ada: 25 - 6 = 19, bob: 20 - 3 = 17.
        assert_eq!(loaded[0], ("ada (7)".to_owned(), 25.0, 2.0));
        assert_eq!(loaded[1], ("bob (9)".to_owned(), 20.0, 1.0));
    }

    #[test]
    fn loaders_reject_the_wrong_column_count() {
        let pl = b"1,0.5,ada\n" as &[u8];
        assert!(load_pl_ratings(pl).is_ok());
        assert!(matches!(
            load_scored_ratings(pl, RatingKind::WengLin),
            Err(StoreError::Fields { expected: 5, found: 3, .. })
        ));

        let wl = b"1,ada,19.0,25.0,2.0\n" as &[u8];
        assert!(load_scored_ratings(wl, RatingKind::WengLin).is_ok());
        assert!(matches!(
            load_pl_ratings(wl),
            Err(StoreError::Fields { expected: 3, found: 5, .. })
        ));
    }

    #[test]
    fn loaders_surface_bad_numbers() {
        let pl = b"1,not-a-number,ada\n" as &[u8];
        assert!(matches!(
            load_pl_ratings(pl),
            Err(StoreError::Number { record: 1, .. })
        ));
    }
}
