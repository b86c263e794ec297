#![no_main]

use arbitrary::Arbitrary;
use ffarank::{GameRecord, PlayerIds, Rank, UpdateRule, WengLin};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct ArbitraryCorpus {
    pooled: bool,
    games: Vec<Vec<(u8, u8)>>,
}

fuzz_target!(|corpus: ArbitraryCorpus| {
    let mut players = PlayerIds::default();
    let ids: Vec<_> = (0..16)
        .map(|i| players.get_or_insert(&format!("p{i}")))
        .collect();

    let mut records = Vec::new();
    for (id, game) in corpus.games.iter().take(64).enumerate() {
        let mut placements = Vec::new();
        for &(player, rank) in game.iter().take(8) {
            let player = ids[usize::from(player % 16)];
            if placements.iter().all(|&(p, _)| p != player) {
                placements.push((player, Rank(u32::from(rank % 8) + 1)));
            }
        }
        if placements.len() >= 2 {
            records.push(GameRecord::new(id as u64, placements));
        }
    }

    let rule = if corpus.pooled {
        UpdateRule::PlackettLuce
    } else {
        UpdateRule::BradleyTerry
    };
    let weng_lin = WengLin::new(rule);
    let mut ratings = weng_lin.new_table();
    weng_lin.rate(&mut ratings, &records);

    for (_, rating) in ratings.iter() {
        assert!(rating.mu.is_finite());
        assert!(rating.sigma.is_finite());
        assert!(rating.sigma > 0.0);
    }
});
