use rustc_hash::FxHashMap;

/// A 1-based finishing position within a single game. Lower is better, and
/// equal ranks are true ties.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Rank(pub u32);

impl Rank {
    pub const FIRST: Rank = Rank(1);
}

impl From<Rank> for u32 {
    #[inline]
    fn from(Rank(rank): Rank) -> u32 {
        rank
    }
}

/// Compact handle for a player, minted by [`PlayerIds`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct PlayerId(pub(crate) usize);

/// Interns display names to dense [`PlayerId`]s and back.
#[derive(Debug, Default)]
pub struct PlayerIds {
    ids: FxHashMap<Box<str>, PlayerId>,
    names: Vec<Box<str>>,
}

impl PlayerIds {
    pub fn get_or_insert(&mut self, name: &str) -> PlayerId {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }
        let id = PlayerId(self.names.len());
        self.names.push(Box::from(name));
        self.ids.insert(Box::from(name), id);
        id
    }

    pub fn get(&self, name: &str) -> Option<PlayerId> {
        self.ids.get(name).copied()
    }

    pub fn name(&self, PlayerId(id): PlayerId) -> &str {
        &self.names[id]
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PlayerId, &str)> {
        self.names
            .iter()
            .enumerate()
            .map(|(id, name)| (PlayerId(id), &**name))
    }
}

/// Dense table keyed by [`PlayerId`].
#[derive(Debug, Clone)]
pub struct ByPlayerId<T> {
    inner: Vec<Option<T>>,
}

impl<T> Default for ByPlayerId<T> {
    fn default() -> Self {
        ByPlayerId { inner: Vec::new() }
    }
}

impl<T> ByPlayerId<T> {
    pub fn get(&self, PlayerId(id): PlayerId) -> Option<&T> {
        match self.inner.get(id) {
            Some(Some(t)) => Some(t),
            _ => None,
        }
    }

    pub fn get_mut_or_insert_with<F>(&mut self, PlayerId(id): PlayerId, f: F) -> &mut T
    where
        F: FnOnce() -> T,
    {
        if self.inner.len() <= id {
            self.inner.resize_with(id + 1, || None);
        }
        self.inner[id].get_or_insert_with(f)
    }

    pub fn set(&mut self, PlayerId(id): PlayerId, value: T) {
        if self.inner.len() <= id {
            self.inner.resize_with(id + 1, || None);
        }
        self.inner[id] = Some(value);
    }

    pub fn remove(&mut self, PlayerId(id): PlayerId) -> Option<T> {
        self.inner.get_mut(id).and_then(Option::take)
    }

    /// Number of occupied slots.
    pub fn count(&self) -> usize {
        self.inner.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PlayerId, &T)> {
        self.inner
            .iter()
            .enumerate()
            .filter_map(|(id, slot)| slot.as_ref().map(|t| (PlayerId(id), t)))
    }
}

/// One finished game: a corpus-unique id and the participants with their
/// finishing ranks, in load order.
#[derive(Debug, Clone)]
pub struct GameRecord {
    id: u64,
    placements: Vec<(PlayerId, Rank)>,
}

impl GameRecord {
    pub fn new(id: u64, placements: Vec<(PlayerId, Rank)>) -> GameRecord {
        GameRecord { id, placements }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn placements(&self) -> &[(PlayerId, Rank)] {
        &self.placements
    }

    pub fn player_count(&self) -> usize {
        self.placements.len()
    }

    pub fn rank_of(&self, player: PlayerId) -> Option<Rank> {
        self.placements
            .iter()
            .find(|&&(p, _)| p == player)
            .map(|&(_, rank)| rank)
    }

    /// The numerically largest rank in the game, shared by everyone tied for
    /// last place.
    pub fn worst_rank(&self) -> Option<Rank> {
        self.placements.iter().map(|&(_, rank)| rank).max()
    }

    pub(crate) fn max_player_index(&self) -> Option<usize> {
        self.placements.iter().map(|&(PlayerId(id), _)| id).max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interner_round_trips_names() {
        let mut players = PlayerIds::default();
        let a = players.get_or_insert("alice (1)");
        let b = players.get_or_insert("bob (2)");
        assert_ne!(a, b);
        assert_eq!(players.get_or_insert("alice (1)"), a);
        assert_eq!(players.name(a), "alice (1)");
        assert_eq!(players.name(b), "bob (2)");
        assert_eq!(players.len(), 2);
    }

    #[test]
    fn by_player_id_inserts_and_removes() {
        let mut players = PlayerIds::default();
        let a = players.get_or_insert("a");
        let b = players.get_or_insert("b");

        let mut table = ByPlayerId::default();
        table.set(b, 2.0);
        assert_eq!(table.get(a), None);
        *table.get_mut_or_insert_with(a, || 1.0) += 0.5;
        assert_eq!(table.get(a), Some(&1.5));
        assert_eq!(table.count(), 2);
        assert_eq!(table.remove(b), Some(2.0));
        assert_eq!(table.get(b), None);
    }

    #[test]
    fn worst_rank_honors_ties() {
        let mut players = PlayerIds::default();
        let a = players.get_or_insert("a");
        let b = players.get_or_insert("b");
        let c = players.get_or_insert("c");
        let game = GameRecord::new(7, vec![(a, Rank(1)), (b, Rank(2)), (c, Rank(2))]);
        assert_eq!(game.worst_rank(), Some(Rank(2)));
        assert_eq!(game.rank_of(c), Some(Rank(2)));
    }
}
