//! Play order: references into the playlist in the order they will be played.
//!
//! Equal to playlist order unless random mode is on, in which case it is shuffled
//! independently of the playlist.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::song::SongId;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PlayQueue {
    order: Vec<SongId>,
}

impl PlayQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn ids(&self) -> &[SongId] {
        &self.order
    }

    pub fn first(&self) -> Option<SongId> {
        self.order.first().copied()
    }

    pub fn last(&self) -> Option<SongId> {
        self.order.last().copied()
    }

    pub fn get(&self, index: usize) -> Option<SongId> {
        self.order.get(index).copied()
    }

    pub fn contains(&self, id: SongId) -> bool {
        self.order.contains(&id)
    }

    pub fn position(&self, id: SongId) -> Option<usize> {
        self.order.iter().position(|entry| *entry == id)
    }

    /// Replace the order with `ids`, shuffled when `random` is set. `front` (when present in
    /// `ids`) is placed first after shuffling.
    pub fn rebuild<R: Rng + ?Sized>(
        &mut self,
        ids: impl IntoIterator<Item = SongId>,
        random: bool,
        front: Option<SongId>,
        rng: &mut R,
    ) {
        self.order = ids.into_iter().collect();
        if random {
            self.shuffle(front, rng);
        }
    }

    /// Shuffle in place, optionally pinning `front` to the first slot.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, front: Option<SongId>, rng: &mut R) {
        self.order.shuffle(rng);
        if let Some(idx) = front.and_then(|id| self.position(id)) {
            self.order.swap(0, idx);
        }
    }

    /// Reshuffle for another pass, keeping `avoid` out of the first slot so a wrap does
    /// not replay the song that just finished.
    pub fn reshuffle_avoiding<R: Rng + ?Sized>(&mut self, avoid: Option<SongId>, rng: &mut R) {
        self.order.shuffle(rng);
        if self.order.len() > 1 && self.order.first().copied() == avoid {
            let swap_with = rng.gen_range(1..self.order.len());
            self.order.swap(0, swap_with);
        }
    }

    /// Add `id` at a uniformly random slot.
    pub fn insert_random<R: Rng + ?Sized>(&mut self, id: SongId, rng: &mut R) {
        let at = rng.gen_range(0..=self.order.len());
        self.order.insert(at, id);
    }

    pub fn push(&mut self, id: SongId) {
        self.order.push(id);
    }

    pub fn remove(&mut self, id: SongId) -> bool {
        match self.position(id) {
            Some(idx) => {
                self.order.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn ids(raw: &[u32]) -> Vec<SongId> {
        raw.iter().copied().map(SongId).collect()
    }

    fn sorted(queue: &PlayQueue) -> Vec<SongId> {
        let mut ids = queue.ids().to_vec();
        ids.sort();
        ids
    }

    #[test]
    fn rebuild_in_order_without_random() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut queue = PlayQueue::new();
        queue.rebuild(ids(&[3, 1, 2]), false, None, &mut rng);
        assert_eq!(queue.ids(), ids(&[3, 1, 2]).as_slice());
    }

    #[test]
    fn random_rebuild_keeps_membership_and_front() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut queue = PlayQueue::new();
        for _ in 0..20 {
            queue.rebuild(ids(&[1, 2, 3, 4, 5, 6]), true, Some(SongId(4)), &mut rng);
            assert_eq!(queue.first(), Some(SongId(4)));
            assert_eq!(sorted(&queue), ids(&[1, 2, 3, 4, 5, 6]));
        }
    }

    #[test]
    fn reshuffle_never_starts_with_avoided_song() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut queue = PlayQueue::new();
        queue.rebuild(ids(&[1, 2]), false, None, &mut rng);
        for _ in 0..50 {
            queue.reshuffle_avoiding(Some(SongId(2)), &mut rng);
            assert_eq!(queue.first(), Some(SongId(1)));
        }
    }

    #[test]
    fn insert_random_and_remove() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut queue = PlayQueue::new();
        for id in 1..=10 {
            queue.insert_random(SongId(id), &mut rng);
        }
        assert_eq!(sorted(&queue), (1..=10).map(SongId).collect::<Vec<_>>());
        assert!(queue.remove(SongId(5)));
        assert!(!queue.remove(SongId(5)));
        assert!(!queue.contains(SongId(5)));
        assert_eq!(queue.len(), 9);
    }
}
