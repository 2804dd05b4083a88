use super::types::Scored;

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Heap entry ordered so that `BinaryHeap` (a max-heap) keeps the lowest score at the root.
struct MinByScore<T>(T);

impl<T: Scored> PartialEq for MinByScore<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T: Scored> Eq for MinByScore<T> {}

impl<T: Scored> PartialOrd for MinByScore<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: Scored> Ord for MinByScore<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        other.0.score().total_cmp(&self.0.score())
    }
}

/// Bounded collection of the `k` highest-scoring items offered to it.
///
/// An item only displaces the current minimum when its score is strictly
/// greater, so ties at the boundary keep whatever arrived first.
pub struct TopK<T> {
    k: usize,
    heap: BinaryHeap<MinByScore<T>>,
}

impl<T: Scored> TopK<T> {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            heap: BinaryHeap::with_capacity(k),
        }
    }

    /// Offers an item; returns whether it was kept.
    pub fn push(&mut self, item: T) -> bool {
        if self.k == 0 {
            return false;
        }
        if self.heap.len() < self.k {
            self.heap.push(MinByScore(item));
            return true;
        }

        match self.heap.peek() {
            Some(min) if item.score() > min.0.score() => {
                self.heap.pop();
                self.heap.push(MinByScore(item));
                true
            }
            _ => false,
        }
    }

    /// Lowest score currently retained.
    pub fn min_score(&self) -> Option<f32> {
        self.heap.peek().map(|e| e.0.score())
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Retained items, highest score first.
    pub fn into_sorted_vec(self) -> Vec<T> {
        let mut items: Vec<T> = self.heap.into_iter().map(|e| e.0).collect();
        items.sort_by(|a, b| b.score().total_cmp(&a.score()));
        items
    }
}

impl<T: Scored> Extend<T> for TopK<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.push(item);
        }
    }
}
