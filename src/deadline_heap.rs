//! Binary min-heap keyed on deadline end.

use crate::model::Task;

/// Anything that can be ordered by when it is due.
pub trait HasDeadline {
    /// Deadline end, epoch seconds.
    fn deadline(&self) -> i64;
}

impl HasDeadline for Task {
    fn deadline(&self) -> i64 {
        self.deadline.end
    }
}

impl<T: HasDeadline> HasDeadline for &T {
    fn deadline(&self) -> i64 {
        (**self).deadline()
    }
}

/// Earliest deadline first. Order among equal deadlines is unspecified.
#[derive(Debug, Clone)]
pub struct DeadlineHeap<T> {
    heap: Vec<T>,
}

impl<T> Default for DeadlineHeap<T> {
    fn default() -> Self {
        Self { heap: Vec::new() }
    }
}

impl<T: HasDeadline> DeadlineHeap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            heap: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn peek(&self) -> Option<&T> {
        self.heap.first()
    }

    pub fn insert(&mut self, item: T) {
        self.heap.push(item);
        self.sift_up(self.heap.len() - 1);
    }

    pub fn extract_min(&mut self) -> Option<T> {
        if self.heap.is_empty() {
            return None;
        }

        let min = self.heap.swap_remove(0);
        if !self.heap.is_empty() {
            self.sift_down(0);
        }
        Some(min)
    }

    fn sift_up(&mut self, mut index: usize) {
        while index > 0 {
            let parent = (index - 1) / 2;
            if self.heap[index].deadline() >= self.heap[parent].deadline() {
                break;
            }
            self.heap.swap(index, parent);
            index = parent;
        }
    }

    fn sift_down(&mut self, mut index: usize) {
        let len = self.heap.len();
        loop {
            let left = 2 * index + 1;
            let right = left + 1;
            let mut smallest = index;

            if left < len && self.heap[left].deadline() < self.heap[smallest].deadline() {
                smallest = left;
            }
            if right < len && self.heap[right].deadline() < self.heap[smallest].deadline() {
                smallest = right;
            }
            if smallest == index {
                break;
            }

            self.heap.swap(index, smallest);
            index = smallest;
        }
    }
}

impl<T: HasDeadline> FromIterator<T> for DeadlineHeap<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut heap = DeadlineHeap::new();
        for item in iter {
            heap.insert(item);
        }
        heap
    }
}

/// Drains in deadline order.
impl<T: HasDeadline> Iterator for DeadlineHeap<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.extract_min()
    }
}
