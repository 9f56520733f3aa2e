//! Explicit delayed-retry scheduler: a timer-indexed priority structure.
//! Portable across transports; replaces the requeue-to-a-TTL-queue trick.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::Duration;

use tokio::time::Instant;

struct Entry<T> {
    due: Instant,
    seq: u64,
    item: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.due.cmp(&other.due).then(self.seq.cmp(&other.seq))
    }
}

pub struct DelayedRetryScheduler<T> {
    heap: BinaryHeap<Reverse<Entry<T>>>,
    seq: u64,
}

impl<T> Default for DelayedRetryScheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> DelayedRetryScheduler<T> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            seq: 0,
        }
    }

    pub fn schedule(&mut self, delay: Duration, item: T) {
        self.seq += 1;
        self.heap.push(Reverse(Entry {
            due: Instant::now() + delay,
            seq: self.seq,
            item,
        }));
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Sleep until the earliest entry is due, then pop it. Callers must not
    /// await this on an empty scheduler (guard with `is_empty`); cancelling
    /// mid-sleep leaves the entry queued.
    pub async fn next_due(&mut self) -> T {
        loop {
            let due = match self.heap.peek() {
                Some(Reverse(entry)) => entry.due,
                None => {
                    // Nothing scheduled: park until the caller cancels us.
                    std::future::pending::<()>().await;
                    continue;
                }
            };
            tokio::time::sleep_until(due).await;
            if let Some(Reverse(entry)) = self.heap.pop() {
                return entry.item;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_in_due_order_not_insertion_order() {
        let mut scheduler = DelayedRetryScheduler::new();
        scheduler.schedule(Duration::from_millis(40), "slow");
        scheduler.schedule(Duration::from_millis(5), "fast");
        assert_eq!(scheduler.len(), 2);
        assert_eq!(scheduler.next_due().await, "fast");
        assert_eq!(scheduler.next_due().await, "slow");
        assert!(scheduler.is_empty());
    }

    #[tokio::test]
    async fn equal_deadlines_pop_in_schedule_order() {
        let mut scheduler = DelayedRetryScheduler::new();
        scheduler.schedule(Duration::from_millis(1), 1);
        scheduler.schedule(Duration::from_millis(1), 2);
        scheduler.schedule(Duration::from_millis(1), 3);
        assert_eq!(scheduler.next_due().await, 1);
        assert_eq!(scheduler.next_due().await, 2);
        assert_eq!(scheduler.next_due().await, 3);
    }

    #[tokio::test]
    async fn waits_for_the_deadline() {
        let mut scheduler = DelayedRetryScheduler::new();
        let start = Instant::now();
        scheduler.schedule(Duration::from_millis(30), ());
        scheduler.next_due().await;
        assert!(start.elapsed() >= Duration::from_millis(25));
    }
}
