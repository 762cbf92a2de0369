//! Blocking priority queue feeding the processing pool.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use parking_lot::{Condvar, Mutex};

use super::request::{ChunkTask, TaskKind};

#[derive(Debug)]
struct Entry {
    key: i32,
    seq: u64,
    task: ChunkTask,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.seq == other.seq
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    // `BinaryHeap` is a max-heap: the lowest key, then the oldest entry, wins.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .key
            .cmp(&self.key)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Debug, Default)]
struct Heap {
    entries: BinaryHeap<Entry>,
    next_seq: u64,
}

/// Tasks ordered by a relevance key captured when they are pushed.
/// Lower keys run first.
#[derive(Debug, Default)]
pub struct TaskQueue {
    heap: Mutex<Heap>,
    available: Condvar,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, task: ChunkTask, key: i32) {
        let mut heap = self.heap.lock();
        let seq = heap.next_seq;
        heap.next_seq += 1;
        heap.entries.push(Entry { key, seq, task });
        drop(heap);
        self.available.notify_one();
    }

    /// Blocks until a task is available.
    pub fn take(&self) -> ChunkTask {
        let mut heap = self.heap.lock();
        loop {
            if let Some(entry) = heap.entries.pop() {
                return entry.task;
            }
            self.available.wait(&mut heap);
        }
    }

    pub fn try_take(&self) -> Option<ChunkTask> {
        self.heap.lock().entries.pop().map(|entry| entry.task)
    }

    pub fn len(&self) -> usize {
        self.heap.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Recomputes every key. Shutdown tasks keep theirs.
    pub fn rescore(&self, score: impl Fn(&ChunkTask) -> i32) {
        let mut heap = self.heap.lock();
        let entries = std::mem::take(&mut heap.entries);
        heap.entries = entries
            .into_iter()
            .map(|mut entry| {
                if entry.task.kind != TaskKind::Shutdown {
                    entry.key = score(&entry.task);
                }
                entry
            })
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use glam::IVec3;

    use super::*;

    fn task(x: i32) -> ChunkTask {
        ChunkTask::new(TaskKind::Generate, IVec3::new(x, 0, 0))
    }

    #[test]
    fn test_lowest_key_first_then_fifo() {
        let queue = TaskQueue::new();
        queue.push(task(1), 10);
        queue.push(task(2), 3);
        queue.push(task(3), 3);
        queue.push(task(4), i32::MAX);
        assert_eq!(queue.len(), 4);
        assert_eq!(queue.take(), task(2));
        assert_eq!(queue.take(), task(3));
        assert_eq!(queue.take(), task(1));
        assert_eq!(queue.take(), task(4));
        assert!(queue.try_take().is_none());
    }

    #[test]
    fn test_rescore_reorders() {
        let queue = TaskQueue::new();
        queue.push(task(5), 0);
        queue.push(task(1), 9);
        queue.push(ChunkTask::shutdown(), i32::MIN);
        queue.rescore(|t| t.pos.x);
        assert_eq!(queue.take(), ChunkTask::shutdown());
        assert_eq!(queue.take(), task(1));
        assert_eq!(queue.take(), task(5));
    }

    #[test]
    fn test_take_blocks_until_push() {
        let queue = Arc::new(TaskQueue::new());
        let consumer = {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || queue.take())
        };
        std::thread::sleep(Duration::from_millis(20));
        queue.push(task(7), 0);
        assert_eq!(consumer.join().unwrap(), task(7));
    }
}
