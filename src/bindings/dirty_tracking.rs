/*!
Pending-change queues.

Resources collect changes on the CPU and flush them at the next activation.  The queue keeps
entries in arrival order; a "full replace" entry discards everything queued before it, since a
full upload supersedes every earlier partial write.
*/

use std::collections::VecDeque;

#[derive(Debug)]
pub(crate) struct PendingQueue<T> {
    entries: VecDeque<T>,
}

impl<T> PendingQueue<T> {
    pub(crate) fn new() -> Self {
        PendingQueue {
            entries: VecDeque::new(),
        }
    }

    /// Appends a change after everything already queued.
    pub(crate) fn push(&mut self, entry: T) {
        self.entries.push_back(entry);
    }

    /// Discards everything queued and queues `entry` alone.
    pub(crate) fn replace(&mut self, entry: T) {
        self.entries.clear();
        self.entries.push_back(entry);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    /// Removes and yields every entry in FIFO order.
    pub(crate) fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.entries.drain(..)
    }

    /// Puts entries back at the front, keeping their order.  Used when a flush stops partway.
    pub(crate) fn requeue_front(&mut self, entries: Vec<T>) {
        for entry in entries.into_iter().rev() {
            self.entries.push_front(entry);
        }
    }
}

impl<T> Default for PendingQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::PendingQueue;

    #[test]
    fn fifo_and_replace() {
        let mut q = PendingQueue::new();
        q.push(1);
        q.push(2);
        assert_eq!(q.drain().collect::<Vec<_>>(), vec![1, 2]);
        assert!(q.is_empty());
        q.push(3);
        q.push(4);
        q.replace(5);
        q.push(6);
        assert_eq!(q.len(), 2);
        assert_eq!(q.iter().copied().collect::<Vec<_>>(), vec![5, 6]);
    }

    #[test]
    fn requeue() {
        let mut q = PendingQueue::new();
        q.push(3);
        q.requeue_front(vec![1, 2]);
        assert_eq!(q.drain().collect::<Vec<_>>(), vec![1, 2, 3]);
    }
}
