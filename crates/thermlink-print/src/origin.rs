// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Delivery of job callbacks onto the thread that submitted the job.
//
// Workers never call listeners directly. They post closures to an
// `OriginContext`; the origin thread runs them in posting order.

use tokio::sync::mpsc;
use tracing::debug;

/// A callback waiting to run on the origin thread.
pub type OriginTask = Box<dyn FnOnce() + Send + 'static>;

/// Sink that schedules work onto the origin thread. `post` must not block.
pub trait OriginContext: Send + Sync {
    fn post(&self, task: OriginTask);
}

/// Posting half of a FIFO origin queue. Cheap to clone.
#[derive(Clone)]
pub struct OriginQueue {
    tx: mpsc::UnboundedSender<OriginTask>,
}

/// Draining half, owned by the origin thread.
pub struct OriginLoop {
    rx: mpsc::UnboundedReceiver<OriginTask>,
}

impl OriginQueue {
    pub fn new() -> (OriginQueue, OriginLoop) {
        let (tx, rx) = mpsc::unbounded_channel();
        (OriginQueue { tx }, OriginLoop { rx })
    }
}

impl OriginContext for OriginQueue {
    fn post(&self, task: OriginTask) {
        if self.tx.send(task).is_err() {
            debug!("origin loop dropped, discarding callback");
        }
    }
}

impl OriginLoop {
    /// Run every callback already queued without waiting. Returns how many ran.
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.rx.try_recv() {
            task();
            ran += 1;
        }
        ran
    }

    /// Wait for the next callback and run it. `false` once every
    /// `OriginQueue` is gone and the queue is empty.
    pub async fn next(&mut self) -> bool {
        match self.rx.recv().await {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    /// Blocking form of [`next`](Self::next) for a plain origin thread.
    /// Panics if called from inside an async runtime.
    pub fn blocking_next(&mut self) -> bool {
        match self.rx.blocking_recv() {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn tasks_run_in_posting_order() {
        let (queue, mut origin) = OriginQueue::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for i in 0..5 {
            let seen = Arc::clone(&seen);
            queue.post(Box::new(move || seen.lock().unwrap().push(i)));
        }

        assert_eq!(origin.run_pending(), 5);
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3, 4]);
        assert_eq!(origin.run_pending(), 0);
    }

    #[test]
    fn posting_after_loop_is_dropped_is_harmless() {
        let (queue, origin) = OriginQueue::new();
        drop(origin);
        queue.post(Box::new(|| panic!("must not run")));
    }

    #[test]
    fn blocking_next_runs_tasks_from_other_threads() {
        let (queue, mut origin) = OriginQueue::new();
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        std::thread::spawn(move || {
            queue.post(Box::new(move || *sink.lock().unwrap() = Some(std::thread::current().id())));
        });

        assert!(origin.blocking_next());
        assert_eq!(*seen.lock().unwrap(), Some(std::thread::current().id()));
        assert!(!origin.blocking_next());
    }

    #[tokio::test]
    async fn next_ends_when_queues_are_gone() {
        let (queue, mut origin) = OriginQueue::new();
        queue.post(Box::new(|| {}));
        drop(queue);
        assert!(origin.next().await);
        assert!(!origin.next().await);
    }
}
