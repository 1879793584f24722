use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;
use uuid::Uuid;

use crate::models::JobPriority;

/// Three-tier priority queue with starvation promotion (spec §5): after
/// `starvation_threshold` consecutive pops that skipped over a waiting
/// low-priority job, the next pop serves that job regardless of what else
/// is queued.
pub struct JobQueue {
    high: Mutex<VecDeque<Uuid>>,
    default: Mutex<VecDeque<Uuid>>,
    low: Mutex<VecDeque<Uuid>>,
    low_skips: AtomicU32,
    starvation_threshold: u32,
}

impl JobQueue {
    pub fn new(starvation_threshold: u32) -> Self {
        JobQueue {
            high: Mutex::new(VecDeque::new()),
            default: Mutex::new(VecDeque::new()),
            low: Mutex::new(VecDeque::new()),
            low_skips: AtomicU32::new(0),
            starvation_threshold,
        }
    }

    pub fn push(&self, id: Uuid, priority: JobPriority) {
        match priority {
            JobPriority::High => self.high.lock().push_back(id),
            JobPriority::Default => self.default.lock().push_back(id),
            JobPriority::Low => self.low.lock().push_back(id),
        }
    }

    pub fn pop(&self) -> Option<(Uuid, JobPriority)> {
        let low_waiting = !self.low.lock().is_empty();

        if low_waiting && self.low_skips.load(Ordering::Relaxed) >= self.starvation_threshold {
            if let Some(id) = self.low.lock().pop_front() {
                self.low_skips.store(0, Ordering::Relaxed);
                return Some((id, JobPriority::Low));
            }
        }

        if let Some(id) = self.high.lock().pop_front() {
            if low_waiting {
                self.low_skips.fetch_add(1, Ordering::Relaxed);
            }
            return Some((id, JobPriority::High));
        }
        if let Some(id) = self.default.lock().pop_front() {
            if low_waiting {
                self.low_skips.fetch_add(1, Ordering::Relaxed);
            }
            return Some((id, JobPriority::Default));
        }

        self.low.lock().pop_front().map(|id| {
            self.low_skips.store(0, Ordering::Relaxed);
            (id, JobPriority::Low)
        })
    }

    pub fn len(&self, priority: JobPriority) -> usize {
        match priority {
            JobPriority::High => self.high.lock().len(),
            JobPriority::Default => self.default.lock().len(),
            JobPriority::Low => self.low.lock().len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_priority_always_served_first() {
        let q = JobQueue::new(100);
        let low = Uuid::new_v4();
        let high = Uuid::new_v4();
        q.push(low, JobPriority::Low);
        q.push(high, JobPriority::High);
        assert_eq!(q.pop(), Some((high, JobPriority::High)));
    }

    #[test]
    fn low_priority_job_is_promoted_after_starvation_threshold() {
        let q = JobQueue::new(2);
        let low = Uuid::new_v4();
        q.push(low, JobPriority::Low);
        for _ in 0..2 {
            let id = Uuid::new_v4();
            q.push(id, JobPriority::High);
            q.pop();
        }
        assert_eq!(q.pop(), Some((low, JobPriority::Low)));
    }
}
