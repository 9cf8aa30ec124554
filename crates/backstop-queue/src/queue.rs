use futures::FutureExt;
use futures::future::BoxFuture;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

/// Priority tier of a queued job. Ordering is `Low < Normal < High <
/// Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

impl Priority {
    // Tier index in dequeue order: highest priority drains first.
    fn tier(self) -> usize {
        match self {
            Priority::Critical => 0,
            Priority::High => 1,
            Priority::Normal => 2,
            Priority::Low => 3,
        }
    }
}

/// Queueing discipline for pending jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Discipline {
    /// Insertion order, priorities ignored.
    #[default]
    Fifo,
    /// Four fixed tiers, FIFO within a tier.
    Priority,
}

struct QueueEntry {
    id: u64,
    job: BoxFuture<'static, ()>,
}

struct QueueState {
    max_concurrent: usize,
    next_id: u64,
    running: HashMap<u64, JoinHandle<()>>,
    tiers: [VecDeque<QueueEntry>; 4],
}

impl QueueState {
    fn pending_len(&self) -> usize {
        self.tiers.iter().map(VecDeque::len).sum()
    }
}

struct Inner {
    discipline: Discipline,
    state: Mutex<QueueState>,
}

/// Bounded-concurrency admission controller.
///
/// Cloning is cheap; clones share the same queue.
#[derive(Clone)]
pub struct DispatchQueue {
    inner: Arc<Inner>,
}

impl DispatchQueue {
    pub fn new(discipline: Discipline, max_concurrent: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                discipline,
                state: Mutex::new(QueueState {
                    max_concurrent,
                    next_id: 0,
                    running: HashMap::new(),
                    tiers: std::array::from_fn(|_| VecDeque::new()),
                }),
            }),
        }
    }

    /// Starts `job` immediately if the concurrency budget allows,
    /// otherwise parks it. Under [`Discipline::Fifo`] the priority is
    /// ignored.
    pub fn enqueue<F>(&self, priority: Priority, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut state = self.inner.state.lock().unwrap();
        let id = state.next_id;
        state.next_id += 1;
        let entry = QueueEntry {
            id,
            job: job.boxed(),
        };

        if state.running.len() < state.max_concurrent {
            Inner::start(&self.inner, &mut state, entry);
        } else {
            let tier = match self.inner.discipline {
                Discipline::Fifo => Priority::Normal.tier(),
                Discipline::Priority => priority.tier(),
            };
            state.tiers[tier].push_back(entry);
            tracing::debug!(id, pending = state.pending_len(), "job parked");
        }
        Inner::record_depth(&state);
    }

    /// Aborts every running job and discards everything pending.
    ///
    /// Pending jobs are dropped unstarted; completion channels they own
    /// close, which surfaces as cancellation to their callers.
    pub fn cancel_all(&self) {
        let mut state = self.inner.state.lock().unwrap();
        for (_, handle) in state.running.drain() {
            handle.abort();
        }
        for tier in state.tiers.iter_mut() {
            tier.clear();
        }
        Inner::record_depth(&state);
    }

    /// Changes the concurrency budget. Raising it immediately starts
    /// pending jobs up to the new budget.
    pub fn set_max_concurrent(&self, max_concurrent: usize) {
        let mut state = self.inner.state.lock().unwrap();
        state.max_concurrent = max_concurrent;
        Inner::drain(&self.inner, &mut state);
        Inner::record_depth(&state);
    }

    pub fn max_concurrent(&self) -> usize {
        self.inner.state.lock().unwrap().max_concurrent
    }

    pub fn running_len(&self) -> usize {
        self.inner.state.lock().unwrap().running.len()
    }

    pub fn pending_len(&self) -> usize {
        self.inner.state.lock().unwrap().pending_len()
    }
}

impl Inner {
    fn start(inner: &Arc<Inner>, state: &mut QueueState, entry: QueueEntry) {
        let QueueEntry { id, job } = entry;
        let queue = Arc::clone(inner);
        let handle = tokio::spawn(async move {
            job.await;
            Inner::complete(&queue, id);
        });
        state.running.insert(id, handle);
    }

    fn complete(inner: &Arc<Inner>, id: u64) {
        let mut state = inner.state.lock().unwrap();
        state.running.remove(&id);
        Inner::drain(inner, &mut state);
        Inner::record_depth(&state);
    }

    // Pull from the highest non-empty tier until the budget is full.
    fn drain(inner: &Arc<Inner>, state: &mut QueueState) {
        while state.running.len() < state.max_concurrent {
            let Some(entry) = state.tiers.iter_mut().find_map(VecDeque::pop_front) else {
                break;
            };
            Inner::start(inner, state, entry);
        }
    }

    #[cfg(feature = "metrics")]
    fn record_depth(state: &QueueState) {
        metrics::gauge!("dispatch_queue_running").set(state.running.len() as f64);
        metrics::gauge!("dispatch_queue_pending").set(state.pending_len() as f64);
    }

    #[cfg(not(feature = "metrics"))]
    fn record_depth(_state: &QueueState) {}
}
