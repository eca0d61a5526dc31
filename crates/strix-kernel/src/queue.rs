//! Dependency-gated work queue
//!
//! Jobs are handed out in queue order, skipping jobs whose dependencies
//! have not all terminated. Completing, cancelling or pushing a job wakes
//! every waiting worker, which re-scans the queue.
//!
//! A terminated id is remembered only while a queued job still waits on it.
//! Dependencies are only ever declared on jobs queued together with their
//! upstream ([`WorkQueue::push_all`], [`WorkQueue::push_fan_out`]).

use crate::error::QueueError;
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use strix_model::{ExecutionId, TaskId};
use tokio::sync::Notify;

/// Queued unit of work
#[derive(Debug, Clone)]
pub struct Job<P> {
    /// Execution run by the job
    pub id: ExecutionId,
    /// Owning task
    pub task: TaskId,
    /// Jobs that must terminate first
    pub dependencies: Vec<ExecutionId>,
    /// Payload handed to the worker
    pub payload: P,
}

#[derive(Debug)]
struct State<P> {
    pending: VecDeque<Job<P>>,
    finished: HashSet<ExecutionId>,
    closed: bool,
}

impl<P> State<P> {
    /// Forget terminated ids no queued job waits on
    fn prune(&mut self) {
        let waited: HashSet<ExecutionId> = self
            .pending
            .iter()
            .flat_map(|j| j.dependencies.iter().copied())
            .collect();
        self.finished.retain(|id| waited.contains(id));
    }
}

/// Work queue shared by the engine and its workers
#[derive(Debug)]
pub struct WorkQueue<P> {
    state: Mutex<State<P>>,
    notify: Notify,
}

impl<P> Default for WorkQueue<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> WorkQueue<P> {
    /// Empty, open queue
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                pending: VecDeque::new(),
                finished: HashSet::new(),
                closed: false,
            }),
            notify: Notify::new(),
        }
    }

    /// Append a job
    pub fn push(&self, job: Job<P>) -> Result<(), QueueError> {
        self.insert(job)
    }

    /// Append a batch of jobs atomically; either every job is queued or
    /// none is
    pub fn push_all(&self, jobs: Vec<Job<P>>) -> Result<(), QueueError> {
        {
            let mut state = self.state.lock();
            if state.closed {
                return Err(QueueError::Closed);
            }
            let mut ids = HashSet::with_capacity(jobs.len());
            for job in &jobs {
                if !ids.insert(job.id) || state.pending.iter().any(|j| j.id == job.id) {
                    return Err(QueueError::Duplicate(job.id));
                }
            }
            tracing::trace!(jobs = jobs.len(), "jobs queued");
            state.pending.extend(jobs);
        }
        self.notify.notify_waiters();
        Ok(())
    }

    /// Queue `jobs` ahead of everything queued and make every queued job
    /// waiting on `upstream` also wait on them
    pub fn push_fan_out(&self, upstream: ExecutionId, jobs: Vec<Job<P>>) -> Result<(), QueueError> {
        {
            let mut state = self.state.lock();
            if state.closed {
                return Err(QueueError::Closed);
            }
            if let Some(dup) = jobs.iter().find(|j| state.pending.iter().any(|p| p.id == j.id)) {
                return Err(QueueError::Duplicate(dup.id));
            }
            let ids: Vec<ExecutionId> = jobs.iter().map(|j| j.id).collect();
            for job in state.pending.iter_mut().filter(|j| j.dependencies.contains(&upstream)) {
                for id in &ids {
                    if !job.dependencies.contains(id) {
                        job.dependencies.push(*id);
                    }
                }
            }
            tracing::trace!(upstream = %upstream, jobs = ids.len(), "fan-out jobs queued");
            for job in jobs.into_iter().rev() {
                state.pending.push_front(job);
            }
        }
        self.notify.notify_waiters();
        Ok(())
    }

    fn insert(&self, job: Job<P>) -> Result<(), QueueError> {
        {
            let mut state = self.state.lock();
            if state.closed {
                return Err(QueueError::Closed);
            }
            if state.pending.iter().any(|j| j.id == job.id) {
                return Err(QueueError::Duplicate(job.id));
            }
            tracing::trace!(job = %job.id, dependencies = job.dependencies.len(), "job queued");
            state.pending.push_back(job);
        }
        self.notify.notify_waiters();
        Ok(())
    }

    /// Wait for the next ready job. Returns `None` once the queue is closed.
    pub async fn next(&self) -> Option<Job<P>> {
        loop {
            let notified = self.notify.notified();
            if let Some(job) = self.try_next() {
                return Some(job);
            }
            if self.state.lock().closed {
                return None;
            }
            notified.await;
        }
    }

    /// Take the first ready job without waiting
    pub fn try_next(&self) -> Option<Job<P>> {
        let mut state = self.state.lock();
        if state.closed {
            return None;
        }
        let finished = &state.finished;
        let index = state
            .pending
            .iter()
            .position(|job| job.dependencies.iter().all(|d| finished.contains(d)))?;
        let job = state.pending.remove(index);
        if job.as_ref().is_some_and(|j| !j.dependencies.is_empty()) {
            state.prune();
        }
        job
    }

    /// Record a job as terminated, releasing its dependents
    pub fn complete(&self, id: ExecutionId) {
        {
            let mut state = self.state.lock();
            if state.pending.iter().any(|j| j.dependencies.contains(&id)) {
                state.finished.insert(id);
            }
        }
        self.notify.notify_waiters();
    }

    /// Drop every queued job of a task, marking them terminated
    pub fn cancel_task(&self, task: TaskId) -> Vec<ExecutionId> {
        let removed = {
            let mut state = self.state.lock();
            let (removed, kept): (Vec<_>, Vec<_>) = state.pending.drain(..).partition(|j| j.task == task);
            state.pending = kept.into();
            let ids: Vec<ExecutionId> = removed.into_iter().map(|j| j.id).collect();
            state.finished.extend(ids.iter().copied());
            state.prune();
            ids
        };
        self.notify.notify_waiters();
        removed
    }

    /// Stop handing out jobs and wake every waiting worker
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.notify.notify_waiters();
    }

    /// Queued jobs, ready or not
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Whether nothing is queued
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn job(task: TaskId, dependencies: Vec<ExecutionId>) -> Job<&'static str> {
        Job {
            id: ExecutionId::new(),
            task,
            dependencies,
            payload: "run",
        }
    }

    #[test]
    fn test_dependencies_gate_jobs() {
        let queue = WorkQueue::new();
        let task = TaskId::new();
        let first = job(task, vec![]);
        let second = job(task, vec![first.id]);
        let (first_id, second_id) = (first.id, second.id);
        queue.push(second).unwrap();
        queue.push(first).unwrap();

        assert_eq!(queue.try_next().map(|j| j.id), Some(first_id));
        assert!(queue.try_next().is_none());
        queue.complete(first_id);
        assert_eq!(queue.try_next().map(|j| j.id), Some(second_id));
    }

    #[test]
    fn test_fan_out_jobs_jump_ahead_and_gate_dependents() {
        let queue = WorkQueue::new();
        let task = TaskId::new();
        let upstream = ExecutionId::new();
        let waiting = job(task, vec![upstream]);
        let waiting_id = waiting.id;
        queue.push(waiting).unwrap();

        let (a, b) = (job(task, vec![]), job(task, vec![]));
        let (a_id, b_id) = (a.id, b.id);
        queue.push_fan_out(upstream, vec![a, b]).unwrap();
        queue.complete(upstream);

        assert_eq!(queue.try_next().map(|j| j.id), Some(a_id));
        assert_eq!(queue.try_next().map(|j| j.id), Some(b_id));
        assert!(queue.try_next().is_none());
        queue.complete(a_id);
        assert!(queue.try_next().is_none());
        queue.complete(b_id);
        assert_eq!(queue.try_next().map(|j| j.id), Some(waiting_id));
    }

    #[test]
    fn test_finished_ids_forgotten_once_released() {
        let queue = WorkQueue::new();
        let task = TaskId::new();
        let first = job(task, vec![]);
        let second = job(task, vec![first.id]);
        let third = job(task, vec![first.id, second.id]);
        let (first_id, second_id, third_id) = (first.id, second.id, third.id);
        queue.push_all(vec![first, second, third]).unwrap();

        assert_eq!(queue.try_next().map(|j| j.id), Some(first_id));
        queue.complete(first_id);
        assert_eq!(queue.try_next().map(|j| j.id), Some(second_id));
        // the third job still waits on the first
        assert!(queue.state.lock().finished.contains(&first_id));
        queue.complete(second_id);
        assert_eq!(queue.try_next().map(|j| j.id), Some(third_id));
        queue.complete(third_id);
        assert!(queue.state.lock().finished.is_empty());
    }

    #[test]
    fn test_push_all_is_atomic() {
        let queue = WorkQueue::new();
        let task = TaskId::new();
        let queued = job(task, vec![]);
        queue.push(queued.clone()).unwrap();
        let fresh = job(task, vec![]);
        assert_eq!(queue.push_all(vec![fresh, queued.clone()]), Err(QueueError::Duplicate(queued.id)));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_cancel_removes_task_jobs() {
        let queue = WorkQueue::new();
        let (a, b) = (TaskId::new(), TaskId::new());
        queue.push(job(a, vec![])).unwrap();
        queue.push(job(b, vec![])).unwrap();
        assert_eq!(queue.cancel_task(a).len(), 1);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.try_next().map(|j| j.task), Some(b));
    }

    #[test]
    fn test_duplicate_and_closed() {
        let queue = WorkQueue::new();
        let task = TaskId::new();
        let j = job(task, vec![]);
        queue.push(j.clone()).unwrap();
        assert_eq!(queue.push(j.clone()), Err(QueueError::Duplicate(j.id)));
        queue.close();
        assert_eq!(queue.push(job(task, vec![])), Err(QueueError::Closed));
    }

    #[tokio::test]
    async fn test_waiting_worker_wakes_on_completion() {
        let queue = Arc::new(WorkQueue::new());
        let task = TaskId::new();
        let upstream = ExecutionId::new();
        let gated = job(task, vec![upstream]);
        let gated_id = gated.id;
        queue.push(gated).unwrap();

        let worker = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.next().await.map(|j| j.id) })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.complete(upstream);

        let got = tokio::time::timeout(Duration::from_secs(2), worker).await.unwrap().unwrap();
        assert_eq!(got, Some(gated_id));
    }

    #[test]
    fn test_next_stays_pending_until_released() {
        let queue = WorkQueue::new();
        let task = TaskId::new();
        let upstream = ExecutionId::new();
        queue.push(job(task, vec![upstream])).unwrap();

        let mut next = tokio_test::task::spawn(queue.next());
        tokio_test::assert_pending!(next.poll());
        queue.complete(upstream);
        assert!(next.is_woken());
        let released = tokio_test::assert_ready!(next.poll());
        assert_eq!(released.map(|j| j.task), Some(task));
    }

    #[tokio::test]
    async fn test_close_releases_workers() {
        let queue: Arc<WorkQueue<()>> = Arc::new(WorkQueue::new());
        let worker = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.next().await.is_none() })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.close();
        assert!(tokio::time::timeout(Duration::from_secs(2), worker).await.unwrap().unwrap());
    }
}
