//! Task requests and queue payloads

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use strix_model::{Configuration, Intensity, IntensityRank, TargetScope, Tool};
use strix_planner::{Bundle, TaskSubject};

/// When and how often a task runs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schedule {
    /// Absolute start time
    pub at: Option<DateTime<Utc>>,
    /// Delay before start
    pub delay: Option<Duration>,
    /// Re-run the task definition at this interval until cancelled
    pub repeat_every: Option<Duration>,
}

impl Schedule {
    /// Time to wait before planning, if any
    #[must_use]
    pub fn wait(&self) -> Option<Duration> {
        let until_at = self
            .at
            .map(|at| (at - Utc::now()).to_std().unwrap_or_default());
        match (until_at, self.delay) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }
}

/// `CreateTask` request
#[derive(Debug, Clone)]
pub struct TaskRequest {
    /// Tool or process to run
    pub subject: TaskSubject,
    /// Target and user-declared seed entities
    pub scope: Arc<TargetScope>,
    /// Intensity ceiling
    pub intensity: IntensityRank,
    /// Scheduling
    pub schedule: Schedule,
}

impl TaskRequest {
    /// Immediate task
    #[must_use]
    pub fn new(subject: TaskSubject, scope: TargetScope, intensity: IntensityRank) -> Self {
        Self {
            subject,
            scope: Arc::new(scope),
            intensity,
            schedule: Schedule::default(),
        }
    }

    /// Start at an absolute time
    #[inline]
    #[must_use]
    pub fn scheduled_at(mut self, at: DateTime<Utc>) -> Self {
        self.schedule.at = Some(at);
        self
    }

    /// Start after a delay
    #[inline]
    #[must_use]
    pub fn scheduled_in(mut self, delay: Duration) -> Self {
        self.schedule.delay = Some(delay);
        self
    }

    /// Repeat at an interval
    #[inline]
    #[must_use]
    pub fn repeat_every(mut self, interval: Duration) -> Self {
        self.schedule.repeat_every = Some(interval);
        self
    }
}

/// Everything a worker needs to run one execution
#[derive(Debug, Clone)]
pub struct ExecutionPayload {
    /// Tool
    pub tool: Arc<Tool>,
    /// Configuration
    pub configuration: Arc<Configuration>,
    /// Selected intensity
    pub intensity: Intensity,
    /// Seed bundle
    pub bundle: Bundle,
    /// Task scope
    pub scope: Arc<TargetScope>,
}
