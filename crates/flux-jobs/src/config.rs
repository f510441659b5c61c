//! Scheduler configuration.

use crate::error::SchedulerError;

/// Configuration for a [`JobScheduler`](crate::JobScheduler).
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// Number of worker threads. `None` = auto-detect
    /// (`available_parallelism - 1`, clamped to `[1, 32]`), leaving one
    /// core for the thread driving the frame.
    pub worker_count: Option<usize>,
    /// Queue slots per worker. The queue holds
    /// `workers * max_in_flight_per_worker` jobs before producers block.
    /// Default: 64.
    pub max_in_flight_per_worker: usize,
    /// Worker thread name prefix; threads are named `{prefix}-{index}`.
    /// Default: `"flux-worker"`.
    pub thread_name: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_count: None,
            max_in_flight_per_worker: 64,
            thread_name: "flux-worker".to_string(),
        }
    }
}

impl SchedulerConfig {
    /// Config with an explicit worker count and defaults otherwise.
    pub fn with_workers(worker_count: usize) -> Self {
        Self {
            worker_count: Some(worker_count),
            ..Self::default()
        }
    }

    /// Resolve the actual worker count, applying auto-detection if `None`.
    ///
    /// Explicit values are clamped to `[1, 64]`.
    pub fn resolved_worker_count(&self) -> usize {
        match self.worker_count {
            Some(n) => n.clamp(1, 64),
            None => {
                let cpus = std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(4);
                cpus.saturating_sub(1).clamp(1, 32)
            }
        }
    }

    /// Total queue capacity.
    pub fn queue_capacity(&self) -> usize {
        self.resolved_worker_count() * self.max_in_flight_per_worker
    }

    /// Check the configuration.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.max_in_flight_per_worker == 0 {
            return Err(SchedulerError::InvalidConfig {
                reason: "max_in_flight_per_worker must be at least 1",
            });
        }
        if self.thread_name.is_empty() {
            return Err(SchedulerError::InvalidConfig {
                reason: "thread_name must not be empty",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_workers_clamped() {
        assert_eq!(SchedulerConfig::with_workers(0).resolved_worker_count(), 1);
        assert_eq!(SchedulerConfig::with_workers(500).resolved_worker_count(), 64);
        assert_eq!(SchedulerConfig::with_workers(3).resolved_worker_count(), 3);
    }

    #[test]
    fn auto_workers_in_range() {
        let n = SchedulerConfig::default().resolved_worker_count();
        assert!((1..=32).contains(&n));
    }

    #[test]
    fn queue_capacity_is_workers_times_slots() {
        let config = SchedulerConfig {
            worker_count: Some(4),
            max_in_flight_per_worker: 8,
            ..SchedulerConfig::default()
        };
        assert_eq!(config.queue_capacity(), 32);
    }

    #[test]
    fn zero_slots_rejected() {
        let config = SchedulerConfig {
            max_in_flight_per_worker: 0,
            ..SchedulerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SchedulerError::InvalidConfig { .. })
        ));
    }
}
