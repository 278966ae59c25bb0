//! Job monitoring
//!
//! Two-state machine over the scheduler queue:
//! - RUNNING: at least one job whose name contains this run's prefix is listed
//! - DONE: none are
//!
//! The monitor checks, and while RUNNING sleeps one poll interval and checks
//! again. A failed query is fatal: "nothing left" is never inferred from an
//! error. There is no timeout unless `max_wait` is configured.

use std::time::{Duration, Instant};

use tracing::info;

use crate::scheduler::{Scheduler, SchedulerError};

/// Monitoring configuration
#[derive(Debug, Clone, Copy)]
pub struct MonitorConfig {
    /// Sleep between queue checks (default: 60 s)
    pub poll_interval: Duration,

    /// Give up after this long; `None` waits forever
    pub max_wait: Option<Duration>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            max_wait: None,
        }
    }
}

/// Result of one queue check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// Jobs of this run are still queued or running
    Running { remaining: usize },
    /// No job of this run is left in the queue
    Done,
}

impl MonitorState {
    pub fn is_done(&self) -> bool {
        matches!(self, MonitorState::Done)
    }
}

/// Summary of a completed wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorReport {
    /// Queue checks performed
    pub polls: usize,

    /// Wall-clock time spent waiting
    pub elapsed: Duration,
}

/// Monitoring errors
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("scheduler query failed while monitoring: {0}")]
    Query(#[from] SchedulerError),

    #[error("gave up after {waited:?} with {remaining} jobs still queued")]
    TimedOut { waited: Duration, remaining: usize },
}

/// Watches the queue for one run's jobs
#[derive(Debug, Clone)]
pub struct JobMonitor {
    prefix: String,
    config: MonitorConfig,
}

impl JobMonitor {
    pub fn new(prefix: impl Into<String>, config: MonitorConfig) -> Self {
        Self {
            prefix: prefix.into(),
            config,
        }
    }

    /// Count this run's jobs in one queue listing
    pub fn check(&self, scheduler: &dyn Scheduler) -> Result<MonitorState, SchedulerError> {
        let remaining = scheduler
            .queue()?
            .iter()
            .filter(|entry| entry.belongs_to(&self.prefix))
            .count();

        Ok(if remaining == 0 {
            MonitorState::Done
        } else {
            MonitorState::Running { remaining }
        })
    }

    /// Block until DONE, sleeping the poll interval between checks
    pub fn wait_until_done(&self, scheduler: &dyn Scheduler) -> Result<MonitorReport, MonitorError> {
        self.wait_with(scheduler, std::thread::sleep)
    }

    /// Block until DONE using `sleep` to wait between checks
    pub fn wait_with<F>(&self, scheduler: &dyn Scheduler, mut sleep: F) -> Result<MonitorReport, MonitorError>
    where
        F: FnMut(Duration),
    {
        let start = Instant::now();
        // Sum of requested sleeps; keeps timeouts exact when `sleep` is not
        // a real sleep.
        let mut waited = Duration::ZERO;
        let mut polls = 0;

        loop {
            polls += 1;
            match self.check(scheduler)? {
                MonitorState::Done => {
                    info!(polls, elapsed_secs = start.elapsed().as_secs(), "All Nanopolish jobs are done!");
                    return Ok(MonitorReport {
                        polls,
                        elapsed: start.elapsed(),
                    });
                }
                MonitorState::Running { remaining } => {
                    let spent = start.elapsed().max(waited);
                    if let Some(max_wait) = self.config.max_wait {
                        if spent >= max_wait {
                            return Err(MonitorError::TimedOut {
                                waited: spent,
                                remaining,
                            });
                        }
                    }

                    info!(
                        "Waiting for Nanopolish jobs to finish... ({} sec elapsed, {} jobs remaining)",
                        spent.as_secs(),
                        remaining
                    );
                    sleep(self.config.poll_interval);
                    waited += self.config.poll_interval;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{MockConfig, MockScheduler, QueueEntry};

    fn no_sleep(_: Duration) {}

    fn entry(name: &str) -> QueueEntry {
        QueueEntry::new(name, "1", "RUNNING")
    }

    #[test]
    fn test_check_counts_only_prefix() {
        let scheduler = MockScheduler::new();
        scheduler.push_listing(vec![
            entry("Nanopolish_runa_c1:0-100"),
            entry("Nanopolish_runb_c1:0-100"),
            entry("Nanopolish_runa_c1:100-200"),
            entry("unrelated"),
        ]);

        let monitor = JobMonitor::new("Nanopolish_runa_", MonitorConfig::default());
        assert_eq!(
            monitor.check(&scheduler).unwrap(),
            MonitorState::Running { remaining: 2 }
        );
    }

    #[test]
    fn test_empty_queue_is_done() {
        let scheduler = MockScheduler::new();
        let monitor = JobMonitor::new("Nanopolish_runa_", MonitorConfig::default());
        assert!(monitor.check(&scheduler).unwrap().is_done());
    }

    #[test]
    fn test_wait_until_done_really_sleeps() {
        let scheduler = MockScheduler::new();
        scheduler.push_listing(vec![entry("Nanopolish_runa_c1:0-100")]);
        let monitor = JobMonitor::new(
            "Nanopolish_runa_",
            MonitorConfig {
                poll_interval: Duration::from_millis(20),
                max_wait: None,
            },
        );

        let report = monitor.wait_until_done(&scheduler).unwrap();
        assert_eq!(report.polls, 2);
        assert!(report.elapsed >= Duration::from_millis(20));
    }

    #[test]
    fn test_never_done_while_jobs_listed() {
        let scheduler = MockScheduler::new();
        for remaining in [3, 2, 2, 1] {
            let listing = (0..remaining)
                .map(|i| entry(&format!("Nanopolish_runa_c1:{}-{}", i * 10, i * 10 + 10)))
                .collect();
            scheduler.push_listing(listing);
        }

        let monitor = JobMonitor::new("Nanopolish_runa_", MonitorConfig::default());
        let mut sleeps = 0;
        let report = monitor.wait_with(&scheduler, |_| sleeps += 1).unwrap();

        // Four RUNNING listings, then the empty fifth check.
        assert_eq!(report.polls, 5);
        assert_eq!(sleeps, 4);
        assert_eq!(scheduler.query_count(), 5);
    }

    #[test]
    fn test_sleeps_poll_interval() {
        let scheduler = MockScheduler::new();
        scheduler.push_listing(vec![entry("Nanopolish_runa_c1:0-10")]);

        let config = MonitorConfig {
            poll_interval: Duration::from_secs(60),
            max_wait: None,
        };
        let monitor = JobMonitor::new("Nanopolish_runa_", config);
        let mut slept = Vec::new();
        monitor.wait_with(&scheduler, |d| slept.push(d)).unwrap();
        assert_eq!(slept, vec![Duration::from_secs(60)]);
    }

    #[test]
    fn test_query_failure_is_fatal() {
        let scheduler = MockScheduler::with_config(MockConfig {
            fail_query: Some(1),
            ..MockConfig::default()
        });
        scheduler.push_listing(vec![entry("Nanopolish_runa_c1:0-10")]);

        let monitor = JobMonitor::new("Nanopolish_runa_", MonitorConfig::default());
        let err = monitor.wait_with(&scheduler, no_sleep).unwrap_err();
        assert!(matches!(err, MonitorError::Query(_)));
    }

    #[test]
    fn test_other_runs_do_not_block() {
        let scheduler = MockScheduler::new();
        scheduler.add_foreign_entry(entry("Nanopolish_runb_c1:0-100"));

        let monitor = JobMonitor::new("Nanopolish_runa_", MonitorConfig::default());
        let report = monitor.wait_with(&scheduler, no_sleep).unwrap();
        assert_eq!(report.polls, 1);
    }

    #[test]
    fn test_max_wait_times_out() {
        let scheduler = MockScheduler::new();
        scheduler.add_foreign_entry(entry("Nanopolish_runa_stuck"));

        let config = MonitorConfig {
            poll_interval: Duration::from_secs(60),
            max_wait: Some(Duration::from_secs(180)),
        };
        let monitor = JobMonitor::new("Nanopolish_runa_", config);
        let err = monitor.wait_with(&scheduler, no_sleep).unwrap_err();

        match err {
            MonitorError::TimedOut { waited, remaining } => {
                assert_eq!(waited, Duration::from_secs(180));
                assert_eq!(remaining, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
