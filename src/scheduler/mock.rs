//! In-process scheduler for tests
//!
//! Simulates a queue: every accepted job stays listed for a configurable
//! number of queue queries, then leaves the queue and, unless its region is
//! marked to fail, writes its consensus output the way a real job would.
//! Failures can be injected on submission and on queries, and scripted
//! listings can replace the simulation entirely.

use std::collections::{HashSet, VecDeque};
use std::fs;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{QueueEntry, Scheduler, SchedulerError, SubmitReceipt};
use crate::job::JobSpec;
use crate::process::ProcessError;

/// Mock behaviour knobs
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// Queries a job stays listed before it finishes
    pub polls_until_done: usize,

    /// Regions whose job finishes without output
    pub failing_regions: HashSet<String>,

    /// Reject the submission with this 0-based index
    pub reject_submission: Option<usize>,

    /// Fail the query with this 0-based index
    pub fail_query: Option<usize>,
}

#[derive(Debug)]
struct MockJob {
    spec: JobSpec,
    job_id: String,
    remaining: usize,
    finished: bool,
}

#[derive(Debug, Default)]
struct MockQueue {
    jobs: Vec<MockJob>,
    submissions: usize,
    queries: usize,
    foreign: Vec<QueueEntry>,
    scripted: VecDeque<Vec<QueueEntry>>,
}

/// Mock scheduler; clones share one queue, like two runs on one cluster
#[derive(Debug, Clone, Default)]
pub struct MockScheduler {
    config: Arc<Mutex<MockConfig>>,
    queue: Arc<Mutex<MockQueue>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn injected(command: &str) -> ProcessError {
    ProcessError::Spawn {
        command: command.to_string(),
        source: std::io::Error::new(std::io::ErrorKind::Other, "injected failure"),
    }
}

impl MockScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: MockConfig) -> Self {
        Self {
            config: Arc::new(Mutex::new(config)),
            queue: Arc::default(),
        }
    }

    /// Mark a region's job to finish without output
    pub fn fail_region(&self, region: &str) {
        lock(&self.config).failing_regions.insert(region.to_string());
    }

    /// Add a permanently listed job that belongs to someone else
    pub fn add_foreign_entry(&self, entry: QueueEntry) {
        lock(&self.queue).foreign.push(entry);
    }

    /// Queue a listing to return verbatim from the next query
    pub fn push_listing(&self, listing: Vec<QueueEntry>) {
        lock(&self.queue).scripted.push_back(listing);
    }

    /// Names of every accepted job, in submission order
    pub fn submitted_names(&self) -> Vec<String> {
        lock(&self.queue).jobs.iter().map(|j| j.spec.name.clone()).collect()
    }

    /// Accepted job specs, in submission order
    pub fn submitted_jobs(&self) -> Vec<JobSpec> {
        lock(&self.queue).jobs.iter().map(|j| j.spec.clone()).collect()
    }

    /// Number of queue queries served
    pub fn query_count(&self) -> usize {
        lock(&self.queue).queries
    }

    fn finish(job: &mut MockJob, failing: &HashSet<String>) {
        job.finished = true;
        if failing.contains(job.spec.region.id()) {
            return;
        }
        let region = &job.spec.region;
        let record = format!(">{}\n{}\n", region.id(), "A".repeat(region.span() as usize));
        // A job that cannot write its output behaves like a failed job.
        let _ = fs::write(&job.spec.output, record);
    }
}

impl Scheduler for MockScheduler {
    fn submit(&self, job: &JobSpec) -> Result<SubmitReceipt, SchedulerError> {
        let config = lock(&self.config).clone();
        let mut queue = lock(&self.queue);

        let index = queue.submissions;
        queue.submissions += 1;
        if config.reject_submission == Some(index) {
            return Err(SchedulerError::Rejected {
                job: job.name.clone(),
                source: injected("sbatch"),
            });
        }

        let job_id = (1000 + queue.jobs.len()).to_string();
        queue.jobs.push(MockJob {
            spec: job.clone(),
            job_id: job_id.clone(),
            remaining: config.polls_until_done,
            finished: false,
        });

        Ok(SubmitReceipt {
            job_name: job.name.clone(),
            job_id: Some(job_id),
        })
    }

    fn queue(&self) -> Result<Vec<QueueEntry>, SchedulerError> {
        let config = lock(&self.config).clone();
        let mut queue = lock(&self.queue);

        let index = queue.queries;
        queue.queries += 1;
        if config.fail_query == Some(index) {
            return Err(SchedulerError::QueryFailed(injected("squeue")));
        }

        if let Some(listing) = queue.scripted.pop_front() {
            return Ok(listing);
        }

        let mut listing = queue.foreign.clone();
        for job in queue.jobs.iter_mut().filter(|j| !j.finished) {
            if job.remaining == 0 {
                Self::finish(job, &config.failing_regions);
            } else {
                job.remaining -= 1;
                let state = if job.remaining == 0 { "RUNNING" } else { "PENDING" };
                listing.push(QueueEntry::new(&job.spec.name, &job.job_id, state));
            }
        }
        Ok(listing)
    }
}
