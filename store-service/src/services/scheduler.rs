//! One-shot job table for time-triggered work such as discount expiry.

use chrono::{DateTime, Datelike, Timelike, Utc};
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;

#[derive(Clone, Default)]
pub struct Scheduler {
    jobs: Arc<DashMap<String, JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `task` at `at` (immediately if that is in the past). A job with the same name is replaced.
    pub fn schedule_job<F>(&self, name: &str, at: DateTime<Utc>, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.prune();

        if let Some((_, previous)) = self.jobs.remove(name) {
            tracing::warn!(job = %name, "Job already exists, replacing it");
            previous.abort();
        }

        let delay = (at - Utc::now()).to_std().unwrap_or_default();
        let job_name = name.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tracing::info!(job = %job_name, "Running scheduled job");
            task.await;
        });

        self.jobs.insert(name.to_string(), handle);
        tracing::info!(job = %name, at = %at, cron = %cron_expression(at), "Scheduled job");
    }

    /// Cancels a pending job. Returns whether it was still scheduled.
    pub fn stop_job(&self, name: &str) -> bool {
        match self.jobs.remove(name) {
            Some((_, handle)) => {
                let pending = !handle.is_finished();
                handle.abort();
                tracing::info!(job = %name, "Stopped job");
                pending
            }
            None => {
                tracing::warn!(job = %name, "Job not found");
                false
            }
        }
    }

    pub fn scheduled_jobs(&self) -> Vec<String> {
        self.prune();
        let mut names: Vec<String> = self.jobs.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    fn prune(&self) {
        self.jobs.retain(|_, handle| !handle.is_finished());
    }
}

/// `"{minute} {hour} {day} {month} *"` for the given instant, in UTC.
pub fn cron_expression(at: DateTime<Utc>) -> String {
    format!("{} {} {} {} *", at.minute(), at.hour(), at.day(), at.month())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn cron_expression_uses_one_based_month() {
        let at = Utc.with_ymd_and_hms(2025, 1, 31, 23, 5, 0).unwrap();
        assert_eq!(cron_expression(at), "5 23 31 1 *");
    }

    #[tokio::test]
    async fn due_job_runs_and_leaves_the_table() {
        let scheduler = Scheduler::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();

        scheduler.schedule_job("soon", Utc::now() + Duration::milliseconds(20), async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(scheduler.scheduled_jobs(), vec!["soon".to_string()]);

        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(scheduler.scheduled_jobs().is_empty());
    }

    #[tokio::test]
    async fn rescheduling_replaces_the_previous_job() {
        let scheduler = Scheduler::new();
        let runs = Arc::new(AtomicUsize::new(0));

        let first = runs.clone();
        scheduler.schedule_job("job", Utc::now() + Duration::milliseconds(30), async move {
            first.fetch_add(1, Ordering::SeqCst);
        });
        let second = runs.clone();
        scheduler.schedule_job("job", Utc::now() + Duration::milliseconds(30), async move {
            second.fetch_add(10, Ordering::SeqCst);
        });

        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn stopped_job_never_runs() {
        let scheduler = Scheduler::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();

        scheduler.schedule_job("later", Utc::now() + Duration::milliseconds(50), async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(scheduler.stop_job("later"));
        assert!(!scheduler.stop_job("later"));

        tokio::time::sleep(std::time::Duration::from_millis(150)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }
}
