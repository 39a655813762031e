//! Recurring report runs on a cron schedule.
//!
//! Cron expressions carry a seconds field and are evaluated in local time.

use std::sync::Arc;

use chrono::Local;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use tracing::{error, info, warn};

use lookout_shared::{Frequency, LookoutError, Result};

use crate::pipeline::{Pipeline, SilentProgress};

/// Cron expression (sec min hour dom month dow) for a report frequency.
pub fn cron_expression(frequency: Frequency) -> &'static str {
    match frequency {
        Frequency::Daily => "0 0 9 * * *",
        Frequency::Weekly => "0 0 9 * * MON",
        Frequency::Monthly => "0 0 9 1 * *",
    }
}

/// Lets at most one scheduled run proceed at a time.
#[derive(Clone, Default)]
pub struct RunGuard {
    lock: Arc<Mutex<()>>,
}

impl RunGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the guard, or `None` while a previous run still holds it.
    pub fn try_acquire(&self) -> Option<OwnedMutexGuard<()>> {
        self.lock.clone().try_lock_owned().ok()
    }
}

/// Run one scheduled report unless another is still in flight.
///
/// Returns `false` when the tick was skipped.
pub async fn guarded_report(pipeline: &Pipeline, guard: &RunGuard) -> bool {
    let Some(_held) = guard.try_acquire() else {
        warn!("previous report run still in progress, skipping this tick");
        return false;
    };
    info!("scheduled report run starting");
    match pipeline.run_report(&SilentProgress).await {
        Ok(outcome) => info!(
            results = outcome.result_count,
            report = ?outcome.report_path,
            "scheduled report run finished"
        ),
        Err(e) => error!(error = %e, "scheduled report run failed"),
    }
    true
}

fn scheduler_err(e: JobSchedulerError) -> LookoutError {
    LookoutError::config(format!("scheduler error: {e}"))
}

/// The cron job behind [`start_scheduler`], evaluated in the local timezone.
fn report_job(pipeline: Arc<Pipeline>, frequency: Frequency, guard: RunGuard) -> Result<Job> {
    Job::new_async_tz(cron_expression(frequency), Local, move |_uuid, _lock| {
        let pipeline = pipeline.clone();
        let guard = guard.clone();
        Box::pin(async move {
            guarded_report(&pipeline, &guard).await;
        })
    })
    .map_err(scheduler_err)
}

/// Start a scheduler that runs `pipeline.run_report` at `frequency`.
///
/// A tick that fires while the previous run is still going is skipped.
pub async fn start_scheduler(pipeline: Arc<Pipeline>, frequency: Frequency) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await.map_err(scheduler_err)?;
    let expression = cron_expression(frequency);

    let job = report_job(pipeline, frequency, RunGuard::new())?;
    scheduler.add(job).await.map_err(scheduler_err)?;
    scheduler.start().await.map_err(scheduler_err)?;

    info!(%frequency, cron = expression, "scheduler started");
    Ok(scheduler)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::notify::NotifierSet;
    use crate::test_support::{mount_default_completion, temp_dir, test_pipeline};

    #[test]
    fn expressions_fire_at_nine() {
        assert_eq!(cron_expression(Frequency::Daily), "0 0 9 * * *");
        assert_eq!(cron_expression(Frequency::Weekly), "0 0 9 * * MON");
        assert_eq!(cron_expression(Frequency::Monthly), "0 0 9 1 * *");
    }

    #[test]
    fn expressions_are_valid_jobs() {
        for freq in [Frequency::Daily, Frequency::Weekly, Frequency::Monthly] {
            let job =
                Job::new_async_tz(cron_expression(freq), Local, |_uuid, _lock| Box::pin(async {}));
            assert!(job.is_ok(), "{freq}");
        }
    }

    #[tokio::test]
    async fn daily_job_fires_at_nine_local_time() {
        use chrono::Timelike;

        let server = MockServer::start().await;
        let pipeline = Arc::new(
            test_pipeline(&server, temp_dir("lookout-tick"), NotifierSet::from_notifiers(Vec::new()))
                .await,
        );
        let mut scheduler = JobScheduler::new().await.unwrap();
        let id = scheduler
            .add(report_job(pipeline, Frequency::Daily, RunGuard::new()).unwrap())
            .await
            .unwrap();

        let next = scheduler
            .next_tick_for_job(id)
            .await
            .unwrap()
            .unwrap()
            .with_timezone(&Local);
        assert_eq!((next.hour(), next.minute(), next.second()), (9, 0, 0));
    }

    #[tokio::test]
    async fn overlapping_tick_is_skipped_while_a_run_is_active() {
        let server = MockServer::start().await;
        // The slow homepage keeps the first run busy while the second tick fires.
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<p>Acme analytics</p>")
                    .set_delay(Duration::from_millis(500)),
            )
            .expect(1)
            .mount(&server)
            .await;
        mount_default_completion(&server, "Acme is steady.").await;

        let reports = temp_dir("lookout-schedule");
        let pipeline = Arc::new(
            test_pipeline(&server, reports.clone(), NotifierSet::from_notifiers(Vec::new())).await,
        );
        let guard = RunGuard::new();

        let first = tokio::spawn({
            let pipeline = pipeline.clone();
            let guard = guard.clone();
            async move { guarded_report(&pipeline, &guard).await }
        });
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(!guarded_report(&pipeline, &guard).await);
        assert!(first.await.unwrap());

        let page_hits = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|r| r.url.path() == "/")
            .count();
        assert_eq!(page_hits, 1);
        std::fs::remove_dir_all(&reports).ok();
    }

    #[tokio::test]
    async fn guard_rejects_overlap() {
        let guard = RunGuard::new();
        let first = guard.try_acquire();
        assert!(first.is_some());
        assert!(guard.clone().try_acquire().is_none());
        drop(first);
        assert!(guard.try_acquire().is_some());
    }
}
