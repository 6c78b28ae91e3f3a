//! Daily scheduler
//!
//! Runs the pipeline once per day at a fixed UTC time. Missed windows are
//! not backfilled, failed runs are not retried, and a run never starts while
//! another one is in progress.

use crate::api::{AppState, RunOutcome};
use crate::config::ProfilerConfig;
use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, TimeZone, Utc};
use profiler_lib::{new_run_id, CancelToken, ErrorKind, Pipeline};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// First occurrence of `hour:minute` UTC strictly after `now`
pub fn next_run_after(now: DateTime<Utc>, hour: u32, minute: u32) -> Result<DateTime<Utc>> {
    let today = now
        .date_naive()
        .and_hms_opt(hour, minute, 0)
        .ok_or_else(|| anyhow!("invalid schedule time {:02}:{:02}", hour, minute))?;
    let candidate = Utc.from_utc_datetime(&today);
    if candidate > now {
        Ok(candidate)
    } else {
        Ok(candidate + Duration::days(1))
    }
}

/// Run the pipeline every day until `shutdown` flips to true
pub async fn run(
    config: ProfilerConfig,
    state: Arc<AppState>,
    cancel: CancelToken,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let pipeline = Arc::new(Pipeline::with_fs_store(config.pipeline.clone())?);
    let hour = config.service.schedule_hour_utc;
    let minute = config.service.schedule_minute_utc;
    state.set_ready(true);

    loop {
        let now = Utc::now();
        let next = next_run_after(now, hour, minute)?;
        state.status.write().await.next_run_at = Some(next);
        info!(next_run = %next.to_rfc3339(), "Waiting for next scheduled run");

        let wait = (next - now).to_std().unwrap_or_default();
        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = shutdown.changed() => {
                info!("Scheduler stopping");
                break;
            }
        }

        run_once(Arc::clone(&pipeline), &state, &cancel).await;
        if cancel.is_cancelled() {
            info!("Scheduler stopping after cancelled run");
            break;
        }
    }

    state.set_ready(false);
    Ok(())
}

/// Execute one run on the blocking pool and record its outcome
async fn run_once(pipeline: Arc<Pipeline>, state: &AppState, cancel: &CancelToken) {
    let run_id = new_run_id();
    {
        let mut status = state.status.write().await;
        status.running = true;
        status.last_run_id = Some(run_id.clone());
    }

    let token = cancel.clone();
    let id = run_id.clone();
    let result = tokio::task::spawn_blocking(move || pipeline.run(&id, &token)).await;

    let (outcome, last_error) = match result {
        Ok(Ok(summary)) => {
            info!(
                run_id = %run_id,
                first_cluster = summary.report.first_cluster,
                duration_secs = summary.duration_secs,
                "Scheduled run succeeded"
            );
            (RunOutcome::Succeeded, None)
        }
        Ok(Err(e)) if e.kind() == ErrorKind::Cancelled => {
            warn!(run_id = %run_id, error = %e, "Scheduled run cancelled");
            (RunOutcome::Cancelled, Some(e.to_string()))
        }
        Ok(Err(e)) => {
            error!(run_id = %run_id, error = %e, "Scheduled run failed; waiting for next window");
            (RunOutcome::Failed, Some(e.to_string()))
        }
        Err(join_error) => {
            error!(run_id = %run_id, error = %join_error, "Scheduled run panicked");
            (RunOutcome::Failed, Some(join_error.to_string()))
        }
    };

    let mut status = state.status.write().await;
    status.running = false;
    status.last_outcome = Some(outcome);
    status.last_error = last_error;
    status.last_finished_at = Some(Utc::now());
}

#[cfg(test)]
mod tests {
    use super::*;
    use profiler_lib::synth;
    use tempfile::TempDir;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_next_run_later_today() {
        let next = next_run_after(at("2026-10-18T03:15:00Z"), 6, 0).unwrap();
        assert_eq!(next, at("2026-10-18T06:00:00Z"));
    }

    #[test]
    fn test_next_run_skips_to_tomorrow() {
        assert_eq!(
            next_run_after(at("2026-10-18T06:00:00Z"), 6, 0).unwrap(),
            at("2026-10-19T06:00:00Z")
        );
        assert_eq!(
            next_run_after(at("2026-12-31T23:59:00Z"), 6, 30).unwrap(),
            at("2027-01-01T06:30:00Z")
        );
    }

    #[test]
    fn test_invalid_time_rejected() {
        assert!(next_run_after(Utc::now(), 24, 0).is_err());
    }

    #[tokio::test]
    async fn test_run_once_records_failure() {
        let temp_dir = TempDir::new().unwrap();
        let config = profiler_lib::PipelineConfig::with_root(temp_dir.path());
        let pipeline = Arc::new(Pipeline::with_fs_store(config).unwrap());
        let state = AppState::new();

        run_once(pipeline, &state, &CancelToken::new()).await;

        let status = state.status.read().await;
        assert!(!status.running);
        assert_eq!(status.last_outcome, Some(RunOutcome::Failed));
        assert!(status.last_error.is_some());
    }

    #[tokio::test]
    async fn test_run_once_records_success() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = profiler_lib::PipelineConfig::with_root(temp_dir.path());
        config.kmax = 4;
        synth::write_fixtures(&config.training_csv(), &config.test_csv(), 42).unwrap();
        let pipeline = Arc::new(Pipeline::with_fs_store(config).unwrap());
        let state = AppState::new();

        run_once(pipeline, &state, &CancelToken::new()).await;

        let status = state.status.read().await;
        assert_eq!(status.last_outcome, Some(RunOutcome::Succeeded));
        assert!(status.last_run_id.as_deref().unwrap().starts_with("run-"));
    }

    #[tokio::test]
    async fn test_shutdown_stops_loop() {
        let temp_dir = TempDir::new().unwrap();
        let state = Arc::new(AppState::new());
        let (tx, rx) = watch::channel(false);
        let mut config = ProfilerConfig::default();
        config.pipeline.root_dir = temp_dir.path().to_path_buf();

        let handle = tokio::spawn(run(config, Arc::clone(&state), CancelToken::new(), rx));
        tx.send(true).unwrap();
        handle.await.unwrap().unwrap();
        assert!(!state.is_ready());
    }
}
