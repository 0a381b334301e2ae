//! Run orchestration: read, plan, then print or apply.
//!
//! Planning finishes completely before anything is applied, so a deadline or
//! a fatal error never leaves the router half-updated.

use std::future::Future;
use std::time::Duration;

use crate::config::SyncConfig;
use crate::engine::{SyncPlan, plan_drop, plan_sync};
use crate::error::{Result, SyncError};
use crate::fetch::TextFetcher;
use crate::router::Router;
use crate::running_config::ParsedConfig;

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// What was planned, with the run log.
    pub plan: SyncPlan,
    /// Whether the commands were sent to the router.
    pub applied: bool,
}

/// Reconciles the managed groups with their remote domain lists.
///
/// # Errors
///
/// Returns [`SyncError::InvalidConfig`] before any I/O for bad options,
/// [`SyncError::DeadlineExceeded`] if planning outlives the deadline, and
/// router errors from reading or applying. Failures of individual lists are
/// reported in the plan instead.
pub async fn run<F, R>(config: &SyncConfig, fetcher: &F, router: &R) -> Result<RunOutcome>
where
    F: TextFetcher + ?Sized,
    R: Router + ?Sized,
{
    config.validate()?;
    let plan = within_deadline(config, async {
        let parsed = read_config(config, router).await?;
        Ok(plan_sync(&parsed, config, fetcher).await)
    })
    .await?;
    finish(config, plan, router).await
}

/// Removes every managed group and route.
///
/// # Errors
///
/// Same as [`run`], minus list resolution which never happens here.
pub async fn drop_all<R>(config: &SyncConfig, router: &R) -> Result<RunOutcome>
where
    R: Router + ?Sized,
{
    config.validate()?;
    let plan = within_deadline(config, async {
        let parsed = read_config(config, router).await?;
        Ok(plan_drop(&parsed, &config.prefix))
    })
    .await?;
    finish(config, plan, router).await
}

async fn read_config<R: Router + ?Sized>(config: &SyncConfig, router: &R) -> Result<ParsedConfig> {
    let text = match &config.running_config_text {
        Some(text) => text.clone(),
        None => router.running_config().await?,
    };
    let parsed = ParsedConfig::parse(&text);
    tracing::debug!(
        groups = parsed.groups.len(),
        routes = parsed.routes.len(),
        warnings = parsed.warnings.len(),
        "Parsed running config"
    );
    Ok(parsed)
}

async fn within_deadline<T>(
    config: &SyncConfig,
    work: impl Future<Output = Result<T>>,
) -> Result<T> {
    match config.deadline_ms {
        Some(after_ms) => tokio::time::timeout(Duration::from_millis(after_ms), work)
            .await
            .map_err(|_| SyncError::DeadlineExceeded { after_ms })?,
        None => work.await,
    }
}

async fn finish<R: Router + ?Sized>(
    config: &SyncConfig,
    plan: SyncPlan,
    router: &R,
) -> Result<RunOutcome> {
    if config.dry_run || plan.commands.is_empty() {
        tracing::info!(
            commands = plan.commands.len(),
            dry_run = config.dry_run,
            "Nothing applied"
        );
        return Ok(RunOutcome {
            plan,
            applied: false,
        });
    }

    router.apply(&plan.commands).await?;
    Ok(RunOutcome {
        plan,
        applied: true,
    })
}
