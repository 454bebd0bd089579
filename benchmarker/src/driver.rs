//! Composite drivers
//!
//! Each driver runs one action through a [`Worker`] with a fixed loop mode
//! and blocks until the pool has drained. Failures returned by an action are
//! recorded into the step; only pool misconfiguration is returned.
//!
//! Every driver runs in its own cancellation scope. A critical failure
//! cancels that scope so the phase stops starting new work; the caller's
//! handle is left untouched.

use std::sync::Arc;

use tracing::{info, warn};

use crate::action;
use crate::cancel::Cancellation;
use crate::failure::Failure;
use crate::scenario::Scenario;
use crate::step::BenchmarkStep;
use crate::worker::{LoopMode, Worker, WorkerError, WorkerOptions};

/// Record `failure`; a critical one also stops the current phase
fn record(ctx: &Cancellation, step: &BenchmarkStep, failure: Failure) {
    if failure.is_critical() && !ctx.is_cancelled() {
        warn!("Critical failure, stopping phase: {}", failure);
        ctx.cancel();
    }
    step.add_error(failure);
}

/// Sign up new users until the signup budget elapses
pub async fn signups(
    ctx: &Cancellation,
    step: &Arc<BenchmarkStep>,
    scenario: &Arc<Scenario>,
) -> Result<(), WorkerError> {
    let ctx = ctx.with_timeout(scenario.config.signup_duration);
    let task_step = Arc::clone(step);
    let task_scenario = Arc::clone(scenario);

    let worker = Worker::new(
        move |ctx: Cancellation, _idx| {
            let step = Arc::clone(&task_step);
            let scenario = Arc::clone(&task_scenario);
            async move {
                if ctx.is_cancelled() {
                    return;
                }

                let mut user = match scenario.new_user() {
                    Ok(user) => user,
                    Err(failure) => {
                        record(&ctx, &step, failure);
                        return;
                    }
                };
                if let Err(failure) = action::signup(&step, &scenario.assets, &mut user).await {
                    record(&ctx, &step, failure);
                    return;
                }
                if user.is_registered() {
                    scenario.users.add(user);
                }
            }
        },
        WorkerOptions {
            max_parallelism: scenario.parallelism,
            mode: LoopMode::UntilCancelled,
        },
    )?;

    let started = worker.process(&ctx).await;
    info!(
        "Signups finished: {} attempts, {} registered users",
        started,
        scenario.users.count()
    );
    Ok(())
}

/// Log every registered user in exactly once
pub async fn logins(
    ctx: &Cancellation,
    step: &Arc<BenchmarkStep>,
    scenario: &Arc<Scenario>,
) -> Result<(), WorkerError> {
    if scenario.users.is_empty() {
        info!("No registered users, skipping logins");
        return Ok(());
    }
    let users_count = scenario.users.count();
    let ctx = ctx.with_timeout(scenario.config.login_timeout);
    let task_step = Arc::clone(step);
    let task_scenario = Arc::clone(scenario);

    let worker = Worker::new(
        move |ctx: Cancellation, idx| {
            let step = Arc::clone(&task_step);
            let scenario = Arc::clone(&task_scenario);
            async move {
                if ctx.is_cancelled() {
                    return;
                }

                let Some(user) = scenario.users.get(idx) else {
                    return;
                };
                if let Err(failure) = action::login(&step, &scenario.assets, &user).await {
                    record(&ctx, &step, failure);
                }
            }
        },
        WorkerOptions {
            max_parallelism: scenario.config.login_parallelism,
            mode: LoopMode::FixedCount(users_count),
        },
    )?;

    let started = worker.process(&ctx).await;
    info!("Logins finished: {}/{} users", started, users_count);
    Ok(())
}

/// Create the configured number of schedules as the staff user
pub async fn create_schedules(
    ctx: &Cancellation,
    step: &Arc<BenchmarkStep>,
    scenario: &Arc<Scenario>,
) -> Result<(), WorkerError> {
    let ctx = ctx.child();
    let task_step = Arc::clone(step);
    let task_scenario = Arc::clone(scenario);

    let worker = Worker::new(
        move |ctx: Cancellation, _idx| {
            let step = Arc::clone(&task_step);
            let scenario = Arc::clone(&task_scenario);
            async move {
                if ctx.is_cancelled() {
                    return;
                }

                match action::create_schedule(&step, &scenario).await {
                    Ok(schedule) if schedule.is_created() => {
                        scenario.schedules.add(schedule);
                    }
                    Ok(_) => {}
                    Err(failure) => record(&ctx, &step, failure),
                }
            }
        },
        WorkerOptions {
            max_parallelism: scenario.parallelism,
            mode: LoopMode::FixedCount(scenario.config.schedule_count),
        },
    )?;

    worker.process(&ctx).await;
    info!(
        "Schedules finished: {} created",
        scenario.schedules.count()
    );
    Ok(())
}
