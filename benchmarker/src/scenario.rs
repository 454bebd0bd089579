//! Scenario state and run phases
//!
//! [`Scenario`] owns everything the actions share across workers: the
//! registered users and schedules, the staff user, and the factory that
//! gives each new user its own agent.

use std::sync::Arc;

use rand::Rng;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::action;
use crate::agent::{AgentFactory, AssetManifest};
use crate::cancel::Cancellation;
use crate::config::ScenarioConfig;
use crate::driver;
use crate::failure::Failure;
use crate::model::{Registry, Schedule, User};
use crate::step::BenchmarkStep;
use crate::worker::WorkerError;

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("Run aborted after a critical failure during {phase}")]
    Aborted { phase: &'static str },

    #[error(transparent)]
    Worker(#[from] WorkerError),

    #[error(transparent)]
    Failure(#[from] Failure),
}

pub struct Scenario {
    pub users: Registry<User>,
    pub schedules: Registry<Schedule>,
    pub staff_user: User,
    pub parallelism: usize,
    pub config: ScenarioConfig,
    pub assets: Arc<AssetManifest>,
    agents: Arc<dyn AgentFactory>,
}

impl Scenario {
    pub fn new(
        config: ScenarioConfig,
        agents: Arc<dyn AgentFactory>,
        assets: Arc<AssetManifest>,
        staff_email: &str,
        staff_nickname: &str,
    ) -> Result<Self, Failure> {
        let agent = agents
            .new_agent()
            .map_err(|e| Failure::critical(e.to_string()))?;
        let staff_user = User::new(
            staff_email.to_string(),
            staff_nickname.to_string(),
            false,
            agent,
        );

        Ok(Self {
            users: Registry::new(),
            schedules: Registry::new(),
            staff_user,
            parallelism: config.parallelism,
            config,
            assets,
            agents,
        })
    }

    /// A fresh, unregistered user with a unique email
    pub fn new_user(&self) -> Result<User, Failure> {
        let agent = self
            .agents
            .new_agent()
            .map_err(|e| Failure::critical(e.to_string()))?;

        let id = Uuid::new_v4().simple().to_string();
        let email = format!("{}@example.com", id);
        let nickname = format!("user-{}", &id[..8]);
        let fail_on_login = rand::rng().random_bool(self.config.fail_login_probability());

        Ok(User::new(email, nickname, fail_on_login, agent))
    }

    pub fn new_schedule(&self) -> Schedule {
        let id = Uuid::new_v4().simple().to_string();
        let capacity = rand::rng().random_range(1..=100u32);
        Schedule::new(format!("schedule-{}", &id[..12]), capacity)
    }

    /// Reset the target and log the staff user in
    pub async fn prepare(&self, step: &BenchmarkStep) -> Result<(), ScenarioError> {
        info!("Initializing target");
        action::initialize(step, self.staff_user.agent.as_ref()).await?;
        if step.has_critical() {
            return Err(ScenarioError::Aborted {
                phase: "initialize",
            });
        }

        action::login(step, &self.assets, &self.staff_user).await?;
        Ok(())
    }

    /// Signups, then logins for every registered user, then schedules
    ///
    /// Stops between phases once a critical failure has been recorded or
    /// `ctx` is cancelled.
    pub async fn load(
        self: &Arc<Self>,
        ctx: &Cancellation,
        step: &Arc<BenchmarkStep>,
    ) -> Result<(), ScenarioError> {
        driver::signups(ctx, step, self).await?;
        self.check_phase(ctx, step, "signups")?;

        driver::logins(ctx, step, self).await?;
        self.check_phase(ctx, step, "logins")?;

        driver::create_schedules(ctx, step, self).await?;
        self.check_phase(ctx, step, "schedules")?;

        Ok(())
    }

    fn check_phase(
        &self,
        ctx: &Cancellation,
        step: &BenchmarkStep,
        phase: &'static str,
    ) -> Result<(), ScenarioError> {
        info!(
            "Finished {}: score={}, errors={}, users={}, schedules={}",
            phase,
            step.score(),
            step.total_errors(),
            self.users.count(),
            self.schedules.count()
        );
        if step.has_critical() {
            return Err(ScenarioError::Aborted { phase });
        }
        if ctx.is_cancelled() {
            warn!("Run cancelled after {}", phase);
        }
        Ok(())
    }
}
