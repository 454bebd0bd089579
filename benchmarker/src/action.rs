//! Scenario actions
//!
//! Each action drives one interaction sequence against the target:
//! browse, submit, validate, score. An `Err` return means the action could
//! not complete (e.g. transport failure). `Ok(())` only says the action ran;
//! contract violations found during validation are recorded into the
//! [`BenchmarkStep`] and simply withhold the score.
//!
//! Validation deliberately keeps going after a failed check so one attempt
//! reports every broken field of a response.

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::agent::{Agent, AgentError, AssetManifest};
use crate::assert::{
    assert_checksum, assert_content_type, assert_equal_string, assert_equal_uint,
    assert_initialize, assert_json_body, assert_status_code,
};
use crate::failure::{ErrorKind, Failure};
use crate::model::{Schedule, User};
use crate::scenario::Scenario;
use crate::step::{BenchmarkStep, SCORE_CREATE_SCHEDULE, SCORE_LOGIN, SCORE_SIGNUP};

const JSON_CONTENT_TYPE: &str = "application/json";

/// Non-short-circuiting validation: every failed check is recorded
struct Checks<'a> {
    step: &'a BenchmarkStep,
    failed: bool,
}

impl<'a> Checks<'a> {
    fn new(step: &'a BenchmarkStep) -> Self {
        Self {
            step,
            failed: false,
        }
    }

    fn check<T>(&mut self, result: Result<T, Failure>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(failure) => {
                self.step.add_error(failure);
                self.failed = true;
                None
            }
        }
    }

    fn passed(&self) -> bool {
        !self.failed
    }
}

fn critical(e: AgentError) -> Failure {
    Failure::critical(e.to_string())
}

/// Load `path` like a browser: the page, then every sub-resource
///
/// Stops at the first failure.
pub async fn browser_access(
    user: &User,
    path: &str,
    assets: &AssetManifest,
) -> Result<(), Failure> {
    let page = user.agent.get(path).await.map_err(critical)?;
    assert_status_code(&page, StatusCode::OK)?;

    for resource in user.agent.fetch_resources(&page).await {
        let res = match resource.result {
            Ok(res) => res,
            Err(e) if e.is_timeout() => {
                return Err(Failure::new(ErrorKind::Timeout, e.to_string()));
            }
            Err(e) => {
                return Err(Failure::new(
                    ErrorKind::InvalidAsset,
                    format!("Failed to fetch resource: {}: {}", resource.path, e),
                ));
            }
        };

        if res.status == StatusCode::NOT_MODIFIED {
            continue;
        }
        assert_status_code(&res, StatusCode::OK).map_err(|failure| {
            Failure::new(
                ErrorKind::InvalidAsset,
                format!("{}: {}", resource.path, failure.message),
            )
        })?;
        assert_checksum(&resource.path, &res, assets)?;
    }

    Ok(())
}

/// Reset the target to its initial data set
pub async fn initialize(step: &BenchmarkStep, agent: &dyn Agent) -> Result<(), Failure> {
    let res = agent.post_form("/initialize", &[]).await.map_err(critical)?;
    assert_initialize(step, &res);
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct SignupResponse {
    pub id: String,
    pub email: String,
    pub nickname: String,
    pub created_at: DateTime<Utc>,
}

pub async fn signup(
    step: &BenchmarkStep,
    assets: &AssetManifest,
    user: &mut User,
) -> Result<(), Failure> {
    browser_access(user, "/signup", assets).await?;

    let form = [
        ("email", user.email.clone()),
        ("nickname", user.nickname.clone()),
    ];
    let res = user
        .agent
        .post_form("/api/signup", &form)
        .await
        .map_err(critical)?;

    let mut checks = Checks::new(step);
    checks.check(assert_status_code(&res, StatusCode::OK));
    checks.check(assert_content_type(&res, JSON_CONTENT_TYPE));
    let body = checks.check(assert_json_body::<SignupResponse>(&res));
    if let Some(body) = &body {
        checks.check(assert_equal_string(&user.email, &body.email));
        checks.check(assert_equal_string(&user.nickname, &body.nickname));
    }

    if let (true, Some(body)) = (checks.passed(), body) {
        user.id = Some(body.id);
        user.created_at = Some(body.created_at);
        step.add_score(SCORE_SIGNUP);
        debug!("Signed up {}", user.email);
    }

    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub id: String,
    pub email: String,
    pub nickname: String,
    pub created_at: DateTime<Utc>,
}

pub async fn login(step: &BenchmarkStep, assets: &AssetManifest, user: &User) -> Result<(), Failure> {
    browser_access(user, "/login", assets).await?;

    let email = if user.fail_on_login {
        format!("invalid-{}", user.email)
    } else {
        user.email.clone()
    };
    let res = user
        .agent
        .post_form("/api/login", &[("email", email)])
        .await
        .map_err(critical)?;

    let mut checks = Checks::new(step);
    if user.fail_on_login {
        checks.check(assert_status_code(&res, StatusCode::FORBIDDEN));
    } else {
        checks.check(assert_status_code(&res, StatusCode::OK));
        checks.check(assert_content_type(&res, JSON_CONTENT_TYPE));
        if let Some(body) = checks.check(assert_json_body::<LoginResponse>(&res)) {
            checks.check(assert_equal_string(&user.email, &body.email));
            checks.check(assert_equal_string(&user.nickname, &body.nickname));
        }
    }

    if checks.passed() {
        step.add_score(SCORE_LOGIN);
    }

    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct CreateScheduleResponse {
    pub id: String,
    pub title: String,
    pub capacity: u64,
    pub created_at: DateTime<Utc>,
}

/// Create one schedule as the staff user
///
/// The schedule is returned even when validation failed; only a schedule
/// with an `id` was accepted.
pub async fn create_schedule(step: &BenchmarkStep, scenario: &Scenario) -> Result<Schedule, Failure> {
    let user = &scenario.staff_user;
    let mut schedule = scenario.new_schedule();

    let form = [
        ("title", schedule.title.clone()),
        ("capacity", schedule.capacity.to_string()),
    ];
    let res = user
        .agent
        .post_form("/api/schedules", &form)
        .await
        .map_err(critical)?;

    let mut checks = Checks::new(step);
    checks.check(assert_status_code(&res, StatusCode::OK));
    checks.check(assert_content_type(&res, JSON_CONTENT_TYPE));
    let body = checks.check(assert_json_body::<CreateScheduleResponse>(&res));
    if let Some(body) = &body {
        checks.check(assert_equal_string(&schedule.title, &body.title));
        checks.check(assert_equal_uint(u64::from(schedule.capacity), body.capacity));
    }

    if let (true, Some(body)) = (checks.passed(), body) {
        schedule.id = Some(body.id);
        schedule.created_at = Some(body.created_at);
        step.add_score(SCORE_CREATE_SCHEDULE);
    }

    Ok(schedule)
}

/// Reservation flow; currently only browses the top page
pub async fn create_reservation(
    _schedule: &Schedule,
    user: &User,
    assets: &AssetManifest,
) -> Result<(), Failure> {
    browser_access(user, "/", assets).await
}
