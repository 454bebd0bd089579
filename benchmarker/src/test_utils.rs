//! Test Utilities Module
//!
//! Scripted agents and an in-memory fake of the target service, so actions,
//! drivers and the scenario can be exercised without a network.
//! This module is only compiled when running tests.

#![cfg(test)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::json;
use uuid::Uuid;

use crate::agent::{Agent, AgentError, AgentFactory, AssetManifest, Response, SubResource};
use crate::config::ScenarioConfig;
use crate::model::User;
use crate::scenario::Scenario;

pub const STAFF_EMAIL: &str = "staff@example.com";
pub const STAFF_NICKNAME: &str = "staff";

// ============================================================================
// Responses
// ============================================================================

/// A JSON response with the given status
pub fn json_response(status: StatusCode, body: serde_json::Value) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Response::new(status, headers, body.to_string())
}

fn html_response() -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"));
    Response::new(StatusCode::OK, headers, "<!DOCTYPE html><html></html>")
}

// ============================================================================
// Mock Agent
// ============================================================================

/// A request as seen by a [`MockAgent`] handler
#[derive(Debug, Clone)]
pub struct MockRequest {
    pub method: &'static str,
    pub path: String,
    pub form: Vec<(String, String)>,
}

impl MockRequest {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.form
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

type Handler = dyn Fn(&MockRequest) -> Result<Response, AgentError> + Send + Sync;

/// Agent whose responses come from a closure
pub struct MockAgent {
    handler: Arc<Handler>,
    resources: Vec<SubResource>,
    requests: Arc<Mutex<Vec<MockRequest>>>,
    latency: Duration,
}

impl MockAgent {
    pub fn new(
        handler: impl Fn(&MockRequest) -> Result<Response, AgentError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Arc::new(handler),
            resources: Vec::new(),
            requests: Arc::new(Mutex::new(Vec::new())),
            latency: Duration::from_millis(1),
        }
    }

    /// Sub-resources returned for every page
    pub fn with_resources(mut self, resources: Vec<SubResource>) -> Self {
        self.resources = resources;
        self
    }

    /// Log of every request issued so far
    pub fn requests(&self) -> Arc<Mutex<Vec<MockRequest>>> {
        Arc::clone(&self.requests)
    }

    async fn dispatch(&self, request: MockRequest) -> Result<Response, AgentError> {
        tokio::time::sleep(self.latency).await;
        let result = (self.handler)(&request);
        self.requests.lock().unwrap().push(request);
        result
    }
}

#[async_trait]
impl Agent for MockAgent {
    async fn get(&self, path: &str) -> Result<Response, AgentError> {
        self.dispatch(MockRequest {
            method: "GET",
            path: path.to_string(),
            form: Vec::new(),
        })
        .await
    }

    async fn post_form(
        &self,
        path: &str,
        fields: &[(&str, String)],
    ) -> Result<Response, AgentError> {
        self.dispatch(MockRequest {
            method: "POST",
            path: path.to_string(),
            form: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        })
        .await
    }

    async fn fetch_resources(&self, _page: &Response) -> Vec<SubResource> {
        self.resources.clone()
    }
}

// ============================================================================
// Fake Target
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
struct Behavior {
    wrong_nickname: bool,
    wrong_capacity: bool,
    failing_initialize: bool,
    unreachable: bool,
}

#[derive(Default)]
struct FakeState {
    /// email -> (id, nickname, created_at)
    users: Mutex<HashMap<String, (String, String, String)>>,
    signups: AtomicUsize,
    logins: AtomicUsize,
}

/// In-memory stand-in for the service under test
#[derive(Clone)]
pub struct FakeTarget {
    state: Arc<FakeState>,
    behavior: Behavior,
}

impl FakeTarget {
    /// A correct target with the staff user seeded
    pub fn new() -> Self {
        let state = FakeState::default();
        state.users.lock().unwrap().insert(
            STAFF_EMAIL.to_string(),
            (
                "staff".to_string(),
                STAFF_NICKNAME.to_string(),
                chrono::Utc::now().to_rfc3339(),
            ),
        );
        Self {
            state: Arc::new(state),
            behavior: Behavior::default(),
        }
    }

    /// Echo a different nickname from signup
    pub fn with_wrong_nickname(mut self) -> Self {
        self.behavior.wrong_nickname = true;
        self
    }

    /// Echo a different capacity from schedule creation
    pub fn with_wrong_capacity(mut self) -> Self {
        self.behavior.wrong_capacity = true;
        self
    }

    pub fn with_failing_initialize(mut self) -> Self {
        self.behavior.failing_initialize = true;
        self
    }

    /// Every request fails at the transport level
    pub fn unreachable(mut self) -> Self {
        self.behavior.unreachable = true;
        self
    }

    /// Number of signups the target accepted
    pub fn signup_count(&self) -> usize {
        self.state.signups.load(Ordering::SeqCst)
    }

    /// Number of login submissions received
    pub fn login_count(&self) -> usize {
        self.state.logins.load(Ordering::SeqCst)
    }

    pub fn agent(&self) -> Box<dyn Agent> {
        let target = self.clone();
        Box::new(MockAgent::new(move |req| target.handle(req)))
    }

    fn handle(&self, req: &MockRequest) -> Result<Response, AgentError> {
        if self.behavior.unreachable {
            return Err(AgentError::Transport {
                path: req.path.clone(),
                reason: "connection refused".to_string(),
            });
        }

        let response = match (req.method, req.path.as_str()) {
            ("POST", "/initialize") if self.behavior.failing_initialize => {
                json_response(StatusCode::INTERNAL_SERVER_ERROR, json!({}))
            }
            ("POST", "/initialize") => json_response(StatusCode::OK, json!({"language": "rust"})),
            ("POST", "/api/signup") => self.signup(req),
            ("POST", "/api/login") => self.login(req),
            ("POST", "/api/schedules") => self.create_schedule(req),
            ("GET", _) => html_response(),
            _ => json_response(StatusCode::NOT_FOUND, json!({"error": "not found"})),
        };
        Ok(response)
    }

    fn signup(&self, req: &MockRequest) -> Response {
        let email = req.field("email").unwrap_or_default().to_string();
        let nickname = req.field("nickname").unwrap_or_default().to_string();
        let id = Uuid::new_v4().to_string();
        let created_at = chrono::Utc::now().to_rfc3339();

        self.state.users.lock().unwrap().insert(
            email.clone(),
            (id.clone(), nickname.clone(), created_at.clone()),
        );
        self.state.signups.fetch_add(1, Ordering::SeqCst);

        let nickname = if self.behavior.wrong_nickname {
            format!("{nickname}-typo")
        } else {
            nickname
        };
        json_response(
            StatusCode::OK,
            json!({"id": id, "email": email, "nickname": nickname, "created_at": created_at}),
        )
    }

    fn login(&self, req: &MockRequest) -> Response {
        self.state.logins.fetch_add(1, Ordering::SeqCst);
        let email = req.field("email").unwrap_or_default();

        match self.state.users.lock().unwrap().get(email) {
            Some((id, nickname, created_at)) => json_response(
                StatusCode::OK,
                json!({"id": id, "email": email, "nickname": nickname, "created_at": created_at}),
            ),
            None => json_response(StatusCode::FORBIDDEN, json!({"error": "forbidden"})),
        }
    }

    fn create_schedule(&self, req: &MockRequest) -> Response {
        let title = req.field("title").unwrap_or_default();
        let Ok(mut capacity) = req.field("capacity").unwrap_or_default().parse::<u64>() else {
            return json_response(StatusCode::BAD_REQUEST, json!({"error": "capacity"}));
        };
        if self.behavior.wrong_capacity {
            capacity += 1;
        }

        json_response(
            StatusCode::OK,
            json!({
                "id": Uuid::new_v4().to_string(),
                "title": title,
                "capacity": capacity,
                "created_at": chrono::Utc::now().to_rfc3339(),
            }),
        )
    }
}

/// Hands out agents bound to one [`FakeTarget`]
pub struct MockAgentFactory {
    target: FakeTarget,
}

impl MockAgentFactory {
    pub fn new(target: FakeTarget) -> Self {
        Self { target }
    }
}

impl AgentFactory for MockAgentFactory {
    fn new_agent(&self) -> Result<Box<dyn Agent>, AgentError> {
        Ok(self.target.agent())
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub fn test_config() -> ScenarioConfig {
    ScenarioConfig {
        parallelism: 4,
        login_parallelism: 8,
        signup_duration: Duration::from_millis(100),
        login_timeout: Duration::from_secs(5),
        schedule_count: 5,
        fail_login_ratio: 0.2,
    }
}

pub fn test_scenario(agents: Arc<dyn AgentFactory>) -> Scenario {
    Scenario::new(
        test_config(),
        agents,
        Arc::new(AssetManifest::default()),
        STAFF_EMAIL,
        STAFF_NICKNAME,
    )
    .expect("Failed to create test scenario")
}

/// An unregistered user with a unique email
pub fn test_user(agent: Box<dyn Agent>, fail_on_login: bool) -> User {
    let id = Uuid::new_v4().simple().to_string();
    User::new(
        format!("{id}@example.com"),
        format!("user-{}", &id[..8]),
        fail_on_login,
        agent,
    )
}
