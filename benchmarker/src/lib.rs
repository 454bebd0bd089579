//! Speedtest Benchmarker Library
//!
//! A load-generating benchmarker: virtual users sign up, log in and create
//! schedules against a target service under bounded concurrency. Every
//! response is validated, validated interactions are scored and failures are
//! classified by severity.

pub mod action;
pub mod agent;
pub mod assert;
pub mod cancel;
pub mod config;
pub mod driver;
pub mod failure;
pub mod model;
pub mod scenario;
pub mod step;
pub mod worker;

#[cfg(test)]
mod test_utils;

// Re-export commonly used types
pub use agent::{Agent, AgentFactory, AssetManifest, HttpAgent, HttpAgentFactory, Response};
pub use cancel::Cancellation;
pub use config::{Config, ScenarioConfig};
pub use failure::{ErrorKind, Failure};
pub use model::{Registry, Schedule, User};
pub use scenario::{Scenario, ScenarioError};
pub use step::BenchmarkStep;
pub use worker::{LoopMode, Worker, WorkerError, WorkerOptions};
