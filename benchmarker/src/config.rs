//! Benchmarker configuration
//!
//! Configuration is loaded from environment variables; anything unset or
//! unparsable keeps its default.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Main benchmarker configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the service under test
    pub target_url: String,
    /// Per-request timeout applied by every agent
    pub request_timeout: Duration,
    /// JSON manifest of static assets and their SHA-256 digests
    pub asset_manifest: Option<PathBuf>,
    /// Address for the Prometheus exporter (disabled when unset)
    pub metrics_addr: Option<SocketAddr>,

    /// Credentials of the privileged user seeded by the target
    pub staff_email: String,
    pub staff_nickname: String,

    /// Scenario tuning
    pub scenario: ScenarioConfig,
}

/// Knobs of the load phase
#[derive(Debug, Clone)]
pub struct ScenarioConfig {
    /// Concurrency for signups and schedule creation
    pub parallelism: usize,
    /// Concurrency for logins
    pub login_parallelism: usize,
    /// Wall-clock budget of the signup phase
    pub signup_duration: Duration,
    /// Upper bound of the login phase
    pub login_timeout: Duration,
    /// Number of schedules the staff user creates
    pub schedule_count: usize,
    /// Probability (0.0-1.0) that a new user is expected to fail login
    pub fail_login_ratio: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target_url: "http://127.0.0.1:9292".to_string(),
            request_timeout: Duration::from_secs(10),
            asset_manifest: None,
            metrics_addr: None,
            staff_email: "staff@example.com".to_string(),
            staff_nickname: "staff".to_string(),
            scenario: ScenarioConfig::default(),
        }
    }
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            parallelism: 50,
            login_parallelism: 100,
            signup_duration: Duration::from_secs(10),
            login_timeout: Duration::from_secs(30),
            schedule_count: 10,
            fail_login_ratio: 0.1,
        }
    }
}

impl ScenarioConfig {
    /// `fail_login_ratio` as a probability usable for sampling
    ///
    /// Non-finite ratios count as 0.0; everything else is clamped to [0, 1].
    pub fn fail_login_probability(&self) -> f64 {
        if self.fail_login_ratio.is_finite() {
            self.fail_login_ratio.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// Parse a probability, rejecting NaN and infinities
fn parse_ratio(val: &str) -> Option<f64> {
    val.trim()
        .parse::<f64>()
        .ok()
        .filter(|ratio| ratio.is_finite())
        .map(|ratio| ratio.clamp(0.0, 1.0))
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = env::var("TARGET_URL")
            && !url.is_empty()
        {
            config.target_url = url;
        }
        if let Ok(val) = env::var("REQUEST_TIMEOUT_SECS")
            && let Ok(secs) = val.parse::<u64>()
        {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Ok(path) = env::var("ASSET_MANIFEST")
            && !path.is_empty()
        {
            config.asset_manifest = Some(PathBuf::from(path));
        }
        if let Ok(val) = env::var("METRICS_ADDR")
            && let Ok(addr) = val.parse()
        {
            config.metrics_addr = Some(addr);
        }
        if let Ok(email) = env::var("STAFF_EMAIL")
            && !email.is_empty()
        {
            config.staff_email = email;
        }
        if let Ok(nickname) = env::var("STAFF_NICKNAME")
            && !nickname.is_empty()
        {
            config.staff_nickname = nickname;
        }

        // Scenario config
        if let Ok(val) = env::var("PARALLELISM")
            && let Ok(v) = val.parse::<usize>()
            && v > 0
        {
            config.scenario.parallelism = v;
        }
        if let Ok(val) = env::var("LOGIN_PARALLELISM")
            && let Ok(v) = val.parse::<usize>()
            && v > 0
        {
            config.scenario.login_parallelism = v;
        }
        if let Ok(val) = env::var("SIGNUP_DURATION_SECS")
            && let Ok(secs) = val.parse::<u64>()
        {
            config.scenario.signup_duration = Duration::from_secs(secs);
        }
        if let Ok(val) = env::var("LOGIN_TIMEOUT_SECS")
            && let Ok(secs) = val.parse::<u64>()
        {
            config.scenario.login_timeout = Duration::from_secs(secs);
        }
        if let Ok(val) = env::var("SCHEDULE_COUNT")
            && let Ok(v) = val.parse()
        {
            config.scenario.schedule_count = v;
        }
        if let Ok(val) = env::var("FAIL_LOGIN_RATIO")
            && let Some(ratio) = parse_ratio(&val)
        {
            config.scenario.fail_login_ratio = ratio;
        }

        config
    }
}
