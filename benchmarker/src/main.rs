use std::sync::Arc;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;
use speedtest_benchmarker::agent::{AssetManifest, HttpAgentFactory};
use speedtest_benchmarker::{BenchmarkStep, Cancellation, Config, ErrorKind, Scenario};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Log the final score and per-kind error counts
fn log_summary(step: &BenchmarkStep, scenario: &Scenario, started: Instant) {
    info!(
        "Benchmark finished in {:.1}s: score={}, users={}, schedules={}",
        started.elapsed().as_secs_f64(),
        step.score(),
        scenario.users.count(),
        scenario.schedules.count()
    );
    for kind in ErrorKind::ALL {
        let count = step.error_count(kind);
        if count > 0 {
            warn!("  {}: {}", kind, count);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "benchmarker=info,speedtest_benchmarker=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = Config::from_env();
    info!(
        "Loaded configuration: target={}, parallelism={}, login_parallelism={}",
        config.target_url, config.scenario.parallelism, config.scenario.login_parallelism
    );

    if let Some(addr) = config.metrics_addr {
        PrometheusBuilder::new().with_http_listener(addr).install()?;
        info!("Prometheus metrics exposed on {}", addr);
    }

    let assets = match &config.asset_manifest {
        Some(path) => {
            let manifest = AssetManifest::from_file(path)?;
            if manifest.is_empty() {
                warn!("Asset manifest {:?} lists no assets", path);
            } else {
                info!("Loaded {} assets from {:?}", manifest.len(), path);
            }
            manifest
        }
        None => {
            info!("No asset manifest configured (ASSET_MANIFEST not set)");
            AssetManifest::default()
        }
    };
    let assets = Arc::new(assets);

    let agents = Arc::new(HttpAgentFactory::new(
        &config.target_url,
        config.request_timeout,
        Arc::clone(&assets),
    ));
    let scenario = Arc::new(Scenario::new(
        config.scenario.clone(),
        agents,
        assets,
        &config.staff_email,
        &config.staff_nickname,
    )?);
    let step = Arc::new(BenchmarkStep::new());

    // Ctrl-C stops new work; in-flight actions still finish
    let ctx = Cancellation::new();
    let abort = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, draining in-flight actions");
            abort.cancel();
        }
    });

    let started = Instant::now();
    let outcome = match scenario.prepare(&step).await {
        Ok(()) => scenario.load(&ctx, &step).await,
        Err(e) => Err(e),
    };

    log_summary(&step, &scenario, started);
    if let Err(ref e) = outcome {
        error!("Benchmark failed: {}", e);
    }

    outcome?;
    Ok(())
}
