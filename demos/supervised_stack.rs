//! # Example: supervised_stack
//!
//! Three interdependent components under one supervisor:
//!
//! ```text
//! database ◄── cache ◄── api
//! ```
//!
//! The cache degrades a few seconds in, the supervisor restarts it with backoff,
//! and it recovers. Status snapshots are printed as JSON whenever the aggregate
//! state changes. Stop with Ctrl-C.
//!
//! ## Run
//! ```bash
//! RUST_LOG=info cargo run --example supervised_stack
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use healthvisor::{
    BackoffPolicy, ComponentError, ComponentFn, ComponentRef, Config, HealthResult, LogWriter,
    RecoveryPolicy, Supervisor,
};

fn database() -> ComponentRef {
    ComponentFn::builder("database")
        .on_start(|_ctx: CancellationToken| async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok::<_, ComponentError>(())
        })
        .arc()
}

/// Degraded on probes 4..=8, healthy otherwise.
fn cache() -> ComponentRef {
    let probes = Arc::new(AtomicU32::new(0));
    ComponentFn::builder("cache")
        .on_check(move || {
            let n = probes.fetch_add(1, Ordering::Relaxed);
            async move {
                if (4..=8).contains(&n) {
                    HealthResult::degraded("eviction storm")
                } else {
                    HealthResult::Healthy
                }
            }
        })
        .arc()
}

fn api() -> ComponentRef {
    ComponentFn::builder("api")
        .on_stop(|_ctx: CancellationToken| async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok::<_, ComponentError>(())
        })
        .arc()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = Config {
        health_interval: Duration::from_secs(1),
        check_timeout: Duration::from_millis(500),
        recovery: RecoveryPolicy {
            backoff: BackoffPolicy::exponential(Duration::from_millis(500), Duration::from_secs(4)),
            max_failures: 6,
        },
        ..Config::default()
    };

    let sup = Supervisor::builder(cfg)
        .with_subscriber(Arc::new(LogWriter::new()))
        .build();

    sup.register(database(), &[]).await?;
    sup.register(cache(), &["database"]).await?;
    sup.register(api(), &["cache"]).await?;

    let mut rx = sup.watch();
    tokio::spawn(async move {
        let mut last = None;
        while rx.changed().await.is_ok() {
            let snap = rx.borrow_and_update().clone();
            if last != Some(snap.state) {
                last = Some(snap.state);
                if let Ok(json) = serde_json::to_string_pretty(&*snap) {
                    println!("{json}");
                }
            }
        }
    });

    let report = sup.run_until_signal().await?;
    for (name, err) in &report.failures {
        eprintln!("{name} did not stop cleanly: {err}");
    }
    Ok(())
}
