//! Fresh Cache demo
//!
//! Walks through the cache API against the backend selected by the environment:
//! timestamps and age, TTL reads, cache-aside refresh and the expired-key sweep.

use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

use anyhow::Context;
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fresh_cache::{spawn_sweep_task, CacheConfig, CacheManager, SweepPolicy};

/// Entry point for the demo.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create the cache manager for the configured backend
/// 4. Start the background sweep task if one is configured
/// 5. Run the walkthrough on the blocking pool
/// 6. Stop the sweep task
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fresh_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = CacheConfig::from_env();
    info!(
        "Configuration loaded: persistent={}, path={}, busy_timeout={}ms, retention={}d, sweep_interval={}s",
        config.use_persistent,
        config.storage_path.display(),
        config.busy_timeout_ms,
        config.retention_days,
        config.sweep_interval
    );

    let cache = Arc::new(CacheManager::from_config(&config).context("failed to create cache")?);

    let sweep_handle = SweepPolicy::from_config(&config)
        .map(|policy| spawn_sweep_task(Arc::clone(&cache), policy));

    let demo_cache = Arc::clone(&cache);
    let outcome = tokio::task::spawn_blocking(move || run_demo(&demo_cache))
        .await
        .context("demo task did not complete")?;

    if let Some(handle) = sweep_handle {
        handle.abort();
        warn!("Sweep task aborted");
    }

    outcome?;
    info!(stats = ?cache.stats(), "Demo complete");
    Ok(())
}

fn run_demo(cache: &CacheManager) -> anyhow::Result<()> {
    info!("=== Timestamps ===");
    cache.set("user:123", json!({"name": "Mario", "age": 30}))?;
    info!(value = ?cache.get("user:123")?, "Stored value");
    info!(age = ?cache.get_age("user:123")?, "Entry age (s)");
    info!(info = ?cache.get_with_info("user:123")?, "Full info");

    sleep(Duration::from_secs(1));
    info!(age = ?cache.get_age("user:123")?, "Entry age after 1s (s)");

    info!("=== TTL helpers ===");
    let ttl = Duration::from_secs(5);
    cache.set("api_data", json!({"data": "important value"}))?;
    let fresh = cache.get_if_fresh_or("api_data", ttl, "DEFAULT")?;
    info!(%fresh, "Fresh read");

    sleep(Duration::from_millis(100));
    let refreshed = cache.get_or_set_if_stale(
        "api_data",
        || {
            info!("Reloading api_data");
            json!({"data": "new value"})
        },
        Duration::from_millis(50),
    )?;
    info!(%refreshed, "Refreshed after staleness");

    info!("=== Cache-aside ===");
    let profile_ttl = Duration::from_secs(300);
    for attempt in 1..=2 {
        let profile = cache.get_or_set_if_stale(
            "profile:456",
            || fetch_user_profile(456),
            profile_ttl,
        )?;
        info!(attempt, %profile, "Profile");
    }

    let removed = cache.cleanup_expired_keys(Duration::from_secs(60))?;
    info!(removed, size = cache.size()?, "Expired keys swept");

    Ok(())
}

/// Stands in for an expensive remote lookup.
fn fetch_user_profile(user_id: u64) -> serde_json::Value {
    info!(user_id, "Loading profile from the API");
    sleep(Duration::from_millis(100));
    json!({
        "id": user_id,
        "name": format!("User {}", user_id),
        "email": format!("user{}@example.com", user_id),
    })
}
