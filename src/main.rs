// src/main.rs

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use log::{debug, error, info};

use framecatch_node::config::Config;
use framecatch_node::core::Shutdown;
use framecatch_node::jobs::SpoolJobQueue;
use framecatch_node::producers::ProducerHandle;
use framecatch_node::session::Session;

const STATS_INTERVAL: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    // ------------------------------------------------------------
    // Config
    // ------------------------------------------------------------
    let cfg_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".into());

    let cfg = Config::load(&cfg_path)?;
    info!("[framecatch] loaded {}", cfg_path);
    info!(
        "[framecatch] session '{}': capture {}x{} @ {} fps from {:?}, buffer {} frames",
        cfg.session,
        cfg.capture.width,
        cfg.capture.height,
        cfg.capture.fps,
        cfg.capture.source,
        cfg.buffer.capacity
    );

    // ------------------------------------------------------------
    // Graceful shutdown
    // ------------------------------------------------------------
    let shutdown = Shutdown::new();
    {
        let s = shutdown.clone();
        ctrlc::set_handler(move || {
            info!("[framecatch] shutdown requested");
            s.trigger();
        })?;
    }

    // ------------------------------------------------------------
    // Job queue / Session
    // ------------------------------------------------------------
    let queue = SpoolJobQueue::open(cfg.jobs.spool_dir.clone())
        .await
        .with_context(|| format!("opening job spool {}", cfg.jobs.spool_dir.display()))?;
    info!("[framecatch] job spool at {}", queue.dir().display());

    let session = Session::from_config(&cfg, Arc::new(queue), shutdown.clone()).await?;

    start_stats_logger(session.producer_handle(), shutdown.clone());

    // ------------------------------------------------------------
    // Main loop
    // ------------------------------------------------------------
    info!("[framecatch] running, Ctrl+C to stop");
    let result = session.run().await;

    match &result {
        Ok(()) => info!("[framecatch] capture session complete"),
        Err(e) => error!("[framecatch] session ended with error: {:#}", e),
    }
    result
}

fn start_stats_logger(handle: ProducerHandle, shutdown: Shutdown) {
    tokio::spawn(async move {
        loop {
            shutdown.wait_timeout(STATS_INTERVAL).await;
            if shutdown.is_triggered() {
                break;
            }

            let status = handle.status();
            let stats = status.buffer_stats;
            debug!(
                "[framecatch] captured={} buffer={}/{} evicted={} oldest={:?} latest={:?}",
                status.frames_captured,
                stats.len,
                stats.capacity,
                stats.evicted,
                stats.oldest_timestamp,
                stats.latest_timestamp
            );
        }
    });
}
