use std::sync::Arc;
use std::time::Duration;

use framecatch_node::config::Config;
use framecatch_node::core::{Shutdown, unix_now};
use framecatch_node::jobs::{Job, SpoolJobQueue};
use framecatch_node::session::Session;

fn test_config(root: &std::path::Path) -> Config {
    let toml = format!(
        r#"
session = "e2e"

[buffer]
capacity = 5

[capture]
source = "synthetic"
interval_ms = 20
width = 8
height = 4

[checkpoint]
interval_ms = 30
output_dir = "{out}"

[jobs]
poll_interval_ms = 20
spool_dir = "{jobs}"

[publish]
mirror_dir = "{mirror}"
"#,
        out = root.join("out").display(),
        jobs = root.join("jobs").display(),
        mirror = root.join("mirror").display(),
    );
    Config::from_toml(&toml).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_session_resolves_spooled_job() {
    let root = tempfile::tempdir().unwrap();
    let cfg = test_config(root.path());

    let queue = SpoolJobQueue::open(cfg.jobs.spool_dir.clone()).await.unwrap();
    queue.submit(&Job::new("wanted", unix_now())).await.unwrap();

    let shutdown = Shutdown::new();
    let session = Session::from_config(&cfg, Arc::new(queue.clone()), shutdown.clone())
        .await
        .unwrap();
    let buffer = session.buffer();
    let producer = session.producer_handle();
    assert!(cfg.session_dir().is_dir());

    let task = tokio::spawn(session.run());

    let mut resolved = None;
    for _ in 0..200 {
        if let Some(ts) = queue.get("wanted").await.unwrap().and_then(|j| j.media_timestamp) {
            resolved = Some(ts);
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    shutdown.trigger();
    task.await.unwrap().unwrap();

    let ts = resolved.expect("job was not resolved");
    assert!(buffer.len() <= 5);
    assert!(producer.status().frames_captured >= 1);
    assert!(!producer.status().running);

    let frame_file = format!("{}.ppm", ts);
    assert!(cfg.session_dir().join(&frame_file).is_file());
    assert!(
        root.path()
            .join("mirror/frames/e2e")
            .join(&frame_file)
            .is_file()
    );
}

#[tokio::test]
async fn test_session_fails_when_capture_fails() {
    let root = tempfile::tempdir().unwrap();
    let mut cfg = test_config(root.path());
    cfg.capture.source = framecatch_node::config::CaptureSourceKind::File;
    cfg.capture.file = Some(root.path().join("missing.jpg"));

    let queue = SpoolJobQueue::open(cfg.jobs.spool_dir.clone()).await.unwrap();
    let shutdown = Shutdown::new();
    let session = Session::from_config(&cfg, Arc::new(queue), shutdown.clone())
        .await
        .unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), session.run())
        .await
        .expect("session should stop on its own");

    assert!(result.is_err());
    assert!(shutdown.is_triggered());
}
