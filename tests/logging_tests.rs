use std::sync::{Arc, Mutex};
use std::time::Duration;

use framecatch_node::core::{Frame, FrameBuffer, FrameFormat, Shutdown};
use framecatch_node::jobs::{Job, JobResolver, MemoryJobQueue};
use framecatch_node::testing::mocks::{RecordingPublisher, RecordingStore};

struct CapturingLogger {
    lines: Mutex<Vec<(log::Level, String)>>,
}

impl log::Log for CapturingLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        let mut lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        lines.push((record.level(), record.args().to_string()));
    }

    fn flush(&self) {}
}

static LOGGER: CapturingLogger = CapturingLogger {
    lines: Mutex::new(Vec::new()),
};

fn install_logger() {
    // only the first call per test binary succeeds
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(log::LevelFilter::Trace);
}

fn lines_for_job(job_id: &str) -> Vec<(log::Level, String)> {
    let tag = format!(" job={}]", job_id);
    LOGGER
        .lines
        .lock()
        .unwrap()
        .iter()
        .filter(|(_, line)| line.contains(&tag))
        .cloned()
        .collect()
}

fn resolver(queue: &MemoryJobQueue, buffer: Arc<FrameBuffer>, store: RecordingStore) -> JobResolver {
    JobResolver::new(
        Arc::new(queue.clone()),
        buffer,
        Arc::new(store),
        Arc::new(RecordingPublisher::new()),
        "sess",
        250,
        Duration::from_millis(10),
        Shutdown::new(),
    )
}

fn buffer_100_to_115() -> Arc<FrameBuffer> {
    let buffer = Arc::new(FrameBuffer::new(3));
    for ts in [100, 105, 110, 115] {
        buffer.insert(Frame::new(ts, FrameFormat::Jpeg, vec![ts as u8]));
    }
    buffer
}

#[tokio::test]
async fn test_resolution_lines_carry_job_and_latency() {
    install_logger();
    let queue = MemoryJobQueue::new();
    queue.insert(Job::new("job-7", 107));

    let resolver = resolver(&queue, buffer_100_to_115(), RecordingStore::new());
    assert!(resolver.resolve("job-7").await.is_resolved());

    let lines = lines_for_job("job-7");
    assert!(!lines.is_empty());
    assert!(lines.iter().all(|(_, line)| line.starts_with("[seq=")));
    assert!(lines.iter().all(|(_, line)| line.contains("[Resolver:sess job=job-7]")));

    let found = lines
        .iter()
        .find(|(_, line)| line.contains("target=107 found=105"))
        .expect("no line for the chosen frame");
    assert_eq!(found.0, log::Level::Warn);
    assert!(found.1.ends_with("latency=2s"), "unexpected line: {}", found.1);

    assert!(
        lines
            .iter()
            .any(|(level, line)| *level == log::Level::Info && line.contains("resolved with frame 105"))
    );
}

#[tokio::test]
async fn test_exact_match_and_write_failure_are_reported_per_job() {
    install_logger();
    let queue = MemoryJobQueue::new();
    queue.insert(Job::new("job-exact", 110));

    let resolver = resolver(&queue, buffer_100_to_115(), RecordingStore::new().fail_first(1));
    assert!(resolver.resolve("job-exact").await.is_resolved());

    let lines = lines_for_job("job-exact");
    let found = lines
        .iter()
        .find(|(_, line)| line.contains("target=110 found=110"))
        .expect("no line for the chosen frame");
    assert_eq!(found.0, log::Level::Info);

    assert!(
        lines
            .iter()
            .any(|(level, line)| *level == log::Level::Error && line.contains("frame write failed"))
    );
}

#[tokio::test]
async fn test_skipped_job_logs_reason() {
    install_logger();
    let queue = MemoryJobQueue::new();
    let resolver = resolver(&queue, buffer_100_to_115(), RecordingStore::new());

    resolver.resolve("job-gone").await;

    let lines = lines_for_job("job-gone");
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].0, log::Level::Debug);
    assert!(lines[0].1.contains("job no longer exists"));
}
