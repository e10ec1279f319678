use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};

use framecatch_node::core::{Frame, FrameBuffer, FrameFormat};

#[test]
fn test_frame_buffer_threading_contention() {
    let buffer = Arc::new(FrameBuffer::new(64));
    let start = Arc::new(Barrier::new(5));
    let inserted = Arc::new(AtomicUsize::new(0));
    let lookups = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();

    for producer_id in 0..2i64 {
        let buffer = buffer.clone();
        let start = start.clone();
        let inserted = inserted.clone();
        handles.push(std::thread::spawn(move || {
            start.wait();
            for i in 0..200i64 {
                let ts = producer_id * 1_000 + i;
                buffer.insert(Frame::new(ts, FrameFormat::Jpeg, vec![producer_id as u8; 32]));
                inserted.fetch_add(1, Ordering::Relaxed);
                if i % 50 == 0 {
                    std::thread::yield_now();
                }
            }
        }));
    }

    for reader_id in 0..2i64 {
        let buffer = buffer.clone();
        let start = start.clone();
        let lookups = lookups.clone();
        handles.push(std::thread::spawn(move || {
            start.wait();
            for i in 0..400i64 {
                let found = if reader_id == 0 {
                    buffer.closest_to(i * 3).ok()
                } else {
                    buffer.latest()
                };
                if found.is_some() {
                    lookups.fetch_add(1, Ordering::Relaxed);
                } else {
                    std::thread::yield_now();
                }
                assert!(buffer.len() <= 64);
            }
        }));
    }

    start.wait();

    for handle in handles {
        handle.join().expect("thread should complete");
    }

    assert_eq!(inserted.load(Ordering::Relaxed), 400);
    assert_eq!(buffer.len(), 64);
    assert_eq!(buffer.stats().evicted, 400 - 64);
}
