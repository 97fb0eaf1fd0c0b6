use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use exswap::{ExHandle, SlotState, TripleSwapchain};

const FRAMES: i32 = 20_000;

#[test]
fn consumer_only_sees_newer_frames() {
    let chain = TripleSwapchain::new();
    let done = AtomicBool::new(false);

    let seen = thread::scope(|scope| {
        scope.spawn(|| {
            for id in 1..=FRAMES {
                let slot = chain.acquire_write();
                chain.commit_write(slot, ExHandle::empty(id));
            }
            done.store(true, Ordering::Release);
        });

        let consumer = scope.spawn(|| {
            let mut seen = Vec::new();
            loop {
                let finished = done.load(Ordering::Acquire);
                match chain.acquire_read() {
                    Some(slot) => {
                        seen.push(slot.handle().id());
                        chain.release_read(slot);
                    }
                    None if finished => break,
                    None => thread::yield_now(),
                }
            }
            seen
        });
        consumer.join().expect("consumer thread")
    });

    assert!(!seen.is_empty());
    assert!(seen.windows(2).all(|pair| pair[0] < pair[1]), "frame order regressed");
    assert_eq!(seen.last(), Some(&FRAMES), "newest frame never delivered");

    let stats = chain.stats();
    assert_eq!(stats.committed, FRAMES as u64);
    assert_eq!(stats.consumed, seen.len() as u64);
    assert_eq!(stats.committed, stats.consumed + stats.superseded);
    assert_eq!(chain.states(), [SlotState::Free; 3]);
}

#[test]
fn superseded_frame_is_never_delivered() {
    let chain = TripleSwapchain::new();
    let file = tempfile::tempfile().expect("temp file");
    file.set_len(16).expect("resize");
    let first = ExHandle::new(1, file.into(), 2, 2, 16);

    let slot = chain.acquire_write();
    chain.commit_write(slot, first);
    let slot = chain.acquire_write();
    chain.commit_write(slot, ExHandle::empty(2));

    let read = chain.acquire_read().expect("newest frame");
    assert_eq!(read.handle().id(), 2);
    chain.release_read(read);
    assert!(chain.acquire_read().is_none());
    assert_eq!(chain.stats().superseded, 1);
}
