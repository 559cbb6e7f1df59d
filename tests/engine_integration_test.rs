//! End-to-end pipeline tests
//!
//! These tests run full engines across real threads and verify the delivery
//! contract: exact in-order delivery to every consumer, drain on close, and
//! downstream-after-upstream ordering between groups.

use ringline::{Consumer, EngineBuilder, YieldingWaitStrategy};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

/// A consumer that appends every observed value to a shared vector
fn recording_consumer(seen: &Arc<Mutex<Vec<u64>>>) -> Consumer<u64> {
    let sink = Arc::clone(seen);
    Consumer::single(move |item: &u64| sink.lock().unwrap().push(*item))
}

#[test]
fn test_spsc_smoke_delivers_every_item_in_order() {
    const ITEMS: u64 = 32_771;

    let seen = Arc::new(Mutex::new(Vec::with_capacity(ITEMS as usize)));
    let engine = EngineBuilder::new(4096, u64::default)
        .consumer_group(vec![recording_consumer(&seen)])
        .build()
        .unwrap();

    let (mut writer, consumers) = engine.into_parts();
    let producer = thread::spawn(move || {
        for i in 0..ITEMS {
            writer.write(|slot| *slot = i);
        }
        writer.close();
    });

    consumers.loop_read();
    producer.join().unwrap();

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), ITEMS as usize);
    for (index, &value) in seen.iter().enumerate() {
        assert_eq!(value, index as u64);
    }
}

#[test]
fn test_two_tier_fan_out_observes_group_ordering() {
    // Two consumers race in group 0; one consumer trails in group 1 behind
    // their minimum. Capacity 4 forces several wraps over 11 items.
    let first_a = Arc::new(AtomicI64::new(-1));
    let first_b = Arc::new(AtomicI64::new(-1));
    let ordering_violated = Arc::new(AtomicBool::new(false));

    let seen_a = Arc::new(Mutex::new(Vec::new()));
    let seen_b = Arc::new(Mutex::new(Vec::new()));
    let seen_tail = Arc::new(Mutex::new(Vec::new()));

    let consumer_a = {
        let progress = Arc::clone(&first_a);
        let sink = Arc::clone(&seen_a);
        Consumer::single(move |item: &u64| {
            sink.lock().unwrap().push(*item);
            progress.store(*item as i64, Ordering::SeqCst);
        })
    };
    let consumer_b = {
        let progress = Arc::clone(&first_b);
        let sink = Arc::clone(&seen_b);
        Consumer::single(move |item: &u64| {
            sink.lock().unwrap().push(*item);
            progress.store(*item as i64, Ordering::SeqCst);
        })
    };
    let tail_consumer = {
        let upstream_a = Arc::clone(&first_a);
        let upstream_b = Arc::clone(&first_b);
        let violated = Arc::clone(&ordering_violated);
        let sink = Arc::clone(&seen_tail);
        Consumer::single(move |item: &u64| {
            // Both first-tier consumers must already have processed this
            // item before it reaches the second tier.
            let a = upstream_a.load(Ordering::SeqCst);
            let b = upstream_b.load(Ordering::SeqCst);
            if (*item as i64) > a.min(b) {
                violated.store(true, Ordering::SeqCst);
            }
            sink.lock().unwrap().push(*item);
        })
    };

    let engine = EngineBuilder::new(4, u64::default)
        .consumer_group(vec![consumer_a, consumer_b])
        .consumer_group(vec![tail_consumer])
        .reader_wait(YieldingWaitStrategy::new())
        .build()
        .unwrap();

    let (mut writer, consumers) = engine.into_parts();
    let producer = thread::spawn(move || {
        for i in 0..=10u64 {
            writer.write(|slot| *slot = i);
        }
        writer.close();
    });

    consumers.loop_read();
    producer.join().unwrap();

    let expected: Vec<u64> = (0..=10).collect();
    assert_eq!(*seen_a.lock().unwrap(), expected);
    assert_eq!(*seen_b.lock().unwrap(), expected);
    assert_eq!(*seen_tail.lock().unwrap(), expected);
    assert!(!ordering_violated.load(Ordering::SeqCst));
}

#[test]
fn test_batch_writes_wrap_and_arrive_in_order() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let engine = EngineBuilder::new(4, u64::default)
        .consumer_group(vec![Consumer::batch(move |head: &[u64], tail: &[u64]| {
            let mut seen = sink.lock().unwrap();
            seen.extend_from_slice(head);
            seen.extend_from_slice(tail);
        })])
        .reader_wait(YieldingWaitStrategy::new())
        .build()
        .unwrap();

    let (mut writer, consumers) = engine.into_parts();
    let wrapped = Arc::new(AtomicBool::new(false));
    let wrap_witness = Arc::clone(&wrapped);
    let producer = thread::spawn(move || {
        let mut next = 0u64;
        for _ in 0..3 {
            let witness = Arc::clone(&wrap_witness);
            writer.write_batch(3, |head, tail| {
                if !tail.is_empty() {
                    witness.store(true, Ordering::SeqCst);
                }
                for slot in head.iter_mut().chain(tail.iter_mut()) {
                    *slot = next;
                    next += 1;
                }
            });
        }
        writer.close();
    });

    consumers.loop_read();
    producer.join().unwrap();

    assert_eq!(*seen.lock().unwrap(), (0..9).collect::<Vec<u64>>());
    // Three batches of three in a four-slot ring must wrap at least once.
    assert!(wrapped.load(Ordering::SeqCst));
}

#[test]
fn test_batch_consumer_matches_single_consumer_observation() {
    // The same stream through a single-item consumer and a batch consumer in
    // the same group must produce identical observations.
    let seen_single = Arc::new(Mutex::new(Vec::new()));
    let seen_batch = Arc::new(Mutex::new(Vec::new()));

    let batch_sink = Arc::clone(&seen_batch);
    let engine = EngineBuilder::new(8, u64::default)
        .consumer_group(vec![
            recording_consumer(&seen_single),
            Consumer::batch(move |head: &[u64], tail: &[u64]| {
                let mut seen = batch_sink.lock().unwrap();
                seen.extend_from_slice(head);
                seen.extend_from_slice(tail);
            }),
        ])
        .reader_wait(YieldingWaitStrategy::new())
        .build()
        .unwrap();

    let (mut writer, consumers) = engine.into_parts();
    let producer = thread::spawn(move || {
        for i in 0..500u64 {
            match i % 3 {
                0 => writer.write(|slot| *slot = i),
                _ => {
                    // Alternate in a batch of two to cover both paths.
                    let base = i;
                    writer.write_batch(1, |head, _tail| head[0] = base);
                }
            }
        }
        writer.close();
    });

    consumers.loop_read();
    producer.join().unwrap();

    let expected: Vec<u64> = (0..500).collect();
    assert_eq!(*seen_single.lock().unwrap(), expected);
    assert_eq!(*seen_batch.lock().unwrap(), expected);
}

#[test]
fn test_dropping_writer_closes_pipeline() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let engine = EngineBuilder::new(8, u64::default)
        .consumer_group(vec![recording_consumer(&seen)])
        .reader_wait(YieldingWaitStrategy::new())
        .build()
        .unwrap();

    let (mut writer, consumers) = engine.into_parts();
    let producer = thread::spawn(move || {
        for i in 0..5u64 {
            writer.write(|slot| *slot = i);
        }
        // No explicit close; dropping the writer must still shut the
        // pipeline down after a full drain.
    });

    consumers.loop_read();
    producer.join().unwrap();
    assert_eq!(*seen.lock().unwrap(), (0..5).collect::<Vec<u64>>());
}

#[test]
fn test_consumer_panic_propagates_after_downstream_drains() {
    // The poisoned consumer sits in the first group; the second group must
    // still observe everything the first group processed before dying, and
    // loop_read must surface the panic.
    let tail_seen = Arc::new(Mutex::new(Vec::new()));
    let tail_sink = Arc::clone(&tail_seen);

    let engine = EngineBuilder::new(8, u64::default)
        .consumer_group(vec![Consumer::single(|item: &u64| {
            if *item == 3 {
                panic!("poisoned at three");
            }
        })])
        .consumer_group(vec![Consumer::single(move |item: &u64| {
            tail_sink.lock().unwrap().push(*item);
        })])
        .reader_wait(YieldingWaitStrategy::new())
        .build()
        .unwrap();

    let (mut writer, consumers) = engine.into_parts();
    let producer = thread::spawn(move || {
        for i in 0..3u64 {
            writer.write(|slot| *slot = i);
        }
        writer.write(|slot| *slot = 3);
        writer.close();
    });

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        consumers.loop_read();
    }));
    producer.join().unwrap();

    assert!(result.is_err(), "loop_read must re-raise the consumer panic");
    // The first group's cursor stopped at 3 (its last completed dispatch
    // never happened), so the tail saw at most items 0, 1, 2.
    let tail_seen = tail_seen.lock().unwrap();
    assert!(tail_seen.len() <= 3);
    for (index, &value) in tail_seen.iter().enumerate() {
        assert_eq!(value, index as u64);
    }
}
