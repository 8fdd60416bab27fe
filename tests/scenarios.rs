//! One `#[test]` per end-to-end scenario, covering the queue and the
//! input subsystem. Uses `std::sync::mpsc` for the start/finish
//! signalling each scenario needs, since the crate's own semaphore is
//! private to the crate.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use workqueue_core::{cancel, create, destroy, submit, wait, wait_all};

#[test]
fn scenario_1_basic_smoke_test() {
    let q = create(1);
    assert_ne!(q, 0);
    let u = submit(q, || 123);
    assert_eq!(wait(q, u), 123);
    destroy(q);
}

#[test]
fn scenario_2_cancel_head_middle_tail_while_one_unit_blocks() {
    let q = create(1);

    let (finish_tx, finish_rx) = mpsc::channel::<()>();
    let u1 = submit(q, move || {
        finish_rx.recv().unwrap();
        123
    });

    let ran2 = Arc::new(AtomicBool::new(false));
    let ran3 = Arc::new(AtomicBool::new(false));
    let ran4 = Arc::new(AtomicBool::new(false));

    let u2 = {
        let ran2 = ran2.clone();
        submit(q, move || {
            ran2.store(true, Ordering::SeqCst);
            456
        })
    };
    let u3 = {
        let ran3 = ran3.clone();
        submit(q, move || {
            ran3.store(true, Ordering::SeqCst);
            789
        })
    };
    let u4 = {
        let ran4 = ran4.clone();
        submit(q, move || {
            ran4.store(true, Ordering::SeqCst);
            555
        })
    };

    // Give the dispatcher time to assign u1 to the only worker, leaving
    // u2, u3, u4 pending in submission order.
    thread::sleep(Duration::from_millis(50));

    assert!(cancel(q, u3), "u3 is the middle of the pending list");
    assert!(cancel(q, u4), "u4 is the tail of the pending list");
    assert!(cancel(q, u2), "u2 is the head of the pending list");

    finish_tx.send(()).unwrap();

    assert_eq!(wait(q, u1), 123);
    assert_eq!(wait(q, u2), 0, "u2 was already reaped by cancel");
    wait_all(q);

    assert!(!ran2.load(Ordering::SeqCst));
    assert!(!ran3.load(Ordering::SeqCst));
    assert!(!ran4.load(Ordering::SeqCst));

    destroy(q);
}

#[test]
fn scenario_3_exactly_max_concurrency_units_run_at_once() {
    let q = create(2);

    let (start_tx, start_rx) = mpsc::channel::<usize>();
    let mut finish_txs = Vec::new();
    let mut units = Vec::new();
    for i in 0..3usize {
        let (finish_tx, finish_rx) = mpsc::channel::<()>();
        finish_txs.push(finish_tx);
        let start_tx = start_tx.clone();
        let u = submit(q, move || {
            start_tx.send(i).unwrap();
            finish_rx.recv().unwrap();
            0
        });
        units.push(u);
    }

    start_rx.recv_timeout(Duration::from_secs(2)).unwrap();
    start_rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert!(
        start_rx.try_recv().is_err(),
        "a third unit must not start while both worker slots are occupied"
    );

    // Unblock the second-submitted unit; the third must now be free to start.
    finish_txs[1].send(()).unwrap();
    let third = start_rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(third, 2);

    finish_txs[0].send(()).unwrap();
    finish_txs[2].send(()).unwrap();

    wait_all(q);
    destroy(q);
}

#[test]
fn scenario_4_stale_idle_signal_is_not_left_armed() {
    let q = create(1);

    let u0 = submit(q, || 0);
    assert_eq!(wait(q, u0), 0);
    wait_all(q);

    let u1 = submit(q, || 0);
    assert_eq!(wait(q, u1), 0);

    let counter = Arc::new(Mutex::new(0));
    let counter2 = counter.clone();
    submit(q, move || {
        for _ in 0..1_000 {
            thread::yield_now();
        }
        *counter2.lock().unwrap() += 1;
        0
    });

    wait_all(q);
    assert_eq!(
        *counter.lock().unwrap(),
        1,
        "wait_all must not return before the busy-yielding unit finished"
    );

    destroy(q);
}

#[test]
fn scenario_5_coalescing_enabled_collapses_to_the_last_position() {
    use workqueue_core::input::{InputConfig, InputEvent, InputSubsystem, MouseDetail, MouseRecord};

    let sys = InputSubsystem::init(InputConfig { coalesce: true, ..InputConfig::default() }).unwrap();
    for i in 0..100u64 {
        sys.receive_event(InputEvent::Mouse {
            detail: MouseDetail::Move,
            timestamp: i,
            record: MouseRecord { x: i as f32, y: 0.0, dx: 0.0, dy: 0.0, button: None },
        });
    }

    let mut seen = Vec::new();
    sys.update(Some(&mut |event: &InputEvent| seen.push(event.timestamp())));
    assert_eq!(seen, vec![99]);
}

#[test]
fn scenario_5_coalescing_disabled_delivers_every_event() {
    use workqueue_core::input::{InputConfig, InputEvent, InputSubsystem, MouseDetail, MouseRecord};

    let sys = InputSubsystem::init(InputConfig {
        coalesce: false,
        ring_capacity: 256,
        ..InputConfig::default()
    })
    .unwrap();
    for i in 0..100u64 {
        sys.receive_event(InputEvent::Mouse {
            detail: MouseDetail::Move,
            timestamp: i,
            record: MouseRecord { x: i as f32, y: 0.0, dx: 0.0, dy: 0.0, button: None },
        });
    }

    let mut seen = Vec::new();
    sys.update(Some(&mut |event: &InputEvent| seen.push(event.timestamp())));
    assert_eq!(seen.len(), 100);
}

#[test]
fn scenario_6_eight_producers_eighty_thousand_units_no_leak() {
    let q = create(4);

    let producers: Vec<_> = (0..8)
        .map(|_| {
            thread::spawn(move || {
                for _ in 0..10_000 {
                    let u = submit(q, || 0);
                    assert_eq!(wait(q, u), 0);
                }
            })
        })
        .collect();

    for p in producers {
        p.join().unwrap();
    }

    wait_all(q);
    destroy(q);
}
