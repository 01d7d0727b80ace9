mod common;

use std::collections::HashSet;
use std::thread;
use std::time::{Duration, Instant};

use airmix_core::{AirmixError, Color, Frame};
use common::*;

#[test]
fn test_pool_does_not_grow_past_peak_usage() {
    let compositor = software();

    for _ in 0..1000 {
        let frame = compositor.create_frame(32, 32).unwrap();
        drop(frame);
    }
    compositor.flush().unwrap();
    assert_eq!(compositor.pool_resident(32, 32), 1);
    assert_eq!(compositor.pool_available(32, 32), 1);

    for _ in 0..300 {
        let held: Vec<_> = (0..3).map(|_| compositor.create_frame(16, 8).unwrap()).collect();
        drop(held);
    }
    compositor.flush().unwrap();
    assert_eq!(compositor.pool_resident(16, 8), 3);
    assert_eq!(compositor.stats().frames_allocated, 4);
}

#[test]
fn test_concurrent_create_frame() {
    const THREADS: usize = 8;
    let compositor = software();

    let frames: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|i| {
                let compositor = &compositor;
                s.spawn(move || {
                    let mut frame = compositor.create_frame(40, 20).unwrap();
                    assert_eq!((frame.width(), frame.height()), (40, 20));
                    assert_eq!(frame.pixels().len(), 40 * 20 * 4);
                    frame.pixels_mut().fill(i as u8);
                    thread::sleep(Duration::from_millis(5));
                    assert!(frame.pixels().iter().all(|&b| b == i as u8));
                    frame
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let textures: HashSet<_> = frames.iter().map(|f| f.texture()).collect();
    assert_eq!(textures.len(), THREADS);

    drop(frames);
    compositor.flush().unwrap();
    assert_eq!(compositor.pool_available(40, 20), THREADS);
    assert_eq!(compositor.pool_resident(40, 20), THREADS);
}

#[test]
fn test_full_task_queue_blocks_push() {
    let (compositor, gate) = gated(GatedCall::Clear);

    // The first tick parks the worker inside the device.
    compositor.push(vec![solid(Color::RED, &[])]).unwrap();
    assert!(gate.wait_entered());

    // Six more fill the queue without blocking.
    for _ in 0..6 {
        compositor.push(vec![solid(Color::GREEN, &[])]).unwrap();
    }
    assert_eq!(compositor.pending_tasks(), 6);

    thread::scope(|s| {
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        let compositor = &compositor;
        s.spawn(move || {
            compositor.push(vec![solid(Color::BLUE, &[])]).unwrap();
            let _ = done_tx.send(());
        });

        assert!(
            done_rx.recv_timeout(Duration::from_millis(200)).is_err(),
            "seventh push should wait for the worker"
        );

        // One tick completes, one queue slot frees up.
        gate.open(1);
        assert!(done_rx.recv_timeout(PATIENCE).is_ok());
    });

    drop(gate);
    compositor.flush().unwrap();
    assert_eq!(drain(&compositor).len(), 8);
}

#[test]
fn test_shutdown_is_clean() {
    let compositor = software();
    let held = compositor.create_frame(W, H).unwrap();
    for _ in 0..4 {
        compositor.push(vec![solid(Color::RED, &[1, 2])]).unwrap();
    }

    let started = Instant::now();
    compositor.shutdown().unwrap();
    assert!(started.elapsed() < PATIENCE);

    // Everything queued before shutdown still ran.
    assert_eq!(drain(&compositor).len(), 4);
    assert!(compositor.try_pop().is_none());

    assert!(matches!(
        compositor.push(vec![solid(Color::RED, &[])]),
        Err(AirmixError::ShutDown)
    ));
    assert!(matches!(compositor.push(Vec::new()), Err(AirmixError::ShutDown)));
    assert!(matches!(compositor.create_frame(W, H), Err(AirmixError::ShutDown)));
    assert!(compositor.try_pop().is_none());

    // A frame outliving its compositor's worker is simply dropped.
    drop(held);
    compositor.shutdown().unwrap();
}

#[test]
fn test_dead_worker_fails_push() {
    let compositor = broken();

    // The first draw happens on the third composite and fails.
    let deadline = Instant::now() + PATIENCE;
    let error = loop {
        match compositor.push(vec![solid(Color::RED, &[])]) {
            Ok(()) => {
                assert!(Instant::now() < deadline, "worker never stopped");
                thread::sleep(Duration::from_millis(5));
            }
            Err(e) => break e,
        }
    };
    assert!(matches!(error, AirmixError::WorkerStopped));
    assert!(matches!(compositor.flush(), Err(AirmixError::WorkerStopped)));
    assert!(matches!(compositor.shutdown(), Err(AirmixError::Device(_))));
}
