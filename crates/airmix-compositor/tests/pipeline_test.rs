mod common;

use std::time::{Duration, Instant};

use airmix_compositor::{Compositor, CompositorConfig, PIPELINE_DELAY};
use airmix_core::{AirmixError, Color, FormatDesc, Frame, SystemFrame};
use common::*;

#[test]
fn test_set_appears_after_pipeline_delay() {
    let compositor = software();
    let sets = [
        (Color::RED, vec![10i16, 20]),
        (Color::GREEN, vec![30]),
        (Color::BLUE, vec![]),
        (Color::WHITE, vec![]),
        (Color::BLACK, vec![]),
    ];
    for (color, audio) in &sets {
        compositor.push(vec![solid(*color, audio)]).unwrap();
    }
    compositor.flush().unwrap();

    let outputs = drain(&compositor);
    assert_eq!(outputs.len(), sets.len());
    for out in &outputs[..PIPELINE_DELAY] {
        assert!(is_transparent(out));
        assert!(out.audio.is_empty());
    }
    assert_eq!(outputs[3].image.get_pixel(0, 0), Some(Color::RED.to_rgba8()));
    assert_eq!(outputs[3].audio.samples(), &[10, 20]);
    assert_eq!(outputs[4].image.get_pixel(W - 1, H - 1), Some(Color::GREEN.to_rgba8()));
    assert_eq!(outputs[4].audio.samples(), &[30]);
}

#[test]
fn test_output_for_a_set_needs_a_later_push() {
    let compositor = software();
    compositor.push(vec![solid(Color::RED, &[])]).unwrap();
    compositor.flush().unwrap();

    // One output per push, and it cannot show the set just pushed.
    let first = drain(&compositor);
    assert_eq!(first.len(), 1);
    assert!(is_transparent(&first[0]));

    for _ in 0..PIPELINE_DELAY - 1 {
        compositor.push(vec![solid(Color::BLUE, &[])]).unwrap();
    }
    compositor.flush().unwrap();
    assert!(drain(&compositor).iter().all(|f| is_transparent(f)));

    compositor.push(vec![solid(Color::BLUE, &[])]).unwrap();
    compositor.flush().unwrap();
    let shown = drain(&compositor);
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].image.get_pixel(5, 5), Some(Color::RED.to_rgba8()));
}

#[test]
fn test_layers_blend_in_push_order() {
    let compositor = software();
    let mut overlay = SystemFrame::solid(W, H, Color::TRANSPARENT);
    overlay.image.fill_rect(0, 0, W / 2, H, Color::BLUE.with_alpha(128));

    for _ in 0..=PIPELINE_DELAY {
        compositor
            .push(vec![solid(Color::RED, &[]), overlay.clone().into()])
            .unwrap();
    }
    compositor.flush().unwrap();
    let last = drain(&compositor).pop().unwrap();

    assert_eq!(last.image.get_pixel(W - 1, 0), Some(Color::RED.to_rgba8()));
    let [r, g, b, a] = last.image.get_pixel(0, 0).unwrap();
    assert_eq!((g, a), (0, 255));
    assert!((126..=128).contains(&r), "red {}", r);
    assert!((127..=129).contains(&b), "blue {}", b);
}

#[test]
fn test_smaller_layer_is_scaled_to_output() {
    let compositor = software();
    let small = SystemFrame::solid(W / 4, H / 4, Color::GREEN);
    for _ in 0..=PIPELINE_DELAY {
        compositor.push(vec![small.clone().into()]).unwrap();
    }
    compositor.flush().unwrap();
    let last = drain(&compositor).pop().unwrap();
    assert_eq!(last.width(), W);
    assert_eq!(last.image.get_pixel(W - 1, H - 1), Some(Color::GREEN.to_rgba8()));
}

#[test]
fn test_empty_tick_bypasses_queued_work() {
    let (compositor, gate) = gated(GatedCall::CreateTexture);

    // The first tick stalls allocating its frame, before any output.
    compositor.push(vec![solid(Color::RED, &[])]).unwrap();
    assert!(gate.wait_entered());
    compositor.push(vec![solid(Color::GREEN, &[])]).unwrap();
    assert!(compositor.try_pop().is_none());

    compositor.push(Vec::new()).unwrap();
    let empty = compositor.try_pop().expect("empty tick is immediate");
    assert_eq!((empty.width(), empty.height()), (W, H));
    assert!(is_transparent(&empty));
    assert!(empty.audio.is_empty());
    assert!(compositor.try_pop().is_none());

    drop(gate);
    compositor.flush().unwrap();
    assert_eq!(drain(&compositor).len(), 2);

    let stats = compositor.stats();
    assert_eq!(stats.empty_ticks, 1);
    assert_eq!(stats.ticks_composited, 2);
}

#[test]
fn test_try_pop_on_empty_channel_does_not_block() {
    let compositor = software();
    let started = Instant::now();
    for _ in 0..100 {
        assert!(compositor.try_pop().is_none());
    }
    assert!(started.elapsed() < Duration::from_millis(100));
}

#[test]
fn test_own_frames_are_used_without_copy() {
    let compositor = software();
    let other = software();

    let mut own = compositor.create_frame(W, H).unwrap();
    own.pixels_mut().fill(200);
    let foreign = other.create_frame(W, H).unwrap();
    assert_eq!(own.tag(), Some(compositor.tag()));
    assert_ne!(foreign.tag(), own.tag());

    compositor
        .push(vec![own.into(), foreign.into(), solid(Color::RED, &[])])
        .unwrap();
    compositor.flush().unwrap();

    let stats = compositor.stats();
    assert_eq!(stats.zero_copy_inputs, 1);
    assert_eq!(stats.copied_inputs, 2);
}

#[test]
fn test_bounded_output_drops_oldest() {
    init_tracing();
    let config = CompositorConfig::default().with_output_capacity(2);
    let compositor = Compositor::with_config(format(), config).unwrap();
    for _ in 0..5 {
        compositor.push(vec![solid(Color::RED, &[])]).unwrap();
    }
    compositor.flush().unwrap();

    let kept = drain(&compositor);
    assert_eq!(kept.len(), 2);
    // The survivors are the two newest: the 4th output shows the first set.
    assert_eq!(kept[0].image.get_pixel(0, 0), Some(Color::RED.to_rgba8()));

    let stats = compositor.stats();
    assert_eq!(stats.outputs_produced, 5);
    assert_eq!(stats.outputs_dropped, 3);
}

#[test]
fn test_device_init_failure_is_reported() {
    init_tracing();
    let result = Compositor::with_device(format(), CompositorConfig::default(), || {
        Err(AirmixError::device("no adapter"))
    });
    match result {
        Err(AirmixError::Device(message)) => assert!(message.contains("no adapter")),
        other => panic!("expected a device error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_zero_sized_format_is_rejected() {
    let result = Compositor::new(FormatDesc::custom(0, 720, 25));
    assert!(matches!(result, Err(AirmixError::InvalidArgument(_))));
}
