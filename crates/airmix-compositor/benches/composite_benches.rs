use criterion::{criterion_group, criterion_main, BatchSize, Criterion};

use airmix_compositor::{Compositor, InputFrame};
use airmix_core::{AudioBuffer, Color, FormatDesc, FrameBuffer, SystemFrame, VideoFormat};

fn host_layers(desc: &FormatDesc) -> Vec<InputFrame> {
    let mut lower_third = FrameBuffer::new(desc.width, desc.height);
    lower_third.fill_rect(
        0,
        (desc.height * 3 / 4) as i32,
        desc.width,
        desc.height / 6,
        Color::rgba(20, 20, 120, 200),
    );
    let mut bug = FrameBuffer::new(desc.width, desc.height);
    bug.fill_rect(desc.width as i32 - 200, 40, 160, 90, Color::WHITE.with_alpha(180));

    vec![
        SystemFrame::from_parts(
            FrameBuffer::solid(desc.width, desc.height, Color::BLACK),
            AudioBuffer::from_samples(vec![0; desc.audio_samples_per_frame()]),
        )
        .into(),
        SystemFrame::from_parts(lower_third, AudioBuffer::new()).into(),
        SystemFrame::from_parts(bug, AudioBuffer::new()).into(),
    ]
}

fn bench_composite_720p(c: &mut Criterion) {
    let desc = FormatDesc::preset(VideoFormat::X720p5000).expect("720p50 preset");
    let compositor = Compositor::new(desc.clone()).expect("software compositor");

    c.bench_function("composite_720p_3_host_layers", |b| {
        b.iter_batched(
            || host_layers(&desc),
            |layers| {
                compositor.push(layers).unwrap();
                compositor.flush().unwrap();
                while compositor.try_pop().is_some() {}
            },
            BatchSize::SmallInput,
        )
    });

    c.bench_function("composite_720p_pooled_layer", |b| {
        b.iter(|| {
            let mut frame = compositor.create_frame(desc.width, desc.height).unwrap();
            frame.pixels_mut().fill(0x80);
            compositor.push(vec![frame.into()]).unwrap();
            compositor.flush().unwrap();
            while compositor.try_pop().is_some() {}
        })
    });
}

fn bench_empty_tick(c: &mut Criterion) {
    let compositor = Compositor::new(FormatDesc::custom(1920, 1080, 25)).expect("software compositor");
    c.bench_function("empty_tick_1080p", |b| {
        b.iter(|| {
            compositor.push(Vec::new()).unwrap();
            compositor.try_pop()
        })
    });
}

criterion_group!(benches, bench_composite_720p, bench_empty_tick);
criterion_main!(benches);
