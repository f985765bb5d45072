use composite_framesync::{
    FrameSync, FrameSyncOptions, ProducerOptions, SoftwareProducer, SystemCycleCounter,
    VideoProducer, VideoStandard,
};
use std::time::Duration;

fn fast_sync(copy_after_swap: bool) -> FrameSync<SoftwareProducer, SystemCycleCounter> {
    let options = ProducerOptions::builder(VideoStandard::Ntsc)
        .frame_period(Duration::from_millis(1))
        .build()
        .unwrap();
    let sync_options = FrameSyncOptions::builder()
        .copy_after_swap(copy_after_swap)
        .build();
    FrameSync::with_options(
        SoftwareProducer::new(options),
        SystemCycleCounter::default(),
        sync_options,
    )
}

fn paint_every_line(producer: &mut SoftwareProducer) {
    let lines = producer.layout().lines();
    for y in 0..lines {
        let line = producer.line_mut(y).unwrap();
        for (x, px) in line.iter_mut().enumerate() {
            *px = (x ^ y) as u8;
        }
    }
}

#[test]
fn test_copy_after_swap_preserves_every_chunk() {
    let mut sync = fast_sync(true);
    sync.begin(true).unwrap();

    paint_every_line(sync.producer_mut());
    let before = sync.producer().frame_buffer_lines().first_row();

    sync.wait_for_frame();

    let producer = sync.producer();
    assert_ne!(
        producer.frame_buffer_lines().first_row(),
        before,
        "double buffering must swap buffers"
    );

    let layout = producer.layout();
    for y in 0..layout.lines() {
        let drawing = producer.line(y).unwrap();
        let shown = producer.front_line(y).unwrap();
        assert_eq!(drawing, shown, "line {y} differs after copy");
        assert!(drawing
            .iter()
            .enumerate()
            .all(|(x, &px)| px == (x ^ y) as u8));
    }
}

#[test]
fn test_without_copy_new_buffer_is_stale() {
    let mut sync = fast_sync(false);
    sync.begin(true).unwrap();

    paint_every_line(sync.producer_mut());
    sync.wait_for_frame();

    let producer = sync.producer();
    assert!(producer.line(17).unwrap().iter().all(|&px| px == 0));
    assert_eq!(producer.front_line(17).unwrap()[3], (3 ^ 17) as u8);
}

#[test]
fn test_incremental_drawing_accumulates() {
    let mut sync = fast_sync(true);
    sync.begin(true).unwrap();

    for y in 0..8 {
        sync.producer_mut().line_mut(y * 30).unwrap().fill(0xFF);
        sync.wait_for_frame();
    }

    let producer = sync.producer();
    for y in 0..8 {
        assert!(producer.line(y * 30).unwrap().iter().all(|&px| px == 0xFF));
        assert!(producer.front_line(y * 30).unwrap().iter().all(|&px| px == 0xFF));
    }
    assert!(producer.line(1).unwrap().iter().all(|&px| px == 0));
}

#[test]
fn test_single_buffer_copy_is_noop() {
    let mut sync = fast_sync(true);
    sync.begin(false).unwrap();

    sync.producer_mut().line_mut(0).unwrap().fill(0x42);
    sync.wait_for_frame();

    assert!(sync.producer().line(0).unwrap().iter().all(|&px| px == 0x42));
}

#[test]
fn test_drawn_line_read_back_after_copy() {
    let mut sync = fast_sync(true);
    sync.begin(true).unwrap();

    sync.producer_mut().line_mut(5).unwrap().fill(0xAB);
    let drawn = sync.producer().line(5).unwrap().to_vec();

    sync.wait_for_frame();

    assert!(drawn.iter().all(|&px| px == 0xAB));
    let producer = sync.producer();
    assert_eq!(producer.line(5).unwrap(), drawn.as_slice());
    assert_eq!(producer.front_line(5).unwrap(), drawn.as_slice());
    assert!(producer.line(6).unwrap().iter().all(|&px| px == 0));
}
