use composite_framesync::{
    CloseReason, CycleCounter, FrameSync, ProducerOptions, SoftwareProducer, SystemCycleCounter,
    VideoStandard, FULL_SCALE,
};
use std::{cell::Cell, thread, time::Duration};

fn producer(period: Duration) -> SoftwareProducer {
    let options = ProducerOptions::builder(VideoStandard::Pal)
        .frame_period(period)
        .build()
        .unwrap();
    SoftwareProducer::new(options)
}

#[test]
fn test_idle_loop_mostly_waits() {
    // 1 MHz keeps 20 frames of 2ms well inside one counter period.
    let mut sync = FrameSync::new(
        producer(Duration::from_millis(2)),
        SystemCycleCounter::new(1_000_000),
    );
    sync.begin(true).unwrap();

    for _ in 0..20 {
        sync.wait_for_frame();
    }
    let fraction = sync.performance_number();
    let report = *sync.last_report().unwrap();

    assert!(fraction <= FULL_SCALE);
    assert!(fraction > 5000, "idle loop waited only {fraction} bp");
    assert_eq!(report.swaps, 20);
    assert!(report.frames >= report.swaps);
    assert!(!sync.session().is_open());
}

#[test]
fn test_busy_loop_waits_less_than_idle_loop() {
    let mut sync = FrameSync::new(
        producer(Duration::from_millis(5)),
        SystemCycleCounter::new(1_000_000),
    );
    sync.begin(true).unwrap();

    for _ in 0..10 {
        sync.wait_for_frame();
    }
    let idle = sync.start_new_session();

    for _ in 0..10 {
        thread::sleep(Duration::from_millis(4));
        sync.wait_for_frame();
    }
    let busy = sync.start_new_session();

    assert!(busy < idle, "busy {busy} bp vs idle {idle} bp");
}

#[test]
fn test_wrap_between_waits_with_real_producer() {
    let samples = [4_294_967_280u32, 4_294_967_290, 5, 15];
    let next = Cell::new(0usize);
    let counter = || {
        let i = next.get();
        next.set(i + 1);
        samples[i]
    };
    assert_eq!(counter.cycles(), samples[0]);
    next.set(0);

    let mut sync = FrameSync::new(producer(Duration::from_millis(1)), counter);
    sync.begin(true).unwrap();

    sync.wait_for_frame();
    sync.wait_for_frame();

    let report = sync.last_report().unwrap();
    assert_eq!(report.reason, CloseReason::CounterWrapped);
    assert_eq!(report.elapsed, 10);
    assert_eq!(sync.session().start_time(), 5);
    assert_eq!(sync.session().wait_tally(), 10);
}
