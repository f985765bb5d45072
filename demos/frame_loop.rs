//! Drive a software composite producer with simulated drawing work and log
//! the swap-wait statistics.
//!
//! ```text
//! cargo run --example frame_loop -- [--pal] [--copy] [--work-ms N] [--report-every N]
//! ```
//!
//! Set `RUST_LOG=debug` to also see overflow-driven session boundaries.

use composite_framesync::{
    FrameSync, FrameSyncOptions, ProducerOptions, SoftwareProducer, SystemCycleCounter,
    VideoProducer, VideoStandard,
};

use std::{
    env,
    process,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut standard = VideoStandard::Ntsc;
    let mut copy_after_swap = false;
    let mut work_ms = 8u64;
    let mut report_every = 300u32;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--pal" => standard = VideoStandard::Pal,
            "--copy" => copy_after_swap = true,
            "--work-ms" if i + 1 < args.len() => {
                work_ms = args[i + 1].parse()?;
                i += 1;
            }
            "--report-every" if i + 1 < args.len() => {
                report_every = args[i + 1].parse()?;
                i += 1;
            }
            other => eprintln!("Ignoring unknown argument: {other}"),
        }
        i += 1;
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    let producer = SoftwareProducer::new(ProducerOptions::builder(standard).build()?);
    let options = FrameSyncOptions::builder()
        .copy_after_swap(copy_after_swap)
        .build();
    let mut sync = FrameSync::with_options(producer, SystemCycleCounter::default(), options);

    // A producer that cannot allocate its frame buffers is fatal.
    if let Err(e) = sync.begin(true) {
        eprintln!("Cannot start video producer: {e}");
        process::exit(1);
    }

    println!(
        "Running {standard:?} at {:?} per frame with {work_ms}ms of work per frame",
        sync.producer().options().frame_period
    );
    println!("Press Ctrl+C to exit\n");

    let lines = sync.producer().layout().lines();
    let mut frame = 0u32;
    while running.load(Ordering::SeqCst) {
        // Stand-in for drawing: one scan line per frame, plus busy time.
        let y = frame as usize % lines;
        if let Some(line) = sync.producer_mut().line_mut(y) {
            line.fill(frame as u8);
        }
        thread::sleep(Duration::from_millis(work_ms));

        sync.wait_for_frame();
        frame = frame.wrapping_add(1);

        if report_every > 0 && frame % report_every == 0 {
            let fraction = sync.performance_number();
            println!("frame {frame}: {}.{:02}% waiting", fraction / 100, fraction % 100);
        }
    }

    let fraction = sync.performance_number();
    println!("\nFinal session: {}.{:02}% waiting", fraction / 100, fraction % 100);
    Ok(())
}
