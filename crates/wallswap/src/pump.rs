//! Two-thread exercise of the swapchain with real descriptors.
//!
//! The producer backs every frame with an anonymous temp file sized like an
//! RGBA8 image and commits it; the consumer polls at its own rate and takes
//! the descriptor out of each frame it receives, standing in for the GPU
//! import.

use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use crossbeam_channel::{bounded, select, tick, Receiver, TryRecvError};
use exswap::{ExHandle, SwapchainStats, TripleSwapchain};

#[derive(Debug, Clone, PartialEq)]
pub struct PumpSettings {
    pub width: u32,
    pub height: u32,
    /// Producer rate; 0 runs uncapped.
    pub fps: f32,
    /// Consumer poll rate; 0 runs uncapped.
    pub consumer_fps: f32,
    pub frames: Option<u64>,
    pub duration: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct PumpReport {
    pub stats: SwapchainStats,
    pub produced: u64,
    /// Frames whose descriptor reached the consumer.
    pub imported: u64,
    pub newest: Option<i32>,
    pub elapsed: Duration,
}

#[derive(Debug, Default)]
struct ConsumerTally {
    imported: u64,
    newest: Option<i32>,
}

pub fn run(settings: &PumpSettings) -> Result<PumpReport> {
    if settings.frames.is_none() && settings.duration.is_none() {
        bail!("pump needs a frame count or a duration");
    }
    let chain = TripleSwapchain::new();
    // Dropping a sender is the stop signal.
    let (stop_tx, stop_rx) = bounded::<()>(0);
    let (done_tx, done_rx) = bounded::<()>(0);
    let started = Instant::now();

    tracing::info!(
        width = settings.width,
        height = settings.height,
        fps = settings.fps,
        consumer_fps = settings.consumer_fps,
        "pumping frames"
    );

    let (produced, tally) = thread::scope(|scope| -> Result<(u64, ConsumerTally)> {
        let chain = &chain;
        let producer = thread::Builder::new()
            .name("wallswap-producer".into())
            .spawn_scoped(scope, move || {
                let produced = produce(chain, settings, &stop_rx);
                drop(done_tx);
                produced
            })
            .context("failed to spawn producer thread")?;
        let consumer_done = done_rx.clone();
        let consumer = thread::Builder::new()
            .name("wallswap-consumer".into())
            .spawn_scoped(scope, move || consume(chain, settings.consumer_fps, &consumer_done))
            .context("failed to spawn consumer thread")?;

        // The producer hangs up `done` when it runs out of frames; otherwise
        // the deadline ends the run.
        match settings.duration {
            Some(duration) => {
                let _ = done_rx.recv_timeout(duration);
            }
            None => {
                let _ = done_rx.recv();
            }
        }
        drop(stop_tx);

        let produced = producer
            .join()
            .map_err(|err| anyhow!("producer thread panicked: {err:?}"))??;
        let tally = consumer
            .join()
            .map_err(|err| anyhow!("consumer thread panicked: {err:?}"))??;
        Ok((produced, tally))
    })?;

    Ok(PumpReport {
        stats: chain.stats(),
        produced,
        imported: tally.imported,
        newest: tally.newest,
        elapsed: started.elapsed(),
    })
}

/// Time between frames at `fps`; `None` runs uncapped. Rejects rates whose
/// interval does not fit in a [`Duration`].
pub fn frame_interval(fps: f32) -> Result<Option<Duration>, String> {
    if !fps.is_finite() || fps < 0.0 {
        return Err(format!("rate must be a non-negative number, got {fps}"));
    }
    if fps == 0.0 {
        return Ok(None);
    }
    Duration::try_from_secs_f64(1.0 / f64::from(fps))
        .map(Some)
        .map_err(|err| format!("rate {fps} is too slow: {err}"))
}

fn pacer(fps: f32) -> Result<Option<Receiver<Instant>>> {
    let interval = frame_interval(fps).map_err(|err| anyhow!(err))?;
    Ok(interval.map(tick))
}

/// Waits for the next frame slot. Returns false once `stop` hangs up.
fn next_frame(pacer: Option<&Receiver<Instant>>, stop: &Receiver<()>) -> bool {
    match pacer {
        Some(ticks) => select! {
            recv(stop) -> _ => false,
            recv(ticks) -> _ => true,
        },
        None => !matches!(stop.try_recv(), Err(TryRecvError::Disconnected)),
    }
}

fn produce(chain: &TripleSwapchain, settings: &PumpSettings, stop: &Receiver<()>) -> Result<u64> {
    let size = ExHandle::packed_size(settings.width, settings.height);
    let pacer = pacer(settings.fps)?;
    let mut produced = 0u64;

    while settings.frames.map_or(true, |limit| produced < limit) {
        if !next_frame(pacer.as_ref(), stop) {
            break;
        }
        let id = i32::try_from(produced + 1).context("frame id overflow")?;
        let slot = chain.acquire_write();
        let backing = match tempfile::tempfile().and_then(|file| {
            file.set_len(size)?;
            Ok(file)
        }) {
            Ok(file) => file,
            Err(err) => {
                chain.abandon_write(slot);
                return Err(err).context("failed to allocate frame memory");
            }
        };
        chain.commit_write(
            slot,
            ExHandle::new(id, backing.into(), settings.width, settings.height, size),
        );
        produced += 1;
    }
    tracing::debug!(produced, "producer finished");
    Ok(produced)
}

fn consume(chain: &TripleSwapchain, fps: f32, done: &Receiver<()>) -> Result<ConsumerTally> {
    let pacer = pacer(fps)?;
    let mut tally = ConsumerTally::default();
    while next_frame(pacer.as_ref(), done) {
        consume_one(chain, &mut tally)?;
    }
    // The producer is finished; pick up whatever it committed last.
    consume_one(chain, &mut tally)?;
    tracing::debug!(imported = tally.imported, "consumer finished");
    Ok(tally)
}

fn consume_one(chain: &TripleSwapchain, tally: &mut ConsumerTally) -> Result<()> {
    let Some(mut slot) = chain.acquire_read() else {
        return Ok(());
    };
    let id = slot.handle().id();
    let ordered = tally.newest.map_or(true, |newest| id > newest);
    if slot.handle_mut().take_descriptor().is_some() {
        tally.imported += 1;
    }
    chain.release_read(slot);
    if !ordered {
        bail!(
            "consumer saw frame {id} after frame {}",
            tally.newest.unwrap_or_default()
        );
    }
    tally.newest = Some(id);
    Ok(())
}

pub fn print_report(report: &PumpReport) {
    println!("frames produced:   {}", report.produced);
    println!("frames committed:  {}", report.stats.committed);
    println!("frames superseded: {}", report.stats.superseded);
    println!("frames consumed:   {}", report.stats.consumed);
    println!("frames imported:   {}", report.imported);
    match report.newest {
        Some(id) => println!("newest frame seen: {id}"),
        None => println!("newest frame seen: (none)"),
    }
    println!(
        "elapsed:           {}",
        humantime::format_duration(Duration::from_millis(report.elapsed.as_millis() as u64))
    );
}
