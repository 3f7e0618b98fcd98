//! Frame replay and tracking loop
//!
//! A producer task reads frames at the configured rate into a single-slot
//! `watch` channel; a frame not yet taken by the consumer is overwritten.
//! The consumer hands the tracker to a blocking worker for each frame, so at
//! most one frame is in flight.

use std::sync::Arc;
use std::time::Duration;

use frame_io::{FrameSink, FrameSource, ImageDirSink, ImageSequenceSource, VideoFrame};
use lane_tracker::{LaneError, TrackingController, TrackingState, TrackingStats};
use metrics::counter;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::fits::{FitLog, FitRecord};
use crate::metric_names::*;
use crate::{NodeConfig, NodeError, FITS_FILE};

type FrameSlot = Option<Arc<VideoFrame>>;

/// Totals for a completed run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Frames decoded by the producer
    pub frames_read: u64,
    /// Frames overwritten before the tracker could take them
    pub frames_dropped: u64,
    /// Output pairs published
    pub published: u64,
    /// Tracker counters at the end of the run
    pub stats: TrackingStats,
}

/// Run the node against the configured input and output directories
pub async fn run(config: NodeConfig) -> Result<RunSummary, NodeError> {
    let controller = TrackingController::new(config.lane.clone())?;

    let interval = Duration::from_millis(config.frame_interval_ms.max(1));
    let source = ImageSequenceSource::open(&config.input_dir)?.with_frame_interval(interval);
    let sink = ImageDirSink::create(&config.output_dir)?;
    let fits = if config.write_fits {
        Some(FitLog::create(config.output_dir.join(FITS_FILE))?)
    } else {
        None
    };

    info!(
        "Replaying {} frames from {} into {}",
        source.len(),
        config.input_dir.display(),
        config.output_dir.display()
    );

    run_pipeline(controller, source, sink, fits, interval).await
}

/// Drive `source` through the tracker into `sink`
pub async fn run_pipeline<S, K>(
    controller: TrackingController,
    source: S,
    sink: K,
    fits: Option<FitLog>,
    interval: Duration,
) -> Result<RunSummary, NodeError>
where
    S: FrameSource + Send + 'static,
    K: FrameSink + Send + 'static,
{
    let (tx, mut rx) = watch::channel::<FrameSlot>(None);
    let producer = tokio::spawn(produce(source, tx, interval));

    let mut worker = Worker {
        controller,
        sink,
        fits,
        published: 0,
    };
    let mut last_sequence: Option<u32> = None;
    let mut frames_dropped = 0u64;

    while rx.changed().await.is_ok() {
        let Some(frame) = rx.borrow_and_update().clone() else {
            continue;
        };

        let dropped = dropped_between(last_sequence, frame.sequence);
        if dropped > 0 {
            debug!("Dropped {} frames before {}", dropped, frame.sequence);
            counter!(FRAMES_DROPPED).increment(dropped as u64);
            frames_dropped += dropped as u64;
        }
        last_sequence = Some(frame.sequence);

        let (returned, outcome) = tokio::task::spawn_blocking(move || {
            let outcome = worker.handle(&frame);
            (worker, outcome)
        })
        .await?;
        worker = returned;
        outcome?;
    }

    let frames_read = producer.await?;
    let stats = worker.controller.stats();

    info!(
        "Run complete: {} read, {} dropped, {} processed, {} detections, {} rejected, {} track losses",
        frames_read,
        frames_dropped,
        stats.frames_processed,
        stats.detections,
        stats.frames_rejected,
        stats.track_losses
    );

    Ok(RunSummary {
        frames_read,
        frames_dropped,
        published: worker.published,
        stats,
    })
}

/// Frames skipped between the last processed sequence and `sequence`
fn dropped_between(last: Option<u32>, sequence: u32) -> u32 {
    let expected = last.map_or(0, |l| l.wrapping_add(1));
    sequence.saturating_sub(expected)
}

async fn produce<S: FrameSource>(
    mut source: S,
    tx: watch::Sender<FrameSlot>,
    interval: Duration,
) -> u64 {
    let mut ticker = tokio::time::interval(interval);
    let mut read = 0u64;

    loop {
        ticker.tick().await;
        if tx.is_closed() {
            break;
        }
        match source.next_frame() {
            Ok(Some(frame)) => {
                read += 1;
                counter!(FRAMES_TOTAL).increment(1);
                tx.send_replace(Some(Arc::new(frame)));
            }
            Ok(None) => break,
            Err(e) => warn!("Skipping unreadable frame: {}", e),
        }
    }
    read
}

/// Tracker plus outputs, moved onto the blocking pool for each frame
struct Worker<K> {
    controller: TrackingController,
    sink: K,
    fits: Option<FitLog>,
    published: u64,
}

impl<K: FrameSink> Worker<K> {
    fn handle(&mut self, frame: &VideoFrame) -> Result<(), NodeError> {
        let losses_before = self.controller.stats().track_losses;

        let output = match self.controller.process(frame) {
            Ok(output) => output,
            Err(e @ LaneError::MalformedInput(_)) => {
                warn!("Rejected frame {}: {}", frame.sequence, e);
                counter!(FRAMES_REJECTED).increment(1);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let losses = self.controller.stats().track_losses - losses_before;
        if losses > 0 {
            counter!(TRACK_LOST).increment(losses);
        }

        let Some(output) = output else {
            return Ok(());
        };
        counter!(DETECTIONS).increment(1);

        self.sink
            .publish(output.sequence, &output.annotated, &output.birdseye)?;
        self.published += 1;

        if let Some(fits) = self.fits.as_mut() {
            fits.append(&FitRecord::from(&output))?;
        }

        if output.state == TrackingState::Tracking {
            debug!("Frame {} tracked ({:?})", output.sequence, output.mode);
        }
        Ok(())
    }
}
