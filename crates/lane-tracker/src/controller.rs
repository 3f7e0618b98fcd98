//! Per-frame lane tracking state machine

use frame_io::VideoFrame;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::annotate::{birdseye_view, lane_overlay};
use crate::binarize::Binarizer;
use crate::config::LaneConfig;
use crate::fit::{LaneSide, Polynomial};
use crate::mask::BinaryMask;
use crate::rectify::Rectifier;
use crate::search::{CurveSearch, LanePair, SearchMode};
use crate::track::LaneTrack;
use crate::LaneError;

/// Tracking mode shared by both lane boundaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TrackingState {
    /// No usable prior: blind sliding-window search
    #[default]
    Searching,
    /// Previous frame succeeded: search near the smoothed curves
    Tracking,
}

impl TrackingState {
    /// State after a frame whose search did (`true`) or did not find both lanes
    pub fn next(self, found: bool) -> TrackingState {
        if found {
            TrackingState::Tracking
        } else {
            TrackingState::Searching
        }
    }
}

/// Running counters since construction or the last reset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingStats {
    pub frames_processed: u64,
    pub frames_rejected: u64,
    pub detections: u64,
    pub full_searches: u64,
    pub near_searches: u64,
    pub track_losses: u64,
}

/// Everything produced for a frame with a detection
#[derive(Debug, Clone)]
pub struct LaneOutput {
    pub sequence: u32,
    pub timestamp_ns: u64,
    /// State after this frame
    pub state: TrackingState,
    /// Search that produced the detection
    pub mode: SearchMode,
    /// Smoothed left boundary (raw fit when smoothing is off)
    pub left_fit: Polynomial,
    /// Smoothed right boundary (raw fit when smoothing is off)
    pub right_fit: Polynomial,
    /// Input frame with the lane area overlaid
    pub annotated: RgbImage,
    /// Bird's-eye diagnostic view
    pub birdseye: RgbImage,
}

/// Lane tracking controller for one camera stream
#[derive(Debug)]
pub struct TrackingController {
    config: LaneConfig,
    binarizer: Binarizer,
    rectifier: Rectifier,
    search: CurveSearch,
    left: LaneTrack,
    right: LaneTrack,
    state: TrackingState,
    stats: TrackingStats,
}

impl TrackingController {
    /// Validate configuration and build the pipeline
    pub fn new(config: LaneConfig) -> Result<Self, LaneError> {
        config.validate()?;

        let rectifier = Rectifier::new(&config.calibration)?;
        let binarizer = Binarizer::new(&config.binarizer);
        let search = CurveSearch::new(&config.search);
        let left = LaneTrack::new(LaneSide::Left, config.history_capacity)?;
        let right = LaneTrack::new(LaneSide::Right, config.history_capacity)?;

        info!(
            "Lane tracker ready: canvas {:?}, history {}, smoothing {}",
            rectifier.canvas_size(),
            config.history_capacity,
            config.temporal_smoothing
        );

        Ok(Self {
            config,
            binarizer,
            rectifier,
            search,
            left,
            right,
            state: TrackingState::default(),
            stats: TrackingStats::default(),
        })
    }

    /// Process one frame.
    ///
    /// Malformed frames are rejected without touching tracking state.
    /// Frames without a detection return `Ok(None)`.
    pub fn process(&mut self, frame: &VideoFrame) -> Result<Option<LaneOutput>, LaneError> {
        if let Err(e) = check_frame(frame) {
            self.stats.frames_rejected += 1;
            return Err(e);
        }
        let Some(rgb) = frame.to_rgb_image() else {
            self.stats.frames_rejected += 1;
            return Err(LaneError::MalformedInput(format!(
                "frame {} could not be converted to RGB",
                frame.sequence
            )));
        };
        self.stats.frames_processed += 1;

        let mask = self.binarizer.binarize(frame);
        let birdseye_mask = self.rectifier.warp_mask(&mask);

        let result = match self.priors() {
            Some((left, right)) => {
                self.stats.near_searches += 1;
                self.search.search_near(&birdseye_mask, &left, &right)
            }
            None => {
                self.stats.full_searches += 1;
                self.search.search_full(&birdseye_mask)
            }
        };

        let previous = self.state;
        let pair = match result {
            Ok(pair) => pair,
            Err(e) => {
                debug!("Frame {}: no lanes ({})", frame.sequence, e);
                if self.config.temporal_smoothing {
                    self.transition(previous.next(false));
                }
                return Ok(None);
            }
        };

        self.stats.detections += 1;
        let (left_fit, right_fit) = if self.config.temporal_smoothing {
            let left = self.left.add_fit(&pair.left.polynomial);
            let right = self.right.add_fit(&pair.right.polynomial);
            self.transition(previous.next(true));
            (left, right)
        } else {
            (pair.left.polynomial, pair.right.polynomial)
        };

        debug!(
            "Frame {}: {:?} search, left {:?}, right {:?}",
            frame.sequence, pair.mode, left_fit, right_fit
        );

        Ok(Some(self.render(frame, &rgb, &birdseye_mask, &pair, left_fit, right_fit)))
    }

    pub fn state(&self) -> TrackingState {
        self.state
    }

    pub fn stats(&self) -> TrackingStats {
        self.stats
    }

    pub fn left_track(&self) -> &LaneTrack {
        &self.left
    }

    pub fn right_track(&self) -> &LaneTrack {
        &self.right
    }

    pub fn rectifier(&self) -> &Rectifier {
        &self.rectifier
    }

    pub fn config(&self) -> &LaneConfig {
        &self.config
    }

    /// Back to the initial state with empty histories
    pub fn reset(&mut self) {
        self.left.clear();
        self.right.clear();
        self.state = TrackingState::default();
        self.stats = TrackingStats::default();
        info!("Lane tracker reset");
    }

    /// Smoothed curves to seed a constrained search, if tracking
    fn priors(&self) -> Option<(Polynomial, Polynomial)> {
        if !self.config.temporal_smoothing || self.state != TrackingState::Tracking {
            return None;
        }
        Some((self.left.current_fit()?, self.right.current_fit()?))
    }

    fn transition(&mut self, next: TrackingState) {
        if next == self.state {
            return;
        }
        match next {
            TrackingState::Tracking => info!("Lanes acquired, tracking"),
            TrackingState::Searching => {
                self.stats.track_losses += 1;
                info!("Lanes lost, searching");
            }
        }
        self.state = next;
    }

    fn render(
        &self,
        frame: &VideoFrame,
        rgb: &RgbImage,
        birdseye_mask: &BinaryMask,
        pair: &LanePair,
        left_fit: Polynomial,
        right_fit: Polynomial,
    ) -> LaneOutput {
        LaneOutput {
            sequence: frame.sequence,
            timestamp_ns: frame.timestamp_ns,
            state: self.state,
            mode: pair.mode,
            left_fit,
            right_fit,
            annotated: lane_overlay(rgb, &left_fit, &right_fit, &self.rectifier),
            birdseye: birdseye_view(birdseye_mask, pair),
        }
    }
}

fn check_frame(frame: &VideoFrame) -> Result<(), LaneError> {
    if frame.width == 0 || frame.height == 0 {
        return Err(LaneError::MalformedInput(format!(
            "frame {} has zero size {}x{}",
            frame.sequence, frame.width, frame.height
        )));
    }
    if frame.format.channels() != 3 {
        return Err(LaneError::MalformedInput(format!(
            "frame {} has {} channels, expected 3",
            frame.sequence,
            frame.format.channels()
        )));
    }
    if frame.data.len() != frame.expected_len() {
        return Err(LaneError::MalformedInput(format!(
            "frame {} buffer is {} bytes, expected {}",
            frame.sequence,
            frame.data.len(),
            frame.expected_len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CalibrationConfig, SearchConfig};
    use frame_io::PixelFormat;

    const WIDTH: u32 = 400;
    const HEIGHT: u32 = 300;

    fn config() -> LaneConfig {
        LaneConfig {
            calibration: CalibrationConfig::identity(WIDTH, HEIGHT),
            search: SearchConfig {
                window_margin: 40,
                min_pixels: 20,
                edge_margin: 20,
                search_margin: 40.0,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn left_curve(shift: f64) -> Polynomial {
        Polynomial::new(1e-3, -0.3, 120.0 + shift)
    }

    fn right_curve(shift: f64) -> Polynomial {
        Polynomial::new(1e-3, -0.3, 300.0 + shift)
    }

    /// Black frame with two 7px yellow bands following the lane curves
    fn lane_frame(shift: f64, sequence: u32) -> VideoFrame {
        let mut frame = VideoFrame::solid(WIDTH, HEIGHT, [0, 0, 0]);
        frame.sequence = sequence;
        for curve in [left_curve(shift), right_curve(shift)] {
            for y in 0..HEIGHT {
                let xc = curve.eval(y as f64).round() as i64;
                for x in (xc - 3)..=(xc + 3) {
                    if x >= 0 && x < WIDTH as i64 {
                        let idx = ((y * WIDTH + x as u32) * 3) as usize;
                        frame.data[idx..idx + 3].copy_from_slice(&[255, 255, 0]);
                    }
                }
            }
        }
        frame
    }

    fn black_frame(sequence: u32) -> VideoFrame {
        let mut frame = VideoFrame::solid(WIDTH, HEIGHT, [0, 0, 0]);
        frame.sequence = sequence;
        frame
    }

    #[test]
    fn test_state_transitions() {
        assert_eq!(TrackingState::default(), TrackingState::Searching);
        assert_eq!(TrackingState::Searching.next(true), TrackingState::Tracking);
        assert_eq!(TrackingState::Searching.next(false), TrackingState::Searching);
        assert_eq!(TrackingState::Tracking.next(true), TrackingState::Tracking);
        assert_eq!(TrackingState::Tracking.next(false), TrackingState::Searching);
    }

    #[test]
    fn test_three_frame_scenario() {
        let mut controller = TrackingController::new(config()).unwrap();

        // Nothing to find
        let out = controller.process(&black_frame(0)).unwrap();
        assert!(out.is_none());
        assert_eq!(controller.state(), TrackingState::Searching);

        // Blind search acquires both lanes
        let out = controller.process(&lane_frame(0.0, 1)).unwrap().unwrap();
        assert_eq!(controller.state(), TrackingState::Tracking);
        assert_eq!(out.state, TrackingState::Tracking);
        assert_eq!(out.mode, SearchMode::Full);
        assert_eq!(out.sequence, 1);
        assert!((out.left_fit.eval(150.0) - left_curve(0.0).eval(150.0)).abs() < 1.5);
        assert!((out.right_fit.eval(150.0) - right_curve(0.0).eval(150.0)).abs() < 1.5);
        assert_eq!(controller.left_track().len(), 1);

        // Lanes drift slightly; constrained search follows them
        let out = controller.process(&lane_frame(8.0, 2)).unwrap().unwrap();
        assert_eq!(controller.state(), TrackingState::Tracking);
        assert_eq!(out.mode, SearchMode::Near);
        assert_eq!(controller.left_track().len(), 2);
        assert_eq!(controller.right_track().len(), 2);

        // Smoothed estimate sits between the two observations
        let x = out.left_fit.eval(150.0);
        assert!(x > left_curve(0.0).eval(150.0) + 2.0);
        assert!(x < left_curve(8.0).eval(150.0) - 2.0);

        let stats = controller.stats();
        assert_eq!(stats.frames_processed, 3);
        assert_eq!(stats.detections, 2);
        assert_eq!(stats.full_searches, 2);
        assert_eq!(stats.near_searches, 1);
    }

    #[test]
    fn test_failure_while_tracking_returns_to_search() {
        let mut controller = TrackingController::new(config()).unwrap();
        controller.process(&lane_frame(0.0, 0)).unwrap().unwrap();
        assert_eq!(controller.state(), TrackingState::Tracking);

        assert!(controller.process(&black_frame(1)).unwrap().is_none());
        assert_eq!(controller.state(), TrackingState::Searching);
        assert_eq!(controller.stats().track_losses, 1);
        // History survives the loss
        assert_eq!(controller.left_track().len(), 1);

        // Next frame searches blind again and appends
        let out = controller.process(&lane_frame(0.0, 2)).unwrap().unwrap();
        assert_eq!(out.mode, SearchMode::Full);
        assert_eq!(controller.left_track().len(), 2);
    }

    #[test]
    fn test_malformed_frames_leave_state_untouched() {
        let mut controller = TrackingController::new(config()).unwrap();
        controller.process(&lane_frame(0.0, 0)).unwrap().unwrap();

        let gray = VideoFrame::with_format(vec![0; 12], 4, 3, PixelFormat::Gray8, 0, 1);
        let empty = VideoFrame::new(Vec::new(), 0, 0, 0, 2);
        let short = VideoFrame::new(vec![0; 10], 4, 3, 0, 3);

        for frame in [gray, empty, short] {
            let result = controller.process(&frame);
            assert!(matches!(result, Err(LaneError::MalformedInput(_))));
        }

        assert_eq!(controller.state(), TrackingState::Tracking);
        assert_eq!(controller.left_track().len(), 1);
        assert_eq!(controller.stats().frames_rejected, 3);
        assert_eq!(controller.stats().frames_processed, 1);
    }

    #[test]
    fn test_collinear_calibration_is_configuration_error() {
        let mut config = config();
        config.calibration.source_points = [[0.0, 0.0], [10.0, 10.0], [20.0, 20.0], [0.0, 90.0]];
        assert!(matches!(
            TrackingController::new(config),
            Err(LaneError::Configuration(_))
        ));
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        let mut config = config();
        config.history_capacity = 0;
        assert!(matches!(
            TrackingController::new(config),
            Err(LaneError::Configuration(_))
        ));
    }

    #[test]
    fn test_outputs_have_expected_sizes() {
        let mut config = config();
        config.calibration = CalibrationConfig::for_canvas(
            [[0.0, 0.0], [WIDTH as f64, 0.0], [0.0, HEIGHT as f64], [WIDTH as f64, HEIGHT as f64]],
            WIDTH * 2,
            HEIGHT,
        );
        config.search.edge_margin = 40;
        config.search.window_margin = 80;
        config.search.search_margin = 80.0;
        let mut controller = TrackingController::new(config).unwrap();

        let out = controller.process(&lane_frame(0.0, 7)).unwrap().unwrap();
        assert_eq!(out.annotated.dimensions(), (WIDTH, HEIGHT));
        assert_eq!(out.birdseye.dimensions(), (WIDTH * 2, HEIGHT));
    }

    #[test]
    fn test_smoothing_disabled_searches_every_frame() {
        let mut config = config();
        config.temporal_smoothing = false;
        let mut controller = TrackingController::new(config).unwrap();

        let first = controller.process(&lane_frame(0.0, 0)).unwrap().unwrap();
        let second = controller.process(&lane_frame(8.0, 1)).unwrap().unwrap();

        assert_eq!(first.mode, SearchMode::Full);
        assert_eq!(second.mode, SearchMode::Full);
        assert_eq!(controller.state(), TrackingState::Searching);
        assert!(controller.left_track().is_empty());
        // Raw fit, no averaging with the first frame
        assert!((second.left_fit.eval(150.0) - left_curve(8.0).eval(150.0)).abs() < 1.5);
    }

    #[test]
    fn test_reset() {
        let mut controller = TrackingController::new(config()).unwrap();
        controller.process(&lane_frame(0.0, 0)).unwrap().unwrap();
        controller.reset();

        assert_eq!(controller.state(), TrackingState::Searching);
        assert!(controller.left_track().is_empty());
        assert!(controller.right_track().is_empty());
        assert_eq!(controller.stats(), TrackingStats::default());
    }
}
