//! Per-side temporal smoothing of accepted fits

use ring_buffer::RingBuffer;
use tracing::trace;

use crate::fit::{LaneSide, Polynomial};
use crate::LaneError;

/// Bounded history of accepted fits for one lane boundary.
///
/// The current estimate is the coefficient-wise mean of everything held;
/// once full, each new fit evicts the oldest.
#[derive(Debug)]
pub struct LaneTrack {
    side: LaneSide,
    history: RingBuffer<Polynomial>,
}

impl LaneTrack {
    pub fn new(side: LaneSide, capacity: usize) -> Result<Self, LaneError> {
        let history = RingBuffer::new(capacity)
            .map_err(|e| LaneError::Configuration(format!("{} lane history: {}", side, e)))?;
        Ok(Self { side, history })
    }

    /// Record an accepted fit and return the updated smoothed estimate
    pub fn add_fit(&mut self, fit: &Polynomial) -> Polynomial {
        if let Some(evicted) = self.history.push(*fit) {
            trace!(
                "{} lane history evicted {:?} after {} accepted fits",
                self.side,
                evicted,
                self.total_accepted()
            );
        }
        Polynomial::mean(self.history.iter()).unwrap_or(*fit)
    }

    /// Smoothed estimate, `None` until the first fit is added
    pub fn current_fit(&self) -> Option<Polynomial> {
        Polynomial::mean(self.history.iter())
    }

    pub fn side(&self) -> LaneSide {
        self.side
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.history.capacity()
    }

    /// Total fits ever accepted, including evicted ones
    pub fn total_accepted(&self) -> usize {
        self.history.total_written()
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    #[test]
    fn test_empty_track_has_no_estimate() {
        let track = LaneTrack::new(LaneSide::Left, 5).unwrap();
        assert!(track.is_empty());
        assert_eq!(track.current_fit(), None);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = LaneTrack::new(LaneSide::Right, 0).unwrap_err();
        assert!(matches!(err, LaneError::Configuration(msg) if msg.contains("right")));
    }

    #[test]
    fn test_single_fit_is_its_own_mean() {
        let mut track = LaneTrack::new(LaneSide::Left, 5).unwrap();
        let fit = Polynomial::new(1e-4, -0.3, 250.0);
        assert_eq!(track.add_fit(&fit), fit);
        assert_eq!(track.current_fit(), Some(fit));
    }

    #[test]
    fn test_mean_before_full() {
        let mut track = LaneTrack::new(LaneSide::Left, 5).unwrap();
        track.add_fit(&Polynomial::new(0.0, 0.0, 100.0));
        track.add_fit(&Polynomial::new(0.0, 1.0, 200.0));
        let smoothed = track.add_fit(&Polynomial::new(3.0, 2.0, 300.0));

        assert_eq!(track.len(), 3);
        assert_abs_diff_eq!(smoothed.a, 1.0);
        assert_abs_diff_eq!(smoothed.b, 1.0);
        assert_abs_diff_eq!(smoothed.c, 200.0);
    }

    #[test]
    fn test_oldest_fit_evicted() {
        let mut track = LaneTrack::new(LaneSide::Right, 5).unwrap();
        for c in 1..=6 {
            track.add_fit(&Polynomial::new(0.0, 0.0, c as f64 * 10.0));
        }

        // 10 is gone; mean of 20..=60
        assert_eq!(track.len(), 5);
        assert_eq!(track.total_accepted(), 6);
        assert_abs_diff_eq!(track.current_fit().unwrap().c, 40.0);

        // Clearing empties the window but keeps the lifetime count
        track.clear();
        assert_eq!(track.current_fit(), None);
        assert_eq!(track.total_accepted(), 6);
    }

    #[test]
    fn test_clear() {
        let mut track = LaneTrack::new(LaneSide::Left, 2).unwrap();
        track.add_fit(&Polynomial::new(1.0, 1.0, 1.0));
        track.clear();
        assert!(track.is_empty());
        assert_eq!(track.capacity(), 2);
    }

    proptest! {
        #[test]
        fn prop_estimate_is_mean_of_last_window(
            capacity in 1usize..8,
            offsets in proptest::collection::vec(-500.0f64..500.0, 1..30),
        ) {
            let mut track = LaneTrack::new(LaneSide::Left, capacity).unwrap();
            let mut last = Polynomial::default();
            for &c in &offsets {
                last = track.add_fit(&Polynomial::new(0.0, 0.0, c));
            }

            let kept = &offsets[offsets.len().saturating_sub(capacity)..];
            let expected = kept.iter().sum::<f64>() / kept.len() as f64;
            prop_assert!((last.c - expected).abs() < 1e-9);
            prop_assert_eq!(track.len(), kept.len());
        }
    }
}
