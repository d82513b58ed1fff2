use crate::error::{ConfigError, FrameError};
use crate::slice_map::SliceMap;
use crate::types::*;
use log::trace;
use std::sync::Arc;

/// Row sampled for brightness. Keyboard visualizers light the key edge at the
/// very top of the frame.
const SAMPLE_ROW: usize = 0;

/// Turns a grayscale frame into per-key brightness and activation.
///
/// Pure: the same frame and slice map always give the same result, so frames
/// can be analyzed independently of each other.
#[derive(Debug, Clone)]
pub struct FrameAnalyzer {
    slices: Arc<SliceMap>,
    height: usize,
    threshold_percent: f64,
}

impl FrameAnalyzer {
    pub fn new(slices: Arc<SliceMap>, height: usize) -> Result<Self, ConfigError> {
        check_dimensions(slices.frame_width(), height)?;
        Ok(Self {
            slices,
            height,
            threshold_percent: DEFAULT_THRESHOLD_PERCENT,
        })
    }

    /// Override the activation threshold (percent of full white).
    pub fn with_threshold(mut self, percent: f64) -> Result<Self, ConfigError> {
        if !(0.0..=100.0).contains(&percent) {
            return Err(ConfigError::Threshold(percent));
        }
        self.threshold_percent = percent;
        Ok(self)
    }

    pub fn slices(&self) -> &Arc<SliceMap> {
        &self.slices
    }

    pub fn width(&self) -> usize {
        self.slices.frame_width()
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn threshold(&self) -> f64 {
        self.threshold_percent
    }

    pub fn analyze(&self, frame: &Frame) -> Result<FrameAnalysis, FrameError> {
        if frame.width != self.width() || frame.height != self.height {
            return Err(FrameError::Dimensions {
                width: frame.width,
                height: frame.height,
                expected_width: self.width(),
                expected_height: self.height,
            });
        }
        if frame.pixels.len() != frame.width * frame.height {
            return Err(FrameError::Truncated {
                expected: frame.width * frame.height,
                actual: frame.pixels.len(),
            });
        }

        let row = frame.row(SAMPLE_ROW);
        let mut brightness = [0.0f64; KEY_COUNT];
        let mut keys = [false; KEY_COUNT];
        for slice in self.slices.slices() {
            let percent = mean_brightness_percent(row, slice.x_start, slice.x_end());
            brightness[slice.index] = percent;
            keys[slice.index] = percent > self.threshold_percent;
        }

        let activation = ActivationVector::new(keys);
        trace!("analyzed frame: {} keys active", activation.active_count());
        Ok(FrameAnalysis {
            brightness,
            activation,
        })
    }
}

/// Mean intensity of `row[x_start..x_end]` as a percentage of 255.
/// An empty range reads as black.
pub fn mean_brightness_percent(row: &[u8], x_start: usize, x_end: usize) -> f64 {
    let x_end = x_end.min(row.len());
    if x_start >= x_end {
        return 0.0;
    }
    let span = &row[x_start..x_end];
    let sum: u64 = span.iter().map(|&p| u64::from(p)).sum();
    let mean = sum as f64 / span.len() as f64;
    mean / 255.0 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slice_map::SliceLayout;

    const W: usize = 1920;
    const H: usize = 8;

    fn analyzer() -> FrameAnalyzer {
        let map = SliceMap::new(W, &SliceLayout::piano_proportional(W)).unwrap();
        FrameAnalyzer::new(Arc::new(map), H).unwrap()
    }

    #[test]
    fn test_black_and_white_frames() {
        let a = analyzer();
        let black = a.analyze(&Frame::filled(W, H, 0)).unwrap();
        assert_eq!(black.activation, ActivationVector::silent());
        assert!(black.brightness.iter().all(|&b| b == 0.0));

        let white = a.analyze(&Frame::filled(W, H, 255)).unwrap();
        assert_eq!(white.activation.active_count(), KEY_COUNT);
        assert!(white.brightness.iter().all(|&b| (b - 100.0).abs() < 1e-9));
    }

    #[test]
    fn test_threshold_is_strict() {
        // 178.5 / 255 = 70%: 178 sits just under, 179 just over.
        let a = analyzer();
        let under = a.analyze(&Frame::filled(W, H, 178)).unwrap();
        assert_eq!(under.activation.active_count(), 0);
        let over = a.analyze(&Frame::filled(W, H, 179)).unwrap();
        assert_eq!(over.activation.active_count(), KEY_COUNT);

        let exact = FrameAnalyzer::new(a.slices().clone(), H)
            .unwrap()
            .with_threshold(100.0)
            .unwrap();
        let white = exact.analyze(&Frame::filled(W, H, 255)).unwrap();
        assert_eq!(white.activation.active_count(), 0);
    }

    #[test]
    fn test_only_top_row_is_sampled() {
        let a = analyzer();
        let mut frame = Frame::filled(W, H, 255);
        frame.row_mut(0).fill(0);
        assert_eq!(a.analyze(&frame).unwrap().activation.active_count(), 0);
    }

    #[test]
    fn test_single_key_lights_single_slice() {
        let a = analyzer();
        let slice = a.slices().slices()[39];
        let mut frame = Frame::filled(W, H, 20);
        frame.row_mut(0)[slice.x_start..slice.x_end()].fill(240);
        let result = a.analyze(&frame).unwrap();
        assert_eq!(result.activation.active_indices().collect::<Vec<_>>(), vec![39]);
        assert_eq!(slice.note.to_string(), "C4");
    }

    #[test]
    fn test_idempotent() {
        let a = analyzer();
        let mut frame = Frame::filled(W, H, 0);
        for (x, p) in frame.row_mut(0).iter_mut().enumerate() {
            *p = (x * 7 % 256) as u8;
        }
        let first = a.analyze(&frame).unwrap();
        let second = a.analyze(&frame).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_wrong_dimensions_rejected() {
        let a = analyzer();
        assert!(matches!(
            a.analyze(&Frame::filled(W - 1, H, 0)),
            Err(FrameError::Dimensions { .. })
        ));
        let mut short = Frame::filled(W, H, 0);
        short.pixels.truncate(W);
        assert!(matches!(a.analyze(&short), Err(FrameError::Truncated { .. })));
    }

    #[test]
    fn test_empty_range_reads_black() {
        let row = [255u8; 10];
        assert_eq!(mean_brightness_percent(&row, 10, 10), 0.0);
        assert_eq!(mean_brightness_percent(&row, 8, 20), 100.0);
        assert_eq!(mean_brightness_percent(&row, 12, 20), 0.0);
        assert!(!mean_brightness_percent(&[], 0, 4).is_nan());
    }

    #[test]
    fn test_bad_config() {
        let map = Arc::new(SliceMap::new(W, &SliceLayout::uniform(W)).unwrap());
        assert!(FrameAnalyzer::new(map.clone(), 0).is_err());
        assert!(FrameAnalyzer::new(map.clone(), MAX_DIMENSION + 1).is_err());
        let a = FrameAnalyzer::new(map, H).unwrap();
        assert!(a.clone().with_threshold(101.0).is_err());
        assert!(a.with_threshold(-1.0).is_err());
    }
}
