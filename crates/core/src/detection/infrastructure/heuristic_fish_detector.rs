use crate::detection::domain::blob_segmenter::{BlobSegmenter, SegmenterConfig};
use crate::detection::domain::candidate_scorer::{CandidateScorer, ScorerConfig};
use crate::detection::domain::fish_detector::{DetectionError, FishDetector};
use crate::detection::domain::preprocessor::{
    EdgeThresholds, GrayFrame, PreprocessConfig, Preprocessor,
};
use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

/// Model-free detector: Sobel edges, blob segmentation, and composite
/// scoring. Keeps the grayscale of the last frame it saw for motion.
pub struct HeuristicFishDetector {
    preprocessor: Preprocessor,
    segmenter: BlobSegmenter,
    scorer: CandidateScorer,
    previous: Option<GrayFrame>,
    last_thresholds: Option<EdgeThresholds>,
}

impl HeuristicFishDetector {
    pub fn new(
        preprocess: PreprocessConfig,
        segmenter: SegmenterConfig,
        scorer: ScorerConfig,
    ) -> Self {
        Self {
            preprocessor: Preprocessor::new(preprocess),
            segmenter: BlobSegmenter::new(segmenter),
            scorer: CandidateScorer::new(scorer),
            previous: None,
            last_thresholds: None,
        }
    }

    /// Forgets the previous frame so the next call scores motion as neutral.
    pub fn reset(&mut self) {
        self.previous = None;
        self.last_thresholds = None;
    }

    /// Edge thresholds picked for the most recent frame.
    pub fn last_thresholds(&self) -> Option<EdgeThresholds> {
        self.last_thresholds
    }
}

impl Default for HeuristicFishDetector {
    fn default() -> Self {
        Self::new(
            PreprocessConfig::default(),
            SegmenterConfig::default(),
            ScorerConfig::default(),
        )
    }
}

impl FishDetector for HeuristicFishDetector {
    fn name(&self) -> &str {
        "heuristic"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<BoundingBox>, DetectionError> {
        if frame.width() < 3 || frame.height() < 3 {
            return Err(DetectionError::InvalidFrame(format!(
                "{}x{} is too small for edge detection",
                frame.width(),
                frame.height()
            )));
        }

        let edges = self.preprocessor.process(frame);
        let candidates = self.segmenter.segment(&edges);
        let accepted: Vec<BoundingBox> = candidates
            .iter()
            .filter_map(|c| self.scorer.accept(frame, &edges, c, self.previous.as_ref()))
            .collect();

        log::debug!(
            "frame {}: {} edge px, {} candidates, {} accepted",
            frame.index(),
            edges.edge_count(),
            candidates.len(),
            accepted.len()
        );

        self.last_thresholds = Some(edges.thresholds());
        self.previous = Some(edges.into_gray());
        Ok(accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn water(w: u32, h: u32) -> Vec<u8> {
        (0..w * h).flat_map(|_| [60u8, 85, 110]).collect()
    }

    fn with_fish(mut data: Vec<u8>, w: u32, h: u32, cx: f64, cy: f64) -> Vec<u8> {
        for y in 0..h {
            for x in 0..w {
                let nx = (x as f64 + 0.5 - cx) / 60.0;
                let ny = (y as f64 + 0.5 - cy) / 20.0;
                if nx * nx + ny * ny <= 1.0 {
                    let i = ((y * w + x) * 3) as usize;
                    data[i..i + 3].copy_from_slice(&[140, 125, 110]);
                }
            }
        }
        data
    }

    #[test]
    fn test_detects_single_fish() {
        let frame = Frame::new(with_fish(water(320, 240), 320, 240, 160.0, 120.0), 320, 240, 0, 0);
        let mut detector = HeuristicFishDetector::default();
        let boxes = detector.detect(&frame).unwrap();
        assert_eq!(boxes.len(), 1);
        let (cx, cy) = boxes[0].center();
        assert!((cx - 160.0).abs() < 4.0, "cx={cx}");
        assert!((cy - 120.0).abs() < 4.0, "cy={cy}");
        assert!(boxes[0].confidence > 0.68);
    }

    #[test]
    fn test_empty_water_yields_nothing() {
        let frame = Frame::new(water(320, 240), 320, 240, 0, 0);
        let mut detector = HeuristicFishDetector::default();
        assert!(detector.detect(&frame).unwrap().is_empty());
    }

    #[test]
    fn test_tiny_frame_is_invalid() {
        let frame = Frame::new(vec![0u8; 12], 2, 2, 0, 0);
        let mut detector = HeuristicFishDetector::default();
        assert!(matches!(
            detector.detect(&frame),
            Err(DetectionError::InvalidFrame(_))
        ));
    }

    #[test]
    fn test_keeps_thresholds_of_last_frame() {
        let mut detector = HeuristicFishDetector::default();
        assert!(detector.last_thresholds().is_none());

        let frame = Frame::new(with_fish(water(320, 240), 320, 240, 160.0, 120.0), 320, 240, 0, 0);
        detector.detect(&frame).unwrap();
        let t = detector.last_thresholds().unwrap();
        assert!(t.low >= 400);
        assert!(t.high >= 1600 && t.high > t.low);

        detector.reset();
        assert!(detector.last_thresholds().is_none());
    }
}
