/// Axis-aligned box in the pixel space of the frame it was found in.
///
/// Value type: produced by a detector backend each cycle, consumed by the
/// deduplicator and tracker, then dropped.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub confidence: f64,
}

impl BoundingBox {
    pub fn new(x: i32, y: i32, width: i32, height: i32, confidence: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            confidence,
        }
    }

    pub fn area(&self) -> f64 {
        self.width.max(0) as f64 * self.height.max(0) as f64
    }

    pub fn center(&self) -> (f64, f64) {
        (
            self.x as f64 + self.width as f64 / 2.0,
            self.y as f64 + self.height as f64 / 2.0,
        )
    }

    /// `[x, y, width, height]` as floats, the shape tracks are stored in.
    pub fn as_rect(&self) -> [f64; 4] {
        [
            self.x as f64,
            self.y as f64,
            self.width as f64,
            self.height as f64,
        ]
    }

    /// Long side over short side, orientation independent.
    pub fn elongation(&self) -> f64 {
        let long = self.width.max(self.height) as f64;
        let short = self.width.min(self.height).max(1) as f64;
        long / short
    }

    pub fn min_side(&self) -> i32 {
        self.width.min(self.height)
    }

    pub fn max_side(&self) -> i32 {
        self.width.max(self.height)
    }

    pub fn iou(&self, other: &BoundingBox) -> f64 {
        rect_iou(&self.as_rect(), &other.as_rect())
    }

    /// Rescales every coordinate, rounding to the nearest pixel.
    pub fn scaled(&self, sx: f64, sy: f64) -> BoundingBox {
        BoundingBox {
            x: (self.x as f64 * sx).round() as i32,
            y: (self.y as f64 * sy).round() as i32,
            width: (self.width as f64 * sx).round() as i32,
            height: (self.height as f64 * sy).round() as i32,
            confidence: self.confidence,
        }
    }

    /// Trims the box to a `frame_w` x `frame_h` frame. Both edges are
    /// clipped in place; at least 1px survives.
    pub fn clamped(&self, frame_w: u32, frame_h: u32) -> BoundingBox {
        let fw = frame_w as i32;
        let fh = frame_h as i32;
        let x = self.x.clamp(0, (fw - 1).max(0));
        let y = self.y.clamp(0, (fh - 1).max(0));
        let x2 = (self.x + self.width).min(fw);
        let y2 = (self.y + self.height).min(fh);
        BoundingBox {
            x,
            y,
            width: (x2 - x).max(1),
            height: (y2 - y).max(1),
            confidence: self.confidence,
        }
    }
}

/// IoU between two rectangles represented as `[x, y, width, height]`.
pub fn rect_iou(a: &[f64; 4], b: &[f64; 4]) -> f64 {
    let x1 = a[0].max(b[0]);
    let y1 = a[1].max(b[1]);
    let x2 = (a[0] + a[2]).min(b[0] + b[2]);
    let y2 = (a[1] + a[3]).min(b[1] + b[3]);

    if x2 <= x1 || y2 <= y1 {
        return 0.0;
    }

    let inter = (x2 - x1) * (y2 - y1);
    let union = a[2] * a[3] + b[2] * b[3] - inter;
    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}

/// Euclidean distance between rectangle centers.
pub fn center_distance(a: &[f64; 4], b: &[f64; 4]) -> f64 {
    let dx = (a[0] + a[2] / 2.0) - (b[0] + b[2] / 2.0);
    let dy = (a[1] + a[3] / 2.0) - (b[1] + b[3] / 2.0);
    (dx * dx + dy * dy).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn bbox(x: i32, y: i32, w: i32, h: i32) -> BoundingBox {
        BoundingBox::new(x, y, w, h, 0.9)
    }

    // ── IoU ──────────────────────────────────────────────────────────

    #[test]
    fn test_iou_identical_boxes() {
        let a = bbox(10, 10, 100, 50);
        assert_relative_eq!(a.iou(&a), 1.0);
    }

    #[test]
    fn test_iou_partial_overlap() {
        // intersection 50*100 = 5000, union 15000
        let a = bbox(0, 0, 100, 100);
        let b = bbox(50, 0, 100, 100);
        assert_relative_eq!(a.iou(&b), 5000.0 / 15000.0);
    }

    #[test]
    fn test_iou_contained() {
        let a = bbox(0, 0, 100, 100);
        let b = bbox(25, 25, 50, 50);
        assert_relative_eq!(a.iou(&b), 2500.0 / 10000.0);
    }

    #[rstest]
    #[case::disjoint(bbox(0, 0, 50, 50), bbox(100, 100, 50, 50))]
    #[case::touching_edges(bbox(0, 0, 50, 50), bbox(50, 0, 50, 50))]
    #[case::zero_width(bbox(0, 0, 0, 100), bbox(0, 0, 50, 50))]
    fn test_iou_zero(#[case] a: BoundingBox, #[case] b: BoundingBox) {
        assert_relative_eq!(a.iou(&b), 0.0);
    }

    // ── Geometry ─────────────────────────────────────────────────────

    #[test]
    fn test_center_and_distance() {
        let a = bbox(0, 0, 10, 10);
        let b = bbox(30, 40, 10, 10);
        assert_eq!(a.center(), (5.0, 5.0));
        assert_relative_eq!(center_distance(&a.as_rect(), &b.as_rect()), 50.0);
    }

    #[test]
    fn test_elongation_is_orientation_independent() {
        assert_relative_eq!(bbox(0, 0, 120, 40).elongation(), 3.0);
        assert_relative_eq!(bbox(0, 0, 40, 120).elongation(), 3.0);
    }

    #[test]
    fn test_scaled_rounds_coordinates() {
        let b = bbox(11, 7, 31, 15).scaled(2.0, 2.0);
        assert_eq!((b.x, b.y, b.width, b.height), (22, 14, 62, 30));
        assert_relative_eq!(b.confidence, 0.9);
    }

    #[rstest]
    #[case::inside(bbox(10, 10, 30, 20), (10, 10, 30, 20))]
    #[case::left_overhang(bbox(-10, 0, 50, 20), (0, 0, 40, 20))]
    #[case::top_overhang(bbox(5, -15, 20, 40), (5, 0, 20, 25))]
    #[case::bottom_overhang(bbox(-10, 90, 50, 50), (0, 90, 40, 10))]
    #[case::right_overhang(bbox(80, 10, 50, 20), (80, 10, 20, 20))]
    #[case::covers_frame(bbox(-20, -20, 200, 200), (0, 0, 100, 100))]
    #[case::outside(bbox(500, 500, 10, 10), (99, 99, 1, 1))]
    fn test_clamped_trims_to_frame(
        #[case] b: BoundingBox,
        #[case] expected: (i32, i32, i32, i32),
    ) {
        let c = b.clamped(100, 100);
        assert_eq!((c.x, c.y, c.width, c.height), expected);
    }

    #[test]
    fn test_clamped_never_moves_far_edge_outward() {
        let b = bbox(-10, 0, 50, 20);
        let c = b.clamped(100, 100);
        assert_eq!(c.x + c.width, b.x + b.width);
        assert_relative_eq!(c.confidence, 0.9);
    }
}
