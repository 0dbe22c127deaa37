use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::preprocessor::EdgeMap;
use crate::shared::bounding_box::BoundingBox;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    pub min_stride: usize,
    /// Seed stride is `min(w, h) / stride_divisor`, at least `min_stride`.
    pub stride_divisor: usize,
    pub min_component_pixels: usize,
    pub min_raw_side: i32,
    pub refine_step: usize,
    pub refine_max_points: usize,
    pub refine_min_points: usize,
    pub refine_padding: i32,
    pub min_aspect: f64,
    pub max_aspect: f64,
    pub min_area: f64,
    /// Largest accepted box area as a fraction of the frame area.
    pub max_area_fraction: f64,
    pub min_side: i32,
    /// Largest accepted box side as a fraction of the frame's shorter side.
    pub max_side_fraction: f64,
    pub placeholder_confidence: f64,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            min_stride: 3,
            stride_divisor: 120,
            min_component_pixels: 50,
            min_raw_side: 10,
            refine_step: 3,
            refine_max_points: 500,
            refine_min_points: 10,
            refine_padding: 1,
            min_aspect: 1.2,
            max_aspect: 6.0,
            min_area: 1000.0,
            max_area_fraction: 0.4,
            min_side: 20,
            max_side_fraction: 0.8,
            placeholder_confidence: 0.8,
        }
    }
}

/// Finds 8-connected edge components and turns them into candidate boxes.
#[derive(Clone, Debug, Default)]
pub struct BlobSegmenter {
    config: SegmenterConfig,
}

impl BlobSegmenter {
    pub fn new(config: SegmenterConfig) -> Self {
        Self { config }
    }

    pub fn stride(&self, width: usize, height: usize) -> usize {
        (width.min(height) / self.config.stride_divisor.max(1)).max(self.config.min_stride)
    }

    /// Refined candidate boxes that pass the geometric gates, with the
    /// placeholder confidence. Scoring happens afterwards.
    pub fn segment(&self, edges: &EdgeMap) -> Vec<BoundingBox> {
        let (w, h) = (edges.width(), edges.height());
        let stride = self.stride(w, h);
        let mut visited = vec![false; w * h];
        let mut boxes = Vec::new();

        let mut y = stride;
        while y + stride < h {
            let mut x = stride;
            while x + stride < w {
                if edges.is_edge(x, y) && !visited[y * w + x] {
                    if let Some(raw) = self.flood_fill(edges, x, y, &mut visited) {
                        let refined = self.refine(edges, &raw);
                        if self.passes_gates(&refined, w, h) {
                            boxes.push(refined);
                        }
                    }
                }
                x += stride;
            }
            y += stride;
        }
        boxes
    }

    /// BFS over 8-connected edge pixels. `None` for noise components.
    fn flood_fill(
        &self,
        edges: &EdgeMap,
        sx: usize,
        sy: usize,
        visited: &mut [bool],
    ) -> Option<BoundingBox> {
        let (w, h) = (edges.width(), edges.height());
        let (mut min_x, mut max_x, mut min_y, mut max_y) = (sx, sx, sy, sy);
        let mut count = 0usize;
        let mut queue = VecDeque::new();

        visited[sy * w + sx] = true;
        queue.push_back((sx, sy));

        while let Some((x, y)) = queue.pop_front() {
            min_x = min_x.min(x);
            max_x = max_x.max(x);
            min_y = min_y.min(y);
            max_y = max_y.max(y);
            count += 1;

            for dy in -1i64..=1 {
                for dx in -1i64..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let nx = x as i64 + dx;
                    let ny = y as i64 + dy;
                    if nx < 0 || ny < 0 || nx >= w as i64 || ny >= h as i64 {
                        continue;
                    }
                    let (nx, ny) = (nx as usize, ny as usize);
                    let idx = ny * w + nx;
                    if !visited[idx] && edges.is_edge(nx, ny) {
                        visited[idx] = true;
                        queue.push_back((nx, ny));
                    }
                }
            }
        }

        if count < self.config.min_component_pixels {
            return None;
        }
        let bw = (max_x - min_x + 1) as i32;
        let bh = (max_y - min_y + 1) as i32;
        if bw < self.config.min_raw_side || bh < self.config.min_raw_side {
            return None;
        }
        Some(BoundingBox::new(
            min_x as i32,
            min_y as i32,
            bw,
            bh,
            self.config.placeholder_confidence,
        ))
    }

    /// Tightens a flood-filled box to the extent of sparse edge samples
    /// strictly inside it. Falls back to the raw box on too few samples.
    fn refine(&self, edges: &EdgeMap, raw: &BoundingBox) -> BoundingBox {
        let (w, h) = (edges.width(), edges.height());
        let step = self.config.refine_step.max(1);
        let x0 = raw.x.max(0) as usize;
        let y0 = raw.y.max(0) as usize;
        let x1 = ((raw.x + raw.width) as usize).min(w);
        let y1 = ((raw.y + raw.height) as usize).min(h);

        let mut points = Vec::new();
        'rows: for y in (y0..y1).step_by(step) {
            for x in (x0..x1).step_by(step) {
                if points.len() >= self.config.refine_max_points {
                    break 'rows;
                }
                if edges.is_edge(x, y) {
                    points.push((x as i32, y as i32));
                }
            }
        }

        if points.len() < self.config.refine_min_points.max(4) {
            return *raw;
        }

        let min_x = points.iter().map(|p| p.0).min().unwrap_or(raw.x);
        let max_x = points.iter().map(|p| p.0).max().unwrap_or(raw.x);
        let min_y = points.iter().map(|p| p.1).min().unwrap_or(raw.y);
        let max_y = points.iter().map(|p| p.1).max().unwrap_or(raw.y);

        let pad = self.config.refine_padding;
        let x = (min_x - pad).max(0);
        let y = (min_y - pad).max(0);
        BoundingBox::new(
            x,
            y,
            (max_x - min_x + 1 + 2 * pad).min(w as i32 - x),
            (max_y - min_y + 1 + 2 * pad).min(h as i32 - y),
            raw.confidence,
        )
    }

    fn passes_gates(&self, b: &BoundingBox, frame_w: usize, frame_h: usize) -> bool {
        let c = &self.config;
        let aspect = b.elongation();
        let area = b.area();
        let max_area = (frame_w * frame_h) as f64 * c.max_area_fraction;
        let max_side = frame_w.min(frame_h) as f64 * c.max_side_fraction;

        (c.min_aspect..=c.max_aspect).contains(&aspect)
            && area >= c.min_area
            && area <= max_area
            && b.min_side() >= c.min_side
            && b.max_side() as f64 <= max_side
    }
}
