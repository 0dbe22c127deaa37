use crate::shared::frame::{Frame, RGB_CHANNELS};
use crate::video::domain::frame_source::{FrameSource, FrameSourceError};

pub const WATER_RGB: [u8; 3] = [60, 85, 110];
pub const FISH_RGB: [u8; 3] = [140, 125, 110];

/// An elliptical fish moving at constant velocity, in frame pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SyntheticFish {
    pub center_x: f64,
    pub center_y: f64,
    pub radius_x: f64,
    pub radius_y: f64,
    pub velocity_x: f64,
    pub velocity_y: f64,
}

impl SyntheticFish {
    pub fn center_at(&self, index: usize) -> (f64, f64) {
        (
            self.center_x + self.velocity_x * index as f64,
            self.center_y + self.velocity_y * index as f64,
        )
    }
}

/// Generates flat water-coloured frames with silver-gray fish drawn on top.
pub struct SyntheticSource {
    width: u32,
    height: u32,
    frame_count: usize,
    frame_interval_ms: u64,
    fish: Vec<SyntheticFish>,
    cursor: usize,
    opened: bool,
}

impl SyntheticSource {
    pub fn new(width: u32, height: u32, frame_count: usize, fish: Vec<SyntheticFish>) -> Self {
        Self {
            width,
            height,
            frame_count,
            frame_interval_ms: 33,
            fish,
            cursor: 0,
            opened: false,
        }
    }

    /// One 120x40 fish starting left of centre and drifting right.
    pub fn single_fish(width: u32, height: u32, frame_count: usize) -> Self {
        let fish = SyntheticFish {
            center_x: width as f64 * 0.35,
            center_y: height as f64 * 0.5,
            radius_x: 60.0,
            radius_y: 20.0,
            velocity_x: 2.0,
            velocity_y: 0.5,
        };
        Self::new(width, height, frame_count, vec![fish])
    }

    pub fn with_frame_interval_ms(mut self, interval_ms: u64) -> Self {
        self.frame_interval_ms = interval_ms;
        self
    }

    /// Renders frame `index` without advancing the source.
    pub fn render(&self, index: usize) -> Frame {
        let (w, h) = (self.width as usize, self.height as usize);
        let mut data: Vec<u8> = WATER_RGB
            .iter()
            .copied()
            .cycle()
            .take(w * h * RGB_CHANNELS)
            .collect();

        for fish in &self.fish {
            let (cx, cy) = fish.center_at(index);
            let y0 = ((cy - fish.radius_y).floor().max(0.0) as usize).min(h);
            let y1 = ((cy + fish.radius_y).ceil().max(0.0) as usize).min(h);
            let x0 = ((cx - fish.radius_x).floor().max(0.0) as usize).min(w);
            let x1 = ((cx + fish.radius_x).ceil().max(0.0) as usize).min(w);
            for y in y0..y1 {
                for x in x0..x1 {
                    let nx = (x as f64 + 0.5 - cx) / fish.radius_x;
                    let ny = (y as f64 + 0.5 - cy) / fish.radius_y;
                    if nx * nx + ny * ny <= 1.0 {
                        let i = (y * w + x) * RGB_CHANNELS;
                        data[i..i + RGB_CHANNELS].copy_from_slice(&FISH_RGB);
                    }
                }
            }
        }

        Frame::new(
            data,
            self.width,
            self.height,
            index,
            index as u64 * self.frame_interval_ms,
        )
    }
}

impl FrameSource for SyntheticSource {
    fn open(&mut self) -> Result<(), FrameSourceError> {
        if self.width == 0 || self.height == 0 {
            return Err(FrameSourceError::NotFound(format!(
                "invalid synthetic frame size {}x{}",
                self.width, self.height
            )));
        }
        self.cursor = 0;
        self.opened = true;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>, FrameSourceError> {
        if !self.opened {
            return Err(FrameSourceError::Disconnected("source is not open".into()));
        }
        if self.cursor >= self.frame_count {
            return Ok(None);
        }
        let frame = self.render(self.cursor);
        self.cursor += 1;
        Ok(Some(frame))
    }

    fn close(&mut self) {
        self.opened = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renders_fish_over_water() {
        let source = SyntheticSource::single_fish(320, 240, 1);
        let frame = source.render(0);
        let (cx, cy) = source.fish[0].center_at(0);
        assert_eq!(frame.pixel(cx as usize, cy as usize), FISH_RGB);
        assert_eq!(frame.pixel(2, 2), WATER_RGB);
    }

    #[test]
    fn test_fish_moves_with_velocity() {
        let source = SyntheticSource::single_fish(320, 240, 10);
        let fish = source.fish[0];
        assert_eq!(fish.center_at(4), (fish.center_x + 8.0, fish.center_y + 2.0));
    }

    #[test]
    fn test_yields_frame_count_frames_then_none() {
        let mut source = SyntheticSource::single_fish(64, 48, 3);
        source.open().unwrap();
        let mut indices = Vec::new();
        while let Some(frame) = source.next_frame().unwrap() {
            indices.push(frame.index());
        }
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_fish_partly_off_frame_is_clipped() {
        let fish = SyntheticFish {
            center_x: -10.0,
            center_y: 10.0,
            radius_x: 30.0,
            radius_y: 10.0,
            velocity_x: 0.0,
            velocity_y: 0.0,
        };
        let source = SyntheticSource::new(40, 20, 1, vec![fish]);
        let frame = source.render(0);
        assert_eq!(frame.pixel(0, 10), FISH_RGB);
        assert_eq!(frame.pixel(39, 10), WATER_RGB);
    }

    #[test]
    fn test_zero_size_fails_to_open() {
        let mut source = SyntheticSource::new(0, 10, 1, Vec::new());
        assert!(matches!(source.open(), Err(FrameSourceError::NotFound(_))));
    }
}
