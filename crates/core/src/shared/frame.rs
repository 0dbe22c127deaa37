use image::imageops::FilterType;
use image::RgbImage;

/// Number of interleaved channels in every frame.
pub const RGB_CHANNELS: usize = 3;

/// A single camera frame: contiguous RGB bytes in row-major order.
///
/// Frames are ephemeral. The engine keeps at most the grayscale of the
/// previous frame around (for motion scoring), never the frame itself.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    index: usize,
    timestamp_ms: u64,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, index: usize, timestamp_ms: u64) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * RGB_CHANNELS,
            "data length must equal width * height * 3"
        );
        Self {
            data,
            width,
            height,
            index,
            timestamp_ms,
        }
    }

    /// Checked constructor for data arriving from decoders or the network.
    pub fn from_rgb(
        data: Vec<u8>,
        width: u32,
        height: u32,
        index: usize,
        timestamp_ms: u64,
    ) -> Option<Self> {
        let expected = (width as usize) * (height as usize) * RGB_CHANNELS;
        if width == 0 || height == 0 || data.len() != expected {
            return None;
        }
        Some(Self::new(data, width, height, index, timestamp_ms))
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    /// RGB triple at `(x, y)`. Callers are responsible for bounds.
    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        let i = (y * self.width as usize + x) * RGB_CHANNELS;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    pub fn to_rgb_image(&self) -> Option<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.data.clone())
    }

    /// Returns a copy resized by `scale` (dimensions floored, never below 1px).
    ///
    /// A scale of 1.0 is a plain clone.
    pub fn scaled(&self, scale: f64) -> Frame {
        if (scale - 1.0).abs() < f64::EPSILON || scale <= 0.0 {
            return self.clone();
        }
        let w = ((self.width as f64 * scale).floor() as u32).max(1);
        let h = ((self.height as f64 * scale).floor() as u32).max(1);
        match self.to_rgb_image() {
            Some(img) => {
                let resized = image::imageops::resize(&img, w, h, FilterType::Triangle);
                Frame::new(resized.into_raw(), w, h, self.index, self.timestamp_ms)
            }
            None => self.clone(),
        }
    }
}
