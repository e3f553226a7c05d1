//! Captured frame types.

use bytes::Bytes;
use std::time::Instant;

/// Pixel layout of a captured frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 32 bits per pixel, bytes ordered B, G, R, X (unused), rows top-down.
    Bgr32,
}

impl PixelFormat {
    /// Bytes per pixel.
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            Self::Bgr32 => 4,
        }
    }

    /// Bytes per row for a frame of the given width.
    ///
    /// Four-byte pixels are always DWORD aligned, so no row padding is added.
    pub fn stride(self, width: u32) -> u32 {
        width * self.bytes_per_pixel()
    }

    /// Total buffer size for the given dimensions.
    pub fn buffer_size(self, width: u32, height: u32) -> usize {
        self.stride(width) as usize * height as usize
    }
}

/// Timestamp for a captured frame.
#[derive(Debug, Clone, Copy)]
pub struct CaptureTimestamp {
    /// Monotonic timestamp when the frame was captured.
    pub capture_time: Instant,

    /// Time since the frame source was opened, in 100ns units.
    pub pts_100ns: u64,
}

impl CaptureTimestamp {
    /// Create a new capture timestamp.
    pub fn now(start_time: Instant) -> Self {
        let capture_time = Instant::now();
        let elapsed = capture_time.duration_since(start_time);
        let pts_100ns = elapsed.as_nanos() as u64 / 100;

        Self {
            capture_time,
            pts_100ns,
        }
    }

    /// Get the presentation timestamp in milliseconds.
    pub fn pts_ms(&self) -> u64 {
        self.pts_100ns / 10_000
    }
}

/// An immutable snapshot of one captured frame.
///
/// The pixel data is copied out of the capture buffer on hand-off, so a frame
/// remains valid after later captures reuse that buffer.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Pixel data, `stride * height` bytes.
    pub data: Bytes,

    /// Frame width in pixels.
    pub width: u32,

    /// Frame height in pixels.
    pub height: u32,

    /// Bytes per row.
    pub stride: u32,

    /// Pixel layout.
    pub format: PixelFormat,

    /// Capture timestamp.
    pub timestamp: CaptureTimestamp,

    /// Monotonically increasing sequence number.
    pub sequence: u64,
}

impl Frame {
    /// Create a new BGR32 frame.
    pub fn new(
        data: Bytes,
        width: u32,
        height: u32,
        timestamp: CaptureTimestamp,
        sequence: u64,
    ) -> Self {
        let format = PixelFormat::Bgr32;
        Self {
            data,
            width,
            height,
            stride: format.stride(width),
            format,
            timestamp,
            sequence,
        }
    }

    /// Validate that the frame data matches the declared dimensions.
    pub fn is_valid(&self) -> bool {
        self.stride == self.format.stride(self.width)
            && self.data.len() == self.stride as usize * self.height as usize
    }

    /// Return the `[b, g, r, x]` bytes of one pixel.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = y as usize * self.stride as usize + x as usize * 4;
        let px = self.data.get(offset..offset + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Return one row of pixel data, top row first.
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.height {
            return None;
        }
        let start = y as usize * self.stride as usize;
        self.data.get(start..start + self.stride as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(width: u32, height: u32, len: usize) -> Frame {
        let start = Instant::now();
        Frame::new(
            Bytes::from(vec![0u8; len]),
            width,
            height,
            CaptureTimestamp::now(start),
            0,
        )
    }

    #[test]
    fn test_bgr32_stride_and_size() {
        assert_eq!(PixelFormat::Bgr32.stride(400), 1600);
        assert_eq!(PixelFormat::Bgr32.buffer_size(200, 100), 80_000);
    }

    #[test]
    fn test_frame_validity() {
        assert!(frame(200, 100, 80_000).is_valid());
        assert!(!frame(200, 100, 79_999).is_valid());
    }

    #[test]
    fn test_pixel_and_row_access() {
        let mut data = vec![0u8; 2 * 2 * 4];
        data[4..8].copy_from_slice(&[1, 2, 3, 0]);
        data[8..12].copy_from_slice(&[9, 8, 7, 0]);
        let f = Frame::new(Bytes::from(data), 2, 2, CaptureTimestamp::now(Instant::now()), 1);

        assert_eq!(f.pixel(1, 0), Some([1, 2, 3, 0]));
        assert_eq!(f.pixel(0, 1), Some([9, 8, 7, 0]));
        assert_eq!(f.pixel(2, 0), None);
        assert_eq!(f.row(1).map(<[u8]>::len), Some(8));
        assert!(f.row(2).is_none());
    }
}
