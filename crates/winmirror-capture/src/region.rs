//! Screen-space capture regions.

/// Rectangle occupied by a capture target, in screen coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowRegion {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl WindowRegion {
    /// Create a region from its edges.
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Create a region of the given size anchored at `(left, top)`.
    pub fn with_size(left: i32, top: i32, width: i32, height: i32) -> Self {
        Self::new(left, top, left + width, top + height)
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    /// A region can be captured only if it covers at least one pixel.
    pub fn is_capturable(&self) -> bool {
        self.width() >= 1 && self.height() >= 1
    }

    /// Compare extents only; a moved window keeps its buffers.
    pub fn same_size(&self, other: &WindowRegion) -> bool {
        self.width() == other.width() && self.height() == other.height()
    }

    /// Dimensions as unsigned pixel counts, `None` when degenerate.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        if self.is_capturable() {
            Some((self.width() as u32, self.height() as u32))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_extent() {
        let region = WindowRegion::new(10, 20, 210, 120);
        assert_eq!(region.width(), 200);
        assert_eq!(region.height(), 100);
        assert_eq!(region.dimensions(), Some((200, 100)));
    }

    #[test]
    fn test_degenerate_regions() {
        assert!(!WindowRegion::new(0, 0, 0, 100).is_capturable());
        assert!(!WindowRegion::new(50, 0, 10, 100).is_capturable());
        assert!(WindowRegion::with_size(-5, -5, 1, 1).is_capturable());
        assert_eq!(WindowRegion::new(0, 0, 100, 0).dimensions(), None);
    }

    #[test]
    fn test_move_keeps_size() {
        let a = WindowRegion::with_size(0, 0, 300, 200);
        let b = WindowRegion::with_size(40, 60, 300, 200);
        assert!(a.same_size(&b));
        assert!(!a.same_size(&WindowRegion::with_size(0, 0, 301, 200)));
    }
}
