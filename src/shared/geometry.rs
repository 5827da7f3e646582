//! Geometry primitives
//!
//! Rectangles shared by every placement path, plus the transform between a
//! client's content rectangle and the decorated frame that encloses it.

/// Window geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Geometry {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Geometry {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width as i32
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }

    pub fn contains_point(&self, px: i32, py: i32) -> bool {
        px >= self.x && px < self.right() && py >= self.y && py < self.bottom()
    }

    pub fn center(&self) -> (i32, i32) {
        (self.x + self.width as i32 / 2, self.y + self.height as i32 / 2)
    }

    pub fn translate(self, dx: i32, dy: i32) -> Self {
        Self { x: self.x + dx, y: self.y + dy, ..self }
    }

    /// Same size, centered over `outer` (may overhang when larger).
    pub fn centered_in(self, outer: &Geometry) -> Self {
        Self {
            x: outer.x + (outer.width as i32 - self.width as i32) / 2,
            y: outer.y + (outer.height as i32 - self.height as i32) / 2,
            ..self
        }
    }
}

/// Decoration thickness around a content window.
///
/// `border` is zero while the border is hidden, `topbar` is zero when the
/// client has no topbar or it is hidden.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Extents {
    pub border: u32,
    pub topbar: u32,
}

impl Extents {
    pub fn new(border: u32, topbar: u32) -> Self {
        Self { border, topbar }
    }

    /// Offset of the content window inside its frame.
    pub fn content_offset(&self) -> (i32, i32) {
        let b = self.border as i32;
        (b, b + self.topbar as i32)
    }

    pub fn frame_from_window(&self, win: &Geometry) -> Geometry {
        let b = self.border as i32;
        let t = self.topbar as i32;
        Geometry {
            x: win.x - b,
            y: win.y - b - t,
            width: win.width + 2 * self.border,
            height: win.height + 2 * self.border + self.topbar,
        }
    }

    pub fn window_from_frame(&self, frame: &Geometry) -> Geometry {
        let b = self.border as i32;
        let t = self.topbar as i32;
        Geometry {
            x: frame.x + b,
            y: frame.y + b + t,
            width: frame.width.saturating_sub(2 * self.border),
            height: frame.height.saturating_sub(2 * self.border + self.topbar),
        }
    }

    /// `_NET_FRAME_EXTENTS` order: left, right, top, bottom.
    pub fn as_frame_extents(&self) -> [u32; 4] {
        [self.border, self.border, self.border + self.topbar, self.border]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_window_roundtrip() {
        let rects = [
            Geometry::new(0, 0, 1, 1),
            Geometry::new(100, 50, 640, 480),
            Geometry::new(-30, -12, 800, 600),
            Geometry::new(1920, 0, 1280, 1024),
        ];
        for (border_visible, topbar_visible) in
            [(false, false), (true, false), (false, true), (true, true)]
        {
            let ext = Extents::new(
                if border_visible { 3 } else { 0 },
                if topbar_visible { 22 } else { 0 },
            );
            for r in rects {
                let frame = ext.frame_from_window(&r);
                assert_eq!(ext.window_from_frame(&frame), r, "extents {:?}", ext);
            }
        }
    }

    #[test]
    fn test_frame_from_window_layout() {
        let ext = Extents::new(2, 20);
        let frame = ext.frame_from_window(&Geometry::new(100, 100, 400, 300));
        assert_eq!(frame, Geometry::new(98, 78, 404, 324));
        assert_eq!(ext.content_offset(), (2, 22));
        assert_eq!(ext.as_frame_extents(), [2, 2, 22, 2]);
    }

    #[test]
    fn test_centered_in() {
        let owner = Geometry::new(100, 100, 800, 600);
        let dialog = Geometry::new(0, 0, 200, 100).centered_in(&owner);
        assert_eq!(dialog, Geometry::new(400, 350, 200, 100));
    }
}
