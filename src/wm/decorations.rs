//! Window decorations (frame, topbar, buttons, resize handles)
//!
//! Only the window structure lives here: the frame the content is reparented
//! into, the topbar with its buttons, and eight input-only resize regions
//! inside the border strip. Painting is left to whatever draws on them.

use tracing::debug;

use crate::shared::{Extents, Geometry};
use crate::wm::client::ClientId;
use crate::wm::conn::{WindowKind, XConn, Xid};
use crate::wm::error::{Tolerate, XError};
use crate::wm::WindowManager;

/// Topbar buttons, right to left
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonType {
    Close,
    Maximize,
    Minimize,
}

impl ButtonType {
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Close),
            1 => Some(Self::Maximize),
            2 => Some(Self::Minimize),
            _ => None,
        }
    }
}

/// Resize regions, clockwise from the top-left corner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handle {
    TopLeft,
    Top,
    TopRight,
    Right,
    BottomRight,
    Bottom,
    BottomLeft,
    Left,
}

impl Handle {
    pub const ALL: [Handle; 8] = [
        Handle::TopLeft,
        Handle::Top,
        Handle::TopRight,
        Handle::Right,
        Handle::BottomRight,
        Handle::Bottom,
        Handle::BottomLeft,
        Handle::Left,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn moves_left(&self) -> bool {
        matches!(self, Self::TopLeft | Self::Left | Self::BottomLeft)
    }

    pub fn moves_right(&self) -> bool {
        matches!(self, Self::TopRight | Self::Right | Self::BottomRight)
    }

    pub fn moves_top(&self) -> bool {
        matches!(self, Self::TopLeft | Self::Top | Self::TopRight)
    }

    pub fn moves_bottom(&self) -> bool {
        matches!(self, Self::BottomLeft | Self::Bottom | Self::BottomRight)
    }
}

/// Decoration rectangles relative to their parent: the topbar and handles to
/// the frame, buttons to the topbar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecorationLayout {
    pub topbar: Option<Geometry>,
    pub buttons: Vec<Geometry>,
    pub handles: Vec<Geometry>,
}

pub fn decoration_layout(
    frame: Geometry,
    extents: Extents,
    buttons: usize,
    corner_size: u32,
) -> DecorationLayout {
    let (w, h) = (frame.width, frame.height);
    let b = extents.border;
    let t = extents.topbar;

    let topbar = (t > 0).then(|| Geometry::new(b as i32, b as i32, w.saturating_sub(2 * b).max(1), t));
    let buttons = match topbar {
        Some(bar) => (0..buttons.min(3))
            .map(|i| Geometry::new(bar.width as i32 - (i as i32 + 1) * t as i32, 0, t, t))
            .collect(),
        None => Vec::new(),
    };

    // handles stay inside the border strip; corners run along the
    // horizontal edges
    let s = b.max(1);
    let k = corner_size.max(s).min(w / 2).max(1);
    let (wi, hi, si, ki) = (w as i32, h as i32, s as i32, k as i32);
    let span_w = w.saturating_sub(2 * k).max(1);
    let span_h = h.saturating_sub(2 * s).max(1);
    let handles = vec![
        Geometry::new(0, 0, k, s),
        Geometry::new(ki, 0, span_w, s),
        Geometry::new(wi - ki, 0, k, s),
        Geometry::new(wi - si, si, s, span_h),
        Geometry::new(wi - ki, hi - si, k, s),
        Geometry::new(ki, hi - si, span_w, s),
        Geometry::new(0, hi - si, k, s),
        Geometry::new(0, si, s, span_h),
    ];

    DecorationLayout { topbar, buttons, handles }
}

impl<X: XConn> WindowManager<X> {
    fn layout_for(&self, id: ClientId) -> Option<DecorationLayout> {
        let c = self.registry.get(id)?;
        Some(decoration_layout(
            c.frame_geometry,
            c.extents(),
            self.config.style.buttons,
            self.config.style.corner_size,
        ))
    }

    /// Create the topbar, buttons and handles inside an existing frame.
    /// Created after the content is reparented so they stack above it.
    pub fn create_decorations(&mut self, id: ClientId) -> Result<(), XError> {
        let Some(c) = self.registry.get(id) else {
            return Ok(());
        };
        let frame = c.decor.frame;
        let (has_topbar, has_handles) = (c.has_topbar, c.has_handles);
        let t = c.topbar_height;
        let b = c.border_width;
        // full layout, hidden parts are unmapped rather than absent
        let layout = decoration_layout(
            c.frame_geometry,
            Extents::new(b, t),
            self.config.style.buttons,
            self.config.style.corner_size,
        );

        let mut created: Vec<Xid> = Vec::new();
        let mut topbar = None;
        let mut buttons = Vec::new();
        if has_topbar {
            if let Some(rect) = layout.topbar {
                let bar = self.conn.create_window(frame, rect, WindowKind::Decoration)?;
                created.push(bar);
                for rect in &layout.buttons {
                    let button = self.conn.create_window(bar, *rect, WindowKind::Decoration)?;
                    self.conn.map(button)?;
                    created.push(button);
                    buttons.push(button);
                }
                topbar = Some(bar);
            }
        }
        let mut handles = Vec::new();
        if has_handles {
            for rect in &layout.handles {
                let handle = self.conn.create_window(frame, *rect, WindowKind::Handle)?;
                created.push(handle);
                handles.push(handle);
            }
        }

        for w in &created {
            self.own.insert(*w);
            self.registry.register_window(*w, id);
        }
        if let Some(c) = self.registry.get_mut(id) {
            c.decor.topbar = topbar;
            c.decor.buttons = buttons;
            c.decor.handles = handles;
            debug!("Created {} decoration windows for {}", created.len(), id);
        }
        Ok(())
    }

    /// Tear down the frame and everything in it. The content window must
    /// already be reparented away or destroyed.
    pub fn destroy_decorations(&mut self, id: ClientId) -> Result<(), XError> {
        let Some(c) = self.registry.get(id) else {
            return Ok(());
        };
        let windows: Vec<Xid> = c.decor.windows().collect();
        self.conn.destroy_window(c.decor.frame).tolerate("destroy frame")?;
        for w in windows {
            self.own.remove(w);
        }
        Ok(())
    }

    /// Push the client's recorded geometry to the server: frame, content
    /// offset, decorations, then the synthetic ConfigureNotify and
    /// `_NET_FRAME_EXTENTS`.
    pub fn push_geometry(&mut self, id: ClientId) -> Result<(), XError> {
        let Some(layout) = self.layout_for(id) else {
            return Ok(());
        };
        let Some(c) = self.registry.get(id) else {
            return Ok(());
        };
        let ext = c.extents();
        let frame = c.frame_geometry;
        let content = c.geometry;
        let window = c.window;
        let decor = c.decor.clone();
        let show_topbar = ext.topbar > 0;
        let show_handles = c.has_handles && c.border_visible && !c.is_fullscreen();

        self.conn.move_resize(decor.frame, frame).tolerate("move frame")?;
        let (ox, oy) = ext.content_offset();
        self.conn
            .move_resize(window, Geometry::new(ox, oy, content.width, content.height))
            .tolerate("move content")?;

        if let (Some(bar), Some(rect)) = (decor.topbar, layout.topbar) {
            self.conn.move_resize(bar, rect).tolerate("move topbar")?;
            for (button, rect) in decor.buttons.iter().zip(&layout.buttons) {
                self.conn.move_resize(*button, *rect).tolerate("move button")?;
            }
        }
        if let Some(bar) = decor.topbar {
            if show_topbar != decor.topbar_mapped {
                if show_topbar {
                    self.conn.map(bar).tolerate("map topbar")?;
                } else {
                    self.conn.unmap(bar).tolerate("unmap topbar")?;
                }
            }
        }

        for (handle, rect) in decor.handles.iter().zip(&layout.handles) {
            self.conn.move_resize(*handle, *rect).tolerate("move handle")?;
        }
        if !decor.handles.is_empty() && show_handles != decor.handles_mapped {
            for handle in &decor.handles {
                if show_handles {
                    self.conn.map(*handle).tolerate("map handle")?;
                } else {
                    self.conn.unmap(*handle).tolerate("unmap handle")?;
                }
            }
        }

        if let Some(c) = self.registry.get_mut(id) {
            c.decor.topbar_mapped = show_topbar && decor.topbar.is_some();
            c.decor.handles_mapped = show_handles && !decor.handles.is_empty();
        }

        self.conn
            .send_configure_notify(window, content)
            .tolerate("configure notify")?;
        self.publish_frame_extents(id)
    }

    /// Show or hide the topbar keeping the frame in place.
    pub fn toggle_topbar(&mut self, id: ClientId) -> Result<(), XError> {
        let Some(c) = self.registry.get_mut(id) else {
            return Ok(());
        };
        if !c.has_topbar || c.is_fullscreen() {
            return Ok(());
        }
        let (border, topbar) = (c.border_visible, !c.topbar_visible);
        c.set_decor_visibility(border, topbar);
        debug!("Client {} topbar visible: {}", id, topbar);
        self.push_geometry(id)
    }

    /// Show or hide the border keeping the frame in place.
    pub fn toggle_border(&mut self, id: ClientId) -> Result<(), XError> {
        let Some(c) = self.registry.get_mut(id) else {
            return Ok(());
        };
        if c.is_fixed_kind() || c.is_fullscreen() {
            return Ok(());
        }
        let (border, topbar) = (!c.border_visible, c.topbar_visible);
        c.set_decor_visibility(border, topbar);
        debug!("Client {} border visible: {}", id, border);
        self.push_geometry(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wm::conn::mock::{Call, MockConn};
    use crate::wm::tests::{managed, wm_with};

    #[test]
    fn test_layout_right_aligns_buttons() {
        let layout = decoration_layout(Geometry::new(0, 0, 404, 326), Extents::new(2, 24), 3, 12);
        assert_eq!(layout.topbar, Some(Geometry::new(2, 2, 400, 24)));
        assert_eq!(layout.buttons[0], Geometry::new(376, 0, 24, 24));
        assert_eq!(layout.buttons[2], Geometry::new(328, 0, 24, 24));
        assert_eq!(layout.handles.len(), 8);
        // right edge handle hugs the frame edge
        let right = layout.handles[Handle::Right as usize];
        assert_eq!(right.right(), 404);
    }

    fn overlap(a: &Geometry, b: &Geometry) -> bool {
        a.x < b.right() && b.x < a.right() && a.y < b.bottom() && b.y < a.bottom()
    }

    #[test]
    fn test_handles_stay_in_border_strip() {
        let frame = Geometry::new(0, 0, 404, 326);
        let layout = decoration_layout(frame, Extents::new(2, 24), 3, 12);
        let content = Geometry::new(2, 26, 400, 298);
        let topbar = layout.topbar.expect("topbar");
        for handle in &layout.handles {
            assert!(!overlap(handle, &content), "{:?} covers content", handle);
            assert!(!overlap(handle, &topbar), "{:?} covers topbar", handle);
            assert!(handle.x >= 0 && handle.right() <= 404);
            assert!(handle.y >= 0 && handle.bottom() <= 326);
        }
        let corner = layout.handles[Handle::BottomRight as usize];
        assert_eq!(corner, Geometry::new(392, 324, 12, 2));
    }

    #[test]
    fn test_no_topbar_without_height() {
        let layout = decoration_layout(Geometry::new(0, 0, 100, 100), Extents::new(2, 0), 3, 12);
        assert!(layout.topbar.is_none());
        assert!(layout.buttons.is_empty());
    }

    #[test]
    fn test_toggle_topbar_keeps_frame() {
        let mut wm = wm_with(MockConn::single(1000, 800));
        let a = managed(&mut wm, 200, Geometry::new(100, 100, 300, 200));
        let frame = wm.registry.get(a).expect("a").frame_geometry;
        let bar = wm.registry.get(a).expect("a").decor.topbar.expect("topbar");

        wm.conn.clear_calls();
        wm.toggle_topbar(a).expect("toggle");
        let c = wm.registry.get(a).expect("a");
        assert_eq!(c.frame_geometry, frame);
        assert_eq!(c.geometry.y, frame.y + 2);
        assert!(wm.conn.calls().contains(&Call::Unmap(bar)));
        assert_eq!(
            wm.conn.prop(200, wm.atoms.net_frame_extents),
            vec![2, 2, 2, 2]
        );
    }

    #[test]
    fn test_push_sends_synthetic_configure() {
        let mut wm = wm_with(MockConn::single(1000, 800));
        let a = managed(&mut wm, 200, Geometry::new(100, 100, 300, 200));
        wm.conn.clear_calls();
        wm.push_geometry(a).expect("push");
        let content = wm.registry.get(a).expect("a").geometry;
        assert!(wm.conn.calls().contains(&Call::ConfigureNotify(200, content)));
    }
}
