//! Move/Resize Module
//!
//! Pointer drags: moving a floating frame, resizing it from one of the eight
//! handles (window-first, through the size constraints), and dragging the
//! master/stack boundary of a tiled desktop.

use tracing::{debug, info};

use crate::shared::{Extents, Geometry};
use crate::wm::client::ClientId;
use crate::wm::client_flags::StateFlags;
use crate::wm::conn::XConn;
use crate::wm::decorations::Handle;
use crate::wm::error::XError;
use crate::wm::hints::SizeHints;
use crate::wm::WindowManager;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragKind {
    Move,
    Resize(Handle),
    /// Master/stack boundary of a monitor's active desktop
    Split,
}

/// Drag state for an active pointer drag
#[derive(Debug, Clone, Copy)]
pub struct DragState {
    pub kind: DragKind,
    pub client: ClientId,
    pub monitor: usize,
    pub start_x: i32,
    pub start_y: i32,
    pub start_frame: Geometry,
}

/// Frame after dragging `handle` by (dx, dy) from `start`. The content size
/// goes through `hints`; the edges opposite the handle stay put.
pub fn resize_frame(
    start: Geometry,
    handle: Handle,
    dx: i32,
    dy: i32,
    extents: Extents,
    hints: &SizeHints,
) -> Geometry {
    let mut width = start.width as i32;
    let mut height = start.height as i32;
    if handle.moves_left() {
        width -= dx;
    } else if handle.moves_right() {
        width += dx;
    }
    if handle.moves_top() {
        height -= dy;
    } else if handle.moves_bottom() {
        height += dy;
    }

    let min_w = 2 * extents.border as i32 + 1;
    let min_h = 2 * extents.border as i32 + extents.topbar as i32 + 1;
    let frame = Geometry::new(start.x, start.y, width.max(min_w) as u32, height.max(min_h) as u32);
    let content = extents.window_from_frame(&frame);
    let (w, h) = hints.apply(content.width, content.height);
    let mut frame = extents.frame_from_window(&Geometry { width: w, height: h, ..content });

    if handle.moves_left() {
        frame.x = start.right() - frame.width as i32;
    }
    if handle.moves_top() {
        frame.y = start.bottom() - frame.height as i32;
    }
    frame
}

impl<X: XConn> WindowManager<X> {
    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Start moving a floating client.
    pub fn begin_move(&mut self, id: ClientId, x: i32, y: i32) -> Result<(), XError> {
        let Some(c) = self.registry.get(id) else {
            return Ok(());
        };
        if c.tiled || c.is_fixed_kind() || c.is_fullscreen() || c.is_hidden() {
            return Ok(());
        }
        if c.state.any_maximized() || c.half.is_some() {
            self.restore(id)?;
        }
        let Some(c) = self.registry.get(id) else {
            return Ok(());
        };
        self.drag = Some(DragState {
            kind: DragKind::Move,
            client: id,
            monitor: c.monitor,
            start_x: x,
            start_y: y,
            start_frame: c.frame_geometry,
        });
        debug!("Begin move of {} at ({}, {})", id, x, y);
        Ok(())
    }

    /// Start resizing from a handle; on a tiled client this drags the split
    /// instead.
    pub fn begin_resize(&mut self, id: ClientId, handle: Handle, x: i32, y: i32) -> Result<(), XError> {
        let Some(c) = self.registry.get(id) else {
            return Ok(());
        };
        let kind = if c.tiled {
            DragKind::Split
        } else if c.is_fixed_kind()
            || c.is_size_fixed()
            || c.is_fullscreen()
            || c.is_hidden()
            || c.state.intersects(StateFlags::maximized())
        {
            return Ok(());
        } else {
            DragKind::Resize(handle)
        };
        self.drag = Some(DragState {
            kind,
            client: id,
            monitor: c.monitor,
            start_x: x,
            start_y: y,
            start_frame: c.frame_geometry,
        });
        debug!("Begin {:?} of {} at ({}, {})", kind, id, x, y);
        Ok(())
    }

    pub fn drag_motion(&mut self, x: i32, y: i32) -> Result<(), XError> {
        let Some(drag) = self.drag else {
            return Ok(());
        };
        let (dx, dy) = (x - drag.start_x, y - drag.start_y);
        match drag.kind {
            DragKind::Move => {
                let Some(c) = self.registry.get_mut(drag.client) else {
                    return Ok(());
                };
                c.set_frame(drag.start_frame.translate(dx, dy));
                self.push_geometry(drag.client)
            }
            DragKind::Resize(handle) => {
                let Some(c) = self.registry.get_mut(drag.client) else {
                    return Ok(());
                };
                let frame = resize_frame(drag.start_frame, handle, dx, dy, c.extents(), &c.hints);
                if frame == c.frame_geometry {
                    return Ok(());
                }
                c.set_frame(frame);
                self.push_geometry(drag.client)
            }
            DragKind::Split => {
                let Some(mon) = self.registry.monitors.get(drag.monitor) else {
                    return Ok(());
                };
                let area = mon.desktop().workarea;
                let split = (x - area.x) as f32 / area.width.max(1) as f32;
                self.set_split(drag.monitor, split)
            }
        }
    }

    /// Finish the drag. A moved client whose frame center ended up on another
    /// monitor joins that monitor.
    pub fn end_drag(&mut self) -> Result<(), XError> {
        let Some(drag) = self.drag.take() else {
            return Ok(());
        };
        debug!("End {:?} of {}", drag.kind, drag.client);
        if drag.kind != DragKind::Move {
            return Ok(());
        }
        let Some(c) = self.registry.get(drag.client) else {
            return Ok(());
        };
        let (cx, cy) = c.frame_geometry.center();
        let from = c.monitor;
        let old_desktop = c.desktop;
        let Some(to) = self
            .registry
            .monitors
            .iter()
            .position(|m| m.geometry.contains_point(cx, cy))
        else {
            return Ok(());
        };
        if to == from {
            return Ok(());
        }
        info!("Client {} dragged from monitor {} to {}", drag.client, from, to);

        let desktop = self.registry.monitors[to].active_desktop;
        self.registry.detach(drag.client);
        match self.registry.monitors[to].tail {
            Some(tail) => self.registry.stack_after(drag.client, tail),
            None => self.registry.push_back(to, drag.client),
        }
        if let Some(c) = self.registry.get_mut(drag.client) {
            c.desktop = desktop;
        }
        self.update_workarea(from, old_desktop, Some(drag.client))?;
        self.update_workarea(to, desktop, None)?;
        if self.active == Some(drag.client) {
            self.active_monitor = to;
        }
        self.arrange(to, desktop)?;
        self.publish_desktop(drag.client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wm::conn::mock::MockConn;
    use crate::wm::tests::{managed, wm_with};

    #[test]
    fn test_resize_from_left_keeps_right_edge() {
        let start = Geometry::new(100, 100, 304, 226);
        let frame = resize_frame(start, Handle::Left, -50, 0, Extents::new(2, 24), &SizeHints::default());
        assert_eq!(frame.width, 354);
        assert_eq!(frame.right(), start.right());
        assert_eq!(frame.y, start.y);
    }

    #[test]
    fn test_resize_honours_increments() {
        let hints = SizeHints {
            width_inc: 10,
            height_inc: 20,
            ..SizeHints::default()
        };
        let start = Geometry::new(0, 0, 304, 226);
        let frame = resize_frame(start, Handle::TopLeft, -7, -13, Extents::new(2, 24), &hints);
        let content = Extents::new(2, 24).window_from_frame(&frame);
        assert_eq!(content.width % 10, 0);
        assert_eq!(content.height % 20, 0);
        assert_eq!(frame.right(), start.right());
        assert_eq!(frame.bottom(), start.bottom());
    }

    #[test]
    fn test_resize_never_inverts() {
        let start = Geometry::new(0, 0, 104, 126);
        let frame = resize_frame(start, Handle::BottomRight, -500, -500, Extents::new(2, 24), &SizeHints::default());
        assert!(frame.width >= 5 && frame.height >= 29);
    }

    #[test]
    fn test_move_drag_follows_pointer() {
        let mut wm = wm_with(MockConn::single(1000, 800));
        let a = managed(&mut wm, 200, Geometry::new(100, 100, 300, 200));
        let start = wm.registry.get(a).expect("a").frame_geometry;
        wm.begin_move(a, 150, 90).expect("begin");
        wm.drag_motion(180, 140).expect("motion");
        assert_eq!(wm.registry.get(a).expect("a").frame_geometry, start.translate(30, 50));
        wm.end_drag().expect("end");
        assert!(!wm.is_dragging());
    }

    #[test]
    fn test_split_drag_on_tiled_client() {
        let mut wm = wm_with(MockConn::single(1000, 800));
        let a = managed(&mut wm, 200, Geometry::new(100, 100, 300, 200));
        managed(&mut wm, 201, Geometry::new(100, 100, 300, 200));
        wm.toggle_dynamic(0).expect("dynamic");

        wm.begin_resize(a, Handle::Right, 500, 400).expect("begin");
        wm.drag_motion(700, 400).expect("motion");
        assert!((wm.registry.monitors[0].desktop().split - 0.7).abs() < 1e-6);
        assert_eq!(wm.registry.get(a).expect("a").frame_geometry.width, 700);
        wm.end_drag().expect("end");
    }

    #[test]
    fn test_drag_across_monitors_reassigns() {
        let outputs = vec![Geometry::new(0, 0, 1000, 800), Geometry::new(1000, 0, 1000, 800)];
        let mut wm = wm_with(MockConn::new(outputs));
        let a = managed(&mut wm, 200, Geometry::new(100, 100, 300, 200));
        wm.begin_move(a, 200, 100).expect("begin");
        wm.drag_motion(1200, 100).expect("motion");
        wm.end_drag().expect("end");
        assert_eq!(wm.registry.get(a).expect("a").monitor, 1);
        assert_eq!(wm.registry.monitor_clients(1), vec![a]);
        assert_eq!(wm.active_monitor, 1);
    }
}
