//! State Transition Module
//!
//! Moves clients between layout modes: tiled, maximized (per axis or half),
//! fullscreen and minimized, and back via `restore`. Every mode keeps its own
//! saved frame so restoring always has somewhere valid to return to.
//!
//! Ineligible requests are silent no-ops: nothing is mutated and nothing is
//! logged.

use tracing::debug;

use crate::shared::Geometry;
use crate::wm::client::ClientId;
use crate::wm::client_flags::{Axis, Edge, StateFlags};
use crate::wm::conn::XConn;
use crate::wm::error::XError;
use crate::wm::WindowManager;

/// Frame of a half-maximized client within `area`.
pub fn half_rect(area: Geometry, edge: Edge) -> Geometry {
    let (half_w, half_h) = (area.width / 2, area.height / 2);
    match edge {
        Edge::Left => Geometry::new(area.x, area.y, half_w, area.height),
        Edge::Right => Geometry::new(area.x + half_w as i32, area.y, area.width - half_w, area.height),
        Edge::Top => Geometry::new(area.x, area.y, area.width, half_h),
        Edge::Bottom => Geometry::new(area.x, area.y + half_h as i32, area.width, area.height - half_h),
    }
}

/// Off-screen frame position for a minimized client: below the monitor,
/// keeping the vertical offset it had inside it.
pub fn hidden_rect(frame: Geometry, monitor: Geometry) -> Geometry {
    Geometry {
        y: monitor.y + monitor.height as i32 + (frame.y - monitor.y).max(0),
        ..frame
    }
}

impl<X: XConn> WindowManager<X> {
    fn can_change_mode(&self, id: ClientId) -> bool {
        self.registry
            .get(id)
            .map(|c| c.can_change_mode() && !c.is_fullscreen() && !c.is_hidden())
            .unwrap_or(false)
    }

    /// Maximize along one or both axes of the desktop workarea, leaving the
    /// other axis untouched.
    pub fn maximize(&mut self, id: ClientId, axis: Axis) -> Result<(), XError> {
        if !self.can_change_mode(id) {
            return Ok(());
        }
        let Some(area) = self.client_workarea(id) else {
            return Ok(());
        };
        let Some(c) = self.registry.get_mut(id) else {
            return Ok(());
        };

        let mut frame = c.frame_geometry;
        if c.half.take().is_some() {
            // leaving a half: the untouched axis comes from before it
            frame = c.saved.maximize;
            c.state.remove(StateFlags::maximized());
        } else if !c.state.any_maximized() {
            c.saved.maximize = frame;
        }

        if matches!(axis, Axis::Horizontal | Axis::Both) {
            frame.x = area.x;
            frame.width = area.width;
            c.state.insert(StateFlags::MAXIMIZED_HORZ);
        }
        if matches!(axis, Axis::Vertical | Axis::Both) {
            frame.y = area.y;
            frame.height = area.height;
            c.state.insert(StateFlags::MAXIMIZED_VERT);
        }
        c.set_frame(frame);
        debug!("Maximized {} ({:?}) to {:?}", id, axis, frame);

        self.push_geometry(id)?;
        self.publish_state(id)
    }

    /// Snap to one half of the desktop workarea.
    pub fn maximize_half(&mut self, id: ClientId, edge: Edge) -> Result<(), XError> {
        if !self.can_change_mode(id) {
            return Ok(());
        }
        let Some(area) = self.client_workarea(id) else {
            return Ok(());
        };
        let Some(c) = self.registry.get_mut(id) else {
            return Ok(());
        };

        if !c.state.any_maximized() && c.half.is_none() {
            c.saved.maximize = c.frame_geometry;
        }
        c.half = Some(edge);
        c.state.remove(StateFlags::maximized());
        c.state.insert(edge.state_bits());
        let frame = half_rect(area, edge);
        c.set_frame(frame);
        debug!("Half-maximized {} to {:?}", id, edge);

        self.push_geometry(id)?;
        self.publish_state(id)
    }

    /// Cover the whole monitor with the content window, decorations hidden.
    pub fn fullscreen(&mut self, id: ClientId) -> Result<(), XError> {
        if !self.can_change_mode(id) {
            return Ok(());
        }
        let Some(monitor) = self.registry.get(id).map(|c| c.monitor) else {
            return Ok(());
        };
        let Some(bounds) = self.registry.monitors.get(monitor).map(|m| m.geometry) else {
            return Ok(());
        };
        let Some(c) = self.registry.get_mut(id) else {
            return Ok(());
        };

        c.saved.fullscreen = c.frame_geometry;
        c.fullscreen_decor = (c.border_visible, c.topbar_visible);
        c.border_visible = false;
        c.topbar_visible = false;
        c.state.insert(StateFlags::FULLSCREEN);
        c.set_content(bounds);
        debug!("Fullscreen {} on {:?}", id, bounds);

        self.push_geometry(id)?;
        self.raise(id)?;
        self.publish_state(id)
    }

    /// Park the frame below the monitor and mark the client hidden.
    pub fn minimize(&mut self, id: ClientId) -> Result<(), XError> {
        let Some(c) = self.registry.get(id) else {
            return Ok(());
        };
        if c.is_hidden() || c.is_fixed_kind() {
            return Ok(());
        }
        if c.is_fullscreen() {
            self.restore(id)?;
        }
        let was_tiled = self.registry.get(id).map(|c| c.tiled).unwrap_or(false);
        self.untile(id)?;

        let Some(c) = self.registry.get(id) else {
            return Ok(());
        };
        let (monitor, desktop) = (c.monitor, c.desktop);
        let bounds = self.registry.monitors[monitor].geometry;
        let Some(c) = self.registry.get_mut(id) else {
            return Ok(());
        };
        c.saved.hidden = c.frame_geometry;
        let frame = hidden_rect(c.frame_geometry, bounds);
        c.set_frame(frame);
        c.state.insert(StateFlags::HIDDEN);
        debug!("Minimized {}", id);

        self.push_geometry(id)?;
        if self.active == Some(id) {
            let successor = self.select_successor(id);
            self.activate(successor)?;
        }
        if was_tiled {
            self.arrange(monitor, desktop)?;
        }
        self.publish_state(id)
    }

    /// Leave the highest-priority mode that is set: fullscreen, then hidden,
    /// then maximized. Returns whether anything changed.
    pub fn restore(&mut self, id: ClientId) -> Result<bool, XError> {
        let Some(c) = self.registry.get_mut(id) else {
            return Ok(false);
        };
        if c.tiled {
            return Ok(false);
        }

        let mut rearrange = None;
        if c.is_fullscreen() {
            c.state.remove(StateFlags::FULLSCREEN);
            let (border, topbar) = c.fullscreen_decor;
            c.border_visible = border;
            c.topbar_visible = topbar;
            let frame = c.saved.fullscreen;
            c.set_frame(frame);
        } else if c.is_hidden() {
            c.state.remove(StateFlags::HIDDEN);
            let frame = c.saved.hidden;
            c.set_frame(frame);
            rearrange = Some((c.monitor, c.desktop));
        } else if c.state.any_maximized() || c.half.is_some() {
            c.state.remove(StateFlags::maximized());
            c.half = None;
            let frame = c.saved.maximize;
            c.set_frame(frame);
        } else {
            return Ok(false);
        }
        debug!("Restored {} (state now {:?})", id, c.state);

        self.push_geometry(id)?;
        if let Some((monitor, desktop)) = rearrange {
            self.arrange(monitor, desktop)?;
        }
        self.publish_state(id)?;
        Ok(true)
    }

    /// Place a client into a tile, remembering its floating frame.
    pub fn tile(&mut self, id: ClientId, rect: Geometry) -> Result<(), XError> {
        let Some(c) = self.registry.get_mut(id) else {
            return Ok(());
        };
        if !c.tiled {
            c.saved.tile = c.frame_geometry;
            c.tiled = true;
        }
        if c.frame_geometry == rect {
            return Ok(());
        }
        c.set_frame(rect);
        self.push_geometry(id)
    }

    pub fn untile(&mut self, id: ClientId) -> Result<(), XError> {
        let Some(c) = self.registry.get_mut(id) else {
            return Ok(());
        };
        if !c.tiled {
            return Ok(());
        }
        c.tiled = false;
        let frame = c.saved.tile;
        c.set_frame(frame);
        self.push_geometry(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wm::client_flags::WindowType;
    use crate::wm::conn::mock::MockConn;
    use crate::wm::tests::{managed, wm_with};

    #[test]
    fn test_half_rects_cover_workarea() {
        let area = Geometry::new(0, 30, 1001, 771);
        let left = half_rect(area, Edge::Left);
        let right = half_rect(area, Edge::Right);
        assert_eq!(left.width + right.width, 1001);
        assert_eq!(right.x, left.right());
        let top = half_rect(area, Edge::Top);
        let bottom = half_rect(area, Edge::Bottom);
        assert_eq!(top.height + bottom.height, 771);
        assert_eq!(bottom.y, top.bottom());
    }

    #[test]
    fn test_hidden_rect_below_monitor() {
        let monitor = Geometry::new(0, 0, 1000, 800);
        assert_eq!(hidden_rect(Geometry::new(10, 50, 100, 100), monitor).y, 850);
        assert_eq!(hidden_rect(Geometry::new(10, -20, 100, 100), monitor).y, 800);
    }

    #[test]
    fn test_second_maximize_keeps_slot() {
        let mut wm = wm_with(MockConn::single(1000, 800));
        let a = managed(&mut wm, 200, Geometry::new(100, 100, 300, 200));
        let original = wm.registry.get(a).expect("a").frame_geometry;

        wm.maximize(a, Axis::Horizontal).expect("max");
        wm.maximize(a, Axis::Vertical).expect("max");
        wm.maximize(a, Axis::Both).expect("max");
        let c = wm.registry.get(a).expect("a");
        assert!(c.state.is_maximized());
        assert_eq!(c.saved.maximize, original);
        assert_eq!(c.frame_geometry, Geometry::new(0, 0, 1000, 800));

        assert!(wm.restore(a).expect("restore"));
        let c = wm.registry.get(a).expect("a");
        assert_eq!(c.frame_geometry, original);
        assert!(!c.state.any_maximized());
        assert!(!wm.restore(a).expect("restore"));
    }

    #[test]
    fn test_maximize_one_axis_leaves_other() {
        let mut wm = wm_with(MockConn::single(1000, 800));
        let a = managed(&mut wm, 200, Geometry::new(100, 100, 300, 200));
        let original = wm.registry.get(a).expect("a").frame_geometry;
        wm.maximize(a, Axis::Vertical).expect("max");
        let c = wm.registry.get(a).expect("a");
        assert_eq!((c.frame_geometry.x, c.frame_geometry.width), (original.x, original.width));
        assert_eq!((c.frame_geometry.y, c.frame_geometry.height), (0, 800));
    }

    #[test]
    fn test_half_then_restore() {
        let mut wm = wm_with(MockConn::single(1000, 800));
        let a = managed(&mut wm, 200, Geometry::new(100, 100, 300, 200));
        let original = wm.registry.get(a).expect("a").frame_geometry;
        wm.maximize_half(a, Edge::Left).expect("half");
        wm.maximize_half(a, Edge::Right).expect("half");
        let c = wm.registry.get(a).expect("a");
        assert_eq!(c.half, Some(Edge::Right));
        assert_eq!(c.state & StateFlags::maximized(), StateFlags::MAXIMIZED_VERT);
        assert_eq!(c.frame_geometry, Geometry::new(500, 0, 500, 800));

        wm.restore(a).expect("restore");
        let c = wm.registry.get(a).expect("a");
        assert_eq!(c.half, None);
        assert_eq!(c.frame_geometry, original);
    }

    #[test]
    fn test_fullscreen_roundtrip() {
        let mut wm = wm_with(MockConn::single(1000, 800));
        let a = managed(&mut wm, 200, Geometry::new(100, 100, 300, 200));
        let original = wm.registry.get(a).expect("a").geometry;

        wm.fullscreen(a).expect("fullscreen");
        let c = wm.registry.get(a).expect("a");
        assert!(c.is_fullscreen());
        assert_eq!(c.geometry, Geometry::new(0, 0, 1000, 800));
        assert_eq!(c.frame_geometry, c.geometry);
        let state = wm.conn.prop(200, wm.atoms.net_wm_state);
        assert!(state.contains(&wm.atoms.net_wm_state_fullscreen));

        wm.restore(a).expect("restore");
        let c = wm.registry.get(a).expect("a");
        assert!(!c.is_fullscreen());
        assert!(c.border_visible && c.topbar_visible);
        assert_eq!(c.geometry, original);
    }

    #[test]
    fn test_restore_priority_one_branch_per_call() {
        let mut wm = wm_with(MockConn::single(1000, 800));
        let a = managed(&mut wm, 200, Geometry::new(100, 100, 300, 200));
        let original = wm.registry.get(a).expect("a").frame_geometry;
        wm.maximize(a, Axis::Both).expect("max");
        // fullscreen over maximized: the fullscreen slot holds the maximized frame
        let c = wm.registry.get_mut(a).expect("a");
        c.saved.fullscreen = c.frame_geometry;
        c.fullscreen_decor = (true, true);
        c.state.insert(StateFlags::FULLSCREEN);

        wm.restore(a).expect("restore");
        let c = wm.registry.get(a).expect("a");
        assert!(!c.is_fullscreen());
        assert!(c.state.is_maximized());
        assert_eq!(c.frame_geometry, Geometry::new(0, 0, 1000, 800));

        wm.restore(a).expect("restore");
        let c = wm.registry.get(a).expect("a");
        assert!(!c.state.any_maximized());
        assert_eq!(c.frame_geometry, original);
    }

    #[test]
    fn test_minimize_and_restore() {
        let mut wm = wm_with(MockConn::single(1000, 800));
        let a = managed(&mut wm, 200, Geometry::new(100, 100, 300, 200));
        let b = managed(&mut wm, 201, Geometry::new(200, 200, 300, 200));
        let original = wm.registry.get(b).expect("b").frame_geometry;
        assert_eq!(wm.active, Some(b));

        wm.minimize(b).expect("minimize");
        let c = wm.registry.get(b).expect("b");
        assert!(c.is_hidden());
        assert!(c.frame_geometry.y >= 800);
        assert_eq!(wm.active, Some(a));
        assert_eq!(
            wm.conn.prop(201, wm.atoms.wm_state),
            vec![crate::wm::ewmh::WM_STATE_ICONIC, 0]
        );

        // minimizing twice keeps the first snapshot
        wm.minimize(b).expect("minimize");
        wm.restore(b).expect("restore");
        let c = wm.registry.get(b).expect("b");
        assert!(!c.is_hidden());
        assert_eq!(c.frame_geometry, original);
    }

    #[test]
    fn test_minimize_tiled_retiles_on_restore() {
        let mut wm = wm_with(MockConn::single(1000, 800));
        let a = managed(&mut wm, 200, Geometry::new(100, 100, 300, 200));
        let b = managed(&mut wm, 201, Geometry::new(200, 200, 300, 200));
        wm.toggle_dynamic(0).expect("dynamic");

        wm.minimize(b).expect("minimize");
        assert!(!wm.registry.get(b).expect("b").tiled);
        assert_eq!(wm.registry.get(a).expect("a").frame_geometry, Geometry::new(0, 0, 1000, 800));

        wm.restore(b).expect("restore");
        assert!(wm.registry.get(b).expect("b").tiled);
        assert_eq!(wm.registry.get(a).expect("a").frame_geometry.width, 500);
    }

    #[derive(Debug, Clone, Copy)]
    enum Step {
        Max(Axis),
        Half(Edge),
        Full,
        Min,
        Dynamic,
    }

    fn assert_mode_authority(wm: &crate::wm::WindowManager<MockConn>, id: ClientId, context: &str) {
        let c = wm.registry.get(id).expect("client");
        let screen = Geometry::new(0, 0, 1000, 800);
        if c.is_fullscreen() {
            assert_eq!(c.geometry, screen, "{}", context);
        } else if c.is_hidden() {
            assert!(c.frame_geometry.y >= 800, "{}", context);
        } else if c.tiled {
            assert!(!c.state.any_maximized() && c.half.is_none(), "{}", context);
        } else if let Some(edge) = c.half {
            assert_eq!(c.frame_geometry, half_rect(screen, edge), "{}", context);
        } else {
            let f = c.frame_geometry;
            if c.state.contains(StateFlags::MAXIMIZED_HORZ) {
                assert_eq!((f.x, f.width), (0, 1000), "{}", context);
            }
            if c.state.contains(StateFlags::MAXIMIZED_VERT) {
                assert_eq!((f.y, f.height), (0, 800), "{}", context);
            }
        }
    }

    fn restore_all(wm: &mut crate::wm::WindowManager<MockConn>, id: ClientId) -> usize {
        let mut steps = 0;
        while wm.restore(id).expect("restore") {
            steps += 1;
            assert!(steps <= 4, "restore does not settle");
        }
        steps
    }

    #[test]
    fn test_transition_sequences_restore_to_normal() {
        let sequences: &[&[Step]] = &[
            &[Step::Max(Axis::Both), Step::Full, Step::Min],
            &[Step::Half(Edge::Left), Step::Max(Axis::Horizontal), Step::Full],
            &[Step::Full, Step::Max(Axis::Both), Step::Half(Edge::Top), Step::Min],
            &[Step::Dynamic, Step::Max(Axis::Both), Step::Min, Step::Half(Edge::Right)],
            &[Step::Min, Step::Dynamic, Step::Full],
            &[Step::Max(Axis::Vertical), Step::Half(Edge::Bottom), Step::Dynamic, Step::Min],
            &[Step::Half(Edge::Right), Step::Min, Step::Full, Step::Max(Axis::Both)],
        ];
        for sequence in sequences {
            let mut wm = wm_with(MockConn::single(1000, 800));
            let a = managed(&mut wm, 200, Geometry::new(100, 100, 300, 200));
            let original = wm.registry.get(a).expect("a").frame_geometry;

            for step in sequence.iter() {
                let result = match *step {
                    Step::Max(axis) => wm.maximize(a, axis),
                    Step::Half(edge) => wm.maximize_half(a, edge),
                    Step::Full => wm.fullscreen(a),
                    Step::Min => wm.minimize(a),
                    Step::Dynamic => wm.toggle_dynamic(0),
                };
                result.expect("transition");
                assert_mode_authority(&wm, a, &format!("{:?} after {:?}", sequence, step));
            }

            restore_all(&mut wm, a);
            if wm.registry.monitors[0].desktop().dynamic {
                wm.toggle_dynamic(0).expect("static");
            }
            restore_all(&mut wm, a);

            let c = wm.registry.get(a).expect("a");
            let modes = StateFlags::FULLSCREEN | StateFlags::HIDDEN | StateFlags::maximized();
            assert!(!c.state.intersects(modes), "{:?}", sequence);
            assert!(!c.tiled && c.half.is_none(), "{:?}", sequence);
            assert_eq!(c.frame_geometry, original, "{:?}", sequence);
        }
    }

    #[test]
    fn test_guard_rejects_without_mutation() {
        let mut wm = wm_with(MockConn::single(1000, 800));
        let dock = managed(&mut wm, 200, Geometry::new(0, 0, 1000, 30));
        wm.registry.get_mut(dock).expect("dock").window_type = WindowType::Dock;
        let before = wm.registry.get(dock).expect("dock").frame_geometry;

        wm.maximize(dock, Axis::Both).expect("max");
        wm.fullscreen(dock).expect("fullscreen");
        let c = wm.registry.get(dock).expect("dock");
        assert_eq!(c.frame_geometry, before);
        assert!(c.state.is_empty());

        let a = managed(&mut wm, 201, Geometry::new(100, 100, 300, 200));
        wm.registry.get_mut(a).expect("a").tiled = true;
        wm.maximize(a, Axis::Both).expect("max");
        assert!(!wm.registry.get(a).expect("a").state.any_maximized());
    }
}
